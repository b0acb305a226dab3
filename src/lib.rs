//! coach-raman: a slowed, phrase-by-phrase speech coach for
//! dementia-communication lessons.

pub mod api;
pub mod chat;
pub mod config;
pub mod lessons;
pub mod speech;
pub mod view;
