//! Data models for chat traffic

mod message;

pub use message::*;
