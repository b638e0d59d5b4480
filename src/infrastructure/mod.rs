//! Infrastructure layer - Store implementations and process setup

pub mod cache;
pub mod logging;
