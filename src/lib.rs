// Public API for integration tests and potential library usage

pub mod config;
pub mod handlers;
pub mod normalize;
pub mod protocol;
pub mod state;
pub mod storage;
pub mod telegram;
pub mod types;
