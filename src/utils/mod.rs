//! Utility modules: logging setup, pipeline trace, JSON helpers.
pub mod json;
pub mod logger;
pub mod trace;
