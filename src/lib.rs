#![forbid(unsafe_code)]

pub mod config;
pub mod downloads;
pub mod error;
pub mod extractor;
pub mod files;
pub mod format;
pub mod logging;
pub mod progress;
pub mod security;
