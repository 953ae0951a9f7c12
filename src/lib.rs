pub mod config;
pub mod error;
pub mod logging;
pub mod manifest;
pub mod netfile;
pub mod storage;
pub mod tasks;
pub mod warehouse;
