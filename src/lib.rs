pub mod config;
pub mod error;
pub mod logging;
pub mod ports;
pub mod services;
pub mod sync;
