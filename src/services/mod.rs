pub mod auth;
pub(crate) mod http;
pub mod runner;
pub mod spotify;
pub mod store;
pub mod youtube;
