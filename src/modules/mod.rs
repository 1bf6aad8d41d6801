pub mod auth;
pub mod logger;
pub mod persistence;
