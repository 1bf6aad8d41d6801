pub mod auth;
pub mod cors;

pub use auth::{proxy_auth_middleware, AuthContext};
pub use cors::cors_layer;
