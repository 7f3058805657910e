// Authentication and authorization

pub mod codes;
pub mod errors;
pub mod jwt;
pub mod middleware;
pub mod models;
pub mod service;

pub use codes::*;
pub use errors::*;
pub use jwt::*;
pub use middleware::*;
pub use models::*;
pub use service::*;
