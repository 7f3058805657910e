// API routes and handlers

pub mod auth;
pub mod error;
pub mod health;
pub mod instructor;
pub mod player;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::create_routes;
pub use state::AppState;
