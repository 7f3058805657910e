// Configuration, database pool and startup seeding

pub mod app;
pub mod database;
pub mod seeding;

pub use app::{AppConfig, TwilioConfig};
pub use database::{ping, run_migrations, DatabaseConfig};
pub use seeding::DatabaseSeeder;
