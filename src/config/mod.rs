// Runtime configuration

pub mod app;
pub mod database;
pub mod integrations;

pub use app::{AppConfig, LogFormat};
pub use database::{run_migrations, DatabaseConfig};
pub use integrations::{GeminiConfig, SmtpConfig};
