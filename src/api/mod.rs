// HTTP layer: routers, extractors and shared state

pub mod aios;
pub mod appointments;
pub mod audit;
pub mod auth;
pub mod bookings;
pub mod business;
pub mod catalog;
pub mod clients;
pub mod dashboard;
pub mod error_log;
pub mod events;
pub mod extract;
pub mod finance;
pub mod health;
pub mod logs;
pub mod marketing;
pub mod public;
pub mod routes;
pub mod state;
pub mod team;

pub use routes::create_routes;
pub use state::AppState;
