//! Multi-tenant scheduling and CRM backend for barbershops and beauty salons.

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod models;
pub mod services;
pub mod telemetry;
pub mod utils;

pub use error::AppError;
