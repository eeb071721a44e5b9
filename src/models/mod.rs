// Domain models and request/response types

pub mod aios;
pub mod appointment;
pub mod audit;
pub mod booking;
pub mod business;
pub mod catalog;
pub mod client;
pub mod dashboard;
pub mod finance;
pub mod marketing;
pub mod queue;
pub mod system_log;
pub mod team;

pub use aios::*;
pub use appointment::*;
pub use audit::*;
pub use booking::*;
pub use business::*;
pub use catalog::*;
pub use client::*;
pub use dashboard::*;
pub use finance::*;
pub use marketing::*;
pub use queue::*;
pub use system_log::*;
pub use team::*;
