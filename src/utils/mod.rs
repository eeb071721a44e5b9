// Pure helpers shared across services

pub mod dates;
pub mod formatters;
pub mod slug;
pub mod tokens;
pub mod whatsapp;
