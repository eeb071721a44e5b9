// Business logic services

pub mod aios_service;
pub mod appointment_service;
pub mod audit_service;
pub mod availability;
pub mod business_service;
pub mod catalog_service;
pub mod client_service;
pub mod dashboard_service;
pub mod event_hub;
pub mod finance_service;
pub mod financial_doctor;
pub mod gemini_client;
pub mod mailer;
pub mod marketing_service;
pub mod pricing;
pub mod public_booking_service;
pub mod queue_service;
pub mod recycle_bin_service;
pub mod reminder_service;
pub mod scheduling_service;
pub mod system_log_service;
pub mod team_service;

pub use aios_service::AiosService;
pub use appointment_service::AppointmentService;
pub use audit_service::AuditService;
pub use business_service::BusinessService;
pub use catalog_service::CatalogService;
pub use client_service::ClientService;
pub use dashboard_service::DashboardService;
pub use event_hub::EventHub;
pub use finance_service::FinanceService;
pub use gemini_client::{ContentGenerator, GeminiClient, GeminiError};
pub use mailer::{Mailer, SmtpMailer};
pub use marketing_service::MarketingService;
pub use public_booking_service::PublicBookingService;
pub use queue_service::QueueService;
pub use recycle_bin_service::RecycleBinService;
pub use reminder_service::ReminderService;
pub use scheduling_service::SchedulingService;
pub use system_log_service::SystemLogService;
pub use team_service::TeamService;
