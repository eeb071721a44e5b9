use std::net::SocketAddr;
use std::sync::Arc;

use agenx::api::{create_routes, AppState};
use agenx::config::{run_migrations, AppConfig, DatabaseConfig, GeminiConfig, SmtpConfig};
use agenx::services::{ContentGenerator, GeminiClient, Mailer, ReminderService, SmtpMailer};
use agenx::telemetry::init_tracing;
use anyhow::Context;
use tokio::net::TcpListener;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::from_env()?;
    init_tracing(&config.log_level, config.log_format);

    let db = DatabaseConfig::from_env()?.create_pool().await?;
    run_migrations(&db).await?;

    let mailer: Option<Arc<dyn Mailer>> = match SmtpConfig::from_env() {
        Some(smtp) => Some(Arc::new(SmtpMailer::new(&smtp).context("invalid SMTP configuration")?)),
        None => {
            warn!("SMTP not configured, e-mails are disabled");
            None
        }
    };

    let gemini = GeminiConfig::from_env();
    if !gemini.is_configured() {
        warn!("GEMINI_API_KEY not set, AI endpoints will answer 503");
    }
    let generator: Arc<dyn ContentGenerator> = Arc::new(GeminiClient::new(gemini)?);

    let _scheduler = ReminderService::new(db.clone(), mailer.clone())
        .start(&config.reminder_cron)
        .await
        .context("failed to start reminder scheduler")?;

    let state = AppState::new(db, &config, generator, mailer);
    let app = create_routes(state);

    let address = config.server_address();
    let listener = TcpListener::bind(&address).await?;
    info!(environment = %config.environment, "AgenX API listening on http://{address}");
    info!("Health check available at http://{address}/health");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
