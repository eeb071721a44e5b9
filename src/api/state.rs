use std::sync::Arc;
use std::time::Duration;

use axum::extract::FromRef;
use sqlx::PgPool;

use crate::auth::{AuthService, RateLimiter};
use crate::config::AppConfig;
use crate::services::{
    AiosService, AppointmentService, AuditService, BusinessService, CatalogService, ClientService,
    ContentGenerator, DashboardService, EventHub, FinanceService, Mailer, MarketingService,
    PublicBookingService, QueueService, RecycleBinService, SchedulingService, SystemLogService,
    TeamService,
};

/// Requests per minute and address on unauthenticated write routes.
const PUBLIC_RATE_LIMIT: usize = 30;
const PUBLIC_RATE_WINDOW: Duration = Duration::from_secs(60);

/// Shared application state handed to every router.
#[derive(Clone)]
pub struct AppState {
    pub auth: AuthService,
    pub business: BusinessService,
    pub catalog: CatalogService,
    pub team: TeamService,
    pub clients: ClientService,
    pub appointments: AppointmentService,
    pub scheduling: SchedulingService,
    pub bookings: PublicBookingService,
    pub queue: QueueService,
    pub finance: FinanceService,
    pub dashboard: DashboardService,
    pub aios: AiosService,
    pub marketing: MarketingService,
    pub audit: AuditService,
    pub system_log: SystemLogService,
    pub recycle_bin: RecycleBinService,
    pub events: EventHub,
    pub rate_limiter: RateLimiter,
}

impl AppState {
    pub fn new(
        db: PgPool,
        config: &AppConfig,
        generator: Arc<dyn ContentGenerator>,
        mailer: Option<Arc<dyn Mailer>>,
    ) -> Self {
        let events = EventHub::new();

        let mut auth = AuthService::new(db.clone(), &config.jwt_secret);
        if let Some(mailer) = mailer {
            auth = auth.with_mailer(mailer, &config.public_app_url);
        }

        Self {
            auth,
            business: BusinessService::new(db.clone()),
            catalog: CatalogService::new(db.clone()),
            team: TeamService::new(db.clone()),
            clients: ClientService::new(db.clone()),
            appointments: AppointmentService::new(db.clone(), events.clone()),
            scheduling: SchedulingService::new(db.clone(), events.clone()),
            bookings: PublicBookingService::new(db.clone(), events.clone(), config.reschedule_secret.clone()),
            queue: QueueService::new(db.clone()),
            finance: FinanceService::new(db.clone()),
            dashboard: DashboardService::new(db.clone()),
            aios: AiosService::new(db.clone()),
            marketing: MarketingService::new(db.clone(), generator),
            audit: AuditService::new(db.clone()),
            system_log: SystemLogService::new(db.clone()),
            recycle_bin: RecycleBinService::new(db),
            events,
            rate_limiter: RateLimiter::new(PUBLIC_RATE_LIMIT, PUBLIC_RATE_WINDOW)
                .trusting_proxy_headers(config.trust_proxy_headers),
        }
    }
}

impl FromRef<AppState> for AuthService {
    fn from_ref(state: &AppState) -> Self {
        state.auth.clone()
    }
}

impl FromRef<AppState> for RateLimiter {
    fn from_ref(state: &AppState) -> Self {
        state.rate_limiter.clone()
    }
}

impl FromRef<AppState> for SystemLogService {
    fn from_ref(state: &AppState) -> Self {
        state.system_log.clone()
    }
}
