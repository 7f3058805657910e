use anyhow::Result;
use sqlx::PgPool;

use crate::auth::AuthService;
use crate::config::AppConfig;
use crate::services::{
    DrillService, InstructorService, MetricService, NoteService, PlayerService,
    RosterImportService, SmsService,
};

/// Shared handler state; every service wraps the same pool
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub auth_service: AuthService,
    pub players: PlayerService,
    pub instructors: InstructorService,
    pub metrics: MetricService,
    pub notes: NoteService,
    pub drills: DrillService,
    pub roster_import: RosterImportService,
    pub sms: SmsService,
}

impl AppState {
    pub fn new(db: PgPool, config: &AppConfig) -> Result<Self> {
        let sms = SmsService::new(config.twilio.clone(), config.base_url.clone())?;
        if !sms.is_enabled() {
            tracing::info!("Twilio not configured; text messages will be skipped");
        }

        Ok(Self {
            auth_service: AuthService::new(db.clone(), &config.secret_key),
            players: PlayerService::new(db.clone()),
            instructors: InstructorService::new(db.clone()),
            metrics: MetricService::new(db.clone()),
            notes: NoteService::new(db.clone()),
            drills: DrillService::new(db.clone()),
            roster_import: RosterImportService::new(db.clone(), sms.clone()),
            sms,
            db,
        })
    }
}
