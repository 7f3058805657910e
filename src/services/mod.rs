// Business logic services

pub mod drill_service;
pub mod instructor_service;
pub mod metric_service;
pub mod note_service;
pub mod player_service;
pub mod roster_import_service;
pub mod sms_service;

pub use drill_service::DrillService;
pub use instructor_service::InstructorService;
pub use metric_service::MetricService;
pub use note_service::NoteService;
pub use player_service::PlayerService;
pub use roster_import_service::{
    ImportError, ImportOptions, ImportReport, RosterImportService, RowError, MAX_IMPORT_BYTES,
};
pub use sms_service::{SmsOutcome, SmsService};
