use anyhow::anyhow;
use serde::Serialize;
use sqlx::PgPool;
use std::collections::HashMap;
use thiserror::Error;
use uuid::Uuid;

use super::metric_service::insert_metric;
use super::player_service::insert_player;
use super::sms_service::{SmsOutcome, SmsService};
use crate::models::{
    normalize_optional_phone, parse_age, validate_name, CreateMetric, NewPlayer,
};

pub const MAX_IMPORT_BYTES: usize = 2 * 1024 * 1024;
pub const MAX_IMPORT_ROWS: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Column {
    Name,
    Age,
    Phone,
    ExitVelocity,
    LaunchAngle,
    SpinRate,
}

impl Column {
    fn from_header(header: &str) -> Option<Self> {
        let normalized = header.trim().to_lowercase().replace([' ', '-'], "_");
        match normalized.as_str() {
            "name" | "player" | "player_name" => Some(Column::Name),
            "age" => Some(Column::Age),
            "phone" | "phone_number" => Some(Column::Phone),
            "exit_velocity" | "ev" => Some(Column::ExitVelocity),
            "launch_angle" => Some(Column::LaunchAngle),
            "spin_rate" => Some(Column::SpinRate),
            _ => None,
        }
    }
}

/// A rejected line of the uploaded file (1-based)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowError {
    pub line: u64,
    pub message: String,
}

/// A validated line ready to insert
#[derive(Debug, Clone, PartialEq)]
pub struct RosterRow {
    pub line: u64,
    pub player: NewPlayer,
    pub metric: Option<CreateMetric>,
}

#[derive(Debug, Default, PartialEq)]
pub struct ParsedRoster {
    pub rows: Vec<RosterRow>,
    pub errors: Vec<RowError>,
    pub blank_rows: usize,
}

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("The file is missing the required '{0}' column")]
    MissingColumn(&'static str),

    #[error("The file has more than {0} data rows")]
    TooManyRows(usize),

    #[error("The file could not be read as CSV: {0}")]
    Malformed(String),

    #[error("{message}")]
    Rejected {
        message: String,
        errors: Vec<RowError>,
    },

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<sqlx::Error> for ImportError {
    fn from(err: sqlx::Error) -> Self {
        ImportError::Internal(err.into())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ImportOptions {
    /// Reject the whole file when any row is invalid
    pub strict: bool,
    /// Text each imported player their login code
    pub notify: bool,
}

#[derive(Debug, Serialize)]
pub struct ImportedPlayer {
    pub line: u64,
    pub id: Uuid,
    pub name: String,
    pub login_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sms: Option<SmsOutcome>,
}

#[derive(Debug, Serialize)]
pub struct ImportReport {
    pub imported: Vec<ImportedPlayer>,
    pub errors: Vec<RowError>,
    pub blank_rows: usize,
}

/// Parse and validate an uploaded roster without touching the database.
pub fn parse_roster_csv(
    data: &[u8],
    instructor_id: Option<Uuid>,
) -> Result<ParsedRoster, ImportError> {
    let data = data.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(data);
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(data);

    let headers = reader
        .headers()
        .map_err(|e| ImportError::Malformed(e.to_string()))?
        .clone();

    let mut columns: HashMap<Column, usize> = HashMap::new();
    for (index, header) in headers.iter().enumerate() {
        if let Some(column) = Column::from_header(header) {
            columns.entry(column).or_insert(index);
        }
    }
    if !columns.contains_key(&Column::Name) {
        return Err(ImportError::MissingColumn("name"));
    }
    if !columns.contains_key(&Column::Age) {
        return Err(ImportError::MissingColumn("age"));
    }

    let mut parsed = ParsedRoster::default();
    let mut seen: HashMap<(String, i32), u64> = HashMap::new();
    let mut data_rows = 0usize;

    for (index, result) in reader.records().enumerate() {
        let record = match result {
            Ok(record) => record,
            Err(err) => {
                let line = err
                    .position()
                    .map(|pos| line_at(data, pos.byte()))
                    .unwrap_or(index as u64 + 2);
                parsed.errors.push(RowError {
                    line,
                    message: format!("Unreadable row: {}", err),
                });
                continue;
            }
        };

        if record.iter().all(|field| field.is_empty()) {
            parsed.blank_rows += 1;
            continue;
        }

        data_rows += 1;
        if data_rows > MAX_IMPORT_ROWS {
            return Err(ImportError::TooManyRows(MAX_IMPORT_ROWS));
        }

        let line = record
            .position()
            .map(|pos| line_at(data, pos.byte()))
            .unwrap_or(index as u64 + 2);
        let field = |column: Column| {
            columns
                .get(&column)
                .and_then(|&i| record.get(i))
                .filter(|value| !value.is_empty())
        };

        match parse_row(&field, instructor_id) {
            Ok(row) => {
                let key = (row.player.name.to_lowercase(), row.player.age);
                if let Some(first) = seen.get(&key) {
                    parsed.errors.push(RowError {
                        line,
                        message: format!("Duplicate of line {}", first),
                    });
                    continue;
                }
                seen.insert(key, line);
                parsed.rows.push(RosterRow {
                    line,
                    player: row.player,
                    metric: row.metric,
                });
            }
            Err(err) => parsed.errors.push(RowError {
                line,
                message: err.to_string(),
            }),
        }
    }

    Ok(parsed)
}

/// 1-based file line of a record. The reader reports where the previous record
/// ended, so any empty lines in between are stepped over here.
fn line_at(data: &[u8], byte: u64) -> u64 {
    let mut end = usize::try_from(byte).map_or(data.len(), |byte| byte.min(data.len()));
    while matches!(data.get(end), Some(b'\r' | b'\n')) {
        end += 1;
    }
    data[..end].iter().filter(|&&b| b == b'\n').count() as u64 + 1
}

struct ParsedRow {
    player: NewPlayer,
    metric: Option<CreateMetric>,
}

fn parse_row<'a, F>(field: &F, instructor_id: Option<Uuid>) -> anyhow::Result<ParsedRow>
where
    F: Fn(Column) -> Option<&'a str>,
{
    let name = validate_name(field(Column::Name).unwrap_or_default())?;
    let age = parse_age(field(Column::Age).ok_or_else(|| anyhow!("Age is required"))?)?;
    let phone = normalize_optional_phone(field(Column::Phone))?;

    let metric = CreateMetric {
        exit_velocity: parse_number(field(Column::ExitVelocity), "exit_velocity")?,
        launch_angle: parse_number(field(Column::LaunchAngle), "launch_angle")?,
        spin_rate: parse_number(field(Column::SpinRate), "spin_rate")?,
        recorded_at: None,
    };
    let metric = if metric.is_empty() {
        None
    } else {
        metric.validate()?;
        Some(metric)
    };

    Ok(ParsedRow {
        player: NewPlayer {
            name,
            age,
            phone,
            image_path: None,
            instructor_id,
        },
        metric,
    })
}

fn parse_number(raw: Option<&str>, column: &str) -> anyhow::Result<Option<f64>> {
    raw.map(|value| {
        value
            .parse::<f64>()
            .map_err(|_| anyhow!("{} must be a number, got '{}'", column, value))
    })
    .transpose()
}

#[derive(Debug, Clone)]
pub struct RosterImportService {
    db: PgPool,
    sms: SmsService,
}

impl RosterImportService {
    pub fn new(db: PgPool, sms: SmsService) -> Self {
        Self { db, sms }
    }

    /// Import a roster file. Nothing is written unless at least one row is valid,
    /// and in strict mode unless every row is valid. Existing players are never modified.
    pub async fn import(
        &self,
        data: &[u8],
        instructor_id: Uuid,
        options: ImportOptions,
    ) -> Result<ImportReport, ImportError> {
        let parsed = parse_roster_csv(data, Some(instructor_id))?;

        if options.strict && !parsed.errors.is_empty() {
            return Err(ImportError::Rejected {
                message: format!("{} invalid row(s); nothing was imported", parsed.errors.len()),
                errors: parsed.errors,
            });
        }
        if parsed.rows.is_empty() {
            return Err(ImportError::Rejected {
                message: "The file has no valid rows".to_string(),
                errors: parsed.errors,
            });
        }

        let mut tx = self.db.begin().await?;
        let mut imported = Vec::with_capacity(parsed.rows.len());
        let mut phones = Vec::with_capacity(parsed.rows.len());

        for row in &parsed.rows {
            let player = insert_player(&mut tx, &row.player).await?;
            if let Some(metric) = &row.metric {
                insert_metric(&mut tx, player.id, metric).await?;
            }

            phones.push(player.phone.clone());
            imported.push(ImportedPlayer {
                line: row.line,
                id: player.id,
                name: player.name,
                login_code: player.login_code,
                sms: None,
            });
        }

        tx.commit().await?;

        tracing::info!(
            instructor_id = %instructor_id,
            imported = imported.len(),
            rejected = parsed.errors.len(),
            "roster import committed"
        );

        if options.notify {
            let messages = imported
                .iter()
                .zip(phones)
                .map(|(player, phone)| {
                    (phone, self.sms.login_code_message(&player.name, &player.login_code))
                })
                .collect();
            let outcomes = self.sms.send_batch(messages).await;
            for (player, outcome) in imported.iter_mut().zip(outcomes) {
                player.sms = Some(outcome);
            }
        }

        Ok(ImportReport {
            imported,
            errors: parsed.errors,
            blank_rows: parsed.blank_rows,
        })
    }
}
