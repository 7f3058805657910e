use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::validation::validate_metric_values;

/// Mean change (mph) between recent and earlier swings that counts as a trend
const TREND_THRESHOLD_MPH: f64 = 1.0;
const TREND_WINDOW: usize = 3;

/// One batted-ball measurement session entry
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Metric {
    pub id: Uuid,
    pub player_id: Uuid,
    pub recorded_at: DateTime<Utc>,
    /// mph
    pub exit_velocity: Option<f64>,
    /// degrees
    pub launch_angle: Option<f64>,
    /// rpm
    pub spin_rate: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct CreateMetric {
    pub exit_velocity: Option<f64>,
    pub launch_angle: Option<f64>,
    pub spin_rate: Option<f64>,
    pub recorded_at: Option<DateTime<Utc>>,
}

impl CreateMetric {
    pub fn validate(&self) -> Result<()> {
        validate_metric_values(self.exit_velocity, self.launch_angle, self.spin_rate)
    }

    pub fn is_empty(&self) -> bool {
        self.exit_velocity.is_none() && self.launch_angle.is_none() && self.spin_rate.is_none()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Improving,
    Stable,
    Declining,
    Unknown,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ExitVelocitySummary {
    pub count: usize,
    pub latest: Option<f64>,
    pub best: Option<f64>,
    pub average: Option<f64>,
    pub trend: TrendDirection,
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

fn round_one(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Summarize exit velocity across metrics given in any order.
pub fn summarize_exit_velocity(metrics: &[Metric]) -> ExitVelocitySummary {
    let mut readings: Vec<(DateTime<Utc>, f64)> = metrics
        .iter()
        .filter_map(|m| m.exit_velocity.map(|ev| (m.recorded_at, ev)))
        .collect();
    readings.sort_by_key(|(recorded_at, _)| *recorded_at);

    let values: Vec<f64> = readings.into_iter().map(|(_, ev)| ev).collect();

    if values.is_empty() {
        return ExitVelocitySummary {
            count: 0,
            latest: None,
            best: None,
            average: None,
            trend: TrendDirection::Unknown,
        };
    }

    let best = values.iter().cloned().fold(f64::MIN, f64::max);

    ExitVelocitySummary {
        count: values.len(),
        latest: values.last().copied(),
        best: Some(best),
        average: Some(round_one(mean(&values))),
        trend: exit_velocity_trend(&values),
    }
}

/// Compare the newest readings with the ones just before them.
/// `values` must be in chronological order.
pub fn exit_velocity_trend(values: &[f64]) -> TrendDirection {
    if values.len() < 2 {
        return TrendDirection::Unknown;
    }

    let recent_len = TREND_WINDOW.min(values.len() - 1);
    let split = values.len() - recent_len;
    let recent = &values[split..];
    let earlier = &values[split.saturating_sub(TREND_WINDOW)..split];

    let change = mean(recent) - mean(earlier);
    if change > TREND_THRESHOLD_MPH {
        TrendDirection::Improving
    } else if change < -TREND_THRESHOLD_MPH {
        TrendDirection::Declining
    } else {
        TrendDirection::Stable
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use pretty_assertions::assert_eq;

    fn metric(days_ago: i64, ev: Option<f64>) -> Metric {
        Metric {
            id: Uuid::new_v4(),
            player_id: Uuid::nil(),
            recorded_at: Utc::now() - Duration::days(days_ago),
            exit_velocity: ev,
            launch_angle: None,
            spin_rate: None,
        }
    }

    #[test]
    fn test_empty_summary() {
        let summary = summarize_exit_velocity(&[metric(1, None)]);
        assert_eq!(summary.count, 0);
        assert_eq!(summary.latest, None);
        assert_eq!(summary.trend, TrendDirection::Unknown);
    }

    #[test]
    fn test_summary_uses_chronological_order() {
        // Newest first, the way the store returns them
        let metrics = vec![
            metric(0, Some(70.0)),
            metric(5, Some(66.0)),
            metric(10, Some(61.5)),
        ];

        let summary = summarize_exit_velocity(&metrics);
        assert_eq!(summary.count, 3);
        assert_eq!(summary.latest, Some(70.0));
        assert_eq!(summary.best, Some(70.0));
        assert_eq!(summary.average, Some(65.8));
        assert_eq!(summary.trend, TrendDirection::Improving);
    }

    #[test]
    fn test_single_reading_has_unknown_trend() {
        let summary = summarize_exit_velocity(&[metric(0, Some(55.0))]);
        assert_eq!(summary.count, 1);
        assert_eq!(summary.best, Some(55.0));
        assert_eq!(summary.trend, TrendDirection::Unknown);
    }

    #[test]
    fn test_trend_thresholds() {
        assert_eq!(exit_velocity_trend(&[60.0, 60.5]), TrendDirection::Stable);
        assert_eq!(exit_velocity_trend(&[60.0, 58.0]), TrendDirection::Declining);
        assert_eq!(
            exit_velocity_trend(&[50.0, 50.0, 50.0, 60.0, 60.0, 60.0, 52.0, 52.0, 52.0]),
            TrendDirection::Declining
        );
        assert_eq!(
            exit_velocity_trend(&[70.0, 70.0, 70.0, 50.0, 51.0, 50.0, 55.0, 55.0, 55.0]),
            TrendDirection::Improving
        );
    }
}
