use anyhow::{anyhow, Result};
use regex::Regex;
use std::sync::OnceLock;

pub const MAX_NAME_LEN: usize = 120;
pub const MIN_AGE: i32 = 5;
pub const MAX_AGE: i32 = 30;
pub const MAX_EXIT_VELOCITY: f64 = 130.0;
pub const MAX_SPIN_RATE: f64 = 5000.0;
pub const MAX_NOTE_LEN: usize = 5000;
pub const MAX_DRILL_TITLE_LEN: usize = 200;
pub const MAX_VIDEO_URL_LEN: usize = 500;
pub const MAX_IMAGE_PATH_LEN: usize = 255;
pub const MAX_SMS_LEN: usize = 480;

fn e164() -> &'static Regex {
    static E164: OnceLock<Regex> = OnceLock::new();
    E164.get_or_init(|| Regex::new(r"^\+[1-9][0-9]{7,14}$").expect("valid E.164 pattern"))
}

/// Trimmed, non-empty name of bounded length
pub fn validate_name(name: &str) -> Result<String> {
    let name = name.trim();

    if name.is_empty() {
        return Err(anyhow!("Name cannot be empty"));
    }

    if name.chars().count() > MAX_NAME_LEN {
        return Err(anyhow!("Name cannot be longer than {} characters", MAX_NAME_LEN));
    }

    Ok(name.to_string())
}

pub fn validate_age(age: i32) -> Result<()> {
    if !(MIN_AGE..=MAX_AGE).contains(&age) {
        return Err(anyhow!("Age must be between {} and {}", MIN_AGE, MAX_AGE));
    }
    Ok(())
}

/// Parse an age as typed in a form or spreadsheet cell ("12", " 12 ", "12.0")
pub fn parse_age(raw: &str) -> Result<i32> {
    let raw = raw.trim();
    let age = match raw.parse::<i32>() {
        Ok(age) => age,
        Err(_) => match raw.parse::<f64>() {
            Ok(value) if value.fract() == 0.0 && value.is_finite() => value as i32,
            _ => return Err(anyhow!("Age must be a whole number, got '{}'", raw)),
        },
    };

    validate_age(age)?;
    Ok(age)
}

/// Normalize a phone number to E.164. Ten-digit numbers are taken as North American.
pub fn normalize_phone(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    let has_plus = trimmed.starts_with('+');
    let digits: String = trimmed.chars().filter(|c| c.is_ascii_digit()).collect();

    if trimmed
        .chars()
        .any(|c| !(c.is_ascii_digit() || " -().+".contains(c)))
    {
        return Err(anyhow!("Phone number contains invalid characters"));
    }

    let candidate = if has_plus {
        format!("+{}", digits)
    } else if digits.len() == 10 {
        format!("+1{}", digits)
    } else if digits.len() == 11 && digits.starts_with('1') {
        format!("+{}", digits)
    } else {
        return Err(anyhow!("Phone number must be 10 digits or start with a country code"));
    };

    if !e164().is_match(&candidate) {
        return Err(anyhow!("Invalid phone number"));
    }

    Ok(candidate)
}

/// Empty input clears the phone number
pub fn normalize_optional_phone(raw: Option<&str>) -> Result<Option<String>> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(phone) => normalize_phone(phone).map(Some),
    }
}

pub fn validate_exit_velocity(value: f64) -> Result<()> {
    if !value.is_finite() || value <= 0.0 || value > MAX_EXIT_VELOCITY {
        return Err(anyhow!("Exit velocity must be above 0 and at most {} mph", MAX_EXIT_VELOCITY));
    }
    Ok(())
}

pub fn validate_launch_angle(value: f64) -> Result<()> {
    if !value.is_finite() || !(-90.0..=90.0).contains(&value) {
        return Err(anyhow!("Launch angle must be between -90 and 90 degrees"));
    }
    Ok(())
}

pub fn validate_spin_rate(value: f64) -> Result<()> {
    if !value.is_finite() || !(0.0..=MAX_SPIN_RATE).contains(&value) {
        return Err(anyhow!("Spin rate must be between 0 and {} rpm", MAX_SPIN_RATE));
    }
    Ok(())
}

/// At least one measurement, each within range
pub fn validate_metric_values(
    exit_velocity: Option<f64>,
    launch_angle: Option<f64>,
    spin_rate: Option<f64>,
) -> Result<()> {
    if exit_velocity.is_none() && launch_angle.is_none() && spin_rate.is_none() {
        return Err(anyhow!("At least one of exit_velocity, launch_angle or spin_rate is required"));
    }

    if let Some(ev) = exit_velocity {
        validate_exit_velocity(ev)?;
    }
    if let Some(angle) = launch_angle {
        validate_launch_angle(angle)?;
    }
    if let Some(spin) = spin_rate {
        validate_spin_rate(spin)?;
    }

    Ok(())
}

pub fn validate_note_text(text: &str) -> Result<String> {
    let text = text.trim();

    if text.is_empty() {
        return Err(anyhow!("Note text cannot be empty"));
    }

    if text.chars().count() > MAX_NOTE_LEN {
        return Err(anyhow!("Note cannot be longer than {} characters", MAX_NOTE_LEN));
    }

    Ok(text.to_string())
}

pub fn validate_drill_title(title: &str) -> Result<String> {
    let title = title.trim();

    if title.is_empty() {
        return Err(anyhow!("Drill title cannot be empty"));
    }

    if title.chars().count() > MAX_DRILL_TITLE_LEN {
        return Err(anyhow!("Drill title cannot be longer than {} characters", MAX_DRILL_TITLE_LEN));
    }

    Ok(title.to_string())
}

/// External http(s) URL or an absolute path served by the deployment
pub fn validate_video_url(url: &str) -> Result<String> {
    let url = url.trim();

    if url.len() > MAX_VIDEO_URL_LEN {
        return Err(anyhow!("Video URL cannot be longer than {} characters", MAX_VIDEO_URL_LEN));
    }

    let is_web = url.starts_with("https://") || url.starts_with("http://");
    let is_path = url.starts_with('/') && !url.starts_with("//");
    if !is_web && !is_path {
        return Err(anyhow!("Video URL must be an http(s) URL or an absolute path"));
    }

    if url.chars().any(char::is_whitespace) {
        return Err(anyhow!("Video URL cannot contain whitespace"));
    }

    Ok(url.to_string())
}

pub fn validate_image_path(path: &str) -> Result<String> {
    let path = path.trim();

    if path.len() > MAX_IMAGE_PATH_LEN {
        return Err(anyhow!("Image path cannot be longer than {} characters", MAX_IMAGE_PATH_LEN));
    }

    if path.contains("..") {
        return Err(anyhow!("Image path cannot contain '..'"));
    }

    Ok(path.to_string())
}

pub fn validate_sms_body(body: &str) -> Result<String> {
    let body = body.trim();

    if body.is_empty() {
        return Err(anyhow!("Message cannot be empty"));
    }

    if body.chars().count() > MAX_SMS_LEN {
        return Err(anyhow!("Message cannot be longer than {} characters", MAX_SMS_LEN));
    }

    Ok(body.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_validation() {
        assert_eq!(validate_name("  Casey Jones ").unwrap(), "Casey Jones");
        assert!(validate_name("").is_err());
        assert!(validate_name("   ").is_err());
        assert!(validate_name(&"x".repeat(121)).is_err());
        assert!(validate_name(&"x".repeat(120)).is_ok());
    }

    #[test]
    fn test_age_parsing() {
        assert_eq!(parse_age("12").unwrap(), 12);
        assert_eq!(parse_age(" 9 ").unwrap(), 9);
        assert_eq!(parse_age("14.0").unwrap(), 14);
        assert!(parse_age("14.5").is_err());
        assert!(parse_age("twelve").is_err());
        assert!(parse_age("").is_err());
        assert!(parse_age("4").is_err());
        assert!(parse_age("31").is_err());
    }

    #[test]
    fn test_phone_normalization() {
        assert_eq!(normalize_phone("(555) 123-4567").unwrap(), "+15551234567");
        assert_eq!(normalize_phone("1-555-123-4567").unwrap(), "+15551234567");
        assert_eq!(normalize_phone("+44 20 7946 0958").unwrap(), "+442079460958");
        assert!(normalize_phone("12345").is_err());
        assert!(normalize_phone("555-CALL-NOW").is_err());
        assert!(normalize_phone("+0123456789").is_err());
    }

    #[test]
    fn test_optional_phone() {
        assert_eq!(normalize_optional_phone(None).unwrap(), None);
        assert_eq!(normalize_optional_phone(Some("  ")).unwrap(), None);
        assert_eq!(
            normalize_optional_phone(Some("555.123.4567")).unwrap(),
            Some("+15551234567".to_string())
        );
    }

    #[test]
    fn test_metric_validation() {
        assert!(validate_metric_values(Some(72.5), None, None).is_ok());
        assert!(validate_metric_values(None, Some(-10.0), Some(2200.0)).is_ok());
        assert!(validate_metric_values(None, None, None).is_err());
        assert!(validate_metric_values(Some(0.0), None, None).is_err());
        assert!(validate_metric_values(Some(131.0), None, None).is_err());
        assert!(validate_metric_values(Some(f64::NAN), None, None).is_err());
        assert!(validate_metric_values(Some(80.0), Some(95.0), None).is_err());
        assert!(validate_metric_values(Some(80.0), None, Some(-1.0)).is_err());
    }

    #[test]
    fn test_note_and_sms_text() {
        assert_eq!(validate_note_text("  keep hands inside  ").unwrap(), "keep hands inside");
        assert!(validate_note_text(" ").is_err());
        assert!(validate_note_text(&"a".repeat(5001)).is_err());
        assert!(validate_sms_body("").is_err());
        assert!(validate_sms_body(&"a".repeat(481)).is_err());
    }

    #[test]
    fn test_drill_fields() {
        assert!(validate_drill_title("Tee work").is_ok());
        assert!(validate_drill_title("").is_err());
        assert!(validate_video_url("https://youtu.be/abc").is_ok());
        assert!(validate_video_url("/static/drills/tee.mp4").is_ok());
        assert!(validate_video_url("//evil.example.com/x").is_err());
        assert!(validate_video_url("javascript:alert(1)").is_err());
        assert!(validate_video_url("https://example.com/a b").is_err());
    }

    #[test]
    fn test_image_path() {
        assert!(validate_image_path("/static/img/casey.png").is_ok());
        assert!(validate_image_path("../../etc/passwd").is_err());
    }
}
