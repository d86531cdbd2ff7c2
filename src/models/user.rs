use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Smallest accepted refresh interval, in minutes.
pub const MIN_TIME_INTERVAL: u32 = 1;
/// Largest accepted refresh interval, in minutes.
pub const MAX_TIME_INTERVAL: u32 = 60;

/// Row of the flat-file `users` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub username: String,
    /// Argon2 PHC string.
    pub password: String,
    pub time_interval: u32,
    pub country: String,
}

impl UserRecord {
    pub fn period(&self) -> std::time::Duration {
        std::time::Duration::from_secs(u64::from(self.time_interval) * 60)
    }
}

/// Registration request body.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    pub username: String,
    pub password: String,
    pub time_interval: u32,
    pub country: String,
}

impl NewUser {
    /// Check every field; the username and country are also normalized.
    pub fn validate(&mut self) -> Result<(), String> {
        self.username = self.username.trim().to_lowercase();
        validate_username(&self.username)?;

        if self.password.is_empty() {
            return Err("Password not provided.".to_string());
        }

        self.country = normalize_country(&self.country)?;
        validate_time_interval(self.time_interval)
    }
}

fn username_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[a-z][a-z0-9]*$").expect("static regex"))
}

fn validate_username(username: &str) -> Result<(), String> {
    if username.is_empty() {
        return Err("Username not provided.".to_string());
    }
    if !username.starts_with(|c: char| c.is_ascii_alphabetic()) {
        return Err("Username must start with a letter.".to_string());
    }
    if !username_pattern().is_match(username) {
        return Err("Username must only contain alphanumeric characters.".to_string());
    }
    Ok(())
}

pub fn validate_time_interval(minutes: u32) -> Result<(), String> {
    if !(MIN_TIME_INTERVAL..=MAX_TIME_INTERVAL).contains(&minutes) {
        return Err(format!(
            "Time interval should be between {}-{}!",
            MIN_TIME_INTERVAL, MAX_TIME_INTERVAL
        ));
    }
    Ok(())
}

/// Two-letter region code, returned uppercase.
pub fn normalize_country(country: &str) -> Result<String, String> {
    let country = country.trim();
    if country.is_empty() {
        return Err("Country not provided.".to_string());
    }
    if country.len() != 2 || !country.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(format!("Invalid country code: {}", country));
    }
    Ok(country.to_ascii_uppercase())
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// User as returned to the client. The token is only set on login.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub username: String,
    pub time_interval: u32,
    pub country: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl UserResponse {
    pub fn from_record(record: &UserRecord, token: Option<String>) -> Self {
        Self {
            username: record.username.clone(),
            time_interval: record.time_interval,
            country: record.country.clone(),
            token,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeIntervalParams {
    pub time_interval: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CountryParams {
    pub country: String,
}
