//! Process configuration from the environment

use chrono::FixedOffset;
use std::fmt;
use thiserror::Error;

const DEFAULT_TABLE: &str = "agendamentos";
const DEFAULT_STUDIO_NAME: &str = "Studio Dandara Britto";
const DEFAULT_UTC_OFFSET_HOURS: i32 = -3;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required setting {0}")]
    Missing(&'static str),
    #[error("invalid value {value:?} for {name}")]
    Invalid { name: &'static str, value: String },
}

/// Everything the bot needs at startup
#[derive(Clone)]
pub struct BotConfig {
    pub telegram_token: String,
    pub supabase_url: String,
    pub supabase_key: String,
    pub owner_chat_id: i64,
    pub tech_admin_chat_id: i64,
    pub bookings_table: String,
    pub studio_name: String,
    pub timezone_offset_hours: i32,
}

impl BotConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any key lookup; blank values count as missing
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |name: &'static str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let required = |name: &'static str| get(name).ok_or(ConfigError::Missing(name));

        Ok(Self {
            telegram_token: required("TELEGRAM_TOKEN")?,
            supabase_url: required("SUPABASE_URL")?,
            supabase_key: required("SUPABASE_KEY")?,
            owner_chat_id: parse("OWNER_CHAT_ID", &required("OWNER_CHAT_ID")?)?,
            tech_admin_chat_id: parse("TECH_ADMIN_CHAT_ID", &required("TECH_ADMIN_CHAT_ID")?)?,
            bookings_table: get("BOOKINGS_TABLE").unwrap_or_else(|| DEFAULT_TABLE.to_string()),
            studio_name: get("STUDIO_NAME").unwrap_or_else(|| DEFAULT_STUDIO_NAME.to_string()),
            timezone_offset_hours: match get("TIMEZONE_OFFSET_HOURS") {
                Some(value) => parse("TIMEZONE_OFFSET_HOURS", &value)?,
                None => DEFAULT_UTC_OFFSET_HOURS,
            },
        })
    }

    /// Offset used to decide what "today" is
    pub fn utc_offset(&self) -> Result<FixedOffset, ConfigError> {
        self.timezone_offset_hours
            .checked_mul(3600)
            .and_then(FixedOffset::east_opt)
            .ok_or_else(|| ConfigError::Invalid {
                name: "TIMEZONE_OFFSET_HOURS",
                value: self.timezone_offset_hours.to_string(),
            })
    }
}

fn parse<T: std::str::FromStr>(name: &'static str, value: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::Invalid {
        name,
        value: value.to_string(),
    })
}

// Credentials stay out of logs
impl fmt::Debug for BotConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BotConfig")
            .field("telegram_token", &"<redacted>")
            .field("supabase_url", &self.supabase_url)
            .field("supabase_key", &"<redacted>")
            .field("owner_chat_id", &self.owner_chat_id)
            .field("tech_admin_chat_id", &self.tech_admin_chat_id)
            .field("bookings_table", &self.bookings_table)
            .field("studio_name", &self.studio_name)
            .field("timezone_offset_hours", &self.timezone_offset_hours)
            .finish()
    }
}
