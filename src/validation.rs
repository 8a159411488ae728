//! Input validation for the booking dialogue
//!
//! Pure functions; the caller supplies "today" and the current catalog so
//! results are deterministic.

use chrono::NaiveDate;
use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;

/// Wire and display format of booking dates
pub const DATE_FORMAT: &str = "%d/%m/%Y";

const MIN_NAME_CHARS: usize = 2;

static TIME_SLOT_SHAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]{2}:[0-9]{2}$").expect("static regex"));

/// Why a piece of user input was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum InputError {
    #[error("name must have at least {MIN_NAME_CHARS} characters")]
    NameTooShort,
    #[error("date must use the DD/MM/YYYY format")]
    MalformedDate,
    #[error("date is in the past")]
    PastDate,
    #[error("service is not offered")]
    UnknownService,
    #[error("time slot is not offered")]
    UnknownTimeSlot,
}

/// Trim a visitor's name and check its length
pub fn validate_name(input: &str) -> Result<String, InputError> {
    let name = input.trim();
    if name.chars().count() < MIN_NAME_CHARS {
        return Err(InputError::NameTooShort);
    }
    Ok(name.to_string())
}

/// Parse a `DD/MM/YYYY` date that must not be earlier than `today`
pub fn parse_booking_date(input: &str, today: NaiveDate) -> Result<NaiveDate, InputError> {
    let date = NaiveDate::parse_from_str(input.trim(), DATE_FORMAT)
        .map_err(|_| InputError::MalformedDate)?;
    if date < today {
        return Err(InputError::PastDate);
    }
    Ok(date)
}

pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Exact, case-sensitive membership check against the offered services
pub fn check_service(input: &str, services: &[String]) -> Result<String, InputError> {
    let service = input.trim();
    if services.iter().any(|s| s == service) {
        Ok(service.to_string())
    } else {
        Err(InputError::UnknownService)
    }
}

/// Membership check against the offered time slots
pub fn check_time_slot(input: &str, slots: &[String]) -> Result<String, InputError> {
    let slot = input.trim();
    if slots.iter().any(|s| s == slot) {
        Ok(slot.to_string())
    } else {
        Err(InputError::UnknownTimeSlot)
    }
}

/// `HH:MM` shape check: two digits, a colon, two digits.
///
/// Only the shape is checked; "25:99" passes.
pub fn is_time_slot_shape(input: &str) -> bool {
    TIME_SLOT_SHAPE.is_match(input)
}

/// Collapse whitespace and title-case every word ("nail  ART" -> "Nail Art")
pub fn normalize_service_name(input: &str) -> String {
    input
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
