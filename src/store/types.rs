//! Booking record types and the query vocabulary of the record store

use crate::access::ParticipantId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// Store-generated record identity
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct RecordId(pub String);

impl RecordId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First eight characters, enough to type back into the field editor
    pub fn short(&self) -> String {
        self.0.chars().take(8).collect()
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for RecordId {
    /// Accepts both uuid (string) and bigint (number) primary keys
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::String(s) => Ok(Self(s)),
            Value::Number(n) => Ok(Self(n.to_string())),
            other => Err(serde::de::Error::custom(format!(
                "record id must be a string or number, got {other}"
            ))),
        }
    }
}

/// Lifecycle label of a booking
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    #[default]
    Pending,
    Confirmed,
    Cancelled,
}

impl BookingStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Cancelled => "cancelled",
        }
    }

    /// Legal moves for the confirm/cancel flows
    pub fn can_become(self, next: BookingStatus) -> bool {
        matches!(
            (self, next),
            (BookingStatus::Pending, BookingStatus::Confirmed | BookingStatus::Cancelled)
                | (BookingStatus::Confirmed, BookingStatus::Cancelled)
        )
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BookingStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pending" | "pendente" => Ok(BookingStatus::Pending),
            "confirmed" | "confirmado" => Ok(BookingStatus::Confirmed),
            "cancelled" | "canceled" | "cancelado" => Ok(BookingStatus::Cancelled),
            _ => Err(()),
        }
    }
}

/// Fields sent on insert; the store fills in `id` and `created_at`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewBooking {
    #[serde(rename = "nome")]
    pub name: String,
    #[serde(rename = "servico")]
    pub service: String,
    /// `DD/MM/YYYY`
    #[serde(rename = "data")]
    pub date: String,
    /// `HH:MM`
    #[serde(rename = "horario")]
    pub time: String,
    pub status: BookingStatus,
    #[serde(rename = "chat_id")]
    pub participant: Option<ParticipantId>,
}

impl NewBooking {
    pub fn pending(
        name: impl Into<String>,
        service: impl Into<String>,
        date: impl Into<String>,
        time: impl Into<String>,
        participant: ParticipantId,
    ) -> Self {
        Self {
            name: name.into(),
            service: service.into(),
            date: date.into(),
            time: time.into(),
            status: BookingStatus::Pending,
            participant: Some(participant),
        }
    }
}

/// A booking as stored remotely
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingRecord {
    pub id: RecordId,
    #[serde(rename = "nome")]
    pub name: String,
    #[serde(rename = "servico")]
    pub service: String,
    #[serde(rename = "data")]
    pub date: String,
    #[serde(rename = "horario")]
    pub time: String,
    /// Rows written before the status column existed read as pending
    #[serde(default)]
    pub status: BookingStatus,
    #[serde(rename = "chat_id", default)]
    pub participant: Option<ParticipantId>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl BookingRecord {
    /// Value of a column rendered the way the store compares it
    #[cfg(test)]
    pub fn column_value(&self, column: Column) -> Option<String> {
        match column {
            Column::Id => Some(self.id.0.clone()),
            Column::Name => Some(self.name.clone()),
            Column::Service => Some(self.service.clone()),
            Column::Date => Some(self.date.clone()),
            Column::Time => Some(self.time.clone()),
            Column::Status => Some(self.status.as_str().to_string()),
            Column::Participant => self.participant.map(|p| p.to_string()),
            Column::CreatedAt => self.created_at.map(|t| t.to_rfc3339()),
        }
    }
}

/// Columns of the bookings table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    Id,
    Name,
    Service,
    Date,
    Time,
    Status,
    Participant,
    CreatedAt,
}

impl Column {
    pub fn as_str(self) -> &'static str {
        match self {
            Column::Id => "id",
            Column::Name => "nome",
            Column::Service => "servico",
            Column::Date => "data",
            Column::Time => "horario",
            Column::Status => "status",
            Column::Participant => "chat_id",
            Column::CreatedAt => "created_at",
        }
    }
}

/// Fields the TechAdmin editor may overwrite
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordField {
    Name,
    Service,
    Date,
    Time,
    Status,
}

impl RecordField {
    pub const ALL: [RecordField; 5] = [
        RecordField::Name,
        RecordField::Service,
        RecordField::Date,
        RecordField::Time,
        RecordField::Status,
    ];

    pub fn column(self) -> Column {
        match self {
            RecordField::Name => Column::Name,
            RecordField::Service => Column::Service,
            RecordField::Date => Column::Date,
            RecordField::Time => Column::Time,
            RecordField::Status => Column::Status,
        }
    }

    /// Short key used in button payloads
    pub fn key(self) -> &'static str {
        match self {
            RecordField::Name => "name",
            RecordField::Service => "service",
            RecordField::Date => "date",
            RecordField::Time => "time",
            RecordField::Status => "status",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|field| field.key() == key)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    Eq(Column, String),
    In(Column, Vec<String>),
    IsNull(Column),
    NotNull(Column),
}

impl Filter {
    #[cfg(test)]
    pub fn matches(&self, record: &BookingRecord) -> bool {
        match self {
            Filter::Eq(column, value) => record.column_value(*column).as_ref() == Some(value),
            Filter::In(column, values) => record
                .column_value(*column)
                .is_some_and(|v| values.contains(&v)),
            Filter::IsNull(column) => record.column_value(*column).is_none(),
            Filter::NotNull(column) => record.column_value(*column).is_some(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Order {
    pub column: Column,
    pub descending: bool,
}

/// Filter, ordering and limit for a select or count
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RecordQuery {
    pub filters: Vec<Filter>,
    pub order: Vec<Order>,
    pub limit: Option<usize>,
}

impl RecordQuery {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn eq(mut self, column: Column, value: impl Into<String>) -> Self {
        self.filters.push(Filter::Eq(column, value.into()));
        self
    }

    pub fn one_of<I, V>(mut self, column: Column, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        self.filters
            .push(Filter::In(column, values.into_iter().map(Into::into).collect()));
        self
    }

    #[allow(dead_code)] // Only the adapter tests filter on null yet
    pub fn is_null(mut self, column: Column) -> Self {
        self.filters.push(Filter::IsNull(column));
        self
    }

    pub fn not_null(mut self, column: Column) -> Self {
        self.filters.push(Filter::NotNull(column));
        self
    }

    pub fn order_by(mut self, column: Column, descending: bool) -> Self {
        self.order.push(Order { column, descending });
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    #[cfg(test)]
    pub fn matches(&self, record: &BookingRecord) -> bool {
        self.filters.iter().all(|f| f.matches(record))
    }
}

/// Change applied by an update
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordPatch {
    Status(BookingStatus),
    /// Free-form overwrite from the field editor; `Status` goes through
    /// [`RecordPatch::Status`] instead
    Field { field: RecordField, value: String },
}

impl RecordPatch {
    /// JSON body for the store, `{column: value}`
    pub fn to_json(&self) -> Value {
        let mut body = Map::new();
        match self {
            RecordPatch::Status(status) => {
                body.insert(
                    Column::Status.as_str().to_string(),
                    Value::String(status.as_str().to_string()),
                );
            }
            RecordPatch::Field { field, value } => {
                body.insert(field.column().as_str().to_string(), Value::String(value.clone()));
            }
        }
        Value::Object(body)
    }

    /// Apply the patch to a local copy
    #[cfg(test)]
    pub fn apply_to(&self, record: &mut BookingRecord) {
        match self {
            RecordPatch::Status(status) => record.status = *status,
            RecordPatch::Field { field, value } => match field {
                RecordField::Name => record.name.clone_from(value),
                RecordField::Service => record.service.clone_from(value),
                RecordField::Date => record.date.clone_from(value),
                RecordField::Time => record.time.clone_from(value),
                RecordField::Status => {
                    if let Ok(status) = value.parse() {
                        record.status = status;
                    }
                }
            },
        }
    }
}

/// Aggregate counters shown to the TechAdmin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BookingStats {
    pub pending: u64,
    pub confirmed: u64,
    pub cancelled: u64,
    /// Bookings of any status dated today
    pub today: u64,
}

impl BookingStats {
    pub fn total(&self) -> u64 {
        self.pending + self.confirmed + self.cancelled
    }
}
