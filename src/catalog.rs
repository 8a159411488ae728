//! Shared catalog of offered services and time slots
//!
//! One instance per process, shared by every session. All access goes
//! through a single mutex; nothing is awaited while it is held.

use crate::validation::{is_time_slot_shape, normalize_service_name};
use std::sync::{Arc, Mutex, PoisonError};

pub const DEFAULT_SERVICES: [&str; 5] =
    ["Manicure", "Pedicure", "Alongamento", "Blindagem", "Nail Art"];

pub const DEFAULT_TIME_SLOTS: [&str; 8] = [
    "09:00", "10:00", "11:00", "13:00", "14:00", "15:00", "16:00", "17:00",
];

/// Point-in-time copy of the catalog handed to the dialogue engine
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CatalogSnapshot {
    pub services: Vec<String>,
    /// Sorted lexicographically, which is chronological for `HH:MM`
    pub time_slots: Vec<String>,
}

impl CatalogSnapshot {
    pub fn entries(&self, kind: CatalogKind) -> &[String] {
        match kind {
            CatalogKind::Service => &self.services,
            CatalogKind::TimeSlot => &self.time_slots,
        }
    }
}

/// Which catalog list an edit applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CatalogKind {
    Service,
    TimeSlot,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogEdit {
    Add { kind: CatalogKind, value: String },
    Remove { kind: CatalogKind, value: String },
}

/// Result of applying a [`CatalogEdit`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogOutcome {
    Added { kind: CatalogKind, value: String },
    Removed { kind: CatalogKind, value: String },
    /// Add of an existing entry; no-op
    AlreadyPresent { kind: CatalogKind, value: String },
    /// Remove of a missing entry; no-op
    NotPresent { kind: CatalogKind, value: String },
    /// Malformed value; nothing changed
    Rejected { kind: CatalogKind, value: String },
}

/// Process-wide mutable catalog
#[derive(Debug, Clone)]
pub struct Catalog {
    inner: Arc<Mutex<CatalogSnapshot>>,
}

impl Catalog {
    pub fn new<S, T>(services: S, time_slots: T) -> Self
    where
        S: IntoIterator,
        S::Item: Into<String>,
        T: IntoIterator,
        T::Item: Into<String>,
    {
        let mut snapshot = CatalogSnapshot::default();
        for service in services {
            let service = service.into();
            if !snapshot.services.contains(&service) {
                snapshot.services.push(service);
            }
        }
        snapshot.time_slots = time_slots.into_iter().map(Into::into).collect();
        snapshot.time_slots.sort();
        snapshot.time_slots.dedup();
        Self {
            inner: Arc::new(Mutex::new(snapshot)),
        }
    }

    pub fn snapshot(&self) -> CatalogSnapshot {
        self.lock().clone()
    }

    /// Apply an administrative edit. Takes effect for every session at once.
    pub fn apply(&self, edit: &CatalogEdit) -> CatalogOutcome {
        match edit {
            CatalogEdit::Add {
                kind: CatalogKind::Service,
                value,
            } => self.add_service(value),
            CatalogEdit::Add {
                kind: CatalogKind::TimeSlot,
                value,
            } => self.add_time_slot(value),
            CatalogEdit::Remove { kind, value } => self.remove(*kind, value),
        }
    }

    fn add_service(&self, raw: &str) -> CatalogOutcome {
        let kind = CatalogKind::Service;
        let value = normalize_service_name(raw);
        if value.is_empty() {
            return CatalogOutcome::Rejected {
                kind,
                value: raw.to_string(),
            };
        }

        let mut catalog = self.lock();
        if catalog.services.contains(&value) {
            return CatalogOutcome::AlreadyPresent { kind, value };
        }
        catalog.services.push(value.clone());
        CatalogOutcome::Added { kind, value }
    }

    fn add_time_slot(&self, raw: &str) -> CatalogOutcome {
        let kind = CatalogKind::TimeSlot;
        let value = raw.trim().to_string();
        if !is_time_slot_shape(&value) {
            return CatalogOutcome::Rejected { kind, value };
        }

        let mut catalog = self.lock();
        if catalog.time_slots.contains(&value) {
            return CatalogOutcome::AlreadyPresent { kind, value };
        }
        catalog.time_slots.push(value.clone());
        catalog.time_slots.sort();
        CatalogOutcome::Added { kind, value }
    }

    fn remove(&self, kind: CatalogKind, value: &str) -> CatalogOutcome {
        let value = value.to_string();
        let mut catalog = self.lock();
        let entries = match kind {
            CatalogKind::Service => &mut catalog.services,
            CatalogKind::TimeSlot => &mut catalog.time_slots,
        };
        match entries.iter().position(|entry| *entry == value) {
            Some(index) => {
                entries.remove(index);
                CatalogOutcome::Removed { kind, value }
            }
            None => CatalogOutcome::NotPresent { kind, value },
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CatalogSnapshot> {
        // The snapshot is always left consistent, so a poisoned lock is still usable
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new(DEFAULT_SERVICES, DEFAULT_TIME_SLOTS)
    }
}
