//! Dialogue state types
//!
//! Scratch data collected by a flow lives inside the variant that needs it,
//! so a state can only exist with its required data.

use crate::access::{AdminRole, ParticipantId, Role};
use crate::catalog::{CatalogKind, CatalogSnapshot};
use crate::store::{
    BookingStatus, Column, NewBooking, RecordField, RecordId, RecordQuery,
};
use chrono::NaiveDate;

/// Dialogue state of one participant
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DialogueState {
    /// No flow in progress
    #[default]
    Idle,

    /// Visitor menu shown, waiting for a button
    VisitorMenu,

    CollectingName,

    CollectingService {
        name: String,
    },

    CollectingDate {
        name: String,
        service: String,
    },

    CollectingTime {
        name: String,
        service: String,
        date: NaiveDate,
    },

    /// Insert in flight
    SavingBooking {
        booking: NewBooking,
    },

    AdminMenu {
        role: AdminRole,
    },

    /// Administrative effect in flight; `in_place` tells whether the result
    /// replaces the message that triggered it
    AwaitingResult {
        role: AdminRole,
        op: AdminOp,
        in_place: bool,
    },

    /// One button per candidate record
    ChoosingTarget {
        role: AdminRole,
        action: TargetAction,
    },

    /// Field editor: waiting for a typed id prefix
    CollectingTargetId {
        role: AdminRole,
    },

    CollectingFieldChoice {
        role: AdminRole,
        record_id: RecordId,
    },

    CollectingNewValue {
        role: AdminRole,
        record_id: RecordId,
        field: RecordField,
    },

    /// Waiting for a service name or time slot to add
    CollectingCatalogEntry {
        role: AdminRole,
        kind: CatalogKind,
    },

    /// One button per current catalog entry
    ChoosingCatalogRemoval {
        role: AdminRole,
        kind: CatalogKind,
    },

    ChoosingRecipient {
        role: AdminRole,
    },

    CollectingMessage {
        role: AdminRole,
        recipient: ParticipantId,
    },
}

impl DialogueState {
    /// The administrative role a state belongs to, `None` for visitor states
    pub fn admin_role(&self) -> Option<AdminRole> {
        match self {
            DialogueState::AdminMenu { role }
            | DialogueState::AwaitingResult { role, .. }
            | DialogueState::ChoosingTarget { role, .. }
            | DialogueState::CollectingTargetId { role }
            | DialogueState::CollectingFieldChoice { role, .. }
            | DialogueState::CollectingNewValue { role, .. }
            | DialogueState::CollectingCatalogEntry { role, .. }
            | DialogueState::ChoosingCatalogRemoval { role, .. }
            | DialogueState::ChoosingRecipient { role }
            | DialogueState::CollectingMessage { role, .. } => Some(*role),
            DialogueState::Idle
            | DialogueState::VisitorMenu
            | DialogueState::CollectingName
            | DialogueState::CollectingService { .. }
            | DialogueState::CollectingDate { .. }
            | DialogueState::CollectingTime { .. }
            | DialogueState::SavingBooking { .. } => None,
        }
    }

    /// States only the TechAdmin may be in
    pub fn requires_tech_admin(&self) -> bool {
        match self {
            DialogueState::CollectingTargetId { .. }
            | DialogueState::CollectingFieldChoice { .. }
            | DialogueState::CollectingNewValue { .. }
            | DialogueState::CollectingCatalogEntry { .. }
            | DialogueState::ChoosingCatalogRemoval { .. } => true,
            DialogueState::AwaitingResult { op, .. } => op.requires_tech_admin(),
            _ => false,
        }
    }

    /// Whether an effect result is pending; user input is refused meanwhile
    pub fn is_awaiting(&self) -> bool {
        matches!(
            self,
            DialogueState::SavingBooking { .. } | DialogueState::AwaitingResult { .. }
        )
    }

    /// No dialogue in progress; a fresh session behaves the same
    pub fn is_at_rest(&self) -> bool {
        matches!(
            self,
            DialogueState::Idle | DialogueState::VisitorMenu | DialogueState::AdminMenu { .. }
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            DialogueState::Idle => "idle",
            DialogueState::VisitorMenu => "visitor_menu",
            DialogueState::CollectingName => "collecting_name",
            DialogueState::CollectingService { .. } => "collecting_service",
            DialogueState::CollectingDate { .. } => "collecting_date",
            DialogueState::CollectingTime { .. } => "collecting_time",
            DialogueState::SavingBooking { .. } => "saving_booking",
            DialogueState::AdminMenu { .. } => "admin_menu",
            DialogueState::AwaitingResult { .. } => "awaiting_result",
            DialogueState::ChoosingTarget { .. } => "choosing_target",
            DialogueState::CollectingTargetId { .. } => "collecting_target_id",
            DialogueState::CollectingFieldChoice { .. } => "collecting_field_choice",
            DialogueState::CollectingNewValue { .. } => "collecting_new_value",
            DialogueState::CollectingCatalogEntry { .. } => "collecting_catalog_entry",
            DialogueState::ChoosingCatalogRemoval { .. } => "choosing_catalog_removal",
            DialogueState::ChoosingRecipient { .. } => "choosing_recipient",
            DialogueState::CollectingMessage { .. } => "collecting_message",
        }
    }
}

/// Record-targeting administrative actions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetAction {
    Confirm,
    Cancel,
    Delete,
}

impl TargetAction {
    /// Records offered as targets for this action
    pub fn target_query(self) -> RecordQuery {
        let query = match self {
            TargetAction::Confirm => {
                RecordQuery::all().eq(Column::Status, BookingStatus::Pending.as_str())
            }
            TargetAction::Cancel => RecordQuery::all().one_of(
                Column::Status,
                [
                    BookingStatus::Pending.as_str(),
                    BookingStatus::Confirmed.as_str(),
                ],
            ),
            TargetAction::Delete => RecordQuery::all(),
        };
        query
            .order_by(Column::CreatedAt, true)
            .limit(MAX_TARGETS)
    }

    /// Status a confirm/cancel moves the record to; `None` for delete
    pub fn next_status(self) -> Option<BookingStatus> {
        match self {
            TargetAction::Confirm => Some(BookingStatus::Confirmed),
            TargetAction::Cancel => Some(BookingStatus::Cancelled),
            TargetAction::Delete => None,
        }
    }

    pub fn key(self) -> &'static str {
        match self {
            TargetAction::Confirm => "confirm",
            TargetAction::Cancel => "cancel",
            TargetAction::Delete => "delete",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "confirm" => Some(TargetAction::Confirm),
            "cancel" => Some(TargetAction::Cancel),
            "delete" => Some(TargetAction::Delete),
            _ => None,
        }
    }
}

/// Upper bound on buttons in a target list
pub const MAX_TARGETS: usize = 30;

/// Upper bound on records scanned for message recipients
pub const MAX_RECIPIENT_RECORDS: usize = 30;

/// Upper bound on rows in the full listing
pub const MAX_LISTED: usize = 50;

/// Administrative operation whose result is pending
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminOp {
    ListToday,
    ListAll,
    LoadTargets(TargetAction),
    /// Re-read before a confirm/cancel to check the status move
    CheckTarget {
        action: TargetAction,
        record_id: RecordId,
    },
    ApplyTarget {
        action: TargetAction,
        record_id: RecordId,
    },
    LookupRecord {
        prefix: String,
    },
    ApplyEdit {
        record_id: RecordId,
        field: RecordField,
    },
    LoadStats,
    LoadRecipients,
    CatalogEdit,
    ForwardMessage {
        recipient: ParticipantId,
    },
}

impl AdminOp {
    pub fn requires_tech_admin(&self) -> bool {
        matches!(
            self,
            AdminOp::LookupRecord { .. }
                | AdminOp::ApplyEdit { .. }
                | AdminOp::LoadStats
                | AdminOp::CatalogEdit
        )
    }
}

/// Per-event inputs to the transition function
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub participant: ParticipantId,
    /// Resolved afresh for every event
    pub role: Role,
    pub today: NaiveDate,
    pub catalog: CatalogSnapshot,
    pub studio_name: String,
}

impl SessionContext {
    pub fn new(
        participant: ParticipantId,
        role: Role,
        today: NaiveDate,
        catalog: CatalogSnapshot,
        studio_name: impl Into<String>,
    ) -> Self {
        Self {
            participant,
            role,
            today,
            catalog,
            studio_name: studio_name.into(),
        }
    }
}
