//! Effects produced by state transitions

use super::prompt::Prompt;
use crate::access::ParticipantId;
use crate::catalog::CatalogEdit;
use crate::notifier::Notice;
use crate::store::{NewBooking, RecordId, RecordPatch, RecordQuery};
use chrono::NaiveDate;

/// Effects to be executed after a state transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Send a new message to the participant
    Reply(Prompt),

    /// Replace the message whose button triggered this event; sends a new
    /// message when there is none or it cannot be edited
    EditMenu(Prompt),

    /// Insert a booking (-> `BookingSaved`)
    CreateBooking(NewBooking),

    /// Select records (-> `RecordsLoaded`)
    QueryRecords(RecordQuery),

    /// Re-read one record by exact id (-> `RecordFetched`)
    FetchRecord(RecordId),

    /// Resolve a typed id prefix (-> `RecordFetched`)
    FindRecordByPrefix(String),

    /// Patch one record (-> `RecordUpdated`)
    UpdateRecord {
        record_id: RecordId,
        patch: RecordPatch,
    },

    /// Delete one record (-> `RecordDeleted`)
    DeleteRecord(RecordId),

    /// Count by status and for today (-> `StatsLoaded`)
    LoadStats { today: NaiveDate },

    /// Mutate the shared catalog (-> `CatalogUpdated`)
    EditCatalog(CatalogEdit),

    /// Queue a best-effort notification
    Notify(Notice),

    /// Deliver an admin's message inline (-> `MessageForwarded`)
    ForwardMessage {
        recipient: ParticipantId,
        text: String,
    },

    /// Emit a warning log line for the session
    LogWarning(String),
}

impl Effect {
    /// Whether executing this effect yields a result event
    pub fn awaits_result(&self) -> bool {
        !matches!(
            self,
            Effect::Reply(_) | Effect::EditMenu(_) | Effect::Notify(_) | Effect::LogWarning(_)
        )
    }
}
