//! Mock implementations for testing
//!
//! These mocks enable integration testing without real I/O.

use super::executor::SessionRuntime;
use super::traits::*;
use super::{Inbound, RuntimeSettings, Shared};
use crate::access::{AccessControl, ParticipantId};
use crate::catalog::Catalog;
use crate::notifier::{Notice, NotifierHandle};
use crate::state_machine::{Button, Command, DialogueState, Event, Prompt};
use crate::store::{
    BookingRecord, BookingStore, NewBooking, RecordId, RecordPatch, RecordQuery, StoreError,
};
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use std::cmp::Ordering as CmpOrdering;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

// ============================================================================
// In-memory record store
// ============================================================================

/// Record store backed by a vector, with switchable failure
pub struct MemoryStore {
    records: Mutex<Vec<BookingRecord>>,
    failing: AtomicBool,
    clock: AtomicI64,
}

/// Base timestamp for generated `created_at` values
const EPOCH: i64 = 1_767_225_600;

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            failing: AtomicBool::new(false),
            clock: AtomicI64::new(0),
        }
    }

    pub fn with_records(records: Vec<BookingRecord>) -> Self {
        let store = Self::new();
        for mut record in records {
            if record.created_at.is_none() {
                record.created_at = Some(store.tick());
            }
            store.records.lock().unwrap().push(record);
        }
        store
    }

    pub fn records(&self) -> Vec<BookingRecord> {
        self.records.lock().unwrap().clone()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Delete behind the bot's back
    pub fn remove(&self, id: &RecordId) {
        self.records.lock().unwrap().retain(|r| r.id != *id);
    }

    fn tick(&self) -> DateTime<Utc> {
        let n = self.clock.fetch_add(1, Ordering::SeqCst);
        DateTime::from_timestamp(EPOCH + n, 0).unwrap()
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            Err(StoreError::Status {
                status: 503,
                body: "memory store switched off".to_string(),
            })
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl BookingStore for MemoryStore {
    async fn insert(&self, booking: &NewBooking) -> Result<BookingRecord, StoreError> {
        self.check()?;
        let record = BookingRecord {
            id: RecordId::new(uuid::Uuid::new_v4().to_string()),
            name: booking.name.clone(),
            service: booking.service.clone(),
            date: booking.date.clone(),
            time: booking.time.clone(),
            status: booking.status,
            participant: booking.participant,
            created_at: Some(self.tick()),
        };
        self.records.lock().unwrap().push(record.clone());
        Ok(record)
    }

    async fn query(&self, query: &RecordQuery) -> Result<Vec<BookingRecord>, StoreError> {
        self.check()?;
        let mut matching: Vec<BookingRecord> = self
            .records
            .lock()
            .unwrap()
            .iter()
            .filter(|r| query.matches(r))
            .cloned()
            .collect();
        matching.sort_by(|a, b| {
            for order in &query.order {
                let ord = a.column_value(order.column).cmp(&b.column_value(order.column));
                let ord = if order.descending { ord.reverse() } else { ord };
                if ord != CmpOrdering::Equal {
                    return ord;
                }
            }
            CmpOrdering::Equal
        });
        if let Some(limit) = query.limit {
            matching.truncate(limit);
        }
        Ok(matching)
    }

    async fn update(
        &self,
        id: &RecordId,
        patch: &RecordPatch,
    ) -> Result<Option<BookingRecord>, StoreError> {
        self.check()?;
        let mut records = self.records.lock().unwrap();
        Ok(records.iter_mut().find(|r| r.id == *id).map(|record| {
            patch.apply_to(record);
            record.clone()
        }))
    }

    async fn delete(&self, id: &RecordId) -> Result<bool, StoreError> {
        self.check()?;
        let mut records = self.records.lock().unwrap();
        let before = records.len();
        records.retain(|r| r.id != *id);
        Ok(records.len() != before)
    }

    async fn count(&self, query: &RecordQuery) -> Result<u64, StoreError> {
        self.check()?;
        let records = self.records.lock().unwrap();
        Ok(records.iter().filter(|r| query.matches(r)).count() as u64)
    }
}

// ============================================================================
// Recording chat outlet
// ============================================================================

#[derive(Debug, Clone)]
struct Delivery {
    to: ParticipantId,
    prompt: Prompt,
    /// Set for in-place edits
    edited: Option<MessageRef>,
}

/// Outlet that records every successful delivery
pub struct RecordingOutlet {
    log: Mutex<Vec<Delivery>>,
    unreachable: Mutex<HashSet<ParticipantId>>,
    unchanged: AtomicBool,
    next_message: AtomicI32,
}

impl RecordingOutlet {
    pub fn new() -> Self {
        Self {
            log: Mutex::new(Vec::new()),
            unreachable: Mutex::new(HashSet::new()),
            unchanged: AtomicBool::new(false),
            next_message: AtomicI32::new(1),
        }
    }

    /// New messages, in order
    pub fn sent(&self) -> Vec<(ParticipantId, Prompt)> {
        self.log
            .lock()
            .unwrap()
            .iter()
            .filter(|d| d.edited.is_none())
            .map(|d| (d.to, d.prompt.clone()))
            .collect()
    }

    /// Successful in-place edits, in order
    pub fn edits(&self) -> Vec<(ParticipantId, MessageRef, Prompt)> {
        self.log
            .lock()
            .unwrap()
            .iter()
            .filter_map(|d| d.edited.map(|m| (d.to, m, d.prompt.clone())))
            .collect()
    }

    /// Everything a participant has been shown, sends and edits alike
    pub fn prompts_to(&self, participant: ParticipantId) -> Vec<Prompt> {
        self.log
            .lock()
            .unwrap()
            .iter()
            .filter(|d| d.to == participant)
            .map(|d| d.prompt.clone())
            .collect()
    }

    /// Make deliveries to a participant fail as if they blocked the bot
    pub fn fail_for(&self, participant: ParticipantId) {
        self.unreachable.lock().unwrap().insert(participant);
    }

    /// Make every edit report unchanged content
    pub fn report_unchanged(&self, unchanged: bool) {
        self.unchanged.store(unchanged, Ordering::SeqCst);
    }
}

#[async_trait]
impl ChatOutlet for RecordingOutlet {
    async fn send(&self, to: ParticipantId, prompt: &Prompt) -> Result<MessageRef, DeliveryError> {
        if self.unreachable.lock().unwrap().contains(&to) {
            return Err(DeliveryError::Unreachable("bot was blocked by the user".to_string()));
        }
        self.log.lock().unwrap().push(Delivery {
            to,
            prompt: prompt.clone(),
            edited: None,
        });
        Ok(MessageRef(self.next_message.fetch_add(1, Ordering::SeqCst)))
    }

    async fn edit(
        &self,
        to: ParticipantId,
        message: MessageRef,
        prompt: &Prompt,
    ) -> Result<(), DeliveryError> {
        if self.unchanged.load(Ordering::SeqCst) {
            return Err(DeliveryError::Unchanged);
        }
        if self.unreachable.lock().unwrap().contains(&to) {
            return Err(DeliveryError::Unreachable("bot was blocked by the user".to_string()));
        }
        self.log.lock().unwrap().push(Delivery {
            to,
            prompt: prompt.clone(),
            edited: Some(message),
        });
        Ok(())
    }
}

// ============================================================================
// Test harness
// ============================================================================

pub const OWNER: ParticipantId = ParticipantId(100);
pub const TECH: ParticipantId = ParticipantId(200);
pub const VISITOR: ParticipantId = ParticipantId(300);

type TestShared = Shared<Arc<MemoryStore>, Arc<RecordingOutlet>>;

/// Drives session runtimes directly, one per participant, without workers
pub struct TestHarness {
    pub store: Arc<MemoryStore>,
    pub outlet: Arc<RecordingOutlet>,
    pub catalog: Catalog,
    shared: Arc<TestShared>,
    notices: mpsc::Receiver<Notice>,
    sessions: HashMap<ParticipantId, SessionRuntime<Arc<MemoryStore>, Arc<RecordingOutlet>>>,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_store(MemoryStore::new())
    }

    pub fn with_store(store: MemoryStore) -> Self {
        let (shared, notices) = test_shared(store);
        Self {
            store: Arc::clone(&shared.store),
            outlet: Arc::clone(&shared.outlet),
            catalog: shared.catalog.clone(),
            shared: Arc::new(shared),
            notices,
            sessions: HashMap::new(),
        }
    }

    pub fn today(&self) -> NaiveDate {
        self.shared.settings.today()
    }

    pub async fn send(&mut self, participant: ParticipantId, event: Event, origin: Option<MessageRef>) {
        let shared = Arc::clone(&self.shared);
        let runtime = self
            .sessions
            .entry(participant)
            .or_insert_with(|| SessionRuntime::new(participant, shared));
        runtime.handle(Inbound::new(participant, event, origin)).await;
    }

    pub async fn command(&mut self, participant: ParticipantId, command: Command) {
        self.send(participant, Event::Command(command), None).await;
    }

    pub async fn text(&mut self, participant: ParticipantId, text: &str) {
        self.send(participant, Event::Text(text.to_string()), None).await;
    }

    /// Press a button on an earlier message
    pub async fn press(&mut self, participant: ParticipantId, button: Button) {
        self.send(participant, Event::Button(button), Some(MessageRef(1))).await;
    }

    pub fn state(&self, participant: ParticipantId) -> DialogueState {
        self.sessions
            .get(&participant)
            .map(|runtime| runtime.state().clone())
            .unwrap_or_default()
    }

    /// Last prompt shown to a participant
    pub fn last_prompt(&self, participant: ParticipantId) -> Prompt {
        self.outlet
            .prompts_to(participant)
            .pop()
            .expect("participant was shown nothing")
    }

    /// Drain queued notices
    pub fn notices(&mut self) -> Vec<Notice> {
        let mut notices = Vec::new();
        while let Ok(notice) = self.notices.try_recv() {
            notices.push(notice);
        }
        notices
    }
}

fn test_shared(store: MemoryStore) -> (TestShared, mpsc::Receiver<Notice>) {
    let (notifier, notices) = NotifierHandle::channel(64);
    let shared = Shared {
        store: Arc::new(store),
        outlet: Arc::new(RecordingOutlet::new()),
        access: AccessControl::new(OWNER, TECH),
        catalog: Catalog::default(),
        notifier,
        settings: RuntimeSettings {
            studio_name: "Studio Dandara Britto".to_string(),
            utc_offset: FixedOffset::west_opt(3 * 3600).unwrap(),
            session_idle: Duration::from_secs(3600),
        },
    };
    (shared, notices)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CatalogKind;
    use crate::notifier::NoticeTarget;
    use crate::state_machine::event::AdminAction;
    use crate::state_machine::prompt;
    use crate::state_machine::state::TargetAction;
    use crate::store::{BookingStatus, RecordField};
    use crate::validation::format_date;
    use chrono::Days;

    fn record(id: &str, name: &str, date: &str, status: BookingStatus) -> BookingRecord {
        BookingRecord {
            id: RecordId::new(id),
            name: name.to_string(),
            service: "Manicure".to_string(),
            date: date.to_string(),
            time: "10:00".to_string(),
            status,
            participant: Some(VISITOR),
            created_at: None,
        }
    }

    fn in_days(h: &TestHarness, days: u64) -> String {
        format_date(h.today().checked_add_days(Days::new(days)).unwrap())
    }

    /// Walk a visitor up to the time question
    async fn visitor_until_time(h: &mut TestHarness, service: &str) {
        h.command(VISITOR, Command::Start).await;
        h.press(VISITOR, Button::Book).await;
        h.text(VISITOR, "Ana Lima").await;
        h.text(VISITOR, service).await;
        let date = in_days(h, 2);
        h.text(VISITOR, &date).await;
        assert!(matches!(h.state(VISITOR), DialogueState::CollectingTime { .. }));
    }

    #[tokio::test]
    async fn test_past_date_is_rejected_in_place() {
        let mut h = TestHarness::new();
        h.command(VISITOR, Command::Start).await;
        h.press(VISITOR, Button::Book).await;
        h.text(VISITOR, "Ana Lima").await;
        h.text(VISITOR, "Manicure").await;

        let yesterday = format_date(h.today().checked_sub_days(Days::new(1)).unwrap());
        h.text(VISITOR, &yesterday).await;

        assert!(matches!(h.state(VISITOR), DialogueState::CollectingDate { .. }));
        assert_eq!(h.last_prompt(VISITOR), prompt::date_rejected(h.today()));
        assert!(h.store.records().is_empty());
    }

    #[tokio::test]
    async fn test_booking_creates_one_pending_record_and_alerts_owner() {
        let mut h = TestHarness::new();
        visitor_until_time(&mut h, "Manicure").await;
        h.text(VISITOR, "10:00").await;

        let records = h.store.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "Ana Lima");
        assert_eq!(records[0].service, "Manicure");
        assert_eq!(records[0].date, in_days(&h, 2));
        assert_eq!(records[0].time, "10:00");
        assert_eq!(records[0].status, BookingStatus::Pending);
        assert_eq!(records[0].participant, Some(VISITOR));

        assert_eq!(h.state(VISITOR), DialogueState::Idle);
        assert!(h.last_prompt(VISITOR).text.contains("Agendamento recebido"));

        let notices = h.notices();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].target, NoticeTarget::Owner);
        assert!(notices[0].prompt.text.contains("Ana Lima"));
    }

    #[tokio::test]
    async fn test_store_failure_reports_and_resets() {
        let mut h = TestHarness::new();
        visitor_until_time(&mut h, "Pedicure").await;
        h.store.set_failing(true);
        h.text(VISITOR, "09:00").await;

        assert_eq!(h.state(VISITOR), DialogueState::Idle);
        assert_eq!(h.last_prompt(VISITOR), prompt::booking_failed());
        assert!(h.notices().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_service_accepted_after_tech_admin_adds_it() {
        let mut h = TestHarness::new();
        h.command(VISITOR, Command::Start).await;
        h.press(VISITOR, Button::Book).await;
        h.text(VISITOR, "Ana Lima").await;
        h.text(VISITOR, "Spa Dos Pés").await;
        assert!(matches!(h.state(VISITOR), DialogueState::CollectingService { .. }));

        h.command(TECH, Command::Admin).await;
        h.press(TECH, Button::Admin(AdminAction::AddService)).await;
        assert!(matches!(
            h.state(TECH),
            DialogueState::CollectingCatalogEntry {
                kind: CatalogKind::Service,
                ..
            }
        ));
        h.text(TECH, "spa  dos pés").await;
        assert!(matches!(h.state(TECH), DialogueState::AdminMenu { .. }));
        assert!(h.catalog.snapshot().services.contains(&"Spa Dos Pés".to_string()));

        h.text(VISITOR, "Spa Dos Pés").await;
        assert!(matches!(h.state(VISITOR), DialogueState::CollectingDate { .. }));
    }

    #[tokio::test]
    async fn test_added_slot_sorts_into_place_and_is_bookable() {
        let mut h = TestHarness::new();
        h.command(TECH, Command::Admin).await;
        h.press(TECH, Button::Admin(AdminAction::AddTimeSlot)).await;
        h.text(TECH, "12:00").await;

        let slots = h.catalog.snapshot().time_slots;
        let position = slots.iter().position(|s| s == "12:00").unwrap();
        assert_eq!(slots[position - 1], "11:00");
        assert_eq!(slots[position + 1], "13:00");

        visitor_until_time(&mut h, "Manicure").await;
        h.text(VISITOR, "12:00").await;
        assert_eq!(h.store.records()[0].time, "12:00");
    }

    #[tokio::test]
    async fn test_malformed_slot_is_rejected() {
        let mut h = TestHarness::new();
        let before = h.catalog.snapshot();
        h.command(TECH, Command::Admin).await;
        h.press(TECH, Button::Admin(AdminAction::AddTimeSlot)).await;
        h.text(TECH, "meio-dia").await;

        assert_eq!(h.catalog.snapshot(), before);
        assert!(h.last_prompt(TECH).text.contains("inválido"));
    }

    #[tokio::test]
    async fn test_removed_slot_rejected_mid_booking() {
        let mut h = TestHarness::new();
        visitor_until_time(&mut h, "Manicure").await;

        h.command(TECH, Command::Admin).await;
        h.press(TECH, Button::Admin(AdminAction::RemoveTimeSlot)).await;
        h.press(
            TECH,
            Button::RemoveEntry {
                kind: CatalogKind::TimeSlot,
                value: "10:00".to_string(),
            },
        )
        .await;
        assert!(!h.catalog.snapshot().time_slots.contains(&"10:00".to_string()));

        h.text(VISITOR, "10:00").await;
        assert!(matches!(h.state(VISITOR), DialogueState::CollectingTime { .. }));
        assert_eq!(
            h.last_prompt(VISITOR),
            prompt::time_rejected(&h.catalog.snapshot().time_slots)
        );

        h.text(VISITOR, "11:00").await;
        assert_eq!(h.store.records().len(), 1);
    }

    #[tokio::test]
    async fn test_cancel_from_admin_substate_returns_to_menu() {
        let mut h = TestHarness::new();
        h.command(TECH, Command::Admin).await;
        h.press(TECH, Button::Admin(AdminAction::EditField)).await;
        assert!(matches!(h.state(TECH), DialogueState::CollectingTargetId { .. }));

        h.command(TECH, Command::Cancel).await;
        assert!(matches!(h.state(TECH), DialogueState::AdminMenu { .. }));
        assert!(h.last_prompt(TECH).text.contains("Operação cancelada"));
    }

    #[tokio::test]
    async fn test_confirm_notifies_visitor() {
        let mut h = TestHarness::with_store(MemoryStore::with_records(vec![record(
            "a1b2c3d4-0000",
            "Ana Lima",
            "20/03/2026",
            BookingStatus::Pending,
        )]));

        h.command(OWNER, Command::Admin).await;
        h.press(OWNER, Button::Admin(AdminAction::Confirm)).await;
        assert!(matches!(h.state(OWNER), DialogueState::ChoosingTarget { .. }));

        h.press(
            OWNER,
            Button::Target {
                action: TargetAction::Confirm,
                record_id: RecordId::new("a1b2c3d4-0000"),
            },
        )
        .await;

        assert_eq!(h.store.records()[0].status, BookingStatus::Confirmed);
        assert!(matches!(h.state(OWNER), DialogueState::AdminMenu { .. }));
        assert!(h.last_prompt(OWNER).text.contains("Agendamento confirmado"));

        let notices = h.notices();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].target, NoticeTarget::Participant(VISITOR));
    }

    #[tokio::test]
    async fn test_confirm_of_deleted_record_reports_not_found() {
        let mut h = TestHarness::with_store(MemoryStore::with_records(vec![record(
            "deadbeef-1",
            "Bia",
            "20/03/2026",
            BookingStatus::Pending,
        )]));

        h.command(OWNER, Command::Admin).await;
        h.press(OWNER, Button::Admin(AdminAction::Confirm)).await;
        h.store.remove(&RecordId::new("deadbeef-1"));
        h.press(
            OWNER,
            Button::Target {
                action: TargetAction::Confirm,
                record_id: RecordId::new("deadbeef-1"),
            },
        )
        .await;

        assert!(matches!(h.state(OWNER), DialogueState::AdminMenu { .. }));
        assert!(h.last_prompt(OWNER).text.contains("não encontrado"));
        assert!(h.notices().is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_record_cannot_be_confirmed() {
        let mut h = TestHarness::with_store(MemoryStore::with_records(vec![record(
            "cafe0001",
            "Bia",
            "20/03/2026",
            BookingStatus::Cancelled,
        )]));

        h.command(OWNER, Command::Admin).await;
        h.press(
            OWNER,
            Button::Target {
                action: TargetAction::Confirm,
                record_id: RecordId::new("cafe0001"),
            },
        )
        .await;

        assert_eq!(h.store.records()[0].status, BookingStatus::Cancelled);
        assert!(h.last_prompt(OWNER).text.contains("não pode ser marcado"));
    }

    #[tokio::test]
    async fn test_delete_removes_record() {
        let mut h = TestHarness::with_store(MemoryStore::with_records(vec![record(
            "0badf00d",
            "Bia",
            "20/03/2026",
            BookingStatus::Confirmed,
        )]));

        h.command(OWNER, Command::Admin).await;
        h.press(OWNER, Button::Admin(AdminAction::Delete)).await;
        h.press(
            OWNER,
            Button::Target {
                action: TargetAction::Delete,
                record_id: RecordId::new("0badf00d"),
            },
        )
        .await;

        assert!(h.store.records().is_empty());
        assert!(h.last_prompt(OWNER).text.contains("excluído"));
    }

    #[tokio::test]
    async fn test_list_today_shows_only_today() {
        let h0 = TestHarness::new();
        let today = format_date(h0.today());
        let later = in_days(&h0, 5);
        let mut h = TestHarness::with_store(MemoryStore::with_records(vec![
            record("11111111", "Hoje Cliente", &today, BookingStatus::Pending),
            record("22222222", "Outra Cliente", &later, BookingStatus::Pending),
        ]));

        h.command(OWNER, Command::Admin).await;
        h.press(OWNER, Button::Admin(AdminAction::ListToday)).await;

        let (_, _, listing) = h.outlet.edits().pop().unwrap();
        assert!(listing.text.contains("Hoje Cliente"));
        assert!(!listing.text.contains("Outra Cliente"));
        assert!(matches!(h.state(OWNER), DialogueState::AdminMenu { .. }));
    }

    #[tokio::test]
    async fn test_unchanged_edit_falls_back_to_send() {
        let mut h = TestHarness::new();
        h.outlet.report_unchanged(true);
        h.command(OWNER, Command::Admin).await;
        h.press(OWNER, Button::Admin(AdminAction::ListAll)).await;

        assert!(h.outlet.edits().is_empty());
        assert!(h
            .outlet
            .sent()
            .iter()
            .any(|(to, p)| *to == OWNER && p.text.contains(prompt::ALL_TITLE)));
    }

    #[tokio::test]
    async fn test_admin_store_failure_returns_to_menu() {
        let mut h = TestHarness::new();
        h.store.set_failing(true);
        h.command(OWNER, Command::Admin).await;
        h.press(OWNER, Button::Admin(AdminAction::ListAll)).await;

        assert!(matches!(h.state(OWNER), DialogueState::AdminMenu { .. }));
        assert!(h.last_prompt(OWNER).text.contains(prompt::store_failure_line()));
    }

    #[tokio::test]
    async fn test_forward_message_escapes_and_delivers() {
        let mut h = TestHarness::with_store(MemoryStore::with_records(vec![record(
            "12345678",
            "Ana Lima",
            "20/03/2026",
            BookingStatus::Pending,
        )]));

        h.command(OWNER, Command::Admin).await;
        h.press(OWNER, Button::Admin(AdminAction::Message)).await;
        assert!(matches!(h.state(OWNER), DialogueState::ChoosingRecipient { .. }));
        h.press(OWNER, Button::Recipient(VISITOR)).await;
        h.text(OWNER, "<b>Oi</b> & até logo").await;

        assert_eq!(
            h.last_prompt(VISITOR).text,
            "&lt;b&gt;Oi&lt;/b&gt; &amp; até logo"
        );
        assert!(h.last_prompt(OWNER).text.contains(prompt::forward_result(true)));
    }

    #[tokio::test]
    async fn test_failed_forward_is_reported() {
        let mut h = TestHarness::with_store(MemoryStore::with_records(vec![record(
            "12345678",
            "Ana Lima",
            "20/03/2026",
            BookingStatus::Pending,
        )]));
        h.outlet.fail_for(VISITOR);

        h.command(OWNER, Command::Admin).await;
        h.press(OWNER, Button::Admin(AdminAction::Message)).await;
        h.press(OWNER, Button::Recipient(VISITOR)).await;
        h.text(OWNER, "Olá").await;

        assert!(matches!(h.state(OWNER), DialogueState::AdminMenu { .. }));
        assert!(h.last_prompt(OWNER).text.contains(prompt::forward_result(false)));
    }

    #[tokio::test]
    async fn test_field_edit_by_id_prefix() {
        let mut h = TestHarness::with_store(MemoryStore::with_records(vec![record(
            "abcdef12-3456",
            "Ana Lima",
            "20/03/2026",
            BookingStatus::Pending,
        )]));

        h.command(TECH, Command::Admin).await;
        h.press(TECH, Button::Admin(AdminAction::EditField)).await;
        h.text(TECH, "ABCD").await;
        assert!(matches!(
            h.state(TECH),
            DialogueState::CollectingFieldChoice { .. }
        ));

        h.press(TECH, Button::Field(RecordField::Time)).await;
        h.text(TECH, "15:00").await;

        assert_eq!(h.store.records()[0].time, "15:00");
        assert!(matches!(h.state(TECH), DialogueState::AdminMenu { .. }));
    }

    #[tokio::test]
    async fn test_unknown_prefix_asks_again() {
        let mut h = TestHarness::new();
        h.command(TECH, Command::Admin).await;
        h.press(TECH, Button::Admin(AdminAction::EditField)).await;
        h.text(TECH, "zzzz").await;

        assert!(matches!(h.state(TECH), DialogueState::CollectingTargetId { .. }));
        assert_eq!(h.last_prompt(TECH), prompt::record_id_not_found("zzzz"));
    }

    #[tokio::test]
    async fn test_stats_counts_by_status() {
        let mut h = TestHarness::with_store(MemoryStore::with_records(vec![
            record("1", "A", "20/03/2026", BookingStatus::Pending),
            record("2", "B", "20/03/2026", BookingStatus::Pending),
            record("3", "C", "20/03/2026", BookingStatus::Cancelled),
        ]));

        h.command(TECH, Command::Admin).await;
        h.press(TECH, Button::Admin(AdminAction::Stats)).await;

        let text = h.last_prompt(TECH).text;
        assert!(text.contains("Pendentes: 2"));
        assert!(text.contains("Cancelados: 1"));
        assert!(text.contains("Total: 3"));
    }

    #[tokio::test]
    async fn test_visitor_admin_command_denied() {
        let mut h = TestHarness::new();
        h.command(VISITOR, Command::Admin).await;

        assert_eq!(h.state(VISITOR), DialogueState::Idle);
        assert_eq!(h.last_prompt(VISITOR), prompt::access_denied());
    }

    #[tokio::test]
    async fn test_owner_cannot_use_tech_actions() {
        let mut h = TestHarness::new();
        h.command(OWNER, Command::Admin).await;
        h.press(OWNER, Button::Admin(AdminAction::Stats)).await;

        assert_eq!(h.state(OWNER), DialogueState::Idle);
        assert_eq!(h.last_prompt(OWNER), prompt::access_denied());
    }

    #[tokio::test]
    async fn test_unexpected_text_is_not_understood() {
        let mut h = TestHarness::new();
        h.text(VISITOR, "oi").await;

        assert_eq!(h.state(VISITOR), DialogueState::Idle);
        assert_eq!(h.last_prompt(VISITOR), prompt::not_understood());
    }

    #[tokio::test]
    async fn test_sessions_are_independent() {
        let mut h = TestHarness::new();
        h.command(VISITOR, Command::Start).await;
        h.press(VISITOR, Button::Book).await;
        h.command(OWNER, Command::Admin).await;

        assert_eq!(h.state(VISITOR), DialogueState::CollectingName);
        assert!(matches!(h.state(OWNER), DialogueState::AdminMenu { .. }));
    }

    #[tokio::test]
    async fn test_manager_dispatches_to_workers() {
        let (shared, _notices) = test_shared(MemoryStore::new());
        let outlet = Arc::clone(&shared.outlet);
        let manager = super::super::SessionManager::new(shared);

        manager
            .dispatch(Inbound::new(VISITOR, Event::Command(Command::Start), None))
            .await;
        manager
            .dispatch(Inbound::new(OWNER, Event::Command(Command::Admin), None))
            .await;

        for _ in 0..50 {
            if outlet.sent().len() == 2 {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert_eq!(outlet.prompts_to(VISITOR).len(), 1);
        assert_eq!(outlet.prompts_to(OWNER).len(), 1);
        assert_eq!(manager.session_count().await, 2);
    }

    #[tokio::test]
    async fn test_idle_workers_are_released_and_recreated() {
        let (mut shared, _notices) = test_shared(MemoryStore::new());
        shared.settings.session_idle = Duration::from_millis(30);
        let outlet = Arc::clone(&shared.outlet);
        let manager = super::super::SessionManager::new(shared);

        // The visitor rests on the menu; the owner is halfway through booking
        manager
            .dispatch(Inbound::new(VISITOR, Event::Command(Command::Start), None))
            .await;
        manager
            .dispatch(Inbound::new(OWNER, Event::Button(Button::Book), None))
            .await;

        for _ in 0..50 {
            if manager.session_count().await == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(manager.session_count().await, 1);
        assert_eq!(outlet.prompts_to(VISITOR).len(), 1);

        manager
            .dispatch(Inbound::new(VISITOR, Event::Command(Command::Start), None))
            .await;
        for _ in 0..50 {
            if outlet.prompts_to(VISITOR).len() == 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(outlet.prompts_to(VISITOR).len(), 2);
        assert_eq!(manager.sessions.read().await.len(), 2);
    }
}
