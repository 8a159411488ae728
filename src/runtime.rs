//! Runtime for executing dialogue sessions
//!
//! One worker task per participant serializes that participant's events.
//! Workers are created on first contact and recreated if they die. A worker
//! left idle outside any dialogue shuts itself down and its map entry is
//! pruned on the next worker creation.

mod executor;
pub mod traits;

#[cfg(test)]
pub mod testing;

pub use executor::SessionRuntime;
pub use traits::*;

use crate::access::{AccessControl, ParticipantId};
use crate::catalog::Catalog;
use crate::notifier::NotifierHandle;
use crate::state_machine::Event;
use crate::store::{BookingStore, LoggingStore, SupabaseStore};
use crate::telegram::TelegramOutlet;
use chrono::{FixedOffset, NaiveDate, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, RwLock};

/// Type alias for production manager with concrete implementations
pub type ProductionManager = SessionManager<LoggingStore<SupabaseStore>, TelegramOutlet>;

/// Pending events per session before the transport waits
const SESSION_QUEUE: usize = 32;

/// How long an idle worker waits for input before shutting down
pub const DEFAULT_SESSION_IDLE: Duration = Duration::from_secs(30 * 60);

/// An inbound event addressed to one participant's session
#[derive(Debug)]
pub struct Inbound {
    pub participant: ParticipantId,
    pub event: Event,
    /// Message whose button produced the event, edited in place by menus
    pub origin: Option<MessageRef>,
    /// Correlates log lines of one update
    pub trace_id: String,
}

impl Inbound {
    pub fn new(participant: ParticipantId, event: Event, origin: Option<MessageRef>) -> Self {
        Self {
            participant,
            event,
            origin,
            trace_id: uuid::Uuid::new_v4().to_string(),
        }
    }
}

/// Runtime-wide settings
#[derive(Debug, Clone)]
pub struct RuntimeSettings {
    pub studio_name: String,
    /// Offset used to decide what "today" is
    pub utc_offset: FixedOffset,
    /// Quiet period after which a worker with no dialogue in progress exits
    pub session_idle: Duration,
}

impl RuntimeSettings {
    pub fn today(&self) -> NaiveDate {
        Utc::now().with_timezone(&self.utc_offset).date_naive()
    }
}

/// Collaborators shared by every session
pub struct Shared<S, O> {
    pub store: S,
    pub outlet: O,
    pub access: AccessControl,
    pub catalog: Catalog,
    pub notifier: NotifierHandle,
    pub settings: RuntimeSettings,
}

/// Manager for all session workers
pub struct SessionManager<S, O> {
    shared: Arc<Shared<S, O>>,
    sessions: RwLock<HashMap<ParticipantId, mpsc::Sender<Inbound>>>,
}

impl<S, O> SessionManager<S, O>
where
    S: BookingStore + 'static,
    O: ChatOutlet + 'static,
{
    pub fn new(shared: Shared<S, O>) -> Self {
        Self {
            shared: Arc::new(shared),
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Route an event to its participant's worker.
    ///
    /// A worker whose channel has closed is replaced and the event retried
    /// once on the fresh worker.
    pub async fn dispatch(&self, inbound: Inbound) {
        let participant = inbound.participant;
        let tx = self.get_or_create(participant).await;
        let Err(mpsc::error::SendError(inbound)) = tx.send(inbound).await else {
            return;
        };

        tracing::debug!(participant = %participant, "Session worker gone, restarting");
        self.sessions.write().await.remove(&participant);
        let tx = self.get_or_create(participant).await;
        if let Err(mpsc::error::SendError(inbound)) = tx.send(inbound).await {
            tracing::error!(
                participant = %participant,
                trace_id = %inbound.trace_id,
                "Failed to deliver event to session"
            );
        }
    }

    /// Get or create the worker for a participant
    async fn get_or_create(&self, participant: ParticipantId) -> mpsc::Sender<Inbound> {
        // Check if already running
        {
            let sessions = self.sessions.read().await;
            if let Some(tx) = sessions.get(&participant) {
                if !tx.is_closed() {
                    return tx.clone();
                }
            }
        }

        let mut sessions = self.sessions.write().await;
        if let Some(tx) = sessions.get(&participant) {
            if !tx.is_closed() {
                return tx.clone();
            }
        }

        sessions.retain(|_, tx| !tx.is_closed());

        let (tx, rx) = mpsc::channel(SESSION_QUEUE);
        let runtime = SessionRuntime::new(participant, Arc::clone(&self.shared));
        let worker = tokio::spawn(runtime.run(rx));

        // Surface panics; the next event recreates the worker
        tokio::spawn(async move {
            if let Err(e) = worker.await {
                if e.is_panic() {
                    tracing::error!(participant = %participant, "Session worker panicked");
                }
            }
        });

        sessions.insert(participant, tx.clone());
        tx
    }

    /// Number of live session workers
    #[cfg(test)]
    pub async fn session_count(&self) -> usize {
        self.sessions
            .read()
            .await
            .values()
            .filter(|tx| !tx.is_closed())
            .count()
    }
}
