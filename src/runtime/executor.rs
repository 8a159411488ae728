//! Session runtime executor

use super::traits::{ChatOutlet, DeliveryError};
use super::{Inbound, Shared};
use crate::access::ParticipantId;
use crate::state_machine::prompt::{self, escape};
use crate::state_machine::state::SessionContext;
use crate::state_machine::transition::TransitionError;
use crate::state_machine::{transition, DialogueState, Effect, Event, Prompt};
use crate::store::{self, BookingStore, StoreError};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Runtime for one participant: owns the dialogue state and executes effects
pub struct SessionRuntime<S, O> {
    participant: ParticipantId,
    state: DialogueState,
    shared: Arc<Shared<S, O>>,
}

impl<S, O> SessionRuntime<S, O>
where
    S: BookingStore + 'static,
    O: ChatOutlet + 'static,
{
    pub fn new(participant: ParticipantId, shared: Arc<Shared<S, O>>) -> Self {
        Self {
            participant,
            state: DialogueState::Idle,
            shared,
        }
    }

    #[cfg(test)]
    pub fn state(&self) -> &DialogueState {
        &self.state
    }

    pub async fn run(mut self, mut inbox: mpsc::Receiver<Inbound>) {
        tracing::info!(participant = %self.participant, "Starting session");

        let idle = self.shared.settings.session_idle;
        loop {
            match tokio::time::timeout(idle, inbox.recv()).await {
                Ok(Some(inbound)) => self.handle(inbound).await,
                Ok(None) => break,
                Err(_) if self.state.is_at_rest() => {
                    // Close first so nothing slips in between the last drain and the drop
                    inbox.close();
                    while let Some(inbound) = inbox.recv().await {
                        self.handle(inbound).await;
                    }
                    tracing::debug!(participant = %self.participant, "Idle session released");
                    break;
                }
                Err(_) => {}
            }
        }

        tracing::info!(participant = %self.participant, "Session stopped");
    }

    /// Snapshot of everything the transition function may look at
    fn context(&self) -> SessionContext {
        SessionContext::new(
            self.participant,
            self.shared.access.resolve(self.participant),
            self.shared.settings.today(),
            self.shared.catalog.snapshot(),
            self.shared.settings.studio_name.clone(),
        )
    }

    /// Process one inbound event and every result event its effects produce
    pub async fn handle(&mut self, inbound: Inbound) {
        let Inbound {
            event,
            origin,
            trace_id,
            ..
        } = inbound;

        // Process events in a loop to handle chained effects - no recursion
        let mut events_to_process = vec![event];

        while let Some(current_event) = events_to_process.pop() {
            let from_user = current_event.is_user_input();
            let ctx = self.context();

            let result = match transition(&self.state, &ctx, current_event) {
                Ok(r) => r,
                Err(e) => {
                    self.reject(&e, from_user, &trace_id).await;
                    return;
                }
            };

            let old_state = std::mem::replace(&mut self.state, result.new_state);
            if old_state.name() != self.state.name() {
                tracing::debug!(
                    participant = %self.participant,
                    role = %ctx.role,
                    from = old_state.name(),
                    to = self.state.name(),
                    "State transition"
                );
            }

            for effect in result.effects {
                if let Some(generated_event) = self.execute_effect(effect, origin, &trace_id).await {
                    events_to_process.push(generated_event);
                }
            }
        }
    }

    async fn reject(&mut self, error: &TransitionError, from_user: bool, trace_id: &str) {
        if from_user {
            tracing::info!(
                participant = %self.participant,
                state = self.state.name(),
                trace_id,
                error = %error,
                "Event not accepted"
            );
            let reply = match error {
                TransitionError::Busy => prompt::busy(),
                TransitionError::InvalidTransition(_) => prompt::not_understood(),
            };
            self.reply(&reply).await;
            return;
        }

        // An effect result the state cannot absorb; never leave the session stuck
        tracing::error!(
            participant = %self.participant,
            state = self.state.name(),
            trace_id,
            error = %error,
            "Effect result rejected, resetting session"
        );
        self.state = DialogueState::Idle;
        self.reply(&prompt::not_understood()).await;
    }

    /// Execute an effect and optionally return a generated event
    #[allow(clippy::too_many_lines)] // One arm per effect
    async fn execute_effect(
        &mut self,
        effect: Effect,
        origin: Option<super::MessageRef>,
        trace_id: &str,
    ) -> Option<Event> {
        let shared = Arc::clone(&self.shared);
        match effect {
            Effect::Reply(prompt) => {
                self.reply(&prompt).await;
                None
            }

            Effect::EditMenu(prompt) => {
                if let Some(message) = origin {
                    match shared.outlet.edit(self.participant, message, &prompt).await {
                        Ok(()) => return None,
                        Err(e) => {
                            tracing::debug!(
                                participant = %self.participant,
                                error = %e,
                                "Edit failed, sending instead"
                            );
                        }
                    }
                }
                self.reply(&prompt).await;
                None
            }

            Effect::CreateBooking(booking) => Some(match shared.store.insert(&booking).await {
                Ok(record) => Event::BookingSaved { record },
                Err(e) => self.store_failed("insert", &e, trace_id),
            }),

            Effect::QueryRecords(query) => Some(match shared.store.query(&query).await {
                Ok(records) => Event::RecordsLoaded { records },
                Err(e) => self.store_failed("query", &e, trace_id),
            }),

            Effect::FetchRecord(record_id) => {
                Some(match store::fetch(&shared.store, &record_id).await {
                    Ok(record) => Event::RecordFetched { record },
                    Err(e) => self.store_failed("fetch", &e, trace_id),
                })
            }

            Effect::FindRecordByPrefix(prefix) => {
                Some(match store::find_by_id_prefix(&shared.store, &prefix).await {
                    Ok(record) => Event::RecordFetched { record },
                    Err(e) => self.store_failed("find_by_prefix", &e, trace_id),
                })
            }

            Effect::UpdateRecord { record_id, patch } => {
                Some(match shared.store.update(&record_id, &patch).await {
                    Ok(record) => Event::RecordUpdated { record },
                    Err(e) => self.store_failed("update", &e, trace_id),
                })
            }

            Effect::DeleteRecord(record_id) => Some(match shared.store.delete(&record_id).await {
                Ok(existed) => Event::RecordDeleted { record_id, existed },
                Err(e) => self.store_failed("delete", &e, trace_id),
            }),

            Effect::LoadStats { today } => {
                Some(match store::load_stats(&shared.store, today).await {
                    Ok(stats) => Event::StatsLoaded { stats },
                    Err(e) => self.store_failed("stats", &e, trace_id),
                })
            }

            Effect::EditCatalog(edit) => {
                let outcome = shared.catalog.apply(&edit);
                tracing::info!(
                    participant = %self.participant,
                    ?outcome,
                    "Catalog edit applied"
                );
                Some(Event::CatalogUpdated { outcome })
            }

            Effect::Notify(notice) => {
                shared.notifier.enqueue(notice);
                None
            }

            Effect::ForwardMessage { recipient, text } => {
                // Shown verbatim: the admin's text is not markup
                let message = Prompt::text(escape(&text));
                let delivered = match shared.outlet.send(recipient, &message).await {
                    Ok(_) => {
                        tracing::info!(
                            participant = %self.participant,
                            recipient = %recipient,
                            "Admin message forwarded"
                        );
                        true
                    }
                    Err(e) => {
                        tracing::warn!(
                            participant = %self.participant,
                            recipient = %recipient,
                            trace_id,
                            error = %e,
                            "Admin message delivery failed"
                        );
                        false
                    }
                };
                Some(Event::MessageForwarded {
                    recipient,
                    delivered,
                })
            }

            Effect::LogWarning(message) => {
                tracing::warn!(
                    participant = %self.participant,
                    state = self.state.name(),
                    trace_id,
                    "{message}"
                );
                None
            }
        }
    }

    /// Send a prompt to this participant; delivery failures are only logged
    async fn reply(&self, prompt: &Prompt) {
        if let Err(e) = self.shared.outlet.send(self.participant, prompt).await {
            log_delivery_failure(self.participant, &e);
        }
    }

    fn store_failed(&self, operation: &str, error: &StoreError, trace_id: &str) -> Event {
        tracing::warn!(
            participant = %self.participant,
            operation,
            trace_id,
            kind = error.kind(),
            error = %error,
            "Store operation failed"
        );
        Event::StoreFailed
    }
}

fn log_delivery_failure(participant: ParticipantId, error: &DeliveryError) {
    match error {
        DeliveryError::Unreachable(_) => {
            tracing::info!(participant = %participant, error = %error, "Participant unreachable");
        }
        _ => {
            tracing::warn!(participant = %participant, error = %error, "Reply delivery failed");
        }
    }
}
