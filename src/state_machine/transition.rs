//! Pure state transition function
//!
//! Given the same state, context and event it always yields the same new
//! state and effects. All I/O happens in the runtime.

use super::event::{AdminAction, Button, Command};
use super::prompt::{self, Prompt};
use super::state::{
    AdminOp, DialogueState, SessionContext, TargetAction, MAX_LISTED, MAX_RECIPIENT_RECORDS,
};
use super::{Effect, Event};
use crate::access::{AdminRole, ParticipantId};
use crate::catalog::{CatalogEdit, CatalogKind};
use crate::notifier::Notice;
use crate::store::{
    BookingRecord, BookingStatus, Column, NewBooking, RecordField, RecordPatch, RecordQuery,
};
use crate::validation::{
    check_service, check_time_slot, format_date, parse_booking_date, validate_name,
};
use thiserror::Error;

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_state: DialogueState,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: DialogueState) -> Self {
        Self {
            new_state: state,
            effects: vec![],
        }
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    pub fn with_effects(mut self, effects: impl IntoIterator<Item = Effect>) -> Self {
        self.effects.extend(effects);
        self
    }
}

/// Errors that can occur during transition
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("Session is busy waiting for an earlier request")]
    Busy,
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),
}

/// Pure transition function
pub fn transition(
    state: &DialogueState,
    ctx: &SessionContext,
    event: Event,
) -> Result<TransitionResult, TransitionError> {
    // Commands are honoured in every state
    if let Event::Command(command) = event {
        return Ok(handle_command(state, ctx, command));
    }

    if let Some(denied) = check_access(state, ctx, &event) {
        return Ok(denied);
    }

    if state.is_awaiting() && event.is_user_input() {
        return Err(TransitionError::Busy);
    }

    match (state, event) {
        // ============================================================
        // Visitor flow
        // ============================================================

        (_, Event::Button(Button::Book)) => Ok(TransitionResult::new(DialogueState::CollectingName)
            .with_effect(Effect::EditMenu(prompt::ask_name(&ctx.studio_name)))),

        (_, Event::Button(Button::ListTimes)) => Ok(TransitionResult::new(DialogueState::Idle)
            .with_effect(Effect::EditMenu(prompt::time_listing(
                &ctx.studio_name,
                &ctx.catalog.time_slots,
            )))),

        (DialogueState::CollectingName, Event::Text(text)) => match validate_name(&text) {
            Ok(name) => {
                let ask = prompt::ask_service(&name, &ctx.catalog.services);
                Ok(TransitionResult::new(DialogueState::CollectingService { name })
                    .with_effect(Effect::Reply(ask)))
            }
            Err(_) => Ok(stay(state, prompt::name_rejected())),
        },

        (DialogueState::CollectingService { name }, Event::Text(text)) => {
            match check_service(&text, &ctx.catalog.services) {
                Ok(service) => {
                    let ask = prompt::ask_date(&service, ctx.today);
                    Ok(TransitionResult::new(DialogueState::CollectingDate {
                        name: name.clone(),
                        service,
                    })
                    .with_effect(Effect::Reply(ask)))
                }
                Err(_) => Ok(stay(
                    state,
                    prompt::service_rejected(&ctx.catalog.services),
                )),
            }
        }

        (DialogueState::CollectingDate { name, service }, Event::Text(text)) => {
            match parse_booking_date(&text, ctx.today) {
                Ok(date) => Ok(TransitionResult::new(DialogueState::CollectingTime {
                    name: name.clone(),
                    service: service.clone(),
                    date,
                })
                .with_effect(Effect::Reply(prompt::ask_time(
                    date,
                    &ctx.catalog.time_slots,
                )))),
                Err(_) => Ok(stay(state, prompt::date_rejected(ctx.today))),
            }
        }

        (
            DialogueState::CollectingTime {
                name,
                service,
                date,
            },
            Event::Text(text),
        ) => match check_time_slot(&text, &ctx.catalog.time_slots) {
            Ok(time) => {
                let booking = NewBooking::pending(
                    name.clone(),
                    service.clone(),
                    format_date(*date),
                    time,
                    ctx.participant,
                );
                Ok(TransitionResult::new(DialogueState::SavingBooking {
                    booking: booking.clone(),
                })
                .with_effect(Effect::Reply(prompt::saving()))
                .with_effect(Effect::CreateBooking(booking)))
            }
            Err(_) => Ok(stay(
                state,
                prompt::time_rejected(&ctx.catalog.time_slots),
            )),
        },

        (DialogueState::SavingBooking { .. }, Event::BookingSaved { record }) => {
            Ok(TransitionResult::new(DialogueState::Idle)
                .with_effect(Effect::Reply(prompt::booking_confirmed(
                    &record,
                    &ctx.studio_name,
                )))
                .with_effect(Effect::Notify(Notice::owner(prompt::new_booking_alert(
                    &record,
                )))))
        }

        (DialogueState::SavingBooking { .. }, Event::StoreFailed) => {
            Ok(TransitionResult::new(DialogueState::Idle)
                .with_effect(Effect::Reply(prompt::booking_failed())))
        }

        // ============================================================
        // Administrative entry points (buttons work from any idle point;
        // access was checked above)
        // ============================================================

        (_, Event::Button(Button::Admin(action))) => {
            let role = admin_role(ctx, state)?;
            Ok(start_admin_action(role, action, ctx))
        }

        (_, Event::Button(Button::Target { action, record_id })) => {
            let role = admin_role(ctx, state)?;
            let (op, effect) = match action.next_status() {
                Some(_) => (
                    AdminOp::CheckTarget {
                        action,
                        record_id: record_id.clone(),
                    },
                    Effect::FetchRecord(record_id),
                ),
                None => (
                    AdminOp::ApplyTarget {
                        action,
                        record_id: record_id.clone(),
                    },
                    Effect::DeleteRecord(record_id),
                ),
            };
            Ok(awaiting(role, op, true).with_effect(effect))
        }

        (_, Event::Button(Button::Recipient(recipient))) => {
            let role = admin_role(ctx, state)?;
            Ok(
                TransitionResult::new(DialogueState::CollectingMessage { role, recipient })
                    .with_effect(Effect::EditMenu(prompt::ask_message())),
            )
        }

        (_, Event::Button(Button::RemoveEntry { kind, value })) => {
            let role = admin_role(ctx, state)?;
            Ok(awaiting(role, AdminOp::CatalogEdit, true)
                .with_effect(Effect::EditCatalog(CatalogEdit::Remove { kind, value })))
        }

        (DialogueState::CollectingFieldChoice { role, record_id }, Event::Button(Button::Field(field))) => {
            Ok(TransitionResult::new(DialogueState::CollectingNewValue {
                role: *role,
                record_id: record_id.clone(),
                field,
            })
            .with_effect(Effect::EditMenu(prompt::ask_new_value(field))))
        }

        // ============================================================
        // Administrative text input
        // ============================================================

        (DialogueState::CollectingTargetId { role }, Event::Text(text)) => {
            let prefix = text.trim();
            if prefix.is_empty() {
                return Ok(stay(state, prompt::ask_record_id()));
            }
            Ok(awaiting(
                *role,
                AdminOp::LookupRecord {
                    prefix: prefix.to_string(),
                },
                false,
            )
            .with_effect(Effect::FindRecordByPrefix(prefix.to_string())))
        }

        (
            DialogueState::CollectingNewValue {
                role,
                record_id,
                field,
            },
            Event::Text(text),
        ) => {
            let value = text.trim();
            if value.is_empty() {
                return Ok(stay(state, prompt::empty_value_rejected()));
            }
            let patch = if *field == RecordField::Status {
                match value.parse::<BookingStatus>() {
                    Ok(status) => RecordPatch::Status(status),
                    Err(()) => return Ok(stay(state, prompt::status_value_rejected())),
                }
            } else {
                RecordPatch::Field {
                    field: *field,
                    value: value.to_string(),
                }
            };
            Ok(awaiting(
                *role,
                AdminOp::ApplyEdit {
                    record_id: record_id.clone(),
                    field: *field,
                },
                false,
            )
            .with_effect(Effect::UpdateRecord {
                record_id: record_id.clone(),
                patch,
            }))
        }

        (DialogueState::CollectingCatalogEntry { role, kind }, Event::Text(text)) => {
            Ok(awaiting(*role, AdminOp::CatalogEdit, false).with_effect(Effect::EditCatalog(
                CatalogEdit::Add {
                    kind: *kind,
                    value: text,
                },
            )))
        }

        (DialogueState::CollectingMessage { role, recipient }, Event::Text(text)) => {
            if text.trim().is_empty() {
                return Ok(stay(state, prompt::empty_value_rejected()));
            }
            Ok(awaiting(
                *role,
                AdminOp::ForwardMessage {
                    recipient: *recipient,
                },
                false,
            )
            .with_effect(Effect::ForwardMessage {
                recipient: *recipient,
                text,
            }))
        }

        // ============================================================
        // Administrative effect results
        // ============================================================

        (
            DialogueState::AwaitingResult {
                role,
                op,
                in_place,
            },
            event,
        ) => admin_result(*role, op, *in_place, ctx, event),

        (state, event) => Err(TransitionError::InvalidTransition(format!(
            "{} cannot handle {}",
            state.name(),
            event_name(&event)
        ))),
    }
}

fn handle_command(
    state: &DialogueState,
    ctx: &SessionContext,
    command: Command,
) -> TransitionResult {
    match command {
        Command::Start => TransitionResult::new(DialogueState::VisitorMenu)
            .with_effect(Effect::Reply(prompt::visitor_menu(&ctx.studio_name))),

        Command::Admin => match ctx.role.admin() {
            Some(role) => TransitionResult::new(DialogueState::AdminMenu { role })
                .with_effect(Effect::Reply(prompt::admin_menu(role, None))),
            None => deny(ctx, "admin command"),
        },

        Command::Cancel => match (state.admin_role(), ctx.role.admin()) {
            (Some(_), Some(role)) => TransitionResult::new(DialogueState::AdminMenu { role })
                .with_effect(Effect::Reply(prompt::admin_menu(
                    role,
                    Some("↩️ Operação cancelada."),
                ))),
            _ => TransitionResult::new(DialogueState::Idle)
                .with_effect(Effect::Reply(prompt::cancelled())),
        },
    }
}

/// Role check for administrative states and buttons, re-run on every event
fn check_access(
    state: &DialogueState,
    ctx: &SessionContext,
    event: &Event,
) -> Option<TransitionResult> {
    let granted = ctx.role.admin();
    let is_tech = granted.is_some_and(AdminRole::is_tech_admin);

    if let Some(state_role) = state.admin_role() {
        let needs_tech = state_role.is_tech_admin() || state.requires_tech_admin();
        if granted.is_none() || (needs_tech && !is_tech) {
            return Some(deny(ctx, state.name()));
        }
    }

    if let Event::Button(button) = event {
        if button.is_admin() && granted.is_none() {
            return Some(deny(ctx, "admin button"));
        }
        if button.requires_tech_admin() && !is_tech {
            return Some(deny(ctx, "tech admin button"));
        }
    }

    None
}

fn deny(ctx: &SessionContext, what: &str) -> TransitionResult {
    TransitionResult::new(DialogueState::Idle)
        .with_effect(Effect::LogWarning(format!(
            "access denied: {} attempted {what}",
            ctx.role
        )))
        .with_effect(Effect::Reply(prompt::access_denied()))
}

/// Admin role for an administrative event; access has been checked already
fn admin_role(
    ctx: &SessionContext,
    state: &DialogueState,
) -> Result<AdminRole, TransitionError> {
    ctx.role.admin().ok_or_else(|| {
        TransitionError::InvalidTransition(format!("{} has no admin role", state.name()))
    })
}

fn stay(state: &DialogueState, prompt: Prompt) -> TransitionResult {
    TransitionResult::new(state.clone()).with_effect(Effect::Reply(prompt))
}

fn awaiting(role: AdminRole, op: AdminOp, in_place: bool) -> TransitionResult {
    TransitionResult::new(DialogueState::AwaitingResult { role, op, in_place })
}

/// Back to the role's menu with a result line
fn menu_with(role: AdminRole, in_place: bool, line: &str) -> TransitionResult {
    let menu = prompt::admin_menu(role, Some(line));
    let effect = if in_place {
        Effect::EditMenu(menu)
    } else {
        Effect::Reply(menu)
    };
    TransitionResult::new(DialogueState::AdminMenu { role }).with_effect(effect)
}

fn start_admin_action(
    role: AdminRole,
    action: AdminAction,
    ctx: &SessionContext,
) -> TransitionResult {
    match action {
        AdminAction::ListToday => awaiting(role, AdminOp::ListToday, true).with_effect(
            Effect::QueryRecords(
                RecordQuery::all()
                    .eq(Column::Date, format_date(ctx.today))
                    .order_by(Column::Time, false),
            ),
        ),
        AdminAction::ListAll => awaiting(role, AdminOp::ListAll, true).with_effect(
            Effect::QueryRecords(
                RecordQuery::all()
                    .order_by(Column::CreatedAt, true)
                    .limit(MAX_LISTED),
            ),
        ),
        AdminAction::Confirm => load_targets(role, TargetAction::Confirm),
        AdminAction::Cancel => load_targets(role, TargetAction::Cancel),
        AdminAction::Delete => load_targets(role, TargetAction::Delete),
        AdminAction::Message => awaiting(role, AdminOp::LoadRecipients, true).with_effect(
            Effect::QueryRecords(
                RecordQuery::all()
                    .not_null(Column::Participant)
                    .order_by(Column::CreatedAt, true)
                    .limit(MAX_RECIPIENT_RECORDS),
            ),
        ),
        AdminAction::EditField => TransitionResult::new(DialogueState::CollectingTargetId { role })
            .with_effect(Effect::EditMenu(prompt::ask_record_id())),
        AdminAction::AddService => collect_entry(role, CatalogKind::Service),
        AdminAction::AddTimeSlot => collect_entry(role, CatalogKind::TimeSlot),
        AdminAction::RemoveService => choose_removal(role, CatalogKind::Service, ctx),
        AdminAction::RemoveTimeSlot => choose_removal(role, CatalogKind::TimeSlot, ctx),
        AdminAction::Stats => awaiting(role, AdminOp::LoadStats, true)
            .with_effect(Effect::LoadStats { today: ctx.today }),
    }
}

fn load_targets(role: AdminRole, action: TargetAction) -> TransitionResult {
    awaiting(role, AdminOp::LoadTargets(action), true)
        .with_effect(Effect::QueryRecords(action.target_query()))
}

fn collect_entry(role: AdminRole, kind: CatalogKind) -> TransitionResult {
    TransitionResult::new(DialogueState::CollectingCatalogEntry { role, kind })
        .with_effect(Effect::EditMenu(prompt::ask_catalog_entry(kind)))
}

fn choose_removal(role: AdminRole, kind: CatalogKind, ctx: &SessionContext) -> TransitionResult {
    let entries = ctx.catalog.entries(kind);
    if entries.is_empty() {
        return menu_with(role, true, &prompt::catalog_empty(kind));
    }
    TransitionResult::new(DialogueState::ChoosingCatalogRemoval { role, kind })
        .with_effect(Effect::EditMenu(prompt::catalog_removal_choice(kind, entries)))
}

/// Most recent record per participant, newest first
fn distinct_recipients(records: &[BookingRecord]) -> Vec<(ParticipantId, String)> {
    let mut recipients: Vec<(ParticipantId, String)> = Vec::new();
    for record in records {
        if let Some(participant) = record.participant {
            if !recipients.iter().any(|(p, _)| *p == participant) {
                recipients.push((participant, record.name.clone()));
            }
        }
    }
    recipients
}

#[allow(clippy::too_many_lines)] // One arm per pending operation
fn admin_result(
    role: AdminRole,
    op: &AdminOp,
    in_place: bool,
    ctx: &SessionContext,
    event: Event,
) -> Result<TransitionResult, TransitionError> {
    match (op, event) {
        (_, Event::StoreFailed) => Ok(menu_with(role, in_place, prompt::store_failure_line())),

        (AdminOp::ListToday | AdminOp::ListAll, Event::RecordsLoaded { records }) => {
            let title = if *op == AdminOp::ListToday {
                prompt::today_title(ctx.today)
            } else {
                prompt::ALL_TITLE.to_string()
            };
            Ok(TransitionResult::new(DialogueState::AdminMenu { role }).with_effects([
                Effect::EditMenu(prompt::listing(&title, &records)),
                Effect::Reply(prompt::admin_menu(role, None)),
            ]))
        }

        (AdminOp::LoadTargets(action), Event::RecordsLoaded { records }) => {
            if records.is_empty() {
                return Ok(menu_with(role, in_place, &prompt::nothing_to_select(*action)));
            }
            Ok(TransitionResult::new(DialogueState::ChoosingTarget {
                role,
                action: *action,
            })
            .with_effect(Effect::EditMenu(prompt::target_choice(*action, &records))))
        }

        (AdminOp::LoadRecipients, Event::RecordsLoaded { records }) => {
            let recipients = distinct_recipients(&records);
            if recipients.is_empty() {
                return Ok(menu_with(role, in_place, prompt::no_recipients()));
            }
            Ok(TransitionResult::new(DialogueState::ChoosingRecipient { role })
                .with_effect(Effect::EditMenu(prompt::recipient_choice(&recipients))))
        }

        (AdminOp::CheckTarget { action, record_id }, Event::RecordFetched { record }) => {
            let Some(record) = record else {
                return Ok(menu_with(role, in_place, &prompt::record_not_found(record_id)));
            };
            let Some(next) = action.next_status() else {
                return Err(TransitionError::InvalidTransition(
                    "delete does not check status".to_string(),
                ));
            };
            if !record.status.can_become(next) {
                return Ok(menu_with(
                    role,
                    in_place,
                    &prompt::illegal_status_move(&record, next),
                )
                .with_effect(Effect::LogWarning(format!(
                    "refused status move {} -> {next} for record {}",
                    record.status, record.id
                ))));
            }
            Ok(awaiting(
                role,
                AdminOp::ApplyTarget {
                    action: *action,
                    record_id: record_id.clone(),
                },
                in_place,
            )
            .with_effect(Effect::UpdateRecord {
                record_id: record_id.clone(),
                patch: RecordPatch::Status(next),
            }))
        }

        (AdminOp::ApplyTarget { action, record_id }, Event::RecordUpdated { record }) => {
            let Some(record) = record else {
                return Ok(menu_with(role, in_place, &prompt::record_not_found(record_id)));
            };
            let mut result = menu_with(role, in_place, &prompt::target_applied(*action, &record));
            if let Some(participant) = record.participant {
                result = result.with_effect(Effect::Notify(Notice::participant(
                    participant,
                    prompt::status_changed(&record, &ctx.studio_name),
                )));
            }
            Ok(result)
        }

        (AdminOp::ApplyTarget { record_id, .. }, Event::RecordDeleted { existed, .. }) => {
            let line = if existed {
                prompt::deleted(record_id)
            } else {
                prompt::record_not_found(record_id)
            };
            Ok(menu_with(role, in_place, &line))
        }

        (AdminOp::LookupRecord { prefix }, Event::RecordFetched { record }) => match record {
            Some(record) => Ok(TransitionResult::new(DialogueState::CollectingFieldChoice {
                role,
                record_id: record.id.clone(),
            })
            .with_effect(Effect::Reply(prompt::field_choice(&record)))),
            None => Ok(TransitionResult::new(DialogueState::CollectingTargetId { role })
                .with_effect(Effect::Reply(prompt::record_id_not_found(prefix)))),
        },

        (AdminOp::ApplyEdit { record_id, field }, Event::RecordUpdated { record }) => {
            let line = match record {
                Some(record) => prompt::field_updated(&record, *field),
                None => prompt::record_not_found(record_id),
            };
            Ok(menu_with(role, in_place, &line))
        }

        (AdminOp::LoadStats, Event::StatsLoaded { stats }) => {
            Ok(menu_with(role, in_place, &prompt::stats(&stats, ctx.today)))
        }

        (AdminOp::CatalogEdit, Event::CatalogUpdated { outcome }) => {
            Ok(menu_with(role, in_place, &prompt::catalog_outcome(&outcome)))
        }

        (AdminOp::ForwardMessage { .. }, Event::MessageForwarded { delivered, .. }) => {
            Ok(menu_with(role, in_place, prompt::forward_result(delivered)))
        }

        (op, event) => Err(TransitionError::InvalidTransition(format!(
            "awaiting {op:?} cannot handle {}",
            event_name(&event)
        ))),
    }
}

fn event_name(event: &Event) -> &'static str {
    match event {
        Event::Command(_) => "command",
        Event::Text(_) => "text",
        Event::Button(_) => "button",
        Event::BookingSaved { .. } => "booking_saved",
        Event::RecordsLoaded { .. } => "records_loaded",
        Event::RecordFetched { .. } => "record_fetched",
        Event::RecordUpdated { .. } => "record_updated",
        Event::RecordDeleted { .. } => "record_deleted",
        Event::StatsLoaded { .. } => "stats_loaded",
        Event::CatalogUpdated { .. } => "catalog_updated",
        Event::MessageForwarded { .. } => "message_forwarded",
        Event::StoreFailed => "store_failed",
    }
}
