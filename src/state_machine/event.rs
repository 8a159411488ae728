//! Events that drive dialogue transitions

use super::state::TargetAction;
use crate::access::{AdminRole, ParticipantId};
use crate::catalog::{CatalogKind, CatalogOutcome};
use crate::store::{BookingRecord, BookingStats, RecordField, RecordId};

/// Events fed to the transition function
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    // User input
    Command(Command),
    Text(String),
    Button(Button),

    // Effect results
    BookingSaved {
        record: BookingRecord,
    },
    RecordsLoaded {
        records: Vec<BookingRecord>,
    },
    RecordFetched {
        record: Option<BookingRecord>,
    },
    RecordUpdated {
        record: Option<BookingRecord>,
    },
    RecordDeleted {
        record_id: RecordId,
        existed: bool,
    },
    StatsLoaded {
        stats: BookingStats,
    },
    CatalogUpdated {
        outcome: CatalogOutcome,
    },
    MessageForwarded {
        recipient: ParticipantId,
        delivered: bool,
    },
    /// Any store failure; the cause is logged by the runtime
    StoreFailed,
}

impl Event {
    /// Whether the event comes from the participant rather than an effect
    pub fn is_user_input(&self) -> bool {
        matches!(self, Event::Command(_) | Event::Text(_) | Event::Button(_))
    }
}

/// Slash commands understood in every state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Restart the visitor flow
    Start,
    /// Enter the administrative flow
    Admin,
    /// Abandon the current flow
    Cancel,
}

impl Command {
    /// Parse a message as a command, tolerating a `@botname` suffix and
    /// trailing arguments
    pub fn parse(text: &str) -> Option<Self> {
        let token = text.split_whitespace().next()?;
        let command = token.strip_prefix('/')?;
        let command = command.split('@').next().unwrap_or(command);
        match command.to_lowercase().as_str() {
            "start" => Some(Command::Start),
            "admin" => Some(Command::Admin),
            "cancelar" | "cancel" => Some(Command::Cancel),
            _ => None,
        }
    }
}

/// Administrative menu entries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdminAction {
    ListToday,
    ListAll,
    Confirm,
    Cancel,
    Message,
    Delete,
    EditField,
    AddService,
    RemoveService,
    AddTimeSlot,
    RemoveTimeSlot,
    Stats,
}

impl AdminAction {
    const OWNER_MENU: [AdminAction; 6] = [
        AdminAction::ListToday,
        AdminAction::ListAll,
        AdminAction::Confirm,
        AdminAction::Cancel,
        AdminAction::Message,
        AdminAction::Delete,
    ];

    const TECH_ONLY: [AdminAction; 6] = [
        AdminAction::EditField,
        AdminAction::AddService,
        AdminAction::RemoveService,
        AdminAction::AddTimeSlot,
        AdminAction::RemoveTimeSlot,
        AdminAction::Stats,
    ];

    /// Menu entries offered to a role, in display order
    pub fn menu_for(role: AdminRole) -> Vec<AdminAction> {
        let mut actions = Self::OWNER_MENU.to_vec();
        if role.is_tech_admin() {
            actions.extend(Self::TECH_ONLY);
        }
        actions
    }

    pub fn requires_tech_admin(self) -> bool {
        Self::TECH_ONLY.contains(&self)
    }

    pub fn key(self) -> &'static str {
        match self {
            AdminAction::ListToday => "today",
            AdminAction::ListAll => "all",
            AdminAction::Confirm => "confirm",
            AdminAction::Cancel => "cancel",
            AdminAction::Message => "message",
            AdminAction::Delete => "delete",
            AdminAction::EditField => "edit",
            AdminAction::AddService => "add_svc",
            AdminAction::RemoveService => "rm_svc",
            AdminAction::AddTimeSlot => "add_slot",
            AdminAction::RemoveTimeSlot => "rm_slot",
            AdminAction::Stats => "stats",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::OWNER_MENU
            .into_iter()
            .chain(Self::TECH_ONLY)
            .find(|action| action.key() == key)
    }

    pub fn label(self) -> &'static str {
        match self {
            AdminAction::ListToday => "📅 Agendamentos de hoje",
            AdminAction::ListAll => "📋 Todos os agendamentos",
            AdminAction::Confirm => "✅ Confirmar",
            AdminAction::Cancel => "❌ Cancelar",
            AdminAction::Message => "💬 Mensagem para cliente",
            AdminAction::Delete => "🗑 Excluir",
            AdminAction::EditField => "✏️ Editar registro",
            AdminAction::AddService => "➕ Adicionar serviço",
            AdminAction::RemoveService => "➖ Remover serviço",
            AdminAction::AddTimeSlot => "➕ Adicionar horário",
            AdminAction::RemoveTimeSlot => "➖ Remover horário",
            AdminAction::Stats => "📊 Estatísticas",
        }
    }
}

/// Decoded inline button payload.
///
/// Payloads are decoded once at the transport boundary; anything that does
/// not decode is dropped there.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Button {
    Book,
    ListTimes,
    Admin(AdminAction),
    Target {
        action: TargetAction,
        record_id: RecordId,
    },
    Field(RecordField),
    Recipient(ParticipantId),
    RemoveEntry {
        kind: CatalogKind,
        value: String,
    },
}

impl Button {
    /// Whether pressing this button requires an administrative role
    pub fn is_admin(&self) -> bool {
        !matches!(self, Button::Book | Button::ListTimes)
    }

    pub fn requires_tech_admin(&self) -> bool {
        match self {
            Button::Admin(action) => action.requires_tech_admin(),
            Button::Field(_) | Button::RemoveEntry { .. } => true,
            Button::Book | Button::ListTimes | Button::Target { .. } | Button::Recipient(_) => {
                false
            }
        }
    }

    /// Encode as callback data
    pub fn payload(&self) -> String {
        match self {
            Button::Book => "book".to_string(),
            Button::ListTimes => "times".to_string(),
            Button::Admin(action) => format!("adm:{}", action.key()),
            Button::Target { action, record_id } => format!("tgt:{}:{record_id}", action.key()),
            Button::Field(field) => format!("fld:{}", field.key()),
            Button::Recipient(participant) => format!("to:{participant}"),
            Button::RemoveEntry { kind, value } => format!("rm:{}:{value}", kind_key(*kind)),
        }
    }

    /// Decode callback data produced by [`Button::payload`]
    pub fn decode(payload: &str) -> Option<Self> {
        match payload {
            "book" => return Some(Button::Book),
            "times" => return Some(Button::ListTimes),
            _ => {}
        }
        let (prefix, rest) = payload.split_once(':')?;
        match prefix {
            "adm" => AdminAction::from_key(rest).map(Button::Admin),
            "tgt" => {
                let (action, id) = rest.split_once(':')?;
                if id.is_empty() {
                    return None;
                }
                Some(Button::Target {
                    action: TargetAction::from_key(action)?,
                    record_id: RecordId::new(id),
                })
            }
            "fld" => RecordField::from_key(rest).map(Button::Field),
            "to" => rest.parse().ok().map(|id| Button::Recipient(ParticipantId(id))),
            "rm" => {
                let (kind, value) = rest.split_once(':')?;
                if value.is_empty() {
                    return None;
                }
                Some(Button::RemoveEntry {
                    kind: kind_from_key(kind)?,
                    value: value.to_string(),
                })
            }
            _ => None,
        }
    }
}

fn kind_key(kind: CatalogKind) -> &'static str {
    match kind {
        CatalogKind::Service => "svc",
        CatalogKind::TimeSlot => "slot",
    }
}

fn kind_from_key(key: &str) -> Option<CatalogKind> {
    match key {
        "svc" => Some(CatalogKind::Service),
        "slot" => Some(CatalogKind::TimeSlot),
        _ => None,
    }
}
