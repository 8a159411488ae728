//! Role resolution for chat participants
//!
//! The two privileged identities come from configuration; everyone else is
//! a visitor. Roles are resolved afresh for every inbound event.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identity of a chat participant (the private chat id)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantId(pub i64);

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Who is talking to the bot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Visitor,
    Owner,
    TechAdmin,
}

impl Role {
    /// The administrative role, if this participant has one
    pub fn admin(self) -> Option<AdminRole> {
        match self {
            Role::Visitor => None,
            Role::Owner => Some(AdminRole::Owner),
            Role::TechAdmin => Some(AdminRole::TechAdmin),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Role::Visitor => "visitor",
            Role::Owner => "owner",
            Role::TechAdmin => "tech_admin",
        };
        f.write_str(name)
    }
}

/// Roles allowed into the administrative flow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdminRole {
    Owner,
    TechAdmin,
}

impl AdminRole {
    pub fn is_tech_admin(self) -> bool {
        matches!(self, AdminRole::TechAdmin)
    }
}

/// Fixed allow-list of privileged participants
#[derive(Debug, Clone)]
pub struct AccessControl {
    owner: ParticipantId,
    tech_admin: ParticipantId,
}

impl AccessControl {
    pub fn new(owner: ParticipantId, tech_admin: ParticipantId) -> Self {
        Self { owner, tech_admin }
    }

    /// Resolve the role of a participant.
    ///
    /// If one identity is configured for both roles the broader one wins.
    pub fn resolve(&self, participant: ParticipantId) -> Role {
        if participant == self.tech_admin {
            Role::TechAdmin
        } else if participant == self.owner {
            Role::Owner
        } else {
            Role::Visitor
        }
    }

    /// Recipient of new-booking alerts
    pub fn owner(&self) -> ParticipantId {
        self.owner
    }
}
