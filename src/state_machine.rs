//! Core dialogue state machine
//!
//! Implements the Elm Architecture pattern with pure state transitions.

mod effect;
pub mod event;
pub mod prompt;
pub mod state;
pub(crate) mod transition;


pub use effect::Effect;
pub use event::{Button, Command, Event};
pub use prompt::{Markup, Prompt};
pub use state::{DialogueState, SessionContext};
pub use transition::transition;
