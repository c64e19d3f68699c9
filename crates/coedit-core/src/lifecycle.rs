//! Edit scope lifecycle
//!
//! `Unregistered -> Registered -> Ended`, with a direct
//! `Unregistered -> Ended` edge for scopes whose registration failed.
//! Conflict status is not a phase; it overlays `Registered`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::session::SessionId;
use crate::{Error, Result};

/// Lifecycle phase of a single edit scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum EditPhase {
    /// No session row exists for this scope
    Unregistered,
    /// Session row exists and is heartbeating
    Registered,
    /// Scope exited
    Ended,
}

impl EditPhase {
    /// Returns true if moving to `next` is allowed.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Unregistered, Self::Registered | Self::Ended) | (Self::Registered, Self::Ended)
        )
    }

    /// `Ended` is terminal.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Ended)
    }
}

/// A phase change with its timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseTransition {
    /// Source phase
    pub from: EditPhase,
    /// Target phase
    pub to: EditPhase,
    /// When it happened
    pub at: DateTime<Utc>,
}

impl PhaseTransition {
    /// Validate that the transition is allowed.
    pub fn validate(&self) -> Result<()> {
        if self.from.can_transition_to(self.to) {
            Ok(())
        } else {
            Err(Error::InvalidTransition(format!(
                "{} -> {}",
                self.from, self.to
            )))
        }
    }
}

/// Phase tracker for one scope, holding the session id once registered.
#[derive(Debug, Clone)]
pub struct Lifecycle {
    phase: EditPhase,
    session_id: Option<SessionId>,
    history: Vec<PhaseTransition>,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl Lifecycle {
    /// Start unregistered.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            phase: EditPhase::Unregistered,
            session_id: None,
            history: Vec::new(),
        }
    }

    /// Current phase.
    #[must_use]
    pub const fn phase(&self) -> EditPhase {
        self.phase
    }

    /// Session id while registered (and after, for the record).
    #[must_use]
    pub const fn session_id(&self) -> Option<&SessionId> {
        self.session_id.as_ref()
    }

    /// Transitions so far, oldest first.
    #[must_use]
    pub fn history(&self) -> &[PhaseTransition] {
        &self.history
    }

    /// Move to `Registered` with the created session.
    pub fn register(&mut self, session_id: SessionId, at: DateTime<Utc>) -> Result<()> {
        self.transition(EditPhase::Registered, at)?;
        self.session_id = Some(session_id);
        Ok(())
    }

    /// Move to `Ended`.
    pub fn end(&mut self, at: DateTime<Utc>) -> Result<()> {
        self.transition(EditPhase::Ended, at)
    }

    fn transition(&mut self, to: EditPhase, at: DateTime<Utc>) -> Result<()> {
        let transition = PhaseTransition {
            from: self.phase,
            to,
            at,
        };
        transition.validate()?;
        self.phase = to;
        self.history.push(transition);
        Ok(())
    }
}
