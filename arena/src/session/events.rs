use chess::{PlayerSide, TerminalReason};

use super::snapshot::SessionSnapshot;
use crate::error::TurnError;

/// Events broadcast from the session actor to all subscribers.
#[derive(Debug, Clone)]
#[allow(clippy::large_enum_variant)]
pub enum SessionEvent {
    /// A new game replaced the old one. Carries the starting FEN.
    GameStarted(String),
    MoveApplied(AppliedMove),
    GameEnded(TerminalReason),
    /// Exactly one per failed decision.
    DecisionFailed { side: PlayerSide, error: TurnError },
    /// Full state snapshot after any mutation.
    StateChanged(SessionSnapshot),
    AutoPlayChanged(bool),
    /// Diagnostic note, shown only in debug mode.
    Debug(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedMove {
    pub side: PlayerSide,
    /// Full move number the move belongs to.
    pub move_number: u16,
    pub san: String,
    pub reasoning: String,
    /// Label of the move source ("Human" or the model).
    pub source: String,
    pub fen_after: String,
}
