use agent::DecisionError;
use chess::PlayerSide;

/// Why a turn did not produce an applied move.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TurnError {
    /// The rules rejected a move that had passed validation. Internal fault.
    #[error("Rules rejected move {0}")]
    IllegalMove(String),

    /// A decision named a move outside the legal set.
    #[error("Invalid move: {mv}. Must be one of: {}", .legal_moves.join(", "))]
    InvalidMove { mv: String, legal_moves: Vec<String> },

    /// The decision service kept failing; carries the last failure.
    #[error("{0}")]
    AgentUnavailable(DecisionError),

    /// The player could not be turned into a move source (no key, unknown model).
    #[error("{side} player is not configured: {source}")]
    Misconfigured {
        side: PlayerSide,
        #[source]
        source: DecisionError,
    },

    /// The request carried a position that does not parse.
    #[error("Unreadable position: {0}")]
    UnreadablePosition(String),

    /// Nobody is left to send human moves.
    #[error("Human input closed")]
    InputClosed,
}

impl TurnError {
    /// Short failure kind for log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::IllegalMove(_) => "IllegalMove",
            Self::InvalidMove { .. } => "InvalidMove",
            Self::AgentUnavailable(_) => "AgentUnavailable",
            Self::Misconfigured { .. } => "Misconfigured",
            Self::UnreadablePosition(_) => "UnreadablePosition",
            Self::InputClosed => "InputClosed",
        }
    }

    /// Internal consistency faults, as opposed to ordinary decision failures.
    pub fn is_internal(&self) -> bool {
        matches!(self, Self::IllegalMove(_) | Self::UnreadablePosition(_))
    }
}

/// Errors from the session handle itself (not from a turn).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("Invalid FEN: {0}")]
    InvalidFen(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agent_unavailable_keeps_last_error_message() {
        let err = TurnError::AgentUnavailable(DecisionError::Transport("timed out".into()));
        assert_eq!(err.to_string(), "Request failed: timed out");
        assert_eq!(err.kind(), "AgentUnavailable");
        assert!(!err.is_internal());
        assert!(TurnError::IllegalMove("e4".into()).is_internal());
    }

    #[test]
    fn test_unreadable_position_has_its_own_kind() {
        let unreadable = TurnError::UnreadablePosition("Invalid FEN format: x".into());
        assert_eq!(unreadable.kind(), "UnreadablePosition");
        assert_eq!(unreadable.to_string(), "Unreadable position: Invalid FEN format: x");
        assert!(unreadable.is_internal());
    }
}
