//! Presentation-side move log: moves with their reasoning, errors, game
//! messages and debug notes. Newest entry first.

use std::collections::VecDeque;
use std::fmt;

use chess::PlayerSide;

use crate::session::SessionEvent;

const DEFAULT_CAPACITY: usize = 500;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogEntry {
    Move {
        side: PlayerSide,
        move_number: u16,
        san: String,
        source: String,
        reasoning: String,
    },
    Error(String),
    Game(String),
    Debug(String),
}

impl LogEntry {
    pub fn is_debug(&self) -> bool {
        matches!(self, Self::Debug(_))
    }
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Move {
                side,
                move_number,
                san,
                source,
                reasoning,
            } => write!(
                f,
                "{} Move {}: {} ({})\nReasoning: {}",
                side.title(),
                move_number,
                san,
                source,
                reasoning
            ),
            Self::Error(message) => write!(f, "Error: {message}"),
            Self::Game(message) => write!(f, "Game: {message}"),
            Self::Debug(message) => write!(f, "[DEBUG]: {message}"),
        }
    }
}

pub struct MoveLog {
    entries: VecDeque<LogEntry>,
    capacity: usize,
    debug: bool,
}

impl Default for MoveLog {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl MoveLog {
    /// Oldest entries are dropped past `capacity`.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            capacity: capacity.max(1),
            debug: false,
        }
    }

    pub fn debug_enabled(&self) -> bool {
        self.debug
    }

    /// Toggle debug mode. The note about it is itself a debug entry, so it
    /// only shows when turning debug on.
    pub fn set_debug(&mut self, enabled: bool) -> Option<LogEntry> {
        self.debug = enabled;
        let state = if enabled { "enabled" } else { "disabled" };
        self.push(LogEntry::Debug(format!("Debug mode {state}")))
    }

    /// Add an entry at the front. Debug entries are dropped unless debug
    /// mode is on. Returns the entry if it was kept.
    pub fn push(&mut self, entry: LogEntry) -> Option<LogEntry> {
        if entry.is_debug() && !self.debug {
            return None;
        }
        self.entries.push_front(entry.clone());
        self.entries.truncate(self.capacity);
        Some(entry)
    }

    /// Turn a session event into log entries. Returns the entries that were
    /// kept, oldest first.
    pub fn record(&mut self, event: &SessionEvent) -> Vec<LogEntry> {
        let candidates = match event {
            SessionEvent::GameStarted(_) => {
                self.clear();
                Vec::new()
            }
            SessionEvent::MoveApplied(applied) => vec![LogEntry::Move {
                side: applied.side,
                move_number: applied.move_number,
                san: applied.san.clone(),
                source: applied.source.clone(),
                reasoning: applied.reasoning.clone(),
            }],
            SessionEvent::GameEnded(reason) => vec![
                LogEntry::Game(reason.to_string()),
                LogEntry::Debug(format!("Game over: {reason}")),
            ],
            SessionEvent::DecisionFailed { error, .. } => vec![LogEntry::Error(error.to_string())],
            SessionEvent::Debug(message) => vec![LogEntry::Debug(message.clone())],
            SessionEvent::StateChanged(_) | SessionEvent::AutoPlayChanged(_) => Vec::new(),
        };
        candidates
            .into_iter()
            .filter_map(|entry| self.push(entry))
            .collect()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Newest first.
    pub fn entries(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter()
    }

    pub fn latest(&self) -> Option<&LogEntry> {
        self.entries.front()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TurnError;
    use crate::session::AppliedMove;
    use chess::TerminalReason;

    fn applied(side: PlayerSide, move_number: u16, san: &str) -> SessionEvent {
        SessionEvent::MoveApplied(AppliedMove {
            side,
            move_number,
            san: san.to_string(),
            reasoning: "Controls the centre".to_string(),
            source: "gpt-4o".to_string(),
            fen_after: String::new(),
        })
    }

    #[test]
    fn test_move_entry_format() {
        let mut log = MoveLog::default();
        log.record(&applied(PlayerSide::White, 1, "e4"));
        assert_eq!(
            log.latest().unwrap().to_string(),
            "White Move 1: e4 (gpt-4o)\nReasoning: Controls the centre"
        );
    }

    #[test]
    fn test_newest_first() {
        let mut log = MoveLog::default();
        log.record(&applied(PlayerSide::White, 1, "e4"));
        log.record(&applied(PlayerSide::Black, 1, "e5"));
        let sans: Vec<_> = log
            .entries()
            .map(|e| match e {
                LogEntry::Move { san, .. } => san.as_str(),
                _ => "",
            })
            .collect();
        assert_eq!(sans, vec!["e5", "e4"]);
    }

    #[test]
    fn test_debug_entries_need_debug_mode() {
        let mut log = MoveLog::default();
        assert!(log
            .record(&SessionEvent::Debug("Starting new game".into()))
            .is_empty());
        assert!(log.is_empty());

        let shown = log.set_debug(true);
        assert_eq!(shown.unwrap().to_string(), "[DEBUG]: Debug mode enabled");
        log.record(&SessionEvent::Debug("Settings loaded".into()));
        assert_eq!(log.len(), 2);
        assert!(log.set_debug(false).is_none());
    }

    #[test]
    fn test_failure_and_game_over_entries() {
        let mut log = MoveLog::default();
        let kept = log.record(&SessionEvent::DecisionFailed {
            side: PlayerSide::Black,
            error: TurnError::InvalidMove {
                mv: "e5".into(),
                legal_moves: vec!["a3".into(), "e4".into()],
            },
        });
        assert_eq!(
            kept[0].to_string(),
            "Error: Invalid move: e5. Must be one of: a3, e4"
        );

        let kept = log.record(&SessionEvent::GameEnded(TerminalReason::Checkmate {
            winner: PlayerSide::Black,
        }));
        assert_eq!(kept, vec![LogEntry::Game("Checkmate! Black wins".into())]);
    }

    #[test]
    fn test_new_game_clears_and_capacity_bounds() {
        let mut log = MoveLog::new(2);
        log.record(&applied(PlayerSide::White, 1, "e4"));
        log.record(&applied(PlayerSide::Black, 1, "e5"));
        log.record(&applied(PlayerSide::White, 2, "Nf3"));
        assert_eq!(log.len(), 2);
        log.record(&SessionEvent::GameStarted(chess::STARTING_FEN.into()));
        assert!(log.is_empty());
    }
}
