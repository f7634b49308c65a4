use chess::{GameStatus, PlayerSide, TerminalReason};

use crate::player::PlayerConfig;

/// Where the orchestrator is between commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnPhase {
    Idle,
    AwaitingDecision(PlayerSide),
    GameOver(TerminalReason),
}

/// Complete, immutable snapshot of session state.
/// Sent to subscribers on every state change and on subscribe.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub session_id: String,
    pub fen: String,
    pub side_to_move: PlayerSide,
    pub move_number: u16,
    pub ply_count: usize,
    pub status: GameStatus,
    pub phase: TurnPhase,
    pub autoplay: bool,
    pub players: [PlayerConfig; 2],
    pub history: Vec<String>,
}

impl SessionSnapshot {
    pub fn player(&self, side: PlayerSide) -> &PlayerConfig {
        &self.players[side.index()]
    }

    pub fn last_move(&self) -> Option<&str> {
        self.history.last().map(String::as_str)
    }
}
