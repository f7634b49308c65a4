use chess::{PlayerSide, Square, TerminalReason};
use tokio::sync::{broadcast, oneshot};

use super::events::SessionEvent;
use super::snapshot::SessionSnapshot;
use crate::error::{SessionError, TurnError};
use crate::player::PlayerConfig;

/// What a step request did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// A decision was requested for this side.
    Started(PlayerSide),
    /// A decision is already in flight; nothing happened.
    Busy,
    /// The side to move is human and the board is waiting for a drop.
    AwaitingHuman(PlayerSide),
    /// The game is over; nothing happened.
    GameOver(TerminalReason),
    /// No move source could be built for the side to move.
    Failed(TurnError),
}

/// Intents sent to the session actor. Each embeds a oneshot for the reply.
pub enum SessionCommand {
    Step {
        reply: oneshot::Sender<StepOutcome>,
    },
    SetAutoPlay {
        enabled: bool,
        reply: oneshot::Sender<bool>,
    },
    NewGame {
        fen: Option<String>,
        reply: oneshot::Sender<Result<SessionSnapshot, SessionError>>,
    },
    ConfigurePlayer {
        side: PlayerSide,
        player: PlayerConfig,
        reply: oneshot::Sender<SessionSnapshot>,
    },
    GetSnapshot {
        reply: oneshot::Sender<SessionSnapshot>,
    },
    GetLegalMoves {
        from: Option<Square>,
        reply: oneshot::Sender<Vec<String>>,
    },
    GetPgn {
        reply: oneshot::Sender<String>,
    },
    Subscribe {
        reply: oneshot::Sender<(SessionSnapshot, broadcast::Receiver<SessionEvent>)>,
    },
    Shutdown,
}
