//! The turn orchestrator, run as an actor task per game session.
//!
//! All game state lives inside the actor; callers talk to it through a
//! [`SessionHandle`] and observe it through broadcast [`SessionEvent`]s.
//! Move requests run as spawned tasks whose results come back to the actor
//! as messages, so the actor never blocks on a decision.

mod actor;
mod commands;
mod events;
mod handle;
mod snapshot;
mod state;

use std::sync::Arc;

use chess::Game;
use tokio::sync::{broadcast, mpsc};
use uuid::Uuid;

use crate::config::OrchestratorConfig;
use crate::player::PlayerConfig;
use crate::source::MoveSourceProvider;
use actor::run_session_actor;
pub use commands::StepOutcome;
pub use events::{AppliedMove, SessionEvent};
pub use handle::SessionHandle;
pub use snapshot::{SessionSnapshot, TurnPhase};
use state::SessionState;

/// Spawn a session actor for `game` and return its handle.
pub fn spawn_session(
    game: Game,
    players: [PlayerConfig; 2],
    provider: Arc<dyn MoveSourceProvider>,
    config: OrchestratorConfig,
) -> SessionHandle {
    let session_id = Uuid::new_v4().to_string();
    let (cmd_tx, cmd_rx) = mpsc::channel(32);
    let (event_tx, _) = broadcast::channel(256);
    let (outcome_tx, outcome_rx) = mpsc::channel(4);

    let state = SessionState::new(
        session_id.clone(),
        game,
        players,
        config,
        provider,
        outcome_tx,
    );
    tokio::spawn(run_session_actor(state, cmd_rx, outcome_rx, event_tx));

    SessionHandle::new(session_id, cmd_tx)
}
