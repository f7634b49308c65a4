use std::sync::Arc;
use std::time::Duration;

use agent::MoveDecision;
use chess::{Game, PlayerSide};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, Interval, MissedTickBehavior};

use super::snapshot::{SessionSnapshot, TurnPhase};
use crate::config::OrchestratorConfig;
use crate::error::TurnError;
use crate::player::PlayerConfig;
use crate::source::MoveSourceProvider;

/// Internal mutable state, owned entirely by the session actor. No locks.
pub(crate) struct SessionState {
    pub session_id: String,
    pub game: Game,
    pub players: [PlayerConfig; 2],
    pub config: OrchestratorConfig,
    pub provider: Arc<dyn MoveSourceProvider>,
    pub autoplay: AutoPlayLoop,
    /// At most one decision in flight.
    pub pending: Option<PendingDecision>,
    /// Bumped whenever an in-flight request is abandoned; outcomes carrying
    /// an older value are dropped.
    pub generation: u64,
    /// When the scheduled agent reply to a human move fires.
    pub reply_at: Option<Instant>,
    pub outcome_tx: mpsc::Sender<DecisionOutcome>,
}

pub(crate) struct PendingDecision {
    pub side: PlayerSide,
    pub task: JoinHandle<()>,
}

/// Result of a spawned move request, sent back to the actor.
pub(crate) struct DecisionOutcome {
    pub generation: u64,
    pub side: PlayerSide,
    pub label: String,
    pub result: Result<MoveDecision, TurnError>,
}

/// Auto-play controller. The interval exists only while active.
pub(crate) struct AutoPlayLoop {
    pub active: bool,
    delay: Duration,
    timer: Option<Interval>,
}

impl AutoPlayLoop {
    pub fn new(delay: Duration) -> Self {
        Self {
            active: false,
            delay,
            timer: None,
        }
    }

    /// First tick fires one delay from now.
    pub fn start(&mut self) {
        let delay = self.delay.max(Duration::from_millis(1));
        let mut timer = time::interval_at(Instant::now() + delay, delay);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.timer = Some(timer);
        self.active = true;
    }

    /// Returns whether it was running.
    pub fn stop(&mut self) -> bool {
        self.timer = None;
        std::mem::replace(&mut self.active, false)
    }

    pub async fn tick(&mut self) {
        match self.timer.as_mut() {
            Some(timer) => {
                timer.tick().await;
            }
            None => std::future::pending().await,
        }
    }
}

impl SessionState {
    pub fn new(
        session_id: String,
        game: Game,
        players: [PlayerConfig; 2],
        config: OrchestratorConfig,
        provider: Arc<dyn MoveSourceProvider>,
        outcome_tx: mpsc::Sender<DecisionOutcome>,
    ) -> Self {
        Self {
            session_id,
            game,
            players,
            autoplay: AutoPlayLoop::new(config.autoplay_delay),
            config,
            provider,
            pending: None,
            generation: 0,
            reply_at: None,
            outcome_tx,
        }
    }

    pub fn player(&self, side: PlayerSide) -> &PlayerConfig {
        &self.players[side.index()]
    }

    /// Abandon the in-flight request, if any. Its outcome will be discarded.
    pub fn abort_pending(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.task.abort();
            self.generation += 1;
            tracing::debug!(side = %pending.side, "Abandoned in-flight decision");
        }
    }

    pub fn phase(&self) -> TurnPhase {
        if let Some(reason) = self.game.terminal_reason() {
            return TurnPhase::GameOver(reason);
        }
        match &self.pending {
            Some(pending) => TurnPhase::AwaitingDecision(pending.side),
            None => TurnPhase::Idle,
        }
    }

    /// Build a full snapshot of the current state.
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            session_id: self.session_id.clone(),
            fen: self.game.fen(),
            side_to_move: self.game.side_to_move(),
            move_number: self.game.move_number(),
            ply_count: self.game.ply_count(),
            status: self.game.status(),
            phase: self.phase(),
            autoplay: self.autoplay.active,
            players: self.players.clone(),
            history: self.game.history_san(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_autoplay_first_tick_after_delay() {
        let mut autoplay = AutoPlayLoop::new(Duration::from_secs(1));
        let start = Instant::now();
        autoplay.start();
        autoplay.tick().await;
        assert!(start.elapsed() >= Duration::from_secs(1));
        assert!(autoplay.stop());
        assert!(!autoplay.stop());
    }
}
