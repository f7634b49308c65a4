use agent::{MoveDecision, MoveRequest};
use chess::{Game, PgnTags, PlayerSide};
use tokio::sync::{broadcast, mpsc};
use tokio::time::{self, Instant};
use tracing::Instrument;

use super::commands::{SessionCommand, StepOutcome};
use super::events::{AppliedMove, SessionEvent};
use super::state::{DecisionOutcome, PendingDecision, SessionState};
use crate::error::{SessionError, TurnError};

/// What asked for a step. Only a manual step may re-arm a human turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trigger {
    Manual,
    AutoPlay,
    Reply,
}

/// The main session actor loop.
/// Owns all mutable state. Processes commands and decision outcomes sequentially.
pub(crate) async fn run_session_actor(
    state: SessionState,
    cmd_rx: mpsc::Receiver<SessionCommand>,
    outcome_rx: mpsc::Receiver<DecisionOutcome>,
    event_tx: broadcast::Sender<SessionEvent>,
) {
    let session_id = state.session_id.clone();
    run_session_actor_inner(state, cmd_rx, outcome_rx, event_tx)
        .instrument(tracing::info_span!("session", id = %session_id))
        .await;
}

async fn run_session_actor_inner(
    mut state: SessionState,
    mut cmd_rx: mpsc::Receiver<SessionCommand>,
    mut outcome_rx: mpsc::Receiver<DecisionOutcome>,
    event_tx: broadcast::Sender<SessionEvent>,
) {
    tracing::info!("Session actor started");

    start_position(&mut state, &event_tx);

    loop {
        tokio::select! {
            biased;

            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(SessionCommand::Shutdown) | None => {
                        tracing::info!("Session actor shutting down");
                        state.abort_pending();
                        break;
                    }
                    Some(cmd) => handle_command(&mut state, cmd, &event_tx),
                }
            }

            Some(outcome) = outcome_rx.recv() => {
                handle_outcome(&mut state, outcome, &event_tx);
            }

            _ = state.autoplay.tick(), if state.autoplay.active => {
                if let StepOutcome::Started(_) = try_step(&mut state, Trigger::AutoPlay, &event_tx) {
                    publish_state(&state, &event_tx);
                }
            }

            _ = sleep_until(state.reply_at), if state.reply_at.is_some() => {
                state.reply_at = None;
                if let StepOutcome::Started(_) = try_step(&mut state, Trigger::Reply, &event_tx) {
                    publish_state(&state, &event_tx);
                }
            }
        }
    }

    tracing::info!("Session actor exited");
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

fn handle_command(
    state: &mut SessionState,
    cmd: SessionCommand,
    event_tx: &broadcast::Sender<SessionEvent>,
) {
    match cmd {
        SessionCommand::Step { reply } => {
            let outcome = try_step(state, Trigger::Manual, event_tx);
            if matches!(
                outcome,
                StepOutcome::Started(_) | StepOutcome::AwaitingHuman(_)
            ) {
                publish_state(state, event_tx);
            }
            let _ = reply.send(outcome);
        }
        SessionCommand::SetAutoPlay { enabled, reply } => {
            let changed = if enabled && !state.autoplay.active {
                if state.game.is_game_over() {
                    false
                } else {
                    state.autoplay.start();
                    true
                }
            } else if !enabled {
                state.autoplay.stop()
            } else {
                false
            };
            if changed {
                tracing::info!(enabled = state.autoplay.active, "Auto-play toggled");
                let _ = event_tx.send(SessionEvent::AutoPlayChanged(state.autoplay.active));
            }
            let _ = reply.send(state.autoplay.active);
        }
        SessionCommand::NewGame { fen, reply } => {
            let game = match fen {
                Some(ref f) => match Game::from_fen(f) {
                    Ok(game) => game,
                    Err(e) => {
                        let _ = reply.send(Err(SessionError::InvalidFen(e.to_string())));
                        return;
                    }
                },
                None => Game::new(),
            };
            state.abort_pending();
            state.reply_at = None;
            halt_autoplay(state, event_tx);
            state.game = game;
            tracing::info!(fen = %state.game.fen(), "New game");
            let _ = event_tx.send(SessionEvent::GameStarted(state.game.fen()));
            let _ = event_tx.send(SessionEvent::Debug("Starting new game".to_string()));
            start_position(state, event_tx);
            let snapshot = state.snapshot();
            let _ = event_tx.send(SessionEvent::StateChanged(snapshot.clone()));
            let _ = reply.send(Ok(snapshot));
        }
        SessionCommand::ConfigurePlayer {
            side,
            player,
            reply,
        } => {
            let kind_changed = state.player(side).kind != player.kind;
            let _ = event_tx.send(SessionEvent::Debug(format!(
                "{} player set to {} ({})",
                side.title(),
                player.kind,
                player.label()
            )));
            state.players[side.index()] = player;
            if kind_changed && state.pending.as_ref().is_some_and(|p| p.side == side) {
                state.abort_pending();
            }
            arm_human(state, event_tx);
            let snapshot = state.snapshot();
            let _ = event_tx.send(SessionEvent::StateChanged(snapshot.clone()));
            let _ = reply.send(snapshot);
        }
        SessionCommand::GetSnapshot { reply } => {
            let _ = reply.send(state.snapshot());
        }
        SessionCommand::GetLegalMoves { from, reply } => {
            let moves = match from {
                Some(square) => state.game.legal_moves_from(square),
                None => state.game.legal_moves(),
            };
            let _ = reply.send(moves);
        }
        SessionCommand::GetPgn { reply } => {
            let tags = PgnTags {
                event: Some("LLM Chess Arena".to_string()),
                white: Some(state.player(PlayerSide::White).label()),
                black: Some(state.player(PlayerSide::Black).label()),
                ..Default::default()
            };
            let _ = reply.send(state.game.to_pgn(&tags));
        }
        SessionCommand::Subscribe { reply } => {
            let snapshot = state.snapshot();
            let rx = event_tx.subscribe();
            let _ = reply.send((snapshot, rx));
        }
        SessionCommand::Shutdown => unreachable!(),
    }
}

/// Entry into a fresh position: wait for the human, or schedule the agent's
/// opening reply.
fn start_position(state: &mut SessionState, event_tx: &broadcast::Sender<SessionEvent>) {
    if state.game.is_game_over() {
        return;
    }
    let side = state.game.side_to_move();
    if state.player(side).is_human() {
        arm_human(state, event_tx);
    } else if let Some(delay) = state.config.reply_delay {
        state.reply_at = Some(Instant::now() + delay);
    }
}

/// Ask the human for a move if it is their turn and nothing is in flight.
fn arm_human(state: &mut SessionState, event_tx: &broadcast::Sender<SessionEvent>) {
    if state.pending.is_some() || state.game.is_game_over() {
        return;
    }
    let side = state.game.side_to_move();
    if state.player(side).is_human() {
        if let Err(error) = start_request(state, side) {
            fail(state, side, error, event_tx);
        }
    }
}

fn try_step(
    state: &mut SessionState,
    trigger: Trigger,
    event_tx: &broadcast::Sender<SessionEvent>,
) -> StepOutcome {
    if let Some(reason) = state.game.terminal_reason() {
        halt_autoplay(state, event_tx);
        return StepOutcome::GameOver(reason);
    }

    let side = state.game.side_to_move();
    let human = state.player(side).is_human();

    if let Some(pending) = &state.pending {
        let waiting_on_human = state.player(pending.side).is_human();
        if waiting_on_human && trigger == Trigger::AutoPlay {
            halt_autoplay(state, event_tx);
        }
        return if waiting_on_human {
            StepOutcome::AwaitingHuman(side)
        } else {
            StepOutcome::Busy
        };
    }

    if human {
        match trigger {
            Trigger::AutoPlay => halt_autoplay(state, event_tx),
            Trigger::Manual => {
                if let Err(error) = start_request(state, side) {
                    fail(state, side, error.clone(), event_tx);
                    return StepOutcome::Failed(error);
                }
            }
            Trigger::Reply => {}
        }
        return StepOutcome::AwaitingHuman(side);
    }

    match start_request(state, side) {
        Ok(()) => StepOutcome::Started(side),
        Err(error) => {
            fail(state, side, error.clone(), event_tx);
            StepOutcome::Failed(error)
        }
    }
}

/// Spawn a move request for `side` against a freshly built request.
fn start_request(state: &mut SessionState, side: PlayerSide) -> Result<(), TurnError> {
    let player = state.player(side).clone();
    let source = state.provider.source_for(side, &player)?;
    let label = source.label();

    let request = MoveRequest {
        position: state.game.fen(),
        history: state.game.history_san(),
        legal_moves: state.game.legal_moves(),
    };
    let generation = state.generation;
    let outcome_tx = state.outcome_tx.clone();

    tracing::debug!(%side, source = %label, legal = request.legal_moves.len(), "Requesting move");
    let task = tokio::spawn(
        async move {
            let result = source.request_move(request).await;
            let _ = outcome_tx
                .send(DecisionOutcome {
                    generation,
                    side,
                    label,
                    result,
                })
                .await;
        }
        .in_current_span(),
    );
    state.pending = Some(PendingDecision { side, task });
    Ok(())
}

fn handle_outcome(
    state: &mut SessionState,
    outcome: DecisionOutcome,
    event_tx: &broadcast::Sender<SessionEvent>,
) {
    if outcome.generation != state.generation {
        tracing::debug!(side = %outcome.side, "Discarding decision from an abandoned request");
        return;
    }
    state.pending = None;

    match outcome.result {
        Ok(decision) => apply_decision(state, outcome.side, outcome.label, decision, event_tx),
        Err(error) => fail(state, outcome.side, error, event_tx),
    }
    publish_state(state, event_tx);
}

/// Validate against the legal moves of the current position, then apply.
fn apply_decision(
    state: &mut SessionState,
    side: PlayerSide,
    source: String,
    decision: MoveDecision,
    event_tx: &broadcast::Sender<SessionEvent>,
) {
    let legal = state.game.legal_moves();
    if state.game.side_to_move() != side || !legal.contains(&decision.mv) {
        fail(
            state,
            side,
            TurnError::InvalidMove {
                mv: decision.mv,
                legal_moves: legal,
            },
            event_tx,
        );
        return;
    }

    let move_number = state.game.move_number();
    let entry = match state.game.apply_san(&decision.mv) {
        Ok(entry) => entry,
        Err(e) => {
            tracing::error!(error = %e, "Rules rejected a validated move");
            fail(state, side, TurnError::IllegalMove(decision.mv), event_tx);
            return;
        }
    };

    tracing::info!(%side, san = %entry.san, source = %source, "Move applied");
    let _ = event_tx.send(SessionEvent::MoveApplied(AppliedMove {
        side,
        move_number,
        san: entry.san,
        reasoning: decision.reasoning,
        source,
        fen_after: entry.fen_after,
    }));
    state.reply_at = None;

    if let Some(reason) = state.game.terminal_reason() {
        tracing::info!(%reason, "Game over");
        halt_autoplay(state, event_tx);
        let _ = event_tx.send(SessionEvent::GameEnded(reason));
        return;
    }

    let next = state.game.side_to_move();
    if state.player(next).is_human() {
        halt_autoplay(state, event_tx);
        arm_human(state, event_tx);
    } else if state.player(side).is_human() && !state.autoplay.active {
        if let Some(delay) = state.config.reply_delay {
            state.reply_at = Some(Instant::now() + delay);
        }
    }
}

/// Surface a failed decision: one event, auto-play halted, game untouched.
fn fail(
    state: &mut SessionState,
    side: PlayerSide,
    error: TurnError,
    event_tx: &broadcast::Sender<SessionEvent>,
) {
    if error.is_internal() {
        tracing::error!(%side, kind = error.kind(), %error, "Decision failed");
    } else {
        tracing::warn!(%side, kind = error.kind(), %error, "Decision failed");
    }
    let _ = event_tx.send(SessionEvent::DecisionFailed { side, error });
    halt_autoplay(state, event_tx);
}

fn halt_autoplay(state: &mut SessionState, event_tx: &broadcast::Sender<SessionEvent>) {
    if state.autoplay.stop() {
        tracing::info!("Auto-play halted");
        let _ = event_tx.send(SessionEvent::AutoPlayChanged(false));
    }
}

fn publish_state(state: &SessionState, event_tx: &broadcast::Sender<SessionEvent>) {
    let _ = event_tx.send(SessionEvent::StateChanged(state.snapshot()));
}
