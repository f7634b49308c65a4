//! End-to-end turn orchestration with scripted move sources.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use agent::{DecisionError, DecisionService, MoveDecision, MoveRequest, RetryPolicy, ServiceRegistry};
use arena::config::OrchestratorConfig;
use arena::source::HUMAN_REASONING;
use arena::{
    spawn_session, AgentMoveSource, ConfiguredSources, DropReply, HumanMoveSource, MemoryStore,
    MoveSource, MoveSourceProvider, PlayerConfig, SessionError, SessionEvent, SessionHandle,
    Settings, StepOutcome, TurnError, TurnPhase,
};
use async_trait::async_trait;
use chess::{Game, PlayerSide, Square, TerminalReason, STARTING_FEN};
use tokio::sync::{broadcast, Semaphore};
use tokio::time::{timeout, Instant};

/// Pops one reply per request. Optionally waits on a gate first.
struct Scripted {
    replies: Mutex<VecDeque<Result<MoveDecision, TurnError>>>,
    gate: Option<Arc<Semaphore>>,
    calls: AtomicUsize,
}

impl Scripted {
    fn new(moves: &[&str]) -> Arc<Self> {
        Self::with_gate(moves, None)
    }

    fn gated(moves: &[&str], gate: Arc<Semaphore>) -> Arc<Self> {
        Self::with_gate(moves, Some(gate))
    }

    fn with_gate(moves: &[&str], gate: Option<Arc<Semaphore>>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(
                moves
                    .iter()
                    .map(|mv| Ok(MoveDecision::new(*mv, format!("I like {mv}"))))
                    .collect(),
            ),
            gate,
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MoveSource for Scripted {
    async fn request_move(&self, _request: MoveRequest) -> Result<MoveDecision, TurnError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.acquire().await.unwrap().forget();
        }
        self.replies.lock().unwrap().pop_front().unwrap_or_else(|| {
            Err(TurnError::AgentUnavailable(DecisionError::Transport(
                "script exhausted".into(),
            )))
        })
    }

    fn label(&self) -> String {
        "script-1".to_string()
    }
}

struct FixedSources {
    white: Arc<dyn MoveSource>,
    black: Arc<dyn MoveSource>,
}

impl MoveSourceProvider for FixedSources {
    fn source_for(
        &self,
        side: PlayerSide,
        _player: &PlayerConfig,
    ) -> Result<Arc<dyn MoveSource>, TurnError> {
        Ok(match side {
            PlayerSide::White => Arc::clone(&self.white),
            PlayerSide::Black => Arc::clone(&self.black),
        })
    }
}

fn quick_config() -> OrchestratorConfig {
    OrchestratorConfig {
        autoplay_delay: Duration::from_millis(10),
        reply_delay: None,
        retry: RetryPolicy::once(),
    }
}

fn scripted_player() -> PlayerConfig {
    PlayerConfig::agent("scripted", "script-1", 0.5)
}

fn spawn(
    game: Game,
    players: [PlayerConfig; 2],
    white: Arc<dyn MoveSource>,
    black: Arc<dyn MoveSource>,
    config: OrchestratorConfig,
) -> SessionHandle {
    spawn_session(game, players, Arc::new(FixedSources { white, black }), config)
}

async fn wait_for(
    rx: &mut broadcast::Receiver<SessionEvent>,
    pred: impl Fn(&SessionEvent) -> bool,
) -> SessionEvent {
    timeout(Duration::from_secs(5), async {
        loop {
            match rx.recv().await {
                Ok(event) if pred(&event) => return event,
                Ok(_) => {}
                Err(e) => panic!("event stream failed: {e}"),
            }
        }
    })
    .await
    .expect("timed out waiting for session event")
}

fn drain(rx: &mut broadcast::Receiver<SessionEvent>) -> Vec<SessionEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

#[tokio::test]
async fn test_step_applies_legal_move() {
    let white = Scripted::new(&["e4"]);
    let black = Scripted::new(&[]);
    let handle = spawn(
        Game::new(),
        [scripted_player(), scripted_player()],
        white.clone(),
        black.clone(),
        quick_config(),
    );
    let (_, mut rx) = handle.subscribe().await.unwrap();

    assert_eq!(handle.step().await.unwrap(), StepOutcome::Started(PlayerSide::White));
    let SessionEvent::MoveApplied(applied) =
        wait_for(&mut rx, |e| matches!(e, SessionEvent::MoveApplied(_))).await
    else {
        unreachable!()
    };
    assert_eq!(applied.side, PlayerSide::White);
    assert_eq!(applied.move_number, 1);
    assert_eq!(applied.san, "e4");
    assert_eq!(applied.source, "script-1");
    assert_eq!(applied.reasoning, "I like e4");

    let snapshot = handle.get_snapshot().await.unwrap();
    assert_eq!(snapshot.side_to_move, PlayerSide::Black);
    assert_eq!(snapshot.ply_count, 1);
    assert_eq!(snapshot.phase, TurnPhase::Idle);
    assert_eq!(snapshot.last_move(), Some("e4"));
    assert_eq!(black.calls(), 0);
}

#[tokio::test]
async fn test_invalid_move_leaves_game_untouched() {
    let white = Scripted::new(&["e5"]);
    let handle = spawn(
        Game::new(),
        [scripted_player(), scripted_player()],
        white,
        Scripted::new(&[]),
        quick_config(),
    );
    let (_, mut rx) = handle.subscribe().await.unwrap();

    handle.step().await.unwrap();
    let event = wait_for(&mut rx, |e| matches!(e, SessionEvent::DecisionFailed { .. })).await;
    match event {
        SessionEvent::DecisionFailed {
            side,
            error: TurnError::InvalidMove { mv, legal_moves },
        } => {
            assert_eq!(side, PlayerSide::White);
            assert_eq!(mv, "e5");
            assert_eq!(legal_moves.len(), 20);
        }
        other => panic!("unexpected event {other:?}"),
    }

    let snapshot = handle.get_snapshot().await.unwrap();
    assert_eq!(snapshot.fen, STARTING_FEN);
    assert_eq!(snapshot.ply_count, 0);
    assert_eq!(snapshot.side_to_move, PlayerSide::White);
    assert_eq!(snapshot.phase, TurnPhase::Idle);

    let extra_failures = drain(&mut rx)
        .into_iter()
        .filter(|e| matches!(e, SessionEvent::DecisionFailed { .. }))
        .count();
    assert_eq!(extra_failures, 0);
}

#[tokio::test]
async fn test_failure_halts_autoplay() {
    let handle = spawn(
        Game::new(),
        [scripted_player(), scripted_player()],
        Scripted::new(&["Ke2"]),
        Scripted::new(&[]),
        quick_config(),
    );
    let (_, mut rx) = handle.subscribe().await.unwrap();

    assert!(handle.set_autoplay(true).await.unwrap());
    wait_for(&mut rx, |e| matches!(e, SessionEvent::DecisionFailed { .. })).await;
    wait_for(&mut rx, |e| matches!(e, SessionEvent::AutoPlayChanged(false))).await;
    let snapshot = handle.get_snapshot().await.unwrap();
    assert!(!snapshot.autoplay);
    assert_eq!(snapshot.ply_count, 0);
}

#[tokio::test]
async fn test_agent_source_failures_surface_once_after_retries() {
    struct Down {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl DecisionService for Down {
        async fn decide(&self, _request: &MoveRequest) -> Result<MoveDecision, DecisionError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(DecisionError::ServiceError {
                service: "Groq".into(),
                status: 503,
                status_text: "Service Unavailable".into(),
            })
        }

        fn label(&self) -> String {
            "down".into()
        }
    }

    let service = Arc::new(Down {
        calls: AtomicUsize::new(0),
    });
    let white = Arc::new(AgentMoveSource::new(
        service.clone(),
        RetryPolicy::new(3, Duration::from_millis(1)),
    ));
    let handle = spawn(
        Game::new(),
        [scripted_player(), scripted_player()],
        white,
        Scripted::new(&[]),
        quick_config(),
    );
    let (_, mut rx) = handle.subscribe().await.unwrap();

    handle.step().await.unwrap();
    let event = wait_for(&mut rx, |e| matches!(e, SessionEvent::DecisionFailed { .. })).await;
    let SessionEvent::DecisionFailed { error, .. } = event else {
        unreachable!()
    };
    assert_eq!(error.kind(), "AgentUnavailable");
    assert_eq!(error.to_string(), "Groq API Error: 503 Service Unavailable");
    assert_eq!(service.calls.load(Ordering::SeqCst), 3);

    handle.get_snapshot().await.unwrap();
    assert!(drain(&mut rx)
        .iter()
        .all(|e| !matches!(e, SessionEvent::DecisionFailed { .. })));
}

#[tokio::test]
async fn test_autoplay_stops_for_human_and_resumes_on_drop() {
    let (human, input) = HumanMoveSource::channel();
    let handle = spawn(
        Game::new(),
        [scripted_player(), PlayerConfig::human()],
        Scripted::new(&["e4"]),
        Arc::new(human),
        quick_config(),
    );
    let (_, mut rx) = handle.subscribe().await.unwrap();

    assert!(handle.set_autoplay(true).await.unwrap());
    wait_for(&mut rx, |e| matches!(e, SessionEvent::MoveApplied(_))).await;
    wait_for(&mut rx, |e| matches!(e, SessionEvent::AutoPlayChanged(false))).await;

    let snapshot = handle.get_snapshot().await.unwrap();
    assert!(!snapshot.autoplay);
    assert_eq!(snapshot.phase, TurnPhase::AwaitingDecision(PlayerSide::Black));

    assert_eq!(
        input.drop_piece(Square::E7, Square::E6, None).await,
        DropReply::Accepted("e6".into())
    );
    let SessionEvent::MoveApplied(applied) =
        wait_for(&mut rx, |e| matches!(e, SessionEvent::MoveApplied(_))).await
    else {
        unreachable!()
    };
    assert_eq!(applied.side, PlayerSide::Black);
    assert_eq!(applied.move_number, 1);
    assert_eq!(applied.source, "Human");
    assert_eq!(applied.reasoning, HUMAN_REASONING);
}

#[tokio::test]
async fn test_illegal_drop_snaps_back_without_failure() {
    let (human, input) = HumanMoveSource::channel();
    let handle = spawn(
        Game::new(),
        [PlayerConfig::human(), scripted_player()],
        Arc::new(human),
        Scripted::new(&[]),
        quick_config(),
    );
    let (snapshot, mut rx) = handle.subscribe().await.unwrap();
    assert_eq!(snapshot.phase, TurnPhase::AwaitingDecision(PlayerSide::White));

    assert_eq!(
        input.drop_piece(Square::E2, Square::E5, None).await,
        DropReply::SnapBack
    );
    let snapshot = handle.get_snapshot().await.unwrap();
    assert_eq!(snapshot.ply_count, 0);
    assert_eq!(snapshot.phase, TurnPhase::AwaitingDecision(PlayerSide::White));
    assert!(drain(&mut rx).is_empty());
}

#[tokio::test]
async fn test_game_over_is_final() {
    // After 1. f3 e5 2. g4, Black mates with Qh4#.
    let game =
        Game::from_fen("rnbqkbnr/pppp1ppp/8/4p3/6P1/5P2/PPPPP2P/RNBQKBNR b KQkq - 0 2").unwrap();
    let white = Scripted::new(&["a3"]);
    let black = Scripted::new(&["Qh4#"]);
    let handle = spawn(
        game,
        [scripted_player(), scripted_player()],
        white.clone(),
        black.clone(),
        quick_config(),
    );
    let (_, mut rx) = handle.subscribe().await.unwrap();

    assert_eq!(handle.step().await.unwrap(), StepOutcome::Started(PlayerSide::Black));
    let event = wait_for(&mut rx, |e| matches!(e, SessionEvent::GameEnded(_))).await;
    let mate = TerminalReason::Checkmate {
        winner: PlayerSide::Black,
    };
    assert!(matches!(event, SessionEvent::GameEnded(reason) if reason == mate));

    assert_eq!(handle.step().await.unwrap(), StepOutcome::GameOver(mate));
    assert!(!handle.set_autoplay(true).await.unwrap());
    assert!(handle.get_legal_moves(None).await.unwrap().is_empty());

    let snapshot = handle.get_snapshot().await.unwrap();
    assert_eq!(snapshot.phase, TurnPhase::GameOver(mate));
    assert_eq!(white.calls(), 0);
    assert_eq!(black.calls(), 1);
    assert!(handle.get_pgn().await.unwrap().contains("0-1"));
}

#[tokio::test]
async fn test_step_while_pending_is_busy() {
    let gate = Arc::new(Semaphore::new(0));
    let handle = spawn(
        Game::new(),
        [scripted_player(), scripted_player()],
        Scripted::gated(&["d4"], gate.clone()),
        Scripted::new(&[]),
        quick_config(),
    );
    let (_, mut rx) = handle.subscribe().await.unwrap();

    assert_eq!(handle.step().await.unwrap(), StepOutcome::Started(PlayerSide::White));
    assert_eq!(handle.step().await.unwrap(), StepOutcome::Busy);
    assert_eq!(
        handle.get_snapshot().await.unwrap().phase,
        TurnPhase::AwaitingDecision(PlayerSide::White)
    );

    gate.add_permits(1);
    wait_for(&mut rx, |e| matches!(e, SessionEvent::MoveApplied(_))).await;
    assert_eq!(handle.get_snapshot().await.unwrap().ply_count, 1);
}

#[tokio::test]
async fn test_disabling_autoplay_keeps_in_flight_move() {
    let gate = Arc::new(Semaphore::new(0));
    let black = Scripted::new(&["e5"]);
    let handle = spawn(
        Game::new(),
        [scripted_player(), scripted_player()],
        Scripted::gated(&["e4"], gate.clone()),
        black.clone(),
        quick_config(),
    );
    let (_, mut rx) = handle.subscribe().await.unwrap();

    assert!(handle.set_autoplay(true).await.unwrap());
    wait_for(&mut rx, |e| {
        matches!(e, SessionEvent::StateChanged(s) if s.phase == TurnPhase::AwaitingDecision(PlayerSide::White))
    })
    .await;
    assert!(!handle.set_autoplay(false).await.unwrap());

    gate.add_permits(1);
    wait_for(&mut rx, |e| matches!(e, SessionEvent::MoveApplied(_))).await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    let snapshot = handle.get_snapshot().await.unwrap();
    assert_eq!(snapshot.ply_count, 1);
    assert!(!snapshot.autoplay);
    assert_eq!(snapshot.phase, TurnPhase::Idle);
    assert_eq!(black.calls(), 0);
}

#[tokio::test]
async fn test_new_game_discards_in_flight_move() {
    let gate = Arc::new(Semaphore::new(0));
    let handle = spawn(
        Game::new(),
        [scripted_player(), scripted_player()],
        Scripted::gated(&["e4", "d4"], gate.clone()),
        Scripted::new(&[]),
        quick_config(),
    );
    let (_, mut rx) = handle.subscribe().await.unwrap();

    handle.step().await.unwrap();
    let snapshot = handle.new_game(None).await.unwrap();
    assert_eq!(snapshot.ply_count, 0);
    assert_eq!(snapshot.phase, TurnPhase::Idle);
    wait_for(&mut rx, |e| matches!(e, SessionEvent::GameStarted(_))).await;

    gate.add_permits(1);
    tokio::time::sleep(Duration::from_millis(50)).await;
    let snapshot = handle.get_snapshot().await.unwrap();
    assert_eq!(snapshot.fen, STARTING_FEN);
    assert!(drain(&mut rx)
        .iter()
        .all(|e| !matches!(e, SessionEvent::MoveApplied(_))));
}

#[tokio::test]
async fn test_new_game_rejects_bad_fen() {
    let handle = spawn(
        Game::new(),
        [scripted_player(), scripted_player()],
        Scripted::new(&[]),
        Scripted::new(&[]),
        quick_config(),
    );
    let err = handle
        .new_game(Some("not a position".into()))
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::InvalidFen(_)));

    let snapshot = handle
        .new_game(Some("4k3/8/8/8/8/8/8/4K2R b K - 0 1".into()))
        .await
        .unwrap();
    assert_eq!(snapshot.side_to_move, PlayerSide::Black);
}

#[tokio::test(start_paused = true)]
async fn test_agent_answers_human_after_reply_delay() {
    let (human, input) = HumanMoveSource::channel();
    let config = OrchestratorConfig {
        reply_delay: Some(Duration::from_millis(500)),
        ..quick_config()
    };
    let handle = spawn(
        Game::new(),
        [PlayerConfig::human(), scripted_player()],
        Arc::new(human),
        Scripted::new(&["c5"]),
        config,
    );
    let (_, mut rx) = handle.subscribe().await.unwrap();

    assert_eq!(
        input.drop_piece(Square::E2, Square::E4, None).await,
        DropReply::Accepted("e4".into())
    );
    wait_for(&mut rx, |e| matches!(e, SessionEvent::MoveApplied(m) if m.side == PlayerSide::White)).await;
    let human_moved = Instant::now();

    let SessionEvent::MoveApplied(reply) = wait_for(&mut rx, |e| {
        matches!(e, SessionEvent::MoveApplied(m) if m.side == PlayerSide::Black)
    })
    .await
    else {
        unreachable!()
    };
    assert_eq!(reply.san, "c5");
    assert!(human_moved.elapsed() >= Duration::from_millis(500));

    let snapshot = handle.get_snapshot().await.unwrap();
    assert_eq!(snapshot.phase, TurnPhase::AwaitingDecision(PlayerSide::White));
}

#[tokio::test(start_paused = true)]
async fn test_agent_opens_when_playing_white() {
    let config = OrchestratorConfig {
        reply_delay: Some(Duration::from_millis(500)),
        ..quick_config()
    };
    let white = Scripted::new(&["Nf3"]);
    let handle = spawn(
        Game::new(),
        [scripted_player(), scripted_player()],
        white.clone(),
        Scripted::new(&[]),
        config,
    );
    let (_, mut rx) = handle.subscribe().await.unwrap();

    wait_for(&mut rx, |e| matches!(e, SessionEvent::MoveApplied(_))).await;
    assert_eq!(white.calls(), 1);
    assert_eq!(handle.get_snapshot().await.unwrap().last_move(), Some("Nf3"));
}

#[tokio::test]
async fn test_missing_credential_is_misconfigured() {
    let mut openai = ServiceRegistry::builtin().get("openai").unwrap().clone();
    openai.api_key_env = "CHESS_ARENA_TEST_KEY_THAT_IS_NEVER_SET".into();
    let settings = Arc::new(Settings::new(
        Box::new(MemoryStore::new()),
        ServiceRegistry::new(vec![openai]),
    ));
    let (human, _input) = HumanMoveSource::channel();
    let provider = Arc::new(ConfiguredSources::new(settings, human, RetryPolicy::once()));
    let handle = spawn_session(
        Game::new(),
        [PlayerConfig::agent("openai", "gpt-4o", 0.5), PlayerConfig::human()],
        provider,
        quick_config(),
    );
    let (_, mut rx) = handle.subscribe().await.unwrap();

    let outcome = handle.step().await.unwrap();
    assert!(matches!(
        outcome,
        StepOutcome::Failed(TurnError::Misconfigured {
            side: PlayerSide::White,
            source: DecisionError::MissingCredential(_),
        })
    ));
    wait_for(&mut rx, |e| matches!(e, SessionEvent::DecisionFailed { .. })).await;
    let snapshot = handle.get_snapshot().await.unwrap();
    assert_eq!(snapshot.phase, TurnPhase::Idle);
    assert_eq!(snapshot.ply_count, 0);
}

#[tokio::test]
async fn test_switching_player_to_human_arms_input() {
    let (human, input) = HumanMoveSource::channel();
    let handle = spawn(
        Game::new(),
        [scripted_player(), scripted_player()],
        Arc::new(human),
        Scripted::new(&[]),
        quick_config(),
    );

    let snapshot = handle
        .configure_player(PlayerSide::White, PlayerConfig::human())
        .await
        .unwrap();
    assert!(snapshot.player(PlayerSide::White).is_human());
    assert_eq!(snapshot.phase, TurnPhase::AwaitingDecision(PlayerSide::White));
    assert_eq!(
        input.drop_piece(Square::G1, Square::F3, None).await,
        DropReply::Accepted("Nf3".into())
    );
}
