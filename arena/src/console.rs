//! Line-oriented console: each line becomes one intent for the session.
//! Log entries are printed as the session reports them.

use std::sync::{Arc, Mutex};

use chess::{parse_coordinate_move, parse_square, Piece, PlayerSide, Square};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::log::{LogEntry, MoveLog};
use crate::player::PlayerKind;
use crate::session::{SessionEvent, SessionHandle, SessionSnapshot, StepOutcome, TurnPhase};
use crate::settings::Settings;
use crate::source::{DropReply, HumanInput};

const HELP: &str = "\
Commands:
  e2e4 | e2 e4 | a7a8n     move for a human side
  step                     ask the side to move for a move
  auto on|off              start or stop auto-play
  new [FEN]                start a new game
  moves [SQUARE]           legal moves, optionally from one square
  pgn                      print the game as PGN
  status                   turn, move number and players
  log                      print the move log, newest first
  debug on|off             show or hide debug entries
  player white|black human|agent [SERVICE [MODEL [TEMP]]]
  key SERVICE set KEY | key SERVICE clear
  help                     this text
  quit";

/// One parsed console line.
#[derive(Debug, Clone, PartialEq)]
pub enum Intent {
    Move {
        from: Square,
        to: Square,
        promotion: Option<Piece>,
    },
    Step,
    AutoPlay(bool),
    NewGame(Option<String>),
    Moves(Option<Square>),
    Pgn,
    Status,
    Log,
    Debug(bool),
    Player {
        side: PlayerSide,
        kind: PlayerKind,
        service: Option<String>,
        model: Option<String>,
        temperature: Option<f32>,
    },
    SetKey {
        service: String,
        key: String,
    },
    ClearKey(String),
    Help,
    Quit,
}

fn on_off(word: Option<&str>) -> Result<bool, String> {
    match word.map(str::to_ascii_lowercase).as_deref() {
        Some("on") | Some("true") | Some("1") => Ok(true),
        Some("off") | Some("false") | Some("0") => Ok(false),
        _ => Err("expected on or off".to_string()),
    }
}

/// Parse one line. Empty lines give `Ok(None)`.
pub fn parse_intent(line: &str) -> Result<Option<Intent>, String> {
    let line = line.trim();
    let mut words = line.split_whitespace();
    let Some(first) = words.next() else {
        return Ok(None);
    };

    let intent = match first.to_ascii_lowercase().as_str() {
        "step" | "s" => Intent::Step,
        "auto" => Intent::AutoPlay(on_off(words.next())?),
        "new" => {
            let fen = words.collect::<Vec<_>>().join(" ");
            Intent::NewGame((!fen.is_empty()).then_some(fen))
        }
        "moves" => match words.next() {
            Some(sq) => Intent::Moves(Some(
                parse_square(sq).ok_or_else(|| format!("not a square: {sq}"))?,
            )),
            None => Intent::Moves(None),
        },
        "pgn" => Intent::Pgn,
        "status" => Intent::Status,
        "log" => Intent::Log,
        "debug" => Intent::Debug(on_off(words.next())?),
        "player" => {
            let side = words
                .next()
                .ok_or("usage: player white|black human|agent")?
                .parse::<PlayerSide>()?;
            let kind = words
                .next()
                .ok_or("usage: player white|black human|agent")?
                .parse::<PlayerKind>()?;
            let service = words.next().map(str::to_string);
            let model = words.next().map(str::to_string);
            let temperature = match words.next() {
                Some(t) => Some(
                    t.parse::<f32>()
                        .map_err(|_| format!("not a temperature: {t}"))?,
                ),
                None => None,
            };
            Intent::Player {
                side,
                kind,
                service,
                model,
                temperature,
            }
        }
        "key" => {
            let service = words.next().ok_or("usage: key SERVICE set KEY|clear")?;
            match words.next() {
                Some("set") => Intent::SetKey {
                    service: service.to_string(),
                    key: words.next().ok_or("usage: key SERVICE set KEY")?.to_string(),
                },
                Some("clear") => Intent::ClearKey(service.to_string()),
                _ => return Err("usage: key SERVICE set KEY|clear".to_string()),
            }
        }
        "help" | "?" => Intent::Help,
        "quit" | "exit" | "q" => Intent::Quit,
        _ => match parse_coordinate_move(line) {
            Some((from, to, promotion)) => Intent::Move {
                from,
                to,
                promotion,
            },
            None => return Err(format!("unknown command: {line} (try help)")),
        },
    };
    Ok(Some(intent))
}

/// Render a snapshot the way the status bar does.
pub fn format_status(snapshot: &SessionSnapshot) -> String {
    let mut out = format!(
        "Turn: {} | Move: {} | Status: {}",
        snapshot.side_to_move.title(),
        snapshot.move_number,
        snapshot.status
    );
    match snapshot.phase {
        TurnPhase::AwaitingDecision(side) => {
            out.push_str(&format!(" | Waiting on {}", side.title()))
        }
        TurnPhase::GameOver(reason) => out.push_str(&format!(" | {reason}")),
        TurnPhase::Idle => {}
    }
    if snapshot.autoplay {
        out.push_str(" | Auto-play");
    }
    for side in PlayerSide::BOTH {
        let player = snapshot.player(side);
        out.push_str(&format!("\n{}: {}", side.title(), player.label()));
        if !player.is_human() {
            out.push_str(&format!(
                " via {} (temperature {:.2})",
                player.service, player.temperature
            ));
        }
    }
    out.push_str(&format!("\nFEN: {}", snapshot.fen));
    out
}

pub struct Console {
    handle: SessionHandle,
    input: HumanInput,
    settings: Arc<Settings>,
    log: Arc<Mutex<MoveLog>>,
}

impl Console {
    pub fn new(
        handle: SessionHandle,
        input: HumanInput,
        settings: Arc<Settings>,
        log: MoveLog,
    ) -> Self {
        Self {
            handle,
            input,
            settings,
            log: Arc::new(Mutex::new(log)),
        }
    }

    fn with_log<T>(&self, f: impl FnOnce(&mut MoveLog) -> T) -> T {
        let mut log = self.log.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut log)
    }

    fn note(&self, entry: LogEntry) {
        if let Some(entry) = self.with_log(|log| log.push(entry)) {
            println!("{entry}");
        }
    }

    /// Read stdin until `quit` or end of input.
    pub async fn run(self) -> anyhow::Result<()> {
        let (snapshot, events) = self.handle.subscribe().await?;
        let printer = spawn_printer(events, Arc::clone(&self.log));

        println!("{}", format_status(&snapshot));
        println!("Type `help` for commands.");

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Some(line) = lines.next_line().await? {
            match parse_intent(&line) {
                Ok(Some(Intent::Quit)) => break,
                Ok(Some(intent)) => {
                    if let Err(e) = self.dispatch(intent).await {
                        self.note(LogEntry::Error(e.to_string()));
                    }
                }
                Ok(None) => {}
                Err(message) => println!("{message}"),
            }
        }

        self.handle.shutdown().await;
        printer.abort();
        Ok(())
    }

    async fn dispatch(&self, intent: Intent) -> anyhow::Result<()> {
        match intent {
            Intent::Move {
                from,
                to,
                promotion,
            } => {
                let snapshot = self.handle.get_snapshot().await?;
                let human_turn = match snapshot.phase {
                    TurnPhase::AwaitingDecision(side) => snapshot.player(side).is_human(),
                    _ => false,
                };
                if !human_turn {
                    println!("It is not a human player's turn");
                    return Ok(());
                }
                if let DropReply::SnapBack = self.input.drop_piece(from, to, promotion).await {
                    println!("Illegal move");
                }
            }
            Intent::Step => match self.handle.step().await? {
                StepOutcome::Busy => println!("Still waiting for the current move"),
                StepOutcome::AwaitingHuman(side) => {
                    println!("{} is human: enter a move", side.title())
                }
                StepOutcome::GameOver(reason) => println!("Game over: {reason}"),
                StepOutcome::Started(_) | StepOutcome::Failed(_) => {}
            },
            Intent::AutoPlay(enabled) => {
                let running = self.handle.set_autoplay(enabled).await?;
                if enabled && !running {
                    println!("Auto-play cannot start: the game is over");
                }
            }
            Intent::NewGame(fen) => {
                if let Err(e) = self.handle.new_game(fen).await {
                    self.note(LogEntry::Error(e.to_string()));
                }
            }
            Intent::Moves(from) => {
                let moves = self.handle.get_legal_moves(from).await?;
                if moves.is_empty() {
                    println!("No legal moves");
                } else {
                    println!("{}", moves.join(", "));
                }
            }
            Intent::Pgn => {
                println!("{}", self.handle.get_pgn().await?);
                self.note(LogEntry::Game("PGN exported".to_string()));
            }
            Intent::Status => {
                println!("{}", format_status(&self.handle.get_snapshot().await?));
            }
            Intent::Log => self.with_log(|log| {
                for entry in log.entries() {
                    println!("{entry}");
                }
            }),
            Intent::Debug(enabled) => {
                if let Some(entry) = self.with_log(|log| log.set_debug(enabled)) {
                    println!("{entry}");
                }
            }
            Intent::Player {
                side,
                kind,
                service,
                model,
                temperature,
            } => {
                let snapshot = self.handle.get_snapshot().await?;
                let player = snapshot.player(side).updated(
                    kind,
                    service,
                    model,
                    temperature,
                    self.settings.registry(),
                );
                let saved = self.settings.set_player(side, player)?;
                self.handle.configure_player(side, saved).await?;
            }
            Intent::SetKey { service, key } => {
                self.settings.registry().profile(&service)?;
                self.settings.set_credential(&service, &key)?;
                self.note(LogEntry::Debug(format!("API key saved for {service}")));
            }
            Intent::ClearKey(service) => {
                self.settings.clear_credential(&service)?;
                self.note(LogEntry::Debug(format!("API key cleared for {service}")));
            }
            Intent::Help => println!("{HELP}"),
            Intent::Quit => {}
        }
        Ok(())
    }
}

/// Print log entries as the session emits them.
fn spawn_printer(
    mut events: broadcast::Receiver<SessionEvent>,
    log: Arc<Mutex<MoveLog>>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => {
                    let kept = log
                        .lock()
                        .unwrap_or_else(|e| e.into_inner())
                        .record(&event);
                    for entry in kept {
                        println!("{entry}");
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "Console fell behind session events");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}
