use chess::{PlayerSide, Square};
use tokio::sync::{broadcast, mpsc, oneshot};

use super::commands::{SessionCommand, StepOutcome};
use super::events::SessionEvent;
use super::snapshot::SessionSnapshot;
use crate::error::SessionError;
use crate::player::PlayerConfig;

/// Cheap, cloneable handle to a session actor.
#[derive(Clone)]
pub struct SessionHandle {
    id: String,
    cmd_tx: mpsc::Sender<SessionCommand>,
}

impl SessionHandle {
    pub(crate) fn new(id: String, cmd_tx: mpsc::Sender<SessionCommand>) -> Self {
        Self { id, cmd_tx }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Request one move for the side to move. A no-op while a decision is
    /// in flight or the game is over.
    pub async fn step(&self) -> Result<StepOutcome, SessionError> {
        let (tx, rx) = oneshot::channel();
        self.send(SessionCommand::Step { reply: tx }).await?;
        rx.await
            .map_err(|_| SessionError::Internal("Reply dropped".into()))
    }

    /// Returns whether auto-play is running afterwards.
    pub async fn set_autoplay(&self, enabled: bool) -> Result<bool, SessionError> {
        let (tx, rx) = oneshot::channel();
        self.send(SessionCommand::SetAutoPlay { enabled, reply: tx })
            .await?;
        rx.await
            .map_err(|_| SessionError::Internal("Reply dropped".into()))
    }

    pub async fn new_game(&self, fen: Option<String>) -> Result<SessionSnapshot, SessionError> {
        let (tx, rx) = oneshot::channel();
        self.send(SessionCommand::NewGame { fen, reply: tx }).await?;
        rx.await
            .map_err(|_| SessionError::Internal("Reply dropped".into()))?
    }

    pub async fn configure_player(
        &self,
        side: PlayerSide,
        player: PlayerConfig,
    ) -> Result<SessionSnapshot, SessionError> {
        let (tx, rx) = oneshot::channel();
        self.send(SessionCommand::ConfigurePlayer {
            side,
            player,
            reply: tx,
        })
        .await?;
        rx.await
            .map_err(|_| SessionError::Internal("Reply dropped".into()))
    }

    pub async fn get_snapshot(&self) -> Result<SessionSnapshot, SessionError> {
        let (tx, rx) = oneshot::channel();
        self.send(SessionCommand::GetSnapshot { reply: tx }).await?;
        rx.await
            .map_err(|_| SessionError::Internal("Reply dropped".into()))
    }

    pub async fn get_legal_moves(&self, from: Option<Square>) -> Result<Vec<String>, SessionError> {
        let (tx, rx) = oneshot::channel();
        self.send(SessionCommand::GetLegalMoves { from, reply: tx })
            .await?;
        rx.await
            .map_err(|_| SessionError::Internal("Reply dropped".into()))
    }

    pub async fn get_pgn(&self) -> Result<String, SessionError> {
        let (tx, rx) = oneshot::channel();
        self.send(SessionCommand::GetPgn { reply: tx }).await?;
        rx.await
            .map_err(|_| SessionError::Internal("Reply dropped".into()))
    }

    pub async fn subscribe(
        &self,
    ) -> Result<(SessionSnapshot, broadcast::Receiver<SessionEvent>), SessionError> {
        let (tx, rx) = oneshot::channel();
        self.send(SessionCommand::Subscribe { reply: tx }).await?;
        rx.await
            .map_err(|_| SessionError::Internal("Reply dropped".into()))
    }

    pub async fn shutdown(&self) {
        let _ = self.cmd_tx.send(SessionCommand::Shutdown).await;
    }

    async fn send(&self, cmd: SessionCommand) -> Result<(), SessionError> {
        self.cmd_tx
            .send(cmd)
            .await
            .map_err(|_| SessionError::Internal("Session actor closed".into()))
    }
}
