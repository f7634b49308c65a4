use std::sync::Arc;

use ::agent::{MoveDecision, MoveRequest};
use async_trait::async_trait;
use chess::{Game, Piece, Square};
use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::debug;

use super::MoveSource;
use crate::error::TurnError;

pub const HUMAN_REASONING: &str = "Human player's move";

/// A piece dropped from one square to another by the human.
#[derive(Debug)]
pub struct DropAttempt {
    pub from: Square,
    pub to: Square,
    pub promotion: Option<Piece>,
    pub reply: oneshot::Sender<DropReply>,
}

/// What the board should do with a drop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropReply {
    Accepted(String),
    SnapBack,
}

/// Cloneable sending side used by the presentation layer.
#[derive(Debug, Clone)]
pub struct HumanInput {
    tx: mpsc::Sender<DropAttempt>,
}

impl HumanInput {
    /// Offer a drop. Resolves once the next move request has answered it;
    /// a closed session snaps back.
    pub async fn drop_piece(&self, from: Square, to: Square, promotion: Option<Piece>) -> DropReply {
        let (reply, rx) = oneshot::channel();
        let attempt = DropAttempt {
            from,
            to,
            promotion,
            reply,
        };
        if self.tx.send(attempt).await.is_err() {
            return DropReply::SnapBack;
        }
        rx.await.unwrap_or(DropReply::SnapBack)
    }
}

/// Resolves when the human makes a legal drop. Illegal drops are answered
/// with [`DropReply::SnapBack`] and never leave this source.
#[derive(Clone)]
pub struct HumanMoveSource {
    rx: Arc<Mutex<mpsc::Receiver<DropAttempt>>>,
}

impl HumanMoveSource {
    pub fn channel() -> (Self, HumanInput) {
        let (tx, rx) = mpsc::channel(16);
        (
            Self {
                rx: Arc::new(Mutex::new(rx)),
            },
            HumanInput { tx },
        )
    }
}

#[async_trait]
impl MoveSource for HumanMoveSource {
    async fn request_move(&self, request: MoveRequest) -> Result<MoveDecision, TurnError> {
        let board = Game::from_fen(&request.position)
            .map_err(|e| TurnError::UnreadablePosition(e.to_string()))?;
        let mut rx = self.rx.lock().await;

        loop {
            let attempt = rx.recv().await.ok_or(TurnError::InputClosed)?;
            let resolved = board
                .resolve_drop_with_promotion(attempt.from, attempt.to, attempt.promotion)
                .filter(|san| request.is_legal(san));
            match resolved {
                Some(san) => {
                    let _ = attempt.reply.send(DropReply::Accepted(san.clone()));
                    return Ok(MoveDecision::new(san, HUMAN_REASONING));
                }
                None => {
                    debug!(from = ?attempt.from, to = ?attempt.to, "Snapback");
                    let _ = attempt.reply.send(DropReply::SnapBack);
                }
            }
        }
    }

    fn label(&self) -> String {
        "Human".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opening_request() -> MoveRequest {
        let game = Game::new();
        MoveRequest {
            position: game.fen(),
            history: vec![],
            legal_moves: game.legal_moves(),
        }
    }

    #[tokio::test]
    async fn test_illegal_drop_snaps_back_then_legal_drop_resolves() {
        let (source, input) = HumanMoveSource::channel();
        let pending = tokio::spawn(async move { source.request_move(opening_request()).await });

        assert_eq!(
            input.drop_piece(Square::E2, Square::E5, None).await,
            DropReply::SnapBack
        );
        assert_eq!(
            input.drop_piece(Square::G1, Square::F3, None).await,
            DropReply::Accepted("Nf3".into())
        );

        let decision = pending.await.unwrap().unwrap();
        assert_eq!(decision.mv, "Nf3");
        assert_eq!(decision.reasoning, HUMAN_REASONING);
    }

    #[tokio::test]
    async fn test_drop_before_request_is_answered_when_asked() {
        let (source, input) = HumanMoveSource::channel();
        let early = tokio::spawn({
            let input = input.clone();
            async move { input.drop_piece(Square::D2, Square::D4, None).await }
        });
        tokio::task::yield_now().await;

        let decision = source.request_move(opening_request()).await.unwrap();
        assert_eq!(decision.mv, "d4");
        assert_eq!(early.await.unwrap(), DropReply::Accepted("d4".into()));
    }

    #[tokio::test]
    async fn test_unreadable_position_is_its_own_failure() {
        let (source, _input) = HumanMoveSource::channel();
        let request = MoveRequest {
            position: "not a position".into(),
            ..opening_request()
        };
        let err = source.request_move(request).await.unwrap_err();
        assert!(matches!(err, TurnError::UnreadablePosition(_)));
        assert_ne!(err.kind(), "IllegalMove");
    }

    #[tokio::test]
    async fn test_closed_input_fails_request() {
        let (source, input) = HumanMoveSource::channel();
        drop(input);
        let err = source.request_move(opening_request()).await.unwrap_err();
        assert_eq!(err, TurnError::InputClosed);
    }
}
