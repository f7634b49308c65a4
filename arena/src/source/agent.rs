use std::sync::Arc;

use ::agent::{validate_decision, DecisionService, MoveDecision, MoveRequest, RetryPolicy};
use async_trait::async_trait;
use tracing::{info, instrument};

use super::MoveSource;
use crate::error::TurnError;

/// Asks a decision service, retrying per policy. Each attempt is validated
/// against the request's legal moves, so a hallucinated move is retried like
/// any other failure. Exhausted retries surface as `AgentUnavailable` with
/// the last error.
pub struct AgentMoveSource {
    service: Arc<dyn DecisionService>,
    retry: RetryPolicy,
}

impl AgentMoveSource {
    pub fn new(service: Arc<dyn DecisionService>, retry: RetryPolicy) -> Self {
        Self { service, retry }
    }
}

#[async_trait]
impl MoveSource for AgentMoveSource {
    #[instrument(skip_all, fields(agent = %self.service.label()))]
    async fn request_move(&self, request: MoveRequest) -> Result<MoveDecision, TurnError> {
        let decision = self
            .retry
            .run(|attempt| {
                let service = self.service.clone();
                let request = &request;
                async move {
                    if attempt > 0 {
                        info!(attempt = attempt + 1, "Retrying decision");
                    }
                    let decision = service.decide(request).await?;
                    validate_decision(decision, &request.legal_moves)
                }
            })
            .await
            .map_err(TurnError::AgentUnavailable)?;
        Ok(decision)
    }

    fn label(&self) -> String {
        self.service.label()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ::agent::DecisionError;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    /// Replies from a fixed script, repeating the last entry.
    struct Scripted {
        replies: Vec<Result<MoveDecision, DecisionError>>,
        calls: AtomicU32,
    }

    #[async_trait]
    impl DecisionService for Scripted {
        async fn decide(&self, _: &MoveRequest) -> Result<MoveDecision, DecisionError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) as usize;
            self.replies[n.min(self.replies.len() - 1)].clone()
        }

        fn label(&self) -> String {
            "scripted".into()
        }
    }

    fn request() -> MoveRequest {
        MoveRequest {
            position: chess::STARTING_FEN.into(),
            history: vec![],
            legal_moves: vec!["e4".into(), "d4".into()],
        }
    }

    fn source(replies: Vec<Result<MoveDecision, DecisionError>>) -> (AgentMoveSource, Arc<Scripted>) {
        let scripted = Arc::new(Scripted {
            replies,
            calls: AtomicU32::new(0),
        });
        let source = AgentMoveSource::new(
            scripted.clone(),
            RetryPolicy::new(3, Duration::from_secs(1)),
        );
        (source, scripted)
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_after_transient_failure() {
        let (source, scripted) = source(vec![
            Err(DecisionError::Transport("reset".into())),
            Ok(MoveDecision::new("d4", "solid")),
        ]);
        let decision = source.request_move(request()).await.unwrap();
        assert_eq!(decision.mv, "d4");
        assert_eq!(scripted.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hallucinated_move_is_retried_then_unavailable() {
        let (source, scripted) = source(vec![Ok(MoveDecision::new("e5", "mirror"))]);
        let err = source.request_move(request()).await.unwrap_err();
        assert_eq!(
            err,
            TurnError::AgentUnavailable(DecisionError::InvalidMove {
                mv: "e5".into(),
                legal_moves: vec!["e4".into(), "d4".into()],
            })
        );
        assert_eq!(scripted.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_last_error_is_carried() {
        let (source, _) = source(vec![
            Err(DecisionError::Transport("first".into())),
            Err(DecisionError::MalformedResponse("second".into())),
            Err(DecisionError::ServiceError {
                service: "Groq".into(),
                status: 503,
                status_text: "Service Unavailable".into(),
            }),
        ]);
        let err = source.request_move(request()).await.unwrap_err();
        assert!(matches!(
            err,
            TurnError::AgentUnavailable(DecisionError::ServiceError { status: 503, .. })
        ));
    }
}
