//! Move sources: where a side's next move comes from.

mod agent;
mod human;

pub use self::agent::AgentMoveSource;
pub use self::human::{DropAttempt, DropReply, HumanInput, HumanMoveSource, HUMAN_REASONING};

use std::sync::Arc;

use ::agent::{MoveDecision, MoveRequest, RetryPolicy};
use async_trait::async_trait;
use chess::PlayerSide;

use crate::error::TurnError;
use crate::player::{PlayerConfig, PlayerKind};
use crate::settings::Settings;

/// Produces a decision for one ply. Suspends until resolved.
#[async_trait]
pub trait MoveSource: Send + Sync {
    async fn request_move(&self, request: MoveRequest) -> Result<MoveDecision, TurnError>;

    /// Name shown next to applied moves, e.g. "Human" or a model id.
    fn label(&self) -> String;
}

/// Picks the move source for a side from its current configuration.
/// Consulted once per move request.
pub trait MoveSourceProvider: Send + Sync {
    fn source_for(
        &self,
        side: PlayerSide,
        player: &PlayerConfig,
    ) -> Result<Arc<dyn MoveSource>, TurnError>;
}

/// Production provider: humans share one input channel, agents get a fresh
/// HTTP client built from the catalog and the stored credential.
pub struct ConfiguredSources {
    settings: Arc<Settings>,
    human: HumanMoveSource,
    retry: RetryPolicy,
}

impl ConfiguredSources {
    pub fn new(settings: Arc<Settings>, human: HumanMoveSource, retry: RetryPolicy) -> Self {
        Self {
            settings,
            human,
            retry,
        }
    }
}

impl MoveSourceProvider for ConfiguredSources {
    fn source_for(
        &self,
        side: PlayerSide,
        player: &PlayerConfig,
    ) -> Result<Arc<dyn MoveSource>, TurnError> {
        match player.kind {
            PlayerKind::Human => Ok(Arc::new(self.human.clone())),
            PlayerKind::Agent => {
                let misconfigured = |source| TurnError::Misconfigured { side, source };
                let registry = self.settings.registry();
                let profile = registry.profile(&player.service).map_err(misconfigured)?;
                let credential = self
                    .settings
                    .credential(&player.service)
                    .map_err(|e| TurnError::Misconfigured {
                        side,
                        source: ::agent::DecisionError::MissingCredential(format!(
                            "{} ({e})",
                            profile.display_name
                        )),
                    })?
                    .unwrap_or_default();
                let service = registry
                    .connect(&player.service, &player.model, player.temperature, &credential)
                    .map_err(misconfigured)?;
                Ok(Arc::new(AgentMoveSource::new(Arc::new(service), self.retry)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ::agent::DecisionError;

    fn provider() -> ConfiguredSources {
        let (human, _input) = HumanMoveSource::channel();
        ConfiguredSources::new(Arc::new(Settings::in_memory()), human, RetryPolicy::once())
    }

    #[test]
    fn test_human_player_gets_human_source() {
        let source = provider()
            .source_for(PlayerSide::White, &PlayerConfig::human())
            .unwrap();
        assert_eq!(source.label(), "Human");
    }

    #[test]
    fn test_unknown_service_is_misconfigured() {
        let err = provider()
            .source_for(PlayerSide::Black, &PlayerConfig::agent("acme", "m", 0.5))
            .err()
            .unwrap();
        assert_eq!(
            err,
            TurnError::Misconfigured {
                side: PlayerSide::Black,
                source: DecisionError::UnknownService("acme".into()),
            }
        );
    }

    #[test]
    fn test_stored_credential_builds_agent_source() {
        let provider = provider();
        provider.settings.set_credential("grok", "xai-key").unwrap();
        let source = provider
            .source_for(PlayerSide::White, &PlayerConfig::agent("grok", "grok-beta", 0.5))
            .unwrap();
        assert_eq!(source.label(), "xAI Grok grok-beta");
    }
}
