use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::DecisionError;

/// Snapshot handed to a move source for one ply. Built fresh every ply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveRequest {
    /// FEN of the current position.
    pub position: String,
    /// SAN of every prior move, oldest first.
    pub history: Vec<String>,
    /// SAN of every legal move in `position`.
    pub legal_moves: Vec<String>,
}

impl MoveRequest {
    /// Space-joined history, or `None` at the opening position.
    pub fn history_text(&self) -> Option<String> {
        if self.history.is_empty() {
            None
        } else {
            Some(self.history.join(" "))
        }
    }

    pub fn is_legal(&self, san: &str) -> bool {
        self.legal_moves.iter().any(|m| m == san)
    }
}

/// A chosen move and the explanation that came with it.
///
/// Both fields default to empty so a payload without `move` is reported as
/// an invalid move rather than a parse failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveDecision {
    #[serde(rename = "move", default)]
    pub mv: String,
    #[serde(default)]
    pub reasoning: String,
}

impl MoveDecision {
    pub fn new(mv: impl Into<String>, reasoning: impl Into<String>) -> Self {
        Self {
            mv: mv.into(),
            reasoning: reasoning.into(),
        }
    }
}

/// Accept `decision` only if its move is an exact member of `legal_moves`.
pub fn validate_decision(
    decision: MoveDecision,
    legal_moves: &[String],
) -> Result<MoveDecision, DecisionError> {
    if decision.mv.is_empty() || !legal_moves.iter().any(|m| *m == decision.mv) {
        return Err(DecisionError::InvalidMove {
            mv: decision.mv,
            legal_moves: legal_moves.to_vec(),
        });
    }
    Ok(decision)
}

/// Something that can pick a move for a position.
#[async_trait]
pub trait DecisionService: Send + Sync {
    async fn decide(&self, request: &MoveRequest) -> Result<MoveDecision, DecisionError>;

    /// Short name for logs, e.g. "Groq llama-3.3-70b-versatile".
    fn label(&self) -> String;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn legal() -> Vec<String> {
        vec!["e4".to_string(), "Nf3".to_string()]
    }

    #[test]
    fn test_validate_accepts_exact_member() {
        let d = validate_decision(MoveDecision::new("Nf3", "develop"), &legal()).unwrap();
        assert_eq!(d.mv, "Nf3");
    }

    #[test]
    fn test_validate_rejects_near_miss() {
        let err = validate_decision(MoveDecision::new("nf3", ""), &legal()).unwrap_err();
        assert!(matches!(err, DecisionError::InvalidMove { ref mv, .. } if mv == "nf3"));
        let err = validate_decision(MoveDecision::new("", ""), &legal()).unwrap_err();
        assert!(matches!(err, DecisionError::InvalidMove { .. }));
    }

    #[test]
    fn test_decision_json_uses_move_field() {
        let d: MoveDecision =
            serde_json::from_str(r#"{"move":"e4","reasoning":"center"}"#).unwrap();
        assert_eq!(d, MoveDecision::new("e4", "center"));
        let missing: MoveDecision = serde_json::from_str(r#"{"reasoning":"hmm"}"#).unwrap();
        assert!(missing.mv.is_empty());
    }

    #[test]
    fn test_history_text() {
        let mut req = MoveRequest {
            position: String::new(),
            history: vec![],
            legal_moves: legal(),
        };
        assert_eq!(req.history_text(), None);
        req.history = vec!["e4".into(), "e5".into()];
        assert_eq!(req.history_text().as_deref(), Some("e4 e5"));
        assert!(req.is_legal("e4"));
        assert!(!req.is_legal("e5"));
    }
}
