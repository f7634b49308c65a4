//! Move decisions from hosted language models.
//!
//! A [`DecisionService`] turns a [`MoveRequest`] (position, history, legal
//! moves) into a [`MoveDecision`]. [`HttpDecisionService`] is the one HTTP
//! implementation; which vendor it talks to is pure configuration data held
//! in a [`ServiceProfile`]. [`RetryPolicy`] wraps calls with exponential
//! backoff.

pub mod catalog;
pub mod client;
pub mod decision;
pub mod error;
pub mod prompt;
pub mod retry;

pub use catalog::{AuthScheme, ModelInfo, ServiceProfile, ServiceRegistry, TempRange, WireFormat};
pub use client::HttpDecisionService;
pub use decision::{validate_decision, DecisionService, MoveDecision, MoveRequest};
pub use error::DecisionError;
pub use retry::RetryPolicy;
