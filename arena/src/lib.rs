//! LLM chess arena: two players, human or model-backed, take turns on one
//! board while every move and its reasoning is logged.

pub mod config;
pub mod console;
pub mod error;
pub mod log;
pub mod player;
pub mod session;
pub mod settings;
pub mod source;

pub use error::{SessionError, TurnError};
pub use log::{LogEntry, MoveLog};
pub use player::{PlayerConfig, PlayerKind};
pub use session::{
    spawn_session, AppliedMove, SessionEvent, SessionHandle, SessionSnapshot, StepOutcome,
    TurnPhase,
};
pub use settings::{JsonFileStore, KeyValueStore, MemoryStore, Settings, SettingsError};
pub use source::{
    AgentMoveSource, ConfiguredSources, DropReply, HumanInput, HumanMoveSource, MoveSource,
    MoveSourceProvider,
};
