//! SAN generation and PGN export.

mod export;
pub mod san;

pub use export::{to_pgn, PgnTags};
