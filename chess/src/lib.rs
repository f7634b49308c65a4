pub mod converters;
pub mod fen;
pub mod game;
pub mod pgn;
pub mod types;
pub mod uci;

pub use converters::{format_square, parse_square};
pub use fen::{FenError, STARTING_FEN};
pub use game::{DrawKind, Game, GameError, GameStatus, HistoryEntry, TerminalReason};
pub use pgn::{to_pgn, PgnTags};
pub use types::{PieceKind, PlayerSide};
pub use uci::parse_coordinate_move;

/// Re-exported so downstream crates name squares and pieces without a direct
/// cozy-chess dependency.
pub use cozy_chess::{Piece, Square};
