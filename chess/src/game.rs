use cozy_chess::{Board, Move, Piece, Square};
use serde::{Deserialize, Serialize};

use crate::converters::{file_index, rank_index};
use crate::fen::{format_fen, parse_fen, FenError, STARTING_FEN};
use crate::pgn::san::{self, LegalMove};
use crate::types::{PieceKind, PlayerSide};
use crate::uci::convert_castling_drop;

/// The rules oracle: a cozy-chess board plus the history needed for SAN,
/// repetition detection and PGN export.
#[derive(Debug, Clone)]
pub struct Game {
    start_fen: String,
    position: Board,
    history: Vec<HistoryEntry>,
    /// Position hashes seen so far, starting position included.
    seen: Vec<u64>,
}

/// One applied ply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub mv: Move,
    pub san: String,
    pub side: PlayerSide,
    pub piece: PieceKind,
    pub captured: Option<PieceKind>,
    /// FEN after this move.
    pub fen_after: String,
}

/// Status of the position as shown to players.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameStatus {
    InProgress,
    Check,
    Checkmate,
    Stalemate,
    Draw,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DrawKind {
    FiftyMoveRule,
    InsufficientMaterial,
    ThreefoldRepetition,
}

/// Why a game ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminalReason {
    Checkmate { winner: PlayerSide },
    Stalemate,
    Draw(DrawKind),
}

impl TerminalReason {
    /// PGN result token.
    pub fn result_token(&self) -> &'static str {
        match self {
            Self::Checkmate {
                winner: PlayerSide::White,
            } => "1-0",
            Self::Checkmate {
                winner: PlayerSide::Black,
            } => "0-1",
            Self::Stalemate | Self::Draw(_) => "1/2-1/2",
        }
    }
}

impl std::fmt::Display for GameStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::InProgress => "In Progress",
            Self::Check => "Check",
            Self::Checkmate => "Checkmate",
            Self::Stalemate => "Stalemate",
            Self::Draw => "Draw",
        };
        f.write_str(label)
    }
}

impl std::fmt::Display for TerminalReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Checkmate { winner } => write!(f, "Checkmate! {} wins", winner.title()),
            Self::Stalemate => write!(f, "Stalemate"),
            Self::Draw(DrawKind::FiftyMoveRule) => write!(f, "Draw by fifty-move rule"),
            Self::Draw(DrawKind::InsufficientMaterial) => {
                write!(f, "Draw by insufficient material")
            }
            Self::Draw(DrawKind::ThreefoldRepetition) => {
                write!(f, "Draw by threefold repetition")
            }
        }
    }
}

impl Game {
    /// Create a new game from the standard starting position
    pub fn new() -> Self {
        let position = Board::default();
        Self {
            start_fen: STARTING_FEN.to_string(),
            seen: vec![position.hash()],
            position,
            history: Vec::new(),
        }
    }

    /// Create a game from a FEN string
    pub fn from_fen(fen: &str) -> Result<Self, GameError> {
        let position = parse_fen(fen)?;
        Ok(Self {
            start_fen: format_fen(&position),
            seen: vec![position.hash()],
            position,
            history: Vec::new(),
        })
    }

    pub fn position(&self) -> &Board {
        &self.position
    }

    pub fn fen(&self) -> String {
        format_fen(&self.position)
    }

    pub fn start_fen(&self) -> &str {
        &self.start_fen
    }

    pub fn side_to_move(&self) -> PlayerSide {
        self.position.side_to_move().into()
    }

    /// Full move number as it appears in FEN; increments after Black moves.
    pub fn move_number(&self) -> u16 {
        self.position.fullmove_number()
    }

    pub fn ply_count(&self) -> usize {
        self.history.len()
    }

    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    pub fn history_san(&self) -> Vec<String> {
        self.history.iter().map(|e| e.san.clone()).collect()
    }

    /// SAN of every legal move, generated from the current position on each call.
    /// Empty once the game is over.
    pub fn legal_moves(&self) -> Vec<String> {
        if self.is_game_over() {
            return Vec::new();
        }
        san::legal_moves_with_san(&self.position)
            .into_iter()
            .map(|(_, s)| s)
            .collect()
    }

    /// SAN of the legal moves starting on `square`.
    pub fn legal_moves_from(&self, square: Square) -> Vec<String> {
        if self.is_game_over() {
            return Vec::new();
        }
        san::legal_moves_with_san(&self.position)
            .into_iter()
            .filter(|(lm, _)| lm.mv.from == square)
            .map(|(_, s)| s)
            .collect()
    }

    /// Apply the legal move whose SAN is exactly `notation`.
    pub fn apply_san(&mut self, notation: &str) -> Result<HistoryEntry, GameError> {
        if let Some(reason) = self.terminal_reason() {
            return Err(GameError::GameOver(reason));
        }
        let (lm, san) = san::find_san(&self.position, notation)
            .map_err(|_| GameError::IllegalMove(notation.to_string()))?;
        Ok(self.play(lm, san))
    }

    /// Resolve a drag-drop from `from` to `to` into SAN, or `None` when the
    /// drop is not a legal move. Promotions default to a queen and castling
    /// may be given either as the king's two-square step or king onto rook.
    pub fn resolve_drop(&self, from: Square, to: Square) -> Option<String> {
        self.resolve_drop_with_promotion(from, to, None)
    }

    pub fn resolve_drop_with_promotion(
        &self,
        from: Square,
        to: Square,
        promotion: Option<Piece>,
    ) -> Option<String> {
        if self.is_game_over() {
            return None;
        }
        let legal = san::legal_moves_with_san(&self.position);
        let raw: Vec<Move> = legal.iter().map(|(lm, _)| lm.mv).collect();
        let dropped = convert_castling_drop(
            &self.position,
            Move {
                from,
                to,
                promotion: None,
            },
            &raw,
        );
        let wanted = promotion.unwrap_or(Piece::Queen);

        let candidates = legal
            .iter()
            .filter(|(lm, _)| lm.mv.from == dropped.from && lm.mv.to == dropped.to);
        let mut fallback = None;
        for (lm, s) in candidates {
            match lm.mv.promotion {
                None => return Some(s.clone()),
                Some(p) if p == wanted => return Some(s.clone()),
                Some(_) => {
                    fallback.get_or_insert_with(|| s.clone());
                }
            }
        }
        fallback
    }

    pub fn status(&self) -> GameStatus {
        match self.terminal_reason() {
            Some(TerminalReason::Checkmate { .. }) => GameStatus::Checkmate,
            Some(TerminalReason::Stalemate) => GameStatus::Stalemate,
            Some(TerminalReason::Draw(_)) => GameStatus::Draw,
            None if self.in_check() => GameStatus::Check,
            None => GameStatus::InProgress,
        }
    }

    pub fn in_check(&self) -> bool {
        !self.position.checkers().is_empty()
    }

    pub fn is_game_over(&self) -> bool {
        self.terminal_reason().is_some()
    }

    pub fn terminal_reason(&self) -> Option<TerminalReason> {
        if !has_any_move(&self.position) {
            return Some(if self.in_check() {
                TerminalReason::Checkmate {
                    winner: self.side_to_move().opposite(),
                }
            } else {
                TerminalReason::Stalemate
            });
        }
        if self.position.halfmove_clock() >= 100 {
            return Some(TerminalReason::Draw(DrawKind::FiftyMoveRule));
        }
        if insufficient_material(&self.position) {
            return Some(TerminalReason::Draw(DrawKind::InsufficientMaterial));
        }
        let current = self.position.hash();
        if self.seen.iter().filter(|h| **h == current).count() >= 3 {
            return Some(TerminalReason::Draw(DrawKind::ThreefoldRepetition));
        }
        None
    }

    fn play(&mut self, lm: LegalMove, san: String) -> HistoryEntry {
        let side = self.side_to_move();
        let captured = captured_piece(&self.position, lm);

        self.position.play_unchecked(lm.mv);
        self.seen.push(self.position.hash());

        let entry = HistoryEntry {
            mv: lm.mv,
            san,
            side,
            piece: lm.piece.into(),
            captured,
            fen_after: format_fen(&self.position),
        };
        self.history.push(entry.clone());
        entry
    }
}

impl Default for Game {
    fn default() -> Self {
        Self::new()
    }
}

fn has_any_move(board: &Board) -> bool {
    let mut found = false;
    board.generate_moves(|_| {
        found = true;
        true
    });
    found
}

fn captured_piece(board: &Board, lm: LegalMove) -> Option<PieceKind> {
    if !san::is_capture(board, lm) {
        return None;
    }
    // En passant lands on an empty square.
    Some(board.piece_on(lm.mv.to).unwrap_or(Piece::Pawn).into())
}

fn insufficient_material(board: &Board) -> bool {
    let heavy = board.pieces(Piece::Pawn) | board.pieces(Piece::Rook) | board.pieces(Piece::Queen);
    if !heavy.is_empty() {
        return false;
    }
    let knights = board.pieces(Piece::Knight);
    let bishops = board.pieces(Piece::Bishop);
    if knights.len() + bishops.len() <= 1 {
        return true;
    }
    if !knights.is_empty() {
        return false;
    }
    // Only bishops left: drawn when they all stand on one square colour.
    let mut shades = bishops
        .into_iter()
        .map(|sq| (file_index(sq.file()) + rank_index(sq.rank())) % 2);
    match shades.next() {
        Some(first) => shades.all(|s| s == first),
        None => true,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GameError {
    #[error("Illegal move: {0}")]
    IllegalMove(String),
    #[error("Game is over: {0}")]
    GameOver(TerminalReason),
    #[error("FEN parse error: {0}")]
    Fen(#[from] FenError),
}
