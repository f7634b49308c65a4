//! Standard Algebraic Notation for legal moves.
//!
//! Output follows the common SAN conventions: piece letter, minimal
//! disambiguation (file, then rank, then both), `x` for captures including
//! en passant, `=Q` style promotions, `O-O` / `O-O-O` for castling and a
//! `+` / `#` suffix for check and mate.

use cozy_chess::{Board, Color, GameStatus, Move, Piece, Square};

use crate::converters::{file_index, file_to_char, format_square, rank_to_char, san_piece_letter};

/// A legal move together with the piece that makes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LegalMove {
    pub mv: Move,
    pub piece: Piece,
}

/// Every legal move of the position, in generation order.
pub fn legal_moves(board: &Board) -> Vec<LegalMove> {
    let mut moves = Vec::new();
    board.generate_moves(|piece_moves| {
        let piece = piece_moves.piece;
        moves.extend(piece_moves.into_iter().map(|mv| LegalMove { mv, piece }));
        false
    });
    moves
}

pub(crate) fn opponent(color: Color) -> Color {
    match color {
        Color::White => Color::Black,
        Color::Black => Color::White,
    }
}

/// cozy-chess encodes castling as the king capturing its own rook.
pub fn is_castle(board: &Board, mv: Move) -> bool {
    board.piece_on(mv.from) == Some(Piece::King) && board.colors(board.side_to_move()).has(mv.to)
}

pub fn is_capture(board: &Board, lm: LegalMove) -> bool {
    if is_castle(board, lm.mv) {
        return false;
    }
    let enemy = board.colors(opponent(board.side_to_move()));
    enemy.has(lm.mv.to) || (lm.piece == Piece::Pawn && lm.mv.from.file() != lm.mv.to.file())
}

/// Format `lm` as SAN. `legal` must be the full legal move list of `board`;
/// it is consulted for disambiguation.
pub fn format_san(board: &Board, lm: LegalMove, legal: &[LegalMove]) -> String {
    let mv = lm.mv;
    let mut san = String::new();

    if is_castle(board, mv) {
        if file_index(mv.to.file()) > file_index(mv.from.file()) {
            san.push_str("O-O");
        } else {
            san.push_str("O-O-O");
        }
    } else {
        let capture = is_capture(board, lm);
        match san_piece_letter(lm.piece) {
            None => {
                if capture {
                    san.push(file_to_char(mv.from.file()));
                    san.push('x');
                }
            }
            Some(letter) => {
                san.push(letter);
                san.push_str(&disambiguation(lm, legal));
                if capture {
                    san.push('x');
                }
            }
        }
        san.push_str(&format_square(mv.to));
        if let Some(letter) = mv.promotion.and_then(san_piece_letter) {
            san.push('=');
            san.push(letter);
        }
    }

    let mut after = board.clone();
    after.play_unchecked(mv);
    if !after.checkers().is_empty() {
        san.push(if after.status() == GameStatus::Won { '#' } else { '+' });
    }
    san
}

fn disambiguation(lm: LegalMove, legal: &[LegalMove]) -> String {
    let from = lm.mv.from;
    let rivals: Vec<Square> = legal
        .iter()
        .filter(|other| other.piece == lm.piece && other.mv.to == lm.mv.to && other.mv.from != from)
        .map(|other| other.mv.from)
        .collect();

    if rivals.is_empty() {
        return String::new();
    }

    let shares_file = rivals.iter().any(|sq| sq.file() == from.file());
    let shares_rank = rivals.iter().any(|sq| sq.rank() == from.rank());

    if !shares_file {
        file_to_char(from.file()).to_string()
    } else if !shares_rank {
        rank_to_char(from.rank()).to_string()
    } else {
        format_square(from)
    }
}

/// All legal moves of `board` paired with their SAN.
pub fn legal_moves_with_san(board: &Board) -> Vec<(LegalMove, String)> {
    let legal = legal_moves(board);
    legal
        .iter()
        .map(|lm| (*lm, format_san(board, *lm, &legal)))
        .collect()
}

/// Find the legal move whose SAN is exactly `san`, with its SAN.
pub fn find_san(board: &Board, san: &str) -> Result<(LegalMove, String), SanError> {
    legal_moves_with_san(board)
        .into_iter()
        .find(|(_, candidate)| candidate == san)
        .ok_or_else(|| SanError::NoLegalMove(san.to_string()))
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SanError {
    #[error("No legal move found for: {0}")]
    NoLegalMove(String),
}
