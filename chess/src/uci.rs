//! Coordinate ("e2e4") move utilities used for drag-drop style input.

use cozy_chess::{Board, File, Move, Piece, Rank, Square};

use crate::converters::parse_square;

/// Convert a king-two-squares castling drop to cozy_chess notation.
///
/// Boards and UCI show castling as the king moving two squares (e1g1, e1c1,
/// e8g8, e8c8); cozy_chess encodes it as the king moving onto its rook
/// (e1h1, e1a1, e8h8, e8a8). Only a drop of the side to move's king is
/// converted, and only when the converted move is legal; otherwise `mv`
/// comes back unchanged.
pub fn convert_castling_drop(board: &Board, mv: Move, legal_moves: &[Move]) -> Move {
    if board.king(board.side_to_move()) != mv.from {
        return mv;
    }
    let is_back_rank = matches!(mv.from.rank(), Rank::First | Rank::Eighth);
    let is_e_file = matches!(mv.from.file(), File::E);

    if !is_back_rank || !is_e_file || mv.promotion.is_some() || mv.from.rank() != mv.to.rank() {
        return mv;
    }

    let rook_file = match mv.to.file() {
        File::G => File::H,
        File::C => File::A,
        _ => return mv,
    };

    let converted = Move {
        from: mv.from,
        to: Square::new(rook_file, mv.from.rank()),
        promotion: None,
    };

    if legal_moves.contains(&converted) {
        converted
    } else {
        mv
    }
}

/// Parse coordinate input: "e2e4", "e2 e4", "e2-e4" or "e7e8n".
/// Returns the squares and the optional promotion piece.
pub fn parse_coordinate_move(input: &str) -> Option<(Square, Square, Option<Piece>)> {
    let compact: String = input
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .collect();
    if !compact.is_ascii() || !(4..=5).contains(&compact.len()) {
        return None;
    }

    let from = parse_square(&compact[0..2])?;
    let to = parse_square(&compact[2..4])?;
    let promotion = match compact[4..].chars().next() {
        None => None,
        Some(c) => Some(promotion_piece(c)?),
    };
    Some((from, to, promotion))
}

fn promotion_piece(c: char) -> Option<Piece> {
    match c.to_ascii_lowercase() {
        'q' => Some(Piece::Queen),
        'r' => Some(Piece::Rook),
        'b' => Some(Piece::Bishop),
        'n' => Some(Piece::Knight),
        _ => None,
    }
}
