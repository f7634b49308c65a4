//! Square and piece formatting helpers.

use cozy_chess::{File, Piece, Rank, Square};

pub fn file_to_char(file: File) -> char {
    match file {
        File::A => 'a',
        File::B => 'b',
        File::C => 'c',
        File::D => 'd',
        File::E => 'e',
        File::F => 'f',
        File::G => 'g',
        File::H => 'h',
    }
}

pub fn rank_to_char(rank: Rank) -> char {
    match rank {
        Rank::First => '1',
        Rank::Second => '2',
        Rank::Third => '3',
        Rank::Fourth => '4',
        Rank::Fifth => '5',
        Rank::Sixth => '6',
        Rank::Seventh => '7',
        Rank::Eighth => '8',
    }
}

/// Zero-based file index (a = 0).
pub fn file_index(file: File) -> u8 {
    file_to_char(file) as u8 - b'a'
}

/// Zero-based rank index (1 = 0).
pub fn rank_index(rank: Rank) -> u8 {
    rank_to_char(rank) as u8 - b'1'
}

/// Format a square as lowercase algebraic ("e4").
pub fn format_square(sq: Square) -> String {
    format!("{}{}", file_to_char(sq.file()), rank_to_char(sq.rank()))
}

/// Parse a lowercase or uppercase algebraic square ("e4", "E4").
pub fn parse_square(s: &str) -> Option<Square> {
    let mut chars = s.trim().chars();
    let file = match chars.next()?.to_ascii_lowercase() {
        'a' => File::A,
        'b' => File::B,
        'c' => File::C,
        'd' => File::D,
        'e' => File::E,
        'f' => File::F,
        'g' => File::G,
        'h' => File::H,
        _ => return None,
    };
    let rank = match chars.next()? {
        '1' => Rank::First,
        '2' => Rank::Second,
        '3' => Rank::Third,
        '4' => Rank::Fourth,
        '5' => Rank::Fifth,
        '6' => Rank::Sixth,
        '7' => Rank::Seventh,
        '8' => Rank::Eighth,
        _ => return None,
    };
    if chars.next().is_some() {
        return None;
    }
    Some(Square::new(file, rank))
}

/// SAN piece letter. Pawns have none.
pub fn san_piece_letter(piece: Piece) -> Option<char> {
    match piece {
        Piece::Pawn => None,
        Piece::Knight => Some('N'),
        Piece::Bishop => Some('B'),
        Piece::Rook => Some('R'),
        Piece::Queen => Some('Q'),
        Piece::King => Some('K'),
    }
}
