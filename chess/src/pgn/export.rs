use crate::fen::{parse_fen, STARTING_FEN};
use crate::game::Game;
use crate::types::PlayerSide;

/// Seven-tag roster header values. Unset tags are written as "?".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PgnTags {
    pub event: Option<String>,
    pub site: Option<String>,
    pub date: Option<String>,
    pub round: Option<String>,
    pub white: Option<String>,
    pub black: Option<String>,
}

/// Export the game as PGN text. Games that did not start from the standard
/// position carry `SetUp` and `FEN` tags.
pub fn to_pgn(game: &Game, tags: &PgnTags) -> String {
    let result = game
        .terminal_reason()
        .map(|r| r.result_token())
        .unwrap_or("*");

    let mut out = String::new();
    let roster = [
        ("Event", &tags.event),
        ("Site", &tags.site),
        ("Date", &tags.date),
        ("Round", &tags.round),
        ("White", &tags.white),
        ("Black", &tags.black),
    ];
    for (name, value) in roster {
        out.push_str(&tag_line(name, value.as_deref().unwrap_or("?")));
    }
    out.push_str(&tag_line("Result", result));
    if game.start_fen() != STARTING_FEN {
        out.push_str(&tag_line("SetUp", "1"));
        out.push_str(&tag_line("FEN", game.start_fen()));
    }
    out.push('\n');

    let (mut number, mut side) = match parse_fen(game.start_fen()) {
        Ok(board) => (board.fullmove_number(), PlayerSide::from(board.side_to_move())),
        Err(_) => (1, PlayerSide::White),
    };

    let mut tokens = Vec::with_capacity(game.history().len() + 1);
    for (i, entry) in game.history().iter().enumerate() {
        match side {
            PlayerSide::White => tokens.push(format!("{number}. {}", entry.san)),
            PlayerSide::Black if i == 0 => tokens.push(format!("{number}... {}", entry.san)),
            PlayerSide::Black => tokens.push(entry.san.clone()),
        }
        if side == PlayerSide::Black {
            number += 1;
        }
        side = side.opposite();
    }
    tokens.push(result.to_string());
    out.push_str(&tokens.join(" "));
    out.push('\n');
    out
}

fn tag_line(name: &str, value: &str) -> String {
    format!("[{name} \"{}\"]\n", value.replace('\\', "\\\\").replace('"', "\\\""))
}

impl Game {
    pub fn to_pgn(&self, tags: &PgnTags) -> String {
        to_pgn(self, tags)
    }
}
