//! Win detection over the shared board.

use crate::registry::Player;
use shared::{Board, Mark, PlayerRecord};

type Line = [(usize, usize); 3];

/// Lines in the order they are checked: rows, then columns, then diagonals.
pub const LINES: [Line; 8] = [
    // Rows
    [(0, 0), (0, 1), (0, 2)],
    [(1, 0), (1, 1), (1, 2)],
    [(2, 0), (2, 1), (2, 2)],
    // Columns
    [(0, 0), (1, 0), (2, 0)],
    [(0, 1), (1, 1), (2, 1)],
    [(0, 2), (1, 2), (2, 2)],
    // Diagonals
    [(0, 0), (1, 1), (2, 2)],
    [(0, 2), (1, 1), (2, 0)],
];

/// Returns the mark filling the first complete line, considering only `marks`.
pub fn winning_mark(board: &Board, marks: &[Mark]) -> Option<Mark> {
    LINES.iter().find_map(|&line| {
        let [a, b, c] = line.map(|(row, column)| board.get(row, column).flatten());
        match a {
            Some(mark) if b == a && c == a && marks.contains(&mark) => Some(mark),
            _ => None,
        }
    })
}

/// Returns the record of the winning player, or the "No Winner" placeholder.
pub fn detect_winner(board: &Board, players: &[Player]) -> PlayerRecord {
    let marks: Vec<Mark> = players.iter().map(|p| p.mark).collect();

    winning_mark(board, &marks)
        .and_then(|mark| players.iter().find(|p| p.mark == mark))
        .map(Player::to_record)
        .unwrap_or_else(PlayerRecord::no_winner)
}
