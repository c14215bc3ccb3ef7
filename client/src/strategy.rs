//! Move selection for the scripted player.

use rand::seq::SliceRandom;
use rand::Rng;
use shared::{BoardView, Cell, Role};

/// Every winning line on a square board of side `size`: rows, columns and
/// both diagonals.
pub fn lines(size: u32) -> Vec<Vec<u32>> {
    let mut lines = Vec::with_capacity(size as usize * 2 + 2);
    for i in 0..size {
        lines.push((0..size).map(|j| i * size + j).collect());
        lines.push((0..size).map(|j| j * size + i).collect());
    }
    lines.push((0..size).map(|i| i * size + i).collect());
    lines.push((0..size).map(|i| i * size + (size - 1 - i)).collect());
    lines
}

/// The empty cell that would complete a line for `role`, if one exists.
pub fn completing_move(board: &BoardView, role: Role) -> Option<u32> {
    let mine = Cell::from(role);
    lines(board.size).into_iter().find_map(|line| {
        let owned = line
            .iter()
            .filter(|&&p| board.cell(p) == Some(mine))
            .count();
        let empty: Vec<u32> = line
            .iter()
            .copied()
            .filter(|&p| board.cell(p) == Some(Cell::Empty))
            .collect();
        (owned + 1 == line.len() && empty.len() == 1).then(|| empty[0])
    })
}

/// Picks a move: win if possible, block the opponent's win otherwise, and
/// fall back to a random empty cell. Returns `None` on a full board.
pub fn pick_move<R: Rng + ?Sized>(board: &BoardView, role: Role, rng: &mut R) -> Option<u32> {
    completing_move(board, role)
        .or_else(|| completing_move(board, role.other()))
        .or_else(|| board.empty_positions().choose(rng).copied())
}
