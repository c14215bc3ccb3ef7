//! Authoritative game state for a single session.
//!
//! The session layer only needs turn-taking and terminal detection, so games
//! are driven through the [`Game`] trait. [`TicTacToe`] is the built-in
//! implementation; any other square-grid game can be plugged in by handing
//! the registry a different [`GameFactory`].

use crate::error::GameError;
use log::debug;
use shared::{BoardView, Cell, Outcome, Role, BOARD_SIZE};
use std::sync::Arc;

/// Builds a fresh game for every new session.
pub type GameFactory = Arc<dyn Fn() -> Box<dyn Game> + Send + Sync>;

/// The three operations the session layer drives a game through, plus
/// resignation.
pub trait Game: Send {
    /// Applies one move for `role`. On error the state is unchanged.
    fn apply_move(&mut self, role: Role, position: u32) -> Result<(), GameError>;

    /// Concedes the game; the opponent wins.
    fn resign(&mut self, role: Role) -> Result<(), GameError>;

    fn snapshot(&self) -> BoardView;

    fn outcome(&self) -> Outcome;
}

/// Factory for the default game.
pub fn tictactoe_factory() -> GameFactory {
    Arc::new(|| Box::new(TicTacToe::new()) as Box<dyn Game>)
}

const LINES: [[usize; 3]; 8] = [
    // Rows
    [0, 1, 2],
    [3, 4, 5],
    [6, 7, 8],
    // Columns
    [0, 3, 6],
    [1, 4, 7],
    [2, 5, 8],
    // Diagonals
    [0, 4, 8],
    [2, 4, 6],
];

/// Returns the role holding three in a row, if any.
pub fn check_winner(cells: &[Cell; BOARD_SIZE * BOARD_SIZE]) -> Option<Role> {
    LINES.iter().find_map(|[a, b, c]| {
        let cell = cells[*a];
        if cell != Cell::Empty && cell == cells[*b] && cell == cells[*c] {
            cell.owner()
        } else {
            None
        }
    })
}

/// Evaluates the outcome of a board. Pure function of the cells.
pub fn evaluate(cells: &[Cell; BOARD_SIZE * BOARD_SIZE]) -> Outcome {
    match check_winner(cells) {
        Some(role) => role.winning_outcome(),
        None if cells.iter().all(|cell| *cell != Cell::Empty) => Outcome::Draw,
        None => Outcome::Ongoing,
    }
}

#[derive(Debug, Clone)]
pub struct TicTacToe {
    cells: [Cell; BOARD_SIZE * BOARD_SIZE],
    turn: Role,
    outcome: Outcome,
}

impl TicTacToe {
    pub fn new() -> Self {
        Self {
            cells: [Cell::Empty; BOARD_SIZE * BOARD_SIZE],
            turn: Role::First,
            outcome: Outcome::Ongoing,
        }
    }

    pub fn turn(&self) -> Role {
        self.turn
    }
}

impl Default for TicTacToe {
    fn default() -> Self {
        Self::new()
    }
}

impl Game for TicTacToe {
    fn apply_move(&mut self, role: Role, position: u32) -> Result<(), GameError> {
        if self.outcome.is_over() {
            return Err(GameError::GameOver);
        }
        if role != self.turn {
            return Err(GameError::NotYourTurn);
        }

        let index = position as usize;
        match self.cells.get(index) {
            Some(Cell::Empty) => {}
            Some(_) => return Err(GameError::Occupied { position }),
            None => return Err(GameError::OutOfRange { position }),
        }

        self.cells[index] = Cell::from(role);
        self.outcome = evaluate(&self.cells);
        if !self.outcome.is_over() {
            self.turn = self.turn.other();
        }

        debug!(
            "{} played {} -> {:?}, next turn {}",
            role, position, self.outcome, self.turn
        );
        Ok(())
    }

    fn resign(&mut self, role: Role) -> Result<(), GameError> {
        if self.outcome.is_over() {
            return Err(GameError::GameOver);
        }
        self.outcome = role.other().winning_outcome();
        Ok(())
    }

    fn snapshot(&self) -> BoardView {
        BoardView {
            size: BOARD_SIZE as u32,
            cells: self.cells.to_vec(),
            turn: self.turn,
            outcome: self.outcome,
        }
    }

    fn outcome(&self) -> Outcome {
        self.outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn play(game: &mut TicTacToe, moves: &[u32]) {
        for position in moves {
            let role = game.turn();
            game.apply_move(role, *position).unwrap();
        }
    }

    #[test]
    fn test_new_game_state() {
        let game = TicTacToe::new();
        let view = game.snapshot();
        assert_eq!(view.size, 3);
        assert_eq!(view.cells.len(), 9);
        assert!(view.cells.iter().all(|c| *c == Cell::Empty));
        assert_eq!(view.turn, Role::First);
        assert_eq!(view.outcome, Outcome::Ongoing);
    }

    #[test]
    fn test_turn_alternates() {
        let mut game = TicTacToe::new();
        game.apply_move(Role::First, 0).unwrap();
        assert_eq!(game.turn(), Role::Second);

        let err = game.apply_move(Role::First, 1).unwrap_err();
        assert_eq!(err, GameError::NotYourTurn);
        assert_eq!(game.snapshot().cell(1), Some(Cell::Empty));

        game.apply_move(Role::Second, 4).unwrap();
        assert_eq!(game.turn(), Role::First);
    }

    #[test]
    fn test_no_consecutive_moves_over_full_game() {
        let mut game = TicTacToe::new();
        let mut last: Option<Role> = None;
        for position in [0, 1, 2, 4, 3, 5, 7, 6, 8] {
            let role = game.turn();
            assert_ne!(Some(role), last);
            assert!(game.apply_move(role.other(), position).is_err());
            game.apply_move(role, position).unwrap();
            last = Some(role);
        }
    }

    #[test]
    fn test_occupied_cell_rejected() {
        let mut game = TicTacToe::new();
        game.apply_move(Role::First, 0).unwrap();

        let err = game.apply_move(Role::Second, 0).unwrap_err();
        assert_eq!(err, GameError::Occupied { position: 0 });
        assert_eq!(game.turn(), Role::Second);
    }

    #[test]
    fn test_out_of_range_rejected() {
        let mut game = TicTacToe::new();
        let err = game.apply_move(Role::First, 9).unwrap_err();
        assert_eq!(err, GameError::OutOfRange { position: 9 });
        assert_eq!(game.turn(), Role::First);
    }

    #[test]
    fn test_row_win() {
        let mut game = TicTacToe::new();
        play(&mut game, &[0, 3, 1, 4, 2]);
        assert_eq!(game.outcome(), Outcome::FirstWins);
        // Turn does not flip once the game is over
        assert_eq!(game.turn(), Role::First);
    }

    #[test]
    fn test_column_win_for_second() {
        let mut game = TicTacToe::new();
        play(&mut game, &[0, 1, 3, 4, 8, 7]);
        assert_eq!(game.outcome(), Outcome::SecondWins);
    }

    #[test]
    fn test_diagonal_wins() {
        let mut cells = [Cell::Empty; 9];
        cells[0] = Cell::First;
        cells[4] = Cell::First;
        cells[8] = Cell::First;
        assert_eq!(check_winner(&cells), Some(Role::First));

        let mut cells = [Cell::Empty; 9];
        cells[2] = Cell::Second;
        cells[4] = Cell::Second;
        cells[6] = Cell::Second;
        assert_eq!(check_winner(&cells), Some(Role::Second));
    }

    #[test]
    fn test_draw() {
        let mut game = TicTacToe::new();
        // X O X / X O O / O X X
        play(&mut game, &[0, 1, 2, 4, 3, 5, 7, 6, 8]);
        assert_eq!(game.outcome(), Outcome::Draw);
    }

    #[test]
    fn test_moves_rejected_after_game_over() {
        let mut game = TicTacToe::new();
        play(&mut game, &[0, 3, 1, 4, 2]);

        for role in [Role::First, Role::Second] {
            for position in 0..10 {
                assert_eq!(
                    game.apply_move(role, position).unwrap_err(),
                    GameError::GameOver
                );
            }
        }
    }

    #[test]
    fn test_resign() {
        let mut game = TicTacToe::new();
        game.apply_move(Role::First, 4).unwrap();
        game.resign(Role::First).unwrap();
        assert_eq!(game.outcome(), Outcome::SecondWins);
        assert_eq!(game.resign(Role::Second).unwrap_err(), GameError::GameOver);
        assert_eq!(
            game.apply_move(Role::Second, 0).unwrap_err(),
            GameError::GameOver
        );
    }

    #[test]
    fn test_evaluate_exactly_one_outcome() {
        let empty = [Cell::Empty; 9];
        assert_eq!(evaluate(&empty), Outcome::Ongoing);

        // A full board with a winning line is a win, not a draw
        let full_win = [
            Cell::First,
            Cell::First,
            Cell::First,
            Cell::Second,
            Cell::Second,
            Cell::First,
            Cell::Second,
            Cell::First,
            Cell::Second,
        ];
        assert_eq!(evaluate(&full_win), Outcome::FirstWins);
    }

    #[test]
    fn test_factory_builds_fresh_games() {
        let factory = tictactoe_factory();
        let mut first = factory();
        first.apply_move(Role::First, 0).unwrap();

        let second = factory();
        assert_eq!(second.snapshot().cell(0), Some(Cell::Empty));
        assert_eq!(first.snapshot().cell(0), Some(Cell::First));
    }
}
