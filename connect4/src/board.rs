use std::error::Error;
use std::fmt;

use tracing::{trace, trace_span};

use crate::side::Side;

pub const COLS: usize = 7;
pub const ROWS: usize = 6;

/// The number of same-side markers in a line needed to win.
pub const CONNECT: usize = 4;

const AXES: [(isize, isize); 4] = [(1, 0), (0, 1), (1, 1), (1, -1)];

#[derive(Clone, Eq, PartialEq)]
pub struct Board {
    /// Column-major left-to-right, rows bottom-to-top.
    cells: [[Option<Side>; ROWS]; COLS],
    heights: [u8; COLS],
    history: Vec<u8>,
    outcome: Option<Outcome>,
}

impl Board {
    /// Builds a board by replaying `history` from the empty position.
    pub fn from_history(history: &[u8]) -> Result<Self, IllegalMove> {
        let mut board = Self::default();
        for &column in history {
            board.make_move(column as usize)?;
        }
        Ok(board)
    }

    pub fn validate_move(&self, column: usize) -> Result<(), IllegalMove> {
        if self.outcome.is_some() {
            return Err(IllegalMove::GameOver);
        }
        if column >= COLS {
            return Err(IllegalMove::OutOfBounds(column));
        }
        if self.heights[column] as usize >= ROWS {
            return Err(IllegalMove::ColumnFull(column));
        }
        Ok(())
    }

    /// Drops the marker of the side to move into `column`. Only the lines through the new
    /// marker are examined for a win.
    pub fn make_move(&mut self, column: usize) -> Result<(), IllegalMove> {
        let _span = trace_span!("Board::make_move", column).entered();

        self.validate_move(column)?;

        let side = self.side_to_move();
        let row = self.heights[column] as usize;
        self.cells[column][row] = Some(side);
        self.heights[column] += 1;
        self.history.push(column as u8);

        if self.connects(column, row, side) {
            trace!(?side, "Win.");
            self.outcome = Some(Outcome::Win(side));
        } else if self.history.len() == COLS * ROWS {
            trace!("Board is full.");
            self.outcome = Some(Outcome::Draw);
        }

        Ok(())
    }

    fn connects(&self, column: usize, row: usize, side: Side) -> bool {
        AXES.iter().any(|&(dc, dr)| {
            self.streak(column, row, dc, dr, side) + self.streak(column, row, -dc, -dr, side) - 1
                >= CONNECT
        })
    }

    /// Counts contiguous `side` markers starting at the anchor and walking in one direction.
    fn streak(&self, column: usize, row: usize, dc: isize, dr: isize, side: Side) -> usize {
        let (mut c, mut r) = (column as isize, row as isize);
        let mut length = 0;
        while (0..COLS as isize).contains(&c)
            && (0..ROWS as isize).contains(&r)
            && self.cells[c as usize][r as usize] == Some(side)
        {
            length += 1;
            c += dc;
            r += dr;
        }
        length
    }

    /// The side whose marker the next move places. Frozen once the game is over.
    pub fn side_to_move(&self) -> Side {
        match self.outcome {
            Some(_) => Side::to_move_after(self.history.len() - 1),
            None => Side::to_move_after(self.history.len()),
        }
    }

    pub fn outcome(&self) -> Option<Outcome> {
        self.outcome
    }

    pub fn is_ongoing(&self) -> bool {
        self.outcome.is_none()
    }

    pub fn get(&self, column: usize, row: usize) -> Option<Side> {
        self.cells.get(column)?.get(row).copied().flatten()
    }

    /// The number of markers in `column`, or `None` off the board.
    pub fn column_height(&self, column: usize) -> Option<usize> {
        self.heights.get(column).map(|&height| height as usize)
    }

    /// Columns off the board count as full.
    pub fn is_column_full(&self, column: usize) -> bool {
        !matches!(self.column_height(column), Some(height) if height < ROWS)
    }

    pub fn legal_columns(&self) -> impl Iterator<Item = usize> + '_ {
        (0..COLS).filter(move |&c| self.is_ongoing() && !self.is_column_full(c))
    }

    /// Every column played so far, in order.
    pub fn history(&self) -> &[u8] {
        &self.history
    }

    pub fn ply_count(&self) -> usize {
        self.history.len()
    }
}

impl Default for Board {
    fn default() -> Self {
        Self {
            cells: [[None; ROWS]; COLS],
            heights: [0; COLS],
            history: Vec::with_capacity(COLS * ROWS),
            outcome: None,
        }
    }
}

impl fmt::Debug for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Board")
            .field("history", &self.history)
            .field("outcome", &self.outcome)
            .finish()
    }
}

/// How a finished game ended.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Outcome {
    Win(Side),
    Draw,
}

impl Outcome {
    pub fn winner(self) -> Option<Side> {
        match self {
            Outcome::Win(side) => Some(side),
            Outcome::Draw => None,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum IllegalMove {
    OutOfBounds(usize),
    ColumnFull(usize),
    GameOver,
}

impl fmt::Display for IllegalMove {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IllegalMove::OutOfBounds(column) => write!(f, "column {column} is out of bounds"),
            IllegalMove::ColumnFull(column) => write!(f, "column {column} is full"),
            IllegalMove::GameOver => write!(f, "the game is already over"),
        }
    }
}

impl Error for IllegalMove {}

#[cfg(test)]
mod tests {
    use super::*;

    fn play(moves: &[u8]) -> Board {
        Board::from_history(moves).unwrap()
    }

    #[test]
    fn drops_to_lowest_open_row() {
        let b = play(&[3, 3, 4]);
        assert_eq!(b.get(3, 0), Some(Side::A));
        assert_eq!(b.get(3, 1), Some(Side::B));
        assert_eq!(b.get(4, 0), Some(Side::A));
        assert_eq!(b.get(3, 2), None);
        assert_eq!(b.column_height(3), Some(2));
        assert_eq!(b.column_height(COLS), None);
        assert!(b.is_column_full(COLS));
        assert_eq!(b.side_to_move(), Side::B);
    }

    #[test]
    fn vertical_win() {
        let mut b = Board::default();
        for i in 0..4 {
            b.make_move(0).unwrap();
            if i != 3 {
                b.make_move(1).unwrap();
            }
        }

        assert_eq!(b.outcome(), Some(Outcome::Win(Side::A)));
        assert_eq!(b.side_to_move(), Side::A);
        assert_eq!(b.make_move(2), Err(IllegalMove::GameOver));
        assert_eq!(b.make_move(0), Err(IllegalMove::GameOver));
        assert_eq!(b.ply_count(), 7);
    }

    #[test]
    fn horizontal_win_for_second_side() {
        let b = play(&[0, 1, 0, 2, 0, 3, 6, 4]);
        assert_eq!(b.outcome(), Some(Outcome::Win(Side::B)));
    }

    #[test]
    fn diagonal_win() {
        let mut b = Board::default();
        let moves = [0, 3, 2, 3, 3, 1, 1, 2, 2, 4, 3];
        for (i, &column) in moves.iter().enumerate() {
            assert_eq!(b.outcome(), None, "game ended early at move {i}");
            b.make_move(column).unwrap();
        }
        assert_eq!(b.outcome(), Some(Outcome::Win(Side::A)));
    }

    #[test]
    fn anti_diagonal_win() {
        // B builds 6-0, 5-1, 4-2, 3-3.
        let b = play(&[0, 6, 5, 5, 4, 4, 3, 4, 3, 3, 0, 3]);
        assert_eq!(b.outcome(), Some(Outcome::Win(Side::B)));
    }

    #[test]
    fn anchor_in_middle_of_line() {
        // A fills columns 0, 1 and 3 on the bottom row, then closes the gap at 2.
        let b = play(&[0, 0, 1, 1, 3, 3, 2]);
        assert_eq!(b.outcome(), Some(Outcome::Win(Side::A)));
    }

    #[test]
    fn three_is_not_enough() {
        let b = play(&[0, 6, 1, 6, 2]);
        assert_eq!(b.outcome(), None);
    }

    #[test]
    fn draw_on_last_cell() {
        let moves = [
            5, 4, 5, 0, 6, 2, 4, 5, 5, 0, 4, 1, 1, 0, 4, 5, 6, 5, 3, 1, 1, 2, 2, 6, 2, 6, 6, 3,
            6, 2, 0, 3, 0, 3, 3, 4, 3, 1, 4, 2, 1, 0,
        ];
        let mut b = Board::default();
        for &column in &moves {
            assert_eq!(b.outcome(), None);
            b.make_move(column).unwrap();
        }
        assert_eq!(b.outcome(), Some(Outcome::Draw));
        assert_eq!(b.legal_columns().count(), 0);
        assert_eq!(b.make_move(0), Err(IllegalMove::GameOver));
    }

    #[test]
    fn illegal_moves() {
        let mut b = play(&[2, 2, 2, 2, 2, 2]);
        assert_eq!(b.make_move(2), Err(IllegalMove::ColumnFull(2)));
        assert_eq!(b.make_move(COLS), Err(IllegalMove::OutOfBounds(COLS)));
        assert_eq!(b.ply_count(), 6);
        assert_eq!(b.side_to_move(), Side::A);
        assert_eq!(b.legal_columns().collect::<Vec<_>>(), vec![0, 1, 3, 4, 5, 6]);
    }

    #[test]
    fn illegal_history() {
        assert_eq!(
            Board::from_history(&[1, 1, 1, 1, 1, 1, 1]),
            Err(IllegalMove::ColumnFull(1))
        );
        assert_eq!(
            Board::from_history(&[0, 1, 0, 1, 0, 1, 0, 1]),
            Err(IllegalMove::GameOver)
        );
    }
}
