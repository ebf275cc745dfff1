use std::error::Error;
use std::fmt;
use std::io::{self, Read, Write};

use rand::rngs::StdRng;
use rand::seq::IteratorRandom;
use rand::SeedableRng;
use tracing::{debug, instrument, trace};

use crate::board::{Board, IllegalMove};
use crate::codec::{self, GameStart, Message, Move, ReadError};

/// A move-selection strategy that can be driven over the wire by [`serve`].
pub trait Player {
    /// Sets up a new game, replaying any history the referee sent.
    fn start(&mut self, start: &GameStart) -> Result<(), IllegalMove>;

    fn opponent_move(&mut self, column: u8) -> Result<(), IllegalMove>;

    /// Chooses a move and records it as played. `None` if there is nothing legal to play.
    fn next_move(&mut self) -> Option<u8>;
}

impl<P: Player + ?Sized> Player for Box<P> {
    fn start(&mut self, start: &GameStart) -> Result<(), IllegalMove> {
        (**self).start(start)
    }

    fn opponent_move(&mut self, column: u8) -> Result<(), IllegalMove> {
        (**self).opponent_move(column)
    }

    fn next_move(&mut self) -> Option<u8> {
        (**self).next_move()
    }
}

/// Always plays the lowest-index column with room left.
#[derive(Debug, Default)]
pub struct FirstColumn {
    board: Board,
}

impl Player for FirstColumn {
    fn start(&mut self, start: &GameStart) -> Result<(), IllegalMove> {
        self.board = Board::from_history(start.history())?;
        Ok(())
    }

    fn opponent_move(&mut self, column: u8) -> Result<(), IllegalMove> {
        self.board.make_move(column as usize)
    }

    fn next_move(&mut self) -> Option<u8> {
        let column = self.board.legal_columns().next()?;
        self.board.make_move(column).ok()?;
        Some(column as u8)
    }
}

/// Plays a uniformly random legal column.
#[derive(Debug)]
pub struct RandomColumn {
    board: Board,
    rng: StdRng,
}

impl RandomColumn {
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Self {
            board: Board::default(),
            rng,
        }
    }
}

impl Player for RandomColumn {
    fn start(&mut self, start: &GameStart) -> Result<(), IllegalMove> {
        self.board = Board::from_history(start.history())?;
        Ok(())
    }

    fn opponent_move(&mut self, column: u8) -> Result<(), IllegalMove> {
        self.board.make_move(column as usize)
    }

    fn next_move(&mut self) -> Option<u8> {
        let column = self.board.legal_columns().choose(&mut self.rng)?;
        self.board.make_move(column).ok()?;
        Some(column as u8)
    }
}

/// Runs `player` against a referee on the other end of `input`/`output` until the input closes.
#[instrument(level = "trace", skip_all)]
pub fn serve<P, R, W>(player: &mut P, input: &mut R, output: &mut W) -> Result<(), ServeError>
where
    P: Player + ?Sized,
    R: Read,
    W: Write,
{
    let mut started = false;

    macro_rules! respond {
        () => {{
            let column = player.next_move().ok_or(ServeError::NoMove)?;
            trace!(column, "Sending move.");
            codec::write_message(output, &Message::MakeMove(Move::new(column)))
                .map_err(ServeError::Write)?;
        }};
    }

    while let Some(message) = codec::read_message(input)? {
        match message {
            Message::GameStart(start) => {
                debug!(side = ?start.side(), history = ?start.history(), "Game start received.");
                player.start(&start)?;
                started = true;
                if start.moves_first() {
                    respond!();
                }
            }
            Message::MakeMove(m) => {
                if !started {
                    return Err(ServeError::NotStarted);
                }
                trace!(column = m.column, "Opponent move received.");
                player.opponent_move(m.column)?;
                respond!();
            }
        }
    }

    debug!("Input closed.");
    Ok(())
}

#[derive(Debug)]
pub enum ServeError {
    Read(ReadError),
    Write(io::Error),
    IllegalMove(IllegalMove),
    /// A move arrived before any GAME_START.
    NotStarted,
    /// The player had no move to offer when one was owed.
    NoMove,
}

impl From<ReadError> for ServeError {
    fn from(error: ReadError) -> Self {
        ServeError::Read(error)
    }
}

impl From<IllegalMove> for ServeError {
    fn from(error: IllegalMove) -> Self {
        ServeError::IllegalMove(error)
    }
}

impl fmt::Display for ServeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServeError::Read(err) => write!(f, "{err}"),
            ServeError::Write(err) => write!(f, "write failed: {err}"),
            ServeError::IllegalMove(err) => write!(f, "illegal move from referee: {err}"),
            ServeError::NotStarted => write!(f, "received a move before the game started"),
            ServeError::NoMove => write!(f, "no legal move to play"),
        }
    }
}

impl Error for ServeError {}
