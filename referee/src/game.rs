use std::error::Error;
use std::fmt;
use std::time::Duration;

use tracing::{info, instrument, trace, warn};

use connect4::{Board, FormatError, GameStart, IllegalMove, MessageKind, Outcome, ReadError, Side};

use crate::clock::{Clock, SystemClock};
use crate::engine::{Engine, Reply};

/// Game parameters shared by both sides of a match.
#[derive(Clone, Debug)]
pub struct MatchConfig {
    time_per_move_ms: u32,
    opening: Board,
}

impl MatchConfig {
    pub const DEFAULT_TIME_PER_MOVE_MS: u32 = 100;

    /// Fails if the budget does not fit the wire's millisecond field, or if the opening is not a
    /// legal, unfinished game. The budget is truncated to whole milliseconds.
    pub fn new(time_per_move: Duration, opening: Vec<u8>) -> Result<Self, ConfigError> {
        let time_per_move_ms = u32::try_from(time_per_move.as_millis())
            .map_err(|_| FormatError::TimeOutOfRange(time_per_move))?;

        let board = Board::from_history(&opening)?;
        if !board.is_ongoing() {
            return Err(ConfigError::OpeningFinished);
        }

        Ok(Self {
            time_per_move_ms,
            opening: board,
        })
    }

    pub fn time_per_move(&self) -> Duration {
        Duration::from_millis(self.time_per_move_ms as u64)
    }

    pub fn opening(&self) -> &[u8] {
        self.opening.history()
    }

    fn game_start(&self, side: Side) -> GameStart {
        GameStart::for_board(side, self.time_per_move_ms, &self.opening)
    }
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            time_per_move_ms: Self::DEFAULT_TIME_PER_MOVE_MS,
            opening: Board::default(),
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    IllegalOpening(IllegalMove),
    OpeningFinished,
    Format(FormatError),
}

impl From<IllegalMove> for ConfigError {
    fn from(error: IllegalMove) -> Self {
        ConfigError::IllegalOpening(error)
    }
}

impl From<FormatError> for ConfigError {
    fn from(error: FormatError) -> Self {
        ConfigError::Format(error)
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::IllegalOpening(err) => write!(f, "illegal opening: {err}"),
            ConfigError::OpeningFinished => write!(f, "opening already ends the game"),
            ConfigError::Format(err) => write!(f, "invalid match parameters: {err}"),
        }
    }
}

impl Error for ConfigError {}

/// Why a side lost without the board deciding it.
#[derive(Debug)]
pub enum Forfeit {
    Timeout,
    EndOfStream,
    Invalid(ReadError),
    Unexpected(MessageKind),
    IllegalMove { column: u8, error: IllegalMove },
}

impl fmt::Display for Forfeit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Forfeit::Timeout => write!(f, "ran out of time"),
            Forfeit::EndOfStream => write!(f, "closed its output"),
            Forfeit::Invalid(err) => write!(f, "sent an invalid message: {err}"),
            Forfeit::Unexpected(kind) => write!(f, "sent an unexpected {kind:?} message"),
            Forfeit::IllegalMove { column, error } => {
                write!(f, "played column {column}: {error}")
            }
        }
    }
}

#[derive(Debug)]
pub struct MatchReport {
    pub outcome: Outcome,
    /// The side that lost by forfeit, if any, and why.
    pub forfeit: Option<(Side, Forfeit)>,
    /// The board as it stood when the match ended, including the opening.
    pub board: Board,
}

/// Plays matches between two engines, owning the board and adjudicating every move.
pub struct Referee<C = SystemClock> {
    config: MatchConfig,
    clock: C,
}

impl Referee {
    pub fn new(config: MatchConfig) -> Self {
        Self::with_clock(config, SystemClock)
    }
}

impl<C: Clock> Referee<C> {
    pub fn with_clock(config: MatchConfig, clock: C) -> Self {
        Self { config, clock }
    }

    pub fn config(&self) -> &MatchConfig {
        &self.config
    }

    /// Plays one game with `a` on side A and `b` on side B. Every fault an engine commits is
    /// adjudicated as a loss for that engine, so this always produces an outcome.
    #[instrument(level = "trace", skip_all, fields(a = a.name(), b = b.name()))]
    pub async fn run<A: Engine, B: Engine>(&self, a: &mut A, b: &mut B) -> MatchReport {
        let mut board = self.config.opening.clone();

        macro_rules! send {
            ($side:expr, $method:ident($($arg:expr),*)) => {{
                let side: Side = $side;
                let result = match side {
                    Side::A => a.$method($($arg),*).await,
                    Side::B => b.$method($($arg),*).await,
                };
                if let Err(err) = result {
                    warn!(?err, ?side, "Could not send message to engine.");
                }
            }};
        }

        macro_rules! forfeit {
            ($side:expr, $reason:expr) => {{
                let side: Side = $side;
                let reason: Forfeit = $reason;
                warn!(?side, %reason, "Forfeit.");
                break (Outcome::Win(side.other()), Some((side, reason)));
            }};
        }

        send!(Side::A, send_start(&self.config.game_start(Side::A)));
        send!(Side::B, send_start(&self.config.game_start(Side::B)));

        let (outcome, forfeit) = loop {
            if let Some(outcome) = board.outcome() {
                break (outcome, None);
            }

            let side = board.side_to_move();
            let deadline = self.clock.now() + self.config.time_per_move();
            let reply = match side {
                Side::A => a.receive_move(deadline).await,
                Side::B => b.receive_move(deadline).await,
            };

            let column = match reply {
                Reply::Move(column) => column,
                Reply::Timeout => forfeit!(side, Forfeit::Timeout),
                Reply::EndOfStream => forfeit!(side, Forfeit::EndOfStream),
                Reply::Invalid(err) => forfeit!(side, Forfeit::Invalid(err)),
                Reply::Unexpected(kind) => forfeit!(side, Forfeit::Unexpected(kind)),
            };

            if let Err(error) = board.make_move(column as usize) {
                forfeit!(side, Forfeit::IllegalMove { column, error });
            }
            trace!(?side, column, "Move applied.");

            // The move that ends the game is not forwarded.
            if board.is_ongoing() {
                send!(side.other(), send_move(column));
            }
        };

        info!(?outcome, moves = ?board.history(), "Match finished.");

        MatchReport {
            outcome,
            forfeit,
            board,
        }
    }
}
