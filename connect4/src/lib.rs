pub use self::board::{Board, IllegalMove, Outcome, COLS, CONNECT, ROWS};
pub use self::codec::{FormatError, GameStart, Header, Message, MessageKind, Move, ReadError};
pub use self::player::{serve, FirstColumn, Player, RandomColumn, ServeError};
pub use self::side::Side;

mod board;
pub mod codec;
mod player;
mod side;
