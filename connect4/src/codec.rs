//! The binary framing shared by the referee and engines.
//!
//! Every message starts with a 3-byte header: a kind tag followed by the little-endian total
//! length of the message, header included.
//!
//! ```text
//! MAKE_MOVE:  [1][4, 0][column]
//! GAME_START: [0][len lo, len hi][side tag][ms, 4 bytes LE][N][N columns]
//! ```

use std::convert::TryFrom;
use std::error::Error;
use std::fmt;
use std::io::{self, Read, Write};
use std::time::Duration;

use futures::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::trace;

use crate::board::{Board, COLS, ROWS};
use crate::side::Side;

pub const HEADER_LENGTH: usize = 3;

pub const MOVE_LENGTH: usize = HEADER_LENGTH + 1;

/// Side tag, milliseconds and move count.
const START_FIXED_LENGTH: usize = 1 + 4 + 1;

/// The longest move history a GAME_START can carry.
pub const MAX_HISTORY: usize = u8::MAX as usize;

const _: () = assert!(COLS * ROWS <= MAX_HISTORY);

#[repr(u8)]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MessageKind {
    GameStart = 0,
    MakeMove = 1,
}

impl TryFrom<u8> for MessageKind {
    type Error = FormatError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(MessageKind::GameStart),
            1 => Ok(MessageKind::MakeMove),
            _ => Err(FormatError::UnknownKind(value)),
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Header {
    pub kind: MessageKind,
    /// Total message length, including the header itself.
    pub length: u16,
}

impl Header {
    pub fn encode(&self) -> [u8; HEADER_LENGTH] {
        let [lo, hi] = self.length.to_le_bytes();
        [self.kind as u8, lo, hi]
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, FormatError> {
        if bytes.len() != HEADER_LENGTH {
            return Err(FormatError::HeaderLength(bytes.len()));
        }

        let kind = MessageKind::try_from(bytes[0])?;
        let length = u16::from_le_bytes([bytes[1], bytes[2]]);
        if (length as usize) < HEADER_LENGTH {
            return Err(FormatError::TotalLength(length));
        }

        Ok(Self { kind, length })
    }

    /// The number of body bytes following the header.
    pub fn remaining_length(&self) -> usize {
        self.length as usize - HEADER_LENGTH
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Move {
    pub column: u8,
}

impl Move {
    pub fn new(column: u8) -> Self {
        Self { column }
    }
}

/// The parameters an engine receives before a game begins.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct GameStart {
    side: Side,
    time_per_move: Duration,
    history: Vec<u8>,
}

impl GameStart {
    /// Fails if the time budget does not fit in the millisecond field or the history is longer
    /// than [`MAX_HISTORY`].
    pub fn new(side: Side, time_per_move: Duration, history: Vec<u8>) -> Result<Self, FormatError> {
        if time_per_move.as_millis() > u32::MAX as u128 {
            return Err(FormatError::TimeOutOfRange(time_per_move));
        }
        if history.len() > MAX_HISTORY {
            return Err(FormatError::HistoryTooLong(history.len()));
        }

        Ok(Self {
            side,
            time_per_move,
            history,
        })
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub fn time_per_move(&self) -> Duration {
        self.time_per_move
    }

    pub fn history(&self) -> &[u8] {
        &self.history
    }

    /// Whether the receiving engine owes the first move without being prompted.
    pub fn moves_first(&self) -> bool {
        Side::to_move_after(self.history.len()) == self.side
    }

    /// Parameters for a game continuing from `board`. A board's history is at most
    /// `COLS * ROWS` moves, so it always fits the wire field.
    pub fn for_board(side: Side, time_per_move_ms: u32, board: &Board) -> Self {
        Self {
            side,
            time_per_move: Duration::from_millis(time_per_move_ms as u64),
            history: board.history().to_vec(),
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Message {
    GameStart(GameStart),
    MakeMove(Move),
}

impl Message {
    pub fn header(&self) -> Header {
        match self {
            Message::GameStart(start) => Header {
                kind: MessageKind::GameStart,
                length: (HEADER_LENGTH + START_FIXED_LENGTH + start.history.len()) as u16,
            },
            Message::MakeMove(_) => Header {
                kind: MessageKind::MakeMove,
                length: MOVE_LENGTH as u16,
            },
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let header = self.header();
        let mut bytes = Vec::with_capacity(header.length as usize);
        bytes.extend_from_slice(&header.encode());

        match self {
            Message::GameStart(start) => {
                let millis = start.time_per_move.as_millis() as u32;
                bytes.push(start.side.tag());
                bytes.extend_from_slice(&millis.to_le_bytes());
                bytes.push(start.history.len() as u8);
                bytes.extend_from_slice(&start.history);
            }
            Message::MakeMove(m) => bytes.push(m.column),
        }

        bytes
    }

    /// Decodes the body that followed `header`. `body` must hold exactly the header's remaining
    /// length.
    pub fn decode_body(header: Header, body: &[u8]) -> Result<Self, FormatError> {
        if body.len() != header.remaining_length() {
            return Err(FormatError::BodyLength {
                expected: header.remaining_length(),
                actual: body.len(),
            });
        }

        match header.kind {
            MessageKind::MakeMove => {
                if header.length as usize != MOVE_LENGTH {
                    return Err(FormatError::TotalLength(header.length));
                }
                Ok(Message::MakeMove(Move::new(body[0])))
            }
            MessageKind::GameStart => {
                if body.len() < START_FIXED_LENGTH {
                    return Err(FormatError::TotalLength(header.length));
                }

                let side = Side::try_from(body[0]).map_err(FormatError::InvalidSide)?;
                let millis = u32::from_le_bytes([body[1], body[2], body[3], body[4]]);
                let count = body[5] as usize;

                let history = &body[START_FIXED_LENGTH..];
                if history.len() != count {
                    return Err(FormatError::BodyLength {
                        expected: START_FIXED_LENGTH + count,
                        actual: body.len(),
                    });
                }

                Ok(Message::GameStart(GameStart {
                    side,
                    time_per_move: Duration::from_millis(millis as u64),
                    history: history.to_vec(),
                }))
            }
        }
    }

    /// Decodes one complete message from the front of `bytes`, returning it with the number of
    /// bytes consumed.
    pub fn decode(bytes: &[u8]) -> Result<(Self, usize), FormatError> {
        if bytes.len() < HEADER_LENGTH {
            return Err(FormatError::Truncated);
        }
        let header = Header::decode(&bytes[..HEADER_LENGTH])?;

        let end = header.length as usize;
        if bytes.len() < end {
            return Err(FormatError::Truncated);
        }

        let message = Self::decode_body(header, &bytes[HEADER_LENGTH..end])?;
        Ok((message, end))
    }
}

impl From<Move> for Message {
    fn from(m: Move) -> Self {
        Message::MakeMove(m)
    }
}

impl From<GameStart> for Message {
    fn from(start: GameStart) -> Self {
        Message::GameStart(start)
    }
}

/// Reads one message, blocking. Returns `Ok(None)` if the stream ends before the first header
/// byte.
pub fn read_message<R: Read>(reader: &mut R) -> Result<Option<Message>, ReadError> {
    let mut header = [0; HEADER_LENGTH];

    let first = loop {
        match reader.read(&mut header[..1]) {
            Ok(n) => break n,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err.into()),
        }
    };
    if first == 0 {
        trace!("End of stream.");
        return Ok(None);
    }

    reader
        .read_exact(&mut header[1..])
        .map_err(ReadError::mid_message)?;
    let header = Header::decode(&header)?;

    let mut body = vec![0; header.remaining_length()];
    reader
        .read_exact(&mut body)
        .map_err(ReadError::mid_message)?;

    let message = Message::decode_body(header, &body)?;
    trace!(?message, "Message read.");
    Ok(Some(message))
}

/// The suspending counterpart of [`read_message`], with identical framing rules.
pub async fn read_message_async<R: AsyncRead + Unpin>(
    reader: &mut R,
) -> Result<Option<Message>, ReadError> {
    let mut header = [0; HEADER_LENGTH];

    let first = loop {
        match reader.read(&mut header[..1]).await {
            Ok(n) => break n,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err.into()),
        }
    };
    if first == 0 {
        trace!("End of stream.");
        return Ok(None);
    }

    reader
        .read_exact(&mut header[1..])
        .await
        .map_err(ReadError::mid_message)?;
    let header = Header::decode(&header)?;

    let mut body = vec![0; header.remaining_length()];
    reader
        .read_exact(&mut body)
        .await
        .map_err(ReadError::mid_message)?;

    let message = Message::decode_body(header, &body)?;
    trace!(?message, "Message read.");
    Ok(Some(message))
}

/// Writes and flushes one message.
pub fn write_message<W: Write>(writer: &mut W, message: &Message) -> io::Result<()> {
    writer.write_all(&message.encode())?;
    writer.flush()
}

pub async fn write_message_async<W: AsyncWrite + Unpin>(
    writer: &mut W,
    message: &Message,
) -> io::Result<()> {
    writer.write_all(&message.encode()).await?;
    writer.flush().await
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum FormatError {
    HeaderLength(usize),
    UnknownKind(u8),
    /// The header's total length cannot describe a message of its kind.
    TotalLength(u16),
    BodyLength { expected: usize, actual: usize },
    InvalidSide(u8),
    /// The stream ended partway through a message.
    Truncated,
    TimeOutOfRange(Duration),
    HistoryTooLong(usize),
}

impl fmt::Display for FormatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormatError::HeaderLength(n) => {
                write!(f, "header must be {HEADER_LENGTH} bytes, got {n}")
            }
            FormatError::UnknownKind(tag) => write!(f, "unknown message kind {tag}"),
            FormatError::TotalLength(n) => write!(f, "invalid total message length {n}"),
            FormatError::BodyLength { expected, actual } => {
                write!(f, "expected a {expected} byte body, got {actual}")
            }
            FormatError::InvalidSide(tag) => write!(f, "invalid side tag {tag:#04x}"),
            FormatError::Truncated => write!(f, "stream ended mid-message"),
            FormatError::TimeOutOfRange(time) => {
                write!(f, "time budget {time:?} does not fit in the wire field")
            }
            FormatError::HistoryTooLong(n) => {
                write!(f, "move history of {n} exceeds {MAX_HISTORY} moves")
            }
        }
    }
}

impl Error for FormatError {}

#[derive(Debug)]
pub enum ReadError {
    Format(FormatError),
    Io(io::Error),
}

impl ReadError {
    fn mid_message(error: io::Error) -> Self {
        if error.kind() == io::ErrorKind::UnexpectedEof {
            ReadError::Format(FormatError::Truncated)
        } else {
            ReadError::Io(error)
        }
    }
}

impl From<FormatError> for ReadError {
    fn from(error: FormatError) -> Self {
        ReadError::Format(error)
    }
}

impl From<io::Error> for ReadError {
    fn from(error: io::Error) -> Self {
        ReadError::Io(error)
    }
}

impl fmt::Display for ReadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReadError::Format(err) => write!(f, "malformed message: {err}"),
            ReadError::Io(err) => write!(f, "read failed: {err}"),
        }
    }
}

impl Error for ReadError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ReadError::Format(err) => Some(err),
            ReadError::Io(err) => Some(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_std::task;
    use futures::io::Cursor as AsyncCursor;
    use std::io::Cursor;

    fn start(side: Side, millis: u64, history: &[u8]) -> GameStart {
        GameStart::new(side, Duration::from_millis(millis), history.to_vec()).unwrap()
    }

    #[test]
    fn header_bytes() {
        let header = Header::decode(b"\x01\x03\x00").unwrap();
        assert_eq!(header.kind, MessageKind::MakeMove);
        assert_eq!(header.length, 3);
        assert_eq!(header.remaining_length(), 0);
        assert_eq!(header.encode(), *b"\x01\x03\x00");
    }

    #[test]
    fn header_round_trip() {
        for kind in [MessageKind::GameStart, MessageKind::MakeMove] {
            for length in [3, 4, 9, 0x0100, 0x1234, u16::MAX] {
                let header = Header { kind, length };
                assert_eq!(Header::decode(&header.encode()), Ok(header));
            }
        }
    }

    #[test]
    fn header_errors() {
        assert_eq!(
            Header::decode(b"\x01\x04"),
            Err(FormatError::HeaderLength(2))
        );
        assert_eq!(
            Header::decode(b"\x01\x04\x00\x00"),
            Err(FormatError::HeaderLength(4))
        );
        assert_eq!(
            Header::decode(b"\x02\x04\x00"),
            Err(FormatError::UnknownKind(2))
        );
        assert_eq!(
            Header::decode(b"\x01\x02\x00"),
            Err(FormatError::TotalLength(2))
        );
    }

    #[test]
    fn move_bytes() {
        let bytes = Message::from(Move::new(6)).encode();
        assert_eq!(bytes, b"\x01\x04\x00\x06");
    }

    #[test]
    fn move_round_trip() {
        for column in 0..crate::COLS as u8 {
            let (message, used) = Message::decode(&Message::from(Move::new(column)).encode()).unwrap();
            assert_eq!(message, Message::MakeMove(Move::new(column)));
            assert_eq!(used, MOVE_LENGTH);
        }
    }

    #[test]
    fn game_start_bytes() {
        let mut raw = b"\x00\x0c\x00\x31".to_vec();
        raw.extend_from_slice(&100u32.to_le_bytes());
        raw.extend_from_slice(b"\x03\x01\x00\x02");

        let (message, used) = Message::decode(&raw).unwrap();
        assert_eq!(used, raw.len());
        assert_eq!(message, Message::GameStart(start(Side::A, 100, &[1, 0, 2])));
        assert_eq!(message.encode(), raw);
    }

    #[test]
    fn game_start_round_trip() {
        let long_history: Vec<u8> = (0..MAX_HISTORY).map(|i| (i % 7) as u8).collect();
        let cases = [
            start(Side::A, 0, &[]),
            start(Side::B, 1, &[3]),
            start(Side::B, u32::MAX as u64, &[0, 1, 2, 3, 4, 5, 6]),
            start(Side::A, 250, &long_history),
        ];

        for case in cases {
            let bytes = Message::from(case.clone()).encode();
            assert_eq!(bytes.len(), 3 + 1 + 4 + 1 + case.history().len());
            let (decoded, _) = Message::decode(&bytes).unwrap();
            assert_eq!(decoded, Message::GameStart(case));
        }
    }

    #[test]
    fn game_start_truncates_to_millis() {
        let precise = GameStart::new(Side::A, Duration::from_micros(1_500), vec![]).unwrap();
        let (decoded, _) = Message::decode(&Message::from(precise).encode()).unwrap();
        match decoded {
            Message::GameStart(start) => {
                assert_eq!(start.time_per_move(), Duration::from_millis(1))
            }
            other => panic!("unexpected message {other:?}"),
        }
    }

    #[test]
    fn game_start_limits() {
        assert_eq!(
            GameStart::new(Side::A, Duration::ZERO, vec![0; MAX_HISTORY + 1]),
            Err(FormatError::HistoryTooLong(MAX_HISTORY + 1))
        );
        let too_long = Duration::from_millis(u32::MAX as u64 + 1);
        assert_eq!(
            GameStart::new(Side::A, too_long, vec![]),
            Err(FormatError::TimeOutOfRange(too_long))
        );
    }

    #[test]
    fn moves_first_follows_history_parity() {
        assert!(start(Side::A, 10, &[]).moves_first());
        assert!(!start(Side::B, 10, &[]).moves_first());
        assert!(start(Side::B, 10, &[3]).moves_first());
        assert!(start(Side::A, 10, &[3, 3]).moves_first());

        let board = Board::from_history(&[3]).unwrap();
        let other = GameStart::for_board(Side::B, 10, &board);
        assert_eq!(other, start(Side::B, 10, &[3]));
        assert!(other.moves_first());
    }

    #[test]
    fn body_errors() {
        let move_header = Header {
            kind: MessageKind::MakeMove,
            length: 4,
        };
        assert_eq!(
            Message::decode_body(move_header, &[]),
            Err(FormatError::BodyLength {
                expected: 1,
                actual: 0
            })
        );

        let long_move = Header {
            kind: MessageKind::MakeMove,
            length: 5,
        };
        assert_eq!(
            Message::decode_body(long_move, &[1, 2]),
            Err(FormatError::TotalLength(5))
        );

        let start_header = Header {
            kind: MessageKind::GameStart,
            length: 9,
        };
        assert_eq!(
            Message::decode_body(start_header, &[b'3', 0, 0, 0, 0, 0]),
            Err(FormatError::InvalidSide(b'3'))
        );
        // Claims two moves but carries none.
        assert_eq!(
            Message::decode_body(start_header, &[b'1', 0, 0, 0, 0, 2]),
            Err(FormatError::BodyLength {
                expected: 8,
                actual: 6
            })
        );
    }

    #[test]
    fn stream_reading() {
        let mut bytes = Message::from(start(Side::B, 40, &[2])).encode();
        bytes.extend(Message::from(Move::new(4)).encode());
        bytes.extend(Message::from(Move::new(0)).encode());

        let mut reader = Cursor::new(bytes);
        assert_eq!(
            read_message(&mut reader).unwrap(),
            Some(Message::GameStart(start(Side::B, 40, &[2])))
        );
        assert_eq!(
            read_message(&mut reader).unwrap(),
            Some(Message::MakeMove(Move::new(4)))
        );
        assert_eq!(
            read_message(&mut reader).unwrap(),
            Some(Message::MakeMove(Move::new(0)))
        );
        assert!(read_message(&mut reader).unwrap().is_none());
    }

    #[test]
    fn short_reads_are_errors() {
        let cases: [&[u8]; 4] = [b"\x01", b"\x01\x04", b"\x01\x04\x00", b"\x00\x0a\x00\x31\x00"];
        for bytes in cases {
            let result = read_message(&mut Cursor::new(bytes));
            assert!(
                matches!(result, Err(ReadError::Format(FormatError::Truncated))),
                "{bytes:?} gave {result:?}"
            );
        }
    }

    #[test]
    fn blocking_and_async_agree() {
        let mut bytes = Message::from(start(Side::A, 1234, &[6, 5, 4])).encode();
        bytes.extend(Message::from(Move::new(3)).encode());
        bytes.extend(b"\x01\x04");

        let mut blocking = Cursor::new(bytes.clone());
        let mut suspending = AsyncCursor::new(bytes);

        task::block_on(async {
            for _ in 0..2 {
                let a = read_message(&mut blocking).unwrap();
                let b = read_message_async(&mut suspending).await.unwrap();
                assert!(a.is_some());
                assert_eq!(a, b);
            }

            let a = read_message(&mut blocking);
            let b = read_message_async(&mut suspending).await;
            assert!(matches!(a, Err(ReadError::Format(FormatError::Truncated))));
            assert!(matches!(b, Err(ReadError::Format(FormatError::Truncated))));
        });
    }

    #[test]
    fn writers_agree() {
        let message = Message::from(start(Side::B, 77, &[0, 0]));

        let mut blocking = Vec::new();
        write_message(&mut blocking, &message).unwrap();

        let mut suspending = AsyncCursor::new(Vec::new());
        task::block_on(write_message_async(&mut suspending, &message)).unwrap();

        assert_eq!(blocking, suspending.into_inner());
        assert_eq!(blocking, message.encode());
    }
}
