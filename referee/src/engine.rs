use std::io;
use std::time::{Duration, Instant};

use tracing::{trace, warn};

use connect4::{GameStart, MessageKind, Player, ReadError};

use crate::clock::{Clock, ManualClock};

/// What came back from an engine when it owed a move.
#[derive(Debug)]
pub enum Reply {
    Move(u8),
    /// The deadline passed before a complete move arrived.
    Timeout,
    /// The engine's output closed before the first byte of a message.
    EndOfStream,
    /// The read failed or the bytes did not form a message.
    Invalid(ReadError),
    /// A well-formed message of a kind an engine may not send.
    Unexpected(MessageKind),
}

/// A competitor the referee can talk to. Sends are fire-and-forget; only `receive_move` waits.
#[allow(async_fn_in_trait)]
pub trait Engine {
    fn name(&self) -> &str;

    async fn send_start(&mut self, start: &GameStart) -> io::Result<()>;

    async fn send_move(&mut self, column: u8) -> io::Result<()>;

    async fn receive_move(&mut self, deadline: Instant) -> Reply;

    /// Releases the engine. Safe to call more than once.
    async fn shutdown(&mut self);
}

/// Runs a [`Player`] in-process behind the [`Engine`] interface.
///
/// With a [`ManualClock`] attached, every move the player makes advances that clock by a fixed
/// think time, and a move that lands past the deadline is reported as a timeout.
pub struct LocalEngine<P> {
    name: String,
    player: P,
    think: Option<(ManualClock, Duration)>,
    pending: Option<u8>,
    closed: bool,
}

impl<P: Player> LocalEngine<P> {
    pub fn new(name: impl Into<String>, player: P) -> Self {
        Self {
            name: name.into(),
            player,
            think: None,
            pending: None,
            closed: false,
        }
    }

    pub fn with_think_time(mut self, clock: ManualClock, think_time: Duration) -> Self {
        self.think = Some((clock, think_time));
        self
    }

    pub fn player(&self) -> &P {
        &self.player
    }

    fn respond(&mut self) {
        match self.player.next_move() {
            Some(column) => {
                if self.pending.replace(column).is_some() {
                    warn!(name = %self.name, "Overwrote an unread move.");
                }
            }
            None => {
                trace!(name = %self.name, "Player has no move; closing.");
                self.closed = true;
            }
        }
    }

    fn check_open(&self) -> io::Result<()> {
        if self.closed {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "engine closed"))
        } else {
            Ok(())
        }
    }
}

impl<P: Player> Engine for LocalEngine<P> {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send_start(&mut self, start: &GameStart) -> io::Result<()> {
        self.check_open()?;
        self.pending = None;

        if let Err(err) = self.player.start(start) {
            warn!(name = %self.name, %err, "Player rejected the game start.");
            self.closed = true;
        } else if start.moves_first() {
            self.respond();
        }
        Ok(())
    }

    async fn send_move(&mut self, column: u8) -> io::Result<()> {
        self.check_open()?;

        if let Err(err) = self.player.opponent_move(column) {
            warn!(name = %self.name, %err, "Player rejected the opponent's move.");
            self.closed = true;
        } else {
            self.respond();
        }
        Ok(())
    }

    async fn receive_move(&mut self, deadline: Instant) -> Reply {
        let column = match self.pending.take() {
            Some(column) => column,
            None if self.closed => return Reply::EndOfStream,
            // A real engine with nothing to say would stay silent until the deadline.
            None => return Reply::Timeout,
        };

        if let Some((clock, think_time)) = &self.think {
            clock.advance(*think_time);
            if clock.now() > deadline {
                return Reply::Timeout;
            }
        }

        Reply::Move(column)
    }

    async fn shutdown(&mut self) {
        self.closed = true;
        self.pending = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_std::task;
    use connect4::{FirstColumn, Side};

    fn start(side: Side) -> GameStart {
        GameStart::new(side, Duration::from_millis(100), Vec::new()).unwrap()
    }

    #[test]
    fn first_mover_answers_unprompted() {
        task::block_on(async {
            let mut engine = LocalEngine::new("first", FirstColumn::default());
            engine.send_start(&start(Side::A)).await.unwrap();
            assert!(matches!(
                engine.receive_move(Instant::now()).await,
                Reply::Move(0)
            ));
        });
    }

    #[test]
    fn second_mover_stays_silent() {
        task::block_on(async {
            let mut engine = LocalEngine::new("second", FirstColumn::default());
            engine.send_start(&start(Side::B)).await.unwrap();
            assert!(matches!(
                engine.receive_move(Instant::now()).await,
                Reply::Timeout
            ));

            engine.send_move(4).await.unwrap();
            assert!(matches!(
                engine.receive_move(Instant::now()).await,
                Reply::Move(0)
            ));
        });
    }

    #[test]
    fn think_time_past_deadline() {
        task::block_on(async {
            let clock = ManualClock::new();
            let mut engine = LocalEngine::new("slow", FirstColumn::default())
                .with_think_time(clock.clone(), Duration::from_millis(200));

            engine.send_start(&start(Side::A)).await.unwrap();
            let deadline = clock.now() + Duration::from_millis(100);
            assert!(matches!(engine.receive_move(deadline).await, Reply::Timeout));
        });
    }

    #[test]
    fn shutdown_closes() {
        task::block_on(async {
            let mut engine = LocalEngine::new("closed", FirstColumn::default());
            engine.shutdown().await;
            engine.shutdown().await;

            assert!(engine.send_start(&start(Side::A)).await.is_err());
            assert!(matches!(
                engine.receive_move(Instant::now()).await,
                Reply::EndOfStream
            ));
        });
    }
}
