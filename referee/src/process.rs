use std::error::Error;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use async_std::future::timeout;
use async_std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use tracing::{debug, instrument, trace, warn};

use connect4::codec::{self, GameStart, Message, MessageKind, Move};

use crate::engine::{Engine, Reply};

/// How long an engine gets to exit on its own once its input is closed.
const GRACE: Duration = Duration::from_millis(300);

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// An engine running as a child process, speaking the binary protocol over its stdin and stdout.
/// Its stderr is passed through untouched.
pub struct EngineProcess {
    name: String,
    child: Child,
    stdin: Option<ChildStdin>,
    stdout: ChildStdout,
    reaped: bool,
}

impl EngineProcess {
    pub fn start(
        name: impl Into<String>,
        executable: impl AsRef<Path>,
        args: &[String],
    ) -> Result<Self, LaunchError> {
        let name = name.into();
        let executable = executable.as_ref();

        let launch_error = |source: io::Error| LaunchError {
            executable: executable.to_path_buf(),
            source,
        };

        let mut child = Command::new(executable)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(launch_error)?;

        let pipes = child.stdin.take().zip(child.stdout.take());
        let Some((stdin, stdout)) = pipes else {
            let _ = child.kill();
            return Err(launch_error(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "child pipes were not captured",
            )));
        };

        debug!(%name, pid = child.id(), "Engine started.");

        Ok(Self {
            name,
            child,
            stdin: Some(stdin),
            stdout,
            reaped: false,
        })
    }

    async fn send(&mut self, message: &Message) -> io::Result<()> {
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "engine input closed"))?;
        codec::write_message_async(stdin, message).await
    }
}

impl Engine for EngineProcess {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send_start(&mut self, start: &GameStart) -> io::Result<()> {
        self.send(&Message::GameStart(start.clone())).await
    }

    async fn send_move(&mut self, column: u8) -> io::Result<()> {
        self.send(&Message::MakeMove(Move::new(column))).await
    }

    /// A timeout abandons any partially read message, so the stream cannot be trusted afterwards.
    #[instrument(level = "trace", skip_all, fields(name = %self.name))]
    async fn receive_move(&mut self, deadline: Instant) -> Reply {
        let remaining = deadline.saturating_duration_since(Instant::now());

        match timeout(remaining, codec::read_message_async(&mut self.stdout)).await {
            Err(_) => Reply::Timeout,
            Ok(Ok(None)) => Reply::EndOfStream,
            Ok(Ok(Some(Message::MakeMove(m)))) => {
                trace!(column = m.column, "Move received.");
                Reply::Move(m.column)
            }
            Ok(Ok(Some(Message::GameStart(_)))) => Reply::Unexpected(MessageKind::GameStart),
            Ok(Err(err)) => Reply::Invalid(err),
        }
    }

    #[instrument(level = "trace", skip_all, fields(name = %self.name))]
    async fn shutdown(&mut self) {
        if self.reaped {
            return;
        }

        // Closing stdin is the signal to exit.
        self.stdin = None;

        match timeout(GRACE, self.child.status()).await {
            Ok(Ok(status)) => debug!(%status, "Engine exited."),
            Ok(Err(err)) => warn!(%err, "Failed to wait on engine."),
            Err(_) => {
                warn!("Engine did not exit in time; killing.");
                if let Err(err) = self.child.kill() {
                    warn!(%err, "Failed to kill engine.");
                }
                if let Err(err) = self.child.status().await {
                    warn!(%err, "Failed to reap engine.");
                }
            }
        }

        self.reaped = true;
    }
}

impl Drop for EngineProcess {
    fn drop(&mut self) {
        if self.reaped {
            return;
        }

        self.stdin = None;

        let deadline = Instant::now() + GRACE;
        while Instant::now() < deadline {
            if let Ok(Some(_)) = self.child.try_status() {
                return;
            }
            thread::sleep(POLL_INTERVAL);
        }

        let _ = self.child.kill();
    }
}

#[derive(Debug)]
pub struct LaunchError {
    pub executable: PathBuf,
    pub source: io::Error,
}

impl fmt::Display for LaunchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "failed to launch {}: {}",
            self.executable.display(),
            self.source
        )
    }
}

impl Error for LaunchError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&self.source)
    }
}
