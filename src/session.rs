// src/session.rs - producer lifetime and the reconnect loop
use std::io::Write;
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::error::{ProcessingError, SessionError};
use crate::pipeline::config::PipelineConfig;
use crate::pipeline::context::ProcessingStats;
use crate::pipeline::filters::FilterStage;
use crate::pipeline::stream::{Committed, LogStream};
use crate::producer::{LogInput, Producer};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Connecting,
    Streaming,
    Disconnected,
    WaitingForDevice,
    Stopped,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub stay_connected: bool,
    /// Stop voluntarily after this many completed device waits
    pub max_waits: Option<usize>,
}

/// How a session's read loop ended
enum Pumped {
    Eof,
    Interrupted,
}

/// Drives sessions until the stream ends for good, the reconnect cap is
/// reached or the shutdown flag is raised
pub struct SessionController<P: Producer> {
    producer: P,
    config: PipelineConfig,
    filters: Arc<FilterStage>,
    policy: ReconnectPolicy,
    state: SessionState,
    starts: usize,
    waits: usize,
}

impl<P: Producer> SessionController<P> {
    pub fn new(
        producer: P,
        config: PipelineConfig,
        filters: Arc<FilterStage>,
        policy: ReconnectPolicy,
    ) -> Self {
        Self {
            producer,
            config,
            filters,
            policy,
            state: SessionState::Idle,
            starts: 0,
            waits: 0,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Producer processes launched so far
    pub fn starts(&self) -> usize {
        self.starts
    }

    /// Completed device waits so far
    pub fn waits(&self) -> usize {
        self.waits
    }

    pub fn producer(&self) -> &P {
        &self.producer
    }

    fn transition(&mut self, next: SessionState) {
        debug!(from = ?self.state, to = ?next, "session state");
        self.state = next;
    }

    /// Run until stopped. `initial` is an already-open input (stdin or a
    /// file); without one the first session is started through the producer.
    pub async fn run<W: Write>(
        &mut self,
        initial: Option<LogInput>,
        output: &mut W,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<ProcessingStats, SessionError> {
        let mut totals = ProcessingStats::default();
        let mut carried: Option<Committed> = None;
        let mut next_input = initial;

        loop {
            if *shutdown.borrow() {
                break;
            }

            let input = match next_input.take() {
                Some(input) => input,
                None => {
                    self.transition(SessionState::Connecting);
                    match self.producer.start().await {
                        Ok(input) => {
                            self.starts += 1;
                            input
                        }
                        Err(e) => {
                            self.transition(SessionState::Stopped);
                            return Err(e.into());
                        }
                    }
                }
            };

            self.transition(SessionState::Streaming);
            let mut stream = LogStream::new(self.config.clone(), self.filters.clone(), carried.take());
            let pumped = pump(&mut stream, input, output, &mut shutdown, self.config.buffer_size).await;
            self.producer.release().await;

            let finished = match pumped {
                Ok(Pumped::Eof) => {
                    self.transition(SessionState::Disconnected);
                    stream.finish(output)
                }
                Ok(Pumped::Interrupted) => {
                    totals.merge(&session_stats(stream.abandon()));
                    break;
                }
                Err(e) => Err(e),
            };

            match finished {
                Ok(stats) => totals.merge(&session_stats(stats)),
                Err(e) if e.is_broken_pipe() => {
                    debug!("output closed, stopping");
                    break;
                }
                Err(e) => {
                    self.transition(SessionState::Stopped);
                    return Err(e.into());
                }
            }

            if self.config.reuse_format {
                carried = stream.carry();
            }

            if !self.policy.stay_connected {
                break;
            }

            self.transition(SessionState::WaitingForDevice);
            debug!(device = ?self.producer.device(), "waiting for device");
            let waited = tokio::select! {
                result = self.producer.wait_for_device() => Some(result),
                _ = interrupted(&mut shutdown) => None,
            };
            match waited {
                Some(Ok(())) => self.waits += 1,
                Some(Err(e)) => {
                    self.transition(SessionState::Stopped);
                    return Err(e.into());
                }
                None => break,
            }

            if let Some(cap) = self.policy.max_waits {
                if self.waits >= cap {
                    info!(waits = self.waits, "reconnect limit reached");
                    break;
                }
            }
        }

        self.transition(SessionState::Stopped);
        Ok(totals)
    }
}

fn session_stats(mut stats: ProcessingStats) -> ProcessingStats {
    stats.sessions = 1;
    stats
}

/// Resolves once the shutdown flag is set. A dropped sender never fires.
async fn interrupted(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow_and_update() {
            return;
        }
        if shutdown.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Read chunks until end of stream or shutdown; each chunk is fully
/// processed before the next read
async fn pump<W: Write>(
    stream: &mut LogStream,
    mut input: LogInput,
    output: &mut W,
    shutdown: &mut watch::Receiver<bool>,
    buffer_size: usize,
) -> Result<Pumped, ProcessingError> {
    let mut buf = vec![0u8; buffer_size.max(1)];
    loop {
        let read = tokio::select! {
            biased;
            _ = interrupted(shutdown) => return Ok(Pumped::Interrupted),
            result = input.read(&mut buf) => match result {
                Ok(n) => n,
                Err(e) => {
                    warn!("read error, treating as disconnect: {}", e);
                    0
                }
            },
        };
        if read == 0 {
            return Ok(Pumped::Eof);
        }
        stream.feed(&buf[..read], output)?;
    }
}
