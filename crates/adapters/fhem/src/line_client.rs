//! Line-oriented TCP client for the controller's telnet port.
//!
//! One persistent session. A reader task pushes every received line into a
//! FIFO; callers pop from it with a timeout. No knowledge of the protocol.

use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::FhemError;

/// A single telnet session to the controller.
#[derive(Debug)]
pub struct LineClient {
    host: String,
    port: u16,
    writer: Option<OwnedWriteHalf>,
    responses: Option<mpsc::UnboundedReceiver<String>>,
    reader: Option<JoinHandle<()>>,
}

impl LineClient {
    /// A closed client for `host:port`. Call [`LineClient::open`] to connect.
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            writer: None,
            responses: None,
            reader: None,
        }
    }

    fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Connect and start the reader task. An open session is closed first.
    ///
    /// # Errors
    ///
    /// Returns [`FhemError::Connect`] if the connection cannot be established
    /// within `timeout`.
    pub async fn open(&mut self, timeout: Duration) -> Result<(), FhemError> {
        self.close();
        let addr = self.address();
        tracing::debug!(%addr, "opening controller connection");

        let stream = match tokio::time::timeout(timeout, TcpStream::connect(&addr)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(source)) => return Err(FhemError::Connect { addr, source }),
            Err(_) => {
                return Err(FhemError::Connect {
                    addr,
                    source: std::io::Error::new(
                        std::io::ErrorKind::TimedOut,
                        "connect timed out",
                    ),
                });
            }
        };
        stream.set_nodelay(true)?;

        let (read_half, write_half) = stream.into_split();
        let (tx, rx) = mpsc::unbounded_channel();
        let reader = tokio::spawn(async move {
            let mut lines = BufReader::new(read_half).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        tracing::trace!(%addr, %line, "received");
                        if tx.send(line).is_err() {
                            break;
                        }
                    }
                    Ok(None) => {
                        tracing::debug!(%addr, "controller closed the connection");
                        break;
                    }
                    Err(err) => {
                        tracing::warn!(%addr, error = %err, "failed to read from controller");
                        break;
                    }
                }
            }
        });

        self.writer = Some(write_half);
        self.responses = Some(rx);
        self.reader = Some(reader);
        Ok(())
    }

    /// Write one command line.
    ///
    /// # Errors
    ///
    /// Returns [`FhemError::NotConnected`] when the client is not open, or
    /// [`FhemError::Io`] when the write fails (the client is then closed).
    pub async fn send(&mut self, command: &str) -> Result<(), FhemError> {
        if self.writer.is_none() {
            return Err(FhemError::NotConnected);
        }
        tracing::trace!(addr = %self.address(), %command, "sending");
        let writer = self.writer.as_mut().ok_or(FhemError::NotConnected)?;
        let written = async {
            writer.write_all(command.as_bytes()).await?;
            writer.write_all(b"\n").await?;
            writer.flush().await
        }
        .await;
        if let Err(err) = written {
            self.close();
            return Err(FhemError::Io(err));
        }
        Ok(())
    }

    /// Pop the next received line, waiting up to `timeout`.
    ///
    /// Returns `Ok(None)` when nothing arrived in time.
    ///
    /// # Errors
    ///
    /// Returns [`FhemError::NotConnected`] when the client is not open, or
    /// [`FhemError::ConnectionClosed`] when the reader has stopped and every
    /// buffered line was consumed (the client is then closed).
    pub async fn wait_for_response(
        &mut self,
        timeout: Duration,
    ) -> Result<Option<String>, FhemError> {
        if !self.is_alive() {
            return Err(FhemError::NotConnected);
        }
        let responses = self.responses.as_mut().ok_or(FhemError::NotConnected)?;
        match tokio::time::timeout(timeout, responses.recv()).await {
            Ok(Some(line)) => Ok(Some(line)),
            Ok(None) => {
                self.close();
                Err(FhemError::ConnectionClosed)
            }
            Err(_) => Ok(None),
        }
    }

    /// Take every line received so far without waiting, joined by newlines.
    pub fn drain_buffered(&mut self) -> String {
        let mut drained = Vec::new();
        if let Some(responses) = self.responses.as_mut() {
            while let Ok(line) = responses.try_recv() {
                drained.push(line);
            }
        }
        if !drained.is_empty() {
            tracing::trace!(count = drained.len(), "discarded stale controller output");
        }
        drained.join("\n")
    }

    /// The writer is open or the reader task is still running.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.writer.is_some() || self.reader.as_ref().is_some_and(|r| !r.is_finished())
    }

    /// The reader task is still receiving from the socket.
    #[must_use]
    pub fn is_reading(&self) -> bool {
        self.reader.as_ref().is_some_and(|r| !r.is_finished())
    }

    /// Stop the reader task and shut the socket. Idempotent.
    pub fn close(&mut self) {
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
        if self.writer.take().is_some() {
            tracing::debug!(addr = %self.address(), "controller connection closed");
        }
        self.responses = None;
    }
}

impl Drop for LineClient {
    fn drop(&mut self) {
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
    }
}
