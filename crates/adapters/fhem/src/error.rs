//! FHEM adapter error types.

use washhub_domain::error::WashHubError;

/// Errors specific to the FHEM adapter.
#[derive(Debug, thiserror::Error)]
pub enum FhemError {
    /// The TCP connection to the controller could not be opened.
    #[error("failed to connect to controller at {addr}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// A command was sent on a client that was never opened or was closed.
    #[error("controller connection not open")]
    NotConnected,

    /// The controller closed the connection and every buffered line was read.
    #[error("controller closed the connection")]
    ConnectionClosed,

    /// Reading from or writing to the socket failed.
    #[error("controller I/O error")]
    Io(#[from] std::io::Error),

    /// A switch command was answered with something other than silence.
    #[error("controller rejected command for device {device}: '{response}'")]
    UnexpectedResponse { device: String, response: String },

    /// The `version` handshake did not identify an FHEM server.
    #[error("controller handshake failed, got: '{response}'")]
    Handshake { response: String },

    /// The relay never reported the requested state.
    #[error("device {device} did not reach the requested power state (last state: '{state}')")]
    StateDivergence { device: String, state: String },
}

impl FhemError {
    /// Convert into a [`WashHubError::Power`] for propagation across port
    /// boundaries.
    #[must_use]
    pub fn into_domain(self) -> WashHubError {
        WashHubError::Power(Box::new(self))
    }
}

impl From<FhemError> for WashHubError {
    fn from(err: FhemError) -> Self {
        err.into_domain()
    }
}
