//! Communication session management
//!
//! This module defines the trait for tunneling text frames between the room
//! engine and connected clients. The transport (a websocket, a test double,
//! anything that can carry text) implements [`Tunnel`]; the engine never
//! sees more than that.

use thiserror::Error;
use tokio::sync::mpsc;

use crate::{constants, protocol::ClientMessage};

/// Why a tunnel is being closed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// The session ended normally
    Normal,
    /// A frame could not be delivered
    ProtocolError,
}

impl CloseReason {
    /// The websocket close code for this reason
    pub fn code(self) -> u16 {
        match self {
            Self::Normal => constants::close_code::NORMAL,
            Self::ProtocolError => constants::close_code::PROTOCOL_ERROR,
        }
    }
}

/// Error returned when a frame cannot be written to a tunnel
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("tunnel is closed")]
pub struct SendError;

/// Trait for sending frames through a communication tunnel
///
/// Implementations must be cheap to clone; the engine keeps one clone per
/// connection and hands out more when it broadcasts.
pub trait Tunnel: Clone + Send + Sync + 'static {
    /// Writes one text frame to the client
    ///
    /// # Errors
    ///
    /// Returns [`SendError`] if the client can no longer be reached.
    fn send_text(&self, text: &str) -> Result<(), SendError>;

    /// Closes the tunnel
    fn close(&self, reason: CloseReason);

    /// Writes a frame, closing the tunnel with a protocol error if it fails
    ///
    /// Failures are isolated to this tunnel and never propagate to the
    /// caller.
    fn deliver(&self, text: &str) {
        if let Err(e) = self.send_text(text) {
            tracing::debug!(error = %e, "dropping frame for unreachable client");
            self.close(CloseReason::ProtocolError);
        }
    }

    /// Encodes and delivers a message
    fn send_message(&self, message: &ClientMessage) {
        self.deliver(&message.to_message());
    }
}

/// A frame queued for a client
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// A text frame
    Text(String),
    /// A request to close the connection
    Close(CloseReason),
}

/// A tunnel that forwards frames into a channel
///
/// The receiving half is drained by whatever owns the actual socket, so a
/// slow client never blocks a room.
#[derive(Debug, Clone)]
pub struct ChannelTunnel(mpsc::UnboundedSender<Outbound>);

impl ChannelTunnel {
    /// Creates a tunnel and the receiver its frames arrive on
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Outbound>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self(sender), receiver)
    }
}

impl Tunnel for ChannelTunnel {
    fn send_text(&self, text: &str) -> Result<(), SendError> {
        self.0
            .send(Outbound::Text(text.to_owned()))
            .map_err(|_| SendError)
    }

    fn close(&self, reason: CloseReason) {
        // the receiver may already be gone, in which case the socket is too
        let _ = self.0.send(Outbound::Close(reason));
    }
}
