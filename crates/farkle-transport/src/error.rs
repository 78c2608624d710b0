use std::io;

/// Errors that can occur in the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The listener could not be bound to its address.
    #[error("bind failed: {0}")]
    BindFailed(#[source] io::Error),

    /// Accepting an incoming connection failed.
    #[error("accept failed: {0}")]
    AcceptFailed(#[source] io::Error),

    /// Connecting to a server failed.
    #[error("connect failed: {0}")]
    ConnectFailed(#[source] io::Error),

    /// The peer sent more than the allowed number of bytes without a
    /// frame delimiter.
    #[error("frame exceeds {0} bytes")]
    FrameTooLarge(usize),

    /// Writing a frame failed.
    #[error("send failed: {0}")]
    SendFailed(#[source] io::Error),

    /// Reading from the socket failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(#[source] io::Error),
}
