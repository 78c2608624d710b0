//! Error types for the protocol layer.
//!
//! Each crate in Farkle defines its own error enum. When you see a
//! `ProtocolError`, you know the problem is in the shape of a message on
//! the wire, not in networking or game rules.

/// Errors that can occur in the protocol layer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    /// The frame does not follow the wire grammar: truncated header,
    /// non-numeric command id, unmatched brackets, bad parameter syntax.
    #[error("malformed message: {0}")]
    Malformed(String),

    /// A fixed-width header field does not fill its width exactly.
    ///
    /// Only produced by encoding, and only when a caller builds a
    /// `Message` by hand with bad header values.
    #[error("field {field} must be exactly {expected} characters, got {actual}")]
    FieldWidth {
        field: &'static str,
        expected: usize,
        actual: usize,
    },

    /// A free-form field contains characters the grammar reserves.
    #[error("invalid field: {0}")]
    InvalidField(String),

    /// The signature is not the protocol magic.
    #[error("bad signature {0:?}")]
    BadSignature(String),

    /// The command id is not in the command table.
    #[error("unknown command id {0}")]
    UnknownCommand(u8),

    /// The parameter names do not match the command's declared names.
    #[error("parameters do not match command {0}")]
    ParamMismatch(&'static str),

    /// The command exists but may not be sent in this direction.
    #[error("command {0} cannot be sent by a client")]
    UnexpectedOrigin(&'static str),

    /// A parameter has the right name but an unusable value.
    #[error("invalid value for parameter {name}: {reason}")]
    InvalidParam { name: &'static str, reason: String },
}

pub(crate) fn malformed(reason: impl Into<String>) -> ProtocolError {
    ProtocolError::Malformed(reason.into())
}
