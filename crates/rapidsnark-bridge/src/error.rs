//! Error types for the bridge

use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;

use crate::types::Operation;
use crate::value::Value;

/// Result type alias for bridge operations
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Error taxonomy surfaced to the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed or missing input, detected before dispatch
    InvalidArguments,
    /// The native prover rejected the input or hit an internal fault
    NativeProverFailure,
    /// The native verifier rejected the input or hit an internal fault
    NativeVerifierFailure,
    /// Anything else, including native crashes
    Unknown,
}

impl ErrorKind {
    /// Stable name used in error reply details
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidArguments => "InvalidArguments",
            Self::NativeProverFailure => "NativeProverFailure",
            Self::NativeVerifierFailure => "NativeVerifierFailure",
            Self::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed bridge request, scoped to the operation that produced it
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{operation} failed ({kind}): {message}")]
pub struct BridgeError {
    /// Operation the request was addressed to
    pub operation: Operation,
    /// Taxonomy bucket
    pub kind: ErrorKind,
    /// Human-readable message, native text preserved when available
    pub message: String,
}

impl BridgeError {
    /// Create a new error
    pub fn new(operation: Operation, kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            operation,
            kind,
            message: message.into(),
        }
    }

    /// Input was missing or mistyped
    pub fn invalid_arguments(operation: Operation, message: impl Into<String>) -> Self {
        Self::new(operation, ErrorKind::InvalidArguments, message)
    }

    /// Catch-all failure
    pub fn unknown(operation: Operation, message: impl Into<String>) -> Self {
        Self::new(operation, ErrorKind::Unknown, message)
    }

    /// Convert into the structured reply sent back over the channel
    pub fn into_reply(self) -> ErrorReply {
        let mut details = BTreeMap::new();
        details.insert("kind".to_string(), Value::from(self.kind.as_str()));

        ErrorReply {
            code: self.operation.method_name().to_string(),
            message: self.message,
            details: Some(Value::Map(details)),
        }
    }
}

/// Structured error reply as seen by the host
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorReply {
    /// Operation-scoped error code
    pub code: String,
    /// Error message
    pub message: String,
    /// Optional extra payload
    pub details: Option<Value>,
}

/// Which caller-allocated buffer was too small
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferKind {
    /// Serialized proof output
    Proof,
    /// Serialized public signals output
    PublicSignals,
}

impl fmt::Display for BufferKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Proof => f.write_str("proof"),
            Self::PublicSignals => f.write_str("public signals"),
        }
    }
}

/// Raw failure signal returned by a native engine
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NativeError {
    /// Prover-specific failure with the native message
    #[error("prover error: {message}")]
    Prover { message: String },

    /// Verifier-specific failure with the native message
    #[error("verifier error: {message}")]
    Verifier { message: String },

    /// An output buffer could not hold the artifact
    #[error("{buffer} buffer too small, {required} bytes required")]
    ShortBuffer { buffer: BufferKind, required: u64 },

    /// The native call panicked
    #[error("native call crashed: {message}")]
    Crashed { message: String },

    /// Any other failure
    #[error("{0}")]
    Other(String),
}

impl NativeError {
    /// Shorthand for a prover failure
    pub fn prover(message: impl Into<String>) -> Self {
        Self::Prover {
            message: message.into(),
        }
    }

    /// Shorthand for a verifier failure
    pub fn verifier(message: impl Into<String>) -> Self {
        Self::Verifier {
            message: message.into(),
        }
    }
}

/// Errors raised while attaching the bridge to its host
#[derive(Error, Debug)]
pub enum AttachError {
    /// The worker pool could not be created
    #[error("worker pool setup failed: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),

    /// Configuration could not be parsed
    #[error("invalid bridge configuration: {0}")]
    Config(#[from] serde_json::Error),

    /// A configured value is out of range
    #[error("invalid bridge configuration: {reason}")]
    OutOfRange { reason: String },
}

/// Errors raised by the JSON envelope codec
#[derive(Error, Debug)]
pub enum CodecError {
    /// Payload is not valid JSON
    #[error("malformed JSON envelope: {0}")]
    Json(#[from] serde_json::Error),

    /// JSON is valid but does not describe a method call
    #[error("invalid envelope: {reason}")]
    Envelope { reason: String },

    /// A byte payload was not valid base64
    #[error("invalid byte payload: {0}")]
    Base64(#[from] base64::DecodeError),
}
