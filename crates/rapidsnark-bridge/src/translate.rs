//! Native failure translation
//!
//! Maps raw [`NativeError`] signals onto the host-facing [`BridgeError`]
//! taxonomy. Native message text is kept whenever the engine supplied one.

use crate::buffer::truncate_message;
use crate::error::{BridgeError, ErrorKind, NativeError};
use crate::types::Operation;

/// Translate a native failure for `operation`.
///
/// Prover and verifier messages are cut to `error_capacity`, the size of the
/// error buffer negotiated for the call.
pub fn translate(operation: Operation, error: NativeError, error_capacity: usize) -> BridgeError {
    match error {
        NativeError::Prover { message } => BridgeError::new(
            operation,
            ErrorKind::NativeProverFailure,
            truncate_message(&message, error_capacity),
        ),
        NativeError::Verifier { message } => BridgeError::new(
            operation,
            ErrorKind::NativeVerifierFailure,
            truncate_message(&message, error_capacity),
        ),
        short @ NativeError::ShortBuffer { .. } => {
            BridgeError::invalid_arguments(operation, short.to_string())
        }
        NativeError::Crashed { message } | NativeError::Other(message) => {
            BridgeError::unknown(operation, message)
        }
    }
}
