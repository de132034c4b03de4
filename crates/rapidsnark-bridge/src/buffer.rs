//! Output buffer sizing
//!
//! The native engine writes its artifacts into caller-allocated buffers, so
//! every capacity has to be committed before the call is made.

use std::path::Path;

use tracing::debug;

use crate::engine::Dispatcher;
use crate::error::NativeError;
use crate::types::ProveRequest;

/// Error buffer capacity used when the host omits one
pub const DEFAULT_ERROR_BUFFER_CAPACITY: usize = 256;

/// Minimum bytes the native prover needs for a serialized BN254 proof
pub const PROOF_BUFFER_MIN_CAPACITY: usize = 810;

/// Bytes needed to serialize `public_count` public signals.
///
/// Each signal takes at most 78 decimal digits plus quotes, comma and
/// padding; the surrounding brackets and terminator add four.
pub fn public_buffer_min_capacity(public_count: usize) -> usize {
    public_count * 82 + 4
}

/// Buffer capacities committed for a single prove call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProveBuffers {
    /// Proof output capacity
    pub proof: usize,
    /// Public signals output capacity
    pub public_signals: usize,
    /// Error message capacity
    pub error: usize,
}

/// Commit the buffer capacities for a prove call.
///
/// When the request carries no public signals capacity this performs exactly
/// one size query against the same proving key. A failing query is reported
/// as a prover failure rather than replaced by a default.
pub fn negotiate_prove_buffers(
    dispatcher: &Dispatcher,
    request: &ProveRequest,
) -> Result<ProveBuffers, NativeError> {
    let public_signals = match request.public_signals_buffer_capacity {
        Some(capacity) => capacity,
        None => {
            let capacity = query_public_capacity(
                dispatcher,
                &request.zkey_path,
                request.error_buffer_capacity,
            )?;
            debug!("Negotiated public signals capacity: {} bytes", capacity);
            capacity
        }
    };

    Ok(ProveBuffers {
        proof: request.proof_buffer_capacity,
        public_signals,
        error: request.error_buffer_capacity,
    })
}

fn query_public_capacity(
    dispatcher: &Dispatcher,
    zkey_path: &Path,
    error_capacity: usize,
) -> Result<usize, NativeError> {
    dispatcher
        .public_buffer_size(zkey_path, error_capacity)
        .map_err(|e| match e {
            NativeError::Prover { .. } => e,
            NativeError::Verifier { message }
            | NativeError::Crashed { message }
            | NativeError::Other(message) => NativeError::Prover { message },
            short @ NativeError::ShortBuffer { .. } => NativeError::prover(short.to_string()),
        })
}

/// Cut a native message down to what an error buffer of `capacity` bytes holds.
///
/// One byte is reserved for the NUL terminator; the cut never splits a
/// UTF-8 character.
pub fn truncate_message(message: &str, capacity: usize) -> &str {
    let limit = capacity.saturating_sub(1);
    if message.len() <= limit {
        return message;
    }

    let mut end = limit;
    while !message.is_char_boundary(end) {
        end -= 1;
    }
    &message[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_buffer_min_capacity() {
        assert_eq!(public_buffer_min_capacity(0), 4);
        assert_eq!(public_buffer_min_capacity(1), 86);
        assert_eq!(public_buffer_min_capacity(3), 250);
    }

    #[test]
    fn test_truncate_reserves_terminator() {
        assert_eq!(truncate_message("invalid witness length", 8), "invalid");
        assert_eq!(truncate_message("short", 6), "short");
        assert_eq!(truncate_message("short", 5), "shor");
        assert_eq!(truncate_message("anything", 1), "");
        assert_eq!(truncate_message("anything", 0), "");
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        // "é" is two bytes; a 3-byte buffer holds "a" plus the terminator.
        assert_eq!(truncate_message("aé", 3), "a");
        assert_eq!(truncate_message("aé", 4), "aé");
    }
}
