//! Native engine interface and call dispatch
//!
//! A [`NativeEngine`] is the opaque cryptographic capability behind the
//! bridge. The [`Dispatcher`] makes exactly one call into it per operation
//! and turns panics into a crash signal so nothing unwinds across the
//! bridge boundary. Failures are never retried: the engine is deterministic.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::Path;
use std::sync::Arc;

use tracing::error;

use crate::buffer::ProveBuffers;
use crate::error::NativeError;
use crate::types::ProveResult;

/// Groth16 capability provided by a native library
///
/// Implementations block the calling thread for the whole computation and
/// must be safe to call from several worker threads at once.
pub trait NativeEngine: Send + Sync {
    /// Generate a proof for `witness` with the proving key at `zkey_path`
    fn groth16_prove(
        &self,
        zkey_path: &Path,
        witness: &[u8],
        buffers: ProveBuffers,
    ) -> Result<ProveResult, NativeError>;

    /// Bytes needed to hold the public signals of proofs made with `zkey_path`
    fn groth16_public_buffer_size(
        &self,
        zkey_path: &Path,
        error_capacity: usize,
    ) -> Result<usize, NativeError>;

    /// Check `proof` against `inputs` and `verification_key`
    fn groth16_verify(
        &self,
        proof: &str,
        inputs: &str,
        verification_key: &str,
        error_capacity: usize,
    ) -> Result<bool, NativeError>;
}

/// Single-call adapter around a shared engine
#[derive(Clone)]
pub struct Dispatcher {
    engine: Arc<dyn NativeEngine>,
}

impl Dispatcher {
    /// Wrap an engine
    pub fn new(engine: Arc<dyn NativeEngine>) -> Self {
        Self { engine }
    }

    /// One prove call
    pub fn prove(
        &self,
        zkey_path: &Path,
        witness: &[u8],
        buffers: ProveBuffers,
    ) -> Result<ProveResult, NativeError> {
        guarded("groth16_prove", || {
            self.engine.groth16_prove(zkey_path, witness, buffers)
        })
    }

    /// One public buffer size call
    pub fn public_buffer_size(
        &self,
        zkey_path: &Path,
        error_capacity: usize,
    ) -> Result<usize, NativeError> {
        guarded("groth16_public_buffer_size", || {
            self.engine.groth16_public_buffer_size(zkey_path, error_capacity)
        })
    }

    /// One verify call
    pub fn verify(
        &self,
        proof: &str,
        inputs: &str,
        verification_key: &str,
        error_capacity: usize,
    ) -> Result<bool, NativeError> {
        guarded("groth16_verify", || {
            self.engine
                .groth16_verify(proof, inputs, verification_key, error_capacity)
        })
    }
}

fn guarded<T>(
    call: &'static str,
    f: impl FnOnce() -> Result<T, NativeError>,
) -> Result<T, NativeError> {
    catch_unwind(AssertUnwindSafe(f)).unwrap_or_else(|payload| {
        let message = panic_message(payload.as_ref());
        error!("Native call {} panicked: {}", call, message);
        Err(NativeError::Crashed { message })
    })
}

/// Best-effort text of a panic payload
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "native call panicked".to_string()
    }
}
