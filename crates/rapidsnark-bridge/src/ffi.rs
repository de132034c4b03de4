//! Bindings to the native rapidsnark library
//!
//! The library writes NUL-terminated strings into caller-allocated buffers
//! and reports the outcome through integer return codes.

use std::ffi::{c_char, c_int, c_ulonglong, c_void, CStr, CString};
use std::path::Path;

use tracing::{debug, instrument};

use crate::buffer::ProveBuffers;
use crate::engine::NativeEngine;
use crate::error::{BufferKind, NativeError};
use crate::types::ProveResult;

const PROVER_OK: c_int = 0;
const PROVER_ERROR: c_int = 1;
const PROVER_ERROR_SHORT_BUFFER: c_int = 2;
const PROVER_INVALID_WITNESS_LENGTH: c_int = 3;

const VERIFIER_VALID_PROOF: c_int = 0;
const VERIFIER_INVALID_PROOF: c_int = 1;
const VERIFIER_ERROR: c_int = 2;

#[link(name = "rapidsnark")]
extern "C" {
    fn groth16_prover_zkey_file(
        zkey_file_path: *const c_char,
        wtns_buffer: *const c_void,
        wtns_size: c_ulonglong,
        proof_buffer: *mut c_char,
        proof_size: *mut c_ulonglong,
        public_buffer: *mut c_char,
        public_size: *mut c_ulonglong,
        error_msg: *mut c_char,
        error_msg_maxsize: c_ulonglong,
    ) -> c_int;

    fn groth16_public_size_for_zkey_file(
        zkey_fname: *const c_char,
        public_size: *mut c_ulonglong,
        error_msg: *mut c_char,
        error_msg_maxsize: c_ulonglong,
    ) -> c_int;

    fn groth16_verify(
        proof: *const c_char,
        inputs: *const c_char,
        verification_key: *const c_char,
        error_msg: *mut c_char,
        error_msg_maxsize: c_ulonglong,
    ) -> c_int;
}

/// Engine backed by the linked rapidsnark library
#[derive(Debug, Default, Clone, Copy)]
pub struct RapidsnarkEngine;

impl RapidsnarkEngine {
    /// Create the engine
    pub fn new() -> Self {
        Self
    }
}

impl NativeEngine for RapidsnarkEngine {
    #[instrument(skip(self, witness), fields(witness_len = witness.len()))]
    fn groth16_prove(
        &self,
        zkey_path: &Path,
        witness: &[u8],
        buffers: ProveBuffers,
    ) -> Result<ProveResult, NativeError> {
        let zkey = path_to_cstring(zkey_path)?;
        let mut proof = vec![0u8; buffers.proof];
        let mut public = vec![0u8; buffers.public_signals];
        let mut error = vec![0u8; buffers.error];
        let mut proof_size = buffers.proof as c_ulonglong;
        let mut public_size = buffers.public_signals as c_ulonglong;

        // SAFETY: every pointer refers to a live allocation whose length is
        // passed alongside it, and the C strings outlive the call.
        let code = unsafe {
            groth16_prover_zkey_file(
                zkey.as_ptr(),
                witness.as_ptr().cast(),
                witness.len() as c_ulonglong,
                proof.as_mut_ptr().cast(),
                &mut proof_size,
                public.as_mut_ptr().cast(),
                &mut public_size,
                error.as_mut_ptr().cast(),
                error.len() as c_ulonglong,
            )
        };
        debug!("groth16_prover_zkey_file returned {}", code);

        match code {
            PROVER_OK => Ok(ProveResult {
                proof: c_buffer_to_string(&proof),
                public_signals: c_buffer_to_string(&public),
            }),
            PROVER_ERROR_SHORT_BUFFER => Err(short_buffer(buffers, proof_size, public_size)),
            PROVER_ERROR | PROVER_INVALID_WITNESS_LENGTH => {
                Err(NativeError::prover(c_buffer_to_string(&error)))
            }
            other => Err(NativeError::Other(format!(
                "unexpected prover return code {other}"
            ))),
        }
    }

    #[instrument(skip(self))]
    fn groth16_public_buffer_size(
        &self,
        zkey_path: &Path,
        error_capacity: usize,
    ) -> Result<usize, NativeError> {
        let zkey = path_to_cstring(zkey_path)?;
        let mut error = vec![0u8; error_capacity];
        let mut public_size: c_ulonglong = 0;

        // SAFETY: as above.
        let code = unsafe {
            groth16_public_size_for_zkey_file(
                zkey.as_ptr(),
                &mut public_size,
                error.as_mut_ptr().cast(),
                error.len() as c_ulonglong,
            )
        };

        match code {
            PROVER_OK => usize::try_from(public_size)
                .map_err(|_| NativeError::prover("public buffer size out of range")),
            _ => Err(NativeError::prover(c_buffer_to_string(&error))),
        }
    }

    #[instrument(skip_all)]
    fn groth16_verify(
        &self,
        proof: &str,
        inputs: &str,
        verification_key: &str,
        error_capacity: usize,
    ) -> Result<bool, NativeError> {
        let proof = str_to_cstring("proof", proof)?;
        let inputs = str_to_cstring("inputs", inputs)?;
        let verification_key = str_to_cstring("verification key", verification_key)?;
        let mut error = vec![0u8; error_capacity];

        // SAFETY: as above.
        let code = unsafe {
            groth16_verify(
                proof.as_ptr(),
                inputs.as_ptr(),
                verification_key.as_ptr(),
                error.as_mut_ptr().cast(),
                error.len() as c_ulonglong,
            )
        };

        match code {
            VERIFIER_VALID_PROOF => Ok(true),
            VERIFIER_INVALID_PROOF => Ok(false),
            VERIFIER_ERROR => Err(NativeError::verifier(c_buffer_to_string(&error))),
            other => Err(NativeError::Other(format!(
                "unexpected verifier return code {other}"
            ))),
        }
    }
}

/// The library reports the required sizes back through the size pointers.
fn short_buffer(buffers: ProveBuffers, proof_size: u64, public_size: u64) -> NativeError {
    if proof_size > buffers.proof as u64 {
        NativeError::ShortBuffer {
            buffer: BufferKind::Proof,
            required: proof_size,
        }
    } else {
        NativeError::ShortBuffer {
            buffer: BufferKind::PublicSignals,
            required: public_size,
        }
    }
}

fn path_to_cstring(path: &Path) -> Result<CString, NativeError> {
    let path = path
        .to_str()
        .ok_or_else(|| NativeError::prover("zkey path is not valid UTF-8"))?;
    CString::new(path).map_err(|_| NativeError::prover("zkey path contains a NUL byte"))
}

fn str_to_cstring(name: &str, value: &str) -> Result<CString, NativeError> {
    CString::new(value).map_err(|_| NativeError::verifier(format!("{name} contains a NUL byte")))
}

fn c_buffer_to_string(buffer: &[u8]) -> String {
    CStr::from_bytes_until_nul(buffer)
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|_| String::from_utf8_lossy(buffer).into_owned())
}
