//! Pure-Rust engine built on arkworks
//!
//! Verifies snarkjs Groth16 proofs over BN254 and sizes public signal
//! buffers from `.zkey` headers. Proving from a `.zkey` needs the native
//! rapidsnark library and is reported as a prover failure here.

use std::path::Path;

use ark_bn254::Bn254;
use ark_groth16::Groth16;
use ark_snark::SNARK;
use tracing::{debug, instrument};

use crate::buffer::{public_buffer_min_capacity, ProveBuffers};
use crate::engine::NativeEngine;
use crate::error::NativeError;
use crate::proof::{parse_public_signals, ProofJson, VerificationKeyJson};
use crate::types::ProveResult;
use crate::zkey::ZkeyHeader;

/// Groth16 engine implemented with arkworks
#[derive(Debug, Default, Clone, Copy)]
pub struct ArkworksEngine;

impl ArkworksEngine {
    /// Create the engine
    pub fn new() -> Self {
        Self
    }

    /// Verify snarkjs documents.
    ///
    /// A well-formed proof that fails the pairing check is `Ok(false)`;
    /// malformed documents are verifier errors.
    pub fn verify_snarkjs(
        proof: &str,
        inputs: &str,
        verification_key: &str,
    ) -> Result<bool, NativeError> {
        let vk = VerificationKeyJson::from_json(verification_key)?.to_ark()?;
        let proof = ProofJson::from_json(proof)?.to_ark()?;
        let inputs = parse_public_signals(inputs)?;

        if inputs.len() + 1 != vk.gamma_abc_g1.len() {
            return Err(NativeError::verifier(format!(
                "Invalid number of public inputs: expected {}, got {}",
                vk.gamma_abc_g1.len() - 1,
                inputs.len()
            )));
        }

        Groth16::<Bn254>::verify(&vk, &inputs, &proof)
            .map_err(|e| NativeError::verifier(e.to_string()))
    }
}

impl NativeEngine for ArkworksEngine {
    fn groth16_prove(
        &self,
        zkey_path: &Path,
        _witness: &[u8],
        _buffers: ProveBuffers,
    ) -> Result<ProveResult, NativeError> {
        ZkeyHeader::read(zkey_path)?;
        Err(NativeError::prover(
            "Proving from a zkey file requires the native rapidsnark engine",
        ))
    }

    #[instrument(skip(self))]
    fn groth16_public_buffer_size(
        &self,
        zkey_path: &Path,
        _error_capacity: usize,
    ) -> Result<usize, NativeError> {
        let header = ZkeyHeader::read(zkey_path)?;
        Ok(public_buffer_min_capacity(header.n_public as usize))
    }

    #[instrument(skip_all)]
    fn groth16_verify(
        &self,
        proof: &str,
        inputs: &str,
        verification_key: &str,
        _error_capacity: usize,
    ) -> Result<bool, NativeError> {
        let valid = Self::verify_snarkjs(proof, inputs, verification_key)?;
        debug!("Pairing check result: {}", valid);
        Ok(valid)
    }
}
