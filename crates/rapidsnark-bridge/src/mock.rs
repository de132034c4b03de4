//! Test engines and fixtures
//!
//! [`MockEngine`] is a deterministic stand-in for the native library with
//! call counters and scripted failures. [`Groth16Fixture`] produces a real
//! BN254 proof, verification key and public signals in snarkjs format.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use ark_bn254::{Bn254, Fr};
use ark_groth16::Groth16;
use ark_relations::lc;
use ark_relations::r1cs::{ConstraintSynthesizer, ConstraintSystemRef, SynthesisError};
use ark_snark::{CircuitSpecificSetupSNARK, SNARK};
use ark_std::rand::rngs::StdRng;
use ark_std::rand::SeedableRng;
use serde_json::json;

use crate::buffer::{public_buffer_min_capacity, ProveBuffers, PROOF_BUFFER_MIN_CAPACITY};
use crate::engine::NativeEngine;
use crate::error::{BufferKind, NativeError};
use crate::proof::{public_signals_to_json, ProofJson, VerificationKeyJson};
use crate::types::ProveResult;

/// Deterministic engine for exercising the bridge
#[derive(Debug, Default)]
pub struct MockEngine {
    zkeys: HashMap<PathBuf, usize>,
    delay: Duration,
    prove_failure: Option<String>,
    panic_on_prove: bool,
    prove_calls: AtomicUsize,
    public_size_calls: AtomicUsize,
    verify_calls: AtomicUsize,
    public_capacities: Mutex<Vec<usize>>,
}

impl MockEngine {
    /// Engine that knows no proving keys
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a proving key with `n_public` public signals
    #[must_use]
    pub fn with_zkey(mut self, path: impl Into<PathBuf>, n_public: usize) -> Self {
        self.zkeys.insert(path.into(), n_public);
        self
    }

    /// Block every native call for `delay`
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Fail every prove call with `message`
    #[must_use]
    pub fn with_prove_failure(mut self, message: impl Into<String>) -> Self {
        self.prove_failure = Some(message.into());
        self
    }

    /// Panic inside every prove call
    #[must_use]
    pub fn with_panic_on_prove(mut self) -> Self {
        self.panic_on_prove = true;
        self
    }

    /// Verification key accepted by [`MockEngine::groth16_verify`]
    pub fn verification_key(n_public: usize) -> String {
        json!({ "protocol": "mock", "nPublic": n_public }).to_string()
    }

    /// Public signals the engine derives from `witness`
    pub fn public_signals_for(witness: &[u8], n_public: usize) -> String {
        let signals: Vec<String> = (0..n_public)
            .map(|i| (witness.len() + i).to_string())
            .collect();
        json!(signals).to_string()
    }

    /// Prove calls received
    pub fn prove_calls(&self) -> usize {
        self.prove_calls.load(Ordering::SeqCst)
    }

    /// Public size calls received
    pub fn public_size_calls(&self) -> usize {
        self.public_size_calls.load(Ordering::SeqCst)
    }

    /// Verify calls received
    pub fn verify_calls(&self) -> usize {
        self.verify_calls.load(Ordering::SeqCst)
    }

    /// Public signals capacities passed to prove calls, in call order
    pub fn public_capacities(&self) -> Vec<usize> {
        self.public_capacities
            .lock()
            .map(|c| c.clone())
            .unwrap_or_default()
    }

    fn n_public(&self, zkey_path: &Path) -> Result<usize, NativeError> {
        self.zkeys.get(zkey_path).copied().ok_or_else(|| {
            NativeError::prover(format!("Failed to open zkey {}", zkey_path.display()))
        })
    }

    fn simulate_work(&self) {
        if !self.delay.is_zero() {
            thread::sleep(self.delay);
        }
    }
}

impl NativeEngine for MockEngine {
    fn groth16_prove(
        &self,
        zkey_path: &Path,
        witness: &[u8],
        buffers: ProveBuffers,
    ) -> Result<ProveResult, NativeError> {
        self.prove_calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut capacities) = self.public_capacities.lock() {
            capacities.push(buffers.public_signals);
        }
        self.simulate_work();

        if self.panic_on_prove {
            panic!("mock prover crashed");
        }
        if let Some(message) = &self.prove_failure {
            return Err(NativeError::prover(message.clone()));
        }

        let n_public = self.n_public(zkey_path)?;
        if buffers.proof < PROOF_BUFFER_MIN_CAPACITY {
            return Err(NativeError::ShortBuffer {
                buffer: BufferKind::Proof,
                required: PROOF_BUFFER_MIN_CAPACITY as u64,
            });
        }
        let required = public_buffer_min_capacity(n_public);
        if buffers.public_signals < required {
            return Err(NativeError::ShortBuffer {
                buffer: BufferKind::PublicSignals,
                required: required as u64,
            });
        }

        Ok(ProveResult {
            proof: json!({ "protocol": "mock", "witness": hex::encode(witness) }).to_string(),
            public_signals: Self::public_signals_for(witness, n_public),
        })
    }

    fn groth16_public_buffer_size(
        &self,
        zkey_path: &Path,
        _error_capacity: usize,
    ) -> Result<usize, NativeError> {
        self.public_size_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate_work();
        Ok(public_buffer_min_capacity(self.n_public(zkey_path)?))
    }

    fn groth16_verify(
        &self,
        proof: &str,
        inputs: &str,
        verification_key: &str,
        _error_capacity: usize,
    ) -> Result<bool, NativeError> {
        self.verify_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate_work();

        let vk: serde_json::Value = serde_json::from_str(verification_key)
            .map_err(|e| NativeError::verifier(format!("invalid verification key: {e}")))?;
        let n_public = vk
            .get("nPublic")
            .and_then(serde_json::Value::as_u64)
            .ok_or_else(|| NativeError::verifier("invalid verification key: missing nPublic"))?;

        let proof: serde_json::Value = serde_json::from_str(proof)
            .map_err(|e| NativeError::verifier(format!("invalid proof: {e}")))?;
        let witness = proof
            .get("witness")
            .and_then(serde_json::Value::as_str)
            .and_then(|w| hex::decode(w).ok())
            .ok_or_else(|| NativeError::verifier("invalid proof: bad witness commitment"))?;

        let inputs: Vec<String> = serde_json::from_str(inputs)
            .map_err(|e| NativeError::verifier(format!("invalid public inputs: {e}")))?;
        let expected: Vec<String> =
            serde_json::from_str(&Self::public_signals_for(&witness, n_public as usize))
                .map_err(|e| NativeError::Other(e.to_string()))?;

        Ok(inputs == expected)
    }
}

/// Proves knowledge of `a`, `b` with `a * b = c`, `c` public
#[derive(Clone, Copy)]
struct MultiplyCircuit {
    a: Option<Fr>,
    b: Option<Fr>,
}

impl ConstraintSynthesizer<Fr> for MultiplyCircuit {
    fn generate_constraints(self, cs: ConstraintSystemRef<Fr>) -> Result<(), SynthesisError> {
        let a = cs.new_witness_variable(|| self.a.ok_or(SynthesisError::AssignmentMissing))?;
        let b = cs.new_witness_variable(|| self.b.ok_or(SynthesisError::AssignmentMissing))?;
        let c = cs.new_input_variable(|| {
            let a = self.a.ok_or(SynthesisError::AssignmentMissing)?;
            let b = self.b.ok_or(SynthesisError::AssignmentMissing)?;
            Ok(a * b)
        })?;
        cs.enforce_constraint(lc!() + a, lc!() + b, lc!() + c)?;
        Ok(())
    }
}

/// A real Groth16 proof with its verification key, in snarkjs JSON
#[derive(Debug, Clone)]
pub struct Groth16Fixture {
    /// Proof JSON
    pub proof: String,
    /// Public signals JSON
    pub public_signals: String,
    /// Verification key JSON
    pub verification_key: String,
}

impl Groth16Fixture {
    /// Prove `a * b` over BN254 with a fresh deterministic setup
    pub fn multiply(a: u64, b: u64) -> Result<Self, NativeError> {
        let fail = |e: SynthesisError| NativeError::prover(e.to_string());
        let mut rng = StdRng::seed_from_u64(0);

        let setup = MultiplyCircuit { a: None, b: None };
        let (pk, vk) = Groth16::<Bn254>::circuit_specific_setup(setup, &mut rng).map_err(fail)?;

        let (a, b) = (Fr::from(a), Fr::from(b));
        let circuit = MultiplyCircuit {
            a: Some(a),
            b: Some(b),
        };
        let proof = Groth16::<Bn254>::prove(&pk, circuit, &mut rng).map_err(fail)?;

        let format = |e: crate::proof::FormatError| NativeError::Other(e.to_string());
        Ok(Self {
            proof: ProofJson::from_ark(&proof).to_json().map_err(format)?,
            public_signals: public_signals_to_json(&[a * b]).map_err(format)?,
            verification_key: VerificationKeyJson::from_ark(&vk).to_json().map_err(format)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buffers() -> ProveBuffers {
        ProveBuffers {
            proof: 1024,
            public_signals: 250,
            error: 256,
        }
    }

    #[test]
    fn test_mock_prove_and_verify() {
        let engine = MockEngine::new().with_zkey("c.zkey", 3);
        let result = engine
            .groth16_prove(Path::new("c.zkey"), b"wtns", buffers())
            .unwrap();
        assert_eq!(result.public_signals, r#"["4","5","6"]"#);

        let vk = MockEngine::verification_key(3);
        assert_eq!(
            engine.groth16_verify(&result.proof, &result.public_signals, &vk, 256),
            Ok(true)
        );
        assert_eq!(
            engine.groth16_verify(&result.proof, r#"["4","5","7"]"#, &vk, 256),
            Ok(false)
        );
        assert_eq!(engine.prove_calls(), 1);
        assert_eq!(engine.verify_calls(), 2);
    }

    #[test]
    fn test_mock_short_public_buffer() {
        let engine = MockEngine::new().with_zkey("c.zkey", 3);
        let small = ProveBuffers {
            public_signals: 100,
            ..buffers()
        };
        assert_eq!(
            engine.groth16_prove(Path::new("c.zkey"), b"wtns", small),
            Err(NativeError::ShortBuffer {
                buffer: BufferKind::PublicSignals,
                required: 250,
            })
        );
    }

    #[test]
    fn test_fixture_shape() {
        let fixture = Groth16Fixture::multiply(6, 7).unwrap();
        assert_eq!(fixture.public_signals, r#"["42"]"#);

        let vk = VerificationKeyJson::from_json(&fixture.verification_key).unwrap();
        assert_eq!(vk.n_public, 1);
        assert_eq!(vk.ic.len(), 2);
    }
}
