//! Request and result types for the three bridge operations

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::value::Value;

/// Method name of the prove operation
pub const GROTH16_PROVE: &str = "groth16Prove";
/// Method name of the public buffer size query
pub const GROTH16_PUBLIC_BUFFER_SIZE: &str = "groth16PublicBufferSize";
/// Method name of the verify operation
pub const GROTH16_VERIFY: &str = "groth16Verify";

/// Operations understood by the bridge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Groth16 proof generation
    Prove,
    /// Public-signal buffer size query
    PublicSize,
    /// Groth16 proof verification
    Verify,
}

impl Operation {
    /// Channel method name
    pub fn method_name(&self) -> &'static str {
        match self {
            Self::Prove => GROTH16_PROVE,
            Self::PublicSize => GROTH16_PUBLIC_BUFFER_SIZE,
            Self::Verify => GROTH16_VERIFY,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.method_name())
    }
}

/// Error returned when a method name is not one of the bridge operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownOperation(pub String);

impl FromStr for Operation {
    type Err = UnknownOperation;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            GROTH16_PROVE => Ok(Self::Prove),
            GROTH16_PUBLIC_BUFFER_SIZE => Ok(Self::PublicSize),
            GROTH16_VERIFY => Ok(Self::Verify),
            other => Err(UnknownOperation(other.to_string())),
        }
    }
}

/// Input for proof generation
///
/// Owns the witness for the lifetime of the request.
#[derive(Clone)]
pub struct ProveRequest {
    /// Path to the `.zkey` proving key
    pub zkey_path: PathBuf,
    /// Binary witness (`.wtns` contents)
    pub witness: Vec<u8>,
    /// Capacity of the proof output buffer
    pub proof_buffer_capacity: usize,
    /// Capacity of the public signals buffer; `None` lets the engine size it
    pub public_signals_buffer_capacity: Option<usize>,
    /// Capacity of the error message buffer
    pub error_buffer_capacity: usize,
}

impl fmt::Debug for ProveRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProveRequest")
            .field("zkey_path", &self.zkey_path)
            .field("witness_len", &self.witness.len())
            .field("proof_buffer_capacity", &self.proof_buffer_capacity)
            .field(
                "public_signals_buffer_capacity",
                &self.public_signals_buffer_capacity,
            )
            .field("error_buffer_capacity", &self.error_buffer_capacity)
            .finish()
    }
}

/// Output of a successful proof generation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProveResult {
    /// Serialized proof (snarkjs JSON)
    pub proof: String,
    /// Serialized public signals (JSON array of decimal strings)
    pub public_signals: String,
}

impl ProveResult {
    /// Convert to the channel reply payload
    pub fn into_value(self) -> Value {
        let mut map = BTreeMap::new();
        map.insert("proof".to_string(), Value::String(self.proof));
        map.insert("publicSignals".to_string(), Value::String(self.public_signals));
        Value::Map(map)
    }
}

/// Input for the public buffer size query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicSizeRequest {
    /// Path to the `.zkey` proving key
    pub zkey_path: PathBuf,
    /// Capacity of the error message buffer
    pub error_buffer_capacity: usize,
}

/// Input for proof verification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyRequest {
    /// Serialized proof (snarkjs JSON)
    pub proof: String,
    /// Serialized public inputs (JSON array of decimal strings)
    pub public_inputs: String,
    /// Serialized verification key (snarkjs JSON)
    pub verification_key: String,
    /// Capacity of the error message buffer; defaults from configuration
    pub error_buffer_capacity: Option<usize>,
}
