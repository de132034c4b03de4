//! Argument marshaling
//!
//! Turns the untyped argument map of a channel call into a typed request.
//! Validation fails closed on the first missing or mistyped field, before
//! anything is queued on the worker pool.

use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::error::{BridgeError, Result};
use crate::types::{Operation, ProveRequest, PublicSizeRequest, VerifyRequest};
use crate::value::Value;

/// Largest buffer capacity accepted from the host.
///
/// Hosts hand capacities over as 32-bit signed integers on the narrowest
/// supported platform.
pub const MAX_BUFFER_CAPACITY: usize = i32::MAX as usize;

/// Argument keys, canonical spelling first, legacy spelling second
mod keys {
    pub const ZKEY_PATH: &str = "zkeyPath";
    pub const WITNESS: &str = "witness";
    pub const PROOF_BUFFER: [&str; 2] = ["proofBufferCapacity", "proofBufferSize"];
    pub const PUBLIC_BUFFER: [&str; 2] = ["publicBufferCapacity", "publicBufferSize"];
    pub const ERROR_BUFFER: [&str; 2] = ["errorBufferCapacity", "errorBufferSize"];
    pub const PROOF: &str = "proof";
    pub const INPUTS: &str = "inputs";
    pub const VERIFICATION_KEY: &str = "verificationKey";
}

/// Argument map being consumed for one operation
struct Fields {
    operation: Operation,
    map: BTreeMap<String, Value>,
}

impl Fields {
    fn new(operation: Operation, args: Value) -> Result<Self> {
        match args {
            Value::Map(map) => Ok(Self { operation, map }),
            _ => Err(BridgeError::invalid_arguments(
                operation,
                "Invalid arguments (not a map)",
            )),
        }
    }

    fn invalid(&self, message: String) -> BridgeError {
        BridgeError::invalid_arguments(self.operation, message)
    }

    /// Take the first present, non-null entry among `names`
    fn take(&mut self, names: &[&'static str]) -> Option<(&'static str, Value)> {
        names.iter().find_map(|name| match self.map.remove(*name) {
            None | Some(Value::Null) => None,
            Some(value) => Some((*name, value)),
        })
    }

    fn required_string(&mut self, name: &'static str) -> Result<String> {
        match self.take(&[name]) {
            None => Err(self.invalid(format!("Missing {name}"))),
            Some((_, Value::String(s))) => {
                if s.contains('\0') {
                    return Err(self.invalid(format!("Invalid {name}: contains a NUL byte")));
                }
                Ok(s)
            }
            Some((_, other)) => Err(self.invalid(format!(
                "Invalid {name}: expected string, got {}",
                other.type_name()
            ))),
        }
    }

    fn required_bytes(&mut self, name: &'static str) -> Result<Vec<u8>> {
        match self.take(&[name]) {
            None => Err(self.invalid(format!("Missing {name}"))),
            Some((_, Value::Bytes(bytes))) => Ok(bytes),
            Some((_, other)) => Err(self.invalid(format!(
                "Invalid {name}: expected bytes, got {}",
                other.type_name()
            ))),
        }
    }

    fn required_capacity(&mut self, names: [&'static str; 2]) -> Result<usize> {
        self.optional_capacity(names)?
            .ok_or_else(|| self.invalid(format!("Missing {}", names[0])))
    }

    fn optional_capacity(&mut self, names: [&'static str; 2]) -> Result<Option<usize>> {
        let Some((name, value)) = self.take(&names) else {
            return Ok(None);
        };

        let Value::Int(raw) = value else {
            return Err(self.invalid(format!(
                "Invalid {name}: expected int, got {}",
                value.type_name()
            )));
        };

        match usize::try_from(raw) {
            Ok(capacity) if (1..=MAX_BUFFER_CAPACITY).contains(&capacity) => Ok(Some(capacity)),
            _ => Err(self.invalid(format!(
                "Invalid {name}: {raw} is outside 1..={MAX_BUFFER_CAPACITY}"
            ))),
        }
    }
}

impl ProveRequest {
    /// Build a prove request from channel arguments
    pub fn from_arguments(args: Value) -> Result<Self> {
        let mut fields = Fields::new(Operation::Prove, args)?;

        let zkey_path = PathBuf::from(fields.required_string(keys::ZKEY_PATH)?);
        let witness = fields.required_bytes(keys::WITNESS)?;
        let proof_buffer_capacity = fields.required_capacity(keys::PROOF_BUFFER)?;
        let public_signals_buffer_capacity = fields.optional_capacity(keys::PUBLIC_BUFFER)?;
        let error_buffer_capacity = fields.required_capacity(keys::ERROR_BUFFER)?;

        Ok(Self {
            zkey_path,
            witness,
            proof_buffer_capacity,
            public_signals_buffer_capacity,
            error_buffer_capacity,
        })
    }
}

impl PublicSizeRequest {
    /// Build a public size request from channel arguments
    pub fn from_arguments(args: Value) -> Result<Self> {
        let mut fields = Fields::new(Operation::PublicSize, args)?;

        let zkey_path = PathBuf::from(fields.required_string(keys::ZKEY_PATH)?);
        let error_buffer_capacity = fields.required_capacity(keys::ERROR_BUFFER)?;

        Ok(Self {
            zkey_path,
            error_buffer_capacity,
        })
    }
}

impl VerifyRequest {
    /// Build a verify request from channel arguments
    pub fn from_arguments(args: Value) -> Result<Self> {
        let mut fields = Fields::new(Operation::Verify, args)?;

        let proof = fields.required_string(keys::PROOF)?;
        let public_inputs = fields.required_string(keys::INPUTS)?;
        let verification_key = fields.required_string(keys::VERIFICATION_KEY)?;
        let error_buffer_capacity = fields.optional_capacity(keys::ERROR_BUFFER)?;

        Ok(Self {
            proof,
            public_inputs,
            verification_key,
            error_buffer_capacity,
        })
    }
}
