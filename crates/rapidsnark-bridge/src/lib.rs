//! # Rapidsnark Bridge
//!
//! Asynchronous method-channel bridge between a host application and a
//! native Groth16 engine.
//!
//! ## Operations
//!
//! - **`groth16Prove`**: generate a proof and its public signals from a
//!   `.zkey` proving key and a witness
//! - **`groth16PublicBufferSize`**: bytes needed for the public signals of
//!   proofs made with a proving key
//! - **`groth16Verify`**: check a proof against public inputs and a
//!   verification key
//!
//! Arguments are validated on the calling thread, native work runs on a
//! worker pool and every call gets exactly one reply.
//!
//! ## Example
//!
//! ```rust,ignore
//! use rapidsnark_bridge::{Arguments, ArkworksEngine, Bridge, BridgeConfig, MethodCall};
//!
//! let bridge = Bridge::attach(BridgeConfig::default(), Arc::new(ArkworksEngine::new()))?;
//!
//! let call = MethodCall::new(
//!     "groth16Verify",
//!     Arguments::new()
//!         .with("proof", proof_json)
//!         .with("inputs", public_signals_json)
//!         .with("verificationKey", vk_json),
//! );
//! let response = bridge.invoke(call).await;
//! ```

#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod buffer;
pub mod codec;
pub mod completion;
pub mod config;
pub mod engine;
pub mod error;
pub mod executor;
pub mod marshal;
pub mod proof;
pub mod router;
pub mod translate;
pub mod types;
pub mod value;
pub mod verifier;
pub mod zkey;

#[cfg(feature = "rapidsnark")]
pub mod ffi;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

// Re-exports
pub use completion::{host_queue, CompletionContext, HostLoop, HostQueue, Inline};
pub use config::BridgeConfig;
pub use engine::NativeEngine;
pub use error::{BridgeError, ErrorKind, ErrorReply, NativeError, Result};
pub use executor::WorkerPolicy;
pub use router::{Bridge, MethodCall, MethodResponse};
pub use types::{Operation, GROTH16_PROVE, GROTH16_PUBLIC_BUFFER_SIZE, GROTH16_VERIFY};
pub use value::{Arguments, Value};
pub use verifier::ArkworksEngine;

#[cfg(feature = "rapidsnark")]
pub use ffi::RapidsnarkEngine;
