//! End-to-end tests through the method-channel surface

use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rapidsnark_bridge::codec::{decode_call, decode_response, encode_call, encode_response};
use rapidsnark_bridge::error::AttachError;
use rapidsnark_bridge::mock::{Groth16Fixture, MockEngine};
use rapidsnark_bridge::proof::ProofJson;
use rapidsnark_bridge::zkey::testing::header_only_zkey;
use rapidsnark_bridge::{
    host_queue, Arguments, ArkworksEngine, Bridge, BridgeConfig, MethodCall, MethodResponse,
    Value, WorkerPolicy, GROTH16_PROVE, GROTH16_PUBLIC_BUFFER_SIZE, GROTH16_VERIFY,
};

const ZKEY: &str = "circuit_final.zkey";

fn config(threads: usize) -> BridgeConfig {
    BridgeConfig::default().with_workers(WorkerPolicy::Bounded {
        threads: Some(threads),
    })
}

fn prove_args(witness: &[u8]) -> Arguments {
    Arguments::new()
        .with("zkeyPath", ZKEY)
        .with("witness", witness.to_vec())
        .with("proofBufferCapacity", 1024)
        .with("errorBufferCapacity", 256)
}

fn error_kind(response: &MethodResponse) -> Option<&str> {
    match response {
        MethodResponse::Error(reply) => reply
            .details
            .as_ref()
            .and_then(|d| d.get("kind"))
            .and_then(Value::as_str),
        _ => None,
    }
}

fn error_message(response: &MethodResponse) -> Option<&str> {
    match response {
        MethodResponse::Error(reply) => Some(reply.message.as_str()),
        _ => None,
    }
}

#[tokio::test]
async fn test_prove_returns_artifacts() {
    let engine = Arc::new(MockEngine::new().with_zkey(ZKEY, 2));
    let bridge = Bridge::attach(config(2), engine.clone()).unwrap();

    let args = prove_args(b"wtns-1").with("publicBufferCapacity", 168);
    let response = bridge.invoke(MethodCall::new(GROTH16_PROVE, args)).await;

    let MethodResponse::Success(result) = response else {
        panic!("expected success, got {response:?}");
    };
    let proof = result.get("proof").and_then(Value::as_str).unwrap();
    let public_signals = result.get("publicSignals").and_then(Value::as_str).unwrap();
    assert!(!proof.is_empty());
    assert_eq!(public_signals, r#"["6","7"]"#);

    assert_eq!(engine.prove_calls(), 1);
    assert_eq!(engine.public_size_calls(), 0);
}

#[tokio::test]
async fn test_omitted_public_capacity_is_negotiated_once() {
    let engine = Arc::new(MockEngine::new().with_zkey(ZKEY, 3));
    let bridge = Bridge::attach(config(1), engine.clone()).unwrap();

    let response = bridge
        .invoke(MethodCall::new(GROTH16_PROVE, prove_args(b"wtns")))
        .await;
    assert!(matches!(response, MethodResponse::Success(_)));
    assert_eq!(engine.public_size_calls(), 1);

    let size_args = Arguments::new()
        .with("zkeyPath", ZKEY)
        .with("errorBufferCapacity", 256);
    let size = bridge
        .invoke(MethodCall::new(GROTH16_PUBLIC_BUFFER_SIZE, size_args))
        .await;
    assert_eq!(size, MethodResponse::Success(Value::Int(250)));
    assert_eq!(engine.public_capacities(), vec![250]);
}

#[tokio::test]
async fn test_failed_size_negotiation_is_prover_failure() {
    let engine = Arc::new(MockEngine::new());
    let bridge = Bridge::attach(config(1), engine.clone()).unwrap();

    let response = bridge
        .invoke(MethodCall::new(GROTH16_PROVE, prove_args(b"wtns")))
        .await;

    assert_eq!(error_kind(&response), Some("NativeProverFailure"));
    assert_eq!(engine.public_size_calls(), 1);
    assert_eq!(engine.prove_calls(), 0);
}

#[tokio::test]
async fn test_invalid_arguments_never_reach_the_pool() {
    let engine = Arc::new(MockEngine::new().with_zkey(ZKEY, 1));
    let bridge = Bridge::attach(config(1), engine.clone()).unwrap();

    let args = prove_args(b"wtns").without("zkeyPath");
    let response = bridge.invoke(MethodCall::new(GROTH16_PROVE, args)).await;

    assert_eq!(error_kind(&response), Some("InvalidArguments"));
    assert_eq!(error_message(&response), Some("Missing zkeyPath"));
    let MethodResponse::Error(reply) = &response else {
        unreachable!()
    };
    assert_eq!(reply.code, GROTH16_PROVE);

    let response = bridge
        .invoke(MethodCall::new(GROTH16_VERIFY, Value::from("not a map")))
        .await;
    assert_eq!(error_kind(&response), Some("InvalidArguments"));

    assert_eq!(bridge.submissions(), 0);
    assert_eq!(engine.prove_calls(), 0);
}

#[tokio::test]
async fn test_short_buffer_is_invalid_arguments() {
    let engine = Arc::new(MockEngine::new().with_zkey(ZKEY, 1));
    let bridge = Bridge::attach(config(1), engine).unwrap();

    let args = prove_args(b"wtns").with("proofBufferCapacity", 100);
    let response = bridge.invoke(MethodCall::new(GROTH16_PROVE, args)).await;

    assert_eq!(error_kind(&response), Some("InvalidArguments"));
    assert_eq!(
        error_message(&response),
        Some("proof buffer too small, 810 bytes required")
    );
}

#[tokio::test]
async fn test_native_message_is_truncated_to_error_capacity() {
    let engine = Arc::new(
        MockEngine::new()
            .with_zkey(ZKEY, 1)
            .with_prove_failure("invalid witness length"),
    );
    let bridge = Bridge::attach(config(1), engine).unwrap();

    let args = prove_args(b"wtns")
        .with("publicBufferCapacity", 86)
        .with("errorBufferCapacity", 8);
    let response = bridge.invoke(MethodCall::new(GROTH16_PROVE, args)).await;

    assert_eq!(error_kind(&response), Some("NativeProverFailure"));
    assert_eq!(error_message(&response), Some("invalid"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_proves_match_serial_results() {
    let engine = Arc::new(
        MockEngine::new()
            .with_zkey(ZKEY, 2)
            .with_delay(Duration::from_millis(50)),
    );
    let witnesses: [&[u8]; 4] = [b"a", b"bb", b"ccc", b"dddd"];

    let serial = Bridge::attach(config(1), engine.clone()).unwrap();
    let mut baseline = Vec::new();
    for witness in witnesses {
        baseline.push(
            serial
                .invoke(MethodCall::new(GROTH16_PROVE, prove_args(witness)))
                .await,
        );
    }
    serial.detach();

    let bridge = Bridge::attach(config(4), engine.clone()).unwrap();
    let call = |witness: &[u8]| MethodCall::new(GROTH16_PROVE, prove_args(witness));
    let (a, b, c, d) = tokio::join!(
        bridge.invoke(call(witnesses[0])),
        bridge.invoke(call(witnesses[1])),
        bridge.invoke(call(witnesses[2])),
        bridge.invoke(call(witnesses[3])),
    );

    assert_eq!(vec![a, b, c, d], baseline);
    assert!(baseline
        .iter()
        .all(|r| matches!(r, MethodResponse::Success(_))));
    assert_eq!(bridge.submissions(), 4);
}

#[tokio::test]
async fn test_elastic_policy_serves_requests() {
    let engine = Arc::new(MockEngine::new().with_zkey(ZKEY, 1));
    let config = BridgeConfig::default().with_workers(WorkerPolicy::Elastic);
    let bridge = Bridge::attach(config, engine).unwrap();

    let size_args = Arguments::new()
        .with("zkeyPath", ZKEY)
        .with("errorBufferCapacity", 256);
    let response = bridge
        .invoke(MethodCall::new(GROTH16_PUBLIC_BUFFER_SIZE, size_args))
        .await;
    assert_eq!(response, MethodResponse::Success(Value::Int(86)));
}

#[tokio::test]
async fn test_verify_real_groth16_proof() {
    let fixture = Groth16Fixture::multiply(3, 11).unwrap();
    let bridge = Bridge::attach(config(2), Arc::new(ArkworksEngine::new())).unwrap();

    let args = Arguments::new()
        .with("proof", fixture.proof.clone())
        .with("inputs", fixture.public_signals.clone())
        .with("verificationKey", fixture.verification_key.clone());
    let response = bridge.invoke(MethodCall::new(GROTH16_VERIFY, args)).await;
    assert_eq!(response, MethodResponse::Success(Value::Bool(true)));
}

#[tokio::test]
async fn test_tampered_proof_is_rejected_without_crashing() {
    let fixture = Groth16Fixture::multiply(3, 11).unwrap();
    let other = Groth16Fixture::multiply(2, 5).unwrap();
    let bridge = Bridge::attach(config(2), Arc::new(ArkworksEngine::new())).unwrap();
    let verify = |proof: String| {
        MethodCall::new(
            GROTH16_VERIFY,
            Arguments::new()
                .with("proof", proof)
                .with("inputs", fixture.public_signals.clone())
                .with("verificationKey", fixture.verification_key.clone()),
        )
    };

    // Well-formed proof for a different statement.
    let response = bridge.invoke(verify(other.proof.clone())).await;
    assert_eq!(response, MethodResponse::Success(Value::Bool(false)));

    // Point moved off the curve.
    let mut tampered = ProofJson::from_json(&fixture.proof).unwrap();
    tampered.pi_a[0] = "1".into();
    let response = bridge
        .invoke(verify(tampered.to_json().unwrap()))
        .await;
    match &response {
        MethodResponse::Success(Value::Bool(false)) => {}
        other => assert_eq!(error_kind(other), Some("NativeVerifierFailure")),
    }

    // The bridge keeps serving.
    let response = bridge.invoke(verify(fixture.proof.clone())).await;
    assert_eq!(response, MethodResponse::Success(Value::Bool(true)));
}

#[tokio::test]
async fn test_oversized_public_count_is_verifier_failure() {
    let fixture = Groth16Fixture::multiply(3, 11).unwrap();
    let mut vk: serde_json::Value = serde_json::from_str(&fixture.verification_key).unwrap();
    vk["nPublic"] = serde_json::Value::from(u64::MAX);
    let bridge = Bridge::attach(config(1), Arc::new(ArkworksEngine::new())).unwrap();

    let args = Arguments::new()
        .with("proof", fixture.proof.clone())
        .with("inputs", fixture.public_signals.clone())
        .with("verificationKey", vk.to_string());
    let response = bridge.invoke(MethodCall::new(GROTH16_VERIFY, args)).await;

    assert_eq!(error_kind(&response), Some("NativeVerifierFailure"));
    assert_eq!(error_message(&response), Some("malformed point: IC"));
}

#[tokio::test]
async fn test_verify_uses_configured_error_capacity() {
    let engine = Arc::new(MockEngine::new());
    let config = BridgeConfig {
        default_error_buffer_capacity: 8,
        ..config(1)
    };
    let bridge = Bridge::attach(config, engine).unwrap();
    let verify = |args: Arguments| MethodCall::new(GROTH16_VERIFY, args);
    let args = Arguments::new()
        .with("proof", "{}")
        .with("inputs", "[]")
        .with("verificationKey", "not json");

    let response = bridge.invoke(verify(args.clone())).await;
    assert_eq!(error_kind(&response), Some("NativeVerifierFailure"));
    assert_eq!(error_message(&response), Some("invalid"));

    let response = bridge
        .invoke(verify(args.with("errorBufferCapacity", 256)))
        .await;
    let message = error_message(&response).unwrap();
    assert!(message.starts_with("invalid verification key: "), "{message}");
}

#[test]
fn test_attach_rejects_zero_error_capacity() {
    let config = BridgeConfig {
        default_error_buffer_capacity: 0,
        ..config(1)
    };
    let result = Bridge::attach(config, Arc::new(MockEngine::new()));
    assert!(matches!(result, Err(AttachError::OutOfRange { .. })));
}

#[tokio::test]
async fn test_public_size_from_zkey_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(&header_only_zkey(1, 4)).unwrap();
    let bridge = Bridge::attach(config(1), Arc::new(ArkworksEngine::new())).unwrap();

    let args = Arguments::new()
        .with("zkeyPath", file.path().to_string_lossy().into_owned())
        .with("errorBufferCapacity", 256);
    let response = bridge
        .invoke(MethodCall::new(GROTH16_PUBLIC_BUFFER_SIZE, args))
        .await;
    assert_eq!(response, MethodResponse::Success(Value::Int(332)));

    let args = Arguments::new()
        .with("zkeyPath", "/nonexistent/circuit.zkey")
        .with("errorBufferCapacity", 256);
    let response = bridge
        .invoke(MethodCall::new(GROTH16_PUBLIC_BUFFER_SIZE, args))
        .await;
    assert_eq!(error_kind(&response), Some("NativeProverFailure"));
}

#[tokio::test]
async fn test_unknown_method_is_not_implemented() {
    let bridge = Bridge::attach(config(1), Arc::new(MockEngine::new())).unwrap();

    let response = bridge
        .invoke(MethodCall::new("groth16Setup", Arguments::new()))
        .await;
    assert_eq!(response, MethodResponse::NotImplemented);
    assert_eq!(bridge.submissions(), 0);
}

#[tokio::test]
async fn test_engine_panic_is_unknown_error() {
    let engine = Arc::new(MockEngine::new().with_zkey(ZKEY, 1).with_panic_on_prove());
    let bridge = Bridge::attach(config(1), engine).unwrap();

    let args = prove_args(b"wtns").with("publicBufferCapacity", 86);
    let response = bridge.invoke(MethodCall::new(GROTH16_PROVE, args)).await;
    assert_eq!(error_kind(&response), Some("Unknown"));
    assert_eq!(error_message(&response), Some("mock prover crashed"));

    let size_args = Arguments::new()
        .with("zkeyPath", ZKEY)
        .with("errorBufferCapacity", 256);
    let response = bridge
        .invoke(MethodCall::new(GROTH16_PUBLIC_BUFFER_SIZE, size_args))
        .await;
    assert_eq!(response, MethodResponse::Success(Value::Int(86)));
}

#[test]
fn test_detach_with_requests_in_flight() {
    let engine = Arc::new(
        MockEngine::new()
            .with_zkey(ZKEY, 1)
            .with_delay(Duration::from_millis(100)),
    );
    let (queue, host) = host_queue();
    let bridge = Bridge::attach_with_context(config(1), engine, queue).unwrap();

    let replies = Arc::new(Mutex::new(Vec::new()));
    for witness in [b"w1", b"w2", b"w3", b"w4"] {
        let replies = Arc::clone(&replies);
        bridge.handle(
            MethodCall::new(GROTH16_PROVE, prove_args(witness)),
            move |response| replies.lock().unwrap().push(response),
        );
    }
    bridge.detach();

    while replies.lock().unwrap().len() < 4 {
        assert!(
            host.run_next(Duration::from_secs(5)),
            "a request was never answered"
        );
    }

    let replies = replies.lock().unwrap();
    let abandoned = replies
        .iter()
        .filter(|r| error_message(r) == Some("request abandoned before completion"))
        .count();
    assert!(abandoned >= 3, "only {abandoned} requests were abandoned");
    for reply in replies.iter() {
        assert!(
            matches!(reply, MethodResponse::Success(_)) || error_kind(reply) == Some("Unknown"),
            "unexpected reply {reply:?}"
        );
    }
    assert_eq!(host.run_pending(), 0);
}

#[tokio::test]
async fn test_json_channel_round_trip() {
    let engine = Arc::new(MockEngine::new().with_zkey(ZKEY, 1));
    let bridge = Bridge::attach(config(1), engine).unwrap();

    let payload = serde_json::json!({
        "method": "groth16Prove",
        "args": {
            "zkeyPath": ZKEY,
            "witness": {"$bytes": "d3RucwI="},
            "proofBufferSize": 1024,
            "errorBufferSize": 256,
        },
    });
    let call = decode_call(payload.to_string().as_bytes()).unwrap();
    assert_eq!(decode_call(&encode_call(&call).unwrap()).unwrap(), call);

    let response = bridge.invoke(call).await;
    let encoded = encode_response(&response).unwrap();

    let json: serde_json::Value = serde_json::from_slice(&encoded).unwrap();
    assert_eq!(json[0]["publicSignals"], r#"["5"]"#);
    assert_eq!(decode_response(&encoded).unwrap(), response);
}
