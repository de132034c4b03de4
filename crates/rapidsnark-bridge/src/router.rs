//! Method-channel router
//!
//! The entry point the host talks to. Each call names an operation and
//! carries an argument map; the router validates it on the calling thread,
//! hands the native work to the executor and replies exactly once.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::oneshot;
use tracing::{debug, info, instrument};

use crate::buffer::negotiate_prove_buffers;
use crate::completion::{CompletionContext, Inline, Reply, Responder};
use crate::config::BridgeConfig;
use crate::engine::{Dispatcher, NativeEngine};
use crate::error::{AttachError, BridgeError, ErrorReply, Result};
use crate::executor::Executor;
use crate::translate::translate;
use crate::types::{Operation, ProveRequest, PublicSizeRequest, VerifyRequest};
use crate::value::Value;

/// An incoming channel call
#[derive(Debug, Clone, PartialEq)]
pub struct MethodCall {
    /// Operation name
    pub method: String,
    /// Untyped argument map
    pub arguments: Value,
}

impl MethodCall {
    /// Create a call
    pub fn new(method: impl Into<String>, arguments: impl Into<Value>) -> Self {
        Self {
            method: method.into(),
            arguments: arguments.into(),
        }
    }
}

/// The single reply to a channel call
#[derive(Debug, Clone, PartialEq)]
pub enum MethodResponse {
    /// Operation succeeded
    Success(Value),
    /// Operation failed
    Error(ErrorReply),
    /// The method name is not handled by this bridge
    NotImplemented,
}

/// A bridge attached to its host
///
/// Stateless between calls apart from the worker pool, which lives from
/// [`Bridge::attach`] until [`Bridge::detach`].
pub struct Bridge {
    config: BridgeConfig,
    dispatcher: Dispatcher,
    executor: Executor,
    context: Arc<dyn CompletionContext>,
}

impl Bridge {
    /// Attach with replies delivered on the worker threads
    pub fn attach(
        config: BridgeConfig,
        engine: Arc<dyn NativeEngine>,
    ) -> std::result::Result<Self, AttachError> {
        Self::attach_with_context(config, engine, Arc::new(Inline))
    }

    /// Attach with replies delivered through `context`
    pub fn attach_with_context(
        config: BridgeConfig,
        engine: Arc<dyn NativeEngine>,
        context: Arc<dyn CompletionContext>,
    ) -> std::result::Result<Self, AttachError> {
        config.validate()?;
        let executor = Executor::new(config.workers)?;
        info!("Bridge attached on channel {}", config.channel_name);

        Ok(Self {
            config,
            dispatcher: Dispatcher::new(engine),
            executor,
            context,
        })
    }

    /// Channel this bridge is registered under
    pub fn channel_name(&self) -> &str {
        &self.config.channel_name
    }

    /// Jobs handed to the worker pool so far
    pub fn submissions(&self) -> u64 {
        self.executor.submitted()
    }

    /// Handle one call; `reply` runs exactly once on the completion context
    pub fn handle<F>(&self, call: MethodCall, reply: F)
    where
        F: FnOnce(MethodResponse) + Send + 'static,
    {
        let operation = match call.method.parse::<Operation>() {
            Ok(operation) => operation,
            Err(_) => {
                debug!("Method {} not implemented", call.method);
                self.context
                    .deliver(Box::new(move || reply(MethodResponse::NotImplemented)));
                return;
            }
        };

        let reply: Reply = Box::new(reply);
        let responder = Responder::new(operation, reply, Arc::clone(&self.context));

        match operation {
            Operation::Prove => self.dispatch(
                responder,
                ProveRequest::from_arguments(call.arguments),
                run_prove,
            ),
            Operation::PublicSize => self.dispatch(
                responder,
                PublicSizeRequest::from_arguments(call.arguments),
                run_public_size,
            ),
            Operation::Verify => {
                let default_error = self.config.default_error_buffer_capacity;
                self.dispatch(
                    responder,
                    VerifyRequest::from_arguments(call.arguments),
                    move |dispatcher, request| run_verify(dispatcher, request, default_error),
                );
            }
        }
    }

    /// Handle one call and await its reply
    pub async fn invoke(&self, call: MethodCall) -> MethodResponse {
        let (tx, rx) = oneshot::channel();
        let operation = call.method.parse::<Operation>();
        self.handle(call, move |response| {
            // The caller may have stopped waiting.
            let _ = tx.send(response);
        });

        rx.await.unwrap_or_else(|_| match operation {
            Ok(operation) => {
                let error = BridgeError::unknown(operation, "reply dropped before delivery");
                MethodResponse::Error(error.into_reply())
            }
            Err(_) => MethodResponse::NotImplemented,
        })
    }

    /// Shut the worker pool down.
    ///
    /// Requests still queued are answered with an abandonment error; requests
    /// already inside the engine run to completion.
    pub fn detach(self) {
        info!("Detaching bridge from channel {}", self.config.channel_name);
        self.executor.shutdown();
    }

    fn dispatch<R, W>(&self, responder: Responder, request: Result<R>, work: W)
    where
        R: Send + 'static,
        W: FnOnce(&Dispatcher, R) -> Result<Value> + Send + 'static,
    {
        let request = match request {
            Ok(request) => request,
            Err(e) => {
                debug!("Rejected {} call: {}", responder.operation(), e.message);
                responder.fail(e);
                return;
            }
        };

        let dispatcher = self.dispatcher.clone();
        self.executor.submit(move || {
            let outcome = work(&dispatcher, request);
            responder.complete(outcome);
        });
    }
}

#[instrument(
    skip_all,
    fields(zkey = %request.zkey_path.display(), witness_len = request.witness.len())
)]
fn run_prove(dispatcher: &Dispatcher, request: ProveRequest) -> Result<Value> {
    let start = Instant::now();
    let error_capacity = request.error_buffer_capacity;
    let fail = |e| translate(Operation::Prove, e, error_capacity);

    let buffers = negotiate_prove_buffers(dispatcher, &request).map_err(fail)?;
    let result = dispatcher
        .prove(&request.zkey_path, &request.witness, buffers)
        .map_err(fail)?;

    if result.proof.is_empty() || result.public_signals.is_empty() {
        return Err(BridgeError::unknown(
            Operation::Prove,
            "native prover returned an empty artifact",
        ));
    }

    info!("Proof generated in {:?}", start.elapsed());
    Ok(result.into_value())
}

#[instrument(skip_all, fields(zkey = %request.zkey_path.display()))]
fn run_public_size(dispatcher: &Dispatcher, request: PublicSizeRequest) -> Result<Value> {
    let size = dispatcher
        .public_buffer_size(&request.zkey_path, request.error_buffer_capacity)
        .map_err(|e| translate(Operation::PublicSize, e, request.error_buffer_capacity))?;

    debug!("Public buffer size: {} bytes", size);
    i64::try_from(size).map(Value::Int).map_err(|_| {
        BridgeError::unknown(
            Operation::PublicSize,
            format!("public buffer size {size} does not fit the reply"),
        )
    })
}

#[instrument(skip_all)]
fn run_verify(
    dispatcher: &Dispatcher,
    request: VerifyRequest,
    default_error: usize,
) -> Result<Value> {
    let start = Instant::now();
    let error_capacity = request.error_buffer_capacity.unwrap_or(default_error);

    let valid = dispatcher
        .verify(
            &request.proof,
            &request.public_inputs,
            &request.verification_key,
            error_capacity,
        )
        .map_err(|e| translate(Operation::Verify, e, error_capacity))?;

    info!("Proof verification result: {} in {:?}", valid, start.elapsed());
    Ok(Value::Bool(valid))
}
