//! Completion delivery
//!
//! Every request is answered exactly once. A [`Responder`] owns the host's
//! reply callback; consuming it sends the reply, dropping it unanswered
//! sends an "abandoned" error. The [`CompletionContext`] decides which thread
//! runs the callback.

use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::BridgeError;
use crate::router::MethodResponse;
use crate::types::Operation;
use crate::value::Value;

/// Deferred callback invocation
pub type Completion = Box<dyn FnOnce() + Send + 'static>;

/// Host reply callback
pub type Reply = Box<dyn FnOnce(MethodResponse) + Send + 'static>;

/// Where reply callbacks are executed
pub trait CompletionContext: Send + Sync {
    /// Run `completion` on the context the host expects replies on
    fn deliver(&self, completion: Completion);
}

/// Runs callbacks directly on the completing worker.
///
/// For transports whose reply handles are thread-safe.
#[derive(Debug, Default, Clone, Copy)]
pub struct Inline;

impl CompletionContext for Inline {
    fn deliver(&self, completion: Completion) {
        completion();
    }
}

/// Marshals callbacks back to a single host thread
#[derive(Debug, Clone)]
pub struct HostQueue {
    tx: Sender<Completion>,
}

/// Host side of a [`HostQueue`], drained by the host's event loop
#[derive(Debug)]
pub struct HostLoop {
    rx: Receiver<Completion>,
}

/// Create a connected queue/loop pair
pub fn host_queue() -> (Arc<HostQueue>, HostLoop) {
    let (tx, rx) = mpsc::channel();
    (Arc::new(HostQueue { tx }), HostLoop { rx })
}

impl CompletionContext for HostQueue {
    fn deliver(&self, completion: Completion) {
        if self.tx.send(completion).is_err() {
            debug!("Host loop is gone, dropping completion");
        }
    }
}

impl HostLoop {
    /// Run every completion already queued, returning how many ran
    pub fn run_pending(&self) -> usize {
        let mut ran = 0;
        while let Ok(completion) = self.rx.try_recv() {
            completion();
            ran += 1;
        }
        ran
    }

    /// Wait up to `timeout` for one completion and run it
    pub fn run_next(&self, timeout: Duration) -> bool {
        match self.rx.recv_timeout(timeout) {
            Ok(completion) => {
                completion();
                true
            }
            Err(_) => false,
        }
    }
}

/// Exactly-once reply handle for a dispatched request
pub struct Responder {
    operation: Operation,
    reply: Option<Reply>,
    context: Arc<dyn CompletionContext>,
}

impl Responder {
    /// Wrap the host callback for `operation`
    pub fn new(operation: Operation, reply: Reply, context: Arc<dyn CompletionContext>) -> Self {
        Self {
            operation,
            reply: Some(reply),
            context,
        }
    }

    /// Operation this responder answers
    pub fn operation(&self) -> Operation {
        self.operation
    }

    /// Send the outcome of the request
    pub fn complete(mut self, outcome: Result<Value, BridgeError>) {
        let response = match outcome {
            Ok(value) => MethodResponse::Success(value),
            Err(e) => MethodResponse::Error(e.into_reply()),
        };
        self.send(response);
    }

    /// Send an error
    pub fn fail(self, error: BridgeError) {
        self.complete(Err(error));
    }

    fn send(&mut self, response: MethodResponse) {
        if let Some(reply) = self.reply.take() {
            self.context.deliver(Box::new(move || reply(response)));
        }
    }
}

impl Drop for Responder {
    fn drop(&mut self) {
        if self.reply.is_some() {
            warn!("{} request abandoned before completion", self.operation);
            let error = BridgeError::unknown(self.operation, "request abandoned before completion");
            self.send(MethodResponse::Error(error.into_reply()));
        }
    }
}
