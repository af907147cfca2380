//! The transaction protocol: a message paired with a single-shot reply sink.
//!
//! Every in-flight message is bound to exactly one [`ReplySink`]. The
//! sink consumes itself on send, so a double response is unrepresentable;
//! dropping a sink without responding is an invariant violation that the
//! awaiting side observes as [`Response::NoAck`] and logs.

use datatypes::Message;
use tokio::sync::oneshot;

/// Classification of a transaction error (see the error handling design).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Upstream should redeliver; no permanent loss implied.
    Transient,
    /// A processor failed on this specific message.
    Processing,
    /// An adapter lost its remote.
    Connection,
    /// Invalid configuration, detected at startup.
    Configuration,
    /// Invariant violation.
    Fatal,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Transient => "transient",
            ErrorKind::Processing => "processing",
            ErrorKind::Connection => "connection",
            ErrorKind::Configuration => "configuration",
            ErrorKind::Fatal => "fatal",
        }
    }
}

/// The single response written to a transaction's reply sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// The message was handled; the input may advance its source.
    Ack,
    /// Transient failure; the upstream should retry or redeliver.
    NoAck,
    /// Typed failure with detail.
    Error(ErrorKind, String),
}

impl Response {
    pub fn is_ack(&self) -> bool {
        matches!(self, Response::Ack)
    }

    /// Fold another response into this one. `Ack` is the identity and
    /// any non-Ack absorbs, which makes aggregation a monoid.
    pub fn combine(self, other: Response) -> Response {
        match self {
            Response::Ack => other,
            non_ack => non_ack,
        }
    }
}

/// Consuming single-shot reply channel.
#[derive(Debug)]
pub struct ReplySink {
    tx: oneshot::Sender<Response>,
}

impl ReplySink {
    /// Write the one response this sink will ever carry.
    ///
    /// A closed receiver means the emitter stopped waiting (e.g. a
    /// request timed out); that is the receiver's business, not ours.
    pub fn send(self, response: Response) {
        if self.tx.send(response).is_err() {
            tracing::debug!("transaction response dropped: receiver gone");
        }
    }

    pub fn ack(self) {
        self.send(Response::Ack);
    }

    pub fn nack(self) {
        self.send(Response::NoAck);
    }
}

/// Awaitable side of a reply sink, held by whoever emitted the transaction.
#[derive(Debug)]
pub struct ResponseFuture {
    rx: oneshot::Receiver<Response>,
}

impl ResponseFuture {
    /// Wait for the transaction's response.
    ///
    /// A sink dropped without a response is a liveness bug somewhere
    /// downstream; it is logged and surfaced as `NoAck` so the origin
    /// redelivers rather than losing the message.
    pub async fn wait(self) -> Response {
        let response = match self.rx.await {
            Ok(response) => response,
            Err(_) => {
                tracing::error!("reply sink dropped without a response");
                Response::NoAck
            }
        };
        let outcome = match &response {
            Response::Ack => telemetry::outcome::ACK,
            Response::NoAck => telemetry::outcome::NACK,
            Response::Error(..) => telemetry::outcome::ERROR,
        };
        telemetry::ACK_COUNTER.with_label_values(&[outcome]).inc();
        response
    }
}

/// A message in flight plus the sink its single response must reach.
#[derive(Debug)]
pub struct Transaction {
    pub message: Message,
    reply: ReplySink,
}

impl Transaction {
    /// Bind a message to a fresh reply channel.
    pub fn new(message: Message) -> (Self, ResponseFuture) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                message,
                reply: ReplySink { tx },
            },
            ResponseFuture { rx },
        )
    }

    /// Rebind a sink to a new message, preserving the ack chain. Used
    /// where a stage forwards exactly one message and the upstream
    /// response is the downstream response.
    pub fn from_sink(message: Message, reply: ReplySink) -> Self {
        Self { message, reply }
    }

    pub fn into_parts(self) -> (Message, ReplySink) {
        (self.message, self.reply)
    }

    pub fn respond(self, response: Response) {
        self.reply.send(response);
    }

    pub fn ack(self) {
        self.reply.ack();
    }
}
