//! A scriptable TLS protocol execution engine.
//!
//! Protocol conversations are declared as [workflow traces](trace): named
//! connections plus an ordered list of send and receive actions. Every wire
//! field of every message is an [`Overridable`](field::Overridable) holding
//! both the value the engine derives and an optional author-supplied pin,
//! so a trace can place one byte-exact deviation on the wire while the rest
//! of the conversation stays protocol-valid. What the peer does in response
//! is recorded, never judged: unexpected, malformed or unprotected input is
//! an observation for the test author, not an error.
//!
//! Message behavior lives in a [registry](handler) of parse, prepare,
//! serialize and adjust functions keyed by message kind. The [record
//! layer](record) underneath handles fragmentation and the TLS 1.2 CBC
//! cipher suites; [channels](stream) move bytes in memory or over TCP.

pub mod cipher;
pub mod codec;
pub mod error;
pub mod field;
pub mod handler;
pub mod log;
pub mod msgs;
pub mod parse;
pub mod prepare;
pub mod record;
pub mod serialize;
pub mod state;
pub mod stream;
pub mod trace;

#[cfg(test)]
mod tests;

pub use crate::error::Error;
pub use crate::field::Overridable;
pub use crate::msgs::message::{Message, MessageKind};
pub use crate::state::{ConnectionAlias, ConnectionConfig, ConnectionState, Role};
pub use crate::trace::{Action, ActionStatus, Deviation, TraceReport, Verdict, WorkflowTrace};
