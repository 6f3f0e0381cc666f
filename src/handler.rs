//! Handler registry: one quadruple of parse, prepare, serialize and adjust
//! functions per [`MessageKind`], plus optional post-stage hooks.
//!
//! Message behavior lives in this table, not in a type hierarchy. Adding a
//! message kind means adding a variant and registering its quadruple; the
//! send and receive pipelines below never change.
//!
//! The stage order is fixed. Sending runs the before-send hook, prepare,
//! serialize, adjust, then the after-send hook over the produced bytes.
//! Receiving runs the before-receive hook, parse, adjust, then the
//! after-receive hook over the consumed bytes.

use std::collections::HashMap;

use log::debug;
use once_cell::sync::Lazy;

use crate::error::Error;
use crate::msgs::enums::ContentType;
use crate::msgs::message::{Message, MessageKind};
use crate::parse::{parse_message, peek_kind};
use crate::prepare::prepare_message;
use crate::serialize::serialize_message;
use crate::state::ConnectionState;

pub type ParseFn = fn(&[u8], usize) -> Result<(Message, usize), Error>;
pub type PrepareFn = fn(&mut Message, &ConnectionState) -> Result<(), Error>;
pub type SerializeFn = fn(&Message) -> Result<Vec<u8>, Error>;
pub type AdjustFn = fn(&Message, &mut ConnectionState);
/// Pre-stage hook, runs before prepare (sending) or parse (receiving).
pub type BeforeFn = fn(&mut ConnectionState);
/// Post-stage hook over the wire bytes produced or consumed.
pub type HookFn = fn(&[u8], &mut ConnectionState);

pub struct Handler {
    pub parse: ParseFn,
    pub prepare: PrepareFn,
    pub serialize: SerializeFn,
    pub adjust: AdjustFn,
    pub before_send: Option<BeforeFn>,
    pub after_send: Option<HookFn>,
    pub before_receive: Option<BeforeFn>,
    pub after_receive: Option<HookFn>,
}

static REGISTRY: Lazy<HashMap<MessageKind, Handler>> = Lazy::new(|| {
    let mut table = HashMap::new();

    for kind in [
        MessageKind::ClientHello,
        MessageKind::ServerHello,
        MessageKind::Certificate,
        MessageKind::ServerHelloDone,
        MessageKind::ClientKeyExchange,
        MessageKind::Finished,
        MessageKind::OpaqueHandshake,
    ] {
        table.insert(
            kind,
            Handler {
                parse: parse_handshake_record,
                prepare: prepare_message,
                serialize: serialize_message,
                adjust: adjust_handshake,
                before_send: None,
                after_send: Some(update_transcript),
                before_receive: None,
                after_receive: Some(update_transcript),
            },
        );
    }

    table.insert(
        MessageKind::Alert,
        Handler {
            parse: parse_alert_record,
            prepare: prepare_message,
            serialize: serialize_message,
            adjust: adjust_nothing,
            before_send: None,
            after_send: None,
            before_receive: None,
            after_receive: None,
        },
    );
    table.insert(
        MessageKind::ChangeCipherSpec,
        Handler {
            parse: parse_ccs_record,
            prepare: prepare_message,
            serialize: serialize_message,
            adjust: adjust_nothing,
            before_send: None,
            after_send: None,
            before_receive: None,
            after_receive: None,
        },
    );
    table.insert(
        MessageKind::ApplicationData,
        Handler {
            parse: parse_application_data_record,
            prepare: prepare_message,
            serialize: serialize_message,
            adjust: adjust_nothing,
            before_send: None,
            after_send: None,
            before_receive: None,
            after_receive: None,
        },
    );

    table
});

pub fn handler_for(kind: MessageKind) -> Result<&'static Handler, Error> {
    REGISTRY
        .get(&kind)
        .ok_or_else(|| Error::Configuration(format!("no handler registered for {}", kind)))
}

/// Send pipeline: prepare, serialize, adjust, after-send hook.
pub fn send_message(message: &mut Message, state: &mut ConnectionState) -> Result<Vec<u8>, Error> {
    let handler = handler_for(message.kind())?;
    if let Some(hook) = handler.before_send {
        hook(state);
    }
    (handler.prepare)(message, state)?;
    let bytes = (handler.serialize)(message)?;
    (handler.adjust)(message, state);
    if let Some(hook) = handler.after_send {
        hook(&bytes, state);
    }
    debug!(
        "{}: prepared {} ({} bytes)",
        state.alias(),
        message.kind(),
        bytes.len()
    );
    Ok(bytes)
}

/// Receive pipeline: parse, adjust, after-receive hook over the consumed
/// bytes. Returns the message and the offset after it.
pub fn receive_message(
    content_type: ContentType,
    buf: &[u8],
    offset: usize,
    state: &mut ConnectionState,
) -> Result<(Message, usize), Error> {
    let kind = peek_kind(content_type, buf, offset);
    let handler = handler_for(kind)?;
    if let Some(hook) = handler.before_receive {
        hook(state);
    }
    let (message, end) = (handler.parse)(buf, offset)?;
    (handler.adjust)(&message, state);
    if let Some(hook) = handler.after_receive {
        hook(&buf[offset..end], state);
    }
    debug!(
        "{}: parsed {} ({} bytes)",
        state.alias(),
        message.kind(),
        end - offset
    );
    Ok((message, end))
}

fn parse_handshake_record(buf: &[u8], offset: usize) -> Result<(Message, usize), Error> {
    parse_message(ContentType::Handshake, buf, offset)
}

fn parse_alert_record(buf: &[u8], offset: usize) -> Result<(Message, usize), Error> {
    parse_message(ContentType::Alert, buf, offset)
}

fn parse_ccs_record(buf: &[u8], offset: usize) -> Result<(Message, usize), Error> {
    parse_message(ContentType::ChangeCipherSpec, buf, offset)
}

fn parse_application_data_record(buf: &[u8], offset: usize) -> Result<(Message, usize), Error> {
    parse_message(ContentType::ApplicationData, buf, offset)
}

/// Pulls negotiated parameters out of hello messages. Runs on both sent and
/// received messages, so a connection tracks the values it actually put on
/// the wire, pinned or not.
fn adjust_handshake(message: &Message, state: &mut ConnectionState) {
    use crate::msgs::handshake::HandshakeBody;

    let hs = match message {
        Message::Handshake(hs) => hs,
        _ => return,
    };
    match &hs.body {
        HandshakeBody::ClientHello(ch) => {
            if let Some(random) = ch.random.get() {
                state.client_random = random.clone();
            }
        }
        HandshakeBody::ServerHello(sh) => {
            if let Some(random) = sh.random.get() {
                state.server_random = random.clone();
            }
            if let Some(version) = sh.server_version.get() {
                state.negotiated_version = *version;
            }
            if let Some(suite) = sh.cipher_suite.get() {
                state.selected_suite = Some(*suite);
            }
            if let Some(compression) = sh.compression.get() {
                state.selected_compression = *compression;
            }
            if let Some(session_id) = sh.session_id.get() {
                state.session_id = session_id.clone();
            }
        }
        _ => {}
    }
}

fn adjust_nothing(_message: &Message, _state: &mut ConnectionState) {}

fn update_transcript(bytes: &[u8], state: &mut ConnectionState) {
    state.transcript.update(bytes);
}
