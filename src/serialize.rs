//! Serializer family: resolved fields to wire bytes.
//!
//! Serializers are pure. They emit each resolved field verbatim, so a
//! pinned length or type byte reaches the wire untouched while the
//! described data is still emitted in full. An unresolved field aborts
//! with [`Error::UnresolvedField`] naming the field; nothing is ever
//! silently defaulted here.
//!
//! The body helpers are public because the preparator derives length
//! fields from the serialized size of the (already resolved) structures
//! they describe.

use crate::codec::{u24, Codec};
use crate::error::Error;
use crate::msgs::alert::AlertMessage;
use crate::msgs::ccs::ChangeCipherSpec;
use crate::msgs::extensions::{Extension, ExtensionPayload, KeyShareEntry, KeyShareList};
use crate::msgs::handshake::{
    CertificateChain, ClientHello, ClientKeyExchange, Finished, HandshakeBody, HandshakeMessage,
    ServerHello,
};
use crate::msgs::message::Message;

pub fn serialize_message(message: &Message) -> Result<Vec<u8>, Error> {
    match message {
        Message::Handshake(hs) => serialize_handshake(hs),
        Message::Alert(alert) => serialize_alert(alert),
        Message::ChangeCipherSpec(ccs) => serialize_ccs(ccs),
        Message::ApplicationData(data) => Ok(data.require("application_data.payload")?.clone()),
    }
}

pub fn serialize_handshake(hs: &HandshakeMessage) -> Result<Vec<u8>, Error> {
    let mut bytes = Vec::new();
    hs.msg_type.require("handshake.msg_type")?.encode(&mut bytes);
    // The declared length is emitted as resolved, not recomputed; the body
    // that follows is always emitted in full.
    u24(*hs.length.require("handshake.length")? & 0x00ff_ffff).encode(&mut bytes);
    bytes.extend(serialize_handshake_body(&hs.body)?);
    Ok(bytes)
}

pub fn serialize_handshake_body(body: &HandshakeBody) -> Result<Vec<u8>, Error> {
    match body {
        HandshakeBody::ClientHello(ch) => serialize_client_hello(ch),
        HandshakeBody::ServerHello(sh) => serialize_server_hello(sh),
        HandshakeBody::Certificate(chain) => serialize_certificate(chain),
        HandshakeBody::ServerHelloDone => Ok(vec![]),
        HandshakeBody::ClientKeyExchange(cke) => serialize_client_key_exchange(cke),
        HandshakeBody::Finished(fin) => serialize_finished(fin),
        HandshakeBody::Opaque(data) => Ok(data.require("handshake.opaque_body")?.clone()),
    }
}

pub fn serialize_client_hello(ch: &ClientHello) -> Result<Vec<u8>, Error> {
    let mut bytes = Vec::new();
    ch.client_version
        .require("client_hello.client_version")?
        .encode(&mut bytes);
    bytes.extend_from_slice(ch.random.require("client_hello.random")?);

    ch.session_id_length
        .require("client_hello.session_id_length")?
        .encode(&mut bytes);
    bytes.extend_from_slice(ch.session_id.require("client_hello.session_id")?);

    ch.cipher_suites_length
        .require("client_hello.cipher_suites_length")?
        .encode(&mut bytes);
    for suite in ch.cipher_suites.require("client_hello.cipher_suites")? {
        suite.encode(&mut bytes);
    }

    ch.compressions_length
        .require("client_hello.compressions_length")?
        .encode(&mut bytes);
    for compression in ch.compressions.require("client_hello.compressions")? {
        compression.encode(&mut bytes);
    }

    serialize_extension_block(&mut bytes, &ch.extensions_length, &ch.extensions)?;
    Ok(bytes)
}

pub fn serialize_server_hello(sh: &ServerHello) -> Result<Vec<u8>, Error> {
    let mut bytes = Vec::new();
    sh.server_version
        .require("server_hello.server_version")?
        .encode(&mut bytes);
    bytes.extend_from_slice(sh.random.require("server_hello.random")?);

    sh.session_id_length
        .require("server_hello.session_id_length")?
        .encode(&mut bytes);
    bytes.extend_from_slice(sh.session_id.require("server_hello.session_id")?);

    sh.cipher_suite
        .require("server_hello.cipher_suite")?
        .encode(&mut bytes);
    sh.compression
        .require("server_hello.compression")?
        .encode(&mut bytes);

    serialize_extension_block(&mut bytes, &sh.extensions_length, &sh.extensions)?;
    Ok(bytes)
}

/// The extension block is optional on the wire. It is emitted when the hello
/// carries extensions or when the block length itself was resolved (possibly
/// pinned to disagree with an empty list); otherwise it is omitted entirely.
fn serialize_extension_block(
    bytes: &mut Vec<u8>,
    extensions_length: &crate::field::Overridable<u16>,
    extensions: &[Extension],
) -> Result<(), Error> {
    if extensions.is_empty() && !extensions_length.is_resolved() {
        return Ok(());
    }
    extensions_length
        .require("hello.extensions_length")?
        .encode(bytes);
    for ext in extensions {
        bytes.extend(serialize_extension(ext)?);
    }
    Ok(())
}

pub fn serialize_extension(ext: &Extension) -> Result<Vec<u8>, Error> {
    let mut bytes = Vec::new();
    ext.extension_type
        .require("extension.extension_type")?
        .encode(&mut bytes);
    ext.length.require("extension.length")?.encode(&mut bytes);
    bytes.extend(serialize_extension_payload(&ext.payload)?);
    Ok(bytes)
}

pub fn serialize_extension_payload(payload: &ExtensionPayload) -> Result<Vec<u8>, Error> {
    match payload {
        ExtensionPayload::KeyShare(list) => serialize_key_share_list(list),
        ExtensionPayload::Opaque(data) => Ok(data.require("extension.payload")?.clone()),
    }
}

/// A resolved `list_length` marks the client-side layout and is emitted as a
/// two-byte prefix; the server-side layout has no prefix and `list_length`
/// stays unset there by construction.
pub fn serialize_key_share_list(list: &KeyShareList) -> Result<Vec<u8>, Error> {
    let mut bytes = Vec::new();
    if let Some(len) = list.list_length.get() {
        len.encode(&mut bytes);
    }
    for entry in &list.entries {
        bytes.extend(serialize_key_share_entry(entry)?);
    }
    Ok(bytes)
}

pub fn serialize_key_share_entry(entry: &KeyShareEntry) -> Result<Vec<u8>, Error> {
    let mut bytes = Vec::new();
    entry.group.require("key_share.group")?.encode(&mut bytes);
    entry
        .key_length
        .require("key_share.key_length")?
        .encode(&mut bytes);
    bytes.extend_from_slice(entry.key.require("key_share.key")?);
    Ok(bytes)
}

pub fn serialize_certificate(chain: &CertificateChain) -> Result<Vec<u8>, Error> {
    let mut bytes = Vec::new();
    u24(*chain.chain_length.require("certificate.chain_length")? & 0x00ff_ffff)
        .encode(&mut bytes);
    for entry in &chain.entries {
        u24(*entry.length.require("certificate.entry_length")? & 0x00ff_ffff).encode(&mut bytes);
        bytes.extend_from_slice(entry.data.require("certificate.entry_data")?);
    }
    Ok(bytes)
}

pub fn serialize_client_key_exchange(cke: &ClientKeyExchange) -> Result<Vec<u8>, Error> {
    Ok(cke
        .exchange_keys
        .require("client_key_exchange.exchange_keys")?
        .clone())
}

pub fn serialize_finished(fin: &Finished) -> Result<Vec<u8>, Error> {
    Ok(fin.verify_data.require("finished.verify_data")?.clone())
}

pub fn serialize_alert(alert: &AlertMessage) -> Result<Vec<u8>, Error> {
    let mut bytes = Vec::new();
    alert.level.require("alert.level")?.encode(&mut bytes);
    alert
        .description
        .require("alert.description")?
        .encode(&mut bytes);
    Ok(bytes)
}

pub fn serialize_ccs(ccs: &ChangeCipherSpec) -> Result<Vec<u8>, Error> {
    let mut bytes = Vec::new();
    ccs.value.require("change_cipher_spec.value")?.encode(&mut bytes);
    Ok(bytes)
}
