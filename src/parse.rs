//! Parser family: bytes to [`Message`], offset in, offset out.
//!
//! Parsers are pure functions of the buffer and position, except where the
//! wire format itself is context-dependent (the key-share list layout
//! depends on the sender's role). They accept any structurally well-formed
//! content no matter how semantically invalid; the only failure is a
//! declared length that would read past the buffer.
//!
//! Child parsers run inside [`Reader::sub`] windows carved out by their
//! parent's length fields, so a handshake message whose declared length is
//! shorter than its real body consumes exactly the declared bytes and
//! leaves the remainder for the next parse.

use log::trace;

use crate::codec::{Codec, Reader};
use crate::error::Error;
use crate::field::Overridable;
use crate::msgs::ccs::ChangeCipherSpec;
use crate::msgs::enums::{
    AlertDescription, AlertLevel, CipherSuite, Compression, ContentType, ExtensionType,
    HandshakeType, NamedGroup, ProtocolVersion,
};
use crate::msgs::extensions::{Extension, ExtensionPayload, KeyShareEntry, KeyShareList};
use crate::msgs::handshake::{
    CertificateChain, CertificateEntry, ClientHello, ClientKeyExchange, Finished, HandshakeBody,
    HandshakeMessage, ServerHello, RANDOM_LEN,
};
use crate::msgs::message::Message;
use crate::msgs::{alert::AlertMessage, message::MessageKind};
use crate::state::Role;

fn want<T>(value: Option<T>, what: &str) -> Result<T, Error> {
    value.ok_or_else(|| Error::MalformedInput(what.to_string()))
}

/// Parses one message of the given record content type from `buf` starting
/// at `offset`. Role-dependent wire layouts are handled by the child
/// parsers, which learn the sender's role from the enclosing message.
pub fn parse_message(
    content_type: ContentType,
    buf: &[u8],
    offset: usize,
) -> Result<(Message, usize), Error> {
    trace!(
        "parsing {:?} message at offset {} of {} bytes",
        content_type,
        offset,
        buf.len()
    );
    let remaining = buf.get(offset..).ok_or_else(|| {
        Error::MalformedInput(format!("offset {} past end of {}-byte buffer", offset, buf.len()))
    })?;
    let mut r = Reader::init(remaining);

    let message = match content_type {
        ContentType::Handshake => parse_handshake(&mut r)?,
        ContentType::Alert => parse_alert(&mut r)?,
        ContentType::ChangeCipherSpec => parse_ccs(&mut r)?,
        _ => Message::ApplicationData(Overridable::computed(r.rest().to_vec())),
    };

    Ok((message, offset + r.used()))
}

fn parse_handshake(r: &mut Reader) -> Result<Message, Error> {
    let msg_type = want(HandshakeType::read(r), "handshake.msg_type")?;
    let length = want(crate::codec::u24::read(r), "handshake.length")?.0;
    let mut body_r = want(
        r.sub(length as usize),
        &format!("handshake body of {} declared bytes", length),
    )?;

    let body = match msg_type {
        HandshakeType::ClientHello => {
            HandshakeBody::ClientHello(parse_client_hello(&mut body_r)?)
        }
        HandshakeType::ServerHello => {
            HandshakeBody::ServerHello(parse_server_hello(&mut body_r)?)
        }
        HandshakeType::Certificate => {
            HandshakeBody::Certificate(parse_certificate(&mut body_r)?)
        }
        HandshakeType::ServerHelloDone => HandshakeBody::ServerHelloDone,
        HandshakeType::ClientKeyExchange => {
            HandshakeBody::ClientKeyExchange(ClientKeyExchange {
                exchange_keys: Overridable::computed(body_r.rest().to_vec()),
            })
        }
        HandshakeType::Finished => HandshakeBody::Finished(Finished {
            verify_data: Overridable::computed(body_r.rest().to_vec()),
        }),
        _ => HandshakeBody::Opaque(Overridable::computed(body_r.rest().to_vec())),
    };

    Ok(Message::Handshake(HandshakeMessage {
        msg_type: Overridable::computed(msg_type),
        length: Overridable::computed(length),
        body,
    }))
}

fn parse_client_hello(r: &mut Reader) -> Result<ClientHello, Error> {
    let client_version = want(ProtocolVersion::read(r), "client_hello.version")?;
    let random = want(r.take(RANDOM_LEN), "client_hello.random")?.to_vec();

    let session_id_length = want(u8::read(r), "client_hello.session_id_length")?;
    let session_id = want(
        r.take(session_id_length as usize),
        "client_hello.session_id",
    )?
    .to_vec();

    let cipher_suites_length = want(u16::read(r), "client_hello.cipher_suites_length")?;
    let mut suites_r = want(
        r.sub(cipher_suites_length as usize),
        "client_hello.cipher_suites",
    )?;
    let mut cipher_suites = Vec::new();
    while suites_r.any_left() {
        cipher_suites.push(want(CipherSuite::read(&mut suites_r), "cipher_suite")?);
    }

    let compressions_length = want(u8::read(r), "client_hello.compressions_length")?;
    let mut comp_r = want(
        r.sub(compressions_length as usize),
        "client_hello.compressions",
    )?;
    let mut compressions = Vec::new();
    while comp_r.any_left() {
        compressions.push(want(Compression::read(&mut comp_r), "compression")?);
    }

    let (extensions_length, extensions) = parse_extension_block(r, Role::Client)?;

    Ok(ClientHello {
        client_version: Overridable::computed(client_version),
        random: Overridable::computed(random),
        session_id_length: Overridable::computed(session_id_length),
        session_id: Overridable::computed(session_id),
        cipher_suites_length: Overridable::computed(cipher_suites_length),
        cipher_suites: Overridable::computed(cipher_suites),
        compressions_length: Overridable::computed(compressions_length),
        compressions: Overridable::computed(compressions),
        extensions_length,
        extensions,
    })
}

fn parse_server_hello(r: &mut Reader) -> Result<ServerHello, Error> {
    let server_version = want(ProtocolVersion::read(r), "server_hello.version")?;
    let random = want(r.take(RANDOM_LEN), "server_hello.random")?.to_vec();

    let session_id_length = want(u8::read(r), "server_hello.session_id_length")?;
    let session_id = want(
        r.take(session_id_length as usize),
        "server_hello.session_id",
    )?
    .to_vec();

    let cipher_suite = want(CipherSuite::read(r), "server_hello.cipher_suite")?;
    let compression = want(Compression::read(r), "server_hello.compression")?;

    let (extensions_length, extensions) = parse_extension_block(r, Role::Server)?;

    Ok(ServerHello {
        server_version: Overridable::computed(server_version),
        random: Overridable::computed(random),
        session_id_length: Overridable::computed(session_id_length),
        session_id: Overridable::computed(session_id),
        cipher_suite: Overridable::computed(cipher_suite),
        compression: Overridable::computed(compression),
        extensions_length,
        extensions,
    })
}

/// The extension block is optional on the wire: a hello may simply end
/// after the compression methods.
fn parse_extension_block(
    r: &mut Reader,
    sender: Role,
) -> Result<(Overridable<u16>, Vec<Extension>), Error> {
    if !r.any_left() {
        return Ok((Overridable::unset(), vec![]));
    }

    let extensions_length = want(u16::read(r), "hello.extensions_length")?;
    let mut ext_r = want(r.sub(extensions_length as usize), "hello.extensions")?;

    let mut extensions = Vec::new();
    while ext_r.any_left() {
        extensions.push(parse_extension(&mut ext_r, sender)?);
    }

    Ok((Overridable::computed(extensions_length), extensions))
}

fn parse_extension(r: &mut Reader, sender: Role) -> Result<Extension, Error> {
    let extension_type = want(ExtensionType::read(r), "extension.type")?;
    let length = want(u16::read(r), "extension.length")?;
    let mut data_r = want(r.sub(length as usize), "extension.data")?;

    let payload = if extension_type == ExtensionType::KEY_SHARE {
        ExtensionPayload::KeyShare(parse_key_share_list(&mut data_r, sender)?)
    } else {
        ExtensionPayload::Opaque(Overridable::computed(data_r.rest().to_vec()))
    };

    Ok(Extension {
        extension_type: Overridable::computed(extension_type),
        length: Overridable::computed(length),
        payload,
    })
}

/// Client-sent key-share lists carry their own two-byte length; a
/// server-sent share is sized by the remaining enclosing extension.
fn parse_key_share_list(r: &mut Reader, sender: Role) -> Result<KeyShareList, Error> {
    let (list_length, mut list_r) = match sender {
        Role::Client => {
            let len = want(u16::read(r), "key_share.list_length")?;
            let sub = want(r.sub(len as usize), "key_share.entries")?;
            (Overridable::computed(len), sub)
        }
        Role::Server => (Overridable::unset(), Reader::init(r.rest())),
    };

    let mut entries = Vec::new();
    while list_r.any_left() {
        entries.push(parse_key_share_entry(&mut list_r)?);
    }

    Ok(KeyShareList {
        list_length,
        entries,
    })
}

fn parse_key_share_entry(r: &mut Reader) -> Result<KeyShareEntry, Error> {
    let group = want(NamedGroup::read(r), "key_share.group")?;
    let key_length = want(u16::read(r), "key_share.key_length")?;
    let key = want(r.take(key_length as usize), "key_share.key")?.to_vec();

    Ok(KeyShareEntry {
        group: Overridable::computed(group),
        key_length: Overridable::computed(key_length),
        key: Overridable::computed(key),
    })
}

fn parse_certificate(r: &mut Reader) -> Result<CertificateChain, Error> {
    let chain_length = want(crate::codec::u24::read(r), "certificate.chain_length")?.0;
    let mut chain_r = want(r.sub(chain_length as usize), "certificate.entries")?;

    let mut entries = Vec::new();
    while chain_r.any_left() {
        let length = want(crate::codec::u24::read(&mut chain_r), "certificate.length")?.0;
        let data = want(chain_r.take(length as usize), "certificate.data")?.to_vec();
        entries.push(CertificateEntry {
            length: Overridable::computed(length),
            data: Overridable::computed(data),
        });
    }

    Ok(CertificateChain {
        chain_length: Overridable::computed(chain_length),
        entries,
    })
}

fn parse_alert(r: &mut Reader) -> Result<Message, Error> {
    let level = want(AlertLevel::read(r), "alert.level")?;
    let description = want(AlertDescription::read(r), "alert.description")?;
    Ok(Message::Alert(AlertMessage {
        level: Overridable::computed(level),
        description: Overridable::computed(description),
    }))
}

fn parse_ccs(r: &mut Reader) -> Result<Message, Error> {
    let value = want(u8::read(r), "change_cipher_spec.value")?;
    Ok(Message::ChangeCipherSpec(ChangeCipherSpec {
        value: Overridable::computed(value),
    }))
}

/// Peeks enough of a buffer to tell which handler should parse it.
pub fn peek_kind(content_type: ContentType, buf: &[u8], offset: usize) -> MessageKind {
    MessageKind::from_wire(content_type, buf.get(offset).copied())
}
