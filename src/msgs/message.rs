//! The typed protocol unit the pipeline operates on, plus its kind tag.
//!
//! [`MessageKind`] is the registry key: one handler quadruple per kind.

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::field::Overridable;
use crate::msgs::alert::AlertMessage;
use crate::msgs::ccs::ChangeCipherSpec;
use crate::msgs::enums::{ContentType, HandshakeType};
use crate::msgs::handshake::{HandshakeBody, HandshakeMessage};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Message {
    Handshake(HandshakeMessage),
    Alert(AlertMessage),
    ChangeCipherSpec(ChangeCipherSpec),
    /// Application data is opaque to the engine.
    ApplicationData(Overridable<Vec<u8>>),
}

impl Message {
    pub fn handshake(body: HandshakeBody) -> Self {
        Self::Handshake(HandshakeMessage::new(body))
    }

    pub fn kind(&self) -> MessageKind {
        match self {
            Self::Handshake(hs) => match &hs.body {
                HandshakeBody::ClientHello(_) => MessageKind::ClientHello,
                HandshakeBody::ServerHello(_) => MessageKind::ServerHello,
                HandshakeBody::Certificate(_) => MessageKind::Certificate,
                HandshakeBody::ServerHelloDone => MessageKind::ServerHelloDone,
                HandshakeBody::ClientKeyExchange(_) => MessageKind::ClientKeyExchange,
                HandshakeBody::Finished(_) => MessageKind::Finished,
                HandshakeBody::Opaque(_) => MessageKind::OpaqueHandshake,
            },
            Self::Alert(_) => MessageKind::Alert,
            Self::ChangeCipherSpec(_) => MessageKind::ChangeCipherSpec,
            Self::ApplicationData(_) => MessageKind::ApplicationData,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageKind {
    ClientHello,
    ServerHello,
    Certificate,
    ServerHelloDone,
    ClientKeyExchange,
    Finished,
    OpaqueHandshake,
    Alert,
    ChangeCipherSpec,
    ApplicationData,
}

impl MessageKind {
    pub const ALL: &'static [MessageKind] = &[
        MessageKind::ClientHello,
        MessageKind::ServerHello,
        MessageKind::Certificate,
        MessageKind::ServerHelloDone,
        MessageKind::ClientKeyExchange,
        MessageKind::Finished,
        MessageKind::OpaqueHandshake,
        MessageKind::Alert,
        MessageKind::ChangeCipherSpec,
        MessageKind::ApplicationData,
    ];

    pub fn content_type(&self) -> ContentType {
        match self {
            Self::Alert => ContentType::Alert,
            Self::ChangeCipherSpec => ContentType::ChangeCipherSpec,
            Self::ApplicationData => ContentType::ApplicationData,
            _ => ContentType::Handshake,
        }
    }

    /// The kind a parser should produce for the given record content type
    /// and, for handshake records, the leading handshake type byte.
    pub fn from_wire(content_type: ContentType, first_byte: Option<u8>) -> MessageKind {
        match content_type {
            ContentType::Alert => MessageKind::Alert,
            ContentType::ChangeCipherSpec => MessageKind::ChangeCipherSpec,
            ContentType::Handshake => match first_byte.map(HandshakeType::from) {
                Some(HandshakeType::ClientHello) => MessageKind::ClientHello,
                Some(HandshakeType::ServerHello) => MessageKind::ServerHello,
                Some(HandshakeType::Certificate) => MessageKind::Certificate,
                Some(HandshakeType::ServerHelloDone) => MessageKind::ServerHelloDone,
                Some(HandshakeType::ClientKeyExchange) => MessageKind::ClientKeyExchange,
                Some(HandshakeType::Finished) => MessageKind::Finished,
                _ => MessageKind::OpaqueHandshake,
            },
            _ => MessageKind::ApplicationData,
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}
