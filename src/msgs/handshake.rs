//! Handshake message bodies. Every wire datum is an [`Overridable`] field;
//! length and count fields are separate fields so they can be pinned
//! independently of the data they describe.

use serde::{Deserialize, Serialize};

use crate::field::Overridable;
use crate::msgs::enums::{CipherSuite, Compression, HandshakeType, ProtocolVersion};
use crate::msgs::extensions::Extension;

pub const RANDOM_LEN: usize = 32;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandshakeMessage {
    pub msg_type: Overridable<HandshakeType>,
    /// Three-byte body length on the wire.
    pub length: Overridable<u32>,
    pub body: HandshakeBody,
}

impl HandshakeMessage {
    pub fn new(body: HandshakeBody) -> Self {
        Self {
            msg_type: Overridable::unset(),
            length: Overridable::unset(),
            body,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum HandshakeBody {
    ClientHello(ClientHello),
    ServerHello(ServerHello),
    Certificate(CertificateChain),
    ServerHelloDone,
    ClientKeyExchange(ClientKeyExchange),
    Finished(Finished),
    /// Handshake types this engine has no structured model for. The body is
    /// carried verbatim, bounded by the declared message length.
    Opaque(Overridable<Vec<u8>>),
}

impl HandshakeBody {
    pub fn natural_type(&self) -> Option<HandshakeType> {
        match self {
            Self::ClientHello(_) => Some(HandshakeType::ClientHello),
            Self::ServerHello(_) => Some(HandshakeType::ServerHello),
            Self::Certificate(_) => Some(HandshakeType::Certificate),
            Self::ServerHelloDone => Some(HandshakeType::ServerHelloDone),
            Self::ClientKeyExchange(_) => Some(HandshakeType::ClientKeyExchange),
            Self::Finished(_) => Some(HandshakeType::Finished),
            Self::Opaque(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ClientHello {
    pub client_version: Overridable<ProtocolVersion>,
    pub random: Overridable<Vec<u8>>,
    pub session_id_length: Overridable<u8>,
    pub session_id: Overridable<Vec<u8>>,
    pub cipher_suites_length: Overridable<u16>,
    pub cipher_suites: Overridable<Vec<CipherSuite>>,
    pub compressions_length: Overridable<u8>,
    pub compressions: Overridable<Vec<Compression>>,
    pub extensions_length: Overridable<u16>,
    pub extensions: Vec<Extension>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ServerHello {
    pub server_version: Overridable<ProtocolVersion>,
    pub random: Overridable<Vec<u8>>,
    pub session_id_length: Overridable<u8>,
    pub session_id: Overridable<Vec<u8>>,
    pub cipher_suite: Overridable<CipherSuite>,
    pub compression: Overridable<Compression>,
    pub extensions_length: Overridable<u16>,
    pub extensions: Vec<Extension>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CertificateChain {
    /// Three-byte total length of all entries on the wire.
    pub chain_length: Overridable<u32>,
    pub entries: Vec<CertificateEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CertificateEntry {
    /// Three-byte length of this certificate on the wire.
    pub length: Overridable<u32>,
    pub data: Overridable<Vec<u8>>,
}

impl CertificateEntry {
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            length: Overridable::unset(),
            data: Overridable::computed(data),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ClientKeyExchange {
    /// The exchange keys are deliberately opaque: their interpretation
    /// depends on the key exchange algorithm of the negotiated suite, and
    /// this engine emits whatever it is given.
    pub exchange_keys: Overridable<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Finished {
    pub verify_data: Overridable<Vec<u8>>,
}
