//! Wire enums. Every enum keeps an `Unknown` catch-all: this engine never
//! rejects a value for being semantically unassigned, that judgment belongs
//! to the implementation under test.

#![allow(non_camel_case_types)]

use serde::{Deserialize, Serialize};

use crate::codec::{Codec, Reader};

macro_rules! u8_enum {
    ($name:ident { $($variant:ident => $value:expr),* $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $($variant,)*
            Unknown(u8),
        }

        impl $name {
            pub fn get_u8(&self) -> u8 {
                match self {
                    $(Self::$variant => $value,)*
                    Self::Unknown(v) => *v,
                }
            }
        }

        impl From<u8> for $name {
            fn from(value: u8) -> Self {
                match value {
                    $($value => Self::$variant,)*
                    v => Self::Unknown(v),
                }
            }
        }

        impl Codec for $name {
            fn encode(&self, bytes: &mut Vec<u8>) {
                self.get_u8().encode(bytes);
            }

            fn read(r: &mut Reader) -> Option<Self> {
                u8::read(r).map(Self::from)
            }
        }
    };
}

macro_rules! u16_enum {
    ($name:ident { $($variant:ident => $value:expr),* $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $($variant,)*
            Unknown(u16),
        }

        impl $name {
            pub fn get_u16(&self) -> u16 {
                match self {
                    $(Self::$variant => $value,)*
                    Self::Unknown(v) => *v,
                }
            }
        }

        impl From<u16> for $name {
            fn from(value: u16) -> Self {
                match value {
                    $($value => Self::$variant,)*
                    v => Self::Unknown(v),
                }
            }
        }

        impl Codec for $name {
            fn encode(&self, bytes: &mut Vec<u8>) {
                self.get_u16().encode(bytes);
            }

            fn read(r: &mut Reader) -> Option<Self> {
                u16::read(r).map(Self::from)
            }
        }
    };
}

u8_enum!(ContentType {
    ChangeCipherSpec => 0x14,
    Alert => 0x15,
    Handshake => 0x16,
    ApplicationData => 0x17,
    Heartbeat => 0x18,
});

u16_enum!(ProtocolVersion {
    SSLv3 => 0x0300,
    TLSv1_0 => 0x0301,
    TLSv1_1 => 0x0302,
    TLSv1_2 => 0x0303,
    TLSv1_3 => 0x0304,
});

u8_enum!(HandshakeType {
    HelloRequest => 0x00,
    ClientHello => 0x01,
    ServerHello => 0x02,
    NewSessionTicket => 0x04,
    Certificate => 0x0b,
    ServerKeyExchange => 0x0c,
    CertificateRequest => 0x0d,
    ServerHelloDone => 0x0e,
    CertificateVerify => 0x0f,
    ClientKeyExchange => 0x10,
    Finished => 0x14,
});

u8_enum!(Compression {
    Null => 0x00,
    Deflate => 0x01,
});

u8_enum!(AlertLevel {
    Warning => 0x01,
    Fatal => 0x02,
});

u8_enum!(AlertDescription {
    CloseNotify => 0x00,
    UnexpectedMessage => 0x0a,
    BadRecordMac => 0x14,
    DecryptionFailed => 0x15,
    RecordOverflow => 0x16,
    DecompressionFailure => 0x1e,
    HandshakeFailure => 0x28,
    BadCertificate => 0x2a,
    IllegalParameter => 0x2f,
    DecodeError => 0x32,
    DecryptError => 0x33,
    ProtocolVersion => 0x46,
    InternalError => 0x50,
});

/// Cipher suite identifiers are an open 16-bit space; a newtype with named
/// constants keeps arbitrary (including unassigned) values representable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CipherSuite(pub u16);

impl CipherSuite {
    pub const TLS_NULL_WITH_NULL_NULL: CipherSuite = CipherSuite(0x0000);
    pub const TLS_RSA_WITH_AES_128_CBC_SHA256: CipherSuite = CipherSuite(0x003c);
    pub const TLS_RSA_WITH_AES_256_CBC_SHA256: CipherSuite = CipherSuite(0x003d);
    pub const TLS_ECDHE_RSA_WITH_AES_128_CBC_SHA256: CipherSuite = CipherSuite(0xc027);
}

impl Codec for CipherSuite {
    fn encode(&self, bytes: &mut Vec<u8>) {
        self.0.encode(bytes);
    }

    fn read(r: &mut Reader) -> Option<Self> {
        u16::read(r).map(CipherSuite)
    }
}

/// Extension type identifiers, also an open space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExtensionType(pub u16);

impl ExtensionType {
    pub const SERVER_NAME: ExtensionType = ExtensionType(0x0000);
    pub const SUPPORTED_GROUPS: ExtensionType = ExtensionType(0x000a);
    pub const SIGNATURE_ALGORITHMS: ExtensionType = ExtensionType(0x000d);
    pub const SUPPORTED_VERSIONS: ExtensionType = ExtensionType(0x002b);
    pub const KEY_SHARE: ExtensionType = ExtensionType(0x0033);
}

impl Codec for ExtensionType {
    fn encode(&self, bytes: &mut Vec<u8>) {
        self.0.encode(bytes);
    }

    fn read(r: &mut Reader) -> Option<Self> {
        u16::read(r).map(ExtensionType)
    }
}

/// Named groups for key shares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NamedGroup(pub u16);

impl NamedGroup {
    pub const SECP256R1: NamedGroup = NamedGroup(0x0017);
    pub const X25519: NamedGroup = NamedGroup(0x001d);
}

impl Codec for NamedGroup {
    fn encode(&self, bytes: &mut Vec<u8>) {
        self.0.encode(bytes);
    }

    fn read(r: &mut Reader) -> Option<Self> {
        u16::read(r).map(NamedGroup)
    }
}
