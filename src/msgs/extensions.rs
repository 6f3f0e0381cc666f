//! Hello extension sub-structures.
//!
//! The key-share payload is the wire format's one genuinely
//! context-dependent spot: a client-sent list is length-prefixed, a
//! server-sent share is sized by the remaining enclosing extension. The
//! parser family threads the sender role through for exactly this case.

use serde::{Deserialize, Serialize};

use crate::field::Overridable;
use crate::msgs::enums::{ExtensionType, NamedGroup};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Extension {
    pub extension_type: Overridable<ExtensionType>,
    pub length: Overridable<u16>,
    pub payload: ExtensionPayload,
}

impl Extension {
    pub fn opaque(extension_type: ExtensionType, data: Vec<u8>) -> Self {
        Self {
            extension_type: Overridable::computed(extension_type),
            length: Overridable::unset(),
            payload: ExtensionPayload::Opaque(Overridable::computed(data)),
        }
    }

    pub fn key_share(entries: Vec<KeyShareEntry>) -> Self {
        Self {
            extension_type: Overridable::computed(ExtensionType::KEY_SHARE),
            length: Overridable::unset(),
            payload: ExtensionPayload::KeyShare(KeyShareList {
                list_length: Overridable::unset(),
                entries,
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExtensionPayload {
    KeyShare(KeyShareList),
    Opaque(Overridable<Vec<u8>>),
}

/// Client-sent lists carry their own two-byte length; server-sent shares do
/// not, their extent is the enclosing extension. `list_length` is resolved
/// only on the client side and stays unset on the server side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyShareList {
    pub list_length: Overridable<u16>,
    pub entries: Vec<KeyShareEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyShareEntry {
    pub group: Overridable<NamedGroup>,
    pub key_length: Overridable<u16>,
    pub key: Overridable<Vec<u8>>,
}

impl KeyShareEntry {
    pub fn new(group: NamedGroup, key: Vec<u8>) -> Self {
        Self {
            group: Overridable::computed(group),
            key_length: Overridable::unset(),
            key: Overridable::computed(key),
        }
    }
}
