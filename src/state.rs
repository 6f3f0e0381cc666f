//! Per-connection negotiated and pending parameters.
//!
//! A [`ConnectionConfig`] is the serializable blueprint a trace declares; a
//! [`ConnectionState`] is the live, mutable state one trace run owns
//! exclusively. Only handlers (and their hooks) mutate it, and it is reset
//! between independent runs.

use core::fmt;
use std::fmt::Debug;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::Error;
use crate::msgs::enums::{CipherSuite, Compression, ProtocolVersion};

pub const MAX_SESSION_ID_LEN: usize = 32;

/// Human-readable name binding trace actions to one connection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionAlias(String);

impl ConnectionAlias {
    pub fn new(alias: impl Into<String>) -> Self {
        Self(alias.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ConnectionAlias {
    fn from(alias: &str) -> Self {
        Self::new(alias)
    }
}

impl fmt::Display for ConnectionAlias {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Client,
    Server,
}

impl Role {
    pub fn peer(&self) -> Role {
        match self {
            Role::Client => Role::Server,
            Role::Server => Role::Client,
        }
    }
}

/// Blueprint for one connection of a trace. Serialized alongside the trace
/// so replays spawn identical connections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    pub alias: ConnectionAlias,
    pub role: Role,
    pub version: ProtocolVersion,
    pub offered_suites: Vec<CipherSuite>,
    pub offered_compressions: Vec<Compression>,
    pub session_id: Vec<u8>,
    /// Per-receive timeout in milliseconds. A peer staying silent within
    /// this window is an observation, not an error.
    pub receive_timeout_ms: u64,
}

impl ConnectionConfig {
    pub fn new(alias: impl Into<ConnectionAlias>, role: Role) -> Self {
        Self {
            alias: alias.into(),
            role,
            version: ProtocolVersion::TLSv1_2,
            offered_suites: vec![CipherSuite::TLS_RSA_WITH_AES_128_CBC_SHA256],
            offered_compressions: vec![Compression::Null],
            session_id: vec![],
            receive_timeout_ms: 500,
        }
    }

    pub fn with_version(mut self, version: ProtocolVersion) -> Self {
        self.version = version;
        self
    }

    pub fn with_suites(mut self, suites: Vec<CipherSuite>) -> Self {
        self.offered_suites = suites;
        self
    }

    pub fn with_session_id(mut self, session_id: Vec<u8>) -> Self {
        self.session_id = session_id;
        self
    }

    fn validate(&self) -> Result<(), Error> {
        if self.offered_suites.is_empty() {
            return Err(Error::Configuration(format!(
                "connection {} offers no cipher suites",
                self.alias
            )));
        }
        if self.offered_compressions.is_empty() {
            return Err(Error::Configuration(format!(
                "connection {} offers no compression methods",
                self.alias
            )));
        }
        if self.session_id.len() > MAX_SESSION_ID_LEN {
            return Err(Error::Configuration(format!(
                "session id of connection {} exceeds {} bytes",
                self.alias, MAX_SESSION_ID_LEN
            )));
        }
        Ok(())
    }
}

/// Running digest over the raw handshake bytes exchanged so far.
#[derive(Clone)]
pub struct Transcript {
    digest: Sha256,
}

impl Transcript {
    pub fn new() -> Self {
        Self { digest: Sha256::new() }
    }

    pub fn update(&mut self, bytes: &[u8]) {
        self.digest.update(bytes);
    }

    /// Digest over everything fed so far; the transcript keeps running.
    pub fn current(&self) -> Vec<u8> {
        self.digest.clone().finalize().to_vec()
    }
}

impl Default for Transcript {
    fn default() -> Self {
        Self::new()
    }
}

impl Debug for Transcript {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Transcript({})", hex::encode(self.current()))
    }
}

/// Mutable state of one connection during a trace run.
#[derive(Debug, Clone)]
pub struct ConnectionState {
    config: ConnectionConfig,
    pub negotiated_version: ProtocolVersion,
    pub selected_suite: Option<CipherSuite>,
    pub selected_compression: Compression,
    pub session_id: Vec<u8>,
    pub client_random: Vec<u8>,
    pub server_random: Vec<u8>,
    /// Pending key material for the record layer; empty until the test
    /// author or a handler establishes it.
    pub master_secret: Vec<u8>,
    pub transcript: Transcript,
}

impl ConnectionState {
    pub fn new(config: ConnectionConfig) -> Result<Self, Error> {
        config.validate()?;
        Ok(Self {
            negotiated_version: config.version,
            selected_suite: None,
            selected_compression: Compression::Null,
            session_id: config.session_id.clone(),
            client_random: vec![],
            server_random: vec![],
            master_secret: vec![],
            transcript: Transcript::new(),
            config,
        })
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    pub fn alias(&self) -> &ConnectionAlias {
        &self.config.alias
    }

    pub fn role(&self) -> Role {
        self.config.role
    }

    /// Reverts to the freshly constructed state so the same blueprint can
    /// back an independent run.
    pub fn reset(&mut self) {
        self.negotiated_version = self.config.version;
        self.selected_suite = None;
        self.selected_compression = Compression::Null;
        self.session_id = self.config.session_id.clone();
        self.client_random.clear();
        self.server_random.clear();
        self.master_secret.clear();
        self.transcript = Transcript::new();
    }
}
