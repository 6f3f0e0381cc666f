//! Workflow traces: declarative protocol scripts and their executor.
//!
//! A trace declares connections (as serializable blueprints) and an ordered
//! list of send and receive actions. Executing it replays the script
//! strictly in order on a single thread. Everything observable about a run
//! lands back on the actions themselves: status, received messages, and the
//! list of deviations from the planned exchange.
//!
//! A peer deviating is never an execution failure. Timeouts, unparseable
//! bytes, broken MACs and unexpected message kinds are recorded and the run
//! continues. Only engine-level failures end a run early: an unresolvable
//! field, a transport breaking, an unusable configuration. The failing
//! action still counts as executed, so a halted run reports exactly how far
//! it came.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::cipher::{CipherState, KeyBlock};
use crate::codec::Reader;
use crate::error::Error;
use crate::handler;
use crate::msgs::enums::ContentType;
use crate::msgs::message::{Message, MessageKind};
use crate::record::{Record, RecordLayer};
use crate::state::{ConnectionAlias, ConnectionConfig, ConnectionState, Role};
use crate::stream::Channel;

pub type ChannelMap = HashMap<ConnectionAlias, Box<dyn Channel>>;

/// How a finished action relates to the plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    AsPlanned,
    Deviated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ActionStatus {
    #[default]
    NotExecuted,
    Executed(Verdict),
}

/// A recoverable observation made while executing a receive action.
#[derive(Debug, Clone, PartialEq)]
pub enum Deviation {
    /// The peer stayed silent past the configured timeout.
    Missing(MessageKind),
    /// A message of a different kind arrived in the expected slot.
    Unexpected {
        expected: MessageKind,
        got: MessageKind,
    },
    /// Delivered bytes never became a parseable message.
    Malformed(String),
    /// A record failed MAC verification.
    Integrity,
    /// A record carried structurally invalid padding.
    BadPadding,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ActionKind {
    Send { messages: Vec<Message> },
    Receive { expected: Vec<MessageKind> },
}

/// One step of a trace. The runtime fields are skipped by serde: a trace
/// serializes identically before and after execution apart from the message
/// fields preparation resolved, so stored traces replay cleanly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub connection: ConnectionAlias,
    pub kind: ActionKind,
    #[serde(skip)]
    pub status: ActionStatus,
    #[serde(skip)]
    pub deviations: Vec<Deviation>,
    #[serde(skip)]
    pub received: Vec<Message>,
}

impl Action {
    pub fn send(connection: impl Into<ConnectionAlias>, messages: Vec<Message>) -> Self {
        Self {
            connection: connection.into(),
            kind: ActionKind::Send { messages },
            status: ActionStatus::NotExecuted,
            deviations: Vec::new(),
            received: Vec::new(),
        }
    }

    pub fn receive(connection: impl Into<ConnectionAlias>, expected: Vec<MessageKind>) -> Self {
        Self {
            connection: connection.into(),
            kind: ActionKind::Receive { expected },
            status: ActionStatus::NotExecuted,
            deviations: Vec::new(),
            received: Vec::new(),
        }
    }

    pub fn as_planned(&self) -> bool {
        self.status == ActionStatus::Executed(Verdict::AsPlanned)
    }

    pub fn reset(&mut self) {
        self.status = ActionStatus::NotExecuted;
        self.deviations.clear();
        self.received.clear();
    }
}

/// Outcome of one trace run.
#[derive(Debug, PartialEq)]
pub struct TraceReport {
    /// Number of actions that ran, the failing one included.
    pub executed: usize,
    /// Whether every action of the trace ran.
    pub complete: bool,
    /// Whether every executed action finished without deviations.
    pub as_planned: bool,
    /// The engine-level failure that ended the run early, if any.
    pub failure: Option<Error>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowTrace {
    pub connections: Vec<ConnectionConfig>,
    pub actions: Vec<Action>,
}

impl WorkflowTrace {
    pub fn new(connections: Vec<ConnectionConfig>) -> Self {
        Self {
            connections,
            actions: Vec::new(),
        }
    }

    pub fn with_action(mut self, action: Action) -> Self {
        self.actions.push(action);
        self
    }

    /// Structural validation: every action references a declared alias and
    /// aliases are unique.
    pub fn validate(&self) -> Result<(), Error> {
        let mut seen = HashMap::new();
        for config in &self.connections {
            if seen.insert(config.alias.clone(), ()).is_some() {
                return Err(Error::Trace(format!(
                    "connection alias {} declared twice",
                    config.alias
                )));
            }
        }
        for (i, action) in self.actions.iter().enumerate() {
            if !seen.contains_key(&action.connection) {
                return Err(Error::Trace(format!(
                    "action {} references undeclared connection {}",
                    i, action.connection
                )));
            }
        }
        Ok(())
    }

    pub fn to_json(&self) -> Result<String, Error> {
        serde_json::to_string_pretty(self).map_err(|e| Error::Trace(e.to_string()))
    }

    pub fn from_json(json: &str) -> Result<Self, Error> {
        serde_json::from_str(json).map_err(|e| Error::Trace(e.to_string()))
    }

    pub fn reset(&mut self) {
        for action in &mut self.actions {
            action.reset();
        }
    }

    /// Runs the trace against the supplied channels, one per declared
    /// connection. Setup problems are returned as errors; anything that
    /// happens during execution is reported.
    pub fn execute(&mut self, mut channels: ChannelMap) -> Result<TraceReport, Error> {
        self.validate()?;
        if self
            .actions
            .iter()
            .any(|a| a.status != ActionStatus::NotExecuted)
        {
            return Err(Error::Trace(
                "trace was already executed, reset it first".to_string(),
            ));
        }

        let mut connections: HashMap<ConnectionAlias, Connection> = HashMap::new();
        for config in &self.connections {
            let channel = channels.remove(&config.alias).ok_or_else(|| {
                Error::Configuration(format!("no channel supplied for connection {}", config.alias))
            })?;
            connections.insert(
                config.alias.clone(),
                Connection::new(config.clone(), channel)?,
            );
        }

        info!("executing trace with {} action(s)", self.actions.len());
        let mut executed = 0;
        for (i, action) in self.actions.iter_mut().enumerate() {
            let conn = connections
                .get_mut(&action.connection)
                .ok_or_else(|| Error::Trace(format!("no connection {}", action.connection)))?;

            executed = i + 1;
            let result = match &mut action.kind {
                ActionKind::Send { messages } => {
                    messages.iter_mut().try_for_each(|m| conn.send(m))
                }
                ActionKind::Receive { expected } => {
                    conn.receive_expected(expected, &mut action.deviations, &mut action.received)
                }
            };

            match result {
                Ok(()) => {
                    let verdict = if action.deviations.is_empty() {
                        Verdict::AsPlanned
                    } else {
                        Verdict::Deviated
                    };
                    action.status = ActionStatus::Executed(verdict);
                    debug!("action {} on {}: {:?}", i, action.connection, verdict);
                }
                Err(failure) => {
                    // The failing action counts as executed; the trace stops.
                    action.status = ActionStatus::Executed(Verdict::Deviated);
                    warn!(
                        "action {} on {} failed, halting trace: {}",
                        i, action.connection, failure
                    );
                    return Ok(TraceReport {
                        executed,
                        complete: false,
                        as_planned: false,
                        failure: Some(failure),
                    });
                }
            }
        }

        Ok(TraceReport {
            executed,
            complete: true,
            as_planned: self.actions.iter().all(Action::as_planned),
            failure: None,
        })
    }
}

/// Decrypted record payloads of one content type, partially consumed by the
/// message parsers. Adjacent payloads of the same type coalesce, so a
/// handshake message may span records.
struct PlainBuffer {
    content_type: ContentType,
    bytes: Vec<u8>,
    offset: usize,
}

/// Live state of one scripted endpoint: typed connection state, record
/// layer, transport, and the buffers between them.
pub struct Connection {
    state: ConnectionState,
    record_layer: RecordLayer,
    channel: Box<dyn Channel>,
    inbox: Vec<u8>,
    pending: VecDeque<PlainBuffer>,
}

impl Connection {
    pub fn new(config: ConnectionConfig, channel: Box<dyn Channel>) -> Result<Self, Error> {
        Ok(Self {
            state: ConnectionState::new(config)?,
            record_layer: RecordLayer::new(),
            channel,
            inbox: Vec::new(),
            pending: VecDeque::new(),
        })
    }

    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut ConnectionState {
        &mut self.state
    }

    pub fn record_layer_mut(&mut self) -> &mut RecordLayer {
        &mut self.record_layer
    }

    /// Prepares, serializes and transmits one message, switching the write
    /// cipher after a change-cipher-spec goes out.
    pub fn send(&mut self, message: &mut Message) -> Result<(), Error> {
        let content_type = message.kind().content_type();
        let bytes = handler::send_message(message, &mut self.state)?;

        let mut wire = Vec::new();
        let version = self.state.negotiated_version;
        for record in self
            .record_layer
            .encapsulate(content_type, version, &bytes)?
        {
            wire.extend(record.wire_bytes()?);
        }
        self.channel.send(&wire)?;

        if message.kind() == MessageKind::ChangeCipherSpec {
            self.activate_write_cipher();
        }
        Ok(())
    }

    /// Waits for one message per expected kind, recording every deviation
    /// from the plan. Returns an error only for engine-level failures.
    pub fn receive_expected(
        &mut self,
        expected: &[MessageKind],
        deviations: &mut Vec<Deviation>,
        received: &mut Vec<Message>,
    ) -> Result<(), Error> {
        let timeout = Duration::from_millis(self.state.config().receive_timeout_ms);

        for expected_kind in expected {
            let message = loop {
                match self.drain_records() {
                    Ok(()) => {}
                    Err(Error::Integrity) => {
                        deviations.push(Deviation::Integrity);
                        continue;
                    }
                    Err(Error::BadPadding) => {
                        deviations.push(Deviation::BadPadding);
                        continue;
                    }
                    Err(e) => return Err(e),
                }

                match self.next_message()? {
                    Some(message) => break Some(message),
                    None => match self.pump(timeout)? {
                        0 => {
                            if let Some(stuck) = self.discard_stalled() {
                                deviations.push(Deviation::Malformed(stuck));
                            } else {
                                deviations.push(Deviation::Missing(*expected_kind));
                            }
                            break None;
                        }
                        _ => continue,
                    },
                }
            };

            if let Some(message) = message {
                if message.kind() == MessageKind::ChangeCipherSpec {
                    self.activate_read_cipher();
                }
                if message.kind() != *expected_kind {
                    deviations.push(Deviation::Unexpected {
                        expected: *expected_kind,
                        got: message.kind(),
                    });
                }
                received.push(message);
            }
        }
        Ok(())
    }

    fn pump(&mut self, timeout: Duration) -> Result<usize, Error> {
        self.channel.recv(&mut self.inbox, timeout)
    }

    /// Turns complete records in the inbox into plaintext buffers. Stops at
    /// a partial record, and at a change-cipher-spec record: anything behind
    /// that boundary must wait until the new read state is active. A MAC or
    /// padding failure consumes the offending record and is returned.
    fn drain_records(&mut self) -> Result<(), Error> {
        loop {
            if self.inbox.is_empty() {
                return Ok(());
            }
            let mut r = Reader::init(&self.inbox);
            let record = match Record::read(&mut r) {
                Ok(record) => record,
                Err(_) => return Ok(()),
            };
            let used = r.used();
            let plaintext = self.record_layer.decapsulate(&record);
            let content_type = record
                .content_type
                .get()
                .copied()
                .unwrap_or(ContentType::ApplicationData);
            self.inbox.drain(..used);

            self.push_plain(content_type, plaintext?);
            if content_type == ContentType::ChangeCipherSpec {
                return Ok(());
            }
        }
    }

    fn push_plain(&mut self, content_type: ContentType, bytes: Vec<u8>) {
        if let Some(back) = self.pending.back_mut() {
            if back.content_type == content_type {
                back.bytes.extend(bytes);
                return;
            }
        }
        self.pending.push_back(PlainBuffer {
            content_type,
            bytes,
            offset: 0,
        });
    }

    /// Parses the next message out of the pending plaintext. `Ok(None)`
    /// means more record data is needed, either because nothing pends or
    /// because the front buffer holds an incomplete message.
    fn next_message(&mut self) -> Result<Option<Message>, Error> {
        while let Some(front) = self.pending.front_mut() {
            if front.offset >= front.bytes.len() {
                self.pending.pop_front();
                continue;
            }
            return match handler::receive_message(
                front.content_type,
                &front.bytes,
                front.offset,
                &mut self.state,
            ) {
                Ok((message, end)) => {
                    front.offset = end;
                    if front.offset >= front.bytes.len() {
                        self.pending.pop_front();
                    }
                    Ok(Some(message))
                }
                // Possibly a message continuing in a record still in
                // flight; the caller pumps and retries.
                Err(Error::MalformedInput(_)) => Ok(None),
                Err(e) => Err(e),
            };
        }
        Ok(None)
    }

    /// Drops the front buffer after the peer went silent with unparseable
    /// bytes still pending. Returns a description of what was dropped.
    fn discard_stalled(&mut self) -> Option<String> {
        let front = self.pending.pop_front()?;
        Some(format!(
            "{} unparseable {:?} byte(s)",
            front.bytes.len() - front.offset,
            front.content_type
        ))
    }

    /// Derives the key block and switches the write direction to it. With
    /// incomplete key material or an unsupported suite the direction stays
    /// plaintext, which is itself an observable outcome.
    fn activate_write_cipher(&mut self) {
        if let Some(cipher) = self.derive_cipher(self.state.role()) {
            self.record_layer.activate_write(cipher);
        }
    }

    fn activate_read_cipher(&mut self) {
        if let Some(cipher) = self.derive_cipher(self.state.role().peer()) {
            self.record_layer.activate_read(cipher);
        }
    }

    fn derive_cipher(&self, writer: Role) -> Option<CipherState> {
        let state = &self.state;
        if state.master_secret.is_empty()
            || state.client_random.is_empty()
            || state.server_random.is_empty()
        {
            debug!("{}: key material incomplete, staying plaintext", state.alias());
            return None;
        }
        let suite = state.selected_suite?;
        let block = match KeyBlock::derive(
            suite,
            &state.master_secret,
            &state.client_random,
            &state.server_random,
        ) {
            Ok(block) => block,
            Err(e) => {
                warn!("{}: cannot derive key block: {}", state.alias(), e);
                return None;
            }
        };
        let (mac_key, enc_key) = match writer {
            Role::Client => (block.client_mac_key, block.client_key),
            Role::Server => (block.server_mac_key, block.server_key),
        };
        match CipherState::block(suite, mac_key, enc_key) {
            Ok(cipher) => Some(cipher),
            Err(e) => {
                warn!("{}: cannot activate cipher: {}", state.alias(), e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::msgs::handshake::{ClientHello, HandshakeBody};
    use crate::state::Role;
    use crate::stream::MemoryChannel;

    fn channel_map(alias: &str, channel: MemoryChannel) -> ChannelMap {
        let mut map = ChannelMap::new();
        map.insert(ConnectionAlias::new(alias), Box::new(channel));
        map
    }

    #[test]
    fn undeclared_alias_fails_validation() {
        let trace = WorkflowTrace::new(vec![ConnectionConfig::new("client", Role::Client)])
            .with_action(Action::send("nobody", vec![]));
        assert!(matches!(trace.validate(), Err(Error::Trace(_))));
    }

    #[test]
    fn serialization_is_stable_before_execution() {
        let trace = WorkflowTrace::new(vec![ConnectionConfig::new("client", Role::Client)])
            .with_action(Action::send(
                "client",
                vec![Message::handshake(HandshakeBody::ClientHello(
                    ClientHello::default(),
                ))],
            ))
            .with_action(Action::receive("client", vec![MessageKind::ServerHello]));

        let json = trace.to_json().unwrap();
        let back = WorkflowTrace::from_json(&json).unwrap();
        assert_eq!(back, trace);
        assert_eq!(back.to_json().unwrap(), json);
    }

    #[test]
    fn hello_travels_between_two_scripted_endpoints() {
        let (client_end, server_end) = MemoryChannel::pair();

        let mut client_trace =
            WorkflowTrace::new(vec![ConnectionConfig::new("client", Role::Client)]).with_action(
                Action::send(
                    "client",
                    vec![Message::handshake(HandshakeBody::ClientHello(
                        ClientHello::default(),
                    ))],
                ),
            );
        let report = client_trace
            .execute(channel_map("client", client_end))
            .unwrap();
        assert!(report.complete && report.as_planned);

        let mut server_trace =
            WorkflowTrace::new(vec![ConnectionConfig::new("server", Role::Server)])
                .with_action(Action::receive("server", vec![MessageKind::ClientHello]));
        let report = server_trace
            .execute(channel_map("server", server_end))
            .unwrap();
        assert!(report.complete && report.as_planned);
        assert_eq!(server_trace.actions[0].received.len(), 1);
    }

    #[test]
    fn silent_peer_is_a_deviation_not_a_failure() {
        let (client_end, _server_end) = MemoryChannel::pair();
        let mut trace = WorkflowTrace::new(vec![ConnectionConfig::new("client", Role::Client)])
            .with_action(Action::receive("client", vec![MessageKind::ServerHello]));

        let report = trace.execute(channel_map("client", client_end)).unwrap();
        assert!(report.complete);
        assert!(!report.as_planned);
        assert_eq!(
            trace.actions[0].deviations,
            vec![Deviation::Missing(MessageKind::ServerHello)]
        );
        assert_eq!(
            trace.actions[0].status,
            ActionStatus::Executed(Verdict::Deviated)
        );
    }

    #[test]
    fn hard_transport_failure_halts_the_trace() {
        let (mut client_end, _) = MemoryChannel::pair();
        client_end.close();

        let mut trace = WorkflowTrace::new(vec![ConnectionConfig::new("client", Role::Client)])
            .with_action(Action::receive("client", vec![MessageKind::ServerHello]))
            .with_action(Action::receive("client", vec![MessageKind::Certificate]));

        let report = trace.execute(channel_map("client", client_end)).unwrap();
        assert!(!report.complete);
        assert_eq!(report.executed, 1);
        assert!(matches!(report.failure, Some(Error::Io(_))));
        assert_eq!(trace.actions[1].status, ActionStatus::NotExecuted);
    }

    #[test]
    fn executed_trace_must_be_reset_before_rerunning() {
        let (client_end, _server_end) = MemoryChannel::pair();
        let mut trace = WorkflowTrace::new(vec![ConnectionConfig::new("client", Role::Client)])
            .with_action(Action::send("client", vec![]));
        trace.execute(channel_map("client", client_end)).unwrap();

        let (client_end, _server_end) = MemoryChannel::pair();
        assert!(matches!(
            trace.execute(channel_map("client", client_end)),
            Err(Error::Trace(_))
        ));

        trace.reset();
        let (client_end, _server_end) = MemoryChannel::pair();
        assert!(trace.execute(channel_map("client", client_end)).is_ok());
    }
}
