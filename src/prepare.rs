//! Preparator family: derives the natural value of every computable field.
//!
//! Preparation is two-pass within a message. Leaf values are derived first
//! (versions and offers from connection state, fresh randoms, PRF outputs),
//! then length and count fields are computed from the serialized size of the
//! resolved structures they describe. Resolved means after override
//! resolution, so a pinned leaf value flows into every downstream length.
//! All derived values land on the computed track via `set_computed`; an
//! explicit pin is never displaced.
//!
//! Payload fields with no natural derivation (alert codes, application
//! data, exchange keys, certificate bytes, opaque bodies) are left alone.
//! If the author did not supply them, the serializer reports them by name.

use rand::RngCore;

use crate::error::Error;
use crate::msgs::ccs::ChangeCipherSpec;
use crate::msgs::extensions::{Extension, ExtensionPayload};
use crate::msgs::handshake::{
    CertificateChain, ClientHello, Finished, HandshakeBody, HandshakeMessage, ServerHello,
    RANDOM_LEN,
};
use crate::msgs::message::Message;
use crate::serialize::{
    serialize_extension, serialize_extension_payload, serialize_handshake_body,
    serialize_key_share_entry,
};
use crate::state::{ConnectionState, Role};

pub fn prepare_message(message: &mut Message, state: &ConnectionState) -> Result<(), Error> {
    match message {
        Message::Handshake(hs) => prepare_handshake(hs, state),
        Message::Alert(_) | Message::ApplicationData(_) => Ok(()),
        Message::ChangeCipherSpec(ccs) => {
            prepare_ccs(ccs);
            Ok(())
        }
    }
}

pub fn prepare_handshake(hs: &mut HandshakeMessage, state: &ConnectionState) -> Result<(), Error> {
    match &mut hs.body {
        HandshakeBody::ClientHello(ch) => prepare_client_hello(ch, state)?,
        HandshakeBody::ServerHello(sh) => prepare_server_hello(sh, state)?,
        HandshakeBody::Certificate(chain) => prepare_certificate(chain)?,
        HandshakeBody::Finished(fin) => prepare_finished(fin, state),
        HandshakeBody::ServerHelloDone
        | HandshakeBody::ClientKeyExchange(_)
        | HandshakeBody::Opaque(_) => {}
    }
    finish_handshake(hs)
}

/// Header pass shared by all handshake kinds: the type byte from the body
/// variant, the declared length from the serialized size of the resolved
/// body. Opaque bodies have no natural type; their `msg_type` must come
/// from the author.
fn finish_handshake(hs: &mut HandshakeMessage) -> Result<(), Error> {
    if let Some(typ) = hs.body.natural_type() {
        hs.msg_type.set_computed(typ);
    }
    let body = serialize_handshake_body(&hs.body)?;
    hs.length.set_computed(body.len() as u32);
    Ok(())
}

fn prepare_client_hello(ch: &mut ClientHello, state: &ConnectionState) -> Result<(), Error> {
    let config = state.config();

    ch.client_version.set_computed(config.version);
    ch.random.set_computed(fresh_random());

    ch.session_id.set_computed(state.session_id.clone());
    let session_id_len = ch.session_id.require("client_hello.session_id")?.len();
    ch.session_id_length.set_computed(session_id_len as u8);

    ch.cipher_suites.set_computed(config.offered_suites.clone());
    let suites_len = ch.cipher_suites.require("client_hello.cipher_suites")?.len();
    ch.cipher_suites_length.set_computed((suites_len * 2) as u16);

    ch.compressions
        .set_computed(config.offered_compressions.clone());
    let compressions_len = ch.compressions.require("client_hello.compressions")?.len();
    ch.compressions_length.set_computed(compressions_len as u8);

    prepare_extension_block(&mut ch.extensions, &mut ch.extensions_length, Role::Client)
}

fn prepare_server_hello(sh: &mut ServerHello, state: &ConnectionState) -> Result<(), Error> {
    sh.server_version.set_computed(state.negotiated_version);
    sh.random.set_computed(fresh_random());

    sh.session_id.set_computed(state.session_id.clone());
    let session_id_len = sh.session_id.require("server_hello.session_id")?.len();
    sh.session_id_length.set_computed(session_id_len as u8);

    // The config is validated non-empty at construction.
    let suite = state
        .selected_suite
        .or_else(|| state.config().offered_suites.first().copied());
    if let Some(suite) = suite {
        sh.cipher_suite.set_computed(suite);
    }
    sh.compression.set_computed(state.selected_compression);

    prepare_extension_block(&mut sh.extensions, &mut sh.extensions_length, Role::Server)
}

fn prepare_extension_block(
    extensions: &mut [Extension],
    extensions_length: &mut crate::field::Overridable<u16>,
    sender: Role,
) -> Result<(), Error> {
    for ext in extensions.iter_mut() {
        prepare_extension(ext, sender)?;
    }
    if !extensions.is_empty() || extensions_length.is_resolved() {
        let mut total = 0;
        for ext in extensions.iter() {
            total += serialize_extension(ext)?.len();
        }
        extensions_length.set_computed(total as u16);
    }
    Ok(())
}

fn prepare_extension(ext: &mut Extension, sender: Role) -> Result<(), Error> {
    if let ExtensionPayload::KeyShare(list) = &mut ext.payload {
        for entry in &mut list.entries {
            let key_len = entry.key.require("key_share.key")?.len();
            entry.key_length.set_computed(key_len as u16);
        }
        // Only the client-sent layout carries the two-byte list prefix.
        if sender == Role::Client {
            let mut total = 0;
            for entry in &list.entries {
                total += serialize_key_share_entry(entry)?.len();
            }
            list.list_length.set_computed(total as u16);
        }
    }
    let payload = serialize_extension_payload(&ext.payload)?;
    ext.length.set_computed(payload.len() as u16);
    Ok(())
}

fn prepare_certificate(chain: &mut CertificateChain) -> Result<(), Error> {
    let mut total = 0;
    for entry in &mut chain.entries {
        let data_len = entry.data.require("certificate.entry_data")?.len();
        entry.length.set_computed(data_len as u32);
        total += 3 + data_len;
    }
    chain.chain_length.set_computed(total as u32);
    Ok(())
}

/// Verify data is derivable only once key material exists. With no master
/// secret the field is left alone; an author can still pin arbitrary bytes
/// to probe premature Finished handling.
fn prepare_finished(fin: &mut Finished, state: &ConnectionState) {
    if state.master_secret.is_empty() {
        return;
    }
    let label: &[u8] = match state.role() {
        Role::Client => b"client finished",
        Role::Server => b"server finished",
    };
    fin.verify_data.set_computed(crate::cipher::finished_verify_data(
        &state.master_secret,
        label,
        &state.transcript.current(),
    ));
}

fn prepare_ccs(ccs: &mut ChangeCipherSpec) {
    ccs.value.set_computed(1);
}

fn fresh_random() -> Vec<u8> {
    let mut bytes = vec![0u8; RANDOM_LEN];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::msgs::enums::{CipherSuite, Compression, ProtocolVersion};
    use crate::serialize::serialize_client_hello;
    use crate::state::{ConnectionConfig, ConnectionState};

    fn client_state() -> ConnectionState {
        let config = ConnectionConfig::new("client", Role::Client)
            .with_suites(vec![
                CipherSuite::TLS_RSA_WITH_AES_128_CBC_SHA256,
                CipherSuite::TLS_RSA_WITH_AES_256_CBC_SHA256,
            ])
            .with_session_id(vec![1, 2, 3]);
        ConnectionState::new(config).unwrap()
    }

    #[test]
    fn client_hello_lengths_describe_resolved_values() {
        let state = client_state();
        let mut ch = ClientHello::default();
        prepare_client_hello(&mut ch, &state).unwrap();

        assert_eq!(ch.client_version.get(), Some(&ProtocolVersion::TLSv1_2));
        assert_eq!(ch.random.get().unwrap().len(), RANDOM_LEN);
        assert_eq!(ch.session_id_length.get(), Some(&3));
        assert_eq!(ch.cipher_suites_length.get(), Some(&4));
        assert_eq!(ch.compressions.get(), Some(&vec![Compression::Null]));
        assert_eq!(ch.compressions_length.get(), Some(&1));
    }

    #[test]
    fn pinned_leaf_flows_into_downstream_lengths() {
        let state = client_state();
        let mut ch = ClientHello::default();
        ch.session_id.set_explicit(vec![9; 10]);
        prepare_client_hello(&mut ch, &state).unwrap();

        // The length describes the pinned session id, not the blueprint one.
        assert_eq!(ch.session_id_length.get(), Some(&10));
        let body = serialize_client_hello(&ch).unwrap();
        assert_eq!(body.len(), 2 + RANDOM_LEN + 1 + 10 + 2 + 4 + 1 + 1);
    }

    #[test]
    fn pinned_length_survives_preparation() {
        let state = client_state();
        let mut ch = ClientHello::default();
        ch.session_id_length.set_explicit(0);
        prepare_client_hello(&mut ch, &state).unwrap();

        assert_eq!(ch.session_id_length.get(), Some(&0));
        // The described data is still emitted in full.
        let body = serialize_client_hello(&ch).unwrap();
        assert_eq!(body.len(), 2 + RANDOM_LEN + 1 + 3 + 2 + 4 + 1 + 1);
    }

    #[test]
    fn handshake_length_matches_serialized_body() {
        let state = client_state();
        let mut hs = HandshakeMessage::new(HandshakeBody::ClientHello(ClientHello::default()));
        prepare_handshake(&mut hs, &state).unwrap();

        let body = serialize_handshake_body(&hs.body).unwrap();
        assert_eq!(hs.length.get(), Some(&(body.len() as u32)));
    }

    #[test]
    fn finished_left_alone_without_key_material() {
        let state = client_state();
        let mut fin = Finished::default();
        prepare_finished(&mut fin, &state);
        assert!(!fin.verify_data.is_resolved());

        let mut with_keys = client_state();
        with_keys.master_secret = vec![0x42; 48];
        prepare_finished(&mut fin, &with_keys);
        assert_eq!(fin.verify_data.get().unwrap().len(), 12);
    }
}
