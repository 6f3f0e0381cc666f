//! End-to-end plaintext pipeline tests: pinned fields on the wire, partial
//! parses, override resolution through the full send path.

mod tests {
    use std::time::Duration;

    use crate::field::Overridable;
    use crate::msgs::enums::{HandshakeType, ProtocolVersion};
    use crate::msgs::handshake::{ClientHello, HandshakeBody};
    use crate::msgs::message::{Message, MessageKind};
    use crate::prepare::prepare_handshake;
    use crate::serialize::serialize_handshake;
    use crate::state::{ConnectionConfig, ConnectionState, Role};
    use crate::stream::{Channel, MemoryChannel};
    use crate::trace::Connection;

    fn client_connection(channel: MemoryChannel) -> Connection {
        Connection::new(
            ConnectionConfig::new("client", Role::Client),
            Box::new(channel),
        )
        .unwrap()
    }

    fn server_connection(channel: MemoryChannel) -> Connection {
        Connection::new(
            ConnectionConfig::new("server", Role::Server),
            Box::new(channel),
        )
        .unwrap()
    }

    #[test_log::test]
    fn natural_client_hello_is_protocol_valid() {
        let (client_end, mut peer) = MemoryChannel::pair();
        let mut client = client_connection(client_end);

        client
            .send(&mut Message::handshake(HandshakeBody::ClientHello(
                ClientHello::default(),
            )))
            .unwrap();

        let mut wire = Vec::new();
        peer.recv(&mut wire, Duration::from_millis(1)).unwrap();

        assert_eq!(&wire[..3], &[0x16, 0x03, 0x03]);
        let record_len = u16::from_be_bytes([wire[3], wire[4]]) as usize;
        assert_eq!(wire.len(), 5 + record_len);

        // Handshake header agrees with the body it carries.
        assert_eq!(wire[5], 0x01);
        let hs_len =
            u32::from_be_bytes([0, wire[6], wire[7], wire[8]]) as usize;
        assert_eq!(record_len, 4 + hs_len);
        // Body: legacy version 1.2, then the 32-byte random.
        assert_eq!(&wire[9..11], &[0x03, 0x03]);
    }

    #[test_log::test]
    fn pinned_handshake_length_leaves_record_header_intact() {
        let (client_end, mut peer) = MemoryChannel::pair();
        let mut client = client_connection(client_end);

        let mut message =
            Message::handshake(HandshakeBody::ClientHello(ClientHello::default()));
        if let Message::Handshake(hs) = &mut message {
            hs.length.set_explicit(5);
        }
        client.send(&mut message).unwrap();

        let mut wire = Vec::new();
        peer.recv(&mut wire, Duration::from_millis(1)).unwrap();

        // Record header: handshake content type, negotiated version.
        assert_eq!(&wire[..3], &[0x16, 0x03, 0x03]);
        // The record length describes the payload actually carried.
        let record_len = u16::from_be_bytes([wire[3], wire[4]]) as usize;
        assert_eq!(wire.len(), 5 + record_len);

        // Handshake header carries the pin; the body follows in full.
        assert_eq!(&wire[5..9], &[0x01, 0x00, 0x00, 0x05]);
        assert!(record_len > 4 + 5, "hello body must be complete");
    }

    #[test_log::test]
    fn short_declared_length_splits_one_record_into_two_messages() {
        let (mut peer, server_end) = MemoryChannel::pair();
        let mut server = server_connection(server_end);

        // One handshake record: a ClientKeyExchange declaring 2 of its 4
        // body bytes, the leftover bytes forming a ServerHelloDone.
        let payload = [0x10, 0x00, 0x00, 0x02, 0xde, 0xad, 0x0e, 0x00, 0x00, 0x00];
        let mut wire = vec![0x16, 0x03, 0x03, 0x00, payload.len() as u8];
        wire.extend_from_slice(&payload);
        peer.send(&wire).unwrap();

        let mut deviations = Vec::new();
        let mut received = Vec::new();
        server
            .receive_expected(
                &[MessageKind::ClientKeyExchange, MessageKind::ServerHelloDone],
                &mut deviations,
                &mut received,
            )
            .unwrap();

        assert!(deviations.is_empty(), "unexpected: {:?}", deviations);
        assert_eq!(received.len(), 2);
        match &received[0] {
            Message::Handshake(hs) => match &hs.body {
                HandshakeBody::ClientKeyExchange(cke) => {
                    assert_eq!(cke.exchange_keys.get().unwrap(), &vec![0xde, 0xad]);
                }
                other => panic!("unexpected body {:?}", other),
            },
            other => panic!("unexpected message {:?}", other),
        }
        assert_eq!(received[1].kind(), MessageKind::ServerHelloDone);
    }

    #[test_log::test]
    fn certificate_chain_round_trips_with_oversized_entry() {
        use crate::msgs::handshake::{CertificateChain, CertificateEntry};

        let (client_end, server_end) = MemoryChannel::pair();
        let mut client = client_connection(client_end);
        let mut server = server_connection(server_end);

        // Second entry is longer than 255 bytes so its length needs the
        // middle byte of the three-byte field.
        let chain = CertificateChain {
            chain_length: Overridable::unset(),
            entries: vec![
                CertificateEntry::new(vec![0xc0; 7]),
                CertificateEntry::new(vec![0xc1; 300]),
            ],
        };
        client
            .send(&mut Message::handshake(HandshakeBody::Certificate(chain)))
            .unwrap();

        let mut deviations = Vec::new();
        let mut received = Vec::new();
        server
            .receive_expected(&[MessageKind::Certificate], &mut deviations, &mut received)
            .unwrap();

        assert!(deviations.is_empty(), "unexpected: {:?}", deviations);
        match &received[0] {
            Message::Handshake(hs) => match &hs.body {
                HandshakeBody::Certificate(back) => {
                    assert_eq!(back.chain_length.get(), Some(&313));
                    assert_eq!(back.entries.len(), 2);
                    assert_eq!(back.entries[0].length.get(), Some(&7));
                    assert_eq!(back.entries[0].data.get().unwrap(), &vec![0xc0; 7]);
                    assert_eq!(back.entries[1].length.get(), Some(&300));
                    assert_eq!(back.entries[1].data.get().unwrap(), &vec![0xc1; 300]);
                }
                other => panic!("unexpected body {:?}", other),
            },
            other => panic!("unexpected message {:?}", other),
        }
    }

    #[test]
    fn cleared_override_reverts_to_derivation() {
        let state =
            ConnectionState::new(ConnectionConfig::new("client", Role::Client)).unwrap();
        let mut hs = crate::msgs::handshake::HandshakeMessage::new(HandshakeBody::ClientHello(
            ClientHello::default(),
        ));

        if let HandshakeBody::ClientHello(ch) = &mut hs.body {
            ch.client_version.set_explicit(ProtocolVersion::TLSv1_0);
        }
        prepare_handshake(&mut hs, &state).unwrap();
        let pinned = serialize_handshake(&hs).unwrap();
        assert_eq!(&pinned[4..6], &[0x03, 0x01]);

        if let HandshakeBody::ClientHello(ch) = &mut hs.body {
            ch.client_version.clear_explicit();
        }
        prepare_handshake(&mut hs, &state).unwrap();
        let natural = serialize_handshake(&hs).unwrap();
        assert_eq!(&natural[4..6], &[0x03, 0x03]);
    }

    #[test_log::test]
    fn handshake_message_spanning_records_is_reassembled() {
        let (client_end, server_end) = MemoryChannel::pair();
        let mut client = client_connection(client_end);
        let mut server = server_connection(server_end);
        client.record_layer_mut().set_max_fragment(8);

        let body = vec![0x5a; 50];
        let mut message = Message::Handshake(crate::msgs::handshake::HandshakeMessage::new(
            HandshakeBody::Opaque(Overridable::computed(body.clone())),
        ));
        if let Message::Handshake(hs) = &mut message {
            hs.msg_type.set_explicit(HandshakeType::Unknown(0x77));
        }
        client.send(&mut message).unwrap();

        let mut deviations = Vec::new();
        let mut received = Vec::new();
        server
            .receive_expected(
                &[MessageKind::OpaqueHandshake],
                &mut deviations,
                &mut received,
            )
            .unwrap();

        assert!(deviations.is_empty(), "unexpected: {:?}", deviations);
        match &received[0] {
            Message::Handshake(hs) => {
                assert_eq!(hs.msg_type.get(), Some(&HandshakeType::Unknown(0x77)));
                match &hs.body {
                    HandshakeBody::Opaque(data) => assert_eq!(data.get().unwrap(), &body),
                    other => panic!("unexpected body {:?}", other),
                }
            }
            other => panic!("unexpected message {:?}", other),
        }
    }

    #[test_log::test]
    fn connections_of_one_trace_stay_isolated() {
        use crate::trace::{Action, ChannelMap, WorkflowTrace};

        let (a_end, mut a_peer) = MemoryChannel::pair();
        let (b_end, mut b_peer) = MemoryChannel::pair();

        // Only connection b has inbound data: a ServerHelloDone record.
        b_peer
            .send(&[0x16, 0x03, 0x03, 0x00, 0x04, 0x0e, 0x00, 0x00, 0x00])
            .unwrap();

        let mut channels = ChannelMap::new();
        channels.insert("a".into(), Box::new(a_end));
        channels.insert("b".into(), Box::new(b_end));

        let mut trace = WorkflowTrace::new(vec![
            ConnectionConfig::new("a", Role::Client),
            ConnectionConfig::new("b", Role::Client),
        ])
        .with_action(Action::send(
            "a",
            vec![Message::handshake(HandshakeBody::ClientHello(
                ClientHello::default(),
            ))],
        ))
        .with_action(Action::receive("b", vec![MessageKind::ServerHelloDone]));

        let report = trace.execute(channels).unwrap();
        assert!(report.complete && report.as_planned);

        // a's hello went to a's peer only; b saw only its own bytes.
        let mut a_wire = Vec::new();
        a_peer.recv(&mut a_wire, Duration::from_millis(1)).unwrap();
        assert_eq!(a_wire[0], 0x16);
        let mut b_wire = Vec::new();
        assert_eq!(b_peer.recv(&mut b_wire, Duration::from_millis(1)).unwrap(), 0);
        assert_eq!(trace.actions[1].received[0].kind(), MessageKind::ServerHelloDone);
    }

    #[test]
    fn pinned_fields_survive_trace_persistence() {
        use crate::trace::{Action, WorkflowTrace};

        let mut ch = ClientHello::default();
        ch.session_id_length.set_explicit(7);
        let trace = WorkflowTrace::new(vec![ConnectionConfig::new("client", Role::Client)])
            .with_action(Action::send(
                "client",
                vec![Message::handshake(HandshakeBody::ClientHello(ch))],
            ));

        let back = WorkflowTrace::from_json(&trace.to_json().unwrap()).unwrap();
        match &back.actions[0].kind {
            crate::trace::ActionKind::Send { messages } => match &messages[0] {
                Message::Handshake(hs) => match &hs.body {
                    HandshakeBody::ClientHello(ch) => {
                        assert!(ch.session_id_length.is_pinned());
                        assert_eq!(ch.session_id_length.get(), Some(&7));
                    }
                    other => panic!("unexpected body {:?}", other),
                },
                other => panic!("unexpected message {:?}", other),
            },
            other => panic!("unexpected action {:?}", other),
        }
    }
}
