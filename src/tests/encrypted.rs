//! Protected-exchange tests: cipher activation at the change-cipher-spec
//! boundary, integrity deviations, and trace halting on engine failures.

mod tests {
    use crate::cipher::MASTER_SECRET_LEN;
    use crate::error::Error;
    use crate::msgs::ccs::ChangeCipherSpec;
    use crate::msgs::enums::CipherSuite;
    use crate::msgs::handshake::{Finished, HandshakeBody};
    use crate::msgs::message::{Message, MessageKind};
    use crate::state::{ConnectionConfig, Role};
    use crate::stream::MemoryChannel;
    use crate::trace::{
        Action, ActionStatus, ChannelMap, Connection, Deviation, Verdict, WorkflowTrace,
    };

    fn keyed_connection(
        alias: &str,
        role: Role,
        channel: MemoryChannel,
        master_secret: &[u8],
    ) -> Connection {
        let mut conn =
            Connection::new(ConnectionConfig::new(alias, role), Box::new(channel)).unwrap();
        let state = conn.state_mut();
        state.client_random = vec![1; 32];
        state.server_random = vec![2; 32];
        state.selected_suite = Some(CipherSuite::TLS_RSA_WITH_AES_128_CBC_SHA256);
        state.master_secret = master_secret.to_vec();
        conn
    }

    fn ccs() -> Message {
        Message::ChangeCipherSpec(ChangeCipherSpec::default())
    }

    fn finished() -> Message {
        Message::handshake(HandshakeBody::Finished(Finished::default()))
    }

    #[test_log::test]
    fn finished_flows_encrypted_after_change_cipher_spec() {
        let (client_end, server_end) = MemoryChannel::pair();
        let master = [0x33; MASTER_SECRET_LEN];
        let mut client = keyed_connection("client", Role::Client, client_end, &master);
        let mut server = keyed_connection("server", Role::Server, server_end, &master);

        client.send(&mut ccs()).unwrap();
        let mut fin = finished();
        client.send(&mut fin).unwrap();

        let mut deviations = Vec::new();
        let mut received = Vec::new();
        server
            .receive_expected(
                &[MessageKind::ChangeCipherSpec, MessageKind::Finished],
                &mut deviations,
                &mut received,
            )
            .unwrap();

        assert!(deviations.is_empty(), "unexpected: {:?}", deviations);
        let sent_verify = match &fin {
            Message::Handshake(hs) => match &hs.body {
                HandshakeBody::Finished(fin) => fin.verify_data.get().unwrap().clone(),
                other => panic!("unexpected body {:?}", other),
            },
            other => panic!("unexpected message {:?}", other),
        };
        assert_eq!(sent_verify.len(), 12);
        match &received[1] {
            Message::Handshake(hs) => match &hs.body {
                HandshakeBody::Finished(fin) => {
                    assert_eq!(fin.verify_data.get(), Some(&sent_verify));
                }
                other => panic!("unexpected body {:?}", other),
            },
            other => panic!("unexpected message {:?}", other),
        }
    }

    #[test_log::test]
    fn tampered_record_surfaces_integrity_deviation() {
        use std::time::Duration;

        use crate::stream::Channel;

        // The wire is relayed by hand so one ciphertext byte can be flipped
        // in flight.
        let (client_end, mut tap) = MemoryChannel::pair();
        let (mut inject, server_end) = MemoryChannel::pair();
        let master = [0x33; MASTER_SECRET_LEN];
        let mut client = keyed_connection("client", Role::Client, client_end, &master);
        let mut server = keyed_connection("server", Role::Server, server_end, &master);

        client.send(&mut ccs()).unwrap();
        client.send(&mut finished()).unwrap();

        let mut wire = Vec::new();
        tap.recv(&mut wire, Duration::from_millis(1)).unwrap();
        // CCS record is 6 bytes; flipping an IV bit of the Finished record
        // scrambles its first block but leaves the padding intact.
        wire[6 + 5] ^= 0x01;
        inject.send(&wire).unwrap();

        let mut deviations = Vec::new();
        let mut received = Vec::new();
        server
            .receive_expected(
                &[MessageKind::ChangeCipherSpec, MessageKind::Finished],
                &mut deviations,
                &mut received,
            )
            .unwrap();

        // The broken record is an observation; the run itself succeeded.
        assert!(deviations.contains(&Deviation::Integrity));
        assert!(deviations.contains(&Deviation::Missing(MessageKind::Finished)));
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].kind(), MessageKind::ChangeCipherSpec);
    }

    #[test]
    fn unresolvable_field_halts_the_trace_at_its_action() {
        let (client_end, _peer) = MemoryChannel::pair();
        let mut channels = ChannelMap::new();
        channels.insert("client".into(), Box::new(client_end));

        // No master secret: the Finished body cannot be derived and was not
        // supplied, so the second action fails hard.
        let mut trace = WorkflowTrace::new(vec![ConnectionConfig::new("client", Role::Client)])
            .with_action(Action::send("client", vec![ccs()]))
            .with_action(Action::send("client", vec![finished()]))
            .with_action(Action::receive("client", vec![MessageKind::Alert]));

        let report = trace.execute(channels).unwrap();
        assert!(!report.complete);
        assert_eq!(report.executed, 2);
        assert_eq!(
            report.failure,
            Some(Error::UnresolvedField("finished.verify_data".to_string()))
        );
        assert_eq!(
            trace.actions[1].status,
            ActionStatus::Executed(Verdict::Deviated)
        );
        assert_eq!(trace.actions[2].status, ActionStatus::NotExecuted);
    }
}
