//! Record layer: fragmentation, the compression stage, and per-direction
//! cipher states.
//!
//! Records are themselves made of overridable fields, so a trace can pin a
//! record header independently of the message inside it. The configured
//! maximum fragment length is a plain knob; shrinking it is how multi-record
//! fragmentation is exercised without megabyte payloads.

use log::trace;
use serde::{Deserialize, Serialize};

use crate::cipher::CipherState;
use crate::codec::{Codec, Reader};
use crate::error::Error;
use crate::field::Overridable;
use crate::msgs::enums::{Compression, ContentType, ProtocolVersion};

pub const MAX_FRAGMENT_LEN: usize = 16_384;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub content_type: Overridable<ContentType>,
    pub version: Overridable<ProtocolVersion>,
    pub length: Overridable<u16>,
    pub payload: Overridable<Vec<u8>>,
}

impl Record {
    pub fn new(content_type: ContentType, version: ProtocolVersion, payload: Vec<u8>) -> Self {
        Self {
            content_type: Overridable::computed(content_type),
            version: Overridable::computed(version),
            length: Overridable::computed(payload.len() as u16),
            payload: Overridable::computed(payload),
        }
    }

    /// Reads one record off the wire. Fails only when the declared length
    /// exceeds the bytes available.
    pub fn read(r: &mut Reader) -> Result<Record, Error> {
        let content_type = ContentType::read(r)
            .ok_or_else(|| Error::MalformedInput("record.content_type".to_string()))?;
        let version = ProtocolVersion::read(r)
            .ok_or_else(|| Error::MalformedInput("record.version".to_string()))?;
        let length =
            u16::read(r).ok_or_else(|| Error::MalformedInput("record.length".to_string()))?;
        let payload = r
            .take(length as usize)
            .ok_or_else(|| {
                Error::MalformedInput(format!("record payload of {} declared bytes", length))
            })?
            .to_vec();

        Ok(Record::new(content_type, version, payload))
    }

    /// Wire bytes: the resolved header verbatim, the full payload after it.
    /// A pinned length disagreeing with the payload reaches the peer as-is.
    pub fn wire_bytes(&self) -> Result<Vec<u8>, Error> {
        let mut bytes = Vec::new();
        self.content_type
            .require("record.content_type")?
            .encode(&mut bytes);
        self.version.require("record.version")?.encode(&mut bytes);
        self.length.require("record.length")?.encode(&mut bytes);
        bytes.extend_from_slice(self.payload.require("record.payload")?);
        Ok(bytes)
    }
}

/// One connection's record layer: independent read and write cipher states,
/// a compression stage, and the fragmentation threshold.
#[derive(Debug)]
pub struct RecordLayer {
    write_cipher: CipherState,
    read_cipher: CipherState,
    compression: Compression,
    max_fragment: usize,
}

impl Default for RecordLayer {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordLayer {
    pub fn new() -> Self {
        Self {
            write_cipher: CipherState::plaintext(),
            read_cipher: CipherState::plaintext(),
            compression: Compression::Null,
            max_fragment: MAX_FRAGMENT_LEN,
        }
    }

    pub fn set_max_fragment(&mut self, max_fragment: usize) {
        self.max_fragment = max_fragment.clamp(1, MAX_FRAGMENT_LEN);
    }

    pub fn set_compression(&mut self, compression: Compression) {
        self.compression = compression;
    }

    /// Direction switches are independent: each side of a connection flips
    /// its peer's read state only when that peer's change-cipher-spec
    /// boundary passes.
    pub fn activate_write(&mut self, cipher: CipherState) {
        self.write_cipher = cipher;
    }

    pub fn activate_read(&mut self, cipher: CipherState) {
        self.read_cipher = cipher;
    }

    pub fn write_active(&self) -> bool {
        self.write_cipher.is_active()
    }

    pub fn read_active(&self) -> bool {
        self.read_cipher.is_active()
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Splits a serialized message into records, compresses and protects
    /// each fragment under the current write state. An empty payload still
    /// produces one record with an empty fragment.
    pub fn encapsulate(
        &mut self,
        content_type: ContentType,
        version: ProtocolVersion,
        payload: &[u8],
    ) -> Result<Vec<Record>, Error> {
        let fragments: Vec<&[u8]> = if payload.is_empty() {
            vec![&[]]
        } else {
            payload.chunks(self.max_fragment).collect()
        };
        trace!(
            "encapsulating {} bytes of {:?} into {} record(s)",
            payload.len(),
            content_type,
            fragments.len()
        );

        let mut records = Vec::with_capacity(fragments.len());
        for fragment in fragments {
            let compressed = self.compress(fragment)?;
            let protected = self.write_cipher.encrypt(content_type, version, &compressed)?;
            records.push(Record::new(content_type, version, protected));
        }
        Ok(records)
    }

    /// Recovers one record's plaintext fragment under the current read
    /// state. Integrity and padding failures pass through as their own
    /// error values; the caller decides whether they end the run.
    pub fn decapsulate(&mut self, record: &Record) -> Result<Vec<u8>, Error> {
        let content_type = *record.content_type.require("record.content_type")?;
        let version = *record.version.require("record.version")?;
        let payload = record.payload.require("record.payload")?;

        let compressed = self.read_cipher.decrypt(content_type, version, payload)?;
        self.decompress(&compressed)
    }

    // The identity method is the only one carried; a record claiming any
    // other method cannot be processed.
    fn compress(&self, fragment: &[u8]) -> Result<Vec<u8>, Error> {
        match self.compression {
            Compression::Null => Ok(fragment.to_vec()),
            other => Err(Error::Configuration(format!(
                "compression method {:?} is not supported",
                other
            ))),
        }
    }

    fn decompress(&self, fragment: &[u8]) -> Result<Vec<u8>, Error> {
        match self.compression {
            Compression::Null => Ok(fragment.to_vec()),
            other => Err(Error::Configuration(format!(
                "compression method {:?} is not supported",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cipher::MAC_LEN;
    use crate::msgs::enums::CipherSuite;

    fn block_state() -> CipherState {
        CipherState::block(
            CipherSuite::TLS_RSA_WITH_AES_128_CBC_SHA256,
            vec![1; MAC_LEN],
            vec![2; 16],
        )
        .unwrap()
    }

    #[test]
    fn empty_payload_still_produces_one_record() {
        let mut layer = RecordLayer::new();
        let records = layer
            .encapsulate(ContentType::ApplicationData, ProtocolVersion::TLSv1_2, &[])
            .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].payload.get().unwrap().len(), 0);
    }

    #[test]
    fn oversized_payload_fragments_at_the_threshold() {
        let mut layer = RecordLayer::new();
        layer.set_max_fragment(100);
        let payload = vec![7u8; 250];
        let records = layer
            .encapsulate(ContentType::Handshake, ProtocolVersion::TLSv1_2, &payload)
            .unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].payload.get().unwrap().len(), 100);
        assert_eq!(records[2].payload.get().unwrap().len(), 50);

        let mut reassembled = Vec::new();
        for record in &records {
            reassembled.extend(layer.decapsulate(record).unwrap());
        }
        assert_eq!(reassembled, payload);
    }

    #[test]
    fn protected_round_trip_through_wire_bytes() {
        let mut writer = RecordLayer::new();
        writer.activate_write(block_state());
        let mut reader = RecordLayer::new();
        reader.activate_read(block_state());

        let records = writer
            .encapsulate(ContentType::Handshake, ProtocolVersion::TLSv1_2, b"finished")
            .unwrap();
        let wire = records[0].wire_bytes().unwrap();
        assert_ne!(&wire[5..], b"finished");

        let mut r = Reader::init(&wire);
        let received = Record::read(&mut r).unwrap();
        assert_eq!(reader.decapsulate(&received).unwrap(), b"finished");
    }

    #[test]
    fn pinned_record_length_reaches_the_wire() {
        let mut record = Record::new(
            ContentType::Alert,
            ProtocolVersion::TLSv1_2,
            vec![0x02, 0x28],
        );
        record.length.set_explicit(9);
        let wire = record.wire_bytes().unwrap();
        assert_eq!(&wire[3..5], &[0, 9]);
        assert_eq!(wire.len(), 5 + 2);
    }

    #[test]
    fn truncated_record_is_malformed() {
        let wire = [0x16, 0x03, 0x03, 0x00, 0x05, 0xaa];
        let mut r = Reader::init(&wire);
        assert!(matches!(
            Record::read(&mut r),
            Err(Error::MalformedInput(_))
        ));
    }
}
