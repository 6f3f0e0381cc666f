//! Bulk cipher state for one record-layer direction, plus the TLS 1.2 PRF.
//!
//! Built on raw primitives (`aes` block ops, `hmac`/`sha2`) rather than a
//! packaged CBC/AEAD construction: the record layer must be able to emit
//! ciphertext with deliberately wrong MACs or padding, and must surface
//! MAC and padding failures as distinct, recoverable observations.

use core::fmt;

use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockDecrypt, BlockEncrypt};
use aes::{Aes128, Aes256};
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;

use crate::error::Error;
use crate::msgs::enums::{CipherSuite, ContentType, ProtocolVersion};

type HmacSha256 = Hmac<Sha256>;

pub const BLOCK_LEN: usize = 16;
pub const MAC_LEN: usize = 32;
pub const VERIFY_DATA_LEN: usize = 12;
pub const MASTER_SECRET_LEN: usize = 48;

/// Per-suite key and MAC sizes for the suites this engine can activate.
/// Suites outside this table can still be negotiated and carried in
/// messages; they just cannot back a live cipher state.
pub fn suite_params(suite: CipherSuite) -> Option<(usize, usize)> {
    match suite {
        CipherSuite::TLS_RSA_WITH_AES_128_CBC_SHA256 => Some((16, MAC_LEN)),
        CipherSuite::TLS_RSA_WITH_AES_256_CBC_SHA256 => Some((32, MAC_LEN)),
        CipherSuite::TLS_ECDHE_RSA_WITH_AES_128_CBC_SHA256 => Some((16, MAC_LEN)),
        _ => None,
    }
}

enum AesKey {
    Aes128(Aes128),
    Aes256(Aes256),
}

impl AesKey {
    fn new(key: &[u8]) -> Result<Self, Error> {
        // Kept out of module scope: `KeyInit::new_from_slice` would collide
        // with `Mac::new_from_slice` at the HMAC call sites.
        use aes::cipher::KeyInit;

        match key.len() {
            16 => Ok(Self::Aes128(Aes128::new(GenericArray::from_slice(key)))),
            32 => Ok(Self::Aes256(Aes256::new(GenericArray::from_slice(key)))),
            n => Err(Error::Configuration(format!(
                "unsupported AES key length {}",
                n
            ))),
        }
    }

    fn encrypt_block(&self, block: &mut [u8; BLOCK_LEN]) {
        let block = GenericArray::from_mut_slice(block);
        match self {
            Self::Aes128(aes) => aes.encrypt_block(block),
            Self::Aes256(aes) => aes.encrypt_block(block),
        }
    }

    fn decrypt_block(&self, block: &mut [u8; BLOCK_LEN]) {
        let block = GenericArray::from_mut_slice(block);
        match self {
            Self::Aes128(aes) => aes.decrypt_block(block),
            Self::Aes256(aes) => aes.decrypt_block(block),
        }
    }
}

impl fmt::Debug for AesKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Aes128(_) => write!(f, "Aes128"),
            Self::Aes256(_) => write!(f, "Aes256"),
        }
    }
}

/// Active algorithm, keys and sequence number for one direction.
#[derive(Debug)]
pub enum CipherState {
    Plaintext { seq: u64 },
    Block(BlockCipherState),
}

#[derive(Debug)]
pub struct BlockCipherState {
    suite: CipherSuite,
    mac_key: Vec<u8>,
    key: AesKey,
    seq: u64,
}

impl Default for CipherState {
    fn default() -> Self {
        Self::plaintext()
    }
}

impl CipherState {
    pub fn plaintext() -> Self {
        Self::Plaintext { seq: 0 }
    }

    pub fn block(suite: CipherSuite, mac_key: Vec<u8>, enc_key: Vec<u8>) -> Result<Self, Error> {
        let (key_len, mac_len) = suite_params(suite).ok_or_else(|| {
            Error::Configuration(format!("cipher suite {:#06x} cannot back a cipher state", suite.0))
        })?;
        if enc_key.len() != key_len {
            return Err(Error::Configuration(format!(
                "suite {:#06x} needs a {}-byte key, got {}",
                suite.0,
                key_len,
                enc_key.len()
            )));
        }
        if mac_key.len() != mac_len {
            return Err(Error::Configuration(format!(
                "suite {:#06x} needs a {}-byte MAC key, got {}",
                suite.0,
                mac_len,
                mac_key.len()
            )));
        }
        Ok(Self::Block(BlockCipherState {
            suite,
            mac_key,
            key: AesKey::new(&enc_key)?,
            seq: 0,
        }))
    }

    pub fn is_active(&self) -> bool {
        matches!(self, Self::Block(_))
    }

    pub fn seq(&self) -> u64 {
        match self {
            Self::Plaintext { seq } => *seq,
            Self::Block(state) => state.seq,
        }
    }

    /// MAC-then-pad-then-encrypt, explicit IV, per TLS 1.2 CBC suites.
    pub fn encrypt(
        &mut self,
        typ: ContentType,
        version: ProtocolVersion,
        fragment: &[u8],
    ) -> Result<Vec<u8>, Error> {
        match self {
            Self::Plaintext { seq } => {
                *seq += 1;
                Ok(fragment.to_vec())
            }
            Self::Block(state) => {
                let mac = state.mac(state.seq, typ, version, fragment);

                let mut plaintext = fragment.to_vec();
                plaintext.extend_from_slice(&mac);
                let pad_len = BLOCK_LEN - 1 - (plaintext.len() % BLOCK_LEN);
                plaintext.extend(std::iter::repeat(pad_len as u8).take(pad_len + 1));

                let mut iv = [0u8; BLOCK_LEN];
                rand::thread_rng().fill_bytes(&mut iv);

                let mut out = iv.to_vec();
                let mut prev = iv;
                for chunk in plaintext.chunks(BLOCK_LEN) {
                    let mut block = [0u8; BLOCK_LEN];
                    block.copy_from_slice(chunk);
                    for (b, p) in block.iter_mut().zip(prev.iter()) {
                        *b ^= p;
                    }
                    state.key.encrypt_block(&mut block);
                    out.extend_from_slice(&block);
                    prev = block;
                }

                state.seq += 1;
                Ok(out)
            }
        }
    }

    /// Decrypt-then-check-padding-then-check-MAC. Padding and MAC failures
    /// are distinct errors on purpose: a distinguishable failure behavior
    /// under malformed ciphertext is what padding-oracle probes look for.
    pub fn decrypt(
        &mut self,
        typ: ContentType,
        version: ProtocolVersion,
        payload: &[u8],
    ) -> Result<Vec<u8>, Error> {
        match self {
            Self::Plaintext { seq } => {
                *seq += 1;
                Ok(payload.to_vec())
            }
            Self::Block(state) => {
                let seq = state.seq;
                state.seq += 1;

                if payload.len() < 2 * BLOCK_LEN || payload.len() % BLOCK_LEN != 0 {
                    return Err(Error::BadPadding);
                }

                let mut prev = [0u8; BLOCK_LEN];
                prev.copy_from_slice(&payload[..BLOCK_LEN]);

                let mut plaintext = Vec::with_capacity(payload.len() - BLOCK_LEN);
                for chunk in payload[BLOCK_LEN..].chunks(BLOCK_LEN) {
                    let mut block = [0u8; BLOCK_LEN];
                    block.copy_from_slice(chunk);
                    let ct = block;
                    state.key.decrypt_block(&mut block);
                    for (b, p) in block.iter_mut().zip(prev.iter()) {
                        *b ^= p;
                    }
                    plaintext.extend_from_slice(&block);
                    prev = ct;
                }

                let pad_len = usize::from(*plaintext.last().ok_or(Error::BadPadding)?);
                if pad_len + 1 > plaintext.len() {
                    return Err(Error::BadPadding);
                }
                let pad_start = plaintext.len() - pad_len - 1;
                if plaintext[pad_start..].iter().any(|b| usize::from(*b) != pad_len) {
                    return Err(Error::BadPadding);
                }
                plaintext.truncate(pad_start);

                if plaintext.len() < MAC_LEN {
                    return Err(Error::Integrity);
                }
                let mac_start = plaintext.len() - MAC_LEN;
                let (fragment, mac) = plaintext.split_at(mac_start);

                let mut hmac = HmacSha256::new_from_slice(&state.mac_key)
                    .map_err(|_| Error::Integrity)?;
                hmac.update(&mac_header(seq, typ, version, fragment.len()));
                hmac.update(fragment);
                hmac.verify_slice(mac).map_err(|_| Error::Integrity)?;

                Ok(fragment.to_vec())
            }
        }
    }
}

impl BlockCipherState {
    pub fn suite(&self) -> CipherSuite {
        self.suite
    }

    fn mac(
        &self,
        seq: u64,
        typ: ContentType,
        version: ProtocolVersion,
        fragment: &[u8],
    ) -> Vec<u8> {
        // HMAC keys of any length are accepted by the primitive; the length
        // check happened at construction.
        let mut hmac = HmacSha256::new_from_slice(&self.mac_key).expect("hmac accepts any key");
        hmac.update(&mac_header(seq, typ, version, fragment.len()));
        hmac.update(fragment);
        hmac.finalize().into_bytes().to_vec()
    }
}

fn mac_header(seq: u64, typ: ContentType, version: ProtocolVersion, len: usize) -> Vec<u8> {
    let mut header = Vec::with_capacity(13);
    header.extend_from_slice(&seq.to_be_bytes());
    header.push(typ.get_u8());
    header.extend_from_slice(&version.get_u16().to_be_bytes());
    header.extend_from_slice(&(len as u16).to_be_bytes());
    header
}

/// TLS 1.2 pseudo-random function, P_SHA256.
pub fn prf_sha256(secret: &[u8], label: &[u8], seed: &[u8], out_len: usize) -> Vec<u8> {
    let mut label_seed = label.to_vec();
    label_seed.extend_from_slice(seed);

    let hmac_of = |key: &[u8], parts: &[&[u8]]| -> Vec<u8> {
        let mut hmac = HmacSha256::new_from_slice(key).expect("hmac accepts any key");
        for part in parts {
            hmac.update(part);
        }
        hmac.finalize().into_bytes().to_vec()
    };

    let mut out = Vec::with_capacity(out_len);
    let mut a = hmac_of(secret, &[&label_seed]);
    while out.len() < out_len {
        out.extend_from_slice(&hmac_of(secret, &[&a, &label_seed]));
        a = hmac_of(secret, &[&a]);
    }
    out.truncate(out_len);
    out
}

/// Key block for one connection: MAC and encryption keys for both
/// directions, in the wire derivation order.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyBlock {
    pub client_mac_key: Vec<u8>,
    pub server_mac_key: Vec<u8>,
    pub client_key: Vec<u8>,
    pub server_key: Vec<u8>,
}

impl KeyBlock {
    pub fn derive(
        suite: CipherSuite,
        master_secret: &[u8],
        client_random: &[u8],
        server_random: &[u8],
    ) -> Result<Self, Error> {
        let (key_len, mac_len) = suite_params(suite).ok_or_else(|| {
            Error::Configuration(format!(
                "cannot derive keys for cipher suite {:#06x}",
                suite.0
            ))
        })?;

        let mut seed = server_random.to_vec();
        seed.extend_from_slice(client_random);
        let block = prf_sha256(
            master_secret,
            b"key expansion",
            &seed,
            2 * mac_len + 2 * key_len,
        );

        let mut at = 0;
        let mut next = |len: usize| {
            let part = block[at..at + len].to_vec();
            at += len;
            part
        };

        Ok(Self {
            client_mac_key: next(mac_len),
            server_mac_key: next(mac_len),
            client_key: next(key_len),
            server_key: next(key_len),
        })
    }
}

/// Finished verify_data over the current transcript digest.
pub fn finished_verify_data(
    master_secret: &[u8],
    label: &[u8],
    transcript_digest: &[u8],
) -> Vec<u8> {
    prf_sha256(master_secret, label, transcript_digest, VERIFY_DATA_LEN)
}
