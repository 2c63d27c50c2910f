//! Ed25519 public keys used to name and verify signing oracle instances.

use crate::{
    codec::{Encode, Error as CodecError, Read, ReadExt, Write},
    utils::hex,
};
use bytes::{Buf, BufMut};
use ed25519_consensus::VerificationKey;
use std::{
    fmt::{Debug, Display},
    hash::{Hash, Hasher},
    ops::Deref,
};

/// Length of an encoded public key in bytes.
pub const PUBLIC_KEY_LENGTH: usize = 32;

/// Length of an encoded signature in bytes.
pub const SIGNATURE_LENGTH: usize = 64;

/// A validated Ed25519 public key.
///
/// Holds both the canonical 32-byte encoding and the parsed verification key, so
/// encoding never fails and verification never re-parses.
#[derive(Clone)]
pub struct PublicKey {
    raw: [u8; PUBLIC_KEY_LENGTH],
    key: VerificationKey,
}

impl PublicKey {
    /// Verify a signature over a message.
    ///
    /// Returns `false` for signatures of the wrong length rather than failing: a
    /// malformed signature is indistinguishable from an invalid one to callers.
    pub fn verify(&self, message: &[u8], signature: &[u8]) -> bool {
        let raw: [u8; SIGNATURE_LENGTH] = match signature.try_into() {
            Ok(raw) => raw,
            Err(_) => return false,
        };
        let signature = ed25519_consensus::Signature::from(raw);
        self.key.verify(&signature, message).is_ok()
    }
}

impl Write for PublicKey {
    fn write(&self, buf: &mut impl BufMut) {
        self.raw.write(buf);
    }
}

impl Read for PublicKey {
    fn read_cfg(buf: &mut impl Buf, _: ()) -> Result<Self, CodecError> {
        let raw = <[u8; PUBLIC_KEY_LENGTH]>::read(buf)?;
        let key = VerificationKey::try_from(raw.as_slice()).map_err(|_| {
            CodecError::InvalidData("PublicKey", "malformed ed25519 public key".to_string())
        })?;
        Ok(Self { raw, key })
    }
}

impl Encode for PublicKey {
    fn len_encoded(&self) -> usize {
        PUBLIC_KEY_LENGTH
    }
}

impl Eq for PublicKey {}

impl PartialEq for PublicKey {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl Hash for PublicKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.raw.hash(state);
    }
}

impl AsRef<[u8]> for PublicKey {
    fn as_ref(&self) -> &[u8] {
        &self.raw
    }
}

impl Deref for PublicKey {
    type Target = [u8];
    fn deref(&self) -> &[u8] {
        &self.raw
    }
}

impl From<VerificationKey> for PublicKey {
    fn from(key: VerificationKey) -> Self {
        let raw = key.to_bytes();
        Self { raw, key }
    }
}

impl TryFrom<&[u8]> for PublicKey {
    type Error = CodecError;
    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        let raw: [u8; PUBLIC_KEY_LENGTH] = value.try_into().map_err(|_| {
            CodecError::InvalidData("PublicKey", format!("invalid length: {}", value.len()))
        })?;
        let key = VerificationKey::try_from(value).map_err(|_| {
            CodecError::InvalidData("PublicKey", "malformed ed25519 public key".to_string())
        })?;
        Ok(Self { raw, key })
    }
}

impl Debug for PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", hex(&self.raw))
    }
}

impl Display for PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", hex(&self.raw))
    }
}
