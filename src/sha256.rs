//! SHA-256 message digests.
//!
//! The signing oracle never processes unbounded input: every message is reduced to a
//! fixed-size [Digest] before it is certified or verified.

use crate::{
    codec::{Encode, Error as CodecError, Read, ReadExt, Write},
    utils::hex,
};
use bytes::{Buf, BufMut};
use sha2::{Digest as _, Sha256};
use std::{
    fmt::{Debug, Display},
    ops::Deref,
};

/// Length of a digest in bytes.
pub const DIGEST_LENGTH: usize = 32;

/// Generate a SHA-256 digest from a message.
pub fn hash(message: &[u8]) -> Digest {
    let array: [u8; DIGEST_LENGTH] = Sha256::digest(message).into();
    Digest(array)
}

/// Digest of a SHA-256 hashing operation.
#[derive(Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[repr(transparent)]
pub struct Digest([u8; DIGEST_LENGTH]);

impl Write for Digest {
    fn write(&self, buf: &mut impl BufMut) {
        self.0.write(buf);
    }
}

impl Read for Digest {
    fn read_cfg(buf: &mut impl Buf, _: ()) -> Result<Self, CodecError> {
        Ok(Self(<[u8; DIGEST_LENGTH]>::read(buf)?))
    }
}

impl Encode for Digest {
    fn len_encoded(&self) -> usize {
        DIGEST_LENGTH
    }
}

impl From<[u8; DIGEST_LENGTH]> for Digest {
    fn from(value: [u8; DIGEST_LENGTH]) -> Self {
        Self(value)
    }
}

impl TryFrom<&[u8]> for Digest {
    type Error = CodecError;
    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        let array: [u8; DIGEST_LENGTH] = value.try_into().map_err(|_| {
            CodecError::InvalidData("Digest", format!("invalid length: {}", value.len()))
        })?;
        Ok(Self(array))
    }
}

impl AsRef<[u8]> for Digest {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl Deref for Digest {
    type Target = [u8];
    fn deref(&self) -> &[u8] {
        &self.0
    }
}

impl Debug for Digest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", hex(&self.0))
    }
}

impl Display for Digest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", hex(&self.0))
    }
}
