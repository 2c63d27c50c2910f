//! Wire types exchanged by the certification protocol.
//!
//! Two of these formats are bit-stable contracts shared with other implementations in
//! the same deployment: the [Identity] encoding (the canonical name of a signing
//! oracle instance) and the [Certificate] encoding (attached to every certified
//! message). [Ui] and [Attestation] are carried by the outer protocol and kept stable
//! for its convenience.

use crate::{
    codec::{Encode, Error as CodecError, Read, ReadExt, Write},
    ed25519::PublicKey,
    sha256::Digest,
};
use bytes::{Buf, BufMut, Bytes};

/// Maximum decoded length of a variable-length certificate field.
///
/// Certificates arrive over untrusted channels; the cap bounds what a decoder will
/// allocate before any cryptographic check has run.
pub const MAX_FIELD_LENGTH: usize = 1 << 16;

/// Maximum decoded length of the certificate carried inside a [Ui].
pub const MAX_CERT_LENGTH: usize = 8 + 3 * (5 + MAX_FIELD_LENGTH);

/// Canonical name of a signing oracle instance.
///
/// Two instances with different epochs are distinct identities even when they hold
/// the same key. The encoded form is the 8-byte big-endian epoch followed by the
/// 32-byte public key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Identity {
    /// Provisioning epoch of the oracle instance.
    pub epoch: u64,
    /// Public key the instance signs under.
    pub public_key: PublicKey,
}

impl Write for Identity {
    fn write(&self, buf: &mut impl BufMut) {
        self.epoch.write(buf);
        self.public_key.write(buf);
    }
}

impl Read for Identity {
    fn read_cfg(buf: &mut impl Buf, _: ()) -> Result<Self, CodecError> {
        let epoch = u64::read(buf)?;
        let public_key = PublicKey::read(buf)?;
        Ok(Self { epoch, public_key })
    }
}

impl Encode for Identity {
    fn len_encoded(&self) -> usize {
        self.epoch.len_encoded() + self.public_key.len_encoded()
    }
}

/// Proof that a signing oracle certified a message digest at a sequence position.
///
/// A certificate is meaningful only together with the digest and counter it was
/// computed over; it is never accepted standalone. The three byte-string fields are
/// optional on the wire: an oracle that declines to certify yields a certificate
/// with explicit absent markers, which no verifier will accept.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Certificate {
    /// Epoch of the oracle instance that produced the certificate.
    pub epoch: u64,
    /// Oracle signature over the certified material.
    pub signature: Option<Bytes>,
    /// Encrypted share material bound to the certified counter.
    pub encrypted_shares: Option<Bytes>,
    /// Encrypted hash committing to the share material.
    pub encrypted_secret_hash: Option<Bytes>,
}

impl Certificate {
    /// Assembles a certificate from oracle output.
    pub fn new(
        epoch: u64,
        signature: Option<Bytes>,
        encrypted_shares: Option<Bytes>,
        encrypted_secret_hash: Option<Bytes>,
    ) -> Self {
        Self {
            epoch,
            signature,
            encrypted_shares,
            encrypted_secret_hash,
        }
    }

    /// Returns the certified material, or the name of the first absent field.
    pub fn parts(&self) -> Result<(&Bytes, &Bytes, &Bytes), &'static str> {
        let signature = self.signature.as_ref().ok_or("signature")?;
        let encrypted_shares = self.encrypted_shares.as_ref().ok_or("encrypted shares")?;
        let encrypted_secret_hash = self
            .encrypted_secret_hash
            .as_ref()
            .ok_or("encrypted secret hash")?;
        Ok((signature, encrypted_shares, encrypted_secret_hash))
    }

    /// Whether all certified material is present.
    pub fn is_complete(&self) -> bool {
        self.parts().is_ok()
    }
}

impl Write for Certificate {
    fn write(&self, buf: &mut impl BufMut) {
        self.epoch.write(buf);
        self.signature.write(buf);
        self.encrypted_shares.write(buf);
        self.encrypted_secret_hash.write(buf);
    }
}

impl Read for Certificate {
    fn read_cfg(buf: &mut impl Buf, _: ()) -> Result<Self, CodecError> {
        let epoch = u64::read(buf)?;
        let signature = Option::<Bytes>::read_cfg(buf, MAX_FIELD_LENGTH)?;
        let encrypted_shares = Option::<Bytes>::read_cfg(buf, MAX_FIELD_LENGTH)?;
        let encrypted_secret_hash = Option::<Bytes>::read_cfg(buf, MAX_FIELD_LENGTH)?;
        Ok(Self {
            epoch,
            signature,
            encrypted_shares,
            encrypted_secret_hash,
        })
    }
}

impl Encode for Certificate {
    fn len_encoded(&self) -> usize {
        self.epoch.len_encoded()
            + self.signature.len_encoded()
            + self.encrypted_shares.len_encoded()
            + self.encrypted_secret_hash.len_encoded()
    }
}

/// A unique identifier asserting that an oracle instance certified a message at a
/// sequence position.
///
/// Produced exactly once per message, attached to the message by the outer protocol,
/// and consumed by any number of verifiers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Ui {
    /// Position of the message in the oracle instance's private sequence.
    pub counter: u64,
    /// Encoded [Certificate] proving the assignment.
    pub cert: Bytes,
}

impl Write for Ui {
    fn write(&self, buf: &mut impl BufMut) {
        self.counter.write(buf);
        self.cert.write(buf);
    }
}

impl Read for Ui {
    fn read_cfg(buf: &mut impl Buf, _: ()) -> Result<Self, CodecError> {
        let counter = u64::read(buf)?;
        let cert = Bytes::read_cfg(buf, MAX_CERT_LENGTH)?;
        Ok(Self { counter, cert })
    }
}

impl Encode for Ui {
    fn len_encoded(&self) -> usize {
        self.counter.len_encoded() + self.cert.len_encoded()
    }
}

/// Verified auxiliary material returned to the outer protocol after UI verification.
///
/// The shares and secret hash are opaque to this crate; the outer protocol consumes
/// them for duplicate and fork detection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Attestation {
    /// Decrypted share material.
    pub shares: Bytes,
    /// Hash committing to the share material.
    pub secret_hash: Digest,
}

impl Write for Attestation {
    fn write(&self, buf: &mut impl BufMut) {
        self.shares.write(buf);
        self.secret_hash.write(buf);
    }
}

impl Read for Attestation {
    fn read_cfg(buf: &mut impl Buf, _: ()) -> Result<Self, CodecError> {
        let shares = Bytes::read_cfg(buf, MAX_FIELD_LENGTH)?;
        let secret_hash = Digest::read(buf)?;
        Ok(Self {
            shares,
            secret_hash,
        })
    }
}

impl Encode for Attestation {
    fn len_encoded(&self) -> usize {
        self.shares.len_encoded() + self.secret_hash.len_encoded()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{codec::DecodeExt, sha256};
    use ed25519_consensus::SigningKey;
    use rand::{rngs::StdRng, SeedableRng};

    fn test_public_key(seed: u64) -> PublicKey {
        let mut rng = StdRng::seed_from_u64(seed);
        PublicKey::from(SigningKey::new(&mut rng).verification_key())
    }

    fn test_certificate() -> Certificate {
        Certificate::new(
            3,
            Some(Bytes::from(vec![1u8; 64])),
            Some(Bytes::from(vec![2u8; 76])),
            Some(Bytes::from(vec![3u8; 44])),
        )
    }

    #[test]
    fn test_identity_round_trip() {
        let identity = Identity {
            epoch: 3,
            public_key: test_public_key(0),
        };
        let encoded = identity.encode();
        assert_eq!(encoded.len(), 40);
        assert_eq!(Identity::decode(encoded).unwrap(), identity);
    }

    #[test]
    fn test_identity_decode_truncated() {
        let identity = Identity {
            epoch: 7,
            public_key: test_public_key(1),
        };
        let encoded = identity.encode();
        for len in [0, 7, 8, 39] {
            assert!(matches!(
                Identity::decode(&encoded[..len]),
                Err(CodecError::EndOfBuffer)
            ));
        }
    }

    #[test]
    fn test_identity_decode_trailing_data() {
        let identity = Identity {
            epoch: 7,
            public_key: test_public_key(1),
        };
        let mut encoded = identity.encode().to_vec();
        encoded.push(0);
        assert!(matches!(
            Identity::decode(&encoded[..]),
            Err(CodecError::ExtraData(1))
        ));
    }

    #[test]
    fn test_certificate_round_trip() {
        let cert = test_certificate();
        assert!(cert.is_complete());
        assert_eq!(Certificate::decode(cert.encode()).unwrap(), cert);
    }

    #[test]
    fn test_certificate_round_trip_absent_fields() {
        let absent = Certificate::new(9, None, None, None);
        assert!(!absent.is_complete());
        assert_eq!(absent.encode().len(), 11);
        assert_eq!(Certificate::decode(absent.encode()).unwrap(), absent);

        let partial = Certificate::new(9, Some(Bytes::from_static(&[1, 2, 3])), None, None);
        assert!(!partial.is_complete());
        assert_eq!(partial.parts().unwrap_err(), "encrypted shares");
        assert_eq!(Certificate::decode(partial.encode()).unwrap(), partial);
    }

    #[test]
    fn test_certificate_decode_truncated() {
        let encoded = test_certificate().encode();
        for len in 0..encoded.len() {
            assert!(Certificate::decode(&encoded[..len]).is_err());
        }
    }

    #[test]
    fn test_certificate_decode_field_too_long() {
        let cert = Certificate::new(
            1,
            Some(Bytes::from(vec![0u8; MAX_FIELD_LENGTH + 1])),
            Some(Bytes::new()),
            Some(Bytes::new()),
        );
        assert!(matches!(
            Certificate::decode(cert.encode()),
            Err(CodecError::LengthExceeded(_, MAX_FIELD_LENGTH))
        ));
    }

    #[test]
    fn test_certificate_decode_random_input() {
        use rand::RngCore;
        let mut rng = StdRng::seed_from_u64(42);
        for len in [1usize, 8, 9, 16, 64, 256, 1024] {
            for _ in 0..16 {
                let mut input = vec![0u8; len];
                rng.fill_bytes(&mut input);
                // Must never panic; structured input is vanishingly unlikely.
                assert!(Certificate::decode(&input[..]).is_err());
            }
        }
    }

    #[test]
    fn test_ui_round_trip() {
        let ui = Ui {
            counter: 1,
            cert: test_certificate().encode(),
        };
        assert_eq!(Ui::decode(ui.encode()).unwrap(), ui);
    }

    #[test]
    fn test_attestation_round_trip() {
        let attestation = Attestation {
            shares: Bytes::from(vec![5u8; 32]),
            secret_hash: sha256::hash(b"secret"),
        };
        assert_eq!(Attestation::decode(attestation.encode()).unwrap(), attestation);
    }
}
