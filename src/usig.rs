//! Create and verify unique identifiers bound to messages.

use crate::{
    codec::{DecodeExt, Encode, Error as CodecError},
    enclave::{self, Enclave},
    sha256,
    types::{Attestation, Certificate, Identity, Ui},
};
use bytes::Bytes;
use thiserror::Error;
use tracing::debug;

/// Errors creating or verifying unique identifiers.
#[derive(Debug, Error)]
pub enum Error {
    /// The oracle failed while certifying a message. Fatal to the call; the oracle
    /// is the sole monotonicity authority, so this layer never retries.
    #[error("failed to certify message: {0}")]
    Generation(enclave::Error),
    /// A required argument was absent or empty.
    #[error("missing {0}")]
    InvalidInput(&'static str),
    /// The certificate bytes did not decode. Expected for input from a faulty or
    /// malicious sender; always recoverable.
    #[error("failed to decode certificate: {0}")]
    InvalidCertificate(CodecError),
    /// The certificate decoded but carries an absent field: the oracle declined to
    /// certify, and the certificate was never usable.
    #[error("certificate incomplete: missing {0}")]
    IncompleteCertificate(&'static str),
    /// The certificate was produced under a different epoch than the verifying
    /// oracle instance.
    #[error("certificate epoch {certificate} does not match enclave epoch {enclave}")]
    EpochMismatch { certificate: u64, enclave: u64 },
    /// The oracle rejected the certified material. Evidence of sender misbehavior,
    /// not a local fault.
    #[error("invalid UI: {0}")]
    InvalidUi(enclave::Error),
    /// The claimed counter differs from the one the oracle certified.
    #[error("UI counter mismatch: claimed {claimed}, certified {certified}")]
    CounterMismatch { claimed: u64, certified: u64 },
}

impl Error {
    /// Whether this failure constitutes evidence of a faulty or malicious sender
    /// (as opposed to a local or transient fault), so the outer protocol can take
    /// protocol-level action.
    pub fn is_misbehavior(&self) -> bool {
        matches!(
            self,
            Self::InvalidCertificate(_)
                | Self::IncompleteCertificate(_)
                | Self::EpochMismatch { .. }
                | Self::InvalidUi(_)
                | Self::CounterMismatch { .. }
        )
    }
}

/// Binds unique, monotonically increasing sequence numbers to messages on behalf of
/// one signing oracle instance, and verifies the bindings claimed by others.
///
/// Creation calls are serialized by the oracle. Verification is a pure, repeatable
/// check: it mutates nothing and may run concurrently with anything.
pub struct Usig<E: Enclave> {
    enclave: E,
}

impl<E: Enclave> Usig<E> {
    /// Wraps a provisioned oracle instance.
    pub fn new(enclave: E) -> Self {
        Self { enclave }
    }

    /// Returns the underlying oracle instance.
    pub fn enclave(&self) -> &E {
        &self.enclave
    }

    /// Returns the typed identity of the oracle instance.
    pub fn identity(&self) -> Identity {
        Identity {
            epoch: self.enclave.epoch(),
            public_key: self.enclave.public_key(),
        }
    }

    /// Returns the canonical encoded identity, used as this participant's name in
    /// the outer protocol.
    pub fn id(&self) -> Bytes {
        self.identity().encode()
    }

    /// Creates a unique identifier assigned to the message.
    pub fn create_ui(&self, message: &[u8]) -> Result<Ui, Error> {
        let digest = sha256::hash(message);
        let certified = self.enclave.certify(digest).map_err(Error::Generation)?;
        let cert = Certificate::new(
            self.enclave.epoch(),
            Some(certified.signature),
            Some(certified.encrypted_shares),
            Some(certified.encrypted_secret_hash),
        );
        debug!(counter = certified.counter, "certified message");
        Ok(Ui {
            counter: certified.counter,
            cert: cert.encode(),
        })
    }

    /// Verifies that `ui` certifies `message` for the oracle instance named by
    /// `usig_id`, returning the verified auxiliary material for the outer protocol.
    pub fn verify_ui(&self, message: &[u8], ui: &Ui, usig_id: &[u8]) -> Result<Bytes, Error> {
        if message.is_empty() {
            return Err(Error::InvalidInput("message"));
        }
        if usig_id.is_empty() {
            return Err(Error::InvalidInput("identity"));
        }
        if ui.cert.is_empty() {
            return Err(Error::InvalidInput("certificate"));
        }

        let cert = Certificate::decode(&ui.cert[..]).map_err(Error::InvalidCertificate)?;
        let (signature, encrypted_shares, encrypted_secret_hash) =
            cert.parts().map_err(Error::IncompleteCertificate)?;
        if cert.epoch != self.enclave.epoch() {
            return Err(Error::EpochMismatch {
                certificate: cert.epoch,
                enclave: self.enclave.epoch(),
            });
        }

        let digest = sha256::hash(message);
        let verified = self
            .enclave
            .verify(digest, signature, encrypted_shares, encrypted_secret_hash)
            .map_err(Error::InvalidUi)?;
        if verified.counter != ui.counter {
            return Err(Error::CounterMismatch {
                claimed: ui.counter,
                certified: verified.counter,
            });
        }

        debug!(counter = ui.counter, "verified ui");
        Ok(Attestation {
            shares: verified.shares,
            secret_hash: verified.secret_hash,
        }
        .encode())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enclave::SoftwareEnclave;
    use rand::{rngs::StdRng, RngCore, SeedableRng};

    fn test_usig(seed: u64) -> Usig<SoftwareEnclave> {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut key_material = [0u8; 32];
        rng.fill_bytes(&mut key_material);
        Usig::new(SoftwareEnclave::provision(None, &key_material).unwrap())
    }

    #[test]
    fn test_create_and_verify() {
        let usig = test_usig(0);
        let ui = usig.create_ui(b"message").unwrap();
        assert_eq!(ui.counter, 1);
        let attestation = usig.verify_ui(b"message", &ui, &usig.id()).unwrap();
        assert!(!attestation.is_empty());
    }

    #[test]
    fn test_verify_is_repeatable() {
        let usig = test_usig(1);
        let ui = usig.create_ui(b"message").unwrap();
        let id = usig.id();
        let first = usig.verify_ui(b"message", &ui, &id).unwrap();
        let second = usig.verify_ui(b"message", &ui, &id).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_verify_empty_inputs() {
        let usig = test_usig(2);
        let ui = usig.create_ui(b"message").unwrap();
        let id = usig.id();

        assert!(matches!(
            usig.verify_ui(b"", &ui, &id),
            Err(Error::InvalidInput("message"))
        ));
        assert!(matches!(
            usig.verify_ui(b"message", &ui, b""),
            Err(Error::InvalidInput("identity"))
        ));
        let empty_cert = Ui {
            counter: ui.counter,
            cert: Bytes::new(),
        };
        assert!(matches!(
            usig.verify_ui(b"message", &empty_cert, &id),
            Err(Error::InvalidInput("certificate"))
        ));
    }

    #[test]
    fn test_verify_wrong_message() {
        let usig = test_usig(3);
        let ui = usig.create_ui(b"message").unwrap();
        let err = usig.verify_ui(b"other message", &ui, &usig.id()).unwrap_err();
        assert!(matches!(err, Error::InvalidUi(_)));
        assert!(err.is_misbehavior());
    }

    #[test]
    fn test_verify_wrong_counter() {
        let usig = test_usig(4);
        let ui = usig.create_ui(b"message").unwrap();
        let id = usig.id();

        for counter in [0, 2, ui.counter ^ 1 << 63] {
            let tampered = Ui {
                counter,
                cert: ui.cert.clone(),
            };
            let err = usig.verify_ui(b"message", &tampered, &id).unwrap_err();
            assert!(matches!(err, Error::CounterMismatch { .. }));
            assert!(err.is_misbehavior());
        }
    }

    #[test]
    fn test_verify_tampered_certificate() {
        let usig = test_usig(5);
        let ui = usig.create_ui(b"message").unwrap();
        let id = usig.id();

        // Flipping any bit of the certificate must produce a typed rejection,
        // never success and never a panic.
        for i in 0..ui.cert.len() {
            for bit in [0x01u8, 0x80] {
                let mut corrupted = ui.cert.to_vec();
                corrupted[i] ^= bit;
                let tampered = Ui {
                    counter: ui.counter,
                    cert: corrupted.into(),
                };
                assert!(usig.verify_ui(b"message", &tampered, &id).is_err());
            }
        }
    }

    #[test]
    fn test_verify_truncated_certificate() {
        let usig = test_usig(6);
        let ui = usig.create_ui(b"message").unwrap();
        let id = usig.id();

        for len in 1..ui.cert.len() {
            let truncated = Ui {
                counter: ui.counter,
                cert: ui.cert.slice(..len),
            };
            assert!(matches!(
                usig.verify_ui(b"message", &truncated, &id),
                Err(Error::InvalidCertificate(_))
            ));
        }
    }

    #[test]
    fn test_verify_incomplete_certificate() {
        let usig = test_usig(7);
        let ui = usig.create_ui(b"message").unwrap();
        let id = usig.id();
        let cert = Certificate::decode(&ui.cert[..]).unwrap();

        let mut missing_signature = cert.clone();
        missing_signature.signature = None;
        let incomplete = Ui {
            counter: ui.counter,
            cert: missing_signature.encode(),
        };
        assert!(matches!(
            usig.verify_ui(b"message", &incomplete, &id),
            Err(Error::IncompleteCertificate("signature"))
        ));

        let mut missing_shares = cert.clone();
        missing_shares.encrypted_shares = None;
        let incomplete = Ui {
            counter: ui.counter,
            cert: missing_shares.encode(),
        };
        assert!(matches!(
            usig.verify_ui(b"message", &incomplete, &id),
            Err(Error::IncompleteCertificate("encrypted shares"))
        ));
    }

    #[test]
    fn test_verify_wrong_epoch() {
        let usig = test_usig(8);
        let ui = usig.create_ui(b"message").unwrap();
        let id = usig.id();

        let mut cert = Certificate::decode(&ui.cert[..]).unwrap();
        cert.epoch += 1;
        let tampered = Ui {
            counter: ui.counter,
            cert: cert.encode(),
        };
        assert!(matches!(
            usig.verify_ui(b"message", &tampered, &id),
            Err(Error::EpochMismatch {
                certificate: 2,
                enclave: 1
            })
        ));
    }

    #[test]
    fn test_attestation_matches_oracle_output() {
        let usig = test_usig(9);
        let message = b"message";
        let ui = usig.create_ui(message).unwrap();

        let attestation = usig.verify_ui(message, &ui, &usig.id()).unwrap();
        let decoded = Attestation::decode(attestation).unwrap();

        // The attestation carries exactly what the oracle recovered.
        let cert = Certificate::decode(&ui.cert[..]).unwrap();
        let (signature, encrypted_shares, encrypted_secret_hash) = cert.parts().unwrap();
        let verified = usig
            .enclave()
            .verify(
                sha256::hash(message),
                signature,
                encrypted_shares,
                encrypted_secret_hash,
            )
            .unwrap();
        assert_eq!(decoded.shares, verified.shares);
        assert_eq!(decoded.secret_hash, verified.secret_hash);
    }

    #[test]
    fn test_generation_error_not_misbehavior() {
        let err = Error::Generation(enclave::Error::CounterExhausted);
        assert!(!err.is_misbehavior());
        assert!(!Error::InvalidInput("message").is_misbehavior());
    }
}
