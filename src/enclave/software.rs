//! A software rendition of the signing oracle.
//!
//! Production deployments of this protocol back the oracle with an isolated
//! execution environment holding the private key, the monotonic counter, and the
//! attestation secrets. This module implements the same contract in plain software:
//! Ed25519 signing, ChaCha20-Poly1305 for sealing and attestation encryption, and a
//! mutex-held counter. It is suitable for tests, simulations, and deployments that
//! accept the hosting process as the trust boundary.
//!
//! All secrets derive deterministically from 32 bytes of raw key material, so an
//! instance can be re-provisioned after a restart from its sealed state and the same
//! key material. Re-provisioning increments the epoch and resets the counter space;
//! the attestation secrets are epoch-scoped, so certificates from a prior epoch can
//! no longer be opened.

use super::{Certified, Enclave, Error as EnclaveError, Verified};
use crate::{
    ed25519::PublicKey,
    sha256::{self, Digest, DIGEST_LENGTH},
};
use bytes::{BufMut, Bytes, BytesMut};
use chacha20poly1305::{
    aead::{Aead, Payload},
    ChaCha20Poly1305, KeyInit, Nonce,
};
use ed25519_consensus::SigningKey;
use sha2::{Digest as _, Sha256};
use std::sync::Mutex;
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

/// Length of the raw key material required to provision an enclave.
pub const KEY_MATERIAL_LENGTH: usize = 32;

/// Length of the share material bound to each counter value.
pub const SHARE_LENGTH: usize = 32;

const NONCE_LENGTH: usize = 12;
const TAG_LENGTH: usize = 16;
const SEALED_LENGTH: usize = 8 + TAG_LENGTH;

const SIGN_DOMAIN: &[u8] = b"usig/v1/sign";
const SEAL_DOMAIN: &[u8] = b"usig/v1/seal";
const ATTEST_DOMAIN: &[u8] = b"usig/v1/attest";
const SHARE_DOMAIN: &[u8] = b"usig/v1/share";
const CERTIFY_NAMESPACE: &[u8] = b"usig/v1/certify";

const SHARES_NONCE: u8 = 1;
const SECRET_HASH_NONCE: u8 = 2;
const SEAL_NONCE: u8 = 3;

/// Errors establishing or restoring a software enclave instance.
#[derive(Debug, Error)]
pub enum ProvisioningError {
    /// The raw key material has the wrong length.
    #[error("key material must be 32 bytes, got {0}")]
    InvalidKeyMaterial(usize),
    /// The sealed state failed authentication against the key material.
    #[error("sealed state rejected")]
    Unseal,
    /// The epoch space is exhausted.
    #[error("epoch space exhausted")]
    EpochExhausted,
}

#[derive(Zeroize, ZeroizeOnDrop)]
struct Secrets {
    seal: [u8; 32],
    attest: [u8; 32],
    share: [u8; 32],
}

/// A signing oracle implemented in software.
///
/// `certify` calls are serialized behind the counter mutex; the counter is committed
/// only after all cryptographic work succeeds, so a failed call neither skips nor
/// repeats a value. `verify` reads only immutable state. Secrets are zeroized when
/// the instance is dropped.
pub struct SoftwareEnclave {
    epoch: u64,
    counter: Mutex<u64>,
    signer: SigningKey,
    public_key: PublicKey,
    secrets: Secrets,
}

impl SoftwareEnclave {
    /// Establishes or restores an enclave instance.
    ///
    /// With no sealed state, provisions a fresh instance at epoch 1. With sealed
    /// state, authenticates it against the same key material, increments the epoch,
    /// and resets the counter space. The signing key is stable across epochs; only
    /// the epoch distinguishes the resulting identities.
    pub fn provision(
        sealed: Option<&[u8]>,
        key_material: &[u8],
    ) -> Result<Self, ProvisioningError> {
        if key_material.len() != KEY_MATERIAL_LENGTH {
            return Err(ProvisioningError::InvalidKeyMaterial(key_material.len()));
        }
        let seal = derive(SEAL_DOMAIN, key_material);
        let epoch = match sealed {
            None => 1,
            Some(sealed) => {
                let prior = unseal(&seal, sealed)?;
                prior
                    .checked_add(1)
                    .ok_or(ProvisioningError::EpochExhausted)?
            }
        };

        let seed = Zeroizing::new(derive(SIGN_DOMAIN, key_material));
        let signer = SigningKey::from(*seed);
        let public_key = PublicKey::from(signer.verification_key());
        let secrets = Secrets {
            seal,
            attest: derive_epoch(ATTEST_DOMAIN, key_material, epoch),
            share: derive_epoch(SHARE_DOMAIN, key_material, epoch),
        };
        Ok(Self {
            epoch,
            counter: Mutex::new(0),
            signer,
            public_key,
            secrets,
        })
    }

    /// Returns the authenticated sealed state to persist for the next provisioning.
    pub fn seal(&self) -> Result<Bytes, EnclaveError> {
        let cipher = ChaCha20Poly1305::new(&self.secrets.seal.into());
        let tag = cipher
            .encrypt(
                &nonce(SEAL_NONCE, self.epoch),
                Payload {
                    msg: &[],
                    aad: &self.epoch.to_be_bytes(),
                },
            )
            .map_err(|_| EnclaveError::EncryptionFailed)?;
        let mut sealed = BytesMut::with_capacity(SEALED_LENGTH);
        sealed.put_u64(self.epoch);
        sealed.put_slice(&tag);
        Ok(sealed.freeze())
    }

    // Share material is a keyed digest of the counter under the epoch-scoped share
    // secret.
    fn share_material(&self, counter: u64) -> [u8; SHARE_LENGTH] {
        let mut hasher = Sha256::new();
        hasher.update(self.secrets.share);
        hasher.update(counter.to_be_bytes());
        hasher.finalize().into()
    }

    // The byte string the oracle signs: a fixed namespace, the epoch, the counter,
    // the digest, and both encrypted fields (length-delimited where ambiguity is
    // possible).
    fn signed_payload(
        &self,
        counter: u64,
        digest: &Digest,
        encrypted_shares: &[u8],
        encrypted_secret_hash: &[u8],
    ) -> Vec<u8> {
        let mut payload = Vec::with_capacity(
            CERTIFY_NAMESPACE.len()
                + 8
                + 8
                + DIGEST_LENGTH
                + 4
                + encrypted_shares.len()
                + encrypted_secret_hash.len(),
        );
        payload.extend_from_slice(CERTIFY_NAMESPACE);
        payload.extend_from_slice(&self.epoch.to_be_bytes());
        payload.extend_from_slice(&counter.to_be_bytes());
        payload.extend_from_slice(digest.as_ref());
        payload.extend_from_slice(&(encrypted_shares.len() as u32).to_be_bytes());
        payload.extend_from_slice(encrypted_shares);
        payload.extend_from_slice(encrypted_secret_hash);
        payload
    }
}

impl Enclave for SoftwareEnclave {
    fn epoch(&self) -> u64 {
        self.epoch
    }

    fn public_key(&self) -> PublicKey {
        self.public_key.clone()
    }

    fn certify(&self, digest: Digest) -> Result<Certified, EnclaveError> {
        let mut counter = self.counter.lock().map_err(|_| EnclaveError::Poisoned)?;
        let next = counter.checked_add(1).ok_or(EnclaveError::CounterExhausted)?;

        let shares = self.share_material(next);
        let secret_hash = sha256::hash(&shares);

        let cipher = ChaCha20Poly1305::new(&self.secrets.attest.into());
        let mut plaintext = [0u8; 8 + SHARE_LENGTH];
        plaintext[..8].copy_from_slice(&next.to_be_bytes());
        plaintext[8..].copy_from_slice(&shares);
        let encrypted_shares = seal_field(&cipher, SHARES_NONCE, next, &plaintext, &digest)?;
        let encrypted_secret_hash =
            seal_field(&cipher, SECRET_HASH_NONCE, next, secret_hash.as_ref(), &digest)?;

        let signature = self.signer.sign(&self.signed_payload(
            next,
            &digest,
            &encrypted_shares,
            &encrypted_secret_hash,
        ));

        *counter = next;
        Ok(Certified {
            counter: next,
            signature: Bytes::copy_from_slice(&signature.to_bytes()),
            encrypted_shares,
            encrypted_secret_hash,
        })
    }

    fn verify(
        &self,
        digest: Digest,
        signature: &[u8],
        encrypted_shares: &[u8],
        encrypted_secret_hash: &[u8],
    ) -> Result<Verified, EnclaveError> {
        let cipher = ChaCha20Poly1305::new(&self.secrets.attest.into());

        let opened = open_field(&cipher, encrypted_shares, &digest)
            .ok_or(EnclaveError::InvalidShares)?;
        if opened.len() != 8 + SHARE_LENGTH {
            return Err(EnclaveError::InvalidShares);
        }
        let (counter_bytes, shares) = opened.split_at(8);
        let mut raw = [0u8; 8];
        raw.copy_from_slice(counter_bytes);
        let counter = u64::from_be_bytes(raw);

        let opened_hash = open_field(&cipher, encrypted_secret_hash, &digest)
            .ok_or(EnclaveError::InvalidSecretHash)?;
        let secret_hash = Digest::try_from(opened_hash.as_slice())
            .map_err(|_| EnclaveError::InvalidSecretHash)?;
        if secret_hash != sha256::hash(shares) {
            return Err(EnclaveError::InvalidSecretHash);
        }

        let payload =
            self.signed_payload(counter, &digest, encrypted_shares, encrypted_secret_hash);
        if !self.public_key.verify(&payload, signature) {
            return Err(EnclaveError::InvalidSignature);
        }

        Ok(Verified {
            counter,
            shares: Bytes::copy_from_slice(shares),
            secret_hash,
        })
    }
}

fn unseal(seal_key: &[u8; 32], sealed: &[u8]) -> Result<u64, ProvisioningError> {
    if sealed.len() != SEALED_LENGTH {
        return Err(ProvisioningError::Unseal);
    }
    let mut epoch_bytes = [0u8; 8];
    epoch_bytes.copy_from_slice(&sealed[..8]);
    let epoch = u64::from_be_bytes(epoch_bytes);

    let cipher = ChaCha20Poly1305::new(&(*seal_key).into());
    let opened = cipher
        .decrypt(
            &nonce(SEAL_NONCE, epoch),
            Payload {
                msg: &sealed[8..],
                aad: &epoch_bytes,
            },
        )
        .map_err(|_| ProvisioningError::Unseal)?;
    if !opened.is_empty() {
        return Err(ProvisioningError::Unseal);
    }
    Ok(epoch)
}

fn derive(domain: &[u8], key_material: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(domain);
    hasher.update(key_material);
    hasher.finalize().into()
}

fn derive_epoch(domain: &[u8], key_material: &[u8], epoch: u64) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(domain);
    hasher.update(key_material);
    hasher.update(epoch.to_be_bytes());
    hasher.finalize().into()
}

// Nonces never repeat under one key: the counter (or epoch, for sealing) is unique
// within an epoch and the attestation key is epoch-scoped.
fn nonce(domain: u8, value: u64) -> Nonce {
    let mut bytes = [0u8; NONCE_LENGTH];
    bytes[0] = domain;
    bytes[4..].copy_from_slice(&value.to_be_bytes());
    Nonce::from(bytes)
}

fn seal_field(
    cipher: &ChaCha20Poly1305,
    domain: u8,
    counter: u64,
    plaintext: &[u8],
    digest: &Digest,
) -> Result<Bytes, EnclaveError> {
    let nonce = nonce(domain, counter);
    let ciphertext = cipher
        .encrypt(
            &nonce,
            Payload {
                msg: plaintext,
                aad: digest.as_ref(),
            },
        )
        .map_err(|_| EnclaveError::EncryptionFailed)?;
    let mut field = BytesMut::with_capacity(NONCE_LENGTH + ciphertext.len());
    field.put_slice(nonce.as_slice());
    field.put_slice(&ciphertext);
    Ok(field.freeze())
}

fn open_field(cipher: &ChaCha20Poly1305, field: &[u8], digest: &Digest) -> Option<Vec<u8>> {
    if field.len() < NONCE_LENGTH + TAG_LENGTH {
        return None;
    }
    let (nonce, ciphertext) = field.split_at(NONCE_LENGTH);
    cipher
        .decrypt(
            Nonce::from_slice(nonce),
            Payload {
                msg: ciphertext,
                aad: digest.as_ref(),
            },
        )
        .ok()
}
