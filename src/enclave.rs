//! The trusted signing oracle boundary.
//!
//! The oracle is the only component that holds private key material and the
//! authoritative monotonic counter. Everything above it treats it as an opaque
//! capability reached through the narrow [Enclave] interface: certify a digest at
//! the next counter value, or verify previously certified material. The oracle's
//! internals (hardware isolation, sealing, key management) are deliberately outside
//! this crate's contract; [software::SoftwareEnclave] provides a self-contained
//! rendition for deployments without an isolated execution environment.

use crate::{ed25519::PublicKey, sha256::Digest};
use bytes::Bytes;
use thiserror::Error;

pub mod software;

pub use software::SoftwareEnclave;

/// Faults surfaced by a signing oracle instance.
#[derive(Debug, Error)]
pub enum Error {
    /// The counter space of the current epoch is exhausted.
    #[error("counter space exhausted")]
    CounterExhausted,
    /// The counter lock was poisoned by a panicking holder.
    #[error("counter state poisoned")]
    Poisoned,
    /// Certified material could not be encrypted or sealed.
    #[error("failed to encrypt certified material")]
    EncryptionFailed,
    /// The signature does not cover the presented material.
    #[error("invalid signature")]
    InvalidSignature,
    /// The encrypted shares are malformed or were not produced for this digest.
    #[error("invalid encrypted shares")]
    InvalidShares,
    /// The encrypted secret hash is malformed or inconsistent with the shares.
    #[error("invalid encrypted secret hash")]
    InvalidSecretHash,
}

/// Material produced by a successful certify call.
#[derive(Clone, Debug)]
pub struct Certified {
    /// Counter value bound to the digest, strictly greater than all previously
    /// issued values for this instance.
    pub counter: u64,
    /// Signature over the certified material.
    pub signature: Bytes,
    /// Encrypted share material bound to the counter.
    pub encrypted_shares: Bytes,
    /// Encrypted hash committing to the share material.
    pub encrypted_secret_hash: Bytes,
}

/// Material recovered by a successful verify call.
#[derive(Clone, Debug)]
pub struct Verified {
    /// Counter the oracle bound to the digest when it was certified. The counter
    /// travels outside the certificate, so verifiers must compare this against the
    /// claimed value themselves.
    pub counter: u64,
    /// Decrypted share material.
    pub shares: Bytes,
    /// Hash committing to the share material.
    pub secret_hash: Digest,
}

/// A provisioned signing oracle instance.
///
/// Implementations must serialize `certify` internally: the counter advances exactly
/// once per successful call and never skips or repeats a value. `verify` touches no
/// mutable state and may be called concurrently with anything, including `certify`.
///
/// Disposal is ownership: dropping an instance releases it, on every exit path.
pub trait Enclave: Send + Sync {
    /// Provisioning epoch of this instance.
    fn epoch(&self) -> u64;

    /// Public key this instance signs under.
    fn public_key(&self) -> PublicKey;

    /// Binds the next counter value to `digest` and returns the certified material.
    fn certify(&self, digest: Digest) -> Result<Certified, Error>;

    /// Checks previously certified material against `digest` and recovers the
    /// decrypted auxiliary fields.
    fn verify(
        &self,
        digest: Digest,
        signature: &[u8],
        encrypted_shares: &[u8],
        encrypted_secret_hash: &[u8],
    ) -> Result<Verified, Error>;
}
