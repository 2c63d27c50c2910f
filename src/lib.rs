//! Certify messages with unique, monotonically increasing sequence numbers and
//! deterministically verify them.
//!
//! # Overview
//!
//! A unique sequential identifier generator (USIG) binds a cryptographically
//! verifiable, strictly monotonic counter to arbitrary messages on behalf of a
//! participant in a distributed protocol. Other participants can later verify that
//! the participant certified exactly this message as occupying this position in its
//! private sequence, and that it never certified two different messages at the same
//! position. Byzantine fault tolerant protocols use this primitive to hold
//! participants accountable for equivocation, which reduces the quorum sizes and
//! message complexity otherwise required for safety.
//!
//! The authoritative counter and private key live behind the narrow
//! [enclave::Enclave] boundary (in production, an isolated execution environment;
//! here, [enclave::SoftwareEnclave]). [Usig] glues that boundary to the stable wire
//! formats: the participant [Identity] (epoch and public key), the per-message
//! [Certificate], and the [Ui] attached to every certified message.
//!
//! # Example
//!
//! ```rust
//! use usig::{enclave::SoftwareEnclave, Usig};
//!
//! // Provision a fresh oracle instance from 32 bytes of key material.
//! let key_material = [7u8; 32];
//! let enclave = SoftwareEnclave::provision(None, &key_material).unwrap();
//! let usig = Usig::new(enclave);
//!
//! // Certify a message and verify the resulting unique identifier.
//! let ui = usig.create_ui(b"order#42").unwrap();
//! assert_eq!(ui.counter, 1);
//! let attestation = usig.verify_ui(b"order#42", &ui, &usig.id()).unwrap();
//! assert!(!attestation.is_empty());
//!
//! // Counters are strictly increasing.
//! let next = usig.create_ui(b"order#43").unwrap();
//! assert_eq!(next.counter, 2);
//! ```

pub mod codec;
pub mod ed25519;
pub mod enclave;
pub mod sha256;
pub mod types;
pub mod utils;

mod usig;

pub use sha256::{hash, Digest};
pub use types::{Attestation, Certificate, Identity, Ui};
pub use usig::{Error, Usig};
