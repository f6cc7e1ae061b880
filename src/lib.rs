//! ESEM is a Schnorr-style signature scheme where signing never multiplies
//! a point by a scalar, with the help of a semi-trusted aggregation server.
//!
//! Signatures are 48 bytes: a 16 byte nonce, and a 32 byte scalar.
//!
//! # Warning
//!
//! This is experimental cryptographic software.
//!
//! - The scheme does not have a formal proof of security.
//! - This library has not undergone any form of audit.
//! - The server answers anybody who connects to it, with no authentication.
//!
//! # Design
//!
//! The main design principle of ESEM is moving every expensive operation
//! out of signing. A signer's randomness comes from three *groups* of
//! precomputed pairs:
//! ```ignore
//! (y_i, Y_i = y_i * G)
//! ```
//! where each `y_i` is derived from a master key. This is the classic
//! BPV approach: to sign, you pick a pseudorandom subset of these pairs,
//! and use the sum of the scalars as the commitment `r`. The signer only
//! ever needs the scalars.
//!
//! The twist is that the signature doesn't contain the commitment point `R = r * G`.
//! Instead, the points live on an aggregation server. Given the nonce from a
//! signature, the server recomputes which entries were picked, and returns their
//! sum, one group at a time. The verifier then adds these up, and checks that:
//! ```ignore
//! s * G + H(x, m) * PK = R
//! ```
//!
//! The flow is:
//!
//! - Key generation runs once, producing a [SigningContext], which stays with the signer,
//! and a [ServingContext], which goes to the server.
//! - The signer signs with [SigningContext::sign], without any network access.
//! - The server runs an [AggregationServer], answering nonce queries.
//! - Verifiers call [verify_remote], or drive a [VerifySession] themselves.
//!
//! ## Parameters
//!
//! How many entries each table has, and how many get picked, is described by
//! [Parameters]. Two presets exist:
//!
//! | Preset | Table size | Picked per group | Meant for |
//! |--------|------------|------------------|-----------|
//! |[Parameters::HIGH_SPEED]|128|40|signing with tables|
//! |[Parameters::LOW_STORAGE]|1024|18|recomputing scalars with [SigningContext::sign_recomputing]|
//!
//! Every party must use the same parameters.
//!
//! A signer short on memory can skip its tables entirely: [keygen_recomputing]
//! and [SigningContext::recomputing] build a signer holding none, which
//! recomputes every selected scalar from the master key.
//!
//! ## API Design
//!
//! Both sides of a verification are written as state machines implementing
//! the same interface:
//! ```ignore
//! pub trait Protocol {
//!    type Output;
//!
//!    fn poke(&mut self) -> Result<Action<Self::Output>, ProtocolError>;
//!    fn message(&mut self, from: Participant, data: MessageData);
//! }
//! ```
//! You provide messages received from the other party, and poke the protocol
//! to learn what it wants to send, whether it's waiting, or whether it's done.
//!
//! This means that the cryptography doesn't care how bytes move around. The
//! [transport] module drives these sessions over TCP, with [smol], but they can
//! just as well be driven in memory, with [protocol::run_two_party_protocol].
//!
//! # Generic Curves
//!
//! The support for generic curves is done through a custom `CSCurve` trait,
//! which can be easily implemented for any curve from the
//! RustCrypto [elliptic-curves](https://github.com/RustCrypto/elliptic-curves)
//! suite of libraries.
//!
//! This crate also provides implementations of some existing curves behind features,
//! as per the following table:
//!
//! | Curve | Feature |
//! |-------|---------|
//! |Secp256k1|`k256`|
//! |P-256|`p256`|
//!
//! # Logging
//!
//! Key generation and sessions emit events with [tracing]. No subscriber
//! is installed by this library.
mod aggregate;
mod compat;
pub mod constants;
mod crypto;
mod keygen;
mod keys;
mod params;
pub mod protocol;
mod selection;
mod serde;
mod sign;
mod table;
#[cfg(test)]
mod test;
pub mod transport;
mod verify;

pub use aggregate::{AggregationSession, ServingContext};
pub use compat::{CSCurve, CurveError, PointBytes, ScalarBytes};
pub use crypto::{keyed_hash, Prf};
pub use keygen::{derive_group_keys, keygen, keygen_recomputing, KeygenOutput};
pub use keys::{GroupKey, MasterKey, Nonce, SchnorrKeyPair};
pub use params::{Parameters, SelectionEncoding};
pub use selection::select;
pub use sign::{Signature, SigningContext};
pub use table::{PrecomputedEntry, PublicTable, SecretTable};
pub use transport::{verify_remote, AggregationServer, ClientConfig, ServerConfig};
pub use verify::{verify_with_commitment, Verdict, VerifySession};
