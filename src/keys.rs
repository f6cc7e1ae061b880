//! Key material.
use elliptic_curve::{zeroize::Zeroize, Field, Group, NonZeroScalar};
use rand_core::CryptoRngCore;
use serde::{Deserialize, Serialize};

use crate::compat::{self, CSCurve, CurveError, ScalarBytes};
use crate::constants::{KEY_LEN, NONCE_LEN};

/// The symmetric key seeding all precomputation.
///
/// This is wiped from memory when dropped.
#[derive(Clone, PartialEq, Eq)]
pub struct MasterKey([u8; KEY_LEN]);

impl MasterKey {
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    pub fn random(rng: &mut impl CryptoRngCore) -> Self {
        let mut bytes = [0u8; KEY_LEN];
        rng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

impl Drop for MasterKey {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl std::fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("MasterKey(..)")
    }
}

/// The PRF key of one group.
///
/// Both the signer and the server hold the group keys: the signer to
/// recompute scalars, and both of them to select table entries.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroupKey([u8; KEY_LEN]);

impl GroupKey {
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

impl std::fmt::Debug for GroupKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("GroupKey(..)")
    }
}

/// The per-signature randomizer `x`.
///
/// This is the first part of a signature, and the only thing the verifier
/// sends to the server.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Nonce([u8; NONCE_LEN]);

impl Nonce {
    pub fn from_bytes(bytes: [u8; NONCE_LEN]) -> Self {
        Self(bytes)
    }

    /// Read a nonce from a slice, which must have exactly the right length.
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let bytes: [u8; NONCE_LEN] = bytes.try_into().ok()?;
        Some(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; NONCE_LEN] {
        &self.0
    }
}

/// The long-term identity of a signer.
#[derive(Clone)]
pub struct SchnorrKeyPair<C: CSCurve> {
    secret: C::Scalar,
    public: C::AffinePoint,
}

impl<C: CSCurve> SchnorrKeyPair<C> {
    /// Create a key pair from a nonzero secret scalar.
    pub fn from_secret(secret: C::Scalar) -> Result<Self, CurveError> {
        if bool::from(secret.is_zero()) {
            return Err(CurveError::ZeroScalar);
        }
        let public = (C::ProjectivePoint::generator() * secret).into();
        Ok(Self { secret, public })
    }

    /// Create a key pair from 32 bytes, which get reduced modulo the group order.
    pub fn from_secret_bytes(bytes: &ScalarBytes) -> Result<Self, CurveError> {
        Self::from_secret(compat::reduce_scalar::<C>(bytes))
    }

    pub fn random(rng: &mut impl CryptoRngCore) -> Self {
        let secret: C::Scalar = *NonZeroScalar::<C>::random(rng);
        let public = (C::ProjectivePoint::generator() * secret).into();
        Self { secret, public }
    }

    pub fn public_key(&self) -> &C::AffinePoint {
        &self.public
    }

    pub(crate) fn secret(&self) -> &C::Scalar {
        &self.secret
    }

    /// The secret scalar, as 32 big endian bytes.
    pub fn secret_bytes(&self) -> ScalarBytes {
        compat::encode_scalar::<C>(&self.secret)
    }
}

impl<C: CSCurve> Drop for SchnorrKeyPair<C> {
    fn drop(&mut self) {
        self.secret.zeroize();
    }
}

impl<C: CSCurve> std::fmt::Debug for SchnorrKeyPair<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchnorrKeyPair")
            .field("public", &self.public)
            .finish_non_exhaustive()
    }
}
