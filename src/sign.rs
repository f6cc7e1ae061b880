use elliptic_curve::{zeroize::Zeroize, Field};

use crate::{
    compat::{self, CSCurve, ScalarBytes},
    constants::{COUNTER_LEN, GROUPS, NONCE_LEN, SCALAR_LEN, SIGNATURE_LEN},
    crypto::{keyed_hash_array, Prf},
    keygen::derive_group_keys,
    keys::{GroupKey, MasterKey, Nonce, SchnorrKeyPair},
    params::Parameters,
    protocol::{InitializationError, ProtocolError},
    selection::select,
    table::{self, SecretTable},
};

/// Represents a signature.
///
/// This is the nonce `x`, which lets the server rebuild the commitment point,
/// followed by the response scalar `s`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Signature<C: CSCurve> {
    pub nonce: Nonce,
    pub s: C::Scalar,
}

impl<C: CSCurve> Signature<C> {
    /// Encode this signature as `x || s`.
    pub fn to_bytes(&self) -> [u8; SIGNATURE_LEN] {
        let mut out = [0u8; SIGNATURE_LEN];
        out[..NONCE_LEN].copy_from_slice(self.nonce.as_bytes());
        out[NONCE_LEN..].copy_from_slice(&compat::encode_scalar::<C>(&self.s));
        out
    }

    /// Decode a signature produced by [Signature::to_bytes].
    ///
    /// The scalar must already be reduced modulo the group order.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ProtocolError> {
        if bytes.len() != SIGNATURE_LEN {
            return Err(ProtocolError::MalformedMessage {
                expected: SIGNATURE_LEN,
                found: bytes.len(),
            });
        }
        let (nonce, s) = bytes.split_at(NONCE_LEN);
        let nonce = Nonce::from_slice(nonce).ok_or(ProtocolError::MalformedMessage {
            expected: NONCE_LEN,
            found: nonce.len(),
        })?;
        let mut s_bytes: ScalarBytes = [0u8; SCALAR_LEN];
        s_bytes.copy_from_slice(s);
        let s = compat::decode_scalar::<C>(&s_bytes)?;
        Ok(Self { nonce, s })
    }
}

/// Compute the challenge `h`, binding a message to the nonce it was signed with.
pub(crate) fn challenge<C: CSCurve>(nonce: &Nonce, message: &[u8]) -> C::Scalar {
    let digest: ScalarBytes = keyed_hash_array(nonce.as_bytes(), message);
    compat::reduce_scalar::<C>(&digest)
}

/// Everything a signer holds after key generation.
///
/// Signing never multiplies a point by a scalar: the commitment scalar is a
/// sum of precomputed scalars, and the matching point only ever gets built
/// by the server.
///
/// A context either holds the secret tables, or recomputes each selected
/// scalar from the master key when signing.
pub struct SigningContext<C: CSCurve> {
    params: Parameters,
    master_key: MasterKey,
    key_pair: SchnorrKeyPair<C>,
    group_keys: [GroupKey; GROUPS],
    /// One table per group, if they're kept at all.
    tables: Option<Vec<SecretTable<C>>>,
}

impl<C: CSCurve> SigningContext<C> {
    pub(crate) fn new(
        params: Parameters,
        master_key: MasterKey,
        key_pair: SchnorrKeyPair<C>,
        group_keys: [GroupKey; GROUPS],
        tables: Option<Vec<SecretTable<C>>>,
    ) -> Self {
        Self {
            params,
            master_key,
            key_pair,
            group_keys,
            tables,
        }
    }

    /// Create a signer holding no tables at all.
    ///
    /// Every signature then recomputes its scalars from the master key, which
    /// trades storage for time. The server still needs the public tables
    /// generated from the same master key, with [crate::keygen] or
    /// [crate::keygen_recomputing].
    pub fn recomputing(
        params: Parameters,
        master_key: MasterKey,
        key_pair: SchnorrKeyPair<C>,
    ) -> Result<Self, InitializationError> {
        params.validate()?;
        let group_keys = derive_group_keys(&master_key);
        Ok(Self::new(params, master_key, key_pair, group_keys, None))
    }

    pub fn params(&self) -> &Parameters {
        &self.params
    }

    pub fn public_key(&self) -> &C::AffinePoint {
        self.key_pair.public_key()
    }

    /// The secret table of a group, counting groups from 0.
    pub fn table(&self, group: usize) -> Option<&SecretTable<C>> {
        self.tables.as_ref()?.get(group)
    }

    /// Whether this signer holds its secret tables.
    pub fn has_tables(&self) -> bool {
        self.tables.is_some()
    }

    /// Derive the nonce used to sign with a given counter.
    pub fn nonce(&self, counter: u64) -> Nonce {
        let mut message = [0u8; COUNTER_LEN];
        message.copy_from_slice(&counter.to_le_bytes());
        let mut key = self.key_pair.secret_bytes();
        let nonce = Nonce::from_bytes(keyed_hash_array(&key, &message));
        key.zeroize();
        nonce
    }

    /// The commitment scalar `r` matching a nonce.
    ///
    /// This sums the selected scalars of every group, so that `r * G` is exactly
    /// the commitment point the server reconstructs for the same nonce.
    pub fn commitment_scalar(&self, nonce: &Nonce) -> C::Scalar {
        let tables = match &self.tables {
            Some(tables) => tables,
            None => return self.commitment_scalar_recomputing(nonce),
        };
        let mut r = C::Scalar::ZERO;
        for (key, table) in self.group_keys.iter().zip(tables.iter()) {
            for i in select(nonce, key, &self.params) {
                r += table.scalar(i);
            }
        }
        r
    }

    fn commitment_scalar_recomputing(&self, nonce: &Nonce) -> C::Scalar {
        let mut r = C::Scalar::ZERO;
        for key in derive_group_keys(&self.master_key) {
            let prf = Prf::new(key.as_bytes());
            for i in select(nonce, &key, &self.params) {
                r += table::entry_scalar::<C>(&prf, i);
            }
        }
        r
    }

    fn finalize(&self, nonce: Nonce, r: C::Scalar, message: &[u8]) -> Signature<C> {
        let h = challenge::<C>(&nonce, message);
        let s = r - h * self.key_pair.secret();
        Signature { nonce, s }
    }

    /// Sign a message, looking up the precomputed scalars.
    ///
    /// Without tables, this recomputes them instead, with the same result.
    ///
    /// This always uses the nonce counter 0, which makes signing deterministic:
    /// the same message always produces the same signature, and different messages
    /// reuse the same commitment. Two signatures on different messages are
    /// enough to recover the secret key. Use [SigningContext::sign_with_counter]
    /// to avoid this.
    pub fn sign(&self, message: &[u8]) -> Signature<C> {
        self.sign_with_counter(message, 0)
    }

    /// Sign a message with an explicit nonce counter.
    ///
    /// Each counter must be used for at most one message.
    pub fn sign_with_counter(&self, message: &[u8], counter: u64) -> Signature<C> {
        let nonce = self.nonce(counter);
        let r = self.commitment_scalar(&nonce);
        self.finalize(nonce, r, message)
    }

    /// Sign a message, recomputing each selected scalar from the master key.
    ///
    /// This produces exactly the same signature as [SigningContext::sign],
    /// without reading the precomputed tables.
    pub fn sign_recomputing(&self, message: &[u8]) -> Signature<C> {
        self.sign_recomputing_with_counter(message, 0)
    }

    pub fn sign_recomputing_with_counter(&self, message: &[u8], counter: u64) -> Signature<C> {
        let nonce = self.nonce(counter);
        let r = self.commitment_scalar_recomputing(&nonce);
        self.finalize(nonce, r, message)
    }
}
