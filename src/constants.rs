//! Sizes shared by every party of the scheme.

/// The number of independent groups of precomputed randomizers.
///
/// The server answers one round per group, in order.
pub const GROUPS: usize = 3;

/// Size of a master key, a group key, or a serialized secret key.
pub const KEY_LEN: usize = 32;

/// Size of a serialized scalar.
pub const SCALAR_LEN: usize = 32;

/// Size of a serialized affine point: `x || y`, without a SEC1 tag.
pub const POINT_LEN: usize = 64;

/// Size of the per-signature nonce `x`.
pub const NONCE_LEN: usize = 16;

/// Size of a serialized signature: `x || s`.
pub const SIGNATURE_LEN: usize = NONCE_LEN + SCALAR_LEN;

/// Size of the nonce counter fed into the nonce derivation.
pub(crate) const COUNTER_LEN: usize = 8;

/// Size of one PRF output block, as consumed when deriving keys and scalars.
pub(crate) const PRF_OUTPUT_LEN: usize = 32;

/// The largest output, and largest key, the keyed hash supports.
pub(crate) const MAX_HASH_LEN: usize = 64;
