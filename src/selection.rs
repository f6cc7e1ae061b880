//! The selection function, shared by the signer and the server.
//!
//! Given a nonce and a group key, this picks which entries of that group's
//! table get combined. The signer adds up the selected scalars, the server
//! adds up the selected points, and the two only agree if both sides derive
//! exactly the same indices.
//!
//! Indices are read straight out of a keyed hash digest, with no rejection
//! sampling. This makes the distribution slightly uneven whenever the index
//! range does not divide 256, which is accepted by the scheme. Changing this
//! would break interoperability.
use crate::crypto::keyed_hash;
use crate::keys::{GroupKey, Nonce};
use crate::params::Parameters;

/// Select `V` indices into a table of size `N`.
///
/// When the table is smaller than the range of the encoding, indices are
/// reduced modulo the table size.
pub fn select(nonce: &Nonce, key: &GroupKey, params: &Parameters) -> Vec<usize> {
    let mut digest = vec![0u8; params.digest_len()];
    keyed_hash(key.as_bytes(), nonce.as_bytes(), &mut digest);

    let encoding = params.encoding();
    (0..params.selection_count())
        .map(|k| encoding.index(&digest, k) % params.table_size())
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::crypto::keyed_hash_array;
    use crate::params::SelectionEncoding;

    fn nonce(i: u8) -> Nonce {
        Nonce::from_bytes([i; 16])
    }

    #[test]
    fn test_selection_is_stable_and_in_range() {
        let key = GroupKey::from_bytes([9u8; 32]);
        for params in [Parameters::HIGH_SPEED, Parameters::LOW_STORAGE] {
            for i in 0..16 {
                let indices = select(&nonce(i), &key, &params);
                assert_eq!(indices.len(), params.selection_count());
                assert!(indices.iter().all(|&j| j < params.table_size()));
                assert_eq!(indices, select(&nonce(i), &key, &params));
            }
        }
    }

    #[test]
    fn test_narrow_selection_halves_digest_bytes() {
        let key = GroupKey::from_bytes([1u8; 32]);
        let digest: [u8; 40] = keyed_hash_array(key.as_bytes(), nonce(5).as_bytes());
        let expected: Vec<usize> = digest.iter().map(|b| usize::from(b / 2)).collect();
        assert_eq!(select(&nonce(5), &key, &Parameters::HIGH_SPEED), expected);
    }

    #[test]
    fn test_wide_selection_combines_digest_bytes() {
        let key = GroupKey::from_bytes([2u8; 32]);
        let digest: [u8; 36] = keyed_hash_array(key.as_bytes(), nonce(6).as_bytes());
        let expected: Vec<usize> = digest
            .chunks_exact(2)
            .map(|pair| usize::from(pair[0]) + usize::from(pair[1] / 64) * 256)
            .collect();
        assert_eq!(select(&nonce(6), &key, &Parameters::LOW_STORAGE), expected);
    }

    #[test]
    fn test_selection_depends_on_key_and_nonce() {
        let a = GroupKey::from_bytes([3u8; 32]);
        let b = GroupKey::from_bytes([4u8; 32]);
        let params = Parameters::HIGH_SPEED;
        assert_ne!(select(&nonce(0), &a, &params), select(&nonce(0), &b, &params));
        assert_ne!(select(&nonce(0), &a, &params), select(&nonce(1), &a, &params));
    }

    #[test]
    fn test_degenerate_sizes() {
        let key = GroupKey::from_bytes([5u8; 32]);
        let single_entry = Parameters::new(1, 40, SelectionEncoding::Narrow).unwrap();
        assert_eq!(select(&nonce(7), &key, &single_entry), vec![0; 40]);

        let single_pick = Parameters::new(128, 1, SelectionEncoding::Narrow).unwrap();
        let indices = select(&nonce(7), &key, &single_pick);
        assert_eq!(indices.len(), 1);
        assert!(indices[0] < 128);
    }
}
