//! Key generation, which runs once to produce every table.
use tracing::{debug, info, instrument};

use crate::aggregate::ServingContext;
use crate::compat::CSCurve;
use crate::constants::GROUPS;
use crate::crypto::Prf;
use crate::keys::{GroupKey, MasterKey, SchnorrKeyPair};
use crate::params::Parameters;
use crate::protocol::InitializationError;
use crate::sign::SigningContext;
use crate::table::{self, PublicTable, SecretTable};

/// The output of key generation.
///
/// The signing context stays with the signer, and the serving context
/// is handed to the aggregation server.
pub struct KeygenOutput<C: CSCurve> {
    pub public_key: C::AffinePoint,
    pub signing: SigningContext<C>,
    pub serving: ServingContext<C>,
}

/// Derive the key of each group, as the PRF of the master key at the group's number.
///
/// Groups are numbered from 1.
pub fn derive_group_keys(master_key: &MasterKey) -> [GroupKey; GROUPS] {
    let prf = Prf::new(master_key.as_bytes());
    std::array::from_fn(|g| GroupKey::from_bytes(prf.expand(g as u64 + 1)))
}

/// Generate the precomputed tables for a signer.
///
/// The master key and key pair are kept inside of the signing context.
/// Nothing is returned if the parameters are invalid, or if any entry turns
/// out to be degenerate; generation can simply be retried with a different
/// master key.
pub fn keygen<C: CSCurve>(
    params: Parameters,
    master_key: MasterKey,
    key_pair: SchnorrKeyPair<C>,
) -> Result<KeygenOutput<C>, InitializationError> {
    generate_tables(params, master_key, key_pair, true)
}

/// Like [keygen], but the signer keeps no tables.
///
/// Only the server's public tables get built. The signing context recomputes
/// the scalars it needs for every signature instead.
pub fn keygen_recomputing<C: CSCurve>(
    params: Parameters,
    master_key: MasterKey,
    key_pair: SchnorrKeyPair<C>,
) -> Result<KeygenOutput<C>, InitializationError> {
    generate_tables(params, master_key, key_pair, false)
}

#[instrument(skip_all, fields(table_size = params.table_size(), keep_secret = keep_secret))]
fn generate_tables<C: CSCurve>(
    params: Parameters,
    master_key: MasterKey,
    key_pair: SchnorrKeyPair<C>,
    keep_secret: bool,
) -> Result<KeygenOutput<C>, InitializationError> {
    params.validate()?;
    let group_keys = derive_group_keys(&master_key);

    let mut secret_tables: Vec<SecretTable<C>> = Vec::with_capacity(GROUPS);
    let mut public_tables: Vec<PublicTable<C>> = Vec::with_capacity(GROUPS);
    for (g, key) in group_keys.iter().enumerate() {
        if keep_secret {
            let (secret, public) = table::generate::<C>(key, params.table_size())?;
            secret_tables.push(secret);
            public_tables.push(public);
        } else {
            public_tables.push(table::generate_public::<C>(key, params.table_size())?);
        }
        debug!(group = g + 1, "generated table");
    }

    info!(
        curve = %String::from_utf8_lossy(C::NAME),
        groups = GROUPS,
        selection_count = params.selection_count(),
        "generated precomputation tables"
    );

    let public_key = *key_pair.public_key();
    let secret_tables = keep_secret.then_some(secret_tables);
    Ok(KeygenOutput {
        public_key,
        signing: SigningContext::new(params, master_key, key_pair, group_keys, secret_tables),
        serving: ServingContext::new(params, group_keys, public_tables),
    })
}

#[cfg(test)]
mod test {
    use k256::{ProjectivePoint, Secp256k1};
    use rand_core::OsRng;

    use super::*;
    use crate::params::SelectionEncoding;
    use crate::serde::{decode, encode};

    #[test]
    fn test_group_keys_are_distinct() {
        let keys = derive_group_keys(&MasterKey::from_bytes([1u8; 32]));
        assert_ne!(keys[0], keys[1]);
        assert_ne!(keys[1], keys[2]);
        assert_ne!(keys[0], keys[2]);
        assert_eq!(keys, derive_group_keys(&MasterKey::from_bytes([1u8; 32])));
    }

    #[test]
    fn test_group_keys_follow_prf() {
        let master_key = MasterKey::from_bytes([2u8; 32]);
        let prf = Prf::new(master_key.as_bytes());
        let keys = derive_group_keys(&master_key);
        for (g, key) in keys.iter().enumerate() {
            assert_eq!(key.as_bytes(), &prf.expand(g as u64 + 1));
        }
    }

    #[test]
    fn test_keygen_tables_are_consistent() {
        let params = Parameters::new(32, 8, SelectionEncoding::Narrow).unwrap();
        let key_pair = SchnorrKeyPair::<Secp256k1>::random(&mut OsRng);
        let out = keygen(params, MasterKey::random(&mut OsRng), key_pair).unwrap();

        assert_eq!(&out.public_key, out.signing.public_key());
        assert_tables_match(&out, 32);
    }

    fn assert_tables_match(out: &KeygenOutput<Secp256k1>, table_size: usize) {
        for g in 0..GROUPS {
            let public = out.serving.table(g).unwrap();
            let secret = out.signing.table(g).unwrap();
            assert_eq!(public.len(), table_size);
            assert_eq!(secret.len(), table_size);
            for i in 0..table_size {
                assert_eq!(
                    (ProjectivePoint::GENERATOR * secret.get(i).unwrap()).to_affine(),
                    *public.get(i).unwrap()
                );
            }
        }
    }

    #[test]
    fn test_high_speed_tables_are_consistent() {
        let key_pair = SchnorrKeyPair::<Secp256k1>::random(&mut OsRng);
        let out = keygen(Parameters::HIGH_SPEED, MasterKey::random(&mut OsRng), key_pair).unwrap();
        assert_tables_match(&out, 128);
    }

    #[test]
    fn test_keygen_rejects_decoded_bad_parameters() {
        // Decoding bypasses the checks in `Parameters::new`.
        let bytes = encode(&(0usize, 8usize, SelectionEncoding::Narrow)).unwrap();
        let params: Parameters = decode(&bytes).unwrap();
        assert_eq!(params.table_size(), 0);
        let key_pair = SchnorrKeyPair::<Secp256k1>::random(&mut OsRng);
        assert!(matches!(
            keygen(params, MasterKey::random(&mut OsRng), key_pair.clone()),
            Err(InitializationError::BadParameters(_))
        ));
        assert!(matches!(
            keygen_recomputing(params, MasterKey::random(&mut OsRng), key_pair),
            Err(InitializationError::BadParameters(_))
        ));
    }

    #[test]
    fn test_keygen_recomputing_keeps_no_tables() {
        let params = Parameters::new(32, 8, SelectionEncoding::Narrow).unwrap();
        let master_key = MasterKey::from_bytes([3u8; 32]);
        let key_pair = SchnorrKeyPair::<Secp256k1>::random(&mut OsRng);
        let full = keygen(params, master_key.clone(), key_pair.clone()).unwrap();
        let light = keygen_recomputing(params, master_key, key_pair).unwrap();

        assert!(full.signing.has_tables());
        assert!(!light.signing.has_tables());
        assert!(light.signing.table(0).is_none());
        for g in 0..GROUPS {
            let a = full.serving.table(g).unwrap();
            let b = light.serving.table(g).unwrap();
            assert!(a.iter().eq(b.iter()));
        }
        assert_eq!(full.signing.sign(b"same"), light.signing.sign(b"same"));
    }
}
