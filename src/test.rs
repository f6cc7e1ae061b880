use std::{net::SocketAddr, sync::Arc, time::Duration};

use k256::{ProjectivePoint, Secp256k1};
use p256::NistP256;
use rand_core::OsRng;
use smol::net::TcpStream;

use crate::{
    compat::CSCurve,
    constants::SIGNATURE_LEN,
    keygen, keygen_recomputing,
    protocol::{run_two_party_protocol, Participant},
    transport::{request_verification, TransportError},
    AggregationServer, AggregationSession, ClientConfig, KeygenOutput, MasterKey, Parameters,
    SchnorrKeyPair, SelectionEncoding, ServerConfig, ServingContext, Signature, SigningContext,
    Verdict,
    VerifySession,
};

const FIXED_KEY: [u8; 32] = [
    0x54, 0xa2, 0xf8, 0x03, 0x1d, 0x18, 0xac, 0x77, 0xd2, 0x53, 0x92, 0xf2, 0x80, 0xb4, 0xb1, 0x2f,
    0xac, 0xf1, 0x29, 0x3f, 0x3a, 0xe6, 0x77, 0x7d, 0x74, 0x15, 0x67, 0x91, 0x99, 0x53, 0x69, 0xc5,
];

fn run_keygen<C: CSCurve>(params: Parameters) -> KeygenOutput<C> {
    let result = keygen(
        params,
        MasterKey::random(&mut OsRng),
        SchnorrKeyPair::random(&mut OsRng),
    );
    assert!(result.is_ok());
    result.unwrap()
}

/// Verify a serialized signature, with the server running in memory.
///
/// Signatures which don't even decode are invalid.
fn run_verify<C: CSCurve>(
    serving: &Arc<ServingContext<C>>,
    public_key: &C::AffinePoint,
    signature: &[u8],
    message: &[u8],
) -> Verdict {
    let signature = match Signature::<C>::from_bytes(signature) {
        Ok(signature) => signature,
        Err(_) => return Verdict::Invalid,
    };
    let server = Participant::from(0u32);
    let client = Participant::from(1u32);
    let mut aggregation = AggregationSession::new(serving.clone());
    let mut verify = VerifySession::new(server, signature, message, *public_key);
    let (nonce, verdict) =
        run_two_party_protocol(server, client, &mut aggregation, &mut verify).unwrap();
    assert_eq!(nonce, signature.nonce);
    verdict
}

fn loopback_config(round_timeout: Duration) -> ServerConfig {
    ServerConfig {
        bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
        round_timeout,
    }
}

#[test]
fn test_fixed_vector() {
    let key_pair = SchnorrKeyPair::<Secp256k1>::from_secret_bytes(&FIXED_KEY).unwrap();
    let out = keygen(
        Parameters::HIGH_SPEED,
        MasterKey::from_bytes(FIXED_KEY),
        key_pair,
    )
    .unwrap();
    let serving = Arc::new(out.serving);
    let message = [0u8; 32];

    let signature = out.signing.sign(&message).to_bytes();
    assert_eq!(signature.len(), SIGNATURE_LEN);
    assert_eq!(
        run_verify(&serving, &out.public_key, &signature, &message),
        Verdict::Valid
    );

    let mut mutated = message;
    mutated[0] = 1;
    assert_eq!(
        run_verify(&serving, &out.public_key, &signature, &mutated),
        Verdict::Invalid
    );

    // Both signing paths agree on the fixed vector too.
    assert_eq!(
        out.signing.sign_recomputing(&message).to_bytes(),
        signature
    );
}

#[test]
fn test_bit_flips_are_rejected() {
    let out = run_keygen::<Secp256k1>(Parameters::HIGH_SPEED);
    let serving = Arc::new(out.serving);
    let message = b"flip me".to_vec();
    let signature = out.signing.sign(&message).to_bytes();
    assert!(run_verify(&serving, &out.public_key, &signature, &message).is_valid());

    for bit in [0, 7, 8 * 5 + 3, 8 * (message.len() - 1) + 7] {
        let mut flipped = message.clone();
        flipped[bit / 8] ^= 1 << (bit % 8);
        assert_eq!(
            run_verify(&serving, &out.public_key, &signature, &flipped),
            Verdict::Invalid
        );
    }

    // This covers bits of both the nonce and the scalar.
    for bit in [0, 64, 127, 128, 200, 8 * SIGNATURE_LEN - 1] {
        let mut flipped = signature;
        flipped[bit / 8] ^= 1 << (bit % 8);
        assert_eq!(
            run_verify(&serving, &out.public_key, &flipped, &message),
            Verdict::Invalid
        );
    }
}

#[test]
fn test_wrong_public_key_is_rejected() {
    let out = run_keygen::<Secp256k1>(Parameters::HIGH_SPEED);
    let other = SchnorrKeyPair::<Secp256k1>::random(&mut OsRng);
    let serving = Arc::new(out.serving);
    let signature = out.signing.sign(b"hello").to_bytes();
    assert_eq!(
        run_verify(&serving, other.public_key(), &signature, b"hello"),
        Verdict::Invalid
    );
}

#[test]
fn test_commitment_homomorphism() {
    let out = run_keygen::<Secp256k1>(Parameters::HIGH_SPEED);
    for counter in 0..16 {
        let nonce = out.signing.nonce(counter);
        let r = out.signing.commitment_scalar(&nonce);
        assert_eq!(
            out.serving.commitment(&nonce).unwrap(),
            (ProjectivePoint::GENERATOR * r).to_affine()
        );
    }
}

#[test]
fn test_signatures_with_counters() {
    let out = run_keygen::<Secp256k1>(Parameters::HIGH_SPEED);
    let serving = Arc::new(out.serving);
    for counter in 1..4 {
        let signature = out.signing.sign_with_counter(b"counted", counter);
        assert!(run_verify(&serving, &out.public_key, &signature.to_bytes(), b"counted").is_valid());
    }
}

#[test]
fn test_low_storage() {
    let out = run_keygen::<Secp256k1>(Parameters::LOW_STORAGE);
    let serving = Arc::new(out.serving);
    let signature = out.signing.sign_recomputing(b"low storage");
    assert_eq!(signature, out.signing.sign(b"low storage"));
    assert!(run_verify(
        &serving,
        &out.public_key,
        &signature.to_bytes(),
        b"low storage"
    )
    .is_valid());
}

#[test]
fn test_signer_without_tables() {
    let master_key = MasterKey::random(&mut OsRng);
    let key_pair = SchnorrKeyPair::<Secp256k1>::random(&mut OsRng);
    let out = keygen_recomputing(Parameters::LOW_STORAGE, master_key.clone(), key_pair.clone())
        .unwrap();
    assert!(!out.signing.has_tables());
    let serving = Arc::new(out.serving);

    let signer = SigningContext::recomputing(Parameters::LOW_STORAGE, master_key, key_pair).unwrap();
    assert!(!signer.has_tables());
    for counter in 0..3 {
        let signature = signer.sign_with_counter(b"no tables", counter);
        assert_eq!(signature, out.signing.sign_with_counter(b"no tables", counter));
        assert!(run_verify(&serving, signer.public_key(), &signature.to_bytes(), b"no tables").is_valid());
        assert!(!run_verify(&serving, signer.public_key(), &signature.to_bytes(), b"no tablez").is_valid());
    }
}

#[test]
fn test_boundary_parameters() {
    let single_entry = Parameters::new(1, 40, SelectionEncoding::Narrow).unwrap();
    let single_pick = Parameters::new(128, 1, SelectionEncoding::Narrow).unwrap();
    let both = Parameters::new(1, 1, SelectionEncoding::Wide).unwrap();
    for params in [single_entry, single_pick, both] {
        let out = run_keygen::<Secp256k1>(params);
        let serving = Arc::new(out.serving);
        let signature = out.signing.sign(b"boundary");
        assert_eq!(signature, out.signing.sign_recomputing(b"boundary"));
        assert!(run_verify(&serving, &out.public_key, &signature.to_bytes(), b"boundary").is_valid());
        assert!(!run_verify(&serving, &out.public_key, &signature.to_bytes(), b"boundarz").is_valid());
    }
}

#[test]
fn test_p256() {
    let out = run_keygen::<NistP256>(Parameters::HIGH_SPEED);
    let serving = Arc::new(out.serving);
    let signature = out.signing.sign(b"another curve").to_bytes();
    assert!(run_verify(&serving, &out.public_key, &signature, b"another curve").is_valid());
    assert!(!run_verify(&serving, &out.public_key, &signature, b"another curvf").is_valid());
}

#[test]
fn test_serving_context_hand_off() {
    let out = run_keygen::<Secp256k1>(Parameters::HIGH_SPEED);
    let bytes = out.serving.to_bytes().unwrap();
    let serving = Arc::new(ServingContext::<Secp256k1>::from_bytes(&bytes).unwrap());
    assert!(serving.ensure_params(&Parameters::HIGH_SPEED).is_ok());
    assert!(serving.ensure_params(&Parameters::LOW_STORAGE).is_err());
    let signature = out.signing.sign(b"handed off").to_bytes();
    assert!(run_verify(&serving, &out.public_key, &signature, b"handed off").is_valid());
}

#[test]
fn test_loopback_session() {
    let out = run_keygen::<Secp256k1>(Parameters::HIGH_SPEED);
    let signature = out.signing.sign(b"over tcp");
    let public_key = out.public_key;

    smol::block_on(async {
        let server = AggregationServer::bind(
            Arc::new(out.serving),
            loopback_config(Duration::from_secs(5)),
        )
        .await
        .unwrap();
        let addr = server.local_addr().unwrap();

        let client = async {
            let mut stream = TcpStream::connect(addr).await?;
            request_verification(
                &mut stream,
                &signature,
                b"over tcp",
                &public_key,
                &ClientConfig::default(),
            )
            .await
        };
        let (served, verdict) = smol::future::zip(server.serve_one(), client).await;
        assert_eq!(served.unwrap(), signature.nonce);
        assert_eq!(verdict.unwrap(), Verdict::Valid);
    });
}

#[test]
fn test_loopback_timeout() {
    let out = run_keygen::<Secp256k1>(Parameters::HIGH_SPEED);

    smol::block_on(async {
        let server = AggregationServer::bind(
            Arc::new(out.serving),
            loopback_config(Duration::from_millis(100)),
        )
        .await
        .unwrap();
        let addr = server.local_addr().unwrap();

        // Connect, and then never say anything.
        let silent = async {
            let stream = TcpStream::connect(addr).await.unwrap();
            smol::Timer::after(Duration::from_millis(500)).await;
            drop(stream);
        };
        let (served, ()) = smol::future::zip(server.serve_one(), silent).await;
        assert!(matches!(served, Err(TransportError::Timeout { round: 1 })));
    });
}

#[test]
fn test_loopback_server_recovers() {
    let out = run_keygen::<Secp256k1>(Parameters::HIGH_SPEED);
    let public_key = out.public_key;
    let server = smol::block_on(AggregationServer::bind(
        Arc::new(out.serving),
        loopback_config(Duration::from_secs(5)),
    ))
    .unwrap();
    let addr = server.local_addr().unwrap();
    let task = smol::spawn({
        let server = server.clone();
        async move { server.serve().await }
    });

    // A client sending garbage only ruins its own session.
    smol::block_on(async {
        use smol::io::AsyncWriteExt;
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(&[0u8; 5]).await.unwrap();
    });

    let config = ClientConfig::default();
    let signature = out.signing.sign(b"first");
    assert_eq!(
        crate::verify_remote(addr, &signature, b"first", &public_key, &config).unwrap(),
        Verdict::Valid
    );
    assert_eq!(
        crate::verify_remote(addr, &signature, b"second", &public_key, &config).unwrap(),
        Verdict::Invalid
    );
    drop(task);
}

#[test]
fn test_loopback_concurrent_sessions() {
    let out = run_keygen::<Secp256k1>(Parameters::HIGH_SPEED);
    let public_key = out.public_key;
    let server = smol::block_on(AggregationServer::bind(
        Arc::new(out.serving),
        loopback_config(Duration::from_secs(5)),
    ))
    .unwrap();
    let addr = server.local_addr().unwrap();
    let task = smol::spawn(async move { server.serve_concurrent().await });

    let handles: Vec<_> = (0..4u64)
        .map(|counter| {
            let signature = out.signing.sign_with_counter(b"concurrent", counter);
            std::thread::spawn(move || {
                crate::verify_remote(
                    addr,
                    &signature,
                    b"concurrent",
                    &public_key,
                    &ClientConfig::default(),
                )
            })
        })
        .collect();
    for handle in handles {
        assert_eq!(handle.join().unwrap().unwrap(), Verdict::Valid);
    }
    drop(task);
}
