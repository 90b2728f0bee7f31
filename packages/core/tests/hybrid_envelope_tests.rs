//! Integration tests for the hybrid envelope pipeline
//!
//! This test suite covers:
//! - KeyManager + HybridKeyAgreement + MessageCipher + DualEnvelopeProtocol end to end
//! - Round trip and tamper detection properties
//! - Missing-key safety
//! - Backward compatibility with untagged legacy envelopes

use construct_hybrid_core::crypto::format::{EnvelopeFormat, Provenance};
use construct_hybrid_core::crypto::handshake::{HybridKeyAgreement, SecretCombiner};
use construct_hybrid_core::crypto::keys::{IdentityKeyPair, KeyManager};
use construct_hybrid_core::crypto::provider::CryptoProvider;
use construct_hybrid_core::crypto::session_api::{DualEnvelopeProtocol, EnvelopeRole};
use construct_hybrid_core::crypto::suites::hybrid::HybridSuiteProvider;
use construct_hybrid_core::error::CryptoError;
use construct_hybrid_core::protocol::envelope::{DualEnvelope, HybridEnvelope};
use construct_hybrid_core::protocol::wire;
use construct_hybrid_core::storage::memory::MemoryKeyStore;
use construct_hybrid_core::storage::traits::UserId;
use proptest::prelude::*;
use std::sync::{Arc, OnceLock};

type P = HybridSuiteProvider;
type Manager = KeyManager<MemoryKeyStore, P>;
type Protocol = DualEnvelopeProtocol<MemoryKeyStore, P>;

struct Setup {
    protocol: Protocol,
    alice: IdentityKeyPair,
    bob: IdentityKeyPair,
}

fn alice_id() -> UserId {
    UserId::new("alice")
}

fn bob_id() -> UserId {
    UserId::new("bob")
}

fn setup() -> Setup {
    let manager = Arc::new(Manager::new(MemoryKeyStore::new()));
    let alice = Manager::generate_identity_key_pair().unwrap();
    let bob = Manager::generate_identity_key_pair().unwrap();
    manager.store_identity(&alice_id(), &alice).unwrap();
    manager.store_identity(&bob_id(), &bob).unwrap();

    Setup {
        protocol: Protocol::with_format(manager, EnvelopeFormat::SecretBox).unwrap(),
        alice,
        bob,
    }
}

/// Shared fixture for property tests (ML-KEM keygen per case is wasteful)
fn shared() -> &'static Setup {
    static SETUP: OnceLock<Setup> = OnceLock::new();
    SETUP.get_or_init(setup)
}

/// Scenario 1: both halves of a dual envelope decrypt to the original text
#[test]
fn test_scenario_dual_envelope_roundtrip() {
    let s = setup();

    let env = s
        .protocol
        .package_for_send("hello world", &s.alice.public_keys(), &s.bob.public_keys())
        .unwrap();

    let for_bob = s
        .protocol
        .unpackage_for_read(&env, EnvelopeRole::Recipient, &bob_id())
        .unwrap();
    assert_eq!(for_bob.plaintext, "hello world");

    let for_alice = s
        .protocol
        .unpackage_for_read(&env, EnvelopeRole::Sender, &alice_id())
        .unwrap();
    assert_eq!(for_alice.plaintext, "hello world");
}

/// Scenario 2: flipping the last ciphertext byte is an authentication failure
#[test]
fn test_scenario_tampered_ciphertext_rejected() {
    let s = setup();
    let mut env = s
        .protocol
        .package_for_send("hello world", &s.alice.public_keys(), &s.bob.public_keys())
        .unwrap();

    let last = env.for_recipient.ciphertext.len() - 1;
    env.for_recipient.ciphertext[last] ^= 0x01;

    let result = s
        .protocol
        .unpackage_for_read(&env, EnvelopeRole::Recipient, &bob_id());
    assert!(
        matches!(result, Err(CryptoError::AuthenticationFailure(_))),
        "Tampered envelope must not open: {:?}",
        result
    );
}

/// Scenario 3: after clearKeys, decrypt attempts raise KeyNotFound
#[test]
fn test_scenario_cleared_keys_raise_key_not_found() {
    let s = setup();
    let env = s
        .protocol
        .package_for_send("hello world", &s.alice.public_keys(), &s.bob.public_keys())
        .unwrap();

    let keys = s.protocol.key_manager();
    keys.clear_keys(&alice_id()).unwrap();
    assert!(!keys.has_keys(&alice_id()));

    let result = s
        .protocol
        .unpackage_for_read(&env, EnvelopeRole::Sender, &alice_id());
    assert!(matches!(result, Err(CryptoError::KeyNotFound(_))));

    // Bob is unaffected
    assert!(s
        .protocol
        .unpackage_for_read(&env, EnvelopeRole::Recipient, &bob_id())
        .is_ok());
}

/// encapsulate and decapsulate agree for both combiners
#[test]
fn test_agreement_symmetry_with_stored_keys() {
    let s = shared();
    let keys = s.protocol.key_manager();
    let pq_private = keys.get_pq_private_key(&bob_id()).unwrap().unwrap();
    let classical_private = keys.get_classical_private_key(&bob_id()).unwrap().unwrap();

    for combiner in [SecretCombiner::Xor, SecretCombiner::HkdfSha256] {
        let agreement = HybridKeyAgreement::<P>::new(combiner);
        let sent = agreement
            .encapsulate(&s.bob.pq.public, &s.bob.classical.public)
            .unwrap();
        let received = agreement
            .decapsulate(
                &sent.capsule,
                &sent.ephemeral_public,
                &pq_private,
                &classical_private,
            )
            .unwrap();
        assert_eq!(received, sent.final_key, "combiner {:?}", combiner);
    }
}

/// An untagged envelope produced with the bare stream cipher is still readable
#[test]
fn test_untagged_legacy_envelope_is_readable() {
    let s = shared();
    let agreement = HybridKeyAgreement::<P>::new(SecretCombiner::Xor);
    let sent = agreement
        .encapsulate(&s.bob.pq.public, &s.bob.classical.public)
        .unwrap();

    let nonce = P::generate_nonce(P::nonce_len());
    let ciphertext = P::stream_xor(sent.final_key.as_bytes(), &nonce, "сообщение 2023".as_bytes()).unwrap();
    let legacy = HybridEnvelope {
        ciphertext,
        nonce,
        ephemeral_public_key: sent.ephemeral_public,
        kem_capsule: sent.capsule,
        version: None,
    };

    let message = s
        .protocol
        .read_stored_content(&legacy.to_json().unwrap(), EnvelopeRole::Recipient, &bob_id())
        .unwrap();
    assert_eq!(message.plaintext, "сообщение 2023");
    assert_eq!(message.provenance, Provenance::Legacy);
}

/// Envelopes survive JSON storage and MessagePack transport unchanged
#[test]
fn test_envelope_survives_json_and_wire() {
    let s = shared();
    let env = s
        .protocol
        .package_for_send("over the wire", &s.alice.public_keys(), &s.bob.public_keys())
        .unwrap();

    let from_json = DualEnvelope::from_json(&env.to_json().unwrap()).unwrap();
    let from_wire = wire::unpack_envelope(&wire::pack_envelope(&env).unwrap()).unwrap();
    assert_eq!(from_json, env);
    assert_eq!(from_wire, env);

    let message = s
        .protocol
        .unpackage_for_read(&from_wire, EnvelopeRole::Recipient, &bob_id())
        .unwrap();
    assert_eq!(message.plaintext, "over the wire");
}

#[derive(Debug, Clone, Copy)]
enum Field {
    Ciphertext,
    Nonce,
    KemCapsule,
}

fn field_strategy() -> impl Strategy<Value = Field> {
    prop_oneof![
        Just(Field::Ciphertext),
        Just(Field::Nonce),
        Just(Field::KemCapsule),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Any text, including empty and multi-byte, round-trips through both halves
    #[test]
    fn prop_roundtrip(text in "\\PC{0,200}") {
        let s = shared();
        let env = s
            .protocol
            .package_for_send(&text, &s.alice.public_keys(), &s.bob.public_keys())
            .unwrap();

        let for_bob = s.protocol.unpackage_for_read(&env, EnvelopeRole::Recipient, &bob_id()).unwrap();
        let for_alice = s.protocol.unpackage_for_read(&env, EnvelopeRole::Sender, &alice_id()).unwrap();

        prop_assert_eq!(&for_bob.plaintext, &text);
        prop_assert_eq!(&for_alice.plaintext, &text);
        prop_assert_eq!(for_bob.provenance, Provenance::Authenticated);
        prop_assert_ne!(&env.for_recipient.nonce, &env.for_sender.nonce);
        prop_assert_ne!(&env.for_recipient.ephemeral_public_key, &env.for_sender.ephemeral_public_key);
    }

    /// A single flipped bit in ciphertext, nonce or capsule never yields plaintext
    #[test]
    fn prop_single_bit_flip_is_rejected(
        field in field_strategy(),
        position in any::<prop::sample::Index>(),
        bit in 0u8..8,
    ) {
        let s = shared();
        let mut env = s
            .protocol
            .package_for_send("tamper me", &s.alice.public_keys(), &s.bob.public_keys())
            .unwrap();

        let target = match field {
            Field::Ciphertext => &mut env.for_recipient.ciphertext,
            Field::Nonce => &mut env.for_recipient.nonce,
            Field::KemCapsule => &mut env.for_recipient.kem_capsule,
        };
        let index = position.index(target.len());
        target[index] ^= 1 << bit;

        let result = s.protocol.unpackage_for_read(&env, EnvelopeRole::Recipient, &bob_id());
        prop_assert!(
            matches!(
                result,
                Err(CryptoError::AuthenticationFailure(_)) | Err(CryptoError::Decapsulation(_))
            ),
            "field {:?} byte {} bit {} produced {:?}",
            field,
            index,
            bit,
            result
        );
    }
}
