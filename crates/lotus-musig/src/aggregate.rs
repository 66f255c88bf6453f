//! MuSig2 (BIP-327) key/nonce/partial-signature aggregation.
//!
//! This orchestrates the two signing rounds; the curve arithmetic itself
//! (key-aggregation coefficients, nonce-coefficient tagged hash, the
//! BIP-340 challenge) is the `musig2` crate's responsibility — it is the
//! `Crypto` capability's underlying library, the same one `secp256k1`
//! backs everywhere else in this workspace.

use bitcoin::secp256k1::PublicKey as BtcPublicKey;
use musig2::{AggNonce, KeyAggContext, LiftedSignature, PartialSignature, PubNonce, SecNonce};

use crate::error::MusigError;
use lotus_primitives::PublicKeyBytes;

fn pubkey_to_musig(pk: &BtcPublicKey) -> Result<musig2::secp256k1::PublicKey, MusigError> {
    musig2::secp256k1::PublicKey::from_slice(&pk.serialize())
        .map_err(|e| MusigError::KeyAggregation(format!("pubkey conversion: {e}")))
}

fn seckey_to_musig(
    sk: &bitcoin::secp256k1::SecretKey,
) -> Result<musig2::secp256k1::SecretKey, MusigError> {
    #[allow(deprecated)]
    musig2::secp256k1::SecretKey::from_slice(&sk.secret_bytes())
        .map_err(|e| MusigError::Signing(format!("seckey conversion: {e}")))
}

/// Aggregate N signer public keys. The caller is responsible for passing
/// them in the canonical sorted order (§4.1) — this function does not
/// re-sort, since the session layer owns that ordering and needs it to be
/// stable across key aggregation and session-id derivation alike.
pub fn key_agg(signers: &[BtcPublicKey]) -> Result<(KeyAggContext, PublicKeyBytes), MusigError> {
    if signers.len() < 2 {
        return Err(MusigError::TooFewSigners(signers.len()));
    }
    let musig_keys: Vec<_> = signers
        .iter()
        .map(pubkey_to_musig)
        .collect::<Result<_, _>>()?;

    let ctx = KeyAggContext::new(musig_keys)
        .map_err(|e| MusigError::KeyAggregation(format!("key aggregation: {e}")))?;

    let agg_pk: musig2::secp256k1::PublicKey = ctx.aggregated_pubkey();
    Ok((ctx, PublicKeyBytes(agg_pk.serialize())))
}

/// Apply the BIP-341 unspendable-script-path taproot tweak to an existing
/// key-aggregation context, yielding the on-chain output key.
pub fn apply_taproot_tweak(
    ctx: KeyAggContext,
) -> Result<(KeyAggContext, PublicKeyBytes), MusigError> {
    let tweaked = ctx
        .with_unspendable_taproot_tweak()
        .map_err(|e| MusigError::KeyAggregation(format!("taproot tweak: {e}")))?;
    let agg_pk: musig2::secp256k1::PublicKey = tweaked.aggregated_pubkey();
    Ok((tweaked, PublicKeyBytes(agg_pk.serialize())))
}

/// Generate a fresh nonce pair. The `SecNonce` half must be used exactly
/// once and then dropped; reuse across messages leaks the private key.
pub fn generate_nonce(
    seckey: &bitcoin::secp256k1::SecretKey,
    key_agg_ctx: &KeyAggContext,
    message: &[u8; 32],
) -> Result<(SecNonce, PubNonce), MusigError> {
    let sk_m = seckey_to_musig(seckey)?;
    let agg_pk: musig2::secp256k1::PublicKey = key_agg_ctx.aggregated_pubkey();

    let mut nonce_seed = [0u8; 32];
    rand::RngCore::fill_bytes(&mut rand::rngs::OsRng, &mut nonce_seed);

    let secnonce = SecNonce::build(nonce_seed)
        .with_seckey(sk_m)
        .with_aggregated_pubkey(agg_pk)
        .with_message(message)
        .build();
    let pubnonce = secnonce.public_nonce();

    Ok((secnonce, pubnonce))
}

/// Sum public nonces across all signers into the session's aggregate nonce.
pub fn aggregate_nonces(pubnonces: &[PubNonce]) -> AggNonce {
    AggNonce::sum(pubnonces)
}

/// Produce this signer's partial signature. Consumes the `SecNonce` so it
/// cannot accidentally be reused by the caller.
pub fn partial_sign(
    seckey: &bitcoin::secp256k1::SecretKey,
    secnonce: SecNonce,
    key_agg_ctx: &KeyAggContext,
    agg_nonce: &AggNonce,
    message: &[u8; 32],
) -> Result<PartialSignature, MusigError> {
    let sk_m = seckey_to_musig(seckey)?;
    musig2::sign_partial(key_agg_ctx, sk_m, secnonce, agg_nonce, message)
        .map_err(|e| MusigError::Signing(format!("partial sign: {e}")))
}

/// Verify one signer's partial signature against their claimed public
/// nonce and public key, before it is ever stored in the session.
pub fn verify_partial_signature(
    key_agg_ctx: &KeyAggContext,
    partial_sig: &PartialSignature,
    agg_nonce: &AggNonce,
    signer_pubkey: &BtcPublicKey,
    signer_pubnonce: &PubNonce,
    message: &[u8; 32],
) -> bool {
    let pk_m = match pubkey_to_musig(signer_pubkey) {
        Ok(pk) => pk,
        Err(_) => return false,
    };
    musig2::verify_partial(
        key_agg_ctx,
        *partial_sig,
        agg_nonce,
        pk_m,
        signer_pubnonce,
        message,
    )
    .is_ok()
}

/// Sum verified partial signatures into the final Schnorr signature.
pub fn aggregate_signatures(
    key_agg_ctx: &KeyAggContext,
    agg_nonce: &AggNonce,
    partial_sigs: &[PartialSignature],
    message: &[u8; 32],
) -> Result<[u8; 64], MusigError> {
    let sig: LiftedSignature = musig2::aggregate_partial_signatures(
        key_agg_ctx,
        agg_nonce,
        partial_sigs.iter().copied(),
        message,
    )
    .map_err(|e| MusigError::Signing(format!("signature aggregation: {e}")))?;
    Ok(sig.serialize())
}

/// Verify a final aggregated Schnorr signature against the aggregate
/// x-only public key, using the single-signer Schnorr verifier — by
/// construction the result is indistinguishable from a single-party
/// signature.
pub fn verify_aggregated_signature(
    aggregated: &PublicKeyBytes,
    signature: &[u8; 64],
    message: &[u8; 32],
) -> bool {
    let secp = bitcoin::secp256k1::Secp256k1::verification_only();
    let sig = match bitcoin::secp256k1::schnorr::Signature::from_slice(signature) {
        Ok(s) => s,
        Err(_) => return false,
    };
    let msg = bitcoin::secp256k1::Message::from_digest(*message);
    let full_pk = match bitcoin::secp256k1::PublicKey::from_slice(&aggregated.0) {
        Ok(pk) => pk,
        Err(_) => return false,
    };
    let (xonly, _parity) = full_pk.x_only_public_key();
    secp.verify_schnorr(&sig, &msg, &xonly).is_ok()
}

pub fn pubnonce_to_bytes(pubnonce: &PubNonce) -> [u8; 66] {
    pubnonce.serialize()
}

pub fn pubnonce_from_bytes(bytes: &[u8; 66]) -> Result<PubNonce, MusigError> {
    PubNonce::from_bytes(bytes).map_err(|e| MusigError::Serialization(format!("pubnonce: {e}")))
}

pub fn partial_sig_to_bytes(sig: &PartialSignature) -> [u8; 32] {
    sig.serialize()
}

pub fn partial_sig_from_bytes(bytes: &[u8; 32]) -> Result<PartialSignature, MusigError> {
    PartialSignature::from_slice(bytes)
        .map_err(|e| MusigError::Serialization(format!("partial sig: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitcoin::secp256k1::{PublicKey, Secp256k1, SecretKey};

    fn test_keypair(seed_byte: u8) -> (SecretKey, PublicKey) {
        let secp = Secp256k1::new();
        let mut bytes = [0u8; 32];
        bytes[31] = seed_byte;
        bytes[0] = 0x01;
        let sk = SecretKey::from_slice(&bytes).unwrap();
        let pk = sk.public_key(&secp);
        (sk, pk)
    }

    #[test]
    fn key_agg_is_deterministic_and_differs_from_members() {
        let (_sk1, pk1) = test_keypair(1);
        let (_sk2, pk2) = test_keypair(42);
        let (_sk3, pk3) = test_keypair(7);

        let (_ctx, agg1) = key_agg(&[pk1, pk2, pk3]).unwrap();
        let (_ctx2, agg2) = key_agg(&[pk1, pk2, pk3]).unwrap();
        assert_eq!(agg1, agg2);

        assert_ne!(agg1.0, pk1.serialize());
        assert_ne!(agg1.0, pk2.serialize());
        assert_ne!(agg1.0, pk3.serialize());
    }

    #[test]
    fn too_few_signers_rejected() {
        let (_sk, pk) = test_keypair(1);
        assert_eq!(key_agg(&[pk]).unwrap_err(), MusigError::TooFewSigners(1));
    }

    #[test]
    fn three_of_three_full_signing_roundtrip() {
        let keys: Vec<_> = [1u8, 42, 7].iter().map(|b| test_keypair(*b)).collect();
        let pubs: Vec<_> = keys.iter().map(|(_, pk)| *pk).collect();

        let (ctx, agg) = key_agg(&pubs).unwrap();
        let message = [0xABu8; 32];

        let mut secnonces = Vec::new();
        let mut pubnonces = Vec::new();
        for (sk, _) in &keys {
            let (sn, pn) = generate_nonce(sk, &ctx, &message).unwrap();
            secnonces.push(sn);
            pubnonces.push(pn);
        }
        let agg_nonce = aggregate_nonces(&pubnonces);

        let mut partials = Vec::new();
        for (i, (sk, pk)) in keys.iter().enumerate() {
            let secnonce = secnonces.remove(0);
            let partial = partial_sign(sk, secnonce, &ctx, &agg_nonce, &message).unwrap();
            assert!(verify_partial_signature(
                &ctx,
                &partial,
                &agg_nonce,
                pk,
                &pubnonces[i],
                &message
            ));
            partials.push(partial);
        }

        let final_sig = aggregate_signatures(&ctx, &agg_nonce, &partials, &message).unwrap();
        assert!(verify_aggregated_signature(&agg, &final_sig, &message));
    }

    #[test]
    fn taproot_tweak_changes_the_output_key() {
        let (_sk1, pk1) = test_keypair(1);
        let (_sk2, pk2) = test_keypair(42);
        let (ctx, internal) = key_agg(&[pk1, pk2]).unwrap();
        let (_tweaked_ctx, output) = apply_taproot_tweak(ctx).unwrap();
        assert_ne!(internal, output);
    }

    #[test]
    fn mismatched_messages_fail_aggregation() {
        let (sk1, pk1) = test_keypair(1);
        let (sk2, pk2) = test_keypair(42);
        let (ctx, _agg) = key_agg(&[pk1, pk2]).unwrap();

        let message = [0xABu8; 32];
        let other_message = [0xFFu8; 32];

        let (sn1, pn1) = generate_nonce(&sk1, &ctx, &message).unwrap();
        let (sn2, pn2) = generate_nonce(&sk2, &ctx, &message).unwrap();
        let agg_nonce = aggregate_nonces(&[pn1, pn2]);

        let p1 = partial_sign(&sk1, sn1, &ctx, &agg_nonce, &message).unwrap();
        let p2 = partial_sign(&sk2, sn2, &ctx, &agg_nonce, &other_message).unwrap();

        assert!(aggregate_signatures(&ctx, &agg_nonce, &[p1, p2], &message).is_err());
    }

    #[test]
    fn pubnonce_and_partial_sig_serialization_roundtrip() {
        let (sk1, pk1) = test_keypair(1);
        let (_sk2, pk2) = test_keypair(42);
        let (ctx, _agg) = key_agg(&[pk1, pk2]).unwrap();
        let message = [0xABu8; 32];

        let (secnonce, pubnonce) = generate_nonce(&sk1, &ctx, &message).unwrap();
        let pn_bytes = pubnonce_to_bytes(&pubnonce);
        assert_eq!(pubnonce_from_bytes(&pn_bytes).unwrap().serialize(), pn_bytes);

        let agg_nonce = aggregate_nonces(&[pubnonce]);
        let partial = partial_sign(&sk1, secnonce, &ctx, &agg_nonce, &message).unwrap();
        let p_bytes = partial_sig_to_bytes(&partial);
        assert_eq!(
            partial_sig_from_bytes(&p_bytes).unwrap().serialize(),
            p_bytes
        );
    }

    #[test]
    fn tampered_partial_sig_fails_verification() {
        let (sk1, pk1) = test_keypair(1);
        let (sk2, pk2) = test_keypair(42);
        let (ctx, _agg) = key_agg(&[pk1, pk2]).unwrap();
        let message = [0xABu8; 32];

        let (sn1, pn1) = generate_nonce(&sk1, &ctx, &message).unwrap();
        let (sn2, pn2) = generate_nonce(&sk2, &ctx, &message).unwrap();
        let agg_nonce = aggregate_nonces(&[pn1.clone(), pn2]);

        let p1 = partial_sign(&sk1, sn1, &ctx, &agg_nonce, &message).unwrap();
        let mut tampered_bytes = partial_sig_to_bytes(&p1);
        tampered_bytes[31] ^= 0xFF;
        // A tampered scalar may or may not parse; if it does, it must not verify.
        if let Ok(tampered) = partial_sig_from_bytes(&tampered_bytes) {
            assert!(!verify_partial_signature(
                &ctx,
                &tampered,
                &agg_nonce,
                &pk1,
                &pn1,
                &message
            ));
        }
        let _ = sn2;
    }
}
