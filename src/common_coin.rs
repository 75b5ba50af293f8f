/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Pluggable common-coin provider.
//!
//! The common coin is the only source of randomness in binary agreement. Every AUX vote carries a
//! [share](SignatureShare) over a seed that depends on the instance and round (see [`coin_seed`]).
//! Once an instance has collected a strong quorum of AUX votes it combines their shares into a single
//! [signature](CombinedSignature) and reduces it to one bit.
//!
//! For agreement to work, a provider must satisfy two properties:
//! 1. **Determinism**: combining any sufficiently large set of valid shares for a seed must produce the
//!    same signature, and so the same bit, on every correct replica.
//! 2. **Unpredictability**: nobody can compute the bit before enough shares have been released. This
//!    is what guarantees termination against an adversarial scheduler, and is normally obtained from
//!    threshold BLS signatures.
//!
//! [`Ed25519Coin`] is a reference provider that only has the first property.

use std::collections::{BTreeMap, BTreeSet};

use crate::types::{
    crypto_primitives::{CryptoHasher, Digest, Keypair, Signature, SigningKey, Verifier, VerifyingKey},
    data_types::{ChainID, CombinedSignature, CryptoHash, NodeCount, ParticipantIndex, Round, SignatureShare},
    protocol_key::ProtocolKey,
    quorum::weak_quorum,
};

const COIN_SEED_DOMAIN: &[u8] = b"abba-common-coin-seed";
const COIN_VALUE_DOMAIN: &[u8] = b"abba-common-coin-value";

pub trait CommonCoin: Send + 'static {
    /// Produce this replica's share over `seed`.
    fn sign_share(&self, seed: &CryptoHash) -> SignatureShare;

    /// Check that `share` is a valid share over `seed` produced by `sender`.
    fn verify_share(&self, seed: &CryptoHash, sender: ParticipantIndex, share: &SignatureShare) -> bool;

    /// Combine `shares` (at most one per sender) into a signature over `seed`.
    fn combine_shares(
        &self,
        seed: &CryptoHash,
        shares: &[(ParticipantIndex, SignatureShare)],
    ) -> Result<CombinedSignature, CoinError>;

    /// Reduce a combined signature into the coin's value.
    fn signature_to_bit(&self, signature: &CombinedSignature) -> bool;
}

/// Compute the seed that AUX votes for `round` of the instance identified by `key` sign over.
///
/// The proposer index is part of the seed so that sibling instances at the same height flip
/// independent coins.
pub fn coin_seed(chain_id: ChainID, key: &ProtocolKey, round: Round) -> CryptoHash {
    let mut hasher = CryptoHasher::new();
    hasher.update(COIN_SEED_DOMAIN);
    for field in [chain_id.int(), key.height.int(), key.proposer.int(), round.int()] {
        hasher.update(field.to_le_bytes());
    }
    CryptoHash::new(hasher.finalize().into())
}

#[derive(Debug, PartialEq, Eq)]
pub enum CoinError {
    NotEnoughShares { have: u64, need: u64 },
    InvalidShare { sender: ParticipantIndex },
}

/// Reference [`CommonCoin`] built on Ed25519 signatures.
///
/// Shares are Ed25519 signatures over the seed, checked against the sender's verifying key. Combining
/// requires `⌊N/3⌋ + 1` valid shares from distinct participants, so at least one correct participant
/// has reached the round, and yields a digest of the seed alone. The resulting bit is identical on all
/// replicas regardless of which shares were combined, but it is predictable by anyone who knows the
/// seed. Use it for tests and for deployments that accept a predictable coin; otherwise plug in a
/// threshold-signature provider.
pub struct Ed25519Coin {
    keypair: Keypair,
    participants: BTreeMap<ParticipantIndex, VerifyingKey>,
    threshold: u64,
}

impl Ed25519Coin {
    /// Create a coin that signs with `signing_key` and verifies shares against `participants`.
    pub fn new(signing_key: SigningKey, participants: BTreeMap<ParticipantIndex, VerifyingKey>) -> Self {
        let threshold = weak_quorum(NodeCount::new(participants.len() as u64));
        Self {
            keypair: Keypair::new(signing_key),
            participants,
            threshold,
        }
    }

    /// Get the verifying key that other replicas must use to check this replica's shares.
    pub fn verifying_key(&self) -> VerifyingKey {
        self.keypair.public()
    }

    /// Number of distinct valid shares that [`combine_shares`](CommonCoin::combine_shares) needs.
    pub fn threshold(&self) -> u64 {
        self.threshold
    }
}

impl CommonCoin for Ed25519Coin {
    fn sign_share(&self, seed: &CryptoHash) -> SignatureShare {
        self.keypair.sign(&seed.bytes())
    }

    fn verify_share(&self, seed: &CryptoHash, sender: ParticipantIndex, share: &SignatureShare) -> bool {
        let Some(verifying_key) = self.participants.get(&sender) else {
            return false;
        };
        match Signature::from_slice(share.bytes()) {
            Ok(signature) => verifying_key.verify(&seed.bytes(), &signature).is_ok(),
            Err(_) => false,
        }
    }

    fn combine_shares(
        &self,
        seed: &CryptoHash,
        shares: &[(ParticipantIndex, SignatureShare)],
    ) -> Result<CombinedSignature, CoinError> {
        let mut signers = BTreeSet::new();
        for (sender, share) in shares {
            if !self.verify_share(seed, *sender, share) {
                return Err(CoinError::InvalidShare { sender: *sender });
            }
            signers.insert(*sender);
        }

        if (signers.len() as u64) < self.threshold {
            return Err(CoinError::NotEnoughShares {
                have: signers.len() as u64,
                need: self.threshold,
            });
        }

        let mut hasher = CryptoHasher::new();
        hasher.update(COIN_VALUE_DOMAIN);
        hasher.update(seed.bytes());
        Ok(CombinedSignature::new(hasher.finalize().to_vec()))
    }

    fn signature_to_bit(&self, signature: &CombinedSignature) -> bool {
        signature_parity(signature)
    }
}

/// `true` if the first byte of `signature` is even.
pub fn signature_parity(signature: &CombinedSignature) -> bool {
    signature
        .bytes()
        .first()
        .map(|byte| byte % 2 == 0)
        .unwrap_or(false)
}
