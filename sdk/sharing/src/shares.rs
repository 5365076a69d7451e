//! Shamir Secret Sharing over GF(2^61 - 1)
//!
//! K-of-N sharing of a single field element.

use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::field::Fp;

/// A share identifier (1-indexed, doubles as the evaluation point)
pub type ShareId = u8;

/// A secret share
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Share {
    /// Share identifier (1 to N)
    pub id: ShareId,
    /// Polynomial evaluated at `id`
    pub value: Fp,
}

impl Share {
    pub fn new(id: ShareId, value: Fp) -> Self {
        Self { id, value }
    }
}

/// Secret-sharing errors
#[derive(Debug, Error)]
pub enum SharingError {
    #[error("insufficient shares: got {got}, need {need}")]
    InsufficientShares { got: usize, need: usize },

    #[error("invalid threshold: k={k}, n={n}")]
    InvalidThreshold { k: usize, n: usize },

    #[error("no contribution from party {0}")]
    UnknownParty(u32),

    #[error("scalar {0} has no inverse in the field")]
    NonInvertible(i64),

    #[error("operand holder mismatch: {left} vs {right}")]
    HolderMismatch { left: usize, right: usize },

    #[error("plaintext {0} is outside the field's signed range")]
    OutOfRange(i64),

    #[error("plaintext arithmetic overflow")]
    Overflow,

    #[error("sharing backend closed")]
    Closed,
}

/// Split a secret into `total` shares, any `threshold` of which reconstruct it
///
/// f(x) = secret + a1*x + ... + a_{k-1}*x^{k-1}, evaluated at x = 1..=N
pub fn split_secret<R: Rng + ?Sized>(
    secret: Fp,
    threshold: usize,
    total: usize,
    rng: &mut R,
) -> Result<Vec<Share>, SharingError> {
    if threshold > total || threshold == 0 || total == 0 || total > 255 {
        return Err(SharingError::InvalidThreshold {
            k: threshold,
            n: total,
        });
    }

    let mut coeffs = vec![secret];
    coeffs.extend((1..threshold).map(|_| Fp::random(rng)));

    let shares = (1..=total as u8)
        .map(|id| {
            let x = Fp::new(id as u64);
            // Horner from the highest coefficient down
            let y = coeffs
                .iter()
                .rev()
                .fold(Fp::ZERO, |acc, coeff| acc * x + *coeff);
            Share::new(id, y)
        })
        .collect();

    Ok(shares)
}

/// Combine `threshold` shares with Lagrange interpolation at x = 0
pub fn combine_shares(shares: &[Share], threshold: usize) -> Result<Fp, SharingError> {
    if shares.len() < threshold || threshold == 0 {
        return Err(SharingError::InsufficientShares {
            got: shares.len(),
            need: threshold.max(1),
        });
    }

    let shares = &shares[..threshold];
    let mut secret = Fp::ZERO;

    for (i, share_i) in shares.iter().enumerate() {
        let xi = Fp::new(share_i.id as u64);

        // Li(0) = prod (0 - xj) / (xi - xj)
        let mut numerator = Fp::ONE;
        let mut denominator = Fp::ONE;
        for (j, share_j) in shares.iter().enumerate() {
            if i != j {
                let xj = Fp::new(share_j.id as u64);
                numerator = numerator * (-xj);
                denominator = denominator * (xi - xj);
            }
        }

        // duplicate ids leave a zero denominator
        let li = numerator * denominator.inv().ok_or(SharingError::InsufficientShares {
            got: shares.len() - 1,
            need: threshold,
        })?;
        secret = secret + share_i.value * li;
    }

    Ok(secret)
}
