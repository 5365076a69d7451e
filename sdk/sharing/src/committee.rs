//! Local Committee
//!
//! In-process stand-in for a K-of-N share-holding committee. Every submitted
//! value is Shamir-split across the holders; the engine only ever sees
//! [`SharedValue`]s and reconstruction happens inside `open`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use futures::FutureExt;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::backend::{PartyId, RevealHandle, Revealed, SharingBackend};
use crate::field::Fp;
use crate::shares::{Share, SharingError, combine_shares, split_secret};

/// Committee configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitteeConfig {
    /// Threshold K: minimum holders needed to open
    pub threshold: usize,
    /// Total holders N
    pub holders: usize,
    /// Party entitled to receive opened values
    pub analyst: PartyId,
}

impl CommitteeConfig {
    pub fn new(threshold: usize, holders: usize, analyst: PartyId) -> Self {
        Self {
            threshold,
            holders,
            analyst,
        }
    }

    /// Check if config is valid
    pub fn is_valid(&self) -> bool {
        self.threshold > 0 && self.threshold <= self.holders && self.holders <= 255
    }
}

/// One secret value as held across the committee (one share per holder)
#[derive(Debug, Clone)]
pub struct SharedValue {
    shares: Arc<[Share]>,
}

impl SharedValue {
    pub fn holders(&self) -> usize {
        self.shares.len()
    }

    fn zip_with(
        &self,
        other: &SharedValue,
        op: impl Fn(Fp, Fp) -> Fp,
    ) -> Result<SharedValue, SharingError> {
        if self.shares.len() != other.shares.len() {
            return Err(SharingError::HolderMismatch {
                left: self.shares.len(),
                right: other.shares.len(),
            });
        }
        let shares = self
            .shares
            .iter()
            .zip(other.shares.iter())
            .map(|(a, b)| Share::new(a.id, op(a.value, b.value)))
            .collect();
        Ok(SharedValue { shares })
    }
}

/// In-process committee backend
pub struct LocalCommittee {
    config: CommitteeConfig,
    inbox: Mutex<HashMap<PartyId, Vec<SharedValue>>>,
}

impl LocalCommittee {
    pub fn new(config: CommitteeConfig) -> Result<Self, SharingError> {
        if !config.is_valid() {
            return Err(SharingError::InvalidThreshold {
                k: config.threshold,
                n: config.holders,
            });
        }
        Ok(Self {
            config,
            inbox: Mutex::new(HashMap::new()),
        })
    }

    pub fn config(&self) -> &CommitteeConfig {
        &self.config
    }

    /// Split a party's plaintext vector across the holders.
    ///
    /// Every value must lie within `±MAX_PLAINTEXT`. Replaces any earlier
    /// submission by the same party.
    pub fn submit(&self, party: PartyId, values: &[i64]) -> Result<(), SharingError> {
        let mut rng = rand::thread_rng();
        let shared = values
            .iter()
            .map(|&v| {
                let secret = Fp::try_from_i64(v).ok_or(SharingError::OutOfRange(v))?;
                split_secret(
                    secret,
                    self.config.threshold,
                    self.config.holders,
                    &mut rng,
                )
                .map(|shares| SharedValue {
                    shares: shares.into(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        debug!(party, len = shared.len(), "committee accepted submission");
        self.inbox
            .lock()
            .map_err(|_| SharingError::Closed)?
            .insert(party, shared);
        Ok(())
    }

    pub fn submitted_parties(&self) -> Vec<PartyId> {
        let mut parties: Vec<PartyId> = self
            .inbox
            .lock()
            .map(|inbox| inbox.keys().copied().collect())
            .unwrap_or_default();
        parties.sort_unstable();
        parties
    }
}

impl SharingBackend for LocalCommittee {
    type Secret = SharedValue;

    async fn share(&self, party: PartyId, len: usize) -> Result<Vec<SharedValue>, SharingError> {
        let inbox = self.inbox.lock().map_err(|_| SharingError::Closed)?;
        let submitted = inbox.get(&party).ok_or(SharingError::UnknownParty(party))?;
        Ok(submitted.iter().take(len).cloned().collect())
    }

    fn add(&self, a: &SharedValue, b: &SharedValue) -> Result<SharedValue, SharingError> {
        a.zip_with(b, |x, y| x + y)
    }

    fn sub(&self, a: &SharedValue, b: &SharedValue) -> Result<SharedValue, SharingError> {
        a.zip_with(b, |x, y| x - y)
    }

    fn div_scalar(&self, a: &SharedValue, divisor: i64) -> Result<SharedValue, SharingError> {
        let inv = Fp::from_i64(divisor)
            .inv()
            .ok_or(SharingError::NonInvertible(divisor))?;
        let shares = a
            .shares
            .iter()
            .map(|s| Share::new(s.id, s.value * inv))
            .collect();
        Ok(SharedValue { shares })
    }

    fn open(&self, secrets: &[SharedValue], receivers: &[PartyId]) -> RevealHandle {
        let secrets = secrets.to_vec();
        let threshold = self.config.threshold;
        let deliver = receivers.contains(&self.config.analyst);

        let task = tokio::spawn(async move {
            if !deliver {
                return Ok(None);
            }
            let opened = secrets
                .iter()
                .map(|secret| combine_shares(&secret.shares, threshold).map(Fp::to_i64))
                .collect::<Result<Vec<i64>, _>>()?;
            Ok::<Revealed, SharingError>(Some(opened))
        });

        async move { task.await.map_err(|_| SharingError::Closed)? }.boxed()
    }
}
