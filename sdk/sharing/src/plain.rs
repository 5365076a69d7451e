//! Plaintext stand-in backend.
//!
//! Shares are the integers themselves. Useful for dry runs over fixtures and
//! for checking engine arithmetic; offers no privacy.

use std::collections::HashMap;
use std::sync::Mutex;

use futures::FutureExt;

use crate::backend::{PartyId, RevealHandle, SharingBackend};
use crate::shares::SharingError;

#[derive(Debug, Default)]
pub struct PlainBackend {
    inbox: Mutex<HashMap<PartyId, Vec<i64>>>,
    /// Every vector passed to `open`, in issue order
    opened: Mutex<Vec<Vec<i64>>>,
    withhold_reveals: bool,
}

impl PlainBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every open resolves to `None`, as if this party were not a receiver
    pub fn withholding_reveals() -> Self {
        Self {
            withhold_reveals: true,
            ..Self::default()
        }
    }

    pub fn submit(&self, party: PartyId, values: Vec<i64>) {
        if let Ok(mut inbox) = self.inbox.lock() {
            inbox.insert(party, values);
        }
    }

    /// Lengths of the vectors opened so far
    pub fn opened(&self) -> Vec<usize> {
        self.opened_sums().iter().map(Vec::len).collect()
    }

    /// The vectors opened so far, whether or not they were delivered
    pub fn opened_sums(&self) -> Vec<Vec<i64>> {
        self.opened
            .lock()
            .map(|opened| opened.clone())
            .unwrap_or_default()
    }
}

impl SharingBackend for PlainBackend {
    type Secret = i64;

    async fn share(&self, party: PartyId, len: usize) -> Result<Vec<i64>, SharingError> {
        let inbox = self.inbox.lock().map_err(|_| SharingError::Closed)?;
        let submitted = inbox.get(&party).ok_or(SharingError::UnknownParty(party))?;
        Ok(submitted.iter().take(len).copied().collect())
    }

    fn add(&self, a: &i64, b: &i64) -> Result<i64, SharingError> {
        a.checked_add(*b).ok_or(SharingError::Overflow)
    }

    fn sub(&self, a: &i64, b: &i64) -> Result<i64, SharingError> {
        a.checked_sub(*b).ok_or(SharingError::Overflow)
    }

    fn div_scalar(&self, a: &i64, divisor: i64) -> Result<i64, SharingError> {
        if divisor == 0 {
            return Err(SharingError::NonInvertible(divisor));
        }
        Ok(a / divisor)
    }

    fn open(&self, secrets: &[i64], receivers: &[PartyId]) -> RevealHandle {
        if let Ok(mut opened) = self.opened.lock() {
            opened.push(secrets.to_vec());
        }
        let payload = if self.withhold_reveals || receivers.is_empty() {
            None
        } else {
            Some(secrets.to_vec())
        };
        futures::future::ready(Ok(payload)).boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_plain_open_records_lengths() {
        let backend = PlainBackend::new();
        backend.submit(2, vec![1, 2, 3]);

        let shared = backend.share(2, 3).await.unwrap();
        let opened = backend.open(&shared, &[1]).await.unwrap();

        assert_eq!(opened, Some(vec![1, 2, 3]));
        assert_eq!(backend.opened(), vec![3]);
        assert_eq!(backend.opened_sums(), vec![vec![1, 2, 3]]);
    }

    #[test]
    fn test_arithmetic_overflow_is_an_error() {
        let backend = PlainBackend::new();
        assert!(matches!(backend.add(&i64::MAX, &1), Err(SharingError::Overflow)));
        assert!(matches!(backend.sub(&i64::MIN, &1), Err(SharingError::Overflow)));
        assert_eq!(backend.sub(&5, &7).unwrap(), -2);
    }

    #[tokio::test]
    async fn test_withholding_backend() {
        let backend = PlainBackend::withholding_reveals();
        let opened = backend.open(&[4], &[1]).await.unwrap();
        assert!(opened.is_none());
    }
}
