//! Share Collector
//!
//! Pulls one party's secret-shared contribution and splits it along the
//! ordering's segment layout.

use tally_sharing::{PartyId, SharingBackend};
use tracing::error;

use crate::error::{EngineError, ShareProtocolError};
use crate::ordering::ConsistentOrdering;

/// One party's contribution, split by segment
#[derive(Debug, Clone)]
pub struct PartyShareVector<S> {
    pub party: PartyId,
    pub values: Vec<S>,
    pub squares: Vec<S>,
    pub products: Vec<S>,
    pub questions: Vec<S>,
    pub usability: Vec<S>,
}

/// Request exactly `total_slots(ordering)` shares from `party`.
///
/// A length mismatch means the submitter and the aggregator disagree on the
/// layout. The vector is rejected; it is never truncated or padded.
pub async fn collect<B: SharingBackend>(
    backend: &B,
    party: PartyId,
    ordering: &ConsistentOrdering,
) -> Result<PartyShareVector<B::Secret>, EngineError> {
    let layout = ordering.layout();
    let expected = layout.total();
    let mut shares = backend.share(party, expected).await?;

    if shares.len() != expected {
        error!(party, expected, got = shares.len(), "share vector desynchronized");
        return Err(ShareProtocolError {
            party,
            expected,
            got: shares.len(),
        }
        .into());
    }

    // split back to front so each drain is a tail
    let usability = shares.split_off(layout.usability.start);
    let questions = shares.split_off(layout.questions.start);
    let products = shares.split_off(layout.products.start);
    let squares = shares.split_off(layout.squares.start);
    let values = shares;

    Ok(PartyShareVector {
        party,
        values,
        squares,
        products,
        questions,
        usability,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::FIXTURE;
    use crate::ordering::order;
    use crate::template::Template;
    use tally_sharing::PlainBackend;

    fn ordering() -> ConsistentOrdering {
        order(&Template::from_json(FIXTURE).unwrap()).unwrap()
    }

    #[tokio::test]
    async fn test_collect_splits_segments() {
        let ordering = ordering();
        let backend = PlainBackend::new();
        let total = ordering.total_slots() as i64;
        backend.submit(2, (0..total).collect());

        let vector = collect(&backend, 2, &ordering).await.unwrap();
        assert_eq!(vector.values.len(), 12);
        assert_eq!(vector.squares.first(), Some(&12));
        assert_eq!(vector.products, vec![24]);
        assert_eq!(vector.questions.len(), 14);
        assert_eq!(vector.usability, vec![39, 40, 41]);
    }

    #[tokio::test]
    async fn test_short_vector_is_protocol_error() {
        let ordering = ordering();
        let backend = PlainBackend::new();
        backend.submit(3, vec![1; ordering.total_slots() - 1]);

        let err = collect(&backend, 3, &ordering).await.unwrap_err();
        match err {
            EngineError::ShareProtocol(e) => {
                assert_eq!(e.party, 3);
                assert_eq!(e.expected, ordering.total_slots());
                assert_eq!(e.got, ordering.total_slots() - 1);
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
