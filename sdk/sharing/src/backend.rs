//! The secret-sharing primitive as consumed by the engine.

use std::future::Future;

use futures::future::BoxFuture;

use crate::shares::SharingError;

/// Party identifier as assigned by the session (analyst is conventionally 1)
pub type PartyId = u32;

/// Plaintext payload of an open. `None` means the primitive resolved without
/// a value (e.g. the caller is not among the receivers).
pub type Revealed = Option<Vec<i64>>;

/// An open that has already been issued. Awaiting it yields the plaintext.
pub type RevealHandle = BoxFuture<'static, Result<Revealed, SharingError>>;

/// Trait for secret-sharing backends
///
/// Linear operations are local. Only `share` and `open` touch other parties;
/// `open` must start the protocol before returning so several opens can be
/// outstanding at once.
pub trait SharingBackend: Send + Sync {
    /// A secret-shared value as held by this party
    type Secret: Clone + Send + Sync + 'static;

    /// Retrieve `len` shared values contributed by `party`.
    ///
    /// Backends return whatever the party actually provided; a short vector is
    /// the caller's to reject.
    fn share(
        &self,
        party: PartyId,
        len: usize,
    ) -> impl Future<Output = Result<Vec<Self::Secret>, SharingError>> + Send;

    /// Secret addition
    fn add(&self, a: &Self::Secret, b: &Self::Secret) -> Result<Self::Secret, SharingError>;

    /// Secret subtraction
    fn sub(&self, a: &Self::Secret, b: &Self::Secret) -> Result<Self::Secret, SharingError>;

    /// Division by a public scalar. Exact only when the hidden value is a
    /// multiple of `divisor`.
    fn div_scalar(&self, a: &Self::Secret, divisor: i64) -> Result<Self::Secret, SharingError>;

    /// Issue an open of `secrets` towards `receivers`
    fn open(&self, secrets: &[Self::Secret], receivers: &[PartyId]) -> RevealHandle;
}
