//! The transaction persistence collaborator.
//!
//! The routing engine writes each non-primary route record as it settles and
//! asks for the transaction's final status once every secondary has been
//! observed complete. Both calls are best-effort from the client's point of
//! view: failures are logged by the engine and never surfaced, because the
//! client response has already been sent.

use crate::context::RequestContext;
use crate::error::StoreError;
use crate::records::RouteRecord;
use std::future::Future;
use std::pin::Pin;

/// Durable store for transactions and their per-route records.
///
/// Uses explicit `Pin<Box<dyn Future>>` returns instead of `async fn` so the
/// store can be injected as `Arc<dyn TransactionStore>`.
pub trait TransactionStore: Send + Sync {
    /// Persist one settled non-primary route record.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the write fails; the engine logs and
    /// continues.
    fn store_non_primary_response<'a>(
        &'a self,
        ctx: &'a RequestContext,
        record: &'a RouteRecord,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + 'a>>;

    /// Derive and persist the transaction's final status from the completed
    /// context. Ordered strictly after every secondary's persistence write.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the write fails; the engine logs and
    /// continues.
    fn set_final_status<'a>(
        &'a self,
        ctx: &'a RequestContext,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + 'a>>;
}
