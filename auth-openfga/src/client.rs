use crate::{
    error::{FgaError, Result},
    models::*,
};
use async_trait::async_trait;

/// Operations the document service needs from the authorization service.
///
/// Every method reports remote failures as `Err`. Callers decide how a
/// failure maps to their own semantics; an error is never an implicit allow.
#[async_trait]
pub trait AuthorizationClient: Send + Sync {
    /// Does `subject` hold `relation` on `object`?
    async fn check(&self, subject: &Subject, relation: Relation, object: &Object) -> Result<bool>;

    /// Evaluate several checks in order, stopping at the first failure.
    ///
    /// The failing position is reported through [`FgaError::BatchItem`].
    async fn batch_check(&self, requests: &[CheckRequest]) -> Result<Vec<bool>> {
        let mut results = Vec::with_capacity(requests.len());
        for (index, request) in requests.iter().enumerate() {
            let allowed = self
                .check(&request.subject, request.relation, &request.object)
                .await
                .map_err(|err| FgaError::BatchItem {
                    index,
                    source: Box::new(err),
                })?;
            results.push(allowed);
        }
        Ok(results)
    }

    /// Write tuples in a single request. An empty slice is a no-op.
    async fn write_tuples(&self, tuples: &[Tuple]) -> Result<()>;

    /// Delete tuples in a single request. An empty slice is a no-op.
    async fn delete_tuples(&self, tuples: &[Tuple]) -> Result<()>;

    /// Objects of `object_type` on which `subject` holds `relation`
    async fn list_objects(
        &self,
        subject: &Subject,
        relation: Relation,
        object_type: &str,
    ) -> Result<Vec<Object>>;

    /// Stored tuples matching the filter
    async fn read_tuples(&self, filter: &TupleFilter) -> Result<Vec<Tuple>>;

    /// Confirms the configured store is reachable
    async fn health_check(&self) -> Result<()>;
}
