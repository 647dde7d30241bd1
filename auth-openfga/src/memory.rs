use crate::{
    check::{PermissionChecker, TupleSource},
    client::AuthorizationClient,
    error::{FgaError, Result},
    models::*,
    schema::Schema,
};
use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::debug;

/// In-process authorization backend for development and tests.
///
/// Evaluates the document model locally. Failures can be injected per
/// operation, and every call is counted.
pub struct InMemoryAuthorizationClient {
    tuples: Arc<DashMap<String, Tuple>>,
    checker: PermissionChecker,
    faults: Faults,
    calls: CallCounter,
}

#[derive(Default)]
struct Faults {
    writes: AtomicBool,
    deletes: AtomicBool,
    list: AtomicBool,
    read: AtomicBool,
    unavailable: AtomicBool,
    check_objects: DashSet<Object>,
}

/// Number of calls received, per operation
#[derive(Debug, Default)]
pub struct CallCounter {
    pub check: AtomicUsize,
    pub write: AtomicUsize,
    pub delete: AtomicUsize,
    pub list_objects: AtomicUsize,
    pub read: AtomicUsize,
    pub health: AtomicUsize,
}

impl CallCounter {
    pub fn total(&self) -> usize {
        [
            &self.check,
            &self.write,
            &self.delete,
            &self.list_objects,
            &self.read,
            &self.health,
        ]
        .iter()
        .map(|c| c.load(Ordering::SeqCst))
        .sum()
    }
}

impl InMemoryAuthorizationClient {
    pub fn new() -> Self {
        Self::with_schema(Schema::document_model())
    }

    pub fn with_schema(schema: Schema) -> Self {
        Self {
            tuples: Arc::new(DashMap::new()),
            checker: PermissionChecker::new(Arc::new(schema)),
            faults: Faults::default(),
            calls: CallCounter::default(),
        }
    }

    fn tuple_key(tuple: &Tuple) -> String {
        format!("{}#{}@{}", tuple.object, tuple.relation, tuple.subject)
    }

    pub fn calls(&self) -> &CallCounter {
        &self.calls
    }

    pub fn total_calls(&self) -> usize {
        self.calls.total()
    }

    /// Whether a tuple is stored (does not count as a call)
    pub fn contains(&self, tuple: &Tuple) -> bool {
        self.tuples.contains_key(&Self::tuple_key(tuple))
    }

    pub fn tuple_count(&self) -> usize {
        self.tuples.len()
    }

    pub fn fail_writes(&self, fail: bool) {
        self.faults.writes.store(fail, Ordering::SeqCst);
    }

    pub fn fail_deletes(&self, fail: bool) {
        self.faults.deletes.store(fail, Ordering::SeqCst);
    }

    pub fn fail_list_objects(&self, fail: bool) {
        self.faults.list.store(fail, Ordering::SeqCst);
    }

    pub fn fail_reads(&self, fail: bool) {
        self.faults.read.store(fail, Ordering::SeqCst);
    }

    /// Makes every check on `object` fail
    pub fn fail_checks_on(&self, object: Object) {
        self.faults.check_objects.insert(object);
    }

    /// Fails every operation, including the health check
    pub fn set_unavailable(&self, unavailable: bool) {
        self.faults.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn ensure_available(&self) -> Result<()> {
        if self.faults.unavailable.load(Ordering::SeqCst) {
            return Err(FgaError::Unavailable("in-memory backend marked unavailable".to_string()));
        }
        Ok(())
    }

    fn injected(flag: &AtomicBool, operation: &str) -> Result<()> {
        if flag.load(Ordering::SeqCst) {
            return Err(FgaError::Unavailable(format!("injected {} failure", operation)));
        }
        Ok(())
    }
}

impl Default for InMemoryAuthorizationClient {
    fn default() -> Self {
        Self::new()
    }
}

impl TupleSource for InMemoryAuthorizationClient {
    fn contains(&self, tuple: &Tuple) -> bool {
        self.tuples.contains_key(&Self::tuple_key(tuple))
    }

    fn subjects(&self, relation: Relation, object: &Object) -> Vec<Subject> {
        self.tuples
            .iter()
            .filter(|entry| entry.relation == relation && entry.object == *object)
            .map(|entry| entry.subject.clone())
            .collect()
    }
}

#[async_trait]
impl AuthorizationClient for InMemoryAuthorizationClient {
    async fn check(&self, subject: &Subject, relation: Relation, object: &Object) -> Result<bool> {
        self.calls.check.fetch_add(1, Ordering::SeqCst);
        self.ensure_available()?;
        if self.faults.check_objects.contains(object) {
            return Err(FgaError::Unavailable(format!("injected check failure on {}", object)));
        }

        let allowed = self.checker.check(self, subject, relation, object);
        debug!(%subject, %relation, %object, allowed, "In-memory check");
        Ok(allowed)
    }

    async fn write_tuples(&self, tuples: &[Tuple]) -> Result<()> {
        self.calls.write.fetch_add(1, Ordering::SeqCst);
        self.ensure_available()?;
        Self::injected(&self.faults.writes, "write")?;

        // validate the whole batch before touching the store
        for tuple in tuples {
            self.checker.schema().validate_tuple(tuple)?;
        }
        for tuple in tuples {
            self.tuples.insert(Self::tuple_key(tuple), tuple.clone());
        }
        Ok(())
    }

    async fn delete_tuples(&self, tuples: &[Tuple]) -> Result<()> {
        self.calls.delete.fetch_add(1, Ordering::SeqCst);
        self.ensure_available()?;
        Self::injected(&self.faults.deletes, "delete")?;

        for tuple in tuples {
            self.tuples.remove(&Self::tuple_key(tuple));
        }
        Ok(())
    }

    async fn list_objects(
        &self,
        subject: &Subject,
        relation: Relation,
        object_type: &str,
    ) -> Result<Vec<Object>> {
        self.calls.list_objects.fetch_add(1, Ordering::SeqCst);
        self.ensure_available()?;
        Self::injected(&self.faults.list, "list-objects")?;

        let candidates: BTreeSet<String> = self
            .tuples
            .iter()
            .filter(|entry| entry.object.object_type == object_type)
            .map(|entry| entry.object.id.clone())
            .collect();

        Ok(candidates
            .into_iter()
            .map(|id| Object::new(object_type, &id))
            .filter(|object| self.checker.check(self, subject, relation, object))
            .collect())
    }

    async fn read_tuples(&self, filter: &TupleFilter) -> Result<Vec<Tuple>> {
        self.calls.read.fetch_add(1, Ordering::SeqCst);
        self.ensure_available()?;
        Self::injected(&self.faults.read, "read")?;

        let mut tuples: Vec<Tuple> = self
            .tuples
            .iter()
            .filter(|entry| filter.matches(entry.value()))
            .map(|entry| entry.value().clone())
            .collect();
        tuples.sort_by_key(Self::tuple_key);
        Ok(tuples)
    }

    async fn health_check(&self) -> Result<()> {
        self.calls.health.fetch_add(1, Ordering::SeqCst);
        self.ensure_available()
    }
}
