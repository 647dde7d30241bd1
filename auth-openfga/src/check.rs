use crate::{models::*, schema::{Schema, Userset}};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

const MAX_DEPTH: u32 = 10;

/// Read access to stored tuples needed while evaluating a check
pub trait TupleSource {
    fn contains(&self, tuple: &Tuple) -> bool;

    /// Subjects holding `relation` directly on `object`
    fn subjects(&self, relation: Relation, object: &Object) -> Vec<Subject>;
}

/// Evaluates checks against a [`Schema`]:
/// - Direct tuples for assignable relations
/// - Computed relations on the same object (`can_view: viewer`)
/// - Tuple-to-userset hops (`member from organization`)
pub struct PermissionChecker {
    schema: Arc<Schema>,
}

impl PermissionChecker {
    pub fn new(schema: Arc<Schema>) -> Self {
        Self { schema }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Check if subject has the specified relation to object
    pub fn check(
        &self,
        source: &dyn TupleSource,
        subject: &Subject,
        relation: Relation,
        object: &Object,
    ) -> bool {
        let mut visited = HashSet::new();
        self.check_recursive(source, subject, relation, object, &mut visited, 0)
    }

    fn check_recursive(
        &self,
        source: &dyn TupleSource,
        subject: &Subject,
        relation: Relation,
        object: &Object,
        visited: &mut HashSet<(Relation, Object)>,
        depth: u32,
    ) -> bool {
        if depth > MAX_DEPTH {
            return false;
        }
        if !visited.insert((relation, object.clone())) {
            return false;
        }

        let Some(definition) = self.schema.relation(&object.object_type, relation) else {
            return false;
        };

        debug!(%subject, %relation, %object, depth, "Evaluating relation");

        for userset in &definition.rewrites {
            let granted = match userset {
                Userset::Direct(types) => {
                    types.iter().any(|t| *t == subject.subject_type)
                        && source.contains(&Tuple::new(subject.clone(), relation, object.clone()))
                }
                Userset::Computed(computed) => {
                    self.check_recursive(source, subject, *computed, object, visited, depth + 1)
                }
                Userset::TupleToUserset { tupleset, computed } => source
                    .subjects(*tupleset, object)
                    .into_iter()
                    .any(|parent| {
                        let parent = Object::new(&parent.subject_type, &parent.id);
                        self.check_recursive(source, subject, *computed, &parent, visited, depth + 1)
                    }),
            };
            if granted {
                return true;
            }
        }

        false
    }
}
