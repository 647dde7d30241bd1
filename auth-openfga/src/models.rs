use crate::error::FgaError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const USER_TYPE: &str = "user";
pub const ORGANIZATION_TYPE: &str = "organization";
pub const DOCUMENT_TYPE: &str = "document";

/// Splits a `type:id` identifier. Both halves must be non-empty.
fn split_entity(raw: &str) -> Result<(&str, &str), FgaError> {
    match raw.split_once(':') {
        Some((kind, id)) if !kind.is_empty() && !id.is_empty() => Ok((kind, id)),
        _ => Err(FgaError::InvalidEntity(format!(
            "expected '<type>:<id>', got '{}'",
            raw
        ))),
    }
}

/// Accepts either a bare id (`alice`) or one already carrying the
/// expected type prefix (`user:alice`).
fn strip_type<'a>(object_type: &str, raw: &'a str) -> &'a str {
    raw.strip_prefix(object_type)
        .and_then(|rest| rest.strip_prefix(':'))
        .unwrap_or(raw)
}

/// The `user` side of a relation tuple
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Subject {
    pub subject_type: String,
    pub id: String,
}

impl Subject {
    pub fn new(subject_type: &str, id: &str) -> Self {
        Self {
            subject_type: subject_type.to_string(),
            id: strip_type(subject_type, id).to_string(),
        }
    }

    pub fn user(user_id: &str) -> Self {
        Self::new(USER_TYPE, user_id)
    }

    pub fn organization(organization_id: &str) -> Self {
        Self::new(ORGANIZATION_TYPE, organization_id)
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.subject_type, self.id)
    }
}

impl FromStr for Subject {
    type Err = FgaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, id) = split_entity(s)?;
        Ok(Self {
            subject_type: kind.to_string(),
            id: id.to_string(),
        })
    }
}

/// A protected resource (the `object` side of a relation tuple)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Object {
    pub object_type: String,
    pub id: String,
}

impl Object {
    pub fn new(object_type: &str, object_id: &str) -> Self {
        Self {
            object_type: object_type.to_string(),
            id: strip_type(object_type, object_id).to_string(),
        }
    }

    pub fn document(document_id: &str) -> Self {
        Self::new(DOCUMENT_TYPE, document_id)
    }

    pub fn organization(organization_id: &str) -> Self {
        Self::new(ORGANIZATION_TYPE, organization_id)
    }
}

impl fmt::Display for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.object_type, self.id)
    }
}

impl FromStr for Object {
    type Err = FgaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, id) = split_entity(s)?;
        Ok(Self {
            object_type: kind.to_string(),
            id: id.to_string(),
        })
    }
}

/// Relation vocabulary understood by this service.
///
/// Stored relations are written as tuples; derived relations (`can_*`) are
/// computed by the authorization model and only ever used in checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relation {
    Owner,
    Organization,
    Editor,
    Viewer,
    Member,
    CanView,
    CanEdit,
    CanDelete,
}

impl Relation {
    pub const ALL: [Relation; 8] = [
        Relation::Owner,
        Relation::Organization,
        Relation::Editor,
        Relation::Viewer,
        Relation::Member,
        Relation::CanView,
        Relation::CanEdit,
        Relation::CanDelete,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Relation::Owner => "owner",
            Relation::Organization => "organization",
            Relation::Editor => "editor",
            Relation::Viewer => "viewer",
            Relation::Member => "member",
            Relation::CanView => "can_view",
            Relation::CanEdit => "can_edit",
            Relation::CanDelete => "can_delete",
        }
    }

    /// Relations a document owner may hand out through sharing
    pub fn is_shareable(&self) -> bool {
        matches!(self, Relation::Viewer | Relation::Editor)
    }

    pub fn is_derived(&self) -> bool {
        matches!(
            self,
            Relation::CanView | Relation::CanEdit | Relation::CanDelete
        )
    }

    /// Parses a relation that may be granted via the share interface.
    pub fn parse_shareable(raw: &str) -> Result<Self, FgaError> {
        match raw.parse::<Relation>() {
            Ok(relation) if relation.is_shareable() => Ok(relation),
            _ => Err(FgaError::InvalidRelation(format!(
                "'{}' cannot be shared, expected 'viewer' or 'editor'",
                raw
            ))),
        }
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Relation {
    type Err = FgaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Relation::ALL
            .iter()
            .copied()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| FgaError::InvalidRelation(format!("unknown relation '{}'", s)))
    }
}

/// A relationship tuple: subject has relation to object
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tuple {
    pub subject: Subject,
    pub relation: Relation,
    pub object: Object,
}

impl Tuple {
    pub fn new(subject: Subject, relation: Relation, object: Object) -> Self {
        Self {
            subject,
            relation,
            object,
        }
    }
}

impl fmt::Display for Tuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.subject, self.relation, self.object)
    }
}

/// Authorization check request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckRequest {
    pub subject: Subject,
    pub relation: Relation,
    pub object: Object,
}

impl CheckRequest {
    pub fn new(subject: Subject, relation: Relation, object: Object) -> Self {
        Self {
            subject,
            relation,
            object,
        }
    }
}

/// Read filter; `None` fields act as wildcards
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TupleFilter {
    pub subject: Option<Subject>,
    pub relation: Option<Relation>,
    pub object: Option<Object>,
}

impl TupleFilter {
    pub fn for_object(object: Object) -> Self {
        Self {
            object: Some(object),
            ..Self::default()
        }
    }

    pub fn matches(&self, tuple: &Tuple) -> bool {
        self.subject.as_ref().map_or(true, |s| *s == tuple.subject)
            && self.relation.map_or(true, |r| r == tuple.relation)
            && self.object.as_ref().map_or(true, |o| *o == tuple.object)
    }
}

// =============================================================================
// OpenFGA wire representation
// =============================================================================

/// Tuple key exactly as the OpenFGA API spells it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TupleKey {
    pub user: String,
    pub relation: String,
    pub object: String,
}

impl From<&Tuple> for TupleKey {
    fn from(tuple: &Tuple) -> Self {
        Self {
            user: tuple.subject.to_string(),
            relation: tuple.relation.to_string(),
            object: tuple.object.to_string(),
        }
    }
}

impl TryFrom<TupleKey> for Tuple {
    type Error = FgaError;

    fn try_from(key: TupleKey) -> Result<Self, Self::Error> {
        Ok(Tuple {
            subject: key.user.parse()?,
            relation: key.relation.parse()?,
            object: key.object.parse()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entities_render_namespaced() {
        assert_eq!(Subject::user("alice").to_string(), "user:alice");
        assert_eq!(Subject::organization("acme").to_string(), "organization:acme");
        assert_eq!(Object::document("doc1").to_string(), "document:doc1");
    }

    #[test]
    fn test_typed_identifiers_are_not_double_prefixed() {
        assert_eq!(Subject::user("user:alice").to_string(), "user:alice");
        assert_eq!(Object::document("document:doc1").id, "doc1");
        // a different prefix is part of the id
        assert_eq!(Subject::user("org:acme").to_string(), "user:org:acme");
    }

    #[test]
    fn test_parse_entity() {
        let object: Object = "document:doc1".parse().unwrap();
        assert_eq!(object, Object::document("doc1"));
        assert!("document".parse::<Object>().is_err());
        assert!(":doc1".parse::<Object>().is_err());
        assert!("document:".parse::<Subject>().is_err());
    }

    #[test]
    fn test_relation_round_trips_through_wire_string() {
        for relation in Relation::ALL {
            assert_eq!(relation.as_str().parse::<Relation>().unwrap(), relation);
        }
        assert!("admin".parse::<Relation>().is_err());
    }

    #[test]
    fn test_only_viewer_and_editor_are_shareable() {
        assert_eq!(Relation::parse_shareable("viewer").unwrap(), Relation::Viewer);
        assert_eq!(Relation::parse_shareable("editor").unwrap(), Relation::Editor);
        for raw in ["owner", "organization", "can_view", "admin", ""] {
            assert!(Relation::parse_shareable(raw).is_err(), "{} accepted", raw);
        }
    }

    #[test]
    fn test_tuple_key_uses_wire_strings() {
        let tuple = Tuple::new(
            Subject::user("alice"),
            Relation::Owner,
            Object::document("doc1"),
        );
        let key = TupleKey::from(&tuple);
        assert_eq!(key.user, "user:alice");
        assert_eq!(key.relation, "owner");
        assert_eq!(key.object, "document:doc1");
        assert_eq!(Tuple::try_from(key).unwrap(), tuple);
    }

    #[test]
    fn test_filter_wildcards() {
        let tuple = Tuple::new(
            Subject::user("bob"),
            Relation::Viewer,
            Object::document("doc1"),
        );
        assert!(TupleFilter::default().matches(&tuple));
        assert!(TupleFilter::for_object(Object::document("doc1")).matches(&tuple));
        assert!(!TupleFilter::for_object(Object::document("doc2")).matches(&tuple));
        let by_relation = TupleFilter {
            relation: Some(Relation::Editor),
            ..TupleFilter::default()
        };
        assert!(!by_relation.matches(&tuple));
    }
}
