use crate::{error::FgaError, models::*};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

/// Authorization model definition, mirroring the OpenFGA type system
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schema {
    pub types: Vec<TypeDefinition>,
}

impl Default for Schema {
    fn default() -> Self {
        Self::document_model()
    }
}

impl Schema {
    pub fn new() -> Self {
        Self { types: Vec::new() }
    }

    /// The model the document service expects the authorization store to hold.
    ///
    /// Creators become `owner`, documents are tied to an `organization`, and
    /// `viewer`/`editor` are granted by sharing. The `can_*` relations are the
    /// ones the service checks.
    pub fn document_model() -> Self {
        let user = TypeDefinition {
            name: USER_TYPE.to_string(),
            relations: Vec::new(),
        };

        let organization = TypeDefinition {
            name: ORGANIZATION_TYPE.to_string(),
            relations: vec![RelationDefinition::new(
                Relation::Member,
                vec![Userset::direct(&[USER_TYPE])],
            )],
        };

        let document = TypeDefinition {
            name: DOCUMENT_TYPE.to_string(),
            relations: vec![
                RelationDefinition::new(Relation::Owner, vec![Userset::direct(&[USER_TYPE])]),
                RelationDefinition::new(
                    Relation::Organization,
                    vec![Userset::direct(&[ORGANIZATION_TYPE])],
                ),
                RelationDefinition::new(
                    Relation::Editor,
                    vec![
                        Userset::direct(&[USER_TYPE]),
                        Userset::Computed(Relation::Owner),
                    ],
                ),
                RelationDefinition::new(
                    Relation::Viewer,
                    vec![
                        Userset::direct(&[USER_TYPE]),
                        Userset::Computed(Relation::Editor),
                        Userset::TupleToUserset {
                            tupleset: Relation::Organization,
                            computed: Relation::Member,
                        },
                    ],
                ),
                RelationDefinition::new(Relation::CanView, vec![Userset::Computed(Relation::Viewer)]),
                RelationDefinition::new(Relation::CanEdit, vec![Userset::Computed(Relation::Editor)]),
                RelationDefinition::new(Relation::CanDelete, vec![Userset::Computed(Relation::Owner)]),
            ],
        };

        Self {
            types: vec![user, organization, document],
        }
    }

    pub fn type_definition(&self, name: &str) -> Option<&TypeDefinition> {
        self.types.iter().find(|t| t.name == name)
    }

    pub fn relation(&self, object_type: &str, relation: Relation) -> Option<&RelationDefinition> {
        self.type_definition(object_type)?
            .relations
            .iter()
            .find(|r| r.relation == relation)
    }

    /// Validate that a tuple may be stored under this model
    pub fn validate_tuple(&self, tuple: &Tuple) -> Result<(), FgaError> {
        let definition = self.relation(&tuple.object.object_type, tuple.relation).ok_or_else(|| {
            FgaError::InvalidTuple(format!(
                "relation '{}' is not defined on type '{}'",
                tuple.relation, tuple.object.object_type
            ))
        })?;

        let allowed = definition
            .directly_assignable()
            .ok_or_else(|| {
                FgaError::InvalidTuple(format!(
                    "relation '{}' on '{}' is computed and cannot be written",
                    tuple.relation, tuple.object.object_type
                ))
            })?;

        if !allowed.iter().any(|t| *t == tuple.subject.subject_type) {
            return Err(FgaError::InvalidTuple(format!(
                "type '{}' is not assignable to {}#{}",
                tuple.subject.subject_type, tuple.object.object_type, tuple.relation
            )));
        }

        Ok(())
    }

    /// Validate that every rewrite references a defined relation
    pub fn validate(&self) -> Result<(), FgaError> {
        for type_def in &self.types {
            for relation_def in &type_def.relations {
                for userset in &relation_def.rewrites {
                    let referenced = match userset {
                        Userset::Direct(types) => {
                            if let Some(unknown) =
                                types.iter().find(|t| self.type_definition(t).is_none())
                            {
                                return Err(FgaError::Configuration(format!(
                                    "{}#{} allows unknown type '{}'",
                                    type_def.name, relation_def.relation, unknown
                                )));
                            }
                            continue;
                        }
                        Userset::Computed(relation) => *relation,
                        Userset::TupleToUserset { tupleset, .. } => *tupleset,
                    };
                    if self.relation(&type_def.name, referenced).is_none() {
                        return Err(FgaError::Configuration(format!(
                            "{}#{} references undefined relation '{}'",
                            type_def.name, relation_def.relation, referenced
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    /// Render the model in OpenFGA DSL (schema 1.1)
    pub fn to_dsl(&self) -> String {
        let mut out = String::from("model\n  schema 1.1\n");
        for type_def in &self.types {
            let _ = write!(out, "\ntype {}\n", type_def.name);
            if type_def.relations.is_empty() {
                continue;
            }
            out.push_str("  relations\n");
            for relation_def in &type_def.relations {
                let rewrites: Vec<String> =
                    relation_def.rewrites.iter().map(Userset::to_dsl).collect();
                let _ = writeln!(
                    out,
                    "    define {}: {}",
                    relation_def.relation,
                    rewrites.join(" or ")
                );
            }
        }
        out
    }
}

/// Definition of an object type
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeDefinition {
    pub name: String,
    pub relations: Vec<RelationDefinition>,
}

/// A relation and the union of usersets that grant it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationDefinition {
    pub relation: Relation,
    pub rewrites: Vec<Userset>,
}

impl RelationDefinition {
    pub fn new(relation: Relation, rewrites: Vec<Userset>) -> Self {
        Self { relation, rewrites }
    }

    /// Subject types that may be written directly, if any
    pub fn directly_assignable(&self) -> Option<&[String]> {
        self.rewrites.iter().find_map(|u| match u {
            Userset::Direct(types) => Some(types.as_slice()),
            _ => None,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Userset {
    /// `[user]`: stored tuples with these subject types
    Direct(Vec<String>),
    /// `owner`: another relation on the same object
    Computed(Relation),
    /// `member from organization`
    TupleToUserset { tupleset: Relation, computed: Relation },
}

impl Userset {
    pub fn direct(types: &[&str]) -> Self {
        Userset::Direct(types.iter().map(|t| t.to_string()).collect())
    }

    fn to_dsl(&self) -> String {
        match self {
            Userset::Direct(types) => format!("[{}]", types.join(", ")),
            Userset::Computed(relation) => relation.to_string(),
            Userset::TupleToUserset { tupleset, computed } => {
                format!("{} from {}", computed, tupleset)
            }
        }
    }
}
