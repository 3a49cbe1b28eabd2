use thiserror::Error;

pub type OptResult<T> = anyhow::Result<T>;

/// Errors raised by catalog accessors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    #[error("Relation {0:?} not exists")]
    RelationNotFound(String),
    #[error("Relation {0:?} already registered")]
    DuplicateRelation(String),
}
