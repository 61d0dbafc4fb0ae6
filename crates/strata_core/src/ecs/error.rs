use crate::ecs::storage::ColumnError;
use crate::ecs::{ComponentId, EntityId};
use std::collections::TryReserveError;
use thiserror::Error;

pub type StoreResult<T> = Result<T, StoreError>;

/// Errors returned by store operations.
///
/// A failed operation leaves the store exactly as it was before the call.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("entity {entity} does not exist (unknown slot or stale generation)")]
    EntityNotFound { entity: EntityId },

    #[error("entity {entity} does not carry component {component}")]
    ComponentNotFound {
        entity: EntityId,
        component: ComponentId,
    },

    #[error("{component} is not a registered component")]
    UnknownComponent { component: ComponentId },

    #[error("no component is registered under '{name}'")]
    UnknownComponentName { name: String },

    #[error("component {component} expects {expected} bytes but received {actual} bytes")]
    InvalidComponent {
        component: ComponentId,
        expected: usize,
        actual: usize,
    },

    #[error("component '{name}' is already registered as {existing} with size {size}")]
    DuplicateRegistration {
        name: String,
        existing: ComponentId,
        size: usize,
    },

    #[error("component '{name}' has an invalid layout (size {size}, align {align})")]
    InvalidLayout {
        name: String,
        size: usize,
        align: usize,
    },

    #[error("{entity} is a component identity and cannot be modified this way")]
    ProtectedEntity { entity: EntityId },

    #[error("identifier space exhausted")]
    IdSpaceExhausted,

    #[error("out of memory")]
    OutOfMemory(#[from] ColumnError),

    #[error("invalid store configuration: {reason}")]
    InvalidConfig { reason: String },
}

impl From<TryReserveError> for StoreError {
    fn from(err: TryReserveError) -> Self {
        StoreError::OutOfMemory(ColumnError::Reserve(err))
    }
}
