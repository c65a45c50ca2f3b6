use std::fmt;

use thiserror::Error;

/// Kind of entity a lookup failed to resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Order,
    Task,
    Worker,
    User,
    OrderedTask,
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Entity::Order => "Order",
            Entity::Task => "Task",
            Entity::Worker => "Worker",
            Entity::User => "User",
            Entity::OrderedTask => "Ordered task",
        })
    }
}

/// Store operation that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Insert,
    Update,
    Delete,
    Select,
    Transaction,
    Connection,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Operation::Insert => "insert",
            Operation::Update => "update",
            Operation::Delete => "delete",
            Operation::Select => "select",
            Operation::Transaction => "transaction",
            Operation::Connection => "connection",
        })
    }
}

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Invalid {field}: {reason}")]
    Validation { field: &'static str, reason: String },
    #[error("{0} not found")]
    NotFound(Entity),
    #[error("Persistence error ({operation}): {message}")]
    Persistence {
        operation: Operation,
        message: String,
    },
}

impl DomainError {
    pub fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        DomainError::Validation {
            field,
            reason: reason.into(),
        }
    }

    pub fn persistence(operation: Operation, err: impl fmt::Display) -> Self {
        DomainError::Persistence {
            operation,
            message: err.to_string(),
        }
    }

    /// True when the error names a missing entity of the given kind.
    pub fn is_not_found(&self, entity: Entity) -> bool {
        matches!(self, DomainError::NotFound(e) if *e == entity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_display_names_the_field() {
        let err = DomainError::validation("address", "must not be empty");
        assert_eq!(err.to_string(), "Invalid address: must not be empty");
    }

    #[test]
    fn not_found_display() {
        assert_eq!(
            DomainError::NotFound(Entity::OrderedTask).to_string(),
            "Ordered task not found"
        );
    }

    #[test]
    fn persistence_display_includes_operation() {
        let err = DomainError::persistence(Operation::Insert, "duplicate key");
        assert_eq!(err.to_string(), "Persistence error (insert): duplicate key");
    }

    #[test]
    fn is_not_found_matches_only_the_given_entity() {
        let err = DomainError::NotFound(Entity::Task);
        assert!(err.is_not_found(Entity::Task));
        assert!(!err.is_not_found(Entity::Order));
    }
}
