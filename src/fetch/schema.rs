//! Strict validation of untrusted response bodies.
//!
//! A body is accepted only if it deserializes into the expected record with
//! every required field present and of the exact primitive type (an integer
//! field rejects `"1"`, `1.5` and `null`), and then passes the record's own
//! semantic checks.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("malformed body: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("field `{field}` {problem}")]
    Constraint {
        field: &'static str,
        problem: &'static str,
    },
}

/// A typed record an external response must match.
pub trait ResponseSchema: DeserializeOwned {
    /// Semantic checks beyond what the type system enforces.
    fn validate(&self) -> Result<(), SchemaError> {
        Ok(())
    }
}

/// Deserialize and validate `body` as `T`.
pub fn parse_strict<T: ResponseSchema>(body: &[u8]) -> Result<T, SchemaError> {
    let record: T = serde_json::from_slice(body)?;
    record.validate()?;
    Ok(record)
}

/// A todo item as served by the jsonplaceholder API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TodoRecord {
    pub user_id: i64,
    pub id: i64,
    pub title: String,
    pub completed: bool,
}

impl ResponseSchema for TodoRecord {
    fn validate(&self) -> Result<(), SchemaError> {
        if self.title.trim().is_empty() {
            return Err(SchemaError::Constraint {
                field: "title",
                problem: "must not be blank",
            });
        }
        Ok(())
    }
}
