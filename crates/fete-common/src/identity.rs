use serde::{Deserialize, Serialize};

use crate::id::new_id;

/// Who a connected client is. Supplied by the auth layer and immutable for the
/// lifetime of a connection; rides on the wire inside envelopes and member lists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub id: String,
    pub display_name: String,
}

impl Identity {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
        }
    }

    /// Generate a throwaway identity with a random id. Used by demos and tests;
    /// real identities come from the auth collaborator.
    pub fn generate(display_name: &str) -> Self {
        Self {
            id: new_id(),
            display_name: display_name.to_string(),
        }
    }
}
