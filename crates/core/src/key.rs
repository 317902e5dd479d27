use std::fmt;

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::intent::normalize_text;

pub const SYSTEM_SCOPE: &str = "system";

/// Lowercased, trimmed query with whitespace runs collapsed to one space.
pub fn normalize_query(query: &str) -> String {
    normalize_text(&query.to_lowercase())
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new(scope: &str, query: &str) -> Self {
        let digest = Sha256::digest(normalize_query(query).as_bytes());
        let hash = digest
            .iter()
            .take(8)
            .map(|byte| format!("{byte:02x}"))
            .collect::<String>();

        Self(format!("{scope}:{hash}"))
    }

    pub fn system(query: &str) -> Self {
        Self::new(SYSTEM_SCOPE, query)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
