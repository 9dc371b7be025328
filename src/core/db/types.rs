use serde::{Deserialize, Serialize};

use crate::core::llm::RoleType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Roles {
    #[serde(alias = "admin")]
    Admin,
    #[serde(alias = "employee")]
    Employee,
}

impl Roles {
    pub fn as_str(self) -> &'static str {
        match self {
            Roles::Admin => "ADMIN",
            Roles::Employee => "EMPLOYEE",
        }
    }

    pub fn from_role(value: &str) -> Option<Self> {
        match value.to_uppercase().as_str() {
            "ADMIN" => Some(Roles::Admin),
            "EMPLOYEE" => Some(Roles::Employee),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: Roles,
    pub created: String,
    pub updated: String,
}

/// A persisted chat message, as returned by the history endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRecord {
    pub id: i64,
    pub role_type: RoleType,
    pub content: String,
    pub created: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct IngestedFileRecord {
    pub id: i64,
    pub file_name: String,
    pub file_hash: String,
    pub created: String,
}

/// Question/answer pairs in chronological order; an empty answer means the
/// question was never answered.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatHistory {
    pairs: Vec<(String, String)>,
}

impl ChatHistory {
    /// Insert or overwrite, keeping the position of the latest occurrence.
    pub fn insert(&mut self, question: String, answer: String) {
        self.pairs.retain(|(q, _)| q != &question);
        self.pairs.push((question, answer));
    }

    pub fn get(&self, question: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(q, _)| q == question)
            .map(|(_, a)| a.as_str())
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// The most recent `n` pairs, oldest first.
    pub fn last_pairs(&self, n: usize) -> &[(String, String)] {
        let start = self.pairs.len().saturating_sub(n);
        &self.pairs[start..]
    }
}
