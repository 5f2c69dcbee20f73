//! Document model shared by storage and the REST layer

use serde_json::{Map, Value};

/// A stored JSON document
pub type Document = Map<String, Value>;

/// Document identifier field
pub const ID_FIELD: &str = "_id";
/// Creation timestamp field, RFC 3339
pub const CREATED_AT_FIELD: &str = "createdAt";
/// Internal version field, hidden by default
pub const VERSION_FIELD: &str = "__v";

/// Collections served by the API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Collection {
    Tours,
    Users,
    Reviews,
}

impl Collection {
    pub const ALL: [Collection; 3] = [Self::Tours, Self::Users, Self::Reviews];

    /// Collection name as used in URLs and seed files
    pub fn name(&self) -> &'static str {
        match self {
            Self::Tours => "tours",
            Self::Users => "users",
            Self::Reviews => "reviews",
        }
    }

    /// Singular noun for messages
    pub fn singular(&self) -> &'static str {
        match self {
            Self::Tours => "tour",
            Self::Users => "user",
            Self::Reviews => "review",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.name() == name)
    }
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
