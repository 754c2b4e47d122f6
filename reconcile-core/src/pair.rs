//! Saved connection pairs: two endpoints compared against each other.

use std::fmt;

use serde::Serialize;

use crate::error::{Result, ReconcileError};
use crate::schema::Direction;

/// Default MySQL port.
pub const DEFAULT_PORT: u16 = 3306;

/// Connection details for one side of a pair.
#[derive(Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// Database server hostname.
    pub host: String,
    /// Database server port number.
    pub port: u16,
    /// Schema (database) compared on this side.
    pub schema: String,
    /// User for authentication.
    pub user: String,
    /// Opaque secret for authentication.
    pub password: Option<String>,
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("schema", &self.schema)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}:{}/{}", self.user, self.host, self.port, self.schema)
    }
}

/// One side of a pair, independent of direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PairSide {
    From,
    To,
}

impl fmt::Display for PairSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PairSide::From => write!(f, "from"),
            PairSide::To => write!(f, "to"),
        }
    }
}

/// A labelled pair of endpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionPair {
    /// Identifier used to select the pair.
    pub id: String,
    /// Human-readable label.
    pub label: Option<String>,
    /// The "from" side.
    pub from: Endpoint,
    /// The "to" side.
    pub to: Endpoint,
}

impl ConnectionPair {
    /// `(source, destination)` endpoints for a direction.
    pub fn oriented(&self, direction: Direction) -> (&Endpoint, &Endpoint) {
        direction.orient(&self.from, &self.to)
    }

    /// Endpoint of one side.
    pub fn endpoint(&self, side: PairSide) -> &Endpoint {
        match side {
            PairSide::From => &self.from,
            PairSide::To => &self.to,
        }
    }

    /// Label, falling back to the pair id.
    pub fn display_label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.id)
    }

    /// Summary without secrets, suitable for listing.
    pub fn summary(&self) -> PairSummary {
        PairSummary {
            id: self.id.clone(),
            label: self.display_label().to_string(),
            from: self.from.to_string(),
            to: self.to.to_string(),
        }
    }
}

/// Secret-free view of a pair.
#[derive(Debug, Clone, Serialize)]
pub struct PairSummary {
    /// Pair identifier.
    pub id: String,
    /// Pair label.
    pub label: String,
    /// `user@host:port/schema` of the "from" side.
    pub from: String,
    /// `user@host:port/schema` of the "to" side.
    pub to: String,
}

/// Find a pair by id.
pub fn find<'a>(pairs: &'a [ConnectionPair], id: &str) -> Result<&'a ConnectionPair> {
    pairs
        .iter()
        .find(|p| p.id == id)
        .ok_or_else(|| ReconcileError::PairNotFound {
            id: id.to_string(),
            available: if pairs.is_empty() {
                "(none configured)".to_string()
            } else {
                pairs.iter().map(|p| p.id.as_str()).collect::<Vec<_>>().join(", ")
            },
        })
}
