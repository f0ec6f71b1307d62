//! Typed, directed relationships between papers

use super::paper::PaperId;
use serde::{Deserialize, Serialize};

/// Kind of relationship an edge records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelationshipType {
    /// Citing paper -> cited paper
    Cites,
    /// Queried paper -> one of its embedding neighbors
    Similar,
}

impl RelationshipType {
    pub fn as_str(self) -> &'static str {
        match self {
            RelationshipType::Cites => "CITES",
            RelationshipType::Similar => "SIMILAR",
        }
    }
}

impl std::fmt::Display for RelationshipType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RelationshipType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CITES" => Ok(RelationshipType::Cites),
            "SIMILAR" => Ok(RelationshipType::Similar),
            other => Err(format!("unknown relationship type: {}", other)),
        }
    }
}

/// Identity of an edge in the store: at most one edge exists per key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EdgeKey {
    pub source: PaperId,
    pub target: PaperId,
    pub relationship: RelationshipType,
}

/// A directed edge with a strength in [0.0, 1.0]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub source: PaperId,
    pub target: PaperId,
    pub relationship: RelationshipType,
    pub strength: f32,
}

impl Edge {
    pub fn new(
        source: PaperId,
        target: PaperId,
        relationship: RelationshipType,
        strength: f32,
    ) -> Self {
        Self {
            source,
            target,
            relationship,
            strength,
        }
    }

    pub fn cites(source: PaperId, target: PaperId) -> Self {
        Self::new(source, target, RelationshipType::Cites, 1.0)
    }

    pub fn similar(source: PaperId, target: PaperId, strength: f32) -> Self {
        Self::new(source, target, RelationshipType::Similar, strength)
    }

    pub fn key(&self) -> EdgeKey {
        EdgeKey {
            source: self.source,
            target: self.target,
            relationship: self.relationship,
        }
    }

    pub fn is_self_loop(&self) -> bool {
        self.source == self.target
    }

    /// Check the local invariants an edge must satisfy before it is persisted.
    pub fn validate(&self) -> Result<(), InvalidEdge> {
        if self.is_self_loop() {
            return Err(InvalidEdge::SelfLoop(self.source));
        }
        if !(0.0..=1.0).contains(&self.strength) {
            return Err(InvalidEdge::StrengthOutOfRange(self.strength));
        }
        Ok(())
    }
}

/// Reason an edge was refused before reaching the store
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InvalidEdge {
    #[error("self-loop on paper {0}")]
    SelfLoop(PaperId),

    #[error("strength {0} outside [0, 1]")]
    StrengthOutOfRange(f32),
}
