//! Supply-chain nodes whose capacity disruptions reduce.

use serde::{Deserialize, Serialize};

use crate::error::{PortError, PortResult};

/// Kind of supply-chain node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    Port,
    Terminal,
    Yard,
    LandTransport,
    Rail,
    Customs,
    Warehouse,
}

impl NodeKind {
    /// Area label matched against template areas.
    pub fn area(self) -> &'static str {
        match self {
            Self::Port => "port",
            Self::Terminal => "terminal",
            Self::Yard => "yard",
            Self::LandTransport => "land_transport",
            Self::Rail => "rail",
            Self::Customs => "customs",
            Self::Warehouse => "warehouse",
        }
    }

    /// Parses an area label.
    pub fn parse(s: &str) -> Option<Self> {
        [
            Self::Port,
            Self::Terminal,
            Self::Yard,
            Self::LandTransport,
            Self::Rail,
            Self::Customs,
            Self::Warehouse,
        ]
        .into_iter()
        .find(|k| k.area() == s.to_ascii_lowercase())
    }
}

/// A capacity-bearing point in the supply chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupplyChainNode {
    pub id: String,
    pub kind: NodeKind,
    pub region: String,
    pub baseline_capacity: f64,
    pub current_capacity: f64,
    /// Resource pool whose effective capacity follows this node.
    pub bound_pool: Option<String>,
}

impl SupplyChainNode {
    /// Creates a node at full capacity.
    pub fn new(id: impl Into<String>, kind: NodeKind, region: impl Into<String>, baseline: f64) -> Self {
        Self {
            id: id.into(),
            kind,
            region: region.into(),
            baseline_capacity: baseline,
            current_capacity: baseline,
            bound_pool: None,
        }
    }

    /// Binds the node to a resource pool.
    pub fn with_pool(mut self, pool: impl Into<String>) -> Self {
        self.bound_pool = Some(pool.into());
        self
    }

    /// `current / baseline`.
    pub fn capacity_ratio(&self) -> f64 {
        if self.baseline_capacity <= 0.0 {
            return 1.0;
        }
        self.current_capacity / self.baseline_capacity
    }

    pub fn validate(&self) -> PortResult<()> {
        if self.baseline_capacity <= 0.0 {
            return Err(PortError::config(
                format!("node[{}].baseline_capacity", self.id),
                "must be positive",
            ));
        }
        Ok(())
    }
}
