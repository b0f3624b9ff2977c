//! Scripted patrol graph laid down by the map designer.

use serde::{Deserialize, Serialize};

use crate::geometry::Position;

/// Index into a [`WaypointGraph`].
pub type NodeId = usize;

/// One patrol node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Waypoint {
    /// Tile the node sits on.
    pub position: Position,
    /// Nodes reachable from this one.
    #[serde(default)]
    pub links: Vec<NodeId>,
    /// Only scouting units may pick this node.
    #[serde(default)]
    pub scout_only: bool,
    /// Preference weight; higher nodes are chosen first.
    #[serde(default)]
    pub priority: u32,
    /// Node sits in a spot only 1×1 units fit.
    #[serde(default)]
    pub small_only: bool,
}

impl Waypoint {
    /// Node with no links.
    #[must_use]
    pub const fn new(position: Position) -> Self {
        Self {
            position,
            links: Vec::new(),
            scout_only: false,
            priority: 0,
            small_only: false,
        }
    }

    /// Whether a unit with the given traits may patrol to this node.
    #[must_use]
    pub const fn admits(&self, scout: bool, size: i32) -> bool {
        (scout || !self.scout_only) && (size <= 1 || !self.small_only)
    }
}

/// The patrol graph of a battlefield.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaypointGraph {
    nodes: Vec<Waypoint>,
}

impl WaypointGraph {
    /// Empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node and return its id.
    pub fn add(&mut self, node: Waypoint) -> NodeId {
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    /// Link two nodes in both directions.
    pub fn link(&mut self, a: NodeId, b: NodeId) {
        if a == b || a >= self.nodes.len() || b >= self.nodes.len() {
            return;
        }
        if !self.nodes[a].links.contains(&b) {
            self.nodes[a].links.push(b);
        }
        if !self.nodes[b].links.contains(&a) {
            self.nodes[b].links.push(a);
        }
    }

    /// Look up a node.
    #[must_use]
    pub fn get(&self, id: NodeId) -> Option<&Waypoint> {
        self.nodes.get(id)
    }

    /// Number of nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True when the map has no patrol graph.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Iterate `(id, node)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &Waypoint)> {
        self.nodes.iter().enumerate()
    }

    /// Node closest to a tile on the same level, ties to the lower id.
    #[must_use]
    pub fn nearest(&self, pos: Position) -> Option<NodeId> {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| n.position.z == pos.z)
            .min_by_key(|(id, n)| (n.position.distance_sq_2d(pos), *id))
            .map(|(id, _)| id)
    }
}
