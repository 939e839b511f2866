//! Entity identity, attributes and the reconstructed parent/child graph.

use std::collections::HashMap;

use crate::block::EntityDef;
use crate::types::{FrameIndex, Transform};

/// Stable integer identity of a recorded entity.
///
/// Ids are writer-assigned sequentially starting at 1; id 0 is reserved for
/// "no entity" (global events not attached to anything). All per-entity
/// series key on this id rather than on the `Entity` value itself, so a
/// later redefinition of the entity never invalidates existing series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntityId(pub u32);

impl EntityId {
    /// The reserved "no entity" id carried by global records.
    pub const GLOBAL: EntityId = EntityId(0);

    /// `None` for the reserved global id, `Some` otherwise.
    pub fn checked(self) -> Option<EntityId> {
        (self != Self::GLOBAL).then_some(self)
    }
}

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A recorded entity with its static attributes and reader-side flags.
///
/// The flags are set opportunistically while records are decoded; views use
/// them to skip rendering empty tracks.
#[derive(Debug, Clone)]
pub struct Entity {
    pub id: EntityId,
    pub name: String,
    pub path: String,
    pub type_name: String,
    pub category_name: String,
    pub initial_transform: Transform,
    pub static_parameters: HashMap<String, String>,
    /// Frame of the entity's first definition.
    pub creation_frame: FrameIndex,
    /// Frame of the most recent (re)definition; differs from
    /// `creation_frame` after an override.
    pub registration_frame: FrameIndex,
    pub parent_id: Option<EntityId>,

    pub has_transforms: bool,
    pub has_logs: bool,
    pub has_logs_past_first_frame: bool,
    pub has_draws: bool,
    pub has_mesh: bool,
    pub has_parameters: bool,
    pub has_numeric_parameters: bool,
}

impl Entity {
    /// Creates a fresh entity from a definition record.
    pub fn from_def(id: EntityId, def: EntityDef, parent_id: Option<EntityId>, frame: FrameIndex) -> Self {
        Self {
            id,
            name: def.name,
            path: def.path,
            type_name: def.type_name,
            category_name: def.category_name,
            initial_transform: def.initial_transform,
            static_parameters: def.static_parameters,
            creation_frame: def.creation_frame,
            registration_frame: frame,
            parent_id,
            has_transforms: false,
            has_logs: false,
            has_logs_past_first_frame: false,
            has_draws: false,
            has_mesh: false,
            has_parameters: false,
            has_numeric_parameters: false,
        }
    }

    /// Applies a redefinition in place.
    ///
    /// Identity and `creation_frame` are stable once first seen; a later
    /// definition record for the same id overrides the mutable attributes
    /// and stamps `registration_frame`, keeping every already-indexed
    /// series valid.
    pub fn redefine(&mut self, def: EntityDef, parent_id: Option<EntityId>, frame: FrameIndex) {
        self.name = def.name;
        self.path = def.path;
        self.type_name = def.type_name;
        self.category_name = def.category_name;
        self.initial_transform = def.initial_transform;
        self.static_parameters = def.static_parameters;
        self.registration_frame = frame;
        if parent_id.is_some() {
            self.parent_id = parent_id;
        }
    }
}

/// Index of a node inside an [`EntityGraph`].
pub type NodeIndex = usize;

#[derive(Debug, Clone)]
struct GraphNode {
    entity: Option<EntityId>,
    parent_id: Option<EntityId>,
    parent: NodeIndex,
    children: Vec<NodeIndex>,
}

/// The reconstructed parent/child entity tree.
///
/// Built by repeated insertion and tolerant of forward references: a child
/// whose parent has not been seen yet is parked under the root and
/// re-parented once the real parent arrives. Construction is O(n) per
/// insert in the worst case, which is acceptable since the graph is built
/// exactly once at load time.
#[derive(Debug, Clone)]
pub struct EntityGraph {
    nodes: Vec<GraphNode>,
}

impl Default for EntityGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl EntityGraph {
    /// The root node, which wraps no entity.
    pub const ROOT: NodeIndex = 0;

    pub fn new() -> Self {
        Self {
            nodes: vec![GraphNode {
                entity: None,
                parent_id: None,
                parent: Self::ROOT,
                children: Vec::new(),
            }],
        }
    }

    /// Inserts an entity, attaching it under its parent's node when the
    /// parent is already present, or provisionally under the root when it
    /// is not. Any previously inserted node waiting for this entity as its
    /// parent is re-parented under the new node, which makes insertion
    /// order-independent.
    pub fn insert(&mut self, id: EntityId, parent_id: Option<EntityId>) {
        let attach_to = parent_id
            .and_then(|pid| self.find(pid))
            .unwrap_or(Self::ROOT);

        let index = self.nodes.len();
        self.nodes.push(GraphNode {
            entity: Some(id),
            parent_id,
            parent: attach_to,
            children: Vec::new(),
        });
        self.nodes[attach_to].children.push(index);

        // Adopt earlier arrivals that referenced this entity as parent.
        let orphans: Vec<NodeIndex> = (0..index)
            .filter(|&n| n != Self::ROOT && self.nodes[n].parent_id == Some(id))
            .collect();
        for orphan in orphans {
            let old_parent = self.nodes[orphan].parent;
            self.nodes[old_parent].children.retain(|&c| c != orphan);
            self.nodes[orphan].parent = index;
            self.nodes[index].children.push(orphan);
        }
    }

    fn find(&self, id: EntityId) -> Option<NodeIndex> {
        self.nodes.iter().position(|n| n.entity == Some(id))
    }

    pub fn entity_at(&self, node: NodeIndex) -> Option<EntityId> {
        self.nodes.get(node).and_then(|n| n.entity)
    }

    pub fn parent_of(&self, node: NodeIndex) -> Option<NodeIndex> {
        (node != Self::ROOT).then(|| self.nodes[node].parent)
    }

    pub fn children_of(&self, node: NodeIndex) -> &[NodeIndex] {
        &self.nodes[node].children
    }

    /// Number of entities in the graph (the root is not counted).
    pub fn len(&self) -> usize {
        self.nodes.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() == 1
    }

    /// Depth-first traversal from the root, yielding each node index and
    /// its depth (root children are depth 0). Every inserted entity is
    /// visited exactly once.
    pub fn depth_first(&self) -> DepthFirst<'_> {
        let mut stack: Vec<(NodeIndex, usize)> = self.nodes[Self::ROOT]
            .children
            .iter()
            .rev()
            .map(|&c| (c, 0))
            .collect();
        stack.reverse();
        DepthFirst { graph: self, stack }
    }

    /// Depth-first traversal over entity ids only.
    pub fn entities(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.depth_first().filter_map(|(node, _)| self.entity_at(node))
    }
}

/// Iterator returned by [`EntityGraph::depth_first`].
pub struct DepthFirst<'a> {
    graph: &'a EntityGraph,
    stack: Vec<(NodeIndex, usize)>,
}

impl Iterator for DepthFirst<'_> {
    type Item = (NodeIndex, usize);

    fn next(&mut self) -> Option<Self::Item> {
        let (node, depth) = self.stack.pop()?;
        for &child in self.graph.nodes[node].children.iter().rev() {
            self.stack.push((child, depth + 1));
        }
        Some((node, depth))
    }
}
