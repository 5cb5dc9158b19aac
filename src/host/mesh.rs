//! Host mesh: nodes, elements, sub-meshes and groups.
//!
//! This is the surface the tetrahedralization layer reads its input from and
//! writes its output into. Entities are stored in slot maps so keys stay
//! valid while other entities are added or removed.

use crate::core::collections::{FastHashSet, MAX_ELEMENT_NODES, SmallBuffer, StorageMap};
use crate::host::geometry::{GeometryStudy, ShapeKey};
use crate::host::spatial::HashGridIndex;
use serde::{Deserialize, Serialize};
use slotmap::new_key_type;
use std::fmt;
use thiserror::Error;

new_key_type! {
    /// Key identifying a node in a [`Mesh`].
    pub struct NodeKey;

    /// Key identifying an element in a [`Mesh`].
    pub struct ElementKey;
}

/// Entity dimension, ordered from points to volumes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ElementKind {
    /// Point entities.
    Node,
    /// One-dimensional elements.
    Edge,
    /// Two-dimensional elements.
    Face,
    /// Three-dimensional elements.
    Volume,
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Node => "NODE",
            Self::Edge => "EDGE",
            Self::Face => "FACE",
            Self::Volume => "VOLUME",
        };
        f.write_str(label)
    }
}

/// Concrete element geometry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElementType {
    /// Two-node edge.
    Segment,
    /// Three-node face.
    Triangle,
    /// Four-node face.
    Quadrangle,
    /// Four-node volume.
    Tetrahedron,
}

impl ElementType {
    /// Dimension of this element type.
    #[must_use]
    pub const fn kind(self) -> ElementKind {
        match self {
            Self::Segment => ElementKind::Edge,
            Self::Triangle | Self::Quadrangle => ElementKind::Face,
            Self::Tetrahedron => ElementKind::Volume,
        }
    }

    /// Number of corner nodes.
    #[must_use]
    pub const fn node_count(self) -> usize {
        match self {
            Self::Segment => 2,
            Self::Triangle => 3,
            Self::Quadrangle | Self::Tetrahedron => 4,
        }
    }
}

/// Errors raised by mesh mutation.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum MeshError {
    /// A node key does not belong to this mesh.
    #[error("Node {0:?} is not part of the mesh")]
    UnknownNode(NodeKey),
    /// An element key does not belong to this mesh.
    #[error("Element {0:?} is not part of the mesh")]
    UnknownElement(ElementKey),
    /// The connectivity length does not match the element type.
    #[error("{element_type:?} needs {expected} nodes, got {found}")]
    WrongNodeCount {
        /// Requested element type.
        element_type: ElementType,
        /// Nodes required by the type.
        expected: usize,
        /// Nodes supplied.
        found: usize,
    },
    /// A group already exists with a different entity kind.
    #[error("Group '{name}' holds {existing} entities, cannot add {requested}")]
    GroupKindMismatch {
        /// Group name.
        name: String,
        /// Kind the group was created with.
        existing: ElementKind,
        /// Kind of the rejected entity.
        requested: ElementKind,
    },
}

/// A mesh element: type, corner nodes and, for volumes, the domain id.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Element {
    element_type: ElementType,
    nodes: SmallBuffer<NodeKey, MAX_ELEMENT_NODES>,
    domain: Option<u32>,
}

impl Element {
    /// Element type.
    #[must_use]
    pub const fn element_type(&self) -> ElementType {
        self.element_type
    }

    /// Corner nodes in connectivity order.
    #[must_use]
    pub fn nodes(&self) -> &[NodeKey] {
        &self.nodes
    }

    /// Domain id assigned by the engine to volume elements.
    #[must_use]
    pub const fn domain(&self) -> Option<u32> {
        self.domain
    }
}

/// Named set of entities of one kind, kept in insertion order.
#[derive(Clone, Debug, PartialEq)]
pub struct Group {
    name: String,
    kind: ElementKind,
    nodes: Vec<NodeKey>,
    elements: Vec<ElementKey>,
    node_members: FastHashSet<NodeKey>,
    element_members: FastHashSet<ElementKey>,
}

impl Group {
    /// Group name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Entity kind held by this group.
    #[must_use]
    pub const fn kind(&self) -> ElementKind {
        self.kind
    }

    /// Member nodes (only populated for node groups).
    #[must_use]
    pub fn nodes(&self) -> &[NodeKey] {
        &self.nodes
    }

    /// Member elements (only populated for element groups).
    #[must_use]
    pub fn elements(&self) -> &[ElementKey] {
        &self.elements
    }

    /// Number of members.
    #[must_use]
    pub fn len(&self) -> usize {
        if self.kind == ElementKind::Node {
            self.nodes.len()
        } else {
            self.elements.len()
        }
    }

    /// Returns `true` if the group has no members.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-memory mesh with optional governing shape.
#[derive(Clone, Debug, Default)]
pub struct Mesh {
    name: String,
    shape: Option<ShapeKey>,
    sub_shapes: Vec<ShapeKey>,
    nodes: StorageMap<NodeKey, [f64; 3]>,
    elements: StorageMap<ElementKey, Element>,
    sub_meshes: Vec<(String, Vec<ElementKey>)>,
    groups: Vec<Group>,
}

impl Mesh {
    /// Creates an empty mesh without a governing shape.
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            ..Self::default()
        }
    }

    /// Creates an empty mesh governed by `shape` from `study`.
    #[must_use]
    pub fn with_shape(name: &str, study: &GeometryStudy, shape: ShapeKey) -> Self {
        Self {
            name: name.to_owned(),
            shape: Some(shape),
            sub_shapes: study.sub_shapes(shape),
            ..Self::default()
        }
    }

    /// Mesh name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Governing shape, if any.
    #[must_use]
    pub const fn shape(&self) -> Option<ShapeKey> {
        self.shape
    }

    /// Returns `true` if `key` is a sub-shape of the governing shape.
    #[must_use]
    pub fn has_sub_shape(&self, key: ShapeKey) -> bool {
        self.sub_shapes.contains(&key)
    }

    // =========================================================================
    // NODES AND ELEMENTS
    // =========================================================================

    /// Adds a node.
    pub fn add_node(&mut self, coords: [f64; 3]) -> NodeKey {
        self.nodes.insert(coords)
    }

    /// Coordinates of `key`.
    #[must_use]
    pub fn node(&self, key: NodeKey) -> Option<[f64; 3]> {
        self.nodes.get(key).copied()
    }

    /// Iterates over all nodes.
    pub fn nodes(&self) -> impl Iterator<Item = (NodeKey, [f64; 3])> + '_ {
        self.nodes.iter().map(|(k, c)| (k, *c))
    }

    /// Number of nodes.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Adds an element of `element_type` over `nodes`.
    ///
    /// # Errors
    ///
    /// Returns [`MeshError::WrongNodeCount`] or [`MeshError::UnknownNode`].
    pub fn add_element(
        &mut self,
        element_type: ElementType,
        nodes: &[NodeKey],
    ) -> Result<ElementKey, MeshError> {
        self.insert_element(element_type, nodes, None)
    }

    /// Adds a tetrahedron tagged with the engine's domain id.
    ///
    /// # Errors
    ///
    /// Returns [`MeshError::UnknownNode`] if a corner is not in the mesh.
    pub fn add_tetrahedron(
        &mut self,
        nodes: [NodeKey; 4],
        domain: u32,
    ) -> Result<ElementKey, MeshError> {
        self.insert_element(ElementType::Tetrahedron, &nodes, Some(domain))
    }

    fn insert_element(
        &mut self,
        element_type: ElementType,
        nodes: &[NodeKey],
        domain: Option<u32>,
    ) -> Result<ElementKey, MeshError> {
        if nodes.len() != element_type.node_count() {
            return Err(MeshError::WrongNodeCount {
                element_type,
                expected: element_type.node_count(),
                found: nodes.len(),
            });
        }
        if let Some(&missing) = nodes.iter().find(|n| !self.nodes.contains_key(**n)) {
            return Err(MeshError::UnknownNode(missing));
        }
        Ok(self.elements.insert(Element {
            element_type,
            nodes: nodes.iter().copied().collect(),
            domain,
        }))
    }

    /// Looks up an element.
    #[must_use]
    pub fn element(&self, key: ElementKey) -> Option<&Element> {
        self.elements.get(key)
    }

    /// Iterates over all elements.
    pub fn elements(&self) -> impl Iterator<Item = (ElementKey, &Element)> {
        self.elements.iter()
    }

    /// Number of elements.
    #[must_use]
    pub fn element_count(&self) -> usize {
        self.elements.len()
    }

    /// Number of elements of `element_type`.
    #[must_use]
    pub fn count_of(&self, element_type: ElementType) -> usize {
        self.elements
            .values()
            .filter(|e| e.element_type == element_type)
            .count()
    }

    /// Highest entity kind present: `None` for an empty mesh, `Node` for a
    /// node-only mesh.
    #[must_use]
    pub fn highest_kind(&self) -> Option<ElementKind> {
        let highest = self.elements.values().map(|e| e.element_type.kind()).max();
        highest.or_else(|| (!self.nodes.is_empty()).then_some(ElementKind::Node))
    }

    /// Removes every element of `element_type` and drops it from sub-meshes
    /// and groups. Nodes are kept. Returns the number of removed elements.
    pub fn remove_elements_of(&mut self, element_type: ElementType) -> usize {
        let before = self.elements.len();
        self.elements.retain(|_, e| e.element_type != element_type);
        let removed = before - self.elements.len();
        if removed > 0 {
            let elements = &self.elements;
            for (_, members) in &mut self.sub_meshes {
                members.retain(|e| elements.contains_key(*e));
            }
            for group in &mut self.groups {
                group.elements.retain(|e| elements.contains_key(*e));
                group.element_members.retain(|e| elements.contains_key(*e));
            }
        }
        removed
    }

    // =========================================================================
    // SUB-MESHES AND GROUPS
    // =========================================================================

    /// Registers a named sub-mesh over existing elements.
    ///
    /// # Errors
    ///
    /// Returns [`MeshError::UnknownElement`] if an element is not in the mesh.
    pub fn add_sub_mesh(&mut self, name: &str, elements: Vec<ElementKey>) -> Result<(), MeshError> {
        if let Some(&missing) = elements.iter().find(|e| !self.elements.contains_key(**e)) {
            return Err(MeshError::UnknownElement(missing));
        }
        self.sub_meshes.retain(|(n, _)| n != name);
        self.sub_meshes.push((name.to_owned(), elements));
        Ok(())
    }

    /// Elements of the named sub-mesh.
    #[must_use]
    pub fn sub_mesh(&self, name: &str) -> Option<&[ElementKey]> {
        self.sub_meshes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, e)| e.as_slice())
    }

    /// Looks up a group by name.
    #[must_use]
    pub fn group(&self, name: &str) -> Option<&Group> {
        self.groups.iter().find(|g| g.name == name)
    }

    /// All groups in creation order.
    #[must_use]
    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    fn group_entry(&mut self, name: &str, kind: ElementKind) -> Result<&mut Group, MeshError> {
        let index = match self.groups.iter().position(|g| g.name == name) {
            Some(i) if self.groups[i].kind != kind => {
                return Err(MeshError::GroupKindMismatch {
                    name: name.to_owned(),
                    existing: self.groups[i].kind,
                    requested: kind,
                });
            }
            Some(i) => i,
            None => {
                self.groups.push(Group {
                    name: name.to_owned(),
                    kind,
                    nodes: Vec::new(),
                    elements: Vec::new(),
                    node_members: FastHashSet::default(),
                    element_members: FastHashSet::default(),
                });
                self.groups.len() - 1
            }
        };
        Ok(&mut self.groups[index])
    }

    /// Adds `node` to the node group `name`, creating it if needed.
    /// Adding an existing member is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`MeshError::UnknownNode`] or [`MeshError::GroupKindMismatch`].
    pub fn add_node_to_group(&mut self, name: &str, node: NodeKey) -> Result<(), MeshError> {
        if !self.nodes.contains_key(node) {
            return Err(MeshError::UnknownNode(node));
        }
        let group = self.group_entry(name, ElementKind::Node)?;
        if group.node_members.insert(node) {
            group.nodes.push(node);
        }
        Ok(())
    }

    /// Adds `element` to the group `name`, creating it with the element's kind
    /// if needed. Adding an existing member is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`MeshError::UnknownElement`] or [`MeshError::GroupKindMismatch`].
    pub fn add_element_to_group(&mut self, name: &str, element: ElementKey) -> Result<(), MeshError> {
        let kind = self
            .elements
            .get(element)
            .map(|e| e.element_type.kind())
            .ok_or(MeshError::UnknownElement(element))?;
        let group = self.group_entry(name, kind)?;
        if group.element_members.insert(element) {
            group.elements.push(element);
        }
        Ok(())
    }

    // =========================================================================
    // COINCIDENT NODES
    // =========================================================================

    /// Clusters of two or more nodes lying within `tolerance` of a cluster seed.
    ///
    /// Nodes are visited in storage order; each unassigned node seeds a
    /// cluster with every other unassigned node within `tolerance` of it.
    #[must_use]
    pub fn find_coincident_nodes(&self, tolerance: f64) -> Vec<Vec<NodeKey>> {
        let tolerance = tolerance.max(0.0);
        // A zero cell size disables the grid; keep a tiny floor for exact matches.
        let mut grid: HashGridIndex<NodeKey> = HashGridIndex::new(tolerance.max(f64::EPSILON));
        for (key, coords) in &self.nodes {
            grid.insert(key, *coords);
        }

        let mut assigned: FastHashSet<NodeKey> = FastHashSet::default();
        let mut clusters = Vec::new();
        for (seed, coords) in &self.nodes {
            if assigned.contains(&seed) {
                continue;
            }
            let mut cluster: Vec<NodeKey> = if grid.is_usable() {
                grid.within(*coords, tolerance)
                    .into_iter()
                    .map(|(k, _)| k)
                    .collect()
            } else {
                self.nodes
                    .iter()
                    .filter(|(_, c)| {
                        crate::core::util::squared_distance(**c, *coords) <= tolerance * tolerance
                    })
                    .map(|(k, _)| k)
                    .collect()
            };
            cluster.retain(|k| *k == seed || !assigned.contains(k));
            if cluster.len() > 1 {
                assigned.extend(cluster.iter().copied());
                clusters.push(cluster);
            } else {
                assigned.insert(seed);
            }
        }
        clusters
    }
}
