//! Enforced-vertex and enforced-mesh constraint bookkeeping.
//!
//! The registry keeps two independent enforced-vertex keyspaces:
//!
//! - coordinate entries, keyed by the exact `(x, y, z)` triple (`-0.0 == 0.0`)
//! - geometry entries, keyed by the published entry name of the shape
//!
//! Re-adding an existing key updates its name, group and size. Enforced
//! meshes are snapshots of a source mesh, sub-mesh or group taken at
//! registration time.

use crate::core::collections::{FastHashMap, FastHashSet};
use crate::core::error::ConfigurationError;
use crate::core::util::{CoordKey, is_finite_point};
use crate::host::geometry::{GeometryStudy, ShapeKey};
use crate::host::mesh::{Element, ElementKind, ElementType, Mesh, NodeKey};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::borrow::Borrow;
use std::fmt;
use std::hash::Hash;

/// Prefix of names generated when publishing unpublished enforced geometry.
pub const GENERATED_ENTRY_PREFIX: &str = "EnforcedVertex_";

/// How the algorithm relates to the mesh's governing shape.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShapeMode {
    /// The mesh has no governing shape.
    GeometryFree,
    /// Attached to the mesh's whole shape.
    MainShape,
    /// Attached to one sub-shape of the mesh's shape.
    SubShape(ShapeKey),
}

impl fmt::Display for ShapeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::GeometryFree => "geometry-free",
            Self::MainShape => "main-shape",
            Self::SubShape(_) => "sub-shape",
        })
    }
}

// =============================================================================
// ENFORCED VERTICES
// =============================================================================

/// Where an enforced vertex comes from.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum VertexLocation {
    /// Raw coordinates.
    Coordinates([f64; 3]),
    /// A published geometric vertex or compound of vertices.
    Geometry {
        /// Published entry name.
        entry: String,
        /// Resolved vertex positions.
        points: Vec<[f64; 3]>,
    },
}

/// The six distinguishable enforced-vertex states.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EnforcedVertexKind {
    /// Coordinates only.
    Bare,
    /// Coordinates with a display name.
    Named,
    /// Coordinates with a destination group.
    Grouped,
    /// Coordinates with a display name and a destination group.
    NamedGrouped,
    /// Geometry reference.
    Geometry,
    /// Geometry reference with a destination group.
    GeometryGrouped,
}

/// A point constraint.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EnforcedVertex {
    location: VertexLocation,
    name: Option<String>,
    group: Option<String>,
    size: f64,
}

impl EnforcedVertex {
    /// Where the vertex comes from.
    #[must_use]
    pub const fn location(&self) -> &VertexLocation {
        &self.location
    }

    /// Display name (coordinate entries only).
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Destination group for the result node(s).
    #[must_use]
    pub fn group(&self) -> Option<&str> {
        self.group.as_deref()
    }

    /// Local element size near the vertex.
    #[must_use]
    pub const fn size(&self) -> f64 {
        self.size
    }

    /// Which of the six entry kinds this is.
    #[must_use]
    pub const fn kind(&self) -> EnforcedVertexKind {
        match (&self.location, self.name.is_some(), self.group.is_some()) {
            (VertexLocation::Coordinates(_), false, false) => EnforcedVertexKind::Bare,
            (VertexLocation::Coordinates(_), true, false) => EnforcedVertexKind::Named,
            (VertexLocation::Coordinates(_), false, true) => EnforcedVertexKind::Grouped,
            (VertexLocation::Coordinates(_), true, true) => EnforcedVertexKind::NamedGrouped,
            (VertexLocation::Geometry { .. }, _, false) => EnforcedVertexKind::Geometry,
            (VertexLocation::Geometry { .. }, _, true) => EnforcedVertexKind::GeometryGrouped,
        }
    }

    /// Points the engine must reproduce.
    #[must_use]
    pub fn points(&self) -> &[[f64; 3]] {
        match &self.location {
            VertexLocation::Coordinates(p) => std::slice::from_ref(p),
            VertexLocation::Geometry { points, .. } => points,
        }
    }
}

// =============================================================================
// ENFORCED MESHES
// =============================================================================

/// Local size near an enforced mesh.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum SizeOverride {
    /// Use the size implied by the constraint itself.
    Natural,
    /// Override the local size.
    Local(f64),
}

impl SizeOverride {
    /// A negative size means no override.
    #[must_use]
    pub fn from_size(size: f64) -> Self {
        if size < 0.0 {
            Self::Natural
        } else {
            Self::Local(size)
        }
    }
}

/// Engine-facing encoding of an enforced mesh: size override by group presence.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EnforcedMeshEncoding {
    /// Natural size, results not collected.
    Plain,
    /// Natural size, results collected into a group.
    WithGroup,
    /// Local size override, results not collected.
    Sized,
    /// Local size override, results collected into a group.
    SizedWithGroup,
}

/// Where an enforced mesh is read from.
#[derive(Clone, Copy, Debug)]
pub enum MeshSource<'a> {
    /// Every node and element of a mesh.
    Mesh(&'a Mesh),
    /// A named sub-mesh.
    SubMesh(&'a Mesh, &'a str),
    /// A named group.
    Group(&'a Mesh, &'a str),
}

impl MeshSource<'_> {
    /// Label recorded with the constraint.
    #[must_use]
    pub fn label(&self) -> String {
        match self {
            Self::Mesh(mesh) => mesh.name().to_owned(),
            Self::SubMesh(mesh, name) | Self::Group(mesh, name) => {
                format!("{}/{name}", mesh.name())
            }
        }
    }

    fn resolve(&self) -> Result<(&Mesh, Vec<&Element>, Vec<NodeKey>), ConfigurationError> {
        let missing = |what: &str| {
            ConfigurationError::invalid("source", self.label(), &format!("no such {what}"))
        };
        match *self {
            Self::Mesh(mesh) => Ok((
                mesh,
                mesh.elements().map(|(_, e)| e).collect(),
                mesh.nodes().map(|(k, _)| k).collect(),
            )),
            Self::SubMesh(mesh, name) => {
                let keys = mesh.sub_mesh(name).ok_or_else(|| missing("sub-mesh"))?;
                Ok((mesh, keys.iter().filter_map(|k| mesh.element(*k)).collect(), Vec::new()))
            }
            Self::Group(mesh, name) => {
                let group = mesh.group(name).ok_or_else(|| missing("group"))?;
                let elements = group.elements().iter().filter_map(|k| mesh.element(*k)).collect();
                Ok((mesh, elements, group.nodes().to_vec()))
            }
        }
    }
}

/// A reference mesh whose entities must reappear in the result.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EnforcedMeshConstraint {
    source: String,
    element_kind: ElementKind,
    size: SizeOverride,
    group: Option<String>,
    nodes: Vec<[f64; 3]>,
    edges: Vec<[[f64; 3]; 2]>,
    triangles: Vec<[[f64; 3]; 3]>,
}

impl EnforcedMeshConstraint {
    /// Source label.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Enforced entity kind.
    #[must_use]
    pub const fn element_kind(&self) -> ElementKind {
        self.element_kind
    }

    /// Size override.
    #[must_use]
    pub const fn size(&self) -> SizeOverride {
        self.size
    }

    /// Destination group for matched result entities.
    #[must_use]
    pub fn group(&self) -> Option<&str> {
        self.group.as_deref()
    }

    /// Enforced node positions (node constraints).
    #[must_use]
    pub fn nodes(&self) -> &[[f64; 3]] {
        &self.nodes
    }

    /// Enforced segments (edge constraints).
    #[must_use]
    pub fn edges(&self) -> &[[[f64; 3]; 2]] {
        &self.edges
    }

    /// Enforced triangles (face constraints).
    #[must_use]
    pub fn triangles(&self) -> &[[[f64; 3]; 3]] {
        &self.triangles
    }

    /// Number of enforced entities of [`Self::element_kind`].
    #[must_use]
    pub fn entity_count(&self) -> usize {
        match self.element_kind {
            ElementKind::Node => self.nodes.len(),
            ElementKind::Edge => self.edges.len(),
            _ => self.triangles.len(),
        }
    }

    /// Engine-facing encoding.
    #[must_use]
    pub const fn encoding(&self) -> EnforcedMeshEncoding {
        match (self.size, self.group.is_some()) {
            (SizeOverride::Natural, false) => EnforcedMeshEncoding::Plain,
            (SizeOverride::Natural, true) => EnforcedMeshEncoding::WithGroup,
            (SizeOverride::Local(_), false) => EnforcedMeshEncoding::Sized,
            (SizeOverride::Local(_), true) => EnforcedMeshEncoding::SizedWithGroup,
        }
    }
}

// =============================================================================
// REGISTRY
// =============================================================================

/// Key of one enforced-vertex keyspace.
trait VertexKey: Clone + Eq + Hash {
    fn of(vertex: &EnforcedVertex) -> Option<Self>;
}

impl VertexKey for CoordKey {
    fn of(vertex: &EnforcedVertex) -> Option<Self> {
        match vertex.location {
            VertexLocation::Coordinates(p) => Some(Self::new(p)),
            VertexLocation::Geometry { .. } => None,
        }
    }
}

impl VertexKey for String {
    fn of(vertex: &EnforcedVertex) -> Option<Self> {
        match &vertex.location {
            VertexLocation::Geometry { entry, .. } => Some(entry.clone()),
            VertexLocation::Coordinates(_) => None,
        }
    }
}

/// Enforced vertices in insertion order with a hashed key index.
///
/// Serialized as the plain entry list; the index is rebuilt on load.
#[derive(Clone, Debug)]
struct VertexTable<K> {
    entries: Vec<EnforcedVertex>,
    index: FastHashMap<K, usize>,
}

impl<K: VertexKey> VertexTable<K> {
    fn new() -> Self {
        Self {
            entries: Vec::new(),
            index: FastHashMap::default(),
        }
    }

    /// Inserts `vertex` under `key`, replacing an existing entry in place.
    fn upsert(&mut self, key: K, vertex: EnforcedVertex) {
        match self.index.get(&key) {
            Some(&i) => self.entries[i] = vertex,
            None => {
                self.index.insert(key, self.entries.len());
                self.entries.push(vertex);
            }
        }
    }

    fn get<Q>(&self, key: &Q) -> Option<&EnforcedVertex>
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        self.index.get(key).map(|&i| &self.entries[i])
    }

    fn remove<Q>(&mut self, key: &Q) -> Option<EnforcedVertex>
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        let removed = self.index.remove(key)?;
        for i in self.index.values_mut() {
            if *i > removed {
                *i -= 1;
            }
        }
        Some(self.entries.remove(removed))
    }

    fn clear(&mut self) {
        self.entries.clear();
        self.index.clear();
    }
}

impl<K: VertexKey> From<Vec<EnforcedVertex>> for VertexTable<K> {
    fn from(entries: Vec<EnforcedVertex>) -> Self {
        let mut table = Self::new();
        for vertex in entries {
            if let Some(key) = K::of(&vertex) {
                table.upsert(key, vertex);
            }
        }
        table
    }
}

impl<K> PartialEq for VertexTable<K> {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

impl<K> Serialize for VertexTable<K> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.entries.serialize(serializer)
    }
}

impl<'de, K: VertexKey> Deserialize<'de> for VertexTable<K> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Vec::<EnforcedVertex>::deserialize(deserializer).map(Self::from)
    }
}

/// Enforced constraints of one generation algorithm.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConstraintRegistry {
    mode: ShapeMode,
    coordinate_vertices: VertexTable<CoordKey>,
    geometry_vertices: VertexTable<String>,
    meshes: Vec<EnforcedMeshConstraint>,
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value.filter(|v| !v.is_empty()).map(str::to_owned)
}

fn check_size(size: f64) -> Result<(), ConfigurationError> {
    if size.is_finite() && size >= 0.0 {
        Ok(())
    } else {
        Err(ConfigurationError::invalid(
            "size",
            size,
            "must be finite and non-negative",
        ))
    }
}

impl ConstraintRegistry {
    /// Creates an empty registry for an algorithm in `mode`.
    #[must_use]
    pub fn new(mode: ShapeMode) -> Self {
        Self {
            mode,
            coordinate_vertices: VertexTable::new(),
            geometry_vertices: VertexTable::new(),
            meshes: Vec::new(),
        }
    }

    /// Shape mode the registry validates against.
    #[must_use]
    pub const fn mode(&self) -> ShapeMode {
        self.mode
    }

    /// Registers a point constraint at `(x, y, z)`.
    ///
    /// Empty `name` or `group` strings count as absent. Returns the kind of
    /// the stored entry.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::InvalidParameter`] for non-finite
    /// coordinates or a negative or non-finite size.
    pub fn add_enforced_vertex_by_coordinate(
        &mut self,
        x: f64,
        y: f64,
        z: f64,
        size: f64,
        name: Option<&str>,
        group: Option<&str>,
    ) -> Result<EnforcedVertexKind, ConfigurationError> {
        let point = [x, y, z];
        if !is_finite_point(point) {
            return Err(ConfigurationError::invalid(
                "coordinates",
                format!("({x}, {y}, {z})"),
                "must be finite",
            ));
        }
        check_size(size)?;

        let vertex = EnforcedVertex {
            location: VertexLocation::Coordinates(point),
            name: non_empty(name),
            group: non_empty(group),
            size,
        };
        let kind = vertex.kind();
        self.coordinate_vertices.upsert(CoordKey::new(point), vertex);
        tracing::debug!(x, y, z, size, ?kind, "enforced vertex set");
        Ok(kind)
    }

    /// Registers a point constraint for a geometric vertex or compound of
    /// vertices, publishing the shape under a generated name if needed.
    ///
    /// Returns the published entry name.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::IncompatibleShapeMode`] on a sub-shape,
    /// [`ConfigurationError::InvalidGeometry`] if the shape is not a vertex or
    /// compound of vertices, or [`ConfigurationError::InvalidParameter`] for a
    /// bad size.
    pub fn add_enforced_vertex_by_geometry(
        &mut self,
        study: &mut GeometryStudy,
        shape: ShapeKey,
        size: f64,
        group: Option<&str>,
    ) -> Result<String, ConfigurationError> {
        if matches!(self.mode, ShapeMode::SubShape(_)) {
            return Err(ConfigurationError::IncompatibleShapeMode {
                operation: "add_enforced_vertex_by_geometry",
                mode: self.mode,
            });
        }
        check_size(size)?;
        let points = study.vertex_points(shape)?;

        let entry = match study.published_name(shape) {
            Some(name) => name.to_owned(),
            None => {
                let name = (study.published_count() + 1..)
                    .map(|n| format!("{GENERATED_ENTRY_PREFIX}{n}"))
                    .find(|candidate| study.find_published(candidate).is_none())
                    .unwrap_or_else(|| GENERATED_ENTRY_PREFIX.to_owned());
                study.publish(shape, &name)?;
                tracing::info!(entry = %name, "published enforced vertex geometry");
                name
            }
        };

        let vertex = EnforcedVertex {
            location: VertexLocation::Geometry {
                entry: entry.clone(),
                points,
            },
            name: None,
            group: non_empty(group),
            size,
        };
        self.geometry_vertices.upsert(entry.clone(), vertex);
        tracing::debug!(entry = %entry, size, "enforced geometry vertex set");
        Ok(entry)
    }

    /// Removes the coordinate entry at exactly `(x, y, z)`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::EnforcedVertexNotFound`] if there is none.
    pub fn remove_enforced_vertex_by_coordinate(
        &mut self,
        x: f64,
        y: f64,
        z: f64,
    ) -> Result<EnforcedVertex, ConfigurationError> {
        self.coordinate_vertices
            .remove(&CoordKey::new([x, y, z]))
            .ok_or_else(|| ConfigurationError::EnforcedVertexNotFound {
                key: format!("({x}, {y}, {z})"),
            })
    }

    /// Removes the geometry entry for `shape`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::EnforcedVertexNotFound`] if the shape is
    /// unpublished or has no entry.
    pub fn remove_enforced_vertex_by_geometry(
        &mut self,
        study: &GeometryStudy,
        shape: ShapeKey,
    ) -> Result<EnforcedVertex, ConfigurationError> {
        let not_found = || ConfigurationError::EnforcedVertexNotFound {
            key: format!("{shape:?}"),
        };
        let entry = study.published_name(shape).ok_or_else(not_found)?;
        self.geometry_vertices.remove(entry).ok_or_else(not_found)
    }

    /// Removes every enforced vertex of either form. Enforced meshes are kept.
    pub fn clear_enforced_vertices(&mut self) {
        self.coordinate_vertices.clear();
        self.geometry_vertices.clear();
    }

    /// Removes every enforced mesh. Enforced vertices are kept.
    pub fn clear_enforced_meshes(&mut self) {
        self.meshes.clear();
    }

    /// Registers the entities of `source` of kind `element_kind` as enforced.
    ///
    /// A negative `size` means no local-size override; an empty `group`
    /// means results are not collected. Quadrangles are not enforced as
    /// faces. Returns the engine-facing encoding.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::IncompatibleShapeMode`] unless the mesh is
    /// geometry-free, [`ConfigurationError::SourceKindMismatch`] if the source
    /// lacks entities of that kind, and
    /// [`ConfigurationError::InvalidParameter`] for a NaN size, a volume kind
    /// or a missing sub-mesh or group.
    pub fn add_enforced_mesh(
        &mut self,
        source: MeshSource<'_>,
        element_kind: ElementKind,
        size: f64,
        group: &str,
    ) -> Result<EnforcedMeshEncoding, ConfigurationError> {
        if self.mode != ShapeMode::GeometryFree {
            return Err(ConfigurationError::IncompatibleShapeMode {
                operation: "add_enforced_mesh",
                mode: self.mode,
            });
        }
        if size.is_nan() {
            return Err(ConfigurationError::invalid("size", size, "must not be NaN"));
        }
        if element_kind == ElementKind::Volume {
            return Err(ConfigurationError::invalid(
                "element_kind",
                element_kind,
                "only NODE, EDGE and FACE can be enforced",
            ));
        }

        let label = source.label();
        let (mesh, elements, group_nodes) = source.resolve()?;
        let available = elements
            .iter()
            .map(|e| e.element_type().kind())
            .max()
            .or_else(|| (!group_nodes.is_empty()).then_some(ElementKind::Node));
        if available.is_none_or(|a| a < element_kind) {
            return Err(ConfigurationError::SourceKindMismatch {
                label,
                requested: element_kind,
                available,
            });
        }

        let mut constraint = EnforcedMeshConstraint {
            source: label,
            element_kind,
            size: SizeOverride::from_size(size),
            group: non_empty(Some(group)),
            nodes: Vec::new(),
            edges: Vec::new(),
            triangles: Vec::new(),
        };
        let point = |key: &NodeKey| mesh.node(*key);
        match element_kind {
            ElementKind::Node => {
                let mut seen: FastHashSet<NodeKey> = FastHashSet::default();
                let keys = group_nodes
                    .iter()
                    .chain(elements.iter().flat_map(|e| e.nodes()));
                constraint.nodes = keys
                    .filter(|k| seen.insert(**k))
                    .filter_map(point)
                    .collect();
            }
            ElementKind::Edge => {
                let mut seen: FastHashSet<(NodeKey, NodeKey)> = FastHashSet::default();
                for element in &elements {
                    for (a, b) in element_edges(element) {
                        let pair = if a <= b { (a, b) } else { (b, a) };
                        if !seen.insert(pair) {
                            continue;
                        }
                        if let (Some(pa), Some(pb)) = (point(&a), point(&b)) {
                            constraint.edges.push([pa, pb]);
                        }
                    }
                }
            }
            ElementKind::Face | ElementKind::Volume => {
                for element in &elements {
                    if element.element_type() != ElementType::Triangle {
                        continue;
                    }
                    let corners: Vec<[f64; 3]> = element.nodes().iter().filter_map(point).collect();
                    if let [a, b, c] = corners[..] {
                        constraint.triangles.push([a, b, c]);
                    }
                }
                let skipped = elements
                    .iter()
                    .filter(|e| e.element_type() == ElementType::Quadrangle)
                    .count();
                if skipped > 0 {
                    tracing::debug!(skipped, source = %constraint.source, "quadrangles are not enforced");
                }
            }
        }

        let encoding = constraint.encoding();
        tracing::debug!(
            source = %constraint.source,
            kind = %element_kind,
            entities = constraint.entity_count(),
            ?encoding,
            "enforced mesh added"
        );
        self.meshes.push(constraint);
        Ok(encoding)
    }

    // =========================================================================
    // QUERIES
    // =========================================================================

    /// Coordinate entries in insertion order.
    #[must_use]
    pub fn coordinate_vertices(&self) -> &[EnforcedVertex] {
        &self.coordinate_vertices.entries
    }

    /// Geometry entries in insertion order.
    #[must_use]
    pub fn geometry_vertices(&self) -> &[EnforcedVertex] {
        &self.geometry_vertices.entries
    }

    /// Every enforced vertex, coordinate entries first.
    pub fn enforced_vertices(&self) -> impl Iterator<Item = &EnforcedVertex> {
        self.coordinate_vertices
            .entries
            .iter()
            .chain(&self.geometry_vertices.entries)
    }

    /// Total number of enforced-vertex entries.
    #[must_use]
    pub fn enforced_vertex_count(&self) -> usize {
        self.coordinate_vertices.entries.len() + self.geometry_vertices.entries.len()
    }

    /// The coordinate entry at exactly `(x, y, z)`.
    #[must_use]
    pub fn find_enforced_vertex(&self, x: f64, y: f64, z: f64) -> Option<&EnforcedVertex> {
        self.coordinate_vertices.get(&CoordKey::new([x, y, z]))
    }

    /// The geometry entry published as `entry`.
    #[must_use]
    pub fn find_geometry_vertex(&self, entry: &str) -> Option<&EnforcedVertex> {
        self.geometry_vertices.get(entry)
    }

    /// Registered enforced meshes.
    #[must_use]
    pub fn enforced_meshes(&self) -> &[EnforcedMeshConstraint] {
        &self.meshes
    }

    /// Number of registered enforced meshes.
    #[must_use]
    pub fn enforced_mesh_count(&self) -> usize {
        self.meshes.len()
    }

    /// Minimum number of result entities each named group should receive.
    ///
    /// Enforced vertices contribute one node per point; enforced meshes one
    /// entity per snapshot entity. Coincident constraints sharing a group are
    /// counted once per constraint, so this is an upper bound when they
    /// overlap.
    #[must_use]
    pub fn expected_group_counts(&self) -> FastHashMap<String, usize> {
        let mut counts: FastHashMap<String, usize> = FastHashMap::default();
        for vertex in self.enforced_vertices() {
            if let Some(group) = vertex.group() {
                *counts.entry(group.to_owned()).or_default() += vertex.points().len();
            }
        }
        for mesh in &self.meshes {
            if let Some(group) = mesh.group() {
                *counts.entry(group.to_owned()).or_default() += mesh.entity_count();
            }
        }
        counts
    }
}

fn element_edges(element: &Element) -> Vec<(NodeKey, NodeKey)> {
    let nodes = element.nodes();
    match element.element_type() {
        ElementType::Segment => vec![(nodes[0], nodes[1])],
        ElementType::Triangle | ElementType::Quadrangle => (0..nodes.len())
            .map(|i| (nodes[i], nodes[(i + 1) % nodes.len()]))
            .collect(),
        ElementType::Tetrahedron => Vec::new(),
    }
}
