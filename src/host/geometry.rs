//! Minimal geometry study: shape construction and the publish registry.
//!
//! Enforced vertices can reference geometric vertices (or compounds of
//! vertices) held here. A shape must be published under a name before it can
//! be forwarded to the engine; [`GeometryStudy::publish`] records that name.

use crate::core::collections::{FastHashMap, StorageMap};
use serde::{Deserialize, Serialize};
use slotmap::new_key_type;
use thiserror::Error;

new_key_type! {
    /// Key identifying a shape in a [`GeometryStudy`].
    pub struct ShapeKey;
}

/// Topological kind of a shape.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShapeKind {
    /// A single point.
    Vertex,
    /// A curve bounded by vertices.
    Edge,
    /// A surface patch.
    Face,
    /// A closed volume.
    Solid,
    /// An unordered collection of shapes.
    Compound,
}

/// Errors raised by geometry queries.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum GeometryError {
    /// The key does not belong to this study.
    #[error("Shape {0:?} is not part of the geometry study")]
    UnknownShape(ShapeKey),
    /// The shape is neither a vertex nor a compound made only of vertices.
    #[error("Shape of kind {kind:?} is not a vertex or a compound of vertices")]
    NotVertexOrCompound {
        /// Kind of the offending shape.
        kind: ShapeKind,
    },
}

/// A shape and its direct children.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Shape {
    kind: ShapeKind,
    point: Option<[f64; 3]>,
    children: Vec<ShapeKey>,
}

impl Shape {
    /// Kind of this shape.
    #[must_use]
    pub const fn kind(&self) -> ShapeKind {
        self.kind
    }

    /// Position of a vertex shape; `None` for every other kind.
    #[must_use]
    pub const fn point(&self) -> Option<[f64; 3]> {
        self.point
    }

    /// Direct sub-shapes.
    #[must_use]
    pub fn children(&self) -> &[ShapeKey] {
        &self.children
    }
}

/// Shape storage plus the name registry for published shapes.
#[derive(Clone, Debug, Default)]
pub struct GeometryStudy {
    shapes: StorageMap<ShapeKey, Shape>,
    published: FastHashMap<ShapeKey, String>,
    by_name: FastHashMap<String, ShapeKey>,
}

impl GeometryStudy {
    /// Creates an empty study.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a vertex at `(x, y, z)`.
    pub fn make_vertex(&mut self, x: f64, y: f64, z: f64) -> ShapeKey {
        self.shapes.insert(Shape {
            kind: ShapeKind::Vertex,
            point: Some([x, y, z]),
            children: Vec::new(),
        })
    }

    /// Creates a compound grouping `children`.
    ///
    /// # Errors
    ///
    /// Returns [`GeometryError::UnknownShape`] if a child is not in the study.
    pub fn make_compound(&mut self, children: &[ShapeKey]) -> Result<ShapeKey, GeometryError> {
        self.make_shape(ShapeKind::Compound, children)
    }

    /// Creates a non-vertex shape of `kind` bounded by `children`.
    ///
    /// # Errors
    ///
    /// Returns [`GeometryError::UnknownShape`] if a child is not in the study.
    pub fn make_shape(
        &mut self,
        kind: ShapeKind,
        children: &[ShapeKey],
    ) -> Result<ShapeKey, GeometryError> {
        if let Some(&missing) = children.iter().find(|c| !self.shapes.contains_key(**c)) {
            return Err(GeometryError::UnknownShape(missing));
        }
        Ok(self.shapes.insert(Shape {
            kind,
            point: None,
            children: children.to_vec(),
        }))
    }

    /// Looks up a shape.
    #[must_use]
    pub fn shape(&self, key: ShapeKey) -> Option<&Shape> {
        self.shapes.get(key)
    }

    /// All transitive sub-shapes of `key`, excluding `key` itself.
    #[must_use]
    pub fn sub_shapes(&self, key: ShapeKey) -> Vec<ShapeKey> {
        let mut out = Vec::new();
        let mut stack: Vec<ShapeKey> = self
            .shapes
            .get(key)
            .map(|s| s.children.clone())
            .unwrap_or_default();
        while let Some(next) = stack.pop() {
            if out.contains(&next) {
                continue;
            }
            out.push(next);
            if let Some(shape) = self.shapes.get(next) {
                stack.extend(shape.children.iter().copied());
            }
        }
        out
    }

    /// Resolves a vertex, or a compound built only from vertices, to points.
    ///
    /// # Errors
    ///
    /// Returns [`GeometryError::UnknownShape`] for foreign keys and
    /// [`GeometryError::NotVertexOrCompound`] for any other shape kind.
    pub fn vertex_points(&self, key: ShapeKey) -> Result<Vec<[f64; 3]>, GeometryError> {
        let shape = self.shapes.get(key).ok_or(GeometryError::UnknownShape(key))?;
        match (shape.kind, shape.point) {
            (ShapeKind::Vertex, Some(point)) => Ok(vec![point]),
            (ShapeKind::Compound, _) => {
                let mut points = Vec::new();
                for &child in &shape.children {
                    points.extend(self.vertex_points(child)?);
                }
                Ok(points)
            }
            (kind, _) => Err(GeometryError::NotVertexOrCompound { kind }),
        }
    }

    /// Publishes `key` under `name`, replacing any previous name for it.
    ///
    /// # Errors
    ///
    /// Returns [`GeometryError::UnknownShape`] if `key` is not in the study.
    pub fn publish(&mut self, key: ShapeKey, name: &str) -> Result<(), GeometryError> {
        if !self.shapes.contains_key(key) {
            return Err(GeometryError::UnknownShape(key));
        }
        if let Some(previous) = self.published.insert(key, name.to_owned()) {
            self.by_name.remove(&previous);
        }
        self.by_name.insert(name.to_owned(), key);
        Ok(())
    }

    /// Name under which `key` was published, if any.
    #[must_use]
    pub fn published_name(&self, key: ShapeKey) -> Option<&str> {
        self.published.get(&key).map(String::as_str)
    }

    /// Shape published under `name`, if any.
    #[must_use]
    pub fn find_published(&self, name: &str) -> Option<ShapeKey> {
        self.by_name.get(name).copied()
    }

    /// Number of published shapes.
    #[must_use]
    pub fn published_count(&self) -> usize {
        self.published.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vertex_points_resolves_nested_compounds() {
        let mut study = GeometryStudy::new();
        let a = study.make_vertex(0.0, 0.0, 0.0);
        let b = study.make_vertex(1.0, 0.0, 0.0);
        let c = study.make_vertex(0.0, 1.0, 0.0);
        let inner = study.make_compound(&[b, c]).unwrap();
        let outer = study.make_compound(&[a, inner]).unwrap();

        let points = study.vertex_points(outer).unwrap();
        assert_eq!(points, vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]]);
    }

    #[test]
    fn test_vertex_points_rejects_other_kinds() {
        let mut study = GeometryStudy::new();
        let a = study.make_vertex(0.0, 0.0, 0.0);
        let b = study.make_vertex(1.0, 0.0, 0.0);
        let edge = study.make_shape(ShapeKind::Edge, &[a, b]).unwrap();
        let compound = study.make_compound(&[a, edge]).unwrap();

        assert_eq!(
            study.vertex_points(edge),
            Err(GeometryError::NotVertexOrCompound {
                kind: ShapeKind::Edge
            })
        );
        assert!(study.vertex_points(compound).is_err());
    }

    #[test]
    fn test_publish_replaces_previous_name() {
        let mut study = GeometryStudy::new();
        let v = study.make_vertex(1.0, 2.0, 3.0);
        assert_eq!(study.published_name(v), None);

        study.publish(v, "first").unwrap();
        study.publish(v, "second").unwrap();
        assert_eq!(study.published_name(v), Some("second"));
        assert_eq!(study.find_published("first"), None);
        assert_eq!(study.find_published("second"), Some(v));
        assert_eq!(study.published_count(), 1);
    }

    #[test]
    fn test_sub_shapes_collects_descendants_once() {
        let mut study = GeometryStudy::new();
        let a = study.make_vertex(0.0, 0.0, 0.0);
        let b = study.make_vertex(1.0, 0.0, 0.0);
        let e1 = study.make_shape(ShapeKind::Edge, &[a, b]).unwrap();
        let e2 = study.make_shape(ShapeKind::Edge, &[b, a]).unwrap();
        let face = study.make_shape(ShapeKind::Face, &[e1, e2]).unwrap();

        let subs = study.sub_shapes(face);
        assert_eq!(subs.len(), 4);
        assert!(subs.contains(&a) && subs.contains(&b));
        assert!(!subs.contains(&face));
    }
}
