//! Shared fixtures for integration tests: a deterministic fake engine and
//! small host meshes.

#![allow(dead_code)]

use std::path::Path;
use std::sync::Mutex;
use tetra_constraints::prelude::*;

/// Engine that echoes its constraints back as output nodes.
///
/// The generation pass returns the input nodes, every enforced point and
/// every enforced-element corner, then (unless `-p0` is passed) the centroid
/// of the input nodes as an apex for a tetrahedron fan over the input
/// triangles. The optimization pass returns its input unchanged.
///
/// A malformed engine appends one new node and a tetrahedron that refers past
/// the end of its node list.
#[derive(Debug, Default)]
pub struct FakeEngine {
    fail: bool,
    malformed: bool,
    missing: Option<String>,
    last_request: Mutex<Option<EngineRequest>>,
}

impl FakeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// An engine that runs and reports failure.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// An engine that succeeds with an out-of-range tetrahedron index.
    pub fn malformed() -> Self {
        Self {
            malformed: true,
            ..Self::default()
        }
    }

    /// An engine that is not installed.
    pub fn missing(reason: &str) -> Self {
        Self {
            missing: Some(reason.to_owned()),
            ..Self::default()
        }
    }

    pub fn last_request(&self) -> Option<EngineRequest> {
        self.last_request.lock().unwrap().clone()
    }

    fn generate(request: &EngineRequest) -> EngineOutput {
        let mut nodes = request.input_nodes.clone();
        nodes.extend(request.enforced_vertices.iter().map(|p| p.point));
        nodes.extend(request.enforced_nodes.iter().map(|p| p.point));
        nodes.extend(request.enforced_edges.iter().flat_map(|s| s.points));
        nodes.extend(request.enforced_triangles.iter().flat_map(|t| t.points));

        let mut tetrahedra = Vec::new();
        let creates_nodes = !request.arguments.iter().any(|a| a == "-p0");
        if creates_nodes && !request.input_nodes.is_empty() {
            let apex = nodes.len();
            nodes.push(centroid(&request.input_nodes));
            tetrahedra.extend(request.input_triangles.iter().map(|[a, b, c]| {
                OutputTetrahedron {
                    nodes: [*a, *b, *c, apex],
                    domain: 1,
                }
            }));
        }
        EngineOutput {
            nodes,
            tetrahedra,
            log: format!("fake run: {}", request.arguments.join(" ")),
        }
    }

    fn optimize(request: &EngineRequest) -> EngineOutput {
        EngineOutput {
            nodes: request.input_nodes.clone(),
            tetrahedra: request
                .input_tetrahedra
                .iter()
                .map(|t| OutputTetrahedron {
                    nodes: *t,
                    domain: 1,
                })
                .collect(),
            log: "fake optimization".to_owned(),
        }
    }
}

impl TetraEngine for FakeEngine {
    fn name(&self) -> &'static str {
        "fake"
    }

    fn availability(&self) -> Availability {
        match &self.missing {
            Some(reason) => Availability::Missing {
                reason: reason.clone(),
            },
            None => Availability::Ready,
        }
    }

    fn run(&self, request: &EngineRequest) -> Result<EngineOutput, EngineFailure> {
        *self.last_request.lock().unwrap() = Some(request.clone());
        if self.fail {
            return Err(EngineFailure {
                message: "input surface is not closed".to_owned(),
                log: "ERROR: open boundary".to_owned(),
            });
        }
        let mut output = match request.pass {
            AlgorithmKind::Tetrahedralization => Self::generate(request),
            AlgorithmKind::OptimizationOnly => Self::optimize(request),
        };
        if self.malformed {
            output.nodes.push([-1.0e3, -1.0e3, -1.0e3]);
            let past_end = output.nodes.len();
            output.tetrahedra.push(OutputTetrahedron {
                nodes: [0, 1, 2, past_end],
                domain: 1,
            });
        }
        Ok(output)
    }
}

fn centroid(points: &[[f64; 3]]) -> [f64; 3] {
    #[allow(clippy::cast_precision_loss)]
    let n = points.len() as f64;
    let mut sum = [0.0; 3];
    for p in points {
        for (s, c) in sum.iter_mut().zip(p) {
            *s += c;
        }
    }
    sum.map(|s| s / n)
}

/// Closed triangulated surface of the axis-aligned box `[0, size]^3`.
pub fn box_surface(name: &str, size: f64) -> Mesh {
    let mut mesh = Mesh::new(name);
    let corners: Vec<NodeKey> = (0..8)
        .map(|i| {
            let bit = |b: usize| if i & (1 << b) == 0 { 0.0 } else { size };
            mesh.add_node([bit(0), bit(1), bit(2)])
        })
        .collect();
    // Two triangles per face, corners indexed by their xyz bits.
    let faces: [[usize; 4]; 6] = [
        [0, 1, 3, 2],
        [4, 6, 7, 5],
        [0, 4, 5, 1],
        [2, 3, 7, 6],
        [0, 2, 6, 4],
        [1, 5, 7, 3],
    ];
    for [a, b, c, d] in faces {
        for tri in [[a, b, c], [a, c, d]] {
            mesh.add_element(ElementType::Triangle, &tri.map(|i| corners[i]))
                .unwrap();
        }
    }
    mesh
}

/// A ring of `n` nodes and `n` segments in the plane `z = center[2]`.
pub fn planar_ring(name: &str, n: usize, center: [f64; 3], radius: f64) -> Mesh {
    let mut mesh = Mesh::new(name);
    let nodes: Vec<NodeKey> = (0..n)
        .map(|i| {
            #[allow(clippy::cast_precision_loss)]
            let angle = std::f64::consts::TAU * i as f64 / n as f64;
            mesh.add_node([
                center[0] + radius * angle.cos(),
                center[1] + radius * angle.sin(),
                center[2],
            ])
        })
        .collect();
    for i in 0..n {
        mesh.add_element(ElementType::Segment, &[nodes[i], nodes[(i + 1) % n]])
            .unwrap();
    }
    mesh
}

/// Drops the log after a successful run so the instance directory is removed.
pub fn clean_up_on_success(params: &mut impl RunSettings) {
    params.set_remove_log_on_success(true);
}

pub fn remove_dir(path: &Path) {
    if path.exists() {
        std::fs::remove_dir_all(path).unwrap();
    }
}
