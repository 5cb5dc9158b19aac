//! One engine run: working files, log handling and applying the output.
//!
//! A [`RunSession`] owns the working directory for the duration of a run. The
//! log is written before cleanup so a failed run always leaves it behind.
//!
//! Engine output is resolved against the mesh and validated as a whole before
//! the first node is written, so a malformed result leaves the mesh as it was.

use crate::core::collections::{FastHashMap, MAX_ELEMENT_NODES, SmallBuffer};
use crate::core::constraints::{ConstraintRegistry, SizeOverride};
use crate::core::engine::{
    EngineOutput, EngineRequest, EnforcedPoint, EnforcedSegment, EnforcedTriangle, TetraEngine,
};
use crate::core::error::TetraError;
use crate::core::parameters::{LogDestination, RunSettings};
use crate::core::util::{make_uuid, squared_distance};
use crate::host::mesh::{ElementKey, ElementKind, ElementType, Mesh, NodeKey};
use crate::host::spatial::HashGridIndex;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Output nodes closer than this to an existing node reuse it.
pub const NODE_REUSE_TOLERANCE: f64 = 1e-9;

/// Tolerance for matching constraint positions to result nodes when
/// populating groups.
pub const GROUP_MATCH_TOLERANCE: f64 = 1e-7;

/// Prefix of the groups created per output domain.
pub const DOMAIN_GROUP_PREFIX: &str = "Domain_";

/// Summary of a successful compute.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ComputeReport {
    /// Directory the engine ran in.
    pub working_directory: PathBuf,
    /// Log file left on disk, if any.
    pub log_path: Option<PathBuf>,
    /// Captured engine log.
    pub log: String,
    /// Output nodes added to the mesh.
    pub nodes_added: usize,
    /// Output nodes matched onto existing mesh nodes.
    pub nodes_reused: usize,
    /// Tetrahedra added to the mesh.
    pub tetrahedra: usize,
    /// Groups created or extended, in creation order.
    pub groups: Vec<String>,
}

/// Working directory, file prefix and cleanup policy of one run.
#[derive(Debug)]
pub(crate) struct RunSession {
    directory: PathBuf,
    prefix: String,
    log_destination: LogDestination,
    keep_files: bool,
    remove_log_on_success: bool,
}

impl RunSession {
    /// Creates the working directory.
    pub(crate) fn open(settings: &impl RunSettings) -> Result<Self, TetraError> {
        let directory = settings.resolved_working_directory();
        std::fs::create_dir_all(&directory).map_err(|e| TetraError::ComputeFailure {
            message: format!(
                "cannot create working directory {}: {e}",
                directory.display()
            ),
            log_path: None,
            log: String::new(),
        })?;
        Ok(Self {
            directory,
            prefix: format!("tetra_{}", make_uuid().simple()),
            log_destination: settings.log_destination(),
            keep_files: settings.keep_working_files(),
            remove_log_on_success: settings.remove_log_on_success(),
        })
    }

    pub(crate) fn directory(&self) -> &Path {
        &self.directory
    }

    pub(crate) fn prefix(&self) -> &str {
        &self.prefix
    }

    fn log_path(&self) -> PathBuf {
        self.directory.join(format!("{}.log", self.prefix))
    }

    /// Runs the engine, stores its log and cleans up according to policy.
    pub(crate) fn run(
        &self,
        engine: &dyn TetraEngine,
        request: &EngineRequest,
    ) -> Result<(EngineOutput, Option<PathBuf>), TetraError> {
        tracing::debug!(
            engine = engine.name(),
            directory = %self.directory.display(),
            arguments = %request.arguments.join(" "),
            "starting engine run"
        );
        match engine.run(request) {
            Ok(output) => {
                let mut log_path = self.emit_log(&output.log);
                if self.remove_log_on_success {
                    if let Some(path) = log_path.take() {
                        remove_quietly(&path);
                    }
                }
                if !self.keep_files {
                    self.remove_working_files(log_path.as_deref());
                }
                Ok((output, log_path))
            }
            Err(failure) => {
                let log_path = self.emit_log(&failure.log);
                if !self.keep_files {
                    self.remove_working_files(log_path.as_deref());
                }
                tracing::warn!(
                    engine = engine.name(),
                    message = %failure.message,
                    log = ?log_path,
                    "engine run failed"
                );
                Err(TetraError::ComputeFailure {
                    message: failure.message,
                    log_path,
                    log: failure.log,
                })
            }
        }
    }

    fn emit_log(&self, log: &str) -> Option<PathBuf> {
        match self.log_destination {
            LogDestination::File => {
                let path = self.log_path();
                match std::fs::write(&path, log) {
                    Ok(()) => Some(path),
                    Err(error) => {
                        tracing::warn!(path = %path.display(), %error, "cannot write engine log");
                        None
                    }
                }
            }
            LogDestination::StandardOutput => {
                if let Err(error) = std::io::stdout().lock().write_all(log.as_bytes()) {
                    tracing::warn!(%error, "cannot write engine log to standard output");
                }
                None
            }
        }
    }

    /// Removes every file of this run except `keep`, then the directory if it
    /// ended up empty.
    fn remove_working_files(&self, keep: Option<&Path>) {
        let Ok(entries) = std::fs::read_dir(&self.directory) else {
            return;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            let ours = entry
                .file_name()
                .to_str()
                .is_some_and(|name| name.starts_with(&self.prefix));
            if ours && Some(path.as_path()) != keep {
                remove_quietly(&path);
            }
        }
        if std::fs::read_dir(&self.directory).is_ok_and(|mut d| d.next().is_none()) {
            if let Err(error) = std::fs::remove_dir(&self.directory) {
                tracing::warn!(
                    path = %self.directory.display(),
                    %error,
                    "cannot remove working directory"
                );
            }
        }
    }
}

fn remove_quietly(path: &Path) {
    let result = if path.is_dir() {
        std::fs::remove_dir_all(path)
    } else {
        std::fs::remove_file(path)
    };
    if let Err(error) = result {
        tracing::warn!(path = %path.display(), %error, "cannot remove working file");
    }
}

// =============================================================================
// REQUEST ASSEMBLY
// =============================================================================

/// Input nodes and their mesh keys, indexed in request order.
pub(crate) struct InputIndex {
    pub(crate) positions: Vec<[f64; 3]>,
    index_of: FastHashMap<NodeKey, usize>,
}

impl InputIndex {
    pub(crate) fn new(mesh: &Mesh) -> Self {
        let mut positions = Vec::with_capacity(mesh.node_count());
        let mut index_of = FastHashMap::default();
        for (key, coords) in mesh.nodes() {
            index_of.insert(key, positions.len());
            positions.push(coords);
        }
        Self {
            positions,
            index_of,
        }
    }

    /// Index connectivity of every element of `element_type`.
    pub(crate) fn connectivity<const N: usize>(
        &self,
        mesh: &Mesh,
        element_type: ElementType,
    ) -> Vec<[usize; N]> {
        mesh.elements()
            .filter(|(_, e)| e.element_type() == element_type)
            .filter_map(|(_, e)| {
                let indices: Vec<usize> = e
                    .nodes()
                    .iter()
                    .filter_map(|n| self.index_of.get(n).copied())
                    .collect();
                indices.try_into().ok()
            })
            .collect()
    }
}

const fn override_size(size: SizeOverride) -> Option<f64> {
    match size {
        SizeOverride::Natural => None,
        SizeOverride::Local(s) => Some(s),
    }
}

/// Enforced entities of a registry in engine form.
#[derive(Debug, Default)]
pub(crate) struct EnforcedEntities {
    pub(crate) vertices: Vec<EnforcedPoint>,
    pub(crate) nodes: Vec<EnforcedPoint>,
    pub(crate) edges: Vec<EnforcedSegment>,
    pub(crate) triangles: Vec<EnforcedTriangle>,
}

pub(crate) fn enforced_entities(registry: &ConstraintRegistry) -> EnforcedEntities {
    let vertices = registry
        .enforced_vertices()
        .flat_map(|v| {
            v.points().iter().map(|p| EnforcedPoint {
                point: *p,
                size: Some(v.size()),
            })
        })
        .collect();
    let mut nodes = Vec::new();
    let mut edges = Vec::new();
    let mut triangles = Vec::new();
    for mesh in registry.enforced_meshes() {
        let size = override_size(mesh.size());
        nodes.extend(mesh.nodes().iter().map(|p| EnforcedPoint { point: *p, size }));
        edges.extend(mesh.edges().iter().map(|p| EnforcedSegment { points: *p, size }));
        triangles.extend(
            mesh.triangles()
                .iter()
                .map(|p| EnforcedTriangle { points: *p, size }),
        );
    }
    EnforcedEntities {
        vertices,
        nodes,
        edges,
        triangles,
    }
}

// =============================================================================
// APPLYING OUTPUT
// =============================================================================

/// Where an output node lands in the mesh.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum NodeSlot {
    /// An existing mesh node within reuse tolerance.
    Existing(NodeKey),
    /// The n-th node the commit creates.
    New(usize),
}

/// Engine output resolved against a mesh. Building one never touches the
/// mesh; every tetrahedron index has been checked.
#[derive(Debug)]
pub(crate) struct OutputPlan {
    new_nodes: Vec<[f64; 3]>,
    reused: usize,
    tetrahedra: Vec<([NodeSlot; 4], u32)>,
}

/// Sorted corner keys of an element, for lookups that ignore orientation.
type ElementSignature = (ElementType, SmallBuffer<NodeKey, MAX_ELEMENT_NODES>);

fn signature(element_type: ElementType, nodes: &[NodeKey]) -> ElementSignature {
    let mut sorted: SmallBuffer<NodeKey, MAX_ELEMENT_NODES> = nodes.iter().copied().collect();
    sorted.sort_unstable();
    (element_type, sorted)
}

/// Writes engine output into a mesh and fills result groups.
pub(crate) struct OutputWriter<'m> {
    mesh: &'m mut Mesh,
    grid: HashGridIndex<NodeKey>,
    elements_by_nodes: Option<FastHashMap<ElementSignature, ElementKey>>,
    groups: Vec<String>,
}

impl<'m> OutputWriter<'m> {
    pub(crate) fn new(mesh: &'m mut Mesh) -> Self {
        let mut grid = HashGridIndex::new(GROUP_MATCH_TOLERANCE);
        for (key, coords) in mesh.nodes() {
            grid.insert(key, coords);
        }
        Self {
            mesh,
            grid,
            elements_by_nodes: None,
            groups: Vec::new(),
        }
    }

    fn failure(message: String) -> TetraError {
        TetraError::ComputeFailure {
            message,
            log_path: None,
            log: String::new(),
        }
    }

    fn closest(&self, point: [f64; 3], tolerance: f64) -> Option<NodeKey> {
        if self.grid.is_usable() {
            return self.grid.within(point, tolerance).first().map(|(k, _)| *k);
        }
        self.mesh
            .nodes()
            .map(|(k, c)| (k, squared_distance(c, point)))
            .filter(|(_, d)| *d <= tolerance * tolerance)
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(k, _)| k)
    }

    /// Resolves every output node to an existing or new mesh node and checks
    /// every tetrahedron index.
    ///
    /// # Errors
    ///
    /// Returns [`TetraError::ComputeFailure`] if a tetrahedron refers to a
    /// node the output does not contain.
    pub(crate) fn plan(&self, output: &EngineOutput) -> Result<OutputPlan, TetraError> {
        let mut planned: HashGridIndex<usize> = HashGridIndex::new(GROUP_MATCH_TOLERANCE);
        let mut new_nodes: Vec<[f64; 3]> = Vec::new();
        let mut slots = Vec::with_capacity(output.nodes.len());
        for &point in &output.nodes {
            let slot = if let Some(existing) = self.closest(point, NODE_REUSE_TOLERANCE) {
                NodeSlot::Existing(existing)
            } else if let Some(index) = closest_planned(&planned, &new_nodes, point) {
                NodeSlot::New(index)
            } else {
                planned.insert(new_nodes.len(), point);
                new_nodes.push(point);
                NodeSlot::New(new_nodes.len() - 1)
            };
            slots.push(slot);
        }

        let mut tetrahedra = Vec::with_capacity(output.tetrahedra.len());
        for (position, tet) in output.tetrahedra.iter().enumerate() {
            let mut corners = [NodeSlot::New(0); 4];
            for (slot, &index) in corners.iter_mut().zip(&tet.nodes) {
                *slot = *slots.get(index).ok_or_else(|| {
                    Self::failure(format!(
                        "tetrahedron {position} refers to node {index} of {}",
                        slots.len()
                    ))
                })?;
            }
            tetrahedra.push((corners, tet.domain));
        }
        Ok(OutputPlan {
            reused: slots.len() - new_nodes.len(),
            new_nodes,
            tetrahedra,
        })
    }

    /// Removes the mesh's elements of `element_type`. Nodes are kept, so a
    /// plan built beforehand stays valid.
    pub(crate) fn remove_elements_of(&mut self, element_type: ElementType) -> usize {
        self.elements_by_nodes = None;
        self.mesh.remove_elements_of(element_type)
    }

    /// Writes a plan into the mesh. Returns `(added, reused, tetrahedra)`.
    pub(crate) fn commit(&mut self, plan: OutputPlan) -> Result<(usize, usize, usize), TetraError> {
        let created: Vec<NodeKey> = plan
            .new_nodes
            .iter()
            .map(|&point| {
                let key = self.mesh.add_node(point);
                self.grid.insert(key, point);
                key
            })
            .collect();
        let key_of = |slot: NodeSlot| match slot {
            NodeSlot::Existing(key) => key,
            NodeSlot::New(index) => created[index],
        };
        for (corners, domain) in &plan.tetrahedra {
            self.mesh
                .add_tetrahedron(corners.map(key_of), *domain)
                .map_err(|e| Self::failure(e.to_string()))?;
        }
        Ok((created.len(), plan.reused, plan.tetrahedra.len()))
    }

    /// Validates and writes output nodes and tetrahedra. Returns
    /// `(added, reused, tetrahedra)`; on error the mesh is unchanged.
    pub(crate) fn apply(&mut self, output: &EngineOutput) -> Result<(usize, usize, usize), TetraError> {
        let plan = self.plan(output)?;
        self.commit(plan)
    }

    fn note_group(&mut self, name: &str) {
        if !self.groups.iter().any(|g| g == name) {
            self.groups.push(name.to_owned());
        }
    }

    fn group_node(&mut self, group: &str, point: [f64; 3]) -> bool {
        let Some(node) = self.closest(point, GROUP_MATCH_TOLERANCE) else {
            tracing::warn!(group, ?point, "no result node for enforced point");
            return false;
        };
        match self.mesh.add_node_to_group(group, node) {
            Ok(()) => {
                self.note_group(group);
                true
            }
            Err(error) => {
                tracing::warn!(group, %error, "cannot populate group");
                false
            }
        }
    }

    /// Finds or creates the element over the nodes matching `points`.
    fn group_element(&mut self, group: &str, element_type: ElementType, points: &[[f64; 3]]) -> bool {
        let nodes: Option<SmallBuffer<NodeKey, MAX_ELEMENT_NODES>> = points
            .iter()
            .map(|p| self.closest(*p, GROUP_MATCH_TOLERANCE))
            .collect();
        let Some(nodes) = nodes else {
            tracing::warn!(group, ?element_type, "no result nodes for enforced element");
            return false;
        };
        let wanted = signature(element_type, &nodes);
        let mesh = &mut *self.mesh;
        let index = self.elements_by_nodes.get_or_insert_with(|| {
            mesh.elements()
                .map(|(key, e)| (signature(e.element_type(), e.nodes()), key))
                .collect()
        });
        let element = match index.get(&wanted) {
            Some(&key) => Ok(key),
            None => {
                let added = mesh.add_element(element_type, &nodes);
                if let Ok(key) = added {
                    index.insert(wanted, key);
                }
                added
            }
        };
        match element.and_then(|key| self.mesh.add_element_to_group(group, key)) {
            Ok(()) => {
                self.note_group(group);
                true
            }
            Err(error) => {
                tracing::warn!(group, %error, "cannot populate group");
                false
            }
        }
    }

    /// Populates enforced-vertex and enforced-mesh groups.
    pub(crate) fn populate_constraint_groups(&mut self, registry: &ConstraintRegistry) {
        for vertex in registry.enforced_vertices() {
            if let Some(group) = vertex.group() {
                for point in vertex.points() {
                    self.group_node(group, *point);
                }
            }
        }
        for constraint in registry.enforced_meshes() {
            let Some(group) = constraint.group() else {
                continue;
            };
            match constraint.element_kind() {
                ElementKind::Node => {
                    for point in constraint.nodes() {
                        self.group_node(group, *point);
                    }
                }
                ElementKind::Edge => {
                    for segment in constraint.edges() {
                        self.group_element(group, ElementType::Segment, segment);
                    }
                }
                ElementKind::Face | ElementKind::Volume => {
                    for triangle in constraint.triangles() {
                        self.group_element(group, ElementType::Triangle, triangle);
                    }
                }
            }
        }
    }

    /// Groups every tetrahedron by its domain id as `Domain_<id>`.
    pub(crate) fn populate_domain_groups(&mut self) {
        let tetrahedra: Vec<(ElementKey, u32)> = self
            .mesh
            .elements()
            .filter_map(|(key, e)| e.domain().map(|d| (key, d)))
            .collect();
        for (key, domain) in tetrahedra {
            let name = format!("{DOMAIN_GROUP_PREFIX}{domain}");
            match self.mesh.add_element_to_group(&name, key) {
                Ok(()) => self.note_group(&name),
                Err(error) => tracing::warn!(group = %name, %error, "cannot populate domain group"),
            }
        }
    }

    pub(crate) fn into_groups(self) -> Vec<String> {
        self.groups
    }
}

fn closest_planned(grid: &HashGridIndex<usize>, planned: &[[f64; 3]], point: [f64; 3]) -> Option<usize> {
    if grid.is_usable() {
        return grid.within(point, NODE_REUSE_TOLERANCE).first().map(|(i, _)| *i);
    }
    planned
        .iter()
        .enumerate()
        .map(|(i, p)| (i, squared_distance(*p, point)))
        .filter(|(_, d)| *d <= NODE_REUSE_TOLERANCE * NODE_REUSE_TOLERANCE)
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(i, _)| i)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::engine::{AlgorithmKind, EngineFailure, EngineRequestBuilder, OutputTetrahedron};
    use crate::core::parameters::ParameterSet;

    struct EchoEngine {
        fail: bool,
    }

    impl TetraEngine for EchoEngine {
        fn name(&self) -> &'static str {
            "echo"
        }

        fn run(&self, request: &EngineRequest) -> Result<EngineOutput, EngineFailure> {
            let scratch = request
                .working_directory
                .join(format!("{}.mesh", request.file_prefix));
            std::fs::write(scratch, "scratch").map_err(|e| EngineFailure {
                message: e.to_string(),
                log: String::new(),
            })?;
            if self.fail {
                return Err(EngineFailure {
                    message: "surface is not closed".to_owned(),
                    log: "error log".to_owned(),
                });
            }
            Ok(EngineOutput {
                log: "ok log".to_owned(),
                ..EngineOutput::default()
            })
        }
    }

    fn request_for(session: &RunSession) -> EngineRequest {
        EngineRequestBuilder::default()
            .pass(AlgorithmKind::Tetrahedralization)
            .arguments(Vec::new())
            .working_directory(session.directory())
            .file_prefix(session.prefix())
            .build()
            .unwrap()
    }

    fn scratch_params() -> ParameterSet {
        let mut params = ParameterSet::new();
        let dir = std::env::temp_dir().join(format!("tetra_session_test_{}", make_uuid().simple()));
        params.set_working_directory(dir).unwrap();
        params
    }

    #[test]
    fn test_success_removes_working_files_but_keeps_log() {
        let params = scratch_params();
        let session = RunSession::open(&params).unwrap();
        let (_, log_path) = session
            .run(&EchoEngine { fail: false }, &request_for(&session))
            .unwrap();
        let log_path = log_path.unwrap();
        assert_eq!(std::fs::read_to_string(&log_path).unwrap(), "ok log");
        assert!(!session.directory().join(format!("{}.mesh", session.prefix())).exists());
        std::fs::remove_dir_all(session.directory()).unwrap();
    }

    #[test]
    fn test_success_with_log_removal_cleans_directory() {
        let mut params = scratch_params();
        params.set_remove_log_on_success(true);
        let session = RunSession::open(&params).unwrap();
        let (_, log_path) = session
            .run(&EchoEngine { fail: false }, &request_for(&session))
            .unwrap();
        assert_eq!(log_path, None);
        assert!(!session.directory().exists());
    }

    fn leftover_files(session: &RunSession) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(session.directory())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_failure_keeps_only_the_log() {
        let mut params = scratch_params();
        params.set_remove_log_on_success(true);
        let session = RunSession::open(&params).unwrap();
        let err = session
            .run(&EchoEngine { fail: true }, &request_for(&session))
            .unwrap_err();
        let TetraError::ComputeFailure { message, log_path, log } = err else {
            panic!("expected a compute failure");
        };
        assert_eq!(message, "surface is not closed");
        assert_eq!(log, "error log");
        assert!(log_path.is_some_and(|p| p.exists()));
        assert_eq!(leftover_files(&session), [format!("{}.log", session.prefix())]);
        std::fs::remove_dir_all(session.directory()).unwrap();
    }

    #[test]
    fn test_failure_with_kept_files_leaves_everything() {
        let mut params = scratch_params();
        params.set_keep_working_files(true);
        let session = RunSession::open(&params).unwrap();
        session
            .run(&EchoEngine { fail: true }, &request_for(&session))
            .unwrap_err();
        assert_eq!(
            leftover_files(&session),
            [
                format!("{}.log", session.prefix()),
                format!("{}.mesh", session.prefix())
            ]
        );
        std::fs::remove_dir_all(session.directory()).unwrap();
    }

    #[test]
    fn test_output_writer_reuses_and_adds_nodes() {
        let mut mesh = Mesh::new("m");
        mesh.add_node([0.0, 0.0, 0.0]);
        mesh.add_node([1.0, 0.0, 0.0]);
        mesh.add_node([0.0, 1.0, 0.0]);
        let output = EngineOutput {
            nodes: vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
            tetrahedra: vec![OutputTetrahedron {
                nodes: [0, 1, 2, 3],
                domain: 7,
            }],
            log: String::new(),
        };
        let mut writer = OutputWriter::new(&mut mesh);
        assert_eq!(writer.apply(&output).unwrap(), (1, 3, 1));
        writer.populate_domain_groups();
        assert_eq!(writer.into_groups(), vec!["Domain_7".to_owned()]);
        assert_eq!(mesh.node_count(), 4);
        assert_eq!(mesh.group("Domain_7").map(|g| g.len()), Some(1));
    }

    #[test]
    fn test_output_writer_rejects_bad_indices_without_touching_the_mesh() {
        let mut mesh = Mesh::new("m");
        mesh.add_node([5.0, 5.0, 5.0]);
        let output = EngineOutput {
            nodes: vec![
                [0.0, 0.0, 0.0],
                [1.0, 0.0, 0.0],
                [0.0, 1.0, 0.0],
                [0.0, 0.0, 1.0],
            ],
            tetrahedra: vec![
                OutputTetrahedron {
                    nodes: [0, 1, 2, 3],
                    domain: 1,
                },
                OutputTetrahedron {
                    nodes: [0, 1, 2, 4],
                    domain: 1,
                },
            ],
            log: String::new(),
        };
        let mut writer = OutputWriter::new(&mut mesh);
        let err = writer.apply(&output).unwrap_err();
        assert_eq!(
            err,
            TetraError::ComputeFailure {
                message: "tetrahedron 1 refers to node 4 of 4".to_owned(),
                log_path: None,
                log: String::new(),
            }
        );
        assert_eq!(mesh.node_count(), 1);
        assert_eq!(mesh.element_count(), 0);
    }

    #[test]
    fn test_output_writer_merges_coincident_output_nodes() {
        let mut mesh = Mesh::new("m");
        let output = EngineOutput {
            nodes: vec![
                [0.0, 0.0, 0.0],
                [1.0, 0.0, 0.0],
                [0.0, 1.0, 0.0],
                [0.0, 0.0, 1.0],
                [1.0, 0.0, 1e-12],
            ],
            tetrahedra: vec![OutputTetrahedron {
                nodes: [0, 4, 2, 3],
                domain: 2,
            }],
            log: String::new(),
        };
        let mut writer = OutputWriter::new(&mut mesh);
        assert_eq!(writer.apply(&output).unwrap(), (4, 1, 1));
        assert_eq!(mesh.node_count(), 4);
        assert_eq!(mesh.count_of(ElementType::Tetrahedron), 1);
    }

    #[test]
    fn test_constraint_groups_reuse_existing_elements() {
        let mut mesh = Mesh::new("m");
        let a = mesh.add_node([0.0, 0.0, 0.0]);
        let b = mesh.add_node([1.0, 0.0, 0.0]);
        let segment = mesh.add_element(ElementType::Segment, &[b, a]).unwrap();

        let mut reference = Mesh::new("ref");
        let ra = reference.add_node([0.0, 0.0, 0.0]);
        let rb = reference.add_node([1.0, 0.0, 0.0]);
        reference.add_element(ElementType::Segment, &[ra, rb]).unwrap();
        let mut registry = ConstraintRegistry::new(crate::core::constraints::ShapeMode::GeometryFree);
        registry
            .add_enforced_mesh(
                crate::core::constraints::MeshSource::Mesh(&reference),
                ElementKind::Edge,
                -1.0,
                "edges",
            )
            .unwrap();

        let mut writer = OutputWriter::new(&mut mesh);
        writer.populate_constraint_groups(&registry);
        writer.populate_constraint_groups(&registry);
        assert_eq!(writer.into_groups(), vec!["edges".to_owned()]);
        assert_eq!(mesh.element_count(), 1);
        assert_eq!(mesh.group("edges").map(|g| g.elements().to_vec()), Some(vec![segment]));
    }
}
