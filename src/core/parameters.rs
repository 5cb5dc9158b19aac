//! Typed option bag for one engine invocation.
//!
//! [`ParameterSet`] holds every option of the generation pass. Options shared
//! with the optimization-only pass (memory, working directory, files, logs,
//! verbosity, advanced text) live in [`RunOptions`] and are reached through the
//! [`RunSettings`] trait, which both parameter types implement.
//!
//! # Optimization levels
//!
//! Two level enumerations exist. [`OptimizationLevel`] is the canonical
//! five-valued scale; [`LegacyOptimizationLevel`] is the older four-valued one
//! and is only ever converted, never stored:
//!
//! | legacy   | canonical  |
//! |----------|------------|
//! | `None`   | `None`     |
//! | `Light`  | `Light`    |
//! | `Medium` | `Standard` |
//! | `Strong` | `Strong`   |
//!
//! ```
//! use tetra_constraints::core::parameters::{LegacyOptimizationLevel, OptimizationLevel};
//!
//! let level = OptimizationLevel::from(LegacyOptimizationLevel::Strong);
//! assert_eq!(level, OptimizationLevel::Strong);
//! assert!(OptimizationLevel::StandardPlus < level);
//! ```

use crate::core::error::ConfigurationError;
use crate::core::util::{make_uuid, working_directory_base};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use sysinfo::{MemoryRefreshKind, RefreshKind, System};
use uuid::Uuid;

/// Highest accepted verbosity.
pub const MAX_VERBOSE_LEVEL: u8 = 10;

/// Default verbosity (full histograms).
pub const DEFAULT_VERBOSE_LEVEL: u8 = 10;

/// Maximum memory used when physical RAM cannot be queried.
pub const FALLBACK_MAXIMUM_MEMORY_MB: u32 = 1024;

/// Initial memory passed to the engine when none is configured.
pub const DEFAULT_INITIAL_MEMORY_MB: u32 = 100;

const OPTIONS_BEGIN: &str = "__OPTIONS_BEGIN__";
const OPTIONS_END: &str = "__OPTIONS_END__";

// =============================================================================
// OPTIMIZATION LEVELS
// =============================================================================

/// Canonical optimization level, ordered from no optimization to strongest.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum OptimizationLevel {
    /// No optimization.
    None,
    /// Light optimization.
    Light,
    /// Standard optimization.
    #[default]
    Standard,
    /// Standard optimization followed by an extra pass.
    StandardPlus,
    /// Strong optimization.
    Strong,
}

impl OptimizationLevel {
    /// Every level in ascending order.
    pub const ALL: [Self; 5] = [
        Self::None,
        Self::Light,
        Self::Standard,
        Self::StandardPlus,
        Self::Strong,
    ];

    /// Ordinal in `0..=4`.
    #[must_use]
    pub const fn ordinal(self) -> u8 {
        self as u8
    }

    /// Level for a canonical ordinal.
    #[must_use]
    pub fn from_ordinal(ordinal: u8) -> Option<Self> {
        Self::ALL.get(usize::from(ordinal)).copied()
    }

    /// Keyword understood by the engine's `-o` flag.
    #[must_use]
    pub const fn keyword(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Light => "light",
            Self::Standard => "standard",
            Self::StandardPlus => "standard+",
            Self::Strong => "strong",
        }
    }
}

impl fmt::Display for OptimizationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// The historical four-valued optimization scale.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum LegacyOptimizationLevel {
    /// No optimization.
    None,
    /// Light optimization.
    Light,
    /// Medium optimization.
    Medium,
    /// Strong optimization.
    Strong,
}

impl LegacyOptimizationLevel {
    /// Legacy level for an ordinal in `0..=3`.
    #[must_use]
    pub const fn from_ordinal(ordinal: u8) -> Option<Self> {
        match ordinal {
            0 => Some(Self::None),
            1 => Some(Self::Light),
            2 => Some(Self::Medium),
            3 => Some(Self::Strong),
            _ => None,
        }
    }
}

impl From<LegacyOptimizationLevel> for OptimizationLevel {
    fn from(level: LegacyOptimizationLevel) -> Self {
        match level {
            LegacyOptimizationLevel::None => Self::None,
            LegacyOptimizationLevel::Light => Self::Light,
            LegacyOptimizationLevel::Medium => Self::Standard,
            LegacyOptimizationLevel::Strong => Self::Strong,
        }
    }
}

/// A persisted optimization level tagged with the scale it was written in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "scheme", content = "level")]
pub enum VersionedOptimizationLevel {
    /// Written on the four-valued scale.
    Legacy(LegacyOptimizationLevel),
    /// Written on the canonical scale.
    Canonical(OptimizationLevel),
}

impl VersionedOptimizationLevel {
    /// Canonical level this value stands for.
    #[must_use]
    pub fn resolve(self) -> OptimizationLevel {
        match self {
            Self::Legacy(level) => level.into(),
            Self::Canonical(level) => level,
        }
    }
}

impl From<OptimizationLevel> for VersionedOptimizationLevel {
    fn from(level: OptimizationLevel) -> Self {
        Self::Canonical(level)
    }
}

/// Serde adapter storing an [`OptimizationLevel`] as a [`VersionedOptimizationLevel`].
///
/// Always writes the canonical tag; reads either tag.
pub(crate) mod versioned_level {
    use super::{OptimizationLevel, VersionedOptimizationLevel};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[allow(clippy::trivially_copy_pass_by_ref)]
    pub fn serialize<S: Serializer>(
        level: &OptimizationLevel,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        VersionedOptimizationLevel::Canonical(*level).serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<OptimizationLevel, D::Error> {
        VersionedOptimizationLevel::deserialize(deserializer).map(VersionedOptimizationLevel::resolve)
    }
}

/// How to read a bare level ordinal from a legacy record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LevelScheme {
    /// Ordinal on the four-valued scale (`0..=3`).
    Legacy,
    /// Ordinal on the canonical scale (`0..=4`).
    Canonical,
}

impl LevelScheme {
    /// Resolves `ordinal` on this scale to a canonical level.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::InvalidParameter`] for out-of-range ordinals.
    pub fn level_from_ordinal(self, ordinal: i64) -> Result<OptimizationLevel, ConfigurationError> {
        let level = u8::try_from(ordinal).ok().and_then(|o| match self {
            Self::Legacy => LegacyOptimizationLevel::from_ordinal(o).map(OptimizationLevel::from),
            Self::Canonical => OptimizationLevel::from_ordinal(o),
        });
        level.ok_or_else(|| {
            let reason = match self {
                Self::Legacy => "legacy levels are 0..=3",
                Self::Canonical => "levels are 0..=4",
            };
            ConfigurationError::invalid("optimization_level", ordinal, reason)
        })
    }
}

// =============================================================================
// SHARED RUN OPTIONS
// =============================================================================

/// Where the engine log goes. The two destinations are exclusive.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LogDestination {
    /// A log file in the working directory.
    #[default]
    File,
    /// The process's standard output.
    StandardOutput,
}

/// Identity of one parameter set, used to scope its default working
/// directory.
///
/// It is never persisted and a clone draws a new id, so two algorithms
/// restored from the same document or sharing cloned parameters never run in
/// the same directory. It takes no part in equality.
#[derive(Debug)]
struct InstanceScope(Uuid);

impl Default for InstanceScope {
    fn default() -> Self {
        Self(make_uuid())
    }
}

impl Clone for InstanceScope {
    fn clone(&self) -> Self {
        Self::default()
    }
}

impl PartialEq for InstanceScope {
    fn eq(&self, _: &Self) -> bool {
        true
    }
}

impl Eq for InstanceScope {}

/// Run settings shared by the generation and optimization passes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunOptions {
    #[serde(skip)]
    instance_id: InstanceScope,
    maximum_memory_mb: Option<u32>,
    initial_memory_mb: Option<u32>,
    working_directory: Option<PathBuf>,
    keep_working_files: bool,
    remove_log_on_success: bool,
    log_destination: LogDestination,
    verbose_level: u8,
    advanced_options: String,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            instance_id: InstanceScope::default(),
            maximum_memory_mb: None,
            initial_memory_mb: None,
            working_directory: None,
            keep_working_files: false,
            remove_log_on_success: false,
            log_destination: LogDestination::File,
            verbose_level: DEFAULT_VERBOSE_LEVEL,
            advanced_options: String::new(),
        }
    }
}

impl RunOptions {
    /// Unique id of the owning parameter set; scopes the default working
    /// directory. Clones and restored copies get their own id.
    #[must_use]
    pub const fn instance_id(&self) -> Uuid {
        self.instance_id.0
    }

    /// Returns `true` if the advanced text contains `flag` as a separate token.
    #[must_use]
    pub fn advanced_contains(&self, flag: &str) -> bool {
        self.advanced_options.split_whitespace().any(|t| t == flag)
    }
}

/// Accessors and validated setters for the options in [`RunOptions`].
///
/// Every setter is idempotent: setting the same value twice leaves the same
/// configuration as setting it once.
pub trait RunSettings {
    /// Shared run options.
    fn run_options(&self) -> &RunOptions;

    /// Mutable shared run options.
    fn run_options_mut(&mut self) -> &mut RunOptions;

    /// Sets the engine memory ceiling.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::InvalidParameter`] when `megabytes` is 0.
    fn set_maximum_memory_mb(&mut self, megabytes: u32) -> Result<(), ConfigurationError> {
        if megabytes == 0 {
            return Err(ConfigurationError::invalid(
                "maximum_memory_mb",
                megabytes,
                "must be positive",
            ));
        }
        self.run_options_mut().maximum_memory_mb = Some(megabytes);
        Ok(())
    }

    /// Configured memory ceiling, if any.
    fn maximum_memory_mb(&self) -> Option<u32> {
        self.run_options().maximum_memory_mb
    }

    /// Sets the initial memory hint.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::InvalidParameter`] when `megabytes` is 0.
    fn set_initial_memory_mb(&mut self, megabytes: u32) -> Result<(), ConfigurationError> {
        if megabytes == 0 {
            return Err(ConfigurationError::invalid(
                "initial_memory_mb",
                megabytes,
                "must be positive",
            ));
        }
        self.run_options_mut().initial_memory_mb = Some(megabytes);
        Ok(())
    }

    /// Configured initial memory hint, if any.
    fn initial_memory_mb(&self) -> Option<u32> {
        self.run_options().initial_memory_mb
    }

    /// Overrides the instance-scoped working directory.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::InvalidParameter`] for an empty path.
    fn set_working_directory(&mut self, dir: impl Into<PathBuf>) -> Result<(), ConfigurationError>
    where
        Self: Sized,
    {
        let dir = dir.into();
        if dir.as_os_str().is_empty() {
            return Err(ConfigurationError::invalid(
                "working_directory",
                "",
                "must not be empty",
            ));
        }
        self.run_options_mut().working_directory = Some(dir);
        Ok(())
    }

    /// Explicit working directory, if one was set.
    fn working_directory(&self) -> Option<&Path> {
        self.run_options().working_directory.as_deref()
    }

    /// Directory the engine runs in: the explicit override, or
    /// `<base>/tetra_<instance id>`.
    fn resolved_working_directory(&self) -> PathBuf {
        let options = self.run_options();
        options.working_directory.clone().unwrap_or_else(|| {
            working_directory_base().join(format!("tetra_{}", options.instance_id.0.simple()))
        })
    }

    /// Keep engine input/output files after the run.
    fn set_keep_working_files(&mut self, keep: bool) {
        self.run_options_mut().keep_working_files = keep;
    }

    /// Whether engine files are kept after the run.
    fn keep_working_files(&self) -> bool {
        self.run_options().keep_working_files
    }

    /// Delete the log file when the run succeeds.
    fn set_remove_log_on_success(&mut self, remove: bool) {
        self.run_options_mut().remove_log_on_success = remove;
    }

    /// Whether the log is deleted after a successful run.
    fn remove_log_on_success(&self) -> bool {
        self.run_options().remove_log_on_success
    }

    /// Selects where the engine log goes.
    fn set_log_destination(&mut self, destination: LogDestination) {
        self.run_options_mut().log_destination = destination;
    }

    /// Where the engine log goes.
    fn log_destination(&self) -> LogDestination {
        self.run_options().log_destination
    }

    /// Sets verbosity: 0 silent, 2 summary and timing, 10 full histograms.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::InvalidParameter`] above [`MAX_VERBOSE_LEVEL`].
    fn set_verbose_level(&mut self, level: u8) -> Result<(), ConfigurationError> {
        if level > MAX_VERBOSE_LEVEL {
            return Err(ConfigurationError::invalid(
                "verbose_level",
                level,
                "must be in 0..=10",
            ));
        }
        self.run_options_mut().verbose_level = level;
        Ok(())
    }

    /// Verbosity level.
    fn verbose_level(&self) -> u8 {
        self.run_options().verbose_level
    }

    /// Replaces the free-form advanced option text passed through to the engine.
    fn set_advanced_options(&mut self, text: &str) {
        self.run_options_mut().advanced_options = text.to_owned();
    }

    /// Free-form advanced option text.
    fn advanced_options(&self) -> &str {
        &self.run_options().advanced_options
    }

    /// Memory ceiling passed to the engine: the configured value, else
    /// [`default_maximum_memory_mb`].
    fn resolved_maximum_memory_mb(&self) -> u32 {
        self.maximum_memory_mb()
            .unwrap_or_else(default_maximum_memory_mb)
    }
}

/// 70% of physical RAM in megabytes, or [`FALLBACK_MAXIMUM_MEMORY_MB`].
///
/// Queried once per process.
#[must_use]
pub fn default_maximum_memory_mb() -> u32 {
    static DEFAULT: OnceLock<u32> = OnceLock::new();
    *DEFAULT.get_or_init(|| {
        let system = System::new_with_specifics(
            RefreshKind::new().with_memory(MemoryRefreshKind::new().with_ram()),
        );
        let total_mb = system.total_memory() / (1024 * 1024);
        let budget = total_mb.saturating_mul(7) / 10;
        match u32::try_from(budget) {
            Ok(0) => FALLBACK_MAXIMUM_MEMORY_MB,
            Ok(mb) => mb,
            Err(_) => u32::MAX,
        }
    })
}

// =============================================================================
// PARAMETER SET
// =============================================================================

/// Options governing one generation run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterSet {
    to_mesh_holes: bool,
    to_make_groups_of_domains: bool,
    #[serde(with = "versioned_level")]
    optimization_level: OptimizationLevel,
    to_create_new_nodes: bool,
    use_boundary_recovery: bool,
    fem_correction: bool,
    remove_initial_central_point: bool,
    run: RunOptions,
}

impl Default for ParameterSet {
    fn default() -> Self {
        Self {
            to_mesh_holes: true,
            to_make_groups_of_domains: false,
            optimization_level: OptimizationLevel::Standard,
            to_create_new_nodes: true,
            use_boundary_recovery: false,
            fem_correction: false,
            remove_initial_central_point: false,
            run: RunOptions::default(),
        }
    }
}

impl RunSettings for ParameterSet {
    fn run_options(&self) -> &RunOptions {
        &self.run
    }

    fn run_options_mut(&mut self) -> &mut RunOptions {
        &mut self.run
    }
}

impl ParameterSet {
    /// Creates a parameter set with default values and a fresh instance id.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mesh internal holes (all components) rather than only the outer one.
    pub const fn set_to_mesh_holes(&mut self, value: bool) {
        self.to_mesh_holes = value;
    }

    /// Whether holes are meshed.
    #[must_use]
    pub const fn to_mesh_holes(&self) -> bool {
        self.to_mesh_holes
    }

    /// Hole meshing after applying `-c 0` / `-c 1` found in the advanced text.
    #[must_use]
    pub fn to_mesh_holes_effective(&self) -> bool {
        let tokens: Vec<&str> = self.run.advanced_options.split_whitespace().collect();
        tokens
            .windows(2)
            .rev()
            .find_map(|pair| match pair {
                ["-c", "0"] => Some(true),
                ["-c", "1"] => Some(false),
                _ => None,
            })
            .unwrap_or(self.to_mesh_holes)
    }

    /// Group output volumes by domain when meshing holes.
    pub const fn set_to_make_groups_of_domains(&mut self, value: bool) {
        self.to_make_groups_of_domains = value;
    }

    /// Whether domain groups are created.
    #[must_use]
    pub const fn to_make_groups_of_domains(&self) -> bool {
        self.to_make_groups_of_domains
    }

    /// Sets the optimization level.
    pub const fn set_optimization_level(&mut self, level: OptimizationLevel) {
        self.optimization_level = level;
    }

    /// Sets the optimization level from a legacy ordinal (`0..=3`).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::InvalidParameter`] for ordinals above 3.
    pub fn set_legacy_optimization_level(&mut self, ordinal: i64) -> Result<(), ConfigurationError> {
        self.optimization_level = LevelScheme::Legacy.level_from_ordinal(ordinal)?;
        Ok(())
    }

    /// Optimization level.
    #[must_use]
    pub const fn optimization_level(&self) -> OptimizationLevel {
        self.optimization_level
    }

    /// Allow the engine to insert interior nodes.
    pub const fn set_to_create_new_nodes(&mut self, value: bool) {
        self.to_create_new_nodes = value;
    }

    /// Whether interior nodes may be created.
    #[must_use]
    pub const fn to_create_new_nodes(&self) -> bool {
        self.to_create_new_nodes
    }

    /// Run the boundary-recovery variant for poor-quality input surfaces.
    pub const fn set_use_boundary_recovery(&mut self, value: bool) {
        self.use_boundary_recovery = value;
    }

    /// Whether boundary recovery is requested.
    #[must_use]
    pub const fn use_boundary_recovery(&self) -> bool {
        self.use_boundary_recovery
    }

    /// Boundary recovery after applying a `-C` flag in the advanced text.
    #[must_use]
    pub fn use_boundary_recovery_effective(&self) -> bool {
        self.use_boundary_recovery || self.run.advanced_contains("-C")
    }

    /// Split over-constrained edges, then facets.
    pub const fn set_fem_correction(&mut self, value: bool) {
        self.fem_correction = value;
    }

    /// Whether finite-element correction is requested.
    #[must_use]
    pub const fn fem_correction(&self) -> bool {
        self.fem_correction
    }

    /// Remove the initial central point.
    pub const fn set_remove_initial_central_point(&mut self, value: bool) {
        self.remove_initial_central_point = value;
    }

    /// Whether the initial central point is removed.
    #[must_use]
    pub const fn remove_initial_central_point(&self) -> bool {
        self.remove_initial_central_point
    }

    /// Builds the generation command arguments.
    ///
    /// Flags already present in the advanced text are left to it. With
    /// boundary recovery only the memory ceiling, verbosity and switches are
    /// emitted. A mesh with a governing shape always meshes every component.
    ///
    /// ```
    /// use tetra_constraints::core::parameters::{ParameterSet, RunSettings};
    ///
    /// let mut params = ParameterSet::new();
    /// params.set_maximum_memory_mb(512).unwrap();
    /// params.set_advanced_options("-v 3");
    /// assert_eq!(
    ///     params.engine_arguments(false),
    ///     ["-m", "512", "-M", "100", "-c", "0", "-o", "standard", "-v", "3"]
    /// );
    /// ```
    #[must_use]
    pub fn engine_arguments(&self, has_shape: bool) -> Vec<String> {
        let run = &self.run;
        let free = |flag: &str| !run.advanced_contains(flag);
        let recovery = self.use_boundary_recovery_effective();
        let mut args: Vec<String> = Vec::new();
        let mut push = |parts: &[&str]| args.extend(parts.iter().map(|p| (*p).to_owned()));

        if free("-m") {
            push(&["-m", &self.resolved_maximum_memory_mb().to_string()]);
        }
        if free("-M") && !recovery {
            let initial = run.initial_memory_mb.unwrap_or(DEFAULT_INITIAL_MEMORY_MB);
            push(&["-M", &initial.to_string()]);
        }
        if free("-c") && !recovery {
            let components = if has_shape || self.to_mesh_holes { "0" } else { "1" };
            push(&["-c", components]);
        }
        if free("-o") && !recovery {
            push(&["-o", self.optimization_level.keyword()]);
        }
        if free("-p0") && !self.to_create_new_nodes {
            push(&["-p0"]);
        }
        if free("-v") {
            push(&["-v", &run.verbose_level.to_string()]);
        }
        if recovery && free("-C") {
            push(&["-C"]);
        }
        if free("-FEM") && self.fem_correction {
            push(&["-FEM"]);
        }
        if free("-no_initial_central_point") && self.remove_initial_central_point {
            push(&["-no_initial_central_point"]);
        }
        args.extend(run.advanced_options.split_whitespace().map(str::to_owned));
        args
    }

    // =========================================================================
    // LEGACY RECORDS
    // =========================================================================

    /// Writes the whitespace-separated legacy record.
    ///
    /// An unset working directory is omitted, which readers detect by the
    /// following `0`/`1` keep flag. Unset memory values are written as `-1`.
    ///
    /// # Errors
    ///
    /// The record is a flat token list, so a working directory that is not
    /// a single token, or that reads back as a keep flag or an options
    /// marker, returns [`ConfigurationError::InvalidParameter`]. Use the JSON
    /// form for such paths.
    pub fn to_legacy_record(&self) -> Result<String, ConfigurationError> {
        let run = &self.run;
        let memory = |m: Option<u32>| m.map_or_else(|| "-1".to_owned(), |v| v.to_string());
        let mut fields = vec![
            u8::from(self.to_mesh_holes).to_string(),
            memory(run.maximum_memory_mb),
            memory(run.initial_memory_mb),
            self.optimization_level.ordinal().to_string(),
        ];
        if let Some(dir) = &run.working_directory {
            let token = dir.display().to_string();
            if token.contains(char::is_whitespace)
                || matches!(token.as_str(), "0" | "1" | OPTIONS_BEGIN | OPTIONS_END)
            {
                return Err(ConfigurationError::invalid(
                    "working_directory",
                    token,
                    "cannot be stored in a legacy record",
                ));
            }
            fields.push(token);
        }
        fields.extend([
            u8::from(run.keep_working_files).to_string(),
            run.verbose_level.to_string(),
            u8::from(self.to_create_new_nodes).to_string(),
            u8::from(self.use_boundary_recovery).to_string(),
            u8::from(self.fem_correction).to_string(),
            u8::from(self.remove_initial_central_point).to_string(),
        ]);
        if !run.advanced_options.trim().is_empty() {
            fields.push(OPTIONS_BEGIN.to_owned());
            fields.push(run.advanced_options.trim().to_owned());
            fields.push(OPTIONS_END.to_owned());
        }
        Ok(fields.join(" "))
    }

    /// Reads a legacy record.
    ///
    /// Field order: holes, max memory, initial memory, level, working
    /// directory, keep files, verbosity, new nodes, boundary recovery, FEM
    /// correction, remove central point, then an optional
    /// `__OPTIONS_BEGIN__ ... __OPTIONS_END__` block. Missing trailing fields
    /// keep their defaults. Memory values `<= 0` mean "unset". A working
    /// directory token of `0` or `1` means the directory was empty and the
    /// token is the keep flag, so directories named `0` or `1`, or containing
    /// whitespace, cannot be carried by this format.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::InvalidParameter`] for unparsable or
    /// out-of-range fields.
    pub fn from_legacy_record(text: &str, scheme: LevelScheme) -> Result<Self, ConfigurationError> {
        let mut params = Self::default();
        let mut tokens = text.split_whitespace().peekable();

        if let Some(t) = tokens.next() {
            params.to_mesh_holes = parse_flag("to_mesh_holes", t)?;
        }
        if let Some(t) = tokens.next() {
            params.run.maximum_memory_mb = parse_memory("maximum_memory_mb", t)?;
        }
        if let Some(t) = tokens.next() {
            params.run.initial_memory_mb = parse_memory("initial_memory_mb", t)?;
        }
        if let Some(t) = tokens.next() {
            params.optimization_level = scheme.level_from_ordinal(parse_int("optimization_level", t)?)?;
        }
        match tokens.next() {
            Some(t @ ("0" | "1")) => params.run.keep_working_files = t == "1",
            Some(dir) => {
                params.set_working_directory(dir)?;
                if let Some(t) = tokens.next() {
                    params.run.keep_working_files = parse_flag("keep_working_files", t)?;
                }
            }
            None => {}
        }

        if let Some(t) = tokens.next_if(|t| *t != OPTIONS_BEGIN) {
            let level = u8::try_from(parse_int("verbose_level", t)?)
                .map_err(|_| ConfigurationError::invalid("verbose_level", t, "must be in 0..=10"))?;
            params.set_verbose_level(level)?;
        }
        let flags: [(&'static str, &mut bool); 4] = [
            ("to_create_new_nodes", &mut params.to_create_new_nodes),
            ("use_boundary_recovery", &mut params.use_boundary_recovery),
            ("fem_correction", &mut params.fem_correction),
            ("remove_initial_central_point", &mut params.remove_initial_central_point),
        ];
        for (option, slot) in flags {
            if let Some(t) = tokens.next_if(|t| *t != OPTIONS_BEGIN) {
                *slot = parse_flag(option, t)?;
            }
        }

        if tokens.next_if_eq(&OPTIONS_BEGIN).is_some() {
            let text: Vec<&str> = tokens.by_ref().take_while(|t| *t != OPTIONS_END).collect();
            params.run.advanced_options = text.join(" ");
        }
        Ok(params)
    }
}

fn parse_int(option: &'static str, token: &str) -> Result<i64, ConfigurationError> {
    token
        .parse::<i64>()
        .map_err(|_| ConfigurationError::invalid(option, token, "expected an integer"))
}

fn parse_flag(option: &'static str, token: &str) -> Result<bool, ConfigurationError> {
    Ok(parse_int(option, token)? != 0)
}

fn parse_memory(option: &'static str, token: &str) -> Result<Option<u32>, ConfigurationError> {
    let value = parse_int(option, token)?;
    if value <= 0 {
        return Ok(None);
    }
    u32::try_from(value)
        .map(Some)
        .map_err(|_| ConfigurationError::invalid(option, token, "exceeds u32 range"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_levels_are_ordered() {
        for pair in OptimizationLevel::ALL.windows(2) {
            assert!(pair[0] < pair[1]);
        }
        assert_eq!(OptimizationLevel::default(), OptimizationLevel::Standard);
        for (i, level) in OptimizationLevel::ALL.iter().enumerate() {
            assert_eq!(usize::from(level.ordinal()), i);
            assert_eq!(OptimizationLevel::from_ordinal(level.ordinal()), Some(*level));
        }
        assert_eq!(OptimizationLevel::from_ordinal(5), None);
    }

    #[test]
    fn test_legacy_mapping() {
        use LegacyOptimizationLevel as L;
        use OptimizationLevel as C;
        assert_eq!(C::from(L::None), C::None);
        assert_eq!(C::from(L::Light), C::Light);
        assert_eq!(C::from(L::Medium), C::Standard);
        assert_eq!(C::from(L::Strong), C::Strong);
        assert_ne!(C::from(L::Strong), C::StandardPlus);
    }

    #[test]
    fn test_level_scheme_ordinals() {
        assert_eq!(LevelScheme::Legacy.level_from_ordinal(3), Ok(OptimizationLevel::Strong));
        assert_eq!(LevelScheme::Canonical.level_from_ordinal(3), Ok(OptimizationLevel::StandardPlus));
        assert!(LevelScheme::Legacy.level_from_ordinal(4).is_err());
        assert!(LevelScheme::Canonical.level_from_ordinal(-1).is_err());
    }

    #[test]
    fn test_versioned_level_reads_both_tags_and_writes_canonical() {
        let legacy = r#"{"scheme":"Legacy","level":"Medium"}"#;
        let parsed: VersionedOptimizationLevel = serde_json::from_str(legacy).unwrap();
        assert_eq!(parsed.resolve(), OptimizationLevel::Standard);

        let mut params = ParameterSet::new();
        params.set_optimization_level(OptimizationLevel::StandardPlus);
        let json = serde_json::to_value(&params).unwrap();
        assert_eq!(
            json["optimization_level"],
            serde_json::json!({"scheme": "Canonical", "level": "StandardPlus"})
        );
    }

    #[test]
    fn test_integer_setters_reject_out_of_range() {
        let mut params = ParameterSet::new();
        assert!(params.set_maximum_memory_mb(0).is_err());
        assert!(params.set_initial_memory_mb(0).is_err());
        assert!(params.set_verbose_level(11).is_err());
        assert!(params.set_working_directory("").is_err());
        assert!(params.set_legacy_optimization_level(4).is_err());

        assert_eq!(params.maximum_memory_mb(), None);
        assert_eq!(params.verbose_level(), DEFAULT_VERBOSE_LEVEL);
        params.set_verbose_level(0).unwrap();
        assert_eq!(params.verbose_level(), 0);
    }

    #[test]
    fn test_default_working_directory_is_instance_scoped() {
        let a = ParameterSet::new();
        let b = ParameterSet::new();
        assert_ne!(a.resolved_working_directory(), b.resolved_working_directory());
        let name = a.resolved_working_directory();
        let leaf = name.file_name().and_then(|n| n.to_str()).unwrap();
        assert!(leaf.starts_with("tetra_"));

        let mut c = ParameterSet::new();
        c.set_working_directory("/scratch/run").unwrap();
        assert_eq!(c.resolved_working_directory(), PathBuf::from("/scratch/run"));
    }

    #[test]
    fn test_engine_arguments_defaults() {
        let mut params = ParameterSet::new();
        params.set_maximum_memory_mb(2048).unwrap();
        assert_eq!(
            params.engine_arguments(false),
            ["-m", "2048", "-M", "100", "-c", "0", "-o", "standard", "-v", "10"]
        );

        params.set_to_mesh_holes(false);
        params.set_to_create_new_nodes(false);
        params.set_fem_correction(true);
        params.set_remove_initial_central_point(true);
        assert_eq!(
            params.engine_arguments(false),
            [
                "-m", "2048", "-M", "100", "-c", "1", "-o", "standard", "-p0", "-v", "10",
                "-FEM", "-no_initial_central_point"
            ]
        );
        // A shape always meshes every component.
        assert!(params.engine_arguments(true).windows(2).any(|w| w == ["-c", "0"]));
    }

    #[test]
    fn test_engine_arguments_with_boundary_recovery() {
        let mut params = ParameterSet::new();
        params.set_maximum_memory_mb(64).unwrap();
        params.set_initial_memory_mb(32).unwrap();
        params.set_use_boundary_recovery(true);
        assert_eq!(params.engine_arguments(false), ["-m", "64", "-v", "10", "-C"]);
    }

    #[test]
    fn test_engine_arguments_defer_to_advanced_text() {
        let mut params = ParameterSet::new();
        params.set_maximum_memory_mb(64).unwrap();
        params.set_advanced_options("-c 1 -o light");
        assert_eq!(
            params.engine_arguments(false),
            ["-m", "64", "-M", "100", "-v", "10", "-c", "1", "-o", "light"]
        );
        assert!(!params.to_mesh_holes_effective());

        params.set_advanced_options("-C");
        assert!(params.use_boundary_recovery_effective());
        assert_eq!(params.engine_arguments(false), ["-m", "64", "-v", "10", "-C"]);
    }

    #[test]
    fn test_legacy_record_round_trip() {
        let mut params = ParameterSet::new();
        params.set_to_mesh_holes(false);
        params.set_maximum_memory_mb(700).unwrap();
        params.set_optimization_level(OptimizationLevel::Strong);
        params.set_working_directory("/tmp/work").unwrap();
        params.set_keep_working_files(true);
        params.set_verbose_level(2).unwrap();
        params.set_fem_correction(true);
        params.set_advanced_options("-a  -b 3");

        let record = params.to_legacy_record().unwrap();
        assert_eq!(record, "0 700 -1 4 /tmp/work 1 2 1 0 1 0 __OPTIONS_BEGIN__ -a  -b 3 __OPTIONS_END__");

        let restored = ParameterSet::from_legacy_record(&record, LevelScheme::Canonical).unwrap();
        assert!(!restored.to_mesh_holes());
        assert_eq!(restored.maximum_memory_mb(), Some(700));
        assert_eq!(restored.initial_memory_mb(), None);
        assert_eq!(restored.optimization_level(), OptimizationLevel::Strong);
        assert_eq!(restored.working_directory(), Some(Path::new("/tmp/work")));
        assert!(restored.keep_working_files());
        assert_eq!(restored.verbose_level(), 2);
        assert!(restored.fem_correction());
        assert_eq!(restored.advanced_options(), "-a -b 3");
    }

    #[test]
    fn test_legacy_record_without_working_directory() {
        let params = ParameterSet::from_legacy_record("1 -1 -1 2 1 10 1 0", LevelScheme::Legacy).unwrap();
        assert_eq!(params.optimization_level(), OptimizationLevel::Standard);
        assert_eq!(params.working_directory(), None);
        assert!(params.keep_working_files());
        assert_eq!(params.verbose_level(), 10);
        assert!(params.to_create_new_nodes());
        assert!(!params.use_boundary_recovery());
        // Trailing fields keep defaults.
        assert!(!params.fem_correction());
    }

    #[test]
    fn test_legacy_record_refuses_ambiguous_working_directories() {
        for dir in ["1", "0", "/tmp/my work", "__OPTIONS_BEGIN__"] {
            let mut params = ParameterSet::new();
            params.set_working_directory(dir).unwrap();
            assert!(
                matches!(
                    params.to_legacy_record(),
                    Err(ConfigurationError::InvalidParameter {
                        option: "working_directory",
                        ..
                    })
                ),
                "{dir:?} should be refused"
            );
        }

        let mut params = ParameterSet::new();
        params.set_working_directory("/tmp/10").unwrap();
        let record = params.to_legacy_record().unwrap();
        let restored = ParameterSet::from_legacy_record(&record, LevelScheme::Canonical).unwrap();
        assert_eq!(restored.working_directory(), Some(Path::new("/tmp/10")));
    }

    #[test]
    fn test_legacy_record_rejects_garbage() {
        assert!(ParameterSet::from_legacy_record("yes", LevelScheme::Legacy).is_err());
        assert!(ParameterSet::from_legacy_record("1 -1 -1 7", LevelScheme::Canonical).is_err());
        assert!(ParameterSet::from_legacy_record("1 -1 -1 2 0 11", LevelScheme::Canonical).is_err());
    }
}
