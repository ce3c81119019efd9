//! Black-box process contracts for the benchmark engine and the query
//! generator.
//!
//! Both tools are modeled as capabilities so sweeps can run against a test
//! double that returns scripted outcomes without spawning anything. The real
//! implementations shell out to the external executables and capture their
//! output.

use std::env::consts::EXE_SUFFIX;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result};

use crate::results::IndexSpec;
use crate::sentinel;
use crate::workload::WorkloadPaths;

/// Everything the engine needs to measure one (index, graph) cell.
#[derive(Debug, Clone)]
pub struct CellSpec<'a> {
    pub index: &'a IndexSpec,
    pub graph_file: &'a Path,
    /// Query files that exist next to the graph file, one per shape.
    pub query_files: &'a [PathBuf],
    pub time_limit_secs: u64,
    pub memory_limit_mb: u64,
}

/// Raw outcome of one engine invocation, before classification.
#[derive(Debug, Clone)]
pub struct EngineOutput {
    pub success: bool,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

/// Runs the benchmark engine for one cell.
pub trait Engine {
    fn run_cell(&self, spec: &CellSpec<'_>) -> Result<EngineOutput>;
}

/// Generates query files for one graph; success means one or more
/// `<base>.queries-lcr.*.csv` siblings exist afterwards.
pub trait QueryGenerator {
    fn generate(&self, graph_file: &Path) -> Result<()>;
}

/// Classify a failed invocation's stderr into a sentinel code. `None` means
/// the text matched no known failure marker; the caller must treat that as a
/// tool-contract violation, not as data.
pub fn classify_stderr(stderr: &str) -> Option<f64> {
    if stderr.contains("memory limit") {
        Some(sentinel::MEMORY_LIMIT)
    } else if stderr.contains("time limit") {
        Some(sentinel::TIME_LIMIT)
    } else {
        None
    }
}

/// Look for `name` in the working directory, falling back to the release
/// build tree the engine's own build drops binaries into.
pub fn locate_executable(name: &str) -> PathBuf {
    let direct = PathBuf::from(format!("./{name}{EXE_SUFFIX}"));
    if direct.exists() {
        return direct;
    }
    PathBuf::from(format!("./cmake-build-release/{name}{EXE_SUFFIX}"))
}

/// The real engine executable.
pub struct ProcessEngine {
    executable: PathBuf,
}

impl ProcessEngine {
    pub fn new(executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
        }
    }
}

impl Engine for ProcessEngine {
    fn run_cell(&self, spec: &CellSpec<'_>) -> Result<EngineOutput> {
        let mut cmd = Command::new(&self.executable);
        cmd.arg("lcr").arg("--index").arg(&spec.index.name);
        cmd.arg("--indexParams");
        for param in &spec.index.params {
            cmd.arg(param);
        }
        cmd.arg("--graphFile").arg(spec.graph_file);
        for query_file in spec.query_files {
            cmd.arg("--queryFile").arg(query_file);
        }
        cmd.arg("--timeLimit").arg(spec.time_limit_secs.to_string());
        cmd.arg("--memoryLimit").arg(spec.memory_limit_mb.to_string());

        let out = cmd.output().with_context(|| {
            format!("failed to run engine {}", self.executable.display())
        })?;

        Ok(EngineOutput {
            success: out.status.success(),
            exit_code: out.status.code(),
            stdout: String::from_utf8_lossy(&out.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&out.stderr).into_owned(),
        })
    }
}

/// The real query-generator executable.
pub struct ProcessQueryGenerator {
    executable: PathBuf,
    random_queries: u64,
    connected_queries: u64,
    split_random_from_connected: bool,
}

impl ProcessQueryGenerator {
    pub fn new(
        executable: impl Into<PathBuf>,
        random_queries: u64,
        connected_queries: u64,
        split_random_from_connected: bool,
    ) -> Self {
        Self {
            executable: executable.into(),
            random_queries,
            connected_queries,
            split_random_from_connected,
        }
    }
}

impl QueryGenerator for ProcessQueryGenerator {
    fn generate(&self, graph_file: &Path) -> Result<()> {
        let mut cmd = Command::new(&self.executable);
        cmd.arg("--graphFile")
            .arg(graph_file)
            .arg("--randomQueries")
            .arg(self.random_queries.to_string())
            .arg("--connectedQueries")
            .arg(self.connected_queries.to_string());
        if self.split_random_from_connected {
            cmd.arg("--splitRandomFromConnected");
        }

        println!("generating queries: {}", graph_file.display());

        let out = cmd.output().with_context(|| {
            format!("failed to run query generator {}", self.executable.display())
        })?;
        if !out.status.success() {
            anyhow::bail!(
                "query generation failed for {}:\n{}",
                graph_file.display(),
                String::from_utf8_lossy(&out.stderr)
            );
        }
        Ok(())
    }
}

/// Ensure every graph has query files and collect the union of shape modes
/// found next to them. Generation is skipped for graphs that already have at
/// least one query file.
pub fn generate_and_enumerate_modes(
    generator: &dyn QueryGenerator,
    graph_files: &[PathBuf],
) -> Result<Vec<String>> {
    let mut modes: Vec<String> = Vec::new();
    for graph_file in graph_files {
        if WorkloadPaths::query_modes(graph_file)?.is_empty() {
            generator.generate(graph_file).with_context(|| {
                format!("failed generating queries for graph file {}", graph_file.display())
            })?;
        }
        for mode in WorkloadPaths::query_modes(graph_file)? {
            if !modes.contains(&mode) {
                modes.push(mode);
            }
        }
    }
    modes.sort();
    Ok(modes)
}
