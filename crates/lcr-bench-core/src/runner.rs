//! Executes one (index, graph) cell against the engine and records the
//! classified outcome into the live result tables.
//!
//! The full table set is persisted to the results directory after every cell
//! so that an interrupted sweep never loses results already computed.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

use crate::engine::{classify_stderr, CellSpec, Engine};
use crate::report::EngineReport;
use crate::results::{IndexSpec, QueryShape, ResultSet};
use crate::sentinel;
use crate::workload::WorkloadPaths;

/// Classified outcome of one cell.
#[derive(Debug, Clone, Copy)]
pub struct CellOutcome {
    pub success: bool,
    /// Sentinel code recorded for a failed cell; `NOT_RUN` on success.
    pub code: f64,
}

pub struct BenchmarkRunner<'a> {
    engine: &'a dyn Engine,
    results_dir: PathBuf,
    modes: Vec<String>,
    time_limit_secs: u64,
    memory_limit_mb: u64,
    set: ResultSet,
}

impl<'a> BenchmarkRunner<'a> {
    /// A runner with fresh all-not-run tables for the given identities.
    pub fn new(
        engine: &'a dyn Engine,
        results_dir: impl Into<PathBuf>,
        graphs: &[String],
        indexes: &[String],
        modes: &[String],
    ) -> Result<Self> {
        Ok(Self {
            engine,
            results_dir: results_dir.into(),
            modes: modes.to_vec(),
            // 6 hours, 128 GB unless the sweep overrides them.
            time_limit_secs: 6 * 60 * 60,
            memory_limit_mb: 128 * 1000,
            set: ResultSet::fresh(graphs, indexes, modes)?,
        })
    }

    pub fn set_time_limit(&mut self, secs: u64) {
        self.time_limit_secs = secs;
    }

    pub fn set_memory_limit(&mut self, megabytes: u64) {
        self.memory_limit_mb = megabytes;
    }

    pub fn result_set(&self) -> &ResultSet {
        &self.set
    }

    pub fn save(&self) -> Result<()> {
        self.set.save(&self.results_dir)
    }

    /// Try to adopt a previous run's tables. Returns false — leaving the
    /// fresh tables in place — when the directory is missing a table for any
    /// configured shape or its row/column identities do not match the
    /// current configuration.
    pub fn load(&mut self) -> Result<bool> {
        let loaded = match ResultSet::load(&self.results_dir) {
            Ok(set) => set,
            Err(_) => return Ok(false),
        };

        if !loaded.matches_identities(&self.set.graphs, &self.set.indexes) {
            return Ok(false);
        }
        for mode in &self.modes {
            let shape = QueryShape::parse(mode)?;
            if loaded.query_table(&shape).is_none() {
                return Ok(false);
            }
        }

        // Keep only the shapes this sweep is configured for.
        let mut loaded = loaded;
        let keep: Vec<QueryShape> = self
            .modes
            .iter()
            .map(|m| QueryShape::parse(m))
            .collect::<Result<_>>()?;
        loaded.queries.retain(|q| keep.contains(&q.shape));
        loaded.graphs = self.set.graphs.clone();
        loaded.indexes = self.set.indexes.clone();
        self.set = loaded;
        Ok(true)
    }

    /// Query files that actually exist for `graph_file`, one per configured
    /// mode, paired with the mode string.
    fn existing_query_files(&self, graph_file: &Path) -> Vec<(String, PathBuf)> {
        self.modes
            .iter()
            .map(|mode| (mode.clone(), WorkloadPaths::query_file(graph_file, mode)))
            .filter(|(_, path)| path.exists())
            .collect()
    }

    /// Run the engine for one cell and record every metric. Expected
    /// failures (memory/time limit) are recorded as sentinel codes and
    /// reported in the outcome; an unclassifiable failure is an error
    /// carrying the engine's full diagnostics, which halts the sweep.
    pub fn run_and_collect(
        &mut self,
        index: &IndexSpec,
        graph_file: &Path,
        graph: &str,
    ) -> Result<CellOutcome> {
        let index_name = index.display_name();
        let query_files = self.existing_query_files(graph_file);
        let query_paths: Vec<PathBuf> = query_files.iter().map(|(_, p)| p.clone()).collect();

        println!("running: {index_name} {graph}");

        let out = self.engine.run_cell(&CellSpec {
            index,
            graph_file,
            query_files: &query_paths,
            time_limit_secs: self.time_limit_secs,
            memory_limit_mb: self.memory_limit_mb,
        })?;

        if !out.success {
            let Some(code) = classify_stderr(&out.stderr) else {
                bail!(
                    "engine failed with unrecognized error for {index_name} on {graph}\n\
                     statusCode: {:?}\n\nstandard:\n{}\n\nerror:\n{}",
                    out.exit_code,
                    out.stdout,
                    out.stderr
                );
            };

            self.write_cell_everywhere(graph, &index_name, code)?;
            self.save()?;
            return Ok(CellOutcome {
                success: false,
                code,
            });
        }

        let report = EngineReport::parse(&out.stdout)
            .with_context(|| format!("unparseable engine report for {index_name} on {graph}"))?;

        self.set.sizes.set(graph, &index_name, report.size_mb)?;
        self.set.memory.set(graph, &index_name, report.memory_mb)?;
        self.set
            .creation
            .set(graph, &index_name, report.creation_ms)?;

        for mode in self.modes.clone() {
            let query_file = WorkloadPaths::query_file(graph_file, &mode);
            let value = report
                .query_time_ms(&query_file.display().to_string())?
                .unwrap_or(sentinel::NOT_APPLICABLE);
            self.set_query_cell(&mode, graph, &index_name, value)?;
        }

        self.save()?;
        Ok(CellOutcome {
            success: true,
            code: sentinel::NOT_RUN,
        })
    }

    /// Record a sentinel into every metric of a cell without executing the
    /// engine; query shapes whose file does not exist get NOT_APPLICABLE.
    pub fn record_failed(
        &mut self,
        index: &IndexSpec,
        graph_file: &Path,
        graph: &str,
        code: f64,
    ) -> Result<()> {
        let index_name = index.display_name();

        self.set.sizes.set(graph, &index_name, code)?;
        self.set.memory.set(graph, &index_name, code)?;
        self.set.creation.set(graph, &index_name, code)?;

        for mode in self.modes.clone() {
            let query_file = WorkloadPaths::query_file(graph_file, &mode);
            let value = if query_file.exists() {
                code
            } else {
                sentinel::NOT_APPLICABLE
            };
            self.set_query_cell(&mode, graph, &index_name, value)?;
        }

        self.save()
    }

    fn write_cell_everywhere(&mut self, graph: &str, index_name: &str, code: f64) -> Result<()> {
        self.set.sizes.set(graph, index_name, code)?;
        self.set.memory.set(graph, index_name, code)?;
        self.set.creation.set(graph, index_name, code)?;
        for query in &mut self.set.queries {
            query.table.set(graph, index_name, code)?;
        }
        Ok(())
    }

    fn set_query_cell(&mut self, mode: &str, graph: &str, index_name: &str, value: f64) -> Result<()> {
        let shape = QueryShape::parse(mode)?;
        let query = self
            .set
            .query_table_mut(&shape)
            .with_context(|| format!("no query table for shape {mode:?}"))?;
        query.table.set(graph, index_name, value)
    }
}
