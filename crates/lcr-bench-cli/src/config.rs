//! JSON sweep configuration.
//!
//! One config file declares everything a sweep needs: the index
//! configurations, the graph dimensions or graph lists, limits, and where the
//! external tools and directories live. Synthetic and real sweeps share the
//! format; each entry point validates that its own dimensions are present.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use lcr_bench_core::engine::locate_executable;
use lcr_bench_core::results::IndexSpec;
use lcr_bench_core::sentinel;
use lcr_bench_core::sweep::{default_presumed_failures, PresumedFailure, RealSweep, SynthSweep};
use lcr_bench_core::workload::{GraphModel, LabelDist};

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PresumedFailureConfig {
    pub index: String,
    pub beyond_labels: u32,
    /// Sentinel code to record; defaults to the memory limit.
    #[serde(default = "default_presumed_code")]
    pub code: f64,
}

fn default_presumed_code() -> f64 {
    sentinel::MEMORY_LIMIT
}

fn default_difficulty() -> f64 {
    1.0
}

fn default_true() -> bool {
    true
}

fn default_query_count() -> u64 {
    50_000
}

fn default_distributions() -> Vec<LabelDist> {
    vec![LabelDist::Exp]
}

fn default_models() -> Vec<GraphModel> {
    vec![GraphModel::Er]
}

fn default_workload_dir() -> PathBuf {
    PathBuf::from("./workload")
}

fn default_results_dir() -> PathBuf {
    PathBuf::from("./benchmark-results")
}

fn default_state_dir() -> PathBuf {
    PathBuf::from("./benchmark-state")
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SweepConfig {
    pub indexes: Vec<IndexSpec>,

    // synthetic dimensions
    #[serde(default)]
    pub node_sizes: Vec<u64>,
    #[serde(default)]
    pub label_sizes: Vec<u32>,
    #[serde(default)]
    pub degrees: Vec<u32>,
    #[serde(default = "default_distributions")]
    pub distributions: Vec<LabelDist>,
    #[serde(default = "default_models")]
    pub models: Vec<GraphModel>,

    // real-graph lists
    #[serde(default)]
    pub graphs: Vec<String>,
    #[serde(default)]
    pub graphs_only_on_success: Vec<String>,

    #[serde(default = "default_difficulty")]
    pub difficulty: f64,
    #[serde(default = "default_true")]
    pub short_circuit: bool,
    /// Replaces the built-in list when present; an empty list disables
    /// presumed failures entirely.
    pub presumed_failures: Option<Vec<PresumedFailureConfig>>,

    pub time_limit_secs: Option<u64>,
    pub memory_limit_mb: Option<u64>,

    pub engine: Option<PathBuf>,
    pub query_generator: Option<PathBuf>,
    #[serde(default = "default_query_count")]
    pub random_queries: u64,
    #[serde(default = "default_query_count")]
    pub connected_queries: u64,

    #[serde(default = "default_workload_dir")]
    pub workload_dir: PathBuf,
    #[serde(default = "default_results_dir")]
    pub results_dir: PathBuf,
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,
    #[serde(default)]
    pub seed: u64,
}

impl SweepConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("failed to parse config {}", path.display()))
    }

    pub fn engine_executable(&self) -> PathBuf {
        self.engine
            .clone()
            .unwrap_or_else(|| locate_executable("MasterThesis"))
    }

    pub fn generator_executable(&self) -> PathBuf {
        self.query_generator
            .clone()
            .unwrap_or_else(|| locate_executable("LCRQueryGenerator"))
    }

    fn presumed_failures(&self) -> Vec<PresumedFailure> {
        match &self.presumed_failures {
            Some(list) => list
                .iter()
                .map(|p| PresumedFailure {
                    index: p.index.clone(),
                    beyond_labels: p.beyond_labels,
                    code: p.code,
                })
                .collect(),
            None => default_presumed_failures(),
        }
    }

    pub fn synth_sweep(&self) -> Result<SynthSweep> {
        if self.indexes.is_empty() {
            bail!("config declares no indexes");
        }
        if self.node_sizes.is_empty() || self.label_sizes.is_empty() || self.degrees.is_empty() {
            bail!("synthetic sweep needs nodeSizes, labelSizes and degrees");
        }
        if self.distributions.is_empty() || self.models.is_empty() {
            bail!("synthetic sweep needs at least one distribution and model");
        }

        Ok(SynthSweep {
            indexes: self.indexes.clone(),
            node_sizes: self.node_sizes.clone(),
            label_sizes: self.label_sizes.clone(),
            degrees: self.degrees.clone(),
            distributions: self.distributions.clone(),
            models: self.models.clone(),
            difficulty: self.difficulty,
            short_circuit: self.short_circuit,
            presumed_failures: self.presumed_failures(),
        })
    }

    pub fn real_sweep(&self) -> Result<RealSweep> {
        if self.indexes.is_empty() {
            bail!("config declares no indexes");
        }
        if self.graphs.is_empty() {
            bail!("real sweep needs a graphs list");
        }

        Ok(RealSweep {
            indexes: self.indexes.clone(),
            graphs: self.graphs.clone(),
            graphs_only_on_success: self.graphs_only_on_success.clone(),
            difficulty: self.difficulty,
        })
    }
}
