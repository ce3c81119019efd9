//! Sweep scheduling: nested-loop enumeration, checkpointed resumption, and
//! failure short-circuiting.
//!
//! The nested loops are driven as a flat, ranked cartesian product with an
//! explicit cursor. Enumeration order is a contract: short-circuiting and
//! resumption both assume cells are revisited in the identical order on
//! every resume. The cursor is persisted before each cell executes, so an
//! interruption replays at most the cell that was in flight.

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::checkpoint::CheckpointStore;
use crate::engine::{generate_and_enumerate_modes, Engine, QueryGenerator};
use crate::results::IndexSpec;
use crate::runner::BenchmarkRunner;
use crate::sentinel;
use crate::workload::{generate_graph, graph_name, GraphModel, LabelDist, WorkloadPaths};

/// Shared collaborators and locations for one sweep run.
pub struct SweepEnv<'a> {
    pub engine: &'a dyn Engine,
    pub generator: &'a dyn QueryGenerator,
    pub workload: WorkloadPaths,
    pub results_dir: PathBuf,
    pub state_dir: PathBuf,
    /// Overrides for the difficulty-derived defaults.
    pub time_limit_secs: Option<u64>,
    pub memory_limit_mb: Option<u64>,
    /// Base seed for on-demand graph generation.
    pub seed: u64,
}

/// An algorithm treated as already failed beyond a label-count threshold,
/// before any of its cells run.
#[derive(Debug, Clone)]
pub struct PresumedFailure {
    pub index: String,
    pub beyond_labels: u32,
    pub code: f64,
}

/// ALC enumerates all label combinations, so anything past 2^16 of them is
/// already very likely to exceed the memory limit.
pub fn default_presumed_failures() -> Vec<PresumedFailure> {
    vec![PresumedFailure {
        index: "ALC".to_string(),
        beyond_labels: 16,
        code: sentinel::MEMORY_LIMIT,
    }]
}

/// Synthetic sweep configuration: the cartesian product of index
/// configurations and graph parameters.
pub struct SynthSweep {
    pub indexes: Vec<IndexSpec>,
    pub node_sizes: Vec<u64>,
    pub label_sizes: Vec<u32>,
    pub degrees: Vec<u32>,
    pub distributions: Vec<LabelDist>,
    pub models: Vec<GraphModel>,
    pub difficulty: f64,
    /// Assume difficulty is monotonic in (label count, degree) and skip
    /// cells dominated by a known failure. A heuristic, so it can be turned
    /// off.
    pub short_circuit: bool,
    pub presumed_failures: Vec<PresumedFailure>,
}

impl SynthSweep {
    pub fn new(indexes: Vec<IndexSpec>, node_sizes: Vec<u64>, label_sizes: Vec<u32>, degrees: Vec<u32>) -> Self {
        Self {
            indexes,
            node_sizes,
            label_sizes,
            degrees,
            distributions: vec![LabelDist::Exp],
            models: vec![GraphModel::Er],
            difficulty: 1.0,
            short_circuit: true,
            presumed_failures: default_presumed_failures(),
        }
    }
}

/// Real-graph sweep: a primary list always attempted and a secondary list
/// attempted only while the primary list stayed failure-free for the index.
pub struct RealSweep {
    pub indexes: Vec<IndexSpec>,
    pub graphs: Vec<String>,
    pub graphs_only_on_success: Vec<String>,
    pub difficulty: f64,
}

/// The (label count, degree) coordinates a configuration is known to fail
/// at, with the code to propagate to dominated cells.
#[derive(Debug, Clone, Copy)]
struct FailedAt {
    labels: u32,
    degree: u32,
    code: f64,
}

impl FailedAt {
    fn dominates(&self, labels: u32, degree: u32) -> bool {
        labels >= self.labels && degree >= self.degree
    }
}

// ---------------------------------------------------------------------------
// Cursors
// ---------------------------------------------------------------------------

/// Ranked position in a cartesian product; `dims` lists the loop lengths
/// outermost first.
fn unrank(mut pos: usize, dims: &[usize]) -> Vec<usize> {
    let mut out = vec![0; dims.len()];
    for (slot, dim) in out.iter_mut().zip(dims).rev() {
        *slot = pos % dim;
        pos /= dim;
    }
    out
}

fn rank(coords: &[usize], dims: &[usize]) -> usize {
    coords
        .iter()
        .zip(dims)
        .fold(0, |acc, (&c, &d)| acc * d + c)
}

const SYNTH_CURSOR_KEYS: [&str; 6] = [
    "index",
    "node_size",
    "label_size",
    "degree",
    "distribution",
    "model",
];
const REAL_CURSOR_KEYS: [&str; 2] = ["index", "graph"];

fn cursor_map(keys: &[&str], coords: &[usize]) -> BTreeMap<String, usize> {
    keys.iter()
        .map(|k| k.to_string())
        .zip(coords.iter().copied())
        .collect()
}

fn cursor_coords(keys: &[&str], map: &BTreeMap<String, usize>) -> Result<Vec<usize>> {
    keys.iter()
        .map(|k| {
            map.get(*k)
                .copied()
                .with_context(|| format!("checkpoint is missing cursor {k:?}"))
        })
        .collect()
}

/// Deterministic per-graph generation seed.
fn graph_seed(base: u64, name: &str) -> u64 {
    let mut h: u64 = 0xcbf2_9ce4_8422_2325;
    for b in name.bytes() {
        h ^= b as u64;
        h = h.wrapping_mul(0x0000_0100_0000_01b3);
    }
    h ^ base
}

// ---------------------------------------------------------------------------
// Synthetic sweep
// ---------------------------------------------------------------------------

pub fn run_synth(sweep: &SynthSweep, env: &SweepEnv<'_>) -> Result<()> {
    let index_names: Vec<String> = sweep.indexes.iter().map(|i| i.display_name()).collect();

    // Generate every graph in the product up front, then its query files.
    let mut graph_names = Vec::new();
    for &nodes in &sweep.node_sizes {
        for &labels in &sweep.label_sizes {
            for &degree in &sweep.degrees {
                for &dist in &sweep.distributions {
                    for &model in &sweep.models {
                        let name = graph_name(nodes, labels, degree, dist, model);
                        let file = env.workload.synthetic_graph_file(&name);
                        if !file.exists() {
                            println!("generating graph: {}", file.display());
                            generate_graph(
                                &file,
                                nodes,
                                degree,
                                labels,
                                dist,
                                model,
                                graph_seed(env.seed, &name),
                            )?;
                        }
                        graph_names.push(name);
                    }
                }
            }
        }
    }

    let graph_files: Vec<PathBuf> = graph_names
        .iter()
        .map(|n| env.workload.synthetic_graph_file(n))
        .collect();
    let modes = generate_and_enumerate_modes(env.generator, &graph_files)?;

    let mut runner = BenchmarkRunner::new(
        env.engine,
        &env.results_dir,
        &graph_names,
        &index_names,
        &modes,
    )?;
    let time_limit = env
        .time_limit_secs
        .unwrap_or((1.5 * sweep.difficulty * 60.0 * 60.0) as u64);
    runner.set_time_limit(time_limit);
    runner.set_memory_limit(env.memory_limit_mb.unwrap_or(70 * 1000));

    let checkpoint = CheckpointStore::open(&env.state_dir)?;

    let dims = [
        sweep.indexes.len(),
        sweep.node_sizes.len(),
        sweep.label_sizes.len(),
        sweep.degrees.len(),
        sweep.distributions.len(),
        sweep.models.len(),
    ];
    let total: usize = dims.iter().product();

    let mut pos = 0;
    if checkpoint.exists() {
        if runner.load()? {
            let coords = cursor_coords(&SYNTH_CURSOR_KEYS, &checkpoint.load()?)?;
            pos = rank(&coords, &dims);
        } else {
            // Shape mismatch: hard reset, restart from the beginning.
            checkpoint.clear()?;
        }
    }

    let mut failed: Option<FailedAt> = None;
    let mut current_index = usize::MAX;

    while pos < total {
        let coords = unrank(pos, &dims);
        let [i, j, k, m, n, o] = [coords[0], coords[1], coords[2], coords[3], coords[4], coords[5]];
        pos += 1;

        if i != current_index {
            current_index = i;
            failed = sweep
                .presumed_failures
                .iter()
                .find(|p| p.index == sweep.indexes[i].name)
                .map(|p| FailedAt {
                    labels: p.beyond_labels + 1,
                    degree: 1,
                    code: p.code,
                });
        }

        checkpoint.save(&cursor_map(&SYNTH_CURSOR_KEYS, &coords))?;

        let labels = sweep.label_sizes[k];
        let degree = sweep.degrees[m];
        let name = graph_name(
            sweep.node_sizes[j],
            labels,
            degree,
            sweep.distributions[n],
            sweep.models[o],
        );
        let graph_file = env.workload.synthetic_graph_file(&name);

        if sweep.short_circuit {
            if let Some(f) = failed {
                if f.dominates(labels, degree) {
                    // A smaller or equal configuration already failed; no
                    // point re-running a harder one.
                    runner.record_failed(&sweep.indexes[i], &graph_file, &name, f.code)?;
                    continue;
                }
            }
        }

        let outcome = runner.run_and_collect(&sweep.indexes[i], &graph_file, &name)?;
        if !outcome.success && sweep.short_circuit {
            failed = Some(FailedAt {
                labels,
                degree,
                code: outcome.code,
            });
        }
    }

    if checkpoint.exists() {
        checkpoint.clear()?;
    }
    println!("sweep finished: {total} cells");
    Ok(())
}

// ---------------------------------------------------------------------------
// Real-graph sweep
// ---------------------------------------------------------------------------

pub fn run_real(sweep: &RealSweep, env: &SweepEnv<'_>) -> Result<()> {
    let index_names: Vec<String> = sweep.indexes.iter().map(|i| i.display_name()).collect();

    let all_graphs: Vec<String> = sweep
        .graphs
        .iter()
        .chain(&sweep.graphs_only_on_success)
        .cloned()
        .collect();
    let graph_files: Vec<PathBuf> = all_graphs
        .iter()
        .map(|g| env.workload.real_graph_file(g))
        .collect();
    let modes = generate_and_enumerate_modes(env.generator, &graph_files)?;

    let mut runner = BenchmarkRunner::new(
        env.engine,
        &env.results_dir,
        &all_graphs,
        &index_names,
        &modes,
    )?;
    let time_limit = env
        .time_limit_secs
        .unwrap_or((3.0 * sweep.difficulty * 60.0 * 60.0) as u64);
    runner.set_time_limit(time_limit);
    runner.set_memory_limit(env.memory_limit_mb.unwrap_or(70 * 1000));

    let checkpoint = CheckpointStore::open(&env.state_dir)?;

    let dims = [sweep.indexes.len(), all_graphs.len()];
    let total: usize = dims.iter().product();

    let mut pos = 0;
    if checkpoint.exists() {
        if runner.load()? {
            let coords = cursor_coords(&REAL_CURSOR_KEYS, &checkpoint.load()?)?;
            pos = rank(&coords, &dims);
        } else {
            checkpoint.clear()?;
        }
    }

    let primary = sweep.graphs.len();
    let mut last_failure: Option<f64> = None;
    let mut current_index = usize::MAX;

    while pos < total {
        let coords = unrank(pos, &dims);
        let (i, j) = (coords[0], coords[1]);
        pos += 1;

        if i != current_index {
            current_index = i;
            last_failure = None;
        }

        checkpoint.save(&cursor_map(&REAL_CURSOR_KEYS, &coords))?;

        let graph = &all_graphs[j];
        let graph_file = env.workload.real_graph_file(graph);

        if j < primary {
            let outcome = runner.run_and_collect(&sweep.indexes[i], &graph_file, graph)?;
            if !outcome.success {
                last_failure = Some(outcome.code);
            }
        } else if let Some(code) = last_failure {
            // The secondary list is strictly harder than the primary one.
            runner.record_failed(&sweep.indexes[i], &graph_file, graph, code)?;
        } else {
            runner.run_and_collect(&sweep.indexes[i], &graph_file, graph)?;
        }
    }

    if checkpoint.exists() {
        checkpoint.clear()?;
    }
    println!("sweep finished: {total} cells");
    Ok(())
}
