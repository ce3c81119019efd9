//! End-to-end sweep tests against scripted engine and generator doubles.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::Result;

use lcr_bench_core::engine::{CellSpec, Engine, EngineOutput, QueryGenerator};
use lcr_bench_core::results::IndexSpec;
use lcr_bench_core::sentinel;
use lcr_bench_core::sweep::{run_real, run_synth, PresumedFailure, RealSweep, SweepEnv, SynthSweep};
use lcr_bench_core::workload::{GraphModel, LabelDist, WorkloadPaths};
use lcr_bench_core::ResultSet;

/// Graph identifier from either file layout: `generated/<name>.nt` or
/// `<name>/graph.nt`.
fn graph_of(path: &Path) -> String {
    let stem = path.file_stem().unwrap().to_str().unwrap();
    if stem == "graph" {
        path.parent()
            .unwrap()
            .file_name()
            .unwrap()
            .to_str()
            .unwrap()
            .to_string()
    } else {
        stem.to_string()
    }
}

fn ok_stdout(query_files: &[PathBuf]) -> String {
    let mut out = String::from(
        "Training timings:\nTook: 2 s\nMemory: 1 GB\nIndexes used:\nsize: 100 MB\n",
    );
    for query_file in query_files {
        out.push_str(&format!(
            "Query timings: {}\ntook: 500 ms\nmin: 1 µs\n\n",
            query_file.display()
        ));
    }
    out
}

/// Engine double keyed by (index name, graph name); unknown cells succeed
/// with a fixed report, scripted cells fail with the given stderr.
struct ScriptedEngine {
    failures: HashMap<(String, String), String>,
    /// One-shot unclassifiable failure, simulating a crash mid-sweep.
    fatal_once: Mutex<Option<(String, String)>>,
    log: Mutex<Vec<(String, String)>>,
}

impl ScriptedEngine {
    fn new(failures: HashMap<(String, String), String>) -> Self {
        Self {
            failures,
            fatal_once: Mutex::new(None),
            log: Mutex::new(Vec::new()),
        }
    }

    fn invocations(&self) -> Vec<(String, String)> {
        self.log.lock().unwrap().clone()
    }

    fn ran(&self, index: &str, graph: &str) -> bool {
        self.invocations()
            .iter()
            .any(|(i, g)| i == index && g == graph)
    }
}

impl Engine for ScriptedEngine {
    fn run_cell(&self, spec: &CellSpec<'_>) -> Result<EngineOutput> {
        let key = (spec.index.name.clone(), graph_of(spec.graph_file));
        self.log.lock().unwrap().push(key.clone());

        let mut fatal = self.fatal_once.lock().unwrap();
        if fatal.as_ref() == Some(&key) {
            fatal.take();
            return Ok(EngineOutput {
                success: false,
                exit_code: Some(139),
                stdout: String::new(),
                stderr: "segmentation fault".to_string(),
            });
        }
        drop(fatal);

        if let Some(stderr) = self.failures.get(&key) {
            return Ok(EngineOutput {
                success: false,
                exit_code: Some(1),
                stdout: String::new(),
                stderr: stderr.clone(),
            });
        }

        Ok(EngineOutput {
            success: true,
            exit_code: Some(0),
            stdout: ok_stdout(spec.query_files),
            stderr: String::new(),
        })
    }
}

/// Generator double that writes a fixed set of query files per graph.
struct ScriptedGenerator {
    modes: Vec<String>,
}

impl QueryGenerator for ScriptedGenerator {
    fn generate(&self, graph_file: &Path) -> Result<()> {
        for mode in &self.modes {
            fs::write(
                WorkloadPaths::query_file(graph_file, mode),
                "0 5 1\n0 3 2\n",
            )?;
        }
        Ok(())
    }
}

fn write_real_graph(root: &Path, name: &str) {
    let dir = root.join(name);
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("graph.nt"), "3,2,2\n0 1 1 .\n1 0 2 .\n").unwrap();
}

fn env<'a>(
    engine: &'a ScriptedEngine,
    generator: &'a ScriptedGenerator,
    root: &Path,
) -> SweepEnv<'a> {
    SweepEnv {
        engine,
        generator,
        workload: WorkloadPaths::new(root.join("workload")),
        results_dir: root.join("results"),
        state_dir: root.join("state"),
        time_limit_secs: None,
        memory_limit_mb: None,
        seed: 7,
    }
}

fn indexes(names: &[&str]) -> Vec<IndexSpec> {
    names.iter().map(|n| IndexSpec::new(n, &[])).collect()
}

#[test]
fn real_sweep_short_circuits_only_the_secondary_list() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path();
    for graph in ["g1", "g2", "g3"] {
        write_real_graph(&root.join("workload"), graph);
    }

    let mut failures = HashMap::new();
    failures.insert(
        ("A".to_string(), "g1".to_string()),
        "exceeded memory limit".to_string(),
    );
    let engine = ScriptedEngine::new(failures);
    let generator = ScriptedGenerator {
        modes: vec!["cnn.L2.true".to_string()],
    };
    let env = env(&engine, &generator, root);

    let sweep = RealSweep {
        indexes: indexes(&["A", "B"]),
        graphs: vec!["g1".to_string(), "g2".to_string()],
        graphs_only_on_success: vec!["g3".to_string()],
        difficulty: 1.0,
    };
    run_real(&sweep, &env).unwrap();

    // primary list still ran to completion for A, secondary was skipped
    assert!(engine.ran("A", "g1"));
    assert!(engine.ran("A", "g2"));
    assert!(!engine.ran("A", "g3"));
    // B was unaffected by A's failure
    for graph in ["g1", "g2", "g3"] {
        assert!(engine.ran("B", graph));
    }

    let set = ResultSet::load(&env.results_dir).unwrap();
    assert_eq!(set.sizes.get("g1", "A"), Some(sentinel::MEMORY_LIMIT));
    assert_eq!(set.sizes.get("g3", "A"), Some(sentinel::MEMORY_LIMIT));
    assert_eq!(set.sizes.get("g2", "A"), Some(100.0));
    assert_eq!(set.sizes.get("g3", "B"), Some(100.0));
    assert_eq!(set.creation.get("g2", "B"), Some(2000.0));
    assert_eq!(set.queries[0].table.get("g2", "B"), Some(500.0));

    // normal completion clears the checkpoint
    assert!(!env.state_dir.join("last.tsv").exists());
}

#[test]
fn interrupted_sweep_resumes_to_the_same_result_set() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path();
    for graph in ["g1", "g2"] {
        write_real_graph(&root.join("workload"), graph);
    }

    let generator = ScriptedGenerator {
        modes: vec!["cnn.L2.true".to_string()],
    };
    let sweep = RealSweep {
        indexes: indexes(&["A", "B"]),
        graphs: vec!["g1".to_string(), "g2".to_string()],
        graphs_only_on_success: vec![],
        difficulty: 1.0,
    };

    // interrupted run: an unclassifiable failure at (B, g1) halts the sweep
    let engine = ScriptedEngine::new(HashMap::new());
    *engine.fatal_once.lock().unwrap() = Some(("B".to_string(), "g1".to_string()));
    let env_a = env(&engine, &generator, root);
    assert!(run_real(&sweep, &env_a).is_err());
    // the checkpoint survives the halt
    assert!(env_a.state_dir.join("last.tsv").exists());

    // resume re-executes the in-flight cell and finishes
    run_real(&sweep, &env_a).unwrap();
    assert!(!env_a.state_dir.join("last.tsv").exists());

    // uninterrupted reference run in a separate directory
    let engine_b = ScriptedEngine::new(HashMap::new());
    let mut env_b = env(&engine_b, &generator, root);
    env_b.results_dir = root.join("results-b");
    env_b.state_dir = root.join("state-b");
    run_real(&sweep, &env_b).unwrap();

    let resumed = ResultSet::load(&env_a.results_dir).unwrap();
    let reference = ResultSet::load(&env_b.results_dir).unwrap();
    assert_eq!(resumed.sizes, reference.sizes);
    assert_eq!(resumed.memory, reference.memory);
    assert_eq!(resumed.creation, reference.creation);
    assert_eq!(resumed.queries.len(), reference.queries.len());
    for (a, b) in resumed.queries.iter().zip(&reference.queries) {
        assert_eq!(a.table, b.table);
    }

    // the resumed run skipped cells recorded before the interruption
    let runs = engine.invocations();
    let a_g1_runs = runs.iter().filter(|(i, g)| i == "A" && g == "g1").count();
    assert_eq!(a_g1_runs, 1);
    let b_g1_runs = runs.iter().filter(|(i, g)| i == "B" && g == "g1").count();
    assert_eq!(b_g1_runs, 2); // the crashed attempt plus the replay
}

#[test]
fn synth_sweep_skips_dominated_cells_after_a_failure() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path();

    // fail at the (L2, D5) cell with a time-limit marker
    let fail_graph = lcr_bench_core::workload::graph_name(1000, 2, 5, LabelDist::Exp, GraphModel::Er);
    let mut failures = HashMap::new();
    failures.insert(
        ("K".to_string(), fail_graph.clone()),
        "time limit reached".to_string(),
    );
    let engine = ScriptedEngine::new(failures);
    let generator = ScriptedGenerator {
        modes: vec!["cnn.L2.true".to_string()],
    };
    let env = env(&engine, &generator, root);

    let mut sweep = SynthSweep::new(indexes(&["K"]), vec![1000], vec![2, 4], vec![3, 5]);
    sweep.presumed_failures = Vec::new();
    run_synth(&sweep, &env).unwrap();

    let skipped = lcr_bench_core::workload::graph_name(1000, 4, 5, LabelDist::Exp, GraphModel::Er);
    let survivor = lcr_bench_core::workload::graph_name(1000, 4, 3, LabelDist::Exp, GraphModel::Er);

    // (L4, D5) dominates the failure and was never invoked
    assert!(!engine.ran("K", &skipped));
    // (L4, D3) has a smaller degree and still ran
    assert!(engine.ran("K", &survivor));

    let set = ResultSet::load(&env.results_dir).unwrap();
    assert_eq!(set.sizes.get(&fail_graph, "K"), Some(sentinel::TIME_LIMIT));
    assert_eq!(set.sizes.get(&skipped, "K"), Some(sentinel::TIME_LIMIT));
    assert_eq!(set.sizes.get(&survivor, "K"), Some(100.0));
}

#[test]
fn presumed_failures_apply_before_any_cell_runs() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path();

    let engine = ScriptedEngine::new(HashMap::new());
    let generator = ScriptedGenerator {
        modes: vec!["cnn.L2.true".to_string()],
    };
    let env = env(&engine, &generator, root);

    let mut sweep = SynthSweep::new(indexes(&["ALC"]), vec![1000], vec![8, 20], vec![3]);
    sweep.presumed_failures = vec![PresumedFailure {
        index: "ALC".to_string(),
        beyond_labels: 16,
        code: sentinel::MEMORY_LIMIT,
    }];
    run_synth(&sweep, &env).unwrap();

    let below = lcr_bench_core::workload::graph_name(1000, 8, 3, LabelDist::Exp, GraphModel::Er);
    let beyond = lcr_bench_core::workload::graph_name(1000, 20, 3, LabelDist::Exp, GraphModel::Er);

    assert!(engine.ran("ALC", &below));
    assert!(!engine.ran("ALC", &beyond));

    let set = ResultSet::load(&env.results_dir).unwrap();
    assert_eq!(set.sizes.get(&below, "ALC"), Some(100.0));
    assert_eq!(set.sizes.get(&beyond, "ALC"), Some(sentinel::MEMORY_LIMIT));
}
