//! JSON consolidation plans.
//!
//! A plan names a base results directory and an ordered list of algebra steps
//! to apply to it. The consolidated set is either saved to a directory or
//! printed unit-formatted.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use colored::Colorize;
use serde::{Deserialize, Serialize};

use lcr_bench_core::consolidate::{JoinMode, RenderedSet};
use lcr_bench_core::results::{validate_results_dir, ResultSet};
use lcr_bench_core::workload::WorkloadPaths;

fn default_join_mode() -> JoinMode {
    JoinMode::Replace
}

fn default_workload_dir() -> PathBuf {
    PathBuf::from("./workload")
}

/// One consolidation step, tagged by operation name.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum PlanStep {
    JoinLeft {
        dir: PathBuf,
        #[serde(default = "default_join_mode")]
        mode: JoinMode,
    },
    Append {
        dir: PathBuf,
    },
    Merge {
        dir: PathBuf,
    },
    MergeOnType,
    MergeOnResult,
    MergeOnSmallMedLarge,
    AverageTimings,
    Reorder {
        indexes: Vec<String>,
    },
    ReorderGraphs {
        graphs: Vec<String>,
    },
    RenameGraph {
        from: String,
        to: String,
    },
    RenameIndex {
        from: String,
        to: String,
    },
    RenameRealGraphs,
    DropGraph {
        name: String,
    },
    DropIndex {
        name: String,
    },
    ReplaceErrorsWithNan,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ConsolidatePlan {
    /// The results directory the steps start from.
    pub base: PathBuf,
    #[serde(default)]
    pub steps: Vec<PlanStep>,
    /// Save the consolidated set here; print it when absent.
    pub out: Option<PathBuf>,
    /// Bold the best value per row when printing.
    #[serde(default)]
    pub highlight_best: bool,
    /// Where the query files live, for `averageTimings`.
    #[serde(default = "default_workload_dir")]
    pub workload_dir: PathBuf,
}

impl ConsolidatePlan {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read plan {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("failed to parse plan {}", path.display()))
    }
}

fn load_set(dir: &Path) -> Result<ResultSet> {
    validate_results_dir(dir)?;
    ResultSet::load(dir)
}

/// Apply every step of `plan` to its base set and return the result.
pub fn run(plan: &ConsolidatePlan) -> Result<ResultSet> {
    let mut set = load_set(&plan.base)?;
    let workload = WorkloadPaths::new(&plan.workload_dir);

    for step in &plan.steps {
        match step {
            PlanStep::JoinLeft { dir, mode } => set.join_left(&load_set(dir)?, *mode)?,
            PlanStep::Append { dir } => set.append(&load_set(dir)?)?,
            PlanStep::Merge { dir } => set.merge(&load_set(dir)?),
            PlanStep::MergeOnType => set.merge_queries_on_type()?,
            PlanStep::MergeOnResult => set.merge_queries_on_result()?,
            PlanStep::MergeOnSmallMedLarge => set.merge_queries_on_small_med_large()?,
            PlanStep::AverageTimings => set.avg_queries(&workload)?,
            PlanStep::Reorder { indexes } => set.reorder(indexes)?,
            PlanStep::ReorderGraphs { graphs } => set.reorder_graphs(graphs),
            PlanStep::RenameGraph { from, to } => set.rename_graph(from, to)?,
            PlanStep::RenameIndex { from, to } => set.rename_index(from, to)?,
            PlanStep::RenameRealGraphs => set.rename_real_graphs()?,
            PlanStep::DropGraph { name } => set.drop_graph(name),
            PlanStep::DropIndex { name } => set.drop_index(name),
            PlanStep::ReplaceErrorsWithNan => set.replace_errors_with_nan(),
        }
    }
    Ok(set)
}

/// Save or print the consolidated set per the plan's output mode.
pub fn finish(plan: &ConsolidatePlan, set: &ResultSet) -> Result<()> {
    match &plan.out {
        Some(dir) => {
            set.save(dir)?;
            eprintln!(
                "{} {}",
                "wrote".green().bold(),
                dir.display().to_string().bold()
            );
        }
        None => print_rendered(&set.to_units(plan.highlight_best)),
    }
    Ok(())
}

pub fn print_rendered(rendered: &RenderedSet) {
    println!("{}", "index size".green().bold());
    print!("{}", rendered.sizes.to_csv());
    println!();
    println!("{}", "index train memory".green().bold());
    print!("{}", rendered.memory.to_csv());
    println!();
    println!("{}", "index creation time".green().bold());
    print!("{}", rendered.creation.to_csv());
    for (shape, table) in &rendered.queries {
        println!();
        println!("{} {}", "query time".green().bold(), shape.to_string().bold());
        print!("{}", table.to_csv());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lcr_bench_core::sentinel;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn save_set(dir: &Path, graphs: &[&str], indexes: &[&str]) -> ResultSet {
        let set = ResultSet::fresh(
            &names(graphs),
            &names(indexes),
            &names(&["cnn.L8.true"]),
        )
        .unwrap();
        set.save(dir).unwrap();
        set
    }

    #[test]
    fn plan_steps_deserialize_by_op_tag() {
        let plan: ConsolidatePlan = serde_json::from_str(
            r#"{
                "base": "./a",
                "steps": [
                    {"op": "joinLeft", "dir": "./b", "mode": "replace-when-invalid"},
                    {"op": "mergeOnType"},
                    {"op": "dropIndex", "name": "BFS"},
                    {"op": "renameRealGraphs"}
                ],
                "out": "./merged"
            }"#,
        )
        .unwrap();
        assert_eq!(plan.steps.len(), 4);
        assert!(matches!(
            plan.steps[0],
            PlanStep::JoinLeft {
                mode: JoinMode::ReplaceWhenInvalid,
                ..
            }
        ));
    }

    #[test]
    fn plan_runs_against_saved_directories() {
        let tmp = tempfile::tempdir().unwrap();
        let base_dir = tmp.path().join("base");
        let other_dir = tmp.path().join("other");

        let mut base = save_set(&base_dir, &["g1"], &["A"]);
        base.sizes.set("g1", "A", sentinel::TIME_LIMIT).unwrap();
        base.save(&base_dir).unwrap();

        let mut other = save_set(&other_dir, &["g1"], &["A"]);
        other.sizes.set("g1", "A", 42.0).unwrap();
        other.save(&other_dir).unwrap();

        let plan = ConsolidatePlan {
            base: base_dir,
            steps: vec![PlanStep::JoinLeft {
                dir: other_dir,
                mode: JoinMode::ReplaceWhenInvalid,
            }],
            out: None,
            highlight_best: false,
            workload_dir: default_workload_dir(),
        };

        let set = run(&plan).unwrap();
        assert_eq!(set.sizes.get("g1", "A"), Some(42.0));
    }

    #[test]
    fn plan_rejects_a_missing_base_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let plan = ConsolidatePlan {
            base: tmp.path().join("nope"),
            steps: vec![],
            out: None,
            highlight_best: false,
            workload_dir: default_workload_dir(),
        };
        assert!(run(&plan).is_err());
    }
}
