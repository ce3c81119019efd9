//! The in-memory Result Table Set for one benchmark-results directory.
//!
//! Owns three scalar tables (index size, training memory, creation time) plus
//! one query-timing table per discovered query shape. Everything loads from
//! and saves to flat CSV files; the directory itself is the unit of
//! durability (the runner rewrites it after every cell).

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::sentinel;
use crate::table::Table;

/// An algorithm name plus its ordered string parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSpec {
    pub name: String,
    #[serde(default)]
    pub params: Vec<String>,
}

impl IndexSpec {
    pub fn new(name: &str, params: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            params: params.iter().map(|p| p.to_string()).collect(),
        }
    }

    /// Canonical column name: `name(p1, p2)`, bare `name` without params.
    pub fn display_name(&self) -> String {
        if self.params.is_empty() {
            self.name.clone()
        } else {
            format!("{}({})", self.name, self.params.join(", "))
        }
    }
}

/// Whether a query-timing series holds queries with a true result, a false
/// result, or both merged together.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultClass {
    True,
    False,
    /// Merged or unseparated series.
    None,
}

/// How the query endpoints were drawn by the generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Traversal {
    Random,
    Connected,
    /// Merged or unseparated series.
    Both,
}

/// The label bound of a query series: a concrete label count while raw, or a
/// small/medium/large bucket after consolidation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LabelBound {
    Count(u32),
    Small,
    Medium,
    Large,
}

/// The identity of one query-timing table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryShape {
    pub label: LabelBound,
    pub result: ResultClass,
    pub traversal: Traversal,
}

impl QueryShape {
    /// Parse the dot-separated shape segments of a query-file or table name,
    /// e.g. `cnn.L8.true`. Missing traversal/result segments mean the merged
    /// form.
    pub fn parse(mode: &str) -> Result<Self> {
        let mut label = None;
        let mut result = ResultClass::None;
        let mut traversal = Traversal::Both;

        for segment in mode.split('.') {
            match segment {
                "rnd" => traversal = Traversal::Random,
                "cnn" => traversal = Traversal::Connected,
                "true" => result = ResultClass::True,
                "false" => result = ResultClass::False,
                "small" => label = Some(LabelBound::Small),
                "medium" => label = Some(LabelBound::Medium),
                "large" => label = Some(LabelBound::Large),
                other => {
                    if let Some(count) = other.strip_prefix('L') {
                        if let Ok(count) = count.parse::<u32>() {
                            label = Some(LabelBound::Count(count));
                        }
                    }
                }
            }
        }

        let label = label.with_context(|| format!("query shape {mode:?} has no label bound"))?;
        Ok(Self {
            label,
            result,
            traversal,
        })
    }

    /// Canonical segment encoding, the inverse of [`QueryShape::parse`].
    /// Segment order is traversal, label, result; merged coordinates are
    /// omitted.
    pub fn mode(&self) -> String {
        let mut out = String::new();
        match self.traversal {
            Traversal::Random => out.push_str("rnd."),
            Traversal::Connected => out.push_str("cnn."),
            Traversal::Both => {}
        }
        match self.label {
            LabelBound::Count(n) => {
                out.push('L');
                out.push_str(&n.to_string());
            }
            LabelBound::Small => out.push_str("small"),
            LabelBound::Medium => out.push_str("medium"),
            LabelBound::Large => out.push_str("large"),
        }
        match self.result {
            ResultClass::True => out.push_str(".true"),
            ResultClass::False => out.push_str(".false"),
            ResultClass::None => {}
        }
        out
    }
}

impl fmt::Display for QueryShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.mode())
    }
}

/// One query-timing table plus its shape and averaging state.
#[derive(Debug, Clone)]
pub struct QueryTable {
    pub shape: QueryShape,
    pub table: Table,
    /// True once every timed row has been divided by its sample count.
    pub averaged: bool,
    /// Per-graph sample counts, populated by averaging.
    pub counts: HashMap<String, u64>,
}

impl QueryTable {
    pub fn new(shape: QueryShape, table: Table) -> Self {
        Self {
            shape,
            table,
            averaged: false,
            counts: HashMap::new(),
        }
    }

    pub fn file_name(&self) -> String {
        format!("queryTime.{}.csv", self.shape.mode())
    }
}

/// All measurement tables for one benchmark-results directory.
#[derive(Debug, Clone)]
pub struct ResultSet {
    pub graphs: Vec<String>,
    pub indexes: Vec<String>,
    pub sizes: Table,
    pub memory: Table,
    pub creation: Table,
    pub queries: Vec<QueryTable>,
}

const SIZES_FILE: &str = "indexSize.csv";
const MEMORY_FILE: &str = "indexTrainMemory.csv";
const CREATION_FILE: &str = "indexCreationTime.csv";

impl ResultSet {
    /// A fresh set with every cell marked not-run, one query table per shape
    /// mode string.
    pub fn fresh(graphs: &[String], indexes: &[String], modes: &[String]) -> Result<Self> {
        let not_run = Table::filled(graphs, indexes, sentinel::NOT_RUN);
        let queries = modes
            .iter()
            .map(|mode| Ok(QueryTable::new(QueryShape::parse(mode)?, not_run.clone())))
            .collect::<Result<_>>()?;

        Ok(Self {
            graphs: graphs.to_vec(),
            indexes: indexes.to_vec(),
            sizes: not_run.clone(),
            memory: not_run.clone(),
            creation: not_run,
            queries,
        })
    }

    /// Load a benchmark-results directory. Query tables are discovered by
    /// the `queryTime.` file-name prefix and loaded in sorted name order.
    pub fn load(dir: &Path) -> Result<Self> {
        let sizes = Table::load(&dir.join(SIZES_FILE))?;
        let memory = Table::load(&dir.join(MEMORY_FILE))?;
        let creation = Table::load(&dir.join(CREATION_FILE))?;

        let mut query_files: Vec<String> = fs::read_dir(dir)
            .with_context(|| format!("failed to read results dir {}", dir.display()))?
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| entry.file_name().into_string().ok())
            .filter(|name| name.starts_with("queryTime.") && name.ends_with(".csv"))
            .collect();
        query_files.sort();

        let mut queries = Vec::with_capacity(query_files.len());
        for name in query_files {
            let mode = name
                .trim_start_matches("queryTime.")
                .trim_end_matches(".csv");
            let shape = QueryShape::parse(mode)?;
            let table = Table::load(&dir.join(&name))?;
            queries.push(QueryTable::new(shape, table));
        }

        Ok(Self {
            graphs: sizes.graphs().to_vec(),
            indexes: sizes.indexes().to_vec(),
            sizes,
            memory,
            creation,
            queries,
        })
    }

    /// Write every table to `dir`, creating it if needed.
    pub fn save(&self, dir: &Path) -> Result<()> {
        fs::create_dir_all(dir)
            .with_context(|| format!("failed to create results dir {}", dir.display()))?;
        self.sizes.save(&dir.join(SIZES_FILE))?;
        self.memory.save(&dir.join(MEMORY_FILE))?;
        self.creation.save(&dir.join(CREATION_FILE))?;
        for query in &self.queries {
            query.table.save(&dir.join(query.file_name()))?;
        }
        Ok(())
    }

    /// True when the on-disk row/column identities exactly match the sweep's
    /// configured graphs and indexes (in any order).
    pub fn matches_identities(&self, graphs: &[String], indexes: &[String]) -> bool {
        self.sizes.indexes().len() == indexes.len()
            && self.sizes.graphs().len() == graphs.len()
            && self.sizes.indexes().iter().all(|i| indexes.contains(i))
            && self.sizes.graphs().iter().all(|g| graphs.contains(g))
    }

    pub fn query_table(&self, shape: &QueryShape) -> Option<&QueryTable> {
        self.queries.iter().find(|q| q.shape == *shape)
    }

    pub fn query_table_mut(&mut self, shape: &QueryShape) -> Option<&mut QueryTable> {
        self.queries.iter_mut().find(|q| q.shape == *shape)
    }

    /// The three scalar tables, for operations applied uniformly to each.
    pub fn scalar_tables_mut(&mut self) -> [&mut Table; 3] {
        [&mut self.sizes, &mut self.memory, &mut self.creation]
    }
}

pub fn validate_results_dir(dir: &Path) -> Result<()> {
    for file in [SIZES_FILE, MEMORY_FILE, CREATION_FILE] {
        if !dir.join(file).exists() {
            bail!("invalid results directory {}: missing {file}", dir.display());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_display_name_elides_empty_params() {
        assert_eq!(IndexSpec::new("BFS", &[]).display_name(), "BFS");
        assert_eq!(IndexSpec::new("KLC", &["PLL"]).display_name(), "KLC(PLL)");
        assert_eq!(
            IndexSpec::new("LWBF", &["custom", "custom", "32"]).display_name(),
            "LWBF(custom, custom, 32)"
        );
    }

    #[test]
    fn shape_mode_round_trips() {
        for mode in ["cnn.L8.true", "rnd.L64.false", "L16.true", "L8", "small"] {
            let shape = QueryShape::parse(mode).unwrap();
            assert_eq!(shape.mode(), mode, "mode {mode:?} should round-trip");
        }
    }

    #[test]
    fn shape_defaults_are_the_merged_forms() {
        let shape = QueryShape::parse("L8").unwrap();
        assert_eq!(shape.result, ResultClass::None);
        assert_eq!(shape.traversal, Traversal::Both);
        assert_eq!(shape.label, LabelBound::Count(8));
    }

    #[test]
    fn shape_without_label_is_rejected() {
        assert!(QueryShape::parse("rnd.true").is_err());
    }

    #[test]
    fn fresh_set_is_all_not_run() {
        let graphs = vec!["g1".to_string(), "g2".to_string()];
        let indexes = vec!["A".to_string()];
        let modes = vec!["cnn.L8.true".to_string()];
        let set = ResultSet::fresh(&graphs, &indexes, &modes).unwrap();
        assert_eq!(set.sizes.get("g1", "A"), Some(crate::sentinel::NOT_RUN));
        assert_eq!(set.queries.len(), 1);
        assert_eq!(
            set.queries[0].table.get("g2", "A"),
            Some(crate::sentinel::NOT_RUN)
        );
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let graphs = vec!["g1".to_string()];
        let indexes = vec!["A".to_string(), "B".to_string()];
        let modes = vec!["cnn.L8.true".to_string(), "rnd.L8.false".to_string()];
        let mut set = ResultSet::fresh(&graphs, &indexes, &modes).unwrap();
        set.sizes.set("g1", "A", 12.5).unwrap();
        set.queries[0].table.set("g1", "B", 0.25).unwrap();
        set.save(dir.path()).unwrap();

        let back = ResultSet::load(dir.path()).unwrap();
        assert_eq!(back.graphs, graphs);
        assert_eq!(back.indexes, indexes);
        assert_eq!(back.sizes.get("g1", "A"), Some(12.5));
        assert_eq!(back.queries.len(), 2);
        let shape = QueryShape::parse("cnn.L8.true").unwrap();
        assert_eq!(back.query_table(&shape).unwrap().table.get("g1", "B"), Some(0.25));
    }
}
