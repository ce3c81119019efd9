//! Consolidation algebra: combining partial result sets from different
//! machines, retried sub-ranges, and fixed-up reruns into one comparison set.
//!
//! Every operation mutates the set in place; callers clone first when the
//! original must survive. Sentinel codes participate in the arithmetic merges
//! and are decoded back to single codes afterwards, so "both sides hit the
//! memory limit" never turns into a larger error code or a spurious timing.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use crate::results::{LabelBound, QueryShape, QueryTable, ResultClass, ResultSet, Traversal};
use crate::sentinel;
use crate::table::Table;
use crate::units;
use crate::workload::WorkloadPaths;

/// Cell overwrite policy for [`ResultSet::join_left`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JoinMode {
    /// Overwrite unconditionally.
    Replace,
    /// Overwrite only cells currently holding a sentinel.
    ReplaceWhenInvalid,
}

fn join_part(
    left: &mut Table,
    right: &Table,
    graphs: &[String],
    indexes: &[String],
    mode: JoinMode,
) -> Result<()> {
    for graph in graphs {
        for index in indexes {
            if !left.has_graph(graph) || !left.has_index(index) {
                continue;
            }
            let Some(value) = right.get(graph, index) else {
                continue;
            };
            match mode {
                JoinMode::Replace => left.set(graph, index, value)?,
                JoinMode::ReplaceWhenInvalid => {
                    if left.get(graph, index).is_some_and(sentinel::is_error) {
                        left.set(graph, index, value)?;
                    }
                }
            }
        }
    }
    Ok(())
}

/// Cell-wise sum of two query tables with the sentinel decode pass. Averaged
/// tables are de-averaged first so the sum weights each side by its sample
/// count, then re-averaged by the combined count.
fn merge_pair(query: &mut QueryTable, other: &QueryTable) -> Result<()> {
    if !query.averaged {
        query.table.add_aligned(&other.table);
        query.table.map(sentinel::decode_sum);
        return Ok(());
    }

    let mut other_table = other.table.clone();
    let graphs: Vec<String> = query.table.graphs().to_vec();
    for graph in &graphs {
        let self_count = query.counts.get(graph).copied();
        let other_count = other.counts.get(graph).copied();

        match (self_count, other_count) {
            (Some(a), Some(b)) => {
                let (a_f, b_f) = (a as f64, b as f64);
                query
                    .table
                    .map_row(graph, |v| if v > 0.0 { v * a_f } else { v })?;
                if other_table.has_graph(graph) {
                    other_table.map_row(graph, |v| if v > 0.0 { v * b_f } else { v })?;
                }
                query.counts.insert(graph.clone(), a + b);
            }
            (Some(a), None) => {
                let a_f = a as f64;
                query
                    .table
                    .map_row(graph, |v| if v > 0.0 { v * a_f } else { v })?;
                // The other side carries no samples for this graph; its row
                // must not perturb the sum.
                if other_table.has_graph(graph) {
                    other_table.fill_row(graph, 0.0)?;
                } else {
                    other_table.push_graph(graph, 0.0);
                }
            }
            (None, Some(b)) => {
                let b_f = b as f64;
                if other_table.has_graph(graph) {
                    other_table.map_row(graph, |v| if v > 0.0 { v * b_f } else { v })?;
                }
                query.table.fill_row(graph, 0.0)?;
                query.counts.insert(graph.clone(), b);
            }
            (None, None) => {}
        }
    }

    query.table.add_aligned(&other_table);
    query.table.map(sentinel::decode_sum);

    for (graph, count) in query.counts.clone() {
        let c = count as f64;
        if query.table.has_graph(&graph) {
            query
                .table
                .map_row(&graph, |v| if v > 0.0 { v / c } else { v })?;
        }
    }
    Ok(())
}

/// Pair up query tables by `is_pair`, merge each pair, retag survivors via
/// `retag`, and keep only the retagged series. Unpaired tables are retagged
/// as already-degenerate; consumed partners are dropped.
fn consolidate_queries(
    queries: Vec<QueryTable>,
    is_pair: impl Fn(&QueryShape, &QueryShape) -> bool,
    retag: impl Fn(&mut QueryShape),
) -> Result<Vec<QueryTable>> {
    let mut used = vec![false; queries.len()];
    let mut out = Vec::with_capacity(queries.len());

    for i in 0..queries.len() {
        if used[i] {
            continue;
        }
        used[i] = true;

        let partner = (i + 1..queries.len())
            .find(|&j| !used[j] && is_pair(&queries[i].shape, &queries[j].shape));

        let mut merged = queries[i].clone();
        if let Some(j) = partner {
            used[j] = true;
            merge_pair(&mut merged, &queries[j])?;
        }
        retag(&mut merged.shape);
        out.push(merged);
    }
    Ok(out)
}

impl ResultSet {
    /// Overwrite cells of `self` from `other` over the intersection of their
    /// graph and index identities. Query tables pair on exact shape.
    pub fn join_left(&mut self, other: &ResultSet, mode: JoinMode) -> Result<()> {
        let graphs: Vec<String> = self
            .graphs
            .iter()
            .filter(|g| other.graphs.contains(g))
            .cloned()
            .collect();
        let indexes: Vec<String> = self
            .indexes
            .iter()
            .filter(|i| other.indexes.contains(i))
            .cloned()
            .collect();

        join_part(&mut self.sizes, &other.sizes, &graphs, &indexes, mode)?;
        join_part(&mut self.memory, &other.memory, &graphs, &indexes, mode)?;
        join_part(&mut self.creation, &other.creation, &graphs, &indexes, mode)?;

        for query in &mut self.queries {
            if let Some(other_query) = other.query_table(&query.shape) {
                join_part(&mut query.table, &other_query.table, &graphs, &indexes, mode)?;
            }
        }
        Ok(())
    }

    /// Union the index column sets: column-join every table, adopting
    /// `other`'s unmatched query tables with `-5` back-fill for columns they
    /// never ran.
    pub fn append(&mut self, other: &ResultSet) -> Result<()> {
        for index in &other.indexes {
            if !self.indexes.contains(index) {
                self.indexes.push(index.clone());
            }
        }

        self.sizes.join_columns(&other.sizes)?;
        self.memory.join_columns(&other.memory)?;
        self.creation.join_columns(&other.creation)?;

        for query in &mut self.queries {
            match other.query_table(&query.shape) {
                Some(other_query) => query.table.join_columns(&other_query.table)?,
                None => {
                    for index in &self.indexes {
                        if !query.table.has_index(index) {
                            query.table.push_index(index, sentinel::NOT_APPLICABLE);
                        }
                    }
                }
            }
        }

        for other_query in &other.queries {
            if self.query_table(&other_query.shape).is_some() {
                continue;
            }
            let mut adopted = other_query.clone();
            for index in &self.indexes {
                if !adopted.table.has_index(index) {
                    adopted.table.push_index(index, sentinel::NOT_APPLICABLE);
                }
            }
            self.queries.push(adopted);
        }
        Ok(())
    }

    /// The row-wise analogue of [`ResultSet::append`]: union the graph row
    /// sets, row-append every table, adopt unmatched query tables with `-5`
    /// rows for graphs they never ran.
    pub fn merge(&mut self, other: &ResultSet) {
        for graph in &other.graphs {
            if !self.graphs.contains(graph) {
                self.graphs.push(graph.clone());
            }
        }

        self.sizes.append_rows(&other.sizes);
        self.memory.append_rows(&other.memory);
        self.creation.append_rows(&other.creation);

        for query in &mut self.queries {
            match other.query_table(&query.shape) {
                Some(other_query) => query.table.append_rows(&other_query.table),
                None => {
                    for graph in &self.graphs {
                        if !query.table.has_graph(graph) {
                            query.table.push_graph(graph, sentinel::NOT_APPLICABLE);
                        }
                    }
                }
            }
        }

        let unmatched: Vec<QueryTable> = other
            .queries
            .iter()
            .filter(|q| self.query_table(&q.shape).is_none())
            .cloned()
            .collect();
        for mut adopted in unmatched {
            for graph in &self.graphs {
                if !adopted.table.has_graph(graph) {
                    adopted.table.push_graph(graph, sentinel::NOT_APPLICABLE);
                }
            }
            self.queries.push(adopted);
        }
    }

    /// Collapse random/connected query-table pairs that agree on label bound
    /// and result class into single `both` tables.
    pub fn merge_queries_on_type(&mut self) -> Result<()> {
        let queries = std::mem::take(&mut self.queries);
        self.queries = consolidate_queries(
            queries,
            |a, b| a.label == b.label && a.result == b.result && a.traversal != b.traversal,
            |shape| shape.traversal = Traversal::Both,
        )?;
        Ok(())
    }

    /// Collapse true/false query-table pairs that agree on label bound and
    /// traversal into single `none` tables.
    pub fn merge_queries_on_result(&mut self) -> Result<()> {
        let queries = std::mem::take(&mut self.queries);
        self.queries = consolidate_queries(
            queries,
            |a, b| a.label == b.label && a.traversal == b.traversal && a.result != b.result,
            |shape| shape.result = ResultClass::None,
        )?;
        Ok(())
    }

    /// Reduce each (result class, traversal) group of query tables to at most
    /// three representatives labelled small/medium/large. Per graph, the
    /// buckets take the rows of the smallest-label tables that actually ran
    /// on that graph (no `-5` in the row), so a graph skipped at the smallest
    /// label bound draws its "small" row from the next one up.
    pub fn merge_queries_on_small_med_large(&mut self) -> Result<()> {
        let queries = std::mem::take(&mut self.queries);

        let mut groups: Vec<((ResultClass, Traversal), Vec<QueryTable>)> = Vec::new();
        for query in queries {
            let key = (query.shape.result, query.shape.traversal);
            match groups.iter_mut().find(|(k, _)| *k == key) {
                Some((_, group)) => group.push(query),
                None => groups.push((key, vec![query])),
            }
        }

        const BUCKETS: [LabelBound; 3] = [LabelBound::Small, LabelBound::Medium, LabelBound::Large];

        for (_, mut group) in groups {
            group.sort_by_key(|q| q.shape.label);

            let width = group.len().min(BUCKETS.len());
            let mut buckets: Vec<Table> = vec![group[0].table.clone(); width];

            for graph in &self.graphs {
                let mut slot = 0;
                for candidate in &group {
                    if slot >= width {
                        break;
                    }
                    let Some(row) = candidate.table.row(graph) else {
                        continue;
                    };
                    if row.iter().any(|&v| v == sentinel::NOT_APPLICABLE) {
                        continue;
                    }
                    let row = row.to_vec();
                    buckets[slot].set_row(graph, &row)?;
                    slot += 1;
                }
            }

            for (slot, table) in buckets.into_iter().enumerate() {
                let mut query = group[slot].clone();
                query.table = table;
                query.shape.label = BUCKETS[slot];
                self.queries.push(query);
            }
        }
        Ok(())
    }

    /// Divide each raw query row by the exact number of generated queries for
    /// that graph and shape, recording the count for weighted re-merging.
    /// Rows containing `-5`, and graphs with no discoverable query file, are
    /// left untouched.
    pub fn avg_queries(&mut self, workload: &WorkloadPaths) -> Result<()> {
        let graphs = self.graphs.clone();
        for query in &mut self.queries {
            query.counts.clear();
            query.averaged = true;

            for graph in &graphs {
                let Some(row) = query.table.row(graph) else {
                    continue;
                };
                if row.iter().any(|&v| v == sentinel::NOT_APPLICABLE) {
                    continue;
                }
                let path = workload.query_file_for_shape(graph, &query.shape);
                let Some(count) = WorkloadPaths::query_count(&path) else {
                    continue;
                };
                if count == 0 {
                    continue;
                }
                let c = count as f64;
                query
                    .table
                    .map_row(graph, |v| if v > 0.0 { v / c } else { v })?;
                query.counts.insert(graph.clone(), count);
            }
        }
        Ok(())
    }

    /// Reindex every table's columns to exactly `order`.
    pub fn reorder(&mut self, order: &[String]) -> Result<()> {
        for table in self.scalar_tables_mut() {
            table.reorder_indexes(order)?;
        }
        for query in &mut self.queries {
            query.table.reorder_indexes(order)?;
        }
        self.indexes = order.to_vec();
        Ok(())
    }

    /// Reindex every table's rows to exactly `order`; names not currently
    /// present become empty rows.
    pub fn reorder_graphs(&mut self, order: &[String]) {
        for table in self.scalar_tables_mut() {
            table.reorder_graphs(order);
        }
        for query in &mut self.queries {
            query.table.reorder_graphs(order);
        }
        self.graphs = order.to_vec();
    }

    /// Rename a graph row everywhere. Renaming onto an existing name is an
    /// error: silently merging two differently-identified series would
    /// corrupt the comparison.
    pub fn rename_graph(&mut self, from: &str, to: &str) -> Result<()> {
        let Some(pos) = self.graphs.iter().position(|g| g == from) else {
            return Ok(());
        };
        if self.graphs.iter().any(|g| g == to) {
            bail!("graph name {to:?} already exists");
        }
        self.graphs[pos] = to.to_string();

        for table in self.scalar_tables_mut() {
            table.rename_graph(from, to);
        }
        for query in &mut self.queries {
            query.table.rename_graph(from, to);
            if let Some(count) = query.counts.remove(from) {
                query.counts.insert(to.to_string(), count);
            }
        }
        Ok(())
    }

    /// Rename an index column everywhere; collisions are an error.
    pub fn rename_index(&mut self, from: &str, to: &str) -> Result<()> {
        let Some(pos) = self.indexes.iter().position(|i| i == from) else {
            return Ok(());
        };
        if self.indexes.iter().any(|i| i == to) {
            bail!("index name {to:?} already exists");
        }
        self.indexes[pos] = to.to_string();

        for table in self.scalar_tables_mut() {
            table.rename_index(from, to);
        }
        for query in &mut self.queries {
            query.table.rename_index(from, to);
        }
        Ok(())
    }

    /// Remove a graph row from every table and every sample-count map.
    pub fn drop_graph(&mut self, graph: &str) {
        self.graphs.retain(|g| g != graph);
        for table in self.scalar_tables_mut() {
            table.drop_graph(graph);
        }
        for query in &mut self.queries {
            query.table.drop_graph(graph);
            query.counts.remove(graph);
        }
    }

    /// Remove an index column from every table.
    pub fn drop_index(&mut self, index: &str) {
        self.indexes.retain(|i| i != index);
        for table in self.scalar_tables_mut() {
            table.drop_index(index);
        }
        for query in &mut self.queries {
            query.table.drop_index(index);
        }
    }

    /// Map every sentinel to NaN so downstream plotting treats it as a
    /// missing value.
    pub fn replace_errors_with_nan(&mut self) {
        let scrub = |v: f64| if sentinel::is_error(v) { f64::NAN } else { v };
        for table in self.scalar_tables_mut() {
            table.map(scrub);
        }
        for query in &mut self.queries {
            query.table.map(scrub);
        }
    }

    /// The abbreviations used in the comparison tables for the well-known
    /// real graphs.
    pub fn rename_real_graphs(&mut self) -> Result<()> {
        const RENAMES: [(&str, &str); 26] = [
            ("zhishi", "ZH"),
            ("socPokec", "SP"),
            ("wikipediaLinkFr", "WLF"),
            ("dbpedia", "DP"),
            ("swdf", "SWDF"),
            ("reddit", "RE"),
            ("notreDame", "ND"),
            ("wordnet", "WN"),
            ("wikiTalk", "WT"),
            ("patents", "PT"),
            ("wikitionary", "WTE"),
            ("lgd", "LGD"),
            ("robots", "RT"),
            ("advogato", "ADG"),
            ("wikiVote", "WV"),
            ("gnutella", "GN"),
            ("arxiv", "AX"),
            ("biograd", "BG"),
            ("socSlashdot", "SSD"),
            ("socEpinions", "SE"),
            ("email", "EEU"),
            ("stringHS", "SHS"),
            ("stringFC", "SFC"),
            ("webGoogle", "WG"),
            ("webStanford", "WSF"),
            ("webBerkStan", "WBS"),
        ];
        for (from, to) in RENAMES {
            self.rename_graph(from, to)?;
        }
        Ok(())
    }

    /// Render every table to human-readable units. With `highlight_best`, the
    /// minimum positive value of each row is wrapped in `\textbf{}` for LaTeX
    /// table output. Creation times below 1µs are excluded from "best" since
    /// they are below measurement resolution.
    pub fn to_units(&self, highlight_best: bool) -> RenderedSet {
        let best_floor = |floor: f64| if highlight_best { Some(floor) } else { None };
        RenderedSet {
            sizes: render_table(&self.sizes, units::format_memory, best_floor(0.0)),
            memory: render_table(&self.memory, units::format_memory, best_floor(0.0)),
            creation: render_table(&self.creation, units::format_time, best_floor(0.001)),
            queries: self
                .queries
                .iter()
                .map(|q| (q.shape, render_table(&q.table, units::format_time, best_floor(0.0))))
                .collect(),
        }
    }
}

/// A table formatted to display strings.
#[derive(Debug, Clone)]
pub struct RenderedTable {
    pub graphs: Vec<String>,
    pub indexes: Vec<String>,
    pub cells: Vec<Vec<String>>,
}

impl RenderedTable {
    pub fn to_csv(&self) -> String {
        let mut out = String::new();
        for index in &self.indexes {
            out.push(',');
            out.push_str(index);
        }
        out.push('\n');
        for (graph, row) in self.graphs.iter().zip(&self.cells) {
            out.push_str(graph);
            for cell in row {
                out.push(',');
                out.push_str(cell);
            }
            out.push('\n');
        }
        out
    }
}

/// All tables of a set rendered for display.
#[derive(Debug, Clone)]
pub struct RenderedSet {
    pub sizes: RenderedTable,
    pub memory: RenderedTable,
    pub creation: RenderedTable,
    pub queries: Vec<(QueryShape, RenderedTable)>,
}

fn render_table(table: &Table, fmt: impl Fn(f64) -> String, best_floor: Option<f64>) -> RenderedTable {
    let cells = table
        .graphs()
        .iter()
        .map(|graph| {
            let best = best_floor.and_then(|floor| table.row_min_above(graph, floor));
            table
                .indexes()
                .iter()
                .map(|index| {
                    let value = table.get(graph, index).unwrap_or(f64::NAN);
                    let text = fmt(value);
                    match best {
                        Some(b) if value == b => format!("\\textbf{{{text}}}"),
                        _ => text,
                    }
                })
                .collect()
        })
        .collect();

    RenderedTable {
        graphs: table.graphs().to_vec(),
        indexes: table.indexes().to_vec(),
        cells,
    }
}
