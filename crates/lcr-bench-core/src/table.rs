//! A scalar table keyed by graph row and index column.
//!
//! Row and column order is significant: it drives on-disk layout, rendering,
//! and the reorder operations. Cells are `f64`; sentinel codes (see
//! [`crate::sentinel`]) and NaN are ordinary cell values here.

use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    graphs: Vec<String>,
    indexes: Vec<String>,
    /// Row-major: `cells[graph][index]`.
    cells: Vec<Vec<f64>>,
}

impl Table {
    /// A table with every cell set to `fill`.
    pub fn filled(graphs: &[String], indexes: &[String], fill: f64) -> Self {
        Self {
            graphs: graphs.to_vec(),
            indexes: indexes.to_vec(),
            cells: vec![vec![fill; indexes.len()]; graphs.len()],
        }
    }

    pub fn graphs(&self) -> &[String] {
        &self.graphs
    }

    pub fn indexes(&self) -> &[String] {
        &self.indexes
    }

    pub fn has_graph(&self, graph: &str) -> bool {
        self.graphs.iter().any(|g| g == graph)
    }

    pub fn has_index(&self, index: &str) -> bool {
        self.indexes.iter().any(|i| i == index)
    }

    fn graph_pos(&self, graph: &str) -> Option<usize> {
        self.graphs.iter().position(|g| g == graph)
    }

    fn index_pos(&self, index: &str) -> Option<usize> {
        self.indexes.iter().position(|i| i == index)
    }

    pub fn get(&self, graph: &str, index: &str) -> Option<f64> {
        let r = self.graph_pos(graph)?;
        let c = self.index_pos(index)?;
        Some(self.cells[r][c])
    }

    /// Set a cell; unknown row or column names are an error, since writing to
    /// a cell outside the configured identity sets would corrupt the table.
    pub fn set(&mut self, graph: &str, index: &str, value: f64) -> Result<()> {
        let r = self
            .graph_pos(graph)
            .ok_or_else(|| anyhow!("unknown graph row: {graph}"))?;
        let c = self
            .index_pos(index)
            .ok_or_else(|| anyhow!("unknown index column: {index}"))?;
        self.cells[r][c] = value;
        Ok(())
    }

    pub fn row(&self, graph: &str) -> Option<&[f64]> {
        let r = self.graph_pos(graph)?;
        Some(&self.cells[r])
    }

    /// Overwrite a whole row. The row must exist and `values` must match the
    /// column count.
    pub fn set_row(&mut self, graph: &str, values: &[f64]) -> Result<()> {
        let r = self
            .graph_pos(graph)
            .ok_or_else(|| anyhow!("unknown graph row: {graph}"))?;
        if values.len() != self.indexes.len() {
            bail!(
                "row width {} does not match {} columns",
                values.len(),
                self.indexes.len()
            );
        }
        self.cells[r].copy_from_slice(values);
        Ok(())
    }

    /// Set every cell of a row to one value.
    pub fn fill_row(&mut self, graph: &str, value: f64) -> Result<()> {
        let r = self
            .graph_pos(graph)
            .ok_or_else(|| anyhow!("unknown graph row: {graph}"))?;
        self.cells[r].fill(value);
        Ok(())
    }

    /// Apply `f` to every cell of one row.
    pub fn map_row(&mut self, graph: &str, f: impl Fn(f64) -> f64) -> Result<()> {
        let r = self
            .graph_pos(graph)
            .ok_or_else(|| anyhow!("unknown graph row: {graph}"))?;
        for cell in &mut self.cells[r] {
            *cell = f(*cell);
        }
        Ok(())
    }

    /// Apply `f` to every cell.
    pub fn map(&mut self, f: impl Fn(f64) -> f64) {
        for row in &mut self.cells {
            for cell in row {
                *cell = f(*cell);
            }
        }
    }

    pub fn rename_graph(&mut self, from: &str, to: &str) {
        if let Some(r) = self.graph_pos(from) {
            self.graphs[r] = to.to_string();
        }
    }

    pub fn rename_index(&mut self, from: &str, to: &str) {
        if let Some(c) = self.index_pos(from) {
            self.indexes[c] = to.to_string();
        }
    }

    pub fn drop_graph(&mut self, graph: &str) {
        if let Some(r) = self.graph_pos(graph) {
            self.graphs.remove(r);
            self.cells.remove(r);
        }
    }

    pub fn drop_index(&mut self, index: &str) {
        if let Some(c) = self.index_pos(index) {
            self.indexes.remove(c);
            for row in &mut self.cells {
                row.remove(c);
            }
        }
    }

    /// Reindex columns to exactly `order`. Every name must already be a
    /// column; selecting a missing index would silently fabricate data.
    pub fn reorder_indexes(&mut self, order: &[String]) -> Result<()> {
        let mut cols = Vec::with_capacity(order.len());
        for name in order {
            cols.push(
                self.index_pos(name)
                    .ok_or_else(|| anyhow!("unknown index column: {name}"))?,
            );
        }
        self.cells = self
            .cells
            .iter()
            .map(|row| cols.iter().map(|&c| row[c]).collect())
            .collect();
        self.indexes = order.to_vec();
        Ok(())
    }

    /// Reindex rows to exactly `order`. Names not present become NaN rows,
    /// mirroring a reindex that introduces empty entries.
    pub fn reorder_graphs(&mut self, order: &[String]) {
        let cells = order
            .iter()
            .map(|name| match self.graph_pos(name) {
                Some(r) => self.cells[r].clone(),
                None => vec![f64::NAN; self.indexes.len()],
            })
            .collect();
        self.cells = cells;
        self.graphs = order.to_vec();
    }

    /// Horizontally join `other`'s columns onto `self`, aligning on graph
    /// rows. Rows absent from `other` get NaN; a duplicated column name is an
    /// error.
    pub fn join_columns(&mut self, other: &Table) -> Result<()> {
        for name in &other.indexes {
            if self.has_index(name) {
                bail!("duplicate index column in join: {name}");
            }
        }
        for (r, graph) in self.graphs.iter().enumerate() {
            match other.graph_pos(graph) {
                Some(o) => self.cells[r].extend_from_slice(&other.cells[o]),
                None => self.cells[r].extend(vec![f64::NAN; other.indexes.len()]),
            }
        }
        self.indexes.extend(other.indexes.iter().cloned());
        Ok(())
    }

    /// Vertically append `other`'s rows, aligning on index columns. Columns
    /// absent on either side get NaN; rows whose graph already exists in
    /// `self` are skipped (row union).
    pub fn append_rows(&mut self, other: &Table) {
        let new_cols: Vec<String> = other
            .indexes
            .iter()
            .filter(|c| !self.has_index(c))
            .cloned()
            .collect();
        for row in &mut self.cells {
            row.extend(vec![f64::NAN; new_cols.len()]);
        }
        self.indexes.extend(new_cols);

        for (o, graph) in other.graphs.iter().enumerate() {
            if self.has_graph(graph) {
                continue;
            }
            let row = self
                .indexes
                .iter()
                .map(|col| match other.index_pos(col) {
                    Some(c) => other.cells[o][c],
                    None => f64::NAN,
                })
                .collect();
            self.graphs.push(graph.clone());
            self.cells.push(row);
        }
    }

    /// Append a new NaN-filled row.
    pub fn push_graph(&mut self, graph: &str, fill: f64) {
        self.graphs.push(graph.to_string());
        self.cells.push(vec![fill; self.indexes.len()]);
    }

    /// Append a new column with every cell set to `fill`.
    pub fn push_index(&mut self, index: &str, fill: f64) {
        self.indexes.push(index.to_string());
        for row in &mut self.cells {
            row.push(fill);
        }
    }

    /// Cell-wise add `other`, aligning on row and column names. Cells with no
    /// counterpart become NaN.
    pub fn add_aligned(&mut self, other: &Table) {
        for (r, graph) in self.graphs.iter().enumerate() {
            for (c, index) in self.indexes.iter().enumerate() {
                match other.get(graph, index) {
                    Some(v) => self.cells[r][c] += v,
                    None => self.cells[r][c] = f64::NAN,
                }
            }
        }
    }

    /// Minimum value per row among cells strictly greater than `floor`.
    pub fn row_min_above(&self, graph: &str, floor: f64) -> Option<f64> {
        let r = self.graph_pos(graph)?;
        self.cells[r]
            .iter()
            .copied()
            .filter(|v| *v > floor)
            .fold(None, |best, v| match best {
                Some(b) if b <= v => Some(b),
                _ => Some(v),
            })
    }

    /// Serialize as CSV: empty-named first column holds the graph row key.
    pub fn to_csv(&self) -> String {
        let mut out = String::new();
        for index in &self.indexes {
            out.push(',');
            out.push_str(index);
        }
        out.push('\n');
        for (r, graph) in self.graphs.iter().enumerate() {
            out.push_str(graph);
            for cell in &self.cells[r] {
                out.push(',');
                if cell.is_nan() {
                    // NaN serializes as an empty field.
                } else {
                    let _ = write!(out, "{cell}");
                }
            }
            out.push('\n');
        }
        out
    }

    pub fn from_csv(text: &str) -> Result<Self> {
        let mut lines = text.lines();
        let header = lines.next().context("empty table file")?;
        let indexes: Vec<String> = header
            .split(',')
            .skip(1)
            .map(|s| s.trim().to_string())
            .collect();

        let mut graphs = Vec::new();
        let mut cells = Vec::new();
        for line in lines {
            if line.trim().is_empty() {
                continue;
            }
            let mut fields = line.split(',');
            let graph = fields.next().context("missing graph row key")?.to_string();
            let row: Vec<f64> = fields
                .map(|f| {
                    let f = f.trim();
                    if f.is_empty() {
                        Ok(f64::NAN)
                    } else {
                        f.parse::<f64>()
                            .with_context(|| format!("bad cell {f:?} in row {graph:?}"))
                    }
                })
                .collect::<Result<_>>()?;
            if row.len() != indexes.len() {
                bail!(
                    "row {graph:?} has {} cells, expected {}",
                    row.len(),
                    indexes.len()
                );
            }
            graphs.push(graph);
            cells.push(row);
        }

        Ok(Self {
            graphs,
            indexes,
            cells,
        })
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        fs::write(path, self.to_csv())
            .with_context(|| format!("failed to write table {}", path.display()))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read table {}", path.display()))?;
        Self::from_csv(&text).with_context(|| format!("failed to parse {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn sample() -> Table {
        let mut t = Table::filled(&names(&["g1", "g2"]), &names(&["A", "B"]), -1.0);
        t.set("g1", "A", 1.0).unwrap();
        t.set("g1", "B", 2.0).unwrap();
        t.set("g2", "A", 3.0).unwrap();
        t.set("g2", "B", 4.0).unwrap();
        t
    }

    #[test]
    fn csv_round_trip_preserves_cells() {
        let t = sample();
        let back = Table::from_csv(&t.to_csv()).unwrap();
        assert_eq!(t, back);
    }

    #[test]
    fn nan_round_trips_as_empty_field() {
        let mut t = sample();
        t.set("g1", "A", f64::NAN).unwrap();
        let back = Table::from_csv(&t.to_csv()).unwrap();
        assert!(back.get("g1", "A").unwrap().is_nan());
        assert_eq!(back.get("g2", "B"), Some(4.0));
    }

    #[test]
    fn reorder_indexes_permutes_columns() {
        let mut t = sample();
        t.reorder_indexes(&names(&["B", "A"])).unwrap();
        assert_eq!(t.indexes(), &names(&["B", "A"])[..]);
        assert_eq!(t.get("g1", "A"), Some(1.0));
        assert_eq!(t.get("g1", "B"), Some(2.0));
        assert!(t.reorder_indexes(&names(&["A", "C"])).is_err());
    }

    #[test]
    fn reorder_graphs_introduces_nan_rows() {
        let mut t = sample();
        t.reorder_graphs(&names(&["g2", "g3", "g1"]));
        assert_eq!(t.get("g2", "A"), Some(3.0));
        assert!(t.get("g3", "A").unwrap().is_nan());
        assert_eq!(t.get("g1", "B"), Some(2.0));
    }

    #[test]
    fn join_columns_aligns_on_rows() {
        let mut t = sample();
        let mut o = Table::filled(&names(&["g1"]), &names(&["C"]), 9.0);
        o.set("g1", "C", 7.0).unwrap();
        t.join_columns(&o).unwrap();
        assert_eq!(t.get("g1", "C"), Some(7.0));
        assert!(t.get("g2", "C").unwrap().is_nan());
        assert!(t.join_columns(&o).is_err()); // duplicate column
    }

    #[test]
    fn append_rows_unions_graphs() {
        let mut t = sample();
        let mut o = Table::filled(&names(&["g2", "g3"]), &names(&["A", "B"]), 0.0);
        o.set("g3", "A", 8.0).unwrap();
        t.append_rows(&o);
        assert_eq!(t.get("g2", "A"), Some(3.0)); // kept, not overwritten
        assert_eq!(t.get("g3", "A"), Some(8.0));
    }

    #[test]
    fn row_min_above_skips_sentinels() {
        let mut t = sample();
        t.set("g1", "A", -2.0).unwrap();
        assert_eq!(t.row_min_above("g1", 0.0), Some(2.0));
        t.set("g1", "B", -3.0).unwrap();
        assert_eq!(t.row_min_above("g1", 0.0), None);
    }
}
