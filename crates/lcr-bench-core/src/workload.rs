//! Workload layout and on-demand synthetic graph generation.
//!
//! Synthetic graphs live under `<root>/generated/<name>.nt`, real graphs at
//! `<root>/<graph>/graph.nt`; query files sit next to the graph file with the
//! `.nt` extension replaced by `.queries-lcr.<shape>.csv`.
//!
//! Graph files are plain text: a `<nodes>,<edges>,<labels>` header, then one
//! `"<src> <label> <tgt> ."` line per edge, sorted by source.

use std::collections::HashSet;
use std::fs;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::results::QueryShape;

/// Topology model of a synthetic graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GraphModel {
    /// Erdős–Rényi Gnm, directed.
    Er,
    /// Preferential attachment, undirected.
    Pa,
    /// Forest fire, directed.
    Ff,
    /// Power-law degree sequence, undirected.
    Pl,
}

/// Distribution the per-edge labels are drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LabelDist {
    Norm,
    Uni,
    Exp,
}

impl LabelDist {
    pub fn suffix(&self) -> &'static str {
        match self {
            LabelDist::Norm => "norm",
            LabelDist::Uni => "uni",
            LabelDist::Exp => "exp",
        }
    }
}

/// Exponent used by the power-law model; embedded in its graph names.
const PL_ALPHA: &str = "1.95";

/// Canonical synthetic graph name, e.g. `erV25kD3L8exp`.
pub fn graph_name(nodes: u64, labels: u32, degree: u32, dist: LabelDist, model: GraphModel) -> String {
    let k = nodes / 1000;
    let dist = dist.suffix();
    match model {
        GraphModel::Er => format!("erV{k}kD{degree}L{labels}{dist}"),
        GraphModel::Pa => format!("paV{k}kD{degree}L{labels}{dist}"),
        GraphModel::Ff => format!("ffV{k}k{degree}L{labels}{dist}"),
        GraphModel::Pl => format!("plV{k}ka{PL_ALPHA}L{labels}{dist}"),
    }
}

/// True for names produced by [`graph_name`]; everything else is treated as a
/// real-graph identifier.
pub fn is_synthetic_name(name: &str) -> bool {
    let model = name.starts_with("erV")
        || name.starts_with("paV")
        || name.starts_with("ffV")
        || name.starts_with("plV");
    model && (name.ends_with("norm") || name.ends_with("uni") || name.ends_with("exp"))
}

/// Resolves graph and query file locations under one workload root.
#[derive(Debug, Clone)]
pub struct WorkloadPaths {
    root: PathBuf,
}

impl WorkloadPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn generated_dir(&self) -> PathBuf {
        self.root.join("generated")
    }

    pub fn synthetic_graph_file(&self, name: &str) -> PathBuf {
        self.generated_dir().join(format!("{name}.nt"))
    }

    pub fn real_graph_file(&self, name: &str) -> PathBuf {
        self.root.join(name).join("graph.nt")
    }

    /// Graph file for either kind of name, decided by the naming convention.
    pub fn graph_file(&self, name: &str) -> PathBuf {
        if is_synthetic_name(name) {
            self.synthetic_graph_file(name)
        } else {
            self.real_graph_file(name)
        }
    }

    /// The query file for one shape, next to `graph_file`.
    pub fn query_file(graph_file: &Path, mode: &str) -> PathBuf {
        let name = graph_file
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default();
        let base = name.strip_suffix(".nt").unwrap_or(name);
        graph_file.with_file_name(format!("{base}.queries-lcr.{mode}.csv"))
    }

    pub fn query_file_for_shape(&self, graph: &str, shape: &QueryShape) -> PathBuf {
        Self::query_file(&self.graph_file(graph), &shape.mode())
    }

    /// Enumerate the shape mode strings of every existing query file next to
    /// `graph_file`.
    pub fn query_modes(graph_file: &Path) -> Result<Vec<String>> {
        let dir = graph_file.parent().unwrap_or(Path::new("."));
        let name = graph_file
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default();
        let base = name.strip_suffix(".nt").unwrap_or(name);
        let prefix = format!("{base}.queries-lcr.");

        let mut modes = Vec::new();
        for entry in fs::read_dir(dir)
            .with_context(|| format!("failed to read workload dir {}", dir.display()))?
        {
            let entry = entry?;
            let file = match entry.file_name().into_string() {
                Ok(f) => f,
                Err(_) => continue,
            };
            if let Some(rest) = file.strip_prefix(&prefix) {
                if let Some(mode) = rest.strip_suffix(".csv") {
                    modes.push(mode.to_string());
                }
            }
        }
        modes.sort();
        Ok(modes)
    }

    /// Number of generated queries in one query file, or `None` when the file
    /// does not exist (the caller leaves that row unaveraged).
    pub fn query_count(path: &Path) -> Option<u64> {
        let file = fs::File::open(path).ok()?;
        let count = BufReader::new(file).lines().map_while(|l| l.ok()).count();
        Some(count as u64)
    }
}

// ---------------------------------------------------------------------------
// Synthetic graph generation
// ---------------------------------------------------------------------------

/// xorshift64* (simple, fast, deterministic).
pub(crate) struct XorShift64 {
    state: u64,
}

impl XorShift64 {
    pub(crate) fn new(seed: u64) -> Self {
        // Avoid the degenerate all-zero state.
        let state = if seed == 0 { 0x9e3779b97f4a7c15 } else { seed };
        Self { state }
    }

    pub(crate) fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.state = x;
        x.wrapping_mul(0x2545_f491_4f6c_dd1d)
    }

    pub(crate) fn gen_range_usize(&mut self, upper: usize) -> usize {
        if upper == 0 {
            return 0;
        }
        (self.next_u64() % (upper as u64)) as usize
    }

    /// Uniform in [0, 1).
    pub(crate) fn gen_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Standard normal via Box-Muller.
    pub(crate) fn gen_normal(&mut self) -> f64 {
        let u1 = self.gen_f64().max(f64::MIN_POSITIVE);
        let u2 = self.gen_f64();
        (-2.0 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos()
    }
}

fn sample_label(rng: &mut XorShift64, labels: u32, dist: LabelDist) -> u32 {
    let l = labels as f64;
    let mean = (l / 2.0).floor();
    let sd = (l / 4.0).floor().max(1.0);

    let raw = match dist {
        LabelDist::Norm => mean + sd * rng.gen_normal(),
        LabelDist::Uni => rng.gen_f64() * l,
        // Mean l * 1.7, matching the query workload's label skew.
        LabelDist::Exp => -(l * 1.7) * (1.0 - rng.gen_f64()).ln(),
    };

    raw.clamp(0.0, (labels - 1) as f64).floor() as u32
}

/// Generate a synthetic graph file if it does not already exist. Undirected
/// models flip each edge's direction with probability one half; every edge
/// gets a label from `dist` clamped into `[0, labels)`.
pub fn generate_graph(
    path: &Path,
    nodes: u64,
    degree: u32,
    labels: u32,
    dist: LabelDist,
    model: GraphModel,
    seed: u64,
) -> Result<()> {
    if path.exists() {
        return Ok(());
    }
    if labels == 0 {
        bail!("invalid number of labels");
    }
    let edge_target = nodes * degree as u64;
    if edge_target > nodes * (nodes.saturating_sub(1)) {
        bail!("too many edges for the number of nodes");
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }

    let mut rng = XorShift64::new(seed);
    let (raw_edges, directed) = match model {
        GraphModel::Er => (erdos_renyi(&mut rng, nodes as usize, edge_target as usize), true),
        GraphModel::Pa => (preferential_attachment(&mut rng, nodes as usize, degree as usize), false),
        GraphModel::Ff => (forest_fire(&mut rng, nodes as usize), true),
        GraphModel::Pl => (power_law(&mut rng, nodes as usize), false),
    };

    let mut edges: Vec<(u64, u64, u32)> = Vec::with_capacity(raw_edges.len());
    for (a, b) in raw_edges {
        let label = sample_label(&mut rng, labels, dist);
        let flip = !directed && rng.gen_f64() >= 0.5;
        if flip {
            edges.push((b as u64, a as u64, label));
        } else {
            edges.push((a as u64, b as u64, label));
        }
    }
    edges.sort_by_key(|&(src, _, _)| src);

    let mut out = String::new();
    out.push_str(&format!("{nodes},{},{labels}\n", edges.len()));
    for (src, tgt, label) in &edges {
        out.push_str(&format!("{src} {label} {tgt} .\n"));
    }
    fs::write(path, out).with_context(|| format!("failed to write graph {}", path.display()))
}

/// Directed Gnm: `edge_count` distinct edges, no self loops.
fn erdos_renyi(rng: &mut XorShift64, nodes: usize, edge_count: usize) -> Vec<(usize, usize)> {
    let mut seen = HashSet::with_capacity(edge_count);
    let mut edges = Vec::with_capacity(edge_count);
    while edges.len() < edge_count {
        let src = rng.gen_range_usize(nodes);
        let tgt = rng.gen_range_usize(nodes);
        if src == tgt {
            continue;
        }
        if seen.insert((src, tgt)) {
            edges.push((src, tgt));
        }
    }
    edges
}

/// Barabási–Albert style growth: each new node attaches `degree` edges to
/// endpoints drawn from the degree-weighted endpoint list.
fn preferential_attachment(rng: &mut XorShift64, nodes: usize, degree: usize) -> Vec<(usize, usize)> {
    let degree = degree.max(1);
    let mut edges = Vec::with_capacity(nodes * degree);
    // Every edge endpoint lands here once, making draws degree-proportional.
    let mut endpoints: Vec<usize> = Vec::with_capacity(2 * nodes * degree);

    for node in 0..nodes {
        if node == 0 {
            endpoints.push(0);
            continue;
        }
        for _ in 0..degree.min(node) {
            let target = endpoints[rng.gen_range_usize(endpoints.len())];
            edges.push((node, target));
            endpoints.push(node);
            endpoints.push(target);
        }
    }
    edges
}

/// Forest fire with forward probability 0.4 and backward 0.2: each new node
/// picks an ambassador and burns through a geometric number of its
/// neighbours.
fn forest_fire(rng: &mut XorShift64, nodes: usize) -> Vec<(usize, usize)> {
    const FORWARD: f64 = 0.4;
    const BACKWARD: f64 = 0.2;

    let mut out_adj: Vec<Vec<usize>> = vec![Vec::new(); nodes];
    let mut in_adj: Vec<Vec<usize>> = vec![Vec::new(); nodes];
    let mut edges = Vec::new();

    for node in 1..nodes {
        let mut burned: HashSet<usize> = HashSet::new();
        let mut frontier = vec![rng.gen_range_usize(node)];

        while let Some(current) = frontier.pop() {
            if !burned.insert(current) {
                continue;
            }
            edges.push((node, current));

            let forward_burn = geometric(rng, FORWARD);
            let backward_burn = geometric(rng, BACKWARD);
            extend_frontier(rng, &out_adj[current], forward_burn, &burned, &mut frontier);
            extend_frontier(rng, &in_adj[current], backward_burn, &burned, &mut frontier);
        }

        for &target in burned.iter() {
            out_adj[node].push(target);
            in_adj[target].push(node);
        }
    }
    edges
}

/// Number of neighbours to burn: geometric with success probability
/// `1 - p`, so the expected count grows with `p`.
fn geometric(rng: &mut XorShift64, p: f64) -> usize {
    let mut count = 0;
    while rng.gen_f64() < p && count < 16 {
        count += 1;
    }
    count
}

fn extend_frontier(
    rng: &mut XorShift64,
    neighbours: &[usize],
    take: usize,
    burned: &HashSet<usize>,
    frontier: &mut Vec<usize>,
) {
    let mut candidates: Vec<usize> = neighbours
        .iter()
        .copied()
        .filter(|n| !burned.contains(n))
        .collect();
    for _ in 0..take.min(candidates.len()) {
        let pick = rng.gen_range_usize(candidates.len());
        frontier.push(candidates.swap_remove(pick));
    }
}

/// Power-law degree sequence (exponent 1.95) wired with a configuration
/// model. An approximation: self loops and duplicates are discarded rather
/// than rewired.
fn power_law(rng: &mut XorShift64, nodes: usize) -> Vec<(usize, usize)> {
    const ALPHA: f64 = 1.95;

    let mut stubs: Vec<usize> = Vec::new();
    for node in 0..nodes {
        // Inverse-transform sample of a zeta-like degree, capped at n - 1.
        let u = rng.gen_f64().max(f64::MIN_POSITIVE);
        let degree = u.powf(-1.0 / (ALPHA - 1.0)).floor() as usize;
        let degree = degree.clamp(1, nodes.saturating_sub(1));
        stubs.extend(std::iter::repeat(node).take(degree));
    }

    // Shuffle stubs, then pair them off.
    for i in (1..stubs.len()).rev() {
        let j = rng.gen_range_usize(i + 1);
        stubs.swap(i, j);
    }

    let mut seen = HashSet::new();
    let mut edges = Vec::new();
    for pair in stubs.chunks_exact(2) {
        let (a, b) = (pair[0], pair[1]);
        if a != b && seen.insert((a.min(b), a.max(b))) {
            edges.push((a, b));
        }
    }
    edges
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn graph_names_follow_model_conventions() {
        assert_eq!(
            graph_name(25_000, 8, 3, LabelDist::Exp, GraphModel::Er),
            "erV25kD3L8exp"
        );
        assert_eq!(
            graph_name(50_000, 16, 5, LabelDist::Exp, GraphModel::Pa),
            "paV50kD5L16exp"
        );
        assert_eq!(
            graph_name(25_000, 8, 3, LabelDist::Exp, GraphModel::Ff),
            "ffV25k3L8exp"
        );
        assert_eq!(
            graph_name(25_000, 8, 3, LabelDist::Uni, GraphModel::Pl),
            "plV25ka1.95L8uni"
        );
    }

    #[test]
    fn synthetic_names_are_recognized() {
        assert!(is_synthetic_name("erV25kD3L8exp"));
        assert!(is_synthetic_name("plV25ka1.95L8uni"));
        assert!(!is_synthetic_name("wikiTalk"));
        assert!(!is_synthetic_name("patents"));
    }

    #[test]
    fn query_file_replaces_graph_extension() {
        let graph = Path::new("/w/generated/erV25kD3L8exp.nt");
        assert_eq!(
            WorkloadPaths::query_file(graph, "cnn.L8.true"),
            Path::new("/w/generated/erV25kD3L8exp.queries-lcr.cnn.L8.true.csv")
        );
    }

    #[test]
    fn generated_er_graph_matches_file_contract() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("erV0kD3L8exp.nt");
        generate_graph(&path, 100, 3, 8, LabelDist::Exp, GraphModel::Er, 7).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        let header = lines.next().unwrap();
        assert_eq!(header, "100,300,8");

        let mut last_src = 0u64;
        for line in lines {
            let fields: Vec<&str> = line.split_whitespace().collect();
            assert_eq!(fields.len(), 4);
            assert_eq!(fields[3], ".");
            let src: u64 = fields[0].parse().unwrap();
            let label: u32 = fields[1].parse().unwrap();
            let tgt: u64 = fields[2].parse().unwrap();
            assert!(src < 100 && tgt < 100 && src != tgt);
            assert!(label < 8);
            assert!(src >= last_src, "edges must be sorted by source");
            last_src = src;
        }
    }

    #[test]
    fn generation_is_skipped_when_file_exists() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("g.nt");
        std::fs::write(&path, "sentinel content").unwrap();
        generate_graph(&path, 50, 2, 4, LabelDist::Uni, GraphModel::Pa, 1).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "sentinel content");
    }

    #[test]
    fn generation_is_deterministic_per_seed() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("a.nt");
        let b = dir.path().join("b.nt");
        generate_graph(&a, 200, 3, 8, LabelDist::Norm, GraphModel::Pa, 42).unwrap();
        generate_graph(&b, 200, 3, 8, LabelDist::Norm, GraphModel::Pa, 42).unwrap();
        assert_eq!(
            std::fs::read_to_string(&a).unwrap(),
            std::fs::read_to_string(&b).unwrap()
        );
    }

    #[test]
    fn query_count_counts_lines() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("q.csv");
        std::fs::write(&path, "1,2,3\n4,5,6\n7,8,9\n").unwrap();
        assert_eq!(WorkloadPaths::query_count(&path), Some(3));
        assert_eq!(WorkloadPaths::query_count(&dir.path().join("nope.csv")), None);
    }
}
