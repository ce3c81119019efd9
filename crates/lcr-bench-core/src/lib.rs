//! Benchmark sweep driver for label-constrained reachability (LCR) indexes.
//!
//! Drives an external benchmark engine over a grid of index configurations
//! and graphs, persisting resumable state after every cell, and provides the
//! consolidation algebra that combines partial result sets from different
//! machines and reruns into one comparison set.
//!
//! ## Module Organization
//!
//! - `sentinel`: the reserved negative codes standing in for non-measurements
//! - `units`: parsing and formatting of the engine's textual measurements
//! - `table`: the graph-row × index-column scalar table
//! - `results`: the Result Table Set owning one directory's tables
//! - `checkpoint`: the tab-separated sweep cursor file
//! - `engine`: process contracts for the engine and the query generator
//! - `report`: parsing of the engine's structured stdout
//! - `runner`: per-cell execution and metric collection
//! - `sweep`: nested-loop scheduling, resumption, and short-circuiting
//! - `consolidate`: merge/join/append/average operations over result sets
//! - `workload`: graph naming, file layout, and synthetic graph generation

pub mod checkpoint;
pub mod consolidate;
pub mod engine;
pub mod report;
pub mod results;
pub mod runner;
pub mod sentinel;
pub mod sweep;
pub mod table;
pub mod units;
pub mod workload;

pub use consolidate::{JoinMode, RenderedSet, RenderedTable};
pub use engine::{Engine, ProcessEngine, ProcessQueryGenerator, QueryGenerator};
pub use results::{IndexSpec, QueryShape, QueryTable, ResultSet};
pub use runner::BenchmarkRunner;
pub use sweep::{RealSweep, SweepEnv, SynthSweep};
pub use table::Table;
