//! Parser for the engine's structured stdout report.
//!
//! A successful run prints, in order: a `Training timings:` section with
//! `Took:` and `Memory:` lines, an `Indexes used:` section with a `size:`
//! line, and a `Query timings:` section holding one blank-line-delimited
//! `Query timings: <queryFile>` subsection per shape with a `took:` value
//! before a `min:` marker. A missing section or a malformed measurement is a
//! tool-contract violation and surfaces as an error.

use anyhow::{anyhow, Context, Result};

use crate::units;

const TRAINING_HEADER: &str = "Training timings:";
const INDEXES_HEADER: &str = "Indexes used:";
const QUERY_HEADER: &str = "Query timings:";

/// The parsed report of one successful engine invocation. The query section
/// is kept raw; per-shape lookups happen on demand.
#[derive(Debug, Clone)]
pub struct EngineReport {
    /// Index construction time in milliseconds.
    pub creation_ms: f64,
    /// Peak training memory in megabytes.
    pub memory_mb: f64,
    /// Theoretical index size in megabytes.
    pub size_mb: f64,
    query_section: String,
}

impl EngineReport {
    pub fn parse(stdout: &str) -> Result<Self> {
        let training_at = stdout
            .find(TRAINING_HEADER)
            .ok_or_else(|| anyhow!("engine output has no {TRAINING_HEADER:?} section"))?;
        let indexes_at = stdout[training_at..]
            .find(INDEXES_HEADER)
            .map(|i| training_at + i)
            .ok_or_else(|| anyhow!("engine output has no {INDEXES_HEADER:?} section"))?;
        let queries_at = stdout[indexes_at..]
            .find(QUERY_HEADER)
            .map(|i| indexes_at + i)
            .ok_or_else(|| anyhow!("engine output has no {QUERY_HEADER:?} section"))?;

        let training = &stdout[training_at..indexes_at];
        let indexes = &stdout[indexes_at..queries_at];
        let query_section = stdout[queries_at..].replace('\r', "");

        let took = section_value(training, "Took:")
            .context("training section has no Took: line")?;
        let memory = section_value(training, "Memory:")
            .context("training section has no Memory: line")?;
        let size = section_value(indexes, "size:")
            .context("index section has no size: line")?;

        Ok(Self {
            creation_ms: units::parse_time(took).context("bad training time")?,
            memory_mb: units::parse_memory(memory).context("bad training memory")?,
            size_mb: units::parse_memory(size).context("bad index size")?,
            query_section,
        })
    }

    /// Query time for one shape, located by its query-file path. `None`
    /// means the engine printed no subsection for that file (the shape had
    /// no query file on this graph, not a failure).
    pub fn query_time_ms(&self, query_file: &str) -> Result<Option<f64>> {
        let marker = format!("{QUERY_HEADER} {query_file}");
        let start = match self.query_section.find(&marker) {
            Some(at) => at,
            None => return Ok(None),
        };

        let rest = &self.query_section[start..];
        let subsection = match rest.find("\n\n") {
            Some(end) => &rest[..end],
            None => rest,
        };

        let after_took = subsection
            .find("took:")
            .map(|at| &subsection[at + "took:".len()..])
            .with_context(|| format!("query subsection for {query_file:?} has no took: line"))?;
        let value = match after_took.find("min:") {
            Some(end) => &after_took[..end],
            None => after_took,
        };
        let value = value.replace('\n', "");

        units::parse_time(&value)
            .with_context(|| format!("bad query time for {query_file:?}"))
            .map(Some)
    }
}

/// The remainder of the first line containing `marker`, past the marker.
fn section_value<'a>(section: &'a str, marker: &str) -> Option<&'a str> {
    let at = section.find(marker)?;
    let rest = &section[at + marker.len()..];
    Some(rest.lines().next().unwrap_or(rest).trim())
}
