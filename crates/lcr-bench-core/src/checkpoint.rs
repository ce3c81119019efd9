//! Persistent sweep cursor.
//!
//! One flat `name\tvalue` file holds the nested-loop position of an
//! in-progress sweep. The file is overwritten whole before every cell and
//! deleted on successful completion; "last full write wins" is the only
//! durability guarantee.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

pub struct CheckpointStore {
    file: PathBuf,
}

impl CheckpointStore {
    /// Open (creating the state directory if needed) the checkpoint under
    /// `state_dir/last.tsv`.
    pub fn open(state_dir: &Path) -> Result<Self> {
        fs::create_dir_all(state_dir)
            .with_context(|| format!("failed to create state dir {}", state_dir.display()))?;
        Ok(Self {
            file: state_dir.join("last.tsv"),
        })
    }

    pub fn save(&self, cursor: &BTreeMap<String, usize>) -> Result<()> {
        let mut out = String::new();
        for (name, value) in cursor {
            out.push_str(name);
            out.push('\t');
            out.push_str(&value.to_string());
            out.push('\n');
        }
        fs::write(&self.file, out)
            .with_context(|| format!("failed to write checkpoint {}", self.file.display()))
    }

    pub fn exists(&self) -> bool {
        self.file.exists()
    }

    pub fn load(&self) -> Result<BTreeMap<String, usize>> {
        let text = fs::read_to_string(&self.file)
            .with_context(|| format!("failed to read checkpoint {}", self.file.display()))?;

        let mut cursor = BTreeMap::new();
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let (name, value) = line
                .split_once('\t')
                .with_context(|| format!("malformed checkpoint line: {line:?}"))?;
            let value: usize = value
                .trim()
                .parse()
                .with_context(|| format!("malformed cursor value in line: {line:?}"))?;
            cursor.insert(name.to_string(), value);
        }
        Ok(cursor)
    }

    pub fn clear(&self) -> Result<()> {
        fs::remove_file(&self.file)
            .with_context(|| format!("failed to remove checkpoint {}", self.file.display()))
    }
}
