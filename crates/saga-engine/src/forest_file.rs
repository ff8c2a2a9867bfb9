//! Forest snapshot loading.
//!
//! A forest file is YAML with a single `trees` list of fully hydrated
//! [`EventTree`]s. Loading checks nothing beyond the shape; dangling
//! `next_events` references are reported as warnings and otherwise left to
//! the scheduler, which skips them when a branch is taken.

use std::collections::BTreeSet;
use std::path::Path;

use saga_types::{EventId, EventTree};
use serde::Deserialize;
use tracing::warn;

/// Errors that can occur when loading a forest file.
#[derive(Debug, thiserror::Error)]
pub enum ForestFileError {
    /// Failed to read the file from disk.
    #[error("failed to read forest file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse forest YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },
}

impl From<serde_yml::Error> for ForestFileError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

#[derive(Debug, Deserialize)]
struct ForestFile {
    #[serde(default)]
    trees: Vec<EventTree>,
}

/// Load every tree from `path`.
pub fn load(path: &Path) -> Result<Vec<EventTree>, ForestFileError> {
    let contents = std::fs::read_to_string(path)?;
    parse(&contents)
}

/// Parse a forest from a YAML string.
pub fn parse(yaml: &str) -> Result<Vec<EventTree>, ForestFileError> {
    let file: ForestFile = serde_yml::from_str(yaml)?;
    if file.trees.is_empty() {
        warn!("Forest file declares no trees");
    }
    for (event_id, target) in dangling_references(&file.trees) {
        warn!(%event_id, %target, "Branch schedules an event that no tree declares");
    }
    Ok(file.trees)
}

/// `(owner, target)` pairs where a branch of `owner` names an unknown event.
pub fn dangling_references(trees: &[EventTree]) -> Vec<(EventId, EventId)> {
    let nodes = || {
        trees
            .iter()
            .flat_map(|t| std::iter::once(&t.root_event).chain(t.all_events.iter()))
    };
    let known: BTreeSet<&EventId> = nodes().map(|n| &n.id).collect();

    let mut dangling = Vec::new();
    for node in nodes() {
        for next in node.branches.iter().flat_map(|b| b.next_events.iter()) {
            if !known.contains(&next.event_id) {
                dangling.push((node.id.clone(), next.event_id.clone()));
            }
        }
    }
    dangling
}
