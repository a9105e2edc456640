//! Loading and saving of the documents exchanged with the surrounding tooling.
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use serde::de::DeserializeOwned;
use walkdir::WalkDir;
use super::containers::{EntityObservations, ResultsDocument, UNKNOWN_LABEL};
use super::error::Result;

/// File extension of the captures picked up by [find_captures].
pub const CAPTURE_EXTENSION: &str = "pcap";

fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    log::info!("Reading {}", path.display());
    let contents = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&contents)?)
}

/// Capture-name prefix to ground-truth label.
pub fn load_label_assignments(path: &Path) -> Result<HashMap<String, String>> {
    load_json(path)
}

pub fn load_results(path: &Path) -> Result<ResultsDocument> {
    load_json(path)
}

pub fn load_observations(path: &Path) -> Result<Vec<EntityObservations>> {
    load_json(path)
}

/// Recursively collects capture files under `dir`, sorted by path.
pub fn find_captures(dir: &Path) -> Result<Vec<PathBuf>> {
    log::info!("Collecting captures under {}", dir.display());
    let mut captures = Vec::new();

    for entry in WalkDir::new(dir) {
        let entry = entry?;
        if entry.file_type().is_file()
            && entry.path().extension().and_then(|ext| ext.to_str()) == Some(CAPTURE_EXTENSION)
        {
            captures.push(entry.into_path());
        }
    }

    captures.sort();
    Ok(captures)
}

/// Ground truth for a capture, looked up by the part of its file name before the first `-`.
///
/// Captures with no matching assignment are `Unknown`.
pub fn label_for_capture(capture: &Path, assignments: &HashMap<String, String>) -> String {
    let name = capture.file_name().and_then(|n| n.to_str()).unwrap_or_default();
    let prefix = name.split('-').next().unwrap_or_default();

    assignments
        .get(prefix)
        .cloned()
        .unwrap_or_else(|| UNKNOWN_LABEL.to_string())
}

/// Re-derives every sample's ground truth from its id, treated as a capture path.
pub fn relabel(results: &mut ResultsDocument, assignments: &HashMap<String, String>) {
    for (id, sample) in results.samples.iter_mut() {
        sample.label = label_for_capture(Path::new(id), assignments);
        log::debug!("{id} labelled {}", sample.label);
    }
}
