use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use nsd_core::{Node, NodeData};

#[derive(Debug, Deserialize)]
struct TreeFile {
    nodes: Vec<Node>,
}

fn parse<T: serde::de::DeserializeOwned>(path: &Path, text: &str) -> Result<T> {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("json") => {
            serde_json::from_str(text).with_context(|| format!("parsing '{}'", path.display()))
        }
        _ => serde_yaml::from_str(text).with_context(|| format!("parsing '{}'", path.display())),
    }
}

/// Loads the scenario tree node records (YAML, or JSON by extension).
pub fn load_tree(path: &Path) -> Result<Vec<Node>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("reading tree file '{}'", path.display()))?;
    let file: TreeFile = parse(path, &text)?;
    Ok(file.nodes)
}

/// Loads the tree-wide general data.
pub fn load_data(path: &Path) -> Result<NodeData> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("reading data file '{}'", path.display()))?;
    parse(path, &text)
}
