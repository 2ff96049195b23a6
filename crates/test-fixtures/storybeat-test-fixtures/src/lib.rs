use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use once_cell::sync::Lazy;
use serde::de::DeserializeOwned;
use serde::Deserialize;

static MANIFEST: Lazy<Manifest> = Lazy::new(|| {
    let raw = include_str!("../../../../fixtures/manifest.json");
    serde_json::from_str(raw).expect("fixtures manifest should parse")
});

#[derive(Debug, Deserialize)]
struct Manifest {
    lines: HashMap<String, String>,
    beats: HashMap<String, String>,
    stages: HashMap<String, StageEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum StageEntry {
    Path(String),
    Detailed { path: String },
}

impl StageEntry {
    fn as_path(&self) -> &str {
        match self {
            StageEntry::Path(path) => path,
            StageEntry::Detailed { path } => path,
        }
    }
}

fn fixtures_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../../../fixtures")
}

fn resolve_path(rel: &str) -> PathBuf {
    fixtures_root().join(rel)
}

fn read_to_string(rel: &str) -> Result<String> {
    let path = resolve_path(rel);
    fs::read_to_string(&path)
        .with_context(|| format!("failed to read fixture at {}", path.display()))
}

fn load_json<T: DeserializeOwned>(rel: &str) -> Result<T> {
    let text = read_to_string(rel)?;
    serde_json::from_str(&text).with_context(|| format!("failed to parse JSON fixture {rel}"))
}

fn lookup<'a, T>(map: &'a HashMap<String, T>, kind: &str, name: &str) -> Result<&'a T> {
    map.get(name)
        .ok_or_else(|| anyhow!("unknown {kind} fixture '{name}'"))
}

/// Line tables: `{ "lines": [ { "id", "text", "anchor"? } ] }`.
pub mod lines {
    use super::*;

    pub fn keys() -> Vec<String> {
        MANIFEST.lines.keys().cloned().collect()
    }

    pub fn json(name: &str) -> Result<String> {
        let rel = lookup(&MANIFEST.lines, "line table", name)?;
        read_to_string(rel)
    }

    pub fn path(name: &str) -> Result<PathBuf> {
        let rel = lookup(&MANIFEST.lines, "line table", name)?;
        Ok(resolve_path(rel))
    }
}

/// Beat libraries: `{ "beats": [ ... ] }`.
pub mod beats {
    use super::*;

    pub fn keys() -> Vec<String> {
        MANIFEST.beats.keys().cloned().collect()
    }

    pub fn json(name: &str) -> Result<String> {
        let rel = lookup(&MANIFEST.beats, "beat library", name)?;
        read_to_string(rel)
    }

    pub fn load<T: DeserializeOwned>(name: &str) -> Result<T> {
        let rel = lookup(&MANIFEST.beats, "beat library", name)?;
        super::load_json(rel)
    }
}

/// Stage configs.
pub mod stages {
    use super::*;

    pub fn keys() -> Vec<String> {
        MANIFEST.stages.keys().cloned().collect()
    }

    pub fn json(name: &str) -> Result<String> {
        let entry = lookup(&MANIFEST.stages, "stage", name)?;
        read_to_string(entry.as_path())
    }

    pub fn load<T: DeserializeOwned>(name: &str) -> Result<T> {
        let entry = lookup(&MANIFEST.stages, "stage", name)?;
        super::load_json(entry.as_path())
    }

    pub fn path(name: &str) -> Result<PathBuf> {
        let entry = lookup(&MANIFEST.stages, "stage", name)?;
        Ok(resolve_path(entry.as_path()))
    }
}
