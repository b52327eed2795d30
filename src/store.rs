use std::{fs, io, io::Write as _, path::Path, path::PathBuf};

use anyhow::Context as _;
use serde_json::Value;
use tempfile::NamedTempFile;

pub const PROFILE: &str = "profile.json";
pub const NAVIGATION: &str = "navigation.json";
pub const PROJECTS: &str = "projects.json";
pub const BLOGS: &str = "blogs.json";
pub const TWEETS: &str = "tweets.json";

/// Named JSON documents on disk. The store parses but never validates shape;
/// an absent file reads back as an empty sequence.
#[derive(Clone)]
pub struct Store {
    data_dir: PathBuf,
}

impl Store {
    pub fn new(data_dir: PathBuf) -> Self {
        Self { data_dir }
    }

    pub fn load(&self, name: &str) -> anyhow::Result<Value> {
        let path = self.data_dir.join(name);

        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Ok(Value::Array(Vec::new()));
            }
            Err(e) => {
                return Err(e).with_context(|| format!("reading {}", path.display()));
            }
        };

        serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn save(&self, name: &str, document: &Value) -> anyhow::Result<()> {
        let text = serde_json::to_string_pretty(document)?;
        write_atomic(&self.data_dir.join(name), text.as_bytes())
    }
}

/// Write via a uniquely named sibling temp file and rename, so a reader never
/// observes a partially written file and concurrent writers never share a
/// temp path.
pub fn write_atomic(path: &Path, contents: &[u8]) -> anyhow::Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;

    let mut tmp = NamedTempFile::new_in(parent)
        .with_context(|| format!("creating temp file in {}", parent.display()))?;
    tmp.write_all(contents)
        .with_context(|| format!("writing temp file for {}", path.display()))?;
    tmp.persist(path)
        .with_context(|| format!("renaming into {}", path.display()))?;

    Ok(())
}
