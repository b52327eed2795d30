use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::Context as _;
use serde::Deserialize;
use url::Url;

/// Directory layout and server settings, read from `config.toml` at the site
/// root. Every field has a default so a bare directory is a valid site.
#[derive(Deserialize)]
#[serde(default)]
pub struct Config {
    pub base_url: Url,
    pub data_dir: String,
    pub templates_dir: String,
    pub assets_dir: String,
    pub output_dir: String,
    pub port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: Url::parse("http://localhost:8000/").expect("literal URL"),
            data_dir: "data".to_string(),
            templates_dir: "templates".to_string(),
            assets_dir: "assets".to_string(),
            output_dir: ".".to_string(),
            port: 8000,
        }
    }
}

impl Config {
    /// Absolute URL for a rendered page; `index.html` collapses to the root.
    pub fn page_url(&self, path: &str) -> anyhow::Result<Url> {
        let escaped = path.strip_suffix("index.html").unwrap_or(path);
        self.base_url
            .join(escaped)
            .with_context(|| format!("building URL for {path}"))
    }
}

pub struct Context {
    home: PathBuf,
    pub config: Config,
}

impl Context {
    pub fn new(home: PathBuf) -> anyhow::Result<Self> {
        let config_file = home.join("config.toml");

        let config = if config_file.exists() {
            let config_text = fs::read_to_string(&config_file)
                .with_context(|| format!("reading {}", config_file.display()))?;
            toml::from_str(&config_text)
                .with_context(|| format!("parsing {}", config_file.display()))?
        } else {
            Config::default()
        };

        Ok(Self { home, config })
    }

    /// Command-line override for where rendered pages land.
    pub fn with_output_dir(mut self, output_dir: Option<String>) -> Self {
        if let Some(dir) = output_dir {
            self.config.output_dir = dir;
        }
        self
    }

    fn absolute<P: AsRef<Path>>(&self, path: P) -> PathBuf {
        self.home.join(path.as_ref())
    }

    pub fn data_dir(&self) -> PathBuf {
        self.absolute(&self.config.data_dir)
    }

    pub fn templates_dir(&self) -> PathBuf {
        self.absolute(&self.config.templates_dir)
    }

    pub fn assets_dir(&self) -> PathBuf {
        self.absolute(&self.config.assets_dir)
    }

    pub fn output_dir(&self) -> PathBuf {
        self.absolute(&self.config.output_dir)
    }
}
