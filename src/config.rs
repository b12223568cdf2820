//! Configuration file support for service-depgraph
//!
//! Settings are read from a `.depgraph.toml` (or `depgraph.toml`) found in the
//! input's directory or any parent directory.
//!
//! ## Configuration File Format
//!
//! ```toml
//! # .depgraph.toml
//!
//! [layout]
//! # Gap between nodes of the same rank
//! node_sep = 30
//! # Gap between ranks
//! rank_sep = 200
//! # "LR" (left to right) or "TB" (top to bottom)
//! rank_dir = "LR"
//!
//! [graph]
//! # What to do with repeated parent -> child links: "aggregate", "overwrite" or "reject"
//! duplicate_edges = "aggregate"
//!
//! [classes]
//! # CSS classes toggled on hover
//! dimmed = "dark"
//! node_highlight = "hover"
//! edge_highlight = "hover-edge"
//!
//! [page]
//! title = "Service Dependencies"
//! # id of the <svg> element the diagram is drawn into
//! target_id = "dependency-graph"
//! # Custom HTML template (default: built-in page)
//! template = "templates/deps.html"
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::graph::DuplicateEdgePolicy;
use crate::interaction::ClassNames;
use crate::layout::LayoutConfig;
use crate::render::DEFAULT_TARGET_ID;

/// Errors that can occur when loading configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid config value: {0}")]
    InvalidValue(String),
}

/// Graph assembly section
#[derive(Debug, Clone, Deserialize, Default)]
pub struct GraphConfig {
    #[serde(default)]
    pub duplicate_edges: DuplicateEdgePolicy,
}

/// Host page section
#[derive(Debug, Clone, Deserialize)]
pub struct PageConfig {
    #[serde(default = "default_title")]
    pub title: String,

    #[serde(default = "default_target_id")]
    pub target_id: String,

    /// Custom page template; relative paths resolve against the config file
    #[serde(default)]
    pub template: Option<PathBuf>,
}

fn default_title() -> String {
    "Service Dependencies".to_string()
}

fn default_target_id() -> String {
    DEFAULT_TARGET_ID.to_string()
}

impl Default for PageConfig {
    fn default() -> Self {
        Self {
            title: default_title(),
            target_id: default_target_id(),
            template: None,
        }
    }
}

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Default)]
pub struct DepgraphConfig {
    #[serde(default)]
    pub layout: LayoutConfig,

    #[serde(default)]
    pub graph: GraphConfig,

    #[serde(default)]
    pub classes: ClassNames,

    #[serde(default)]
    pub page: PageConfig,
}

impl DepgraphConfig {
    /// Parse configuration text and check its values
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: DepgraphConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("layout.node_sep", self.layout.node_sep),
            ("layout.rank_sep", self.layout.rank_sep),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::InvalidValue(format!(
                    "{} must be a non-negative number, got {}",
                    name, value
                )));
            }
        }

        if self.page.target_id.is_empty()
            || self
                .page
                .target_id
                .contains(|c: char| c.is_whitespace() || matches!(c, '"' | '\'' | '<' | '>' | '&'))
        {
            return Err(ConfigError::InvalidValue(format!(
                "page.target_id must be a non-empty id without spaces, quotes, '<', '>' or '&', got {:?}",
                self.page.target_id
            )));
        }

        for (name, class) in [
            ("classes.dimmed", &self.classes.dimmed),
            ("classes.node_highlight", &self.classes.node_highlight),
            ("classes.edge_highlight", &self.classes.edge_highlight),
        ] {
            if class.is_empty() || class.contains(char::is_whitespace) {
                return Err(ConfigError::InvalidValue(format!(
                    "{} must be a single class name, got {:?}",
                    name, class
                )));
            }
        }

        Ok(())
    }
}

/// Load configuration for an input path
///
/// Searches for `.depgraph.toml` in the given directory and parent directories.
/// Returns the defaults when no file is found.
pub fn load_config(start_path: &Path) -> Result<DepgraphConfig, ConfigError> {
    match find_config_file(start_path) {
        Some(path) => load_config_file(&path),
        None => Ok(DepgraphConfig::default()),
    }
}

/// Load one specific configuration file
pub fn load_config_file(path: &Path) -> Result<DepgraphConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let mut config = DepgraphConfig::from_toml(&content)?;

    if let Some(dir) = path.parent() {
        config.page.template = config
            .page
            .template
            .take()
            .map(|template| if template.is_relative() { dir.join(template) } else { template });
    }

    Ok(config)
}

/// Find the config file by searching up the directory tree
pub fn find_config_file(start_path: &Path) -> Option<PathBuf> {
    let config_names = [".depgraph.toml", "depgraph.toml"];

    let mut current = if start_path.is_file() {
        start_path.parent()?.to_path_buf()
    } else {
        start_path.to_path_buf()
    };

    loop {
        for name in &config_names {
            let config_path = current.join(name);
            if config_path.exists() {
                return Some(config_path);
            }
        }

        // Move to parent directory
        if let Some(parent) = current.parent() {
            current = parent.to_path_buf();
        } else {
            break;
        }
    }

    None
}
