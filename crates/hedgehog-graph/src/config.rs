//! Snapshot configuration loaded from `hedgehog.toml`.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use hedgehog_dap::{clamp_memory_read_size, DEFAULT_MEMORY_READ_SIZE};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::policy::{PolicyPreset, VariablePolicy};

pub(crate) const CONFIG_FILES: &[&str] = &["hedgehog.toml", ".hedgehog.toml"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VisualizationMode {
    #[default]
    #[serde(alias = "block-diagram")]
    MemoryBlocks,
    #[serde(alias = "directed-graph")]
    Graph,
}

impl VisualizationMode {
    pub fn as_str(self) -> &'static str {
        match self {
            VisualizationMode::MemoryBlocks => "memory-blocks",
            VisualizationMode::Graph => "graph",
        }
    }
}

impl fmt::Display for VisualizationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VisualizationMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "memory-blocks" | "block-diagram" => Ok(VisualizationMode::MemoryBlocks),
            "graph" | "directed-graph" => Ok(VisualizationMode::Graph),
            other => Err(format!(
                "unknown visualization mode '{other}' (expected 'memory-blocks' or 'graph')"
            )),
        }
    }
}

/// Options read once per build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphOptions {
    pub show_memory_addresses: bool,
    /// Already clamped to `[1, 256]`.
    pub memory_read_size: usize,
    pub hide_internal_variables: bool,
    pub visualization_mode: VisualizationMode,
}

impl Default for GraphOptions {
    fn default() -> Self {
        Self {
            show_memory_addresses: false,
            memory_read_size: DEFAULT_MEMORY_READ_SIZE,
            hide_internal_variables: true,
            visualization_mode: VisualizationMode::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HedgehogConfig {
    pub config_path: Option<PathBuf>,
    pub graph: GraphOptions,
    pub preset: PolicyPreset,
    pub policy: VariablePolicy,
}

impl HedgehogConfig {
    /// Looks for a config file in `root`; missing or broken files fall back to defaults.
    pub fn load(root: &Path) -> Self {
        match find_config_file(root) {
            Some(path) => Self::load_file(&path),
            None => Self::default(),
        }
    }

    pub fn load_file(path: &Path) -> Self {
        let config_path = Some(path.to_path_buf());
        let Ok(contents) = std::fs::read_to_string(path) else {
            warn!("Failed to read hedgehog config at {}", path.display());
            return Self {
                config_path,
                ..Self::default()
            };
        };
        Self::from_contents(config_path, &contents)
    }

    pub fn from_contents(config_path: Option<PathBuf>, contents: &str) -> Self {
        let mut config = Self {
            config_path,
            ..Self::default()
        };
        let parsed: ConfigFile = match toml::from_str(contents) {
            Ok(parsed) => parsed,
            Err(err) => {
                if let Some(path) = &config.config_path {
                    warn!(
                        "Failed to parse hedgehog config at {}: {err}",
                        path.display()
                    );
                } else {
                    warn!("Failed to parse hedgehog config: {err}");
                }
                return config;
            }
        };

        let graph = parsed.graph;
        if let Some(show) = graph.show_memory_addresses {
            config.graph.show_memory_addresses = show;
        }
        config.graph.memory_read_size = clamp_memory_read_size(graph.memory_read_size);
        if let Some(hide) = graph.hide_internal_variables {
            config.graph.hide_internal_variables = hide;
        }
        if let Some(mode) = graph.visualization_mode {
            config.graph.visualization_mode = mode;
        }

        config.preset = parsed.filter.preset.unwrap_or_default();
        config.policy = VariablePolicy::for_preset(config.preset)
            .with_internal_names(parsed.filter.extra_internal_names);
        config
    }

    /// Snapshot of the options for one build.
    pub fn graph_options(&self) -> GraphOptions {
        self.graph.clone()
    }
}

pub(crate) fn find_config_file(root: &Path) -> Option<PathBuf> {
    CONFIG_FILES
        .iter()
        .map(|name| root.join(name))
        .find(|path| path.is_file())
}

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    graph: GraphSection,
    #[serde(default)]
    filter: FilterSection,
}

#[derive(Debug, Default, Deserialize)]
struct GraphSection {
    show_memory_addresses: Option<bool>,
    memory_read_size: Option<f64>,
    hide_internal_variables: Option<bool>,
    visualization_mode: Option<VisualizationMode>,
}

#[derive(Debug, Default, Deserialize)]
struct FilterSection {
    preset: Option<PolicyPreset>,
    #[serde(default)]
    extra_internal_names: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_dir(prefix: &str) -> PathBuf {
        let stamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let dir = std::env::temp_dir().join(format!("{prefix}-{stamp}"));
        fs::create_dir_all(&dir).expect("create temp dir");
        dir
    }

    #[test]
    fn defaults_match_host_settings() {
        let options = HedgehogConfig::default().graph_options();
        assert!(!options.show_memory_addresses);
        assert_eq!(options.memory_read_size, 64);
        assert!(options.hide_internal_variables);
        assert_eq!(options.visualization_mode, VisualizationMode::MemoryBlocks);
    }

    #[test]
    fn parses_graph_and_filter_sections() {
        let config = HedgehogConfig::from_contents(
            None,
            r#"
[graph]
show_memory_addresses = true
memory_read_size = 1000
hide_internal_variables = false
visualization_mode = "graph"

[filter]
preset = "generic"
extra_internal_names = ["_vptr"]
"#,
        );
        let options = config.graph_options();
        assert!(options.show_memory_addresses);
        assert_eq!(options.memory_read_size, 256);
        assert!(!options.hide_internal_variables);
        assert_eq!(options.visualization_mode, VisualizationMode::Graph);
        assert_eq!(config.preset, PolicyPreset::Generic);
        assert_eq!(config.policy.internal_names().collect::<Vec<_>>(), ["_vptr"]);
    }

    #[test]
    fn memory_read_size_is_clamped() {
        for (raw, expected) in [("0", 64), ("-3", 64), ("0.4", 1), ("1.9", 1), ("17.5", 17)] {
            let config = HedgehogConfig::from_contents(
                None,
                &format!("[graph]\nmemory_read_size = {raw}\n"),
            );
            assert_eq!(config.graph.memory_read_size, expected, "{raw}");
        }
    }

    #[test]
    fn invalid_config_falls_back_to_defaults() {
        let config = HedgehogConfig::from_contents(
            Some(PathBuf::from("hedgehog.toml")),
            "[graph]\nvisualization_mode = \"sankey\"\n",
        );
        assert_eq!(config.graph, GraphOptions::default());
        assert_eq!(config.policy, VariablePolicy::python());
    }

    #[test]
    fn load_finds_dotfile_in_root() {
        let root = temp_dir("hedgehog-config");
        fs::write(
            root.join(".hedgehog.toml"),
            "[graph]\nvisualization_mode = \"directed-graph\"\n",
        )
        .unwrap();
        let config = HedgehogConfig::load(&root);
        assert_eq!(config.config_path, Some(root.join(".hedgehog.toml")));
        assert_eq!(config.graph.visualization_mode, VisualizationMode::Graph);

        let empty = temp_dir("hedgehog-config-empty");
        assert_eq!(HedgehogConfig::load(&empty), HedgehogConfig::default());
        fs::remove_dir_all(root).ok();
        fs::remove_dir_all(empty).ok();
    }

    #[test]
    fn visualization_mode_parses_from_cli_text() {
        assert_eq!("graph".parse(), Ok(VisualizationMode::Graph));
        assert_eq!("block-diagram".parse(), Ok(VisualizationMode::MemoryBlocks));
        assert!("pie".parse::<VisualizationMode>().is_err());
    }
}
