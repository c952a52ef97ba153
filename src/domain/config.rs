use std::path::Path;

use serde::{Deserialize, Serialize};

/// Configuration for fault-mechanism analysis.
///
/// This struct holds the resource bounds and behavioural switches applied to
/// every analysis run. Values are read from a versioned TOML file; anything
/// not present falls back to its default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Versions", into = "Versions")]
pub struct AnalysisConfig {
    /// Upper bound on the number of minimal cut sets held at any gate.
    ///
    /// A gate whose expansion would exceed this bound is excluded from the
    /// tree with a warning. If the top event itself exceeds the bound the
    /// analysis fails.
    max_cut_sets: usize,

    /// Upper bound on the number of inclusion–exclusion terms.
    ///
    /// Exact evaluation over `n` cut sets enumerates `2^n - 1` terms. Beyond
    /// this bound the rare-event approximation is used instead.
    exact_combination_limit: u64,

    /// How long a single trigger evaluation may run, in milliseconds.
    trigger_timeout_ms: u64,

    /// Maximum depth of a synthesized fault tree.
    max_tree_depth: usize,

    /// Maximum number of nodes in a synthesized fault tree.
    max_tree_nodes: usize,

    /// Whether undeclared module failures are developed from the failure
    /// modes of the interfaces connected to the module.
    ///
    /// When `false` (default): a module without a cause declaration is an
    /// undeveloped event and contributes nothing.
    ///
    /// When `true`: a module without a cause declaration fails if any of its
    /// connected interfaces fails.
    pub infer_module_causes: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            max_cut_sets: default_max_cut_sets(),
            exact_combination_limit: default_exact_combination_limit(),
            trigger_timeout_ms: default_trigger_timeout_ms(),
            max_tree_depth: default_max_tree_depth(),
            max_tree_nodes: default_max_tree_nodes(),
            infer_module_causes: false,
        }
    }
}

impl AnalysisConfig {
    /// Loads the configuration from a TOML file at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or if the TOML content is
    /// invalid.
    pub fn load(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file: {e}"))?;
        toml::from_str(&content).map_err(|e| format!("Failed to parse config file: {e}"))
    }

    /// Saves the configuration to a TOML file at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be serialized to TOML or if
    /// the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<(), String> {
        let content =
            toml::to_string_pretty(self).map_err(|e| format!("Failed to serialize config: {e}"))?;
        std::fs::write(path, content).map_err(|e| format!("Failed to write config file: {e}"))
    }

    /// Returns the cut-set bound per gate.
    #[must_use]
    pub const fn max_cut_sets(&self) -> usize {
        self.max_cut_sets
    }

    /// Returns the inclusion–exclusion term bound.
    #[must_use]
    pub const fn exact_combination_limit(&self) -> u64 {
        self.exact_combination_limit
    }

    /// Returns the per-expression trigger timeout.
    #[must_use]
    pub const fn trigger_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.trigger_timeout_ms)
    }

    /// Returns the maximum fault tree depth.
    #[must_use]
    pub const fn max_tree_depth(&self) -> usize {
        self.max_tree_depth
    }

    /// Returns the maximum number of fault tree nodes.
    #[must_use]
    pub const fn max_tree_nodes(&self) -> usize {
        self.max_tree_nodes
    }

    /// Sets the cut-set bound. Values below one are raised to one.
    #[must_use]
    pub fn with_max_cut_sets(mut self, value: usize) -> Self {
        self.max_cut_sets = value.max(1);
        self
    }

    /// Sets the inclusion–exclusion term bound.
    #[must_use]
    pub const fn with_exact_combination_limit(mut self, value: u64) -> Self {
        self.exact_combination_limit = value;
        self
    }

    /// Sets the trigger timeout in milliseconds.
    #[must_use]
    pub const fn with_trigger_timeout_ms(mut self, value: u64) -> Self {
        self.trigger_timeout_ms = value;
        self
    }

    /// Sets the maximum tree depth. Values below one are raised to one.
    #[must_use]
    pub fn with_max_tree_depth(mut self, value: usize) -> Self {
        self.max_tree_depth = value.max(1);
        self
    }

    /// Sets the node bound. Values below one are raised to one.
    #[must_use]
    pub fn with_max_tree_nodes(mut self, value: usize) -> Self {
        self.max_tree_nodes = value.max(1);
        self
    }

    /// Sets the `infer_module_causes` option.
    pub const fn set_infer_module_causes(&mut self, value: bool) {
        self.infer_module_causes = value;
    }
}

const fn default_max_cut_sets() -> usize {
    10_000
}

const fn default_exact_combination_limit() -> u64 {
    1 << 20
}

const fn default_trigger_timeout_ms() -> u64 {
    1_000
}

const fn default_max_tree_depth() -> usize {
    64
}

const fn default_max_tree_nodes() -> usize {
    100_000
}

/// The serialized versions of the configuration.
/// This allows for future changes to the configuration format and to the domain
/// type without breaking compatibility.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "_version")]
enum Versions {
    #[serde(rename = "1")]
    V1 {
        #[serde(default = "default_max_cut_sets")]
        max_cut_sets: usize,

        /// Number of inclusion–exclusion terms above which the rare-event
        /// approximation is used.
        #[serde(default = "default_exact_combination_limit")]
        exact_combination_limit: u64,

        #[serde(default = "default_trigger_timeout_ms")]
        trigger_timeout_ms: u64,

        #[serde(default = "default_max_tree_depth")]
        max_tree_depth: usize,

        #[serde(default = "default_max_tree_nodes")]
        max_tree_nodes: usize,

        #[serde(default)]
        infer_module_causes: bool,
    },
}

impl From<Versions> for AnalysisConfig {
    fn from(versions: Versions) -> Self {
        match versions {
            Versions::V1 {
                max_cut_sets,
                exact_combination_limit,
                trigger_timeout_ms,
                max_tree_depth,
                max_tree_nodes,
                infer_module_causes,
            } => Self {
                max_cut_sets: max_cut_sets.max(1),
                exact_combination_limit,
                trigger_timeout_ms,
                max_tree_depth: max_tree_depth.max(1),
                max_tree_nodes: max_tree_nodes.max(1),
                infer_module_causes,
            },
        }
    }
}

impl From<AnalysisConfig> for Versions {
    fn from(config: AnalysisConfig) -> Self {
        Self::V1 {
            max_cut_sets: config.max_cut_sets,
            exact_combination_limit: config.exact_combination_limit,
            trigger_timeout_ms: config.trigger_timeout_ms,
            max_tree_depth: config.max_tree_depth,
            max_tree_nodes: config.max_tree_nodes,
            infer_module_causes: config.infer_module_causes,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn load_reads_valid_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(
            b"_version = \"1\"\nmax_cut_sets = 50\nexact_combination_limit = 4096\ntrigger_timeout_ms = 250\ninfer_module_causes = true\n",
        )
        .unwrap();

        let config = AnalysisConfig::load(file.path()).unwrap();

        assert_eq!(config.max_cut_sets(), 50);
        assert_eq!(config.exact_combination_limit(), 4096);
        assert_eq!(config.trigger_timeout().as_millis(), 250);
        assert_eq!(config.max_tree_depth(), 64);
        assert_eq!(config.max_tree_nodes(), 100_000);
        assert!(config.infer_module_causes);
    }

    #[test]
    fn load_missing_file_returns_error() {
        let tmp = tempfile::tempdir().unwrap();
        let missing = tmp.path().join("missing.toml");

        let error = AnalysisConfig::load(&missing).unwrap_err();
        assert!(error.starts_with("Failed to read config file:"));
    }

    #[test]
    fn load_invalid_toml_returns_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"_version = \"1\"\nmax_cut_sets = \"many\"\n")
            .unwrap();

        let error = AnalysisConfig::load(file.path()).unwrap_err();
        assert!(error.starts_with("Failed to parse config file:"));
    }

    #[test]
    fn empty_file_returns_default() {
        let expected = AnalysisConfig::default();
        let actual: AnalysisConfig = toml::from_str(r#"_version = "1""#).unwrap();
        assert_eq!(actual, expected);
    }

    #[test]
    fn save_then_load_preserves_settings() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("faultline.toml");
        let config = AnalysisConfig::default()
            .with_max_cut_sets(0)
            .with_trigger_timeout_ms(10);

        config.save(&path).unwrap();
        let loaded = AnalysisConfig::load(&path).unwrap();

        assert_eq!(loaded.max_cut_sets(), 1);
        assert_eq!(loaded, config);
    }
}
