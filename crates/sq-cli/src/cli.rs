//! CLI configuration and settings management

use crate::{CliError, Result};
use serde::{Deserialize, Serialize};
use sq_core::diagnostics::DiagnosticDisplayOptions;
use std::path::{Path, PathBuf};

/// CLI configuration loaded from config files
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// Diagnostic rendering
    pub diagnostics: DiagnosticsConfig,

    /// Settings of `sq compile`
    pub compile: CompileConfig,

    /// How many failing cases a run tolerates
    pub errors: ErrorsConfig,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemplateName {
    #[default]
    Pretty,
    Plain,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiagnosticsConfig {
    /// `pretty` or `plain`
    pub template: TemplateName,

    /// Show info-level diagnostics
    pub verbose: bool,
}

impl DiagnosticsConfig {
    pub fn display_options(&self, verbose: bool) -> DiagnosticDisplayOptions {
        let verbose = verbose || self.verbose;
        match self.template {
            TemplateName::Pretty => DiagnosticDisplayOptions::pretty(verbose),
            TemplateName::Plain => DiagnosticDisplayOptions::plain(verbose),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompileConfig {
    /// Extension of the output file when `-o` is not given
    pub extension: String,

    /// Log the rendered IR of every unit
    pub print_ir: bool,
}

impl Default for CompileConfig {
    fn default() -> Self {
        Self {
            extension: "ir".to_string(),
            print_ir: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ErrorsConfig {
    /// Keep going after a case fails
    pub continue_on_error: bool,

    /// Stop after this many failed cases (0 = unlimited)
    pub max_errors: usize,
}

impl Default for ErrorsConfig {
    fn default() -> Self {
        Self {
            continue_on_error: true,
            max_errors: 0,
        }
    }
}

impl CliConfig {
    /// Load configuration from file, falling back to the standard locations
    /// and then to defaults. When several standard files exist the most
    /// local one wins.
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        if let Some(path) = config_path {
            return Self::load_from_file(path);
        }

        let mut candidates = Vec::new();
        if let Some(system) = Self::default_config_path() {
            candidates.push(system);
        }
        if let Some(home_dir) = dirs::home_dir() {
            candidates.push(home_dir.join(".sq.toml"));
        }
        candidates.push(PathBuf::from("sq.toml"));

        let mut config = Self::default();
        for candidate in candidates.iter().filter(|path| path.is_file()) {
            tracing::debug!("loading config from {}", candidate.display());
            config = Self::load_from_file(candidate)?;
        }
        Ok(config)
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            CliError::Config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;

        toml::from_str(&content).map_err(|e| {
            CliError::Config(format!("Failed to parse config file {}: {}", path.display(), e))
        })
    }

    /// Save configuration to file
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| CliError::Config(format!("Failed to serialize config: {}", e)))?;

        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| CliError::Config(format!("Failed to create config directory: {}", e)))?;
        }

        std::fs::write(path, content)
            .map_err(|e| CliError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    /// Get the default config file path for the current user
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("sq").join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sq_core::diagnostics::DiagnosticTemplate;

    #[test]
    fn partial_files_keep_defaults() -> Result<()> {
        let config: CliConfig = toml::from_str("[diagnostics]\ntemplate = \"plain\"\n")
            .map_err(|e| CliError::Config(e.to_string()))?;
        assert_eq!(config.diagnostics.template, TemplateName::Plain);
        assert_eq!(config.compile, CompileConfig::default());
        assert!(config.errors.continue_on_error);
        Ok(())
    }

    #[test]
    fn save_then_load() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("nested").join("sq.toml");
        let mut config = CliConfig::default();
        config.errors.max_errors = 3;
        config.save_to_file(&path)?;
        assert_eq!(CliConfig::load(Some(&path))?, config);
        Ok(())
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let err = CliConfig::load(Some(Path::new("/no/such/sq.toml"))).unwrap_err();
        assert!(matches!(err, CliError::Config(_)));
    }

    #[test]
    fn verbose_flag_overrides_config() {
        let options = DiagnosticsConfig::default().display_options(true);
        assert_eq!(options.template, DiagnosticTemplate::Pretty);
        assert!(options.verbose_info);
    }
}
