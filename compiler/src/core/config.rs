use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::filters::{
    Combinator, Convert, DEFAULT_PLACEHOLDER_PREFIX, FilterCompiler, FilterDescriptor,
    FilterError, FilterKind, FilterSet,
};

use super::cli::CliConfig;
use super::constants::CONFIG_FILE_NAME;

// =============================================================================
// File Config Structures
// =============================================================================

/// One filter as declared in a configuration file
#[derive(Debug, Deserialize)]
pub struct DescriptorFileConfig {
    #[serde(rename = "type")]
    pub kind: FilterKind,
    #[serde(default)]
    pub field: String,
    pub convert: Option<String>,
    pub class_name: Option<String>,
    #[serde(flatten)]
    pub extra: Value,
}

impl DescriptorFileConfig {
    fn into_descriptor(self, name: &str) -> Result<FilterDescriptor, FilterError> {
        if self.kind == FilterKind::Custom {
            return Err(FilterError::Config(format!(
                "filter '{}': custom filters need a generator function and must be registered in code",
                name
            )));
        }
        if self.kind != FilterKind::Passthrough && self.field.trim().is_empty() {
            return Err(FilterError::Config(format!(
                "filter '{}': 'field' is required for {} filters",
                name, self.kind
            )));
        }
        warn_unknown(&self.extra, &format!("filters.{}", name));

        let mut descriptor = match self.kind {
            FilterKind::Reference => FilterDescriptor::reference(&self.field),
            FilterKind::PolymorphicReference => FilterDescriptor::polymorphic_reference(&self.field),
            FilterKind::MappedList => FilterDescriptor::mapped_list(&self.field),
            FilterKind::TimestampRange => FilterDescriptor::timestamp_range(&self.field),
            FilterKind::Passthrough | FilterKind::Custom => FilterDescriptor::passthrough(),
        };

        if let Some(convert) = self.convert {
            let convert = Convert::from_name(&convert).ok_or_else(|| {
                FilterError::Config(format!(
                    "filter '{}': unknown convert '{}'. Valid options: identity, integer, string, downcase, upcase",
                    name, convert
                ))
            })?;
            descriptor = descriptor.with_convert(convert);
        }
        if let Some(class_name) = self.class_name {
            descriptor = descriptor.with_class_name(&class_name);
        }
        Ok(descriptor)
    }
}

/// Filter configuration file contents
#[derive(Debug, Default, Deserialize)]
pub struct FilterConfigFile {
    pub placeholder_prefix: Option<String>,
    pub default_combinator: Option<Combinator>,
    #[serde(default)]
    pub filters: Map<String, Value>,
    #[serde(flatten)]
    pub extra: Value,
}

impl FilterConfigFile {
    /// Load configuration from a JSON file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        tracing::debug!(path = %path.display(), "Loading config file");
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config = Self::from_json_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        tracing::trace!(config = ?config, "Parsed config file");
        Ok(config)
    }

    pub fn from_json_str(content: &str) -> Result<Self, FilterError> {
        serde_json::from_str(content).map_err(|e| FilterError::Config(e.to_string()))
    }

    /// Warn about unknown fields in the config
    pub fn warn_unknown_fields(&self) {
        warn_unknown(&self.extra, "config");
    }

    /// Build the filter set, in file order
    pub fn filter_set(&self) -> Result<FilterSet, FilterError> {
        let mut filters = FilterSet::new();
        for (name, raw) in &self.filters {
            let file_config: DescriptorFileConfig = serde_json::from_value(raw.clone())
                .map_err(|e| FilterError::Config(format!("filter '{}': {}", name, e)))?;
            filters = filters.with(name, file_config.into_descriptor(name)?);
        }
        Ok(filters)
    }
}

fn warn_unknown(extra: &Value, scope: &str) {
    if let Value::Object(map) = extra
        && !map.is_empty()
    {
        let keys_str: String = map
            .keys()
            .map(|k| k.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        tracing::warn!(
            scope,
            fields = %keys_str,
            "Unknown fields in config file (possible typos)"
        );
    }
}

fn validate_prefix(prefix: &str) -> Result<(), FilterError> {
    let mut chars = prefix.chars();
    let valid = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !valid {
        return Err(FilterError::Config(format!(
            "Invalid placeholder prefix '{}'. Use letters, digits and underscores",
            prefix
        )));
    }
    Ok(())
}

// =============================================================================
// Application Config
// =============================================================================

/// Resolved configuration for one CLI run
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub config_path: PathBuf,
    pub filters: FilterSet,
    pub placeholder_prefix: String,
    pub default_combinator: Combinator,
}

impl AppConfig {
    /// Resolve the config path (CLI/env, then local file) and load it
    pub fn load(cli: &CliConfig) -> Result<Self> {
        tracing::debug!("Loading application configuration");
        tracing::trace!(cli = ?cli, "CLI config");

        let path = match cli.config {
            Some(ref path) => {
                if !path.exists() {
                    anyhow::bail!("Config file not found: {}", path.display());
                }
                path.clone()
            }
            None => {
                let local = PathBuf::from(CONFIG_FILE_NAME);
                if !local.exists() {
                    anyhow::bail!(
                        "No filter configuration. Pass --config or create {}",
                        CONFIG_FILE_NAME
                    );
                }
                local
            }
        };

        let file_config = FilterConfigFile::load_from_file(&path)?;
        file_config.warn_unknown_fields();
        Self::from_file_config(path, &file_config)
    }

    pub fn from_file_config(path: PathBuf, file_config: &FilterConfigFile) -> Result<Self> {
        let placeholder_prefix = file_config
            .placeholder_prefix
            .clone()
            .unwrap_or_else(|| DEFAULT_PLACEHOLDER_PREFIX.to_string());
        validate_prefix(&placeholder_prefix)?;

        let filters = file_config
            .filter_set()
            .with_context(|| format!("Invalid filter configuration: {}", path.display()))?;

        tracing::debug!(
            path = %path.display(),
            filters = filters.len(),
            "Filter configuration loaded"
        );

        Ok(Self {
            config_path: path,
            filters,
            placeholder_prefix,
            default_combinator: file_config.default_combinator.unwrap_or_default(),
        })
    }

    pub fn compiler(&self) -> FilterCompiler {
        FilterCompiler::new(self.filters.clone()).with_placeholder_prefix(&self.placeholder_prefix)
    }
}
