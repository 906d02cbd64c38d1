use local_schema_logger::config::LoggerConfigFormat;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::{fs::read_to_string, path::Path};

/// Top-level configuration of a local schema engine instance.
///
/// The configuration can be written as JSON or YAML:
///
/// ```yaml
/// assumeLocal: false
/// directive: local
/// validateQuery: true
/// introspection: true
/// logger:
///   filter: local_schema_engine=debug
///   format: compact
/// ```
#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LocalSchemaConfig {
  /// Bypass delegation entirely and treat every field of every incoming document as local.
  #[serde(default)]
  pub assume_local: bool,
  /// Name of the marker directive that flags a field for local resolution.
  #[serde(default = "default_directive")]
  pub directive: String,
  /// Validate the local half of a document against the local schema before executing it.
  #[serde(default = "default_true")]
  pub validate_query: bool,
  /// Generate the `__schema` / `__type` meta-resolvers over the local schema.
  #[serde(default = "default_true")]
  pub introspection: bool,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  /// Logger configuration.
  pub logger: Option<LoggerConfig>,
}

impl Default for LocalSchemaConfig {
  fn default() -> Self {
    Self {
      assume_local: false,
      directive: default_directive(),
      validate_query: true,
      introspection: true,
      logger: None,
    }
  }
}

fn default_directive() -> String {
  "local".to_string()
}

fn default_true() -> bool {
  true
}

#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LoggerConfig {
  /// Environment filter configuration as a string, e.g. `info` or
  /// `local_schema_engine=debug,local_schema_engine::executor=trace`.
  ///
  /// See [tracing_subscriber::EnvFilter](https://docs.rs/tracing-subscriber/latest/tracing_subscriber/filter/struct.EnvFilter.html) for more information.
  #[serde(default = "default_log_filter")]
  pub filter: String,
  /// Configured the logger format: `pretty`, `compact` or `json`.
  #[serde(default)]
  pub format: LoggerConfigFormat,
  /// Emits `close` span events with timings for splitting, validation and execution.
  #[serde(default)]
  pub print_performance_info: bool,
}

impl Default for LoggerConfig {
  fn default() -> Self {
    Self {
      filter: default_log_filter(),
      format: LoggerConfigFormat::default(),
      print_performance_info: false,
    }
  }
}

fn default_log_filter() -> String {
  "info".to_string()
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
  #[error("failed to read config file \"{path}\"")]
  Read {
    path: String,
    source: std::io::Error,
  },
  #[error("unsupported config file extension: {0}")]
  UnsupportedExtension(String),
  #[error("failed to parse JSON config")]
  Json(#[from] serde_json::Error),
  #[error("failed to parse YAML config")]
  Yaml(#[from] serde_yaml::Error),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConfigFormat {
  Json,
  Yaml,
}

impl ConfigFormat {
  pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
    match path.extension().and_then(|ext| ext.to_str()) {
      Some("json") => Ok(ConfigFormat::Json),
      Some("yaml") | Some("yml") => Ok(ConfigFormat::Yaml),
      other => Err(ConfigError::UnsupportedExtension(
        other.unwrap_or_default().to_string(),
      )),
    }
  }
}

pub fn load_config(file_path: &str) -> Result<LocalSchemaConfig, ConfigError> {
  let path = Path::new(file_path);
  let format = ConfigFormat::from_path(path)?;
  let raw_contents = read_to_string(path).map_err(|source| ConfigError::Read {
    path: file_path.to_string(),
    source,
  })?;

  tracing::debug!("loaded config file {:?} as {:?}", file_path, format);

  parse_config_contents(&raw_contents, format)
}

pub fn parse_config_contents(
  contents: &str,
  format: ConfigFormat,
) -> Result<LocalSchemaConfig, ConfigError> {
  match format {
    ConfigFormat::Json => Ok(serde_json::from_str::<LocalSchemaConfig>(contents)?),
    ConfigFormat::Yaml => Ok(serde_yaml::from_str::<LocalSchemaConfig>(contents)?),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn defaults_from_empty_object() {
    let config = parse_config_contents("{}", ConfigFormat::Json).unwrap();
    assert_eq!(config, LocalSchemaConfig::default());
    assert_eq!(config.directive, "local");
    assert!(config.validate_query);
    assert!(config.introspection);
    assert!(!config.assume_local);
  }

  #[test]
  fn parses_yaml() {
    let config = parse_config_contents(
      r#"
assumeLocal: true
directive: client
validateQuery: false
logger:
  filter: debug
  format: json
"#,
      ConfigFormat::Yaml,
    )
    .unwrap();

    assert!(config.assume_local);
    assert_eq!(config.directive, "client");
    assert!(!config.validate_query);
    assert!(config.introspection);
    let logger = config.logger.unwrap();
    assert_eq!(logger.filter, "debug");
    assert_eq!(logger.format, LoggerConfigFormat::Json);
  }

  #[test]
  fn format_from_extension() {
    assert_eq!(
      ConfigFormat::from_path(Path::new("engine.yml")).unwrap(),
      ConfigFormat::Yaml
    );
    assert!(ConfigFormat::from_path(Path::new("engine.toml")).is_err());
  }

  #[test]
  fn generates_json_schema() {
    let schema = schemars::schema_for!(LocalSchemaConfig);
    let as_value = serde_json::to_value(&schema).unwrap();
    assert!(as_value["properties"]["validateQuery"].is_object());
  }
}
