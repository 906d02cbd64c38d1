use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Deserialize, Serialize, Debug, Clone, Copy, JsonSchema, PartialEq)]
/// Output format of the engine logs.
pub enum LoggerConfigFormat {
  /// Minimal, compact logs. Focuses on the message and its fields, suitable for production
  /// environments where log size matters.
  #[serde(rename = "compact")]
  #[schemars(title = "compact")]
  Compact,

  /// Human-readable output with well-formatted fields and context. Ideal for development and
  /// debugging of resolvers.
  #[serde(rename = "pretty")]
  #[schemars(title = "pretty")]
  Pretty,

  /// Structured JSON logs, for log aggregators and analysis systems.
  #[serde(rename = "json")]
  #[schemars(title = "json")]
  Json,
}

impl Default for LoggerConfigFormat {
  // In development, we wish to see some more details and code locations.
  #[cfg(debug_assertions)]
  fn default() -> Self {
    LoggerConfigFormat::Pretty
  }

  #[cfg(not(debug_assertions))]
  fn default() -> Self {
    if atty::is(atty::Stream::Stdout) {
      LoggerConfigFormat::Compact
    } else {
      LoggerConfigFormat::Json
    }
  }
}
