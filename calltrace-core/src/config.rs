use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

use crate::attributes::DEFAULT_SDK_NAME;
use crate::error::CallTraceError;
use crate::serializer::{Serializer, DEFAULT_MAX_DEPTH};

fn default_sdk_name() -> String {
    DEFAULT_SDK_NAME.to_string()
}
fn default_true() -> bool {
    true
}
fn default_max_depth() -> usize {
    DEFAULT_MAX_DEPTH
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct SdkCfg {
    /// Written to `sdk.name` on every span.
    #[serde(default = "default_sdk_name")]
    pub name: String,
}

impl Default for SdkCfg {
    fn default() -> Self {
        Self {
            name: default_sdk_name(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct TracingCfg {
    /// Capture `call.inputs`. Individual adapter targets can still opt out.
    #[serde(default = "default_true")]
    pub trace_input: bool,
    /// Capture `call.outputs`. Usage attributes are written either way.
    #[serde(default = "default_true")]
    pub trace_output: bool,
}

impl Default for TracingCfg {
    fn default() -> Self {
        Self {
            trace_input: true,
            trace_output: true,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct SerializerCfg {
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
}

impl Default for SerializerCfg {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct AdapterCfg {
    /// Adapter name, e.g. `cohere` or `langchain_core`.
    pub provider: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Library version reported as `service.version`.
    #[serde(default)]
    pub version: Option<String>,
    /// Regexes matched against `module.method`; matching targets are not instrumented.
    #[serde(default)]
    pub exclude: Vec<String>,
}

impl AdapterCfg {
    pub fn new(provider: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            enabled: true,
            version: None,
            exclude: Vec::new(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Default)]
pub struct Config {
    #[serde(default)]
    pub sdk: SdkCfg,
    #[serde(default)]
    pub tracing: TracingCfg,
    #[serde(default)]
    pub serializer: SerializerCfg,
    #[serde(default)]
    pub adapters: Vec<AdapterCfg>,
}

impl Config {
    /// Load a Config from a file path (JSON or TOML by extension). If the
    /// extension is missing or unrecognized, try JSON first, then TOML.
    pub fn from_path<P: AsRef<Path>>(path: P) -> crate::error::CoreResult<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(CallTraceError::from)?;
        let s = std::str::from_utf8(&bytes).map_err(|e| CallTraceError::Other(e.into()))?;
        let invalid = |message: String| CallTraceError::Config {
            path: path.display().to_string(),
            message,
        };
        let cfg: Self = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => serde_json::from_str::<Self>(s).map_err(|e| invalid(e.to_string()))?,
            Some("toml") => toml::from_str::<Self>(s).map_err(|e| invalid(e.to_string()))?,
            _ => serde_json::from_str::<Self>(s)
                .or_else(|_| toml::from_str::<Self>(s))
                .map_err(|e| invalid(e.to_string()))?,
        };
        Ok(cfg)
    }

    /// Config with every built-in adapter enabled and all other values defaulted.
    pub fn with_adapters<I, S>(providers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            adapters: providers.into_iter().map(AdapterCfg::new).collect(),
            ..Self::default()
        }
    }

    pub fn serializer(&self) -> Serializer {
        Serializer::new(self.serializer.max_depth)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn load_from_json() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("calltrace.json");
        let json = r#"{
          "sdk": {"name": "my-service"},
          "tracing": {"trace_output": false},
          "adapters": [
            {"provider": "cohere", "version": "5.0.0"},
            {"provider": "pinecone", "enabled": false, "exclude": ["\\.delete$"]}
          ]
        }"#;
        fs::write(&file, json).unwrap();
        let cfg = Config::from_path(&file).unwrap();
        assert_eq!(cfg.sdk.name, "my-service");
        assert!(cfg.tracing.trace_input);
        assert!(!cfg.tracing.trace_output);
        assert_eq!(cfg.serializer.max_depth, DEFAULT_MAX_DEPTH);
        assert_eq!(cfg.adapters.len(), 2);
        assert!(cfg.adapters[0].enabled);
        assert_eq!(cfg.adapters[0].version.as_deref(), Some("5.0.0"));
        assert!(!cfg.adapters[1].enabled);
        assert_eq!(cfg.adapters[1].exclude, vec!["\\.delete$".to_string()]);
    }

    #[test]
    fn empty_json_is_all_defaults() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("empty.json");
        fs::write(&file, "{}").unwrap();
        let cfg = Config::from_path(&file).unwrap();
        assert_eq!(cfg, Config::default());
        assert_eq!(cfg.sdk.name, DEFAULT_SDK_NAME);
        assert_eq!(cfg.serializer().max_depth(), DEFAULT_MAX_DEPTH);
    }

    #[test]
    fn missing_file_returns_io_error() {
        let missing = std::path::PathBuf::from("/definitely/not/here/calltrace-missing.json");
        let err = Config::from_path(&missing).unwrap_err();
        // Should map to our typed Io error
        match err {
            CallTraceError::Io(_) => {}
            other => panic!("expected Io error, got: {:?}", other),
        }
    }

    #[test]
    fn bad_utf8_returns_other_error() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("bad.bin");
        // Write invalid UTF-8 bytes
        let bytes = vec![0xff, 0xfe, 0xfd, 0x00, 0x80];
        fs::write(&file, bytes).unwrap();
        let err = Config::from_path(&file).unwrap_err();
        match err {
            CallTraceError::Other(_) => {}
            other => panic!("expected Other(utf8) error, got: {:?}", other),
        }
    }

    #[test]
    fn bad_json_returns_config_error() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("bad.json");
        // Intentionally malformed JSON
        let json = r#"{ "adapters": [ { "provider": 123 } ]"#;
        fs::write(&file, json).unwrap();
        let err = Config::from_path(&file).unwrap_err();
        match err {
            CallTraceError::Config { path, .. } => assert!(path.ends_with("bad.json")),
            other => panic!("expected Config error, got: {:?}", other),
        }
    }

    #[test]
    fn load_from_toml() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("calltrace.toml");
        let toml = r#"
[sdk]
name = "my-service"

[serializer]
max_depth = 8

[[adapters]]
provider = "langchain_core"
version = "0.3.1"

[[adapters]]
provider = "aws_bedrock"
exclude = ["^boto3\\.session"]
"#;
        fs::write(&file, toml).unwrap();
        let cfg = Config::from_path(&file).unwrap();
        assert_eq!(cfg.sdk.name, "my-service");
        assert_eq!(cfg.serializer().max_depth(), 8);
        assert_eq!(cfg.adapters[0].provider, "langchain_core");
        assert_eq!(cfg.adapters[1].exclude, vec!["^boto3\\.session".to_string()]);
        assert!(cfg.tracing.trace_output);
    }

    #[test]
    fn unknown_extension_falls_back_to_json_then_toml() {
        let dir = tempdir().unwrap();
        // First try with a .conf that is valid JSON
        let json_path = dir.path().join("calltrace.conf");
        fs::write(&json_path, r#"{"adapters":[{"provider":"cohere"}]}"#).unwrap();
        let cfg_json_first = Config::from_path(&json_path).unwrap();
        assert_eq!(cfg_json_first.adapters[0].provider, "cohere");

        // Now write TOML to a different .conf and ensure TOML fallback works when JSON fails
        let toml_path = dir.path().join("calltrace2.conf");
        let toml = r#"
[tracing]
trace_input = false
"#;
        fs::write(&toml_path, toml).unwrap();
        let cfg_toml_fallback = Config::from_path(&toml_path).unwrap();
        assert!(!cfg_toml_fallback.tracing.trace_input);
        assert!(cfg_toml_fallback.adapters.is_empty());
    }

    #[test]
    fn with_adapters_enables_each() {
        let cfg = Config::with_adapters(["cohere", "pinecone"]);
        assert_eq!(cfg.adapters.len(), 2);
        assert!(cfg.adapters.iter().all(|a| a.enabled && a.exclude.is_empty()));
    }
}
