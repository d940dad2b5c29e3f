use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde_json::{Map, Value};

use crate::error::{Result, StrataError};

/// Serialization formats a configuration source may be written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigFormat {
    Yaml,
    Toml,
    Json,
}

impl ConfigFormat {
    /// Map a bare extension (no leading dot) to a format.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "yaml" | "yml" => Some(ConfigFormat::Yaml),
            "toml" => Some(ConfigFormat::Toml),
            "json" => Some(ConfigFormat::Json),
            _ => None,
        }
    }

    /// Infer the format of `path` from its extension, looking past the
    /// encrypted suffix so `settings.yml.enc` is still YAML.
    pub fn from_path(path: &Path, encrypted_suffix: &str) -> Result<Self> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let name = match name.strip_suffix(encrypted_suffix) {
            Some(stripped) if !encrypted_suffix.is_empty() => stripped.to_string(),
            _ => name,
        };
        let extension = Path::new(&name)
            .extension()
            .map(|e| e.to_string_lossy().into_owned())
            .unwrap_or_default();

        Self::from_extension(&extension).ok_or_else(|| StrataError::UnsupportedFormat {
            path: path.to_path_buf(),
            extension,
        })
    }

    /// Parse a whole document into its top-level map.
    ///
    /// An empty document is an empty map; any other non-map document is a
    /// parse error.
    pub fn parse(self, bytes: &[u8]) -> Result<Map<String, Value>> {
        let text = std::str::from_utf8(bytes).map_err(|e| self.parse_error(e))?;

        let value = match self {
            ConfigFormat::Yaml => {
                if text.trim().is_empty() {
                    return Ok(Map::new());
                }
                serde_yaml::from_str::<Value>(text).map_err(|e| self.parse_error(e))?
            }
            ConfigFormat::Toml => {
                let table: toml::Table = toml::from_str(text).map_err(|e| self.parse_error(e))?;
                serde_json::to_value(table).map_err(|e| self.parse_error(e))?
            }
            ConfigFormat::Json => {
                if text.trim().is_empty() {
                    return Ok(Map::new());
                }
                serde_json::from_str::<Value>(text).map_err(|e| self.parse_error(e))?
            }
        };

        match value {
            Value::Object(map) => Ok(map),
            Value::Null => Ok(Map::new()),
            other => Err(self.parse_error(format!(
                "top-level value must be a map, got {}",
                kind_name(&other)
            ))),
        }
    }

    /// Render a value tree in this format.
    pub fn render(self, value: &Value) -> Result<String> {
        match self {
            ConfigFormat::Json => Ok(serde_json::to_string_pretty(value)?),
            ConfigFormat::Yaml => serde_yaml::to_string(value).map_err(|e| self.parse_error(e)),
            ConfigFormat::Toml => toml::to_string_pretty(value).map_err(|e| self.parse_error(e)),
        }
    }

    fn parse_error(self, reason: impl fmt::Display) -> StrataError {
        StrataError::Parse {
            origin: "<input>".into(),
            format: self,
            reason: reason.to_string(),
        }
    }
}

impl fmt::Display for ConfigFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConfigFormat::Yaml => "yaml",
            ConfigFormat::Toml => "toml",
            ConfigFormat::Json => "json",
        };
        f.write_str(name)
    }
}

impl FromStr for ConfigFormat {
    type Err = StrataError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_extension(s.trim_start_matches('.'))
            .ok_or_else(|| StrataError::InvalidOption(format!("unknown config type `{s}`")))
    }
}

fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "map",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_path_strips_encrypted_suffix() {
        let f = ConfigFormat::from_path(Path::new("/etc/app/settings.yml.enc"), ".enc").unwrap();
        assert_eq!(f, ConfigFormat::Yaml);
        let f = ConfigFormat::from_path(Path::new("/etc/app/settings.toml"), ".enc").unwrap();
        assert_eq!(f, ConfigFormat::Toml);
        let f = ConfigFormat::from_path(Path::new("app.JSON"), "").unwrap();
        assert_eq!(f, ConfigFormat::Json);
    }

    #[test]
    fn test_from_path_unknown_extension() {
        let err = ConfigFormat::from_path(Path::new("settings.ini"), ".enc").unwrap_err();
        assert!(matches!(
            err,
            StrataError::UnsupportedFormat { ref extension, .. } if extension == "ini"
        ));
        assert!(ConfigFormat::from_path(Path::new("settings.enc"), ".enc").is_err());
    }

    #[test]
    fn test_parse_each_format() {
        let yaml = ConfigFormat::Yaml.parse(b"a:\n  b: 1\n").unwrap();
        assert_eq!(yaml["a"]["b"], 1);

        let toml = ConfigFormat::Toml.parse(b"[a]\nb = 1\n").unwrap();
        assert_eq!(toml["a"]["b"], 1);

        let json = ConfigFormat::Json.parse(br#"{"a": {"b": 1}}"#).unwrap();
        assert_eq!(json["a"]["b"], 1);
    }

    #[test]
    fn test_parse_empty_document_is_empty_map() {
        assert!(ConfigFormat::Yaml.parse(b"").unwrap().is_empty());
        assert!(ConfigFormat::Yaml.parse(b"   \n").unwrap().is_empty());
        assert!(ConfigFormat::Toml.parse(b"").unwrap().is_empty());
        assert!(ConfigFormat::Json.parse(b"").unwrap().is_empty());
    }

    #[test]
    fn test_parse_rejects_scalar_document() {
        let err = ConfigFormat::Json.parse(b"[1, 2]").unwrap_err();
        assert!(err.to_string().contains("top-level value must be a map"));
    }

    #[test]
    fn test_parse_malformed() {
        let err = ConfigFormat::Toml.parse(b"a = = 1").unwrap_err();
        assert!(matches!(err, StrataError::Parse { format: ConfigFormat::Toml, .. }));
    }

    #[test]
    fn test_from_str() {
        assert_eq!("yml".parse::<ConfigFormat>().unwrap(), ConfigFormat::Yaml);
        assert_eq!(".toml".parse::<ConfigFormat>().unwrap(), ConfigFormat::Toml);
        assert!("ini".parse::<ConfigFormat>().is_err());
    }
}
