//! Client for a Spring Cloud Config compatible server.

use serde::Deserialize;
use serde_json::{Map, Value};
use strata_core::{Result, StrataError};
use tracing::{debug, warn};

use crate::cast;

/// One named set of properties in a config-server response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PropertySource {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub source: Map<String, Value>,
}

/// The environment document returned by `GET {url}/{app}/{profile}/{label}`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    pub name: String,
    pub profiles: Vec<String>,
    pub label: Option<String>,
    pub version: Option<String>,
    /// Highest priority first.
    #[serde(rename = "propertySources")]
    pub sources: Vec<PropertySource>,
}

pub struct ConfigServerClient {
    client: reqwest::Client,
    url: String,
    app: String,
    profile: String,
    label: String,
    remote: RemoteConfig,
}

impl ConfigServerClient {
    pub fn new(url: &str, app: &str, profile: &str, label: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.trim_end_matches('/').to_string(),
            app: app.to_string(),
            profile: profile.to_string(),
            label: label.to_string(),
            remote: RemoteConfig::default(),
        }
    }

    /// `{url}/{app}/{profile}/{label}`
    pub fn endpoint(&self) -> String {
        [
            self.url.as_str(),
            self.app.as_str(),
            self.profile.as_str(),
            self.label.as_str(),
        ]
        .join("/")
    }

    pub async fn fetch(&mut self) -> Result<()> {
        let url = self.endpoint();
        let remote_error = |reason: String| StrataError::Remote {
            url: url.clone(),
            reason,
        };

        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| remote_error(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(remote_error(format!("HTTP {status}: {body}")));
        }

        self.remote = resp
            .json::<RemoteConfig>()
            .await
            .map_err(|e| remote_error(format!("decode response: {e}")))?;
        debug!(url = %url, sources = self.remote.sources.len(), "fetched remote config");
        Ok(())
    }

    pub fn remote(&self) -> &RemoteConfig {
        &self.remote
    }

    /// The value of `name` in the highest-priority source that has it.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.remote.sources.iter().find_map(|src| src.source.get(name))
    }

    pub fn get_string(&self, name: &str) -> Option<String> {
        match self.get(name)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            other => {
                warn!(name, val = %other, "remote property is not a string");
                None
            }
        }
    }

    pub fn get_int(&self, name: &str) -> Option<i64> {
        match self.get(name)? {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => match s.trim().parse() {
                Ok(v) => Some(v),
                Err(_) => {
                    warn!(name, val = %s, "cannot parse remote property as int");
                    None
                }
            },
            other => {
                warn!(name, val = %other, "remote property has unknown type");
                None
            }
        }
    }

    pub fn get_bool(&self, name: &str) -> Option<bool> {
        match self.get(name)? {
            Value::Bool(b) => Some(*b),
            Value::Number(n) => Some(n.as_f64().is_some_and(|f| f != 0.0)),
            Value::String(s) => {
                let parsed = cast::parse_bool(s.trim());
                if parsed.is_none() {
                    warn!(name, val = %s, "cannot parse remote property as bool");
                }
                parsed
            }
            other => {
                warn!(name, val = %other, "remote property has unknown type");
                None
            }
        }
    }

    /// Call `set` once per property, lowest-priority source first, so that
    /// a store receiving the calls ends up honoring source priority.
    pub fn map(&self, mut set: impl FnMut(&str, &Value)) {
        for src in self.remote.sources.iter().rev() {
            for (key, val) in &src.source {
                debug!(source = %src.name, key = %key, "set settings");
                set(key, val);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn client_with(doc: Value) -> ConfigServerClient {
        let mut client = ConfigServerClient::new("http://localhost:8888/", "app", "dev", "main");
        client.remote = serde_json::from_value(doc).unwrap();
        client
    }

    #[test]
    fn test_endpoint() {
        let client = ConfigServerClient::new("http://localhost:8888/", "app", "dev", "main");
        assert_eq!(client.endpoint(), "http://localhost:8888/app/dev/main");
    }

    #[test]
    fn test_first_source_wins() {
        let client = client_with(json!({
            "name": "app",
            "profiles": ["dev"],
            "propertySources": [
                {"name": "dev", "source": {"port": "8080", "debug": "true", "one": "1", "upper": "T", "off": "False"}},
                {"name": "default", "source": {"port": 80, "host": "h"}}
            ]
        }));
        assert_eq!(client.get_int("port"), Some(8080));
        assert_eq!(client.get_bool("debug"), Some(true));
        assert_eq!(client.get_bool("one"), Some(true));
        assert_eq!(client.get_bool("upper"), Some(true));
        assert_eq!(client.get_bool("off"), Some(false));
        assert_eq!(client.get_string("host").as_deref(), Some("h"));
        assert!(client.get("missing").is_none());

        let mut seen = Map::new();
        client.map(|k, v| {
            seen.insert(k.to_string(), v.clone());
        });
        assert_eq!(seen["port"], "8080");
        assert_eq!(seen["host"], "h");
    }

    #[test]
    fn test_bad_types_are_none() {
        let client = client_with(json!({
            "propertySources": [{"name": "x", "source": {"n": "abc", "b": [1], "y": "yes"}}]
        }));
        assert_eq!(client.get_int("n"), None);
        assert_eq!(client.get_bool("b"), None);
        assert_eq!(client.get_bool("y"), None);
        assert_eq!(client.get_string("b"), None);
    }
}
