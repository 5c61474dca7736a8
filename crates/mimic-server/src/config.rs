//! Server configuration: imposter definitions loaded at startup.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::imposter::ImposterConfig;

/// On-disk server configuration: a list of imposters to bring up at boot.
/// YAML by default; `.json` files are parsed as JSON.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct ServerConfig {
    #[serde(default)]
    pub imposters: Vec<ImposterConfig>,
}

impl ServerConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, anyhow::Error> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        let config: ServerConfig = if path.extension().is_some_and(|ext| ext == "json") {
            serde_json::from_str(&contents)?
        } else {
            serde_yaml::from_str(&contents)?
        };
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_yaml_imposter_list() {
        let yaml = r#"
imposters:
  - port: 4545
    protocol: soap
    name: stock-quotes
    recordRequests: true
    stubs:
      - predicates:
          - equals:
              operation: GetQuote
        responses:
          - is:
              headers:
                X-Origin: mimic
              response:
                price: "12.50"
"#;
        let config: ServerConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.imposters.len(), 1);
        let imposter = &config.imposters[0];
        assert_eq!(imposter.port, Some(4545));
        assert_eq!(imposter.name.as_deref(), Some("stock-quotes"));
        assert!(imposter.record_requests);
        assert_eq!(imposter.stubs.len(), 1);
    }

    #[test]
    fn empty_config_has_no_imposters() {
        let config: ServerConfig = serde_yaml::from_str("{}").unwrap();
        assert!(config.imposters.is_empty());
    }
}
