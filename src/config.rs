use crate::error::{Error, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub servers: Vec<ServerConfig>,
    /// Directory checked for `robots.txt` and `error.html` overrides.
    pub custom_templates_dir: Option<String>,
    /// Optional footer shown on rendered error pages.
    pub footer: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub ports: Vec<u16>,
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| Error::ReadConfig {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Override directory, or `None` when unset or empty.
    pub fn override_dir(&self) -> Option<&Path> {
        self.custom_templates_dir
            .as_deref()
            .filter(|dir| !dir.is_empty())
            .map(Path::new)
    }

    fn validate(&self) -> Result<()> {
        if self.servers.is_empty() {
            return Err(Error::InvalidConfig("at least one server is required".to_string()));
        }
        for server in &self.servers {
            if server.ports.is_empty() {
                return Err(Error::InvalidConfig(format!("server {} has no ports", server.host)));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let config = Config::parse(
            "custom_templates_dir: /etc/pages\n\
             footer: hello\n\
             servers:\n  - host: 127.0.0.1\n    ports: [8080, 8081]\n",
        )
        .unwrap();

        assert_eq!(config.override_dir(), Some(Path::new("/etc/pages")));
        assert_eq!(config.footer.as_deref(), Some("hello"));
        assert_eq!(config.servers[0].ports, vec![8080, 8081]);
    }

    #[test]
    fn test_empty_override_dir() {
        let config = Config::parse(
            "custom_templates_dir: \"\"\nservers:\n  - host: 0.0.0.0\n    ports: [80]\n",
        )
        .unwrap();
        assert_eq!(config.override_dir(), None);
        assert_eq!(config.footer, None);
    }

    #[test]
    fn test_missing_servers() {
        assert!(matches!(Config::parse("servers: []\n"), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_server_without_ports() {
        let result = Config::parse("servers:\n  - host: 127.0.0.1\n    ports: []\n");
        assert!(matches!(result, Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_malformed_yaml() {
        assert!(matches!(Config::parse("servers: ["), Err(Error::ParseConfig(_))));
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = Config::from_file(dir.path().join("config.yaml"));
        assert!(matches!(result, Err(Error::ReadConfig { .. })));
    }
}
