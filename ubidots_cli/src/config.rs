use anyhow::{Context, Result};
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use ubidots_client_core::{ProtocolConfig, TcpTransport, WireFormat};

/// Keys whose values are never printed by `config list`
const SECRET_KEYS: [&str; 1] = ["client.token"];

#[derive(Deserialize, Serialize, Debug, Default, Clone)]
pub struct AppConfig {
    #[serde(default)]
    pub client: ProtocolConfig,

    #[serde(default)]
    pub transport: TransportConfig,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct TransportConfig {
    pub format: WireFormat,
    /// Dial the plaintext endpoints and let secure connects run over plain TCP
    pub plaintext: bool,
    pub connect_timeout_ms: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            format: WireFormat::Http,
            plaintext: true,
            connect_timeout_ms: 10_000,
        }
    }
}

impl AppConfig {
    /// Apply CLI argument overrides to the configuration
    pub fn apply_cli_overrides(
        &mut self,
        host: Option<String>,
        port: Option<u16>,
        format: Option<WireFormat>,
        debug: bool,
    ) {
        if let Some(host) = host {
            self.client.host = host;
        }
        if let Some(port) = port {
            self.client.port = Some(port);
        }
        if let Some(format) = format {
            self.transport.format = format;
        }
        if debug {
            self.client.debug = true;
        }
    }

    /// Port to dial: explicit setting, else the format's plaintext or TLS port
    pub fn resolved_port(&self) -> u16 {
        self.client.port.unwrap_or_else(|| {
            if self.transport.plaintext {
                self.transport.format.plaintext_port()
            } else {
                self.transport.format.default_port()
            }
        })
    }

    /// Client configuration with the port resolved
    pub fn protocol_config(&self) -> ProtocolConfig {
        let mut config = self.client.clone();
        config.port = Some(self.resolved_port());
        config
    }

    /// Socket adapter configured for this endpoint
    pub fn transport(&self) -> TcpTransport {
        TcpTransport::new()
            .with_connect_timeout(Duration::from_millis(self.transport.connect_timeout_ms))
            .allow_plaintext_secure(self.transport.plaintext)
    }
}

/// Configuration manager that handles XDG-compliant paths and layered configuration
pub struct ConfigManager {
    config_path: PathBuf,
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigManager {
    /// Create a new ConfigManager with default XDG-compliant paths
    pub fn new() -> Self {
        Self {
            config_path: Self::default_config_path(),
        }
    }

    /// Create a ConfigManager with a specific path (for testing)
    pub fn with_path(path: PathBuf) -> Self {
        Self { config_path: path }
    }

    /// Get the configuration file path
    pub fn get_config_path(&self) -> PathBuf {
        self.config_path.clone()
    }

    fn default_config_path() -> PathBuf {
        #[cfg(not(target_os = "windows"))]
        if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
            return PathBuf::from(xdg_config).join("ubidots/config.toml");
        }

        dirs::config_dir()
            .map(|dir| dir.join("ubidots").join("config.toml"))
            .unwrap_or_else(|| PathBuf::from(".ubidots/config.toml"))
    }

    /// Load configuration with layered priority: ENV > File > Defaults
    ///
    /// CLI flags are applied on top by the caller.
    pub fn load(&self) -> Result<AppConfig> {
        let mut figment = Figment::new();

        // Layer 1: Defaults
        figment = figment.merge(Serialized::defaults(AppConfig::default()));

        // Layer 2: Config file (if exists)
        if self.config_path.exists() {
            figment = figment.merge(Toml::file(&self.config_path));
        }

        // Layer 3: Environment variables, e.g. UBIDOTS_CLIENT__TOKEN
        figment = figment.merge(Env::prefixed("UBIDOTS_").split("__"));

        figment.extract().context("Failed to load configuration")
    }

    /// Get a configuration value by key (dot notation)
    pub fn get(&self, key: &str) -> Result<String> {
        let config = self.load()?;
        let toml_string = toml::to_string(&config)?;
        let value: toml::Value = toml::from_str(&toml_string)?;

        let mut current = &value;
        for part in key.split('.') {
            match current {
                toml::Value::Table(table) => {
                    current = table
                        .get(part)
                        .ok_or_else(|| anyhow::anyhow!("Key '{}' not found", key))?;
                }
                _ => anyhow::bail!("Invalid key path: {}", key),
            }
        }

        match current {
            toml::Value::String(s) => Ok(s.clone()),
            toml::Value::Integer(i) => Ok(i.to_string()),
            toml::Value::Float(f) => Ok(f.to_string()),
            toml::Value::Boolean(b) => Ok(b.to_string()),
            _ => anyhow::bail!("Value at '{}' is not a simple type", key),
        }
    }

    /// Set a configuration value by key (dot notation)
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.validate_config_value(key, value)?;

        let mut config = if self.config_path.exists() {
            let content = fs::read_to_string(&self.config_path)?;
            toml::from_str(&content)?
        } else {
            toml::Value::Table(toml::map::Map::new())
        };

        let parts: Vec<&str> = key.split('.').collect();
        let Some((last, sections)) = parts.split_last() else {
            anyhow::bail!("Empty key");
        };

        let mut current = &mut config;
        for part in sections {
            let toml::Value::Table(table) = current else {
                anyhow::bail!("Invalid key path: expected table at '{}'", part);
            };
            current = table
                .entry(part.to_string())
                .or_insert(toml::Value::Table(toml::map::Map::new()));
        }

        let toml::Value::Table(table) = current else {
            anyhow::bail!("Cannot set value on non-table");
        };
        table.insert(last.to_string(), self.parse_config_value(key, value)?);

        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let toml_string = toml::to_string_pretty(&config)?;
        fs::write(&self.config_path, toml_string)?;

        Ok(())
    }

    /// List all configuration values, secrets redacted
    pub fn list(&self) -> Result<Vec<(String, String)>> {
        let config = self.load()?;
        let toml_string = toml::to_string(&config)?;
        let value: toml::Value = toml::from_str(&toml_string)?;

        let mut items = Vec::new();
        Self::collect_values(&value, String::new(), &mut items);
        for (key, value) in items.iter_mut() {
            if SECRET_KEYS.contains(&key.as_str()) && !value.is_empty() {
                *value = "***".to_string();
            }
        }
        items.sort_by(|a, b| a.0.cmp(&b.0));

        Ok(items)
    }

    fn collect_values(value: &toml::Value, prefix: String, items: &mut Vec<(String, String)>) {
        match value {
            toml::Value::Table(table) => {
                for (key, val) in table {
                    let new_prefix = if prefix.is_empty() {
                        key.clone()
                    } else {
                        format!("{prefix}.{key}")
                    };
                    Self::collect_values(val, new_prefix, items);
                }
            }
            toml::Value::String(s) => items.push((prefix, s.clone())),
            toml::Value::Integer(i) => items.push((prefix, i.to_string())),
            toml::Value::Float(f) => items.push((prefix, f.to_string())),
            toml::Value::Boolean(b) => items.push((prefix, b.to_string())),
            _ => {}
        }
    }

    fn validate_config_value(&self, key: &str, value: &str) -> Result<()> {
        match key {
            "client.host" => {
                if value.is_empty() || value.contains(['\r', '\n']) {
                    anyhow::bail!("host must be a non-empty single line");
                }
            }
            "client.token" | "client.user_agent" => {
                if value.contains(['\r', '\n', '|']) {
                    anyhow::bail!("{key} must not contain line breaks or '|'");
                }
            }
            "client.port" => {
                let port: u16 = value
                    .parse()
                    .context("port must be an integer between 1 and 65535")?;
                if port == 0 {
                    anyhow::bail!("port must be greater than 0");
                }
            }
            "client.timeout_ms" | "client.max_reconnect_attempts" => {
                let number: u32 = value
                    .parse()
                    .with_context(|| format!("{key} must be a positive integer"))?;
                if number == 0 {
                    anyhow::bail!("{key} must be greater than 0");
                }
            }
            "client.reconnect_delay_ms" => {
                let _: u32 = value
                    .parse()
                    .context("reconnect_delay_ms must be a non-negative integer")?;
            }
            "transport.connect_timeout_ms" => {
                let timeout: u64 = value
                    .parse()
                    .context("connect_timeout_ms must be a positive integer")?;
                if timeout == 0 {
                    anyhow::bail!("connect_timeout_ms must be greater than 0");
                }
            }
            "transport.format" => {
                if !matches!(value, "http" | "line" | "tcp") {
                    anyhow::bail!("format must be one of: http, line");
                }
            }
            "client.debug" | "transport.plaintext" => {
                let _: bool = value.parse().context("Value must be 'true' or 'false'")?;
            }
            _ => {}
        }
        Ok(())
    }

    fn parse_config_value(&self, key: &str, value: &str) -> Result<toml::Value> {
        match key {
            // Tokens and labels may look numeric but are always strings
            "client.token" | "client.host" | "client.user_agent" | "transport.format" => {
                Ok(toml::Value::String(value.to_string()))
            }
            k if k.ends_with("_ms") || k.ends_with("_attempts") || k.ends_with(".port") => {
                let num: i64 = value.parse().context("Expected integer value")?;
                Ok(toml::Value::Integer(num))
            }
            k if k.ends_with(".debug") || k.ends_with(".plaintext") => {
                let bool_val: bool = value
                    .parse()
                    .context("Expected boolean value (true/false)")?;
                Ok(toml::Value::Boolean(bool_val))
            }
            _ => {
                if let Ok(b) = value.parse::<bool>() {
                    Ok(toml::Value::Boolean(b))
                } else if let Ok(i) = value.parse::<i64>() {
                    Ok(toml::Value::Integer(i))
                } else if let Ok(f) = value.parse::<f64>() {
                    Ok(toml::Value::Float(f))
                } else {
                    Ok(toml::Value::String(value.to_string()))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_port_follows_plaintext_flag() {
        let mut config = AppConfig::default();
        assert_eq!(config.resolved_port(), 80);

        config.transport.format = WireFormat::Line;
        assert_eq!(config.resolved_port(), 9012);

        config.transport.plaintext = false;
        assert_eq!(config.resolved_port(), 9812);

        config.client.port = Some(1883);
        assert_eq!(config.resolved_port(), 1883);
        assert_eq!(config.protocol_config().port, Some(1883));
    }

    #[test]
    fn test_cli_overrides() {
        let mut config = AppConfig::default();
        config.apply_cli_overrides(
            Some("127.0.0.1".to_string()),
            Some(9000),
            Some(WireFormat::Line),
            true,
        );

        assert_eq!(config.client.host, "127.0.0.1");
        assert_eq!(config.client.port, Some(9000));
        assert_eq!(config.transport.format, WireFormat::Line);
        assert!(config.client.debug);
    }

    #[test]
    fn test_numeric_token_stays_string() {
        let manager = ConfigManager::with_path(PathBuf::from("unused.toml"));
        let value = manager.parse_config_value("client.token", "12345").unwrap();
        assert_eq!(value, toml::Value::String("12345".to_string()));
    }
}
