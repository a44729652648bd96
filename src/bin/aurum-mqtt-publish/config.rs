use std::path::{Path, PathBuf};
use std::time::Duration;
use std::{env, fs};

use anyhow::Context;
use aurum2mqtt::catalog::{Selection, SelectionEntry};
use aurum2mqtt::error::ConfigError;
use aurum2mqtt::home_assistant::Topics;
use aurum2mqtt::mqtt_config::MqttConfig;
use log::{info, warn};
use serde_derive::Deserialize;

static REQUEST_DELAY_DEFAULT: u64 = 60_000;

#[derive(Clone, Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub device_host: String,
    /// milliseconds
    pub update_interval: Option<u64>,
    pub select: Option<Vec<SelectionEntry>>,
    pub bridge_id: Option<String>,
    pub state_topic: Option<String>,
    #[serde(default)]
    pub mqtt: MqttConfig,
}

impl Config {
    /// Reads `config.toml` from the working directory, or from next to the
    /// executable if the former does not exist, then applies environment overrides.
    pub fn load() -> anyhow::Result<Config> {
        let path = config_path()?;
        info!("loading configuration from {}", path.display());
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) => {
                warn!("Could not read {}: {e}", path.display());
                String::new()
            }
        };
        let mut config = Self::parse(&contents)
            .with_context(|| format!("{} is not valid TOML", path.display()))?;
        config.apply_env(|name| env::var(name).ok());
        Ok(config)
    }

    pub fn parse(contents: &str) -> anyhow::Result<Config> {
        Ok(toml::from_str::<Config>(contents)?)
    }

    /// Overwrites settings from `$AURUM_HOST`, `$AURUM_UPDATE_INTERVAL`,
    /// `$MQTT_BROKER_HOST`, `$MQTT_PORT`, `$MQTT_USERNAME`, `$MQTT_PASSWORD`
    /// and `$MQTT_CLIENT_ID`.
    pub fn apply_env<F: Fn(&str) -> Option<String>>(&mut self, var: F) {
        if let Some(device_host) = var("AURUM_HOST") {
            self.device_host = device_host;
        }
        if let Some(interval) = var("AURUM_UPDATE_INTERVAL") {
            match interval.parse() {
                Ok(interval) => self.update_interval = Some(interval),
                Err(e) => warn!("ignoring AURUM_UPDATE_INTERVAL={interval}: {e}"),
            }
        }
        if let Some(host) = var("MQTT_BROKER_HOST") {
            self.mqtt.host = host;
        }
        if let Some(port) = var("MQTT_PORT") {
            match port.parse() {
                Ok(port) => self.mqtt.port = Some(port),
                Err(e) => warn!("ignoring MQTT_PORT={port}: {e}"),
            }
        }
        if let Some(username) = var("MQTT_USERNAME") {
            self.mqtt.username = Some(username);
        }
        if let Some(password) = var("MQTT_PASSWORD") {
            self.mqtt.password = Some(password);
        }
        if let Some(client_id) = var("MQTT_CLIENT_ID") {
            self.mqtt.client_id = Some(client_id);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.device_host.is_empty() {
            return Err(ConfigError::MissingSetting("device_host"));
        }
        if !self.mqtt.is_valid() {
            return Err(ConfigError::MissingSetting("mqtt.host"));
        }
        Ok(())
    }

    pub fn selection(&self) -> Result<Selection, ConfigError> {
        match &self.select {
            Some(entries) => Selection::resolve(entries),
            None => Ok(Selection::all()),
        }
    }

    pub fn update_interval(&self) -> Duration {
        Duration::from_millis(self.update_interval.unwrap_or(REQUEST_DELAY_DEFAULT))
    }

    pub fn topics(&self) -> Topics {
        let mut topics = Topics::default();
        if let Some(bridge_id) = &self.bridge_id {
            topics.bridge_id = bridge_id.clone();
        }
        if let Some(state_topic) = &self.state_topic {
            topics.state_topic = state_topic.clone();
        }
        topics
    }
}

fn config_path() -> anyhow::Result<PathBuf> {
    let path = env::current_dir()
        .context("can't retrieve current dir")?
        .join("config.toml");
    if path.exists() {
        return Ok(path);
    }
    info!("{} does not exist. Trying relative path", path.display());
    let exe = env::current_exe().context("Unable to get current executable path")?;
    Ok(exe
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const EXAMPLE: &str = r#"
device_host = "192.168.0.110"
update_interval = 20000
select = [6, 7, "counterGas"]

[mqtt]
host = "192.168.0.111"
username = "mqtt_user"
password = "mqtt_password"
"#;

    #[test]
    fn parses_example() {
        let config = Config::parse(EXAMPLE).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.update_interval(), Duration::from_secs(20));
        let keys: Vec<_> = config
            .selection()
            .unwrap()
            .fields()
            .iter()
            .map(|f| f.key)
            .collect();
        assert_eq!(keys, ["powerSolar", "counterOutSolar", "counterGas"]);
        assert_eq!(config.topics(), Topics::default());
        assert_eq!(config.mqtt.client_id(), "aurum2mqtt");
    }

    #[test]
    fn defaults_select_everything_every_minute() {
        let config = Config::parse("device_host = \"meter\"\n[mqtt]\nhost = \"broker\"\n").unwrap();
        assert_eq!(config.update_interval(), Duration::from_secs(60));
        assert_eq!(config.selection().unwrap(), Selection::all());
    }

    #[test]
    fn empty_config_is_invalid() {
        let config = Config::parse("").unwrap();
        assert_eq!(
            config.validate(),
            Err(ConfigError::MissingSetting("device_host"))
        );
    }

    #[test]
    fn unknown_selection_is_a_config_error() {
        let config = Config::parse("device_host = \"m\"\nselect = [99]\n").unwrap();
        assert_eq!(
            config.selection(),
            Err(ConfigError::UnknownIndex { index: 99, len: 23 })
        );
    }

    #[test]
    fn environment_overrides_file() {
        let mut config = Config::parse(EXAMPLE).unwrap();
        let vars: HashMap<&str, &str> = HashMap::from([
            ("AURUM_HOST", "10.0.0.5"),
            ("MQTT_BROKER_HOST", "mqtt.local"),
            ("MQTT_PORT", "8883"),
            ("MQTT_CLIENT_ID", "meter-bridge"),
            ("AURUM_UPDATE_INTERVAL", "not-a-number"),
        ]);
        config.apply_env(|name| vars.get(name).map(|v| v.to_string()));
        assert_eq!(config.device_host, "10.0.0.5");
        assert_eq!(config.mqtt.host, "mqtt.local");
        assert_eq!(config.mqtt.port(), 8883);
        assert_eq!(config.mqtt.client_id(), "meter-bridge");
        assert_eq!(config.update_interval(), Duration::from_secs(20));
    }
}
