use crate::catalog::Selection;
use crate::error::PublishError;
use crate::home_assistant_config::{DeviceConfig, SensorConfig};
use crate::meter::Snapshot;
use crate::metric_collector::MetricCollector;
use crate::mqtt_config::MqttConfig;
use crate::mqtt_wrapper::{MqttWrapper, QoS};
use crate::normalize::normalize;

use log::debug;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

pub const DISCOVERY_PREFIX: &str = "homeassistant";
pub const DEFAULT_BRIDGE_ID: &str = "aurum";
pub const DEFAULT_STATE_TOPIC: &str = "aurum/sensors";

/// Where discovery documents and aggregate state go.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Topics {
    pub bridge_id: String,
    pub state_topic: String,
}

impl Topics {
    pub fn discovery(&self, key: &str) -> String {
        format!("{DISCOVERY_PREFIX}/sensor/{}/{key}/config", self.bridge_id)
    }
}

impl Default for Topics {
    fn default() -> Self {
        Self {
            bridge_id: DEFAULT_BRIDGE_ID.to_string(),
            state_topic: DEFAULT_STATE_TOPIC.to_string(),
        }
    }
}

/// Aggregate state message: selected key to normalized value, in selection order.
#[derive(Debug, PartialEq, Eq)]
pub struct StatePayload {
    values: Vec<(&'static str, String)>,
}

impl StatePayload {
    pub fn build(selection: &Selection, snapshot: &Snapshot) -> Self {
        let values = selection
            .fields()
            .iter()
            .filter_map(|field| {
                snapshot
                    .get(field.key)
                    .map(|raw| (field.key, normalize(raw, field)))
            })
            .collect();
        Self { values }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn keys(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.values.iter().map(|(k, _)| *k)
    }
}

impl Serialize for StatePayload {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (key, value) in &self.values {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

/// Publishes Home Assistant discovery documents and the aggregate state.
pub struct HomeAssistant<MQTT: MqttWrapper> {
    client: MQTT,
    topics: Topics,
    device_config: DeviceConfig,
}

impl<MQTT: MqttWrapper> HomeAssistant<MQTT> {
    /// Opens the broker session.
    pub fn start(config: &MqttConfig, topics: Topics) -> Self {
        Self::with_client(MQTT::new(config), topics)
    }

    pub fn with_client(client: MQTT, topics: Topics) -> Self {
        let device_config = DeviceConfig::meetstekker(&topics.bridge_id);
        Self {
            client,
            topics,
            device_config,
        }
    }

    pub fn client(&self) -> &MQTT {
        &self.client
    }

    pub fn client_mut(&mut self) -> &mut MQTT {
        &mut self.client
    }

    fn publish_json<T: Serialize>(&mut self, topic: &str, payload: &T) -> Result<(), PublishError> {
        let payload = serde_json::to_string(payload).map_err(|source| PublishError::Serialize {
            topic: topic.to_string(),
            source,
        })?;
        debug!("Publishing to {topic} with payload {payload}");

        self.client
            .publish(topic, QoS::AtMostOnce, true, payload)
            .map_err(|e| PublishError::Rejected {
                topic: topic.to_string(),
                reason: format!("{e:#}"),
            })
    }

    fn sensor_configs(
        &self,
        selection: &Selection,
        snapshot: &Snapshot,
    ) -> Vec<(&'static str, SensorConfig)> {
        selection
            .fields()
            .iter()
            .filter(|field| snapshot.get(field.key).is_some())
            .map(|field| {
                let config = SensorConfig::for_field(
                    field,
                    &self.topics.bridge_id,
                    &self.topics.state_topic,
                    &self.device_config,
                );
                (field.key, config)
            })
            .collect()
    }
}

impl<MQTT: MqttWrapper> MetricCollector for HomeAssistant<MQTT> {
    fn publish_discovery(
        &mut self,
        selection: &Selection,
        snapshot: &Snapshot,
    ) -> Result<usize, PublishError> {
        // configs let home assistant know what sensors are available and where to find them
        let sensor_configs = self.sensor_configs(selection, snapshot);
        for (key, sensor_config) in &sensor_configs {
            let topic = self.topics.discovery(key);
            self.publish_json(&topic, sensor_config)?;
        }
        Ok(sensor_configs.len())
    }

    fn publish_state(
        &mut self,
        selection: &Selection,
        snapshot: &Snapshot,
    ) -> Result<(), PublishError> {
        let payload = StatePayload::build(selection, snapshot);
        let topic = self.topics.state_topic.clone();
        self.publish_json(&topic, &payload)
    }

    fn shutdown(&mut self) -> Result<(), PublishError> {
        self.client
            .disconnect()
            .map_err(|e| PublishError::Disconnect(format!("{e:#}")))
    }
}
