use crate::catalog::MeasurementField;
use serde::Serialize;

/// `DeviceConfig` is used to define the configuration for a Home Assistant device
/// in the MQTT discovery protocol and is used to group entities together.
///
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct DeviceConfig {
    identifiers: Vec<String>,
    name: String,
    model: String,
    manufacturer: String,
    sw_version: String, // Software version of the application that supplies the discovered MQTT item.
}

impl DeviceConfig {
    pub fn meetstekker(bridge_id: &str) -> Self {
        Self {
            identifiers: Vec::from([format!("{bridge_id}_meetstekker")]),
            name: "Aurum Meetstekker".to_string(),
            model: "Meetstekker".to_string(),
            manufacturer: "Aurum".to_string(),
            // Rust compiler sets the CARGO_PKG_VERSION environment from the Cargo.toml .
            sw_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// `SensorConfig` is used to define the configuration for a Home Assistant sensor entity
/// in the MQTT discovery protocol.
///
/// More information about the MQTT discovery protocol can be found here:
/// https://www.home-assistant.io/docs/mqtt/discovery/
///
#[derive(Serialize, Debug, PartialEq)]
pub struct SensorConfig {
    name: String,           // The name of the sensor.
    unique_id: String,      // A globally unique identifier for the sensor.
    state_topic: String,    // The aggregate topic all readings are published to.
    value_template: String, // Picks this sensor's value out of the aggregate payload.
    icon: String,
    device: DeviceConfig,
    // exclude optional if they are not provided
    #[serde(skip_serializing_if = "Option::is_none")]
    unit_of_measurement: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    device_class: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    state_class: Option<String>,
}

impl SensorConfig {
    pub fn for_field(
        field: &MeasurementField,
        bridge_id: &str,
        state_topic: &str,
        device_config: &DeviceConfig,
    ) -> Self {
        Self {
            name: field.display_name.to_string(),
            unique_id: format!("{}_{}_sensor", bridge_id, field.key),
            state_topic: state_topic.to_string(),
            value_template: format!("{{{{ value_json.{} }}}}", field.key),
            icon: field.icon_hint.to_string(),
            device: device_config.clone(),
            unit_of_measurement: field.unit.map(str::to_string),
            device_class: field.device_class.map(str::to_string),
            state_class: field.state_class.map(str::to_string),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::lookup;
    use serde_json::json;

    #[test]
    fn solar_power_document() {
        let device = DeviceConfig::meetstekker("aurum");
        let config = SensorConfig::for_field(
            lookup("powerSolar").unwrap(),
            "aurum",
            "aurum/sensors",
            &device,
        );
        assert_eq!(
            serde_json::to_value(&config).unwrap(),
            json!({
                "name": "Solar Power",
                "unique_id": "aurum_powerSolar_sensor",
                "state_topic": "aurum/sensors",
                "value_template": "{{ value_json.powerSolar }}",
                "icon": "mdi:flash",
                "device": {
                    "identifiers": ["aurum_meetstekker"],
                    "name": "Aurum Meetstekker",
                    "model": "Meetstekker",
                    "manufacturer": "Aurum",
                    "sw_version": env!("CARGO_PKG_VERSION"),
                },
                "unit_of_measurement": "W",
                "device_class": "power",
                "state_class": "measurement",
            })
        );
    }

    #[test]
    fn timestamp_document_omits_unit_and_classes() {
        let device = DeviceConfig::meetstekker("aurum");
        let config = SensorConfig::for_field(
            lookup("smartMeterTimestamp").unwrap(),
            "aurum",
            "aurum/sensors",
            &device,
        );
        let value = serde_json::to_value(&config).unwrap();
        assert_eq!(value["icon"], "mdi:av-timer");
        assert!(value.get("unit_of_measurement").is_none());
        assert!(value.get("device_class").is_none());
        assert!(value.get("state_class").is_none());
    }
}
