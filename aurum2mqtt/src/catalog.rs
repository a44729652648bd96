use crate::error::{ConfigError, FetchError};
use crate::meter::Snapshot;
use serde_derive::Deserialize;

/// `MeasurementField` describes one value the Aurum Meetstekker reports in its
/// `output.xml`, together with the metadata Home Assistant needs to present it.
#[derive(Debug, PartialEq, Eq)]
pub struct MeasurementField {
    /// Element name in the device XML, also the key in the aggregate state payload.
    pub key: &'static str,
    /// `None` for unitless textual fields. Their discovery documents leave out
    /// `unit_of_measurement`, because Home Assistant treats any unit (even an
    /// empty one) as a numeric sensor and rejects text states.
    pub unit: Option<&'static str>,
    pub icon_hint: &'static str,
    pub display_name: &'static str,
    /// Textual fields are never run through numeric normalization.
    pub is_numeric: bool,
    pub device_class: Option<&'static str>,
    pub state_class: Option<&'static str>,
}

impl MeasurementField {
    const fn power(key: &'static str, display_name: &'static str) -> Self {
        Self {
            key,
            unit: Some("W"),
            icon_hint: "mdi:flash",
            display_name,
            is_numeric: true,
            device_class: Some("power"),
            state_class: Some("measurement"),
        }
    }

    const fn energy(key: &'static str, display_name: &'static str) -> Self {
        Self {
            key,
            unit: Some("kWh"),
            icon_hint: "mdi:flash",
            display_name,
            is_numeric: true,
            device_class: Some("energy"),
            state_class: Some("total_increasing"),
        }
    }

    const fn gas_rate(key: &'static str, display_name: &'static str) -> Self {
        Self {
            key,
            unit: Some("m³/h"),
            icon_hint: "mdi:fire",
            display_name,
            is_numeric: true,
            device_class: None,
            state_class: Some("measurement"),
        }
    }

    const fn gas(key: &'static str, display_name: &'static str) -> Self {
        Self {
            key,
            unit: Some("m³"),
            icon_hint: "mdi:fire",
            display_name,
            is_numeric: true,
            device_class: Some("gas"),
            state_class: Some("total_increasing"),
        }
    }

    const fn text(key: &'static str, display_name: &'static str, icon_hint: &'static str) -> Self {
        Self {
            key,
            unit: None,
            icon_hint,
            display_name,
            is_numeric: false,
            device_class: None,
            state_class: None,
        }
    }
}

/// All measurements, in the order the device reports them. Configured
/// selection indices refer to positions in this table.
pub static CATALOG: [MeasurementField; 23] = [
    MeasurementField::power("powerBattery", "Battery Power"),
    MeasurementField::energy("counterOutBattery", "Battery Energy Out"),
    MeasurementField::energy("counterInBattery", "Battery Energy In"),
    MeasurementField::power("powerMCHP", "µCHP Power"),
    MeasurementField::energy("counterOutMCHP", "µCHP Energy Out"),
    MeasurementField::energy("counterInMCHP", "µCHP Energy In"),
    MeasurementField::power("powerSolar", "Solar Power"),
    MeasurementField::energy("counterOutSolar", "Solar Energy Out"),
    MeasurementField::energy("counterInSolar", "Solar Energy In"),
    MeasurementField::power("powerEV", "EV Power"),
    MeasurementField::energy("counterOutEV", "EV Energy Out"),
    MeasurementField::energy("counterInEV", "EV Energy In"),
    MeasurementField::power("powerMain", "Main Power"),
    MeasurementField::energy("counterOutMain", "Main Energy Out"),
    MeasurementField::energy("counterInMain", "Main Energy In"),
    MeasurementField::text("smartMeterTimestamp", "Smart Meter Timestamp", "mdi:av-timer"),
    MeasurementField::power("powerElectricity", "Grid Power"),
    MeasurementField::energy("counterElectricityInLow", "Grid Import Low Tariff"),
    MeasurementField::energy("counterElectricityOutLow", "Grid Export Low Tariff"),
    MeasurementField::energy("counterElectricityInHigh", "Grid Import High Tariff"),
    MeasurementField::energy("counterElectricityOutHigh", "Grid Export High Tariff"),
    MeasurementField::gas_rate("rateGas", "Gas Flow Rate"),
    MeasurementField::gas("counterGas", "Gas Counter"),
];

pub fn lookup(key: &str) -> Option<&'static MeasurementField> {
    CATALOG.iter().find(|field| field.key == key)
}

/// One configured selection entry: either a catalog index or a measurement key.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum SelectionEntry {
    Index(usize),
    Key(String),
}

/// The ordered set of measurements that get bridged.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Selection {
    fields: Vec<&'static MeasurementField>,
}

impl Selection {
    /// Every catalog entry, in device order.
    pub fn all() -> Self {
        Self {
            fields: CATALOG.iter().collect(),
        }
    }

    /// Resolves configured entries against the catalog. Any entry that does
    /// not name a catalog field fails the whole selection.
    pub fn resolve(entries: &[SelectionEntry]) -> Result<Self, ConfigError> {
        if entries.is_empty() {
            return Err(ConfigError::EmptySelection);
        }

        let mut fields: Vec<&'static MeasurementField> = Vec::with_capacity(entries.len());
        for entry in entries {
            let field = match entry {
                SelectionEntry::Index(index) => {
                    CATALOG.get(*index).ok_or(ConfigError::UnknownIndex {
                        index: *index,
                        len: CATALOG.len(),
                    })?
                }
                SelectionEntry::Key(key) => {
                    lookup(key).ok_or_else(|| ConfigError::UnknownKey(key.clone()))?
                }
            };
            if fields.iter().any(|selected| selected.key == field.key) {
                return Err(ConfigError::DuplicateSelection(field.key));
            }
            fields.push(field);
        }
        Ok(Self { fields })
    }

    pub fn fields(&self) -> &[&'static MeasurementField] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Pairs every selected field with its raw value from `snapshot`, in
    /// selection order. Fails on the first selected field the device did not report.
    pub fn readings<'a>(
        &self,
        snapshot: &'a Snapshot,
    ) -> Result<Vec<(&'static MeasurementField, &'a str)>, FetchError> {
        self.fields
            .iter()
            .map(|field| {
                snapshot
                    .get(field.key)
                    .map(|raw| (*field, raw))
                    .ok_or(FetchError::MissingMeasurement { key: field.key })
            })
            .collect()
    }
}

impl Default for Selection {
    fn default() -> Self {
        Self::all()
    }
}
