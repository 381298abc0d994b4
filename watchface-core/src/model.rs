use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Path the phone writes snapshots under and the watch listens on.
pub const WEATHER_DATA_PATH: &str = "/weather-data";

pub const KEY_DATE: &str = "date";
pub const KEY_WEATHER_ID: &str = "weatherId";
pub const KEY_MAX_TEMP: &str = "maxTemp";
pub const KEY_MIN_TEMP: &str = "minTemp";

/// One row from the weather-data store, temperatures in degrees Celsius.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeatherRow {
    pub condition_code: i32,
    pub max_temp: f64,
    pub min_temp: f64,
}

/// A single typed value in a [`DataMap`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DataValue {
    Int(i32),
    String(String),
}

/// Flat key/value bundle moved by a transport under a path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DataMap(BTreeMap<String, DataValue>);

impl DataMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_string(&mut self, key: &str, value: impl Into<String>) {
        self.0.insert(key.to_string(), DataValue::String(value.into()));
    }

    pub fn put_int(&mut self, key: &str, value: i32) {
        self.0.insert(key.to_string(), DataValue::Int(value));
    }

    pub fn get(&self, key: &str) -> Option<&DataValue> {
        self.0.get(key)
    }

    pub fn get_string(&self, key: &str) -> Option<&str> {
        match self.0.get(key) {
            Some(DataValue::String(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn get_int(&self, key: &str) -> Option<i32> {
        match self.0.get(key) {
            Some(DataValue::Int(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<DataValue> {
        self.0.remove(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &DataValue)> {
        self.0.iter()
    }
}

/// A data-map event that could not be turned into a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SnapshotError {
    #[error("malformed event: field '{0}' is missing")]
    MissingField(&'static str),

    #[error("malformed event: field '{0}' has the wrong type")]
    WrongType(&'static str),
}

/// Immutable weather reading with display-ready temperatures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeatherSnapshot {
    timestamp: String,
    condition_code: i32,
    max_temperature: String,
    min_temperature: String,
}

impl WeatherSnapshot {
    pub fn new(
        timestamp: impl Into<String>,
        condition_code: i32,
        max_temperature: impl Into<String>,
        min_temperature: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: timestamp.into(),
            condition_code,
            max_temperature: max_temperature.into(),
            min_temperature: min_temperature.into(),
        }
    }

    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }

    pub fn condition_code(&self) -> i32 {
        self.condition_code
    }

    pub fn max_temperature(&self) -> &str {
        &self.max_temperature
    }

    pub fn min_temperature(&self) -> &str {
        &self.min_temperature
    }

    /// Encode into the wire bundle written under [`WEATHER_DATA_PATH`].
    pub fn to_data_map(&self) -> DataMap {
        let mut map = DataMap::new();
        map.put_string(KEY_DATE, self.timestamp.as_str());
        map.put_int(KEY_WEATHER_ID, self.condition_code);
        map.put_string(KEY_MAX_TEMP, self.max_temperature.as_str());
        map.put_string(KEY_MIN_TEMP, self.min_temperature.as_str());
        map
    }
}

impl TryFrom<&DataMap> for WeatherSnapshot {
    type Error = SnapshotError;

    /// The watch never reads `date`, so a bundle without it still decodes.
    fn try_from(map: &DataMap) -> Result<Self, Self::Error> {
        let condition_code = match map.get(KEY_WEATHER_ID) {
            Some(DataValue::Int(v)) => *v,
            Some(_) => return Err(SnapshotError::WrongType(KEY_WEATHER_ID)),
            None => return Err(SnapshotError::MissingField(KEY_WEATHER_ID)),
        };

        let max_temperature = required_string(map, KEY_MAX_TEMP)?;
        let min_temperature = required_string(map, KEY_MIN_TEMP)?;

        let timestamp = match map.get(KEY_DATE) {
            Some(DataValue::String(s)) => s.clone(),
            Some(_) => return Err(SnapshotError::WrongType(KEY_DATE)),
            None => String::new(),
        };

        Ok(Self { timestamp, condition_code, max_temperature, min_temperature })
    }
}

fn required_string(map: &DataMap, key: &'static str) -> Result<String, SnapshotError> {
    match map.get(key) {
        Some(DataValue::String(s)) => Ok(s.clone()),
        Some(_) => Err(SnapshotError::WrongType(key)),
        None => Err(SnapshotError::MissingField(key)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_encodes_wire_keys() {
        let snapshot = WeatherSnapshot::new("Sat Oct 17 09:00:00 +0000 2026", 200, "25°", "15°");
        let map = snapshot.to_data_map();

        assert_eq!(map.len(), 4);
        assert_eq!(map.get_string("date"), Some("Sat Oct 17 09:00:00 +0000 2026"));
        assert_eq!(map.get_int("weatherId"), Some(200));
        assert_eq!(map.get_string("maxTemp"), Some("25°"));
        assert_eq!(map.get_string("minTemp"), Some("15°"));
    }

    #[test]
    fn missing_condition_is_malformed() {
        let mut map = DataMap::new();
        map.put_string(KEY_MAX_TEMP, "25°");
        map.put_string(KEY_MIN_TEMP, "15°");

        let err = WeatherSnapshot::try_from(&map).unwrap_err();
        assert_eq!(err, SnapshotError::MissingField(KEY_WEATHER_ID));
        assert!(err.to_string().contains("weatherId"));
    }

    #[test]
    fn wrongly_typed_temperature_is_malformed() {
        let mut map = DataMap::new();
        map.put_int(KEY_WEATHER_ID, 800);
        map.put_int(KEY_MAX_TEMP, 25);
        map.put_string(KEY_MIN_TEMP, "15°");

        let err = WeatherSnapshot::try_from(&map).unwrap_err();
        assert_eq!(err, SnapshotError::WrongType(KEY_MAX_TEMP));
    }

    #[test]
    fn missing_date_decodes_to_empty_timestamp() {
        let mut map = WeatherSnapshot::new("now", 800, "20°", "10°").to_data_map();
        map.remove(KEY_DATE);

        let snapshot = WeatherSnapshot::try_from(&map).expect("date is optional");
        assert_eq!(snapshot.timestamp(), "");
        assert_eq!(snapshot.condition_code(), 800);
    }

    #[test]
    fn data_map_serializes_as_flat_json() {
        let map = WeatherSnapshot::new("d", 500, "12°", "7°").to_data_map();
        let json = serde_json::to_value(&map).expect("serializable");

        assert_eq!(
            json,
            serde_json::json!({"date": "d", "weatherId": 500, "maxTemp": "12°", "minTemp": "7°"})
        );

        let back: DataMap = serde_json::from_value(json).expect("deserializable");
        assert_eq!(back, map);
    }
}
