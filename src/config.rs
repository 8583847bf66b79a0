use serde::Deserialize;

use crate::error::Result;
use crate::geomath::{LatLonFormat, KILOMETERS_PER_MILE, MILES_PER_KILOMETER};
use crate::icon::IconPreset;

const KNOTS_PER_KILOMETER: f64 = 0.539_956_803;
const FEET_PER_METER: f64 = 3.280_839_895;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpeedUnits {
    #[default]
    Mph,
    Kph,
    Knots,
}

impl SpeedUnits {
    pub fn from_kph(&self, kph: f64) -> f64 {
        match self {
            SpeedUnits::Mph => kph * MILES_PER_KILOMETER,
            SpeedUnits::Kph => kph,
            SpeedUnits::Knots => kph * KNOTS_PER_KILOMETER,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SpeedUnits::Mph => "mph",
            SpeedUnits::Kph => "km/h",
            SpeedUnits::Knots => "knots",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AltitudeUnits {
    #[default]
    Feet,
    Meters,
}

impl AltitudeUnits {
    pub fn from_meters(&self, meters: f64) -> f64 {
        match self {
            AltitudeUnits::Feet => meters * FEET_PER_METER,
            AltitudeUnits::Meters => meters,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            AltitudeUnits::Feet => "feet",
            AltitudeUnits::Meters => "meters",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceUnits {
    #[default]
    Miles,
    Kilometers,
    NauticalMiles,
}

impl DistanceUnits {
    pub fn from_meters(&self, meters: f64) -> f64 {
        let km = meters / 1000.0;
        match self {
            DistanceUnits::Miles => km / KILOMETERS_PER_MILE,
            DistanceUnits::Kilometers => km,
            DistanceUnits::NauticalMiles => km * KNOTS_PER_KILOMETER,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            DistanceUnits::Miles => "miles",
            DistanceUnits::Kilometers => "km",
            DistanceUnits::NauticalMiles => "nm",
        }
    }
}

/// How a dataset's text color is applied to its detail rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayColorMode {
    Off,
    #[default]
    Foreground,
    /// Background color, lightened on odd rows.
    Background,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Viewport { width: 800, height: 600 }
    }
}

/// User-visible text, overridable for localisation.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Labels {
    pub info_date: String,
    pub info_gps: String,
    pub info_sats: String,
    pub info_speed: String,
    pub info_heading: String,
    pub info_altitude: String,
    pub info_address: String,
    pub device: String,
    pub date: String,
    pub code: String,
    pub lat_lon: String,
    pub sat_count: String,
    pub speed: String,
    pub heading: String,
    pub address: String,
    pub show_details: String,
    pub hide_details: String,
    pub max_pushpins: String,
    pub unavailable: String,
    pub meters: String,
    pub loading: String,
}

impl Default for Labels {
    fn default() -> Self {
        Labels {
            info_date: "Date".into(),
            info_gps: "GPS".into(),
            info_sats: "Sats".into(),
            info_speed: "Speed".into(),
            info_heading: "Heading".into(),
            info_altitude: "Altitude".into(),
            info_address: "Address".into(),
            device: "Device".into(),
            date: "Date/Time".into(),
            code: "Status".into(),
            lat_lon: "Lat/Lon".into(),
            sat_count: "#Sats".into(),
            speed: "Speed".into(),
            heading: "Heading".into(),
            address: "Address".into(),
            show_details: "Show Location Details".into(),
            hide_details: "Hide Location Details".into(),
            max_pushpins: "Only the most recent locations are displayed".into(),
            unavailable: "unavailable".into(),
            meters: "meters".into(),
            loading: "Loading, please wait...".into(),
        }
    }
}

/// Map page configuration, supplied by the host page as JSON.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MapConfig {
    /// Per-dataset pushpin cap; older points beyond it are dropped.
    pub max_pushpins: usize,
    pub route_line_show: bool,
    pub route_line_color: String,
    pub fixed_zoom: bool,
    pub is_fleet: bool,
    /// Index cells open the matching pushpin popup.
    pub detail_info_box: bool,
    pub detail_center_pushpin: bool,
    pub detail_ascending: bool,
    /// Render the detail report in its own window instead of under the map.
    pub detail_window: bool,
    pub show_sat_count: bool,
    pub combine_speed_heading: bool,
    pub show_altitude: bool,
    pub include_blank_address: bool,
    pub show_optional_fields: bool,
    pub optional_field_titles: Vec<String>,
    pub speed_units: SpeedUnits,
    pub altitude_units: AltitudeUnits,
    pub distance_units: DistanceUnits,
    pub latlon_format: LatLonFormat,
    pub display_color: DisplayColorMode,
    pub pushpin_icons: Vec<IconPreset>,
    pub auto_update_interval_secs: u32,
    /// Pick radius for map clicks.
    pub click_tolerance_m: f64,
    pub viewport: Viewport,
    pub image_base_dir: String,
    pub labels: Labels,
}

impl Default for MapConfig {
    fn default() -> Self {
        MapConfig {
            max_pushpins: 500,
            route_line_show: true,
            route_line_color: "#FF2222".into(),
            fixed_zoom: false,
            is_fleet: false,
            detail_info_box: true,
            detail_center_pushpin: false,
            detail_ascending: true,
            detail_window: false,
            show_sat_count: false,
            combine_speed_heading: true,
            show_altitude: false,
            include_blank_address: false,
            show_optional_fields: false,
            optional_field_titles: Vec::new(),
            speed_units: SpeedUnits::default(),
            altitude_units: AltitudeUnits::default(),
            distance_units: DistanceUnits::default(),
            latlon_format: LatLonFormat::default(),
            display_color: DisplayColorMode::default(),
            pushpin_icons: IconPreset::defaults(),
            auto_update_interval_secs: 30,
            click_tolerance_m: 50.0,
            viewport: Viewport::default(),
            image_base_dir: "images".into(),
            labels: Labels::default(),
        }
    }
}

impl MapConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        if json.trim().is_empty() {
            return Ok(MapConfig::default());
        }
        let config: MapConfig = serde_json::from_str(json)?;
        log::debug!(
            "map config: max_pushpins={} fixed_zoom={} fleet={}",
            config.max_pushpins,
            config.fixed_zoom,
            config.is_fleet
        );
        Ok(config)
    }

    /// Title of the optional field at `index`, if one is configured.
    pub fn optional_field_title(&self, index: usize) -> Option<&str> {
        self.optional_field_titles
            .get(index)
            .map(String::as_str)
            .filter(|t| !t.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let config = MapConfig::from_json(r#"{"max_pushpins": 10, "speed_units": "kph", "labels": {"date": "Fecha"}}"#).unwrap();
        assert_eq!(config.max_pushpins, 10);
        assert_eq!(config.speed_units, SpeedUnits::Kph);
        assert_eq!(config.labels.date, "Fecha");
        assert_eq!(config.labels.device, "Device");
        assert!(config.route_line_show);
        assert!(!config.pushpin_icons.is_empty());
    }

    #[test]
    fn empty_json_is_default() {
        let config = MapConfig::from_json("  ").unwrap();
        assert_eq!(config.max_pushpins, 500);
    }

    #[test]
    fn bad_json_is_config_error() {
        let err = MapConfig::from_json("{max").unwrap_err();
        assert!(matches!(err, crate::error::TrackError::Config(_)));
    }

    #[test]
    fn unit_conversions() {
        assert!((SpeedUnits::Mph.from_kph(100.0) - 62.137).abs() < 0.01);
        assert!((AltitudeUnits::Feet.from_meters(100.0) - 328.08).abs() < 0.01);
        assert!((DistanceUnits::Kilometers.from_meters(1500.0) - 1.5).abs() < 1e-9);
    }
}
