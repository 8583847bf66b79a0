//! The `|`-separated event record carried in each `P` element.
//!
//! Column order: short name, device id, epoch, date, time, timezone, status
//! code, icon index, latitude, longitude, satellites, km/h, heading,
//! altitude (m), odometer (km), address, then any optional fields.

use serde::Serialize;

use crate::geomath::{compass, MILES_PER_KILOMETER};
use crate::types::GeoPoint;

pub const FIELD_SEPARATOR: char = '|';

/// Records need at least the latitude column to be usable.
const MIN_FIELDS: usize = 9;
const OPTIONAL_FIELDS_START: usize = 16;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EventRecord {
    /// Detail record index, assigned while building the view model.
    pub index: Option<usize>,
    pub short_name: String,
    pub device: String,
    pub timestamp: i64,
    pub date_fmt: String,
    pub time_fmt: String,
    pub time_zone: String,
    pub code: String,
    pub icon_index: Option<usize>,
    pub latitude: f64,
    pub longitude: f64,
    pub sat_count: u32,
    pub speed_kph: f64,
    pub heading: f64,
    pub altitude: f64,
    pub odometer_km: f64,
    pub address: String,
    pub optional_fields: Vec<String>,
}

fn number(fields: &[&str], i: usize) -> f64 {
    fields.get(i).and_then(|s| s.trim().parse().ok()).unwrap_or(0.0)
}

fn text(fields: &[&str], i: usize) -> String {
    fields.get(i).map(|s| s.to_string()).unwrap_or_default()
}

impl EventRecord {
    /// Returns `None` for records too short to carry a position.
    pub fn parse(record: &str) -> Option<EventRecord> {
        let fields: Vec<&str> = record.split(FIELD_SEPARATOR).collect();
        if fields.len() < MIN_FIELDS {
            return None;
        }

        let address = fields.get(15).map(|s| s.trim()).unwrap_or("");
        let address = address.strip_prefix('"').unwrap_or(address);
        let address = address.strip_suffix('"').unwrap_or(address);

        Some(EventRecord {
            index: None,
            short_name: text(&fields, 0),
            device: text(&fields, 1),
            timestamp: fields.get(2).and_then(|s| s.trim().parse().ok()).unwrap_or(0),
            date_fmt: text(&fields, 3),
            time_fmt: text(&fields, 4),
            time_zone: text(&fields, 5),
            code: text(&fields, 6),
            icon_index: fields.get(7).and_then(|s| s.trim().parse().ok()),
            latitude: number(&fields, 8),
            longitude: number(&fields, 9),
            sat_count: fields.get(10).and_then(|s| s.trim().parse().ok()).unwrap_or(0),
            speed_kph: number(&fields, 11),
            heading: number(&fields, 12),
            altitude: number(&fields, 13),
            odometer_km: number(&fields, 14),
            address: address.to_string(),
            optional_fields: fields
                .iter()
                .skip(OPTIONAL_FIELDS_START)
                .map(|s| s.to_string())
                .collect(),
        })
    }

    pub fn position(&self) -> GeoPoint {
        GeoPoint::new(self.latitude, self.longitude)
    }

    pub fn has_valid_gps(&self) -> bool {
        self.position().is_valid()
    }

    pub fn speed_mph(&self) -> f64 {
        self.speed_kph * MILES_PER_KILOMETER
    }

    pub fn compass(&self) -> &'static str {
        compass(self.heading)
    }

    /// Year/month/day read from a `YYYY/MM/DD` style formatted date.
    pub fn ymd(&self) -> Option<(i32, u32, u32)> {
        let mut parts = self
            .date_fmt
            .split(|c: char| !c.is_ascii_digit())
            .filter(|s| !s.is_empty());
        let year = parts.next().filter(|y| y.len() == 4)?.parse().ok()?;
        let month = parts.next()?.parse().ok()?;
        let day = parts.next()?.parse().ok()?;
        Some((year, month, day))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RECORD: &str = "Truck 7|truck7|1262304000|2010/01/01|08:00:00|PST|InMotion|2|39.1234|-142.5678|7|96.56|92|120|1500|\"1 Main St\"|Cargo A|Driver B";

    #[test]
    fn parses_full_record() {
        let rec = EventRecord::parse(RECORD).unwrap();
        assert_eq!(rec.short_name, "Truck 7");
        assert_eq!(rec.device, "truck7");
        assert_eq!(rec.timestamp, 1262304000);
        assert_eq!(rec.icon_index, Some(2));
        assert_eq!(rec.sat_count, 7);
        assert_eq!(rec.address, "1 Main St");
        assert_eq!(rec.optional_fields, vec!["Cargo A", "Driver B"]);
        assert!(rec.has_valid_gps());
        assert_eq!(rec.compass(), "E");
        assert!((rec.speed_mph() - 60.0).abs() < 0.01);
        assert_eq!(rec.ymd(), Some((2010, 1, 1)));
    }

    #[test]
    fn short_records_are_rejected() {
        assert!(EventRecord::parse("a|b|c|d|e|f|g|h").is_none());
        assert!(EventRecord::parse("").is_none());
    }

    #[test]
    fn zero_position_is_not_a_fix() {
        let rec = EventRecord::parse("x|dev|0|||||0|0|0").unwrap();
        assert!(!rec.has_valid_gps());
        assert_eq!(rec.icon_index, Some(0));
        assert_eq!(rec.address, "");
        assert!(rec.optional_fields.is_empty());
    }
}
