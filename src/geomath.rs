//! Pure geodesy and color helpers shared by the builders and providers.

use serde::{Deserialize, Serialize};

use crate::types::GeoPoint;

pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;
pub const MILES_PER_KILOMETER: f64 = 0.621_371_192;
pub const KILOMETERS_PER_MILE: f64 = 1.609_344;

/// Compass sector names, clockwise from north.
pub const COMPASS: [&str; 8] = ["N", "NE", "E", "SE", "S", "SW", "W", "NW"];

pub fn distance_meters(a: &GeoPoint, b: &GeoPoint) -> f64 {
    let ap = haversine_rs::point::Point { latitude: a.latitude, longitude: a.longitude };
    let bp = haversine_rs::point::Point { latitude: b.latitude, longitude: b.longitude };
    haversine_rs::distance(ap, bp, haversine_rs::units::Unit::Meters)
}

/// The point `radius_m` away from `center` along `heading` (degrees).
pub fn radius_point(center: &GeoPoint, radius_m: f64, heading: f64) -> GeoPoint {
    let lat1 = center.latitude.to_radians();
    let lon1 = center.longitude.to_radians();
    let d = radius_m / EARTH_RADIUS_METERS;
    let bearing = heading.to_radians();
    let lat2 = (lat1.sin() * d.cos() + lat1.cos() * d.sin() * bearing.cos()).asin();
    let lon2 = lon1
        + (bearing.sin() * d.sin() * lat1.cos()).atan2(d.cos() - lat1.sin() * lat2.sin());
    GeoPoint::new(lat2.to_degrees(), lon2.to_degrees())
}

/// Closed ring approximating a circle, one vertex every 5 degrees.
pub fn circle_points(center: &GeoPoint, radius_m: f64) -> Vec<GeoPoint> {
    (0..=360)
        .step_by(5)
        .map(|deg| radius_point(center, radius_m, f64::from(deg)))
        .collect()
}

/// One of 8 compass sectors (0 = north) for a heading in degrees.
pub fn heading_bucket(heading: f64) -> usize {
    ((heading / 45.0).round() as i64).rem_euclid(8) as usize
}

pub fn compass(heading: f64) -> &'static str {
    COMPASS[heading_bucket(heading)]
}

// ** Colors **

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

pub const GREEN: Rgb = Rgb { r: 0, g: 210, b: 0 };
pub const YELLOW: Rgb = Rgb { r: 240, g: 240, b: 0 };
pub const RED: Rgb = Rgb { r: 255, g: 0, b: 0 };
pub const BLACK: Rgb = Rgb { r: 0, g: 0, b: 0 };

impl Rgb {
    /// Parses `#RRGGBB` or `RRGGBB`.
    pub fn parse(hex: &str) -> Option<Rgb> {
        let hex = hex.trim().trim_start_matches('#');
        if hex.len() != 6 || !hex.is_ascii() {
            return None;
        }
        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
        Some(Rgb { r: channel(0)?, g: channel(2)?, b: channel(4)? })
    }

    /// Uppercase hex without the leading `#`.
    pub fn hex(&self) -> String {
        format!("{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }

    /// Moves each channel `factor` of the way towards white.
    pub fn lighter(&self, factor: f64) -> Rgb {
        let lift = |c: u8| (f64::from(c) + (255.0 - f64::from(c)) * factor).round().clamp(0.0, 255.0) as u8;
        Rgb { r: lift(self.r), g: lift(self.g), b: lift(self.b) }
    }

    /// Linear blend from `self` (t = 0) to `other` (t = 1).
    pub fn blend(&self, other: &Rgb, t: f64) -> Rgb {
        let mix = |a: u8, b: u8| ((f64::from(b) - f64::from(a)) * t + f64::from(a)).round() as u8;
        Rgb { r: mix(self.r, other.r), g: mix(self.g, other.g), b: mix(self.b, other.b) }
    }
}

/// Red when stopped, fading through yellow at 20 mph to green at 70 mph and above.
pub fn speed_color(mph: f64) -> Rgb {
    if mph > 70.0 {
        GREEN
    } else if mph >= 20.0 {
        YELLOW.blend(&GREEN, (mph - 20.0) / (70.0 - 20.0))
    } else if mph >= 0.0 {
        RED.blend(&YELLOW, mph / 20.0)
    } else {
        BLACK
    }
}

// ** Coordinate formatting **

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LatLonFormat {
    #[default]
    Decimal,
    /// `DD°MM'SS"Q`
    Dms,
    /// `DD°MM.mm'Q`
    Dm,
}

/// Minutes decimal places in the DM format.
const MINUTE_DECIMALS: usize = 2;

/// HTML-formatted coordinate (`&deg;` entities in the sexagesimal formats).
pub fn format_coord(value: f64, is_lat: bool, decimals: usize, format: LatLonFormat) -> String {
    let quad = match (is_lat, value >= 0.0) {
        (true, true) => COMPASS[0],
        (true, false) => COMPASS[4],
        (false, true) => COMPASS[2],
        (false, false) => COMPASS[6],
    };
    let abs = value.abs();
    let deg = abs.trunc();
    let minutes = (abs - deg) * 60.0;
    match format {
        LatLonFormat::Decimal => format!("{:.*}", decimals, value),
        LatLonFormat::Dms => {
            let min = minutes.trunc();
            let sec = ((minutes - min) * 60.0).trunc();
            format!("{}&deg;{:02}'{:02}&quot;{}", deg as i64, min as i64, sec as i64, quad)
        }
        LatLonFormat::Dm => {
            let width = MINUTE_DECIMALS + 3;
            format!("{}&deg;{:0width$.prec$}'{}", deg as i64, minutes, quad, width = width, prec = MINUTE_DECIMALS)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn speed_color_thresholds() {
        assert_eq!(speed_color(80.0), GREEN);
        assert_eq!(speed_color(0.0), RED);
        assert_eq!(speed_color(-1.0), BLACK);

        let mid = speed_color(45.0);
        assert!(mid.r > GREEN.r && mid.r < YELLOW.r);
        assert!(mid.g > GREEN.g && mid.g < YELLOW.g);
        assert_eq!(mid.b, 0);

        let slow = speed_color(10.0);
        assert!(slow.g > RED.g && slow.g < YELLOW.g);
    }

    #[test]
    fn heading_buckets_wrap_north() {
        assert_eq!(heading_bucket(0.0), 0);
        assert_eq!(heading_bucket(44.0), 1);
        assert_eq!(heading_bucket(350.0), 0);
        assert_eq!(heading_bucket(180.0), 4);
        assert_eq!(compass(270.0), "W");
        assert_eq!(compass(-45.0), "NW");
    }

    #[test]
    fn radius_point_lies_due_east_at_distance() {
        let center = GeoPoint::new(47.3769, 8.5417);
        let east = radius_point(&center, 1000.0, 90.0);
        assert!((distance_meters(&center, &east) - 1000.0).abs() < 5.0);
        assert!((east.latitude - center.latitude).abs() < 1e-3);
        assert!(east.longitude > center.longitude);
    }

    #[test]
    fn circle_is_closed_ring() {
        let center = GeoPoint::new(10.0, 10.0);
        let ring = circle_points(&center, 500.0);
        assert_eq!(ring.len(), 73);
        let first = ring[0];
        let last = ring[ring.len() - 1];
        assert!((first.latitude - last.latitude).abs() < 1e-9);
        assert!((first.longitude - last.longitude).abs() < 1e-9);
    }

    #[test]
    fn rgb_parse_and_lighten() {
        let c = Rgb::parse("#FF0000").unwrap();
        assert_eq!(c, RED);
        assert_eq!(c.hex(), "FF0000");
        assert_eq!(Rgb::parse("nope"), None);
        let light = Rgb { r: 0, g: 0, b: 0 }.lighter(0.5);
        assert_eq!(light, Rgb { r: 128, g: 128, b: 128 });
    }

    #[test]
    fn coordinate_formats() {
        assert_eq!(format_coord(47.376887, true, 4, LatLonFormat::Decimal), "47.3769");
        assert_eq!(format_coord(-122.5, false, 2, LatLonFormat::Dms), "122&deg;30'00&quot;W");
        assert_eq!(format_coord(-33.5, true, 2, LatLonFormat::Dm), "33&deg;30.00'S");
    }
}
