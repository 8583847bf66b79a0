use serde::{Deserialize, Serialize};

use crate::event::EventRecord;
use crate::geomath::distance_meters;

// ** Coordinates **

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        GeoPoint { latitude, longitude }
    }

    /// (0,0) is the "no fix" marker used by devices and the server alike.
    pub fn is_valid(&self) -> bool {
        self.latitude != 0.0 || self.longitude != 0.0
    }
}

/// Meters per pixel at zoom 0 on the equator for 256px web-mercator tiles.
const EQUATOR_METERS_PER_PIXEL: f64 = 156_543.033_92;
pub const MAX_ZOOM: u8 = 20;
/// Zoom used when the bounds collapse to a single point.
pub const SINGLE_POINT_ZOOM: u8 = 15;

/// Min/max latitude/longitude accumulator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Bounds {
    pub min_lat: f64,
    pub min_lon: f64,
    pub max_lat: f64,
    pub max_lon: f64,
}

impl Default for Bounds {
    fn default() -> Self {
        Bounds {
            min_lat: 90.0,
            min_lon: 180.0,
            max_lat: -90.0,
            max_lon: -180.0,
        }
    }
}

impl Bounds {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a GeoPoint>) -> Self {
        let mut bounds = Bounds::new();
        for point in points {
            bounds.extend(point);
        }
        bounds
    }

    pub fn extend(&mut self, point: &GeoPoint) {
        self.extend_lat(point.latitude);
        self.extend_lon(point.longitude);
    }

    pub fn extend_lat(&mut self, lat: f64) {
        self.max_lat = self.max_lat.max(lat);
        self.min_lat = self.min_lat.min(lat);
    }

    pub fn extend_lon(&mut self, lon: f64) {
        self.max_lon = self.max_lon.max(lon);
        self.min_lon = self.min_lon.min(lon);
    }

    /// True until at least one point has been added.
    pub fn is_empty(&self) -> bool {
        self.min_lat > self.max_lat || self.min_lon > self.max_lon
    }

    pub fn min(&self) -> GeoPoint {
        GeoPoint::new(self.min_lat, self.min_lon)
    }

    pub fn max(&self) -> GeoPoint {
        GeoPoint::new(self.max_lat, self.max_lon)
    }

    pub fn center(&self) -> GeoPoint {
        GeoPoint::new(
            (self.min_lat + self.max_lat) / 2.0,
            (self.min_lon + self.max_lon) / 2.0,
        )
    }

    /// Delta longitude, in degrees.
    pub fn width(&self) -> f64 {
        self.max_lon - self.min_lon
    }

    /// Delta latitude, in degrees.
    pub fn height(&self) -> f64 {
        self.max_lat - self.min_lat
    }

    /// Width measured along the southern edge.
    pub fn width_meters(&self) -> f64 {
        let lat = self.min_lat;
        distance_meters(
            &GeoPoint::new(lat, self.min_lon),
            &GeoPoint::new(lat, self.max_lon),
        )
    }

    /// Height measured along the western edge.
    pub fn height_meters(&self) -> f64 {
        let lon = self.min_lon;
        distance_meters(
            &GeoPoint::new(self.min_lat, lon),
            &GeoPoint::new(self.max_lat, lon),
        )
    }

    /// Scale needed to fit these bounds into a viewport of the given pixel size.
    pub fn meters_per_pixel(&self, view_width: u32, view_height: u32) -> f64 {
        let mpp_w = self.width_meters() / f64::from(view_width.max(1));
        let mpp_h = self.height_meters() / f64::from(view_height.max(1));
        mpp_w.max(mpp_h)
    }

    /// Largest web-mercator zoom level at which the bounds still fit the viewport.
    pub fn recommended_zoom(&self, view_width: u32, view_height: u32) -> u8 {
        if self.is_empty() {
            return 0;
        }
        let mpp = self.meters_per_pixel(view_width, view_height);
        if mpp <= 0.0 {
            return SINGLE_POINT_ZOOM;
        }
        let lat = self.center().latitude.to_radians();
        let zoom = (EQUATOR_METERS_PER_PIXEL * lat.cos() / mpp).log2().floor();
        zoom.clamp(0.0, f64::from(MAX_ZOOM)) as u8
    }
}

// ** Shapes **

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShapeType {
    Circle,
    Rectangle,
    Polygon,
    None,
}

impl ShapeType {
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "circle" => ShapeType::Circle,
            "rectangle" => ShapeType::Rectangle,
            "polygon" => ShapeType::Polygon,
            _ => ShapeType::None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ShapeType::Circle => "circle",
            ShapeType::Rectangle => "rectangle",
            ShapeType::Polygon => "polygon",
            ShapeType::None => "none",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapShape {
    pub shape_type: ShapeType,
    pub radius_m: f64,
    pub points: Vec<GeoPoint>,
    pub color: String,
    pub recenter: bool,
}

/// Geozone types understood by the zone editor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeozoneType {
    PointRadius = 0,
    BoundedRect = 1,
    SweptPointRadius = 2,
    Polygon = 3,
}

// ** View model **

/// Opaque handle a provider attaches to a pushpin it has drawn.
pub type MarkerHandle = u64;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IconDescriptor {
    pub url: String,
    pub size: [u32; 2],
    pub offset: [i32; 2],
    pub shadow_url: String,
    pub shadow_size: [u32; 2],
}

#[derive(Debug, Clone, Serialize)]
pub struct Pushpin {
    /// Detail record index (1-based); `None` for points of interest.
    pub record_index: Option<usize>,
    /// Owning dataset; `None` for points of interest.
    pub dataset_index: Option<usize>,
    pub pin_index: usize,
    pub event: EventRecord,
    pub position: GeoPoint,
    pub label: String,
    pub html: String,
    pub icon: IconDescriptor,
    pub marker: Option<MarkerHandle>,
    pub popup_shown: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSetKind {
    Device,
    Group,
    Poi,
}

impl DataSetKind {
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "group" => DataSetKind::Group,
            "poi" => DataSetKind::Poi,
            _ => DataSetKind::Device,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DataSet {
    pub kind: DataSetKind,
    pub id: String,
    pub pushpins: Vec<Pushpin>,
    /// Empty unless route display is on and at least two valid points exist.
    pub route: Vec<GeoPoint>,
    pub route_color: String,
    pub partial: bool,
}

impl DataSet {
    pub fn has_route(&self) -> bool {
        self.route.len() >= 2
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetailRow {
    pub index: usize,
    pub dataset_index: Option<usize>,
    pub pin_index: Option<usize>,
    pub device: String,
    pub date_time: String,
    pub time_zone: String,
    pub code: String,
    pub lat_lon: String,
    pub sat_count: u32,
    /// Speed in the configured units, formatted to one decimal.
    pub speed: String,
    pub moving: bool,
    pub heading: String,
    pub compass: &'static str,
    pub altitude: f64,
    pub address: String,
    pub optional_fields: Vec<String>,
    pub color: String,
}

// ** Recenter / replay **

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecenterMode {
    /// Leave the viewport alone.
    None = 0,
    /// Center and zoom on the last point.
    Last = 1,
    /// Fit all points.
    Zoom = 2,
    /// Pan to the last point keeping the zoom.
    Pan = 3,
}

impl RecenterMode {
    pub fn from_code(code: u8) -> Self {
        match code {
            1 => RecenterMode::Last,
            2 => RecenterMode::Zoom,
            3 => RecenterMode::Pan,
            _ => RecenterMode::None,
        }
    }

    /// Fixed-zoom maps never move the viewport on their own.
    pub fn for_fixed_zoom(self, fixed_zoom: bool) -> Self {
        if fixed_zoom {
            RecenterMode::None
        } else {
            self
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplayState {
    #[default]
    Stopped = 0,
    Paused = 1,
    Running = 2,
}

impl ReplayState {
    pub fn from_code(code: u8) -> Self {
        match code {
            1 => ReplayState::Paused,
            2 => ReplayState::Running,
            _ => ReplayState::Stopped,
        }
    }

    pub fn is_active(&self) -> bool {
        *self != ReplayState::Stopped
    }
}

// ** Time snapshots **

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TimeSnapshot {
    pub epoch: i64,
    pub timezone: String,
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub date_fmt: String,
    pub time_fmt: String,
}

impl TimeSnapshot {
    pub fn has_date_time(&self) -> bool {
        !self.date_fmt.is_empty() && !self.time_fmt.is_empty()
    }
}

/// Most recent event seen for the tracked device; survives poll cycles.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LastEvent {
    pub time: TimeSnapshot,
    pub battery: f64,
    pub signal: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounds_accumulate_min_max_and_center() {
        let points = [
            GeoPoint::new(0.0, 0.0),
            GeoPoint::new(10.0, 10.0),
            GeoPoint::new(-5.0, 20.0),
        ];
        let bounds = Bounds::from_points(&points);
        assert_eq!(bounds.min(), GeoPoint::new(-5.0, 0.0));
        assert_eq!(bounds.max(), GeoPoint::new(10.0, 20.0));
        assert_eq!(bounds.center(), GeoPoint::new(2.5, 10.0));
        assert_eq!(bounds.width(), 20.0);
        assert_eq!(bounds.height(), 15.0);
    }

    #[test]
    fn empty_bounds_until_extended() {
        let mut bounds = Bounds::new();
        assert!(bounds.is_empty());
        bounds.extend(&GeoPoint::new(47.3, 8.5));
        assert!(!bounds.is_empty());
        assert_eq!(bounds.recommended_zoom(800, 600), SINGLE_POINT_ZOOM);
    }

    #[test]
    fn smaller_bounds_zoom_in_further() {
        let city = Bounds::from_points(&[GeoPoint::new(47.36, 8.52), GeoPoint::new(47.39, 8.56)]);
        let country = Bounds::from_points(&[GeoPoint::new(45.8, 5.9), GeoPoint::new(47.8, 10.5)]);
        let city_zoom = city.recommended_zoom(800, 600);
        let country_zoom = country.recommended_zoom(800, 600);
        assert!(city_zoom > country_zoom);
        assert!(city_zoom <= MAX_ZOOM);
    }

    #[test]
    fn fixed_zoom_never_recenters() {
        for mode in [RecenterMode::None, RecenterMode::Last, RecenterMode::Zoom, RecenterMode::Pan] {
            assert_eq!(mode.for_fixed_zoom(true), RecenterMode::None);
            assert_eq!(mode.for_fixed_zoom(false), mode);
        }
    }
}
