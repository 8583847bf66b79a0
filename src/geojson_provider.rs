//! A headless map backend that keeps its layers as GeoJSON.
//!
//! It is the backend used when the host page renders GeoJSON itself, and the
//! one the session is tested against.

use std::collections::VecDeque;

use geo::{Coord, LineString, Point, Polygon, Rect};
use geojson::{Feature, FeatureCollection, GeoJson, Geometry, Value};
use rstar::{PointDistance, RTree, RTreeObject, AABB};
use serde_json::{json, Map, Value as JsonValue};

use crate::config::Viewport;
use crate::geomath::{circle_points, distance_meters};
use crate::provider::{Geozone, MapProvider};
use crate::types::{
    Bounds, GeoPoint, GeozoneType, MapShape, MarkerHandle, Pushpin, RecenterMode, ReplayState, ShapeType,
    SINGLE_POINT_ZOOM,
};

/// A drawn pushpin as stored in the pick index.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedMarker {
    pub handle: MarkerHandle,
    pub position: GeoPoint,
    pub record_index: Option<usize>,
    pub dataset_index: Option<usize>,
    pub pin_index: usize,
    pub poi: bool,
    label: String,
    icon: String,
    html: String,
}

impl PlacedMarker {
    fn new(handle: MarkerHandle, pushpin: &Pushpin, poi: bool) -> Self {
        PlacedMarker {
            handle,
            position: pushpin.position,
            record_index: pushpin.record_index,
            dataset_index: pushpin.dataset_index,
            pin_index: pushpin.pin_index,
            poi,
            label: pushpin.label.clone(),
            icon: pushpin.icon.url.clone(),
            html: pushpin.html.clone(),
        }
    }
}

impl RTreeObject for PlacedMarker {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point([self.position.latitude, self.position.longitude])
    }
}

// Haversine instead of Euclidean, squared as rstar expects.
impl PointDistance for PlacedMarker {
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        let d = distance_meters(&self.position, &GeoPoint::new(point[0], point[1]));
        d * d
    }
}

/// A line or area layer with its styling.
#[derive(Debug, Clone)]
struct Overlay {
    geometry: geo::Geometry<f64>,
    kind: &'static str,
    color: String,
}

fn coord(p: &GeoPoint) -> Coord<f64> {
    Coord { x: p.longitude, y: p.latitude }
}

fn ring(points: &[GeoPoint]) -> Polygon<f64> {
    Polygon::new(LineString::from(points.iter().map(coord).collect::<Vec<_>>()), vec![])
}

/// The polygon a shape covers, or `None` when it lacks the points it needs.
fn shape_polygon(shape_type: ShapeType, radius_m: f64, points: &[GeoPoint]) -> Option<Polygon<f64>> {
    match shape_type {
        ShapeType::Circle if radius_m > 0.0 => points.first().map(|c| ring(&circle_points(c, radius_m))),
        ShapeType::Rectangle if points.len() >= 2 => {
            Some(Rect::new(coord(&points[0]), coord(&points[1])).to_polygon())
        }
        ShapeType::Polygon if points.len() >= 3 => Some(ring(points)),
        _ => None,
    }
}

pub struct GeoJsonProvider {
    viewport: Viewport,
    next_handle: MarkerHandle,
    markers: RTree<PlacedMarker>,
    overlays: Vec<Overlay>,
    center: Option<GeoPoint>,
    zoom: Option<u8>,
    open_popup: Option<MarkerHandle>,
    replay: ReplayState,
    replay_queue: VecDeque<PlacedMarker>,
}

impl GeoJsonProvider {
    pub fn new(viewport: Viewport) -> Self {
        GeoJsonProvider {
            viewport,
            next_handle: 1,
            markers: RTree::new(),
            overlays: Vec::new(),
            center: None,
            zoom: None,
            open_popup: None,
            replay: ReplayState::Stopped,
            replay_queue: VecDeque::new(),
        }
    }

    pub fn center(&self) -> Option<GeoPoint> {
        self.center
    }

    pub fn zoom(&self) -> Option<u8> {
        self.zoom
    }

    pub fn marker_count(&self) -> usize {
        self.markers.size()
    }

    pub fn overlay_count(&self) -> usize {
        self.overlays.len()
    }

    pub fn open_popup(&self) -> Option<MarkerHandle> {
        self.open_popup
    }

    pub fn replay_state(&self) -> ReplayState {
        self.replay
    }

    /// The drawn pushpin nearest to `point` within `tolerance_m`.
    pub fn pushpin_at(&self, point: &GeoPoint, tolerance_m: f64) -> Option<&PlacedMarker> {
        let query = [point.latitude, point.longitude];
        self.markers
            .locate_within_distance(query, tolerance_m * tolerance_m)
            .min_by(|a, b| a.distance_2(&query).total_cmp(&b.distance_2(&query)))
    }

    /// Places the next queued replay marker, panning to it.
    ///
    /// Returns the new marker's handle, or `None` when replay is not running
    /// or has nothing left (which also ends it).
    pub fn advance_replay(&mut self) -> Option<MarkerHandle> {
        if self.replay != ReplayState::Running {
            return None;
        }
        match self.replay_queue.pop_front() {
            Some(marker) => {
                let handle = marker.handle;
                self.center = Some(marker.position);
                self.markers.insert(marker);
                Some(handle)
            }
            None => {
                log::debug!("replay finished");
                self.replay = ReplayState::Stopped;
                None
            }
        }
    }

    fn allocate_handle(&mut self) -> MarkerHandle {
        let handle = self.next_handle;
        self.next_handle += 1;
        handle
    }

    fn recenter(&mut self, pushpins: &[Pushpin], mode: RecenterMode) {
        let Some(last) = pushpins.last() else {
            return;
        };
        match mode {
            RecenterMode::None => {}
            RecenterMode::Last => {
                self.center = Some(last.position);
                self.zoom = Some(SINGLE_POINT_ZOOM);
            }
            RecenterMode::Pan => self.center = Some(last.position),
            RecenterMode::Zoom => {
                let bounds = Bounds::from_points(pushpins.iter().map(|p| &p.position));
                self.center = Some(bounds.center());
                self.zoom = Some(bounds.recommended_zoom(self.viewport.width, self.viewport.height));
            }
        }
    }

    fn push_polygon(&mut self, polygon: Polygon<f64>, kind: &'static str, color: &str) {
        self.overlays.push(Overlay {
            geometry: geo::Geometry::Polygon(polygon),
            kind,
            color: color.to_string(),
        });
    }

    fn marker_feature(marker: &PlacedMarker, open: bool) -> Feature {
        let point = Point::new(marker.position.longitude, marker.position.latitude);
        let mut properties = Map::new();
        properties.insert("kind".into(), json!(if marker.poi { "poi" } else { "pushpin" }));
        properties.insert("handle".into(), json!(marker.handle));
        properties.insert("label".into(), json!(marker.label));
        properties.insert("icon".into(), json!(marker.icon));
        properties.insert("html".into(), json!(marker.html));
        properties.insert("record_index".into(), json!(marker.record_index));
        properties.insert("popup".into(), json!(open));
        Feature {
            geometry: Some(Geometry::new(Value::from(&point))),
            properties: Some(properties),
            ..Default::default()
        }
    }

    /// Current layers as a FeatureCollection, bbox covering everything drawn.
    pub fn to_geojson(&self) -> GeoJson {
        let mut bounds = Bounds::new();
        let mut features = Vec::new();

        for overlay in &self.overlays {
            for c in geo::CoordsIter::coords_iter(&overlay.geometry) {
                bounds.extend(&GeoPoint::new(c.y, c.x));
            }
            let mut properties = Map::new();
            properties.insert("kind".into(), json!(overlay.kind));
            properties.insert("color".into(), JsonValue::String(overlay.color.clone()));
            features.push(Feature {
                geometry: Some(Geometry::new(Value::from(&overlay.geometry))),
                properties: Some(properties),
                ..Default::default()
            });
        }

        let mut markers: Vec<&PlacedMarker> = self.markers.iter().collect();
        markers.sort_by_key(|m| m.handle);
        for marker in markers {
            bounds.extend(&marker.position);
            features.push(Self::marker_feature(marker, self.open_popup == Some(marker.handle)));
        }

        let bbox = (!bounds.is_empty()).then(|| vec![bounds.min_lon, bounds.min_lat, bounds.max_lon, bounds.max_lat]);
        GeoJson::FeatureCollection(FeatureCollection {
            bbox,
            features,
            foreign_members: None,
        })
    }
}

impl MapProvider for GeoJsonProvider {
    fn clear_layers(&mut self) {
        self.markers = RTree::new();
        self.overlays.clear();
        self.open_popup = None;
        self.replay_queue.clear();
        self.replay = ReplayState::Stopped;
    }

    fn set_center(&mut self, center: &GeoPoint, zoom: Option<u8>) {
        self.center = Some(*center);
        if zoom.is_some() {
            self.zoom = zoom;
        }
    }

    fn draw_pushpins(&mut self, pushpins: &mut [Pushpin], recenter: RecenterMode, replay: ReplayState) {
        if replay == ReplayState::Running {
            self.replay_queue.clear();
            for pushpin in pushpins.iter_mut() {
                let handle = self.allocate_handle();
                pushpin.marker = Some(handle);
                self.replay_queue.push_back(PlacedMarker::new(handle, pushpin, false));
            }
            self.replay = ReplayState::Running;
            log::debug!("replay queued {} pushpins", self.replay_queue.len());
            return;
        }

        for pushpin in pushpins.iter_mut() {
            let handle = self.allocate_handle();
            pushpin.marker = Some(handle);
            self.markers.insert(PlacedMarker::new(handle, pushpin, false));
        }
        self.recenter(pushpins, recenter);
    }

    fn draw_poi(&mut self, pushpins: &mut [Pushpin]) {
        for pushpin in pushpins.iter_mut() {
            let handle = self.allocate_handle();
            pushpin.marker = Some(handle);
            self.markers.insert(PlacedMarker::new(handle, pushpin, true));
        }
    }

    fn draw_route(&mut self, route: &[GeoPoint], color: &str) {
        if route.len() < 2 {
            return;
        }
        let line = LineString::from(route.iter().map(coord).collect::<Vec<_>>());
        self.overlays.push(Overlay {
            geometry: geo::Geometry::LineString(line),
            kind: "route",
            color: color.to_string(),
        });
    }

    fn draw_shape(&mut self, shape: &MapShape) -> bool {
        let Some(polygon) = shape_polygon(shape.shape_type, shape.radius_m, &shape.points) else {
            log::debug!("skipping {} shape with {} points", shape.shape_type.name(), shape.points.len());
            return false;
        };
        self.push_polygon(polygon, "shape", &shape.color);
        if shape.recenter {
            let bounds = Bounds::from_points(&shape.points);
            self.center = Some(bounds.center());
            if shape.shape_type != ShapeType::Circle {
                self.zoom = Some(bounds.recommended_zoom(self.viewport.width, self.viewport.height));
            }
        }
        true
    }

    fn draw_geozone(&mut self, zone: &Geozone) {
        let points = zone.drawable_points();
        match zone.zone_type {
            GeozoneType::PointRadius | GeozoneType::SweptPointRadius => {
                for p in &points {
                    if let Some(circle) = shape_polygon(ShapeType::Circle, zone.radius_m, std::slice::from_ref(p)) {
                        self.push_polygon(circle, "geozone", &zone.color);
                    }
                }
            }
            GeozoneType::BoundedRect => {
                if let Some(rect) = shape_polygon(ShapeType::Rectangle, 0.0, &points) {
                    self.push_polygon(rect, "geozone", &zone.color);
                }
            }
            GeozoneType::Polygon => {
                if let Some(polygon) = shape_polygon(ShapeType::Polygon, 0.0, &points) {
                    self.push_polygon(polygon, "geozone", &zone.color);
                }
            }
        }
        if let Some(first) = points.first() {
            self.center = Some(*first);
        }
    }

    fn show_pushpin(&mut self, pushpin: &mut Pushpin, center: bool) {
        let Some(handle) = pushpin.marker else {
            log::debug!("pushpin {} has not been drawn", pushpin.pin_index);
            return;
        };
        self.open_popup = Some(handle);
        pushpin.popup_shown = true;
        if center {
            self.center = Some(pushpin.position);
        }
    }

    fn pause_replay(&mut self, _replay: ReplayState) -> ReplayState {
        self.replay = match self.replay {
            ReplayState::Running => ReplayState::Paused,
            ReplayState::Paused if !self.replay_queue.is_empty() => ReplayState::Running,
            _ => ReplayState::Stopped,
        };
        self.replay
    }

    fn unload(&mut self) {
        self.clear_layers();
        self.center = None;
        self.zoom = None;
    }
}
