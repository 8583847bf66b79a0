//! The seam between the tracking pipeline and whatever widget renders the map.
//!
//! Every backend implements the required drawing calls; the rest default to
//! no-ops so a minimal backend only has to place markers and lines.

use serde::{Deserialize, Serialize};

use crate::types::{GeoPoint, GeozoneType, MapShape, Pushpin, RecenterMode, ReplayState};

/// A zone being edited: its vertices, and which of them is selected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Geozone {
    pub zone_type: GeozoneType,
    pub radius_m: f64,
    pub points: Vec<GeoPoint>,
    pub color: String,
    /// Only this vertex is drawn when set and in range.
    pub primary_index: Option<usize>,
}

impl Geozone {
    /// The vertices to draw: the primary one alone when selected, otherwise all
    /// of them. Unset (0,0) vertices are skipped either way.
    pub fn drawable_points(&self) -> Vec<GeoPoint> {
        match self.primary_index.and_then(|i| self.points.get(i)) {
            Some(p) if p.is_valid() => vec![*p],
            Some(_) => Vec::new(),
            None => self.points.iter().copied().filter(GeoPoint::is_valid).collect(),
        }
    }
}

pub trait MapProvider {
    /// Removes every marker, line and shape.
    fn clear_layers(&mut self);

    fn set_center(&mut self, _center: &GeoPoint, _zoom: Option<u8>) {}

    /// Draws one dataset's pushpins. Implementations record the marker handle
    /// they create on each pushpin.
    fn draw_pushpins(&mut self, pushpins: &mut [Pushpin], recenter: RecenterMode, replay: ReplayState);

    fn draw_poi(&mut self, _pushpins: &mut [Pushpin]) {}

    fn draw_route(&mut self, route: &[GeoPoint], color: &str);

    /// Returns whether the shape was drawn.
    fn draw_shape(&mut self, _shape: &MapShape) -> bool {
        false
    }

    fn draw_geozone(&mut self, _zone: &Geozone) {}

    /// Opens the pushpin's info popup, optionally centering on it.
    fn show_pushpin(&mut self, pushpin: &mut Pushpin, center: bool);

    /// Toggles a running replay and returns the resulting state.
    fn pause_replay(&mut self, _replay: ReplayState) -> ReplayState {
        ReplayState::Stopped
    }

    fn unload(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn geozone_primary_vertex_only() {
        let zone = Geozone {
            zone_type: GeozoneType::PointRadius,
            radius_m: 100.0,
            points: vec![GeoPoint::new(1.0, 1.0), GeoPoint::new(0.0, 0.0), GeoPoint::new(2.0, 2.0)],
            color: "#FF0000".into(),
            primary_index: Some(2),
        };
        assert_eq!(zone.drawable_points(), vec![GeoPoint::new(2.0, 2.0)]);

        let all = Geozone { primary_index: None, ..zone.clone() };
        assert_eq!(all.drawable_points().len(), 2);

        let unset = Geozone { primary_index: Some(1), ..zone.clone() };
        assert!(unset.drawable_points().is_empty());

        let out_of_range = Geozone { primary_index: Some(9), ..zone };
        assert_eq!(out_of_range.drawable_points().len(), 2);
    }
}
