//! Turns a parsed `MapDocument` into the view model the map and report draw from.

use serde::Serialize;

use crate::config::MapConfig;
use crate::event::EventRecord;
use crate::pushpin::{build_detail_row, build_pushpin};
use crate::types::{DataSet, DataSetKind, DetailRow, LastEvent, MapShape, Pushpin, TimeSnapshot};
use crate::xml::{Action, MapDocument, RawDataSet};

/// Everything one successful poll produces.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MapData {
    pub root_found: bool,
    pub is_fleet: bool,
    pub datasets: Vec<DataSet>,
    pub poi_pins: Vec<Pushpin>,
    pub shapes: Vec<MapShape>,
    pub detail_rows: Vec<DetailRow>,
    /// Mark the first row of each device in the report.
    pub device_breaks: bool,
    /// Some dataset lost its oldest points to the pushpin cap.
    pub partial: bool,
    /// Some retained record carries an address.
    pub show_address: bool,
    pub today: Option<TimeSnapshot>,
    #[serde(skip)]
    pub actions: Vec<Action>,
}

impl MapData {
    /// Number of detail records, which is what a load reports as "points parsed".
    pub fn point_count(&self) -> usize {
        self.detail_rows.len()
    }

    pub fn pushpin(&self, dataset_index: usize, pin_index: usize) -> Option<&Pushpin> {
        self.datasets.get(dataset_index)?.pushpins.get(pin_index)
    }

    pub fn pushpin_mut(&mut self, dataset_index: usize, pin_index: usize) -> Option<&mut Pushpin> {
        self.datasets.get_mut(dataset_index)?.pushpins.get_mut(pin_index)
    }

    pub fn pushpin_count(&self) -> usize {
        self.datasets.iter().map(|ds| ds.pushpins.len()).sum()
    }
}

/// Indices handed out while walking the datasets of one document.
#[derive(Default)]
struct Counters {
    record: usize,
    dataset: usize,
    max_dataset_points: usize,
}

/// Builds the view model and folds the document's latest event into `last`.
pub fn build_map_data(doc: MapDocument, config: &MapConfig, last: &mut LastEvent) -> MapData {
    match doc.last_event {
        Some(ref event) => *last = event.clone(),
        None => {
            last.battery = 0.0;
            last.signal = 0.0;
        }
    }

    let mut data = MapData {
        root_found: doc.root_found,
        is_fleet: config.is_fleet || doc.is_fleet,
        shapes: doc.shapes,
        today: doc.time,
        actions: doc.actions,
        ..MapData::default()
    };

    let mut counters = Counters::default();
    for raw in &doc.datasets {
        if raw.kind == DataSetKind::Poi {
            add_poi_pins(&mut data, config, raw);
        } else {
            add_dataset(&mut data, config, raw, &mut counters, last);
        }
    }

    data.device_breaks = data.datasets.len() > 1 && counters.max_dataset_points > 1;
    data.partial = data.datasets.iter().any(|ds| ds.partial);
    log::info!(
        "built {} datasets, {} detail rows, {} POI{}",
        data.datasets.len(),
        data.detail_rows.len(),
        data.poi_pins.len(),
        if data.partial { " (partial)" } else { "" }
    );
    data
}

/// The newest `max` records, and whether older ones were dropped.
fn retained_points(raw: &RawDataSet, max: usize) -> (&[String], bool) {
    let start = raw.points.len().saturating_sub(max);
    (&raw.points[start..], start > 0)
}

fn add_poi_pins(data: &mut MapData, config: &MapConfig, raw: &RawDataSet) {
    let (points, _) = retained_points(raw, config.max_pushpins);
    for event in points.iter().filter_map(|p| EventRecord::parse(p)) {
        if event.has_valid_gps() {
            let pin_index = data.poi_pins.len();
            data.poi_pins.push(build_pushpin(config, None, None, pin_index, &event));
        }
    }
}

fn add_dataset(data: &mut MapData, config: &MapConfig, raw: &RawDataSet, counters: &mut Counters, last: &mut LastEvent) {
    let show_route = config.route_line_show && raw.route;
    let (points, partial) = retained_points(raw, config.max_pushpins);
    let ds_index = counters.dataset;

    let mut pushpins = Vec::new();
    let mut route = Vec::new();
    let mut ds_points = 0;

    for mut event in points.iter().filter_map(|p| EventRecord::parse(p)) {
        counters.record += 1;
        ds_points += 1;
        let index = counters.record;
        event.index = Some(index);

        if event.has_valid_gps() {
            if show_route {
                route.push(event.position());
            }
            if !event.address.is_empty() {
                data.show_address = true;
            }
            let pin_index = pushpins.len();
            pushpins.push(build_pushpin(config, Some(index), Some(ds_index), pin_index, &event));
            data.detail_rows.push(build_detail_row(config, index, Some(ds_index), Some(pin_index), &event, &raw.text_color));
        } else {
            data.detail_rows.push(build_detail_row(config, index, None, None, &event, &raw.text_color));
        }

        if !data.is_fleet && event.timestamp > last.time.epoch {
            track_last_event(last, &event);
        }
    }

    if route.len() < 2 {
        route.clear();
    }
    counters.max_dataset_points = counters.max_dataset_points.max(ds_points);
    counters.dataset += 1;
    data.datasets.push(DataSet {
        kind: raw.kind,
        id: raw.id.clone(),
        pushpins,
        route,
        route_color: raw.route_color.clone().unwrap_or_else(|| config.route_line_color.clone()),
        partial,
    });
}

fn track_last_event(last: &mut LastEvent, event: &EventRecord) {
    let (year, month, day) = event.ymd().unwrap_or_default();
    last.time = TimeSnapshot {
        epoch: event.timestamp,
        timezone: event.time_zone.clone(),
        year,
        month,
        day,
        date_fmt: event.date_fmt.clone(),
        time_fmt: event.time_fmt.clone(),
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::GeoPoint;
    use crate::xml::parse_document;

    fn point(device: &str, ts: i64, lat: f64, lon: f64) -> String {
        format!("{d}|{d}|{ts}|2010/01/0{day}|08:00:00|PST|InMotion|0|{lat}|{lon}", d = device, ts = ts, day = 1 + ts % 5, lat = lat, lon = lon)
    }

    fn dataset(attrs: &str, points: &[String]) -> String {
        let body: String = points.iter().map(|p| format!("<P>{}</P>", p)).collect();
        format!("<DataSet {}>{}</DataSet>", attrs, body)
    }

    fn build(xml: &str, config: &MapConfig) -> (MapData, LastEvent) {
        let mut last = LastEvent::default();
        let data = build_map_data(parse_document(xml), config, &mut last);
        (data, last)
    }

    #[test]
    fn root_without_datasets_builds_nothing() {
        let (data, _) = build("<MapData></MapData>", &MapConfig::default());
        assert!(data.root_found);
        assert!(data.datasets.is_empty());
        assert_eq!(data.point_count(), 0);
        assert!(!data.partial);
    }

    #[test]
    fn oversized_dataset_keeps_newest_points() {
        let points: Vec<String> = (1..=7).map(|i| point("a", i, 10.0 + i as f64, 20.0)).collect();
        let xml = format!("<MapData>{}</MapData>", dataset("id='a'", &points));
        let config = MapConfig { max_pushpins: 3, ..MapConfig::default() };
        let (data, _) = build(&xml, &config);

        let ds = &data.datasets[0];
        assert!(ds.partial);
        assert!(data.partial);
        assert_eq!(ds.pushpins.len(), 3);
        let stamps: Vec<i64> = ds.pushpins.iter().map(|p| p.event.timestamp).collect();
        assert_eq!(stamps, vec![5, 6, 7]);
        let indices: Vec<usize> = data.detail_rows.iter().map(|r| r.index).collect();
        assert_eq!(indices, vec![1, 2, 3]);
    }

    #[test]
    fn poi_never_reaches_report_or_route() {
        let pois = vec![point("p1", 1, 1.0, 1.0), point("p2", 2, 2.0, 2.0), point("p3", 3, 0.0, 0.0)];
        let xml = format!("<MapData>{}</MapData>", dataset("type='poi'", &pois));
        let (data, _) = build(&xml, &MapConfig::default());
        assert!(data.datasets.is_empty());
        assert!(data.detail_rows.is_empty());
        assert_eq!(data.poi_pins.len(), 2);
        assert_eq!(data.poi_pins[1].pin_index, 1);
        assert_eq!(data.poi_pins[0].record_index, None);
        assert_eq!(data.poi_pins[0].dataset_index, None);
    }

    #[test]
    fn route_needs_two_valid_points() {
        let two = vec![point("a", 1, 1.0, 2.0), point("a", 2, 0.0, 0.0), point("a", 3, 3.0, 4.0)];
        let one = vec![point("b", 1, 1.0, 2.0)];
        let xml = format!("<MapData>{}{}</MapData>", dataset("id='a'", &two), dataset("id='b'", &one));
        let (data, _) = build(&xml, &MapConfig::default());

        assert_eq!(data.datasets[0].route, vec![GeoPoint::new(1.0, 2.0), GeoPoint::new(3.0, 4.0)]);
        assert!(data.datasets[0].has_route());
        assert!(!data.datasets[1].has_route());

        // The (0,0) record is still a detail row, without pushpin back-references.
        let row = &data.detail_rows[1];
        assert_eq!(row.index, 2);
        assert_eq!(row.dataset_index, None);
        assert_eq!(row.pin_index, None);
        assert_eq!(data.detail_rows[2].pin_index, Some(1));
        assert_eq!(data.detail_rows[3].dataset_index, Some(1));
    }

    #[test]
    fn route_respects_dataset_and_global_switches() {
        let pts = vec![point("a", 1, 1.0, 2.0), point("a", 2, 3.0, 4.0)];
        let xml = format!("<MapData>{}</MapData>", dataset("route='false'", &pts));
        let (data, _) = build(&xml, &MapConfig::default());
        assert!(!data.datasets[0].has_route());

        let xml = format!("<MapData>{}</MapData>", dataset("", &pts));
        let config = MapConfig { route_line_show: false, ..MapConfig::default() };
        let (data, _) = build(&xml, &config);
        assert!(!data.datasets[0].has_route());
        assert_eq!(data.datasets[0].route_color, "#FF2222");
    }

    #[test]
    fn device_breaks_need_several_datasets_with_a_busy_one() {
        let one = vec![point("a", 1, 1.0, 1.0)];
        let two = vec![point("b", 1, 1.0, 1.0), point("b", 2, 2.0, 2.0)];

        let xml = format!("<MapData>{}{}</MapData>", dataset("", &one), dataset("", &one));
        assert!(!build(&xml, &MapConfig::default()).0.device_breaks);

        let xml = format!("<MapData>{}</MapData>", dataset("", &two));
        assert!(!build(&xml, &MapConfig::default()).0.device_breaks);

        let xml = format!("<MapData>{}{}</MapData>", dataset("", &one), dataset("", &two));
        assert!(build(&xml, &MapConfig::default()).0.device_breaks);
    }

    #[test]
    fn last_event_follows_newest_record_unless_fleet() {
        let pts = vec![point("a", 3, 1.0, 1.0), point("a", 9, 2.0, 2.0), point("a", 4, 3.0, 3.0)];
        let xml = format!("<MapData>{}</MapData>", dataset("", &pts));
        let (_, last) = build(&xml, &MapConfig::default());
        assert_eq!(last.time.epoch, 9);
        assert_eq!(last.time.date_fmt, "2010/01/05");
        assert_eq!((last.time.year, last.time.month, last.time.day), (2010, 1, 5));

        let fleet = format!("<MapData isFleet='true'>{}</MapData>", dataset("", &pts));
        let (_, last) = build(&fleet, &MapConfig::default());
        assert_eq!(last.time.epoch, 0);
    }

    #[test]
    fn missing_last_event_resets_levels_only() {
        let mut last = LastEvent::default();
        last.time.epoch = 42;
        last.battery = 80.0;
        last.signal = 70.0;
        build_map_data(parse_document("<MapData/>"), &MapConfig::default(), &mut last);
        assert_eq!(last.battery, 0.0);
        assert_eq!(last.signal, 0.0);
        assert_eq!(last.time.epoch, 42);
    }

    #[test]
    fn address_presence_enables_column() {
        let with = "a|a|1|d|t|z|c|0|1|1|0|0|0|0|0|Main St".to_string();
        let xml = format!("<MapData>{}</MapData>", dataset("", &[with]));
        assert!(build(&xml, &MapConfig::default()).0.show_address);
        let xml = format!("<MapData>{}</MapData>", dataset("", &[point("a", 1, 1.0, 1.0)]));
        assert!(!build(&xml, &MapConfig::default()).0.show_address);
    }
}
