//! Streaming reader for the `MapData` document returned by the points endpoint.
//!
//! The reader never fails: anything it cannot make sense of is reported as an
//! empty document, with `root_found` telling the caller whether a `MapData`
//! element was seen at all.

use std::borrow::Cow;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::types::{DataSetKind, GeoPoint, LastEvent, MapShape, ShapeType, TimeSnapshot};

const TAG_MAP_DATA: &[u8] = b"MapData";
const TAG_LAST_EVENT: &[u8] = b"LastEvent";
const TAG_TIME: &[u8] = b"Time";
const TAG_SHAPE: &[u8] = b"Shape";
const TAG_DATA_SET: &[u8] = b"DataSet";
const TAG_POINT: &[u8] = b"P";
const TAG_ACTION: &[u8] = b"Action";

pub const DEFAULT_SHAPE_COLOR: &str = "#0000FF";

/// Command carried by an `Action` element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    AutoUpdate(bool),
    Alert(String),
    GotoUrl(String),
}

impl Action {
    fn from_command(command: &str, arg: String) -> Option<Action> {
        match command {
            "autoupdate" => Some(Action::AutoUpdate(arg.trim() == "true")),
            "alert" => Some(Action::Alert(arg)),
            "gotourl" => Some(Action::GotoUrl(arg)),
            other => {
                log::debug!("ignoring unknown action '{}'", other);
                None
            }
        }
    }
}

/// A `DataSet` element before any view-model work: attributes plus raw point rows.
#[derive(Debug, Clone, PartialEq)]
pub struct RawDataSet {
    pub kind: DataSetKind,
    pub id: String,
    /// False only when the element says `route="false"`.
    pub route: bool,
    pub route_color: Option<String>,
    pub text_color: String,
    pub points: Vec<String>,
}

impl RawDataSet {
    fn from_element(e: &BytesStart) -> Self {
        RawDataSet {
            kind: DataSetKind::from_name(&attr(e, "type").unwrap_or_default()),
            id: attr(e, "id").unwrap_or_default(),
            route: attr(e, "route").map_or(true, |r| r != "false"),
            route_color: attr(e, "routeColor").filter(|c| !c.is_empty()),
            text_color: attr(e, "textColor").unwrap_or_default(),
            points: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MapDocument {
    pub root_found: bool,
    pub is_fleet: bool,
    /// `None` when the document has no (non-empty) `LastEvent` element.
    pub last_event: Option<LastEvent>,
    /// Server time of the response.
    pub time: Option<TimeSnapshot>,
    pub shapes: Vec<MapShape>,
    pub datasets: Vec<RawDataSet>,
    pub actions: Vec<Action>,
}

/// Parses a points payload. Malformed input yields an empty document.
pub fn parse_document(xml: &str) -> MapDocument {
    match read_document(xml) {
        Ok(doc) => doc,
        Err(e) => {
            log::warn!("unreadable map data: {}", e);
            MapDocument::default()
        }
    }
}

/// The leaf element whose text is being collected.
enum Pending {
    LastEvent { time: TimeSnapshot, battery: f64, signal: f64 },
    Time(TimeSnapshot),
    Shape { shape_type: ShapeType, radius_m: f64, color: String },
    Point,
    Action(String),
}

fn attr(e: &BytesStart, name: &str) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == name.as_bytes())
        .and_then(|a| a.unescape_value().ok().map(Cow::into_owned))
}

fn attr_num<T: std::str::FromStr + Default>(e: &BytesStart, name: &str) -> T {
    attr(e, name)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or_default()
}

fn time_attrs(e: &BytesStart) -> TimeSnapshot {
    TimeSnapshot {
        epoch: attr_num(e, "timestamp"),
        timezone: attr(e, "timezone").unwrap_or_default(),
        year: attr_num(e, "year"),
        month: attr_num(e, "month"),
        day: attr_num(e, "day"),
        date_fmt: String::new(),
        time_fmt: String::new(),
    }
}

/// `lat/lon,lat/lon,...`; unparseable pairs and (0,0) are dropped.
pub fn parse_shape_points(text: &str) -> Vec<GeoPoint> {
    text.split(',')
        .filter_map(|pair| {
            let (lat, lon) = pair.split_once('/')?;
            let lat = lat.trim().parse().ok()?;
            let lon = lon.trim().parse().ok()?;
            Some(GeoPoint::new(lat, lon))
        })
        .filter(GeoPoint::is_valid)
        .collect()
}

fn fill_date_time(time: &mut TimeSnapshot, text: &str) {
    let mut fields = text.split('|');
    time.date_fmt = fields.next().unwrap_or_default().to_string();
    time.time_fmt = fields.next().unwrap_or_default().to_string();
}

struct DocumentBuilder {
    doc: MapDocument,
    pending: Option<Pending>,
    text: String,
    dataset: Option<RawDataSet>,
}

impl DocumentBuilder {
    fn open(&mut self, e: &BytesStart) {
        self.text.clear();
        self.pending = match e.name().as_ref() {
            TAG_LAST_EVENT if self.doc.last_event.is_none() => Some(Pending::LastEvent {
                time: time_attrs(e),
                battery: attr_num(e, "battery"),
                signal: attr_num(e, "signal"),
            }),
            TAG_TIME if self.doc.time.is_none() => Some(Pending::Time(time_attrs(e))),
            TAG_SHAPE => Some(Pending::Shape {
                shape_type: ShapeType::from_name(&attr(e, "type").unwrap_or_default()),
                radius_m: attr_num(e, "radius"),
                color: attr(e, "color").unwrap_or_else(|| DEFAULT_SHAPE_COLOR.to_string()),
            }),
            TAG_POINT if self.dataset.is_some() => Some(Pending::Point),
            TAG_ACTION => Some(Pending::Action(attr(e, "command").unwrap_or_default())),
            TAG_DATA_SET => {
                self.finish_dataset();
                self.dataset = Some(RawDataSet::from_element(e));
                None
            }
            _ => None,
        };
    }

    fn close(&mut self, name: &[u8]) {
        if name == TAG_DATA_SET {
            self.finish_dataset();
            return;
        }
        let Some(pending) = self.pending.take() else {
            return;
        };
        let text = std::mem::take(&mut self.text);
        match pending {
            Pending::LastEvent { mut time, battery, signal } => {
                // An element without text counts as absent.
                if !text.is_empty() {
                    fill_date_time(&mut time, &text);
                    self.doc.last_event = Some(LastEvent { time, battery, signal });
                }
            }
            Pending::Time(mut time) => {
                if !text.is_empty() {
                    fill_date_time(&mut time, &text);
                    self.doc.time = Some(time);
                }
            }
            Pending::Shape { shape_type, radius_m, color } => self.doc.shapes.push(MapShape {
                shape_type,
                radius_m,
                points: parse_shape_points(&text),
                color,
                recenter: false,
            }),
            Pending::Point => {
                if let Some(ds) = self.dataset.as_mut() {
                    ds.points.push(text);
                }
            }
            Pending::Action(command) => {
                if let Some(action) = Action::from_command(&command, text) {
                    self.doc.actions.push(action);
                }
            }
        }
    }

    fn finish_dataset(&mut self) {
        if let Some(ds) = self.dataset.take() {
            self.doc.datasets.push(ds);
        }
    }
}

fn read_document(xml: &str) -> Result<MapDocument, quick_xml::Error> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut builder = DocumentBuilder {
        doc: MapDocument::default(),
        pending: None,
        text: String::new(),
        dataset: None,
    };
    // Element depth below the root; `None` until the first `MapData` opens.
    let mut depth: Option<usize> = None;

    loop {
        match reader.read_event()? {
            Event::Start(e) => match depth {
                None if e.name().as_ref() == TAG_MAP_DATA => {
                    builder.doc.root_found = true;
                    builder.doc.is_fleet = attr(&e, "isFleet").is_some_and(|f| f.eq_ignore_ascii_case("true"));
                    depth = Some(0);
                }
                None => {}
                Some(d) => {
                    depth = Some(d + 1);
                    builder.open(&e);
                }
            },
            Event::Empty(e) => match depth {
                None if e.name().as_ref() == TAG_MAP_DATA => {
                    builder.doc.root_found = true;
                    builder.doc.is_fleet = attr(&e, "isFleet").is_some_and(|f| f.eq_ignore_ascii_case("true"));
                    break;
                }
                None => {}
                Some(_) => {
                    builder.open(&e);
                    builder.close(e.name().as_ref());
                }
            },
            Event::Text(t) => {
                if builder.pending.is_some() {
                    builder.text.push_str(&t.unescape()?);
                }
            }
            Event::CData(c) => {
                if builder.pending.is_some() {
                    builder.text.push_str(&String::from_utf8_lossy(&c.into_inner()));
                }
            }
            Event::End(e) => match depth {
                Some(0) => break,
                Some(d) => {
                    depth = Some(d - 1);
                    builder.close(e.name().as_ref());
                }
                None => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    builder.finish_dataset();
    log::debug!(
        "map data: root={} datasets={} shapes={} actions={}",
        builder.doc.root_found,
        builder.doc.datasets.len(),
        builder.doc.shapes.len(),
        builder.doc.actions.len()
    );
    Ok(builder.doc)
}
