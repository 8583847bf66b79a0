//! The host page as the pipeline sees it: fixed element ids and classes, and
//! the handful of DOM mutations and notices it performs.

use std::collections::HashMap;

/// Element ids the host page is expected to provide. Any of them may be
/// missing, in which case the matching feature does nothing.
pub mod ids {
    pub const DETAIL_TABLE: &str = "trackMapDetailTable";
    pub const DETAIL_CONTROL: &str = "trackMapDetailControl";
    /// Prefix of each detail row id; the record index follows.
    pub const DETAIL_ROW_PREFIX: &str = "detailRow_";
    pub const DISTANCE_DISPLAY: &str = "trackMapDistance";
    pub const LAT_LON_DISPLAY: &str = "trackMapLatLon";
    pub const LATEST_EVENT_DATE: &str = "lastEventDate";
    pub const LATEST_EVENT_TIME: &str = "lastEventTime";
    pub const LATEST_EVENT_TMZ: &str = "lastEventTmz";
    pub const LATEST_BATTERY: &str = "lastBatteryLevel";
    pub const MESSAGE_TEXT: &str = "trackMapMessage";
    pub const MAP_CONTROL: &str = "trackMapControl";
    pub const MAP_CONTROL_BAR: &str = "trackMapControlBar";
    pub const MAP_REPLAY_BTN: &str = "trackMapReplayButton";
    pub const MAP_UPDATE_BTN: &str = "trackMapUpdateButton";
    pub const LOADING_VIEW: &str = "trackMapLoadingView";
    pub const ZONE_LATITUDE_PREFIX: &str = "zoneLatitude_";
    pub const ZONE_LONGITUDE_PREFIX: &str = "zoneLongitude_";
    pub const ZONE_RADIUS_M: &str = "zoneRadiusMeters";

    pub const ALERT_IMAGE: &str = "alertImage";
    pub const ALERT_STATE_TEXT: &str = "alertStateText";
    pub const ALERT_ACTION_TEXT: &str = "alertActionText";
    pub const ALERT_POLL_INTERVAL: &str = "alertPollInterval";

    pub fn detail_row(index: usize) -> String {
        format!("{}{}", DETAIL_ROW_PREFIX, index)
    }
}

/// CSS classes the stylesheet defines for the generated markup.
pub mod classes {
    pub const DETAILS_DIV: &str = "trackMapDetailLocation";
    pub const DETAILS_HEADER_ROW: &str = "mapDetailsHeaderRow";
    pub const DETAILS_HEADER_COL: &str = "mapDetailsHeaderColumn";
    pub const DETAILS_ROW_HILITE: &str = "mapDetailsDataRowHiLite";
    pub const DETAILS_ROW_ODD: &str = "mapDetailsDataRowOdd";
    pub const DETAILS_ROW_EVEN: &str = "mapDetailsDataRowEven";
    pub const DETAILS_INDEX_COL: &str = "mapDetailsIndexColumn";
    pub const DETAILS_DATA_COL_NEW: &str = "mapDetailsDataColumn_new";
    pub const DETAILS_DATA_COL: &str = "mapDetailsDataColumn";
    pub const DETAILS_PARTIAL: &str = "mapDetailsPartialData";

    pub const CONTROL_BAR_OPEN: &str = "mapControlCollapseBar_open";
    pub const CONTROL_BAR_CLOSED: &str = "mapControlCollapseBar_closed";

    pub const UPDATE_IDLE: &str = "mapUpdateIdle";
    pub const UPDATE_LOADING: &str = "mapUpdateLoading";
    pub const UPDATE_ERROR: &str = "mapUpdateError";

    pub const ALERT_IMAGE: &str = "alertImage";
    pub const ALERT_STATE_TEXT: &str = "alertStateText";
    pub const ALERT_ACTION_TEXT: &str = "alertActionText";
    pub const ALERT_RULE_NAME: &str = "alertRuleName";

    pub fn detail_row(index: usize) -> &'static str {
        if index & 1 == 1 {
            DETAILS_ROW_ODD
        } else {
            DETAILS_ROW_EVEN
        }
    }
}

/// Which document an element lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Surface {
    #[default]
    Main,
    /// The separate window hosting the detail report.
    DetailWindow,
}

/// Something the user has to be told, in place of a blocking dialog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    SessionExpired,
    PingOk,
    PingError,
    /// Message text pushed by the server.
    Message(String),
    /// A request could not be completed.
    Error(String),
}

pub trait Page {
    /// Returns false when the element does not exist.
    fn set_inner_html(&mut self, surface: Surface, id: &str, html: &str) -> bool;
    fn set_class_name(&mut self, surface: Surface, id: &str, class: &str) -> bool;
    fn set_visible(&mut self, surface: Surface, id: &str, visible: bool) -> bool;
    /// Form field value.
    fn set_value(&mut self, id: &str, value: &str) -> bool;
    fn set_image(&mut self, id: &str, src: &str) -> bool;
    /// Opens (or focuses) the detail window; false if it could not be created.
    fn open_detail_window(&mut self, width: u32, height: u32) -> bool;
    fn close_detail_window(&mut self);
    fn notify(&mut self, notice: Notice);
    fn navigate(&mut self, url: &str);
}

/// Recorded state of one element in a [`MemoryPage`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Element {
    pub html: String,
    pub class: String,
    pub visible: bool,
    pub value: String,
    pub image: String,
}

/// An in-memory page with a fixed set of elements.
#[derive(Debug, Default)]
pub struct MemoryPage {
    elements: HashMap<(Surface, String), Element>,
    pub detail_window_open: bool,
    pub notices: Vec<Notice>,
    pub navigations: Vec<String>,
}

impl MemoryPage {
    pub fn new() -> Self {
        Self::default()
    }

    /// A page providing every element in `ids::*` on the main surface.
    pub fn with_standard_elements() -> Self {
        let mut page = MemoryPage::new();
        for id in [
            ids::DETAIL_TABLE,
            ids::DETAIL_CONTROL,
            ids::DISTANCE_DISPLAY,
            ids::LAT_LON_DISPLAY,
            ids::LATEST_EVENT_DATE,
            ids::LATEST_EVENT_TIME,
            ids::LATEST_EVENT_TMZ,
            ids::LATEST_BATTERY,
            ids::MESSAGE_TEXT,
            ids::MAP_CONTROL,
            ids::MAP_CONTROL_BAR,
            ids::MAP_REPLAY_BTN,
            ids::MAP_UPDATE_BTN,
            ids::LOADING_VIEW,
            ids::ZONE_RADIUS_M,
            ids::ALERT_IMAGE,
            ids::ALERT_STATE_TEXT,
            ids::ALERT_ACTION_TEXT,
            ids::ALERT_POLL_INTERVAL,
        ] {
            page.add(Surface::Main, id);
        }
        page
    }

    pub fn add(&mut self, surface: Surface, id: &str) {
        self.elements.entry((surface, id.to_string())).or_insert_with(|| Element {
            visible: true,
            ..Element::default()
        });
    }

    pub fn element(&self, surface: Surface, id: &str) -> Option<&Element> {
        self.elements.get(&(surface, id.to_string()))
    }

    /// Inner HTML of a main-surface element, empty if missing.
    pub fn html(&self, id: &str) -> &str {
        self.element(Surface::Main, id).map_or("", |e| e.html.as_str())
    }

    fn element_mut(&mut self, surface: Surface, id: &str) -> Option<&mut Element> {
        self.elements.get_mut(&(surface, id.to_string()))
    }
}

impl Page for MemoryPage {
    fn set_inner_html(&mut self, surface: Surface, id: &str, html: &str) -> bool {
        self.element_mut(surface, id).map(|e| e.html = html.to_string()).is_some()
    }

    fn set_class_name(&mut self, surface: Surface, id: &str, class: &str) -> bool {
        self.element_mut(surface, id).map(|e| e.class = class.to_string()).is_some()
    }

    fn set_visible(&mut self, surface: Surface, id: &str, visible: bool) -> bool {
        self.element_mut(surface, id).map(|e| e.visible = visible).is_some()
    }

    fn set_value(&mut self, id: &str, value: &str) -> bool {
        self.element_mut(Surface::Main, id).map(|e| e.value = value.to_string()).is_some()
    }

    fn set_image(&mut self, id: &str, src: &str) -> bool {
        self.element_mut(Surface::Main, id).map(|e| e.image = src.to_string()).is_some()
    }

    fn open_detail_window(&mut self, _width: u32, _height: u32) -> bool {
        self.detail_window_open = true;
        self.add(Surface::DetailWindow, ids::DETAIL_TABLE);
        true
    }

    fn close_detail_window(&mut self) {
        self.detail_window_open = false;
        self.elements.retain(|(surface, _), _| *surface != Surface::DetailWindow);
    }

    fn notify(&mut self, notice: Notice) {
        self.notices.push(notice);
    }

    fn navigate(&mut self, url: &str) {
        self.navigations.push(url.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_elements_report_false() {
        let mut page = MemoryPage::new();
        assert!(!page.set_inner_html(Surface::Main, ids::MESSAGE_TEXT, "x"));
        page.add(Surface::Main, ids::MESSAGE_TEXT);
        assert!(page.set_inner_html(Surface::Main, ids::MESSAGE_TEXT, "x"));
        assert_eq!(page.html(ids::MESSAGE_TEXT), "x");
    }

    #[test]
    fn detail_window_lifecycle() {
        let mut page = MemoryPage::new();
        assert!(!page.set_inner_html(Surface::DetailWindow, ids::DETAIL_TABLE, "t"));
        assert!(page.open_detail_window(500, 300));
        assert!(page.set_inner_html(Surface::DetailWindow, ids::DETAIL_TABLE, "t"));
        page.close_detail_window();
        assert!(!page.detail_window_open);
        assert!(page.element(Surface::DetailWindow, ids::DETAIL_TABLE).is_none());
    }

    #[test]
    fn row_classes_alternate() {
        assert_eq!(classes::detail_row(1), classes::DETAILS_ROW_ODD);
        assert_eq!(classes::detail_row(2), classes::DETAILS_ROW_EVEN);
        assert_eq!(ids::detail_row(7), "detailRow_7");
    }
}
