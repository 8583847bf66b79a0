//! One tracking map: the current view model, the backend drawing it, and the
//! page widgets that follow it.

use crate::config::MapConfig;
use crate::error::{Result, TrackError};
use crate::fetch::{PingResult, PointsResponse};
use crate::geojson_provider::GeoJsonProvider;
use crate::geomath::format_coord;
use crate::model::{build_map_data, MapData};
use crate::page::{classes, ids, Notice, Page, Surface};
use crate::provider::{Geozone, MapProvider};
use crate::report::DetailReport;
use crate::timer::Countdown;
use crate::types::{GeoPoint, LastEvent, RecenterMode, ReplayState};
use crate::xml::{parse_document, Action};

/// Sequence number of a points request. Only the newest one is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadTicket(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoadingState {
    Idle,
    Loading,
    Failed,
}

/// `<img>` for a battery level given as a fraction or a percentage.
pub fn battery_image_html(image_base_dir: &str, level: f64) -> String {
    let level = if level > 1.5 { level / 100.0 } else { level };
    let icon = match level {
        l if l <= 0.01 => "Batt000.png",
        l if l <= 0.25 => "Batt025.png",
        l if l <= 0.50 => "Batt050.png",
        l if l <= 0.70 => "Batt070.png",
        l if l <= 0.90 => "Batt090.png",
        _ => "Batt100.png",
    };
    format!("<img src=\"{}/{}\"/>", image_base_dir, icon)
}

fn replay_button_image(state: ReplayState) -> &'static str {
    match state {
        ReplayState::Running => "Pause20.png",
        ReplayState::Paused => "Continue20.png",
        ReplayState::Stopped => "Play20.png",
    }
}

pub struct TrackSession<P: MapProvider> {
    config: MapConfig,
    provider: P,
    data: Option<MapData>,
    last_event: LastEvent,
    report: DetailReport,
    last_ticket: u64,
    in_flight: Option<u64>,
    auto_update: Countdown,
    replay: ReplayState,
    control_visible: bool,
    zone: Option<Geozone>,
}

impl<P: MapProvider> TrackSession<P> {
    pub fn new(config: MapConfig, mut provider: P) -> Self {
        provider.clear_layers();
        let auto_update = Countdown::new(config.auto_update_interval_secs);
        TrackSession {
            config,
            provider,
            data: None,
            last_event: LastEvent::default(),
            report: DetailReport::default(),
            last_ticket: 0,
            in_flight: None,
            auto_update,
            replay: ReplayState::Stopped,
            control_visible: true,
            zone: None,
        }
    }

    pub fn config(&self) -> &MapConfig {
        &self.config
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn provider_mut(&mut self) -> &mut P {
        &mut self.provider
    }

    pub fn data(&self) -> Option<&MapData> {
        self.data.as_ref()
    }

    pub fn last_event(&self) -> &LastEvent {
        &self.last_event
    }

    pub fn replay_state(&self) -> ReplayState {
        self.replay
    }

    pub fn highlighted_row(&self) -> Option<usize> {
        self.report.highlighted()
    }

    pub fn auto_update_running(&self) -> bool {
        self.auto_update.is_running()
    }

    // ** Loading **

    fn set_loading_state(&self, page: &mut dyn Page, state: LoadingState) {
        let class = match state {
            LoadingState::Idle => classes::UPDATE_IDLE,
            LoadingState::Loading => classes::UPDATE_LOADING,
            LoadingState::Failed => classes::UPDATE_ERROR,
        };
        page.set_class_name(Surface::Main, ids::MAP_UPDATE_BTN, class);
        if state == LoadingState::Loading {
            page.set_inner_html(Surface::Main, ids::LOADING_VIEW, &self.config.labels.loading);
        }
        page.set_visible(Surface::Main, ids::LOADING_VIEW, state == LoadingState::Loading);
    }

    /// Issues the ticket for a new points request, superseding any in flight.
    pub fn begin_load(&mut self, page: &mut dyn Page) -> LoadTicket {
        self.last_ticket += 1;
        self.in_flight = Some(self.last_ticket);
        self.set_loading_state(page, LoadingState::Loading);
        LoadTicket(self.last_ticket)
    }

    fn accept(&mut self, ticket: LoadTicket) -> Result<()> {
        if self.in_flight != Some(ticket.0) {
            log::debug!("discarding points response #{} (current #{})", ticket.0, self.last_ticket);
            return Err(TrackError::StaleResponse { ticket: ticket.0, current: self.last_ticket });
        }
        self.in_flight = None;
        Ok(())
    }

    /// Applies a points response. Returns the number of detail records.
    pub fn complete_load(
        &mut self,
        page: &mut dyn Page,
        ticket: LoadTicket,
        response: PointsResponse,
        recenter: RecenterMode,
        replay: ReplayState,
    ) -> Result<usize> {
        self.accept(ticket)?;
        match response {
            PointsResponse::Logout => {
                self.session_expired(page);
                Err(TrackError::SessionExpired)
            }
            PointsResponse::Error => {
                self.set_loading_state(page, LoadingState::Failed);
                page.notify(Notice::Error("the server could not provide map data".into()));
                Ok(0)
            }
            PointsResponse::Data(xml) => {
                let count = self.apply_xml(page, &xml, recenter, replay);
                self.set_loading_state(page, LoadingState::Idle);
                Ok(count)
            }
        }
    }

    /// Records a failed points request. Stale failures are ignored.
    pub fn fail_load(&mut self, page: &mut dyn Page, ticket: LoadTicket, err: &TrackError) {
        if self.accept(ticket).is_err() {
            return;
        }
        log::warn!("points request #{} failed: {}", ticket.0, err);
        match err {
            TrackError::SessionExpired => self.session_expired(page),
            other => {
                self.set_loading_state(page, LoadingState::Failed);
                page.notify(Notice::Error(other.to_string()));
            }
        }
    }

    /// Nothing more can be loaded until the user logs in again.
    fn session_expired(&mut self, page: &mut dyn Page) {
        self.stop_auto_update();
        self.set_loading_state(page, LoadingState::Idle);
        page.notify(Notice::SessionExpired);
    }

    /// Parses and shows a points document, fitting the map to it.
    pub fn show_xml(&mut self, page: &mut dyn Page, xml: &str) -> usize {
        self.apply_xml(page, xml, RecenterMode::Zoom, ReplayState::Stopped)
    }

    fn apply_xml(&mut self, page: &mut dyn Page, xml: &str, recenter: RecenterMode, replay: ReplayState) -> usize {
        let mut data = build_map_data(parse_document(xml), &self.config, &mut self.last_event);
        let actions = std::mem::take(&mut data.actions);
        let count = data.point_count();
        if data.root_found {
            log::debug!("{} records, {} pushpins", count, data.pushpin_count());
        } else {
            log::warn!("points response has no MapData root, showing nothing");
        }
        self.data = Some(data);

        self.draw(recenter, replay);
        self.show_latest_event(page);
        self.show_partial_message(page);
        self.report.show(page, &self.config, self.data.as_ref());
        for action in actions {
            self.run_action(page, action);
        }
        count
    }

    /// Clears the map and draws the current view model.
    ///
    /// Only the last dataset gets `recenter`; with replay active only the
    /// first dataset is drawn.
    fn draw(&mut self, recenter: RecenterMode, replay: ReplayState) {
        let Some(data) = self.data.as_mut() else {
            return;
        };
        self.provider.clear_layers();
        if !data.poi_pins.is_empty() {
            self.provider.draw_poi(&mut data.poi_pins);
        }

        let count = data.datasets.len();
        for (i, ds) in data.datasets.iter_mut().enumerate() {
            if ds.has_route() {
                self.provider.draw_route(&ds.route, &ds.route_color);
            }
            if !ds.pushpins.is_empty() {
                let mode = if i + 1 == count { recenter } else { RecenterMode::None };
                self.provider
                    .draw_pushpins(&mut ds.pushpins, mode.for_fixed_zoom(self.config.fixed_zoom), replay);
            }
            if replay.is_active() {
                break;
            }
        }

        for shape in &data.shapes {
            self.provider.draw_shape(shape);
        }
        self.replay = replay;
    }

    fn show_latest_event(&self, page: &mut dyn Page) {
        let time = &self.last_event.time;
        if time.has_date_time() {
            page.set_inner_html(Surface::Main, ids::LATEST_EVENT_DATE, &time.date_fmt);
            page.set_inner_html(Surface::Main, ids::LATEST_EVENT_TIME, &time.time_fmt);
        } else {
            page.set_inner_html(Surface::Main, ids::LATEST_EVENT_DATE, "");
            page.set_inner_html(Surface::Main, ids::LATEST_EVENT_TIME, &self.config.labels.unavailable);
        }
        page.set_inner_html(Surface::Main, ids::LATEST_EVENT_TMZ, &time.timezone);
        page.set_inner_html(
            Surface::Main,
            ids::LATEST_BATTERY,
            &battery_image_html(&self.config.image_base_dir, self.last_event.battery),
        );
    }

    fn show_partial_message(&self, page: &mut dyn Page) {
        let partial = self.data.as_ref().is_some_and(|d| d.partial);
        let text = if partial { self.config.labels.max_pushpins.as_str() } else { "" };
        page.set_inner_html(Surface::Main, ids::MESSAGE_TEXT, text);
    }

    fn run_action(&mut self, page: &mut dyn Page, action: Action) {
        log::debug!("server action {:?}", action);
        match action {
            Action::AutoUpdate(true) => self.start_auto_update(),
            Action::AutoUpdate(false) => self.stop_auto_update(),
            Action::Alert(message) => page.notify(Notice::Message(message)),
            Action::GotoUrl(url) => page.navigate(&url),
        }
    }

    // ** Auto update **

    pub fn start_auto_update(&mut self) {
        if self.config.auto_update_interval_secs > 0 {
            self.auto_update.start(false);
        }
    }

    pub fn stop_auto_update(&mut self) {
        self.auto_update.stop();
    }

    /// One second elapsed; true when the map should reload.
    pub fn tick(&mut self) -> bool {
        self.auto_update.tick()
    }

    // ** Map interaction **

    /// Redraws only the first dataset (or just its newest point), fitted to
    /// the view, and closes the detail report.
    pub fn center_on_last_pushpin(&mut self, page: &mut dyn Page, last_only: bool) {
        let recenter = RecenterMode::Zoom.for_fixed_zoom(self.config.fixed_zoom);
        if let Some(data) = self.data.as_mut() {
            self.provider.clear_layers();
            if !data.poi_pins.is_empty() {
                self.provider.draw_poi(&mut data.poi_pins);
            }
            if let Some(ds) = data.datasets.first_mut() {
                if ds.has_route() {
                    self.provider.draw_route(&ds.route, &ds.route_color);
                }
                let from = if last_only { ds.pushpins.len().saturating_sub(1) } else { 0 };
                let pushpins = &mut ds.pushpins[from..];
                if !pushpins.is_empty() {
                    self.provider.draw_pushpins(pushpins, recenter, ReplayState::Stopped);
                }
            }
            self.replay = ReplayState::Stopped;
        }
        self.report.hide(page, &self.config);
    }

    pub fn set_center(&mut self, center: GeoPoint, zoom: Option<u8>) {
        self.provider.set_center(&center, zoom);
    }

    /// Opens the popup of the pushpin a detail row points at.
    pub fn show_detail_pushpin(&mut self, dataset_index: usize, pin_index: usize) -> bool {
        if !self.config.detail_info_box {
            return false;
        }
        let center = self.config.detail_center_pushpin;
        match self.data.as_mut().and_then(|d| d.pushpin_mut(dataset_index, pin_index)) {
            Some(pushpin) => {
                self.provider.show_pushpin(pushpin, center);
                true
            }
            None => {
                log::debug!("no pushpin {}/{}", dataset_index, pin_index);
                false
            }
        }
    }

    /// A pushpin popup opened (or closed) on the map.
    pub fn highlight_detail_row(&mut self, page: &mut dyn Page, record_index: Option<usize>, highlight: bool) {
        let index = if highlight { record_index } else { None };
        self.report.highlight(page, &self.config, index);
    }

    pub fn toggle_details(&mut self, page: &mut dyn Page) {
        self.report.toggle(page, &self.config, self.data.as_ref());
    }

    // ** Replay **

    pub fn set_replay_state(&mut self, page: &mut dyn Page, state: ReplayState) {
        self.replay = state;
        let src = format!("{}/{}", self.config.image_base_dir, replay_button_image(state));
        page.set_image(ids::MAP_REPLAY_BTN, &src);
    }

    pub fn pause_replay(&mut self, page: &mut dyn Page) -> ReplayState {
        let state = self.provider.pause_replay(self.replay);
        self.set_replay_state(page, state);
        state
    }

    // ** Geozones and readouts **

    /// Draws a zone being edited; returns how many of its vertices are shown.
    pub fn set_geozone(&mut self, zone: Geozone) -> usize {
        let shown = zone.drawable_points().len();
        self.provider.draw_geozone(&zone);
        self.zone = Some(zone);
        shown
    }

    fn geozone_mode(&self) -> bool {
        self.zone.is_some()
    }

    pub fn set_lat_lon_display(&self, page: &mut dyn Page, point: GeoPoint) {
        let decimals = if self.geozone_mode() { 5 } else { 4 };
        let text = format!(
            "{}, {}",
            format_coord(point.latitude, true, decimals, self.config.latlon_format),
            format_coord(point.longitude, false, decimals, self.config.latlon_format)
        );
        page.set_inner_html(Surface::Main, ids::LAT_LON_DISPLAY, &text);
    }

    /// Zone editing always measures in meters; otherwise the configured units.
    pub fn set_distance_display(&self, page: &mut dyn Page, meters: f64) {
        let text = if self.geozone_mode() {
            format!("{:.0} {}", meters, self.config.labels.meters)
        } else {
            let units = self.config.distance_units;
            format!("{:.2} {}", units.from_meters(meters), units.label())
        };
        page.set_inner_html(Surface::Main, ids::DISTANCE_DISPLAY, &text);
    }

    /// Moves the selected zone vertex and mirrors it into the zone form.
    pub fn set_point_zone_value(&mut self, page: &mut dyn Page, point: GeoPoint, radius_m: f64) -> bool {
        let Some(zone) = self.zone.as_mut() else {
            return false;
        };
        let Some(index) = zone.primary_index.filter(|i| *i < zone.points.len()) else {
            return false;
        };
        zone.points[index] = point;
        zone.radius_m = radius_m;

        page.set_value(&format!("{}{}", ids::ZONE_LATITUDE_PREFIX, index), &format!("{:.5}", point.latitude));
        page.set_value(&format!("{}{}", ids::ZONE_LONGITUDE_PREFIX, index), &format!("{:.5}", point.longitude));
        page.set_value(ids::ZONE_RADIUS_M, &format!("{}", radius_m));
        self.set_lat_lon_display(page, point);
        self.set_distance_display(page, radius_m);
        true
    }

    /// Collapses or expands the map control panel.
    pub fn toggle_control(&mut self, page: &mut dyn Page) {
        let visible = !self.control_visible;
        if !page.set_visible(Surface::Main, ids::MAP_CONTROL, visible) {
            return;
        }
        let bar = if visible { classes::CONTROL_BAR_OPEN } else { classes::CONTROL_BAR_CLOSED };
        page.set_class_name(Surface::Main, ids::MAP_CONTROL_BAR, bar);
        self.control_visible = visible;
    }

    pub fn ping_result(&self, page: &mut dyn Page, result: PingResult) {
        page.notify(result.notice());
    }

    pub fn unload(&mut self) {
        self.auto_update.stop();
        self.in_flight = None;
        self.provider.unload();
    }
}

impl TrackSession<GeoJsonProvider> {
    /// Highlights the detail row of the pushpin within the click tolerance
    /// of `point`, returning its record index.
    pub fn click_at(&mut self, page: &mut dyn Page, point: GeoPoint) -> Option<usize> {
        let record_index = self
            .provider
            .pushpin_at(&point, self.config.click_tolerance_m)
            .and_then(|marker| marker.record_index);
        self.report.highlight(page, &self.config, record_index);
        record_index
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Viewport;
    use crate::page::MemoryPage;
    use crate::types::{GeozoneType, MapShape, Pushpin};

    /// Records every provider call.
    #[derive(Default)]
    struct Recorder {
        calls: Vec<String>,
        next: u64,
    }

    impl MapProvider for Recorder {
        fn clear_layers(&mut self) {
            self.calls.push("clear".into());
        }

        fn draw_pushpins(&mut self, pushpins: &mut [Pushpin], recenter: RecenterMode, replay: ReplayState) {
            for p in pushpins.iter_mut() {
                self.next += 1;
                p.marker = Some(self.next);
            }
            self.calls.push(format!("pushpins {} {:?} {:?}", pushpins.len(), recenter, replay));
        }

        fn draw_poi(&mut self, pushpins: &mut [Pushpin]) {
            self.calls.push(format!("poi {}", pushpins.len()));
        }

        fn draw_route(&mut self, route: &[GeoPoint], color: &str) {
            self.calls.push(format!("route {} {}", route.len(), color));
        }

        fn draw_shape(&mut self, shape: &MapShape) -> bool {
            self.calls.push(format!("shape {}", shape.shape_type.name()));
            true
        }

        fn show_pushpin(&mut self, pushpin: &mut Pushpin, center: bool) {
            pushpin.popup_shown = true;
            self.calls.push(format!("show {:?} {}", pushpin.record_index, center));
        }

        fn pause_replay(&mut self, replay: ReplayState) -> ReplayState {
            if replay == ReplayState::Running { ReplayState::Paused } else { ReplayState::Running }
        }
    }

    const DOC: &str = "<MapData>\
        <LastEvent timestamp='100' timezone='PST' battery='0.8'>2010/01/01|08:00:00</LastEvent>\
        <Shape type='circle' radius='100'>1.0/1.0</Shape>\
        <DataSet type='poi'><P>H|home|1|||||0|5|5</P></DataSet>\
        <DataSet id='a' routeColor='#00FF00'>\
        <P>A|a|1|2010/01/01|07:00:00|PST|Go|0|1|1</P>\
        <P>A|a|2|2010/01/01|07:30:00|PST|Go|0|2|2</P>\
        </DataSet>\
        <DataSet id='b'><P>B|b|3|2010/01/01|07:45:00|PST|Go|0|3|3</P></DataSet>\
        <Action command='autoupdate'>true</Action>\
        <Action command='alert'>Check in</Action>\
        </MapData>";

    fn session(config: MapConfig) -> TrackSession<Recorder> {
        TrackSession::new(config, Recorder::default())
    }

    fn load(s: &mut TrackSession<Recorder>, page: &mut MemoryPage, recenter: RecenterMode, replay: ReplayState) -> usize {
        let ticket = s.begin_load(page);
        s.complete_load(page, ticket, PointsResponse::Data(DOC.into()), recenter, replay).unwrap()
    }

    #[test]
    fn draw_order_and_recenter_policy() {
        let mut s = session(MapConfig::default());
        let mut page = MemoryPage::with_standard_elements();
        assert_eq!(load(&mut s, &mut page, RecenterMode::Last, ReplayState::Stopped), 3);

        assert_eq!(
            s.provider().calls,
            vec![
                "clear",
                "clear",
                "poi 1",
                "route 2 #00FF00",
                "pushpins 2 None Stopped",
                "pushpins 1 Last Stopped",
                "shape circle",
            ]
        );
        assert!(s.auto_update_running());
        assert_eq!(page.notices, vec![Notice::Message("Check in".into())]);
        assert_eq!(page.html(ids::LATEST_EVENT_DATE), "2010/01/01");
        assert_eq!(page.html(ids::LATEST_EVENT_TMZ), "PST");
        assert_eq!(page.html(ids::LATEST_BATTERY), "<img src=\"images/Batt090.png\"/>");
        assert_eq!(page.element(Surface::Main, ids::MAP_UPDATE_BTN).unwrap().class, classes::UPDATE_IDLE);
    }

    #[test]
    fn fixed_zoom_and_replay_limit_drawing() {
        let mut s = session(MapConfig { fixed_zoom: true, ..MapConfig::default() });
        let mut page = MemoryPage::with_standard_elements();
        load(&mut s, &mut page, RecenterMode::Zoom, ReplayState::Running);
        let pushpin_calls: Vec<&String> = s.provider().calls.iter().filter(|c| c.starts_with("pushpins")).collect();
        assert_eq!(pushpin_calls, vec!["pushpins 2 None Running"]);
        assert_eq!(s.replay_state(), ReplayState::Running);

        assert_eq!(s.pause_replay(&mut page), ReplayState::Paused);
        assert_eq!(page.element(Surface::Main, ids::MAP_REPLAY_BTN).unwrap().image, "images/Continue20.png");
    }

    #[test]
    fn superseded_load_is_rejected() {
        let mut s = session(MapConfig::default());
        let mut page = MemoryPage::with_standard_elements();
        let first = s.begin_load(&mut page);
        let second = s.begin_load(&mut page);

        let err = s
            .complete_load(&mut page, first, PointsResponse::Data(DOC.into()), RecenterMode::Zoom, ReplayState::Stopped)
            .unwrap_err();
        assert!(matches!(err, TrackError::StaleResponse { ticket: 1, current: 2 }));
        assert!(s.data().is_none());

        let empty = PointsResponse::Data("<MapData/>".into());
        assert_eq!(s.complete_load(&mut page, second, empty, RecenterMode::Zoom, ReplayState::Stopped).unwrap(), 0);
        assert!(s.data().unwrap().root_found);
    }

    #[test]
    fn logout_and_transport_failures_notify() {
        let mut s = session(MapConfig::default());
        let mut page = MemoryPage::with_standard_elements();
        let ticket = s.begin_load(&mut page);
        let err = s
            .complete_load(&mut page, ticket, PointsResponse::Logout, RecenterMode::Zoom, ReplayState::Stopped)
            .unwrap_err();
        assert!(matches!(err, TrackError::SessionExpired));
        assert_eq!(page.notices, vec![Notice::SessionExpired]);

        let ticket = s.begin_load(&mut page);
        s.fail_load(&mut page, ticket, &TrackError::NotLoaded);
        assert_eq!(page.element(Surface::Main, ids::MAP_UPDATE_BTN).unwrap().class, classes::UPDATE_ERROR);
        assert_eq!(page.notices.len(), 2);
        // A second failure for the same ticket is stale.
        s.fail_load(&mut page, ticket, &TrackError::NotLoaded);
        assert_eq!(page.notices.len(), 2);
    }

    #[test]
    fn response_without_root_shows_nothing() {
        let mut s = session(MapConfig::default());
        let mut page = MemoryPage::with_standard_elements();
        assert_eq!(s.show_xml(&mut page, "<html><body>Service unavailable</body></html>"), 0);
        let data = s.data().unwrap();
        assert!(!data.root_found);
        assert_eq!(data.pushpin_count(), 0);
        assert_eq!(s.provider().calls.last().unwrap(), "clear");
    }

    #[test]
    fn session_expiry_stops_auto_update() {
        let config = MapConfig { auto_update_interval_secs: 2, ..MapConfig::default() };
        let mut s = session(config);
        let mut page = MemoryPage::with_standard_elements();
        load(&mut s, &mut page, RecenterMode::Zoom, ReplayState::Stopped);
        assert!(s.auto_update_running());

        let ticket = s.begin_load(&mut page);
        assert!(s
            .complete_load(&mut page, ticket, PointsResponse::Logout, RecenterMode::Zoom, ReplayState::Stopped)
            .is_err());
        assert!(!s.auto_update_running());
        assert!((0..100).all(|_| !s.tick()));

        s.start_auto_update();
        let ticket = s.begin_load(&mut page);
        s.fail_load(&mut page, ticket, &TrackError::SessionExpired);
        assert!(!s.auto_update_running());
        assert!((0..100).all(|_| !s.tick()));
        assert_eq!(page.notices.last(), Some(&Notice::SessionExpired));
    }

    #[test]
    fn detail_pushpin_and_row_highlight() {
        let config = MapConfig { detail_center_pushpin: true, ..MapConfig::default() };
        let mut s = session(config);
        let mut page = MemoryPage::with_standard_elements();
        load(&mut s, &mut page, RecenterMode::Zoom, ReplayState::Stopped);

        assert!(s.show_detail_pushpin(0, 1));
        assert_eq!(s.provider().calls.last().unwrap(), "show Some(2) true");
        assert!(s.data().unwrap().pushpin(0, 1).unwrap().popup_shown);
        assert!(!s.show_detail_pushpin(5, 0));

        s.highlight_detail_row(&mut page, Some(2), true);
        assert_eq!(s.highlighted_row(), Some(2));
        s.highlight_detail_row(&mut page, Some(2), false);
        assert_eq!(s.highlighted_row(), None);
    }

    #[test]
    fn center_on_last_draws_first_dataset_and_closes_report() {
        let mut s = session(MapConfig::default());
        let mut page = MemoryPage::with_standard_elements();
        load(&mut s, &mut page, RecenterMode::Zoom, ReplayState::Stopped);
        s.toggle_details(&mut page);
        assert!(!page.html(ids::DETAIL_TABLE).is_empty());

        s.center_on_last_pushpin(&mut page, true);
        let tail: Vec<&String> = s.provider().calls.iter().rev().take(4).collect();
        assert_eq!(tail, vec!["pushpins 1 Zoom Stopped", "route 2 #00FF00", "poi 1", "clear"]);
        assert_eq!(page.html(ids::DETAIL_TABLE), "");
    }

    #[test]
    fn partial_message_and_missing_last_event() {
        let mut s = session(MapConfig { max_pushpins: 1, ..MapConfig::default() });
        let mut page = MemoryPage::with_standard_elements();
        s.show_xml(&mut page, "<MapData><DataSet><P>A|a|1|||||0|1|1</P><P>A|a|2|||||0|2|2</P></DataSet></MapData>");
        assert_eq!(page.html(ids::MESSAGE_TEXT), s.config().labels.max_pushpins);
        assert_eq!(page.html(ids::LATEST_EVENT_TIME), s.config().labels.unavailable);
        assert_eq!(page.html(ids::LATEST_BATTERY), "<img src=\"images/Batt000.png\"/>");
    }

    #[test]
    fn zone_editing_readouts() {
        let mut s = session(MapConfig::default());
        let mut page = MemoryPage::with_standard_elements();
        s.set_distance_display(&mut page, 1609.344);
        assert_eq!(page.html(ids::DISTANCE_DISPLAY), "1.00 miles");

        let shown = s.set_geozone(Geozone {
            zone_type: GeozoneType::PointRadius,
            radius_m: 100.0,
            points: vec![GeoPoint::new(1.0, 1.0), GeoPoint::new(0.0, 0.0)],
            color: "#FF0000".into(),
            primary_index: Some(1),
        });
        assert_eq!(shown, 0);
        page.add(Surface::Main, "zoneLatitude_1");
        assert!(s.set_point_zone_value(&mut page, GeoPoint::new(47.123456, 8.5), 250.0));
        assert_eq!(page.element(Surface::Main, "zoneLatitude_1").unwrap().value, "47.12346");
        assert_eq!(page.element(Surface::Main, ids::ZONE_RADIUS_M).unwrap().value, "250");
        assert_eq!(page.html(ids::LAT_LON_DISPLAY), "47.12346, 8.50000");
        assert_eq!(page.html(ids::DISTANCE_DISPLAY), "250 meters");
    }

    #[test]
    fn control_toggle_and_ticks() {
        let mut s = session(MapConfig { auto_update_interval_secs: 2, ..MapConfig::default() });
        let mut page = MemoryPage::with_standard_elements();
        s.toggle_control(&mut page);
        assert!(!page.element(Surface::Main, ids::MAP_CONTROL).unwrap().visible);
        assert_eq!(page.element(Surface::Main, ids::MAP_CONTROL_BAR).unwrap().class, classes::CONTROL_BAR_CLOSED);

        assert!(!s.tick());
        s.start_auto_update();
        assert!(!s.tick());
        assert!(s.tick());
        s.unload();
        assert!(!s.tick());
    }

    #[test]
    fn works_with_geojson_backend() {
        let mut s = TrackSession::new(MapConfig::default(), GeoJsonProvider::new(Viewport::default()));
        let mut page = MemoryPage::with_standard_elements();
        s.show_xml(&mut page, DOC);
        // 1 POI + 3 pushpins, one route and one circle.
        assert_eq!(s.provider().marker_count(), 4);
        assert_eq!(s.provider().overlay_count(), 2);
        // 0.0001 degrees is about 11 m, inside the default 50 m tolerance.
        assert_eq!(s.click_at(&mut page, GeoPoint::new(2.0001, 2.0)), Some(2));
        assert_eq!(s.highlighted_row(), Some(2));
        assert_eq!(s.click_at(&mut page, GeoPoint::new(2.01, 2.0)), None);
        assert_eq!(s.highlighted_row(), None);

        let tight = MapConfig { click_tolerance_m: 5.0, ..MapConfig::default() };
        let mut s = TrackSession::new(tight, GeoJsonProvider::new(Viewport::default()));
        s.show_xml(&mut page, DOC);
        assert_eq!(s.click_at(&mut page, GeoPoint::new(2.0001, 2.0)), None);
    }
}
