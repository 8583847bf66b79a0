//! JavaScript side of the pipeline: the map widget and host page the browser
//! provides, and the objects the page drives.

use std::cell::RefCell;
use std::rc::Rc;

use serde::Serialize;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::future_to_promise;
use wasm_bindgen_futures::js_sys;

use crate::alert::{AlertConfig, AlertOutcome, AlertWidget, MatchState};
use crate::config::MapConfig;
use crate::error::TrackError;
use crate::fetch::TrackClient;
use crate::page::{Notice, Page, Surface};
use crate::provider::{Geozone, MapProvider};
use crate::session::TrackSession;
use crate::types::{GeoPoint, MapShape, Pushpin, RecenterMode, ReplayState};

#[wasm_bindgen]
extern "C" {
    /// A map widget implemented in JavaScript.
    pub type JsMapBackend;

    #[wasm_bindgen(method, js_name = JSClearLayers)]
    fn js_clear_layers(this: &JsMapBackend);

    #[wasm_bindgen(method, js_name = JSSetCenter)]
    fn js_set_center(this: &JsMapBackend, lat: f64, lon: f64, zoom: Option<u8>);

    /// Returns the marker handle created for each pushpin, in order.
    #[wasm_bindgen(method, js_name = JSDrawPushpins)]
    fn js_draw_pushpins(this: &JsMapBackend, pushpins: JsValue, recenter: u8, replay: u8) -> JsValue;

    #[wasm_bindgen(method, js_name = JSDrawPOI)]
    fn js_draw_poi(this: &JsMapBackend, pushpins: JsValue) -> JsValue;

    #[wasm_bindgen(method, js_name = JSDrawRoute)]
    fn js_draw_route(this: &JsMapBackend, route: JsValue, color: &str);

    #[wasm_bindgen(method, js_name = JSDrawShape)]
    fn js_draw_shape(this: &JsMapBackend, shape: JsValue) -> bool;

    #[wasm_bindgen(method, js_name = JSDrawGeozone)]
    fn js_draw_geozone(this: &JsMapBackend, zone: JsValue);

    #[wasm_bindgen(method, js_name = JSShowPushpin)]
    fn js_show_pushpin(this: &JsMapBackend, marker: f64, center: bool);

    #[wasm_bindgen(method, js_name = JSPauseReplay)]
    fn js_pause_replay(this: &JsMapBackend, replay: u8) -> u8;

    #[wasm_bindgen(method, js_name = JSUnload)]
    fn js_unload(this: &JsMapBackend);
}

#[wasm_bindgen]
extern "C" {
    /// The host document (and its detail window).
    pub type JsPage;

    #[wasm_bindgen(method, js_name = setInnerHTML)]
    fn js_set_inner_html(this: &JsPage, surface: &str, id: &str, html: &str) -> bool;

    #[wasm_bindgen(method, js_name = setClassName)]
    fn js_set_class_name(this: &JsPage, surface: &str, id: &str, class: &str) -> bool;

    #[wasm_bindgen(method, js_name = setVisible)]
    fn js_set_visible(this: &JsPage, surface: &str, id: &str, visible: bool) -> bool;

    #[wasm_bindgen(method, js_name = setValue)]
    fn js_set_value(this: &JsPage, id: &str, value: &str) -> bool;

    #[wasm_bindgen(method, js_name = setImage)]
    fn js_set_image(this: &JsPage, id: &str, src: &str) -> bool;

    #[wasm_bindgen(method, js_name = openDetailWindow)]
    fn js_open_detail_window(this: &JsPage, width: u32, height: u32) -> bool;

    #[wasm_bindgen(method, js_name = closeDetailWindow)]
    fn js_close_detail_window(this: &JsPage);

    #[wasm_bindgen(method, js_name = notify)]
    fn js_notify(this: &JsPage, kind: &str, text: &str);

    #[wasm_bindgen(method, js_name = navigate)]
    fn js_navigate(this: &JsPage, url: &str);
}

fn to_js<T: Serialize + ?Sized>(value: &T) -> Option<JsValue> {
    match serde_wasm_bindgen::to_value(value) {
        Ok(v) => Some(v),
        Err(e) => {
            log::warn!("could not hand value to the map: {}", e);
            None
        }
    }
}

fn attach_handles(pushpins: &mut [Pushpin], returned: JsValue) {
    if returned.is_undefined() || returned.is_null() {
        return;
    }
    match serde_wasm_bindgen::from_value::<Vec<Option<u64>>>(returned) {
        Ok(handles) => {
            for (pushpin, handle) in pushpins.iter_mut().zip(handles) {
                pushpin.marker = handle;
            }
        }
        Err(e) => log::warn!("map returned unusable marker handles: {}", e),
    }
}

impl MapProvider for JsMapBackend {
    fn clear_layers(&mut self) {
        self.js_clear_layers();
    }

    fn set_center(&mut self, center: &GeoPoint, zoom: Option<u8>) {
        self.js_set_center(center.latitude, center.longitude, zoom);
    }

    fn draw_pushpins(&mut self, pushpins: &mut [Pushpin], recenter: RecenterMode, replay: ReplayState) {
        if let Some(value) = to_js(&*pushpins) {
            let handles = self.js_draw_pushpins(value, recenter as u8, replay as u8);
            attach_handles(pushpins, handles);
        }
    }

    fn draw_poi(&mut self, pushpins: &mut [Pushpin]) {
        if let Some(value) = to_js(&*pushpins) {
            let handles = self.js_draw_poi(value);
            attach_handles(pushpins, handles);
        }
    }

    fn draw_route(&mut self, route: &[GeoPoint], color: &str) {
        if let Some(value) = to_js(route) {
            self.js_draw_route(value, color);
        }
    }

    fn draw_shape(&mut self, shape: &MapShape) -> bool {
        to_js(shape).is_some_and(|value| self.js_draw_shape(value))
    }

    fn draw_geozone(&mut self, zone: &Geozone) {
        if let Some(value) = to_js(zone) {
            self.js_draw_geozone(value);
        }
    }

    fn show_pushpin(&mut self, pushpin: &mut Pushpin, center: bool) {
        if let Some(marker) = pushpin.marker {
            self.js_show_pushpin(marker as f64, center);
            pushpin.popup_shown = true;
        }
    }

    fn pause_replay(&mut self, replay: ReplayState) -> ReplayState {
        ReplayState::from_code(self.js_pause_replay(replay as u8))
    }

    fn unload(&mut self) {
        self.js_unload();
    }
}

fn surface_name(surface: Surface) -> &'static str {
    match surface {
        Surface::Main => "main",
        Surface::DetailWindow => "detail",
    }
}

impl Page for JsPage {
    fn set_inner_html(&mut self, surface: Surface, id: &str, html: &str) -> bool {
        self.js_set_inner_html(surface_name(surface), id, html)
    }

    fn set_class_name(&mut self, surface: Surface, id: &str, class: &str) -> bool {
        self.js_set_class_name(surface_name(surface), id, class)
    }

    fn set_visible(&mut self, surface: Surface, id: &str, visible: bool) -> bool {
        self.js_set_visible(surface_name(surface), id, visible)
    }

    fn set_value(&mut self, id: &str, value: &str) -> bool {
        self.js_set_value(id, value)
    }

    fn set_image(&mut self, id: &str, src: &str) -> bool {
        self.js_set_image(id, src)
    }

    fn open_detail_window(&mut self, width: u32, height: u32) -> bool {
        self.js_open_detail_window(width, height)
    }

    fn close_detail_window(&mut self) {
        self.js_close_detail_window();
    }

    fn notify(&mut self, notice: Notice) {
        match notice {
            Notice::SessionExpired => self.js_notify("session_expired", ""),
            Notice::PingOk => self.js_notify("ping_ok", ""),
            Notice::PingError => self.js_notify("ping_error", ""),
            Notice::Message(text) => self.js_notify("message", &text),
            Notice::Error(text) => self.js_notify("error", &text),
        }
    }

    fn navigate(&mut self, url: &str) {
        self.js_navigate(url);
    }
}

fn busy() -> JsValue {
    TrackError::Js("map is busy".into()).into()
}

/// A tracking map bound to a JavaScript map widget and page.
#[wasm_bindgen]
pub struct TrackMap {
    session: Rc<RefCell<TrackSession<JsMapBackend>>>,
    page: Rc<RefCell<JsPage>>,
    client: TrackClient,
}

impl TrackMap {
    // Widget callbacks can re-enter while a draw is in progress; those calls
    // fail instead of panicking on the RefCell.
    fn with<T>(&self, f: impl FnOnce(&mut TrackSession<JsMapBackend>, &mut JsPage) -> T) -> Result<T, JsValue> {
        let mut session = self.session.try_borrow_mut().map_err(|_| busy())?;
        let mut page = self.page.try_borrow_mut().map_err(|_| busy())?;
        Ok(f(&mut *session, &mut *page))
    }
}

#[wasm_bindgen]
impl TrackMap {
    #[wasm_bindgen(constructor)]
    pub fn new(config_json: &str, backend: JsMapBackend, page: JsPage) -> Result<TrackMap, JsValue> {
        let config = MapConfig::from_json(config_json)?;
        Ok(TrackMap {
            session: Rc::new(RefCell::new(TrackSession::new(config, backend))),
            page: Rc::new(RefCell::new(page)),
            client: TrackClient::new(),
        })
    }

    /// Fetches and shows a points document. Resolves to the number of
    /// detail records; a response overtaken by a newer load rejects.
    pub fn load(&self, url: String, recenter: u8, replay: u8) -> Result<js_sys::Promise, JsValue> {
        let ticket = self.with(|session, page| session.begin_load(page))?;
        let session = Rc::clone(&self.session);
        let page = Rc::clone(&self.page);
        let client = self.client.clone();
        Ok(future_to_promise(async move {
            let response = client.fetch_points(&url).await;
            let mut session = session.try_borrow_mut().map_err(|_| busy())?;
            let mut page = page.try_borrow_mut().map_err(|_| busy())?;
            let page = &mut *page;
            let result = match response {
                Ok(points) => session.complete_load(
                    page,
                    ticket,
                    points,
                    RecenterMode::from_code(recenter),
                    ReplayState::from_code(replay),
                ),
                Err(e) => {
                    session.fail_load(page, ticket, &e);
                    Err(e)
                }
            };
            match result {
                Ok(count) => Ok(JsValue::from_f64(count as f64)),
                Err(e) => Err(JsValue::from(e)),
            }
        }))
    }

    /// Shows a points document already in hand.
    #[wasm_bindgen(js_name = parseXML)]
    pub fn parse_xml(&self, xml: &str) -> Result<usize, JsValue> {
        self.with(|session, page| session.show_xml(page, xml))
    }

    /// Current view model, for widgets that want more than the draw calls.
    #[wasm_bindgen(js_name = mapData)]
    pub fn map_data(&self) -> Result<JsValue, JsValue> {
        let session = self.session.try_borrow().map_err(|_| busy())?;
        let data = session.data().ok_or(TrackError::NotLoaded)?;
        Ok(serde_wasm_bindgen::to_value(data).map_err(TrackError::from)?)
    }

    pub fn ping(&self, url: String) -> js_sys::Promise {
        let session = Rc::clone(&self.session);
        let page = Rc::clone(&self.page);
        let client = self.client.clone();
        future_to_promise(async move {
            let result = client.ping(&url).await;
            let session = session.try_borrow().map_err(|_| busy())?;
            let mut page = page.try_borrow_mut().map_err(|_| busy())?;
            match result {
                Ok(ping) => {
                    session.ping_result(&mut *page, ping);
                    Ok(JsValue::TRUE)
                }
                Err(e) => {
                    log::warn!("ping failed: {}", e);
                    page.notify(Notice::PingError);
                    Ok(JsValue::FALSE)
                }
            }
        })
    }

    /// One second elapsed; true when the page should call `load` again.
    pub fn tick(&self) -> Result<bool, JsValue> {
        self.with(|session, _| session.tick())
    }

    #[wasm_bindgen(js_name = startAutoUpdate)]
    pub fn start_auto_update(&self) -> Result<(), JsValue> {
        self.with(|session, _| session.start_auto_update())
    }

    #[wasm_bindgen(js_name = stopAutoUpdate)]
    pub fn stop_auto_update(&self) -> Result<(), JsValue> {
        self.with(|session, _| session.stop_auto_update())
    }

    #[wasm_bindgen(js_name = showDetailPushpin)]
    pub fn show_detail_pushpin(&self, dataset_index: usize, pin_index: usize) -> Result<bool, JsValue> {
        self.with(|session, _| session.show_detail_pushpin(dataset_index, pin_index))
    }

    #[wasm_bindgen(js_name = highlightDetailRow)]
    pub fn highlight_detail_row(&self, record_index: Option<usize>, highlight: bool) -> Result<(), JsValue> {
        self.with(|session, page| session.highlight_detail_row(page, record_index, highlight))
    }

    #[wasm_bindgen(js_name = toggleDetails)]
    pub fn toggle_details(&self) -> Result<(), JsValue> {
        self.with(|session, page| session.toggle_details(page))
    }

    #[wasm_bindgen(js_name = centerOnLastPushpin)]
    pub fn center_on_last_pushpin(&self, last_only: bool) -> Result<(), JsValue> {
        self.with(|session, page| session.center_on_last_pushpin(page, last_only))
    }

    #[wasm_bindgen(js_name = setCenter)]
    pub fn set_center(&self, lat: f64, lon: f64, zoom: Option<u8>) -> Result<(), JsValue> {
        self.with(|session, _| session.set_center(GeoPoint::new(lat, lon), zoom))
    }

    #[wasm_bindgen(js_name = pauseReplay)]
    pub fn pause_replay(&self) -> Result<u8, JsValue> {
        self.with(|session, page| session.pause_replay(page) as u8)
    }

    #[wasm_bindgen(js_name = setReplayState)]
    pub fn set_replay_state(&self, state: u8) -> Result<(), JsValue> {
        self.with(|session, page| session.set_replay_state(page, ReplayState::from_code(state)))
    }

    #[wasm_bindgen(js_name = setGeozone)]
    pub fn set_geozone(&self, zone: JsValue) -> Result<usize, JsValue> {
        let zone: Geozone = serde_wasm_bindgen::from_value(zone).map_err(TrackError::from)?;
        self.with(|session, _| session.set_geozone(zone))
    }

    #[wasm_bindgen(js_name = setLatLonDisplay)]
    pub fn set_lat_lon_display(&self, lat: f64, lon: f64) -> Result<(), JsValue> {
        self.with(|session, page| session.set_lat_lon_display(page, GeoPoint::new(lat, lon)))
    }

    #[wasm_bindgen(js_name = setDistanceDisplay)]
    pub fn set_distance_display(&self, meters: f64) -> Result<(), JsValue> {
        self.with(|session, page| session.set_distance_display(page, meters))
    }

    #[wasm_bindgen(js_name = setPointZoneValue)]
    pub fn set_point_zone_value(&self, lat: f64, lon: f64, radius_m: f64) -> Result<bool, JsValue> {
        self.with(|session, page| session.set_point_zone_value(page, GeoPoint::new(lat, lon), radius_m))
    }

    #[wasm_bindgen(js_name = toggleControl)]
    pub fn toggle_control(&self) -> Result<(), JsValue> {
        self.with(|session, page| session.toggle_control(page))
    }

    pub fn unload(&self) -> Result<(), JsValue> {
        self.with(|session, _| session.unload())
    }
}

fn outcome_name(outcome: AlertOutcome) -> &'static str {
    match outcome {
        AlertOutcome::Redrawn(MatchState::Active) => "active",
        AlertOutcome::Redrawn(MatchState::Inactive) => "inactive",
        AlertOutcome::Redrawn(MatchState::Expired) | AlertOutcome::Expired => "expired",
        AlertOutcome::Unchanged => "unchanged",
        AlertOutcome::Stale => "stale",
    }
}

/// The alert indicator widget.
#[wasm_bindgen]
pub struct AlertPoller {
    widget: Rc<RefCell<AlertWidget>>,
    page: Rc<RefCell<JsPage>>,
    client: TrackClient,
}

#[wasm_bindgen]
impl AlertPoller {
    #[wasm_bindgen(constructor)]
    pub fn new(config_json: &str, page: JsPage) -> Result<AlertPoller, JsValue> {
        let config = AlertConfig::from_json(config_json)?;
        Ok(AlertPoller {
            widget: Rc::new(RefCell::new(AlertWidget::new(config))),
            page: Rc::new(RefCell::new(page)),
            client: TrackClient::new(),
        })
    }

    pub fn start(&self) -> Result<(), JsValue> {
        let mut widget = self.widget.try_borrow_mut().map_err(|_| busy())?;
        let mut page = self.page.try_borrow_mut().map_err(|_| busy())?;
        widget.start(&mut *page);
        Ok(())
    }

    pub fn stop(&self) -> Result<(), JsValue> {
        self.widget.try_borrow_mut().map_err(|_| busy())?.stop();
        Ok(())
    }

    /// One second elapsed. Returns the poll's promise when one was due.
    pub fn tick(&self) -> Result<Option<js_sys::Promise>, JsValue> {
        let ticket = {
            let mut widget = self.widget.try_borrow_mut().map_err(|_| busy())?;
            let mut page = self.page.try_borrow_mut().map_err(|_| busy())?;
            widget.tick(&mut *page)
        };
        let Some(ticket) = ticket else {
            return Ok(None);
        };

        let url = self.widget.try_borrow().map_err(|_| busy())?.config().eval_url.clone();
        let widget = Rc::clone(&self.widget);
        let page = Rc::clone(&self.page);
        let client = self.client.clone();
        Ok(Some(future_to_promise(async move {
            let body = client.poll_alert(&url).await;
            let mut widget = widget.try_borrow_mut().map_err(|_| busy())?;
            match body {
                Ok(body) => {
                    let mut page = page.try_borrow_mut().map_err(|_| busy())?;
                    let outcome = widget.complete(&mut *page, ticket, &body);
                    Ok(JsValue::from_str(outcome_name(outcome)))
                }
                Err(e) => {
                    widget.fail(ticket);
                    Err(JsValue::from(e))
                }
            }
        })))
    }

    #[wasm_bindgen(js_name = gotoAlertPage)]
    pub fn goto_alert_page(&self) -> Result<(), JsValue> {
        let widget = self.widget.try_borrow().map_err(|_| busy())?;
        let mut page = self.page.try_borrow_mut().map_err(|_| busy())?;
        widget.goto_alert_page(&mut *page);
        Ok(())
    }
}
