//! The alert status widget: polls a rule endpoint and shows whether the rule
//! currently matches.

use quick_xml::events::Event;
use quick_xml::Reader;
use serde::Deserialize;

use crate::page::{classes, ids, Page, Surface};
use crate::timer::Countdown;

/// Shortest allowed poll interval.
pub const MIN_REFRESH_INTERVAL_SECS: u32 = 10;

const TAG_RESULT: &[u8] = b"Result";

/// What the rule endpoint said.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchState {
    /// No usable answer; the session is gone.
    Expired,
    Inactive,
    Active,
}

/// Reads `<Result>N</Result>`.
pub fn parse_alert_result(body: &str) -> MatchState {
    let body = body.trim();
    if body.eq_ignore_ascii_case("false") {
        return MatchState::Inactive;
    }
    match result_text(body) {
        None => MatchState::Expired,
        Some(text) => {
            let text = text.trim();
            if text.is_empty() || text == "0" {
                MatchState::Inactive
            } else if text.parse::<f64>().is_ok() {
                MatchState::Active
            } else {
                MatchState::Expired
            }
        }
    }
}

/// Text of the first `Result` element; `None` if there is none.
fn result_text(xml: &str) -> Option<String> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);
    let mut inside = false;
    let mut text = String::new();
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) if e.name().as_ref() == TAG_RESULT => inside = true,
            Ok(Event::Empty(e)) if e.name().as_ref() == TAG_RESULT => return Some(String::new()),
            Ok(Event::Text(t)) if inside => text.push_str(&t.unescape().ok()?),
            Ok(Event::CData(c)) if inside => text.push_str(&String::from_utf8_lossy(&c.into_inner())),
            Ok(Event::End(e)) if inside && e.name().as_ref() == TAG_RESULT => return Some(text),
            Ok(Event::Eof) | Err(_) => return None,
            _ => {}
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AlertLabels {
    pub alert_on: String,
    pub alert_off: String,
    pub no_alerts: String,
    pub goto_alerts: String,
    pub seconds_to_update: String,
    pub please_login: String,
    pub session_expired: String,
}

impl Default for AlertLabels {
    fn default() -> Self {
        AlertLabels {
            alert_on: "Alert".into(),
            alert_off: "No Alert".into(),
            no_alerts: "No alerts".into(),
            goto_alerts: "Show alerts".into(),
            seconds_to_update: "seconds to update".into(),
            please_login: "Please log in".into(),
            session_expired: "Session expired".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    pub rule_name: String,
    pub eval_url: String,
    /// Zero disables polling; anything else is raised to the minimum.
    pub interval_secs: u32,
    pub alert_page_url: String,
    pub labels: AlertLabels,
}

impl Default for AlertConfig {
    fn default() -> Self {
        AlertConfig {
            rule_name: "alert".into(),
            eval_url: "./Track?page=RULE_EVAL&rule=alert".into(),
            interval_secs: 30,
            alert_page_url: String::new(),
            labels: AlertLabels::default(),
        }
    }
}

impl AlertConfig {
    pub fn from_json(json: &str) -> crate::error::Result<Self> {
        if json.trim().is_empty() {
            return Ok(AlertConfig::default());
        }
        Ok(serde_json::from_str(json)?)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertState {
    Idle,
    Polling,
    /// Stopped after the session expired.
    Error,
}

/// Identifies one poll request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlertTicket(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertOutcome {
    Redrawn(MatchState),
    Unchanged,
    /// A newer request was issued after this one.
    Stale,
    Expired,
}

pub struct AlertWidget {
    config: AlertConfig,
    countdown: Countdown,
    state: AlertState,
    last_ticket: u64,
    in_flight: Option<u64>,
    /// `None` until something has been drawn.
    drawn: Option<MatchState>,
}

impl AlertWidget {
    pub fn new(config: AlertConfig) -> Self {
        let interval = config.interval_secs.max(MIN_REFRESH_INTERVAL_SECS);
        AlertWidget {
            config,
            countdown: Countdown::new(interval),
            state: AlertState::Idle,
            last_ticket: 0,
            in_flight: None,
            drawn: None,
        }
    }

    pub fn state(&self) -> AlertState {
        self.state
    }

    pub fn config(&self) -> &AlertConfig {
        &self.config
    }

    fn show_countdown(&self, page: &mut dyn Page, seconds: u32) {
        let text = format!("{} {}", seconds, self.config.labels.seconds_to_update);
        page.set_inner_html(Surface::Main, ids::ALERT_POLL_INTERVAL, &text);
    }

    /// Starts polling; the first tick polls right away.
    pub fn start(&mut self, page: &mut dyn Page) {
        if self.config.interval_secs == 0 {
            self.show_countdown(page, 0);
            return;
        }
        self.countdown.start(true);
        self.state = AlertState::Polling;
        self.show_countdown(page, 0);
        log::info!("alert polling every {}s", self.countdown.interval_secs());
    }

    pub fn stop(&mut self) {
        self.countdown.stop();
        self.in_flight = None;
        if self.state == AlertState::Polling {
            self.state = AlertState::Idle;
        }
    }

    /// One second elapsed. Returns a ticket when a poll is due.
    pub fn tick(&mut self, page: &mut dyn Page) -> Option<AlertTicket> {
        if self.state != AlertState::Polling {
            return None;
        }
        let fire = self.countdown.tick();
        self.show_countdown(page, self.countdown.remaining().unwrap_or(0));
        if !fire {
            return None;
        }
        self.last_ticket += 1;
        self.in_flight = Some(self.last_ticket);
        Some(AlertTicket(self.last_ticket))
    }

    /// Applies the response body for `ticket`.
    pub fn complete(&mut self, page: &mut dyn Page, ticket: AlertTicket, body: &str) -> AlertOutcome {
        if self.in_flight != Some(ticket.0) {
            log::debug!("dropping alert response #{} (current #{})", ticket.0, self.last_ticket);
            return AlertOutcome::Stale;
        }
        self.in_flight = None;

        let level = parse_alert_result(body);
        if level == MatchState::Expired {
            self.draw_expired(page);
            self.countdown.stop();
            self.state = AlertState::Error;
            return AlertOutcome::Expired;
        }
        if self.drawn == Some(level) {
            return AlertOutcome::Unchanged;
        }
        self.draw_level(page, level);
        self.drawn = Some(level);
        AlertOutcome::Redrawn(level)
    }

    /// The request for `ticket` failed in transport; polling carries on.
    pub fn fail(&mut self, ticket: AlertTicket) {
        if self.in_flight == Some(ticket.0) {
            log::warn!("alert poll #{} failed", ticket.0);
            self.in_flight = None;
        }
    }

    pub fn goto_alert_page(&self, page: &mut dyn Page) {
        if !self.config.alert_page_url.is_empty() {
            page.navigate(&self.config.alert_page_url);
        }
    }

    fn draw_expired(&self, page: &mut dyn Page) {
        let labels = &self.config.labels;
        page.set_class_name(Surface::Main, ids::ALERT_IMAGE, &format!("{}_login", classes::ALERT_IMAGE));
        if page.set_inner_html(Surface::Main, ids::ALERT_STATE_TEXT, &labels.please_login) {
            page.set_class_name(Surface::Main, ids::ALERT_STATE_TEXT, &format!("{}_login", classes::ALERT_STATE_TEXT));
        }
        if page.set_inner_html(Surface::Main, ids::ALERT_ACTION_TEXT, &labels.session_expired) {
            page.set_class_name(Surface::Main, ids::ALERT_ACTION_TEXT, &format!("{}_login", classes::ALERT_ACTION_TEXT));
        }
    }

    fn draw_level(&self, page: &mut dyn Page, level: MatchState) {
        let labels = &self.config.labels;
        let active = level == MatchState::Active;
        let suffix = if active { "_on" } else { "_off" };

        page.set_class_name(Surface::Main, ids::ALERT_IMAGE, &format!("{}{}", classes::ALERT_IMAGE, suffix));

        let state = format!(
            "{} <span class='{}'>({})</span>",
            if active { &labels.alert_on } else { &labels.alert_off },
            classes::ALERT_RULE_NAME,
            self.config.rule_name
        );
        if page.set_inner_html(Surface::Main, ids::ALERT_STATE_TEXT, &state) {
            page.set_class_name(Surface::Main, ids::ALERT_STATE_TEXT, &format!("{}{}", classes::ALERT_STATE_TEXT, suffix));
        }

        let action = match (active, self.config.alert_page_url.is_empty()) {
            (true, false) => format!("<a href='{}' data-action='gotoAlerts'>{}</a>", self.config.alert_page_url, labels.goto_alerts),
            (true, true) => labels.goto_alerts.clone(),
            (false, _) => labels.no_alerts.clone(),
        };
        if page.set_inner_html(Surface::Main, ids::ALERT_ACTION_TEXT, &action) {
            page.set_class_name(Surface::Main, ids::ALERT_ACTION_TEXT, &format!("{}{}", classes::ALERT_ACTION_TEXT, suffix));
        }
    }
}
