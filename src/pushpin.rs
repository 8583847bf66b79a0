//! View-model builders: pushpins with their info popup, and detail rows.

use std::fmt::Write;

use crate::config::MapConfig;
use crate::event::EventRecord;
use crate::geomath::format_coord;
use crate::icon::select_icon;
use crate::types::{DetailRow, Pushpin};

/// Attribute on the popup table naming the detail row to highlight.
pub const DETAIL_ROW_ATTR: &str = "data-detail-row";

fn info_row(html: &mut String, content: &str) {
    let _ = write!(html, "<tr class='infoBoxRow'><td class='infoBoxCell'>{}</td></tr>", content);
}

/// Formatted speed in the configured units, one decimal.
pub fn format_speed(config: &MapConfig, speed_kph: f64) -> String {
    format!("{:.1}", config.speed_units.from_kph(speed_kph))
}

/// Info-balloon HTML for one event.
pub fn popup_html(config: &MapConfig, record_index: Option<usize>, event: &EventRecord) -> String {
    let labels = &config.labels;
    let mut html = String::new();
    let row_attr = record_index
        .map(|i| format!(" {}='{}'", DETAIL_ROW_ATTR, i))
        .unwrap_or_default();
    let _ = write!(
        html,
        "<table class='infoBoxTable' cellspacing='1' cellpadding='1' border='0'{}>",
        row_attr
    );

    let index = record_index.map(|i| i.to_string()).unwrap_or_else(|| "-".into());
    info_row(&mut html, &format!("[#{}] &nbsp; <b>{} : {}</b>", index, event.device, event.code));
    info_row(
        &mut html,
        &format!("<b>{}:</b> {} {} [{}]", labels.info_date, event.date_fmt, event.time_fmt, event.time_zone),
    );

    let lat = format_coord(event.latitude, true, 5, config.latlon_format);
    let lon = format_coord(event.longitude, false, 5, config.latlon_format);
    let sats = if event.sat_count > 0 {
        format!(" [{} {}]", labels.info_sats, event.sat_count)
    } else {
        String::new()
    };
    info_row(&mut html, &format!("<b>{}:</b> {} / {} {}", labels.info_gps, lat, lon, sats));

    let speed = format!("{} {}", format_speed(config, event.speed_kph), config.speed_units.label());
    let moving = event.speed_kph > 0.0;
    if config.combine_speed_heading {
        if moving {
            info_row(&mut html, &format!("<b>{}:</b> {} &nbsp;({})", labels.info_speed, speed, event.compass()));
        } else {
            info_row(&mut html, &format!("<b>{}:</b> {}", labels.info_speed, speed));
        }
    } else {
        info_row(&mut html, &format!("<b>{}:</b> {}", labels.info_speed, speed));
        if moving {
            info_row(
                &mut html,
                &format!("<b>{}:</b> {:.0}&deg; &nbsp;({})", labels.info_heading, event.heading, event.compass()),
            );
        }
    }

    if config.show_altitude {
        let altitude = config.altitude_units.from_meters(event.altitude);
        info_row(
            &mut html,
            &format!("<b>{}:</b> {:.0} {}", labels.info_altitude, altitude, config.altitude_units.label()),
        );
    }

    if !event.address.is_empty() || config.include_blank_address {
        let address = if event.address.is_empty() { "&nbsp;" } else { event.address.as_str() };
        info_row(&mut html, &format!("<b>{}:</b> {}", labels.info_address, address));
    }

    if config.show_optional_fields {
        for (i, value) in event.optional_fields.iter().enumerate() {
            if value.is_empty() {
                continue;
            }
            match config.optional_field_title(i) {
                Some(title) => info_row(&mut html, &format!("<b>{}:</b> {}", title, value)),
                None => info_row(&mut html, value),
            }
        }
    }

    html.push_str("</table>");
    html
}

pub fn build_pushpin(
    config: &MapConfig,
    record_index: Option<usize>,
    dataset_index: Option<usize>,
    pin_index: usize,
    event: &EventRecord,
) -> Pushpin {
    Pushpin {
        record_index,
        dataset_index,
        pin_index,
        position: event.position(),
        label: event.device.clone(),
        html: popup_html(config, record_index, event),
        icon: select_icon(&config.pushpin_icons, event),
        event: event.clone(),
        marker: None,
        popup_shown: false,
    }
}

pub fn build_detail_row(
    config: &MapConfig,
    index: usize,
    dataset_index: Option<usize>,
    pin_index: Option<usize>,
    event: &EventRecord,
    text_color: &str,
) -> DetailRow {
    DetailRow {
        index,
        dataset_index,
        pin_index,
        device: event.device.clone(),
        date_time: format!("{} {}", event.date_fmt, event.time_fmt),
        time_zone: event.time_zone.clone(),
        code: event.code.clone(),
        lat_lon: format!(
            "{}/{}",
            format_coord(event.latitude, true, 4, config.latlon_format),
            format_coord(event.longitude, false, 4, config.latlon_format)
        ),
        sat_count: event.sat_count,
        speed: format_speed(config, event.speed_kph),
        moving: event.speed_kph > 0.0,
        heading: format!("{:.0}", event.heading),
        compass: event.compass(),
        altitude: event.altitude,
        address: event.address.clone(),
        optional_fields: event.optional_fields.clone(),
        color: text_color.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn moving_event() -> EventRecord {
        EventRecord::parse("Van|van2|1262304000|2010/01/01|08:00:00|PST|InMotion|0|39.12346|-142.56789|5|100|180|250|0|Main St|Load 4").unwrap()
    }

    #[test]
    fn popup_lists_core_fields() {
        let config = MapConfig::default();
        let html = popup_html(&config, Some(3), &moving_event());
        assert!(html.contains("data-detail-row='3'"));
        assert!(html.contains("[#3] &nbsp; <b>van2 : InMotion</b>"));
        assert!(html.contains("2010/01/01 08:00:00 [PST]"));
        assert!(html.contains("39.12346 / -142.56789  [Sats 5]"));
        assert!(html.contains("62.1 mph &nbsp;(S)"));
        assert!(html.contains("<b>Address:</b> Main St"));
        assert!(!html.contains("Altitude"));
        assert!(!html.contains("Load 4"));
    }

    #[test]
    fn popup_optional_sections() {
        let config = MapConfig {
            combine_speed_heading: false,
            show_altitude: true,
            show_optional_fields: true,
            optional_field_titles: vec!["Cargo".into()],
            ..MapConfig::default()
        };
        let html = popup_html(&config, None, &moving_event());
        assert!(html.contains("[#-]"));
        assert!(html.contains("<b>Heading:</b> 180&deg; &nbsp;(S)"));
        assert!(html.contains("<b>Altitude:</b> 820 feet"));
        assert!(html.contains("<b>Cargo:</b> Load 4"));
        assert!(!html.contains(DETAIL_ROW_ATTR));
    }

    #[test]
    fn blank_address_only_when_configured() {
        let mut event = moving_event();
        event.address.clear();
        let config = MapConfig::default();
        assert!(!popup_html(&config, Some(1), &event).contains("Address"));
        let config = MapConfig { include_blank_address: true, ..MapConfig::default() };
        assert!(popup_html(&config, Some(1), &event).contains("<b>Address:</b> &nbsp;"));
    }

    #[test]
    fn detail_row_formats() {
        let row = build_detail_row(&MapConfig::default(), 4, Some(0), Some(2), &moving_event(), "#112233");
        assert_eq!(row.lat_lon, "39.1235/-142.5679");
        assert_eq!(row.date_time, "2010/01/01 08:00:00");
        assert_eq!(row.speed, "62.1");
        assert_eq!(row.heading, "180");
        assert_eq!(row.compass, "S");
        assert!(row.moving);
        assert_eq!(row.color, "#112233");
    }
}
