//! The "location details" table shown under the map or in its own window.

use std::fmt::Write;

use crate::config::{DisplayColorMode, MapConfig};
use crate::geomath::Rgb;
use crate::model::MapData;
use crate::page::{classes, ids, Page, Surface};
use crate::types::DetailRow;

/// How far odd rows are lightened in background color mode.
const ODD_ROW_LIGHTEN: f64 = 0.35;
const MAX_OPTIONAL_COLUMNS: usize = 10;
const INDEX_COLUMN_WIDTH: u32 = 25;
const WINDOW_HEIGHT: u32 = 300;

fn header(html: &mut String, width: Option<u32>, title: &str) {
    let _ = write!(html, "<th class='{}' nowrap valign='center'", classes::DETAILS_HEADER_COL);
    if let Some(w) = width {
        let _ = write!(html, " width='{}'", w);
    }
    let _ = write!(html, ">{}</th>", title);
}

fn optional_columns(config: &MapConfig) -> usize {
    if config.show_optional_fields {
        config.optional_field_titles.len().min(MAX_OPTIONAL_COLUMNS)
    } else {
        0
    }
}

fn column_count(config: &MapConfig, data: &MapData) -> usize {
    4 + usize::from(data.is_fleet)
        + usize::from(config.show_sat_count)
        + usize::from(data.show_address)
        + if config.combine_speed_heading { 1 } else { 2 }
        + optional_columns(config)
}

fn row_style(config: &MapConfig, row: &DetailRow) -> String {
    if row.color.is_empty() {
        return String::new();
    }
    match config.display_color {
        DisplayColorMode::Off => String::new(),
        DisplayColorMode::Foreground => format!(" style='color:{};'", row.color),
        DisplayColorMode::Background => {
            let color = match Rgb::parse(&row.color) {
                Some(rgb) if row.index & 1 == 1 => format!("#{}", rgb.lighter(ODD_ROW_LIGHTEN).hex()),
                _ => row.color.clone(),
            };
            format!(" style='background-color:{};'", color)
        }
    }
}

fn cell(html: &mut String, class: &str, content: &str) {
    let _ = write!(html, "<td nowrap class='{}'>{}</td>", class, content);
}

fn render_row(html: &mut String, config: &MapConfig, data: &MapData, row: &DetailRow, is_new: bool) {
    let data_class = if is_new { classes::DETAILS_DATA_COL_NEW } else { classes::DETAILS_DATA_COL };
    let _ = write!(
        html,
        "<tr class='{}' id='{}'{}>",
        classes::detail_row(row.index),
        ids::detail_row(row.index),
        row_style(config, row)
    );

    if config.detail_info_box {
        let _ = write!(html, "<td nowrap class='{}'", classes::DETAILS_INDEX_COL);
        if let (Some(ds), Some(pp)) = (row.dataset_index, row.pin_index) {
            let _ = write!(html, " data-dataset='{}' data-pushpin='{}'", ds, pp);
        }
        let _ = write!(html, ">{}</td>", row.index);
    } else {
        cell(html, data_class, &row.index.to_string());
    }

    if data.is_fleet {
        cell(html, data_class, &row.device);
    }
    cell(html, data_class, &row.date_time);
    cell(html, data_class, &row.code);
    cell(html, data_class, &row.lat_lon);
    if config.show_sat_count {
        cell(html, data_class, &row.sat_count.to_string());
    }
    if config.combine_speed_heading {
        let speed = if row.moving { format!("{} {}", row.speed, row.compass) } else { row.speed.clone() };
        cell(html, data_class, &speed);
    } else {
        cell(html, data_class, &row.speed);
        cell(html, data_class, &format!("{}&deg; {}", row.heading, row.compass));
    }
    if data.show_address {
        cell(html, data_class, &format!("{}&nbsp;", row.address));
    }
    for i in 0..optional_columns(config) {
        let value = row.optional_fields.get(i).map_or("", String::as_str);
        cell(html, data_class, &format!("{}&nbsp;", value));
    }
    html.push_str("</tr>\n");
}

/// The report table markup for `data`.
pub fn render_table(config: &MapConfig, data: &MapData) -> String {
    let labels = &config.labels;
    let mut html = String::from("<table cellspacing='0' cellpadding='0' border='1'>\n<thead>\n");

    if data.partial {
        let _ = write!(
            html,
            "<tr class='{}'><th class='{} {}' colSpan='{}' valign='center'>{}</th></tr>\n",
            classes::DETAILS_HEADER_ROW,
            classes::DETAILS_HEADER_COL,
            classes::DETAILS_PARTIAL,
            column_count(config, data),
            labels.max_pushpins
        );
    }

    let _ = write!(html, "<tr class='{}'>", classes::DETAILS_HEADER_ROW);
    header(&mut html, Some(INDEX_COLUMN_WIDTH), "#");
    if data.is_fleet {
        header(&mut html, None, &labels.device);
    }
    header(&mut html, None, &labels.date);
    header(&mut html, None, &labels.code);
    header(&mut html, None, &labels.lat_lon);
    if config.show_sat_count {
        header(&mut html, None, &labels.sat_count);
    }
    header(&mut html, None, &labels.speed);
    if !config.combine_speed_heading {
        header(&mut html, None, &labels.heading);
    }
    if data.show_address {
        header(&mut html, None, &labels.address);
    }
    for title in config.optional_field_titles.iter().take(optional_columns(config)) {
        header(&mut html, None, title);
    }
    html.push_str("</tr>\n</thead>\n<tbody>\n");

    let mut rows: Vec<&DetailRow> = data.detail_rows.iter().collect();
    if !config.detail_ascending {
        rows.reverse();
    }
    let mut last_device: Option<&str> = None;
    for row in rows {
        let is_new = data.device_breaks && last_device != Some(row.device.as_str());
        last_device = Some(row.device.as_str());
        render_row(&mut html, config, data, row, is_new);
    }

    html.push_str("</tbody>\n</table>\n");
    html
}

/// Keeps at most one detail row highlighted.
#[derive(Debug, Default)]
pub struct RowHighlighter {
    current: Option<usize>,
}

impl RowHighlighter {
    pub fn current(&self) -> Option<usize> {
        self.current
    }

    /// Restores the previous row's class, then highlights `index` if given.
    pub fn highlight(&mut self, page: &mut dyn Page, surface: Surface, index: Option<usize>) {
        if let Some(old) = self.current.take() {
            page.set_class_name(surface, &ids::detail_row(old), classes::detail_row(old));
        }
        if let Some(index) = index.filter(|i| *i >= 1) {
            page.set_class_name(surface, &ids::detail_row(index), classes::DETAILS_ROW_HILITE);
            self.current = Some(index);
        }
    }

    pub fn reset(&mut self) {
        self.current = None;
    }
}

/// Visibility of the detail report and the surface it renders to.
#[derive(Debug, Default)]
pub struct DetailReport {
    pub visible: bool,
    highlighter: RowHighlighter,
}

impl DetailReport {
    pub fn surface(config: &MapConfig) -> Surface {
        if config.detail_window {
            Surface::DetailWindow
        } else {
            Surface::Main
        }
    }

    pub fn highlighted(&self) -> Option<usize> {
        self.highlighter.current()
    }

    /// Redraws the report, or clears it when hidden or there is nothing to show.
    pub fn show(&mut self, page: &mut dyn Page, config: &MapConfig, data: Option<&MapData>) {
        self.highlighter.reset();
        let data = match data {
            Some(d) if self.visible && !d.detail_rows.is_empty() => d,
            _ => {
                self.clear(page, config);
                return;
            }
        };

        let table = render_table(config, data);
        if config.detail_window {
            let width = if data.show_address { 600 } else { 500 };
            if !page.open_detail_window(width, WINDOW_HEIGHT) {
                log::warn!("detail window could not be opened");
                return;
            }
            page.set_inner_html(Surface::DetailWindow, ids::DETAIL_TABLE, &table);
        } else {
            let html = format!("<div class='{}'>{}</div>", classes::DETAILS_DIV, table);
            if !page.set_inner_html(Surface::Main, ids::DETAIL_TABLE, &html) {
                return;
            }
            page.set_visible(Surface::Main, ids::DETAIL_TABLE, true);
        }
        page.set_inner_html(Surface::Main, ids::DETAIL_CONTROL, &config.labels.hide_details);
    }

    fn clear(&mut self, page: &mut dyn Page, config: &MapConfig) {
        if config.detail_window {
            page.close_detail_window();
        } else {
            page.set_inner_html(Surface::Main, ids::DETAIL_TABLE, "");
            page.set_visible(Surface::Main, ids::DETAIL_TABLE, false);
        }
        page.set_inner_html(Surface::Main, ids::DETAIL_CONTROL, &config.labels.show_details);
    }

    /// A separate window is always (re)shown; the inline table flips.
    pub fn toggle(&mut self, page: &mut dyn Page, config: &MapConfig, data: Option<&MapData>) {
        self.visible = config.detail_window || !self.visible;
        self.show(page, config, data);
    }

    pub fn hide(&mut self, page: &mut dyn Page, config: &MapConfig) {
        self.visible = false;
        self.highlighter.reset();
        self.clear(page, config);
    }

    pub fn highlight(&mut self, page: &mut dyn Page, config: &MapConfig, index: Option<usize>) {
        self.highlighter.highlight(page, Self::surface(config), index);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::MemoryPage;
    use crate::types::LastEvent;
    use crate::model::build_map_data;
    use crate::xml::parse_document;

    const TWO_DEVICES: &str = "<MapData isFleet='true'>\
        <DataSet id='a' textColor='#000080'>\
        <P>A|a|1|2010/01/01|08:00:00|PST|Moving|0|1.0|1.0|4|50|90|0|0|Elm St</P>\
        <P>A|a|2|2010/01/01|08:05:00|PST|Stop|0|1.1|1.1|4|0|0|0|0|</P>\
        </DataSet>\
        <DataSet id='b'><P>B|b|3|2010/01/01|08:10:00|PST|Stop|0|0|0</P></DataSet>\
        </MapData>";

    fn data(config: &MapConfig) -> MapData {
        build_map_data(parse_document(TWO_DEVICES), config, &mut LastEvent::default())
    }

    #[test]
    fn table_marks_device_breaks_and_parity() {
        let config = MapConfig::default();
        let html = render_table(&config, &data(&config));
        assert!(html.contains("<th class='mapDetailsHeaderColumn' nowrap valign='center' width='25'>#</th>"));
        assert!(html.contains(">Device</th>"));
        assert!(html.contains(">Address</th>"));
        assert!(html.contains("<tr class='mapDetailsDataRowOdd' id='detailRow_1' style='color:#000080;'>"));
        assert!(html.contains("<tr class='mapDetailsDataRowEven' id='detailRow_2'"));
        assert_eq!(html.matches(classes::DETAILS_DATA_COL_NEW).count(), 2 * 6);
        assert!(html.contains("31.1 E</td>"));
        assert!(html.contains(">Elm St&nbsp;</td>"));
        assert!(html.contains("data-dataset='0' data-pushpin='1'>2</td>"));
        // The no-fix row has nothing to open.
        assert!(html.contains("<td nowrap class='mapDetailsIndexColumn'>3</td>"));
        assert!(!html.contains(classes::DETAILS_PARTIAL));
    }

    #[test]
    fn descending_and_background_colors() {
        let config = MapConfig {
            detail_ascending: false,
            display_color: DisplayColorMode::Background,
            combine_speed_heading: false,
            ..MapConfig::default()
        };
        let html = render_table(&config, &data(&config));
        let third = html.find("detailRow_3").unwrap();
        let first = html.find("detailRow_1").unwrap();
        assert!(third < first);
        // 0x80 lifted 35% of the way to white.
        assert!(html.contains("background-color:#5959AC;"));
        assert!(html.contains("background-color:#000080;"));
        assert!(html.contains(">Heading</th>"));
        assert!(html.contains(">90&deg; E</td>"));
    }

    #[test]
    fn partial_banner_spans_all_columns() {
        let config = MapConfig { max_pushpins: 1, ..MapConfig::default() };
        let html = render_table(&config, &data(&config));
        assert!(html.contains("colSpan='6'"));
        assert!(html.contains(&config.labels.max_pushpins));
    }

    #[test]
    fn show_toggle_and_clear_inline() {
        let config = MapConfig::default();
        let data = data(&config);
        let mut page = MemoryPage::with_standard_elements();
        let mut report = DetailReport::default();

        report.toggle(&mut page, &config, Some(&data));
        assert!(report.visible);
        assert!(page.html(ids::DETAIL_TABLE).starts_with("<div class='trackMapDetailLocation'>"));
        assert_eq!(page.html(ids::DETAIL_CONTROL), config.labels.hide_details);

        report.toggle(&mut page, &config, Some(&data));
        assert_eq!(page.html(ids::DETAIL_TABLE), "");
        assert!(!page.element(Surface::Main, ids::DETAIL_TABLE).unwrap().visible);
        assert_eq!(page.html(ids::DETAIL_CONTROL), config.labels.show_details);
    }

    #[test]
    fn window_mode_always_shows() {
        let config = MapConfig { detail_window: true, ..MapConfig::default() };
        let data = data(&config);
        let mut page = MemoryPage::with_standard_elements();
        let mut report = DetailReport::default();
        report.toggle(&mut page, &config, Some(&data));
        report.toggle(&mut page, &config, Some(&data));
        assert!(page.detail_window_open);
        let table = &page.element(Surface::DetailWindow, ids::DETAIL_TABLE).unwrap().html;
        assert!(table.starts_with("<table"));

        report.hide(&mut page, &config);
        assert!(!page.detail_window_open);
    }

    #[test]
    fn single_highlight() {
        let config = MapConfig::default();
        let data = data(&config);
        let mut page = MemoryPage::with_standard_elements();
        for i in 1..=3 {
            page.add(Surface::Main, &ids::detail_row(i));
        }
        let mut report = DetailReport { visible: true, ..DetailReport::default() };
        report.show(&mut page, &config, Some(&data));

        report.highlight(&mut page, &config, Some(1));
        report.highlight(&mut page, &config, Some(2));
        let class = |page: &MemoryPage, i| page.element(Surface::Main, &ids::detail_row(i)).unwrap().class.clone();
        assert_eq!(class(&page, 1), classes::DETAILS_ROW_ODD);
        assert_eq!(class(&page, 2), classes::DETAILS_ROW_HILITE);
        assert_eq!(report.highlighted(), Some(2));

        report.highlight(&mut page, &config, None);
        assert_eq!(class(&page, 2), classes::DETAILS_ROW_EVEN);
        assert_eq!(report.highlighted(), None);
    }
}
