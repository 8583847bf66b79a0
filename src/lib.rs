use wasm_bindgen::prelude::*;
use log::Level;
use wasm_bindgen_futures::future_to_promise;
use wasm_bindgen_futures::js_sys;

pub mod alert;
pub mod bindings;
pub mod config;
pub mod error;
pub mod event;
pub mod fetch;
pub mod geojson_provider;
pub mod geomath;
pub mod icon;
pub mod model;
pub mod page;
pub mod provider;
pub mod pushpin;
pub mod report;
pub mod session;
pub mod timer;
pub mod types;
pub mod xml;

use self::config::MapConfig;
use self::error::Result;
use self::fetch::{PointsResponse, TrackClient};
use self::geojson_provider::GeoJsonProvider;
use self::page::MemoryPage;
use self::session::TrackSession;

#[wasm_bindgen]
pub fn track_init() {
    if let Err(e) = console_log::init_with_level(Level::Error) {
        // Already initialized by an earlier call.
        log::debug!("logger not initialized: {}", e);
        return;
    }
    log::info!("Logger initialized from library");
}

/// Draws a points document on a headless map and returns its layers as a
/// GeoJSON FeatureCollection.
pub fn render_geojson(xml: &str, config: MapConfig) -> Result<String> {
    let provider = GeoJsonProvider::new(config.viewport);
    let mut session = TrackSession::new(config, provider);
    let count = session.show_xml(&mut MemoryPage::new(), xml);
    let geojson = serde_json::to_string(&session.provider().to_geojson())?;
    log::info!("GeoJson created for {} records", count);
    Ok(geojson)
}

#[wasm_bindgen(js_name = mapDataToGeoJson)]
pub fn map_data_to_geojson(xml: &str, config_json: &str) -> std::result::Result<String, JsValue> {
    let config = MapConfig::from_json(config_json)?;
    Ok(render_geojson(xml, config)?)
}

pub async fn fetch_geojson_async(url: &str, config_json: &str) -> Result<String> {
    let config = MapConfig::from_json(config_json)?;
    match TrackClient::new().fetch_points(url).await? {
        PointsResponse::Data(xml) => render_geojson(&xml, config),
        // A server-side failure draws nothing.
        _ => render_geojson("", config),
    }
}

#[wasm_bindgen(js_name = fetchGeoJson)]
pub fn fetch_geojson(url: String, config_json: String) -> js_sys::Promise {
    future_to_promise(async move {
        match fetch_geojson_async(&url, &config_json).await {
            Ok(geojson_str) => Ok(JsValue::from_str(&geojson_str)),
            Err(e) => Err(JsValue::from(e)),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use geojson::GeoJson;

    #[test]
    fn renders_layers_with_bbox() {
        let xml = "<MapData><DataSet id='a'>\
            <P>A|a|1|2010/01/01|08:00:00|PST|Go|0|10.0|20.0</P>\
            <P>A|a|2|2010/01/01|08:01:00|PST|Go|0|11.0|21.0</P>\
            </DataSet></MapData>";
        let out = render_geojson(xml, MapConfig::default()).unwrap();
        let GeoJson::FeatureCollection(fc) = out.parse::<GeoJson>().unwrap() else {
            panic!("expected a feature collection");
        };
        // Route first, then both pushpins.
        assert_eq!(fc.features.len(), 3);
        assert_eq!(fc.bbox, Some(vec![20.0, 10.0, 21.0, 11.0]));
    }

    #[test]
    fn unusable_input_renders_nothing() {
        let out = render_geojson("not xml", MapConfig::default()).unwrap();
        let GeoJson::FeatureCollection(fc) = out.parse::<GeoJson>().unwrap() else {
            panic!("expected a feature collection");
        };
        assert!(fc.features.is_empty());
        assert_eq!(fc.bbox, None);
    }
}
