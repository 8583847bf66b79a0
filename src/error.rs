use thiserror::Error;
use wasm_bindgen::JsValue;

/// Failures surfaced to the caller of the tracking pipeline.
///
/// Malformed map data is not an error: the parser reports it as an empty
/// result. Icon rule failures are absorbed by the icon fallback chain.
#[derive(Debug, Error)]
pub enum TrackError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("session expired, please log in again")]
    SessionExpired,
    #[error("response for request #{ticket} arrived after request #{current} was issued")]
    StaleResponse { ticket: u64, current: u64 },
    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),
    #[error("map is not loaded")]
    NotLoaded,
    #[error("javascript bridge: {0}")]
    Js(String),
}

pub type Result<T> = std::result::Result<T, TrackError>;

impl From<TrackError> for JsValue {
    fn from(err: TrackError) -> Self {
        JsValue::from_str(&err.to_string())
    }
}

impl From<serde_wasm_bindgen::Error> for TrackError {
    fn from(err: serde_wasm_bindgen::Error) -> Self {
        TrackError::Js(err.to_string())
    }
}
