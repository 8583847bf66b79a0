//! Pushpin icon selection.
//!
//! Presets are picked by the record's icon index. A preset may carry an
//! [`IconRule`] that derives the icon URL from the event (speed, heading,
//! labels). Rules are data, interpreted here; nothing configured is ever
//! executed.

use serde::Deserialize;
use thiserror::Error;

use crate::event::EventRecord;
use crate::geomath::{heading_bucket, speed_color, KILOMETERS_PER_MILE};
use crate::types::IconDescriptor;

/// Placeholder in [`SpeedTier::icon`] replaced by the heading bucket (0..8).
pub const HEADING_PLACEHOLDER: &str = "{h}";

#[derive(Debug, Error, PartialEq)]
pub enum IconRuleError {
    #[error("no speed tier matches {speed:.1}")]
    NoMatchingTier { speed: f64 },
    #[error("event has no record index")]
    MissingIndex,
    #[error("optional field {0} is not present")]
    FieldOutOfRange(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpeedBasis {
    #[default]
    Kph,
    Mph,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SpeedTier {
    /// Exclusive upper bound; `None` matches any speed.
    pub below: Option<f64>,
    pub icon: String,
}

impl SpeedTier {
    pub fn below(limit: f64, icon: &str) -> Self {
        SpeedTier { below: Some(limit), icon: icon.to_string() }
    }

    pub fn rest(icon: &str) -> Self {
        SpeedTier { below: None, icon: icon.to_string() }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IconRule {
    Literal { url: String },
    /// Chart marker colored by [`speed_color`].
    SpeedColorMarker { width: u32, height: u32 },
    /// First tier whose bound exceeds the speed wins.
    HeadingMarker {
        #[serde(default)]
        basis: SpeedBasis,
        tiers: Vec<SpeedTier>,
    },
    IndexLabel { icon: String, frame: String, color: String },
    DeviceLabel {
        icon: String,
        frame: String,
        #[serde(default)]
        fill: String,
        #[serde(default)]
        border: String,
    },
    OptionalFieldLabel {
        field: usize,
        icon: String,
        frame: String,
        #[serde(default)]
        border: String,
    },
    HeadingArrow {
        icon: String,
        frame: String,
        #[serde(default)]
        color: String,
    },
}

impl IconRule {
    pub fn evaluate(&self, event: &EventRecord) -> Result<String, IconRuleError> {
        match self {
            IconRule::Literal { url } => Ok(url.clone()),
            IconRule::SpeedColorMarker { width, height } => {
                Ok(chart_marker_url(*width, *height, &speed_color(event.speed_mph()).hex()))
            }
            IconRule::HeadingMarker { basis, tiers } => {
                let speed = match basis {
                    SpeedBasis::Kph => event.speed_kph,
                    SpeedBasis::Mph => event.speed_mph(),
                };
                let tier = tiers
                    .iter()
                    .find(|t| t.below.map_or(true, |limit| speed < limit))
                    .ok_or(IconRuleError::NoMatchingTier { speed })?;
                let bucket = heading_bucket(event.heading).to_string();
                Ok(tier.icon.replace(HEADING_PLACEHOLDER, &bucket))
            }
            IconRule::IndexLabel { icon, frame, color } => {
                let index = event.index.ok_or(IconRuleError::MissingIndex)?;
                Ok(text_label_url(icon, frame, "", "", color, &index.to_string()))
            }
            IconRule::DeviceLabel { icon, frame, fill, border } => {
                Ok(text_label_url(icon, frame, fill, border, "", &event.short_name))
            }
            IconRule::OptionalFieldLabel { field, icon, frame, border } => {
                let text = event
                    .optional_fields
                    .get(*field)
                    .ok_or(IconRuleError::FieldOutOfRange(*field))?;
                Ok(text_label_url(icon, frame, "", border, "", text))
            }
            IconRule::HeadingArrow { icon, frame, color } => {
                Ok(arrow_label_url(icon, frame, "", "", color, event.heading))
            }
        }
    }

    /// Red dot when stopped, yellow below 32 km/h, green above.
    pub fn heading_default() -> Self {
        IconRule::HeadingMarker {
            basis: SpeedBasis::Kph,
            tiers: vec![
                SpeedTier::below(5.0, "images/pp/pin30_red_dot.png"),
                SpeedTier::below(32.0, "images/pp/pin30_yellow_h{h}.png"),
                SpeedTier::rest("images/pp/pin30_green_h{h}.png"),
            ],
        }
    }

    /// Tiers `kph * 1.609344`, the scale the EU icon set has always used.
    pub fn heading_eu() -> Self {
        IconRule::HeadingMarker {
            basis: SpeedBasis::Kph,
            tiers: vec![
                SpeedTier::below(5.0 / KILOMETERS_PER_MILE, "images/pp/pin30_red_dot.png"),
                SpeedTier::below(50.0 / KILOMETERS_PER_MILE, "images/pp/pin30_yellow_h{h}.png"),
                SpeedTier::below(90.0 / KILOMETERS_PER_MILE, "images/pp/pin30_green_h{h}.png"),
                SpeedTier::below(110.0 / KILOMETERS_PER_MILE, "images/pp/pin30_gray.png"),
                SpeedTier::rest("images/pp/pin30_black.png"),
            ],
        }
    }

    pub fn heading_ca() -> Self {
        IconRule::HeadingMarker {
            basis: SpeedBasis::Kph,
            tiers: vec![
                SpeedTier::below(1.0, "images/pp/pin30_red.png"),
                SpeedTier::below(70.0, "images/pp/pin30_yellow_h{h}.png"),
                SpeedTier::below(100.0, "images/pp/pin30_green_h{h}.png"),
                SpeedTier::below(130.0, "images/pp/pin30_blue_h{h}.png"),
                SpeedTier::rest("images/pp/pin30_gray_h{h}.png"),
            ],
        }
    }

    pub fn heading_yellow() -> Self {
        IconRule::HeadingMarker {
            basis: SpeedBasis::Kph,
            tiers: vec![
                SpeedTier::below(1.0, "images/pp/pin30_yellow.png"),
                SpeedTier::rest("images/pp/pin30_yellow_h{h}.png"),
            ],
        }
    }

    pub fn heading_green() -> Self {
        IconRule::HeadingMarker {
            basis: SpeedBasis::Kph,
            tiers: vec![
                SpeedTier::below(1.0, "images/pp/pin30_green_dot.png"),
                SpeedTier::rest("images/pp/pin30_green_h{h}.png"),
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct IconPreset {
    pub key: String,
    /// Static icon URL, used when no rule is set.
    pub url: String,
    pub rule: Option<IconRule>,
    pub size: [u32; 2],
    pub offset: [i32; 2],
    pub shadow_url: String,
    pub shadow_size: [u32; 2],
}

impl Default for IconPreset {
    fn default() -> Self {
        IconPreset {
            key: String::new(),
            url: String::new(),
            rule: None,
            size: [12, 20],
            offset: [6, 20],
            shadow_url: "images/pp/shadow.png".into(),
            shadow_size: [22, 20],
        }
    }
}

impl IconPreset {
    pub fn fixed(key: &str, url: &str) -> Self {
        IconPreset { key: key.into(), url: url.into(), ..Default::default() }
    }

    pub fn with_rule(key: &str, rule: IconRule) -> Self {
        IconPreset { key: key.into(), rule: Some(rule), size: [24, 30], offset: [12, 30], ..Default::default() }
    }

    pub fn defaults() -> Vec<IconPreset> {
        ["black", "brown", "red", "orange", "yellow", "green", "blue", "purple", "grey", "white"]
            .iter()
            .map(|color| IconPreset::fixed(color, &format!("images/pp/pin30_{}.png", color)))
            .chain(std::iter::once(IconPreset::with_rule("heading", IconRule::heading_default())))
            .collect()
    }

    fn descriptor(&self, url: String) -> IconDescriptor {
        IconDescriptor {
            url,
            size: self.size,
            offset: self.offset,
            shadow_url: self.shadow_url.clone(),
            shadow_size: self.shadow_size,
        }
    }
}

/// Picks and evaluates the preset for `event`.
///
/// Unknown indices use the first preset. A failed rule falls back to the
/// first preset's static URL, or to an empty URL when that preset is itself
/// rule-based.
pub fn select_icon(presets: &[IconPreset], event: &EventRecord) -> IconDescriptor {
    let Some(default) = presets.first() else {
        return IconDescriptor::default();
    };
    let preset = event
        .icon_index
        .and_then(|i| presets.get(i))
        .unwrap_or(default);

    match &preset.rule {
        None => preset.descriptor(preset.url.clone()),
        Some(rule) => match rule.evaluate(event) {
            Ok(url) => preset.descriptor(url),
            Err(err) => {
                log::debug!("icon rule '{}' failed: {}", preset.key, err);
                let url = if default.rule.is_none() { default.url.clone() } else { String::new() };
                preset.descriptor(url)
            }
        },
    }
}

// ** Marker URLs **

fn encode(text: &str) -> String {
    url::form_urlencoded::byte_serialize(text.as_bytes()).collect()
}

/// Chart-API map marker filled with `color` (hex, no `#`) and a black border.
pub fn chart_marker_url(width: u32, height: u32, color: &str) -> String {
    format!(
        "http://chart.apis.google.com/chart?cht=mm&ext=.png&chs={}x{}&chco={c}FF,{c}FF,000000FF",
        width,
        height,
        c = color
    )
}

/// Server-rendered marker with a text label inside `frame` (`x,y,w,h,pt[,font]`).
pub fn text_label_url(icon: &str, frame: &str, fill: &str, border: &str, color: &str, text: &str) -> String {
    format!(
        "Marker?icon={}&fr={}&fill={}&border={}&color={}&text={}",
        icon,
        frame,
        fill,
        border,
        color,
        encode(text)
    )
}

/// Server-rendered marker with an arrow pointing along `heading`.
pub fn arrow_label_url(icon: &str, frame: &str, fill: &str, border: &str, color: &str, heading: f64) -> String {
    format!(
        "Marker?icon={}&fr={}&fill={}&border={}&color={}&arrow={}",
        icon, frame, fill, border, color, heading
    )
}
