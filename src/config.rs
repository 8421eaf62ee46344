// src/config.rs
use serde::{Deserialize, Serialize};

use crate::color::{ColorCoords, resolve_color};
use crate::error::SynapseResult;

pub const DEFAULT_NETWORK_SIZE: usize = 5;

/// Options recognized by the widget. JSON keys are camelCase (`networkSize`, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SynapseOptions {
    pub color: Option<String>,
    pub network_size: usize,
    pub speed_scale: f32,
    pub tracer_scale: f32,
    /// Size to the viewport instead of the parent container.
    pub viewport: bool,
}

impl Default for SynapseOptions {
    fn default() -> Self {
        Self {
            color: None,
            network_size: DEFAULT_NETWORK_SIZE,
            speed_scale: 1.0,
            tracer_scale: 1.0,
            viewport: false,
        }
    }
}

impl SynapseOptions {
    pub fn from_json(json: &str) -> SynapseResult<Self> {
        Ok(serde_json::from_str::<Self>(json)?.normalized())
    }

    /// Zero or non-finite values fall back to their defaults.
    pub fn normalized(mut self) -> Self {
        let defaults = Self::default();
        if self.network_size == 0 {
            self.network_size = defaults.network_size;
        }
        if !(self.speed_scale.is_finite() && self.speed_scale != 0.0) {
            self.speed_scale = defaults.speed_scale;
        }
        if !(self.tracer_scale.is_finite() && self.tracer_scale != 0.0) {
            self.tracer_scale = defaults.tracer_scale;
        }
        self
    }

    /// Resolved base color; black when unset or unparseable.
    pub fn color_coords(&self) -> ColorCoords {
        self.color.as_deref().map(resolve_color).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_when_empty() {
        let options = SynapseOptions::from_json("{}").unwrap();
        assert_eq!(options, SynapseOptions::default());
        assert_eq!(options.network_size, 5);
        assert_eq!(options.color_coords(), ColorCoords::BLACK);
    }

    #[test]
    fn camel_case_keys() {
        let options = SynapseOptions::from_json(
            r##"{"color":"#ffffff","networkSize":8,"speedScale":2.5,"tracerScale":3,"viewport":true}"##,
        )
        .unwrap();
        assert_eq!(options.network_size, 8);
        assert_eq!(options.speed_scale, 2.5);
        assert_eq!(options.tracer_scale, 3.0);
        assert!(options.viewport);
        assert_eq!(options.color_coords(), ColorCoords::new(1.0, 1.0, 1.0));
    }

    #[test]
    fn zero_values_fall_back() {
        let options =
            SynapseOptions::from_json(r#"{"networkSize":0,"speedScale":0,"tracerScale":0}"#).unwrap();
        assert_eq!(options.network_size, DEFAULT_NETWORK_SIZE);
        assert_eq!(options.speed_scale, 1.0);
        assert_eq!(options.tracer_scale, 1.0);
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(SynapseOptions::from_json("{networkSize: 3").is_err());
        assert!(SynapseOptions::from_json(r#"{"networkSize":-1}"#).is_err());
    }
}
