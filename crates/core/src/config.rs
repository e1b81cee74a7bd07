//! Engine configuration
//!
//! All tunables of the engine live in [`EngineConfig`]. Configuration can be
//! loaded from a TOML file, overridden from environment variables, or built
//! programmatically.

use crate::error::ConfigError;
use crate::geometry::MergeOptions;
use crate::selection::SelectionOptions;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::str::FromStr;

/// Prefix of all environment overrides
pub const ENV_PREFIX: &str = "PDF_ANNOTATOR_";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Horizontal merge tolerance for pixel boxes
    pub merge_margin_px: f64,
    /// Horizontal merge tolerance for normalized boxes
    pub merge_margin_normalized: f64,
    /// Fraction of the smaller box height two boxes must share to merge
    pub min_vertical_overlap: f64,
    /// Selection rects larger than this in both dimensions are dropped
    pub full_page_reject_ratio: f64,

    pub cluster_threshold_px: f64,
    pub badge_height_px: f64,
    pub min_gap_px: f64,

    /// Distance between the viewer's right edge and the comment sidebar
    pub sidebar_gap_px: f64,
    /// Distance between the viewer's right edge and the connector channel
    pub channel_offset_px: f64,
    pub corner_radius_px: f64,

    pub base_opacity: f64,
    pub fade_ms: u64,
    pub stroke_width: f64,
    pub hover_stroke_width: f64,
    pub endpoint_radius: f64,
    pub hover_endpoint_radius: f64,

    pub mutation_debounce_ms: u64,
    pub presence_ttl_ms: u64,
    pub presence_sweep_ms: u64,
    pub cursor_throttle_ms: u64,
    pub readiness_attempts: u32,
    pub readiness_delay_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            merge_margin_px: 20.0,
            merge_margin_normalized: 0.005,
            min_vertical_overlap: 0.5,
            full_page_reject_ratio: 0.95,
            cluster_threshold_px: 60.0,
            badge_height_px: 32.0,
            min_gap_px: 8.0,
            sidebar_gap_px: 48.0,
            channel_offset_px: 24.0,
            corner_radius_px: 8.0,
            base_opacity: 0.6,
            fade_ms: 150,
            stroke_width: 1.5,
            hover_stroke_width: 2.5,
            endpoint_radius: 3.0,
            hover_endpoint_radius: 4.5,
            mutation_debounce_ms: 32,
            presence_ttl_ms: 200,
            presence_sweep_ms: 100,
            cursor_throttle_ms: 50,
            readiness_attempts: 10,
            readiness_delay_ms: 100,
        }
    }
}

impl EngineConfig {
    pub fn with_cluster_threshold(mut self, px: f64) -> Self {
        self.cluster_threshold_px = px;
        self
    }

    pub fn with_min_gap(mut self, px: f64) -> Self {
        self.min_gap_px = px;
        self
    }

    pub fn with_badge_height(mut self, px: f64) -> Self {
        self.badge_height_px = px;
        self
    }

    pub fn with_merge_margin(mut self, px: f64) -> Self {
        self.merge_margin_px = px;
        self
    }

    pub fn with_mutation_debounce(mut self, ms: u64) -> Self {
        self.mutation_debounce_ms = ms;
        self
    }

    pub fn with_presence_ttl(mut self, ms: u64) -> Self {
        self.presence_ttl_ms = ms;
        self
    }

    pub fn with_cursor_throttle(mut self, ms: u64) -> Self {
        self.cursor_throttle_ms = ms;
        self
    }

    /// Merge options for pixel-space boxes
    pub fn pixel_merge(&self) -> MergeOptions {
        MergeOptions::pixels()
            .with_margin(self.merge_margin_px)
            .with_min_vertical_overlap(self.min_vertical_overlap)
    }

    /// Options for drafting annotations from a selection
    pub fn selection_options(&self) -> SelectionOptions {
        SelectionOptions {
            full_page_ratio: self.full_page_reject_ratio,
            merge: MergeOptions::normalized()
                .with_margin(self.merge_margin_normalized)
                .with_min_vertical_overlap(self.min_vertical_overlap),
        }
    }

    /// Loads configuration from a TOML file.
    ///
    /// Keys missing from the file keep their defaults. The result is validated.
    ///
    /// ```toml
    /// cluster_threshold_px = 80.0
    /// mutation_debounce_ms = 16
    /// ```
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path.as_ref())?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads defaults with environment overrides applied.
    ///
    /// Every field can be overridden by `PDF_ANNOTATOR_<FIELD>` in upper case,
    /// e.g. `PDF_ANNOTATOR_CLUSTER_THRESHOLD_PX=80`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env()?;
        Ok(config)
    }

    /// Apply `PDF_ANNOTATOR_*` overrides on top of this configuration
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        env_override("MERGE_MARGIN_PX", &mut self.merge_margin_px)?;
        env_override("MERGE_MARGIN_NORMALIZED", &mut self.merge_margin_normalized)?;
        env_override("MIN_VERTICAL_OVERLAP", &mut self.min_vertical_overlap)?;
        env_override("FULL_PAGE_REJECT_RATIO", &mut self.full_page_reject_ratio)?;
        env_override("CLUSTER_THRESHOLD_PX", &mut self.cluster_threshold_px)?;
        env_override("BADGE_HEIGHT_PX", &mut self.badge_height_px)?;
        env_override("MIN_GAP_PX", &mut self.min_gap_px)?;
        env_override("SIDEBAR_GAP_PX", &mut self.sidebar_gap_px)?;
        env_override("CHANNEL_OFFSET_PX", &mut self.channel_offset_px)?;
        env_override("CORNER_RADIUS_PX", &mut self.corner_radius_px)?;
        env_override("BASE_OPACITY", &mut self.base_opacity)?;
        env_override("FADE_MS", &mut self.fade_ms)?;
        env_override("STROKE_WIDTH", &mut self.stroke_width)?;
        env_override("HOVER_STROKE_WIDTH", &mut self.hover_stroke_width)?;
        env_override("ENDPOINT_RADIUS", &mut self.endpoint_radius)?;
        env_override("HOVER_ENDPOINT_RADIUS", &mut self.hover_endpoint_radius)?;
        env_override("MUTATION_DEBOUNCE_MS", &mut self.mutation_debounce_ms)?;
        env_override("PRESENCE_TTL_MS", &mut self.presence_ttl_ms)?;
        env_override("PRESENCE_SWEEP_MS", &mut self.presence_sweep_ms)?;
        env_override("CURSOR_THROTTLE_MS", &mut self.cursor_throttle_ms)?;
        env_override("READINESS_ATTEMPTS", &mut self.readiness_attempts)?;
        env_override("READINESS_DELAY_MS", &mut self.readiness_delay_ms)?;
        self.validate()
    }

    /// Reject values the engine cannot work with
    pub fn validate(&self) -> Result<(), ConfigError> {
        let non_negative = [
            ("merge_margin_px", self.merge_margin_px),
            ("merge_margin_normalized", self.merge_margin_normalized),
            ("cluster_threshold_px", self.cluster_threshold_px),
            ("badge_height_px", self.badge_height_px),
            ("min_gap_px", self.min_gap_px),
            ("sidebar_gap_px", self.sidebar_gap_px),
            ("channel_offset_px", self.channel_offset_px),
            ("corner_radius_px", self.corner_radius_px),
            ("stroke_width", self.stroke_width),
            ("hover_stroke_width", self.hover_stroke_width),
            ("endpoint_radius", self.endpoint_radius),
            ("hover_endpoint_radius", self.hover_endpoint_radius),
        ];
        for (key, value) in non_negative {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::InvalidValue(key.to_string()));
            }
        }

        let unit = [
            ("min_vertical_overlap", self.min_vertical_overlap),
            ("full_page_reject_ratio", self.full_page_reject_ratio),
            ("base_opacity", self.base_opacity),
        ];
        for (key, value) in unit {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::InvalidValue(key.to_string()));
            }
        }

        if self.mutation_debounce_ms > 1000 {
            return Err(ConfigError::InvalidValue("mutation_debounce_ms".to_string()));
        }
        if self.presence_sweep_ms == 0 {
            return Err(ConfigError::InvalidValue("presence_sweep_ms".to_string()));
        }

        Ok(())
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string(self)?)
    }
}

fn env_override<T: FromStr>(suffix: &str, target: &mut T) -> Result<(), ConfigError> {
    let key = format!("{ENV_PREFIX}{suffix}");
    if let Ok(raw) = std::env::var(&key) {
        *target = raw.trim().parse::<T>().map_err(|_| ConfigError::InvalidValue(key))?;
    }
    Ok(())
}
