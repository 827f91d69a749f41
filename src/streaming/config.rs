//! Runtime streaming and render settings

use crate::core::types::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default number of points drawn per frame
pub const DEFAULT_POINT_BUDGET: u64 = 1_000_000;

/// Default share of the viewport height a node may cover before it is refined
pub const DEFAULT_PROJECTED_SIZE_MODIFIER: f64 = 1.0 / 3.0;

/// Default cap on new load requests issued per frame
pub const DEFAULT_MAX_NEW_LOADS: usize = 5;

/// Intensity mapped to full white
pub const DEFAULT_INTENSITY_MAX: f32 = 4096.0;

/// Label mapped to the last gradient stop
pub const DEFAULT_MAX_LABEL: u8 = 32;

/// How per-point colors are derived when building draw buffers
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorMode {
    /// Native color if present, then intensity, then label, else constant
    #[default]
    Auto,
    /// Native 16 bit color channels
    VertexColor,
    /// Grayscale ramp over intensity
    Intensity,
    /// Blue-green-yellow-red gradient over the label
    Label,
    /// One constant RGB color in 0..=1
    Single([f32; 3]),
}

/// Screen-space point primitive
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointShape {
    #[default]
    Paraboloid,
    Rect,
    Circle,
}

/// How `point_size` is interpreted
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointSizeMode {
    /// Size in pixels
    #[default]
    FixedPixelSize,
    /// Size in world units
    FixedWorldSize,
    /// World size scaled by node level
    AdaptiveSize,
}

/// Per-frame streaming configuration.
///
/// The manager reads it on every update, so swapping it between frames takes
/// effect immediately.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamingConfig {
    /// Maximum points selected per frame
    pub point_budget: u64,
    /// Refinement threshold as a fraction of the viewport height (0..=1)
    pub projected_size_modifier: f64,
    pub color_mode: ColorMode,
    pub point_shape: PointShape,
    pub point_size_mode: PointSizeMode,
    pub point_size: f32,
    /// Intensity value rendered as full white
    pub intensity_max: f32,
    /// Label value mapped to the last gradient stop
    pub max_label: u8,
    /// Resident points kept as a multiple of the budget (>= 1)
    pub resident_cache_factor: f64,
    /// New load requests issued per frame
    pub max_new_loads_per_frame: usize,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            point_budget: DEFAULT_POINT_BUDGET,
            projected_size_modifier: DEFAULT_PROJECTED_SIZE_MODIFIER,
            color_mode: ColorMode::Auto,
            point_shape: PointShape::Paraboloid,
            point_size_mode: PointSizeMode::FixedPixelSize,
            point_size: 2.0,
            intensity_max: DEFAULT_INTENSITY_MAX,
            max_label: DEFAULT_MAX_LABEL,
            resident_cache_factor: 1.5,
            max_new_loads_per_frame: DEFAULT_MAX_NEW_LOADS,
        }
    }
}

impl StreamingConfig {
    /// Load a config from a JSON file; missing fields take their defaults
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        Ok(config.sanitized())
    }

    /// Clamp out-of-range values into their valid ranges
    pub fn sanitized(mut self) -> Self {
        self.projected_size_modifier = if self.projected_size_modifier.is_finite() {
            self.projected_size_modifier.clamp(0.0, 1.0)
        } else {
            DEFAULT_PROJECTED_SIZE_MODIFIER
        };
        self.resident_cache_factor = if self.resident_cache_factor.is_finite() {
            self.resident_cache_factor.max(1.0)
        } else {
            1.0
        };
        if self.intensity_max.is_nan() || self.intensity_max <= 0.0 {
            self.intensity_max = DEFAULT_INTENSITY_MAX;
        }
        self.max_label = self.max_label.max(1);
        self
    }

    /// Resident point capacity derived from the budget
    pub fn resident_capacity(&self) -> u64 {
        (self.point_budget as f64 * self.resident_cache_factor.max(1.0)) as u64
    }
}

/// Settings for the background node loader
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Loads running at the same time
    pub max_concurrent_loads: usize,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            max_concurrent_loads: 4,
        }
    }
}
