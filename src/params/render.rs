//! Rendering, styling and capture configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Colour and size of a stamped trace point
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TraceStyle {
    /// Straight RGBA, blended with source-alpha
    pub color: [f32; 4],

    /// Point radius (display texels)
    pub radius: f32,
}

/// Rendering configuration
#[derive(Debug, Clone)]
pub struct RenderConfig {
    /// Window width (pixels)
    pub window_width: u32,

    /// Window height (pixels)
    pub window_height: u32,

    /// Shorter side of the trace layers (texels); the longer side follows the aspect ratio
    pub display_resolution: u32,

    /// Samples generated per built-in shape
    pub path_sample_count: usize,

    /// Points stamped when drawing the ghost overlays
    pub ghost_point_count: usize,

    /// Rotating arrows drawn per frame, at most
    pub max_arrows: usize,

    /// Orbit circles drawn per frame, at most
    pub max_orbit_circles: usize,

    /// Ring thickness of orbit circles (normalized device units)
    pub orbit_stroke_width: f32,

    /// Orbit ring colour
    pub orbit_color: [f32; 4],

    /// Arrow colour
    pub arrow_color: [f32; 4],

    /// Live approximate-path trace
    pub trace: TraceStyle,

    /// Ghost of the truncated approximation
    pub mark: TraceStyle,

    /// Ghost of the raw path samples
    pub original: TraceStyle,

    /// Surface clear colour behind all layers
    pub background: [f64; 4],

    /// Quiet period before a configuration edit triggers a recompute
    pub config_debounce: Duration,

    /// Quiet period before a resize triggers the ghost redraw
    pub resize_debounce: Duration,

    /// Directory for PNG captures (capture disabled when `None`)
    pub capture_dir: Option<PathBuf>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            window_width: 1280,
            window_height: 720,
            display_resolution: 1024,
            path_sample_count: 4096,
            ghost_point_count: 1000,
            max_arrows: 50,
            max_orbit_circles: 30,
            orbit_stroke_width: 0.005,
            orbit_color: [0.976, 0.961, 0.071, 0.6],
            arrow_color: [1.0, 1.0, 1.0, 1.0],
            trace: TraceStyle {
                color: [1.0, 1.0, 1.0, 0.8],
                radius: 5.0,
            },
            mark: TraceStyle {
                color: [0.8, 0.8, 0.8, 0.6],
                radius: 5.0,
            },
            original: TraceStyle {
                color: [0.35, 0.55, 0.9, 0.5],
                radius: 3.0,
            },
            background: [0.02, 0.02, 0.05, 1.0],
            config_debounce: Duration::from_millis(300),
            resize_debounce: Duration::from_millis(500),
            capture_dir: None,
        }
    }
}

impl RenderConfig {
    /// Trace layer size for a canvas: the shorter side equals
    /// `display_resolution`, the longer side is scaled by the aspect ratio.
    /// Both sides shrink together when the longer one would exceed
    /// `max_dimension`.
    pub fn layer_size(&self, canvas_width: u32, canvas_height: u32, max_dimension: u32) -> (u32, u32) {
        let width = canvas_width.max(1) as f32;
        let height = canvas_height.max(1) as f32;
        let aspect = if width >= height {
            width / height
        } else {
            height / width
        };
        let limit = max_dimension.max(1);
        let short = self.display_resolution.max(1) as f32;
        let long = short * aspect;
        let (min, max) = if long.round() > limit as f32 {
            let scale = limit as f32 / long;
            (((short * scale).round() as u32).clamp(1, limit), limit)
        } else {
            (self.display_resolution.clamp(1, limit), long.round() as u32)
        };
        if width >= height {
            (max, min)
        } else {
            (min, max)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIMIT: u32 = 8192;

    #[test]
    fn test_layer_size_landscape() {
        let config = RenderConfig::default();
        assert_eq!(config.layer_size(1920, 1080, LIMIT), (1820, 1024));
    }

    #[test]
    fn test_layer_size_portrait() {
        let config = RenderConfig::default();
        assert_eq!(config.layer_size(500, 1000, LIMIT), (1024, 2048));
    }

    #[test]
    fn test_layer_size_degenerate_canvas() {
        let config = RenderConfig::default();
        let (w, h) = config.layer_size(0, 0, LIMIT);
        assert!(w > 0 && h > 0, "zero-sized canvas must still yield a target");
    }

    #[test]
    fn test_layer_size_extreme_aspect_is_clamped() {
        let config = RenderConfig::default();
        let (w, h) = config.layer_size(1600, 150, LIMIT);
        assert_eq!(w, LIMIT, "long side clamped to the device limit");
        let aspect = w as f32 / h as f32;
        assert!((aspect - 1600.0 / 150.0).abs() < 0.02, "aspect kept: {w}x{h}");

        let (w, h) = config.layer_size(100, 4000, 2048);
        assert_eq!((w, h), (51, 2048));
    }

    #[test]
    fn test_layer_size_resolution_above_limit() {
        let config = RenderConfig {
            display_resolution: 4096,
            ..RenderConfig::default()
        };
        assert_eq!(config.layer_size(1000, 1000, 2048), (2048, 2048));
    }
}
