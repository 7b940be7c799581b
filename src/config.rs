use crate::error::PlacementError;
use crate::geometry::{AxisTransform, Bounds, Scale};
use crate::theme::Theme;
use serde::{Deserialize, Serialize};
use std::path::Path;

const DEFAULT_ROTATION_OFFSETS_DEG: [f64; 9] = [0.0, 0.5, -0.5, 1.0, -1.0, 2.0, -2.0, 5.0, -5.0];

/// Which side of its curve a label is placed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    #[default]
    Above,
    Below,
}

/// Fractions of the figure occupied by the axis, matplotlib-style.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AxesRect {
    pub left: f64,
    pub bottom: f64,
    pub width: f64,
    pub height: f64,
}

impl Default for AxesRect {
    fn default() -> Self {
        Self {
            left: 0.125,
            bottom: 0.11,
            width: 0.775,
            height: 0.77,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlotConfig {
    pub x_limits: (f64, f64),
    pub y_limits: (f64, f64),
    pub x_scale: Scale,
    pub y_scale: Scale,
    pub figure_size_in: (f64, f64),
    pub dpi: f64,
    pub axes_rect: AxesRect,
}

impl Default for PlotConfig {
    fn default() -> Self {
        Self {
            x_limits: (0.1, 20.0),
            y_limits: (1e-46, 1e-34),
            x_scale: Scale::Log,
            y_scale: Scale::Log,
            figure_size_in: (9.0, 7.0),
            dpi: 100.0,
            axes_rect: AxesRect::default(),
        }
    }
}

impl PlotConfig {
    pub fn figure_size_px(&self) -> (f64, f64) {
        (
            self.figure_size_in.0 * self.dpi,
            self.figure_size_in.1 * self.dpi,
        )
    }

    /// Display-space rectangle of the axis (y-up pixels).
    pub fn axis_extent(&self) -> Bounds {
        let (w, h) = self.figure_size_px();
        let rect = self.axes_rect;
        Bounds::new(
            rect.left * w,
            (rect.left + rect.width) * w,
            rect.bottom * h,
            (rect.bottom + rect.height) * h,
        )
    }

    pub fn transform(&self) -> Result<AxisTransform, PlacementError> {
        AxisTransform::new(
            self.x_limits,
            self.y_limits,
            self.x_scale,
            self.y_scale,
            self.axis_extent(),
        )
    }

    pub fn apply(&mut self, file: PlotConfigFile) {
        if let Some(v) = file.x_limits {
            self.x_limits = v;
        }
        if let Some(v) = file.y_limits {
            self.y_limits = v;
        }
        if let Some(v) = file.x_scale {
            self.x_scale = v;
        }
        if let Some(v) = file.y_scale {
            self.y_scale = v;
        }
        if let Some(v) = file.figure_size_in {
            self.figure_size_in = v;
        }
        if let Some(v) = file.dpi {
            self.dpi = v;
        }
        if let Some(v) = file.axes_rect {
            self.axes_rect = v;
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlacementConfig {
    /// Every `stride`-th resampled curve point becomes an anchor candidate.
    pub stride: usize,
    pub resample_points: usize,
    /// Step between curve samples used by the curve-following term.
    pub follow_every: usize,
    /// Rotation offsets relative to the local tangent, tried in order.
    pub rotation_offsets_deg: Vec<f64>,
    pub font_floor: f64,
    /// Gap between curve and label as a fraction of the axis extent.
    pub margin_fraction: f64,
    pub side: Side,
    pub iterations: usize,
    pub allow_curve_crossing: bool,
    /// Weight of the repulsion term standing in for curve-following on the
    /// zero-rotation probe candidate.
    pub probe_fraction: f64,
}

impl Default for PlacementConfig {
    fn default() -> Self {
        Self {
            stride: 50,
            resample_points: 1000,
            follow_every: 1,
            rotation_offsets_deg: DEFAULT_ROTATION_OFFSETS_DEG.to_vec(),
            font_floor: 8.0,
            margin_fraction: 0.01,
            side: Side::Above,
            iterations: 1,
            allow_curve_crossing: false,
            probe_fraction: 0.05,
        }
    }
}

impl PlacementConfig {
    fn apply(&mut self, file: PlacementConfigFile) {
        if let Some(v) = file.stride {
            self.stride = v.max(1);
        }
        if let Some(v) = file.resample_points {
            self.resample_points = v.max(2);
        }
        if let Some(v) = file.follow_every {
            self.follow_every = v.max(1);
        }
        if let Some(v) = file.rotation_offsets_deg {
            self.rotation_offsets_deg = v;
        }
        if let Some(v) = file.font_floor {
            self.font_floor = v;
        }
        if let Some(v) = file.margin_fraction {
            self.margin_fraction = v;
        }
        if let Some(v) = file.side {
            self.side = v;
        }
        if let Some(v) = file.iterations {
            self.iterations = v;
        }
        if let Some(v) = file.allow_curve_crossing {
            self.allow_curve_crossing = v;
        }
        if let Some(v) = file.probe_fraction {
            self.probe_fraction = v;
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    pub background: String,
    pub x_label: String,
    pub y_label: String,
    pub show_excluded_region: bool,
    pub excluded_region_points: usize,
    /// Draw grid lines at the major ticks in the theme's grid colour.
    pub show_grid: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            background: "#FFFFFF".to_string(),
            x_label: "WIMP mass [GeV/c²]".to_string(),
            y_label: "SI WIMP-nucleon cross section [cm²]".to_string(),
            show_excluded_region: true,
            excluded_region_points: 1000,
            show_grid: false,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub plot: PlotConfig,
    pub placement: PlacementConfig,
    pub theme: Theme,
    pub render: RenderConfig,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PlotConfigFile {
    x_limits: Option<(f64, f64)>,
    y_limits: Option<(f64, f64)>,
    x_scale: Option<Scale>,
    y_scale: Option<Scale>,
    figure_size_in: Option<(f64, f64)>,
    dpi: Option<f64>,
    axes_rect: Option<AxesRect>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct PlacementConfigFile {
    stride: Option<usize>,
    resample_points: Option<usize>,
    follow_every: Option<usize>,
    rotation_offsets_deg: Option<Vec<f64>>,
    font_floor: Option<f64>,
    margin_fraction: Option<f64>,
    side: Option<Side>,
    iterations: Option<usize>,
    allow_curve_crossing: Option<bool>,
    probe_fraction: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct ThemeFile {
    font_family: Option<String>,
    font_size: Option<f64>,
    text_color: Option<String>,
    axis_color: Option<String>,
    grid_color: Option<String>,
    excluded_region_color: Option<String>,
    excluded_region_alpha: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct RenderConfigFile {
    background: Option<String>,
    x_label: Option<String>,
    y_label: Option<String>,
    show_excluded_region: Option<bool>,
    excluded_region_points: Option<usize>,
    show_grid: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct ConfigFile {
    theme: Option<String>,
    theme_variables: Option<ThemeFile>,
    plot: Option<PlotConfigFile>,
    placement: Option<PlacementConfigFile>,
    render: Option<RenderConfigFile>,
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let Some(path) = path else {
        return Ok(Config::default());
    };
    let contents = std::fs::read_to_string(path)?;
    parse_config(&contents)
}

/// Parse a JSON config document. Unknown keys are rejected rather than
/// ignored.
pub fn parse_config(contents: &str) -> anyhow::Result<Config> {
    let mut config = Config::default();
    let parsed: ConfigFile = serde_json::from_str(contents)?;

    if let Some(theme_name) = parsed.theme.as_deref() {
        config.theme = match theme_name {
            "paper" | "default" => Theme::paper(),
            "slides" => Theme::slides(),
            other => anyhow::bail!("unknown theme `{other}` (expected paper or slides)"),
        };
    }
    if let Some(vars) = parsed.theme_variables {
        if let Some(v) = vars.font_family {
            config.theme.font_family = v;
        }
        if let Some(v) = vars.font_size {
            config.theme.font_size = v;
        }
        if let Some(v) = vars.text_color {
            config.theme.text_color = v;
        }
        if let Some(v) = vars.axis_color {
            config.theme.axis_color = v;
        }
        if let Some(v) = vars.grid_color {
            config.theme.grid_color = v;
        }
        if let Some(v) = vars.excluded_region_color {
            config.theme.excluded_region_color = v;
        }
        if let Some(v) = vars.excluded_region_alpha {
            config.theme.excluded_region_alpha = v;
        }
    }
    if let Some(plot) = parsed.plot {
        config.plot.apply(plot);
    }
    if let Some(placement) = parsed.placement {
        config.placement.apply(placement);
    }
    if let Some(render) = parsed.render {
        if let Some(v) = render.background {
            config.render.background = v;
        }
        if let Some(v) = render.x_label {
            config.render.x_label = v;
        }
        if let Some(v) = render.y_label {
            config.render.y_label = v;
        }
        if let Some(v) = render.show_excluded_region {
            config.render.show_excluded_region = v;
        }
        if let Some(v) = render.excluded_region_points {
            config.render.excluded_region_points = v.max(2);
        }
        if let Some(v) = render.show_grid {
            config.render.show_grid = v;
        }
    }
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_plot() {
        let config = Config::default();
        assert_eq!(config.placement.stride, 50);
        assert_eq!(config.placement.font_floor, 8.0);
        // nine tangent-relative offsets plus the probe
        assert_eq!(config.placement.rotation_offsets_deg.len() + 1, 10);
        let extent = config.plot.axis_extent();
        assert!((extent.x_min - 112.5).abs() < 1e-9);
        assert!((extent.y_max - 616.0).abs() < 1e-9);
    }

    #[test]
    fn parses_partial_overrides() {
        let config = parse_config(
            r#"{
                "theme": "slides",
                "plot": { "xLimits": [1.0, 100.0], "xScale": "linear" },
                "placement": { "stride": 0, "side": "below", "rotationOffsetsDeg": [0.0, 3.0] }
            }"#,
        )
        .expect("config parses");
        assert_eq!(config.plot.x_limits, (1.0, 100.0));
        assert_eq!(config.plot.x_scale, Scale::Linear);
        assert_eq!(config.plot.y_scale, Scale::Log);
        assert_eq!(config.placement.stride, 1);
        assert_eq!(config.placement.side, Side::Below);
        assert_eq!(config.placement.rotation_offsets_deg, vec![0.0, 3.0]);
        assert_eq!(config.theme.font_family, Theme::slides().font_family);
    }

    #[test]
    fn grid_is_opt_in() {
        assert!(!Config::default().render.show_grid);
        let config = parse_config(
            r##"{ "themeVariables": { "gridColor": "#CCCCCC" }, "render": { "showGrid": true } }"##,
        )
        .expect("config parses");
        assert!(config.render.show_grid);
        assert_eq!(config.theme.grid_color, "#CCCCCC");
    }

    #[test]
    fn unknown_keys_are_errors() {
        let err = parse_config(r#"{ "placement": { "strid": 10 } }"#);
        assert!(err.is_err(), "misspelled key must not be dropped silently");
        let err = parse_config(r#"{ "colour": "red" }"#);
        assert!(err.is_err());
    }
}
