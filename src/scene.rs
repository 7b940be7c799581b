//! The plot being labelled: its axis, its series, and the driver that places
//! every series label in turn.

use crate::config::{Config, PlacementConfig, PlotConfig, PlotConfigFile};
use crate::data::{SeriesFile, SeriesOptions, read_series};
use crate::error::{DataError, PlacementError, SceneError};
use crate::geometry::{AxisTransform, Bounds, Point, Scale, local_tangent_angles, to_display};
use crate::placement::{Label, Obstacle, PlacementOutcome, ShapeRegistry, Space, place_label};
use crate::text_metrics::TextMeasure;
use crate::theme::Theme;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

/// Samples of a series in data space, ordered by increasing x for line
/// series. Contour outlines are closed and carry no ordering.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Curve {
    samples: Vec<Point>,
}

impl Curve {
    pub fn new(samples: Vec<Point>) -> Self {
        Self { samples }
    }

    pub fn samples(&self) -> &[Point] {
        &self.samples
    }

    pub fn x_domain(&self) -> Option<(f64, f64)> {
        let first = self.samples.first()?;
        let last = self.samples.last()?;
        Some((first.0.min(last.0), first.0.max(last.0)))
    }

    /// Linear interpolation in data space; `None` outside the sampled domain.
    pub fn interp(&self, x: f64) -> Option<f64> {
        self.interp_on(x, Scale::Linear, Scale::Linear)
    }

    /// Interpolate linearly in the working space of the given axis scales,
    /// i.e. along the straight segments the curve is drawn with.
    pub fn interp_on(&self, x: f64, x_scale: Scale, y_scale: Scale) -> Option<f64> {
        let (lo, hi) = self.x_domain()?;
        if !(lo <= x && x <= hi) {
            return None;
        }
        let idx = self.samples.partition_point(|p| p.0 <= x);
        if idx == self.samples.len() {
            return self.samples.last().map(|p| p.1);
        }
        let (a, b) = (self.samples[idx.saturating_sub(1)], self.samples[idx]);
        if idx == 0 || a.0 == b.0 {
            return Some(a.1);
        }
        let (xa, xb, xt) = (x_scale.forward(a.0), x_scale.forward(b.0), x_scale.forward(x));
        let (ya, yb) = (y_scale.forward(a.1), y_scale.forward(b.1));
        let t = (xt - xa) / (xb - xa);
        Some(y_scale.inverse(ya + t * (yb - ya)))
    }
}

/// Figure geometry shared by every placement in a scene.
#[derive(Debug, Clone, PartialEq)]
pub struct PlotContext {
    transform: AxisTransform,
    figure_size_in: (f64, f64),
    dpi: f64,
}

impl PlotContext {
    pub fn from_config(plot: &PlotConfig) -> Result<Self, PlacementError> {
        if !(plot.dpi > 0.0) {
            return Err(PlacementError::Transform(format!(
                "dpi must be positive, got {}",
                plot.dpi
            )));
        }
        Ok(Self {
            transform: plot.transform()?,
            figure_size_in: plot.figure_size_in,
            dpi: plot.dpi,
        })
    }

    pub fn transform(&self) -> &AxisTransform {
        &self.transform
    }

    pub fn axis_bounds(&self) -> Bounds {
        self.transform.extent()
    }

    pub fn figure_size_px(&self) -> (f64, f64) {
        (
            self.figure_size_in.0 * self.dpi,
            self.figure_size_in.1 * self.dpi,
        )
    }

    pub fn dpi(&self) -> f64 {
        self.dpi
    }

    /// Label gap along each axis for a fraction of the axis extent.
    pub fn margin(&self, fraction: f64) -> (f64, f64) {
        let axis = self.axis_bounds();
        (axis.width() * fraction, axis.height() * fraction)
    }

    /// Local slope of `data` as drawn, using the physical size of the axis
    /// rather than the whole figure's size and aspect ratio.
    pub fn tangent_angles(&self, data: &[Point]) -> Vec<f64> {
        let axis = self.axis_bounds();
        let axis_in = (axis.width() / self.dpi, axis.height() / self.dpi);
        let xs: Vec<f64> = data.iter().map(|p| p.0).collect();
        let ys: Vec<f64> = data.iter().map(|p| p.1).collect();
        local_tangent_angles(
            &xs,
            &ys,
            axis_in,
            self.transform.x_limits(),
            self.transform.y_limits(),
            self.transform.x_scale().is_log(),
            self.transform.y_scale().is_log(),
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SeriesKind {
    /// A published limit or projected sensitivity.
    #[default]
    Curve,
    /// A filled signal region.
    Contour,
    /// The neutrino floor: dashed line with everything below it shaded.
    NeutrinoFog,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineStyle {
    #[default]
    Solid,
    /// A future sensitivity; drawn dashed and labelled without a year.
    Projection,
    Dashed,
    DashDot,
    Dotted,
}

impl LineStyle {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "-" | "solid" => Some(Self::Solid),
            "projection" => Some(Self::Projection),
            "--" | "dashed" => Some(Self::Dashed),
            "-." | "dashdot" => Some(Self::DashDot),
            ":" | "dotted" => Some(Self::Dotted),
            _ => None,
        }
    }

    /// SVG `stroke-dasharray` in multiples of the line width.
    pub fn dash_pattern(self) -> Option<&'static [f64]> {
        match self {
            Self::Solid => None,
            Self::Projection | Self::Dashed => Some(&[3.7, 1.6]),
            Self::DashDot => Some(&[6.4, 1.6, 1.0, 1.6]),
            Self::Dotted => Some(&[1.0, 1.65]),
        }
    }
}

/// Where and how a series' label is drawn. `anchor` is in data space; a
/// label without one is not drawn until it has been placed.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelState {
    pub text: String,
    pub color: String,
    pub font_size: f64,
    pub anchor: Option<Point>,
    pub rotation_deg: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub key: String,
    pub kind: SeriesKind,
    pub curve: Curve,
    pub style: LineStyle,
    pub color: String,
    pub linewidth: f64,
    pub alpha: f64,
    pub year: Option<f64>,
    pub source: Option<String>,
    pub label: LabelState,
}

impl Series {
    /// Build a series from a parsed data file with `overrides` applied on top
    /// of its header.
    pub fn from_file(
        key: &str,
        kind: SeriesKind,
        file: SeriesFile,
        overrides: &SeriesOptions,
        theme: &Theme,
    ) -> Result<Self, DataError> {
        let mut options = file.options;
        options.merge(overrides);

        let style = match options.style.as_deref() {
            None => LineStyle::Solid,
            Some(raw) => LineStyle::parse(raw).ok_or_else(|| DataError::BadValue {
                origin: key.to_string(),
                key: "style".to_string(),
                value: raw.to_string(),
            })?,
        };
        let color = options.color.unwrap_or_else(|| "black".to_string());
        let default_linewidth = match kind {
            SeriesKind::Curve => 1.5,
            SeriesKind::Contour => 1.0,
            SeriesKind::NeutrinoFog => 2.5,
        };
        let anchor = options.label_xpos.zip(options.label_ypos);
        Ok(Self {
            key: key.to_string(),
            kind,
            curve: Curve::new(file.samples),
            style,
            linewidth: options.linewidth.unwrap_or(default_linewidth),
            alpha: options.alpha.unwrap_or(0.5),
            year: options.year,
            source: options.source,
            label: LabelState {
                text: options.label.unwrap_or_default(),
                color: options.label_color.unwrap_or_else(|| color.clone()),
                font_size: options.fontsize.unwrap_or(theme.font_size),
                anchor,
                rotation_deg: options.label_rotation.unwrap_or(0.0),
            },
            color,
        })
    }

    /// Label text as drawn: published curves carry their year.
    pub fn display_label(&self) -> String {
        match (self.kind, self.style, self.year) {
            (SeriesKind::Curve, style, Some(year)) if style != LineStyle::Projection => {
                format!("{} ({year:.0})", self.label.text)
            }
            _ => self.label.text.clone(),
        }
    }

    /// Whether the series is drawn as a line other labels must avoid.
    pub fn is_line(&self) -> bool {
        matches!(self.kind, SeriesKind::Curve | SeriesKind::NeutrinoFog)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SeriesEntry {
    pub key: String,
    /// Data file, relative to the manifest.
    pub file: PathBuf,
    #[serde(default)]
    pub kind: SeriesKind,
    #[serde(default)]
    pub options: SeriesOptions,
}

/// JSON5 description of a plot: axis overrides, the series to draw, and which
/// labels to place automatically.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SceneManifest {
    #[serde(default)]
    pub plot: Option<PlotConfigFile>,
    pub series: Vec<SeriesEntry>,
    /// Keys to autoposition; all labelled non-contour series when absent.
    #[serde(default)]
    pub autoposition: Option<Vec<String>>,
}

pub fn parse_manifest(src: &str) -> Result<SceneManifest, SceneError> {
    json5::from_str(src).map_err(|err| SceneError::Manifest(err.to_string()))
}

#[derive(Debug, Clone)]
pub struct Scene {
    context: PlotContext,
    series: Vec<Series>,
}

impl Scene {
    pub fn new(context: PlotContext) -> Self {
        Self {
            context,
            series: Vec::new(),
        }
    }

    /// Load every series named by `manifest`. `config.plot` is updated with
    /// the manifest's axis overrides.
    pub fn from_manifest(
        manifest: SceneManifest,
        base_dir: &Path,
        config: &mut Config,
    ) -> Result<Self, SceneError> {
        if let Some(plot) = manifest.plot {
            config.plot.apply(plot);
        }
        let mut scene = Self::new(PlotContext::from_config(&config.plot)?);
        for entry in manifest.series {
            let file = read_series(&base_dir.join(&entry.file))?;
            let series =
                Series::from_file(&entry.key, entry.kind, file, &entry.options, &config.theme)?;
            log::debug!(
                "loaded {} ({:?}, {} samples)",
                series.key,
                series.kind,
                series.curve.samples().len()
            );
            scene.add_series(series)?;
        }
        Ok(scene)
    }

    pub fn context(&self) -> &PlotContext {
        &self.context
    }

    pub fn series(&self) -> &[Series] {
        &self.series
    }

    pub fn get(&self, key: &str) -> Option<&Series> {
        self.series.iter().find(|series| series.key == key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Series> {
        self.series.iter_mut().find(|series| series.key == key)
    }

    pub fn add_series(&mut self, series: Series) -> Result<(), SceneError> {
        if self.get(&series.key).is_some() {
            return Err(SceneError::DuplicateSeries(series.key));
        }
        self.series.push(series);
        Ok(())
    }

    /// The label of `series` as a measured box, if it has text and a position.
    pub fn positioned_label(
        &self,
        series: &Series,
        measurer: &dyn TextMeasure,
    ) -> Result<Option<Label>, PlacementError> {
        let Some(anchor) = series.label.anchor else {
            return Ok(None);
        };
        let text = series.display_label();
        if text.is_empty() {
            return Ok(None);
        }
        Label::from_measured_text(
            &text,
            series.label.font_size,
            anchor,
            series.label.rotation_deg,
            Space::Data,
            self.context.transform(),
            measurer,
        )
        .map(Some)
    }

    /// Obstacles currently on the plot: every line series, then every
    /// positioned label whose key is not in `exclude`.
    pub fn rebuild_registry(
        &self,
        exclude: &[&str],
        measurer: &dyn TextMeasure,
    ) -> Result<ShapeRegistry, PlacementError> {
        let transform = self.context.transform();
        let mut registry = ShapeRegistry::new();
        for series in self.series.iter().filter(|series| series.is_line()) {
            registry.register(Obstacle::Polyline(to_display(
                series.curve.samples(),
                transform,
            )));
        }
        for series in &self.series {
            if exclude.contains(&series.key.as_str()) {
                continue;
            }
            if let Some(label) = self.positioned_label(series, measurer)? {
                registry.register(Obstacle::Polygon(label.polygon().to_vec()));
            }
        }
        Ok(registry)
    }

    /// Place the labels of `keys` (default: every labelled series that is not
    /// a contour) one after another, each avoiding the labels placed before
    /// it. Runs `config.iterations` passes; later passes see every label.
    pub fn place_all_labels(
        &mut self,
        keys: Option<&[String]>,
        measurer: &dyn TextMeasure,
        config: &PlacementConfig,
    ) -> Result<BTreeMap<String, PlacementOutcome>, SceneError> {
        let keys: Vec<String> = match keys {
            Some(keys) => {
                if let Some(missing) = keys.iter().find(|key| self.get(key).is_none()) {
                    return Err(SceneError::UnknownSeries(missing.clone()));
                }
                keys.to_vec()
            }
            None => self
                .series
                .iter()
                .filter(|series| series.kind != SeriesKind::Contour && !series.label.text.is_empty())
                .map(|series| series.key.clone())
                .collect(),
        };

        let mut pending: BTreeSet<String> = keys.iter().cloned().collect();
        let mut outcomes = BTreeMap::new();
        for pass in 0..config.iterations {
            log::debug!("placement pass {}/{}", pass + 1, config.iterations);
            for key in &keys {
                let outcome = self.place_series_label(key, &pending, measurer, config)?;
                pending.remove(key);
                outcomes.insert(key.clone(), outcome);
            }
        }
        Ok(outcomes)
    }

    fn place_series_label(
        &mut self,
        key: &str,
        pending: &BTreeSet<String>,
        measurer: &dyn TextMeasure,
        config: &PlacementConfig,
    ) -> Result<PlacementOutcome, SceneError> {
        let mut exclude: Vec<&str> = pending.iter().map(String::as_str).collect();
        exclude.push(key);
        let registry = self.rebuild_registry(&exclude, measurer)?;

        let series = self
            .get(key)
            .ok_or_else(|| SceneError::UnknownSeries(key.to_string()))?;
        let start = series
            .label
            .anchor
            .or_else(|| series.curve.samples().first().copied())
            .unwrap_or_default();
        let mut label = Label::from_measured_text(
            &series.display_label(),
            series.label.font_size,
            start,
            series.label.rotation_deg,
            Space::Data,
            self.context.transform(),
            measurer,
        )?;
        let outcome = place_label(
            &mut label,
            &series.curve,
            &registry,
            &self.context,
            measurer,
            config,
        )?;

        if outcome.result().is_some() {
            let anchor = label.anchor(Space::Data, self.context.transform());
            if let Some(series) = self.get_mut(key) {
                series.label.anchor = Some(anchor);
                series.label.rotation_deg = label.rotation_deg();
                if let Some(size) = label.font_size() {
                    series.label.font_size = size;
                }
            }
        }
        Ok(outcome)
    }

    /// Upper edge of the excluded region: the lowest solid limit curve at each
    /// of `points` masses across the x-limits, capped at the top of the axis.
    /// Empty when no solid curve exists.
    pub fn excluded_region(&self, points: usize) -> Vec<Point> {
        let limits: Vec<&Series> = self
            .series
            .iter()
            .filter(|series| series.kind == SeriesKind::Curve && series.style == LineStyle::Solid)
            .collect();
        if limits.is_empty() {
            log::warn!("no solid limit curves, excluded region is empty");
            return Vec::new();
        }

        let transform = self.context.transform();
        let (x_scale, y_scale) = (transform.x_scale(), transform.y_scale());
        let (x_lo, x_hi) = transform.x_limits();
        let top = transform.y_limits().1;
        let (lo, hi) = (x_scale.forward(x_lo), x_scale.forward(x_hi));
        let points = points.max(2);
        (0..points)
            .map(|i| {
                let x = x_scale.inverse(lo + (hi - lo) * i as f64 / (points - 1) as f64);
                let y = limits
                    .iter()
                    .filter_map(|series| series.curve.interp_on(x, x_scale, y_scale))
                    .fold(top, f64::min);
                (x, y)
            })
            .collect()
    }
}
