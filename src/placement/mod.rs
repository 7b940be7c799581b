//! Label placement: sample anchors along a curve, score rotated candidates,
//! keep the cheapest one, shrinking the font until something fits.

pub mod cost;
pub mod label;
pub mod registry;
pub mod search;

use crate::config::PlacementConfig;
use crate::error::PlacementError;
use crate::geometry::{AngleUnit, Point};
use crate::scene::{Curve, PlotContext};
use crate::text_metrics::TextMeasure;

pub use cost::Rejection;
pub use label::{Label, Space};
pub use registry::{Obstacle, ObstacleKind, ShapeRegistry};
pub use search::{CandidateRecord, CurveTrack, SearchOutcome, SearchTrace};

/// Cost of a rejected candidate.
pub const SENTINEL_MAX: f64 = 1e6;

/// The chosen candidate, in display space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlacementResult {
    pub anchor: Point,
    pub rotation_deg: f64,
    pub cost: f64,
    /// Point size the label was placed at, when it carries text.
    pub font_size: Option<f64>,
}

impl PlacementResult {
    pub fn is_valid(&self) -> bool {
        self.cost < SENTINEL_MAX
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeometryIssue {
    NonPositiveSize,
    DegenerateCurve,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PlacementOutcome {
    Selected {
        result: PlacementResult,
        trace: SearchTrace,
    },
    /// Every candidate was rejected at every font size. `last` is the
    /// candidate the label was left at, if any anchor was reachable.
    Unplaceable {
        last: Option<PlacementResult>,
        trace: SearchTrace,
    },
    InvalidGeometry(GeometryIssue),
}

impl PlacementOutcome {
    pub fn result(&self) -> Option<&PlacementResult> {
        match self {
            Self::Selected { result, .. } => Some(result),
            Self::Unplaceable { last, .. } => last.as_ref(),
            Self::InvalidGeometry(_) => None,
        }
    }

    pub fn trace(&self) -> Option<&SearchTrace> {
        match self {
            Self::Selected { trace, .. } | Self::Unplaceable { trace, .. } => Some(trace),
            Self::InvalidGeometry(_) => None,
        }
    }

    pub fn is_selected(&self) -> bool {
        matches!(self, Self::Selected { .. })
    }
}

/// Place `label` along `curve`, avoiding everything in `registry`.
///
/// On success the label is moved to the selected candidate. If nothing fits,
/// the font is reduced one point at a time down to `config.font_floor`; when
/// that fails too the label is left at the first candidate of the final
/// attempt.
pub fn place_label(
    label: &mut Label,
    curve: &Curve,
    registry: &ShapeRegistry,
    context: &PlotContext,
    measurer: &dyn TextMeasure,
    config: &PlacementConfig,
) -> Result<PlacementOutcome, PlacementError> {
    if !(label.width() > 0.0 && label.height() > 0.0) {
        return Ok(PlacementOutcome::InvalidGeometry(
            GeometryIssue::NonPositiveSize,
        ));
    }
    if curve.samples().len() < 2 {
        return Ok(PlacementOutcome::InvalidGeometry(
            GeometryIssue::DegenerateCurve,
        ));
    }

    let full_track = search::resample_curve(curve, context, config.resample_points);
    let initial_font = label.font_size();
    loop {
        let track =
            search::reachable_anchors(&full_track, label.width(), label.height(), context, config);
        let SearchOutcome { best, trace } =
            search::search_placement(label, &track, registry, context, config);

        if let Some(best) = best.as_ref().filter(|best| best.cost < SENTINEL_MAX) {
            commit(label, best, context);
            let result = result_of(label, best);
            if label.font_size() != initial_font {
                log::warn!(
                    "label {:?} shrunk to {:?}pt to fit",
                    label.text().unwrap_or_default(),
                    label.font_size()
                );
            }
            log::info!(
                "placed {:?} at ({:.1}, {:.1}) rot {:.2} cost {:.4}",
                label.text().unwrap_or_default(),
                result.anchor.0,
                result.anchor.1,
                result.rotation_deg,
                result.cost
            );
            return Ok(PlacementOutcome::Selected { result, trace });
        }

        let next_size = label
            .font_size()
            .map(|size| size - 1.0)
            .filter(|size| *size >= config.font_floor);
        if let Some(size) = next_size
            && label.remeasure(size, measurer)?
        {
            log::debug!(
                "no valid candidate for {:?}, retrying at {size}pt",
                label.text().unwrap_or_default()
            );
            continue;
        }

        let last = best.map(|best| {
            commit(label, &best, context);
            result_of(label, &best)
        });
        log::warn!(
            "no valid placement for {:?} ({} candidates over {} anchors)",
            label.text().unwrap_or_default(),
            trace.candidates.len(),
            trace.anchors_sampled
        );
        return Ok(PlacementOutcome::Unplaceable { last, trace });
    }
}

fn commit(label: &mut Label, best: &CandidateRecord, context: &PlotContext) {
    label.set_anchor(best.anchor, Space::Display, context.transform());
    label.set_rotation(best.rotation_deg, AngleUnit::Degrees);
}

fn result_of(label: &Label, best: &CandidateRecord) -> PlacementResult {
    PlacementResult {
        anchor: best.anchor,
        rotation_deg: best.rotation_deg,
        cost: best.cost,
        font_size: label.font_size(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PlotConfig;
    use crate::geometry::Scale;
    use crate::text_metrics::{ApproxMeasurer, TextExtent};
    use std::cell::RefCell;

    struct RecordingMeasurer {
        inner: ApproxMeasurer,
        sizes: RefCell<Vec<f64>>,
    }

    impl TextMeasure for RecordingMeasurer {
        fn measure(&self, text: &str, font_size: f64) -> Result<TextExtent, PlacementError> {
            self.sizes.borrow_mut().push(font_size);
            self.inner.measure(text, font_size)
        }
    }

    fn recording() -> RecordingMeasurer {
        RecordingMeasurer {
            inner: ApproxMeasurer::new(100.0),
            sizes: RefCell::new(Vec::new()),
        }
    }

    fn linear_context() -> PlotContext {
        PlotContext::from_config(&PlotConfig {
            x_limits: (0.0, 10.0),
            y_limits: (0.0, 10.0),
            x_scale: Scale::Linear,
            y_scale: Scale::Linear,
            figure_size_in: (7.0, 7.0),
            ..PlotConfig::default()
        })
        .expect("valid plot")
    }

    fn text_label(text: &str, context: &PlotContext, measurer: &dyn TextMeasure) -> Label {
        Label::from_measured_text(
            text,
            12.0,
            (0.0, 5.0),
            0.0,
            Space::Data,
            context.transform(),
            measurer,
        )
        .expect("measures")
    }

    #[test]
    fn invalid_geometry_is_reported_without_searching() {
        let context = linear_context();
        let measurer = ApproxMeasurer::new(100.0);
        let config = PlacementConfig::default();
        let curve = Curve::new(vec![(0.0, 5.0), (10.0, 5.0)]);

        let mut flat = Label::from_explicit((1.0, 1.0), 0.0, 0.0, 10.0, Space::Data, context.transform());
        let outcome = place_label(&mut flat, &curve, &ShapeRegistry::new(), &context, &measurer, &config)
            .expect("no collaborator failure");
        assert_eq!(outcome, PlacementOutcome::InvalidGeometry(GeometryIssue::NonPositiveSize));

        let mut label = Label::from_explicit((1.0, 1.0), 0.0, 10.0, 10.0, Space::Data, context.transform());
        let single = Curve::new(vec![(1.0, 5.0)]);
        let outcome = place_label(&mut label, &single, &ShapeRegistry::new(), &context, &measurer, &config)
            .expect("no collaborator failure");
        assert_eq!(outcome, PlacementOutcome::InvalidGeometry(GeometryIssue::DegenerateCurve));
        assert_eq!(label.anchor(Space::Data, context.transform()).0, 1.0);
    }

    #[test]
    fn shrinks_until_the_label_fits() {
        let context = linear_context();
        let measurer = recording();
        let config = PlacementConfig::default();
        let curve = Curve::new(vec![(0.0, 5.0), (10.0, 5.0)]);
        // 46 chars: 460px at 12pt, 421.7px at 11pt, 383.3px at 10pt. An anchor is only
        // reachable while the whole label fits left of the axis edge (x = 630), so the
        // reachable track ends near 626.4 - width and a label at its start overhangs that
        // end by (2w - 535.3) / w: 0.84 and 0.73 at 12pt and 11pt, 0.60 at 10pt.
        let text = "x".repeat(46);
        let mut label = text_label(&text, &context, &measurer);

        let outcome = place_label(&mut label, &curve, &ShapeRegistry::new(), &context, &measurer, &config)
            .expect("no collaborator failure");
        assert!(outcome.is_selected());
        assert_eq!(outcome.result().and_then(|r| r.font_size), Some(10.0));
        assert_eq!(*measurer.sizes.borrow(), vec![12.0, 11.0, 10.0]);
    }

    #[test]
    fn gives_up_at_the_font_floor() {
        let context = linear_context();
        let measurer = recording();
        let config = PlacementConfig::default();
        let curve = Curve::new(vec![(0.0, 5.0), (10.0, 5.0)]);
        let text = "x".repeat(100);
        let mut label = text_label(&text, &context, &measurer);
        let before = label.anchor(Space::Display, context.transform());

        let outcome = place_label(&mut label, &curve, &ShapeRegistry::new(), &context, &measurer, &config)
            .expect("no collaborator failure");
        assert!(matches!(outcome, PlacementOutcome::Unplaceable { last: None, .. }));
        assert_eq!(*measurer.sizes.borrow(), vec![12.0, 11.0, 10.0, 9.0, 8.0]);
        assert_eq!(label.font_size(), Some(8.0));
        assert_eq!(label.anchor(Space::Display, context.transform()), before);
    }

    #[test]
    fn unplaceable_label_is_left_at_first_candidate() {
        let context = linear_context();
        let measurer = ApproxMeasurer::new(100.0);
        let config = PlacementConfig {
            rotation_offsets_deg: vec![-3.0],
            font_floor: 12.0,
            ..PlacementConfig::default()
        };
        let curve = Curve::new(vec![(0.0, 5.0), (10.0, 5.0)]);
        let mut label = text_label("CDMSlite", &context, &measurer);

        let outcome = place_label(&mut label, &curve, &ShapeRegistry::new(), &context, &measurer, &config)
            .expect("no collaborator failure");
        let PlacementOutcome::Unplaceable { last: Some(last), trace } = outcome else {
            panic!("expected an unplaceable outcome, got {outcome:?}");
        };
        assert!(!last.is_valid());
        assert_eq!(trace.candidates[0].anchor, last.anchor);
        assert_eq!(label.anchor(Space::Display, context.transform()), last.anchor);
        assert!((label.rotation_deg() + 3.0).abs() < 1e-12);
    }

    #[test]
    fn repeated_calls_are_deterministic() {
        let context = linear_context();
        let measurer = ApproxMeasurer::new(100.0);
        let config = PlacementConfig::default();
        let curve = Curve::new(vec![(0.0, 2.0), (4.0, 6.0), (10.0, 3.0)]);
        let mut registry = ShapeRegistry::new();
        registry.register(Obstacle::Polyline(crate::geometry::to_display(
            curve.samples(),
            context.transform(),
        )));

        let mut first = text_label("SuperCDMS", &context, &measurer);
        let mut second = first.clone();
        let a = place_label(&mut first, &curve, &registry, &context, &measurer, &config)
            .expect("no collaborator failure");
        let b = place_label(&mut second, &curve, &registry, &context, &measurer, &config)
            .expect("no collaborator failure");
        assert_eq!(a, b);
        assert_eq!(first, second);
    }
}
