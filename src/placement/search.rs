use crate::config::{PlacementConfig, Side};
use crate::geometry::{AngleUnit, Point, rect_contains_rect, rectangle_corners};
use crate::placement::cost::{CostFunction, Rejection};
use crate::placement::label::{Label, Space};
use crate::placement::registry::ShapeRegistry;
use crate::scene::{Curve, PlotContext};

/// A curve resampled on the axis grid, with the local slope at each sample.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CurveTrack {
    pub data: Vec<Point>,
    pub display: Vec<Point>,
    pub tangents_deg: Vec<f64>,
}

impl CurveTrack {
    pub fn len(&self) -> usize {
        self.display.len()
    }

    pub fn is_empty(&self) -> bool {
        self.display.is_empty()
    }
}

/// One scored (anchor, rotation) pair.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateRecord {
    /// Display-space bottom-left corner.
    pub anchor: Point,
    pub rotation_deg: f64,
    pub cost: f64,
    pub probe: bool,
    pub rejection: Option<Rejection>,
    pub corners: [Point; 4],
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchTrace {
    pub anchors_sampled: usize,
    pub candidates: Vec<CandidateRecord>,
}

impl SearchTrace {
    pub fn rejected(&self) -> impl Iterator<Item = &CandidateRecord> + '_ {
        self.candidates
            .iter()
            .filter(|candidate| candidate.rejection.is_some())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchOutcome {
    /// First minimum-cost candidate in generation order; `None` when no
    /// anchor survived sampling.
    pub best: Option<CandidateRecord>,
    pub trace: SearchTrace,
}

/// Resample `curve` on `count` points spaced evenly in the axis scale,
/// spanning the overlap of the curve's domain with the x-limits.
///
/// Interpolation happens in the scale space of each axis so that the track
/// follows the polyline as drawn.
pub fn resample_curve(curve: &Curve, context: &PlotContext, count: usize) -> CurveTrack {
    let transform = context.transform();
    let Some((domain_lo, domain_hi)) = curve.x_domain() else {
        return CurveTrack::default();
    };
    let (x_lo, x_hi) = transform.x_limits();
    let start = domain_lo.max(x_lo.min(x_hi));
    let stop = domain_hi.min(x_lo.max(x_hi));
    if !(start < stop) {
        return CurveTrack::default();
    }

    let x_scale = transform.x_scale();
    let y_scale = transform.y_scale();
    let (lo, hi) = (x_scale.forward(start), x_scale.forward(stop));
    let count = count.max(2);
    let mut data = Vec::with_capacity(count);
    let mut display = Vec::with_capacity(count);
    for i in 0..count {
        let t = i as f64 / (count - 1) as f64;
        let x = x_scale.inverse(lo + t * (hi - lo)).clamp(start, stop);
        let Some(y) = curve.interp_on(x, x_scale, y_scale) else {
            continue;
        };
        let shown = transform.point_to_display((x, y));
        if shown.0.is_finite() && shown.1.is_finite() {
            data.push((x, y));
            display.push(shown);
        }
    }
    let tangents_deg = context.tangent_angles(&data);
    CurveTrack {
        data,
        display,
        tangents_deg,
    }
}

/// Shift a curve point to where a label's anchor sits for `side`.
pub fn offset_point(point: Point, label_height: f64, margin: (f64, f64), side: Side) -> Point {
    match side {
        Side::Above => (point.0 + 2.0 / 3.0 * margin.0, point.1 + margin.1),
        Side::Below => (
            point.0 - 2.0 / 3.0 * margin.0,
            point.1 - margin.1 - label_height,
        ),
    }
}

/// Keep the samples where an unrotated label of the given size, anchored at
/// the offset point, lies inside the axis.
pub fn reachable_anchors(
    track: &CurveTrack,
    width: f64,
    height: f64,
    context: &PlotContext,
    config: &PlacementConfig,
) -> CurveTrack {
    let margin = context.margin(config.margin_fraction);
    let axis = context.axis_bounds().corners();
    let mut kept = CurveTrack::default();
    for ((&data, &display), &tangent) in track
        .data
        .iter()
        .zip(&track.display)
        .zip(&track.tangents_deg)
    {
        let anchor = offset_point(display, height, margin, config.side);
        let corners = rectangle_corners(anchor, width, height, 0.0, AngleUnit::Degrees);
        if rect_contains_rect(&axis, &corners) {
            kept.data.push(data);
            kept.display.push(display);
            kept.tangents_deg.push(tangent);
        }
    }
    kept
}

/// Score every `stride`-th track sample at each rotation offset and return
/// the cheapest candidate. `label` supplies the size; it is not modified.
///
/// When the registry is non-empty each anchor first gets an unrotated probe
/// candidate, scored on repulsion alone.
pub fn search_placement(
    label: &Label,
    track: &CurveTrack,
    registry: &ShapeRegistry,
    context: &PlotContext,
    config: &PlacementConfig,
) -> SearchOutcome {
    let side = config.side;
    let margin = context.margin(config.margin_fraction);
    let offset_curve: Vec<Point> = track
        .display
        .iter()
        .map(|&point| offset_point(point, label.height(), margin, side))
        .collect();
    let cost = CostFunction {
        curve: &track.display,
        offset_curve: &offset_curve,
        registry,
        axis: context.axis_bounds(),
        side,
        follow_every: config.follow_every,
        allow_curve_crossing: config.allow_curve_crossing,
        probe_fraction: config.probe_fraction,
    };
    let mirror = match side {
        Side::Above => 1.0,
        Side::Below => -1.0,
    };

    let transform = context.transform();
    let mut candidate = label.clone();
    let mut trace = SearchTrace::default();
    let mut best: Option<CandidateRecord> = None;

    for idx in (0..track.len()).step_by(config.stride.max(1)) {
        trace.anchors_sampled += 1;
        let anchor = offset_curve[idx];
        let tangent = track.tangents_deg[idx];

        let probe = (!registry.is_empty()).then(|| {
            let x = match side {
                Side::Above => anchor.0,
                Side::Below => anchor.0 - label.width() - margin.0,
            };
            ((x, anchor.1), 0.0, true)
        });
        let regular = config
            .rotation_offsets_deg
            .iter()
            .map(|offset| (anchor, tangent + mirror * offset, false));

        for (at, rotation, is_probe) in probe.into_iter().chain(regular) {
            candidate.set_anchor(at, Space::Display, transform);
            candidate.set_rotation(rotation, AngleUnit::Degrees);
            let evaluation = cost.evaluate(&candidate, is_probe);
            log::trace!(
                "anchor ({:.1}, {:.1}) rot {:.2} -> {:.4} {:?}",
                at.0,
                at.1,
                rotation,
                evaluation.cost,
                evaluation.rejection
            );
            let record = CandidateRecord {
                anchor: at,
                rotation_deg: rotation,
                cost: evaluation.cost,
                probe: is_probe,
                rejection: evaluation.rejection,
                corners: *candidate.polygon(),
            };
            if best.as_ref().is_none_or(|current| record.cost < current.cost) {
                best = Some(record.clone());
            }
            trace.candidates.push(record);
        }
    }

    log::debug!(
        "scored {} candidates over {} anchors, best cost {:?}",
        trace.candidates.len(),
        trace.anchors_sampled,
        best.as_ref().map(|record| record.cost)
    );
    SearchOutcome { best, trace }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PlotConfig;
    use crate::geometry::Scale;
    use crate::placement::SENTINEL_MAX;
    use crate::placement::registry::Obstacle;

    fn linear_context() -> PlotContext {
        let plot = PlotConfig {
            x_limits: (0.0, 10.0),
            y_limits: (0.0, 10.0),
            x_scale: Scale::Linear,
            y_scale: Scale::Linear,
            figure_size_in: (7.0, 7.0),
            ..PlotConfig::default()
        };
        PlotContext::from_config(&plot).expect("valid plot")
    }

    fn flat_label(context: &PlotContext) -> Label {
        Label::from_explicit((0.0, 0.0), 0.0, 50.0, 10.0, Space::Display, context.transform())
    }

    #[test]
    fn resample_clips_to_axis_and_domain() {
        let context = linear_context();
        let curve = Curve::new(vec![(-5.0, 5.0), (5.0, 5.0)]);
        let track = resample_curve(&curve, &context, 11);
        assert_eq!(track.len(), 11);
        assert_eq!(track.data.first().map(|p| p.0), Some(0.0));
        assert_eq!(track.data.last().map(|p| p.0), Some(5.0));
        assert!(track.tangents_deg.iter().all(|angle| angle.abs() < 1e-12));

        let outside = Curve::new(vec![(20.0, 5.0), (30.0, 5.0)]);
        assert!(resample_curve(&outside, &context, 100).is_empty());
    }

    #[test]
    fn log_axis_resamples_geometrically() {
        let plot = PlotConfig {
            x_limits: (1.0, 100.0),
            y_limits: (1e-45, 1e-38),
            ..PlotConfig::default()
        };
        let context = PlotContext::from_config(&plot).expect("valid plot");
        let curve = Curve::new(vec![(1.0, 1e-40), (100.0, 1e-44)]);
        let track = resample_curve(&curve, &context, 3);
        assert!((track.data[1].0 - 10.0).abs() < 1e-9);
        // straight in log-log, so the midpoint sits two decades down
        assert!((track.data[1].1.log10() + 42.0).abs() < 1e-9);
    }

    #[test]
    fn unreachable_anchors_are_dropped() {
        let context = linear_context();
        let track = resample_curve(&Curve::new(vec![(0.0, 5.0), (10.0, 5.0)]), &context, 100);
        let config = PlacementConfig::default();
        let kept = reachable_anchors(&track, 50.0, 10.0, &context, &config);
        assert!(!kept.is_empty());
        assert!(kept.len() < track.len());
        let right_edge = context.axis_bounds().x_max;
        assert!(kept.display.iter().all(|p| p.0 + 50.0 < right_edge));
    }

    #[test]
    fn flat_curve_selects_first_parallel_candidate() {
        let context = linear_context();
        let config = PlacementConfig::default();
        let curve = Curve::new(vec![(0.0, 5.0), (10.0, 5.0)]);
        let label = flat_label(&context);
        let track = reachable_anchors(
            &resample_curve(&curve, &context, config.resample_points),
            label.width(),
            label.height(),
            &context,
            &config,
        );
        let outcome = search_placement(&label, &track, &ShapeRegistry::new(), &context, &config);
        let best = outcome.best.expect("has candidates");
        assert!(best.cost < 1e-12);
        assert_eq!(best.rotation_deg, 0.0);
        assert!(!best.probe);
        let first = offset_point(
            track.display[0],
            label.height(),
            context.margin(config.margin_fraction),
            Side::Above,
        );
        assert_eq!(best.anchor, first);
        // no probe without obstacles
        assert_eq!(
            outcome.trace.candidates.len(),
            outcome.trace.anchors_sampled * config.rotation_offsets_deg.len()
        );
    }

    #[test]
    fn probe_leads_each_anchor_when_registry_is_populated() {
        let context = linear_context();
        let config = PlacementConfig::default();
        let curve = Curve::new(vec![(0.0, 5.0), (10.0, 5.0)]);
        let label = flat_label(&context);
        let track = reachable_anchors(
            &resample_curve(&curve, &context, config.resample_points),
            label.width(),
            label.height(),
            &context,
            &config,
        );
        let mut registry = ShapeRegistry::new();
        registry.register(Obstacle::Polyline(track.display.clone()));
        let outcome = search_placement(&label, &track, &registry, &context, &config);
        let per_anchor = config.rotation_offsets_deg.len() + 1;
        assert_eq!(outcome.trace.candidates.len(), outcome.trace.anchors_sampled * per_anchor);
        assert!(
            outcome
                .trace
                .candidates
                .iter()
                .step_by(per_anchor)
                .all(|candidate| candidate.probe && candidate.rotation_deg == 0.0)
        );
        let best = outcome.best.expect("has candidates");
        assert!(best.cost < SENTINEL_MAX);
    }

    #[test]
    fn all_rejected_keeps_first_candidate() {
        let context = linear_context();
        let config = PlacementConfig {
            rotation_offsets_deg: vec![-5.0, -10.0],
            ..PlacementConfig::default()
        };
        let curve = Curve::new(vec![(0.0, 5.0), (10.0, 5.0)]);
        let label = flat_label(&context);
        let track = reachable_anchors(
            &resample_curve(&curve, &context, config.resample_points),
            label.width(),
            label.height(),
            &context,
            &config,
        );
        let outcome = search_placement(&label, &track, &ShapeRegistry::new(), &context, &config);
        let best = outcome.best.expect("has candidates");
        assert_eq!(best.cost, SENTINEL_MAX);
        assert_eq!(Some(&best), outcome.trace.candidates.first());
        assert_eq!(outcome.trace.rejected().count(), outcome.trace.candidates.len());
    }
}
