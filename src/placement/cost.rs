use crate::config::Side;
use crate::geometry::{Bounds, Point, rect_contains_rect};
use crate::placement::SENTINEL_MAX;
use crate::placement::label::Label;
use crate::placement::registry::ShapeRegistry;

/// Candidates overhanging the curve's x-domain by more than this fraction of
/// their span are rejected.
pub const MAX_FRACTION_OFF_CURVE: f64 = 2.0 / 3.0;

/// Tolerance in display pixels before a baseline dipping past the curve
/// counts as a crossing.
const CROSSING_TOLERANCE_PX: f64 = 1e-6;

/// Why a candidate scored [`SENTINEL_MAX`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    OutsideAxis,
    OffCurveDomain,
    IntersectsObstacle,
    CrossesCurve,
    NoCurveUnderLabel,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Evaluation {
    pub cost: f64,
    pub rejection: Option<Rejection>,
}

impl Evaluation {
    fn accepted(cost: f64) -> Self {
        Self {
            cost,
            rejection: None,
        }
    }

    fn rejected(reason: Rejection) -> Self {
        Self {
            cost: SENTINEL_MAX,
            rejection: Some(reason),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CurveFollowing {
    /// Mean squared gap between baseline and curve, normalised by the
    /// label's larger side.
    Gap(f64),
    NoSamples,
    Crossed,
}

/// Everything the cost of one candidate depends on besides the label.
pub struct CostFunction<'a> {
    /// Resampled curve in display space.
    pub curve: &'a [Point],
    /// `curve` shifted by the label margin; the baseline is compared to this.
    pub offset_curve: &'a [Point],
    pub registry: &'a ShapeRegistry,
    pub axis: Bounds,
    pub side: Side,
    pub follow_every: usize,
    pub allow_curve_crossing: bool,
    pub probe_fraction: f64,
}

impl CostFunction<'_> {
    /// Score a candidate. `probe` marks the zero-rotation candidate whose
    /// curve term is replaced by a fraction of its repulsion.
    pub fn evaluate(&self, label: &Label, probe: bool) -> Evaluation {
        if !rect_contains_rect(&self.axis.corners(), label.polygon()) {
            return Evaluation::rejected(Rejection::OutsideAxis);
        }
        if label.fraction_off_curve_domain(self.curve) > MAX_FRACTION_OFF_CURVE {
            return Evaluation::rejected(Rejection::OffCurveDomain);
        }
        if label.intersects_any(self.registry) {
            return Evaluation::rejected(Rejection::IntersectsObstacle);
        }

        let following = curve_following(
            label,
            self.offset_curve,
            self.side,
            self.follow_every,
            self.allow_curve_crossing,
        );
        let repulsion = self
            .registry
            .repulsion(label.polygon(), self.axis.diagonal_squared());

        match (following, probe) {
            (CurveFollowing::Crossed, _) => Evaluation::rejected(Rejection::CrossesCurve),
            (_, true) => Evaluation::accepted((self.probe_fraction * repulsion + repulsion) / 2.0),
            (CurveFollowing::NoSamples, false) => {
                Evaluation::rejected(Rejection::NoCurveUnderLabel)
            }
            (CurveFollowing::Gap(gap), false) => Evaluation::accepted((gap + repulsion) / 2.0),
        }
    }
}

/// Compare the label's baseline with every `follow_every`-th curve sample
/// strictly inside its horizontal span.
pub fn curve_following(
    label: &Label,
    offset_curve: &[Point],
    side: Side,
    follow_every: usize,
    allow_crossing: bool,
) -> CurveFollowing {
    let (x0, y0) = label.polygon()[0];
    let theta = label.rotation_deg().to_radians();
    let x_end = x0 + label.width() * theta.cos();
    let (lo, hi) = if x_end >= x0 { (x0, x_end) } else { (x_end, x0) };
    let slope = theta.tan();
    let norm = label.width().max(label.height()).powi(2);

    let mut sum = 0.0;
    let mut count = 0usize;
    for &(x, y) in offset_curve.iter().step_by(follow_every.max(1)) {
        if !(lo < x && x < hi) {
            continue;
        }
        let baseline = (x - x0) * slope + y0;
        let crossed = match side {
            Side::Above => baseline < y - CROSSING_TOLERANCE_PX,
            Side::Below => baseline > y + CROSSING_TOLERANCE_PX,
        };
        if crossed && !allow_crossing {
            return CurveFollowing::Crossed;
        }
        sum += (baseline - y).powi(2);
        count += 1;
    }
    if count == 0 || norm <= 0.0 {
        CurveFollowing::NoSamples
    } else {
        CurveFollowing::Gap(sum / norm / count as f64)
    }
}
