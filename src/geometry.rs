// Geometry kernel for label placement: coordinate transforms, oriented
// rectangles, bounding-box containment, tangent estimation and the
// polygon/polyline distance queries used by the obstacle registry.
//
// Display space is y-up, in pixels, with the origin at the bottom-left of the
// figure. Every function here is pure.

use crate::error::PlacementError;
use serde::{Deserialize, Serialize};

pub type Point = (f64, f64);

const INTERSECT_EPS: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AngleUnit {
    Degrees,
    Radians,
}

impl AngleUnit {
    pub fn to_radians(self, angle: f64) -> f64 {
        match self {
            AngleUnit::Degrees => angle.to_radians(),
            AngleUnit::Radians => angle,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scale {
    #[default]
    Linear,
    Log,
}

impl Scale {
    /// Value in the axis' linear working space (`log10` for log axes).
    pub fn forward(self, value: f64) -> f64 {
        match self {
            Scale::Linear => value,
            Scale::Log => value.log10(),
        }
    }

    pub fn inverse(self, value: f64) -> f64 {
        match self {
            Scale::Linear => value,
            Scale::Log => 10f64.powf(value),
        }
    }

    pub fn is_log(self) -> bool {
        self == Scale::Log
    }
}

/// Axis-aligned bounds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub x_min: f64,
    pub x_max: f64,
    pub y_min: f64,
    pub y_max: f64,
}

impl Bounds {
    pub fn new(x_min: f64, x_max: f64, y_min: f64, y_max: f64) -> Self {
        Self {
            x_min,
            x_max,
            y_min,
            y_max,
        }
    }

    pub fn width(&self) -> f64 {
        self.x_max - self.x_min
    }

    pub fn height(&self) -> f64 {
        self.y_max - self.y_min
    }

    pub fn diagonal_squared(&self) -> f64 {
        self.width() * self.width() + self.height() * self.height()
    }

    /// Counter-clockwise corners starting at the bottom-left.
    pub fn corners(&self) -> [Point; 4] {
        [
            (self.x_min, self.y_min),
            (self.x_max, self.y_min),
            (self.x_max, self.y_max),
            (self.x_min, self.y_max),
        ]
    }
}

/// Data-to-display mapping of a single plot axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisTransform {
    x_limits: (f64, f64),
    y_limits: (f64, f64),
    x_scale: Scale,
    y_scale: Scale,
    extent: Bounds,
}

impl AxisTransform {
    /// `extent` is the display-space rectangle the data limits are mapped onto.
    pub fn new(
        x_limits: (f64, f64),
        y_limits: (f64, f64),
        x_scale: Scale,
        y_scale: Scale,
        extent: Bounds,
    ) -> Result<Self, PlacementError> {
        validate_limits("x", x_limits, x_scale)?;
        validate_limits("y", y_limits, y_scale)?;
        if !(extent.width() > 0.0 && extent.height() > 0.0) {
            return Err(PlacementError::Transform(format!(
                "axis extent must have a positive size, got {}x{}",
                extent.width(),
                extent.height()
            )));
        }
        Ok(Self {
            x_limits,
            y_limits,
            x_scale,
            y_scale,
            extent,
        })
    }

    pub fn x_limits(&self) -> (f64, f64) {
        self.x_limits
    }

    pub fn y_limits(&self) -> (f64, f64) {
        self.y_limits
    }

    pub fn x_scale(&self) -> Scale {
        self.x_scale
    }

    pub fn y_scale(&self) -> Scale {
        self.y_scale
    }

    /// Display-space rectangle of the axis.
    pub fn extent(&self) -> Bounds {
        self.extent
    }

    pub fn point_to_display(&self, point: Point) -> Point {
        let u = normalize(point.0, self.x_limits, self.x_scale);
        let v = normalize(point.1, self.y_limits, self.y_scale);
        (
            self.extent.x_min + u * self.extent.width(),
            self.extent.y_min + v * self.extent.height(),
        )
    }

    pub fn point_to_data(&self, point: Point) -> Point {
        let u = (point.0 - self.extent.x_min) / self.extent.width();
        let v = (point.1 - self.extent.y_min) / self.extent.height();
        (
            denormalize(u, self.x_limits, self.x_scale),
            denormalize(v, self.y_limits, self.y_scale),
        )
    }
}

fn validate_limits(axis: &str, limits: (f64, f64), scale: Scale) -> Result<(), PlacementError> {
    let (lo, hi) = limits;
    if !lo.is_finite() || !hi.is_finite() || lo == hi {
        return Err(PlacementError::Transform(format!(
            "{axis} limits ({lo}, {hi}) are degenerate"
        )));
    }
    if scale.is_log() && (lo <= 0.0 || hi <= 0.0) {
        return Err(PlacementError::Transform(format!(
            "{axis} limits ({lo}, {hi}) must be positive on a log axis"
        )));
    }
    Ok(())
}

fn normalize(value: f64, limits: (f64, f64), scale: Scale) -> f64 {
    let lo = scale.forward(limits.0);
    let hi = scale.forward(limits.1);
    (scale.forward(value) - lo) / (hi - lo)
}

fn denormalize(fraction: f64, limits: (f64, f64), scale: Scale) -> f64 {
    let lo = scale.forward(limits.0);
    let hi = scale.forward(limits.1);
    scale.inverse(lo + fraction * (hi - lo))
}

pub fn to_display(points: &[Point], transform: &AxisTransform) -> Vec<Point> {
    points
        .iter()
        .map(|point| transform.point_to_display(*point))
        .collect()
}

pub fn to_data(points: &[Point], transform: &AxisTransform) -> Vec<Point> {
    points
        .iter()
        .map(|point| transform.point_to_data(*point))
        .collect()
}

/// Corners of a rectangle rotated counter-clockwise about its un-rotated
/// bottom-left corner `anchor`.
pub fn rectangle_corners(
    anchor: Point,
    width: f64,
    height: f64,
    rotation: f64,
    unit: AngleUnit,
) -> [Point; 4] {
    let theta = unit.to_radians(rotation);
    let (sin, cos) = theta.sin_cos();
    let along = (width * cos, width * sin);
    // cos(θ + 90°) = -sin θ, sin(θ + 90°) = cos θ
    let up = (-height * sin, height * cos);
    [
        anchor,
        (anchor.0 + along.0, anchor.1 + along.1),
        (anchor.0 + along.0 + up.0, anchor.1 + along.1 + up.1),
        (anchor.0 + up.0, anchor.1 + up.1),
    ]
}

pub fn axis_aligned_bounds(points: &[Point]) -> Option<Bounds> {
    let first = points.first()?;
    let mut bounds = Bounds::new(first.0, first.0, first.1, first.1);
    for point in &points[1..] {
        bounds.x_min = bounds.x_min.min(point.0);
        bounds.x_max = bounds.x_max.max(point.0);
        bounds.y_min = bounds.y_min.min(point.1);
        bounds.y_max = bounds.y_max.max(point.1);
    }
    Some(bounds)
}

/// Whether the bounding box of `inner` lies strictly inside the bounding box of
/// `outer`. Rotated rectangles are compared through their bounding boxes only.
pub fn rect_contains_rect(outer: &[Point], inner: &[Point]) -> bool {
    let (Some(outer), Some(inner)) = (axis_aligned_bounds(outer), axis_aligned_bounds(inner))
    else {
        return false;
    };
    outer.x_min < inner.x_min
        && inner.x_max < outer.x_max
        && outer.y_min < inner.y_min
        && inner.y_max < outer.y_max
}

/// Local slope of a sampled curve in degrees, measured in physical (inch)
/// units of the figure so that it matches what is drawn.
///
/// Log axes are differenced in `log10` space. The final sample repeats the
/// angle of the segment before it.
pub fn local_tangent_angles(
    xs: &[f64],
    ys: &[f64],
    figure_size_in: (f64, f64),
    x_limits: (f64, f64),
    y_limits: (f64, f64),
    log_x: bool,
    log_y: bool,
) -> Vec<f64> {
    let n = xs.len().min(ys.len());
    let fx = |v: f64| if log_x { v.log10() } else { v };
    let fy = |v: f64| if log_y { v.log10() } else { v };
    let x_span = fx(x_limits.1) - fx(x_limits.0);
    let y_span = fy(y_limits.1) - fy(y_limits.0);

    let mut angles: Vec<f64> = Vec::with_capacity(n);
    for i in 0..n {
        let angle = if i + 1 < n {
            let dx = (fx(xs[i + 1]) - fx(xs[i])) * figure_size_in.0 / x_span;
            let dy = (fy(ys[i + 1]) - fy(ys[i])) * figure_size_in.1 / y_span;
            dy.atan2(dx).to_degrees()
        } else {
            angles.last().copied().unwrap_or(0.0)
        };
        angles.push(angle);
    }
    angles
}

pub fn point_segment_distance(point: Point, a: Point, b: Point) -> f64 {
    let dx = b.0 - a.0;
    let dy = b.1 - a.1;
    let len2 = dx * dx + dy * dy;
    if len2 <= f64::EPSILON {
        return ((point.0 - a.0).powi(2) + (point.1 - a.1).powi(2)).sqrt();
    }
    let t = (((point.0 - a.0) * dx + (point.1 - a.1) * dy) / len2).clamp(0.0, 1.0);
    let proj_x = a.0 + dx * t;
    let proj_y = a.1 + dy * t;
    ((point.0 - proj_x).powi(2) + (point.1 - proj_y).powi(2)).sqrt()
}

fn orientation(a: Point, b: Point, c: Point) -> f64 {
    (b.0 - a.0) * (c.1 - a.1) - (b.1 - a.1) * (c.0 - a.0)
}

fn point_on_segment(point: Point, a: Point, b: Point, eps: f64) -> bool {
    point.0 >= a.0.min(b.0) - eps
        && point.0 <= a.0.max(b.0) + eps
        && point.1 >= a.1.min(b.1) - eps
        && point.1 <= a.1.max(b.1) + eps
}

pub fn segments_intersect(a: Point, b: Point, c: Point, d: Point) -> bool {
    let eps = INTERSECT_EPS;
    let o1 = orientation(a, b, c);
    let o2 = orientation(a, b, d);
    let o3 = orientation(c, d, a);
    let o4 = orientation(c, d, b);
    let crosses = ((o1 > eps && o2 < -eps) || (o1 < -eps && o2 > eps))
        && ((o3 > eps && o4 < -eps) || (o3 < -eps && o4 > eps));
    if crosses {
        return true;
    }
    if o1.abs() <= eps && point_on_segment(c, a, b, eps) {
        return true;
    }
    if o2.abs() <= eps && point_on_segment(d, a, b, eps) {
        return true;
    }
    if o3.abs() <= eps && point_on_segment(a, c, d, eps) {
        return true;
    }
    if o4.abs() <= eps && point_on_segment(b, c, d, eps) {
        return true;
    }
    false
}

fn segment_segment_distance(a: Point, b: Point, c: Point, d: Point) -> f64 {
    if segments_intersect(a, b, c, d) {
        return 0.0;
    }
    point_segment_distance(a, c, d)
        .min(point_segment_distance(b, c, d))
        .min(point_segment_distance(c, a, b))
        .min(point_segment_distance(d, a, b))
}

/// Even-odd test; points on the boundary may land on either side.
pub fn point_in_polygon(point: Point, polygon: &[Point]) -> bool {
    let mut inside = false;
    let n = polygon.len();
    if n < 3 {
        return false;
    }
    let mut j = n - 1;
    for i in 0..n {
        let (xi, yi) = polygon[i];
        let (xj, yj) = polygon[j];
        if (yi > point.1) != (yj > point.1) {
            let x_cross = xi + (point.1 - yi) * (xj - xi) / (yj - yi);
            if point.0 < x_cross {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

fn polygon_edges(polygon: &[Point]) -> impl Iterator<Item = (Point, Point)> + '_ {
    let n = polygon.len();
    (0..n).map(move |i| (polygon[i], polygon[(i + 1) % n]))
}

fn polyline_segments(polyline: &[Point]) -> Vec<(Point, Point)> {
    match polyline.len() {
        0 => Vec::new(),
        1 => vec![(polyline[0], polyline[0])],
        _ => polyline.windows(2).map(|seg| (seg[0], seg[1])).collect(),
    }
}

/// True when the closed polygon and the open polyline share any point,
/// including the polyline lying entirely inside the polygon.
pub fn polygon_intersects_polyline(polygon: &[Point], polyline: &[Point]) -> bool {
    if polyline.is_empty() || polygon.is_empty() {
        return false;
    }
    if point_in_polygon(polyline[0], polygon) {
        return true;
    }
    let segments = polyline_segments(polyline);
    polygon_edges(polygon).any(|(a, b)| {
        segments
            .iter()
            .any(|(c, d)| segments_intersect(a, b, *c, *d))
    })
}

pub fn polygon_intersects_polygon(a: &[Point], b: &[Point]) -> bool {
    if a.is_empty() || b.is_empty() {
        return false;
    }
    if point_in_polygon(a[0], b) || point_in_polygon(b[0], a) {
        return true;
    }
    polygon_edges(a).any(|(p, q)| polygon_edges(b).any(|(r, s)| segments_intersect(p, q, r, s)))
}

/// Minimum distance between a closed polygon and an open polyline; zero when
/// they intersect.
pub fn polygon_polyline_distance(polygon: &[Point], polyline: &[Point]) -> f64 {
    if polygon.is_empty() || polyline.is_empty() {
        return f64::INFINITY;
    }
    if polygon_intersects_polyline(polygon, polyline) {
        return 0.0;
    }
    let segments = polyline_segments(polyline);
    let mut best = f64::INFINITY;
    for (a, b) in polygon_edges(polygon) {
        for (c, d) in &segments {
            best = best.min(segment_segment_distance(a, b, *c, *d));
        }
    }
    best
}

pub fn polygon_polygon_distance(a: &[Point], b: &[Point]) -> f64 {
    if a.is_empty() || b.is_empty() {
        return f64::INFINITY;
    }
    if polygon_intersects_polygon(a, b) {
        return 0.0;
    }
    let mut best = f64::INFINITY;
    for (p, q) in polygon_edges(a) {
        for (r, s) in polygon_edges(b) {
            best = best.min(segment_segment_distance(p, q, r, s));
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    fn log_log_transform() -> AxisTransform {
        AxisTransform::new(
            (1.0, 100.0),
            (1e-45, 1e-38),
            Scale::Log,
            Scale::Log,
            Bounds::new(100.0, 800.0, 50.0, 600.0),
        )
        .expect("valid transform")
    }

    #[test]
    fn transform_maps_limits_onto_extent() {
        let transform = log_log_transform();
        let lower = transform.point_to_display((1.0, 1e-45));
        let upper = transform.point_to_display((100.0, 1e-38));
        assert!((lower.0 - 100.0).abs() < 1e-9 && (lower.1 - 50.0).abs() < 1e-9);
        assert!((upper.0 - 800.0).abs() < 1e-9 && (upper.1 - 600.0).abs() < 1e-9);
        let middle = transform.point_to_display((10.0, 1e-40));
        assert!((middle.0 - 450.0).abs() < 1e-9, "decade midpoint, got {}", middle.0);
    }

    #[test]
    fn transform_rejects_non_positive_log_limits() {
        let err = AxisTransform::new(
            (0.0, 10.0),
            (1.0, 2.0),
            Scale::Log,
            Scale::Linear,
            Bounds::new(0.0, 1.0, 0.0, 1.0),
        );
        assert!(matches!(err, Err(PlacementError::Transform(_))));
    }

    #[test]
    fn corners_at_zero_rotation_are_axis_aligned() {
        let corners = rectangle_corners((1.0, 2.0), 4.0, 3.0, 0.0, AngleUnit::Degrees);
        let expected = [(1.0, 2.0), (5.0, 2.0), (5.0, 5.0), (1.0, 5.0)];
        for (got, want) in corners.iter().zip(expected.iter()) {
            assert!((got.0 - want.0).abs() < 1e-12 && (got.1 - want.1).abs() < 1e-12);
        }
    }

    #[test]
    fn corners_accept_radians_and_degrees_alike() {
        let deg = rectangle_corners((0.0, 0.0), 5.0, 1.0, 30.0, AngleUnit::Degrees);
        let rad = rectangle_corners(
            (0.0, 0.0),
            5.0,
            1.0,
            30f64.to_radians(),
            AngleUnit::Radians,
        );
        for (a, b) in deg.iter().zip(rad.iter()) {
            assert!((a.0 - b.0).abs() < 1e-12 && (a.1 - b.1).abs() < 1e-12);
        }
    }

    #[test]
    fn containment_uses_bounding_boxes() {
        let axis = Bounds::new(0.0, 100.0, 0.0, 100.0).corners();
        let inner = rectangle_corners((10.0, 10.0), 20.0, 5.0, 45.0, AngleUnit::Degrees);
        assert!(rect_contains_rect(&axis, &inner));
        let poking_out = rectangle_corners((90.0, 10.0), 20.0, 5.0, 0.0, AngleUnit::Degrees);
        assert!(!rect_contains_rect(&axis, &poking_out));
        // A diamond whose corners all sit inside a square can still fail the
        // test when its bounding box reaches the edge.
        let diamond = [(50.0, 0.0), (100.0, 50.0), (50.0, 100.0), (0.0, 50.0)];
        assert!(!rect_contains_rect(&axis, &diamond));
    }

    #[test]
    fn tangent_angles_follow_log_log_slope() {
        // y = x^-2 is a straight line in log-log space.
        let xs = [1.0, 10.0, 100.0];
        let ys = [1e-40, 1e-42, 1e-44];
        let angles = local_tangent_angles(&xs, &ys, (7.0, 7.0), (1.0, 100.0), (1e-45, 1e-38), true, true);
        // Δx = 1 decade of 2 → 3.5in, Δy = -2 decades of 7 → -2in
        let expected = (-2.0f64).atan2(3.5).to_degrees();
        assert_eq!(angles.len(), 3);
        for angle in &angles {
            assert!((angle - expected).abs() < 1e-9, "got {angle}, want {expected}");
        }
    }

    #[test]
    fn tangent_angles_account_for_aspect_ratio() {
        let xs = [0.0, 1.0];
        let ys = [0.0, 1.0];
        let square = local_tangent_angles(&xs, &ys, (4.0, 4.0), (0.0, 1.0), (0.0, 1.0), false, false);
        let wide = local_tangent_angles(&xs, &ys, (8.0, 4.0), (0.0, 1.0), (0.0, 1.0), false, false);
        assert!((square[0] - 45.0).abs() < 1e-9);
        assert!(wide[0] < square[0]);
        assert_eq!(wide[1], wide[0]);
    }

    #[test]
    fn polyline_through_polygon_has_zero_distance() {
        let square = Bounds::new(10.0, 30.0, 10.0, 30.0).corners();
        let line = [(0.0, 20.0), (40.0, 20.0)];
        assert!(polygon_intersects_polyline(&square, &line));
        assert_eq!(polygon_polyline_distance(&square, &line), 0.0);
    }

    #[test]
    fn polyline_clear_of_polygon_reports_gap() {
        let square = Bounds::new(10.0, 30.0, 10.0, 30.0).corners();
        let line = [(0.0, 40.0), (40.0, 40.0)];
        assert!(!polygon_intersects_polyline(&square, &line));
        assert!((polygon_polyline_distance(&square, &line) - 10.0).abs() < 1e-9);
    }

    #[test]
    fn nested_polygons_intersect() {
        let outer = Bounds::new(0.0, 100.0, 0.0, 100.0).corners();
        let inner = Bounds::new(40.0, 60.0, 40.0, 60.0).corners();
        assert!(polygon_intersects_polygon(&outer, &inner));
        assert_eq!(polygon_polygon_distance(&inner, &outer), 0.0);
        let apart = Bounds::new(70.0, 80.0, 40.0, 60.0).corners();
        assert!((polygon_polygon_distance(&inner, &apart) - 10.0).abs() < 1e-9);
    }

    #[test]
    fn bounds_of_empty_slice_is_none() {
        assert!(axis_aligned_bounds(&[]).is_none());
        let bounds = axis_aligned_bounds(&[(3.0, -1.0), (-2.0, 4.0)]).expect("bounds");
        assert_eq!(bounds, Bounds::new(-2.0, 3.0, -1.0, 4.0));
    }
}
