use crate::error::PlacementError;
use crate::geometry::{
    AngleUnit, AxisTransform, Bounds, Point, rect_contains_rect, rectangle_corners, to_data,
};
use crate::placement::registry::ShapeRegistry;
use crate::text_metrics::TextMeasure;

/// Coordinate space of a point handed to or read from a [`Label`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Space {
    Data,
    Display,
}

/// A rotated text box. Geometry is held in display space; the polygon is
/// recomputed whenever anchor, rotation or size change.
#[derive(Debug, Clone, PartialEq)]
pub struct Label {
    anchor: Point,
    rotation_deg: f64,
    width: f64,
    height: f64,
    polygon: [Point; 4],
    text: Option<String>,
    font_size: Option<f64>,
}

impl Label {
    /// A box of known display size, e.g. for tests or pre-measured text.
    pub fn from_explicit(
        anchor: Point,
        rotation_deg: f64,
        width: f64,
        height: f64,
        space: Space,
        transform: &AxisTransform,
    ) -> Self {
        let anchor = match space {
            Space::Data => transform.point_to_display(anchor),
            Space::Display => anchor,
        };
        Self {
            anchor,
            rotation_deg,
            width,
            height,
            polygon: rectangle_corners(anchor, width, height, rotation_deg, AngleUnit::Degrees),
            text: None,
            font_size: None,
        }
    }

    pub fn from_measured_text(
        text: &str,
        font_size: f64,
        anchor: Point,
        rotation_deg: f64,
        space: Space,
        transform: &AxisTransform,
        measurer: &dyn TextMeasure,
    ) -> Result<Self, PlacementError> {
        let extent = measurer.measure(text, font_size)?;
        let mut label = Self::from_explicit(
            anchor,
            rotation_deg,
            extent.width,
            extent.height,
            space,
            transform,
        );
        label.text = Some(text.to_string());
        label.font_size = Some(font_size);
        Ok(label)
    }

    pub fn anchor(&self, space: Space, transform: &AxisTransform) -> Point {
        match space {
            Space::Data => transform.point_to_data(self.anchor),
            Space::Display => self.anchor,
        }
    }

    pub fn set_anchor(&mut self, anchor: Point, space: Space, transform: &AxisTransform) {
        self.anchor = match space {
            Space::Data => transform.point_to_display(anchor),
            Space::Display => anchor,
        };
        self.refresh();
    }

    pub fn rotation_deg(&self) -> f64 {
        self.rotation_deg
    }

    pub fn set_rotation(&mut self, rotation: f64, unit: AngleUnit) {
        self.rotation_deg = match unit {
            AngleUnit::Degrees => rotation,
            AngleUnit::Radians => rotation.to_degrees(),
        };
        self.refresh();
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    pub fn height(&self) -> f64 {
        self.height
    }

    pub fn set_size(&mut self, width: f64, height: f64) {
        self.width = width;
        self.height = height;
        self.refresh();
    }

    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    pub fn font_size(&self) -> Option<f64> {
        self.font_size
    }

    /// Re-measure the text at `font_size`. Labels without text keep their
    /// size and return `false`.
    pub fn remeasure(
        &mut self,
        font_size: f64,
        measurer: &dyn TextMeasure,
    ) -> Result<bool, PlacementError> {
        let Some(text) = self.text.as_deref() else {
            return Ok(false);
        };
        let extent = measurer.measure(text, font_size)?;
        self.font_size = Some(font_size);
        self.set_size(extent.width, extent.height);
        Ok(true)
    }

    /// Display-space corners, counter-clockwise from the anchor.
    pub fn polygon(&self) -> &[Point; 4] {
        &self.polygon
    }

    pub fn corners_in(&self, space: Space, transform: &AxisTransform) -> [Point; 4] {
        match space {
            Space::Display => self.polygon,
            Space::Data => {
                let data = to_data(&self.polygon, transform);
                [data[0], data[1], data[2], data[3]]
            }
        }
    }

    /// Whether the label's bounding box lies strictly inside `axis`, both
    /// given in `space`.
    pub fn inside_axis(&self, axis: &Bounds, space: Space, transform: &AxisTransform) -> bool {
        rect_contains_rect(&axis.corners(), &self.corners_in(space, transform))
    }

    /// How far the label's horizontal span overhangs the ends of the curve,
    /// as a fraction of the label's own span. Each end contributes at most 1;
    /// a degenerate span counts as fully off the curve.
    pub fn fraction_off_curve_domain(&self, curve_display: &[Point]) -> f64 {
        let (Some(first), Some(last)) = (curve_display.first(), curve_display.last()) else {
            return 2.0;
        };
        let xs = self.polygon.map(|(x, _)| x);
        let x_min = xs.iter().copied().fold(f64::INFINITY, f64::min);
        let x_max = xs.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let span = x_max - x_min;
        if span <= f64::EPSILON {
            return 2.0;
        }
        let left = ((first.0 - x_min) / span).clamp(0.0, 1.0);
        let right = ((x_max - last.0) / span).clamp(0.0, 1.0);
        left + right
    }

    pub fn intersects_any(&self, registry: &ShapeRegistry) -> bool {
        registry.intersects_any(&self.polygon)
    }

    fn refresh(&mut self) {
        self.polygon = rectangle_corners(
            self.anchor,
            self.width,
            self.height,
            self.rotation_deg,
            AngleUnit::Degrees,
        );
    }
}
