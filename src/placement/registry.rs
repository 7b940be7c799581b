use crate::geometry::{
    Bounds, Point, axis_aligned_bounds, polygon_intersects_polygon, polygon_intersects_polyline,
    polygon_polygon_distance, polygon_polyline_distance,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObstacleKind {
    Polyline,
    Polygon,
}

/// A plotted shape in display space that labels must avoid.
#[derive(Debug, Clone, PartialEq)]
pub enum Obstacle {
    /// A drawn curve.
    Polyline(Vec<Point>),
    /// An already-positioned label.
    Polygon(Vec<Point>),
}

impl Obstacle {
    pub fn kind(&self) -> ObstacleKind {
        match self {
            Self::Polyline(_) => ObstacleKind::Polyline,
            Self::Polygon(_) => ObstacleKind::Polygon,
        }
    }

    pub fn points(&self) -> &[Point] {
        match self {
            Self::Polyline(points) | Self::Polygon(points) => points,
        }
    }

    /// Shortest distance to `polygon`; zero when they touch or overlap.
    pub fn distance_to(&self, polygon: &[Point]) -> f64 {
        match self {
            Self::Polyline(points) => polygon_polyline_distance(polygon, points),
            Self::Polygon(points) => polygon_polygon_distance(polygon, points),
        }
    }

    pub fn intersects(&self, polygon: &[Point]) -> bool {
        match self {
            Self::Polyline(points) => polygon_intersects_polyline(polygon, points),
            Self::Polygon(points) => polygon_intersects_polygon(polygon, points),
        }
    }
}

#[derive(Debug, Clone)]
struct Entry {
    obstacle: Obstacle,
    bounds: Option<Bounds>,
}

/// Ordered collection of obstacles; rebuilt before every label placement.
#[derive(Debug, Clone, Default)]
pub struct ShapeRegistry {
    entries: Vec<Entry>,
}

impl ShapeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Non-finite vertices (log of a non-positive value) are dropped.
    pub fn register(&mut self, obstacle: Obstacle) {
        let obstacle = match obstacle {
            Obstacle::Polyline(points) => Obstacle::Polyline(finite(points)),
            Obstacle::Polygon(points) => Obstacle::Polygon(finite(points)),
        };
        if obstacle.points().is_empty() {
            return;
        }
        let bounds = axis_aligned_bounds(obstacle.points());
        self.entries.push(Entry { obstacle, bounds });
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn all(&self) -> impl Iterator<Item = &Obstacle> + '_ {
        self.entries.iter().map(|entry| &entry.obstacle)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Distance from `polygon` to the closest obstacle of one of `kinds`, or
    /// infinity when none is registered.
    pub fn distance_to_nearest(&self, polygon: &[Point], kinds: &[ObstacleKind]) -> f64 {
        self.all()
            .filter(|obstacle| kinds.contains(&obstacle.kind()))
            .map(|obstacle| obstacle.distance_to(polygon))
            .fold(f64::INFINITY, f64::min)
    }

    pub fn intersects_any(&self, polygon: &[Point]) -> bool {
        let Some(probe) = axis_aligned_bounds(polygon) else {
            return false;
        };
        self.entries.iter().any(|entry| {
            entry
                .bounds
                .is_some_and(|bounds| overlaps(&bounds, &probe))
                && entry.obstacle.intersects(polygon)
        })
    }

    /// Mean of `exp(-d^2 / norm)` over all obstacles, `d` being the distance
    /// from `polygon` to each. Zero for an empty registry.
    pub fn repulsion(&self, polygon: &[Point], norm: f64) -> f64 {
        if self.entries.is_empty() || norm <= 0.0 {
            return 0.0;
        }
        let total: f64 = self
            .all()
            .map(|obstacle| {
                let d = obstacle.distance_to(polygon);
                (-(d * d) / norm).exp()
            })
            .sum();
        total / self.entries.len() as f64
    }
}

fn finite(points: Vec<Point>) -> Vec<Point> {
    points
        .into_iter()
        .filter(|(x, y)| x.is_finite() && y.is_finite())
        .collect()
}

fn overlaps(a: &Bounds, b: &Bounds) -> bool {
    a.x_min <= b.x_max && b.x_min <= a.x_max && a.y_min <= b.y_max && b.y_min <= a.y_max
}
