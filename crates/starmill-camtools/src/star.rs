//! Star outline toolpath.
//!
//! A star with `points` tips is traced through `2 * points` vertices that
//! alternate between the inner and outer radius. Vertex `i` sits at angle
//! `i * PI / points`, so the `2 * points` steps sweep one full turn. The
//! outline is closed by repeating the first vertex.

use crate::error::{CamToolResult, ParameterError};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::iter::FusedIterator;

/// A point in the XY plane (mm).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Parameters of a star outline. Cheap to copy; every call to
/// [`StarOutline::iter`] replays the same vertex sequence.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StarOutline {
    points: u32,
    inner_radius: f64,
    outer_radius: f64,
    center_offset: f64,
}

impl StarOutline {
    /// Create a validated star outline.
    ///
    /// `center_offset` translates every vertex by the same amount on both
    /// X and Y.
    pub fn new(
        points: u32,
        inner_radius: f64,
        outer_radius: f64,
        center_offset: f64,
    ) -> CamToolResult<Self> {
        if points < 3 {
            return Err(ParameterError::OutOfRange {
                name: "points".to_string(),
                value: points.to_string(),
                expected: ">= 3".to_string(),
            }
            .into());
        }
        for (name, value) in [
            ("inner_radius", inner_radius),
            ("outer_radius", outer_radius),
            ("center_offset", center_offset),
        ] {
            if !value.is_finite() {
                return Err(ParameterError::NotFinite(name.to_string()).into());
            }
        }
        if inner_radius <= 0.0 {
            return Err(ParameterError::OutOfRange {
                name: "inner_radius".to_string(),
                value: inner_radius.to_string(),
                expected: "> 0".to_string(),
            }
            .into());
        }
        if inner_radius >= outer_radius {
            return Err(ParameterError::OutOfRange {
                name: "outer_radius".to_string(),
                value: outer_radius.to_string(),
                expected: format!("> inner_radius ({})", inner_radius),
            }
            .into());
        }

        Ok(Self {
            points,
            inner_radius,
            outer_radius,
            center_offset,
        })
    }

    pub fn points(&self) -> u32 {
        self.points
    }

    pub fn inner_radius(&self) -> f64 {
        self.inner_radius
    }

    pub fn outer_radius(&self) -> f64 {
        self.outer_radius
    }

    pub fn center_offset(&self) -> f64 {
        self.center_offset
    }

    /// Number of coordinates in the closed outline: `2 * points + 1`.
    pub fn len(&self) -> usize {
        2 * self.points as usize + 1
    }

    /// Always false; a validated star has at least seven vertices.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Vertex `index` of the open outline, for `index` in `0..2 * points`.
    ///
    /// Even indices lie on the inner radius, odd indices on the outer one.
    pub fn vertex(&self, index: u32) -> Point {
        let radius = if index % 2 == 0 {
            self.inner_radius
        } else {
            self.outer_radius
        };
        let angle = index as f64 * PI / self.points as f64;
        Point::new(
            angle.cos() * radius + self.center_offset,
            angle.sin() * radius + self.center_offset,
        )
    }

    /// The first vertex, where the tool enters and leaves the outline.
    pub fn start(&self) -> Point {
        self.vertex(0)
    }

    /// Lazily walk the closed outline.
    pub fn iter(&self) -> StarVertices {
        StarVertices {
            outline: *self,
            next: 0,
        }
    }
}

impl IntoIterator for StarOutline {
    type Item = Point;
    type IntoIter = StarVertices;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl IntoIterator for &StarOutline {
    type Item = Point;
    type IntoIter = StarVertices;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over the closed outline of a [`StarOutline`].
#[derive(Debug, Clone)]
pub struct StarVertices {
    outline: StarOutline,
    next: u32,
}

impl Iterator for StarVertices {
    type Item = Point;

    fn next(&mut self) -> Option<Point> {
        let open_len = 2 * self.outline.points;
        let point = match self.next {
            i if i < open_len => self.outline.vertex(i),
            i if i == open_len => self.outline.start(),
            _ => return None,
        };
        self.next += 1;
        Some(point)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.outline.len().saturating_sub(self.next as usize);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for StarVertices {}

impl FusedIterator for StarVertices {}

/// Build a closed star outline. See [`StarOutline::new`].
pub fn star_outline(
    points: u32,
    inner_radius: f64,
    outer_radius: f64,
    center_offset: f64,
) -> CamToolResult<StarOutline> {
    StarOutline::new(points, inner_radius, outer_radius, center_offset)
}
