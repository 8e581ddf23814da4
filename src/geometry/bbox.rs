//! Axis-aligned bounding boxes and segment clipping.

use super::{add, scale, sub};

/// Axis-aligned box `[min, max]`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    pub min: [f64; 3],
    pub max: [f64; 3],
}

impl BoundingBox {
    /// Box centered on `center` with full side lengths `lengths`.
    pub fn centered(center: [f64; 3], lengths: [f64; 3]) -> Self {
        let half = scale(lengths, 0.5);
        Self {
            min: sub(center, half),
            max: add(center, half),
        }
    }

    /// Inclusive containment test.
    #[inline]
    pub fn contains(&self, p: [f64; 3]) -> bool {
        (0..3).all(|k| p[k] >= self.min[k] && p[k] <= self.max[k])
    }

    /// Clamp a point into the box, coordinate-wise.
    #[inline]
    pub fn clamp(&self, p: [f64; 3]) -> [f64; 3] {
        [
            p[0].clamp(self.min[0], self.max[0]),
            p[1].clamp(self.min[1], self.max[1]),
            p[2].clamp(self.min[2], self.max[2]),
        ]
    }

    /// End of the segment `start -> end` truncated at the box boundary.
    ///
    /// `start` must lie inside the box. Returns `end` when it is inside too,
    /// otherwise the point where the segment exits the box.
    pub fn clip_segment_from_inside(&self, start: [f64; 3], end: [f64; 3]) -> [f64; 3] {
        if self.contains(end) {
            return end;
        }
        let d = sub(end, start);
        let mut t_exit = 1.0f64;
        for k in 0..3 {
            let t = if d[k] > 0.0 {
                (self.max[k] - start[k]) / d[k]
            } else if d[k] < 0.0 {
                (self.min[k] - start[k]) / d[k]
            } else {
                continue;
            };
            t_exit = t_exit.min(t);
        }
        self.clamp(add(start, scale(d, t_exit.max(0.0))))
    }
}
