//! Bullet kinematics and culling
//!
//! Each bullet integrates over the time since its own last update rather than
//! a shared frame delta, so bullets fired mid-frame or updated on a different
//! cadence still move the right distance.

use glam::Vec2;

use super::pool::{Bullet, BulletPool};

/// Axis-aligned region bullets must stay inside
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min: Vec2,
    pub max: Vec2,
}

impl Bounds {
    /// The playfield grown by `margin` on every side
    pub fn view(margin: f32) -> Self {
        use crate::consts::{VIEW_HEIGHT, VIEW_WIDTH};
        Self {
            min: Vec2::splat(-margin),
            max: Vec2::new(VIEW_WIDTH + margin, VIEW_HEIGHT + margin),
        }
    }

    #[inline]
    pub fn contains(&self, p: Vec2) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.y >= self.min.y && p.y <= self.max.y
    }
}

/// Integrate, drift and cull a bullet collection.
///
/// `now` is the host clock in ms and `wind` a horizontal drift in px/s.
/// Bullets outside `bounds` or whose age has reached `max_age` are returned
/// to `pool`. Returns the number removed.
pub fn advance(
    bullets: &mut Vec<Bullet>,
    pool: &mut BulletPool,
    now: f64,
    bounds: &Bounds,
    wind: f32,
) -> usize {
    let mut removed = 0;
    // Backward so removal never skips the next element
    for i in (0..bullets.len()).rev() {
        let b = &mut bullets[i];
        let dt = ((now - b.updated_at).max(0.0) / 1000.0) as f32;
        b.pos += b.vel * dt;
        b.pos.x += wind * dt;
        b.updated_at = now;

        if !bounds.contains(b.pos) || b.age(now) >= b.max_age {
            let dead = bullets.remove(i);
            pool.release(dead);
            removed += 1;
        }
    }
    removed
}
