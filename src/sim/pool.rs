//! Bullet records and their free-list pool
//!
//! Bullets are plain values moved between a live collection and the pool.
//! Ownership guarantees a released record can never be read through its old
//! collection; `release` additionally wipes every field so nothing leaks into
//! the next `acquire`.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::consts::BULLET_MAX_AGE_MS;

/// Who fired a bullet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BulletOwner {
    /// Reset / not yet assigned
    #[default]
    Unowned,
    Player,
    Enemy,
    Boss,
}

/// A pooled projectile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bullet {
    pub pos: Vec2,
    pub vel: Vec2,
    pub r: f32,
    pub damage: f32,
    /// Host clock (ms) when fired
    pub born_at: f64,
    /// Host clock (ms) of the last integration step
    pub updated_at: f64,
    pub max_age: f64,
    pub owner: BulletOwner,
    /// Palette index for the renderer
    pub colour: u32,
    /// Weapon level that produced the shot (player bullets)
    pub level: u8,
}

impl Default for Bullet {
    fn default() -> Self {
        Self {
            pos: Vec2::ZERO,
            vel: Vec2::ZERO,
            r: 0.0,
            damage: 0.0,
            born_at: 0.0,
            updated_at: 0.0,
            max_age: BULLET_MAX_AGE_MS,
            owner: BulletOwner::Unowned,
            colour: 0,
            level: 0,
        }
    }
}

impl Bullet {
    /// Restore every field to its default
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Age at host time `now` (ms)
    #[inline]
    pub fn age(&self, now: f64) -> f64 {
        now - self.born_at
    }
}

/// Free list of bullet records
#[derive(Debug, Default, Clone)]
pub struct BulletPool {
    free: Vec<Bullet>,
    /// Records created fresh because the free list was empty
    allocated: usize,
}

impl BulletPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take a reset record, reusing one from the free list when possible
    pub fn acquire(&mut self) -> Bullet {
        match self.free.pop() {
            Some(bullet) => bullet,
            None => {
                self.allocated += 1;
                Bullet::default()
            }
        }
    }

    /// Wipe a record and return it to the free list
    pub fn release(&mut self, mut bullet: Bullet) {
        bullet.reset();
        self.free.push(bullet);
    }

    /// Drain a live collection back into the pool
    pub fn release_all(&mut self, bullets: &mut Vec<Bullet>) {
        for bullet in bullets.drain(..) {
            self.release(bullet);
        }
    }

    /// Acquire a record and stamp it as freshly fired
    #[allow(clippy::too_many_arguments)]
    pub fn fire(
        &mut self,
        owner: BulletOwner,
        pos: Vec2,
        vel: Vec2,
        r: f32,
        damage: f32,
        now: f64,
        colour: u32,
    ) -> Bullet {
        let mut bullet = self.acquire();
        bullet.owner = owner;
        bullet.pos = pos;
        bullet.vel = vel;
        bullet.r = r;
        bullet.damage = damage;
        bullet.born_at = now;
        bullet.updated_at = now;
        bullet.colour = colour;
        bullet
    }

    /// Records waiting for reuse
    pub fn free_len(&self) -> usize {
        self.free.len()
    }

    /// Records ever created by this pool
    pub fn allocated(&self) -> usize {
        self.allocated
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_acquire_reuses_released_record() {
        let mut pool = BulletPool::new();
        let b = pool.fire(
            BulletOwner::Boss,
            Vec2::new(1.0, 2.0),
            Vec2::new(3.0, 4.0),
            6.0,
            2.0,
            500.0,
            7,
        );
        assert_eq!(pool.allocated(), 1);
        pool.release(b);
        assert_eq!(pool.free_len(), 1);

        let again = pool.acquire();
        assert_eq!(pool.allocated(), 1);
        assert_eq!(again, Bullet::default());
    }

    #[test]
    fn test_release_all_drains_collection() {
        let mut pool = BulletPool::new();
        let mut live: Vec<Bullet> = (0..5).map(|_| pool.acquire()).collect();
        pool.release_all(&mut live);
        assert!(live.is_empty());
        assert_eq!(pool.free_len(), 5);
    }

    proptest! {
        #[test]
        fn prop_recycled_bullets_never_leak_fields(
            ops in prop::collection::vec((any::<bool>(), -1e4f32..1e4, 0u32..16, 0u8..5), 1..64)
        ) {
            let mut pool = BulletPool::new();
            let mut live: Vec<Bullet> = Vec::new();
            for (release, v, colour, level) in ops {
                if release && !live.is_empty() {
                    let b = live.swap_remove(0);
                    pool.release(b);
                } else {
                    let fresh = pool.acquire();
                    prop_assert_eq!(&fresh, &Bullet::default());
                    let mut b = pool.fire(BulletOwner::Enemy, Vec2::splat(v), Vec2::splat(-v), 3.0, v, v as f64, colour);
                    b.level = level;
                    pool.release(fresh);
                    live.push(b);
                }
            }
        }
    }
}
