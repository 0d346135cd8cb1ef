//! Particle burst played after a collision.

use rand::Rng;

use crate::grid::Cell;

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Particle {
    /// Position in grid units; cell centers sit at `.5`.
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    pub life: f32,
}

impl Particle {
    pub fn is_alive(&self) -> bool { self.life > 0.0 }
}

/// Fastest a particle may start, in cells per frame.
pub const MAX_PARTICLE_SPEED: f32 = 1.0;

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ParticleSettings {
    pub count: usize,
    /// Each velocity component is drawn from `[-speed, speed)`.
    pub speed: f32,
    pub damping: f32,
    pub decay: f32,
    pub max_frames: u32,
}

impl Default for ParticleSettings {
    fn default() -> Self {
        Self { count: 15, speed: 0.2, damping: 0.98, decay: 0.025, max_frames: 60 }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct DeathAnimation {
    pub frame: u32,
    pub max_frames: u32,
    pub impact: Cell,
    pub particles: Vec<Particle>,
    damping: f32,
    decay: f32,
}

impl DeathAnimation {
    pub fn new<R: Rng + ?Sized>(impact: Cell, settings: ParticleSettings, rng: &mut R) -> Self {
        let cx = impact.x as f32 + 0.5;
        let cy = impact.y as f32 + 0.5;
        let speed = settings.speed.abs().min(MAX_PARTICLE_SPEED);
        let particles = (0..settings.count)
            .map(|_| Particle {
                x: cx,
                y: cy,
                vx: if speed > 0.0 { rng.gen_range(-speed..speed) } else { 0.0 },
                vy: if speed > 0.0 { rng.gen_range(-speed..speed) } else { 0.0 },
                life: 1.0,
            })
            .collect();
        Self {
            frame: 0,
            max_frames: settings.max_frames,
            impact,
            particles,
            damping: settings.damping,
            decay: settings.decay,
        }
    }

    /// Advances one frame. Returns true once the final frame is reached.
    pub fn advance(&mut self) -> bool {
        for p in self.particles.iter_mut().filter(|p| p.is_alive()) {
            p.x += p.vx;
            p.y += p.vy;
            p.vx *= self.damping;
            p.vy *= self.damping;
            p.life = (p.life - self.decay).max(0.0);
        }
        self.frame = self.frame.saturating_add(1);
        self.is_finished()
    }

    pub fn is_finished(&self) -> bool { self.frame >= self.max_frames }

    /// Fraction of the animation still to play, 1.0 at impact.
    pub fn remaining(&self) -> f32 {
        if self.max_frames == 0 {
            return 0.0;
        }
        1.0 - (self.frame.min(self.max_frames) as f32 / self.max_frames as f32)
    }

    pub fn live_particles(&self) -> impl Iterator<Item = &Particle> {
        self.particles.iter().filter(|p| p.is_alive())
    }
}
