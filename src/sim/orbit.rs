//! Projectile trajectory and collision with the primary
//!
//! Two propagation modes share one contract: distance to the primary's
//! center never grows, contact fires exactly one [`ImpactEvent`], and the
//! propagator is inert afterwards.

use std::f32::consts::TAU;

use glam::{Mat3, Quat, Vec3};
use rand::Rng;
use rand_pcg::Pcg32;

use super::state::{ImpactEvent, PrimaryBody, Projectile, SpawnCommand};
use crate::consts::*;
use crate::settings::{PropagationMode, Settings};
use crate::tangent_basis;

/// Per-mode integration state
#[derive(Debug, Clone, PartialEq)]
pub enum Propagation {
    /// Inverse-square attraction toward the origin
    Gravity { mu: f32 },
    /// Circular path in a fixed plane whose radius shrinks every step
    DecayingOrbit {
        plane: Quat,
        radius: f32,
        angle: f32,
        decay_rate: f32,
        angular_speed: f32,
    },
}

/// Advances a single projectile until it touches the primary
#[derive(Debug, Clone)]
pub struct OrbitPropagator {
    projectile: Projectile,
    mode: Propagation,
    impacted: bool,
    steps: u64,
}

impl OrbitPropagator {
    /// Gravity-mode propagator for an existing projectile
    pub fn gravity(projectile: Projectile, mu: f32) -> Self {
        Self {
            projectile,
            mode: Propagation::Gravity { mu },
            impacted: false,
            steps: 0,
        }
    }

    /// Decaying-orbit propagator; the projectile's position fixes the start radius and angle
    pub fn decaying(mut projectile: Projectile, plane: Quat, decay_rate: f32, angular_speed: f32) -> Self {
        let (radius, angle) = plane_coords(plane, projectile.position);
        projectile.orbit_plane = Some(plane);
        Self {
            projectile,
            mode: Propagation::DecayingOrbit {
                plane,
                radius,
                angle,
                decay_rate: decay_rate.max(1e-3),
                angular_speed,
            },
            impacted: false,
            steps: 0,
        }
    }

    /// Build a projectile for `command` and start it on its way
    pub fn launch(command: &SpawnCommand, settings: &Settings, primary_radius: f32, rng: &mut Pcg32) -> Self {
        let dir = command.aim.unwrap_or_else(|| random_unit(rng));
        let position = dir * settings.spawn_distance.max(primary_radius * 1.5);
        let (t1, t2) = tangent_basis(dir);
        let theta = rng.random::<f32>() * TAU;
        let lateral = t1 * theta.cos() + t2 * theta.sin();

        let projectile = Projectile {
            position,
            velocity: Vec3::ZERO,
            radius: command.projectile_radius(),
            density: command.asteroid_type,
            orbit_plane: None,
            diameter_km: command.diameter_km,
            velocity_km_s: command.velocity_km_s,
            spin: 0.0,
            shape_seed: rng.random(),
            visual: None,
        };

        match settings.propagation {
            PropagationMode::Gravity => {
                // Aimed launches fall straight down; random ones get a lateral offset
                let offset = if command.aim.is_some() {
                    0.0
                } else {
                    rng.random::<f32>() * AIM_SPREAD * primary_radius
                };
                let target = dir * primary_radius + lateral * offset;
                let speed = command.velocity_km_s * settings.velocity_scale;
                let velocity = (target - position).normalize_or_zero() * speed;

                let mut propagator = Self::gravity(projectile, settings.gravity_parameter);
                propagator.initialize(position, velocity, command.projectile_radius());
                propagator
            }
            PropagationMode::DecayingOrbit => {
                let plane = Quat::from_mat3(&Mat3::from_cols(dir, lateral, dir.cross(lateral)));
                let decay = command.velocity_km_s * settings.decay_rate_per_speed;
                Self::decaying(projectile, plane, decay, settings.angular_speed)
            }
        }
    }

    /// Reset the trajectory to a new state; clears any previous impact.
    ///
    /// A decaying orbit is re-planed through `position`, turning along the
    /// tangential part of `velocity` (or its previous sense when there is none).
    pub fn initialize(&mut self, position: Vec3, velocity: Vec3, radius: f32) {
        self.projectile.position = position;
        self.projectile.velocity = velocity;
        self.projectile.radius = radius;
        self.impacted = false;
        self.steps = 0;
        if let Propagation::DecayingOrbit {
            plane,
            radius: orbit_radius,
            angle,
            ..
        } = &mut self.mode
        {
            *plane = plane_through(position, velocity, *plane * Vec3::Y);
            (*orbit_radius, *angle) = plane_coords(*plane, position);
            self.projectile.orbit_plane = Some(*plane);
        }
    }

    pub fn projectile(&self) -> &Projectile {
        &self.projectile
    }

    pub fn projectile_mut(&mut self) -> &mut Projectile {
        &mut self.projectile
    }

    /// Consume the propagator, handing back its projectile
    pub fn into_projectile(self) -> Projectile {
        self.projectile
    }

    pub fn is_impacted(&self) -> bool {
        self.impacted
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub fn distance_to_center(&self) -> f32 {
        self.projectile.position.length()
    }

    /// Advance by `dt` seconds. Returns the impact the first time the
    /// projectile reaches the primary; every later call is a no-op.
    pub fn step(&mut self, dt: f32, primary: &PrimaryBody) -> Option<ImpactEvent> {
        if self.impacted {
            return None;
        }
        let dt = dt.max(0.0);
        self.steps += 1;

        match &mut self.mode {
            Propagation::Gravity { mu } => {
                let mu = *mu;
                let contact = primary.radius + self.projectile.radius;
                let p0 = self.projectile.position;
                let r = p0.length();
                if r <= contact {
                    return self.impact(p0, primary);
                }

                // Semi-implicit Euler: velocity first, then position
                let accel = -p0 / r * (mu / (r * r));
                self.projectile.velocity += accel * dt;
                let p1 = p0 + self.projectile.velocity * dt;

                match segment_sphere_entry(p0, p1, contact) {
                    Some(s) => self.impact(p0.lerp(p1, s), primary),
                    None if p1.length() > r => {
                        // Past periapsis without contact: hold the shell, drop the outward component
                        let n = p1.normalize();
                        let outward = self.projectile.velocity.dot(n);
                        if outward > 0.0 {
                            self.projectile.velocity -= n * outward;
                        }
                        self.projectile.position = n * r;
                        None
                    }
                    None => {
                        self.projectile.position = p1;
                        None
                    }
                }
            }
            Propagation::DecayingOrbit {
                plane,
                radius,
                angle,
                decay_rate,
                angular_speed,
            } => {
                if *radius <= primary.radius {
                    let p = self.projectile.position;
                    return self.impact(p, primary);
                }

                let prev = self.projectile.position;
                *radius = (*radius - *decay_rate * dt).max(primary.radius);
                *angle += *angular_speed * dt;
                let next = *plane * Vec3::new(*radius * angle.cos(), 0.0, *radius * angle.sin());
                let landed = *radius <= primary.radius;

                self.projectile.position = next;
                if dt > 0.0 {
                    self.projectile.velocity = (next - prev) / dt;
                }
                if landed { self.impact(next, primary) } else { None }
            }
        }
    }

    /// Sample the remaining trajectory without disturbing this propagator
    pub fn predict_path(&self, dt: f32, max_points: usize, primary: &PrimaryBody) -> Vec<Vec3> {
        let mut ghost = self.clone();
        let mut points = Vec::with_capacity(max_points);
        points.push(ghost.projectile.position);
        while points.len() < max_points && !ghost.impacted {
            ghost.step(dt, primary);
            points.push(ghost.projectile.position);
        }
        points
    }

    fn impact(&mut self, contact: Vec3, primary: &PrimaryBody) -> Option<ImpactEvent> {
        self.impacted = true;
        self.projectile.position = contact;

        let normal = contact.try_normalize().unwrap_or(Vec3::Y);
        let world_point = normal * primary.radius;
        let velocity = self.projectile.velocity;
        let impact_angle_deg = match velocity.try_normalize() {
            Some(v) => v.dot(normal).abs().clamp(0.0, 1.0).asin().to_degrees(),
            None => 90.0,
        };

        let event = ImpactEvent {
            local_point: primary.world_to_local(world_point),
            world_point,
            crater_radius: CRATER_RADIUS_FACTOR * self.projectile.radius,
            crater_depth: CRATER_DEPTH_FACTOR * self.projectile.radius,
            impact_speed: velocity.length(),
            impact_angle_deg,
            projectile_radius: self.projectile.radius,
            diameter_km: self.projectile.diameter_km,
            velocity_km_s: self.projectile.velocity_km_s,
            density: self.projectile.density,
        };
        log::info!(
            "Impact after {} steps at {:?} (local), {:.0} degrees, crater r={:.2}",
            self.steps,
            event.local_point,
            event.impact_angle_deg,
            event.crater_radius
        );
        Some(event)
    }
}

/// Radius and in-plane angle of `p` for an orbit plane whose local XZ is the path
fn plane_coords(plane: Quat, p: Vec3) -> (f32, f32) {
    let local = plane.inverse() * p;
    (local.length(), local.z.atan2(local.x))
}

/// Orbit plane whose local +X points at `position` and whose local +Z is the
/// direction of travel
fn plane_through(position: Vec3, velocity: Vec3, normal: Vec3) -> Quat {
    let Some(x) = position.try_normalize() else {
        return Quat::IDENTITY;
    };
    let z = (velocity - x * velocity.dot(x))
        .try_normalize()
        .or_else(|| x.cross(normal).try_normalize())
        .unwrap_or_else(|| tangent_basis(x).0);
    Quat::from_mat3(&Mat3::from_cols(x, z.cross(x), z))
}

/// Fraction along `p0 -> p1` where the segment first enters the sphere of
/// `radius` at the origin; `Some(0.0)` if `p0` is already inside.
pub fn segment_sphere_entry(p0: Vec3, p1: Vec3, radius: f32) -> Option<f32> {
    let c = p0.length_squared() - radius * radius;
    if c <= 0.0 {
        return Some(0.0);
    }
    let d = p1 - p0;
    let a = d.length_squared();
    if a <= f32::EPSILON {
        return None;
    }
    let b = 2.0 * p0.dot(d);
    let disc = b * b - 4.0 * a * c;
    if disc < 0.0 {
        return None;
    }
    let s = (-b - disc.sqrt()) / (2.0 * a);
    (0.0..=1.0).contains(&s).then_some(s)
}

/// Uniform random direction
pub fn random_unit(rng: &mut Pcg32) -> Vec3 {
    let theta = rng.random::<f32>() * TAU;
    let cos_phi = rng.random::<f32>() * 2.0 - 1.0;
    let sin_phi = (1.0 - cos_phi * cos_phi).max(0.0).sqrt();
    Vec3::new(sin_phi * theta.cos(), cos_phi, sin_phi * theta.sin())
}
