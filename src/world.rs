use crate::{
    body::{Body, BodyId, Separation},
    config::{MergePolicy, RadiusRule, SimConfig},
    error::Result,
    event::WorldEvent,
    utils,
};

use rayon::prelude::*;
use ultraviolet::DVec3;

/// Owns the bodies and advances them one tick at a time.
#[derive(Debug)]
pub struct World {
    config: SimConfig,
    rng: fastrand::Rng,
    /// Live bodies in insertion order.
    bodies: Vec<Body>,
    /// Tombstones for the current pairwise pass, indexed like `bodies`.
    removed: Vec<bool>,
    events: Vec<WorldEvent>,
    next_id: u64,
    tick: u64,
}

impl Default for World {
    fn default() -> Self {
        Self::empty(SimConfig::default())
    }
}

impl World {
    /// Creates a world of `n` random bodies with the default config.
    pub fn new(n: usize) -> Result<Self> {
        Self::with_config(n, SimConfig::default())
    }

    /// Creates a world of `n` random bodies. Fails if `config` is invalid.
    pub fn with_config(n: usize, config: SimConfig) -> Result<Self> {
        config.validate()?;
        let mut world = Self::empty(config);
        world.create(n)?;
        Ok(world)
    }

    fn empty(config: SimConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => fastrand::Rng::with_seed(seed),
            None => fastrand::Rng::new(),
        };

        Self {
            config,
            rng,
            bodies: Vec::new(),
            removed: Vec::new(),
            events: Vec::new(),
            next_id: 1,
            tick: 0,
        }
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Replaces the config used from the next operation on. The rng is kept.
    pub fn set_config(&mut self, config: SimConfig) -> Result<()> {
        config.validate()?;
        self.config = config;
        Ok(())
    }

    pub fn bodies(&self) -> &[Body] {
        &self.bodies
    }

    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }

    pub fn get(&self, id: BodyId) -> Option<&Body> {
        self.bodies.iter().find(|body| body.id() == id)
    }

    /// Number of updates run so far.
    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn total_mass(&self) -> f64 {
        self.bodies.iter().map(Body::mass).sum()
    }

    pub fn total_momentum(&self) -> DVec3 {
        self.bodies
            .iter()
            .fold(DVec3::zero(), |acc, body| acc + body.momentum())
    }

    /// Takes every event queued since the last drain, oldest first.
    pub fn drain_events(&mut self) -> std::vec::Drain<'_, WorldEvent> {
        self.events.drain(..)
    }

    /// Takes at most `max` of the oldest queued events, leaving the rest queued.
    pub fn drain_events_up_to(&mut self, max: usize) -> std::vec::Drain<'_, WorldEvent> {
        let end = max.min(self.events.len());
        self.events.drain(..end)
    }

    /// Number of events waiting to be drained.
    pub fn pending_events(&self) -> usize {
        self.events.len()
    }

    /// Replaces the current bodies with `n` random ones.
    pub fn create(&mut self, n: usize) -> Result<()> {
        self.clear();
        let bodies = utils::random_cube(&mut self.rng, n, &self.config)?;
        self.bodies.reserve(n);
        for body in bodies {
            self.insert(body);
        }
        log::info!("Created {} bodies", n);
        Ok(())
    }

    /// Removes every body. Calling it on an empty world does nothing.
    pub fn clear(&mut self) {
        if self.bodies.is_empty() {
            return;
        }

        log::info!("Clearing {} bodies", self.bodies.len());
        self.events.extend(
            self.bodies
                .drain(..)
                .map(|body| WorldEvent::Removed { id: body.id() }),
        );
    }

    /// Clears the world and spawns `n` new bodies.
    pub fn reset(&mut self, n: usize) -> Result<()> {
        self.clear();
        self.create(n)
    }

    /// Appends `body`, or a random one if `None`. Returns the id it was given.
    pub fn add(&mut self, body: Option<Body>) -> Result<BodyId> {
        let body = match body {
            Some(body) => body,
            None => utils::random_body(&mut self.rng, &self.config)?,
        };
        Ok(self.insert(body))
    }

    /// Builds a body with this world's config and rng, without adding it.
    pub fn construct_body(
        &mut self,
        pos: DVec3,
        mass: f64,
        radius_hint: f64,
        spin_hint: Option<f64>,
    ) -> Result<Body> {
        Body::construct(pos, mass, radius_hint, spin_hint, &self.config, &mut self.rng)
    }

    /// Appends one random body.
    pub fn spawn(&mut self) -> Result<BodyId> {
        self.add(None)
    }

    fn insert(&mut self, mut body: Body) -> BodyId {
        let id = BodyId(self.next_id);
        self.next_id += 1;
        body.set_id(id);

        self.events.push(WorldEvent::Created {
            id,
            pos: body.pos,
            radius: body.radius(),
            spin: body.spin,
        });
        self.bodies.push(body);
        id
    }

    /// Advances the simulation by one tick.
    /// Resolves every pair (merge or attract), then integrates each survivor once.
    pub fn update(&mut self) {
        log::trace!("update: tick={} bodies={}", self.tick, self.bodies.len());

        self.interact();
        self.integrate();
        self.tick += 1;
    }

    /// Pairwise pass over unordered pairs `i < j`.
    ///
    /// A merge folds `j` into `i` in place and tombstones `j`, so later pairs see
    /// the grown survivor and never see the absorbed body. Tombstoned bodies are
    /// compacted out after the pass, preserving insertion order.
    fn interact(&mut self) {
        let n = self.bodies.len();
        self.removed.clear();
        self.removed.resize(n, false);

        let merging = self.config.merging;
        let gravity = self.config.gravity;
        let mut merged = 0;

        for i in 0..n {
            if self.removed[i] {
                continue;
            }

            for j in (i + 1)..n {
                if self.removed[j] {
                    continue;
                }

                let (survivor, other) = pair_mut(&mut self.bodies, i, j);

                match survivor.separation(other.pos, other.radius(), merging) {
                    Separation::Overlap => {
                        merge_into(
                            survivor,
                            other,
                            self.config.merge_policy,
                            self.config.radius_rule,
                        );
                        self.removed[j] = true;
                        merged += 1;

                        log::debug!(
                            "Merged body {:?} into {:?} (mass {}, radius {})",
                            other.id(),
                            survivor.id(),
                            survivor.mass(),
                            survivor.radius()
                        );
                        self.events.push(WorldEvent::Merged {
                            survivor: survivor.id(),
                            absorbed: other.id(),
                            pos: survivor.pos,
                            radius: survivor.radius(),
                        });
                        self.events.push(WorldEvent::Removed { id: other.id() });
                    }
                    Separation::Apart(distance) => {
                        let force = pair_force(survivor, other, distance, gravity);
                        survivor.vel += force / survivor.mass();
                        other.vel -= force / other.mass();
                    }
                }
            }
        }

        if merged > 0 {
            let removed = &self.removed;
            let mut index = 0;
            self.bodies.retain(|_| {
                let keep = !removed[index];
                index += 1;
                keep
            });
        }
    }

    /// Damps and moves every body once.
    fn integrate(&mut self) {
        let damping = self.config.damping;

        if self.config.parallel_integrate {
            self.bodies
                .par_iter_mut()
                .for_each(|body| body.integrate(&damping));
        } else {
            self.bodies
                .iter_mut()
                .for_each(|body| body.integrate(&damping));
        }
    }
}

/// Borrows two distinct bodies mutably, `i < j`.
fn pair_mut(bodies: &mut [Body], i: usize, j: usize) -> (&mut Body, &mut Body) {
    debug_assert!(i < j);
    let (head, tail) = bodies.split_at_mut(j);
    (&mut head[i], &mut tail[0])
}

/// Gravitational force on `a` from `b`; `b` feels the negation.
///
/// The magnitude `G * m_a * m_b / d^3` is multiplied by the unscaled offset
/// `b - a`, so the vector's length is `G * m_a * m_b / d^2`.
/// Coincident centres, or centres so close that `d^3` underflows, yield no force.
pub fn pair_force(a: &Body, b: &Body, distance: f64, gravity: f64) -> DVec3 {
    let d3 = distance * distance * distance;
    if d3 == 0.0 {
        return DVec3::zero();
    }

    let f = gravity * a.mass() * b.mass() / d3;
    if !f.is_finite() {
        return DVec3::zero();
    }
    (b.pos - a.pos) * f
}

/// Folds `absorbed` into `survivor`: masses add, radius follows `rule`,
/// velocity, position and spin follow `policy`.
pub fn merge_into(survivor: &mut Body, absorbed: &Body, policy: MergePolicy, rule: RadiusRule) {
    let (mi, mj) = (survivor.mass(), absorbed.mass());
    let mass = mi + mj;

    let (pos, vel, spin) = match policy {
        MergePolicy::MassRatio => {
            // Weights M/m_j and m_j/M reduce to a lerp toward the absorbed body
            // by 1 / (1 + (M/m_j)^2), which saturates to 0 instead of inf/inf.
            let ratio = mass / mj;
            let t = 1.0 / (1.0 + ratio * ratio);
            (
                survivor.pos + (absorbed.pos - survivor.pos) * t,
                absorbed.vel * (mj / mass),
                survivor.spin + (absorbed.spin - survivor.spin) * t,
            )
        }
        MergePolicy::Momentum => (
            (survivor.pos * mi + absorbed.pos * mj) / mass,
            (survivor.momentum() + absorbed.momentum()) / mass,
            (survivor.spin * mi + absorbed.spin * mj) / mass,
        ),
        MergePolicy::Midpoint => (
            (survivor.pos + absorbed.pos) * 0.5,
            (survivor.vel + absorbed.vel) * 0.5,
            (survivor.spin + absorbed.spin) * 0.5,
        ),
    };

    let (ri, rj) = (survivor.radius(), absorbed.radius());
    let radius = match rule {
        RadiusRule::VolumeConserving => (ri * ri * ri + rj * rj * rj).cbrt(),
        RadiusRule::Linear => ri + rj,
    };

    survivor.absorb(pos, vel, mass, radius, spin);
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn body(pos: [f64; 3], vel: [f64; 3], mass: f64, radius: f64) -> Body {
        Body::new(
            DVec3::new(pos[0], pos[1], pos[2]),
            DVec3::new(vel[0], vel[1], vel[2]),
            mass,
            radius,
            0.0,
        )
        .unwrap()
    }

    #[test]
    fn mass_ratio_merge_uses_absorbed_velocity() {
        let mut a = body([0.0, 0.0, 0.0], [0.0, 0.0, 0.0], 2.0, 1.0);
        let b = body([1.0, 0.0, 0.0], [3.0, -6.0, 0.0], 1.0, 1.0);

        merge_into(&mut a, &b, MergePolicy::MassRatio, RadiusRule::VolumeConserving);

        assert_eq!(a.mass(), 3.0);
        assert_relative_eq!(a.vel.x, 1.0);
        assert_relative_eq!(a.vel.y, -2.0);
        // Weights 3 and 1/3.
        assert_relative_eq!(a.pos.x, 0.1);
    }

    #[test]
    fn mass_ratio_merge_with_extreme_ratio_stays_finite() {
        let mut a = body([0.0, 0.0, 0.0], [0.0, 0.0, 0.0], 1e10, 1.0);
        a.spin = 0.01;
        let mut b = body([1.0, 2.0, 0.0], [0.0, 0.0, 0.0], 1e-300, 1.0);
        b.spin = 0.05;

        merge_into(&mut a, &b, MergePolicy::MassRatio, RadiusRule::VolumeConserving);

        assert_eq!(a.pos, DVec3::zero());
        assert_eq!(a.spin, 0.01);
        assert_eq!(a.mass(), 1e10);
    }

    #[test]
    fn mass_ratio_merge_drops_survivor_velocity() {
        let mut a = body([0.0, 0.0, 0.0], [1.0, 0.0, 0.0], 2.0, 1.0);
        let b = body([1.0, 0.0, 0.0], [0.0, 0.0, 0.0], 1.0, 1.0);

        merge_into(&mut a, &b, MergePolicy::MassRatio, RadiusRule::VolumeConserving);

        assert_eq!(a.vel, DVec3::zero());
    }

    #[test]
    fn momentum_merge_conserves_momentum() {
        let mut a = body([0.0, 0.0, 0.0], [1.0, 0.0, 0.0], 2.0, 1.0);
        let b = body([3.0, 0.0, 0.0], [0.0, 0.0, 0.0], 1.0, 1.0);
        let before = a.momentum() + b.momentum();

        merge_into(&mut a, &b, MergePolicy::Momentum, RadiusRule::VolumeConserving);

        assert_relative_eq!(a.vel.x, 2.0 / 3.0);
        assert_relative_eq!(a.momentum().x, before.x);
        assert_relative_eq!(a.pos.x, 1.0);
    }

    #[test]
    fn midpoint_merge_averages() {
        let mut a = body([0.0, 2.0, 0.0], [1.0, 0.0, 0.0], 5.0, 1.0);
        a.spin = 0.02;
        let mut b = body([4.0, 0.0, 0.0], [0.0, 1.0, 0.0], 1.0, 1.0);
        b.spin = 0.04;

        merge_into(&mut a, &b, MergePolicy::Midpoint, RadiusRule::Linear);

        assert_eq!(a.pos, DVec3::new(2.0, 1.0, 0.0));
        assert_eq!(a.vel, DVec3::new(0.5, 0.5, 0.0));
        assert_relative_eq!(a.spin, 0.03);
        assert_eq!(a.mass(), 6.0);
    }

    #[test]
    fn radius_rules() {
        let b = body([0.0, 0.0, 0.0], [0.0, 0.0, 0.0], 1.0, 4.0);

        let mut a = body([0.0, 0.0, 0.0], [0.0, 0.0, 0.0], 1.0, 3.0);
        merge_into(&mut a, &b, MergePolicy::MassRatio, RadiusRule::VolumeConserving);
        assert_relative_eq!(a.radius(), 91.0_f64.cbrt());
        assert_relative_eq!(a.radius(), 4.497941, epsilon = 1e-6);

        let mut a = body([0.0, 0.0, 0.0], [0.0, 0.0, 0.0], 1.0, 3.0);
        merge_into(&mut a, &b, MergePolicy::MassRatio, RadiusRule::Linear);
        assert_eq!(a.radius(), 7.0);
    }

    #[test]
    fn force_is_inverse_square() {
        let a = body([0.0, 0.0, 0.0], [0.0, 0.0, 0.0], 2.0, 1.0);
        let b = body([0.0, 4.0, 0.0], [0.0, 0.0, 0.0], 3.0, 1.0);

        let force = pair_force(&a, &b, 4.0, 1.0);

        assert_relative_eq!(force.mag(), 2.0 * 3.0 / 16.0);
        assert!(force.y > 0.0);
        assert_eq!(pair_force(&a, &a, 0.0, 1.0), DVec3::zero());
    }

    #[test]
    fn pair_mut_borrows_both() {
        let mut bodies = vec![
            body([0.0, 0.0, 0.0], [0.0, 0.0, 0.0], 1.0, 1.0),
            body([1.0, 0.0, 0.0], [0.0, 0.0, 0.0], 1.0, 1.0),
            body([2.0, 0.0, 0.0], [0.0, 0.0, 0.0], 1.0, 1.0),
        ];
        let (a, b) = pair_mut(&mut bodies, 0, 2);
        assert_eq!(a.pos.x, 0.0);
        assert_eq!(b.pos.x, 2.0);
    }

    #[test]
    fn clear_is_idempotent() {
        let mut world = World::with_config(5, SimConfig::seeded(1)).unwrap();
        world.clear();
        assert!(world.is_empty());
        world.clear();
        assert!(world.is_empty());

        let removed = world
            .drain_events()
            .filter(|event| matches!(event, WorldEvent::Removed { .. }))
            .count();
        assert_eq!(removed, 5);
    }
}
