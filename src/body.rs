use crate::{
    config::{Damping, SimConfig},
    error::{Error, Result},
};
use ultraviolet::{DVec2, DVec3};

/// Stable identity of a body, assigned by the world on insertion.
#[repr(transparent)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BodyId(pub u64);

/// Result of a separation query between two bodies.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Separation {
    /// Centres are within the combined radii; the pair should merge.
    Overlap,
    /// Distance between centres.
    Apart(f64),
}

/// A mass point taking part in the simulation.
#[derive(Clone, Copy, Debug)]
pub struct Body {
    id: BodyId,
    mass: f64,
    radius: f64,
    /// Position vector.
    pub pos: DVec3,
    /// Velocity vector, in distance per tick.
    pub vel: DVec3,
    /// Spin rate, only used to drive `rotation`.
    pub spin: f64,
    /// Cosmetic rotation angles about x and y.
    pub rotation: DVec2,
}

impl Body {
    /// Creates a body from already scaled values.
    /// Fails if mass or radius is not finite and positive.
    pub fn new(pos: DVec3, vel: DVec3, mass: f64, radius: f64, spin: f64) -> Result<Self> {
        check_mass(mass)?;
        check_radius(radius)?;
        check_finite("position", pos)?;
        check_finite("velocity", vel)?;
        if !spin.is_finite() {
            return Err(Error::NonFinite { field: "spin" });
        }

        Ok(Self {
            id: BodyId::default(),
            mass,
            radius,
            pos,
            vel,
            spin,
            rotation: DVec2::zero(),
        })
    }

    /// Creates a body the way the world spawns them.
    ///
    /// `mass` is multiplied by `config.mass_scale`. A `radius_hint` <= 0 is
    /// replaced by `config.default_radius`. The spin is `spin_hint` or a uniform
    /// draw from `rng`, scaled by `config.spin_scale` either way. A hint of zero
    /// or NaN counts as absent.
    pub fn construct(
        pos: DVec3,
        mass: f64,
        radius_hint: f64,
        spin_hint: Option<f64>,
        config: &SimConfig,
        rng: &mut fastrand::Rng,
    ) -> Result<Self> {
        check_mass(mass)?;

        let radius = if radius_hint <= 0.0 {
            config.default_radius.resolve(mass)
        } else {
            radius_hint
        };
        let spin = spin_hint
            .filter(|spin| *spin != 0.0 && !spin.is_nan())
            .unwrap_or_else(|| rng.f64())
            * config.spin_scale;

        let body = Self::new(pos, DVec3::zero(), mass * config.mass_scale, radius, spin)?;

        log::debug!(
            "Created body {{r: {}, x: {}, y: {}, z: {}}}",
            body.radius,
            pos.x,
            pos.y,
            pos.z
        );

        Ok(body)
    }

    pub fn id(&self) -> BodyId {
        self.id
    }

    pub(crate) fn set_id(&mut self, id: BodyId) {
        self.id = id;
    }

    pub fn mass(&self) -> f64 {
        self.mass
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }

    pub fn momentum(&self) -> DVec3 {
        self.vel * self.mass
    }

    pub fn distance_to(&self, pos: DVec3) -> f64 {
        (self.pos - pos).mag()
    }

    /// Distance to another body's centre, or [`Separation::Overlap`] when the
    /// two spheres touch and `merging` is enabled.
    pub fn separation(&self, other_pos: DVec3, other_radius: f64, merging: bool) -> Separation {
        let distance = self.distance_to(other_pos);
        if merging && distance <= self.radius + other_radius {
            Separation::Overlap
        } else {
            Separation::Apart(distance)
        }
    }

    /// Nudges every velocity component above the threshold toward zero by one step.
    /// A component is never pushed past zero.
    pub fn damp(&mut self, damping: &Damping) {
        for v in [&mut self.vel.x, &mut self.vel.y, &mut self.vel.z] {
            if v.abs() > damping.threshold {
                let damped = *v - damping.step.copysign(*v);
                *v = if damped.signum() == v.signum() { damped } else { 0.0 };
            }
        }
    }

    /// Advances the body by one tick: damping, then position, then cosmetic rotation.
    pub fn integrate(&mut self, damping: &Damping) {
        self.damp(damping);
        self.pos += self.vel;
        self.rotation.x += self.spin;
        self.rotation.y -= self.spin;
    }

    /// Applies the merged state computed by the world.
    pub(crate) fn absorb(&mut self, pos: DVec3, vel: DVec3, mass: f64, radius: f64, spin: f64) {
        debug_assert!(mass > 0.0 && radius > 0.0);
        self.pos = pos;
        self.vel = vel;
        self.mass = mass;
        self.radius = radius;
        self.spin = spin;
    }
}

fn check_mass(mass: f64) -> Result<()> {
    if mass.is_finite() && mass > 0.0 {
        Ok(())
    } else {
        Err(Error::InvalidMass(mass))
    }
}

fn check_radius(radius: f64) -> Result<()> {
    if radius.is_finite() && radius > 0.0 {
        Ok(())
    } else {
        Err(Error::InvalidRadius(radius))
    }
}

fn check_finite(field: &'static str, v: DVec3) -> Result<()> {
    if v.x.is_finite() && v.y.is_finite() && v.z.is_finite() {
        Ok(())
    } else {
        Err(Error::NonFinite { field })
    }
}
