use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// How a survivor's velocity, position and spin are combined with the body it absorbs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergePolicy {
    /// Survivor velocity becomes the absorbed velocity scaled by `m_j / (m_i + m_j)`.
    /// Position and spin use the weights `M / m_j` and `m_j / M`, with `M` the merged mass.
    #[default]
    MassRatio,
    /// Momentum-conserving velocity, centre-of-mass position, mass-weighted spin.
    Momentum,
    /// Plain arithmetic means.
    Midpoint,
}

/// How the survivor's radius grows on merge.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RadiusRule {
    /// `cbrt(r_i^3 + r_j^3)`
    #[default]
    VolumeConserving,
    /// `r_i + r_j`
    Linear,
}

/// Radius given to a body constructed with a radius hint <= 0.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefaultRadius {
    Constant(f64),
    /// Unscaled mass times the factor.
    MassScaled(f64),
}

impl Default for DefaultRadius {
    fn default() -> Self {
        Self::Constant(1.0)
    }
}

impl DefaultRadius {
    pub fn resolve(&self, unscaled_mass: f64) -> f64 {
        match *self {
            Self::Constant(radius) => radius,
            Self::MassScaled(factor) => unscaled_mass * factor,
        }
    }
}

/// Per-axis velocity damping applied before each integration step.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Damping {
    /// Components with a magnitude at or below this are left alone.
    pub threshold: f64,
    /// Amount removed from a component's magnitude per tick.
    pub step: f64,
}

impl Default for Damping {
    fn default() -> Self {
        Self {
            threshold: Self::DEFAULT_THRESHOLD,
            step: Self::DEFAULT_STEP,
        }
    }
}

impl Damping {
    pub const DEFAULT_THRESHOLD: f64 = 0.01;
    pub const DEFAULT_STEP: f64 = 0.0001;

    /// Damping that never touches velocity.
    pub fn none() -> Self {
        Self {
            threshold: f64::INFINITY,
            step: 0.0,
        }
    }
}

/// Every tunable constant of the simulation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Scaled gravitational constant.
    pub gravity: f64,
    /// Multiplier applied to every mass at construction.
    pub mass_scale: f64,
    /// Unscaled mass of a randomly spawned body.
    pub spawn_mass: f64,
    /// Radius hint passed for randomly spawned bodies.
    pub spawn_radius: f64,
    /// Half-edge of the cube random bodies are spawned in.
    pub spawn_extent: f64,
    /// Half-range of each random initial velocity component.
    pub spawn_speed: f64,
    /// Spin is `(hint or uniform [0, 1)) * spin_scale`.
    pub spin_scale: f64,
    pub default_radius: DefaultRadius,
    pub damping: Damping,
    pub merge_policy: MergePolicy,
    pub radius_rule: RadiusRule,
    /// When false, overlapping bodies keep attracting and never merge.
    pub merging: bool,
    pub seed: Option<u64>,
    /// Run the integration pass on the rayon pool.
    pub parallel_integrate: bool,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            gravity: Self::DEFAULT_GRAVITY,
            mass_scale: Self::DEFAULT_MASS_SCALE,
            spawn_mass: Self::DEFAULT_SPAWN_MASS,
            spawn_radius: 1.0,
            spawn_extent: Self::DEFAULT_SPAWN_EXTENT,
            spawn_speed: 0.0,
            spin_scale: Self::DEFAULT_SPIN_SCALE,
            default_radius: DefaultRadius::default(),
            damping: Damping::default(),
            merge_policy: MergePolicy::default(),
            radius_rule: RadiusRule::default(),
            merging: true,
            seed: None,
            parallel_integrate: false,
        }
    }
}

impl SimConfig {
    /// Default constants.
    pub const DEFAULT_GRAVITY: f64 = 6.67e-11;
    pub const DEFAULT_MASS_SCALE: f64 = 4.0e7;
    pub const DEFAULT_SPAWN_MASS: f64 = 20.0;
    pub const DEFAULT_SPAWN_EXTENT: f64 = 40.0;
    pub const DEFAULT_SPIN_SCALE: f64 = 0.01;

    /// Default config with a fixed rng seed.
    pub fn seeded(seed: u64) -> Self {
        Self {
            seed: Some(seed),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        fn positive(field: &'static str, value: f64) -> Result<()> {
            if value.is_finite() && value > 0.0 {
                Ok(())
            } else {
                Err(Error::InvalidConfig {
                    field,
                    reason: "must be finite and positive",
                })
            }
        }

        fn non_negative(field: &'static str, value: f64) -> Result<()> {
            if value.is_finite() && value >= 0.0 {
                Ok(())
            } else {
                Err(Error::InvalidConfig {
                    field,
                    reason: "must be finite and non-negative",
                })
            }
        }

        positive("gravity", self.gravity)?;
        positive("mass_scale", self.mass_scale)?;
        positive("spawn_mass", self.spawn_mass)?;
        // Values <= 0 select `default_radius`, so only finiteness is required.
        if !self.spawn_radius.is_finite() {
            return Err(Error::InvalidConfig {
                field: "spawn_radius",
                reason: "must be finite",
            });
        }
        non_negative("spawn_extent", self.spawn_extent)?;
        non_negative("spawn_speed", self.spawn_speed)?;
        non_negative("spin_scale", self.spin_scale)?;
        non_negative("damping.step", self.damping.step)?;

        // An infinite threshold is how damping is switched off.
        if self.damping.threshold.is_nan() || self.damping.threshold < 0.0 {
            return Err(Error::InvalidConfig {
                field: "damping.threshold",
                reason: "must be non-negative",
            });
        }

        match self.default_radius {
            DefaultRadius::Constant(r) => positive("default_radius", r),
            DefaultRadius::MassScaled(k) => positive("default_radius", k),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert_eq!(SimConfig::default().validate(), Ok(()));
        assert_eq!(SimConfig::seeded(7).seed, Some(7));
    }

    #[test]
    fn rejects_bad_constants() {
        let config = SimConfig {
            gravity: 0.0,
            ..SimConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(Error::InvalidConfig { field: "gravity", .. })
        ));

        let config = SimConfig {
            default_radius: DefaultRadius::MassScaled(-2.0),
            ..SimConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(Error::InvalidConfig { field: "default_radius", .. })
        ));

        let config = SimConfig {
            damping: Damping {
                threshold: f64::NAN,
                step: 0.0001,
            },
            ..SimConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn spawn_radius_must_be_finite() {
        for spawn_radius in [f64::NAN, f64::INFINITY] {
            let config = SimConfig {
                spawn_radius,
                ..SimConfig::default()
            };
            assert!(matches!(
                config.validate(),
                Err(Error::InvalidConfig { field: "spawn_radius", .. })
            ));
        }

        let config = SimConfig {
            spawn_radius: 0.0,
            ..SimConfig::default()
        };
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn disabled_damping_is_valid() {
        let config = SimConfig {
            damping: Damping::none(),
            ..SimConfig::default()
        };
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn default_radius_policies() {
        assert_eq!(DefaultRadius::Constant(1.0).resolve(20.0), 1.0);
        assert_eq!(DefaultRadius::MassScaled(2.0).resolve(20.0), 40.0);
    }

    #[test]
    fn partial_config_fills_defaults() {
        let config: SimConfig = serde_json::from_str(
            r#"{
                "merge_policy": "midpoint",
                "radius_rule": "linear",
                "default_radius": { "mass_scaled": 2.0 },
                "damping": { "step": 0.0008 },
                "seed": 42
            }"#,
        )
        .unwrap();

        assert_eq!(config.merge_policy, MergePolicy::Midpoint);
        assert_eq!(config.radius_rule, RadiusRule::Linear);
        assert_eq!(config.default_radius, DefaultRadius::MassScaled(2.0));
        assert_eq!(config.damping.step, 0.0008);
        assert_eq!(config.damping.threshold, Damping::DEFAULT_THRESHOLD);
        assert_eq!(config.seed, Some(42));
        assert_eq!(config.gravity, SimConfig::DEFAULT_GRAVITY);
        assert!(config.merging);
    }
}
