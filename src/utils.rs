use crate::{body::Body, config::SimConfig, error::Result};
use ultraviolet::DVec3;

/// Uniform value in `[-extent, extent)`.
fn symmetric(rng: &mut fastrand::Rng, extent: f64) -> f64 {
    rng.f64() * 2.0 * extent - extent
}

/// Random point inside the axis-aligned cube of half-edge `extent`.
pub fn random_in_cube(rng: &mut fastrand::Rng, extent: f64) -> DVec3 {
    let x = symmetric(rng, extent);
    let y = symmetric(rng, extent);
    let z = symmetric(rng, extent);
    DVec3::new(x, y, z)
}

/// Spawns one body the way `World::add(None)` does:
/// - Position uniform in the spawn cube.
/// - Mass `config.spawn_mass`, radius hint `config.spawn_radius`, random spin.
/// - Velocity uniform in `[-spawn_speed, spawn_speed)` per axis.
pub fn random_body(rng: &mut fastrand::Rng, config: &SimConfig) -> Result<Body> {
    let pos = random_in_cube(rng, config.spawn_extent);
    let mut body = Body::construct(
        pos,
        config.spawn_mass,
        config.spawn_radius,
        None,
        config,
        rng,
    )?;

    if config.spawn_speed > 0.0 {
        body.vel = random_in_cube(rng, config.spawn_speed);
    }

    Ok(body)
}

/// Generates `n` random bodies in the spawn cube.
pub fn random_cube(rng: &mut fastrand::Rng, n: usize, config: &SimConfig) -> Result<Vec<Body>> {
    (0..n).map(|_| random_body(rng, config)).collect()
}
