use crate::{
    body::{Body, BodyId},
    config::SimConfig,
    event::WorldEvent,
    world::World,
};
use ultraviolet::DVec3;

/// Snapshot of one body for a renderer.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct BodyState {
    pub id: u64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub radius: f64,
    pub mass: f64,
    /// Rotation about x.
    pub pitch: f64,
    /// Rotation about y.
    pub yaw: f64,
}

impl From<&Body> for BodyState {
    fn from(body: &Body) -> Self {
        Self {
            id: body.id().0,
            x: body.pos.x,
            y: body.pos.y,
            z: body.pos.z,
            radius: body.radius(),
            mass: body.mass(),
            pitch: body.rotation.x,
            yaw: body.rotation.y,
        }
    }
}

pub const EVENT_CREATED: u32 = 0;
pub const EVENT_MERGED: u32 = 1;
pub const EVENT_REMOVED: u32 = 2;

/// Flattened [`WorldEvent`]. `other` is the absorbed id for merges, 0 otherwise.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct EventRecord {
    pub kind: u32,
    pub id: u64,
    pub other: u64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub radius: f64,
}

impl From<WorldEvent> for EventRecord {
    fn from(event: WorldEvent) -> Self {
        let at = |kind, id: BodyId, other: u64, pos: DVec3, radius| Self {
            kind,
            id: id.0,
            other,
            x: pos.x,
            y: pos.y,
            z: pos.z,
            radius,
        };

        match event {
            WorldEvent::Created { id, pos, radius, .. } => at(EVENT_CREATED, id, 0, pos, radius),
            WorldEvent::Merged {
                survivor,
                absorbed,
                pos,
                radius,
            } => at(EVENT_MERGED, survivor, absorbed.0, pos, radius),
            WorldEvent::Removed { id } => Self {
                kind: EVENT_REMOVED,
                id: id.0,
                ..Self::default()
            },
        }
    }
}

/// Creates a world of `n` bodies. Returns null if the world could not be built.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn World_Create(n: usize, seed: u64, use_seed: bool) -> *mut World {
    let config = SimConfig {
        seed: use_seed.then_some(seed),
        ..SimConfig::default()
    };

    match World::with_config(n, config) {
        Ok(world) => Box::into_raw(Box::new(world)),
        Err(e) => {
            log::error!("World_Create failed: {e}");
            std::ptr::null_mut()
        }
    }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn World_Destroy(handle: *mut World) {
    if !handle.is_null() {
        unsafe { drop(Box::from_raw(handle)) };
    }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn World_Update(handle: *mut World) {
    if let Some(world) = unsafe { handle.as_mut() } {
        world.update();
    }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn World_Reset(handle: *mut World, n: usize) {
    if let Some(world) = unsafe { handle.as_mut() } {
        if let Err(e) = world.reset(n) {
            log::error!("World_Reset failed: {e}");
        }
    }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn World_Clear(handle: *mut World) {
    if let Some(world) = unsafe { handle.as_mut() } {
        world.clear();
    }
}

/// Adds one random body. Returns its id, or 0 on failure.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn World_Spawn(handle: *mut World) -> u64 {
    let Some(world) = (unsafe { handle.as_mut() }) else {
        return 0;
    };

    match world.spawn() {
        Ok(id) => id.0,
        Err(e) => {
            log::error!("World_Spawn failed: {e}");
            0
        }
    }
}

/// Adds a body with an unscaled `mass`. `radius` <= 0 selects the default radius
/// and a zero or negative `spin` draws a random one. Returns its id, or 0 if rejected.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn World_AddBody(
    handle: *mut World,
    x: f64,
    y: f64,
    z: f64,
    mass: f64,
    radius: f64,
    spin: f64,
) -> u64 {
    let Some(world) = (unsafe { handle.as_mut() }) else {
        return 0;
    };

    let spin = (spin > 0.0).then_some(spin);
    let body = world.construct_body(DVec3::new(x, y, z), mass, radius, spin);

    match body.and_then(|body| world.add(Some(body))) {
        Ok(id) => id.0,
        Err(e) => {
            log::warn!("World_AddBody rejected body: {e}");
            0
        }
    }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn World_GetBodyCount(handle: *const World) -> usize {
    unsafe { handle.as_ref() }.map_or(0, |world| world.len())
}

/// Copies up to `cap` body snapshots into `out`. Returns the number written.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn World_CopyBodies(
    handle: *const World,
    out: *mut BodyState,
    cap: usize,
) -> usize {
    let Some(world) = (unsafe { handle.as_ref() }) else {
        return 0;
    };
    if out.is_null() {
        return 0;
    }

    // SAFETY: the caller guarantees `out` points to at least `cap` writable slots.
    let out = unsafe { std::slice::from_raw_parts_mut(out, cap) };
    let mut written = 0;
    for (slot, body) in out.iter_mut().zip(world.bodies()) {
        *slot = BodyState::from(body);
        written += 1;
    }
    written
}

/// Moves up to `cap` pending events into `out`, oldest first. Events that do not
/// fit stay queued for the next call. Returns the number written.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn World_PollEvents(
    handle: *mut World,
    out: *mut EventRecord,
    cap: usize,
) -> usize {
    let Some(world) = (unsafe { handle.as_mut() }) else {
        return 0;
    };
    if out.is_null() || cap == 0 {
        return 0;
    }

    // SAFETY: the caller guarantees `out` points to at least `cap` writable slots.
    let out = unsafe { std::slice::from_raw_parts_mut(out, cap) };
    let mut written = 0;
    for (slot, event) in out.iter_mut().zip(world.drain_events_up_to(cap)) {
        *slot = EventRecord::from(event);
        written += 1;
    }
    written
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_handles_are_ignored() {
        unsafe {
            World_Update(std::ptr::null_mut());
            World_Clear(std::ptr::null_mut());
            World_Destroy(std::ptr::null_mut());
            assert_eq!(World_GetBodyCount(std::ptr::null()), 0);
            assert_eq!(World_Spawn(std::ptr::null_mut()), 0);
        }
    }

    #[test]
    fn lifecycle_through_handle() {
        unsafe {
            let handle = World_Create(4, 11, true);
            assert!(!handle.is_null());
            assert_eq!(World_GetBodyCount(handle), 4);

            let mut events = [EventRecord::default(); 2];
            assert_eq!(World_PollEvents(handle, events.as_mut_ptr(), 2), 2);
            assert_eq!(events[0].kind, EVENT_CREATED);
            assert_eq!(events[0].id, 1);
            assert_eq!(events[1].id, 2);

            // The remaining two creations were left queued.
            let mut rest = [EventRecord::default(); 8];
            assert_eq!(World_PollEvents(handle, rest.as_mut_ptr(), 8), 2);
            assert_eq!(rest[1].id, 4);

            let id = World_AddBody(handle, 100.0, 0.0, 0.0, 1.0, 0.0, 0.5);
            assert_eq!(id, 5);
            assert_eq!(World_AddBody(handle, 0.0, 0.0, 0.0, -1.0, 1.0, 0.5), 0);

            let mut bodies = [BodyState::default(); 8];
            assert_eq!(World_CopyBodies(handle, bodies.as_mut_ptr(), 8), 5);
            assert_eq!(bodies[4].id, 5);
            assert_eq!(bodies[4].x, 100.0);
            assert_eq!(bodies[4].radius, 1.0);

            World_Update(handle);
            World_Reset(handle, 3);
            assert_eq!(World_GetBodyCount(handle), 3);

            World_Clear(handle);
            assert_eq!(World_GetBodyCount(handle), 0);
            World_Destroy(handle);
        }
    }
}
