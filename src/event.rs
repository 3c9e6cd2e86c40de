use crate::body::BodyId;
use ultraviolet::DVec3;

/// Changes to the body set a renderer has to mirror.
///
/// Per-tick position and rotation are not queued here; read them from
/// [`World::bodies`](crate::World::bodies) after each update.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum WorldEvent {
    Created {
        id: BodyId,
        pos: DVec3,
        radius: f64,
        spin: f64,
    },
    /// `survivor` absorbed `absorbed` and now has this position and radius.
    /// Always followed by a `Removed` for `absorbed`.
    Merged {
        survivor: BodyId,
        absorbed: BodyId,
        pos: DVec3,
        radius: f64,
    },
    Removed {
        id: BodyId,
    },
}

impl WorldEvent {
    /// The body the event is about.
    pub fn id(&self) -> BodyId {
        match *self {
            Self::Created { id, .. } | Self::Removed { id } => id,
            Self::Merged { survivor, .. } => survivor,
        }
    }
}
