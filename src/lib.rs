pub mod body;
pub mod c_api;
pub mod config;
pub mod error;
pub mod event;
pub mod utils;
pub mod world;

pub use body::{Body, BodyId, Separation};
pub use config::{Damping, DefaultRadius, MergePolicy, RadiusRule, SimConfig};
pub use error::{Error, Result};
pub use event::WorldEvent;
pub use world::World;
