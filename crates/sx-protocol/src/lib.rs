pub mod shadows;
pub mod topics;

pub use shadows::*;
pub use topics::{InvalidThingName, ShadowTopic};
