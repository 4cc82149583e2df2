pub mod artnet;
pub mod control_loop;
pub mod geometry;
pub mod types;

pub use artnet::*;
pub use control_loop::*;
pub use geometry::*;
pub use types::*;
