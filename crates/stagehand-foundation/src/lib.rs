pub mod clock;
pub mod error;
pub mod health;
pub mod shared_types;
pub mod shutdown;
pub mod state;

pub use clock::*;
pub use error::*;
pub use health::*;
pub use shared_types::*;
pub use shutdown::*;
pub use state::*;
