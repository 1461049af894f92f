pub mod cascade;
pub mod control;
pub mod error;
pub mod events;
pub mod state;

pub use cascade::*;
pub use control::*;
pub use error::*;
pub use events::*;
pub use state::*;
