pub mod ids;

// Foundation crate: identifier primitives shared by every other crate.
pub use ids::*;
