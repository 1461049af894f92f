pub mod host;
pub mod layer;
pub mod legend;

pub use host::*;
pub use layer::*;
pub use legend::*;
