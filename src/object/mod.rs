pub mod meta;
pub mod traits;

pub use meta::*;
pub use traits::*;
