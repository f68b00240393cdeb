mod guitar;
mod share;
mod shared_fields;

pub use guitar::*;
pub use share::*;
pub use shared_fields::*;
