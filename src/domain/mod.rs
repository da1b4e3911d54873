pub mod events;
pub mod seat;

pub use events::*;
pub use seat::*;
