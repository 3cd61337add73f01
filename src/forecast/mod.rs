pub mod inference;
pub mod production;
pub mod weather;

pub use inference::*;
pub use production::*;
pub use weather::*;
