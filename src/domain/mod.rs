pub mod alert;
pub mod building;
pub mod power;
pub mod weather;

pub use alert::*;
pub use building::*;
pub use power::*;
pub use weather::*;
