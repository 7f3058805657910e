// Data models for the roster and player development records

pub mod drill;
pub mod instructor;
pub mod metric;
pub mod note;
pub mod player;
pub mod validation;

pub use drill::*;
pub use instructor::*;
pub use metric::*;
pub use note::*;
pub use player::*;
pub use validation::*;
