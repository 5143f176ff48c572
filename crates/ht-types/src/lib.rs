pub mod errors;
pub mod job;
pub mod resources;

pub use errors::*;
pub use job::*;
pub use resources::*;
