pub mod error;
pub mod events;
pub mod types;
pub mod value;

pub use error::NarrativeError;
pub use types::*;
pub use value::*;
