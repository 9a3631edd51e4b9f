pub mod error;
pub mod json_repair;
pub mod text;
pub mod traits;
pub mod types;

pub use error::*;
pub use traits::*;
pub use types::*;
