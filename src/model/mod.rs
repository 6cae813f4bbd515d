pub mod audit;
pub mod common;
pub mod dated;
pub mod email;
pub mod error;
pub mod lookup_tree;
pub mod lookup_value;
pub mod user_context;

pub use audit::*;
pub use common::*;
pub use dated::*;
pub use email::*;
pub use error::*;
pub use lookup_tree::*;
pub use lookup_value::*;
pub use user_context::*;
