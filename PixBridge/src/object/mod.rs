//! Game objects: parts and variants

mod game_object;
mod parts;
mod variants;

pub use game_object::GameObject;
pub use parts::{DEFAULT_PART, PartRemoval, check_name, unique_name};
pub use variants::{DEFAULT_VARIANT, Variant};
