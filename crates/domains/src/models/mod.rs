pub mod attribution;
pub mod comment;
pub mod display;
pub mod post;
pub mod query;
pub mod recipe_box;
pub mod tag;
pub mod user;

pub use attribution::*;
pub use comment::*;
pub use display::*;
pub use post::*;
pub use query::*;
pub use recipe_box::*;
pub use tag::*;
pub use user::*;
