mod bookmarks;
mod ingredients;
mod recipes;
mod seed;
mod shopping_list;
mod subscriptions;
mod tags;
mod users;

pub use bookmarks::*;
pub use ingredients::*;
pub use recipes::*;
pub use seed::*;
pub use shopping_list::*;
pub use subscriptions::*;
pub use tags::*;
pub use users::*;
