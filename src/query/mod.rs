pub mod builder;
pub mod filter;

pub use builder::{ConnectionExt, TableQuery};
pub use filter::{Condition, Filter, Operator};
