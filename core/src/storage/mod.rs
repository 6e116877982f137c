pub mod paths;

pub use paths::{NamingPolicy, RunContext, RunPathResolver};
