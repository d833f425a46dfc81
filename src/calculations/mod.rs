pub mod batch;
pub mod resolve;

pub use batch::resolve_trees;
pub use resolve::DateResolver;
