pub mod predecessor_dag;

pub use predecessor_dag::PredecessorGraph;
