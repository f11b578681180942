pub mod dag;
pub mod edge;
pub mod node;

pub use dag::{Dag, DagStats};
pub use edge::{Edge, EdgeType};
pub use node::CommitNode;
