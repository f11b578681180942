//! Commit graph index built from incrementally loaded history blocks.

pub mod core;
pub mod decor;
pub mod git_backend;

pub use core::{CommitNode, Dag, DagStats, Edge, EdgeType};
pub use decor::{Decoration, RefDecorator};
pub use git_backend::{HistoryLoader, LoadLimit};
