//! Internal implementation details.

pub(crate) mod circular;
pub(crate) mod dependency_graph;
pub(crate) mod disposal;

pub(crate) use circular::StackGuard;
pub(crate) use dependency_graph::DependencyGraph;
pub(crate) use disposal::DisposableAdapter;
