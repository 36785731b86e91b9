//! Error types for the scene hierarchy.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SceneError {
    /// The node id is stale or was never inserted.
    #[error("node id does not resolve")]
    DeadNode,

    /// A node cannot be attached to itself.
    #[error("cannot attach a node to itself")]
    SelfAttach,

    /// The requested parent sits below the node in the hierarchy; the
    /// attachment would create a cycle.
    #[error("attach target is a descendant of the node being attached")]
    CyclicAttach,
}
