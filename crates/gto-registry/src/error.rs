use gto_core::ID;
use gto_core::Node;

#[derive(Debug, Clone, thiserror::Error)]
pub enum RegistryError {
    #[error("unknown compute node {0}")]
    UnknownNode(ID<Node>),
    #[error("node {node} is at capacity ({max_concurrent} tasks)")]
    CapacityExceeded {
        node: ID<Node>,
        max_concurrent: usize,
    },
    #[error("task {task} is not attributed to node {node}")]
    NotAttributed { node: ID<Node>, task: uuid::Uuid },
}
