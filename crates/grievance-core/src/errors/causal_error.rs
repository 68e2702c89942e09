/// Causal graph failures. These never escape a rebuild cycle; they only
/// surface from explicit caller operations such as registering an
/// intervention.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CausalError {
    #[error("self-loop rejected on {node}")]
    SelfLoop { node: String },

    #[error("invalid intervention {id}: {reason}")]
    InvalidIntervention { id: String, reason: String },

    #[error("unknown node: {node}")]
    UnknownNode { node: String },
}
