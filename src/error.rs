use crate::peer::NodeId;

/// Configuration errors detected before any round is executed.
///
/// All of these are programmer errors in the run parameters. Once a
/// configuration has been accepted, the simulation itself is total and
/// produces a report for every run.
#[derive(displaydoc::Display, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// the network must contain at least one node
    EmptyNetwork,
    /// `byzantine_nodes` has {got} entries for a network of {expected} nodes
    ByzantineTableLength {
        /// The configured node count.
        expected: usize,
        /// The actual table length.
        got: usize,
    },
    /// sender id {0} is outside the network
    SenderOutOfRange(NodeId),
    /// group member id {0} is outside the network
    GroupMemberOutOfRange(NodeId),
    /// node {0} appears in both equivocation groups
    OverlappingGroups(NodeId),
    /// expected {expected} strategies in `combination`, got {got}
    CombinationArity {
        /// The number of emission sites of the protocol.
        expected: usize,
        /// The number of strategies supplied.
        got: usize,
    },
    /// malformed parameter document: {0}
    Malformed(String),
}

impl std::error::Error for ConfigError {}
