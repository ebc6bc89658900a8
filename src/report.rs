/*!
Run outcomes.

One [`NodeReport`] per node, collected into a [`RunReport`]. Both serialize,
so an external reporter can aggregate across runs (summaries, CSV export)
without this crate knowing about it.
*/

use serde::{Deserialize, Serialize};

use crate::peer::NodeId;

/// Terminal outputs of a single node. `-1` means "not reached".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeReport {
    /// The node's identifier.
    pub node: NodeId,
    /// Whether the node was configured as Byzantine.
    pub byzantine: bool,
    /// Whether the node delivered a value.
    pub delivered: bool,
    /// The delivered value, or `-1`.
    pub final_value: i64,
    /// The round in which the node delivered, or `-1`.
    pub finished_round: i64,
    /// The protocol step that triggered delivery, where the protocol records
    /// one, or `-1`.
    pub finishing_step: i64,
    /// Total fan-out of this node's honest broadcasts.
    pub total_msgs_sent: u64,
}

/// The outcome of a whole run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    /// The `percentage` bookkeeping field from the configuration, verbatim.
    pub percentage: f64,
    /// How many rounds the driver executed.
    pub rounds_executed: u64,
    /// Per-node outcomes, in node-id order.
    pub nodes: Vec<NodeReport>,
}

impl RunReport {
    /// Final values of the honest nodes that delivered.
    pub fn honest_final_values(&self) -> Vec<i64> {
        self.nodes
            .iter()
            .filter(|report| !report.byzantine && report.delivered)
            .map(|report| report.final_value)
            .collect()
    }

    /// Whether no two honest nodes delivered conflicting values.
    pub fn agreement_holds(&self) -> bool {
        let values = self.honest_final_values();
        values.windows(2).all(|pair| pair[0] == pair[1])
    }

    /// Whether every honest node delivered exactly `value`.
    pub fn all_honest_delivered(&self, value: i64) -> bool {
        self.nodes
            .iter()
            .filter(|report| !report.byzantine)
            .all(|report| report.delivered && report.final_value == value)
    }
}
