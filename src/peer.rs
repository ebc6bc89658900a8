/*!
The peer base: state and hooks shared by every protocol peer.

A concrete protocol embeds a [`PeerCore`] (identity, round counter,
adversary flags, and the terminal outputs) and implements [`ProtocolPeer`]
on top of it. The core enforces the outcome invariants: `delivered` flips at
most once, and the recorded value, round, and step are frozen afterwards.
*/

use tracing::debug;

use crate::config::RunConfig;
use crate::error::ConfigError;
use crate::network::Network;
use crate::report::NodeReport;

/// A stable node identifier in `[0, n)`.
pub type NodeId = usize;

/// Node state common to all protocols.
#[derive(Debug, Clone)]
pub struct PeerCore {
    id: NodeId,
    n: usize,
    sender: NodeId,
    sender_value: i64,
    is_byzantine: bool,
    group_0: Vec<NodeId>,
    group_1: Vec<NodeId>,
    round: u64,
    delivered: bool,
    final_value: i64,
    finished_round: i64,
    finishing_step: i64,
    total_msgs_sent: u64,
}

impl PeerCore {
    /// Builds the round-0 state of node `id` under the given configuration.
    pub fn new(id: NodeId, config: &RunConfig) -> Self {
        Self {
            id,
            n: config.n,
            sender: config.sender,
            sender_value: config.sender_value,
            is_byzantine: config.is_byzantine(id),
            group_0: config.group_0.clone(),
            group_1: config.group_1.clone(),
            round: 0,
            delivered: false,
            final_value: -1,
            finished_round: -1,
            finishing_step: -1,
            total_msgs_sent: 0,
        }
    }

    /// This node's identifier.
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Total node count of the run.
    pub fn network_size(&self) -> usize {
        self.n
    }

    /// The designated broadcaster of the run.
    pub fn sender(&self) -> NodeId {
        self.sender
    }

    /// The input value an honest sender proposes.
    pub fn sender_value(&self) -> i64 {
        self.sender_value
    }

    /// Whether this node is the designated broadcaster.
    pub fn is_sender(&self) -> bool {
        self.id == self.sender
    }

    /// Whether this node is configured to misbehave.
    pub fn is_byzantine(&self) -> bool {
        self.is_byzantine
    }

    /// The current round number.
    pub fn round(&self) -> u64 {
        self.round
    }

    /// Whether this node has delivered.
    pub fn delivered(&self) -> bool {
        self.delivered
    }

    /// The audience an equivocating sender feeds value 0.
    pub fn group_0(&self) -> &[NodeId] {
        &self.group_0
    }

    /// The audience an equivocating sender feeds value 1.
    pub fn group_1(&self) -> &[NodeId] {
        &self.group_1
    }

    /// Whether this node belongs to `group_0`.
    pub fn in_group_0(&self) -> bool {
        self.group_0.contains(&self.id)
    }

    /// Whether this node belongs to `group_1`.
    pub fn in_group_1(&self) -> bool {
        self.group_1.contains(&self.id)
    }

    /// Adds one broadcast fan-out to the protocol cost counter.
    ///
    /// Only honest traffic is counted; adversary bandwidth is free.
    pub fn note_broadcast(&mut self) {
        if !self.is_byzantine {
            self.total_msgs_sent += self.n as u64;
        }
    }

    /// Flips the delivered flag without recording an outcome.
    ///
    /// Used when a Byzantine node reaches a point where an honest node would
    /// have delivered and stops participating.
    pub(crate) fn mark_delivered(&mut self) {
        self.delivered = true;
    }

    /// Records a delivery. The first call wins; the outcome is frozen afterwards.
    pub fn deliver(&mut self, value: i64) {
        if self.delivered {
            return;
        }
        self.delivered = true;
        self.final_value = value;
        self.finished_round = self.round as i64;
        debug!(node = self.id, value, round = self.round, "delivered");
    }

    /// Records a delivery together with the protocol step that triggered it.
    pub fn deliver_at_step(&mut self, value: i64, step: i64) {
        if self.delivered {
            return;
        }
        self.finishing_step = step;
        self.deliver(value);
    }

    pub(crate) fn advance_round(&mut self) {
        self.round += 1;
    }

    /// The terminal outputs of this node.
    pub fn report(&self) -> NodeReport {
        NodeReport {
            node: self.id,
            byzantine: self.is_byzantine,
            delivered: self.delivered,
            final_value: self.final_value,
            finished_round: self.finished_round,
            finishing_step: self.finishing_step,
            total_msgs_sent: self.total_msgs_sent,
        }
    }
}

/// A single node running one of the broadcast protocols.
///
/// The driver promises to call [`init`](`Self::init`) exactly once before
/// round 0, [`perform_computation`](`Self::perform_computation`) once per
/// node per round in node-id order, and [`end_of_round`](`Self::end_of_round`)
/// once per round after every peer has computed. Everything a peer emits
/// lands in the *next* round's inboxes, so outcomes cannot depend on the
/// within-round peer order.
pub trait ProtocolPeer: Sized {
    /// The protocol's wire message.
    type Message: Clone + core::fmt::Debug;

    /// Builds the peer's initial state for a run.
    fn init(id: NodeId, config: &RunConfig) -> Result<Self, ConfigError>;

    /// Drains the round's inbox, updating local state and emitting messages
    /// for the next round.
    fn perform_computation(&mut self, net: &mut Network<Self::Message>);

    /// Called once per round after all peers have computed.
    fn end_of_round(&mut self) {}

    /// The shared peer state.
    fn core(&self) -> &PeerCore;

    /// The shared peer state, mutably.
    fn core_mut(&mut self) -> &mut PeerCore;
}
