/*!
A four-message refinement of the ack-based broadcast.

The fast path delivers straight from `n-f-1` matching acks, announcing both
votes at once. The slow path goes ack → vote1 → vote2, with `f+1` matching
vote2s amplifying into a vote2 of one's own and `n-f-1` of them delivering.
*/

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::config::{RunConfig, Strategy};
use crate::error::ConfigError;
use crate::network::Network;
use crate::peer::{NodeId, PeerCore, ProtocolPeer};
use crate::quorum;

/// The protocol's message kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Alg24Kind {
    /// The sender's proposal.
    Propose,
    /// First-phase support for a value.
    Ack,
    /// Second-phase support.
    Vote1,
    /// Third-phase support; `n-f-1` of these deliver.
    Vote2,
}

/// An Alg24 protocol message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alg24Message {
    /// The message kind.
    pub kind: Alg24Kind,
    /// The emitting node.
    pub source: NodeId,
    /// The binary value the message supports.
    pub value: i64,
}

impl Alg24Message {
    fn propose(source: NodeId, value: i64) -> Self {
        Self {
            kind: Alg24Kind::Propose,
            source,
            value,
        }
    }

    fn new(kind: Alg24Kind, source: NodeId, value: i64) -> Self {
        Self { kind, source, value }
    }
}

/// A node running the Alg24 protocol.
///
/// A Byzantine node consults `combination[0]` for its ack, `combination[1]`
/// for vote1 and `combination[2]` for vote2. A silent site still sets the
/// corresponding `*_sent` flag, so the node never re-emits later.
#[derive(Debug)]
pub struct Alg24Peer {
    core: PeerCore,
    combination: [Strategy; 3],
    ack_delivery_threshold: usize,
    ack_vote1_threshold: usize,
    vote1_vote2_threshold: usize,
    vote2_vote2_threshold: usize,
    vote2_delivery_threshold: usize,
    is_first_propose: bool,
    ack_sent: bool,
    vote1_sent: bool,
    vote2_sent: bool,
    ack_msgs: BTreeMap<NodeId, i64>,
    vote1_msgs: BTreeMap<NodeId, i64>,
    vote2_msgs: BTreeMap<NodeId, i64>,
}

impl Alg24Peer {
    fn maybe_propose(&mut self, net: &mut Network<Alg24Message>) {
        if self.core.round() != 0 || !self.core.is_sender() {
            return;
        }
        let id = self.core.id();
        if self.core.is_byzantine() {
            net.equivocate(
                id,
                Alg24Message::propose(id, 0),
                Alg24Message::propose(id, 1),
                self.core.group_0(),
                self.core.group_1(),
            );
        } else {
            net.broadcast(id, Alg24Message::propose(id, self.core.sender_value()));
            self.core.note_broadcast();
        }
    }

    /// Emits `kind` supporting `value`, applying the strategy at `site` when
    /// this node is Byzantine.
    fn emit(&mut self, kind: Alg24Kind, site: usize, value: i64, net: &mut Network<Alg24Message>) {
        let id = self.core.id();
        if self.core.is_byzantine() {
            if let Some(value) = self.combination[site].apply(value) {
                net.broadcast(id, Alg24Message::new(kind, id, value));
            }
        } else {
            net.broadcast(id, Alg24Message::new(kind, id, value));
            self.core.note_broadcast();
        }
    }
}

impl ProtocolPeer for Alg24Peer {
    type Message = Alg24Message;

    fn init(id: NodeId, config: &RunConfig) -> Result<Self, ConfigError> {
        let (n, f) = (config.n, config.f);
        Ok(Self {
            core: PeerCore::new(id, config),
            combination: config.combination.arity::<3>()?,
            ack_delivery_threshold: n.saturating_sub(f + 1),
            ack_vote1_threshold: n.saturating_sub(2 * f),
            vote1_vote2_threshold: n.saturating_sub(f + 1),
            vote2_vote2_threshold: f + 1,
            vote2_delivery_threshold: n.saturating_sub(f + 1),
            is_first_propose: true,
            ack_sent: false,
            vote1_sent: false,
            vote2_sent: false,
            ack_msgs: BTreeMap::new(),
            vote1_msgs: BTreeMap::new(),
            vote2_msgs: BTreeMap::new(),
        })
    }

    fn perform_computation(&mut self, net: &mut Network<Alg24Message>) {
        self.maybe_propose(net);
        if self.core.delivered() {
            return;
        }

        while let Some(m) = net.pop_inbound(self.core.id()) {
            trace!(node = self.core.id(), message = ?m, "inbound");
            match m.kind {
                Alg24Kind::Propose => {
                    if self.is_first_propose {
                        self.emit(Alg24Kind::Ack, 0, m.value, net);
                        self.ack_sent = true;
                        self.is_first_propose = false;
                    }
                }
                Alg24Kind::Ack => {
                    self.ack_msgs.insert(m.source, m.value);

                    // Fast path: enough acks to deliver right away,
                    // announcing both votes.
                    if quorum::support(&self.ack_msgs, m.value) >= self.ack_delivery_threshold
                        && !self.core.delivered()
                    {
                        self.emit(Alg24Kind::Vote1, 1, m.value, net);
                        self.emit(Alg24Kind::Vote2, 2, m.value, net);
                        self.vote1_sent = true;
                        self.vote2_sent = true;
                        if self.core.is_byzantine() {
                            self.core.mark_delivered();
                        } else {
                            self.core.deliver_at_step(m.value, 2);
                        }
                    }

                    if quorum::support(&self.ack_msgs, m.value) >= self.ack_vote1_threshold
                        && !self.vote1_sent
                    {
                        self.emit(Alg24Kind::Vote1, 1, m.value, net);
                        self.vote1_sent = true;
                    }
                }
                Alg24Kind::Vote1 => {
                    self.vote1_msgs.insert(m.source, m.value);

                    if quorum::support(&self.vote1_msgs, m.value) >= self.vote1_vote2_threshold
                        && !self.vote2_sent
                    {
                        self.emit(Alg24Kind::Vote2, 2, m.value, net);
                        self.vote2_sent = true;
                    }
                }
                Alg24Kind::Vote2 => {
                    self.vote2_msgs.insert(m.source, m.value);

                    // Amplification: f+1 matching vote2s contain at least one
                    // honest witness.
                    if quorum::support(&self.vote2_msgs, m.value) >= self.vote2_vote2_threshold
                        && !self.vote2_sent
                    {
                        self.emit(Alg24Kind::Vote2, 2, m.value, net);
                        self.vote2_sent = true;
                    }

                    if quorum::support(&self.vote2_msgs, m.value) >= self.vote2_delivery_threshold
                        && !self.core.delivered()
                        && !self.core.is_byzantine()
                    {
                        self.core.deliver_at_step(m.value, 4);
                    }
                }
            }
        }
    }

    fn core(&self) -> &PeerCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut PeerCore {
        &mut self.core
    }
}
