/*!
A two-message ack-based broadcast.

An honest node acks the first proposal it sees. Seeing `n-2f` acks for a
value it has *not* acked yet makes it ack that value too; seeing `n-f-1`
acks for a value delivers it. The finishing step records whether the node
delivered having acked a single value (step 2) or after re-acking (step 3).
*/

use std::collections::{BTreeMap, BTreeSet};

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
pub enum Alg23Kind {
    /// The sender's proposal.
    Propose,
    /// Support for a value.
    Ack,
}

/// An Alg23 protocol message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alg23Message {
    /// The message kind.
    pub kind: Alg23Kind,
    /// The emitting node.
    pub source: NodeId,
    /// The binary value the message supports.
    pub value: i64,
}

impl Alg23Message {
    fn propose(source: NodeId, value: i64) -> Self {
        Self {
            kind: Alg23Kind::Propose,
            source,
            value,
        }
    }

    fn ack(source: NodeId, value: i64) -> Self {
        Self {
            kind: Alg23Kind::Ack,
            source,
            value,
        }
    }
}

/// A node running the Alg23 protocol.
///
/// The whole protocol has a single Byzantine emission site (the ack), so the
/// strategy vector degenerates to one strategy. A lying node acks the
/// transformed value but books the value the rules produced, so its own
/// re-ack gating stays consistent.
#[derive(Debug)]
pub struct Alg23Peer {
    core: PeerCore,
    strategy: Strategy,
    ack_ack_threshold: usize,
    ack_delivery_threshold: usize,
    is_first_propose: bool,
    ack_msgs: BTreeMap<NodeId, i64>,
    sent_ack: BTreeSet<i64>,
}

impl Alg23Peer {
    fn maybe_propose(&mut self, net: &mut Network<Alg23Message>) {
        if self.core.round() != 0 || !self.core.is_sender() {
            return;
        }
        let id = self.core.id();
        if self.core.is_byzantine() {
            net.equivocate(
                id,
                Alg23Message::propose(id, 0),
                Alg23Message::propose(id, 1),
                self.core.group_0(),
                self.core.group_1(),
            );
        } else {
            net.broadcast(id, Alg23Message::propose(id, self.core.sender_value()));
            self.core.note_broadcast();
        }
    }

    fn emit_ack(&mut self, value: i64, net: &mut Network<Alg23Message>) {
        let id = self.core.id();
        if self.core.is_byzantine() {
            if let Some(value) = self.strategy.apply(value) {
                net.broadcast(id, Alg23Message::ack(id, value));
            }
        } else {
            net.broadcast(id, Alg23Message::ack(id, value));
            self.core.note_broadcast();
        }
    }
}

impl ProtocolPeer for Alg23Peer {
    type Message = Alg23Message;

    fn init(id: NodeId, config: &RunConfig) -> Result<Self, ConfigError> {
        let (n, f) = (config.n, config.f);
        Ok(Self {
            core: PeerCore::new(id, config),
            strategy: config.combination.single()?,
            ack_ack_threshold: n.saturating_sub(2 * f),
            ack_delivery_threshold: n.saturating_sub(f + 1),
            is_first_propose: true,
            ack_msgs: BTreeMap::new(),
            sent_ack: BTreeSet::new(),
        })
    }

    fn perform_computation(&mut self, net: &mut Network<Alg23Message>) {
        self.maybe_propose(net);
        if self.core.delivered() {
            return;
        }

        while let Some(m) = net.pop_inbound(self.core.id()) {
            trace!(node = self.core.id(), message = ?m, "inbound");
            match m.kind {
                Alg23Kind::Propose => {
                    if self.is_first_propose {
                        self.emit_ack(m.value, net);
                        self.sent_ack.insert(m.value);
                        self.is_first_propose = false;
                    }
                }
                Alg23Kind::Ack => {
                    self.ack_msgs.insert(m.source, m.value);

                    if quorum::support(&self.ack_msgs, m.value) >= self.ack_ack_threshold
                        && !self.sent_ack.contains(&m.value)
                    {
                        self.emit_ack(m.value, net);
                        self.sent_ack.insert(m.value);
                    }

                    if quorum::support(&self.ack_msgs, m.value) >= self.ack_delivery_threshold
                        && !self.core.delivered()
                        && !self.core.is_byzantine()
                    {
                        let step = if self.sent_ack.len() == 1 { 2 } else { 3 };
                        self.core.deliver_at_step(m.value, step);
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

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::{Alg23Message, Alg23Peer};
    use crate::config::{Combination, Strategy};
    use crate::network::Network;
    use crate::peer::ProtocolPeer;
    use crate::protocols::testing::{equivocating_run, honest_run};
    use crate::run::run_sync;

    #[test]
    fn honest_sender_delivers_on_the_fast_step() {
        // n=7, f=1: both thresholds sit at 5.
        let report = run_sync::<Alg23Peer>(&honest_run(7, 1, 0, 1)).unwrap();
        assert!(report.all_honest_delivered(0));
        for node in &report.nodes {
            assert_eq!(node.finishing_step, 2);
            assert_eq!(node.finished_round, 2);
        }
        // One proposal plus one ack for the sender, one ack for everyone else.
        assert_eq!(report.nodes[0].total_msgs_sent, 14);
        assert_eq!(report.nodes[1].total_msgs_sent, 7);
    }

    #[test]
    fn equivocating_sender_splits_the_acks_below_quorum() {
        let config = equivocating_run(
            7,
            1,
            Combination::Single(Strategy::Opposite),
            vec![1, 2, 3],
            vec![4, 5, 6],
        );
        let report = run_sync::<Alg23Peer>(&config).unwrap();
        // Three acks per value against a quorum of five: nobody moves.
        assert!(report.honest_final_values().is_empty());
        assert!(report.agreement_holds());
    }

    #[test]
    fn a_lopsided_split_still_preserves_agreement() {
        for strategy in [Strategy::Same, Strategy::Opposite, Strategy::Silent] {
            let config = equivocating_run(
                7,
                1,
                Combination::Single(strategy),
                vec![1, 2, 3, 4, 5],
                vec![6],
            );
            let report = run_sync::<Alg23Peer>(&config).unwrap();
            assert!(report.agreement_holds(), "conflict under {strategy:?}");
        }
    }

    #[test]
    fn later_proposals_are_ignored() {
        let mut config = honest_run(2, 0, 1, 1);
        config.sender = 1;
        let mut net = Network::new(2, None);
        let mut peer = Alg23Peer::init(0, &config).unwrap();

        net.broadcast(1, Alg23Message::propose(1, 1));
        net.broadcast(1, Alg23Message::propose(1, 0));
        net.advance_round();
        peer.perform_computation(&mut net);
        net.advance_round();

        // Exactly one ack went out, for the first proposal's value.
        let ack = net.pop_inbound(0).unwrap();
        assert_eq!(ack, Alg23Message::ack(0, 1));
        assert!(net.inbound_empty(0));
    }

    #[test]
    fn a_reack_is_booked_as_step_three() {
        // Six sources acking 0 push a node that already acked 1 through the
        // re-ack threshold and then through delivery.
        let mut config = honest_run(7, 1, 1, 1);
        config.sender = 1;
        let mut net = Network::new(7, None);
        let mut peer = Alg23Peer::init(0, &config).unwrap();

        net.broadcast(1, Alg23Message::propose(1, 1));
        net.advance_round();
        peer.perform_computation(&mut net);

        net.advance_round();
        for source in 1..7 {
            net.broadcast(source, Alg23Message::ack(source, 0));
        }
        net.advance_round();
        peer.perform_computation(&mut net);

        let report = peer.core().report();
        assert!(report.delivered);
        assert_eq!(report.final_value, 0);
        assert_eq!(report.finishing_step, 3);
    }
}
