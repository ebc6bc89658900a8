/*!
A dispersal + data-dissemination broadcast in the COOL style.

In the dispersal phase every node checks that enough peers hold a share
matching its own (`exchange` → `ok1` → `ok2` → `done`); once dispersal
terminates, nodes that validated a share publish their point, `f+1` matching
points are adopted and re-published, and `f+1+⌊f/3⌋` matching re-published
points reconstruct the sender's value. The harness treats points as opaque
integers; the polynomial layer stays outside the simulation.
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
pub enum CoolKind {
    /// The sender handing a node its share of the codeword.
    #[serde(rename = "f(x)")]
    Fx,
    /// A node publishing its share for comparison.
    Exchange,
    /// Enough shares matched our own.
    Ok1,
    /// Enough `ok1` sources matched as well.
    Ok2,
    /// Dispersal is complete from this node's point of view.
    Done,
    /// A validated point, published after dispersal terminates.
    YourPoint,
    /// An adopted point, republished for reconstruction.
    MyPoint,
}

/// A COOL protocol message.
///
/// `ok1`, `ok2` and `done` carry no payload; their `value` is zero and
/// ignored by receivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoolMessage {
    /// The message kind.
    pub kind: CoolKind,
    /// The emitting node.
    pub source: NodeId,
    /// The share or point the message carries, where applicable.
    pub value: i64,
}

impl CoolMessage {
    fn new(kind: CoolKind, source: NodeId, value: i64) -> Self {
        Self { kind, source, value }
    }

    fn plain(kind: CoolKind, source: NodeId) -> Self {
        Self::new(kind, source, 0)
    }
}

/// A node running the COOL protocol.
///
/// A Byzantine node consults `combination[0..=5]` for exchange, ok1, ok2,
/// done, yourpoint and mypoint, in that order. The valueless kinds ignore
/// the transform; `silent` still suppresses them.
#[derive(Debug)]
pub struct CoolPeer {
    core: PeerCore,
    combination: [Strategy; 6],
    ok1_threshold: usize,
    ok2_threshold: usize,
    ok2_done_threshold: usize,
    done_done_threshold: usize,
    dispersal_termination_threshold: usize,
    mypoint_threshold: usize,
    decode_threshold: usize,
    /// This node's share of the codeword; `-1` until one is known.
    fx: i64,
    sent_ok1: bool,
    sent_ok2: bool,
    sent_done: bool,
    sent_mypoint: bool,
    dispersal_terminated: bool,
    /// Sources whose exchanged share matched ours.
    a1: BTreeSet<NodeId>,
    /// Sources in `a1` that also sent `ok1`.
    a2: BTreeSet<NodeId>,
    ok2_msgs: BTreeSet<NodeId>,
    done_msgs: BTreeSet<NodeId>,
    /// Points received via `yourpoint`, keyed by source.
    your_points: BTreeMap<NodeId, i64>,
    /// Points received via `mypoint`, keyed by source.
    my_points: BTreeMap<NodeId, i64>,
}

impl CoolPeer {
    fn maybe_disperse(&mut self, net: &mut Network<CoolMessage>) {
        if self.core.round() != 0 || !self.core.is_sender() {
            return;
        }
        let id = self.core.id();
        if self.core.is_byzantine() {
            net.equivocate(
                id,
                CoolMessage::new(CoolKind::Fx, id, 0),
                CoolMessage::new(CoolKind::Fx, id, 1),
                self.core.group_0(),
                self.core.group_1(),
            );
        } else {
            net.broadcast(id, CoolMessage::new(CoolKind::Fx, id, self.core.sender_value()));
            self.core.note_broadcast();
        }
    }

    /// Emits a value-carrying kind, applying the strategy at `site` when this
    /// node is Byzantine.
    fn emit_valued(&mut self, kind: CoolKind, site: usize, value: i64, net: &mut Network<CoolMessage>) {
        let id = self.core.id();
        if self.core.is_byzantine() {
            if let Some(value) = self.combination[site].apply(value) {
                net.broadcast(id, CoolMessage::new(kind, id, value));
            }
        } else {
            net.broadcast(id, CoolMessage::new(kind, id, value));
            self.core.note_broadcast();
        }
    }

    /// Emits a valueless kind; the strategy at `site` can only silence it.
    fn emit_plain(&mut self, kind: CoolKind, site: usize, net: &mut Network<CoolMessage>) {
        let id = self.core.id();
        if self.core.is_byzantine() {
            if !self.combination[site].is_silent() {
                net.broadcast(id, CoolMessage::plain(kind, id));
            }
        } else {
            net.broadcast(id, CoolMessage::plain(kind, id));
            self.core.note_broadcast();
        }
    }

    /// Re-evaluates every trigger, in phase order, after one inbound message.
    fn run_triggers(&mut self, net: &mut Network<CoolMessage>) {
        if !self.sent_ok1 && self.a1.len() >= self.ok1_threshold {
            self.emit_plain(CoolKind::Ok1, 1, net);
            self.sent_ok1 = true;
        }

        if !self.sent_ok2 && self.a2.len() >= self.ok2_threshold {
            self.emit_plain(CoolKind::Ok2, 2, net);
            self.sent_ok2 = true;
        }

        if !self.sent_done
            && (self.ok2_msgs.len() >= self.ok2_done_threshold
                || self.done_msgs.len() >= self.done_done_threshold)
        {
            self.emit_plain(CoolKind::Done, 3, net);
            self.sent_done = true;
        }

        if !self.dispersal_terminated && self.done_msgs.len() >= self.dispersal_termination_threshold
        {
            self.dispersal_terminated = true;
            // Nodes that never validated a share hold ⊥ and stay quiet.
            if self.sent_ok2 && self.fx >= 0 {
                self.emit_valued(CoolKind::YourPoint, 4, self.fx, net);
            }
        }

        if !self.sent_mypoint {
            if let Some(value) = quorum::reaching(&self.your_points, self.mypoint_threshold) {
                self.emit_valued(CoolKind::MyPoint, 5, value, net);
                self.sent_mypoint = true;
            }
        }

        if !self.core.delivered() && !self.core.is_byzantine() {
            if let Some(value) = quorum::reaching(&self.my_points, self.decode_threshold) {
                self.core.deliver(value);
            }
        }
    }
}

impl ProtocolPeer for CoolPeer {
    type Message = CoolMessage;

    fn init(id: NodeId, config: &RunConfig) -> Result<Self, ConfigError> {
        let (n, f) = (config.n, config.f);
        let poly_degree = f / 3;
        let core = PeerCore::new(id, config);
        // The initial share is implied by group membership; the sender's
        // round-0 message overwrites it. A node in neither group holds ⊥.
        let fx = if core.in_group_0() {
            0
        } else if core.in_group_1() {
            1
        } else {
            -1
        };
        Ok(Self {
            core,
            combination: config.combination.arity::<6>()?,
            ok1_threshold: n.saturating_sub(f),
            ok2_threshold: n.saturating_sub(f),
            ok2_done_threshold: 2 * f + 1,
            done_done_threshold: f + 1,
            dispersal_termination_threshold: 2 * f + 1,
            mypoint_threshold: f + 1,
            decode_threshold: f + 1 + poly_degree,
            fx,
            sent_ok1: false,
            sent_ok2: false,
            sent_done: false,
            sent_mypoint: false,
            dispersal_terminated: false,
            a1: BTreeSet::new(),
            a2: BTreeSet::new(),
            ok2_msgs: BTreeSet::new(),
            done_msgs: BTreeSet::new(),
            your_points: BTreeMap::new(),
            my_points: BTreeMap::new(),
        })
    }

    fn perform_computation(&mut self, net: &mut Network<CoolMessage>) {
        self.maybe_disperse(net);

        while let Some(m) = net.pop_inbound(self.core.id()) {
            trace!(node = self.core.id(), message = ?m, "inbound");
            match m.kind {
                CoolKind::Fx => {
                    if m.source == self.core.sender() {
                        self.fx = m.value;
                        self.emit_valued(CoolKind::Exchange, 0, self.fx, net);
                    }
                }
                CoolKind::Exchange => {
                    if m.value == self.fx {
                        self.a1.insert(m.source);
                    }
                }
                CoolKind::Ok1 => {
                    if self.a1.contains(&m.source) {
                        self.a2.insert(m.source);
                    }
                }
                CoolKind::Ok2 => {
                    self.ok2_msgs.insert(m.source);
                }
                CoolKind::Done => {
                    self.done_msgs.insert(m.source);
                }
                CoolKind::YourPoint => {
                    self.your_points.insert(m.source, m.value);
                }
                CoolKind::MyPoint => {
                    self.my_points.insert(m.source, m.value);
                }
            }
            self.run_triggers(net);
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

    use super::{CoolKind, CoolMessage, CoolPeer};
    use crate::config::{Combination, Strategy};
    use crate::network::Network;
    use crate::peer::ProtocolPeer;
    use crate::protocols::testing::{equivocating_run, honest_run};
    use crate::run::run_sync;

    #[test]
    fn honest_sender_reconstructs_everywhere() {
        // n=10, f=3: dispersal quorums at 7, decode threshold 4+1 = 5.
        let report = run_sync::<CoolPeer>(&honest_run(10, 3, 0, 6)).unwrap();
        assert!(report.all_honest_delivered(0));
        for node in &report.nodes {
            // f(x), exchange, ok1, ok2, done, yourpoint, mypoint: one phase per round.
            assert_eq!(node.finished_round, 7);
        }
        // Sender: f(x) + exchange + ok1 + ok2 + done + yourpoint + mypoint.
        assert_eq!(report.nodes[0].total_msgs_sent, 70);
        assert_eq!(report.nodes[1].total_msgs_sent, 60);
    }

    #[test]
    fn equivocating_sender_never_clears_dispersal() {
        let config = equivocating_run(
            10,
            3,
            Combination::Vector(vec![Strategy::Same; 6]),
            vec![1, 2, 3, 4, 5],
            vec![6, 7, 8, 9],
        );
        let report = run_sync::<CoolPeer>(&config).unwrap();
        // Five shares of 0 against four of 1: neither side reaches n-f = 7
        // matching exchanges, so no ok1 is ever sent.
        assert!(report.honest_final_values().is_empty());
        assert!(report.agreement_holds());
        for node in report.nodes.iter().filter(|node| !node.byzantine) {
            // Each honest node paid for its exchange and nothing else.
            assert_eq!(node.total_msgs_sent, 10);
        }
    }

    #[test]
    fn exchanges_count_once_per_source() {
        let mut config = honest_run(10, 3, 0, 6);
        config.sender = 1;
        let mut net = Network::new(10, None);
        let mut peer = CoolPeer::init(0, &config).unwrap();

        net.broadcast(1, CoolMessage::new(CoolKind::Fx, 1, 0));
        net.advance_round();
        peer.perform_computation(&mut net);

        net.advance_round();
        for _ in 0..20 {
            net.broadcast(2, CoolMessage::new(CoolKind::Exchange, 2, 0));
        }
        net.advance_round();
        peer.perform_computation(&mut net);

        // Twenty matching exchanges from one source are one entry in A1,
        // nowhere near the ok1 quorum of seven.
        net.advance_round();
        assert!(net.inbound_empty(0));
    }

    #[test]
    fn a_mismatched_share_is_not_counted() {
        let mut config = honest_run(10, 3, 0, 6);
        config.sender = 1;
        let mut net = Network::new(10, None);
        let mut peer = CoolPeer::init(0, &config).unwrap();

        net.broadcast(1, CoolMessage::new(CoolKind::Fx, 1, 0));
        net.advance_round();
        peer.perform_computation(&mut net);

        net.advance_round();
        // ok1 from a source that never exchanged a matching share is dropped.
        net.broadcast(2, CoolMessage::new(CoolKind::Exchange, 2, 1));
        net.broadcast(2, CoolMessage::plain(CoolKind::Ok1, 2));
        net.advance_round();
        peer.perform_computation(&mut net);

        net.advance_round();
        assert!(net.inbound_empty(0));
    }

    #[test]
    fn a_stray_fx_from_a_non_sender_is_ignored() {
        let mut config = honest_run(10, 3, 0, 6);
        config.sender = 1;
        let mut net = Network::new(10, None);
        let mut peer = CoolPeer::init(0, &config).unwrap();

        net.broadcast(3, CoolMessage::new(CoolKind::Fx, 3, 1));
        net.advance_round();
        peer.perform_computation(&mut net);

        // No exchange goes out: the share can only come from the sender.
        net.advance_round();
        assert!(net.inbound_empty(0));
        assert_eq!(peer.core().report().total_msgs_sent, 0);
    }
}
