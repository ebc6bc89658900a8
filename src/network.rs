/*!
The round-synchronous message substrate.

Every node owns two queues: the *current* inbox, drained FIFO during the
node's computation, and a *staged* inbox that [`Network::broadcast`] and
[`Network::equivocate`] append to. [`Network::advance_round`] discards
whatever is left in the current inboxes and promotes the staged ones, so a
message emitted in round `r` is readable exactly in round `r + 1`.

Delivery order at each receiver: messages from the same sender keep their
emission order; the interleaving of different senders is the staging order
(the driver computes peers in ascending node id, so effectively sender id
order), or a seeded ChaCha8-derived sender permutation when the run asks for
one. Either way the schedule is fully deterministic.
*/

use std::collections::VecDeque;
use std::mem;

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::trace;

use crate::peer::NodeId;

/// A broadcast channel connecting `n` nodes in lock step.
#[derive(Debug)]
pub struct Network<M> {
    current: Vec<VecDeque<M>>,
    staged: Vec<Vec<(NodeId, M)>>,
    rng: Option<ChaCha8Rng>,
}

impl<M: Clone + core::fmt::Debug> Network<M> {
    /// Creates a network of `n` empty inboxes.
    pub fn new(n: usize, seed: Option<u64>) -> Self {
        Self {
            current: (0..n).map(|_| VecDeque::new()).collect(),
            staged: (0..n).map(|_| Vec::new()).collect(),
            rng: seed.map(ChaCha8Rng::seed_from_u64),
        }
    }

    /// The number of connected nodes.
    pub fn len(&self) -> usize {
        self.current.len()
    }

    /// Whether the network connects no nodes at all.
    pub fn is_empty(&self) -> bool {
        self.current.is_empty()
    }

    /// Stages one copy of `message` for every node, the sender included.
    pub fn broadcast(&mut self, from: NodeId, message: M) {
        trace!(from, ?message, "broadcast");
        for inbox in self.staged.iter_mut() {
            inbox.push((from, message.clone()));
        }
    }

    /// Stages `m0` for every node in `g0` and `m1` for every node in `g1`.
    ///
    /// Nodes in neither group receive nothing. Only the protocol sender, when
    /// Byzantine, uses this, in round 0.
    pub fn equivocate(&mut self, from: NodeId, m0: M, m1: M, g0: &[NodeId], g1: &[NodeId]) {
        trace!(from, message_0 = ?m0, message_1 = ?m1, "equivocating broadcast");
        for &node in g0 {
            self.staged[node].push((from, m0.clone()));
        }
        for &node in g1 {
            self.staged[node].push((from, m1.clone()));
        }
    }

    /// Whether `node`'s current inbox has been fully drained.
    pub fn inbound_empty(&self, node: NodeId) -> bool {
        self.current[node].is_empty()
    }

    /// Takes the oldest message from `node`'s current inbox.
    pub fn pop_inbound(&mut self, node: NodeId) -> Option<M> {
        self.current[node].pop_front()
    }

    /// Ends the round: discards undrained current messages and promotes the
    /// staged ones, fixing the delivery order at each receiver.
    pub fn advance_round(&mut self) {
        let n = self.current.len();
        for (node, staged) in self.staged.iter_mut().enumerate() {
            let mut entries = mem::take(staged);
            if let Some(rng) = self.rng.as_mut() {
                let mut order: Vec<NodeId> = (0..n).collect();
                order.shuffle(rng);
                let mut rank = vec![0usize; n];
                for (position, id) in order.into_iter().enumerate() {
                    rank[id] = position;
                }
                // Stable, so per-sender emission order survives.
                entries.sort_by_key(|(from, _)| rank[*from]);
            }
            self.current[node] = entries.into_iter().map(|(_, message)| message).collect();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Network;

    #[test]
    fn rotation_promotes_staged_and_discards_current() {
        let mut net = Network::new(2, None);
        net.broadcast(0, "old");
        net.advance_round();
        assert_eq!(net.pop_inbound(0), Some("old"));
        // Node 1 never drained its copy; rotation throws it away.
        net.broadcast(1, "new");
        net.advance_round();
        assert_eq!(net.pop_inbound(1), Some("new"));
        assert!(net.inbound_empty(1));
    }

    #[test]
    fn broadcast_reaches_everyone_including_self() {
        let mut net = Network::new(3, None);
        net.broadcast(1, 42);
        net.advance_round();
        for node in 0..3 {
            assert_eq!(net.pop_inbound(node), Some(42));
            assert!(net.inbound_empty(node));
        }
    }

    #[test]
    fn equivocation_targets_exactly_the_groups() {
        let mut net = Network::new(4, None);
        net.equivocate(0, "zero", "one", &[1, 2], &[3]);
        net.advance_round();
        assert!(net.inbound_empty(0));
        assert_eq!(net.pop_inbound(1), Some("zero"));
        assert_eq!(net.pop_inbound(2), Some("zero"));
        assert_eq!(net.pop_inbound(3), Some("one"));
    }

    #[test]
    fn same_sender_order_is_preserved() {
        let mut net = Network::new(2, Some(7));
        net.broadcast(1, "first");
        net.broadcast(0, "other");
        net.broadcast(1, "second");
        net.advance_round();
        let mut inbox = Vec::new();
        while let Some(m) = net.pop_inbound(0) {
            inbox.push(m);
        }
        let from_one: Vec<_> = inbox.iter().filter(|m| m.contains("st")).collect();
        assert_eq!(from_one, [&"first", &"second"]);
    }

    #[test]
    fn unseeded_interleave_keeps_staging_order() {
        let mut net = Network::new(3, None);
        net.broadcast(2, 2);
        net.broadcast(0, 0);
        net.broadcast(1, 1);
        net.advance_round();
        // Staging order is kept as-is: emission order across senders.
        assert_eq!(net.pop_inbound(0), Some(2));
        assert_eq!(net.pop_inbound(0), Some(0));
        assert_eq!(net.pop_inbound(0), Some(1));
    }

    #[test]
    fn seeded_interleave_is_reproducible() {
        let drain = |seed| {
            let mut net = Network::new(4, Some(seed));
            for sender in 0..4 {
                net.broadcast(sender, sender);
            }
            net.advance_round();
            let mut inbox = Vec::new();
            while let Some(m) = net.pop_inbound(0) {
                inbox.push(m);
            }
            inbox
        };
        assert_eq!(drain(1234), drain(1234));
    }
}
