/*!
Bracha's double-echo reliable broadcast.

An honest node echoes the first `send` it sees, turns `⌈(n+f+1)/2⌉` matching
echoes (or, by amplification, `f+1` matching readys) into a single `ready`,
and delivers once `2f+1` sources agree on a ready value.
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
pub enum BrachaKind {
    /// The sender's proposal.
    Send,
    /// First-phase support for a value.
    Echo,
    /// Second-phase support; `2f+1` of these deliver.
    Ready,
}

/// A Bracha protocol message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrachaMessage {
    /// The message kind.
    pub kind: BrachaKind,
    /// The emitting node.
    pub source: NodeId,
    /// The binary value the message supports.
    pub value: i64,
}

impl BrachaMessage {
    fn send(source: NodeId, value: i64) -> Self {
        Self {
            kind: BrachaKind::Send,
            source,
            value,
        }
    }

    fn echo(source: NodeId, value: i64) -> Self {
        Self {
            kind: BrachaKind::Echo,
            source,
            value,
        }
    }

    fn ready(source: NodeId, value: i64) -> Self {
        Self {
            kind: BrachaKind::Ready,
            source,
            value,
        }
    }
}

/// A node running Bracha's protocol.
///
/// A Byzantine node consults `combination[0]` for its echo and
/// `combination[1]` for its ready.
#[derive(Debug)]
pub struct BrachaPeer {
    core: PeerCore,
    combination: [Strategy; 2],
    echo_threshold: usize,
    ready_threshold: usize,
    delivery_threshold: usize,
    sent_echo: bool,
    sent_ready: bool,
    echo_msgs: BTreeMap<NodeId, i64>,
    ready_msgs: BTreeMap<NodeId, i64>,
}

impl BrachaPeer {
    fn maybe_send(&mut self, net: &mut Network<BrachaMessage>) {
        if self.core.round() != 0 || !self.core.is_sender() {
            return;
        }
        let id = self.core.id();
        if self.core.is_byzantine() {
            net.equivocate(
                id,
                BrachaMessage::send(id, 0),
                BrachaMessage::send(id, 1),
                self.core.group_0(),
                self.core.group_1(),
            );
        } else {
            net.broadcast(id, BrachaMessage::send(id, self.core.sender_value()));
            self.core.note_broadcast();
        }
    }

    fn emit_echo(&mut self, value: i64, net: &mut Network<BrachaMessage>) {
        let id = self.core.id();
        if self.core.is_byzantine() {
            if let Some(value) = self.combination[0].apply(value) {
                net.broadcast(id, BrachaMessage::echo(id, value));
            }
        } else {
            net.broadcast(id, BrachaMessage::echo(id, value));
            self.core.note_broadcast();
        }
        self.sent_echo = true;
    }

    fn emit_ready(&mut self, value: i64, net: &mut Network<BrachaMessage>) {
        let id = self.core.id();
        if self.core.is_byzantine() {
            if let Some(value) = self.combination[1].apply(value) {
                net.broadcast(id, BrachaMessage::ready(id, value));
            }
        } else {
            net.broadcast(id, BrachaMessage::ready(id, value));
            self.core.note_broadcast();
        }
        self.sent_ready = true;
    }
}

impl ProtocolPeer for BrachaPeer {
    type Message = BrachaMessage;

    fn init(id: NodeId, config: &RunConfig) -> Result<Self, ConfigError> {
        let (n, f) = (config.n, config.f);
        Ok(Self {
            core: PeerCore::new(id, config),
            combination: config.combination.arity::<2>()?,
            echo_threshold: (n + f + 1).div_ceil(2),
            ready_threshold: f + 1,
            delivery_threshold: 2 * f + 1,
            sent_echo: false,
            sent_ready: false,
            echo_msgs: BTreeMap::new(),
            ready_msgs: BTreeMap::new(),
        })
    }

    fn perform_computation(&mut self, net: &mut Network<BrachaMessage>) {
        self.maybe_send(net);
        if self.core.delivered() {
            return;
        }

        while let Some(m) = net.pop_inbound(self.core.id()) {
            trace!(node = self.core.id(), message = ?m, "inbound");
            match m.kind {
                BrachaKind::Echo => {
                    self.echo_msgs.insert(m.source, m.value);
                }
                BrachaKind::Ready => {
                    self.ready_msgs.insert(m.source, m.value);
                }
                BrachaKind::Send => {}
            }

            if !self.sent_echo && m.kind == BrachaKind::Send {
                self.emit_echo(m.value, net);
            }

            if !self.sent_ready {
                if let Some(value) = quorum::reaching(&self.echo_msgs, self.echo_threshold) {
                    self.emit_ready(value, net);
                }
            }
            if !self.sent_ready {
                if let Some(value) = quorum::reaching(&self.ready_msgs, self.ready_threshold) {
                    self.emit_ready(value, net);
                }
            }

            if !self.core.delivered() && !self.core.is_byzantine() {
                if let Some(value) = quorum::reaching(&self.ready_msgs, self.delivery_threshold) {
                    self.core.deliver(value);
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
