/*!
Run parameters.

A [`RunConfig`] describes one simulation run: the network size and fault
bound, who the designated sender is, which nodes are Byzantine, how an
equivocating sender splits its audience, and the [`Strategy`] each Byzantine
emission site applies. Configurations usually arrive as JSON documents;
[`RunConfig::from_json_str`] parses and validates in one step.
*/

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::peer::NodeId;

/// How a Byzantine node treats the value of a message it is about to emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Emit the value the protocol rules produced.
    Same,
    /// Invert the binary value.
    Opposite,
    /// Emit nothing at this site.
    Silent,
}

impl Strategy {
    /// The value actually put on the wire, or `None` when the emission is suppressed.
    pub fn apply(self, value: i64) -> Option<i64> {
        match self {
            Self::Same => Some(value),
            Self::Opposite => Some(1 - value),
            Self::Silent => None,
        }
    }

    /// Whether this site emits nothing at all.
    pub fn is_silent(self) -> bool {
        matches!(self, Self::Silent)
    }
}

/// The adversarial strategy vector.
///
/// Protocols with a single Byzantine emission site (Alg23) take one strategy;
/// the others index a fixed-length vector, one entry per emission site
/// (Bracha: echo/ready; Alg24: ack/vote1/vote2; COOL: exchange/ok1/ok2/done/
/// yourpoint/mypoint).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Combination {
    /// One strategy for every emission site.
    Single(Strategy),
    /// One strategy per emission site, in protocol order.
    Vector(Vec<Strategy>),
}

impl Combination {
    /// The strategy for a protocol with a single emission site.
    ///
    /// A one-element vector is accepted as well.
    pub fn single(&self) -> Result<Strategy, ConfigError> {
        match self {
            Self::Single(strategy) => Ok(*strategy),
            Self::Vector(v) if v.len() == 1 => Ok(v[0]),
            Self::Vector(v) => Err(ConfigError::CombinationArity {
                expected: 1,
                got: v.len(),
            }),
        }
    }

    /// The strategy vector for a protocol with `K` emission sites.
    pub fn arity<const K: usize>(&self) -> Result<[Strategy; K], ConfigError> {
        match self {
            Self::Vector(v) if v.len() == K => {
                let mut strategies = [Strategy::Same; K];
                strategies.copy_from_slice(v);
                Ok(strategies)
            }
            Self::Vector(v) => Err(ConfigError::CombinationArity {
                expected: K,
                got: v.len(),
            }),
            Self::Single(_) => Err(ConfigError::CombinationArity { expected: K, got: 1 }),
        }
    }
}

/// Parameters of a single simulation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Total node count.
    pub n: usize,
    /// Assumed Byzantine fault bound; all quorum thresholds are derived from it.
    pub f: usize,
    /// The designated broadcaster.
    pub sender: NodeId,
    /// One entry per node; `0` marks an honest node, anything else Byzantine.
    pub byzantine_nodes: Vec<u8>,
    /// The audience receiving value 0 from an equivocating sender.
    pub group_0: Vec<NodeId>,
    /// The audience receiving value 1 from an equivocating sender.
    pub group_1: Vec<NodeId>,
    /// The adversarial strategy vector.
    pub combination: Combination,
    /// The input value an honest sender proposes in round 0.
    #[serde(default = "default_sender_value")]
    pub sender_value: i64,
    /// Bookkeeping only; echoed verbatim into the run report.
    #[serde(default)]
    pub percentage: f64,
    /// Round cap enforced by the driver.
    #[serde(default = "default_max_rounds")]
    pub max_rounds: u64,
    /// Seed for the inter-sender delivery interleave. `None` keeps node-id order.
    #[serde(default)]
    pub seed: Option<u64>,
    /// Enables the driver's per-round summary events.
    #[serde(default)]
    pub debug_prints: bool,
}

fn default_sender_value() -> i64 {
    1
}

fn default_max_rounds() -> u64 {
    30
}

impl RunConfig {
    /// Parses and validates a JSON parameter document.
    pub fn from_json_str(doc: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(doc).map_err(|err| ConfigError::Malformed(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the structural invariants the peers rely on.
    ///
    /// Per-protocol combination arity is checked separately, by each peer's
    /// `init`. Configurations outside a protocol's assumed fault bound are
    /// deliberately legal: probing them is what the harness is for.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.n == 0 {
            return Err(ConfigError::EmptyNetwork);
        }
        if self.byzantine_nodes.len() != self.n {
            return Err(ConfigError::ByzantineTableLength {
                expected: self.n,
                got: self.byzantine_nodes.len(),
            });
        }
        if self.sender >= self.n {
            return Err(ConfigError::SenderOutOfRange(self.sender));
        }
        for &id in self.group_0.iter().chain(self.group_1.iter()) {
            if id >= self.n {
                return Err(ConfigError::GroupMemberOutOfRange(id));
            }
        }
        if let Some(id) = self
            .group_0
            .iter()
            .copied()
            .find(|id| self.group_1.contains(id))
        {
            return Err(ConfigError::OverlappingGroups(id));
        }
        Ok(())
    }

    /// Whether the given node is configured as Byzantine.
    pub fn is_byzantine(&self, node: NodeId) -> bool {
        self.byzantine_nodes.get(node).is_some_and(|&entry| entry != 0)
    }

    /// Ids of the honest nodes, in ascending order.
    pub fn honest_nodes(&self) -> Vec<NodeId> {
        (0..self.n).filter(|&id| !self.is_byzantine(id)).collect()
    }
}
