/*!
A round-synchronous simulator for Byzantine reliable broadcast protocols.

A run puts `n` nodes on a lock-step broadcast substrate ([`Network`]) and has
each of them execute one single-shot dissemination protocol while a
configurable subset of the nodes misbehaves: Bracha's double-echo broadcast
([`BrachaPeer`](protocols::BrachaPeer)), the ack-based
[`Alg23Peer`](protocols::Alg23Peer) and [`Alg24Peer`](protocols::Alg24Peer)
variants, or the dispersal-based [`CoolPeer`](protocols::CoolPeer). The
designated sender may *equivocate*, delivering different values to different
partitions of the audience, and every other Byzantine node applies a
per-emission [`Strategy`] to the messages the protocol rules would have
produced.

[`run_sync()`] drives the rounds and collects a [`RunReport`]: who delivered,
what value, in which round and step, and how much honest traffic it cost.

Rounds are synchronous: everything a node broadcasts in round `r` is readable
by every node (the sender included) in round `r + 1`, and nothing else is.
There is no networking, no cryptography, and no notion of time beyond the
round counter; the substrate is infallible by construction.
*/

pub mod config;
pub mod error;
pub mod network;
pub mod peer;
pub mod protocols;
pub mod quorum;
pub mod report;
pub mod run;

pub use config::{Combination, RunConfig, Strategy};
pub use error::ConfigError;
pub use network::Network;
pub use peer::{NodeId, PeerCore, ProtocolPeer};
pub use report::{NodeReport, RunReport};
pub use run::run_sync;
