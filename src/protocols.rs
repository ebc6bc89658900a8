/*!
The concrete protocol peers.

Four single-shot Byzantine-tolerant broadcast protocols, each a state machine
over its own closed set of message kinds:

- [`BrachaPeer`]: classical double-echo reliable broadcast.
- [`Alg23Peer`]: a two-message ack-based variant delivering in at most two
  communication rounds after the proposal.
- [`Alg24Peer`]: a four-message refinement with a fast ack path and a slow
  two-phase vote path.
- [`CoolPeer`]: a dispersal + data-dissemination protocol reconstructing the
  sender's value from exchanged points.

All four share the round-0 proposal convention: an honest sender broadcasts
its input value, a Byzantine sender equivocates values 0 and 1 to the two
configured audience groups.
*/

mod alg23;
mod alg24;
mod bracha;
mod cool;

pub use alg23::{Alg23Kind, Alg23Message, Alg23Peer};
pub use alg24::{Alg24Kind, Alg24Message, Alg24Peer};
pub use bracha::{BrachaKind, BrachaMessage, BrachaPeer};
pub use cool::{CoolKind, CoolMessage, CoolPeer};
