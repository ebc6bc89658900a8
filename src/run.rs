/*!
The simulation driver.

[`run_sync()`] builds the substrate and the peers, advances rounds in lock
step, and collects the per-node reports. A round consists of every peer
draining its inbox and staging its emissions, one network rotation, and the
end-of-round hooks. The loop stops as soon as every honest node has
delivered, or when the configured round cap is reached.
*/

use tracing::debug;

use crate::config::RunConfig;
use crate::error::ConfigError;
use crate::network::Network;
use crate::peer::ProtocolPeer;
use crate::report::RunReport;

/// Executes one run of protocol `P` and collects the outcomes.
pub fn run_sync<P: ProtocolPeer>(config: &RunConfig) -> Result<RunReport, ConfigError> {
    config.validate()?;

    let mut net = Network::new(config.n, config.seed);
    let mut peers = (0..config.n)
        .map(|id| P::init(id, config))
        .collect::<Result<Vec<_>, _>>()?;
    let honest = config.honest_nodes();

    let mut rounds_executed = 0;
    for round in 0..config.max_rounds {
        for peer in peers.iter_mut() {
            peer.perform_computation(&mut net);
        }
        net.advance_round();
        for peer in peers.iter_mut() {
            peer.end_of_round();
            peer.core_mut().advance_round();
        }
        rounds_executed = round + 1;

        let finished = honest.iter().all(|&id| peers[id].core().delivered());
        if config.debug_prints {
            debug!(round, finished, "end of round");
        }
        if finished {
            break;
        }
    }

    Ok(RunReport {
        percentage: config.percentage,
        rounds_executed,
        nodes: peers.iter().map(|peer| peer.core().report()).collect(),
    })
}
