use log::{debug, warn};

use crate::domain::{BbId, BbccId};
use crate::host::Host;

use super::Engine;

impl<H: Host> Engine<H> {
    /// Drop a block whose code was unmapped or retranslated
    ///
    /// Every BBCC of the block leaves the directory, the host is told to drop
    /// their counters, and all hints and saved states that pointed at them
    /// are cleared. Returns false (and changes nothing) for an unknown block.
    pub fn discard_block(&mut self, bb: BbId) -> bool {
        let Some(block) = self.blocks.remove(bb) else {
            warn!("Ignoring discard of unknown block {bb}");
            return false;
        };

        for &id in &block.bbccs {
            self.bbccs.remove(id);
            self.host.bbcc_discarded(id);
        }

        let evicted = |id: BbccId| block.bbccs.contains(&id);
        let cleared = self.threads.scrub_all(evicted) + self.bbccs.forget_hints(evicted);

        self.stats.discarded_blocks += 1;
        self.stats.discarded_bbccs += block.bbccs.len() as u64;
        debug!(
            "Discarded {bb} at {}: {} BBCC(s), {cleared} stale reference(s) cleared",
            block.addr,
            block.bbccs.len()
        );
        true
    }
}
