//! Instruction outlining pass.
//!
//! Outlining extracts recurring straight-line instruction sequences into
//! shared functions and replaces each occurrence with a direct call. One
//! round linearizes the module into a token stream, feeds it to the generic
//! repeat finder, refines the raw repeats into descriptors, and rewrites
//! every descriptor whose benefit is positive. Rounds repeat until a round
//! changes nothing or the configured cap is reached; synthesized calls are
//! ordinary legal instructions, so later rounds can outline repeats among
//! them.

pub(crate) mod key;
pub(crate) mod rewrite;
pub(crate) mod target;
pub(crate) mod tokenize;

use tracing::{debug, trace};

use crate::ir::{FuncId, Module};
use crate::support::{get_functions_to_outline, OutlinedFunction};

/// Outlining configuration. Defaults mirror a production bytecode target:
/// conservative length threshold, a small parameter window, one round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutliningSettings {
    /// Master switch; when false the pass reports "no change" immediately.
    pub enabled: bool,
    /// Minimum instruction count for any outlined sequence; also the
    /// block-size threshold below which blocks are not scanned.
    pub min_length: usize,
    /// Smallest acceptable parameter count for an outlined function.
    pub min_parameters: usize,
    /// Largest acceptable parameter count for an outlined function.
    pub max_parameters: usize,
    /// Hard cap on outlining rounds.
    pub max_rounds: usize,
    /// Place each synthesized function immediately before its prototype's
    /// enclosing function instead of at the end of the module.
    pub place_near_caller: bool,
}

impl Default for OutliningSettings {
    fn default() -> Self {
        OutliningSettings {
            enabled: false,
            min_length: 64,
            min_parameters: 0,
            max_parameters: 5,
            max_rounds: 1,
            place_near_caller: true,
        }
    }
}

/// Counters reported by the pass. Injected by the caller; no global state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutliningStats {
    pub candidates_outlined: usize,
    pub functions_created: usize,
    pub instructions_saved: usize,
    pub rounds: usize,
}

/// Run outlining on `module` until fixpoint or the round cap.
/// Returns true if anything changed.
pub fn run(module: &mut Module, settings: &OutliningSettings, stats: &mut OutliningStats) -> bool {
    if !settings.enabled {
        return false;
    }
    debug!(
        min_length = settings.min_length,
        min_parameters = settings.min_parameters,
        max_parameters = settings.max_parameters,
        max_rounds = settings.max_rounds,
        place_near_caller = settings.place_near_caller,
        "outlining"
    );

    let mut changed = false;
    for round in 0..settings.max_rounds {
        if !outline_module_once(module, settings, stats) {
            // A round that finds nothing will never find anything later.
            break;
        }
        stats.rounds += 1;
        changed = true;
        trace!(round, "outlining round changed the module");
    }
    changed
}

/// One outlining round. Returns true if it outlined anything.
fn outline_module_once(
    module: &mut Module,
    settings: &OutliningSettings,
    stats: &mut OutliningStats,
) -> bool {
    let stream = tokenize::tokenize(module, settings);
    let mut descriptors: Vec<OutlinedFunction> = Vec::new();
    {
        let mut target = target::IrOutlinerTarget::new(settings, module, &stream.insts);
        get_functions_to_outline(&mut descriptors, &stream.tokens, &mut target);
    }

    let mut changed = false;
    for descriptor in &descriptors {
        if descriptor.benefit() < 1 {
            continue;
        }
        let mut function: Option<FuncId> = None;
        let mut outlined = 0usize;
        for candidate in descriptor.candidates.iter().filter(|c| !c.deleted) {
            if function.is_none() {
                function = Some(rewrite::build_outlined_function(
                    module,
                    descriptor,
                    &stream.insts,
                    settings,
                ));
                stats.functions_created += 1;
            }
            if rewrite::outline_candidate(module, candidate, function.unwrap(), &stream.insts) {
                changed = true;
                outlined += 1;
            }
        }
        stats.candidates_outlined += outlined;
        stats.instructions_saved += outlined.saturating_sub(1) * descriptor.sequence_size;
        trace!(
            outlined,
            sequence_size = descriptor.sequence_size,
            "descriptor processed"
        );
    }
    changed
}
