//! Erase planning
//!
//! Maps an image request onto the sectors that must be erased before the
//! image can be programmed. Each region carries a static table of
//! `(cumulative capacity, sector)` pairs; the plan is the shortest prefix of
//! that table covering the declared size, followed by the region's metadata
//! sector when it has one. Because the table is walked in order, a larger
//! size can only extend the image part of the plan.

use heapless::Vec;

use crate::error::{ConfigFault, Result};
use crate::layout::{FirmwareImageRequest, FlashMap};

/// Upper bound on the number of sectors in one plan
pub const MAX_PLAN_SECTORS: usize = 16;

/// Ordered sector indices to erase for one request
pub type EraseSequence = Vec<u8, MAX_PLAN_SECTORS>;

/// Plan the erase for an image request
///
/// Returns the sectors in ascending order, each at most once. Fails with
/// [`ConfigFault::ImageTooLarge`] if the declared size exceeds the region.
pub fn plan_erase(map: &FlashMap, request: &FirmwareImageRequest) -> Result<EraseSequence> {
    let region = map.region(request.kind);

    if request.declared_size > region.max_size {
        return Err(ConfigFault::ImageTooLarge {
            kind: request.kind,
            declared: request.declared_size,
            max: region.max_size,
        }
        .into());
    }

    let mut plan = EraseSequence::new();
    let mut covered = 0u32;

    for step in region.plan {
        if covered >= request.declared_size {
            break;
        }
        push(&mut plan, step.sector)?;
        covered = step.threshold;
    }

    if let Some(meta) = region.metadata_sector {
        if !plan.contains(&meta) {
            push(&mut plan, meta)?;
        }
    }

    log::trace!(
        "erase plan for {} image of {} bytes: {:?}",
        request.kind,
        request.declared_size,
        plan
    );

    Ok(plan)
}

/// Total bytes a plan erases
pub fn plan_size(map: &FlashMap, plan: &[u8]) -> u32 {
    plan.iter()
        .filter_map(|&index| map.sector(index))
        .map(|sector| sector.capacity)
        .sum()
}

fn push(plan: &mut EraseSequence, sector: u8) -> Result<()> {
    debug_assert!(plan.last().map_or(true, |&last| last < sector));
    plan.push(sector).map_err(|_| ConfigFault::InvalidMap.into())
}
