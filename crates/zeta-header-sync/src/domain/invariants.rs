//! # Domain Invariants
//!
//! Linkage rules that must always hold between a stored header and its
//! parent.

use num_bigint::BigUint;

use super::entities::HeaderLinkage;
use super::errors::HeaderSyncError;

/// Linkage a child takes given its parent's linkage and its own work.
///
/// Returns `Floating` when the parent is itself floating.
pub fn child_linkage(parent: &HeaderLinkage, work: &BigUint) -> HeaderLinkage {
    match parent.height() {
        Some(height) => HeaderLinkage::Linked {
            height: height + 1,
            accumulated_work: parent.accumulated_work() + work,
        },
        None => HeaderLinkage::Floating,
    }
}

/// Invariant: a linked header sits one above its parent and carries the
/// parent's work plus its own.
pub fn invariant_linked_to_parent(
    parent: &HeaderLinkage,
    child: &HeaderLinkage,
    child_work: &BigUint,
) -> Result<(), HeaderSyncError> {
    let HeaderLinkage::Linked {
        height,
        accumulated_work,
    } = child
    else {
        return Ok(());
    };

    let Some(parent_height) = parent.height() else {
        return Err(HeaderSyncError::MalformedHeader(format!(
            "linked header at height {} has a floating parent",
            height
        )));
    };

    if *height != parent_height + 1 {
        return Err(HeaderSyncError::MalformedHeader(format!(
            "height mismatch: expected {}, got {}",
            parent_height + 1,
            height
        )));
    }

    if *accumulated_work != parent.accumulated_work() + child_work {
        return Err(HeaderSyncError::MalformedHeader(format!(
            "accumulated work mismatch at height {}",
            height
        )));
    }

    Ok(())
}
