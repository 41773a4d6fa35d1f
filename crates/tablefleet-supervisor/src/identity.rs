//! Worker identity allocation.

use tablefleet_types::WorkerId;

/// Lowest identity not in `in_use`.
///
/// This is the first gap in the sorted identities, or the count when there
/// is none. Callers include retiring identities in `in_use` so an identity
/// is only reused after its previous holder is gone.
pub fn allocate_identity<I>(in_use: I) -> WorkerId
where
    I: IntoIterator<Item = WorkerId>,
{
    let mut ids: Vec<u32> = in_use.into_iter().map(|id| id.get()).collect();
    ids.sort_unstable();
    ids.dedup();

    let gap = ids
        .iter()
        .enumerate()
        .find(|(index, id)| **id as usize != *index)
        .map(|(index, _)| index)
        .unwrap_or(ids.len());
    WorkerId(gap as u32)
}
