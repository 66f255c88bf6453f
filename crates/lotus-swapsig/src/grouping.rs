//! Group-sizing strategy for SwapSig pools (§4.5 PERMUTATION prerequisite):
//! registration closes on a flat participant count, and that count alone
//! picks a MuSig2 group size. Larger pools get larger groups, which widens
//! the anonymity set each settlement session provides.

/// The MuSig2 group size for a closed registration of `count` participants.
pub fn group_size_for(count: usize) -> usize {
    match count {
        0..=9 => 2,
        10..=14 => 3,
        15..=49 => 5,
        _ => 10,
    }
}

/// Partitions participant indices `0..count` into same-size groups of
/// `group_size_for(count)`. Any remainder too small to form another full
/// group is returned separately rather than force-fit into an undersized
/// group.
pub fn form_groups(count: usize) -> (Vec<Vec<usize>>, Vec<usize>) {
    let size = group_size_for(count);
    let full_groups = count / size;
    let groups = (0..full_groups)
        .map(|g| (g * size..(g + 1) * size).collect())
        .collect();
    let deferred = (full_groups * size..count).collect();
    (groups, deferred)
}
