//! Deterministic settlement permutation (§4.5 PERMUTATION): every
//! participant derives σ independently from public data, so the shuffle
//! that breaks the link between setup and settlement outputs never
//! requires trusting the coordinator.

use lotus_primitives::hash::sha256_concat;

/// Derives σ: `{0..g-1} -> {0..g-1}` for one group from
/// `SHA-256("swapsig/perm" ‖ poolId ‖ groupIndex ‖ concat(finalAddresses))`,
/// expanded into a Fisher-Yates shuffle of `0..addresses.len()`.
pub fn derive_permutation(
    pool_id: &[u8; 32],
    group_index: u32,
    final_addresses: &[String],
) -> Vec<usize> {
    let joined = final_addresses.concat();
    let seed = sha256_concat(&[
        b"swapsig/perm",
        pool_id,
        &group_index.to_be_bytes(),
        joined.as_bytes(),
    ]);
    fisher_yates_from_seed(seed, final_addresses.len())
}

/// Expands a 32-byte seed into `n` pseudo-random draws via counter-mode
/// SHA-256, driving an in-place Fisher-Yates shuffle.
fn fisher_yates_from_seed(seed: [u8; 32], n: usize) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..n).collect();
    for i in (1..n).rev() {
        let counter = (n - 1 - i) as u32;
        let digest = sha256_concat(&[&seed, &counter.to_be_bytes()]);
        let draw = u64::from_be_bytes(digest[0..8].try_into().unwrap());
        let j = (draw % (i as u64 + 1)) as usize;
        indices.swap(i, j);
    }
    indices
}

/// `settlementMapping = σ(group's addresses)`: the address each member of
/// the group pays out to, by settlement-session signer order.
pub fn apply_permutation(sigma: &[usize], addresses: &[String]) -> Vec<String> {
    sigma.iter().map(|&i| addresses[i].clone()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addrs(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("addr-{i}")).collect()
    }

    #[test]
    fn deterministic_given_same_inputs() {
        let pool_id = [7u8; 32];
        let a = derive_permutation(&pool_id, 0, &addrs(5));
        let b = derive_permutation(&pool_id, 0, &addrs(5));
        assert_eq!(a, b);
    }

    #[test]
    fn is_a_bijection_on_the_group() {
        let pool_id = [3u8; 32];
        let mut sigma = derive_permutation(&pool_id, 2, &addrs(10));
        sigma.sort_unstable();
        assert_eq!(sigma, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn differs_across_group_index_and_pool_id() {
        let pool_id = [1u8; 32];
        let other_pool_id = [2u8; 32];
        let a = addrs(6);
        assert_ne!(
            derive_permutation(&pool_id, 0, &a),
            derive_permutation(&pool_id, 1, &a)
        );
        assert_ne!(
            derive_permutation(&pool_id, 0, &a),
            derive_permutation(&other_pool_id, 0, &a)
        );
    }

    #[test]
    fn mapping_reassigns_every_address_exactly_once() {
        let pool_id = [9u8; 32];
        let a = addrs(4);
        let sigma = derive_permutation(&pool_id, 0, &a);
        let mapped = apply_permutation(&sigma, &a);
        let mut sorted_mapped = mapped.clone();
        sorted_mapped.sort();
        let mut sorted_a = a.clone();
        sorted_a.sort();
        assert_eq!(sorted_mapped, sorted_a);
    }
}
