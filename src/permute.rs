/* ---------------------------------------------------------------------------
 *  Within-block permutation of segment labels
 * ---------------------------------------------------------------------------
 * Under the null hypothesis a household's segment within its block carries no
 * information about its values, so segment labels are exchangeable inside a
 * block. Each block group's labels are shuffled in place (Fisher-Yates), which
 * keeps the block's multiset of labels intact: every label is reused exactly
 * once per block per iteration. Blocks are visited in ascending key order so
 * a seed fully determines the result.
 */

use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_xorshift::XorShiftRng;

use crate::table::HouseholdTable;

/// Permuted segment ids for every row, drawn with the caller's generator.
pub fn permute_with<R: Rng + ?Sized>(table: &HouseholdTable, rng: &mut R) -> Vec<usize> {
    let segment_ids = table.segment_ids();
    let mut permuted = segment_ids.to_vec();
    let mut pool = Vec::new();

    for rows in table.groups() {
        pool.clear();
        pool.extend(rows.iter().map(|&r| segment_ids[r]));
        pool.shuffle(rng);
        for (&row, &label) in rows.iter().zip(&pool) {
            permuted[row] = label;
        }
    }

    permuted
}

/// The generator used for iteration `seed`.
pub fn seeded_rng(seed: u64) -> XorShiftRng {
    XorShiftRng::seed_from_u64(seed)
}

/// Shuffles segment labels within each block using `seed`, appends the result
/// as `<segment>_permuted_<seed>` and returns that column name.
pub fn permute(table: &mut HouseholdTable, seed: u64) -> String {
    let mut rng = seeded_rng(seed);
    let permuted = permute_with(table, &mut rng);
    let name = table.schema().permuted_column(seed);
    table.push_permuted(name.clone(), permuted);
    name
}
