/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Quorum arithmetic.
//!
//! For a participant set of `N` members this crate tolerates `f = ⌊(N-1)/3⌋` Byzantine members and
//! uses two thresholds:
//! - The **weak quorum**, `⌊N/3⌋ + 1`. Any set of this size contains at least one correct member, since
//!   `⌊N/3⌋ >= f`.
//! - The **strong quorum**, `N - ⌊N/3⌋`. Two sets of this size intersect in at least `N - 2⌊N/3⌋`
//!   members, which is at least `f + 1`, so they share a correct member. A strong quorum is also never
//!   larger than `N - f`, so it is reachable with all faulty members silent.
//!
//! | N | f | weak | strong |
//! |---|---|------|--------|
//! | 4 | 1 | 2    | 3      |
//! | 5 | 1 | 2    | 4      |
//! | 7 | 2 | 3    | 5      |
//! | 10| 3 | 4    | 7      |

use super::data_types::NodeCount;

/// The maximum number of Byzantine participants tolerated in a participant set of `node_count`.
pub const fn max_faulty(node_count: NodeCount) -> u64 {
    node_count.int().saturating_sub(1) / 3
}

/// `⌊N/3⌋ + 1`.
pub const fn weak_quorum(node_count: NodeCount) -> u64 {
    node_count.int() / 3 + 1
}

/// `N - ⌊N/3⌋`.
pub const fn strong_quorum(node_count: NodeCount) -> u64 {
    node_count.int() - node_count.int() / 3
}

pub const fn is_weak_quorum(count: u64, node_count: NodeCount) -> bool {
    count >= weak_quorum(node_count)
}

pub const fn is_strong_quorum(count: u64, node_count: NodeCount) -> bool {
    count >= strong_quorum(node_count)
}
