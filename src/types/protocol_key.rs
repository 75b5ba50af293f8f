/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Identity of a single binary agreement instance.

use std::fmt::{self, Display, Formatter};

use borsh::{BorshDeserialize, BorshSerialize};

use super::data_types::{BlockHeight, ParticipantIndex};

/// The `(height, proposer)` pair that identifies one [`BinaryAgreement`](crate::binary_agreement::BinaryAgreement).
///
/// Keys are ordered by height first and proposer second. The derived `Ord` relies on the field order
/// below, so `height` must stay the first field.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, BorshSerialize, BorshDeserialize,
)]
pub struct ProtocolKey {
    pub height: BlockHeight,
    pub proposer: ParticipantIndex,
}

impl ProtocolKey {
    pub const fn new(height: BlockHeight, proposer: ParticipantIndex) -> Self {
        Self { height, proposer }
    }
}

impl Display for ProtocolKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.height, self.proposer)
    }
}
