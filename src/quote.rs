// Quote types and quote lifecycle
// A quote is immutable once received from the quoting service; staleness
// against the chain head is advisory and surfaced to the caller, never a
// hard execution gate (deadline and slippage checks gate execution)

use alloy_primitives::{Bytes, U256};
use serde::{Deserialize, Serialize};

use crate::errors::DomainError;
use crate::router::codec;
use crate::router::routes::DecodedRoute;

/// A quote older than this many blocks is considered stale.
pub const QUOTE_FRESHNESS_BLOCKS: u64 = 3;

pub const BPS_DENOMINATOR: u64 = 10_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    pub amount_out: U256,
    pub price_impact_bps: u32,
    pub gas_estimate: u64,
    /// Wall-clock seconds when the quote was produced.
    pub quoted_at: u64,
    /// Chain head when the quote was produced.
    pub quoted_at_block: u64,
    /// Packed route bytes, decoded on demand.
    pub encoded_route: Bytes,
    pub buffer_fee_bps: u32,
    /// Route is a direct vault-buffer hit with no pool hop.
    pub is_direct_buffer: bool,
}

impl Quote {
    /// Minimum acceptable output after applying a slippage tolerance.
    pub fn min_amount_out(&self, slippage_bps: u64) -> U256 {
        if slippage_bps >= BPS_DENOMINATOR {
            return U256::ZERO;
        }
        self.amount_out * U256::from(BPS_DENOMINATOR - slippage_bps) / U256::from(BPS_DENOMINATOR)
    }

    /// Advisory staleness against the current chain head.
    pub fn is_stale(&self, current_block: u64) -> bool {
        current_block.saturating_sub(self.quoted_at_block) > QUOTE_FRESHNESS_BLOCKS
    }

    pub fn age_blocks(&self, current_block: u64) -> u64 {
        current_block.saturating_sub(self.quoted_at_block)
    }

    pub fn decode_route(&self) -> Result<DecodedRoute, DomainError> {
        codec::decode(&self.encoded_route)
    }
}
