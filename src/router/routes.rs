// Route types and route invariants
// This file defines the typed route model produced by the codec: hop
// actions, pool payloads, and single/split route shapes

use alloy_primitives::{Address, U256};
use serde::Serialize;

use crate::errors::{DomainError, ErrorCode};

/// Upper bound on hops per (sub-)route accepted by the decoder.
pub const MAX_HOPS: usize = 8;

/// Upper bound on sub-routes in a split route.
pub const MAX_SPLITS: usize = 4;

/// One atomic routed action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ActionKind {
    /// Swap through a concentrated-liquidity pool.
    SwapCl,
    /// Swap through a bin (discrete-tick) pool.
    SwapBin,
    /// Wrap underlying into yield-bearing vault shares.
    Wrap,
    /// Unwrap vault shares back into underlying.
    Unwrap,
}

impl ActionKind {
    pub fn wire_code(&self) -> u8 {
        match self {
            ActionKind::SwapCl => 0x01,
            ActionKind::SwapBin => 0x02,
            ActionKind::Wrap => 0x03,
            ActionKind::Unwrap => 0x04,
        }
    }

    pub fn from_wire_code(code: u8) -> Option<Self> {
        match code {
            0x01 => Some(ActionKind::SwapCl),
            0x02 => Some(ActionKind::SwapBin),
            0x03 => Some(ActionKind::Wrap),
            0x04 => Some(ActionKind::Unwrap),
            _ => None,
        }
    }
}

/// Action-specific pool payload carried by a hop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum PoolPayload {
    SwapCl {
        token0: Address,
        token1: Address,
        /// Fee tier in hundredths of a bip.
        fee: u32,
        tick_spacing: i32,
        hooks: Address,
        /// true when swapping token0 -> token1.
        zero_for_one: bool,
    },
    SwapBin {
        token0: Address,
        token1: Address,
        bin_step: u16,
        hooks: Address,
        zero_for_one: bool,
    },
    Vault {
        vault: Address,
        /// Route through the vault's liquidity buffer instead of the vault
        /// itself when set.
        use_buffer: bool,
    },
}

/// One hop of a route. `amount_in`/`amount_out` are quoted values; the wire
/// format does not carry them, so they are zero on a freshly decoded route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteHop {
    pub action: ActionKind,
    pub token_in: Address,
    pub token_out: Address,
    pub amount_in: U256,
    pub amount_out: U256,
    pub payload: PoolPayload,
}

impl RouteHop {
    pub fn new(action: ActionKind, token_in: Address, token_out: Address, payload: PoolPayload) -> Self {
        Self {
            action,
            token_in,
            token_out,
            amount_in: U256::ZERO,
            amount_out: U256::ZERO,
            payload,
        }
    }
}

/// One weighted path of a split route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubRoute {
    pub hops: Vec<RouteHop>,
    /// Absolute input-amount allocation for this path.
    pub amount_in: U256,
}

/// A decoded route: a single ordered hop sequence, or a set of sub-routes
/// with absolute input allocations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum DecodedRoute {
    Single(Vec<RouteHop>),
    Split(Vec<SubRoute>),
}

impl DecodedRoute {
    /// Total input amount. For split routes this is the exact sum of the
    /// sub-route allocations; fails on U256 overflow.
    pub fn total_amount_in(&self) -> Result<Option<U256>, DomainError> {
        match self {
            DecodedRoute::Single(_) => Ok(None),
            DecodedRoute::Split(subs) => {
                let mut total = U256::ZERO;
                for sub in subs {
                    total = total.checked_add(sub.amount_in).ok_or_else(|| {
                        DomainError::malformed_route(
                            "split allocation sum overflows",
                            format!("{} sub-routes", subs.len()),
                        )
                    })?;
                }
                Ok(Some(total))
            }
        }
    }

    /// Input token of the route (first hop of the first path).
    pub fn first_token_in(&self) -> Option<Address> {
        match self {
            DecodedRoute::Single(hops) => hops.first().map(|h| h.token_in),
            DecodedRoute::Split(subs) => subs.first().and_then(|s| s.hops.first()).map(|h| h.token_in),
        }
    }

    /// Output token of the route (last hop of the first path).
    pub fn last_token_out(&self) -> Option<Address> {
        match self {
            DecodedRoute::Single(hops) => hops.last().map(|h| h.token_out),
            DecodedRoute::Split(subs) => subs.first().and_then(|s| s.hops.last()).map(|h| h.token_out),
        }
    }

    /// Hop linkage invariant: within each path, hop n's output token is hop
    /// n+1's input token. Addresses compare as raw bytes, never as strings.
    pub fn ensure_contiguous(&self) -> Result<(), DomainError> {
        fn check(hops: &[RouteHop], path: usize) -> Result<(), DomainError> {
            for (i, pair) in hops.windows(2).enumerate() {
                if pair[0].token_out != pair[1].token_in {
                    return Err(DomainError::malformed_route(
                        "route hops are not contiguous",
                        format!(
                            "path {path} hop {i}: out 0x{} != next in 0x{}",
                            hex::encode(pair[0].token_out),
                            hex::encode(pair[1].token_in)
                        ),
                    ));
                }
            }
            Ok(())
        }
        match self {
            DecodedRoute::Single(hops) => check(hops, 0),
            DecodedRoute::Split(subs) => {
                for (p, sub) in subs.iter().enumerate() {
                    check(&sub.hops, p)?;
                }
                Ok(())
            }
        }
    }

    /// Split allocations must cover the declared route input exactly.
    pub fn ensure_allocations(&self, amount_in: U256) -> Result<(), DomainError> {
        if let Some(total) = self.total_amount_in()? {
            if total != amount_in {
                return Err(DomainError::malformed_route(
                    "split allocations do not sum to route input",
                    format!("allocated {total}, declared {amount_in}"),
                ));
            }
        }
        Ok(())
    }

    /// Failure code for a reverted execution receipt. A route made solely of
    /// wrap (resp. unwrap) hops reverts as a wrap (resp. unwrap); anything
    /// carrying a swap reverts as a swap.
    pub fn revert_kind(&self) -> ErrorCode {
        let hops: Vec<&RouteHop> = match self {
            DecodedRoute::Single(hops) => hops.iter().collect(),
            DecodedRoute::Split(subs) => subs.iter().flat_map(|s| s.hops.iter()).collect(),
        };
        if !hops.is_empty() && hops.iter().all(|h| h.action == ActionKind::Wrap) {
            ErrorCode::WrapReverted
        } else if !hops.is_empty() && hops.iter().all(|h| h.action == ActionKind::Unwrap) {
            ErrorCode::UnwrapReverted
        } else {
            ErrorCode::SwapReverted
        }
    }
}
