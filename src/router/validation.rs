// Pre-flight validation module
// Quote-guard checks that run strictly before any wallet interaction:
// amounts, deadline bounds, min-output sanity, slippage tolerance

use alloy_primitives::U256;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::warn;

use crate::errors::{DomainError, ErrorCode};
use crate::router::execution::{ExecutionRequest, RouteSource};
use crate::router::{codec, routes::DecodedRoute};

/// Deadlines closer than this are rejected: the transaction would expire
/// while still in the mempool.
pub const MIN_DEADLINE_WINDOW_SECS: u64 = 30;

/// Deadlines further out than this are rejected.
pub const MAX_DEADLINE_WINDOW_SECS: u64 = 3600;

/// Slippage above this (in bps) is rejected outright.
pub const MAX_SLIPPAGE_BPS: i64 = 5000;

/// Slippage at or above this (in bps) is allowed but logged.
pub const WARN_SLIPPAGE_BPS: i64 = 1000;

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

pub fn assert_positive_amount(amount: U256) -> Result<(), DomainError> {
    if amount.is_zero() {
        return Err(DomainError::guard(
            ErrorCode::ZeroAmount,
            "amount must be greater than zero",
        ));
    }
    Ok(())
}

pub fn assert_valid_deadline(deadline_unix: u64) -> Result<(), DomainError> {
    assert_valid_deadline_at(deadline_unix, unix_now())
}

/// Deadline bounds against an explicit clock.
pub fn assert_valid_deadline_at(deadline_unix: u64, now_unix: u64) -> Result<(), DomainError> {
    if deadline_unix <= now_unix {
        return Err(DomainError::guard(
            ErrorCode::DeadlineExpired,
            format!("deadline {deadline_unix} is in the past (now {now_unix})"),
        ));
    }
    let window = deadline_unix - now_unix;
    if window < MIN_DEADLINE_WINDOW_SECS {
        return Err(DomainError::guard(
            ErrorCode::DeadlineTooSoon,
            format!("deadline {window}s away; minimum {MIN_DEADLINE_WINDOW_SECS}s"),
        ));
    }
    if window > MAX_DEADLINE_WINDOW_SECS {
        return Err(DomainError::guard(
            ErrorCode::DeadlineTooFar,
            format!("deadline {window}s away; maximum {MAX_DEADLINE_WINDOW_SECS}s"),
        ));
    }
    Ok(())
}

/// Min-output sanity. Hard-fails only on zero inputs; the 50%-of-input
/// heuristic is decimal-normalized and logs a warning without failing, so
/// legitimate cross-asset swaps are never blocked.
pub fn assert_valid_min_amount_out(
    amount_in: U256,
    min_amount_out: U256,
    in_decimals: u8,
    out_decimals: u8,
) -> Result<(), DomainError> {
    if amount_in.is_zero() {
        return Err(DomainError::guard(
            ErrorCode::ZeroAmountIn,
            "input amount must be greater than zero",
        ));
    }
    if min_amount_out.is_zero() {
        return Err(DomainError::guard(
            ErrorCode::ZeroMinOutput,
            "minimum output must be greater than zero",
        ));
    }

    // Normalize to a common decimal basis: in * 10^out_dec vs out * 10^in_dec.
    let in_scale = U256::from(10u64).pow(U256::from(out_decimals));
    let out_scale = U256::from(10u64).pow(U256::from(in_decimals));
    match (
        amount_in.checked_mul(in_scale),
        min_amount_out.checked_mul(out_scale),
    ) {
        (Some(norm_in), Some(norm_out)) => {
            if norm_out < norm_in / U256::from(2u64) {
                warn!(
                    amount_in = %amount_in,
                    min_amount_out = %min_amount_out,
                    "minimum output below 50% of normalized input; check slippage settings"
                );
            }
        }
        _ => {
            // normalization overflowed; the heuristic is advisory only
            warn!("min-output heuristic skipped: decimal normalization overflow");
        }
    }
    Ok(())
}

pub fn validate_slippage(slippage_bps: i64) -> Result<(), DomainError> {
    if slippage_bps < 0 {
        return Err(DomainError::guard(
            ErrorCode::InvalidSlippage,
            format!("slippage {slippage_bps} bps is negative"),
        ));
    }
    if slippage_bps > MAX_SLIPPAGE_BPS {
        return Err(DomainError::guard(
            ErrorCode::SlippageTooHigh,
            format!("slippage {slippage_bps} bps exceeds maximum {MAX_SLIPPAGE_BPS}"),
        ));
    }
    if slippage_bps >= WARN_SLIPPAGE_BPS {
        warn!(slippage_bps, "slippage tolerance is high");
    }
    Ok(())
}

/// Run every pre-flight guard against an execution request and return the
/// decoded route for the orchestrator. A failure here must never reach the
/// signing step; all checks are synchronous.
pub fn validate_before_execution(
    request: &ExecutionRequest,
    in_decimals: u8,
    out_decimals: u8,
) -> Result<DecodedRoute, DomainError> {
    assert_positive_amount(request.amount_in)?;
    assert_valid_min_amount_out(
        request.amount_in,
        request.min_amount_out,
        in_decimals,
        out_decimals,
    )?;
    assert_valid_deadline(request.deadline)?;

    let route = match &request.route {
        RouteSource::Decoded(route) => route.clone(),
        RouteSource::Raw(bytes) => codec::decode(bytes)?,
    };
    route.ensure_contiguous()?;
    route.ensure_allocations(request.amount_in)?;
    Ok(route)
}
