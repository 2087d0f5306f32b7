// Failure classification module
// Maps raw collaborator failures (wallet rejection, structured reverts,
// transport errors) into the closed DomainError set. This is the single
// place that decides whether an attempt is offered a retry

use once_cell::sync::Lazy;
use std::collections::HashMap;

use crate::chain::{selector, RawTxError, RevertData};
use crate::errors::{DomainError, ErrorCode};

/// One row of the revert table: an on-chain custom error name, its domain
/// code, display copy, and whether re-attempting can succeed.
struct RevertEntry {
    name: &'static str,
    code: ErrorCode,
    user_message: &'static str,
    retryable: bool,
}

/// Known contract reverts across the router, quoter, buffer, and staker
/// error domains. Retryable only where a fresh quote or later block can
/// change the outcome.
static REVERT_TABLE: &[RevertEntry] = &[
    // router
    RevertEntry {
        name: "DeadlineExpired",
        code: ErrorCode::DeadlineExpired,
        user_message: "The transaction deadline passed before execution. Get a fresh quote and retry.",
        retryable: true,
    },
    RevertEntry {
        name: "InsufficientOutput",
        code: ErrorCode::InsufficientOutput,
        user_message: "The price moved past your slippage tolerance. Get a fresh quote and retry.",
        retryable: true,
    },
    RevertEntry {
        name: "TooMuchRequested",
        code: ErrorCode::TooMuchRequested,
        user_message: "The route requested more input than allowed.",
        retryable: false,
    },
    RevertEntry {
        name: "InvalidPath",
        code: ErrorCode::InvalidPath,
        user_message: "The swap route is invalid.",
        retryable: false,
    },
    RevertEntry {
        name: "InvalidRecipient",
        code: ErrorCode::InvalidRecipient,
        user_message: "The recipient address is not allowed.",
        retryable: false,
    },
    RevertEntry {
        name: "PriceLimitReached",
        code: ErrorCode::PriceLimitReached,
        user_message: "The pool's price limit was reached.",
        retryable: false,
    },
    RevertEntry {
        name: "NotEnoughLiquidity",
        code: ErrorCode::NotEnoughLiquidity,
        user_message: "Not enough liquidity for this trade size.",
        retryable: false,
    },
    RevertEntry {
        name: "SwapAmountCannotBeZero",
        code: ErrorCode::SwapAmountCannotBeZero,
        user_message: "The swap amount is zero.",
        retryable: false,
    },
    RevertEntry {
        name: "NativeTransferFailed",
        code: ErrorCode::NativeTransferFailed,
        user_message: "Sending the native asset failed.",
        retryable: false,
    },
    RevertEntry {
        name: "CurrencyNotSettled",
        code: ErrorCode::CurrencyNotSettled,
        user_message: "The router did not settle all currencies.",
        retryable: false,
    },
    RevertEntry {
        name: "PoolNotInitialized",
        code: ErrorCode::PoolNotInitialized,
        user_message: "A pool on this route is not initialized.",
        retryable: false,
    },
    RevertEntry {
        name: "InvalidPoolKey",
        code: ErrorCode::InvalidPoolKey,
        user_message: "A pool on this route has an invalid key.",
        retryable: false,
    },
    RevertEntry {
        name: "HookCallFailed",
        code: ErrorCode::HookCallFailed,
        user_message: "A pool hook rejected this swap.",
        retryable: false,
    },
    // quoter
    RevertEntry {
        name: "QuoteSwapFailed",
        code: ErrorCode::QuoteSwapFailed,
        user_message: "The quote could not be executed.",
        retryable: false,
    },
    RevertEntry {
        name: "UnexpectedRevertBytes",
        code: ErrorCode::UnexpectedRevertBytes,
        user_message: "The quoter returned unexpected data.",
        retryable: false,
    },
    RevertEntry {
        name: "InvalidQuoteParams",
        code: ErrorCode::InvalidQuoteParams,
        user_message: "The quote parameters are invalid.",
        retryable: false,
    },
    RevertEntry {
        name: "QuoterLocked",
        code: ErrorCode::QuoterLocked,
        user_message: "The quoter is busy. Try again.",
        retryable: false,
    },
    // buffer
    RevertEntry {
        name: "InsufficientBuffer",
        code: ErrorCode::InsufficientBuffer,
        user_message: "The vault buffer is too shallow right now. Retry shortly.",
        retryable: true,
    },
    RevertEntry {
        name: "WrapAmountTooSmall",
        code: ErrorCode::WrapAmountTooSmall,
        user_message: "The amount is too small to wrap.",
        retryable: false,
    },
    RevertEntry {
        name: "UnwrapAmountTooSmall",
        code: ErrorCode::UnwrapAmountTooSmall,
        user_message: "The amount is too small to unwrap.",
        retryable: false,
    },
    RevertEntry {
        name: "VaultNotRegistered",
        code: ErrorCode::VaultNotRegistered,
        user_message: "This vault is not registered with the router.",
        retryable: false,
    },
    RevertEntry {
        name: "VaultPaused",
        code: ErrorCode::VaultPaused,
        user_message: "This vault is paused.",
        retryable: false,
    },
    RevertEntry {
        name: "BufferNotInitialized",
        code: ErrorCode::BufferNotInitialized,
        user_message: "The vault buffer is not initialized.",
        retryable: false,
    },
    RevertEntry {
        name: "InvalidUnderlyingToken",
        code: ErrorCode::InvalidUnderlyingToken,
        user_message: "The vault's underlying token does not match the route.",
        retryable: false,
    },
    // staker
    RevertEntry {
        name: "Unauthorized",
        code: ErrorCode::Unauthorized,
        user_message: "This account is not authorized for that action.",
        retryable: false,
    },
    RevertEntry {
        name: "StakeLocked",
        code: ErrorCode::StakeLocked,
        user_message: "The stake is still locked.",
        retryable: false,
    },
    RevertEntry {
        name: "NothingToClaim",
        code: ErrorCode::NothingToClaim,
        user_message: "There is nothing to claim.",
        retryable: false,
    },
    RevertEntry {
        name: "EpochNotFinalized",
        code: ErrorCode::EpochNotFinalized,
        user_message: "The current epoch is not finalized yet.",
        retryable: false,
    },
    RevertEntry {
        name: "InvalidStakeAmount",
        code: ErrorCode::InvalidStakeAmount,
        user_message: "The stake amount is invalid.",
        retryable: false,
    },
    RevertEntry {
        name: "StakerPaused",
        code: ErrorCode::StakerPaused,
        user_message: "Staking is paused.",
        retryable: false,
    },
];

/// Selector lookup, derived from the argless custom error signatures.
static BY_SELECTOR: Lazy<HashMap<[u8; 4], &'static RevertEntry>> = Lazy::new(|| {
    REVERT_TABLE
        .iter()
        .map(|entry| (selector(&format!("{}()", entry.name)), entry))
        .collect()
});

/// Name lookup for providers that resolve the error name themselves.
static BY_NAME: Lazy<HashMap<&'static str, &'static RevertEntry>> =
    Lazy::new(|| REVERT_TABLE.iter().map(|entry| (entry.name, entry)).collect());

const REJECTION_PHRASES: &[&str] = &[
    "user rejected",
    "user denied",
    "rejected the request",
    "action_rejected",
    "user cancelled",
];

const MAX_DISPLAY_LEN: usize = 160;

/// Classify a raw collaborator failure into a DomainError.
///
/// Dispatch order: wallet/user rejection, structured revert through the
/// name and selector tables, infra message patterns, unknown fallback.
pub fn classify(raw: &RawTxError) -> DomainError {
    match raw {
        RawTxError::Rejected(message) => DomainError::user_rejected(message.clone()),
        RawTxError::Revert(data) => classify_revert(data),
        RawTxError::Timeout(message) => DomainError::new(
            ErrorCode::NetworkError,
            format!("request timed out: {message}"),
            "The network request timed out. Try again.",
        )
        .retryable(true),
        RawTxError::Rpc(message) | RawTxError::Other(message) => classify_message(message),
    }
}

fn classify_revert(data: &RevertData) -> DomainError {
    let entry = data
        .name
        .as_deref()
        .and_then(|name| BY_NAME.get(name).copied())
        .or_else(|| data.selector.and_then(|sel| BY_SELECTOR.get(&sel).copied()));

    match entry {
        Some(entry) => DomainError::new(
            entry.code,
            format!("contract reverted with {}", entry.name),
            entry.user_message,
        )
        .retryable(entry.retryable)
        .with_details(format!("0x{}", hex::encode(&data.raw))),
        None => DomainError::new(
            ErrorCode::UnknownError,
            match data.selector {
                Some(sel) => format!("unrecognized revert selector 0x{}", hex::encode(sel)),
                None => "revert with no data".to_string(),
            },
            "The transaction would fail on-chain.",
        )
        .with_details(format!("0x{}", hex::encode(&data.raw))),
    }
}

fn classify_message(message: &str) -> DomainError {
    let lower = message.to_ascii_lowercase();

    if REJECTION_PHRASES.iter().any(|p| lower.contains(p)) {
        return DomainError::user_rejected(message.to_string());
    }
    if lower.contains("insufficient funds") {
        return DomainError::new(
            ErrorCode::InsufficientBalance,
            message.to_string(),
            "Not enough balance to cover this transaction and its gas.",
        );
    }
    if lower.contains("nonce") {
        return DomainError::new(
            ErrorCode::NonceError,
            message.to_string(),
            "A pending transaction is in the way. Wait for it or retry.",
        )
        .retryable(true);
    }
    if lower.contains("underpriced") || lower.contains("fee cap") || lower.contains("max fee per gas")
    {
        return DomainError::new(
            ErrorCode::GasPriceError,
            message.to_string(),
            "The gas price was too low. Retry with current network fees.",
        )
        .retryable(true);
    }
    if lower.contains("timeout")
        || lower.contains("timed out")
        || lower.contains("network")
        || lower.contains("connection")
        || lower.contains("unreachable")
    {
        return DomainError::new(
            ErrorCode::NetworkError,
            message.to_string(),
            "A network error interrupted the request. Try again.",
        )
        .retryable(true);
    }

    let mut display: String = message.replace('\n', " ").chars().take(MAX_DISPLAY_LEN).collect();
    if message.chars().count() > MAX_DISPLAY_LEN {
        display.push('…');
    }
    DomainError::new(
        ErrorCode::UnknownError,
        message.to_string(),
        format!("Something went wrong: {display}"),
    )
}
