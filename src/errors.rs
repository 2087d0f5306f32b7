// Error types and error handling module
// This file defines the closed set of domain error codes and the
// DomainError carrier attached to execution state on failure

use serde::Serialize;
use thiserror::Error;

/// Closed set of domain error codes.
///
/// Guard codes are produced synchronously before any async work; contract
/// revert codes come out of the classifier's selector/name tables; infra
/// codes from message-pattern matching at the classification boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorCode {
    // codec
    MalformedRoute,

    // pre-flight guards
    ZeroAmount,
    ZeroAmountIn,
    ZeroMinOutput,
    InvalidSlippage,
    SlippageTooHigh,
    DeadlineTooSoon,
    DeadlineTooFar,

    // contract reverts: router domain
    DeadlineExpired,
    InsufficientOutput,
    TooMuchRequested,
    InvalidPath,
    InvalidRecipient,
    PriceLimitReached,
    NotEnoughLiquidity,
    SwapAmountCannotBeZero,
    NativeTransferFailed,
    CurrencyNotSettled,
    PoolNotInitialized,
    InvalidPoolKey,
    HookCallFailed,

    // contract reverts: quoter domain
    QuoteSwapFailed,
    UnexpectedRevertBytes,
    InvalidQuoteParams,
    QuoterLocked,

    // contract reverts: buffer domain
    InsufficientBuffer,
    WrapAmountTooSmall,
    UnwrapAmountTooSmall,
    VaultNotRegistered,
    VaultPaused,
    BufferNotInitialized,
    InvalidUnderlyingToken,

    // contract reverts: staker domain
    Unauthorized,
    StakeLocked,
    NothingToClaim,
    EpochNotFinalized,
    InvalidStakeAmount,
    StakerPaused,

    // wallet / lifecycle
    UserRejected,
    TxTimeout,
    ExecutionInFlight,
    ApprovalReverted,
    SwapReverted,
    WrapReverted,
    UnwrapReverted,

    // infra
    InsufficientBalance,
    NetworkError,
    GasPriceError,
    NonceError,

    // fallback
    UnknownError,
}

impl ErrorCode {
    /// Stable string form of the code. Contract revert codes render as the
    /// on-chain custom error name.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::MalformedRoute => "MalformedRoute",
            ErrorCode::ZeroAmount => "ZeroAmount",
            ErrorCode::ZeroAmountIn => "ZeroAmountIn",
            ErrorCode::ZeroMinOutput => "ZeroMinOutput",
            ErrorCode::InvalidSlippage => "InvalidSlippage",
            ErrorCode::SlippageTooHigh => "SlippageTooHigh",
            ErrorCode::DeadlineTooSoon => "DeadlineTooSoon",
            ErrorCode::DeadlineTooFar => "DeadlineTooFar",
            ErrorCode::DeadlineExpired => "DeadlineExpired",
            ErrorCode::InsufficientOutput => "InsufficientOutput",
            ErrorCode::TooMuchRequested => "TooMuchRequested",
            ErrorCode::InvalidPath => "InvalidPath",
            ErrorCode::InvalidRecipient => "InvalidRecipient",
            ErrorCode::PriceLimitReached => "PriceLimitReached",
            ErrorCode::NotEnoughLiquidity => "NotEnoughLiquidity",
            ErrorCode::SwapAmountCannotBeZero => "SwapAmountCannotBeZero",
            ErrorCode::NativeTransferFailed => "NativeTransferFailed",
            ErrorCode::CurrencyNotSettled => "CurrencyNotSettled",
            ErrorCode::PoolNotInitialized => "PoolNotInitialized",
            ErrorCode::InvalidPoolKey => "InvalidPoolKey",
            ErrorCode::HookCallFailed => "HookCallFailed",
            ErrorCode::QuoteSwapFailed => "QuoteSwapFailed",
            ErrorCode::UnexpectedRevertBytes => "UnexpectedRevertBytes",
            ErrorCode::InvalidQuoteParams => "InvalidQuoteParams",
            ErrorCode::QuoterLocked => "QuoterLocked",
            ErrorCode::InsufficientBuffer => "InsufficientBuffer",
            ErrorCode::WrapAmountTooSmall => "WrapAmountTooSmall",
            ErrorCode::UnwrapAmountTooSmall => "UnwrapAmountTooSmall",
            ErrorCode::VaultNotRegistered => "VaultNotRegistered",
            ErrorCode::VaultPaused => "VaultPaused",
            ErrorCode::BufferNotInitialized => "BufferNotInitialized",
            ErrorCode::InvalidUnderlyingToken => "InvalidUnderlyingToken",
            ErrorCode::Unauthorized => "Unauthorized",
            ErrorCode::StakeLocked => "StakeLocked",
            ErrorCode::NothingToClaim => "NothingToClaim",
            ErrorCode::EpochNotFinalized => "EpochNotFinalized",
            ErrorCode::InvalidStakeAmount => "InvalidStakeAmount",
            ErrorCode::StakerPaused => "StakerPaused",
            ErrorCode::UserRejected => "UserRejected",
            ErrorCode::TxTimeout => "TxTimeout",
            ErrorCode::ExecutionInFlight => "ExecutionInFlight",
            ErrorCode::ApprovalReverted => "ApprovalReverted",
            ErrorCode::SwapReverted => "SwapReverted",
            ErrorCode::WrapReverted => "WrapReverted",
            ErrorCode::UnwrapReverted => "UnwrapReverted",
            ErrorCode::InsufficientBalance => "InsufficientBalance",
            ErrorCode::NetworkError => "NetworkError",
            ErrorCode::GasPriceError => "GasPriceError",
            ErrorCode::NonceError => "NonceError",
            ErrorCode::UnknownError => "UnknownError",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Domain error attached to execution state on failure. Immutable once
/// constructed; `message` is for logs, `user_message` for display.
#[derive(Debug, Clone, Error, Serialize)]
#[error("{code}: {message}")]
pub struct DomainError {
    pub code: ErrorCode,
    pub message: String,
    pub user_message: String,
    pub is_user_rejection: bool,
    pub is_retryable: bool,
    pub details: Option<String>,
}

impl DomainError {
    pub fn new(
        code: ErrorCode,
        message: impl Into<String>,
        user_message: impl Into<String>,
    ) -> Self {
        Self {
            code,
            message: message.into(),
            user_message: user_message.into(),
            is_user_rejection: false,
            is_retryable: false,
            details: None,
        }
    }

    /// Pre-flight guard failure: fatal to the attempt, never auto-retried.
    pub fn guard(code: ErrorCode, message: impl Into<String>) -> Self {
        let message = message.into();
        let user_message = message.clone();
        Self::new(code, message, user_message)
    }

    /// Codec failure with a byte-level detail string.
    pub fn malformed_route(message: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            details: Some(details.into()),
            ..Self::new(
                ErrorCode::MalformedRoute,
                message,
                "This quote's route could not be read. Refresh the quote and try again.",
            )
        }
    }

    pub fn user_rejected(message: impl Into<String>) -> Self {
        Self {
            is_user_rejection: true,
            is_retryable: true,
            ..Self::new(
                ErrorCode::UserRejected,
                message,
                "Transaction was rejected in your wallet.",
            )
        }
    }

    /// Ambiguous confirmation timeout. Not a definite failure of the
    /// underlying transaction: it may still land.
    pub fn tx_timeout(timeout_secs: u64, hash: impl Into<String>) -> Self {
        Self {
            details: Some(hash.into()),
            ..Self::new(
                ErrorCode::TxTimeout,
                format!("no confirmation within {timeout_secs}s"),
                "The transaction was not confirmed in time. It may still complete; check the explorer before retrying.",
            )
        }
    }

    pub fn retryable(mut self, retryable: bool) -> Self {
        self.is_retryable = retryable;
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}
