// Gas estimation module
// Live gas estimates with a deterministic route-aware fallback, so a flaky
// estimation RPC never blocks an otherwise-valid swap

use tracing::warn;

use crate::chain::{ChainClient, RawTxError, TxRequest};
use crate::router::routes::{ActionKind, RouteHop};

/// Fixed base cost of a router execution (call overhead + settlement).
pub const GAS_BASE: u64 = 120_000;
/// Per-hop costs by action.
pub const GAS_PER_CL_SWAP: u64 = 110_000;
pub const GAS_PER_BIN_SWAP: u64 = 95_000;
pub const GAS_PER_WRAP: u64 = 60_000;
pub const GAS_PER_UNWRAP: u64 = 60_000;
/// Flat safety margin on top of the fallback sum.
pub const GAS_SAFETY_MARGIN: u64 = 40_000;

#[derive(Debug, Clone)]
pub struct GasConfig {
    /// Percentage buffer applied to every estimate.
    pub buffer_percent: u64,
    pub floor: u64,
    pub ceiling: u64,
}

impl Default for GasConfig {
    fn default() -> Self {
        Self {
            buffer_percent: 20,
            floor: 100_000,
            ceiling: 2_000_000,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct GasEstimator {
    config: GasConfig,
}

impl GasEstimator {
    pub fn new(config: GasConfig) -> Self {
        Self { config }
    }

    /// Gas limit for a transaction. Uses the live estimate when the chain
    /// collaborator can produce one; falls back to the per-action constant
    /// sum only when the estimate call itself fails at the transport level.
    /// A revert from the estimator is a real execution failure and
    /// propagates to the caller.
    pub async fn estimate<C: ChainClient>(
        &self,
        chain: &C,
        tx: &TxRequest,
        hops: Option<&[RouteHop]>,
    ) -> Result<u64, RawTxError> {
        match chain.estimate_gas(tx).await {
            Ok(estimate) => Ok(self.apply_buffer_and_clamp(estimate)),
            Err(err @ RawTxError::Revert(_)) | Err(err @ RawTxError::Rejected(_)) => Err(err),
            Err(err) => {
                let fallback = self.fallback_estimate(hops);
                warn!(
                    error = %err,
                    fallback_gas = fallback,
                    "live gas estimate unavailable; using route-derived fallback"
                );
                Ok(self.apply_buffer_and_clamp(fallback))
            }
        }
    }

    /// Deterministic conservative estimate from per-action constants. With
    /// no hops available, assumes a single CL swap.
    pub fn fallback_estimate(&self, hops: Option<&[RouteHop]>) -> u64 {
        let hop_sum = match hops {
            Some(hops) => hops.iter().map(|h| Self::hop_cost(h.action)).sum::<u64>(),
            None => GAS_PER_CL_SWAP,
        };
        GAS_BASE + hop_sum + GAS_SAFETY_MARGIN
    }

    fn hop_cost(action: ActionKind) -> u64 {
        match action {
            ActionKind::SwapCl => GAS_PER_CL_SWAP,
            ActionKind::SwapBin => GAS_PER_BIN_SWAP,
            ActionKind::Wrap => GAS_PER_WRAP,
            ActionKind::Unwrap => GAS_PER_UNWRAP,
        }
    }

    /// Buffer then clamp to the configured bounds.
    pub fn apply_buffer_and_clamp(&self, gas: u64) -> u64 {
        let buffered = (gas as u128) * (100 + self.config.buffer_percent as u128) / 100;
        let buffered = u64::try_from(buffered).unwrap_or(u64::MAX);
        buffered.clamp(self.config.floor, self.config.ceiling)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::RevertData;
    use alloy_primitives::{Address, Bytes, U256};

    enum Behavior {
        Ok(u64),
        Rpc,
        Revert,
    }

    struct StubChain {
        behavior: Behavior,
    }

    impl ChainClient for StubChain {
        async fn call(&self, _to: Address, _data: Bytes) -> Result<Bytes, RawTxError> {
            unimplemented!("not used by the estimator")
        }

        async fn simulate(&self, _tx: &TxRequest) -> Result<(), RawTxError> {
            unimplemented!("not used by the estimator")
        }

        async fn estimate_gas(&self, _tx: &TxRequest) -> Result<u64, RawTxError> {
            match self.behavior {
                Behavior::Ok(gas) => Ok(gas),
                Behavior::Rpc => Err(RawTxError::Rpc("connection reset".into())),
                Behavior::Revert => Err(RawTxError::Revert(RevertData::default())),
            }
        }

        async fn block_number(&self) -> Result<u64, RawTxError> {
            Ok(0)
        }
    }

    fn tx() -> TxRequest {
        TxRequest {
            from: Address::ZERO,
            to: Address::ZERO,
            data: Bytes::new(),
            value: U256::ZERO,
            gas: None,
        }
    }

    #[tokio::test]
    async fn tiny_estimate_clamps_to_floor() {
        let estimator = GasEstimator::default();
        let chain = StubChain {
            behavior: Behavior::Ok(10),
        };
        let gas = estimator.estimate(&chain, &tx(), None).await.unwrap();
        assert_eq!(gas, 100_000);
    }

    #[tokio::test]
    async fn huge_estimate_clamps_to_ceiling() {
        let estimator = GasEstimator::default();
        let chain = StubChain {
            behavior: Behavior::Ok(10_000_000),
        };
        let gas = estimator.estimate(&chain, &tx(), None).await.unwrap();
        assert_eq!(gas, 2_000_000);
    }

    #[tokio::test]
    async fn buffer_applies_between_bounds() {
        let estimator = GasEstimator::default();
        let chain = StubChain {
            behavior: Behavior::Ok(500_000),
        };
        let gas = estimator.estimate(&chain, &tx(), None).await.unwrap();
        assert_eq!(gas, 600_000);
    }

    #[tokio::test]
    async fn transport_failure_uses_route_fallback() {
        use crate::router::routes::{PoolPayload, RouteHop};

        let estimator = GasEstimator::default();
        let chain = StubChain {
            behavior: Behavior::Rpc,
        };
        let hops = vec![
            RouteHop::new(
                ActionKind::Wrap,
                Address::ZERO,
                Address::ZERO,
                PoolPayload::Vault {
                    vault: Address::ZERO,
                    use_buffer: false,
                },
            ),
            RouteHop::new(
                ActionKind::SwapCl,
                Address::ZERO,
                Address::ZERO,
                PoolPayload::Vault {
                    vault: Address::ZERO,
                    use_buffer: false,
                },
            ),
        ];
        let gas = estimator.estimate(&chain, &tx(), Some(&hops)).await.unwrap();
        // (base + wrap + cl + margin) * 1.2
        let expected = (GAS_BASE + GAS_PER_WRAP + GAS_PER_CL_SWAP + GAS_SAFETY_MARGIN) * 120 / 100;
        assert_eq!(gas, expected);
    }

    #[tokio::test]
    async fn estimator_revert_propagates() {
        let estimator = GasEstimator::default();
        let chain = StubChain {
            behavior: Behavior::Revert,
        };
        let err = estimator.estimate(&chain, &tx(), None).await.unwrap_err();
        assert!(matches!(err, RawTxError::Revert(_)));
    }

    #[tokio::test]
    async fn fallback_without_hops_assumes_single_swap() {
        let estimator = GasEstimator::default();
        let chain = StubChain {
            behavior: Behavior::Rpc,
        };
        let gas = estimator.estimate(&chain, &tx(), None).await.unwrap();
        let expected = (GAS_BASE + GAS_PER_CL_SWAP + GAS_SAFETY_MARGIN) * 120 / 100;
        assert_eq!(gas, expected);
    }
}
