// Execution engine - drives one user-initiated execution through approval,
// simulation, gas estimation, submission, and bounded-time confirmation
//
// The engine owns the execution state machine exclusively for the lifetime
// of one attempt. Failures are captured into the state, never thrown across
// the async boundary; every transition is broadcast synchronously

use alloy_primitives::{Bytes, B256, U256};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::chain::{
    erc20_allowance_calldata, erc20_approve_calldata, decode_u256_return,
    router_execute_calldata, ChainClient, InvalidationScope, RawTxError, ReceiptClient,
    ReceiptStatus, TxReceipt, TxRequest, WalletClient, NATIVE_TOKEN,
};
use crate::classify::classify;
use crate::errors::{DomainError, ErrorCode};
use crate::metrics::{CONFIRM_LATENCY, EXEC_OUTCOMES};
use crate::router::codec;
use crate::router::gas::{GasConfig, GasEstimator};
use crate::router::routes::DecodedRoute;

/// States of one execution attempt. `Idle` is both the initial state and
/// the state after an explicit reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum ExecutionState {
    Idle,
    Preparing,
    AwaitingApproval,
    Approving,
    PreparingExecution,
    AwaitingSignature,
    Pending,
    Confirming,
    Success,
    Failed,
    Rejected,
}

impl ExecutionState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ExecutionState::Success | ExecutionState::Failed | ExecutionState::Rejected
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionState::Idle => "idle",
            ExecutionState::Preparing => "preparing",
            ExecutionState::AwaitingApproval => "awaiting_approval",
            ExecutionState::Approving => "approving",
            ExecutionState::PreparingExecution => "preparing_execution",
            ExecutionState::AwaitingSignature => "awaiting_signature",
            ExecutionState::Pending => "pending",
            ExecutionState::Confirming => "confirming",
            ExecutionState::Success => "success",
            ExecutionState::Failed => "failed",
            ExecutionState::Rejected => "rejected",
        }
    }
}

/// Route input for an execution: already decoded, or the quoting service's
/// packed bytes (decoded during preparation; raw bytes are submitted
/// verbatim).
#[derive(Debug, Clone)]
pub enum RouteSource {
    Decoded(DecodedRoute),
    Raw(Bytes),
}

/// Validated input to the execution engine. Construct only after the
/// pre-flight guards have passed.
#[derive(Debug, Clone)]
pub struct ExecutionRequest {
    pub route: RouteSource,
    pub amount_in: U256,
    pub min_amount_out: U256,
    pub recipient: alloy_primitives::Address,
    /// Unix seconds.
    pub deadline: u64,
    /// Native value to attach when the input asset is the chain's native
    /// token.
    pub native_value: Option<U256>,
    pub unwrap_to_native: bool,
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub router: alloy_primitives::Address,
    pub account: alloy_primitives::Address,
    pub chain_id: u64,
    /// Bound on every receipt wait (approval and execution alike).
    pub confirmation_timeout: Duration,
    pub gas: GasConfig,
}

impl EngineConfig {
    pub fn new(
        router: alloy_primitives::Address,
        account: alloy_primitives::Address,
        chain_id: u64,
    ) -> Self {
        Self {
            router,
            account,
            chain_id,
            confirmation_timeout: Duration::from_secs(120),
            gas: GasConfig::default(),
        }
    }
}

type InvalidationHook = Arc<dyn Fn(InvalidationScope) + Send + Sync>;

#[derive(Default)]
struct Inner {
    state: Option<ExecutionState>,
    tx_hash: Option<B256>,
    approval_hash: Option<B256>,
    error: Option<DomainError>,
    route: Option<DecodedRoute>,
}

impl Inner {
    fn state(&self) -> ExecutionState {
        self.state.unwrap_or(ExecutionState::Idle)
    }
}

/// Outcome of an internal step: which terminal state the machine halts in.
enum Halt {
    Failed(DomainError),
    Rejected(DomainError),
}

enum WaitResult {
    Confirmed(TxReceipt),
    TimedOut,
    Failed(DomainError),
}

/// Single-flight execution engine. At most one attempt is active at a
/// time; a new attempt requires a reset from a terminal state first.
pub struct ExecutionEngine<C, W> {
    chain: Arc<C>,
    wallet: Arc<W>,
    config: EngineConfig,
    estimator: GasEstimator,
    inner: Mutex<Inner>,
    transitions: broadcast::Sender<ExecutionState>,
    cancel_requested: AtomicBool,
    on_settled: Option<InvalidationHook>,
}

impl<C, W> ExecutionEngine<C, W>
where
    C: ChainClient + ReceiptClient,
    W: WalletClient,
{
    pub fn new(chain: Arc<C>, wallet: Arc<W>, config: EngineConfig) -> Self {
        let (transitions, _) = broadcast::channel(64);
        let estimator = GasEstimator::new(config.gas.clone());
        Self {
            chain,
            wallet,
            config,
            estimator,
            inner: Mutex::new(Inner::default()),
            transitions,
            cancel_requested: AtomicBool::new(false),
            on_settled: None,
        }
    }

    /// Install the cache-invalidation sink fired when an execution settles
    /// successfully.
    pub fn with_invalidation_hook(
        mut self,
        hook: impl Fn(InvalidationScope) + Send + Sync + 'static,
    ) -> Self {
        self.on_settled = Some(Arc::new(hook));
        self
    }

    pub fn state(&self) -> ExecutionState {
        self.inner.lock().expect("engine lock").state()
    }

    /// Hash of the execution transaction, retained through every state
    /// after submission so callers can always link to it.
    pub fn transaction_hash(&self) -> Option<B256> {
        self.inner.lock().expect("engine lock").tx_hash
    }

    pub fn approval_hash(&self) -> Option<B256> {
        self.inner.lock().expect("engine lock").approval_hash
    }

    pub fn error(&self) -> Option<DomainError> {
        self.inner.lock().expect("engine lock").error.clone()
    }

    /// Observe state transitions. Transitions are sent synchronously at
    /// the moment they happen.
    pub fn subscribe(&self) -> broadcast::Receiver<ExecutionState> {
        self.transitions.subscribe()
    }

    /// Spawn a background task that traces every transition.
    pub fn spawn_transition_logger(&self) -> tokio::task::JoinHandle<()> {
        use futures::StreamExt;
        let mut stream = tokio_stream::wrappers::BroadcastStream::new(self.transitions.subscribe());
        tokio::spawn(async move {
            while let Some(Ok(state)) = stream.next().await {
                debug!(state = state.as_str(), "execution transition");
            }
        })
    }

    /// Request cooperative cancellation. Honored only before a signature
    /// has been requested; a broadcast transaction cannot be unsent.
    pub fn cancel(&self) {
        let state = self.state();
        if matches!(
            state,
            ExecutionState::AwaitingSignature | ExecutionState::Pending | ExecutionState::Confirming
        ) {
            warn!(state = state.as_str(), "cancel requested after signature; ignoring");
            return;
        }
        self.cancel_requested.store(true, Ordering::SeqCst);
    }

    /// Return to `Idle`. Valid from `Idle` and from any terminal state;
    /// an active attempt cannot be abandoned.
    pub fn reset(&self) -> Result<(), DomainError> {
        let mut inner = self.inner.lock().expect("engine lock");
        let state = inner.state();
        if !(state == ExecutionState::Idle || state.is_terminal()) {
            return Err(DomainError::new(
                ErrorCode::ExecutionInFlight,
                format!("cannot reset while {}", state.as_str()),
                "Wait for the current transaction to finish first.",
            ));
        }
        *inner = Inner::default();
        drop(inner);
        self.cancel_requested.store(false, Ordering::SeqCst);
        let _ = self.transitions.send(ExecutionState::Idle);
        Ok(())
    }

    /// Drive one validated request through the full lifecycle. Returns the
    /// terminal state; the error, if any, is captured on the engine.
    #[tracing::instrument(skip_all, fields(amount_in = %request.amount_in))]
    pub async fn execute(&self, request: ExecutionRequest) -> Result<ExecutionState, DomainError> {
        {
            let inner = self.inner.lock().expect("engine lock");
            if inner.state() != ExecutionState::Idle {
                return Err(DomainError::new(
                    ErrorCode::ExecutionInFlight,
                    format!("execution already {}", inner.state().as_str()),
                    "Another swap is already in progress.",
                ));
            }
        }
        self.set_state(ExecutionState::Preparing);

        match self.drive(&request).await {
            Ok(()) => Ok(self.state()),
            Err(Halt::Failed(err)) => {
                warn!(code = %err.code, error = %err.message, "execution failed");
                self.halt(ExecutionState::Failed, err);
                Ok(ExecutionState::Failed)
            }
            Err(Halt::Rejected(err)) => {
                info!("execution rejected by user");
                self.halt(ExecutionState::Rejected, err);
                Ok(ExecutionState::Rejected)
            }
        }
    }

    async fn drive(&self, request: &ExecutionRequest) -> Result<(), Halt> {
        // 1. Materialize the route; raw bytes are submitted verbatim.
        let (route, encoded) = match &request.route {
            RouteSource::Decoded(route) => {
                let encoded = codec::encode(route).map_err(Halt::Failed)?;
                (route.clone(), encoded)
            }
            RouteSource::Raw(bytes) => {
                let route = codec::decode(bytes).map_err(Halt::Failed)?;
                (route, bytes.clone())
            }
        };
        let token_in = route.first_token_in().ok_or_else(|| {
            Halt::Failed(DomainError::malformed_route("route has no hops", "empty route"))
        })?;
        self.inner.lock().expect("engine lock").route = Some(route.clone());

        // 2. Approval, if the input token needs one.
        self.check_cancel()?;
        if token_in != NATIVE_TOKEN {
            let allowance = self.read_allowance(token_in).await?;
            if allowance < request.amount_in {
                self.approve(token_in, request.amount_in).await?;
            } else {
                debug!(token = %token_in, "allowance sufficient; skipping approval");
            }
        }

        // 3. Dry-run the exact call before any signature is requested.
        self.set_state(ExecutionState::PreparingExecution);
        let mut tx = TxRequest {
            from: self.config.account,
            to: self.config.router,
            data: router_execute_calldata(
                &encoded,
                request.amount_in,
                request.min_amount_out,
                request.recipient,
                request.deadline,
                request.unwrap_to_native,
            ),
            value: request.native_value.unwrap_or(U256::ZERO),
            gas: None,
        };
        self.check_cancel()?;
        if let Err(raw) = self.chain.simulate(&tx).await {
            return Err(Halt::Failed(classify(&raw)));
        }

        // 4. Gas limit, with the route-aware fallback inside the estimator.
        let hops: Vec<_> = match &route {
            DecodedRoute::Single(hops) => hops.clone(),
            DecodedRoute::Split(subs) => subs.iter().flat_map(|s| s.hops.clone()).collect(),
        };
        let gas = self
            .estimator
            .estimate(self.chain.as_ref(), &tx, Some(&hops))
            .await
            .map_err(|raw| Halt::Failed(classify(&raw)))?;
        tx.gas = Some(gas);

        // 5. Signature and submission.
        self.check_cancel()?;
        self.set_state(ExecutionState::AwaitingSignature);
        let hash = match self.wallet.write_contract(&tx).await {
            Ok(hash) => hash,
            Err(RawTxError::Rejected(message)) => {
                return Err(Halt::Rejected(DomainError::user_rejected(message)))
            }
            Err(raw) => return Err(Halt::Failed(classify(&raw))),
        };
        self.inner.lock().expect("engine lock").tx_hash = Some(hash);
        info!(hash = %hash, gas, "transaction submitted");
        self.set_state(ExecutionState::Pending);

        // 6. Bounded confirmation wait.
        self.set_state(ExecutionState::Confirming);
        let submitted = Instant::now();
        match self.wait_bounded(hash).await {
            WaitResult::Confirmed(receipt) if receipt.status == ReceiptStatus::Success => {
                CONFIRM_LATENCY.observe(submitted.elapsed().as_secs_f64());
                self.settle_success();
                Ok(())
            }
            WaitResult::Confirmed(receipt) => {
                let code = route.revert_kind();
                Err(Halt::Failed(
                    DomainError::new(
                        code,
                        format!("transaction reverted in block {}", receipt.block_number),
                        "The transaction reverted on-chain. No funds were swapped.",
                    )
                    .with_details(format!("{hash}")),
                ))
            }
            WaitResult::TimedOut => Err(Halt::Failed(DomainError::tx_timeout(
                self.config.confirmation_timeout.as_secs(),
                format!("{hash}"),
            ))),
            WaitResult::Failed(err) => Err(Halt::Failed(err)),
        }
    }

    async fn read_allowance(&self, token: alloy_primitives::Address) -> Result<U256, Halt> {
        let calldata = erc20_allowance_calldata(self.config.account, self.config.router);
        let ret = self
            .chain
            .call(token, calldata)
            .await
            .map_err(|raw| Halt::Failed(classify(&raw)))?;
        decode_u256_return(&ret).map_err(|raw| Halt::Failed(classify(&raw)))
    }

    /// Approval leg: its receipt wait uses the same bounded-time discipline
    /// as execution confirmation.
    async fn approve(
        &self,
        token: alloy_primitives::Address,
        amount: U256,
    ) -> Result<(), Halt> {
        self.set_state(ExecutionState::AwaitingApproval);
        let tx = TxRequest {
            from: self.config.account,
            to: token,
            data: erc20_approve_calldata(self.config.router, amount),
            value: U256::ZERO,
            gas: None,
        };
        self.check_cancel()?;
        let hash = match self.wallet.write_contract(&tx).await {
            Ok(hash) => hash,
            Err(RawTxError::Rejected(message)) => {
                return Err(Halt::Rejected(DomainError::user_rejected(message)))
            }
            Err(raw) => return Err(Halt::Failed(classify(&raw))),
        };
        self.inner.lock().expect("engine lock").approval_hash = Some(hash);
        info!(hash = %hash, "approval submitted");
        self.set_state(ExecutionState::Approving);

        match self.wait_bounded(hash).await {
            WaitResult::Confirmed(receipt) if receipt.status == ReceiptStatus::Success => Ok(()),
            WaitResult::Confirmed(receipt) => Err(Halt::Failed(
                DomainError::new(
                    ErrorCode::ApprovalReverted,
                    format!("approval reverted in block {}", receipt.block_number),
                    "The token approval failed. No funds were moved.",
                )
                .with_details(format!("{hash}")),
            )),
            WaitResult::TimedOut => Err(Halt::Failed(DomainError::tx_timeout(
                self.config.confirmation_timeout.as_secs(),
                format!("{hash}"),
            ))),
            WaitResult::Failed(err) => Err(Halt::Failed(err)),
        }
    }

    /// Race the receipt wait against the configured timeout. The timer
    /// branch is non-destructive: the transaction may still land.
    async fn wait_bounded(&self, hash: B256) -> WaitResult {
        match tokio::time::timeout(
            self.config.confirmation_timeout,
            self.chain.wait_for_receipt(hash),
        )
        .await
        {
            Ok(Ok(receipt)) => WaitResult::Confirmed(receipt),
            Ok(Err(raw)) => WaitResult::Failed(classify(&raw)),
            Err(_elapsed) => WaitResult::TimedOut,
        }
    }

    /// One post-timeout receipt re-check. A confirmation that arrived after
    /// the bounded wait gave up flips the attempt to `Success` (firing the
    /// invalidation hook); a definite revert replaces the ambiguous
    /// timeout; no receipt leaves the state untouched.
    pub async fn reconcile(&self) -> Result<ExecutionState, DomainError> {
        let (hash, route) = {
            let inner = self.inner.lock().expect("engine lock");
            let timed_out = inner.state() == ExecutionState::Failed
                && inner.error.as_ref().map(|e| e.code) == Some(ErrorCode::TxTimeout);
            if !timed_out {
                return Ok(inner.state());
            }
            match inner.tx_hash {
                Some(hash) => (hash, inner.route.clone()),
                None => return Ok(inner.state()),
            }
        };

        match self.wait_bounded(hash).await {
            WaitResult::Confirmed(receipt) if receipt.status == ReceiptStatus::Success => {
                info!(hash = %hash, "timed-out transaction confirmed after the fact");
                {
                    let mut inner = self.inner.lock().expect("engine lock");
                    inner.error = None;
                }
                self.settle_success();
                Ok(ExecutionState::Success)
            }
            WaitResult::Confirmed(receipt) => {
                let code = route
                    .as_ref()
                    .map(|r| r.revert_kind())
                    .unwrap_or(ErrorCode::SwapReverted);
                let err = DomainError::new(
                    code,
                    format!("transaction reverted in block {}", receipt.block_number),
                    "The transaction reverted on-chain. No funds were swapped.",
                )
                .with_details(format!("{hash}"));
                self.inner.lock().expect("engine lock").error = Some(err.clone());
                Err(err)
            }
            WaitResult::TimedOut | WaitResult::Failed(_) => Ok(self.state()),
        }
    }

    fn settle_success(&self) {
        self.set_state(ExecutionState::Success);
        EXEC_OUTCOMES.with_label_values(&["success"]).inc();
        if let Some(hook) = &self.on_settled {
            hook(InvalidationScope {
                chain_id: self.config.chain_id,
                account: self.config.account,
            });
        }
    }

    fn halt(&self, state: ExecutionState, err: DomainError) {
        {
            let mut inner = self.inner.lock().expect("engine lock");
            inner.error = Some(err);
        }
        EXEC_OUTCOMES.with_label_values(&[state.as_str()]).inc();
        self.set_state(state);
    }

    fn check_cancel(&self) -> Result<(), Halt> {
        if self.cancel_requested.swap(false, Ordering::SeqCst) {
            return Err(Halt::Rejected(DomainError::user_rejected(
                "cancelled before signature",
            )));
        }
        Ok(())
    }

    fn set_state(&self, state: ExecutionState) {
        {
            let mut inner = self.inner.lock().expect("engine lock");
            inner.state = Some(state);
        }
        debug!(state = state.as_str(), "state transition");
        let _ = self.transitions.send(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::{selector, RevertData};
    use crate::router::routes::{ActionKind, PoolPayload, RouteHop};
    use alloy_primitives::Address;
    use std::sync::Mutex as StdMutex;

    #[derive(Clone, Copy)]
    enum ReceiptBehavior {
        Success,
        Reverted,
        Hang,
    }

    struct MockChain {
        allowance: U256,
        simulate_result: Result<(), RawTxError>,
        estimate: u64,
        receipt: StdMutex<ReceiptBehavior>,
    }

    impl MockChain {
        fn happy(allowance: u64) -> Self {
            Self {
                allowance: U256::from(allowance),
                simulate_result: Ok(()),
                estimate: 300_000,
                receipt: StdMutex::new(ReceiptBehavior::Success),
            }
        }

        fn set_receipt(&self, behavior: ReceiptBehavior) {
            *self.receipt.lock().unwrap() = behavior;
        }
    }

    impl ChainClient for MockChain {
        async fn call(&self, _to: Address, _data: Bytes) -> Result<Bytes, RawTxError> {
            Ok(Bytes::from(self.allowance.to_be_bytes::<32>().to_vec()))
        }

        async fn simulate(&self, _tx: &TxRequest) -> Result<(), RawTxError> {
            self.simulate_result.clone()
        }

        async fn estimate_gas(&self, _tx: &TxRequest) -> Result<u64, RawTxError> {
            Ok(self.estimate)
        }

        async fn block_number(&self) -> Result<u64, RawTxError> {
            Ok(1)
        }
    }

    impl ReceiptClient for MockChain {
        async fn wait_for_receipt(&self, hash: B256) -> Result<TxReceipt, RawTxError> {
            let behavior = *self.receipt.lock().unwrap();
            match behavior {
                ReceiptBehavior::Hang => {
                    futures::future::pending::<()>().await;
                    unreachable!()
                }
                ReceiptBehavior::Success => Ok(TxReceipt {
                    tx_hash: hash,
                    status: ReceiptStatus::Success,
                    gas_used: 250_000,
                    effective_gas_price: U256::from(30_000_000_000u64),
                    block_number: 42,
                }),
                ReceiptBehavior::Reverted => Ok(TxReceipt {
                    tx_hash: hash,
                    status: ReceiptStatus::Reverted,
                    gas_used: 250_000,
                    effective_gas_price: U256::from(30_000_000_000u64),
                    block_number: 42,
                }),
            }
        }
    }

    struct MockWallet {
        reject: bool,
        writes: StdMutex<Vec<TxRequest>>,
    }

    impl MockWallet {
        fn accepting() -> Self {
            Self {
                reject: false,
                writes: StdMutex::new(Vec::new()),
            }
        }

        fn write_count(&self) -> usize {
            self.writes.lock().unwrap().len()
        }
    }

    impl WalletClient for MockWallet {
        async fn write_contract(&self, tx: &TxRequest) -> Result<B256, RawTxError> {
            if self.reject {
                return Err(RawTxError::Rejected("User rejected the request.".into()));
            }
            let mut writes = self.writes.lock().unwrap();
            writes.push(tx.clone());
            Ok(B256::repeat_byte(writes.len() as u8))
        }
    }

    fn token(byte: u8) -> Address {
        Address::from([byte; 20])
    }

    fn swap_route(token_in: Address, token_out: Address) -> DecodedRoute {
        DecodedRoute::Single(vec![RouteHop::new(
            ActionKind::SwapCl,
            token_in,
            token_out,
            PoolPayload::SwapCl {
                token0: token_in,
                token1: token_out,
                fee: 3000,
                tick_spacing: 60,
                hooks: Address::ZERO,
                zero_for_one: true,
            },
        )])
    }

    fn request(route: DecodedRoute) -> ExecutionRequest {
        ExecutionRequest {
            route: RouteSource::Decoded(route),
            amount_in: U256::from(1_000_000u64),
            min_amount_out: U256::from(990_000u64),
            recipient: token(0xEE),
            deadline: 4_000_000_000,
            native_value: None,
            unwrap_to_native: false,
        }
    }

    fn engine(
        chain: Arc<MockChain>,
        wallet: Arc<MockWallet>,
    ) -> ExecutionEngine<MockChain, MockWallet> {
        let mut config = EngineConfig::new(token(0xBB), token(0xCC), 8453);
        config.confirmation_timeout = Duration::from_millis(200);
        ExecutionEngine::new(chain, wallet, config)
    }

    fn drain(rx: &mut broadcast::Receiver<ExecutionState>) -> Vec<ExecutionState> {
        let mut states = Vec::new();
        while let Ok(state) = rx.try_recv() {
            states.push(state);
        }
        states
    }

    #[tokio::test]
    async fn approval_path_walks_full_state_sequence() {
        let chain = Arc::new(MockChain::happy(0));
        let wallet = Arc::new(MockWallet::accepting());
        let engine = engine(chain, wallet.clone());
        assert_eq!(engine.state(), ExecutionState::Idle);

        let mut rx = engine.subscribe();
        let terminal = engine
            .execute(request(swap_route(token(0xA1), token(0xA2))))
            .await
            .unwrap();
        assert_eq!(terminal, ExecutionState::Success);

        assert_eq!(
            drain(&mut rx),
            vec![
                ExecutionState::Preparing,
                ExecutionState::AwaitingApproval,
                ExecutionState::Approving,
                ExecutionState::PreparingExecution,
                ExecutionState::AwaitingSignature,
                ExecutionState::Pending,
                ExecutionState::Confirming,
                ExecutionState::Success,
            ]
        );
        // approval + execution
        assert_eq!(wallet.write_count(), 2);
        assert!(engine.transaction_hash().is_some());
        assert!(engine.approval_hash().is_some());
    }

    #[tokio::test]
    async fn sufficient_allowance_skips_approval() {
        let chain = Arc::new(MockChain::happy(10_000_000));
        let wallet = Arc::new(MockWallet::accepting());
        let engine = engine(chain, wallet.clone());

        let mut rx = engine.subscribe();
        engine
            .execute(request(swap_route(token(0xA1), token(0xA2))))
            .await
            .unwrap();

        let states = drain(&mut rx);
        assert!(!states.contains(&ExecutionState::AwaitingApproval));
        assert!(!states.contains(&ExecutionState::Approving));
        assert_eq!(wallet.write_count(), 1);
    }

    #[tokio::test]
    async fn native_input_skips_allowance_entirely() {
        let chain = Arc::new(MockChain::happy(0));
        let wallet = Arc::new(MockWallet::accepting());
        let engine = engine(chain, wallet.clone());

        let mut rx = engine.subscribe();
        let mut req = request(swap_route(NATIVE_TOKEN, token(0xA2)));
        req.native_value = Some(U256::from(1_000_000u64));
        engine.execute(req).await.unwrap();

        let states = drain(&mut rx);
        assert!(!states.contains(&ExecutionState::AwaitingApproval));
        assert_eq!(engine.state(), ExecutionState::Success);
    }

    #[tokio::test]
    async fn simulation_revert_never_reaches_the_wallet() {
        let sel = selector("InsufficientOutput()");
        let chain = Arc::new(MockChain {
            allowance: U256::from(10_000_000u64),
            simulate_result: Err(RawTxError::Revert(RevertData::from_raw(Bytes::from(
                sel.to_vec(),
            )))),
            estimate: 300_000,
            receipt: StdMutex::new(ReceiptBehavior::Success),
        });
        let wallet = Arc::new(MockWallet::accepting());
        let engine = engine(chain, wallet.clone());

        let terminal = engine
            .execute(request(swap_route(token(0xA1), token(0xA2))))
            .await
            .unwrap();
        assert_eq!(terminal, ExecutionState::Failed);
        let err = engine.error().unwrap();
        assert_eq!(err.code, ErrorCode::InsufficientOutput);
        assert!(err.is_retryable);
        assert_eq!(wallet.write_count(), 0);
    }

    #[tokio::test]
    async fn confirmation_timeout_keeps_the_hash() {
        let chain = Arc::new(MockChain::happy(10_000_000));
        chain.set_receipt(ReceiptBehavior::Hang);
        let wallet = Arc::new(MockWallet::accepting());
        let engine = engine(chain, wallet);

        let terminal = engine
            .execute(request(swap_route(token(0xA1), token(0xA2))))
            .await
            .unwrap();
        assert_eq!(terminal, ExecutionState::Failed);
        let err = engine.error().unwrap();
        assert_eq!(err.code, ErrorCode::TxTimeout);
        assert!(!err.is_retryable);
        assert!(engine.transaction_hash().is_some());
    }

    #[tokio::test]
    async fn reverted_receipt_maps_to_swap_reverted() {
        let chain = Arc::new(MockChain::happy(10_000_000));
        chain.set_receipt(ReceiptBehavior::Reverted);
        let wallet = Arc::new(MockWallet::accepting());
        let engine = engine(chain, wallet);

        engine
            .execute(request(swap_route(token(0xA1), token(0xA2))))
            .await
            .unwrap();
        assert_eq!(engine.error().unwrap().code, ErrorCode::SwapReverted);
    }

    #[tokio::test]
    async fn wrap_only_route_reverts_as_wrap() {
        let chain = Arc::new(MockChain::happy(10_000_000));
        chain.set_receipt(ReceiptBehavior::Reverted);
        let wallet = Arc::new(MockWallet::accepting());
        let engine = engine(chain, wallet);

        let route = DecodedRoute::Single(vec![RouteHop::new(
            ActionKind::Wrap,
            token(0xA1),
            token(0xA2),
            PoolPayload::Vault {
                vault: token(0xA2),
                use_buffer: true,
            },
        )]);
        engine.execute(request(route)).await.unwrap();
        assert_eq!(engine.error().unwrap().code, ErrorCode::WrapReverted);
    }

    #[tokio::test]
    async fn wallet_rejection_lands_in_rejected() {
        let chain = Arc::new(MockChain::happy(10_000_000));
        let wallet = Arc::new(MockWallet {
            reject: true,
            writes: StdMutex::new(Vec::new()),
        });
        let engine = engine(chain, wallet);

        let terminal = engine
            .execute(request(swap_route(token(0xA1), token(0xA2))))
            .await
            .unwrap();
        assert_eq!(terminal, ExecutionState::Rejected);
        let err = engine.error().unwrap();
        assert!(err.is_user_rejection);
        assert!(err.is_retryable);
    }

    #[tokio::test]
    async fn reset_only_from_terminal_and_enables_reuse() {
        let chain = Arc::new(MockChain::happy(10_000_000));
        let wallet = Arc::new(MockWallet::accepting());
        let engine = engine(chain, wallet);

        // fresh engine resets as a no-op
        assert!(engine.reset().is_ok());

        engine
            .execute(request(swap_route(token(0xA1), token(0xA2))))
            .await
            .unwrap();
        assert_eq!(engine.state(), ExecutionState::Success);

        // a second attempt without reset is rejected
        let err = engine
            .execute(request(swap_route(token(0xA1), token(0xA2))))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::ExecutionInFlight);

        engine.reset().unwrap();
        assert_eq!(engine.state(), ExecutionState::Idle);
        assert!(engine.transaction_hash().is_none());
        assert!(engine.error().is_none());

        engine
            .execute(request(swap_route(token(0xA1), token(0xA2))))
            .await
            .unwrap();
        assert_eq!(engine.state(), ExecutionState::Success);
    }

    #[tokio::test]
    async fn success_fires_invalidation_hook_once() {
        let chain = Arc::new(MockChain::happy(10_000_000));
        let wallet = Arc::new(MockWallet::accepting());
        let fired = Arc::new(StdMutex::new(Vec::new()));
        let fired_clone = fired.clone();

        let mut config = EngineConfig::new(token(0xBB), token(0xCC), 8453);
        config.confirmation_timeout = Duration::from_millis(200);
        let engine = ExecutionEngine::new(chain, wallet, config).with_invalidation_hook(
            move |scope: InvalidationScope| {
                fired_clone.lock().unwrap().push(scope);
            },
        );

        engine
            .execute(request(swap_route(token(0xA1), token(0xA2))))
            .await
            .unwrap();
        let scopes = fired.lock().unwrap();
        assert_eq!(scopes.len(), 1);
        assert_eq!(scopes[0].chain_id, 8453);
        assert_eq!(scopes[0].account, token(0xCC));
    }

    #[tokio::test]
    async fn cancel_before_signature_rejects_without_wallet_call() {
        let chain = Arc::new(MockChain::happy(10_000_000));
        let wallet = Arc::new(MockWallet::accepting());
        let engine = engine(chain, wallet.clone());

        engine.cancel();
        let terminal = engine
            .execute(request(swap_route(token(0xA1), token(0xA2))))
            .await
            .unwrap();
        assert_eq!(terminal, ExecutionState::Rejected);
        assert_eq!(wallet.write_count(), 0);
    }

    #[tokio::test]
    async fn reconcile_flips_timeout_to_success() {
        let chain = Arc::new(MockChain::happy(10_000_000));
        chain.set_receipt(ReceiptBehavior::Hang);
        let wallet = Arc::new(MockWallet::accepting());
        let fired = Arc::new(StdMutex::new(0usize));
        let fired_clone = fired.clone();

        let mut config = EngineConfig::new(token(0xBB), token(0xCC), 8453);
        config.confirmation_timeout = Duration::from_millis(100);
        let engine = ExecutionEngine::new(chain.clone(), wallet, config)
            .with_invalidation_hook(move |_| *fired_clone.lock().unwrap() += 1);

        engine
            .execute(request(swap_route(token(0xA1), token(0xA2))))
            .await
            .unwrap();
        assert_eq!(engine.error().unwrap().code, ErrorCode::TxTimeout);

        // the transaction landed after the bounded wait gave up
        chain.set_receipt(ReceiptBehavior::Success);
        let state = engine.reconcile().await.unwrap();
        assert_eq!(state, ExecutionState::Success);
        assert!(engine.error().is_none());
        assert_eq!(*fired.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn reconcile_without_timeout_is_a_no_op() {
        let chain = Arc::new(MockChain::happy(10_000_000));
        let wallet = Arc::new(MockWallet::accepting());
        let engine = engine(chain, wallet);

        engine
            .execute(request(swap_route(token(0xA1), token(0xA2))))
            .await
            .unwrap();
        let state = engine.reconcile().await.unwrap();
        assert_eq!(state, ExecutionState::Success);
    }
}
