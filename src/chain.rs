// Chain collaborator contracts
// This file defines the narrow traits the execution plane consumes (chain
// reads, wallet writes, receipt waits), the raw failure type classified at
// the error boundary, and the calldata builders for the calls it makes

use alloy_primitives::{keccak256, Address, Bytes, B256, U256};
use thiserror::Error;

/// Sentinel address for the chain's native asset. Approvals are skipped for
/// native-asset inputs; value rides in `TxRequest::value` instead.
pub const NATIVE_TOKEN: Address = Address::ZERO;

/// Transaction parameters handed to simulate/estimate/write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxRequest {
    pub from: Address,
    pub to: Address,
    pub data: Bytes,
    pub value: U256,
    pub gas: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiptStatus {
    Success,
    Reverted,
}

/// Receipt for an included transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxReceipt {
    pub tx_hash: B256,
    pub status: ReceiptStatus,
    pub gas_used: u64,
    pub effective_gas_price: U256,
    pub block_number: u64,
}

/// Structured revert payload extracted from simulation or receipt data.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RevertData {
    /// 4-byte custom error selector, when the revert data carries one.
    pub selector: Option<[u8; 4]>,
    /// Decoded error name, when the provider resolved one.
    pub name: Option<String>,
    pub raw: Bytes,
}

impl RevertData {
    /// Extract the selector from raw revert bytes.
    pub fn from_raw(raw: Bytes) -> Self {
        let selector = if raw.len() >= 4 {
            Some([raw[0], raw[1], raw[2], raw[3]])
        } else {
            None
        };
        Self {
            selector,
            name: None,
            raw,
        }
    }
}

/// Raw failure surface of the collaborators, classified into a DomainError
/// at the error boundary. Wallet user-rejection is distinguishable by
/// construction.
#[derive(Debug, Clone, Error)]
pub enum RawTxError {
    #[error("rejected by wallet: {0}")]
    Rejected(String),
    #[error("execution reverted ({})", .0.name.as_deref().unwrap_or("unknown"))]
    Revert(RevertData),
    #[error("rpc error: {0}")]
    Rpc(String),
    #[error("timed out: {0}")]
    Timeout(String),
    #[error("{0}")]
    Other(String),
}

/// Chain data source: reads, dry-run simulation, gas estimation.
#[allow(async_fn_in_trait)]
pub trait ChainClient: Send + Sync {
    /// eth_call against a contract; returns the raw return data.
    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, RawTxError>;

    /// Dry-run the exact transaction. `Err(Revert)` carries revert data.
    async fn simulate(&self, tx: &TxRequest) -> Result<(), RawTxError>;

    async fn estimate_gas(&self, tx: &TxRequest) -> Result<u64, RawTxError>;

    async fn block_number(&self) -> Result<u64, RawTxError>;
}

/// Wallet/signing source. May fail with `RawTxError::Rejected`.
#[allow(async_fn_in_trait)]
pub trait WalletClient: Send + Sync {
    async fn write_contract(&self, tx: &TxRequest) -> Result<B256, RawTxError>;
}

/// Receipt source. Implementations wait as long as asked; the execution
/// plane bounds the wait.
#[allow(async_fn_in_trait)]
pub trait ReceiptClient: Send + Sync {
    async fn wait_for_receipt(&self, hash: B256) -> Result<TxReceipt, RawTxError>;
}

/// Scope handed to the cache-invalidation sink when an execution settles:
/// balances, allowances, and quotes for this chain+account are now stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidationScope {
    pub chain_id: u64,
    pub account: Address,
}

/// 4-byte function selector from a canonical signature.
pub fn selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

fn push_address_word(out: &mut Vec<u8>, addr: Address) {
    out.extend_from_slice(&[0u8; 12]);
    out.extend_from_slice(addr.as_slice());
}

fn push_u256_word(out: &mut Vec<u8>, value: U256) {
    out.extend_from_slice(&value.to_be_bytes::<32>());
}

/// allowance(address,address) calldata.
pub fn erc20_allowance_calldata(owner: Address, spender: Address) -> Bytes {
    let mut out = Vec::with_capacity(4 + 64);
    out.extend_from_slice(&selector("allowance(address,address)"));
    push_address_word(&mut out, owner);
    push_address_word(&mut out, spender);
    Bytes::from(out)
}

/// approve(address,uint256) calldata.
pub fn erc20_approve_calldata(spender: Address, amount: U256) -> Bytes {
    let mut out = Vec::with_capacity(4 + 64);
    out.extend_from_slice(&selector("approve(address,uint256)"));
    push_address_word(&mut out, spender);
    push_u256_word(&mut out, amount);
    Bytes::from(out)
}

/// Decode a single uint256 return word (e.g. an allowance read).
pub fn decode_u256_return(data: &[u8]) -> Result<U256, RawTxError> {
    if data.len() < 32 {
        return Err(RawTxError::Other(format!(
            "short uint256 return: {} bytes",
            data.len()
        )));
    }
    Ok(U256::from_be_slice(&data[..32]))
}

/// executeRoute(bytes,uint256,uint256,address,uint256,bool) calldata: the
/// packed route plus amount, min output, recipient, deadline, and the
/// unwrap-to-native flag.
pub fn router_execute_calldata(
    route: &[u8],
    amount_in: U256,
    min_amount_out: U256,
    recipient: Address,
    deadline: u64,
    unwrap_to_native: bool,
) -> Bytes {
    let mut out = Vec::new();
    out.extend_from_slice(&selector(
        "executeRoute(bytes,uint256,uint256,address,uint256,bool)",
    ));
    // head: offset to the dynamic bytes arg, then the five static words
    push_u256_word(&mut out, U256::from(0xC0u64));
    push_u256_word(&mut out, amount_in);
    push_u256_word(&mut out, min_amount_out);
    push_address_word(&mut out, recipient);
    push_u256_word(&mut out, U256::from(deadline));
    push_u256_word(&mut out, U256::from(unwrap_to_native as u64));
    // tail: length-prefixed route bytes, zero-padded to a word boundary
    push_u256_word(&mut out, U256::from(route.len()));
    out.extend_from_slice(route);
    let pad = (32 - route.len() % 32) % 32;
    out.extend_from_slice(&vec![0u8; pad]);
    Bytes::from(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn erc20_selectors_are_canonical() {
        assert_eq!(selector("allowance(address,address)"), [0xdd, 0x62, 0xed, 0x3e]);
        assert_eq!(selector("approve(address,uint256)"), [0x09, 0x5e, 0xa7, 0xb3]);
    }

    #[test]
    fn allowance_calldata_layout() {
        let owner = Address::from([0x11; 20]);
        let spender = Address::from([0x22; 20]);
        let data = erc20_allowance_calldata(owner, spender);
        assert_eq!(data.len(), 4 + 64);
        assert_eq!(&data[16..36], owner.as_slice());
        assert_eq!(&data[48..68], spender.as_slice());
    }

    #[test]
    fn execute_calldata_pads_route_to_word() {
        let route = vec![0xABu8; 45];
        let data = router_execute_calldata(
            &route,
            U256::from(1u64),
            U256::from(2u64),
            Address::from([0x33; 20]),
            1_700_000_000,
            true,
        );
        // selector + 6 head words + length word + 2 padded route words
        assert_eq!(data.len(), 4 + 6 * 32 + 32 + 64);
        let len_word = U256::from_be_slice(&data[4 + 6 * 32..4 + 7 * 32]);
        assert_eq!(len_word, U256::from(45u64));
        assert_eq!(&data[4 + 7 * 32..4 + 7 * 32 + 45], &route[..]);
    }

    #[test]
    fn u256_return_decodes() {
        let mut word = [0u8; 32];
        word[31] = 7;
        assert_eq!(decode_u256_return(&word).unwrap(), U256::from(7u64));
        assert!(decode_u256_return(&[0u8; 5]).is_err());
    }

    #[test]
    fn revert_data_extracts_selector() {
        let raw = Bytes::from(vec![0xde, 0xad, 0xbe, 0xef, 0x01]);
        let data = RevertData::from_raw(raw);
        assert_eq!(data.selector, Some([0xde, 0xad, 0xbe, 0xef]));
        let short = RevertData::from_raw(Bytes::from(vec![0x01]));
        assert_eq!(short.selector, None);
    }
}
