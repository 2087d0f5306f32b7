// JSON-RPC transport layer implementation
// Implements the chain-data and receipt collaborator contracts over
// Ethereum JSON-RPC with backoff retry on transient transport failures

use alloy_primitives::{Address, Bytes, B256, U256};
use backoff::{future::retry, ExponentialBackoff};
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;
use tokio::time::sleep;
use tracing::debug;
use url::Url;

use crate::chain::{
    ChainClient, RawTxError, ReceiptClient, ReceiptStatus, RevertData, TxReceipt, TxRequest,
};
use crate::metrics::REQ_ERRORS;

/// How often the receipt wait polls. The execution plane bounds the overall
/// wait; this client polls until told to stop.
const RECEIPT_POLL_INTERVAL: Duration = Duration::from_secs(2);

#[derive(Debug, Clone)]
pub struct EvmJsonRpc {
    http: Client,
    url: Url,
}

impl EvmJsonRpc {
    pub fn new(url: Url) -> Self {
        Self {
            http: Client::new(),
            url,
        }
    }

    pub fn endpoint(&self) -> &Url {
        &self.url
    }

    fn retry_policy() -> ExponentialBackoff {
        ExponentialBackoff {
            initial_interval: Duration::from_millis(100),
            max_interval: Duration::from_secs(2),
            max_elapsed_time: Some(Duration::from_secs(10)),
            multiplier: 2.0,
            ..Default::default()
        }
    }

    async fn request(&self, method: &str, params: Value) -> Result<Value, RawTxError> {
        let payload = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });

        let body: Value = retry(Self::retry_policy(), || {
            let payload = payload.clone();
            async move {
                let resp = self
                    .http
                    .post(self.url.clone())
                    .json(&payload)
                    .send()
                    .await
                    .map_err(|e| {
                        backoff::Error::transient(RawTxError::Rpc(format!("{method} send: {e}")))
                    })?;
                let status = resp.status();
                if status.is_server_error() {
                    return Err(backoff::Error::transient(RawTxError::Rpc(format!(
                        "{method}: http {status}"
                    ))));
                }
                if !status.is_success() {
                    return Err(backoff::Error::permanent(RawTxError::Rpc(format!(
                        "{method}: http {status}"
                    ))));
                }
                resp.json::<Value>().await.map_err(|e| {
                    backoff::Error::permanent(RawTxError::Rpc(format!("{method} parse: {e}")))
                })
            }
        })
        .await
        .map_err(|e| {
            REQ_ERRORS.with_label_values(&[method]).inc();
            e
        })?;

        if let Some(error) = body.get("error") {
            REQ_ERRORS.with_label_values(&[method]).inc();
            return Err(map_rpc_error(error));
        }
        Ok(body.get("result").cloned().unwrap_or(Value::Null))
    }

    fn tx_params(tx: &TxRequest) -> Value {
        let mut params = json!({
            "from": format!("0x{}", hex::encode(tx.from)),
            "to": format!("0x{}", hex::encode(tx.to)),
            "data": format!("0x{}", hex::encode(&tx.data)),
            "value": to_quantity_u256(tx.value),
        });
        if let Some(gas) = tx.gas {
            params["gas"] = Value::String(format!("0x{gas:x}"));
        }
        params
    }
}

impl ChainClient for EvmJsonRpc {
    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, RawTxError> {
        let params = json!([
            {
                "to": format!("0x{}", hex::encode(to)),
                "data": format!("0x{}", hex::encode(&data)),
            },
            "latest"
        ]);
        let result = self.request("eth_call", params).await?;
        parse_hex_bytes(&result)
    }

    async fn simulate(&self, tx: &TxRequest) -> Result<(), RawTxError> {
        let params = json!([Self::tx_params(tx), "latest"]);
        self.request("eth_call", params).await.map(|_| ())
    }

    async fn estimate_gas(&self, tx: &TxRequest) -> Result<u64, RawTxError> {
        let params = json!([Self::tx_params(tx)]);
        let result = self.request("eth_estimateGas", params).await?;
        parse_quantity(&result)
    }

    async fn block_number(&self) -> Result<u64, RawTxError> {
        let result = self.request("eth_blockNumber", json!([])).await?;
        parse_quantity(&result)
    }
}

impl ReceiptClient for EvmJsonRpc {
    async fn wait_for_receipt(&self, hash: B256) -> Result<TxReceipt, RawTxError> {
        let params = json!([format!("{hash}")]);
        loop {
            let result = self
                .request("eth_getTransactionReceipt", params.clone())
                .await?;
            if result.is_null() {
                debug!(hash = %hash, "receipt not yet available");
                sleep(RECEIPT_POLL_INTERVAL).await;
                continue;
            }
            return parse_receipt(hash, &result);
        }
    }
}

/// Partition a JSON-RPC error object: revert data becomes a structured
/// revert; anything else stays a transport-level error for the classifier.
fn map_rpc_error(error: &Value) -> RawTxError {
    let message = error
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or("rpc error")
        .to_string();

    // revert payload may sit in error.data directly or one level down
    let data = error
        .get("data")
        .map(|d| d.get("data").unwrap_or(d))
        .and_then(Value::as_str);
    if let Some(hex_data) = data {
        if let Ok(raw) = decode_hex(hex_data) {
            if !raw.is_empty() {
                return RawTxError::Revert(RevertData::from_raw(Bytes::from(raw)));
            }
        }
    }
    if message.contains("execution reverted") {
        return RawTxError::Revert(RevertData::from_raw(Bytes::new()));
    }
    RawTxError::Rpc(message)
}

fn decode_hex(value: &str) -> Result<Vec<u8>, hex::FromHexError> {
    hex::decode(value.trim_start_matches("0x"))
}

fn parse_hex_bytes(value: &Value) -> Result<Bytes, RawTxError> {
    let text = value
        .as_str()
        .ok_or_else(|| RawTxError::Rpc(format!("expected hex string, got {value}")))?;
    decode_hex(text)
        .map(Bytes::from)
        .map_err(|e| RawTxError::Rpc(format!("invalid hex data: {e}")))
}

fn parse_quantity(value: &Value) -> Result<u64, RawTxError> {
    let text = value
        .as_str()
        .ok_or_else(|| RawTxError::Rpc(format!("expected hex quantity, got {value}")))?;
    u64::from_str_radix(text.trim_start_matches("0x"), 16)
        .map_err(|e| RawTxError::Rpc(format!("invalid hex quantity {text}: {e}")))
}

fn parse_quantity_u256(value: &Value) -> Result<U256, RawTxError> {
    let text = value
        .as_str()
        .ok_or_else(|| RawTxError::Rpc(format!("expected hex quantity, got {value}")))?;
    U256::from_str_radix(text.trim_start_matches("0x"), 16)
        .map_err(|e| RawTxError::Rpc(format!("invalid hex quantity {text}: {e}")))
}

fn to_quantity_u256(value: U256) -> String {
    format!("0x{value:x}")
}

fn parse_receipt(hash: B256, value: &Value) -> Result<TxReceipt, RawTxError> {
    let status = match value.get("status").and_then(Value::as_str) {
        Some("0x1") => ReceiptStatus::Success,
        Some("0x0") => ReceiptStatus::Reverted,
        other => {
            return Err(RawTxError::Rpc(format!(
                "unexpected receipt status {other:?}"
            )))
        }
    };
    let gas_used = value
        .get("gasUsed")
        .map(parse_quantity)
        .transpose()?
        .unwrap_or(0);
    let effective_gas_price = value
        .get("effectiveGasPrice")
        .map(parse_quantity_u256)
        .transpose()?
        .unwrap_or(U256::ZERO);
    let block_number = value
        .get("blockNumber")
        .map(parse_quantity)
        .transpose()?
        .unwrap_or(0);
    Ok(TxReceipt {
        tx_hash: hash,
        status,
        gas_used,
        effective_gas_price,
        block_number,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quantities_parse_from_hex() {
        assert_eq!(parse_quantity(&json!("0x1b4")).unwrap(), 436);
        assert_eq!(parse_quantity(&json!("0x0")).unwrap(), 0);
        assert!(parse_quantity(&json!(123)).is_err());
        assert!(parse_quantity(&json!("0xzz")).is_err());
    }

    #[test]
    fn rpc_error_with_revert_data_becomes_structured_revert() {
        let error = json!({
            "code": 3,
            "message": "execution reverted",
            "data": "0x42301c23"
        });
        match map_rpc_error(&error) {
            RawTxError::Revert(data) => {
                assert_eq!(data.selector, Some([0x42, 0x30, 0x1c, 0x23]));
            }
            other => panic!("expected revert, got {other:?}"),
        }
    }

    #[test]
    fn rpc_error_with_nested_data_unwraps() {
        let error = json!({
            "message": "execution reverted",
            "data": { "data": "0xdeadbeef" }
        });
        match map_rpc_error(&error) {
            RawTxError::Revert(data) => {
                assert_eq!(data.selector, Some([0xde, 0xad, 0xbe, 0xef]));
            }
            other => panic!("expected revert, got {other:?}"),
        }
    }

    #[test]
    fn plain_rpc_error_stays_transport_level() {
        let error = json!({ "message": "nonce too low" });
        match map_rpc_error(&error) {
            RawTxError::Rpc(message) => assert_eq!(message, "nonce too low"),
            other => panic!("expected rpc error, got {other:?}"),
        }
    }

    #[test]
    fn receipt_parses_both_statuses() {
        let hash = B256::repeat_byte(0x11);
        let ok = json!({
            "status": "0x1",
            "gasUsed": "0x3d090",
            "effectiveGasPrice": "0x6fc23ac00",
            "blockNumber": "0x112a880"
        });
        let receipt = parse_receipt(hash, &ok).unwrap();
        assert_eq!(receipt.status, ReceiptStatus::Success);
        assert_eq!(receipt.gas_used, 250_000);

        let reverted = json!({ "status": "0x0" });
        let receipt = parse_receipt(hash, &reverted).unwrap();
        assert_eq!(receipt.status, ReceiptStatus::Reverted);
    }
}
