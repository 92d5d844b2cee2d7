//! JSON-RPC ledger oracle backed by an Ethereum execution client.

use async_trait::async_trait;
use jsonrpsee::core::ClientError;
use jsonrpsee::core::client::ClientT;
use jsonrpsee::core::params::ArrayParams;
use jsonrpsee::http_client::{HttpClient, HttpClientBuilder};
use std::time::Duration;
use tracing::debug;

use hdvault_core::address::Address;
use hdvault_core::error::OracleError;
use hdvault_core::traits::{BlockRef, LedgerOracle};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Answers balance and nonce queries with `eth_getBalance` and
/// `eth_getTransactionCount`.
pub struct RpcLedgerOracle {
    client: HttpClient,
    endpoint: String,
}

impl RpcLedgerOracle {
    pub fn connect(endpoint: &str) -> Result<Self, OracleError> {
        let client = HttpClientBuilder::default()
            .request_timeout(REQUEST_TIMEOUT)
            .build(endpoint)
            .map_err(map_client_error)?;
        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn quantity(
        &self,
        method: &str,
        address: &Address,
        block: BlockRef,
    ) -> Result<u128, OracleError> {
        let mut params = ArrayParams::new();
        params
            .insert(address.to_hex_lower())
            .map_err(|e| OracleError::InvalidResponse(e.to_string()))?;
        params
            .insert(block.to_rpc_param())
            .map_err(|e| OracleError::InvalidResponse(e.to_string()))?;

        let raw: String = self
            .client
            .request(method, params)
            .await
            .map_err(map_client_error)?;
        debug!(method, %address, %block, result = %raw, "rpc");
        parse_quantity(&raw)
    }
}

#[async_trait]
impl LedgerOracle for RpcLedgerOracle {
    async fn balance_at(&self, address: &Address, block: BlockRef) -> Result<u128, OracleError> {
        self.quantity("eth_getBalance", address, block).await
    }

    async fn transaction_count_at(
        &self,
        address: &Address,
        block: BlockRef,
    ) -> Result<u64, OracleError> {
        let count = self
            .quantity("eth_getTransactionCount", address, block)
            .await?;
        u64::try_from(count)
            .map_err(|_| OracleError::InvalidResponse(format!("nonce out of range: {count}")))
    }
}

fn map_client_error(err: ClientError) -> OracleError {
    match err {
        ClientError::RequestTimeout => OracleError::Timeout,
        ClientError::Call(obj) => OracleError::InvalidResponse(obj.to_string()),
        other => OracleError::Transport(other.to_string()),
    }
}

/// Parse a JSON-RPC hex quantity: `0x` followed by hex digits with no
/// leading zeros, `0x0` for zero.
pub fn parse_quantity(s: &str) -> Result<u128, OracleError> {
    let invalid = || OracleError::InvalidResponse(format!("invalid quantity {s:?}"));

    let digits = s.strip_prefix("0x").ok_or_else(invalid)?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(invalid());
    }
    if digits.len() > 1 && digits.starts_with('0') {
        return Err(invalid());
    }
    if digits.len() > 32 {
        return Err(OracleError::InvalidResponse(format!("quantity overflows u128: {s}")));
    }
    u128::from_str_radix(digits, 16).map_err(|_| invalid())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_quantities() {
        assert_eq!(parse_quantity("0x0").unwrap(), 0);
        assert_eq!(parse_quantity("0x1").unwrap(), 1);
        assert_eq!(parse_quantity("0x400").unwrap(), 1024);
        assert_eq!(parse_quantity("0xDE0B6B3A7640000").unwrap(), 1_000_000_000_000_000_000);
        assert_eq!(
            parse_quantity("0xffffffffffffffffffffffffffffffff").unwrap(),
            u128::MAX
        );
    }

    #[test]
    fn rejects_malformed_quantities() {
        for bad in ["", "0x", "0", "400", "0x0400", "0x00", "0x+1", "0xg", "0X1", " 0x1"] {
            assert!(
                matches!(parse_quantity(bad), Err(OracleError::InvalidResponse(_))),
                "{bad:?} accepted"
            );
        }
    }

    #[test]
    fn rejects_oversized_quantity() {
        let too_big = format!("0x1{}", "0".repeat(32));
        assert!(matches!(
            parse_quantity(&too_big),
            Err(OracleError::InvalidResponse(_))
        ));
    }

    #[test]
    fn timeout_maps_to_timeout() {
        assert_eq!(map_client_error(ClientError::RequestTimeout), OracleError::Timeout);
    }

    #[test]
    fn connect_rejects_bad_url() {
        assert!(RpcLedgerOracle::connect("not a url").is_err());
    }

    #[tokio::test]
    async fn unreachable_node_is_transport_error() {
        let oracle = RpcLedgerOracle::connect("http://127.0.0.1:1").unwrap();
        assert_eq!(oracle.endpoint(), "http://127.0.0.1:1");
        let err = oracle
            .balance_at(&Address::ZERO, BlockRef::Latest)
            .await
            .unwrap_err();
        assert!(matches!(err, OracleError::Transport(_)));
    }
}
