use std::time::Duration;

use async_trait::async_trait;
use beacon_engine_core::serialize::{format_quantity, loose_u64};
use beacon_engine_core::{
    BlockSummary, ExecutionPayload, ForkChoiceState, ForkchoiceUpdatedResponse,
    GetPayloadResponse, PayloadAttributes, PayloadId, PayloadStatus, ValidatorRecord,
};
use serde_json::{json, Value};

use crate::client::RpcClient;
use crate::error::RpcError;

pub const ENGINE_FORKCHOICE_UPDATED: &str = "engine_forkchoiceUpdatedV2";
pub const ENGINE_GET_PAYLOAD: &str = "engine_getPayloadV2";
pub const ENGINE_NEW_PAYLOAD: &str = "engine_newPayloadV2";
pub const ETH_GET_BLOCK_BY_NUMBER: &str = "eth_getBlockByNumber";

pub const DEFAULT_BLOCK_PERIOD_METHOD: &str = "consensus_getBlockPeriod";
pub const DEFAULT_VALIDATORS_METHOD: &str = "consensus_getValidators";

/// Names of the chain-introspection methods, which vary between chains
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainMethods {
    pub block_period: String,
    pub validators: String,
}

impl Default for ChainMethods {
    fn default() -> Self {
        ChainMethods {
            block_period: DEFAULT_BLOCK_PERIOD_METHOD.to_string(),
            validators: DEFAULT_VALIDATORS_METHOD.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockTag {
    Latest,
    Number(u64),
}

impl BlockTag {
    fn to_param(self) -> Value {
        match self {
            BlockTag::Latest => json!("latest"),
            BlockTag::Number(number) => json!(format_quantity(number)),
        }
    }
}

/// Everything the engine asks of the execution node
#[async_trait]
pub trait ExecutionClient: Send + Sync {
    async fn forkchoice_updated(
        &self,
        state: ForkChoiceState,
        attributes: Option<PayloadAttributes>,
        timeout: Duration,
    ) -> Result<ForkchoiceUpdatedResponse, RpcError>;

    async fn get_payload(
        &self,
        payload_id: PayloadId,
        timeout: Duration,
    ) -> Result<ExecutionPayload, RpcError>;

    async fn new_payload(
        &self,
        payload: &ExecutionPayload,
        timeout: Duration,
    ) -> Result<PayloadStatus, RpcError>;

    /// `None` when the node does not know the block
    async fn block_by_number(
        &self,
        tag: BlockTag,
        timeout: Duration,
    ) -> Result<Option<BlockSummary>, RpcError>;

    /// Configured block period of the chain, in seconds
    async fn block_period(&self, timeout: Duration) -> Result<u64, RpcError>;

    async fn validators(&self, timeout: Duration) -> Result<Vec<ValidatorRecord>, RpcError>;
}

/// [`ExecutionClient`] over HTTP: the authenticated Engine API endpoint
/// plus the node's plain JSON-RPC endpoint
pub struct HttpExecutionClient {
    engine: RpcClient,
    chain: RpcClient,
    methods: ChainMethods,
}

impl HttpExecutionClient {
    pub fn new(engine: RpcClient, chain: RpcClient, methods: ChainMethods) -> Self {
        HttpExecutionClient {
            engine,
            chain,
            methods,
        }
    }
}

#[async_trait]
impl ExecutionClient for HttpExecutionClient {
    async fn forkchoice_updated(
        &self,
        state: ForkChoiceState,
        attributes: Option<PayloadAttributes>,
        timeout: Duration,
    ) -> Result<ForkchoiceUpdatedResponse, RpcError> {
        let params = vec![json!(state), json!(attributes)];
        self.engine
            .call(ENGINE_FORKCHOICE_UPDATED, params, timeout)
            .await
    }

    async fn get_payload(
        &self,
        payload_id: PayloadId,
        timeout: Duration,
    ) -> Result<ExecutionPayload, RpcError> {
        let response: GetPayloadResponse = self
            .engine
            .call(ENGINE_GET_PAYLOAD, vec![json!(payload_id)], timeout)
            .await?;
        Ok(response.execution_payload)
    }

    async fn new_payload(
        &self,
        payload: &ExecutionPayload,
        timeout: Duration,
    ) -> Result<PayloadStatus, RpcError> {
        self.engine
            .call(ENGINE_NEW_PAYLOAD, vec![json!(payload)], timeout)
            .await
    }

    async fn block_by_number(
        &self,
        tag: BlockTag,
        timeout: Duration,
    ) -> Result<Option<BlockSummary>, RpcError> {
        let params = vec![tag.to_param(), json!(false)];
        self.chain
            .call(ETH_GET_BLOCK_BY_NUMBER, params, timeout)
            .await
    }

    async fn block_period(&self, timeout: Duration) -> Result<u64, RpcError> {
        let raw: Value = self
            .chain
            .call(&self.methods.block_period, vec![], timeout)
            .await?;
        Ok(loose_u64(raw)?)
    }

    async fn validators(&self, timeout: Duration) -> Result<Vec<ValidatorRecord>, RpcError> {
        self.chain
            .call(&self.methods.validators, vec![], timeout)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::JwtSecret;
    use beacon_engine_core::{BlockHash, PayloadStatusKind, Shutdown, H256};
    use httpmock::{Method::POST, MockServer};
    use std::sync::Arc;

    const SECRET: &str = "a8ecf8012460d00d11a5bd65165c192f705d1ef759afdda5e9db0f2cd29bbf11";
    const HEAD: &str = "0x3b8fb240d288781d4aac94d3fd16809ee413bc99294a085798a589dae51ddd4a";
    const NEW_HEAD: &str = "0x1587569314611d9f06aac37c64c87b180313056d1a968e6b8290ce64c519859f";
    const TIMEOUT: Duration = Duration::from_secs(2);

    fn client_for(server: &MockServer) -> HttpExecutionClient {
        let secret = Arc::new(JwtSecret::from_hex(SECRET).unwrap());
        HttpExecutionClient::new(
            RpcClient::authenticated(server.url("/engine"), secret, Shutdown::never()),
            RpcClient::plain(server.url("/rpc"), Shutdown::never()),
            ChainMethods::default(),
        )
    }

    #[tokio::test]
    async fn test_forkchoice_updated_round_trip() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/engine")
                    .header_exists("authorization")
                    .body_contains(ENGINE_FORKCHOICE_UPDATED)
                    .body_contains("\"headBlockHash\"")
                    .body_contains("\"suggestedFeeRecipient\"");
                then.status(200).json_body(json!({
                    "jsonrpc": "2.0",
                    "id": 1,
                    "result": {
                        "payloadStatus": { "status": "VALID", "latestValidHash": HEAD, "validationError": null },
                        "payloadId": "0xa247243752eb10b4",
                    },
                }));
            })
            .await;

        let client = client_for(&server);
        let head = BlockHash::from_hex(HEAD).unwrap();
        let attributes = PayloadAttributes {
            timestamp: 12,
            prev_randao: H256::ZERO,
            suggested_fee_recipient: "0xa94f5374fce5edbc8e2a8697c15331677e6ebf0b".to_string(),
            withdrawals: vec![],
        };

        let response = client
            .forkchoice_updated(ForkChoiceState::at_head(head), Some(attributes), TIMEOUT)
            .await
            .unwrap();

        assert!(response.payload_status.is_valid());
        assert_eq!(
            response.payload_id,
            Some(PayloadId::from_hex("0xa247243752eb10b4").unwrap())
        );
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_get_then_new_payload() {
        let server = MockServer::start_async().await;
        let payload = json!({
            "parentHash": HEAD,
            "feeRecipient": "0xa94f5374fce5edbc8e2a8697c15331677e6ebf0b",
            "blockNumber": "0x2",
            "timestamp": "0x18",
            "blockHash": NEW_HEAD,
            "transactions": [],
            "withdrawals": [],
        });
        server
            .mock_async(|when, then| {
                when.method(POST).path("/engine").body_contains(ENGINE_GET_PAYLOAD);
                then.status(200).json_body(json!({
                    "jsonrpc": "2.0",
                    "id": 1,
                    "result": { "executionPayload": payload, "blockValue": "0x0" },
                }));
            })
            .await;
        let new_payload_mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/engine")
                    .body_contains(ENGINE_NEW_PAYLOAD)
                    .body_contains(NEW_HEAD)
                    .body_contains("\"transactions\"");
                then.status(200).json_body(json!({
                    "jsonrpc": "2.0",
                    "id": 2,
                    "result": { "status": "VALID", "latestValidHash": NEW_HEAD, "validationError": null },
                }));
            })
            .await;

        let client = client_for(&server);
        let built = client
            .get_payload(PayloadId::from_hex("0xa247243752eb10b4").unwrap(), TIMEOUT)
            .await
            .unwrap();
        assert_eq!(built.block_number, 2);
        assert_eq!(built.block_hash, BlockHash::from_hex(NEW_HEAD).unwrap());

        let status = client.new_payload(&built, TIMEOUT).await.unwrap();
        assert_eq!(status.status, PayloadStatusKind::Valid);
        new_payload_mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_get_payload_missing_result() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/engine");
                then.status(200).json_body(json!({ "jsonrpc": "2.0", "id": 1, "result": null }));
            })
            .await;

        let client = client_for(&server);
        let err = client
            .get_payload(PayloadId::ZERO, TIMEOUT)
            .await
            .unwrap_err();
        assert!(matches!(err, RpcError::Data(_)));
    }

    #[tokio::test]
    async fn test_latest_block_and_unknown_block() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/rpc").body_contains("\"latest\"");
                then.status(200).json_body(json!({
                    "jsonrpc": "2.0",
                    "id": 1,
                    "result": { "hash": HEAD, "number": "0x2a", "timestamp": "0x64", "miner": "0x0" },
                }));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/rpc").body_contains("\"0x0\"");
                then.status(200).json_body(json!({ "jsonrpc": "2.0", "id": 1, "result": null }));
            })
            .await;

        let client = client_for(&server);
        let latest = client
            .block_by_number(BlockTag::Latest, TIMEOUT)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(latest.number, 42);
        assert_eq!(latest.timestamp, 100);

        let genesis = client.block_by_number(BlockTag::Number(0), TIMEOUT).await.unwrap();
        assert!(genesis.is_none());
    }

    #[tokio::test]
    async fn test_block_period_encodings() {
        for (raw, expected) in [(json!(5), 5), (json!("0x2"), 2), (json!("3"), 3)] {
            let server = MockServer::start_async().await;
            server
                .mock_async(|when, then| {
                    when.method(POST).path("/rpc").body_contains(DEFAULT_BLOCK_PERIOD_METHOD);
                    then.status(200).json_body(json!({ "jsonrpc": "2.0", "id": 1, "result": raw }));
                })
                .await;

            let client = client_for(&server);
            assert_eq!(client.block_period(TIMEOUT).await.unwrap(), expected);
        }
    }

    #[tokio::test]
    async fn test_block_period_malformed() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/rpc");
                then.status(200).json_body(json!({ "jsonrpc": "2.0", "id": 1, "result": { "period": 5 } }));
            })
            .await;

        let client = client_for(&server);
        assert!(matches!(client.block_period(TIMEOUT).await, Err(RpcError::Data(_))));
    }

    #[tokio::test]
    async fn test_validator_listing() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/rpc").body_contains(DEFAULT_VALIDATORS_METHOD);
                then.status(200).json_body(json!({
                    "jsonrpc": "2.0",
                    "id": 1,
                    "result": [
                        { "address": "0xaa", "stake": "32000000000000000000", "active": true },
                        { "address": "0xbb", "stake": 0, "active": false },
                    ],
                }));
            })
            .await;

        let client = client_for(&server);
        let records = client.validators(TIMEOUT).await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].address, "0xaa");
        assert!(!records[1].active);
        mock.assert_async().await;
    }
}
