use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use tangle_message::Message;
use tangle_types::{Address, MessageId, MilestoneInfo, Output, OutputId};
use tracing::debug;
use url::Url;

use crate::api::NodeApi;
use crate::error::{NodeError, NodeResult};
use crate::types::{
    AddressOutputsResponse, BalanceResponse, ChildrenResponse, Envelope, MessageMetadata,
    NodeInfo, PostMessageResponse, TipsResponse,
};

/// [`NodeApi`] over a node's REST interface (`/api/v1`).
///
/// Every request is bounded by the timeout given at construction. Status
/// mapping: 404 is `NotFound`, 5xx, connection failures and timeouts are
/// `Unavailable`, any other failure status is `Rejected`.
#[derive(Clone)]
pub struct HttpNode {
    base: Url,
    endpoint: String,
    client: Client,
}

impl HttpNode {
    /// `url` like `"http://127.0.0.1:14265"`.
    pub fn new(url: &str, timeout: Duration) -> NodeResult<Self> {
        let mut base = Url::parse(url)?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let endpoint = url.trim_end_matches('/').to_string();
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| NodeError::Unavailable {
                endpoint: endpoint.clone(),
                query: "client setup".into(),
                reason: e.to_string(),
            })?;
        Ok(Self {
            base,
            endpoint,
            client,
        })
    }

    fn route(&self, path: &str) -> NodeResult<Url> {
        Ok(self.base.join(path)?)
    }

    fn unavailable(&self, query: &str, reason: impl Into<String>) -> NodeError {
        NodeError::Unavailable {
            endpoint: self.endpoint.clone(),
            query: query.to_string(),
            reason: reason.into(),
        }
    }

    async fn send(&self, query: &str, request: RequestBuilder) -> NodeResult<Response> {
        let response = request.send().await.map_err(|e| {
            let reason = if e.is_timeout() {
                "request timed out".to_string()
            } else {
                e.to_string()
            };
            self.unavailable(query, reason)
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status == StatusCode::NOT_FOUND {
            return Err(NodeError::NotFound(query.to_string()));
        }
        if status.is_server_error() {
            return Err(self.unavailable(query, format!("HTTP {status}")));
        }
        let body = response.text().await.unwrap_or_default();
        Err(NodeError::Rejected(format!("{query}: HTTP {status} {body}")))
    }

    async fn get_data<T: DeserializeOwned>(&self, query: &str, path: &str) -> NodeResult<T> {
        let url = self.route(path)?;
        debug!(endpoint = %self.endpoint, query, "node request");
        let response = self.send(query, self.client.get(url)).await?;
        let envelope: Envelope<T> = response
            .json()
            .await
            .map_err(|e| NodeError::Decode(format!("{query}: {e}")))?;
        Ok(envelope.data)
    }
}

#[async_trait]
impl NodeApi for HttpNode {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn get_info(&self) -> NodeResult<NodeInfo> {
        self.get_data("info", "api/v1/info").await
    }

    async fn get_tips(&self) -> NodeResult<Vec<MessageId>> {
        let tips: TipsResponse = self.get_data("tips", "api/v1/tips").await?;
        Ok(tips.tip_message_ids)
    }

    async fn get_message(&self, id: &MessageId) -> NodeResult<Message> {
        self.get_data(&format!("message {id}"), &format!("api/v1/messages/{id}"))
            .await
    }

    async fn get_message_raw(&self, id: &MessageId) -> NodeResult<Vec<u8>> {
        let query = format!("raw message {id}");
        let url = self.route(&format!("api/v1/messages/{id}/raw"))?;
        let response = self.send(&query, self.client.get(url)).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| self.unavailable(&query, e.to_string()))?;
        Ok(bytes.to_vec())
    }

    async fn get_message_children(&self, id: &MessageId) -> NodeResult<Vec<MessageId>> {
        let children: ChildrenResponse = self
            .get_data(
                &format!("children of {id}"),
                &format!("api/v1/messages/{id}/children"),
            )
            .await?;
        Ok(children.children_message_ids)
    }

    async fn get_message_metadata(&self, id: &MessageId) -> NodeResult<MessageMetadata> {
        self.get_data(
            &format!("metadata of {id}"),
            &format!("api/v1/messages/{id}/metadata"),
        )
        .await
    }

    async fn get_address_balance(&self, address: &Address) -> NodeResult<BalanceResponse> {
        self.get_data(
            &format!("balance of {}", address.short_hex()),
            &format!("api/v1/addresses/ed25519/{}", address.to_hex()),
        )
        .await
    }

    async fn get_address_outputs(&self, address: &Address) -> NodeResult<Vec<OutputId>> {
        let outputs: AddressOutputsResponse = self
            .get_data(
                &format!("outputs of {}", address.short_hex()),
                &format!("api/v1/addresses/ed25519/{}/outputs", address.to_hex()),
            )
            .await?;
        Ok(outputs.output_ids)
    }

    async fn get_output(&self, id: &OutputId) -> NodeResult<Output> {
        self.get_data(&format!("output {id}"), &format!("api/v1/outputs/{id}"))
            .await
    }

    async fn get_milestone(&self, index: u32) -> NodeResult<MilestoneInfo> {
        self.get_data(
            &format!("milestone {index}"),
            &format!("api/v1/milestones/{index}"),
        )
        .await
    }

    async fn post_message(&self, message: &Message) -> NodeResult<MessageId> {
        let query = "post message";
        let url = self.route("api/v1/messages")?;
        debug!(endpoint = %self.endpoint, "posting message");
        let response = self
            .send(query, self.client.post(url).json(message))
            .await?;
        let envelope: Envelope<PostMessageResponse> = response
            .json()
            .await
            .map_err(|e| NodeError::Decode(format!("{query}: {e}")))?;
        Ok(envelope.data.message_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    /// Answer one request with a canned response; the handle yields the
    /// request line.
    async fn serve_once(status: &'static str, body: String) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let request = read_request(&mut socket).await;
            let response = format!(
                "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
            request.lines().next().unwrap_or_default().to_string()
        });
        (format!("http://{addr}"), handle)
    }

    async fn read_request(socket: &mut tokio::net::TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        loop {
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
            let text = String::from_utf8_lossy(&buf).to_string();
            if let Some(head_end) = text.find("\r\n\r\n") {
                let length = text[..head_end]
                    .lines()
                    .find_map(|l| {
                        let (name, value) = l.split_once(':')?;
                        name.eq_ignore_ascii_case("content-length")
                            .then(|| value.trim().parse::<usize>().ok())
                            .flatten()
                    })
                    .unwrap_or(0);
                if buf.len() >= head_end + 4 + length {
                    return text;
                }
            }
        }
        String::from_utf8_lossy(&buf).to_string()
    }

    fn node(url: &str) -> HttpNode {
        HttpNode::new(url, Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn info_unwraps_envelope() {
        let body = json!({ "data": {
            "name": "HORNET", "version": "0.6.0", "isHealthy": true,
            "networkId": "testnet", "bech32Hrp": "atoi", "minPowScore": 4000,
            "latestMilestoneIndex": 7, "confirmedMilestoneIndex": 7
        }});
        let (url, request) = serve_once("200 OK", body.to_string()).await;
        let info = node(&url).get_info().await.unwrap();
        assert_eq!(info.name, "HORNET");
        assert_eq!(info.latest_milestone_index, 7);
        assert_eq!(request.await.unwrap(), "GET /api/v1/info HTTP/1.1");
    }

    #[tokio::test]
    async fn address_outputs_route_and_ids() {
        let address = Address::from_hash([3; 32]);
        let output_id = OutputId::new(tangle_types::TransactionId::from_hash([4; 32]), 1);
        let body = json!({ "data": {
            "address": address.to_hex(),
            "outputIds": [output_id.to_hex()]
        }});
        let (url, request) = serve_once("200 OK", body.to_string()).await;
        let ids = node(&url).get_address_outputs(&address).await.unwrap();
        assert_eq!(ids, vec![output_id]);
        assert_eq!(
            request.await.unwrap(),
            format!("GET /api/v1/addresses/ed25519/{}/outputs HTTP/1.1", address.to_hex())
        );
    }

    #[tokio::test]
    async fn not_found_maps_to_not_found() {
        let (url, _request) = serve_once("404 Not Found", "{}".into()).await;
        let err = node(&url).get_milestone(99).await.unwrap_err();
        assert!(matches!(err, NodeError::NotFound(_)));
    }

    #[tokio::test]
    async fn server_error_maps_to_unavailable() {
        let (url, _request) = serve_once("503 Service Unavailable", "{}".into()).await;
        let err = node(&url).get_tips().await.unwrap_err();
        assert!(err.is_unavailable());
    }

    #[tokio::test]
    async fn bad_request_maps_to_rejected() {
        let message = Message::builder()
            .with_parents(MessageId::from_hash([1; 32]), MessageId::from_hash([2; 32]))
            .build_unsealed()
            .unwrap();
        let (url, request) =
            serve_once("400 Bad Request", r#"{"error":"invalid parents"}"#.into()).await;
        let err = node(&url).post_message(&message).await.unwrap_err();
        match err {
            NodeError::Rejected(reason) => assert!(reason.contains("invalid parents")),
            other => panic!("unexpected error {other:?}"),
        }
        assert_eq!(request.await.unwrap(), "POST /api/v1/messages HTTP/1.1");
    }

    #[tokio::test]
    async fn refused_connection_is_unavailable() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let err = node(&format!("http://{addr}")).get_info().await.unwrap_err();
        assert!(err.is_unavailable());
    }

    #[tokio::test]
    async fn slow_node_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let _server = tokio::spawn(async move {
            let (_socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(10)).await;
        });
        let node = HttpNode::new(&format!("http://{addr}"), Duration::from_millis(100)).unwrap();
        match node.get_info().await.unwrap_err() {
            NodeError::Unavailable { reason, .. } => assert_eq!(reason, "request timed out"),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn base_path_is_preserved() {
        let node = node("http://localhost:14265/node-a");
        assert_eq!(
            node.route("api/v1/info").unwrap().as_str(),
            "http://localhost:14265/node-a/api/v1/info"
        );
        assert_eq!(node.endpoint(), "http://localhost:14265/node-a");
    }

    #[test]
    fn invalid_url_is_rejected() {
        assert!(matches!(
            HttpNode::new("not a url", Duration::from_secs(1)),
            Err(NodeError::Url(_))
        ));
    }
}
