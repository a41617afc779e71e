use std::sync::Arc;
use std::time::Duration;

use tangle_node::{HttpNode, NodeApi, QuorumNode};

use crate::client::Client;
use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};

/// Programmatic setup of a [`Client`].
///
/// Node URLs become [`HttpNode`]s; nodes supplied through
/// [`with_node_api`](Self::with_node_api) replace them. Either way the list is
/// wrapped in a [`QuorumNode`].
pub struct ClientBuilder {
    config: ClientConfig,
    node_apis: Vec<Arc<dyn NodeApi>>,
}

impl ClientBuilder {
    /// Defaults without any node.
    pub fn new() -> Self {
        Self::from_config(ClientConfig {
            nodes: Vec::new(),
            ..ClientConfig::default()
        })
    }

    pub fn from_config(config: ClientConfig) -> Self {
        Self {
            config,
            node_apis: Vec::new(),
        }
    }

    pub fn node(mut self, url: impl Into<String>) -> Self {
        self.config.nodes.push(url.into());
        self
    }

    pub fn nodes<I, S>(mut self, urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.nodes.extend(urls.into_iter().map(Into::into));
        self
    }

    pub fn with_node_api(mut self, node: Arc<dyn NodeApi>) -> Self {
        self.node_apis.push(node);
        self
    }

    pub fn quorum(mut self, size: usize, threshold: u8) -> Self {
        self.config.quorum_size = size;
        self.config.quorum_threshold = threshold;
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn send_timeout(mut self, timeout: Duration) -> Self {
        self.config.send_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn gap_limit(mut self, gap_limit: u32) -> Self {
        self.config.gap_limit = gap_limit;
        self
    }

    pub fn scan_batch_size(mut self, batch_size: u32) -> Self {
        self.config.scan_batch_size = batch_size;
        self
    }

    pub fn local_pow(mut self, local_pow: bool) -> Self {
        self.config.local_pow = local_pow;
        self
    }

    pub fn pow_difficulty(mut self, difficulty: u32) -> Self {
        self.config.pow_difficulty = difficulty;
        self
    }

    pub fn pow_workers(mut self, workers: usize) -> Self {
        self.config.pow_workers = workers;
        self
    }

    pub fn bech32_hrp(mut self, hrp: impl Into<String>) -> Self {
        self.config.bech32_hrp = hrp.into();
        self
    }

    pub fn build(self) -> ClientResult<Client> {
        self.config.validate()?;
        let nodes = if self.node_apis.is_empty() {
            if self.config.nodes.is_empty() {
                return Err(ClientError::Config("no nodes configured".into()));
            }
            let timeout = self.config.request_timeout();
            self.config
                .nodes
                .iter()
                .map(|url| HttpNode::new(url, timeout).map(|node| Arc::new(node) as Arc<dyn NodeApi>))
                .collect::<Result<Vec<_>, _>>()?
        } else {
            self.node_apis
        };
        let node = QuorumNode::new(nodes, self.config.quorum_size, self.config.quorum_threshold)?;
        Ok(Client::new(self.config, Arc::new(node)))
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
