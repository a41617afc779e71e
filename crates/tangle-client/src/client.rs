use std::sync::Arc;
use std::time::{Duration, Instant};

use tangle_crypto::AddressDeriver;
use tangle_message::{Message, MessageBuilder, Payload, SignatureLockedOutput, TransactionPayload};
use tangle_node::{BalanceResponse, MessageMetadata, NodeApi, NodeError, NodeInfo};
use tangle_types::{Address, MessageId, MilestoneInfo, Output, OutputId, Seed};
use tangle_wallet::BalanceAggregator;
use tracing::{debug, info};

use crate::builder::ClientBuilder;
use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::request::{
    check_start_index, BalanceRequest, ConfirmationState, FindAddresses, MessageQuery, MessageResponse,
    SendRequest, UnspentAddressRequest,
};

/// Entry point for applications talking to the tangle.
///
/// Cheap to clone. Holds configuration and node handles only; seeds are
/// borrowed per call and nothing is cached between calls.
#[derive(Clone)]
pub struct Client {
    config: Arc<ClientConfig>,
    node: Arc<dyn NodeApi>,
    aggregator: BalanceAggregator,
}

impl Client {
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    pub(crate) fn new(config: ClientConfig, node: Arc<dyn NodeApi>) -> Self {
        Self {
            config: Arc::new(config),
            aggregator: BalanceAggregator::new(Arc::clone(&node)),
            node,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn node(&self) -> &Arc<dyn NodeApi> {
        &self.node
    }

    /// Bech32 form of `address` under the configured network prefix.
    pub fn to_bech32(&self, address: &Address) -> ClientResult<String> {
        Ok(address.to_bech32(&self.config.bech32_hrp)?)
    }

    // Node queries

    pub async fn get_info(&self) -> ClientResult<NodeInfo> {
        Ok(self.node.get_info().await?)
    }

    pub async fn get_tips(&self) -> ClientResult<Vec<MessageId>> {
        Ok(self.node.get_tips().await?)
    }

    pub async fn get_address_balance(&self, address: &Address) -> ClientResult<BalanceResponse> {
        Ok(self.node.get_address_balance(address).await?)
    }

    pub async fn get_address_outputs(&self, address: &Address) -> ClientResult<Vec<OutputId>> {
        Ok(self.node.get_address_outputs(address).await?)
    }

    pub async fn get_output(&self, output_id: &OutputId) -> ClientResult<Output> {
        Ok(self.node.get_output(output_id).await?)
    }

    pub async fn get_milestone(&self, index: u32) -> ClientResult<MilestoneInfo> {
        Ok(self.node.get_milestone(index).await?)
    }

    pub fn get_message(&self) -> GetMessage<'_> {
        GetMessage { client: self }
    }

    pub async fn message(&self, query: MessageQuery) -> ClientResult<MessageResponse> {
        let messages = self.get_message();
        Ok(match query {
            MessageQuery::Data(id) => MessageResponse::Data(messages.data(&id).await?),
            MessageQuery::Children(id) => MessageResponse::Children(messages.children(&id).await?),
            MessageQuery::Metadata(id) => MessageResponse::Metadata(messages.metadata(&id).await?),
            MessageQuery::Raw(id) => MessageResponse::Raw(messages.raw(&id).await?),
        })
    }

    /// Submit a prepared message. With local proof of work a message scoring
    /// below the configured difficulty is sealed first, searching from its
    /// current nonce.
    pub async fn post_message(&self, message: &Message) -> ClientResult<MessageId> {
        message.validate()?;
        if self.config.local_pow && message.pow_score()? < self.config.pow_difficulty {
            let mut builder = Message::builder()
                .with_parents(*message.parent1(), *message.parent2())
                .with_nonce_start(message.nonce());
            if let Some(payload) = message.payload() {
                builder = builder.with_payload(payload.clone());
            }
            let sealed = self.seal(builder, self.config.send_timeout()).await?;
            return self.submit(&sealed).await;
        }
        self.submit(message).await
    }

    /// Where `message_id` stands. `send` does not wait; callers poll this.
    pub async fn confirmation(&self, message_id: &MessageId) -> ClientResult<ConfirmationState> {
        let metadata = self.node.get_message_metadata(message_id).await?;
        Ok(ConfirmationState::from(&metadata))
    }

    // Seed operations

    pub async fn find_addresses(&self, seed: &Seed, request: &FindAddresses) -> ClientResult<Vec<Address>> {
        request.validate()?;
        let chain = request.path.chain(request.internal);
        let count = request.range.end - request.range.start;
        Ok(AddressDeriver::derive_range(seed, &chain, request.range.start, count)?)
    }

    pub async fn get_balance(&self, seed: &Seed, request: &BalanceRequest) -> ClientResult<u64> {
        check_start_index(request.start_index)?;
        let options = self.config.scan_options(&request.path, request.start_index);
        Ok(self.aggregator.balance(seed, &options).await?)
    }

    /// First public address at or above the start index with an unspent
    /// output, and its index.
    pub async fn get_unspent_address(
        &self,
        seed: &Seed,
        request: &UnspentAddressRequest,
    ) -> ClientResult<Option<(Address, u32)>> {
        check_start_index(request.start_index)?;
        let options = self.config.scan_options(&request.path, request.start_index);
        Ok(self.aggregator.first_unspent_address(seed, &options).await?)
    }

    /// Build, seal and submit a message for `request`. Returns once the node
    /// accepted it; see [`confirmation`](Self::confirmation).
    pub async fn send(&self, seed: &Seed, request: &SendRequest) -> ClientResult<MessageId> {
        request.validate()?;
        let timeout = self.config.send_timeout();
        let deadline = Instant::now() + timeout;
        match tokio::time::timeout(timeout, self.send_inner(seed, request, deadline)).await {
            Ok(result) => result,
            Err(_) => Err(ClientError::NodeUnavailable {
                query: "send".into(),
                reason: format!("timed out after {}ms", timeout.as_millis()),
            }),
        }
    }

    async fn send_inner(&self, seed: &Seed, request: &SendRequest, deadline: Instant) -> ClientResult<MessageId> {
        let payload: Payload = if request.outputs.is_empty() {
            match &request.indexation {
                Some(indexation) => indexation.clone().into(),
                None => return Err(ClientError::InvalidRequest("nothing to send".into())),
            }
        } else {
            self.build_transaction(seed, request).await?.into()
        };

        let (parent1, parent2) = self.resolve_parents(request.parents).await?;
        let builder = Message::builder().with_parents(parent1, parent2).with_payload(payload);
        // The search gets whatever is left of the send budget.
        let remaining = deadline.saturating_duration_since(Instant::now());
        let message = self.seal(builder, remaining).await?;
        self.submit(&message).await
    }

    async fn build_transaction(&self, seed: &Seed, request: &SendRequest) -> ClientResult<TransactionPayload> {
        let amount = request.total_amount()?;
        let options = self.config.scan_options(&request.path, request.start_index);
        let selection = self.aggregator.select_inputs(seed, &options, amount).await?;

        let mut outputs = request
            .outputs
            .iter()
            .map(|(address, amount)| SignatureLockedOutput::new(*address, *amount))
            .collect::<Result<Vec<_>, _>>()?;

        let remainder = selection.remainder(amount);
        if remainder > 0 {
            let index = selection.last_index.unwrap_or(request.start_index);
            let change_path = request.path.address(true, index)?;
            let change = AddressDeriver::derive_address(seed, &change_path)?;
            debug!(remainder, index, address = %change.short_hex(), "adding change output");
            outputs.push(SignatureLockedOutput::new(change, remainder)?);
        }

        let mut builder = TransactionPayload::builder()
            .with_inputs(selection.inputs)
            .with_outputs(outputs);
        if let Some(indexation) = &request.indexation {
            builder = builder.with_indexation(indexation.clone());
        }
        Ok(builder.finish(seed)?)
    }

    async fn resolve_parents(&self, explicit: Option<(MessageId, MessageId)>) -> ClientResult<(MessageId, MessageId)> {
        if let Some((parent1, parent2)) = explicit {
            for parent in [parent1, parent2] {
                match self.node.get_message_metadata(&parent).await {
                    Ok(_) => {}
                    Err(NodeError::NotFound(_)) => return Err(ClientError::InvalidParent(parent)),
                    Err(e) => return Err(e.into()),
                }
            }
            return Ok((parent1, parent2));
        }

        let tips = self.node.get_tips().await?;
        match tips.as_slice() {
            [] => Err(ClientError::NodeUnavailable {
                query: "tips".into(),
                reason: "node returned no tips".into(),
            }),
            [only] => Ok((*only, *only)),
            [first, second, ..] => Ok((*first, *second)),
        }
    }

    /// Seal on a blocking task, or leave the nonce to the node.
    async fn seal(&self, builder: MessageBuilder, budget: Duration) -> ClientResult<Message> {
        if !self.config.local_pow {
            return Ok(builder.build_unsealed()?);
        }
        let pow = self.config.pow_config().with_timeout(budget);
        let started = Instant::now();
        let message = tokio::task::spawn_blocking(move || builder.seal(&pow))
            .await
            .map_err(|e| ClientError::Internal(format!("proof-of-work task failed: {e}")))??;
        debug!(
            nonce = message.nonce(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "proof of work done"
        );
        Ok(message)
    }

    async fn submit(&self, message: &Message) -> ClientResult<MessageId> {
        let remote = self.node.post_message(message).await?;
        if self.config.local_pow {
            let local = message.id()?;
            if local != remote {
                return Err(ClientError::EncodingMismatch { local, remote });
            }
        }
        info!(
            message_id = %remote,
            payload = message.payload().map(Payload::kind).unwrap_or("none"),
            "message submitted"
        );
        Ok(remote)
    }
}

/// Message lookups, see [`Client::get_message`].
pub struct GetMessage<'a> {
    client: &'a Client,
}

impl GetMessage<'_> {
    pub async fn data(&self, message_id: &MessageId) -> ClientResult<Message> {
        Ok(self.client.node.get_message(message_id).await?)
    }

    pub async fn children(&self, message_id: &MessageId) -> ClientResult<Vec<MessageId>> {
        Ok(self.client.node.get_message_children(message_id).await?)
    }

    pub async fn metadata(&self, message_id: &MessageId) -> ClientResult<MessageMetadata> {
        Ok(self.client.node.get_message_metadata(message_id).await?)
    }

    pub async fn raw(&self, message_id: &MessageId) -> ClientResult<Vec<u8>> {
        Ok(self.client.node.get_message_raw(message_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use tangle_message::{IndexationPayload, TransactionPayload as Tx};
    use tangle_node::{InMemoryNode, InMemoryNodeConfig, LedgerInclusionState, NodeResult};
    use tangle_types::DerivationPath;

    fn seed() -> Seed {
        Seed::from_bytes([7; 32])
    }

    fn account() -> DerivationPath {
        "m/0'/0'".parse().unwrap()
    }

    fn client_for(node: Arc<dyn NodeApi>) -> Client {
        ClientBuilder::new()
            .with_node_api(node)
            .pow_difficulty(4)
            .gap_limit(5)
            .build()
            .unwrap()
    }

    fn address_at(internal: bool, index: u32) -> Address {
        AddressDeriver::derive_address(&seed(), &account().address(internal, index).unwrap()).unwrap()
    }

    fn transaction_of(message: &Message) -> &Tx {
        match message.payload() {
            Some(Payload::Transaction(tx)) => &**tx,
            other => panic!("expected transaction, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn find_addresses_matches_deriver() {
        let client = client_for(Arc::new(InMemoryNode::default()));
        let request = FindAddresses::new(account()).with_range(2..5);
        let addresses = client.find_addresses(&seed(), &request).await.unwrap();
        assert_eq!(addresses, vec![address_at(false, 2), address_at(false, 3), address_at(false, 4)]);

        let internal = client
            .find_addresses(&seed(), &request.clone().with_internal(true))
            .await
            .unwrap();
        assert_eq!(internal[0], address_at(true, 2));
    }

    #[tokio::test]
    async fn find_addresses_rejects_empty_range() {
        let client = client_for(Arc::new(InMemoryNode::default()));
        let request = FindAddresses::new(account()).with_range(3..3);
        assert!(matches!(
            client.find_addresses(&seed(), &request).await,
            Err(ClientError::InvalidRequest(_))
        ));
    }

    #[tokio::test]
    async fn send_adds_change_to_internal_address() {
        let node = Arc::new(InMemoryNode::default());
        node.fund(&address_at(false, 0), 10);
        let client = client_for(node.clone());
        let target = Address::from_hash([9; 32]);

        let id = client
            .send(&seed(), &SendRequest::new(account()).with_output(target, 4))
            .await
            .unwrap();

        let message = client.get_message().data(&id).await.unwrap();
        let outputs = transaction_of(&message).essence().outputs();
        assert_eq!(outputs.len(), 2);
        assert!(outputs.iter().any(|o| *o.address() == target && o.amount() == 4));
        assert!(outputs.iter().any(|o| *o.address() == address_at(true, 0) && o.amount() == 6));

        assert_eq!(client.get_address_balance(&target).await.unwrap().balance, 4);
        assert_eq!(
            client.get_balance(&seed(), &BalanceRequest::new(account())).await.unwrap(),
            6
        );
    }

    #[tokio::test]
    async fn send_exact_amount_has_no_change() {
        let node = Arc::new(InMemoryNode::default());
        node.fund(&address_at(false, 1), 3);
        let client = client_for(node);

        let id = client
            .send(
                &seed(),
                &SendRequest::new(account()).with_output(Address::from_hash([9; 32]), 3),
            )
            .await
            .unwrap();
        let message = client.get_message().data(&id).await.unwrap();
        assert_eq!(transaction_of(&message).essence().outputs().len(), 1);
    }

    #[tokio::test]
    async fn insufficient_balance_posts_nothing() {
        let node = Arc::new(InMemoryNode::default());
        node.fund(&address_at(false, 0), 1);
        let client = client_for(node.clone());
        let tips_before = client.get_tips().await.unwrap();

        let err = client
            .send(
                &seed(),
                &SendRequest::new(account()).with_output(Address::from_hash([9; 32]), 5),
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ClientError::InsufficientBalance {
                required: 5,
                available: 1
            }
        ));
        assert_eq!(client.get_tips().await.unwrap(), tips_before);
    }

    #[tokio::test]
    async fn explicit_parents_must_exist() {
        let node = Arc::new(InMemoryNode::default());
        let client = client_for(node.clone());
        let missing = MessageId::from_hash([5; 32]);
        let request = SendRequest::new(account())
            .with_indexation(IndexationPayload::new("tag", "data").unwrap())
            .with_parents(node.genesis(), missing);

        let err = client.send(&seed(), &request).await.unwrap_err();
        assert!(matches!(err, ClientError::InvalidParent(p) if p == missing));
    }

    #[tokio::test]
    async fn explicit_parents_are_used() {
        let node = Arc::new(InMemoryNode::default());
        let client = client_for(node.clone());
        let genesis = node.genesis();
        let request = SendRequest::new(account())
            .with_indexation(IndexationPayload::new("tag", "data").unwrap())
            .with_parents(genesis, genesis);

        let id = client.send(&seed(), &request).await.unwrap();
        let message = client.get_message().data(&id).await.unwrap();
        assert_eq!(message.parents(), [genesis, genesis]);
        assert!(message.pow_score().unwrap() >= 4);
        assert_eq!(client.get_message().children(&genesis).await.unwrap(), vec![id]);
    }

    #[tokio::test]
    async fn message_queries_share_one_shape() {
        let node = Arc::new(InMemoryNode::default());
        let client = client_for(node.clone());
        let request = SendRequest::new(account()).with_indexation(IndexationPayload::new("tag", "data").unwrap());
        let id = client.send(&seed(), &request).await.unwrap();

        let raw = match client.message(MessageQuery::Raw(id)).await.unwrap() {
            MessageResponse::Raw(bytes) => bytes,
            other => panic!("unexpected {other:?}"),
        };
        assert_eq!(Message::id_of_bytes(&raw), id);

        match client.message(MessageQuery::Metadata(id)).await.unwrap() {
            MessageResponse::Metadata(metadata) => assert_eq!(metadata.message_id, id),
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(
            client.message(MessageQuery::Data(MessageId::from_hash([1; 32]))).await,
            Err(ClientError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn confirmation_follows_milestones() {
        let node = Arc::new(InMemoryNode::new(InMemoryNodeConfig {
            auto_milestone: false,
            ..Default::default()
        }));
        let client = client_for(node.clone());
        let request = SendRequest::new(account()).with_indexation(IndexationPayload::new("tag", "data").unwrap());
        let id = client.send(&seed(), &request).await.unwrap();

        assert_eq!(client.confirmation(&id).await.unwrap(), ConfirmationState::Pending);
        let milestone = node.issue_milestone().unwrap();
        assert_eq!(
            client.confirmation(&id).await.unwrap(),
            ConfirmationState::Confirmed {
                milestone_index: milestone.index,
                inclusion: LedgerInclusionState::NoTransaction
            }
        );
    }

    #[tokio::test]
    async fn post_message_seals_low_score_messages() {
        let node = Arc::new(InMemoryNode::new(InMemoryNodeConfig {
            min_pow_score: 4,
            ..Default::default()
        }));
        let client = client_for(node.clone());
        let genesis = node.genesis();
        let unsealed = Message::builder()
            .with_parents(genesis, genesis)
            .with_payload(IndexationPayload::new("tag", "unsealed").unwrap())
            .build_unsealed()
            .unwrap();

        let id = client.post_message(&unsealed).await.unwrap();
        let stored = client.get_message().data(&id).await.unwrap();
        assert!(stored.pow_score().unwrap() >= 4);
        assert_eq!(stored.payload(), unsealed.payload());
    }

    /// Accepts everything and answers with a fixed id.
    struct MisreportingNode(InMemoryNode);

    #[async_trait]
    impl NodeApi for MisreportingNode {
        fn endpoint(&self) -> &str {
            "misreporting"
        }
        async fn get_info(&self) -> NodeResult<NodeInfo> {
            self.0.get_info().await
        }
        async fn get_tips(&self) -> NodeResult<Vec<MessageId>> {
            self.0.get_tips().await
        }
        async fn get_message(&self, id: &MessageId) -> NodeResult<Message> {
            self.0.get_message(id).await
        }
        async fn get_message_raw(&self, id: &MessageId) -> NodeResult<Vec<u8>> {
            self.0.get_message_raw(id).await
        }
        async fn get_message_children(&self, id: &MessageId) -> NodeResult<Vec<MessageId>> {
            self.0.get_message_children(id).await
        }
        async fn get_message_metadata(&self, id: &MessageId) -> NodeResult<MessageMetadata> {
            self.0.get_message_metadata(id).await
        }
        async fn get_address_balance(&self, address: &Address) -> NodeResult<BalanceResponse> {
            self.0.get_address_balance(address).await
        }
        async fn get_address_outputs(&self, address: &Address) -> NodeResult<Vec<OutputId>> {
            self.0.get_address_outputs(address).await
        }
        async fn get_output(&self, id: &OutputId) -> NodeResult<Output> {
            self.0.get_output(id).await
        }
        async fn get_milestone(&self, index: u32) -> NodeResult<MilestoneInfo> {
            self.0.get_milestone(index).await
        }
        async fn post_message(&self, _message: &Message) -> NodeResult<MessageId> {
            Ok(MessageId::from_hash([0xee; 32]))
        }
    }

    #[tokio::test]
    async fn id_mismatch_is_fatal_with_local_pow() {
        let client = client_for(Arc::new(MisreportingNode(InMemoryNode::default())));
        let request = SendRequest::new(account()).with_indexation(IndexationPayload::new("tag", "data").unwrap());
        let err = client.send(&seed(), &request).await.unwrap_err();
        assert!(matches!(
            err,
            ClientError::EncodingMismatch { remote, .. } if remote == MessageId::from_hash([0xee; 32])
        ));
    }

    #[tokio::test]
    async fn id_check_is_skipped_with_remote_pow() {
        let client = ClientBuilder::new()
            .with_node_api(Arc::new(MisreportingNode(InMemoryNode::default())))
            .local_pow(false)
            .build()
            .unwrap();
        let request = SendRequest::new(account()).with_indexation(IndexationPayload::new("tag", "data").unwrap());
        assert_eq!(
            client.send(&seed(), &request).await.unwrap(),
            MessageId::from_hash([0xee; 32])
        );
    }

    #[tokio::test]
    async fn unreachable_pow_target_times_out() {
        let node = Arc::new(InMemoryNode::default());
        let config = ClientConfig {
            nodes: Vec::new(),
            pow_difficulty: 200,
            pow_max_attempts: 10_000,
            ..Default::default()
        };
        let client = ClientBuilder::from_config(config).with_node_api(node).build().unwrap();
        let request = SendRequest::new(account()).with_indexation(IndexationPayload::new("tag", "data").unwrap());

        let err = client.send(&seed(), &request).await.unwrap_err();
        assert!(matches!(err, ClientError::ProofOfWorkTimeout { .. }));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn send_timeout_bounds_proof_of_work() {
        let config = ClientConfig {
            nodes: Vec::new(),
            pow_difficulty: 200,
            pow_max_attempts: 1 << 44,
            send_timeout_ms: 100,
            ..Default::default()
        };
        let client = ClientBuilder::from_config(config)
            .with_node_api(Arc::new(InMemoryNode::default()))
            .build()
            .unwrap();
        let request = SendRequest::new(account()).with_indexation(IndexationPayload::new("tag", "data").unwrap());

        let started = Instant::now();
        let err = client.send(&seed(), &request).await.unwrap_err();
        assert!(err.is_retryable(), "unexpected {err:?}");
        assert!(started.elapsed() < Duration::from_secs(2));
    }
}
