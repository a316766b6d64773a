use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::{Address, U256};
use alloy::providers::{DynProvider, Provider, ProviderBuilder, WsConnect};
use alloy::rpc::client::{ClientBuilder, RpcClient};
use alloy::transports::http::Http;
use alloy::transports::layers::RetryBackoffLayer;
use rust_decimal::Decimal;

use crate::config::{Config, ContractAddresses, RpcConfig, Transport};
use crate::event::{CurveIndexer, DexIndexer, EventStream};
use crate::repository::{
    AlloyLaunchpadRepository, AlloyLogSource, LaunchpadRepository, LogSource, RepositoryError,
    parse_signer,
};
use crate::service::{
    ServiceError, ServiceResult, SimpleTradeResult, TokenService, TradingService,
};

/// Compute-unit budget handed to the RPC retry layer's rate limiter.
const COMPUTE_UNITS_PER_SECOND: u64 = 330;

fn http_client(rpc: &RpcConfig) -> ServiceResult<RpcClient> {
    let url: reqwest::Url = rpc
        .url
        .parse()
        .map_err(|e| ServiceError::Configuration(format!("invalid rpc.url {}: {e}", rpc.url)))?;

    let http = reqwest::Client::builder()
        .timeout(rpc.timeout())
        .build()
        .map_err(|e| ServiceError::Configuration(format!("failed to build HTTP client: {e}")))?;

    Ok(ClientBuilder::default()
        .layer(RetryBackoffLayer::new(
            rpc.max_retries,
            rpc.retry_backoff_ms,
            COMPUTE_UNITS_PER_SECOND,
        ))
        .transport(Http::with_client(http, url), false))
}

/// One configured entry point to the launchpad: trading and token façades,
/// historical indexers and live streams sharing the same connections.
///
/// # Examples
///
/// ```ignore
/// let config = Config::from_yaml("config/default.yaml")?;
/// let sdk = LaunchpadSdk::new(config)?;
///
/// let quote = sdk.trading().get_amount_out(token, parse_amount("1", 18)?, true).await?;
/// let events = sdk
///     .curve_indexer()
///     .fetch_all_events(start, 100, &EventFilter::all(), None)
///     .await?;
/// ```
pub struct LaunchpadSdk {
    config: Config,
    contracts: ContractAddresses,
    repository: Arc<dyn LaunchpadRepository>,
    logs: Arc<dyn LogSource>,
    /// Source for live streams when supplied by the caller instead of dialled per stream
    stream_logs: Option<Arc<dyn LogSource>>,
    trading: TradingService,
}

impl LaunchpadSdk {
    /// Connects over HTTP and, when `wallet.private_key` is set, signs with it.
    ///
    /// No request is made here; an unreachable node surfaces on first use.
    pub fn new(config: Config) -> ServiceResult<Self> {
        let contracts = config.contracts();
        let client = http_client(&config.rpc)?;

        let (provider, repository): (DynProvider, Arc<dyn LaunchpadRepository>) =
            if config.wallet.has_key() {
                let signer = parse_signer(&config.wallet.private_key)
                    .map_err(|e| ServiceError::Configuration(e.to_string()))?;
                tracing::info!("Initialized with wallet address: {}", signer.address());

                let provider = ProviderBuilder::new()
                    .wallet(signer.clone())
                    .connect_client(client)
                    .erased();
                let repository: Arc<dyn LaunchpadRepository> =
                    Arc::new(AlloyLaunchpadRepository::new_with_signer(
                        Arc::new(provider.clone()),
                        signer,
                        contracts,
                    ));
                (provider, repository)
            } else {
                tracing::info!("No signing key configured, running read-only");
                let provider = ProviderBuilder::new().connect_client(client).erased();
                let repository: Arc<dyn LaunchpadRepository> = Arc::new(
                    AlloyLaunchpadRepository::new(Arc::new(provider.clone()), contracts),
                );
                (provider, repository)
            };

        let logs: Arc<dyn LogSource> = Arc::new(AlloyLogSource::new(
            Arc::new(provider),
            Transport::Http,
            Duration::from_millis(config.stream.poll_interval_ms),
        ));

        tracing::info!(
            "Launchpad SDK ready on {} (chain {})",
            config.network,
            config.chain_id()
        );

        Ok(Self {
            trading: TradingService::new(repository.clone(), config.chain_id()),
            config,
            contracts,
            repository,
            logs,
            stream_logs: None,
        })
    }

    /// Builds the SDK over caller-supplied gateways. Streams use `logs` for
    /// every transport.
    pub fn with_components(
        config: Config,
        repository: Arc<dyn LaunchpadRepository>,
        logs: Arc<dyn LogSource>,
    ) -> Self {
        Self {
            trading: TradingService::new(repository.clone(), config.chain_id()),
            contracts: config.contracts(),
            config,
            repository,
            stream_logs: Some(logs.clone()),
            logs,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn contracts(&self) -> &ContractAddresses {
        &self.contracts
    }

    pub fn wallet_address(&self) -> Option<Address> {
        self.repository.wallet_address()
    }

    pub fn trading(&self) -> &TradingService {
        &self.trading
    }

    pub fn tokens(&self) -> &TokenService {
        self.trading.tokens()
    }

    /// See [`TradingService::simple_buy`].
    pub async fn simple_buy(
        &self,
        token: Address,
        amount_in: U256,
        slippage_percent: Decimal,
    ) -> ServiceResult<SimpleTradeResult> {
        self.trading
            .simple_buy(token, amount_in, slippage_percent)
            .await
    }

    /// See [`TradingService::simple_sell`].
    pub async fn simple_sell(
        &self,
        token: Address,
        amount_in: U256,
        slippage_percent: Decimal,
    ) -> ServiceResult<SimpleTradeResult> {
        self.trading
            .simple_sell(token, amount_in, slippage_percent)
            .await
    }

    pub fn curve_indexer(&self) -> CurveIndexer {
        CurveIndexer::new(self.logs.clone(), self.contracts.curve, &self.config.indexer)
    }

    pub fn dex_indexer(&self, pools: Vec<Address>) -> DexIndexer {
        DexIndexer::new(self.logs.clone(), pools, &self.config.indexer)
    }

    /// WMON pools of `tokens` on the DEX, across all standard fee tiers.
    pub async fn discover_pools(&self, tokens: &[Address]) -> ServiceResult<Vec<Address>> {
        DexIndexer::discover_pools(self.repository.as_ref(), self.contracts.wmon, tokens).await
    }

    /// A stopped stream of bonding-curve events.
    ///
    /// # Returns
    ///
    /// * `Ok(EventStream)` - Ready for listeners; call `start` to begin
    /// * `Err(ServiceError::Configuration)` - If the websocket transport is
    ///   selected without `rpc.ws_url`
    /// * `Err(ServiceError::TransientTransport)` - If the websocket cannot be opened
    pub async fn curve_stream(&self) -> ServiceResult<EventStream> {
        let source = self.stream_source("curve event stream").await?;
        Ok(EventStream::curve(
            source,
            self.contracts.curve,
            &self.config.stream,
        ))
    }

    /// A stopped stream of swaps on `pools`.
    pub async fn dex_stream(&self, pools: Vec<Address>) -> ServiceResult<EventStream> {
        let source = self.stream_source("DEX event stream").await?;
        Ok(EventStream::dex(source, pools, &self.config.stream))
    }

    async fn stream_source(&self, capability: &str) -> ServiceResult<Arc<dyn LogSource>> {
        let transport = self.config.stream.transport;
        let ws_url = match transport {
            Transport::Websocket => Some(self.config.require_ws_url(capability)?),
            Transport::Http => None,
        };

        if let Some(source) = &self.stream_logs {
            return Ok(source.clone());
        }
        let Some(ws_url) = ws_url else {
            return Ok(self.logs.clone());
        };

        let provider = ProviderBuilder::new()
            .connect_ws(WsConnect::new(ws_url))
            .await
            .map_err(|e| RepositoryError::from_transport(e.to_string()))?
            .erased();
        tracing::info!("Connected websocket for {capability}");

        Ok(Arc::new(AlloyLogSource::new(
            Arc::new(provider),
            transport,
            Duration::from_millis(self.config.stream.poll_interval_ms),
        )))
    }
}
