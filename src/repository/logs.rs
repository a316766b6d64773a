use std::sync::Arc;
use std::time::Duration;

use alloy::providers::Provider;
use alloy::rpc::types::{Filter, Log};
use async_trait::async_trait;
use futures::StreamExt;
use tracing::instrument;

use super::error::RepositoryError;
use crate::config::Transport;
use crate::repository::{LogSource, LogStream, RepoResult};

/// Log source over an alloy provider.
///
/// `Transport::Http` watches through filter polling and works with any
/// provider; `Transport::Websocket` needs a provider connected over a pubsub
/// transport.
pub struct AlloyLogSource<P> {
    provider: Arc<P>,
    transport: Transport,
    poll_interval: Duration,
}

impl<P: Provider + Clone + 'static> AlloyLogSource<P> {
    pub fn new(provider: Arc<P>, transport: Transport, poll_interval: Duration) -> Self {
        Self {
            provider,
            transport,
            poll_interval,
        }
    }

    pub fn transport(&self) -> Transport {
        self.transport
    }
}

#[async_trait]
impl<P: Provider + Clone + Send + Sync + 'static> LogSource for AlloyLogSource<P> {
    #[instrument(skip(self), err)]
    async fn block_number(&self) -> RepoResult<u64> {
        self.provider
            .get_block_number()
            .await
            .map_err(|e| RepositoryError::from_transport(e.to_string()))
    }

    #[instrument(skip(self, filter), err)]
    async fn get_logs(&self, filter: &Filter) -> RepoResult<Vec<Log>> {
        self.provider.get_logs(filter).await.map_err(|e| {
            let err = RepositoryError::from_transport(e.to_string());
            if matches!(err, RepositoryError::RateLimited(_)) {
                tracing::warn!("Rate limited while fetching logs");
            }
            err
        })
    }

    #[instrument(skip(self, filter), err)]
    async fn watch_logs(&self, filter: &Filter) -> RepoResult<LogStream> {
        match self.transport {
            Transport::Http => {
                let poller = self
                    .provider
                    .watch_logs(filter)
                    .await
                    .map_err(|e| RepositoryError::from_transport(e.to_string()))?
                    .with_poll_interval(self.poll_interval);

                tracing::debug!("Installed log filter, polling every {:?}", self.poll_interval);
                Ok(Box::pin(poller.into_stream().map(Ok)))
            }
            Transport::Websocket => {
                let subscription = self
                    .provider
                    .subscribe_logs(filter)
                    .await
                    .map_err(|e| RepositoryError::from_transport(e.to_string()))?;

                tracing::debug!("Opened log subscription");
                Ok(Box::pin(
                    subscription.into_stream().map(|log| Ok(vec![log])),
                ))
            }
        }
    }
}
