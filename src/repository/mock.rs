//! In-memory gateway doubles for the indexer, stream and façade tests.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use alloy::primitives::{Address, B256, Bytes, LogData, Signature, U256};
use alloy::rpc::types::{Filter, Log};
use alloy::signers::SignerSync;
use alloy::signers::local::PrivateKeySigner;
use alloy::sol_types::SolEvent;
use async_trait::async_trait;
use futures::StreamExt;
use futures::channel::mpsc;

use super::error::RepositoryError;
use super::types::{CurveState, Quote, TokenMetadata, TradeCall, TxOutcome};
use super::{LaunchpadRepository, LogSource, LogStream, RepoResult};

/// Wraps an encoded event into an RPC log with the given position.
pub(crate) fn rpc_log<E: SolEvent>(
    address: Address,
    event: &E,
    block_number: u64,
    transaction_index: u64,
    log_index: u64,
) -> Log {
    raw_log(
        address,
        event.encode_log_data(),
        block_number,
        transaction_index,
        log_index,
    )
}

pub(crate) fn raw_log(
    address: Address,
    data: LogData,
    block_number: u64,
    transaction_index: u64,
    log_index: u64,
) -> Log {
    Log {
        inner: alloy::primitives::Log { address, data },
        block_hash: Some(B256::with_last_byte(block_number as u8)),
        block_number: Some(block_number),
        block_timestamp: None,
        transaction_hash: Some(tx_hash(block_number, transaction_index)),
        transaction_index: Some(transaction_index),
        log_index: Some(log_index),
        removed: false,
    }
}

pub(crate) fn tx_hash(block_number: u64, transaction_index: u64) -> B256 {
    let mut bytes = [0u8; 32];
    bytes[16..24].copy_from_slice(&block_number.to_be_bytes());
    bytes[24..].copy_from_slice(&transaction_index.to_be_bytes());
    B256::from(bytes)
}

/// A log with an unknown topic and junk data.
pub(crate) fn garbage_log(address: Address, block_number: u64, log_index: u64) -> Log {
    raw_log(
        address,
        LogData::new_unchecked(
            vec![B256::repeat_byte(0xee)],
            Bytes::from_static(&[1, 2, 3]),
        ),
        block_number,
        0,
        log_index,
    )
}

/// One scripted `watch_logs` session.
pub(crate) enum WatchSession {
    /// Opening the watch fails.
    Refuse(RepositoryError),
    /// Yields the batches, then ends (the transport dropped).
    Finite(Vec<RepoResult<Vec<Log>>>),
    /// Yields the batches, then stays open.
    HoldOpen(Vec<RepoResult<Vec<Log>>>),
    /// Yields whatever the test pushes; ends when the sender is dropped.
    Channel(mpsc::UnboundedReceiver<RepoResult<Vec<Log>>>),
}

#[derive(Default)]
pub(crate) struct MockLogSource {
    head: Mutex<u64>,
    logs: Mutex<Vec<Log>>,
    requested_ranges: Mutex<Vec<(u64, u64)>>,
    get_logs_failures: Mutex<VecDeque<RepositoryError>>,
    always_fail_from: Mutex<Option<u64>>,
    sessions: Mutex<HashMap<Address, VecDeque<WatchSession>>>,
    watch_calls: Mutex<HashMap<Address, usize>>,
    get_logs_calls: AtomicUsize,
}

impl MockLogSource {
    pub(crate) fn new(head: u64) -> Self {
        Self {
            head: Mutex::new(head),
            ..Default::default()
        }
    }

    pub(crate) fn with_logs(self, logs: Vec<Log>) -> Self {
        self.logs.lock().unwrap().extend(logs);
        self
    }

    /// The next `count` `get_logs` calls fail with `error`.
    pub(crate) fn fail_next_get_logs(&self, count: usize, error: RepositoryError) {
        let mut failures = self.get_logs_failures.lock().unwrap();
        failures.extend(std::iter::repeat_n(error, count));
    }

    /// Every `get_logs` call whose range starts at `from_block` fails.
    pub(crate) fn always_fail_from(&self, from_block: u64) {
        *self.always_fail_from.lock().unwrap() = Some(from_block);
    }

    /// Lets `address` be watched; with no sessions queued every watch is refused.
    pub(crate) fn register_watch(&self, address: Address) {
        self.sessions.lock().unwrap().entry(address).or_default();
    }

    pub(crate) fn push_session(&self, address: Address, session: WatchSession) {
        self.sessions
            .lock()
            .unwrap()
            .entry(address)
            .or_default()
            .push_back(session);
    }

    pub(crate) fn requested_ranges(&self) -> Vec<(u64, u64)> {
        let mut ranges = self.requested_ranges.lock().unwrap().clone();
        ranges.sort();
        ranges
    }

    pub(crate) fn get_logs_calls(&self) -> usize {
        self.get_logs_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn watch_calls(&self, address: Address) -> usize {
        self.watch_calls
            .lock()
            .unwrap()
            .get(&address)
            .copied()
            .unwrap_or(0)
    }

    fn watched_address(&self, filter: &Filter) -> Option<Address> {
        self.sessions
            .lock()
            .unwrap()
            .keys()
            .copied()
            .find(|address| filter.address.matches(address))
    }
}

#[async_trait]
impl LogSource for MockLogSource {
    async fn block_number(&self) -> RepoResult<u64> {
        Ok(*self.head.lock().unwrap())
    }

    async fn get_logs(&self, filter: &Filter) -> RepoResult<Vec<Log>> {
        self.get_logs_calls.fetch_add(1, Ordering::SeqCst);
        let from = filter.get_from_block().unwrap_or(0);
        let to = filter.get_to_block().unwrap_or(u64::MAX);

        if *self.always_fail_from.lock().unwrap() == Some(from) {
            return Err(RepositoryError::NetworkError(format!(
                "connection reset fetching {from}..={to}"
            )));
        }
        if let Some(error) = self.get_logs_failures.lock().unwrap().pop_front() {
            return Err(error);
        }

        self.requested_ranges.lock().unwrap().push((from, to));

        let logs = self.logs.lock().unwrap();
        Ok(logs
            .iter()
            .filter(|log| {
                let block = log.block_number.unwrap_or_default();
                block >= from && block <= to && filter.address.matches(&log.address())
            })
            .cloned()
            .collect())
    }

    async fn watch_logs(&self, filter: &Filter) -> RepoResult<LogStream> {
        let address = self
            .watched_address(filter)
            .ok_or_else(|| RepositoryError::NetworkError("no session scripted".into()))?;

        *self.watch_calls.lock().unwrap().entry(address).or_default() += 1;

        let session = self
            .sessions
            .lock()
            .unwrap()
            .get_mut(&address)
            .and_then(|sessions| sessions.pop_front());

        match session {
            None => Err(RepositoryError::NetworkError("connection refused".into())),
            Some(WatchSession::Refuse(error)) => Err(error),
            Some(WatchSession::Finite(batches)) => Ok(Box::pin(futures::stream::iter(batches))),
            Some(WatchSession::HoldOpen(batches)) => Ok(Box::pin(
                futures::stream::iter(batches).chain(futures::stream::pending()),
            )),
            Some(WatchSession::Channel(receiver)) => Ok(Box::pin(receiver)),
        }
    }
}

/// Façade double: fixed quotes, an in-memory allowance and a call journal.
pub(crate) struct MockRepository {
    signer: Option<PrivateKeySigner>,
    pub(crate) quote_out: Mutex<Quote>,
    pub(crate) quote_in: Mutex<Quote>,
    pub(crate) allowance: Mutex<U256>,
    pub(crate) balances: Mutex<HashMap<(Address, Address), U256>>,
    pub(crate) pools: Mutex<HashMap<(Address, u32), Address>>,
    pub(crate) nonce: Mutex<U256>,
    pub(crate) fail_trades: Mutex<Option<RepositoryError>>,
    /// Actions (`approve`, `buy`, ...) whose transactions mine with a failed status.
    pub(crate) reverted: Mutex<HashSet<String>>,
    pub(crate) journal: Mutex<Vec<String>>,
    pub(crate) trades: Mutex<Vec<(Address, TradeCall)>>,
}

pub(crate) const TEST_PRIVATE_KEY: &str =
    "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

impl MockRepository {
    pub(crate) fn read_only(router: Address) -> Self {
        Self {
            signer: None,
            quote_out: Mutex::new(Quote {
                router,
                amount: U256::ZERO,
            }),
            quote_in: Mutex::new(Quote {
                router,
                amount: U256::ZERO,
            }),
            allowance: Mutex::new(U256::ZERO),
            balances: Mutex::new(HashMap::new()),
            pools: Mutex::new(HashMap::new()),
            nonce: Mutex::new(U256::ZERO),
            fail_trades: Mutex::new(None),
            reverted: Mutex::new(HashSet::new()),
            journal: Mutex::new(Vec::new()),
            trades: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn with_wallet(router: Address) -> Self {
        let signer = TEST_PRIVATE_KEY.parse::<PrivateKeySigner>().unwrap();
        Self {
            signer: Some(signer),
            ..Self::read_only(router)
        }
    }

    pub(crate) fn set_quote_out(&self, amount: U256) {
        self.quote_out.lock().unwrap().amount = amount;
    }

    pub(crate) fn set_quote_in(&self, amount: U256) {
        self.quote_in.lock().unwrap().amount = amount;
    }

    pub(crate) fn journal(&self) -> Vec<String> {
        self.journal.lock().unwrap().clone()
    }

    fn record(&self, entry: impl Into<String>) {
        self.journal.lock().unwrap().push(entry.into());
    }

    /// Transactions whose action is in `reverted` mine with a failed status.
    pub(crate) fn revert(&self, action: &str) {
        self.reverted.lock().unwrap().insert(action.to_string());
    }

    fn mined(&self, action: &str) -> RepoResult<TxOutcome> {
        TxOutcome {
            tx_hash: B256::repeat_byte(0xab),
            success: !self.reverted.lock().unwrap().contains(action),
            block_number: Some(1),
            gas_used: 21_000,
        }
        .ensure_success(action)
    }

    fn require_signer(&self, action: &str) -> RepoResult<&PrivateKeySigner> {
        self.signer
            .as_ref()
            .ok_or_else(|| RepositoryError::MissingSigner(action.to_string()))
    }
}

#[async_trait]
impl LaunchpadRepository for MockRepository {
    fn wallet_address(&self) -> Option<Address> {
        self.signer.as_ref().map(|s| s.address())
    }

    async fn get_amount_out(
        &self,
        _token: Address,
        _amount_in: U256,
        is_buy: bool,
    ) -> RepoResult<Quote> {
        self.record(format!("quote_out:{is_buy}"));
        Ok(*self.quote_out.lock().unwrap())
    }

    async fn get_amount_in(
        &self,
        _token: Address,
        _amount_out: U256,
        is_buy: bool,
    ) -> RepoResult<Quote> {
        self.record(format!("quote_in:{is_buy}"));
        Ok(*self.quote_in.lock().unwrap())
    }

    async fn get_progress(&self, _token: Address) -> RepoResult<U256> {
        Ok(U256::from(2_500u64))
    }

    async fn is_graduated(&self, _token: Address) -> RepoResult<bool> {
        Ok(false)
    }

    async fn is_locked(&self, _token: Address) -> RepoResult<bool> {
        Ok(false)
    }

    async fn available_buy_tokens(&self, _token: Address) -> RepoResult<(U256, U256)> {
        Ok((U256::from(1_000u64), U256::from(10u64)))
    }

    async fn curve_state(&self, _token: Address) -> RepoResult<CurveState> {
        Ok(CurveState {
            real_mon_reserve: U256::from(1u64),
            real_token_reserve: U256::from(2u64),
            virtual_mon_reserve: U256::from(3u64),
            virtual_token_reserve: U256::from(4u64),
            k: U256::from(12u64),
            target_token_amount: U256::from(5u64),
            init_virtual_mon_reserve: U256::from(3u64),
            init_virtual_token_reserve: U256::from(4u64),
        })
    }

    async fn execute_trade(&self, router: Address, call: &TradeCall) -> RepoResult<TxOutcome> {
        self.require_signer(call.name())?;
        if let Some(error) = self.fail_trades.lock().unwrap().clone() {
            return Err(error);
        }
        self.record(call.name());
        self.trades.lock().unwrap().push((router, call.clone()));
        self.mined(call.name())
    }

    async fn estimate_trade_gas(
        &self,
        _router: Address,
        call: &TradeCall,
        _from: Address,
    ) -> RepoResult<u64> {
        self.record(format!("estimate:{}", call.name()));
        Ok(150_000)
    }

    async fn native_balance(&self, owner: Address) -> RepoResult<U256> {
        Ok(self
            .balances
            .lock()
            .unwrap()
            .get(&(Address::ZERO, owner))
            .copied()
            .unwrap_or_default())
    }

    async fn token_metadata(&self, token: Address) -> RepoResult<TokenMetadata> {
        if token == Address::ZERO {
            return Err(RepositoryError::ContractError("execution reverted".into()));
        }
        Ok(TokenMetadata {
            name: "Test Token".to_string(),
            symbol: "TEST".to_string(),
            decimals: 18,
            total_supply: U256::from(1_000_000_000u64),
        })
    }

    async fn balance_of(&self, token: Address, owner: Address) -> RepoResult<U256> {
        Ok(self
            .balances
            .lock()
            .unwrap()
            .get(&(token, owner))
            .copied()
            .unwrap_or_default())
    }

    async fn allowance(
        &self,
        _token: Address,
        _owner: Address,
        _spender: Address,
    ) -> RepoResult<U256> {
        self.record("allowance");
        Ok(*self.allowance.lock().unwrap())
    }

    async fn nonces(&self, _token: Address, _owner: Address) -> RepoResult<U256> {
        Ok(*self.nonce.lock().unwrap())
    }

    async fn approve(
        &self,
        _token: Address,
        spender: Address,
        amount: U256,
    ) -> RepoResult<TxOutcome> {
        self.require_signer("approve")?;
        self.record(format!("approve:{spender}"));
        let outcome = self.mined("approve")?;
        *self.allowance.lock().unwrap() = amount;
        Ok(outcome)
    }

    async fn transfer(&self, _token: Address, _to: Address, _amount: U256) -> RepoResult<TxOutcome> {
        self.require_signer("transfer")?;
        self.record("transfer");
        self.mined("transfer")
    }

    async fn get_pool(
        &self,
        token_a: Address,
        _token_b: Address,
        fee: u32,
    ) -> RepoResult<Option<Address>> {
        Ok(self.pools.lock().unwrap().get(&(token_a, fee)).copied())
    }

    async fn sign_hash(&self, hash: B256) -> RepoResult<Signature> {
        self.require_signer("permit signature")?
            .sign_hash_sync(&hash)
            .map_err(|e| RepositoryError::Other(e.to_string()))
    }
}
