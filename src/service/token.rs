use std::sync::Arc;

use alloy::primitives::{Address, B256, U256};
use alloy::sol_types::{Eip712Domain, SolStruct};
use futures::future::try_join_all;
use tracing::instrument;

use crate::repository::contract::Permit;
use crate::repository::{LaunchpadRepository, TokenMetadata, TxOutcome};
use crate::service::types::{PermitSignature, TokenAllowance, TokenBalance};
use crate::service::{ServiceError, ServiceResult};

/// EIP-712 domain version used by launchpad tokens.
const PERMIT_VERSION: &str = "1";

/// ERC20 reads and writes, batch helpers and EIP-2612 permit signing.
///
/// Every call maps onto the gateway without retries; batch helpers issue
/// their reads concurrently and fail as a whole when any read fails.
#[derive(Clone)]
pub struct TokenService {
    repository: Arc<dyn LaunchpadRepository>,
    chain_id: u64,
}

impl TokenService {
    pub fn new(repository: Arc<dyn LaunchpadRepository>, chain_id: u64) -> Self {
        Self {
            repository,
            chain_id,
        }
    }

    pub fn wallet_address(&self) -> Option<Address> {
        self.repository.wallet_address()
    }

    pub(crate) fn require_wallet(&self, action: &str) -> ServiceResult<Address> {
        self.repository
            .wallet_address()
            .ok_or_else(|| ServiceError::MissingSigner(action.to_string()))
    }

    #[instrument(skip(self), err)]
    pub async fn metadata(&self, token: Address) -> ServiceResult<TokenMetadata> {
        Ok(self.repository.token_metadata(token).await?)
    }

    #[instrument(skip(self), err)]
    pub async fn balance_of(&self, token: Address, owner: Address) -> ServiceResult<U256> {
        Ok(self.repository.balance_of(token, owner).await?)
    }

    #[instrument(skip(self), err)]
    pub async fn native_balance(&self, owner: Address) -> ServiceResult<U256> {
        Ok(self.repository.native_balance(owner).await?)
    }

    #[instrument(skip(self), err)]
    pub async fn allowance(
        &self,
        token: Address,
        owner: Address,
        spender: Address,
    ) -> ServiceResult<U256> {
        Ok(self.repository.allowance(token, owner, spender).await?)
    }

    #[instrument(skip(self), err)]
    pub async fn nonces(&self, token: Address, owner: Address) -> ServiceResult<U256> {
        Ok(self.repository.nonces(token, owner).await?)
    }

    #[instrument(skip(self), err)]
    pub async fn approve(
        &self,
        token: Address,
        spender: Address,
        amount: U256,
    ) -> ServiceResult<TxOutcome> {
        self.require_wallet("approve")?;
        let outcome = self.repository.approve(token, spender, amount).await?;
        tracing::info!("Approved {spender} for {amount} of {token}: {}", outcome.tx_hash);
        Ok(outcome)
    }

    #[instrument(skip(self), err)]
    pub async fn transfer(
        &self,
        token: Address,
        to: Address,
        amount: U256,
    ) -> ServiceResult<TxOutcome> {
        if amount.is_zero() {
            return Err(ServiceError::InvalidAmount(
                "transfer amount must be positive".to_string(),
            ));
        }
        let owner = self.require_wallet("transfer")?;

        let balance = self.repository.balance_of(token, owner).await?;
        if balance < amount {
            return Err(ServiceError::InsufficientBalance {
                required: amount.to_string(),
                available: balance.to_string(),
            });
        }

        Ok(self.repository.transfer(token, to, amount).await?)
    }

    /// Balances of `owner` for each token, in input order.
    #[instrument(skip(self, tokens), fields(count = tokens.len()), err)]
    pub async fn batch_balances(
        &self,
        tokens: &[Address],
        owner: Address,
    ) -> ServiceResult<Vec<TokenBalance>> {
        try_join_all(tokens.iter().map(|&token| async move {
            let balance = self.repository.balance_of(token, owner).await?;
            Ok::<_, ServiceError>(TokenBalance {
                token,
                owner,
                balance,
            })
        }))
        .await
    }

    /// Metadata for each token, in input order.
    #[instrument(skip(self, tokens), fields(count = tokens.len()), err)]
    pub async fn batch_metadata(&self, tokens: &[Address]) -> ServiceResult<Vec<TokenMetadata>> {
        try_join_all(tokens.iter().map(|&token| async move {
            Ok::<_, ServiceError>(self.repository.token_metadata(token).await?)
        }))
        .await
    }

    /// Allowances granted by `owner` to `spender` on each token, in input order.
    #[instrument(skip(self, tokens), fields(count = tokens.len()), err)]
    pub async fn batch_allowances(
        &self,
        tokens: &[Address],
        owner: Address,
        spender: Address,
    ) -> ServiceResult<Vec<TokenAllowance>> {
        try_join_all(tokens.iter().map(|&token| async move {
            let allowance = self.repository.allowance(token, owner, spender).await?;
            Ok::<_, ServiceError>(TokenAllowance {
                token,
                owner,
                spender,
                allowance,
            })
        }))
        .await
    }

    /// Signs an EIP-2612 permit letting `spender` move `value` of `token` from
    /// the wallet until `deadline`.
    ///
    /// The domain is the token's `name()`, version `"1"`, the configured chain
    /// id and the token address. The current nonce is read from the token.
    ///
    /// # Returns
    ///
    /// * `Ok(PermitSignature)` - `v` (27/28), `r`, `s` plus the nonce and deadline signed over
    /// * `Err(ServiceError::MissingSigner)` - In read-only mode
    #[instrument(skip(self), err)]
    pub async fn generate_permit_signature(
        &self,
        token: Address,
        spender: Address,
        value: U256,
        deadline: U256,
    ) -> ServiceResult<PermitSignature> {
        let owner = self.require_wallet("permit signature")?;

        let (metadata, nonce) = futures::try_join!(
            self.repository.token_metadata(token),
            self.repository.nonces(token, owner)
        )?;

        let domain = permit_domain(metadata.name, self.chain_id, token);
        let permit = Permit {
            owner,
            spender,
            value,
            nonce,
            deadline,
        };
        let hash = permit.eip712_signing_hash(&domain);

        let signature = self.repository.sign_hash(hash).await?;
        tracing::debug!("Signed permit for {spender} on {token} with nonce {nonce}");

        Ok(PermitSignature {
            v: 27 + signature.v() as u8,
            r: B256::from(signature.r().to_be_bytes::<32>()),
            s: B256::from(signature.s().to_be_bytes::<32>()),
            nonce,
            deadline,
        })
    }
}

pub(crate) fn permit_domain(name: String, chain_id: u64, token: Address) -> Eip712Domain {
    Eip712Domain::new(
        Some(name.into()),
        Some(PERMIT_VERSION.into()),
        Some(U256::from(chain_id)),
        Some(token),
        None,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::mock::MockRepository;
    use alloy::primitives::{Signature, address};

    const TOKEN: Address = address!("0x1111111111111111111111111111111111111111");
    const SPENDER: Address = address!("0x2222222222222222222222222222222222222222");
    const ROUTER: Address = address!("0x3333333333333333333333333333333333333333");

    fn service(repository: MockRepository) -> (TokenService, Arc<MockRepository>) {
        let repository = Arc::new(repository);
        (TokenService::new(repository.clone(), 10143), repository)
    }

    #[tokio::test]
    async fn test_permit_signature_recovers_wallet() {
        let (service, repository) = service(MockRepository::with_wallet(ROUTER));
        *repository.nonce.lock().unwrap() = U256::from(7u64);
        let owner = service.wallet_address().unwrap();

        let value = U256::from(1_000u64);
        let deadline = U256::from(1_900_000_000u64);
        let permit = service
            .generate_permit_signature(TOKEN, SPENDER, value, deadline)
            .await
            .unwrap();

        assert!(permit.v == 27 || permit.v == 28);
        assert_eq!(permit.nonce, U256::from(7u64));

        let hash = Permit {
            owner,
            spender: SPENDER,
            value,
            nonce: U256::from(7u64),
            deadline,
        }
        .eip712_signing_hash(&permit_domain("Test Token".to_string(), 10143, TOKEN));

        let signature = Signature::new(
            U256::from_be_bytes(permit.r.0),
            U256::from_be_bytes(permit.s.0),
            permit.v == 28,
        );
        assert_eq!(signature.recover_address_from_prehash(&hash).unwrap(), owner);
    }

    #[tokio::test]
    async fn test_permit_requires_wallet() {
        let (service, _) = service(MockRepository::read_only(ROUTER));
        let err = service
            .generate_permit_signature(TOKEN, SPENDER, U256::from(1u64), U256::from(1u64))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::MissingSigner(_)));
    }

    #[tokio::test]
    async fn test_batch_balances_keep_input_order() {
        let (service, repository) = service(MockRepository::read_only(ROUTER));
        let owner = address!("0x4444444444444444444444444444444444444444");
        {
            let mut balances = repository.balances.lock().unwrap();
            balances.insert((TOKEN, owner), U256::from(5u64));
            balances.insert((SPENDER, owner), U256::from(9u64));
        }

        let balances = service.batch_balances(&[SPENDER, TOKEN], owner).await.unwrap();
        assert_eq!(balances.len(), 2);
        assert_eq!(balances[0].token, SPENDER);
        assert_eq!(balances[0].balance, U256::from(9u64));
        assert_eq!(balances[1].balance, U256::from(5u64));
    }

    #[tokio::test]
    async fn test_batch_metadata_fails_as_a_whole() {
        let (service, _) = service(MockRepository::read_only(ROUTER));
        let err = service
            .batch_metadata(&[TOKEN, Address::ZERO])
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::ChainCall(_)));
    }

    #[tokio::test]
    async fn test_transfer_checks_balance() {
        let (service, repository) = service(MockRepository::with_wallet(ROUTER));
        let err = service
            .transfer(TOKEN, SPENDER, U256::from(10u64))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InsufficientBalance { .. }));
        assert!(!repository.journal().contains(&"transfer".to_string()));
    }

    #[tokio::test]
    async fn test_approve_without_wallet_fails_fast() {
        let (service, repository) = service(MockRepository::read_only(ROUTER));
        let err = service
            .approve(TOKEN, SPENDER, U256::from(1u64))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::MissingSigner(_)));
        assert!(repository.journal().is_empty());
    }
}
