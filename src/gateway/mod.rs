pub mod capability;
pub mod roster;
mod types;

pub use capability::{ContractError, ElectionContract, WalletError, WalletProvider};
pub use roster::{Roster, RosterLoad};
pub use types::{Address, Candidate, CandidateId, SignerHandle, TxHash, VoteReceipt};

use crate::errors::{Error, Result};
use std::fmt::{Debug, Formatter};
use std::sync::Arc;
use tracing::{debug, instrument};

/// Translates the session's domain operations into contract calls.
///
/// Every call reports its outcome exactly once; retrying is up to the caller.
#[derive(Clone)]
pub struct ContractGateway {
    wallet: Option<Arc<dyn WalletProvider>>,
    contract: Arc<dyn ElectionContract>,
}

impl Debug for ContractGateway {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContractGateway")
            .field("has_wallet", &self.wallet.is_some())
            .finish()
    }
}

impl ContractGateway {
    pub fn new(
        wallet: Option<Arc<dyn WalletProvider>>,
        contract: Arc<dyn ElectionContract>,
    ) -> Self {
        Self { wallet, contract }
    }

    #[instrument(skip_all, level = "debug")]
    pub async fn bind_signer(&self) -> Result<SignerHandle> {
        let wallet = self.wallet.as_ref().ok_or(Error::NoWalletProvider)?;
        let accounts = wallet
            .request_accounts()
            .await
            .map_err(|WalletError::Rejected(reason)| Error::AuthorizationDenied(reason))?;
        let identity = accounts
            .into_iter()
            .next()
            .ok_or_else(|| Error::AuthorizationDenied("provider returned no account".into()))?;
        debug!(%identity, "signer bound");
        Ok(SignerHandle::new(identity))
    }

    pub async fn fetch_candidate_count(&self, _signer: &SignerHandle) -> Result<u64> {
        self.contract.get_num_candidates().await.map_err(read_error)
    }

    pub async fn fetch_candidate_name(
        &self,
        _signer: &SignerHandle,
        index: CandidateId,
    ) -> Result<String> {
        self.contract
            .get_candidate_name(index)
            .await
            .map_err(read_error)
    }

    pub async fn fetch_has_voted(&self, _signer: &SignerHandle, voter: &Address) -> Result<bool> {
        self.contract.has_user_voted(voter).await.map_err(read_error)
    }

    /// A revert means the contract decided and the vote must not be retried;
    /// a transport failure leaves the outcome unknown.
    #[instrument(skip(self, signer), fields(voter = %signer.identity()), level = "debug")]
    pub async fn cast_vote(
        &self,
        signer: &SignerHandle,
        candidate: CandidateId,
    ) -> Result<VoteReceipt> {
        match self.contract.vote(signer.identity(), candidate).await {
            Ok(tx_hash) => Ok(VoteReceipt::new(
                signer.identity().clone(),
                candidate,
                tx_hash,
            )),
            Err(ContractError::Reverted(reason)) => Err(Error::VoteRejected(reason)),
            Err(ContractError::Transport(reason)) => Err(Error::RemoteWrite(reason)),
        }
    }
}

fn read_error(error: ContractError) -> Error {
    Error::RemoteRead(error.to_string())
}
