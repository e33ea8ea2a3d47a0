//! Capabilities injected into [`ContractGateway`](super::ContractGateway).
//!
//! Neither trait knows about sessions; implementations wrap a browser wallet, a node
//! client, or the in-memory chain in [`crate::sim`].

use crate::gateway::{Address, CandidateId, TxHash};
use async_trait::async_trait;
use std::{error, fmt};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ContractError {
    /// the call never produced a verdict: network, node or timeout failure
    Transport(String),
    /// the contract evaluated the call and refused it
    Reverted(String),
}

impl fmt::Display for ContractError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport(reason) => write!(f, "transport failure: {reason}"),
            Self::Reverted(reason) => write!(f, "reverted: {reason}"),
        }
    }
}

impl error::Error for ContractError {}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WalletError {
    Rejected(String),
}

impl fmt::Display for WalletError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

impl error::Error for WalletError {}

#[async_trait]
pub trait WalletProvider: Send + Sync {
    /// Asks the user to authorize this client. The first account is the active one.
    async fn request_accounts(&self) -> Result<Vec<Address>, WalletError>;
}

/// The election contract's call surface.
#[async_trait]
pub trait ElectionContract: Send + Sync {
    async fn get_num_candidates(&self) -> Result<u64, ContractError>;

    async fn get_candidate_name(&self, index: CandidateId) -> Result<String, ContractError>;

    async fn has_user_voted(&self, voter: &Address) -> Result<bool, ContractError>;

    /// State-changing call signed by `signer`.
    async fn vote(&self, signer: &Address, candidate: CandidateId) -> Result<TxHash, ContractError>;
}
