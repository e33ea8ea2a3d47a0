//! An in-memory election chain.
//!
//! [`SimulatedChain`] plays both the wallet and the contract. It keeps a real ballot
//! ledger, so double votes revert the way a deployed contract would, and it can be told
//! to delay calls or fail the next call of a given kind.

use crate::gateway::{
    Address, CandidateId, ContractError, ContractGateway, ElectionContract, TxHash, WalletError,
    WalletProvider,
};
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use rand::Rng;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::sleep;
use tracing::trace;
use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CallKind {
    RequestAccounts,
    GetNumCandidates,
    GetCandidateName,
    HasUserVoted,
    Vote,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Fault {
    Transport(String),
    /// the call is refused; for `RequestAccounts` this is the user declining
    Revert(String),
    /// the vote lands in the ledger but the reply is lost
    TransportAfterCommit(String),
}

#[derive(Default)]
struct Latency {
    per_kind: HashMap<CallKind, Duration>,
    per_name: HashMap<CandidateId, Duration>,
    jitter: Option<Duration>,
}

struct ChainState {
    names: Vec<String>,
    accounts: Mutex<Vec<Address>>,
    ballots: DashMap<Address, CandidateId>,
    faults: Mutex<HashMap<CallKind, VecDeque<Fault>>>,
    latency: Mutex<Latency>,
    calls: DashMap<CallKind, usize>,
}

#[derive(Clone)]
pub struct SimulatedChain {
    state: Arc<ChainState>,
}

impl SimulatedChain {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            state: Arc::new(ChainState {
                names: names.into_iter().map(Into::into).collect(),
                accounts: Mutex::new(Vec::new()),
                ballots: DashMap::new(),
                faults: Mutex::new(HashMap::new()),
                latency: Mutex::new(Latency::default()),
                calls: DashMap::new(),
            }),
        }
    }

    pub fn with_accounts<I, A>(self, accounts: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<Address>,
    {
        self.set_accounts(accounts);
        self
    }

    /// What the wallet hands out on the next authorization.
    pub fn set_accounts<I, A>(&self, accounts: I)
    where
        I: IntoIterator<Item = A>,
        A: Into<Address>,
    {
        *lock(&self.state.accounts) = accounts.into_iter().map(Into::into).collect();
    }

    pub fn gateway(&self) -> ContractGateway {
        ContractGateway::new(Some(Arc::new(self.clone())), Arc::new(self.clone()))
    }

    /// A gateway for a client without any wallet installed.
    pub fn gateway_without_wallet(&self) -> ContractGateway {
        ContractGateway::new(None, Arc::new(self.clone()))
    }

    pub fn fail_next(&self, kind: CallKind, fault: Fault) {
        lock(&self.state.faults)
            .entry(kind)
            .or_default()
            .push_back(fault);
    }

    pub fn set_latency(&self, kind: CallKind, latency: Duration) {
        lock(&self.state.latency).per_kind.insert(kind, latency);
    }

    /// Overrides the `GetCandidateName` latency for one index.
    pub fn set_name_latency(&self, index: CandidateId, latency: Duration) {
        lock(&self.state.latency).per_name.insert(index, latency);
    }

    /// Adds a uniformly random extra delay in `[0, max)` to every call.
    pub fn set_jitter(&self, max: Duration) {
        lock(&self.state.latency).jitter = Some(max);
    }

    /// Records a ballot cast outside this client, e.g. from another device.
    pub fn record_vote(&self, voter: impl Into<Address>, candidate: CandidateId) {
        self.state.ballots.insert(voter.into(), candidate);
    }

    pub fn ballot_of(&self, voter: &Address) -> Option<CandidateId> {
        self.state.ballots.get(voter).map(|ballot| *ballot)
    }

    pub fn calls(&self, kind: CallKind) -> usize {
        self.state.calls.get(&kind).map_or(0, |count| *count)
    }

    pub fn total_calls(&self) -> usize {
        self.state.calls.iter().map(|entry| *entry.value()).sum()
    }

    async fn enter(&self, kind: CallKind, index: Option<CandidateId>) -> Option<Fault> {
        *self.state.calls.entry(kind).or_insert(0) += 1;
        let delay = {
            let latency = lock(&self.state.latency);
            let base = index
                .and_then(|index| latency.per_name.get(&index))
                .or_else(|| latency.per_kind.get(&kind))
                .copied()
                .unwrap_or_default();
            let jitter = latency
                .jitter
                .filter(|max| !max.is_zero())
                .map(|max| rand::thread_rng().gen_range(Duration::ZERO..max))
                .unwrap_or_default();
            base + jitter
        };
        if !delay.is_zero() {
            sleep(delay).await;
        }
        let fault = lock(&self.state.faults)
            .get_mut(&kind)
            .and_then(VecDeque::pop_front);
        trace!(?kind, ?index, ?fault, "simulated call");
        fault
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn read_fault(fault: Fault) -> ContractError {
    match fault {
        Fault::Transport(reason) | Fault::TransportAfterCommit(reason) => {
            ContractError::Transport(reason)
        }
        Fault::Revert(reason) => ContractError::Reverted(reason),
    }
}

#[async_trait]
impl WalletProvider for SimulatedChain {
    async fn request_accounts(&self) -> Result<Vec<Address>, WalletError> {
        match self.enter(CallKind::RequestAccounts, None).await {
            Some(Fault::Revert(reason)) => Err(WalletError::Rejected(reason)),
            Some(Fault::Transport(reason) | Fault::TransportAfterCommit(reason)) => {
                Err(WalletError::Rejected(reason))
            }
            None => Ok(lock(&self.state.accounts).clone()),
        }
    }
}

#[async_trait]
impl ElectionContract for SimulatedChain {
    async fn get_num_candidates(&self) -> Result<u64, ContractError> {
        match self.enter(CallKind::GetNumCandidates, None).await {
            Some(fault) => Err(read_fault(fault)),
            None => Ok(self.state.names.len() as u64),
        }
    }

    async fn get_candidate_name(&self, index: CandidateId) -> Result<String, ContractError> {
        if let Some(fault) = self.enter(CallKind::GetCandidateName, Some(index)).await {
            return Err(read_fault(fault));
        }
        usize::try_from(index)
            .ok()
            .and_then(|index| self.state.names.get(index))
            .cloned()
            .ok_or_else(|| ContractError::Reverted(format!("no candidate {index}")))
    }

    async fn has_user_voted(&self, voter: &Address) -> Result<bool, ContractError> {
        match self.enter(CallKind::HasUserVoted, None).await {
            Some(fault) => Err(read_fault(fault)),
            None => Ok(self.state.ballots.contains_key(voter)),
        }
    }

    async fn vote(&self, signer: &Address, candidate: CandidateId) -> Result<TxHash, ContractError> {
        let fault = self.enter(CallKind::Vote, None).await;
        match &fault {
            Some(Fault::Transport(reason)) => return Err(ContractError::Transport(reason.clone())),
            Some(Fault::Revert(reason)) => return Err(ContractError::Reverted(reason.clone())),
            Some(Fault::TransportAfterCommit(_)) | None => {}
        }
        if candidate >= self.state.names.len() as u64 {
            return Err(ContractError::Reverted(format!("invalid candidate {candidate}")));
        }
        match self.state.ballots.entry(signer.clone()) {
            Entry::Occupied(_) => {
                return Err(ContractError::Reverted("already voted".into()))
            }
            Entry::Vacant(entry) => {
                entry.insert(candidate);
            }
        }
        match fault {
            Some(Fault::TransportAfterCommit(reason)) => Err(ContractError::Transport(reason)),
            _ => Ok(TxHash::from(format!("0x{}", Uuid::new_v4().simple()))),
        }
    }
}
