use crate::common::{with_context, FutureOutput};
use crate::config::SessionConfig;
use crate::errors::{Error, Result};
use crate::gateway::{Candidate, CandidateId, ContractGateway, SignerHandle};
use assert2::assert;
use derive_new::new;
use futures::{stream, StreamExt};
use futures_concurrency::future::TryJoin;
use serde::Serialize;
use tracing::{instrument, trace};

/// Candidates as last fetched, indexed by id.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Roster {
    candidates: Vec<Candidate>,
}

impl Roster {
    /// `names[i]` is the name of candidate `i`; every slot must be filled.
    fn from_indexed(names: Vec<Option<String>>) -> Self {
        assert!(names.iter().all(Option::is_some));
        let candidates = names
            .into_iter()
            .flatten()
            .enumerate()
            .map(|(id, name)| Candidate::new(id as CandidateId, name))
            .collect();
        Self { candidates }
    }

    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    pub fn get(&self, id: CandidateId) -> Option<&Candidate> {
        usize::try_from(id)
            .ok()
            .and_then(|index| self.candidates.get(index))
    }

    pub fn contains(&self, id: CandidateId) -> bool {
        self.get(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}

/// Everything a session needs before it can offer the ballot.
#[derive(Debug, new)]
pub struct RosterLoad {
    pub roster: Roster,
    pub has_voted: bool,
}

/// Fetches the count, then every name with at most `read_concurrency` calls in flight.
/// Names are placed by index, so completion order does not matter. The first failure
/// fails the whole load and drops the fetches still running.
#[instrument(skip_all, fields(voter = %signer.identity()), level = "debug")]
pub async fn load_roster(
    gateway: &ContractGateway,
    signer: &SignerHandle,
    config: &SessionConfig,
) -> Result<Roster> {
    let count = gateway.fetch_candidate_count(signer).await?;
    if count > config.max_candidates {
        return Err(Error::RemoteRead(format!(
            "candidate count {count} exceeds the limit of {}",
            config.max_candidates
        )));
    }
    let mut names: Vec<Option<String>> = vec![None; count as usize];
    let mut fetches = stream::iter(0..count)
        .map(|index| with_context(gateway.fetch_candidate_name(signer, index), index))
        .buffer_unordered(config.read_concurrency.max(1));
    while let Some(FutureOutput { output, context }) = fetches.next().await {
        trace!(index = context, "candidate name fetched");
        names[context as usize] = Some(output?);
    }
    Ok(Roster::from_indexed(names))
}

/// Roster and vote status, fetched concurrently and joined.
pub async fn load_session_view(
    gateway: &ContractGateway,
    signer: &SignerHandle,
    config: &SessionConfig,
) -> Result<RosterLoad> {
    let (roster, has_voted) = (
        load_roster(gateway, signer, config),
        gateway.fetch_has_voted(signer, signer.identity()),
    )
        .try_join()
        .await?;
    Ok(RosterLoad::new(roster, has_voted))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{CallKind, Fault, SimulatedChain};
    use assert2::{assert, let_assert};
    use std::time::Duration;

    fn names(roster: &Roster) -> Vec<&str> {
        roster.candidates().iter().map(|c| c.name.as_str()).collect()
    }

    #[tokio::test]
    async fn reassembles_by_index_when_completions_arrive_reversed() {
        let chain = SimulatedChain::new(["Alice", "Bob", "Carol", "Dave"]).with_accounts(["0x1"]);
        for index in 0..4 {
            chain.set_name_latency(index, Duration::from_millis(40 - 10 * index));
        }
        let gateway = chain.gateway();
        let_assert!(Ok(signer) = gateway.bind_signer().await);
        let_assert!(Ok(roster) = load_roster(&gateway, &signer, &SessionConfig::default()).await);
        assert!(names(&roster) == ["Alice", "Bob", "Carol", "Dave"]);
        assert!(roster
            .candidates()
            .iter()
            .enumerate()
            .all(|(index, c)| c.id == index as CandidateId));
    }

    #[tokio::test]
    async fn one_failed_name_fails_the_roster() {
        let chain = SimulatedChain::new(["Alice", "Bob", "Carol"]).with_accounts(["0x1"]);
        let gateway = chain.gateway();
        let_assert!(Ok(signer) = gateway.bind_signer().await);
        chain.fail_next(CallKind::GetCandidateName, Fault::Transport("node down".into()));
        let result = load_roster(&gateway, &signer, &SessionConfig::default()).await;
        let_assert!(Err(Error::RemoteRead(_)) = result);
    }

    #[tokio::test]
    async fn implausible_count_is_refused_before_fetching_names() {
        let chain = SimulatedChain::new(["Alice", "Bob", "Carol"]).with_accounts(["0x1"]);
        let gateway = chain.gateway();
        let_assert!(Ok(signer) = gateway.bind_signer().await);
        let config = SessionConfig::builder().max_candidates(2).build();
        let_assert!(Err(Error::RemoteRead(_)) = load_roster(&gateway, &signer, &config).await);
        assert!(chain.calls(CallKind::GetCandidateName) == 0);
    }

    #[tokio::test]
    async fn empty_election_loads_an_empty_roster() {
        let chain = SimulatedChain::new(Vec::<String>::new()).with_accounts(["0x1"]);
        let gateway = chain.gateway();
        let_assert!(Ok(signer) = gateway.bind_signer().await);
        let_assert!(
            Ok(load) = load_session_view(&gateway, &signer, &SessionConfig::default()).await
        );
        assert!(load.roster.is_empty());
        assert!(!load.has_voted);
    }

    #[tokio::test]
    async fn vote_status_failure_fails_the_view() {
        let chain = SimulatedChain::new(["Alice"]).with_accounts(["0x1"]);
        let gateway = chain.gateway();
        let_assert!(Ok(signer) = gateway.bind_signer().await);
        chain.fail_next(CallKind::HasUserVoted, Fault::Transport("timeout".into()));
        let result = load_session_view(&gateway, &signer, &SessionConfig::default()).await;
        let_assert!(Err(Error::RemoteRead(_)) = result);
    }
}
