use crate::common::{init_logger, spawn_session, three_candidates, voter, OTHER_VOTER};
use assert2::{assert, let_assert};
use function_name::named;
use gselection::sim::{CallKind, Fault};
use gselection::{ConnectionPhase, Error, ErrorKind, Severity};
use std::time::Duration;

mod common;

#[tokio::test]
#[named]
async fn test_select_rejects_unknown_candidate_without_change() {
    init_logger(function_name!());
    let chain = three_candidates();
    let session = spawn_session(&chain);
    let_assert!(Ok(_) = session.connect().await);
    let before = session.snapshot();

    let_assert!(Err(Error::InvalidCandidate(3)) = session.select_candidate(3).await);
    assert!(session.snapshot() == before);

    let_assert!(Ok(()) = session.select_candidate(2).await);
    let_assert!(Err(Error::InvalidCandidate(9)) = session.select_candidate(9).await);
    let snapshot = session.snapshot();
    assert!(snapshot.selected == Some(2));
    assert!(snapshot.selected_candidate().map(|c| c.name.as_str()) == Some("Carol"));
}

#[tokio::test]
#[named]
async fn test_submit_without_selection_makes_no_call() {
    init_logger(function_name!());
    let chain = three_candidates();
    let session = spawn_session(&chain);
    let_assert!(Ok(_) = session.connect().await);
    let calls_before = chain.total_calls();

    let_assert!(Err(error) = session.submit_vote().await);
    assert!(error == Error::NoSelection);
    assert!(error.severity() == Severity::CallerBug);
    assert!(chain.total_calls() == calls_before);
    assert!(session.snapshot().phase == ConnectionPhase::Ready);
}

#[tokio::test]
#[named]
async fn test_vote_succeeds_and_locks_the_ballot() {
    init_logger(function_name!());
    let chain = three_candidates();
    let session = spawn_session(&chain);
    let_assert!(Ok(_) = session.connect().await);

    let_assert!(Ok(()) = session.select_candidate(1).await);
    assert!(session.snapshot().can_submit());
    let_assert!(Ok(receipt) = session.submit_vote().await);
    assert!(receipt.candidate == 1);
    assert!(receipt.voter == voter());

    let snapshot = session.snapshot();
    assert!(snapshot.phase == ConnectionPhase::Voted);
    assert!(snapshot.has_voted);
    assert!(snapshot.selected == Some(1));
    assert!(snapshot.receipt == Some(receipt));
    assert!(chain.ballot_of(&voter()) == Some(1));

    let_assert!(Err(Error::InvalidCandidate(0)) = session.select_candidate(0).await);
    let_assert!(Err(Error::NoSelection) = session.submit_vote().await);
    assert!(session.snapshot().selected == Some(1));
    assert!(chain.calls(CallKind::Vote) == 1);
}

#[tokio::test]
#[named]
async fn test_rapid_double_submit_casts_once() {
    init_logger(function_name!());
    let chain = three_candidates();
    chain.set_latency(CallKind::Vote, Duration::from_millis(30));
    let session = spawn_session(&chain);
    let_assert!(Ok(_) = session.connect().await);
    let_assert!(Ok(()) = session.select_candidate(0).await);

    let (first, second) = tokio::join!(session.submit_vote(), session.submit_vote());
    let_assert!(Ok(first) = first);
    let_assert!(Ok(second) = second);
    assert!(first == second);
    assert!(chain.calls(CallKind::Vote) == 1);
}

#[tokio::test]
#[named]
async fn test_selection_is_frozen_while_voting() {
    init_logger(function_name!());
    let chain = three_candidates();
    chain.set_latency(CallKind::Vote, Duration::from_millis(30));
    let session = spawn_session(&chain);
    let_assert!(Ok(_) = session.connect().await);
    let_assert!(Ok(()) = session.select_candidate(0).await);

    let voting = tokio::spawn({
        let session = session.clone();
        async move { session.submit_vote().await }
    });
    let_assert!(Ok(_) = session.wait_until(|s| s.phase == ConnectionPhase::Voting).await);
    let_assert!(
        Err(Error::InvalidPhase(ConnectionPhase::Voting)) = session.select_candidate(2).await
    );
    let_assert!(Ok(Ok(receipt)) = voting.await);
    assert!(receipt.candidate == 0);
}

#[tokio::test]
#[named]
async fn test_rejected_vote_reconciles_with_contract() {
    init_logger(function_name!());
    let chain = three_candidates();
    let session = spawn_session(&chain);
    let_assert!(Ok(_) = session.connect().await);
    let_assert!(Ok(()) = session.select_candidate(1).await);

    // the same account voted from another device after the roster was loaded
    chain.record_vote(voter(), 0);
    let_assert!(Err(Error::VoteRejected(reason)) = session.submit_vote().await);
    assert!(reason.contains("already voted"));

    let snapshot = session.snapshot();
    assert!(snapshot.has_voted);
    assert!(snapshot.phase == ConnectionPhase::Ready);
    assert!(snapshot.last_error == Some(ErrorKind::VoteRejected));
    assert!(!snapshot.can_submit());
    assert!(chain.calls(CallKind::Vote) == 1);
    assert!(chain.calls(CallKind::HasUserVoted) == 2);

    let_assert!(Err(Error::NoSelection) = session.submit_vote().await);
    assert!(chain.calls(CallKind::Vote) == 1);
}

#[tokio::test]
#[named]
async fn test_lost_write_reply_resolves_to_voted() {
    init_logger(function_name!());
    let chain = three_candidates();
    chain.fail_next(CallKind::Vote, Fault::TransportAfterCommit("reply lost".into()));
    let session = spawn_session(&chain);
    let_assert!(Ok(_) = session.connect().await);
    let_assert!(Ok(()) = session.select_candidate(2).await);

    let_assert!(Err(error) = session.submit_vote().await);
    assert!(error.kind() == ErrorKind::RemoteWrite);
    assert!(error.severity() == Severity::ResyncRequired);

    let snapshot = session.snapshot();
    assert!(snapshot.has_voted);
    assert!(!snapshot.can_submit());
    assert!(chain.ballot_of(&voter()) == Some(2));
}

#[tokio::test]
#[named]
async fn test_failed_write_can_be_resubmitted_after_resync() {
    init_logger(function_name!());
    let chain = three_candidates();
    chain.fail_next(CallKind::Vote, Fault::Transport("gateway timeout".into()));
    let session = spawn_session(&chain);
    let_assert!(Ok(_) = session.connect().await);
    let_assert!(Ok(()) = session.select_candidate(2).await);

    let_assert!(Err(Error::RemoteWrite(_)) = session.submit_vote().await);
    let snapshot = session.snapshot();
    assert!(!snapshot.has_voted);
    assert!(snapshot.phase == ConnectionPhase::Ready);
    assert!(snapshot.selected == Some(2));
    assert!(snapshot.can_submit());

    let_assert!(Ok(receipt) = session.submit_vote().await);
    assert!(receipt.candidate == 2);
    assert!(chain.calls(CallKind::Vote) == 2);
    assert!(session.snapshot().phase == ConnectionPhase::Voted);
}

#[tokio::test]
#[named]
async fn test_unknown_write_outcome_waits_for_retry() {
    init_logger(function_name!());
    let chain = three_candidates();
    let session = spawn_session(&chain);
    let_assert!(Ok(_) = session.connect().await);
    let_assert!(Ok(()) = session.select_candidate(0).await);

    chain.fail_next(CallKind::Vote, Fault::TransportAfterCommit("reply lost".into()));
    chain.fail_next(CallKind::HasUserVoted, Fault::Transport("node down".into()));
    let_assert!(Err(Error::RemoteWrite(_)) = session.submit_vote().await);

    let snapshot = session.snapshot();
    assert!(snapshot.phase == ConnectionPhase::Errored(ErrorKind::RemoteWrite));
    assert!(snapshot.last_error == Some(ErrorKind::RemoteRead));
    let_assert!(
        Err(Error::InvalidPhase(ConnectionPhase::Errored(ErrorKind::RemoteWrite))) =
            session.submit_vote().await
    );

    let_assert!(Ok(()) = session.retry().await);
    let_assert!(Ok(snapshot) = session.wait_until(|s| s.phase == ConnectionPhase::Ready).await);
    assert!(snapshot.has_voted);
    assert!(snapshot.last_error == Some(ErrorKind::RemoteWrite));
    assert!(chain.calls(CallKind::Vote) == 1);
}

#[tokio::test]
#[named]
async fn test_resync_after_retry_reports_the_write_failure() {
    init_logger(function_name!());
    let chain = three_candidates();
    let session = spawn_session(&chain);
    let_assert!(Ok(_) = session.connect().await);
    let_assert!(Ok(()) = session.select_candidate(1).await);

    chain.fail_next(CallKind::Vote, Fault::Transport("gateway timeout".into()));
    chain.fail_next(CallKind::HasUserVoted, Fault::Transport("node down".into()));
    let_assert!(Err(Error::RemoteWrite(_)) = session.submit_vote().await);
    assert!(session.snapshot().last_error == Some(ErrorKind::RemoteRead));

    let_assert!(Ok(()) = session.retry().await);
    let_assert!(Ok(snapshot) = session.wait_until(|s| s.phase == ConnectionPhase::Ready).await);
    assert!(!snapshot.has_voted);
    assert!(snapshot.last_error == Some(ErrorKind::RemoteWrite));
    assert!(snapshot.can_submit());

    let_assert!(Ok(receipt) = session.submit_vote().await);
    assert!(receipt.candidate == 1);
    assert!(session.snapshot().last_error.is_none());
}

#[tokio::test]
#[named]
async fn test_other_voters_are_independent() {
    init_logger(function_name!());
    let chain = three_candidates();
    chain.record_vote(OTHER_VOTER, 1);
    let session = spawn_session(&chain);
    let_assert!(Ok(_) = session.connect().await);
    assert!(!session.snapshot().has_voted);
    let_assert!(Ok(()) = session.select_candidate(1).await);
    let_assert!(Ok(_) = session.submit_vote().await);
}
