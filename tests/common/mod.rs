#![allow(dead_code)]

use gselection::sim::SimulatedChain;
use gselection::{Address, Session, SessionConfig};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

pub fn init_logger(test_name: &str) {
    let _ = tracing_subscriber::fmt()
        .with_file(false)
        .with_line_number(false)
        .with_ansi(false)
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .with_target(false)
        .without_time()
        .try_init();
    tracing::info!(test_name, "begin");
}

pub const VOTER: &str = "0x7e57000000000000000000000000000000000001";
pub const OTHER_VOTER: &str = "0x7e57000000000000000000000000000000000002";

/// Long enough for any simulated call in these tests to have finished.
pub const SETTLE: Duration = Duration::from_millis(150);

pub fn voter() -> Address {
    Address::from(VOTER)
}

pub fn three_candidates() -> SimulatedChain {
    SimulatedChain::new(["Alice", "Bob", "Carol"]).with_accounts([VOTER])
}

/// Failures surface on the first attempt.
pub fn strict_config() -> SessionConfig {
    SessionConfig::builder().read_attempts(1).build()
}

pub fn spawn_session(chain: &SimulatedChain) -> Session {
    Session::spawn(chain.gateway(), strict_config())
}

pub fn candidate_names(session: &Session) -> Vec<String> {
    session
        .snapshot()
        .candidates
        .into_iter()
        .map(|candidate| candidate.name)
        .collect()
}
