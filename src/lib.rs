//! Client-side coordinator for a single-choice election hosted on a contract.
//!
//! A [`Session`] binds a wallet identity, fetches the candidate roster and the identity's
//! vote status through a [`ContractGateway`], and submits at most one vote. Wallet and
//! contract are injected capabilities; [`sim::SimulatedChain`] provides both in memory.

mod common;
pub mod config;
pub mod errors;
pub mod gateway;
pub mod session;
pub mod sim;

pub use config::SessionConfig;
pub use errors::{Error, ErrorKind, Result, Severity};
pub use gateway::{
    Address, Candidate, CandidateId, ContractGateway, ElectionContract, SignerHandle, TxHash,
    VoteReceipt, WalletProvider,
};
pub use session::{ConnectionPhase, ElectionSnapshot, Session};
