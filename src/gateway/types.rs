use derive_more::{Display, From};
use derive_new::new;
use serde::{Deserialize, Serialize};

/// 0-based ordinal of a candidate, dense and stable for a session.
pub type CandidateId = u64;

/// An externally-owned account. Hex addresses are kept lowercase, so a checksummed
/// and a plain rendering of the same account compare equal.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display)]
#[serde(from = "String", into = "String")]
pub struct Address(String);

impl Address {
    pub fn new(address: impl Into<String>) -> Self {
        let mut address = address.into();
        if address.starts_with("0x") || address.starts_with("0X") {
            address.make_ascii_lowercase();
        }
        Self(address)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for Address {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&str> for Address {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<Address> for String {
    fn from(value: Address) -> Self {
        value.0
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Display, From)]
#[serde(transparent)]
pub struct TxHash(String);

#[derive(Clone, Debug, PartialEq, Eq, Serialize, new)]
pub struct Candidate {
    pub id: CandidateId,
    pub name: String,
}

/// Proof that the wallet authorized `identity`. Every contract call goes through one.
#[derive(Clone, Debug, PartialEq, Eq, new)]
pub struct SignerHandle {
    identity: Address,
}

impl SignerHandle {
    pub fn identity(&self) -> &Address {
        &self.identity
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, new)]
pub struct VoteReceipt {
    pub voter: Address,
    pub candidate: CandidateId,
    pub tx_hash: TxHash,
}
