use std::fmt;

use serde::{Deserialize, Serialize};

/// Network the node runs on. Both chain identifiers below are mixed into
/// sign bytes: the string form for the native modes, the numeric form for
/// the typed-data domain.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Network {
    Mainnet,
    Testnet,
    Devnet,
}

impl Network {
    pub fn chain_id(&self) -> &'static str {
        match self {
            Network::Mainnet => "axon-mainnet-1",
            Network::Testnet => "axon-testnet-1",
            Network::Devnet => "axon-devnet-1",
        }
    }

    /// Numeric chain identifier carried by typed-data extensions.
    pub fn typed_data_chain_id(&self) -> u64 {
        match self {
            Network::Mainnet => 8800,
            Network::Testnet => 8801,
            Network::Devnet => 8802,
        }
    }

    pub fn is_mainnet(&self) -> bool {
        matches!(self, Network::Mainnet)
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.chain_id())
    }
}
