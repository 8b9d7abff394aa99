//! # Networks and Checkpoints
//!
//! Per-network constants: proof-of-work limit, genesis header, and the
//! built-in checkpoints used to bootstrap the store.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::value_objects::Checkpoint;

/// Mainnet genesis header.
pub const MAINNET_GENESIS_HEX: &str = "0100000000000000000000000000000000000000000000000000000000000000000000003ba3edfd7a7b12b27ac72c3e67768f617fc81bc3888a51323a9fb8aa4b1e5e4a29ab5f49ffff001d1dac2b7c";

/// Testnet3 genesis header.
pub const TESTNET_GENESIS_HEX: &str = "0100000000000000000000000000000000000000000000000000000000000000000000003ba3edfd7a7b12b27ac72c3e67768f617fc81bc3888a51323a9fb8aa4b1e5e4adae5494dffff001d1aa4ae18";

/// Regtest genesis header.
pub const REGTEST_GENESIS_HEX: &str = "0100000000000000000000000000000000000000000000000000000000000000000000003ba3edfd7a7b12b27ac72c3e67768f617fc81bc3888a51323a9fb8aa4b1e5e4adae5494dffff7f2002000000";

/// Mainnet block 552955.
pub const MAINNET_CHECKPOINT_552955_HEX: &str = "0000c020ebd39db57691780db16df1df28e9b129a7c07c7225651e00000000000000000019a0368be5061871be3929e11b0e13de2c5f34e45310ca2798ebe1478341325212150b5c7cd931175507350b";

/// Mainnet/testnet proof-of-work limit, nbits `0x1d00ffff` in wire order.
pub const MAINNET_POW_LIMIT_NBITS: [u8; 4] = [0xff, 0xff, 0x00, 0x1d];

/// Regtest proof-of-work limit, nbits `0x207fffff` in wire order.
pub const REGTEST_POW_LIMIT_NBITS: [u8; 4] = [0xff, 0xff, 0x7f, 0x20];

/// Bitcoin network the client follows.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Network {
    /// Bitcoin mainnet.
    #[default]
    Mainnet,
    /// Bitcoin testnet3.
    Testnet,
    /// Local regression-test network.
    Regtest,
}

impl Network {
    /// Chain name used in store file names and the `ZETA_NETWORK` variable.
    pub fn chain_name(&self) -> &'static str {
        match self {
            Network::Mainnet => "bitcoin_main",
            Network::Testnet => "bitcoin_test",
            Network::Regtest => "bitcoin_regtest",
        }
    }

    /// Compact encoding of the maximum target.
    pub fn pow_limit_nbits(&self) -> [u8; 4] {
        match self {
            Network::Mainnet | Network::Testnet => MAINNET_POW_LIMIT_NBITS,
            Network::Regtest => REGTEST_POW_LIMIT_NBITS,
        }
    }

    /// Serialized genesis header.
    pub fn genesis_hex(&self) -> &'static str {
        match self {
            Network::Mainnet => MAINNET_GENESIS_HEX,
            Network::Testnet => TESTNET_GENESIS_HEX,
            Network::Regtest => REGTEST_GENESIS_HEX,
        }
    }

    /// Built-in checkpoints, genesis included.
    pub fn checkpoints(&self) -> Vec<Checkpoint> {
        let mut checkpoints = vec![Checkpoint::genesis(self.genesis_hex())];
        if *self == Network::Mainnet {
            checkpoints.push(Checkpoint::hardcoded(552955, MAINNET_CHECKPOINT_552955_HEX));
        }
        checkpoints
    }

    /// Highest built-in checkpoint.
    pub fn latest_checkpoint(&self) -> Checkpoint {
        self.checkpoints()
            .into_iter()
            .max_by_key(|cp| cp.height)
            .unwrap_or_else(|| Checkpoint::genesis(self.genesis_hex()))
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.chain_name())
    }
}

impl FromStr for Network {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "bitcoin_main" | "mainnet" | "main" => Ok(Network::Mainnet),
            "bitcoin_test" | "testnet" | "test" => Ok(Network::Testnet),
            "bitcoin_regtest" | "regtest" => Ok(Network::Regtest),
            other => Err(format!("unknown network: {}", other)),
        }
    }
}
