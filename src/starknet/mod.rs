//! Starknet primitives: felts, the byte-array codec and the RPC capability.

pub mod byte_array;
mod felt;
pub mod rpc;

pub use self::byte_array::{decode_byte_array, decode_byte_array_prefix, encode_byte_array};
pub use self::felt::Felt;
pub use self::rpc::{FunctionCall, JsonRpcClient, RawReceipt, StarknetRpc};

use serde::{Deserialize, Serialize};

/// One invoke call inside a multicall.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Call {
    pub contract_address: Felt,
    pub entrypoint: String,
    #[serde(default)]
    pub calldata: Vec<Felt>,
}

/// Target Starknet network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Network {
    Mainnet,
    Sepolia,
}

impl Network {
    pub const ALL: [Network; 2] = [Network::Mainnet, Network::Sepolia];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Mainnet => "mainnet",
            Self::Sepolia => "sepolia",
        }
    }

    pub fn default_rpc_url(self) -> &'static str {
        match self {
            Self::Mainnet => "https://starknet-mainnet.public.blastapi.io/rpc/v0_7",
            Self::Sepolia => "https://starknet-sepolia.public.blastapi.io/rpc/v0_7",
        }
    }

    pub fn default_paymaster_url(self) -> &'static str {
        match self {
            Self::Mainnet => "https://starknet.paymaster.avnu.fi",
            Self::Sepolia => "https://sepolia.paymaster.avnu.fi",
        }
    }
}

impl std::fmt::Display for Network {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
