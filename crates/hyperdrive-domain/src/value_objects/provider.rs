//! Provider Identity Value Objects
//!
//! A provider is an interchangeable backend executor exposing one or more
//! capabilities. Its identity is the `ProviderType`; everything else about
//! it (metrics, cost, geography, circuit state) is mutable orchestration
//! state held elsewhere.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Identity of an interchangeable backend provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ProviderType {
    /// IPFS distributed storage
    Ipfs,
    /// MongoDB document store
    MongoDb,
    /// Holochain agent-centric store
    Holochain,
    /// Ethereum mainnet
    Ethereum,
    /// Solana
    Solana,
    /// Arbitrum rollup
    Arbitrum,
    /// Polygon sidechain
    Polygon,
    /// Neo4j graph store
    Neo4j,
    /// Embedded SQLite store
    Sqlite,
    /// Pinata pinning service
    Pinata,
    /// Local filesystem store
    LocalFile,
}

impl fmt::Display for ProviderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProviderType::Ipfs => "ipfs",
            ProviderType::MongoDb => "mongodb",
            ProviderType::Holochain => "holochain",
            ProviderType::Ethereum => "ethereum",
            ProviderType::Solana => "solana",
            ProviderType::Arbitrum => "arbitrum",
            ProviderType::Polygon => "polygon",
            ProviderType::Neo4j => "neo4j",
            ProviderType::Sqlite => "sqlite",
            ProviderType::Pinata => "pinata",
            ProviderType::LocalFile => "localfile",
        };
        write!(f, "{name}")
    }
}

impl std::str::FromStr for ProviderType {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ipfs" => Ok(ProviderType::Ipfs),
            "mongodb" => Ok(ProviderType::MongoDb),
            "holochain" => Ok(ProviderType::Holochain),
            "ethereum" => Ok(ProviderType::Ethereum),
            "solana" => Ok(ProviderType::Solana),
            "arbitrum" => Ok(ProviderType::Arbitrum),
            "polygon" => Ok(ProviderType::Polygon),
            "neo4j" => Ok(ProviderType::Neo4j),
            "sqlite" => Ok(ProviderType::Sqlite),
            "pinata" => Ok(ProviderType::Pinata),
            "localfile" => Ok(ProviderType::LocalFile),
            other => Err(crate::error::Error::invalid_argument(format!(
                "unknown provider type: {other}"
            ))),
        }
    }
}

/// Typed operation category a provider may support
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Capability {
    /// Load an object from the backend
    Read,
    /// Persist an object to the backend
    Write,
    /// Query the backend
    Search,
    /// Invoke a smart contract
    SmartContract,
    /// Mint or transfer an NFT
    Nft,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Capability::Read => "read",
            Capability::Write => "write",
            Capability::Search => "search",
            Capability::SmartContract => "smart-contract",
            Capability::Nft => "nft",
        };
        write!(f, "{name}")
    }
}

impl std::str::FromStr for Capability {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "read" => Ok(Capability::Read),
            "write" => Ok(Capability::Write),
            "search" => Ok(Capability::Search),
            "smart-contract" | "smart_contract" => Ok(Capability::SmartContract),
            "nft" => Ok(Capability::Nft),
            other => Err(crate::error::Error::invalid_argument(format!(
                "unknown capability: {other}"
            ))),
        }
    }
}

/// Static per-operation cost profile for a provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostProfile {
    /// Cost per operation in `currency`
    pub cost_per_operation: f64,
    /// Estimated gas cost per operation (0.0 for non-chain providers)
    pub gas_estimate: f64,
    /// ISO currency code
    pub currency: String,
}

impl Default for CostProfile {
    fn default() -> Self {
        Self {
            cost_per_operation: 0.0,
            gas_estimate: 0.0,
            currency: "USD".to_string(),
        }
    }
}

impl CostProfile {
    /// Total expected cost of one operation including gas
    pub fn total_per_operation(&self) -> f64 {
        self.cost_per_operation + self.gas_estimate
    }
}

/// Geographic placement of a provider endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct GeoInfo {
    /// Region tag, e.g. "eu-west"
    pub region: String,
    /// Optional latitude of the serving endpoint
    pub latitude: Option<f64>,
    /// Optional longitude of the serving endpoint
    pub longitude: Option<f64>,
}

/// Registration-time description of a provider
///
/// The registration sequence number is assigned by the registry and makes
/// selection tie-breaks deterministic across repeated calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderDescriptor {
    /// Provider identity
    pub provider_type: ProviderType,
    /// Static capability set
    pub capabilities: BTreeSet<Capability>,
    /// Cost profile
    pub cost: CostProfile,
    /// Geographic placement
    pub geo: GeoInfo,
    /// Registration order, assigned by the registry
    pub registration_seq: u64,
    /// Whether the provider participates in selection
    pub enabled: bool,
}

impl ProviderDescriptor {
    /// Create a descriptor for a provider with the given capabilities
    ///
    /// The registration sequence is assigned later by the registry.
    pub fn new(provider_type: ProviderType, capabilities: impl IntoIterator<Item = Capability>) -> Self {
        Self {
            provider_type,
            capabilities: capabilities.into_iter().collect(),
            cost: CostProfile::default(),
            geo: GeoInfo::default(),
            registration_seq: 0,
            enabled: true,
        }
    }

    /// Set the cost profile
    pub fn with_cost(mut self, cost: CostProfile) -> Self {
        self.cost = cost;
        self
    }

    /// Set the geographic placement
    pub fn with_geo(mut self, geo: GeoInfo) -> Self {
        self.geo = geo;
        self
    }

    /// Whether the provider supports a capability
    pub fn supports(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_capability_lookup() {
        let desc = ProviderDescriptor::new(ProviderType::Ipfs, [Capability::Read, Capability::Write]);
        assert!(desc.supports(Capability::Read));
        assert!(!desc.supports(Capability::SmartContract));
    }

    #[test]
    fn provider_type_display_is_stable() {
        assert_eq!(ProviderType::MongoDb.to_string(), "mongodb");
        assert_eq!(Capability::SmartContract.to_string(), "smart-contract");
    }
}
