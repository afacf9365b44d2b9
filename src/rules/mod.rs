//! Strategy configuration loaded from TOML

pub mod strategy;
mod loader;

pub use loader::CompiledStrategy;
pub use strategy::{
    BucketPolicyConfig, InclusionaryConfig, OfficeSubsidyConfig, ParkingConfig,
    ResidentialSubsidyConfig, StrategyConfig, TierLevelConfig, TierPolicyConfig,
};
