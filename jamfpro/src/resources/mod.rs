//! Resource implementations

pub mod building;

pub use building::BuildingResource;
