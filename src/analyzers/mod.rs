pub mod biome;
pub mod error;
#[cfg(test)]
pub mod mock;
pub mod traits;
pub mod typescript;
pub mod version;

pub use biome::BiomeAnalyzer;
pub use typescript::TypeScriptAnalyzer;
pub use version::VersionResolver;
