//! Configuration for engine behavior tuning
//!
//! Options are grouped into presets so callers can pick a profile and
//! resolve it into concrete values, or supply a fully custom set.

/// What the tile cache does when every resident tile is still referenced
/// and a new tile arrives past capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverflowPolicy {
    /// Let the store exceed capacity; excess is reclaimed as soon as
    /// references are released. In-use tiles are never evicted.
    Elastic,
    /// Hand the arriving tile to its requesters but do not retain it, so
    /// the store never grows past capacity.
    Strict,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EngineOptions {
    /// Spring stiffness for animated item geometry; larger settles faster
    pub spring_stiffness: f64,
    /// Springs snap to their target once within this distance
    pub settle_epsilon: f64,
    /// Maximum resident tile count in the shared cache
    pub tile_cache_capacity: usize,
    /// Cache behavior when capacity is exceeded by in-use tiles
    pub overflow_policy: OverflowPolicy,
}

impl Default for EngineOptions {
    fn default() -> Self {
        EngineProfile::Balanced.resolve()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EngineProfile {
    Balanced,
    LowMemory,
    HighQuality,
    Custom(EngineOptions),
}

impl EngineProfile {
    pub fn resolve(&self) -> EngineOptions {
        match self {
            Self::Balanced => EngineOptions {
                spring_stiffness: 6.5,
                settle_epsilon: 1e-4,
                tile_cache_capacity: 200,
                overflow_policy: OverflowPolicy::Elastic,
            },
            Self::LowMemory => EngineOptions {
                spring_stiffness: 10.0,
                settle_epsilon: 1e-3,
                tile_cache_capacity: 64,
                overflow_policy: OverflowPolicy::Strict,
            },
            Self::HighQuality => EngineOptions {
                spring_stiffness: 5.0,
                settle_epsilon: 1e-5,
                tile_cache_capacity: 1024,
                overflow_policy: OverflowPolicy::Elastic,
            },
            Self::Custom(options) => options.clone(),
        }
    }
}
