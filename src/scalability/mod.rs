//! Effect scalability: distance, visibility and count based culling of live
//! effect instances under a per-frame evaluation budget.
//!
//! [`ScalabilityManager`] handles one effect type; [`ScalabilityWorld`] routes
//! instances to the manager for their effect type.

pub mod config;
pub mod state;
pub mod registry;
pub mod budget;
pub mod significance;
pub mod manager;
pub mod world;

pub use config::{CullReaction, EffectType, ScalabilityConfig, ScalabilitySettings, UpdateFrequency};
pub use state::ScalabilityState;
pub use registry::{InstanceHandle, InstanceRegistry};
pub use budget::{max_update_count, UpdateWorkList};
pub use significance::{apply_instance_count_limits, RankingStats, SignificanceHandler, SystemId};
pub use manager::{ManagerStats, ScalableInstance, ScalabilityManager, TickReport, ViewContext};
pub use world::ScalabilityWorld;
