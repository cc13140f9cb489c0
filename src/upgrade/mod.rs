//! Upgrade planning and execution

pub mod executor;
pub mod naming;
pub mod strategist;
pub mod workflow;

pub use executor::UpgradeExecutor;
pub use naming::format_family_name;
pub use strategist::UpgradeStrategist;
pub use workflow::{UpgradePlan, UpgradeWorkflow, WorkflowOutcome};
