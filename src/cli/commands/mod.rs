pub mod config;
pub mod conflicts;
pub mod families;
pub mod plan;
pub mod scan;
pub mod upgrade;
