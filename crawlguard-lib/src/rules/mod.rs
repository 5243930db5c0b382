pub mod manager;
pub mod source;
pub mod types;

pub use manager::RuleManager;
pub use source::RuleSource;
pub use types::{HeaderPattern, RuleSet};
