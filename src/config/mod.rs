//! # Configuration
//!
//! The declared desired state, loaded fresh on every invocation from a YAML
//! file. There is no ambient or global configuration: the loaded value is
//! constructed once at process start and passed by value into the
//! reconciliation pipeline.

mod desired;

pub use desired::{ConfigError, DesiredState};

use std::path::Path;

/// Load and validate the desired state from a YAML file
pub fn load_desired_state(path: &Path) -> Result<DesiredState, ConfigError> {
    DesiredState::from_file(path)
}
