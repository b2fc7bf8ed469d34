//! Package-level constants.

/// Current version of the relay toolkit (sourced from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Package name.
pub const NAME: &str = "relay";

/// User agent sent on every outbound request.
pub const USER_AGENT: &str = concat!("relay/", env!("CARGO_PKG_VERSION"));

/// Default base URL of the public agent API.
pub const DEFAULT_BASE_URL: &str = "https://api.dgenai.io";

/// Caller name sent with public API asks when none is configured.
pub const DEFAULT_USER_NAME: &str = "relay";

/// Placeholder replaced with the previous step's output.
pub const LAST_OUTPUT_TOKEN: &str = "{{lastOutput}}";

/// Placeholder replaced with every prior output joined by a blank line.
pub const ALL_OUTPUTS_TOKEN: &str = "{{allOutputs}}";
