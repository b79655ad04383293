//! Package-level constants.

/// Current version of the hive agent daemon (sourced from `Cargo.toml`).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Package name.
pub const NAME: &str = "hive";

/// Maximum number of [`crate::model::ConversationEntry`] values retained
/// in-memory per agent before trimming begins.
pub const CONVERSATION_RING_CAPACITY: usize = 2_000;

/// Default JSON-RPC request timeout, in milliseconds. `0` disables the
/// timeout.
pub const DEFAULT_RPC_TIMEOUT_MS: u64 = 30_000;

/// Reserved agent id for the swarm's single primary manager.
pub const PRIMARY_MANAGER_ARCHETYPE: &str = "manager";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_semver() {
        let parts: Vec<&str> = VERSION.split('.').collect();
        assert_eq!(parts.len(), 3, "VERSION must be semver (MAJOR.MINOR.PATCH)");
        for part in parts {
            let _: u32 = part.parse().expect("each semver segment must be a number");
        }
    }

    #[test]
    fn name_is_lowercase() {
        assert_eq!(NAME, NAME.to_lowercase());
    }

    #[test]
    fn ring_capacity_is_two_thousand() {
        assert_eq!(CONVERSATION_RING_CAPACITY, 2_000);
    }
}
