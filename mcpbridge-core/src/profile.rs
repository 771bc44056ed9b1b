//! Deployment profiles.
//!
//! The profile decides how loudly risky settings are reported. Production
//! is the default; development relaxes the noise for local work against
//! self-signed test servers.

/// Named deployment profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Profile {
    /// Insecure settings are warned about.
    #[default]
    Production,
    /// Insecure settings are expected and only noted.
    Development,
}

impl Profile {
    /// Lowercase name, as accepted by `--profile` and used in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Profile::Production => "production",
            Profile::Development => "development",
        }
    }
}
