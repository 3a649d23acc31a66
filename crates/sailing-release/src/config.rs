//! Tool configuration.

/// Environment variable overriding the kubectl binary.
pub const KUBECTL_ENV: &str = "SAILING_KUBECTL";

/// Environment variable overriding the helm binary.
pub const HELM_ENV: &str = "SAILING_HELM";

/// Names or paths of the external binaries a release drives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolConfig {
    /// Binary used for port-forwarding.
    pub kubectl: String,
    /// Binary used to uninstall the release.
    pub helm: String,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            kubectl: "kubectl".to_string(),
            helm: "helm".to_string(),
        }
    }
}

impl ToolConfig {
    /// Creates a config with default binaries resolved from `PATH`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults overridden by `SAILING_KUBECTL` / `SAILING_HELM` when set.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(kubectl) = lookup(KUBECTL_ENV).filter(|v| !v.trim().is_empty()) {
            config.kubectl = kubectl;
        }
        if let Some(helm) = lookup(HELM_ENV).filter(|v| !v.trim().is_empty()) {
            config.helm = helm;
        }
        config
    }

    /// Sets the kubectl binary.
    pub fn with_kubectl(mut self, kubectl: impl Into<String>) -> Self {
        self.kubectl = kubectl.into();
        self
    }

    /// Sets the helm binary.
    pub fn with_helm(mut self, helm: impl Into<String>) -> Self {
        self.helm = helm.into();
        self
    }
}
