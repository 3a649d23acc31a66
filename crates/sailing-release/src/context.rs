//! Kubernetes context selection and command parameter building.

use std::fmt;

/// External tool an argument string is built for.
///
/// helm and kubectl disagree on the name of the context flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tool {
    /// `kubectl`
    Kubectl,
    /// `helm`
    Helm,
}

impl Tool {
    fn context_flag(self) -> &'static str {
        match self {
            Tool::Kubectl => "--context",
            Tool::Helm => "--kube-context",
        }
    }
}

/// Cluster, namespace and kubeconfig selection applied to every command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KubernetesContext {
    /// Namespace to operate in.
    pub namespace: Option<String>,
    /// Path to a kubeconfig file.
    pub kubeconfig: Option<String>,
    /// Name of the kubeconfig context.
    pub context: Option<String>,
}

impl KubernetesContext {
    /// Creates an empty context (tool defaults apply).
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the namespace.
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Sets the kubeconfig path.
    pub fn with_kubeconfig(mut self, path: impl Into<String>) -> Self {
        self.kubeconfig = Some(path.into());
        self
    }

    /// Sets the kubeconfig context name.
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }
}

/// Accumulates `--flag value` pairs into an argument fragment.
#[derive(Debug, Default, Clone)]
pub struct CommandParameterBuilder {
    parts: Vec<String>,
}

impl CommandParameterBuilder {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the flags selecting `context`, if any, spelled for `tool`.
    pub fn apply_context(mut self, context: Option<&KubernetesContext>, tool: Tool) -> Self {
        let Some(context) = context else {
            return self;
        };

        if let Some(namespace) = &context.namespace {
            self = self.flag("--namespace", namespace);
        }
        if let Some(kubeconfig) = &context.kubeconfig {
            self = self.flag("--kubeconfig", kubeconfig);
        }
        if let Some(name) = &context.context {
            self = self.flag(tool.context_flag(), name);
        }
        self
    }

    /// Append a flag with a value.
    pub fn flag(mut self, name: &str, value: &str) -> Self {
        self.parts.push(name.to_string());
        self.parts.push(value.to_string());
        self
    }

    /// Render the space-separated fragment. Empty when nothing was added.
    pub fn build(&self) -> String {
        self.parts.join(" ")
    }
}

impl fmt::Display for CommandParameterBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.build())
    }
}

/// Argument fragment for `context` as seen by `tool`.
pub fn context_args(context: Option<&KubernetesContext>, tool: Tool) -> String {
    CommandParameterBuilder::new()
        .apply_context(context, tool)
        .build()
}
