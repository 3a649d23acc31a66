//! Command-line interface definition using clap.

use std::fmt;
use std::str::FromStr;

use clap::{Args, Parser, Subcommand};
use sailing_release::{KubernetesContext, TargetKind, ToolConfig, TunnelTarget};
use thiserror::Error;

/// Smooth Sailing - port-forwards into a helm release, removed together
#[derive(Parser, Debug)]
#[command(name = "sail")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// kubectl binary used for port-forwarding [default: $SAILING_KUBECTL or kubectl]
    #[arg(long, global = true)]
    pub kubectl: Option<String>,

    /// helm binary used for uninstalling [default: $SAILING_HELM or helm]
    #[arg(long, global = true)]
    pub helm: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Open tunnels into a release, then uninstall it on Ctrl-C
    Attach {
        /// Helm release name
        #[arg(required = true)]
        release: String,

        #[command(flatten)]
        context: ContextArgs,

        /// Service to forward, as name:port[:local]
        #[arg(long = "service", value_name = "NAME:PORT[:LOCAL]")]
        services: Vec<ForwardSpec>,

        /// Pod to forward, as name:port[:local]
        #[arg(long = "pod", value_name = "NAME:PORT[:LOCAL]")]
        pods: Vec<ForwardSpec>,
    },

    /// Uninstall a release without opening tunnels
    Uninstall {
        /// Helm release name
        #[arg(required = true)]
        release: String,

        #[command(flatten)]
        context: ContextArgs,
    },
}

/// Cluster selection shared by every subcommand.
#[derive(Args, Debug, Clone, Default)]
pub struct ContextArgs {
    /// Kubernetes namespace
    #[arg(short, long)]
    pub namespace: Option<String>,

    /// Path to a kubeconfig file
    #[arg(long)]
    pub kubeconfig: Option<String>,

    /// Kubeconfig context name
    #[arg(long = "kube-context")]
    pub kube_context: Option<String>,
}

impl ContextArgs {
    /// Convert to a context, `None` when nothing was selected.
    pub fn to_context(&self) -> Option<KubernetesContext> {
        if self.namespace.is_none() && self.kubeconfig.is_none() && self.kube_context.is_none() {
            return None;
        }
        Some(KubernetesContext {
            namespace: self.namespace.clone(),
            kubeconfig: self.kubeconfig.clone(),
            context: self.kube_context.clone(),
        })
    }
}

/// Errors parsing a `name:port[:local]` forward spec.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ForwardSpecError {
    /// Not of the form `name:port[:local]`.
    #[error("expected NAME:PORT[:LOCAL], got '{0}'")]
    Format(String),

    /// A port was not a number in 1..=65535.
    #[error("invalid port '{0}'")]
    Port(String),
}

/// A tunnel requested on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardSpec {
    /// Target name.
    pub name: String,
    /// Target port.
    pub port: u16,
    /// Requested local port.
    pub local_port: Option<u16>,
}

impl ForwardSpec {
    /// Resolve into a tunnel target of `kind`.
    pub fn into_target(self, kind: TargetKind) -> TunnelTarget {
        TunnelTarget {
            kind,
            name: self.name,
            port: self.port,
            local_port: self.local_port,
        }
    }
}

fn parse_port(value: &str) -> Result<u16, ForwardSpecError> {
    match value.parse::<u16>() {
        Ok(port) if port > 0 => Ok(port),
        _ => Err(ForwardSpecError::Port(value.to_string())),
    }
}

impl FromStr for ForwardSpec {
    type Err = ForwardSpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(':').collect();
        let (name, port, local) = match parts.as_slice() {
            [name, port] => (*name, *port, None),
            [name, port, local] => (*name, *port, Some(*local)),
            _ => return Err(ForwardSpecError::Format(s.to_string())),
        };

        if name.is_empty() {
            return Err(ForwardSpecError::Format(s.to_string()));
        }

        Ok(Self {
            name: name.to_string(),
            port: parse_port(port)?,
            local_port: local.map(parse_port).transpose()?,
        })
    }
}

impl fmt::Display for ForwardSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.name, self.port)?;
        if let Some(local) = self.local_port {
            write!(f, ":{}", local)?;
        }
        Ok(())
    }
}

impl Cli {
    /// Returns the log level based on verbosity.
    pub fn log_level(&self) -> tracing::Level {
        match self.verbose {
            0 => tracing::Level::WARN,
            1 => tracing::Level::INFO,
            2 => tracing::Level::DEBUG,
            _ => tracing::Level::TRACE,
        }
    }

    /// Tool binaries from the environment, overridden by flags.
    pub fn tool_config(&self) -> ToolConfig {
        self.apply_tool_flags(ToolConfig::from_env())
    }

    fn apply_tool_flags(&self, mut config: ToolConfig) -> ToolConfig {
        if let Some(kubectl) = &self.kubectl {
            config = config.with_kubectl(kubectl.clone());
        }
        if let Some(helm) = &self.helm {
            config = config.with_helm(helm.clone());
        }
        config
    }
}
