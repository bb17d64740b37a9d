//! Command-line and environment arguments.

use azp_core::{Error, Result, ScaleDownConfig, ScalingConfig, WorkloadKind, WorkloadRef};
use azp_devops::DevOpsConfig;
use clap::{Parser, ValueEnum};
use std::str::FromStr;
use std::time::Duration;

#[derive(Parser, Debug, Clone)]
#[command(name = "azp-agent-autoscaler")]
#[command(version, about = "Autoscale Azure DevOps agents running in Kubernetes", long_about = None)]
pub struct Args {
    /// Log level (trace, debug, info, warn, error, fatal, panic)
    #[arg(long, env = "AZP_AUTOSCALER_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Log output format
    #[arg(long, env = "AZP_AUTOSCALER_LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    /// Minimum number of free agents to keep alive
    #[arg(long, env = "AZP_AUTOSCALER_MIN", default_value_t = 1)]
    pub min: u32,

    /// Maximum number of agents allowed
    #[arg(long, env = "AZP_AUTOSCALER_MAX", default_value_t = 100)]
    pub max: u32,

    /// Rate to check if agents need to be scaled
    #[arg(long, env = "AZP_AUTOSCALER_RATE", default_value = "10s", value_parser = parse_duration)]
    pub rate: Duration,

    /// Wait time after scaling down to scale down again
    #[arg(long, env = "AZP_AUTOSCALER_SCALE_DOWN", default_value = "30s", value_parser = parse_duration)]
    pub scale_down: Duration,

    /// Maximum number of pods allowed to scale down at a time
    #[arg(long, env = "AZP_AUTOSCALER_SCALE_DOWN_MAX", default_value_t = 1)]
    pub scale_down_max: u32,

    /// Resource type of the agent (only StatefulSet is supported)
    #[arg(long = "type", env = "AZP_AUTOSCALER_TYPE", default_value = "StatefulSet")]
    pub kind: String,

    /// The name of the StatefulSet
    #[arg(long, env = "AZP_AUTOSCALER_NAME")]
    pub name: Option<String>,

    /// The namespace of the StatefulSet
    #[arg(long, env = "AZP_AUTOSCALER_NAMESPACE")]
    pub namespace: Option<String>,

    /// The Azure DevOps access token
    #[arg(long, env = "AZP_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// The Azure DevOps organization URL, ex: https://dev.azure.com/AccountName
    #[arg(long, env = "AZP_URL")]
    pub url: Option<String>,

    /// The port to serve health checks and metrics on
    #[arg(long, env = "AZP_AUTOSCALER_PORT", default_value_t = 10101)]
    pub port: u16,

    /// Timeout for a single Azure DevOps or Kubernetes request
    #[arg(long, env = "AZP_AUTOSCALER_REQUEST_TIMEOUT", default_value = "30s", value_parser = parse_duration)]
    pub request_timeout: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Directive understood by `EnvFilter`.
    pub fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            // fatal and panic abort the process, which only errors do here
            "error" | "fatal" | "panic" => Ok(LogLevel::Error),
            _ => Err(format!("Unknown log level '{}'.", s)),
        }
    }
}

/// Validated settings the process runs with.
#[derive(Debug, Clone)]
pub struct Settings {
    pub scaling: ScalingConfig,
    pub target: WorkloadRef,
    pub devops: DevOpsConfig,
    pub port: u16,
    pub request_timeout: Duration,
}

impl Args {
    /// Validate the arguments, reporting every problem at once.
    pub fn into_settings(self) -> Result<Settings> {
        let mut problems = Vec::new();

        if let Err(e) = self.log_level.parse::<LogLevel>() {
            problems.push(e);
        }

        let scaling = ScalingConfig {
            min: self.min,
            max: self.max,
            poll_interval: self.rate,
            scale_down: ScaleDownConfig {
                delay: self.scale_down,
                max: self.scale_down_max,
            },
        };
        problems.extend(scaling.problems());

        let kind = match self.kind.parse::<WorkloadKind>() {
            Ok(kind) => Some(kind),
            Err(e) => {
                problems.push(format!("{}.", e));
                None
            }
        };

        let name = required(self.name, "Name", &mut problems);
        let namespace = required(self.namespace, "Namespace", &mut problems);
        let token = required(self.token, "Token", &mut problems);
        let url = required(self.url, "URL", &mut problems);

        if self.request_timeout.is_zero() {
            problems.push("Request timeout cannot be zero.".to_string());
        }

        match kind {
            Some(kind) if problems.is_empty() => Ok(Settings {
                scaling,
                target: WorkloadRef::new(kind, namespace, name),
                devops: DevOpsConfig::new(url, token).with_request_timeout(self.request_timeout),
                port: self.port,
                request_timeout: self.request_timeout,
            }),
            _ => Err(Error::Config(problems.join("\n"))),
        }
    }
}

fn required(value: Option<String>, label: &str, problems: &mut Vec<String>) -> String {
    match value {
        Some(v) if !v.trim().is_empty() => v,
        _ => {
            problems.push(format!("{} argument is required.", label));
            String::new()
        }
    }
}

/// Parse a duration such as `500ms`, `10s`, `5m`, `1h` or bare seconds.
pub fn parse_duration(s: &str) -> std::result::Result<Duration, String> {
    let s = s.trim();
    let parsed = if let Some(ms) = s.strip_suffix("ms") {
        ms.parse::<u64>().ok().map(Duration::from_millis)
    } else if let Some(secs) = s.strip_suffix('s') {
        secs.parse::<u64>().ok().map(Duration::from_secs)
    } else if let Some(mins) = s.strip_suffix('m') {
        scaled_secs(mins, 60)
    } else if let Some(hours) = s.strip_suffix('h') {
        scaled_secs(hours, 3600)
    } else {
        s.parse::<u64>().ok().map(Duration::from_secs)
    };
    parsed.ok_or_else(|| format!("invalid duration '{}'", s))
}

fn scaled_secs(value: &str, unit: u64) -> Option<Duration> {
    value
        .parse::<u64>()
        .ok()?
        .checked_mul(unit)
        .map(Duration::from_secs)
}
