//! Command-line and environment configuration.
//!
//! Every flag can also be set through a `KEEL_`-prefixed environment
//! variable. Flags win over the environment, which wins over the defaults.

use std::net::SocketAddr;
use std::time::Duration;

use clap::{Args, Parser};

/// Build identifier reported by `--version` and `/debug/vars`.
pub const BUILD: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Clone, Parser)]
#[command(name = "keel-api", version = BUILD, about = "Request-processing API service")]
pub struct Config {
    #[command(flatten)]
    pub web: WebConfig,
}

#[derive(Debug, Clone, Args)]
pub struct WebConfig {
    /// Address the API listens on
    #[arg(long = "web-api-host", env = "KEEL_WEB_API_HOST", default_value = "0.0.0.0:8080")]
    pub api_host: SocketAddr,

    /// Address the debug listener binds to
    #[arg(long = "web-debug-host", env = "KEEL_WEB_DEBUG_HOST", default_value = "0.0.0.0:8181")]
    pub debug_host: SocketAddr,

    /// Time allowed to read request headers
    #[arg(long = "web-read-timeout", env = "KEEL_WEB_READ_TIMEOUT", default_value = "5s", value_parser = parse_duration)]
    pub read_timeout: Duration,

    /// Time allowed to produce a response
    #[arg(long = "web-write-timeout", env = "KEEL_WEB_WRITE_TIMEOUT", default_value = "5s", value_parser = parse_duration)]
    pub write_timeout: Duration,

    /// Grace period for in-flight requests on shutdown
    #[arg(long = "web-shutdown-timeout", env = "KEEL_WEB_SHUTDOWN_TIMEOUT", default_value = "5s", value_parser = parse_duration)]
    pub shutdown_timeout: Duration,
}

/// Parses `250ms`, `5s`, `2m`, `1h`, or a bare number of seconds.
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    let split = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    let (digits, unit) = s.split_at(split);

    let n: u64 = digits
        .parse()
        .map_err(|_| format!("invalid duration `{s}`: expected a number followed by ms, s, m or h"))?;

    match unit {
        "ms" => Ok(Duration::from_millis(n)),
        "" | "s" => Ok(Duration::from_secs(n)),
        "m" => Ok(Duration::from_secs(n * 60)),
        "h" => Ok(Duration::from_secs(n * 3600)),
        other => Err(format!("invalid duration unit `{other}` in `{s}`")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn durations() {
        assert_eq!(parse_duration("250ms"), Ok(Duration::from_millis(250)));
        assert_eq!(parse_duration("5s"), Ok(Duration::from_secs(5)));
        assert_eq!(parse_duration("7"), Ok(Duration::from_secs(7)));
        assert_eq!(parse_duration("2m"), Ok(Duration::from_secs(120)));
        assert_eq!(parse_duration("1h"), Ok(Duration::from_secs(3600)));
        assert!(parse_duration("").is_err());
        assert!(parse_duration("s").is_err());
        assert!(parse_duration("5d").is_err());
        assert!(parse_duration("-5s").is_err());
    }

    #[test]
    fn defaults() {
        let cfg = Config::try_parse_from(["keel-api"]).unwrap();

        assert_eq!(cfg.web.api_host, "0.0.0.0:8080".parse().unwrap());
        assert_eq!(cfg.web.debug_host, "0.0.0.0:8181".parse().unwrap());
        assert_eq!(cfg.web.read_timeout, Duration::from_secs(5));
        assert_eq!(cfg.web.write_timeout, Duration::from_secs(5));
        assert_eq!(cfg.web.shutdown_timeout, Duration::from_secs(5));
    }

    #[test]
    fn flags_override_defaults() {
        let cfg = Config::try_parse_from([
            "keel-api",
            "--web-api-host",
            "127.0.0.1:9000",
            "--web-shutdown-timeout",
            "30s",
        ])
        .unwrap();

        assert_eq!(cfg.web.api_host, "127.0.0.1:9000".parse().unwrap());
        assert_eq!(cfg.web.shutdown_timeout, Duration::from_secs(30));
    }

    #[test]
    fn help_and_version_are_not_failures() {
        let err = Config::try_parse_from(["keel-api", "--version"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayVersion);
        assert!(err.render().to_string().contains(BUILD));

        let err = Config::try_parse_from(["keel-api", "--help"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
    }

    #[test]
    fn bad_address_is_rejected() {
        assert!(Config::try_parse_from(["keel-api", "--web-api-host", "nowhere"]).is_err());
    }
}
