//! Reporting configuration.
//!
//! The orchestrator receives one [`ZatcaConfig`] value instead of reading
//! credentials or the timezone from process-wide state. Configuration comes
//! from (highest priority first):
//!
//! 1. environment variables (`ZATCA_ENV`, `ZATCA_STAGING_DIR`,
//!    `ZATCA_ARCHIVE_DIR`, `ZATCA_SIGNER_TIMEOUT_SECS`)
//! 2. a TOML file
//! 3. defaults
//!
//! ```toml
//! environment = "simulation"
//! template_path = "zatca/standard_invoice.xml"
//! staging_dir = "zatca/staging"
//! archive_dir = "zatca"
//! timezone = "Asia/Riyadh"
//!
//! [signer]
//! timeout_secs = 60
//! compliance = { program = "python3", args = ["zatca/compliance_check.py"] }
//! reporting = { program = "python3", args = ["zatca/report.py"] }
//! ```

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use chrono::{FixedOffset, Offset, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::core::ZatcaError;

/// ZATCA environment the signer talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    /// The developer portal ("integration sandbox").
    #[default]
    NonProduction,
    Simulation,
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NonProduction => "non_production",
            Self::Simulation => "simulation",
            Self::Production => "production",
        }
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = ZatcaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "non_production" | "sandbox" | "developer-portal" => Ok(Self::NonProduction),
            "simulation" => Ok(Self::Simulation),
            "production" | "core" => Ok(Self::Production),
            other => Err(ZatcaError::Config(format!(
                "unknown environment '{other}'. Valid options: non_production, simulation, production"
            ))),
        }
    }
}

/// An external program invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignerCommand {
    pub program: PathBuf,
    #[serde(default)]
    pub args: Vec<String>,
}

impl SignerCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }
}

/// How to reach the external signer for each stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignerConfig {
    pub compliance: SignerCommand,
    pub reporting: SignerCommand,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    60
}

impl SignerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for SignerConfig {
    fn default() -> Self {
        Self {
            compliance: SignerCommand::new("python3").arg("zatca/compliance_check.py"),
            reporting: SignerCommand::new("python3").arg("zatca/report.py"),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Everything the reporting pipeline needs besides the repository and signer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZatcaConfig {
    pub environment: Environment,
    /// UBL skeleton whose root element and namespaces are reused.
    pub template_path: PathBuf,
    /// Where draft (unsigned) invoices are written for the signer.
    pub staging_dir: PathBuf,
    /// Root of the cleared-invoice archive (`xml/` and `returns/xml/`).
    pub archive_dir: PathBuf,
    /// IANA name or `±HH:MM` offset used for issue dates and signing times.
    pub timezone: String,
    /// Also run the compliance check before reporting returns.
    pub compliance_check_returns: bool,
    pub signer: SignerConfig,
}

impl Default for ZatcaConfig {
    fn default() -> Self {
        Self {
            environment: Environment::default(),
            template_path: PathBuf::from("zatca/standard_invoice.xml"),
            staging_dir: PathBuf::from("zatca/staging"),
            archive_dir: PathBuf::from("zatca"),
            timezone: "Asia/Riyadh".to_string(),
            compliance_check_returns: false,
            signer: SignerConfig::default(),
        }
    }
}

impl ZatcaConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ZatcaError> {
        toml::from_str(s).map_err(|e| ZatcaError::Config(format!("invalid TOML: {e}")))
    }

    pub fn from_file(path: &Path) -> Result<Self, ZatcaError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ZatcaError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        let config = Self::from_toml_str(&content)?;
        info!(path = %path.display(), env = %config.environment, "Loaded ZATCA configuration");
        Ok(config)
    }

    /// Apply `ZATCA_*` environment variable overrides.
    pub fn apply_env_overrides(&mut self) -> Result<(), ZatcaError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ZatcaError> {
        if let Some(env) = lookup("ZATCA_ENV") {
            debug!(env = %env, "ZATCA_ENV override");
            self.environment = env.parse()?;
        }
        if let Some(dir) = lookup("ZATCA_STAGING_DIR") {
            self.staging_dir = PathBuf::from(dir);
        }
        if let Some(dir) = lookup("ZATCA_ARCHIVE_DIR") {
            self.archive_dir = PathBuf::from(dir);
        }
        if let Some(secs) = lookup("ZATCA_SIGNER_TIMEOUT_SECS") {
            self.signer.timeout_secs = secs.parse().map_err(|_| {
                ZatcaError::Config(format!("ZATCA_SIGNER_TIMEOUT_SECS is not a number: '{secs}'"))
            })?;
        }
        Ok(())
    }

    /// Resolve the configured timezone to a fixed UTC offset.
    pub fn utc_offset(&self) -> Result<FixedOffset, ZatcaError> {
        resolve_utc_offset(&self.timezone)
    }
}

/// Resolve an IANA zone name or a `±HH:MM` / `±HHMM` offset.
///
/// Zone names resolve to their offset at the current instant. Saudi Arabia
/// has observed UTC+03:00 all year since 1950.
pub fn resolve_utc_offset(timezone: &str) -> Result<FixedOffset, ZatcaError> {
    let tz = timezone.trim();
    if let Ok(zone) = tz.parse::<Tz>() {
        return Ok(Utc::now().with_timezone(&zone).offset().fix());
    }
    parse_offset(tz).ok_or_else(|| ZatcaError::Timezone(format!("unknown timezone '{timezone}'")))
}

fn parse_offset(s: &str) -> Option<FixedOffset> {
    let (sign, rest) = match s.as_bytes().first()? {
        b'+' => (1, &s[1..]),
        b'-' => (-1, &s[1..]),
        _ => return None,
    };
    let digits: String = rest.chars().filter(|c| *c != ':').collect();
    if digits.len() != 4 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let hours: i32 = digits[..2].parse().ok()?;
    let minutes: i32 = digits[2..].parse().ok()?;
    if hours > 14 || minutes > 59 {
        return None;
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_point_at_riyadh_and_sixty_seconds() {
        let cfg = ZatcaConfig::default();
        assert_eq!(cfg.timezone, "Asia/Riyadh");
        assert_eq!(cfg.signer.timeout(), Duration::from_secs(60));
        assert_eq!(cfg.template_path, PathBuf::from("zatca/standard_invoice.xml"));
        assert!(!cfg.compliance_check_returns);
    }

    #[test]
    fn parses_toml() {
        let cfg = ZatcaConfig::from_toml_str(
            r#"
            environment = "simulation"
            staging_dir = "/tmp/zatca"
            compliance_check_returns = true

            [signer]
            timeout_secs = 15
            compliance = { program = "zatca-signer", args = ["compliance"] }
            reporting = { program = "zatca-signer", args = ["report"] }
            "#,
        )
        .unwrap();
        assert_eq!(cfg.environment, Environment::Simulation);
        assert_eq!(cfg.staging_dir, PathBuf::from("/tmp/zatca"));
        assert!(cfg.compliance_check_returns);
        assert_eq!(cfg.signer.timeout_secs, 15);
        assert_eq!(cfg.signer.reporting.args, vec!["report"]);
        // untouched keys keep their defaults
        assert_eq!(cfg.timezone, "Asia/Riyadh");
    }

    #[test]
    fn invalid_toml_is_config_error() {
        let err = ZatcaConfig::from_toml_str("environment = 3").unwrap_err();
        assert!(matches!(err, ZatcaError::Config(_)));
    }

    #[test]
    fn env_overrides_win() {
        let vars: HashMap<&str, &str> = [
            ("ZATCA_ENV", "production"),
            ("ZATCA_STAGING_DIR", "/var/zatca/staging"),
            ("ZATCA_SIGNER_TIMEOUT_SECS", "5"),
        ]
        .into_iter()
        .collect();
        let mut cfg = ZatcaConfig::default();
        cfg.apply_overrides(|k| vars.get(k).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(cfg.environment, Environment::Production);
        assert_eq!(cfg.staging_dir, PathBuf::from("/var/zatca/staging"));
        assert_eq!(cfg.signer.timeout_secs, 5);
        assert_eq!(cfg.archive_dir, PathBuf::from("zatca"));
    }

    #[test]
    fn bad_timeout_override_is_rejected() {
        let mut cfg = ZatcaConfig::default();
        let err = cfg
            .apply_overrides(|k| (k == "ZATCA_SIGNER_TIMEOUT_SECS").then(|| "soon".to_string()))
            .unwrap_err();
        assert!(matches!(err, ZatcaError::Config(_)));
    }

    #[test]
    fn resolves_timezones() {
        assert_eq!(
            resolve_utc_offset("Asia/Riyadh").unwrap(),
            FixedOffset::east_opt(3 * 3600).unwrap()
        );
        assert_eq!(resolve_utc_offset("UTC").unwrap().local_minus_utc(), 0);
        assert_eq!(
            resolve_utc_offset("Asia/Dubai").unwrap().local_minus_utc(),
            4 * 3600
        );
        assert_eq!(
            resolve_utc_offset(" Asia/Kolkata ").unwrap().local_minus_utc(),
            5 * 3600 + 30 * 60
        );
        assert_eq!(
            resolve_utc_offset("+03:00").unwrap().local_minus_utc(),
            3 * 3600
        );
        assert_eq!(
            resolve_utc_offset("-0530").unwrap().local_minus_utc(),
            -(5 * 3600 + 30 * 60)
        );
    }

    #[test]
    fn unknown_timezone_is_timezone_error() {
        for tz in ["Mars/Olympus", "", "+3", "+25:00", "03:00"] {
            assert!(
                matches!(resolve_utc_offset(tz), Err(ZatcaError::Timezone(_))),
                "{tz} should not resolve"
            );
        }
    }

    #[test]
    fn environment_round_trip() {
        for env in [
            Environment::NonProduction,
            Environment::Simulation,
            Environment::Production,
        ] {
            assert_eq!(env.as_str().parse::<Environment>().unwrap(), env);
        }
        assert!("staging".parse::<Environment>().is_err());
    }
}
