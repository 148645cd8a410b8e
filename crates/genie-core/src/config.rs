// Configuration loading and parsing (estimation.toml, genie.toml, credentials.toml).

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::money::Money;

/// Tolerance used when checking that effort shares add up to one.
pub const SHARE_SUM_TOLERANCE: f64 = 1e-6;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("validation error for field `{field}`: {message}")]
    ValidationError { field: String, message: String },

    #[error("failed to initialize config from defaults: {message}")]
    DefaultsCopyError { message: String },
}

fn invalid(field: impl Into<String>, message: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError {
        field: field.into(),
        message: message.into(),
    }
}

// ---------------------------------------------------------------------------
// Top-level assembled Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Config {
    pub estimation: EstimationConfig,
    pub llm: LlmConfig,
    pub credentials: CredentialsConfig,
    pub db_path: PathBuf,
    pub export_dir: PathBuf,
    pub ingest: IngestConfig,
}

// ---------------------------------------------------------------------------
// estimation.toml structs
// ---------------------------------------------------------------------------

/// Every constant the cost estimation engine needs. Passed explicitly to the
/// engine on each call; `Default` carries the government tables used when no
/// file overrides them.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EstimationConfig {
    pub calibration: Calibration,
    pub workload: Workload,
    pub markup: Markup,
    pub roles: Vec<RoleRate>,
    pub activities: Vec<ActivityShare>,
}

/// Technical and environmental complexity factors.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Calibration {
    pub tcf: f64,
    pub ecf: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Workload {
    /// Person-hours per use-case point.
    pub phm_multiplier: f64,
    pub hours_per_day: f64,
    pub days_per_month: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Markup {
    pub warranty_rate: f64,
    pub tax_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RoleRate {
    pub name: String,
    /// Monthly rate in whole rupiah.
    pub monthly_rate: i64,
}

impl RoleRate {
    pub fn rate(&self) -> Money {
        Money::from_major(self.monthly_rate)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ActivityShare {
    pub name: String,
    /// Fraction (0..=1) of total effort.
    pub share: f64,
    pub role: String,
}

const DEFAULT_ROLES: &[(&str, i64)] = &[
    ("Project Manager", 28_150_000),
    ("Business Analyst", 21_950_000),
    ("System Analyst", 21_950_000),
    ("Programmer", 21_950_000),
    ("Quality Control", 13_950_000),
    ("Quality Assurance", 13_950_000),
    ("Technical Writer", 13_950_000),
    ("Tester", 13_950_000),
];

const DEFAULT_ACTIVITIES: &[(&str, f64, &str)] = &[
    ("Needs analysis", 0.016, "Business Analyst"),
    ("Specification", 0.075, "System Analyst"),
    ("Design", 0.060, "System Analyst"),
    ("Implementation (Coding)", 0.520, "Programmer"),
    ("Acceptance & installation", 0.055, "System Analyst"),
    ("Project management", 0.038, "Project Manager"),
    ("Configuration management", 0.043, "System Analyst"),
    ("Documentation", 0.084, "Technical Writer"),
    ("Training & technical support", 0.010, "Technical Writer"),
    ("Integrated testing", 0.070, "Tester"),
    ("Quality assurance", 0.009, "Tester"),
    ("Evaluation & testing", 0.020, "Tester"),
];

impl Default for EstimationConfig {
    fn default() -> Self {
        Self {
            calibration: Calibration { tcf: 0.87, ecf: 0.77 },
            workload: Workload {
                phm_multiplier: 20.0,
                hours_per_day: 8.0,
                days_per_month: 22.0,
            },
            markup: Markup {
                warranty_rate: 0.25,
                tax_rate: 0.11,
            },
            roles: DEFAULT_ROLES
                .iter()
                .map(|(name, rate)| RoleRate {
                    name: name.to_string(),
                    monthly_rate: *rate,
                })
                .collect(),
            activities: DEFAULT_ACTIVITIES
                .iter()
                .map(|(name, share, role)| ActivityShare {
                    name: name.to_string(),
                    share: *share,
                    role: role.to_string(),
                })
                .collect(),
        }
    }
}

impl EstimationConfig {
    /// Monthly rate for `role`, if the role is in the rate table.
    pub fn rate_for(&self, role: &str) -> Option<Money> {
        self.roles.iter().find(|r| r.name == role).map(RoleRate::rate)
    }

    /// Reject configurations the engine cannot evaluate meaningfully:
    /// zero divisors, non-finite constants, inconsistent tables.
    ///
    /// TCF and ECF are only required to be finite; their range is left to
    /// the caller.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let finite_fields: &[(&str, f64)] = &[
            ("calibration.tcf", self.calibration.tcf),
            ("calibration.ecf", self.calibration.ecf),
            ("workload.phm_multiplier", self.workload.phm_multiplier),
            ("markup.warranty_rate", self.markup.warranty_rate),
            ("markup.tax_rate", self.markup.tax_rate),
        ];
        for (name, val) in finite_fields {
            if !val.is_finite() {
                return Err(invalid(*name, format!("must be a finite number, got {val}")));
            }
        }

        let divisors: &[(&str, f64)] = &[
            ("workload.hours_per_day", self.workload.hours_per_day),
            ("workload.days_per_month", self.workload.days_per_month),
        ];
        for (name, val) in divisors {
            if !val.is_finite() || *val <= 0.0 {
                return Err(invalid(*name, format!("must be > 0, got {val}")));
            }
        }

        let markups: &[(&str, f64)] = &[
            ("markup.warranty_rate", self.markup.warranty_rate),
            ("markup.tax_rate", self.markup.tax_rate),
        ];
        for (name, val) in markups {
            if *val < 0.0 {
                return Err(invalid(*name, format!("must be >= 0, got {val}")));
            }
        }

        let mut role_names = HashSet::new();
        for role in &self.roles {
            if !role_names.insert(role.name.as_str()) {
                return Err(invalid("roles", format!("duplicate role `{}`", role.name)));
            }
            if role.monthly_rate < 0 {
                return Err(invalid(
                    format!("roles.{}.monthly_rate", role.name),
                    format!("must be >= 0, got {}", role.monthly_rate),
                ));
            }
        }

        if self.activities.is_empty() {
            return Err(invalid("activities", "at least one activity is required"));
        }

        let mut activity_names = HashSet::new();
        let mut share_sum = 0.0;
        for activity in &self.activities {
            if !activity_names.insert(activity.name.as_str()) {
                return Err(invalid(
                    "activities",
                    format!("duplicate activity `{}`", activity.name),
                ));
            }
            if !(0.0..=1.0).contains(&activity.share) {
                return Err(invalid(
                    format!("activities.{}.share", activity.name),
                    format!("must be between 0.0 and 1.0 inclusive, got {}", activity.share),
                ));
            }
            if !role_names.contains(activity.role.as_str()) {
                return Err(invalid(
                    format!("activities.{}.role", activity.name),
                    format!("role `{}` has no monthly rate", activity.role),
                ));
            }
            share_sum += activity.share;
        }

        if (share_sum - 1.0).abs() > SHARE_SUM_TOLERANCE {
            return Err(invalid(
                "activities",
                format!("shares must sum to 1.0, got {share_sum}"),
            ));
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// genie.toml structs
// ---------------------------------------------------------------------------

/// Raw deserialization target for the entire genie.toml file.
#[derive(Debug, Clone, Deserialize)]
struct GenieFile {
    llm: LlmConfig,
    #[serde(default)]
    database: DatabaseSection,
    export: ExportSection,
    ingest: IngestConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct DatabaseSection {
    path: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct ExportSection {
    dir: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LlmConfig {
    pub model: String,
    pub base_url: String,
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_jitter_ms: u64,
    pub workspace_temperature: f32,
    pub review_temperature: f32,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct IngestConfig {
    /// Briefs longer than this are truncated before being sent to the model.
    pub max_input_chars: usize,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: "gemini-2.5-flash".to_string(),
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            max_retries: 3,
            base_delay_ms: 1000,
            max_jitter_ms: 1000,
            workspace_temperature: 0.4,
            review_temperature: 0.2,
        }
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            max_input_chars: 50_000,
        }
    }
}

// ---------------------------------------------------------------------------
// credentials.toml structs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, Default)]
pub struct CredentialsConfig {
    pub gemini_api_key: Option<String>,
}

// ---------------------------------------------------------------------------
// Loading logic
// ---------------------------------------------------------------------------

/// Load and validate configuration from `config/estimation.toml`,
/// `config/genie.toml`, and (optionally) `config/credentials.toml`, all
/// relative to `base_dir`.
///
/// This does not copy defaults; `load_config()` does.
pub fn load_config_from(base_dir: &Path) -> Result<Config, ConfigError> {
    let config_dir = base_dir.join("config");

    // --- estimation.toml (required) ---
    let estimation_path = config_dir.join("estimation.toml");
    let estimation: EstimationConfig = parse_file(&estimation_path)?;

    // --- genie.toml (required) ---
    let genie_path = config_dir.join("genie.toml");
    let genie: GenieFile = parse_file(&genie_path)?;

    // --- credentials.toml (optional) ---
    let credentials_path = config_dir.join("credentials.toml");
    let credentials = if credentials_path.exists() {
        parse_file(&credentials_path)?
    } else {
        CredentialsConfig::default()
    };

    let db_path = match genie.database.path {
        Some(path) if !path.trim().is_empty() => PathBuf::from(path),
        _ => default_db_path(),
    };

    let config = Config {
        estimation,
        llm: genie.llm,
        credentials,
        db_path,
        export_dir: PathBuf::from(genie.export.dir),
        ingest: genie.ingest,
    };

    validate(&config)?;

    Ok(config)
}

/// Copy every file in `defaults/` that is missing or empty in `config/`,
/// skipping `*.example` templates. Non-empty files are never overwritten.
/// Returns the paths written.
pub fn ensure_config_files(base_dir: &Path) -> Result<Vec<PathBuf>, ConfigError> {
    let source = base_dir.join("defaults");
    let target_dir = base_dir.join("config");

    if !source.is_dir() {
        return if target_dir.is_dir() {
            Ok(Vec::new())
        } else {
            Err(seed_error(format!(
                "no defaults/ or config/ directory under {}",
                base_dir.display()
            )))
        };
    }

    std::fs::create_dir_all(&target_dir)
        .map_err(|e| seed_error(format!("cannot create {}: {e}", target_dir.display())))?;
    let listing = std::fs::read_dir(&source)
        .map_err(|e| seed_error(format!("cannot list {}: {e}", source.display())))?;

    let mut written = Vec::new();
    for entry in listing {
        let path = entry
            .map_err(|e| seed_error(format!("cannot list {}: {e}", source.display())))?
            .path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if !path.is_file() || name.ends_with(".example") {
            continue;
        }

        let dest = target_dir.join(name);
        // A zero-length target is what an interrupted copy leaves behind.
        let reseed = match std::fs::metadata(&dest) {
            Ok(meta) if meta.len() > 0 => continue,
            Ok(_) => true,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
            Err(e) => return Err(seed_error(format!("cannot inspect {}: {e}", dest.display()))),
        };
        let bytes = std::fs::read(&path)
            .map_err(|e| seed_error(format!("cannot read {}: {e}", path.display())))?;

        let mut options = std::fs::OpenOptions::new();
        options.write(true);
        if reseed {
            options.truncate(true);
        } else {
            options.create_new(true);
        }
        let mut file = match options.open(&dest) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(seed_error(format!("cannot create {}: {e}", dest.display()))),
        };
        if let Err(e) = std::io::Write::write_all(&mut file, &bytes) {
            drop(file);
            let _ = std::fs::remove_file(&dest);
            return Err(seed_error(format!("cannot write {}: {e}", dest.display())));
        }
        written.push(dest);
    }

    Ok(written)
}

fn seed_error(message: String) -> ConfigError {
    ConfigError::DefaultsCopyError { message }
}

/// Loads config relative to the current working directory, copying default
/// files first.
pub fn load_config() -> Result<Config, ConfigError> {
    let cwd = std::env::current_dir().map_err(|_| ConfigError::FileNotFound {
        path: PathBuf::from("."),
    })?;
    ensure_config_files(&cwd)?;
    load_config_from(&cwd)
}

/// Per-user data location for the document store, falling back to the
/// working directory when no home directory can be determined.
pub fn default_db_path() -> PathBuf {
    directories::ProjectDirs::from("id", "genie", "genie")
        .map(|dirs| dirs.data_dir().join("genie.db"))
        .unwrap_or_else(|| PathBuf::from("genie.db"))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
        path: path.to_path_buf(),
    })
}

fn parse_file<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let text = read_file(path)?;
    toml::from_str(&text).map_err(|e| ConfigError::ParseError {
        path: path.to_path_buf(),
        source: e,
    })
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate(config: &Config) -> Result<(), ConfigError> {
    config.estimation.validate()?;

    if config.llm.model.trim().is_empty() {
        return Err(invalid("llm.model", "must not be empty"));
    }
    if config.llm.max_retries == 0 {
        return Err(invalid("llm.max_retries", "must be > 0"));
    }
    if config.ingest.max_input_chars == 0 {
        return Err(invalid("ingest.max_input_chars", "must be > 0"));
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
