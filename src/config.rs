//! Configuration for Steward.
//!
//! Loaded once at startup from YAML and passed explicitly to the scheduler,
//! engine and intake. Every section has defaults.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, StewardError};
use crate::policy::{Classification, SkillDescriptor};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub log_level: Option<String>,
    pub vault: VaultConfig,
    pub scheduler: SchedulerConfig,
    pub priority: PriorityConfig,
    pub tiers: TierConfig,
    pub skills: SkillConfig,
    pub executor: ExecutorConfig,
    pub intake: IntakeConfig,
    pub memory: MemoryConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: Some("info".to_string()),
            vault: VaultConfig::default(),
            scheduler: SchedulerConfig::default(),
            priority: PriorityConfig::default(),
            tiers: TierConfig::default(),
            skills: SkillConfig::default(),
            executor: ExecutorConfig::default(),
            intake: IntakeConfig::default(),
            memory: MemoryConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VaultConfig {
    pub root: PathBuf,
    pub inbox_dir: String,
    pub pending_dir: String,
    pub done_dir: String,
    pub logs_dir: String,
    pub skills_dir: String,
    /// Pattern, failure and decision notes plus the reflection journal
    pub memory_dir: String,
    pub handbook: String,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            inbox_dir: "inbox".to_string(),
            pending_dir: "pending".to_string(),
            done_dir: "done".to_string(),
            logs_dir: "logs".to_string(),
            skills_dir: "skills".to_string(),
            memory_dir: "memory".to_string(),
            handbook: "HANDBOOK.md".to_string(),
        }
    }
}

impl VaultConfig {
    /// Same layout rooted somewhere else
    pub fn at(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }

    pub fn inbox_path(&self) -> PathBuf {
        self.root.join(&self.inbox_dir)
    }

    pub fn pending_path(&self) -> PathBuf {
        self.root.join(&self.pending_dir)
    }

    pub fn done_path(&self) -> PathBuf {
        self.root.join(&self.done_dir)
    }

    pub fn logs_path(&self) -> PathBuf {
        self.root.join(&self.logs_dir)
    }

    pub fn skills_path(&self) -> PathBuf {
        self.root.join(&self.skills_dir)
    }

    pub fn memory_path(&self) -> PathBuf {
        self.root.join(&self.memory_dir)
    }

    pub fn handbook_path(&self) -> PathBuf {
        self.root.join(&self.handbook)
    }

    /// Every directory the vault needs
    pub fn directories(&self) -> Vec<PathBuf> {
        vec![
            self.inbox_path(),
            self.pending_path(),
            self.done_path(),
            self.logs_path(),
            self.skills_path(),
            self.memory_path(),
        ]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub poll_interval_ms: u64,
    pub max_cycles: u32,
    pub max_retries: u32,
    pub cycle_cooldown_ms: u64,
    pub self_check_every: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 5000,
            max_cycles: 10,
            max_retries: 2,
            cycle_cooldown_ms: 2000,
            self_check_every: 25,
        }
    }
}

impl SchedulerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn cycle_cooldown(&self) -> Duration {
        Duration::from_millis(self.cycle_cooldown_ms)
    }

    /// Attempts per cycle: the first try plus every retry
    pub fn max_attempts(&self) -> u32 {
        self.max_retries + 1
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PriorityConfig {
    /// Label -> rank, lower runs first
    pub order: BTreeMap<String, u32>,
    /// Label assumed when a task has none, or an unknown one
    pub default_label: String,
}

impl Default for PriorityConfig {
    fn default() -> Self {
        let order = [("P0", 0), ("P1", 1), ("P2", 2), ("P3", 3)]
            .into_iter()
            .map(|(label, rank)| (label.to_string(), rank))
            .collect();
        Self {
            order,
            default_label: "P2".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TierConfig {
    /// External-facing or financial actions
    pub tier3_keywords: Vec<String>,
    /// System-modifying actions
    pub tier2_keywords: Vec<String>,
    /// Classifications that are planning or skill-definition artifacts
    pub tier1_classifications: Vec<String>,
}

impl Default for TierConfig {
    fn default() -> Self {
        fn owned(words: &[&str]) -> Vec<String> {
            words.iter().map(|w| w.to_string()).collect()
        }
        Self {
            tier3_keywords: owned(&[
                "send email",
                "send message",
                "slack",
                "webhook",
                "api call",
                "payment",
                "transfer",
                "invoice",
                "financial",
                "publish",
                "external",
                "notify client",
                "sms",
                "push notification",
            ]),
            tier2_keywords: owned(&[
                "install",
                "deploy",
                "execute code",
                "modify config",
                "run script",
                "change environment",
                "alter system",
                "modify production",
            ]),
            tier1_classifications: owned(&["plan", "skill"]),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SkillConfig {
    pub registry: BTreeMap<Classification, SkillDescriptor>,
    pub default: SkillDescriptor,
}

impl Default for SkillConfig {
    fn default() -> Self {
        let executor = SkillDescriptor::task_executor();
        let registry = [
            Classification::Task,
            Classification::Code,
            Classification::Review,
            Classification::Complex,
            Classification::Research,
            Classification::Docs,
            Classification::Test,
        ]
        .into_iter()
        .map(|class| (class, executor.clone()))
        .collect();
        Self {
            registry,
            default: executor,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutorMode {
    /// Anthropic when `ANTHROPIC_API_KEY` is set, local otherwise
    Auto,
    Anthropic,
    Local,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    pub mode: ExecutorMode,
    pub model: String,
    pub max_tokens: u32,
    pub timeout_ms: u64,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            mode: ExecutorMode::Auto,
            model: "claude-sonnet-4-20250514".to_string(),
            max_tokens: 4096,
            timeout_ms: 300000,
        }
    }
}

/// Keywords that assign one priority label during triage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriorityKeywords {
    pub label: String,
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IntakeConfig {
    pub poll_interval_ms: u64,
    pub max_file_bytes: u64,
    pub allowed_extensions: Vec<String>,
    /// Checked in order; the first label with a matching keyword wins
    pub priority_keywords: Vec<PriorityKeywords>,
}

impl Default for IntakeConfig {
    fn default() -> Self {
        fn rule(label: &str, words: &[&str]) -> PriorityKeywords {
            PriorityKeywords {
                label: label.to_string(),
                keywords: words.iter().map(|w| w.to_string()).collect(),
            }
        }
        Self {
            poll_interval_ms: 3000,
            max_file_bytes: 1_048_576,
            allowed_extensions: ["md", "txt", "json", "csv", "yaml", "yml"]
                .iter()
                .map(|e| e.to_string())
                .collect(),
            priority_keywords: vec![
                rule("P0", &["urgent", "critical", "down", "broken", "outage", "emergency"]),
                rule("P1", &["important", "deadline", "asap", "blocker", "high priority"]),
                rule("P2", &["update", "add", "create", "implement", "build", "feature"]),
                rule("P3", &["nice to have", "backlog", "low", "someday", "optional"]),
            ],
        }
    }
}

impl IntakeConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Memory recall before execution and reflection journaling after completion
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    pub recall: bool,
    pub reflect: bool,
    /// Characters kept from each recalled description
    pub excerpt_chars: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            recall: true,
            reflect: true,
            excerpt_chars: 100,
        }
    }
}

impl Config {
    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, it must load
        if let Some(path) = config_path {
            return Self::load_from_file(path);
        }

        // Try primary location: ~/.config/<project>/<project>.yml
        let project_name = env!("CARGO_PKG_NAME");
        if let Some(config_dir) = dirs::config_dir() {
            let primary_config = config_dir.join(project_name).join(format!("{}.yml", project_name));
            if primary_config.exists() {
                match Self::load_from_file(&primary_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        log::warn!("Failed to load config from {}: {}", primary_config.display(), e);
                    }
                }
            }
        }

        // Try fallback location: ./<project>.yml
        let fallback_config = PathBuf::from(format!("{}.yml", project_name));
        if fallback_config.exists() {
            match Self::load_from_file(&fallback_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    log::warn!("Failed to load config from {}: {}", fallback_config.display(), e);
                }
            }
        }

        // No config file found, use defaults
        log::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)?;
        let config = Self::from_yaml(&content)?;
        log::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }

    /// Parse and validate a YAML document
    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the scheduler cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.scheduler.max_cycles == 0 {
            return Err(StewardError::Config("scheduler.max_cycles must be at least 1".to_string()));
        }
        if !self.priority.order.contains_key(&self.priority.default_label) {
            return Err(StewardError::Config(format!(
                "priority.default_label {} is not in priority.order",
                self.priority.default_label
            )));
        }
        Ok(())
    }
}
