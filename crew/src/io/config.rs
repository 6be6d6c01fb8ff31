//! Crew configuration stored under `.crew/config.toml`.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::core::router::DEFAULT_CODING_KEYWORDS;
use crate::core::verdict::VerdictMode;

pub const DEFAULT_CONFIG_PATH: &str = ".crew/config.toml";

/// Program names the executor accepts by default.
pub const DEFAULT_ALLOW_LIST: [&str; 9] = [
    "ls", "echo", "pwd", "cat", "git", "mkdir", "python", "touch", "rm",
];

/// Crew configuration (TOML).
///
/// Intended to be edited by humans. Missing fields default to the values the
/// workflow was tuned with. Read-only once a process has started.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CrewConfig {
    pub workflow: WorkflowConfig,
    pub router: RouterConfig,
    pub reviewer: ReviewerConfig,
    pub executor: ExecutorConfig,
    pub agent: AgentConfig,
    pub search: SearchConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct WorkflowConfig {
    /// Ceiling on collaborator invocations per run (plan, code, review, execute).
    pub max_node_executions: u32,

    /// Directory holding one `<run_id>.jsonl` event log per run.
    pub events_dir: PathBuf,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            max_node_executions: 100,
            events_dir: PathBuf::from(".crew/events"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RouterConfig {
    /// Case-insensitive substrings that send a step to the coder.
    pub keywords: Vec<String>,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            keywords: DEFAULT_CODING_KEYWORDS.iter().map(|k| k.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ReviewerConfig {
    pub verdict: VerdictMode,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ExecutorConfig {
    /// First token of a command must be one of these.
    pub allow_list: Vec<String>,

    /// Wall-clock limit per command, in seconds.
    pub timeout_secs: u64,

    /// Truncate stdout and stderr beyond this many characters each.
    pub output_limit_chars: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            allow_list: DEFAULT_ALLOW_LIST.iter().map(|p| p.to_string()).collect(),
            timeout_secs: 30,
            output_limit_chars: 3000,
        }
    }
}

impl ExecutorConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AgentConfig {
    /// Agent CLI invocation; the prompt is written to its stdin.
    pub command: Vec<String>,

    pub timeout_secs: u64,

    /// Discard agent stdout/stderr beyond this many bytes.
    pub output_limit_bytes: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            command: vec!["codex".to_string(), "exec".to_string(), "-".to_string()],
            timeout_secs: 5 * 60,
            output_limit_bytes: 200_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SearchConfig {
    /// Search CLI invocation; the query is appended as the last argument.
    /// Empty disables search.
    pub command: Vec<String>,

    pub max_results: usize,

    pub timeout_secs: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            command: Vec::new(),
            max_results: 3,
            timeout_secs: 30,
        }
    }
}

impl CrewConfig {
    pub fn validate(&self) -> Result<()> {
        if self.workflow.max_node_executions == 0 {
            return Err(anyhow!("workflow.max_node_executions must be > 0"));
        }
        if self.executor.allow_list.is_empty() {
            return Err(anyhow!("executor.allow_list must be a non-empty array"));
        }
        if self.executor.allow_list.iter().any(|p| p.trim().is_empty()) {
            return Err(anyhow!("executor.allow_list entries must be non-empty"));
        }
        if self.executor.timeout_secs == 0 {
            return Err(anyhow!("executor.timeout_secs must be > 0"));
        }
        if self.executor.output_limit_chars == 0 {
            return Err(anyhow!("executor.output_limit_chars must be > 0"));
        }
        if self.agent.command.is_empty() || self.agent.command[0].trim().is_empty() {
            return Err(anyhow!("agent.command must be a non-empty array"));
        }
        if self.agent.timeout_secs == 0 {
            return Err(anyhow!("agent.timeout_secs must be > 0"));
        }
        if self.agent.output_limit_bytes == 0 {
            return Err(anyhow!("agent.output_limit_bytes must be > 0"));
        }
        if !self.search.command.is_empty() && self.search.command[0].trim().is_empty() {
            return Err(anyhow!("search.command must start with a program name"));
        }
        if self.search.timeout_secs == 0 {
            return Err(anyhow!("search.timeout_secs must be > 0"));
        }
        Ok(())
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `CrewConfig::default()`.
pub fn load_config(path: &Path) -> Result<CrewConfig> {
    if !path.exists() {
        let cfg = CrewConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: CrewConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("invalid config {}", path.display()))?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &CrewConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("config path missing parent {}", path.display()))?;
    if !parent.as_os_str().is_empty() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
    }
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_config(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(cfg, CrewConfig::default());
    }

    #[test]
    fn defaults_match_executor_contract() {
        let cfg = CrewConfig::default();
        assert_eq!(
            cfg.executor.allow_list,
            ["ls", "echo", "pwd", "cat", "git", "mkdir", "python", "touch", "rm"]
        );
        assert_eq!(cfg.executor.timeout(), Duration::from_secs(30));
        assert_eq!(cfg.executor.output_limit_chars, 3000);
        assert_eq!(cfg.reviewer.verdict, VerdictMode::Substring);
    }

    #[test]
    fn write_then_load_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join(".crew/config.toml");
        let cfg = CrewConfig::default();
        write_config(&path, &cfg).expect("write");
        let loaded = load_config(&path).expect("load");
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("config.toml");
        fs::write(
            &path,
            "[workflow]\nmax_node_executions = 7\n\n[reviewer]\nverdict = \"strict\"\n",
        )
        .expect("write");
        let cfg = load_config(&path).expect("load");
        assert_eq!(cfg.workflow.max_node_executions, 7);
        assert_eq!(cfg.workflow.events_dir, PathBuf::from(".crew/events"));
        assert_eq!(cfg.reviewer.verdict, VerdictMode::Strict);
        assert_eq!(cfg.executor, ExecutorConfig::default());
    }

    #[test]
    fn rejects_zero_ceiling() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("config.toml");
        fs::write(&path, "[workflow]\nmax_node_executions = 0\n").expect("write");
        let err = load_config(&path).unwrap_err();
        assert!(format!("{err:#}").contains("max_node_executions"));
    }

    #[test]
    fn rejects_blank_allow_list_entry() {
        let mut cfg = CrewConfig::default();
        cfg.executor.allow_list.push("  ".to_string());
        assert!(cfg.validate().is_err());
    }
}
