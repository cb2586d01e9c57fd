use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::docx::format::{FormatPolicy, SHORT_ORIGINAL_CHARS, SHORT_REPLACEMENT_CHARS};
use crate::error::{Error, Result};

pub const CONFIG_FILENAME: &str = "docx-patcher.toml";
pub const CONFIG_ENV: &str = "DOCX_PATCHER_CONFIG";

const DEFAULT_OUTPUT_SUFFIX: &str = "_patched";
const DEFAULT_LOG_LEVEL: &str = "info";

#[derive(Clone, Debug, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub formatting: FormattingSection,
    #[serde(default)]
    pub output: OutputSection,
    #[serde(default)]
    pub logging: LoggingSection,
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct FormattingSection {
    /// Replacements up to this many chars take the first run's formatting.
    #[serde(default)]
    pub short_replacement_chars: Option<usize>,
    /// Originals up to this many chars take the first run's formatting.
    #[serde(default)]
    pub short_original_chars: Option<usize>,
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct OutputSection {
    /// Appended to the input stem when no output path is given.
    #[serde(default)]
    pub suffix: Option<String>,
    #[serde(default)]
    pub pretty_json: Option<bool>,
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct LoggingSection {
    /// Default `tracing` filter when `RUST_LOG` is unset.
    #[serde(default)]
    pub level: Option<String>,
}

impl AppConfig {
    pub fn format_policy(&self) -> FormatPolicy {
        FormatPolicy {
            short_replacement_chars: self
                .formatting
                .short_replacement_chars
                .unwrap_or(SHORT_REPLACEMENT_CHARS),
            short_original_chars: self
                .formatting
                .short_original_chars
                .unwrap_or(SHORT_ORIGINAL_CHARS),
        }
    }

    pub fn output_suffix(&self) -> &str {
        self.output
            .suffix
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_OUTPUT_SUFFIX)
    }

    pub fn pretty_json(&self) -> bool {
        self.output.pretty_json.unwrap_or(true)
    }

    pub fn log_level(&self) -> &str {
        self.logging.level.as_deref().unwrap_or(DEFAULT_LOG_LEVEL)
    }
}

pub fn find_file_upwards(start_dir: &Path, filename: &str, max_levels: usize) -> Option<PathBuf> {
    let mut dir = start_dir;
    for _ in 0..=max_levels {
        let candidate = dir.join(filename);
        if candidate.exists() {
            return Some(candidate);
        }
        dir = dir.parent()?;
    }
    None
}

pub fn find_default_config(workdir: &Path, filename: &str) -> Option<PathBuf> {
    if let Ok(cwd) = std::env::current_dir() {
        if let Some(p) = find_file_upwards(&cwd, filename, 8) {
            return Some(p);
        }
    }
    if let Some(p) = find_file_upwards(workdir, filename, 8) {
        return Some(p);
    }
    if let Ok(exe) = std::env::current_exe() {
        if let Some(dir) = exe.parent() {
            if let Some(p) = find_file_upwards(dir, filename, 10) {
                return Some(p);
            }
        }
    }
    None
}

pub fn load_config(path: &Path) -> Result<AppConfig> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("read {}: {e}", path.display())))?;
    parse_config(&text).map_err(|e| Error::Config(format!("{}: {e}", path.display())))
}

pub fn parse_config(text: &str) -> std::result::Result<AppConfig, toml::de::Error> {
    toml::from_str(text)
}

/// Loads the explicit config, else `$DOCX_PATCHER_CONFIG`, else the nearest
/// `docx-patcher.toml`; defaults when none exists.
pub fn resolve_config(explicit: Option<&Path>, workdir: &Path) -> Result<(AppConfig, Option<PathBuf>)> {
    if let Some(p) = explicit {
        return Ok((load_config(p)?, Some(p.to_path_buf())));
    }
    let found = std::env::var(CONFIG_ENV)
        .ok()
        .map(PathBuf::from)
        .filter(|p| p.exists())
        .or_else(|| find_default_config(workdir, CONFIG_FILENAME));
    match found {
        Some(p) => Ok((load_config(&p)?, Some(p))),
        None => Ok((AppConfig::default(), None)),
    }
}

pub fn default_config_toml() -> String {
    format!(
        r#"# docx-patcher configuration

[formatting]
# Replacements this short (in chars) keep only the first run's formatting.
short_replacement_chars = {SHORT_REPLACEMENT_CHARS}
# Paragraphs whose original text is this short do the same.
short_original_chars = {SHORT_ORIGINAL_CHARS}

[output]
suffix = "{DEFAULT_OUTPUT_SUFFIX}"
pretty_json = true

[logging]
# Overridden by RUST_LOG.
level = "{DEFAULT_LOG_LEVEL}"
"#
    )
}

pub fn init_default_config(dir: &Path, force: bool) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let cfg_path = dir.join(CONFIG_FILENAME);
    if cfg_path.exists() && !force {
        return Err(Error::Config(format!(
            "{} already exists (use --force to overwrite)",
            cfg_path.display()
        )));
    }
    std::fs::write(&cfg_path, default_config_toml())?;
    Ok(cfg_path)
}
