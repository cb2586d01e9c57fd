use tracing::debug;

use crate::docx::runs::{Run, RunFormat};

pub const SHORT_REPLACEMENT_CHARS: usize = 50;
pub const SHORT_ORIGINAL_CHARS: usize = 10;

/// Thresholds for the single-format shortcut.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FormatPolicy {
    pub short_replacement_chars: usize,
    pub short_original_chars: usize,
}

impl Default for FormatPolicy {
    fn default() -> Self {
        Self {
            short_replacement_chars: SHORT_REPLACEMENT_CHARS,
            short_original_chars: SHORT_ORIGINAL_CHARS,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Strategy {
    Cleared,
    Unformatted,
    SingleRun,
    Dominant,
    Proportional,
}

pub fn strategy_for(original: &[Run], replacement: &str, policy: &FormatPolicy) -> Strategy {
    if replacement.trim().is_empty() {
        return Strategy::Cleared;
    }
    if original.is_empty() {
        return Strategy::Unformatted;
    }
    if original.len() == 1 {
        return Strategy::SingleRun;
    }
    let original_len: usize = original.iter().map(|r| r.text.chars().count()).sum();
    if replacement.chars().count() <= policy.short_replacement_chars
        || original_len <= policy.short_original_chars
    {
        return Strategy::Dominant;
    }
    Strategy::Proportional
}

/// New runs for `replacement`; their texts concatenate to `replacement` exactly.
pub fn format_runs(original: &[Run], replacement: &str, policy: &FormatPolicy) -> Vec<Run> {
    let strategy = strategy_for(original, replacement, policy);
    debug!(?strategy, runs = original.len(), "formatting replacement");
    match strategy {
        Strategy::Cleared => Vec::new(),
        Strategy::Unformatted => vec![Run::new(replacement, RunFormat::default())],
        Strategy::SingleRun | Strategy::Dominant => {
            vec![Run::new(replacement, original[0].format.clone())]
        }
        Strategy::Proportional => distribute_proportionally(original, replacement),
    }
}

/// Maps each run's `[start, end)` over the original text onto the replacement by the
/// same fraction, using `floor(pos * new_len / old_len)`.
///
/// Starts are clamped to the previous emitted end, the last run always reaches the end
/// of the replacement, and runs whose segment comes out empty are dropped.
pub fn distribute_proportionally(original: &[Run], replacement: &str) -> Vec<Run> {
    let Some(first) = original.first() else {
        return vec![Run::new(replacement, RunFormat::default())];
    };
    let total: usize = original.iter().map(|r| r.text.chars().count()).sum();
    if total == 0 {
        return vec![Run::new(replacement, first.format.clone())];
    }

    let units: Vec<char> = replacement.chars().collect();
    let new_len = units.len();
    let scale = |pos: usize| pos * new_len / total;

    let mut out: Vec<Run> = Vec::new();
    let mut pos = 0usize;
    let mut last_end = 0usize;
    for (i, run) in original.iter().enumerate() {
        let len = run.text.chars().count();
        let start = scale(pos).max(last_end);
        let end = if i + 1 == original.len() {
            new_len
        } else {
            scale(pos + len).min(new_len)
        };
        pos += len;
        if start >= end {
            continue;
        }
        out.push(Run::new(
            units[start..end].iter().collect::<String>(),
            run.format.clone(),
        ));
        last_end = end;
    }

    if last_end < new_len {
        let last = original.last().unwrap_or(first);
        out.push(Run::new(
            units[last_end..].iter().collect::<String>(),
            last.format.clone(),
        ));
    }
    out
}
