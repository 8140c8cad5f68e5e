//! Loop keyword policies.
//!
//! Two keyword sets are in circulation for deciding whether a clip loops. Neither is
//! authoritative, so both are exposed as presets and either set can be replaced
//! from configuration.

use serde::{Deserialize, Serialize};

/// Exclusion keywords of the simple policy.
pub const SIMPLE_EXCLUDE: &[&str] = &["_to_", "jump"];

/// Inclusion keywords of the simple policy.
pub const SIMPLE_INCLUDE: &[&str] = &["walk", "sprint", "shuffle", "turn", "idle"];

/// Exclusion keywords of the strict policy.
pub const STRICT_EXCLUDE: &[&str] = &["hit", "begin", "end", "_to", "_returnto", "jump", "attack"];

/// Inclusion keywords of the strict policy.
pub const STRICT_INCLUDE: &[&str] = &["idle", "crouch", "walk", "strafe", "fall", "run", "loop", "turn"];

/// Built-in keyword set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopPreset {
    /// Locomotion-oriented sets (`_to_`/`jump` excluded).
    #[default]
    Simple,
    /// Combat-aware sets that also exclude hits, attacks and transitions.
    Strict,
}

impl LoopPreset {
    /// Returns the preset name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            LoopPreset::Simple => "simple",
            LoopPreset::Strict => "strict",
        }
    }

    /// Returns the preset's inclusion keywords.
    pub fn include(&self) -> &'static [&'static str] {
        match self {
            LoopPreset::Simple => SIMPLE_INCLUDE,
            LoopPreset::Strict => STRICT_INCLUDE,
        }
    }

    /// Returns the preset's exclusion keywords.
    pub fn exclude(&self) -> &'static [&'static str] {
        match self {
            LoopPreset::Simple => SIMPLE_EXCLUDE,
            LoopPreset::Strict => STRICT_EXCLUDE,
        }
    }
}

impl std::str::FromStr for LoopPreset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "simple" => Ok(LoopPreset::Simple),
            "strict" => Ok(LoopPreset::Strict),
            other => Err(format!("unknown loop preset '{}'", other)),
        }
    }
}

/// Loop policy: a preset whose keyword sets may be replaced individually.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoopPolicy {
    /// Preset supplying default keyword sets.
    #[serde(default)]
    pub preset: LoopPreset,
    /// Replaces the preset's inclusion keywords when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include: Option<Vec<String>>,
    /// Replaces the preset's exclusion keywords when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclude: Option<Vec<String>>,
}

impl LoopPolicy {
    /// Creates a policy from a preset with no overrides.
    pub fn preset(preset: LoopPreset) -> Self {
        Self {
            preset,
            include: None,
            exclude: None,
        }
    }

    /// Replaces the inclusion keywords.
    pub fn with_include<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.include = Some(keywords.into_iter().map(Into::into).collect());
        self
    }

    /// Replaces the exclusion keywords.
    pub fn with_exclude<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude = Some(keywords.into_iter().map(Into::into).collect());
        self
    }

    /// Returns the effective inclusion keywords.
    pub fn include_keywords(&self) -> Vec<String> {
        match self.include {
            Some(ref keywords) => keywords.clone(),
            None => self.preset.include().iter().map(|k| k.to_string()).collect(),
        }
    }

    /// Returns the effective exclusion keywords.
    pub fn exclude_keywords(&self) -> Vec<String> {
        match self.exclude {
            Some(ref keywords) => keywords.clone(),
            None => self.preset.exclude().iter().map(|k| k.to_string()).collect(),
        }
    }
}

/// Per-export-set loop behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopMode {
    /// Decide per clip with the keyword classifier.
    #[default]
    Auto,
    /// Every clip in the set loops.
    Always,
    /// No clip in the set loops.
    Never,
}

impl LoopMode {
    /// Returns the forced loop flag, or `None` for [`LoopMode::Auto`].
    pub fn forced(&self) -> Option<bool> {
        match self {
            LoopMode::Auto => None,
            LoopMode::Always => Some(true),
            LoopMode::Never => Some(false),
        }
    }
}
