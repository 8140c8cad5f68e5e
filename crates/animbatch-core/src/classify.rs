//! Looping heuristics for clip names.

use animbatch_spec::{LoopMode, LoopPolicy, LoopSource};

/// Keyword classifier. A name loops when it contains an include keyword and no
/// exclude keyword, compared case-insensitively.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopClassifier {
    include: Vec<String>,
    exclude: Vec<String>,
}

/// Why a name was classified the way it was.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopDecision {
    Excluded(String),
    Included(String),
    NoMatch,
}

impl LoopDecision {
    pub fn looping(&self) -> bool {
        matches!(self, LoopDecision::Included(_))
    }
}

impl std::fmt::Display for LoopDecision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoopDecision::Excluded(k) => write!(f, "excluded by '{}'", k),
            LoopDecision::Included(k) => write!(f, "included by '{}'", k),
            LoopDecision::NoMatch => write!(f, "no keyword matched"),
        }
    }
}

impl LoopClassifier {
    pub fn new<I, J, S, T>(include: I, exclude: J) -> Self
    where
        I: IntoIterator<Item = S>,
        J: IntoIterator<Item = T>,
        S: AsRef<str>,
        T: AsRef<str>,
    {
        fn normalize<S: AsRef<str>>(keywords: impl IntoIterator<Item = S>) -> Vec<String> {
            keywords
                .into_iter()
                .map(|k| k.as_ref().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect()
        }
        Self {
            include: normalize(include),
            exclude: normalize(exclude),
        }
    }

    pub fn from_policy(policy: &LoopPolicy) -> Self {
        Self::new(policy.include_keywords(), policy.exclude_keywords())
    }

    pub fn include(&self) -> &[String] {
        &self.include
    }

    pub fn exclude(&self) -> &[String] {
        &self.exclude
    }

    /// Exclusion wins over inclusion.
    pub fn explain(&self, name: &str) -> LoopDecision {
        let lower = name.to_lowercase();
        if let Some(k) = self.exclude.iter().find(|k| lower.contains(k.as_str())) {
            return LoopDecision::Excluded(k.clone());
        }
        if let Some(k) = self.include.iter().find(|k| lower.contains(k.as_str())) {
            return LoopDecision::Included(k.clone());
        }
        LoopDecision::NoMatch
    }

    pub fn classify(&self, name: &str) -> bool {
        self.explain(name).looping()
    }
}

impl Default for LoopClassifier {
    fn default() -> Self {
        Self::from_policy(&LoopPolicy::default())
    }
}

/// Resolves a clip's loop flag: CSV metadata, then the export set's mode, then
/// the keyword heuristic.
pub fn resolve_loop(
    metadata: Option<bool>,
    set_mode: LoopMode,
    classifier: &LoopClassifier,
    name: &str,
) -> (bool, LoopSource) {
    if let Some(looping) = metadata {
        return (looping, LoopSource::Metadata);
    }
    if let Some(looping) = set_mode.forced() {
        return (looping, LoopSource::ExportSet);
    }
    (classifier.classify(name), LoopSource::Heuristic)
}

#[cfg(test)]
mod tests {
    use super::*;
    use animbatch_spec::LoopPreset;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_simple_preset() {
        let c = LoopClassifier::default();
        assert!(c.classify("A_Walk_F"));
        assert!(c.classify("a_IDLE_breathe"));
        assert!(!c.classify("A_Walk_To_Run"));
        assert!(!c.classify("A_Jump_Walk"));
        assert!(!c.classify("A_Attack_01"));
    }

    #[test]
    fn test_strict_preset() {
        let c = LoopClassifier::from_policy(&LoopPolicy::preset(LoopPreset::Strict));
        assert!(c.classify("A_Crouch_Idle"));
        assert!(c.classify("A_Strafe_L"));
        assert!(!c.classify("A_Run_End"));
        assert!(!c.classify("A_Idle_ReturnTo_Stand"));
    }

    #[test]
    fn test_explain() {
        let c = LoopClassifier::new(["walk"], ["_to_"]);
        assert_eq!(c.explain("walk_to_run"), LoopDecision::Excluded("_to_".to_string()));
        assert_eq!(c.explain("Walk"), LoopDecision::Included("walk".to_string()));
        assert_eq!(c.explain("Dance"), LoopDecision::NoMatch);
        assert_eq!(c.explain("Dance").to_string(), "no keyword matched");
    }

    #[test]
    fn test_empty_keywords_ignored() {
        let c = LoopClassifier::new(["", "walk"], [""]);
        assert_eq!(c.include(), ["walk".to_string()]);
        assert!(c.exclude().is_empty());
        assert!(!c.classify("anything"));
    }

    #[test]
    fn test_resolve_loop_precedence() {
        let c = LoopClassifier::default();
        assert_eq!(
            resolve_loop(Some(false), LoopMode::Always, &c, "A_Walk"),
            (false, LoopSource::Metadata)
        );
        assert_eq!(
            resolve_loop(None, LoopMode::Never, &c, "A_Walk"),
            (false, LoopSource::ExportSet)
        );
        assert_eq!(
            resolve_loop(None, LoopMode::Always, &c, "A_Jump"),
            (true, LoopSource::ExportSet)
        );
        assert_eq!(
            resolve_loop(None, LoopMode::Auto, &c, "A_Walk"),
            (true, LoopSource::Heuristic)
        );
    }
}
