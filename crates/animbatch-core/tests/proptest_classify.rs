//! Property-based tests for loop classification.
//!
//! ```bash
//! cargo test -p animbatch-core --test proptest_classify
//! ```

use proptest::prelude::*;

use animbatch_core::{resolve_loop, LoopClassifier};
use animbatch_spec::{LoopMode, LoopPolicy, LoopPreset, LoopSource};

fn any_preset() -> impl Strategy<Value = LoopPreset> {
    prop_oneof![Just(LoopPreset::Simple), Just(LoopPreset::Strict)]
}

fn any_mode() -> impl Strategy<Value = LoopMode> {
    prop_oneof![Just(LoopMode::Auto), Just(LoopMode::Always), Just(LoopMode::Never)]
}

proptest! {
    /// An exclude keyword anywhere in the name wins over any include keyword.
    #[test]
    fn exclusion_takes_precedence(
        preset in any_preset(),
        prefix in "[A-Za-z_]{0,8}",
        suffix in "[A-Za-z_]{0,8}",
        pick in any::<prop::sample::Index>(),
        include_pick in any::<prop::sample::Index>(),
        upper in any::<bool>(),
    ) {
        let exclude = preset.exclude();
        let include = preset.include();
        let keyword = exclude[pick.index(exclude.len())];
        let extra = include[include_pick.index(include.len())];
        let mut name = format!("{}{}{}{}", prefix, extra, keyword, suffix);
        if upper {
            name = name.to_uppercase();
        }
        let classifier = LoopClassifier::from_policy(&LoopPolicy::preset(preset));
        prop_assert!(!classifier.classify(&name), "{} should not loop", name);
    }

    /// A name with an include keyword and no exclude keyword loops.
    #[test]
    fn inclusion_without_exclusion_loops(
        preset in any_preset(),
        digits in "[0-9]{0,4}",
        pick in any::<prop::sample::Index>(),
    ) {
        let include = preset.include();
        let name = format!("A_{}_{}", include[pick.index(include.len())], digits);
        let classifier = LoopClassifier::from_policy(&LoopPolicy::preset(preset));
        prop_assume!(!classifier.exclude().iter().any(|k| name.to_lowercase().contains(k.as_str())));
        prop_assert!(classifier.classify(&name));
    }

    /// Names matching no keyword never loop.
    #[test]
    fn unmatched_names_do_not_loop(name in "[0-9qxz]{1,16}") {
        let classifier = LoopClassifier::default();
        prop_assert!(!classifier.classify(&name));
    }

    /// Metadata beats the export set, which beats the heuristic.
    #[test]
    fn loop_resolution_order(
        metadata in proptest::option::of(any::<bool>()),
        mode in any_mode(),
        name in "[A-Za-z_]{1,20}",
    ) {
        let classifier = LoopClassifier::default();
        let (looping, source) = resolve_loop(metadata, mode, &classifier, &name);
        match (metadata, mode.forced()) {
            (Some(m), _) => {
                prop_assert_eq!(looping, m);
                prop_assert_eq!(source, LoopSource::Metadata);
            }
            (None, Some(forced)) => {
                prop_assert_eq!(looping, forced);
                prop_assert_eq!(source, LoopSource::ExportSet);
            }
            (None, None) => {
                prop_assert_eq!(looping, classifier.classify(&name));
                prop_assert_eq!(source, LoopSource::Heuristic);
            }
        }
    }
}
