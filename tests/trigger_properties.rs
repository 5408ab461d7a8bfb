// tests/trigger_properties.rs

use std::collections::HashSet;

use ghost::trigger::{EventKind, Trigger, dedupe_triggers, format_triggers};
use proptest::prelude::*;

fn trigger_strategy() -> impl Strategy<Value = Trigger> {
    let kinds = prop::sample::select(EventKind::FILESYSTEM.to_vec());
    let paths = prop::sample::select(vec!["a.txt", "b.txt", "src/c.rs", "d"]);
    (kinds, paths).prop_map(|(kind, path)| Trigger::new(kind, path))
}

proptest! {
    #[test]
    fn dedupe_keeps_each_pair_once_in_first_seen_order(
        triggers in proptest::collection::vec(trigger_strategy(), 0..40)
    ) {
        let out = dedupe_triggers(triggers.clone());

        let unique: HashSet<_> = out.iter().cloned().collect();
        prop_assert_eq!(unique.len(), out.len());

        let input_unique: HashSet<_> = triggers.iter().cloned().collect();
        prop_assert_eq!(unique, input_unique);

        // Order follows first occurrence in the input.
        let first_seen: Vec<usize> = out
            .iter()
            .map(|t| triggers.iter().position(|x| x == t).unwrap_or(usize::MAX))
            .collect();
        prop_assert!(first_seen.windows(2).all(|w| w[0] < w[1]));

        prop_assert_eq!(dedupe_triggers(out.clone()), out);
    }

    #[test]
    fn summary_never_lists_more_than_four_labels(
        triggers in proptest::collection::vec(trigger_strategy(), 1..40)
    ) {
        let summary = format_triggers(&triggers);
        let listed = summary.split(" … ").next().unwrap_or_default();
        prop_assert!(listed.split(", ").count() <= 4);
    }
}
