#![forbid(unsafe_code)]

//! Property-based invariant tests for observables and derived values.
//!
//! 1. A derived value always equals its pure function of the current source.
//! 2. Recomputations never exceed the number of distinct changes.
//! 3. Observable version counts exactly the changing writes.
//! 4. Disposing the owning scope detaches every derived subscription.

use std::cell::Cell;
use std::rc::Rc;

use proptest::prelude::*;
use reborn_reactive::{Computed, EffectScope, Observable};

// ── Strategies ──────────────────────────────────────────────────────────

/// Writes with frequent repeats so equal-value no-ops are exercised.
fn writes() -> impl Strategy<Value = Vec<i64>> {
    proptest::collection::vec(prop_oneof![-3i64..3, -1_000i64..1_000], 0..64)
}

// ═════════════════════════════════════════════════════════════════════════
// 1. Derived consistency
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn doubled_tracks_source(values in writes(), read_every in 1usize..4) {
        let a = Observable::new(1i64);
        let b = Computed::from_observable(&a, |v| v * 2);

        for (i, value) in values.iter().enumerate() {
            a.set(*value);
            if i % read_every == 0 {
                prop_assert_eq!(b.get(), a.get() * 2);
            }
        }
        prop_assert_eq!(b.get(), a.get() * 2);
    }

    #[test]
    fn two_source_sum_tracks(pairs in proptest::collection::vec((-50i64..50, -50i64..50), 0..40)) {
        let x = Observable::new(0i64);
        let y = Observable::new(0i64);
        let sum = Computed::from2(&x, &y, |a, b| a + b);

        for (a, b) in pairs {
            x.set(a);
            y.set(b);
            prop_assert_eq!(sum.get(), a + b);
        }
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 2-3. Memoization and versioning
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn recompute_count_bounded_by_changes(values in writes()) {
        let calls = Rc::new(Cell::new(0u64));
        let calls_in = Rc::clone(&calls);
        let a = Observable::new(0i64);
        let b = Computed::from_observable(&a, move |v| {
            calls_in.set(calls_in.get() + 1);
            *v
        });

        let _ = b.get();
        for value in &values {
            a.set(*value);
            let _ = b.get();
        }

        prop_assert_eq!(calls.get(), 1 + a.version());
        prop_assert_eq!(b.version(), calls.get());
    }

    #[test]
    fn version_counts_changing_writes(values in writes()) {
        let a = Observable::new(0i64);
        let mut expected = 0u64;
        let mut current = 0i64;
        for value in values {
            if value != current {
                expected += 1;
                current = value;
            }
            a.set(value);
        }
        prop_assert_eq!(a.version(), expected);
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 4. Scope disposal
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn dispose_detaches_all_derived(count in 0usize..16) {
        let source = Observable::new(0i64);
        let scope = EffectScope::new();
        let derived: Vec<Computed<i64>> = scope
            .run(|| {
                (0..count)
                    .map(|k| Computed::from_observable(&source, move |v| v + k as i64))
                    .collect()
            })
            .unwrap();

        prop_assert_eq!(source.subscriber_count(), count);
        prop_assert_eq!(scope.effect_count(), count);
        scope.dispose();
        prop_assert_eq!(source.subscriber_count(), 0);
        prop_assert_eq!(derived.len(), count);
    }
}
