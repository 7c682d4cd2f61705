//! Property-based tests for candidate selection.
//!
//! Verified for arbitrary candidate sets:
//! 1. **Never worse**: the chosen candidate is strictly smaller than the original
//! 2. **Gate respect**: a failing candidate is never chosen
//! 3. **Optimality**: no eligible candidate is smaller than the chosen one
//! 4. **Determinism**: selecting twice gives the same answer
//! 5. **Lazy agreement**: lazy evaluation picks what eager evaluation picks
//!
//! ```bash
//! PROPTEST_CASES=10000 cargo test -p pdf-squeeze --test selection_properties
//! ```

use proptest::prelude::*;

use pdf_squeeze::gate::{AggregationMode, GateCheck, QualityGateResult};
use pdf_squeeze::metrics::MetricKind;
use pdf_squeeze::select::{Candidate, Selection, select, select_lazy};

// =============================================================================
// Test Strategies
// =============================================================================

fn mode() -> impl Strategy<Value = AggregationMode> {
    prop_oneof![
        Just(AggregationMode::Majority),
        Just(AggregationMode::Strict),
        Just(AggregationMode::Permissive),
    ]
}

/// Per-gate outcomes for up to three gates; `None` means ungated.
fn gate_results() -> impl Strategy<Value = Option<Vec<bool>>> {
    prop::option::of(prop::collection::vec(any::<bool>(), 0..=3))
}

fn candidate_specs() -> impl Strategy<Value = Vec<(u64, Option<Vec<bool>>)>> {
    prop::collection::vec((1_u64..2_000, gate_results()), 0..8)
}

fn gate(results: &[bool], mode: AggregationMode) -> QualityGateResult {
    let checks = results
        .iter()
        .zip(MetricKind::ALL)
        .map(|(&passed, metric)| GateCheck {
            metric,
            value: 0.0,
            threshold: 0.0,
            passed,
        })
        .collect();
    QualityGateResult::from_checks(checks, Vec::new(), mode)
}

fn build(specs: &[(u64, Option<Vec<bool>>)], mode: AggregationMode) -> Vec<Candidate> {
    specs
        .iter()
        .enumerate()
        .map(|(i, (size, results))| {
            let c = Candidate::new(format!("s{i}"), format!("/tmp/s{i}.pdf"), *size);
            match results {
                Some(r) => c.with_gate(gate(r, mode)),
                None => c,
            }
        })
        .collect()
}

// =============================================================================
// Properties
// =============================================================================

proptest! {
    /// The chosen candidate is smaller than the original and passed its gate.
    #[test]
    fn chosen_is_smaller_and_passing(
        original in 1_u64..2_000,
        specs in candidate_specs(),
        mode in mode(),
    ) {
        let candidates = build(&specs, mode);
        if let Selection::Chosen(i) = select(original, &candidates) {
            prop_assert!(candidates[i].size < original);
            prop_assert!(candidates[i].passes_gate());
        }
    }

    /// No eligible candidate is smaller than the chosen one, and the
    /// original is retained only when nothing is eligible.
    #[test]
    fn chosen_is_smallest_eligible(
        original in 1_u64..2_000,
        specs in candidate_specs(),
        mode in mode(),
    ) {
        let candidates = build(&specs, mode);
        let eligible: Vec<&Candidate> = candidates
            .iter()
            .filter(|c| c.size < original && c.passes_gate())
            .collect();

        match select(original, &candidates) {
            Selection::Chosen(i) => {
                prop_assert!(eligible.iter().all(|c| c.size >= candidates[i].size));
            }
            Selection::OriginalRetained => prop_assert!(eligible.is_empty()),
        }
    }

    /// Under strict aggregation a candidate with any failed gate is never chosen.
    #[test]
    fn strict_never_picks_a_failure(
        original in 1_u64..2_000,
        specs in candidate_specs(),
    ) {
        let candidates = build(&specs, AggregationMode::Strict);
        if let Selection::Chosen(i) = select(original, &candidates) {
            let gate = candidates[i].gate.as_ref();
            prop_assert!(gate.is_none_or(|g| g.gates_failed().is_empty()));
        }
    }

    /// Selection is a pure function of its inputs.
    #[test]
    fn selection_is_deterministic(
        original in 1_u64..2_000,
        specs in candidate_specs(),
        mode in mode(),
    ) {
        let candidates = build(&specs, mode);
        prop_assert_eq!(select(original, &candidates), select(original, &candidates));
    }

    /// Evaluating gates lazily gives the same choice as evaluating them all.
    #[test]
    fn lazy_matches_eager(
        original in 1_u64..2_000,
        specs in candidate_specs(),
        mode in mode(),
    ) {
        let gated = build(&specs, mode);
        let eager = select(original, &gated);

        let mut ungated: Vec<Candidate> = gated
            .iter()
            .map(|c| Candidate::new(c.method.clone(), c.path.clone(), c.size))
            .collect();
        let lazy = select_lazy(original, &mut ungated, |c| {
            let idx = gated.iter().position(|g| g.method == c.method).unwrap();
            gated[idx].gate.clone().unwrap_or_else(|| gate(&[], mode))
        });

        prop_assert_eq!(eager, lazy);
    }

    /// With no candidates the original is always retained.
    #[test]
    fn empty_retains_original(original in 0_u64..u64::MAX) {
        prop_assert!(select(original, &[]).is_original_retained());
    }
}
