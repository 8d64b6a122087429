// Bisection scanner
//
// Finds the first sample of every label run inside an interval whose two
// endpoint labels are already known, sampling `mid` and `mid + 1` at each
// level. Halves are resolved left to right on the same cursor.

use crate::error::ScanError;
use crate::pipeline::cursor::{probe, SampleCursor};
use crate::pipeline::types::{Interval, LabeledSample, ScanState};

/// The four boundary samples of two adjacent, already scanned halves,
/// in position order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    /// Left boundary of the left half
    LL,
    /// Right boundary of the left half
    LR,
    /// Left boundary of the right half
    RL,
    /// Right boundary of the right half
    RR,
}

/// How two halves combine: which interior boundaries start a run nobody has
/// recorded yet, and which samples face outward. The outward left is always
/// `LL`; the outward right is the first known sample of the last run, which
/// the caller decides about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergePlan {
    pub emit: &'static [Slot],
    pub outward_left: Slot,
    pub outward_right: Slot,
}

impl MergePlan {
    const fn new(emit: &'static [Slot], outward_right: Slot) -> Self {
        Self {
            emit,
            outward_left: Slot::LL,
            outward_right,
        }
    }
}

/// Merge table keyed on the equality of consecutive boundary labels.
pub fn merge_plan(ll: &str, lr: &str, rl: &str, rr: &str) -> MergePlan {
    use Slot::*;
    match (ll == lr, lr == rl, rl == rr) {
        // one run across both halves
        (true, true, true) => MergePlan::new(&[], LL),
        // last run starts at RR
        (true, true, false) => MergePlan::new(&[], RR),
        // LR..RL is a run of its own
        (false, true, false) => MergePlan::new(&[LR], RR),
        // LR starts the last run
        (false, true, true) => MergePlan::new(&[], LR),
        (false, false, true) => MergePlan::new(&[LR], RL),
        (true, false, true) => MergePlan::new(&[], RL),
        (true, false, false) => MergePlan::new(&[RL], RR),
        (false, false, false) => MergePlan::new(&[LR, RL], RR),
    }
}

/// Result of scanning one interval
#[derive(Debug, Clone)]
pub struct ScanOutcome {
    pub left: LabeledSample,
    /// First known sample of the interval's last run; equals `left` when the
    /// interval holds a single run
    pub right: LabeledSample,
    /// Run starts strictly between `left` and `right`, in position order
    pub transitions: Vec<LabeledSample>,
}

impl ScanOutcome {
    fn single_run(sample: LabeledSample) -> Self {
        Self {
            left: sample.clone(),
            right: sample,
            transitions: Vec::new(),
        }
    }

    fn unresolved(left: LabeledSample, right: LabeledSample) -> Self {
        Self {
            left,
            right,
            transitions: Vec::new(),
        }
    }
}

/// Scan `interval` for label transitions.
///
/// Once a half is `accuracy` frames wide or less it is not subdivided any
/// further and its right boundary stands in for the exact first frame of the
/// new run.
pub fn scan<C: SampleCursor + ?Sized>(
    cursor: &mut C,
    interval: &Interval,
    accuracy: usize,
    state: &ScanState,
) -> Result<ScanOutcome, ScanError> {
    let left_sample = &interval.left_sample;
    let right_sample = &interval.right_sample;
    if left_sample.same_label(right_sample) {
        return Ok(ScanOutcome::single_run(left_sample.clone()));
    }

    let (left, right) = (interval.left(), interval.right());
    let mid = left + (right - left) / 2;
    let mid_left = if mid == left {
        left_sample.clone()
    } else {
        probe(cursor, mid, state)?
    };
    let mid_right = if mid + 1 == right {
        right_sample.clone()
    } else {
        probe(cursor, mid + 1, state)?
    };

    let left_half = resolve_half(
        cursor,
        Interval::new(left_sample.clone(), mid_left),
        accuracy,
        state,
    )?;
    let right_half = resolve_half(
        cursor,
        Interval::new(mid_right, right_sample.clone()),
        accuracy,
        state,
    )?;

    Ok(merge(left_half, right_half, state))
}

fn resolve_half<C: SampleCursor + ?Sized>(
    cursor: &mut C,
    half: Interval,
    accuracy: usize,
    state: &ScanState,
) -> Result<ScanOutcome, ScanError> {
    if half.left_sample.same_label(&half.right_sample) {
        Ok(ScanOutcome::single_run(half.left_sample))
    } else if half.width() <= accuracy {
        Ok(ScanOutcome::unresolved(half.left_sample, half.right_sample))
    } else {
        scan(cursor, &half, accuracy, state)
    }
}

fn merge(left_half: ScanOutcome, right_half: ScanOutcome, state: &ScanState) -> ScanOutcome {
    let plan = merge_plan(
        &left_half.left.label,
        &left_half.right.label,
        &right_half.left.label,
        &right_half.right.label,
    );
    tracing::trace!(
        "merge [{}..{}] + [{}..{}]: {:?}",
        left_half.left.position,
        left_half.right.position,
        right_half.left.position,
        right_half.right.position,
        plan
    );

    let pick = |slot: Slot| -> LabeledSample {
        match slot {
            Slot::LL => left_half.left.clone(),
            Slot::LR => left_half.right.clone(),
            Slot::RL => right_half.left.clone(),
            Slot::RR => right_half.right.clone(),
        }
    };

    let emitted: Vec<LabeledSample> = plan.emit.iter().map(|slot| pick(*slot)).collect();
    state.record_transitions(emitted.len());
    let left = pick(plan.outward_left);
    let right = pick(plan.outward_right);

    let mut transitions = left_half.transitions;
    transitions.extend(emitted);
    transitions.extend(right_half.transitions);

    ScanOutcome {
        left,
        right,
        transitions,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::cursor::testing::SyntheticCursor;

    fn scan_all(cursor: &mut SyntheticCursor, accuracy: usize) -> ScanOutcome {
        let state = ScanState::silent();
        let last = cursor.len() - 1;
        let first = cursor.sample(0).unwrap();
        let end = cursor.sample(last).unwrap();
        scan(cursor, &Interval::new(first, end), accuracy, &state).unwrap()
    }

    fn run_starts(outcome: &ScanOutcome) -> Vec<(usize, String)> {
        let mut out = vec![(outcome.left.position, outcome.left.label.clone())];
        out.extend(
            outcome
                .transitions
                .iter()
                .map(|s| (s.position, s.label.clone())),
        );
        if outcome.right.label != outcome.left.label {
            out.push((outcome.right.position, outcome.right.label.clone()));
        }
        out
    }

    #[test]
    fn test_merge_table_covers_all_patterns() {
        use Slot::*;
        let cases = [
            (("a", "a", "a", "a"), vec![], LL),
            (("a", "a", "a", "b"), vec![], RR),
            (("a", "b", "b", "c"), vec![LR], RR),
            (("a", "b", "b", "b"), vec![], LR),
            (("a", "b", "c", "c"), vec![LR], RL),
            (("a", "a", "b", "b"), vec![], RL),
            (("a", "a", "b", "c"), vec![RL], RR),
            (("a", "b", "c", "d"), vec![LR, RL], RR),
        ];
        for ((ll, lr, rl, rr), emit, right) in cases {
            let plan = merge_plan(ll, lr, rl, rr);
            assert_eq!(plan.emit, emit.as_slice(), "{ll}{lr}{rl}{rr}");
            assert_eq!(plan.outward_left, LL);
            assert_eq!(plan.outward_right, right, "{ll}{lr}{rl}{rr}");
        }
    }

    #[test]
    fn test_equal_endpoints_short_circuit() {
        let mut cursor = SyntheticCursor::from_runs(&[(0, "Cue 1")], 1000);
        let outcome = scan_all(&mut cursor, 1);
        assert!(outcome.transitions.is_empty());
        assert_eq!(outcome.left.position, 0);
        assert_eq!(outcome.right.position, 0);
        // only the two endpoint samples
        assert_eq!(cursor.calls(), 2);
    }

    #[test]
    fn test_small_interval_exact() {
        let mut cursor = SyntheticCursor::new(
            ["", "", "Cue 1", "Cue 1", "", "Cue 2", "Cue 2"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        );
        let outcome = scan_all(&mut cursor, 1);
        assert_eq!(
            run_starts(&outcome),
            vec![
                (0, "".to_string()),
                (2, "Cue 1".to_string()),
                (4, "".to_string()),
                (5, "Cue 2".to_string()),
            ]
        );
    }

    #[test]
    fn test_adjacent_endpoints() {
        let mut cursor = SyntheticCursor::from_runs(&[(0, "Cue 1"), (1, "Cue 2")], 2);
        let outcome = scan_all(&mut cursor, 1);
        assert!(outcome.transitions.is_empty());
        assert_eq!(outcome.right.position, 1);
        assert_eq!(outcome.right.label, "Cue 2");
        // mid and mid + 1 are the endpoints themselves
        assert_eq!(cursor.calls(), 2);
    }

    #[test]
    fn test_finds_exact_boundaries_in_long_range() {
        let runs = [(0, ""), (12_345, "Cue 1"), (40_000, "Cue 2"), (77_777, "Cue 3")];
        let mut cursor = SyntheticCursor::from_runs(&runs, 100_000);
        let outcome = scan_all(&mut cursor, 1);
        let expected: Vec<(usize, String)> = runs
            .iter()
            .map(|(p, l)| (*p, l.to_string()))
            .collect();
        assert_eq!(run_starts(&outcome), expected);
        assert!(cursor.calls() < 200, "{} oracle calls", cursor.calls());
    }

    #[test]
    fn test_accuracy_bounds_boundary_error() {
        let runs = [(0, ""), (12_345, "Cue 1"), (40_000, "Cue 2"), (77_777, "Cue 3")];
        for accuracy in [4, 16, 64] {
            let mut cursor = SyntheticCursor::from_runs(&runs, 100_000);
            let outcome = scan_all(&mut cursor, accuracy);
            let found = run_starts(&outcome);
            assert_eq!(found.len(), runs.len());
            for ((pos, label), (true_pos, true_label)) in found.iter().zip(runs.iter()) {
                assert_eq!(label, true_label);
                assert!(*pos >= *true_pos && *pos - *true_pos <= accuracy);
            }
        }
    }
}
