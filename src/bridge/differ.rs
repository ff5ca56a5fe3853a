//! Reduces the backend's cumulative content snapshots to incremental deltas.
//!
//! The backend never signals "here is the new text"; every streamed event
//! carries the entire message generated so far. The differ compares the
//! current snapshot against everything already emitted and extracts the single
//! trailing substring the caller has not yet seen.

/// Deduplication policy, one per logical stream type.
///
/// `OverlapStrip` is used for the SSE run path: snapshots arrive in order and
/// a non-prefix snapshot is resolved by suffix/prefix overlap before being
/// treated as a reset. `FragmentDiscard` additionally drops snapshots shorter
/// than 80% of what was already seen, guarding raw-event consumers against
/// out-of-order delivery of an earlier, shorter snapshot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DedupPolicy {
    OverlapStrip,
    FragmentDiscard,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DiffOutcome {
    /// New trailing content to emit.
    Emit(String),
    /// Nothing new (exact duplicate or discarded fragment).
    Skip,
    /// Snapshot bears no structural relationship to prior content; the full
    /// snapshot is emitted and the event is flagged for observability.
    Reset(String),
}

impl DiffOutcome {
    pub fn into_emission(self) -> Option<String> {
        match self {
            DiffOutcome::Emit(s) | DiffOutcome::Reset(s) => Some(s),
            DiffOutcome::Skip => None,
        }
    }
}

/// Given the current cumulative snapshot and everything previously emitted,
/// compute what the caller has not yet seen.
pub fn diff(current: &str, previous: &str, policy: DedupPolicy) -> DiffOutcome {
    if previous.is_empty() {
        return DiffOutcome::Emit(current.to_string());
    }
    if current == previous {
        return DiffOutcome::Skip;
    }
    if let Some(rest) = current.strip_prefix(previous) {
        return DiffOutcome::Emit(rest.to_string());
    }
    if policy == DedupPolicy::FragmentDiscard && is_fragment(current, previous) {
        tracing::warn!(
            current_len = current.chars().count(),
            previous_len = previous.chars().count(),
            "discarding stale/fragment snapshot"
        );
        return DiffOutcome::Skip;
    }
    let overlap = longest_overlap(previous, current);
    if overlap > 0 {
        return DiffOutcome::Emit(current[overlap..].to_string());
    }
    tracing::warn!("content reset detected, emitting full snapshot");
    DiffOutcome::Reset(current.to_string())
}

/// A snapshot shorter than 80% of the previously seen content is assumed to be
/// a stale or fragmentary event, not a continuation.
fn is_fragment(current: &str, previous: &str) -> bool {
    current.chars().count() * 5 < previous.chars().count() * 4
}

/// Length in bytes of the longest suffix of `previous` that is a prefix of
/// `current`, constrained to char boundaries of `current`.
fn longest_overlap(previous: &str, current: &str) -> usize {
    let max = previous.len().min(current.len());
    let mut best = 0;
    for i in 1..=max {
        if !current.is_char_boundary(i) {
            continue;
        }
        if previous.as_bytes()[previous.len() - i..] == current.as_bytes()[..i] {
            best = i;
        }
    }
    best
}
