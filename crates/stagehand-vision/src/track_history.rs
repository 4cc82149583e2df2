use std::collections::{HashMap, VecDeque};

const HISTORY_CAPACITY: usize = 10;

/// Bounded per-track history of identity/score pairs (C6). One instance per
/// detector track id.
#[derive(Debug, Default)]
pub struct TrackHistory {
    entries: VecDeque<(String, f32)>,
}

impl TrackHistory {
    pub fn new() -> Self {
        Self {
            entries: VecDeque::with_capacity(HISTORY_CAPACITY),
        }
    }

    pub fn push(&mut self, identity: String, score: f32) {
        if self.entries.len() == HISTORY_CAPACITY {
            self.entries.pop_front();
        }
        self.entries.push_back((identity, score));
    }

    /// Most frequent identity, ties broken by the lowest score seen for the
    /// tied identities. Returns `None` if the history is empty.
    pub fn consensus(&self) -> Option<(String, f32, f32)> {
        if self.entries.is_empty() {
            return None;
        }

        let mut counts: HashMap<&str, usize> = HashMap::new();
        let mut min_score: HashMap<&str, f32> = HashMap::new();
        for (identity, score) in &self.entries {
            *counts.entry(identity.as_str()).or_insert(0) += 1;
            min_score
                .entry(identity.as_str())
                .and_modify(|m| {
                    if *score < *m {
                        *m = *score;
                    }
                })
                .or_insert(*score);
        }

        let total = self.entries.len() as f32;
        let best = counts
            .iter()
            .max_by(|(id_a, count_a), (id_b, count_b)| {
                count_a
                    .cmp(count_b)
                    .then_with(|| min_score[id_b].partial_cmp(&min_score[id_a]).unwrap())
                    .then_with(|| id_b.cmp(id_a))
            })
            .map(|(id, count)| (*id, *count))?;

        let (identity, count) = best;
        let percentage = (count as f32 / total) * 100.0;
        Some((identity.to_string(), percentage, min_score[identity]))
    }
}

/// Registry of one [`TrackHistory`] per detector track id.
#[derive(Debug, Default)]
pub struct TrackHistoryMap {
    tracks: HashMap<u64, TrackHistory>,
}

impl TrackHistoryMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, track_id: u64, identity: String, score: f32) {
        self.tracks.entry(track_id).or_default().push(identity, score);
    }

    pub fn consensus(&self, track_id: u64) -> Option<(String, f32, f32)> {
        self.tracks.get(&track_id).and_then(|h| h.consensus())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn consensus_is_none_when_empty() {
        let history = TrackHistory::new();
        assert!(history.consensus().is_none());
    }

    #[test]
    fn consensus_picks_majority_identity() {
        let mut history = TrackHistory::new();
        history.push("alice".to_string(), 10.0);
        history.push("alice".to_string(), 12.0);
        history.push("bob".to_string(), 5.0);

        let (identity, _pct, _score) = history.consensus().unwrap();
        assert_eq!(identity, "alice");
    }

    #[test]
    fn tie_is_broken_by_lowest_score() {
        let mut history = TrackHistory::new();
        history.push("alice".to_string(), 20.0);
        history.push("bob".to_string(), 5.0);

        let (identity, _pct, score) = history.consensus().unwrap();
        assert_eq!(identity, "bob");
        assert_eq!(score, 5.0);
    }

    #[test]
    fn history_is_bounded_to_ten_entries() {
        let mut history = TrackHistory::new();
        for i in 0..15 {
            history.push(format!("id_{i}"), i as f32);
        }
        assert_eq!(history.entries.len(), HISTORY_CAPACITY);
    }
}
