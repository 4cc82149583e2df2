use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use stagehand_telemetry::StageMetrics;

use crate::audit::{AuditLog, AuditRow};
use crate::fuzzy::{partial_token_sort_ratio, token_set_ratio};
use crate::script_index::normalize_text;
use crate::types::{Pointer, ScriptChunk};

const MAX_FAILED_ATTEMPTS: u32 = 5;
const INTERMEDIATE_THRESHOLD_LOWER: u8 = 50;
const INTERMEDIATE_THRESHOLD_UPPER: u8 = 60;
const FORWARD_WINDOW_SIZE: usize = 10;
const BACKWARD_WINDOW_SIZE: usize = 10;
const GLOBAL_WINDOW_SIZE: usize = FORWARD_WINDOW_SIZE + BACKWARD_WINDOW_SIZE;
const GLOBAL_MIN_MATCH_COUNT: usize = 4;

struct MatcherState {
    window_start: usize,
    window_end: usize,
    failed_attempts: u32,
    failed_transcriptions: Vec<String>,
    last_input: Option<String>,
    last_pointer: Option<Pointer>,
}

/// C3: holds the matcher's current window over the script's chunk sequence
/// and scores incoming ASR transcriptions against it. Never fails the
/// caller — absence of a match yields `None`, and a slow global rescan runs
/// single-flight in the background rather than blocking `search`.
pub struct WindowedMatcher {
    chunks: Arc<Vec<ScriptChunk>>,
    state: Mutex<MatcherState>,
    global_search_inflight: AtomicBool,
    audit: AuditLog,
    metrics: StageMetrics,
}

impl WindowedMatcher {
    pub fn new(
        chunks: Arc<Vec<ScriptChunk>>,
        audit: AuditLog,
        metrics: StageMetrics,
    ) -> Self {
        let window_end = FORWARD_WINDOW_SIZE.min(chunks.len());
        Self {
            chunks,
            state: Mutex::new(MatcherState {
                window_start: 0,
                window_end,
                failed_attempts: 0,
                failed_transcriptions: Vec::new(),
                last_input: None,
                last_pointer: None,
            }),
            global_search_inflight: AtomicBool::new(false),
            audit,
            metrics,
        }
    }

    /// Scores `target` against the current window and, on a strong enough
    /// match, slides the window to center on it. Returns `None` for an
    /// empty input, a repeat of the previous input, or a round that found
    /// no chunk scoring above the lower threshold; otherwise returns the
    /// freshly matched pointer.
    pub fn search(self: &Arc<Self>, target: &str) -> Option<Pointer> {
        let mut state = self.state.lock();

        if target.is_empty() || state.last_input.as_deref() == Some(target) {
            return None;
        }
        state.last_input = Some(target.to_string());

        let normalized = normalize_text(target);
        let target_tokens: Vec<&str> = normalized.split_whitespace().collect();

        let window = &self.chunks[state.window_start..state.window_end];
        let mut best: Option<(&ScriptChunk, u8, String)> = None;

        for chunk in window {
            let cropped = if target_tokens.len() > chunk.words.len() {
                target_tokens[..chunk.words.len()].join(" ")
            } else {
                target_tokens.join(" ")
            };
            let chunk_text = chunk.text_joined();
            let score = token_set_ratio(&chunk_text, &cropped);

            let is_better = best.as_ref().map(|(_, s, _)| score > *s).unwrap_or(true);
            if score > INTERMEDIATE_THRESHOLD_LOWER && is_better {
                best = Some((chunk, score, cropped));
            }
        }

        self.audit.log(AuditRow {
            search_type: "local",
            best_score: best.as_ref().map(|(_, s, _)| *s).unwrap_or(0),
            target_string: best.as_ref().map(|(_, _, c)| c.as_str()).unwrap_or(target),
            chunk_text: best.map(|(c, _, _)| c.text_joined()).as_deref().unwrap_or(""),
            page_number: best
                .as_ref()
                .map(|(c, _, _)| c.last_page.to_string())
                .unwrap_or_default(),
        });

        self.metrics
            .record_match_attempt(best.as_ref().map(|(_, s, _)| *s).unwrap_or(0), best.is_some());

        if let Some((chunk, score, cropped)) = best {
            let new_start = chunk.id.saturating_sub(BACKWARD_WINDOW_SIZE as u64) as usize;
            let new_end = ((chunk.id as usize) + FORWARD_WINDOW_SIZE).min(self.chunks.len());
            state.window_start = new_start;
            state.window_end = new_end;

            let pointer = Pointer {
                page: chunk.last_page,
                y: chunk.last_y,
                chunk_id: chunk.id,
                chunk_text: chunk.text_joined(),
                input_line: cropped,
                score,
            };
            state.last_pointer = Some(pointer.clone());

            state.failed_attempts = 0;
            state.failed_transcriptions.clear();

            Some(pointer)
        } else {
            self.register_failure(&mut state, target);
            state.last_pointer.clone()
        }
    }

    fn register_failure(&self, state: &mut MatcherState, target: &str) {
        state.failed_attempts += 1;
        state.failed_transcriptions.push(target.to_string());

        if state.failed_attempts >= MAX_FAILED_ATTEMPTS
            && !self.global_search_inflight.swap(true, Ordering::SeqCst)
        {
            let failed = std::mem::take(&mut state.failed_transcriptions);
            let this = Arc::clone(self);
            tokio::spawn(async move {
                this.run_global_search(failed).await;
            });
        }
    }

    /// 4.3.1 Global rescan: runs in its own task, single-flight, and is the
    /// only thing allowed to touch matcher state besides `search`.
    async fn run_global_search(self: Arc<Self>, failed_transcriptions: Vec<String>) {
        self.metrics.record_global_rescan();
        tracing::info!(
            count = failed_transcriptions.len(),
            "initiating global rescan"
        );

        let num_chunks = self.chunks.len();
        let overlap = (GLOBAL_WINDOW_SIZE / 2).max(1);

        let mut highest_cumulative: u32 = 0;
        let mut best_window: Option<(usize, usize)> = None;
        let mut best_log: Option<(u8, String, String, u32)> = None;

        let mut i = 0;
        while i < num_chunks {
            let start = i.saturating_sub(BACKWARD_WINDOW_SIZE);
            let end = (start + GLOBAL_WINDOW_SIZE).min(num_chunks);
            let window = &self.chunks[start..end];

            let mut cumulative_score: u32 = 0;
            let mut match_count = 0usize;
            let mut window_best: Option<(u8, String, String, u32)> = None;

            for transcription in &failed_transcriptions {
                let normalized = normalize_text(transcription);
                let tokens: Vec<&str> = normalized.split_whitespace().collect();

                let mut best_chunk_score: u8 = 0;
                let mut best_chunk_info: Option<(String, String, u32)> = None;

                for chunk in window {
                    let cropped = if tokens.len() > chunk.words.len() {
                        tokens[..chunk.words.len()].join(" ")
                    } else {
                        tokens.join(" ")
                    };
                    let chunk_text = chunk.text_joined();
                    let score = partial_token_sort_ratio(&chunk_text, &cropped);
                    if score > best_chunk_score {
                        best_chunk_score = score;
                        best_chunk_info = Some((chunk_text, cropped, chunk.last_page));
                    }
                }

                cumulative_score += best_chunk_score as u32;
                if best_chunk_score >= INTERMEDIATE_THRESHOLD_UPPER {
                    match_count += 1;
                }
                if let Some((chunk_text, cropped, page)) = best_chunk_info {
                    window_best = Some((best_chunk_score, cropped, chunk_text, page));
                }
            }

            if match_count >= GLOBAL_MIN_MATCH_COUNT && cumulative_score > highest_cumulative {
                highest_cumulative = cumulative_score;
                best_window = Some((start, end));
                best_log = window_best;
            }

            i += overlap;
        }

        let mut state = self.state.lock();
        if let Some((start, end)) = best_window {
            state.window_start = start;
            state.window_end = end;
            tracing::info!(
                cumulative_score = highest_cumulative,
                "global rescan found a new window"
            );
        }

        let (score, target_string, chunk_text, page) = best_log.unwrap_or((0, failed_transcriptions.join(","), String::new(), 0));
        self.audit.log(AuditRow {
            search_type: "global",
            best_score: score,
            target_string: &target_string,
            chunk_text: &chunk_text,
            page_number: if page == 0 { String::new() } else { page.to_string() },
        });

        state.failed_attempts = 0;
        state.failed_transcriptions.clear();
        self.global_search_inflight.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(id: u64, words: &[&str]) -> ScriptChunk {
        ScriptChunk {
            id,
            words: words.iter().map(|s| s.to_string()).collect(),
            first_fragment_id: 0,
            last_fragment_id: 0,
            last_y: 100,
            last_page: 1,
        }
    }

    fn make_matcher(chunks: Vec<ScriptChunk>) -> Arc<WindowedMatcher> {
        let dir = tempfile::tempdir().unwrap();
        let audit = AuditLog::new(dir.path().join("audit.csv")).unwrap();
        let _ = dir.into_path();
        Arc::new(WindowedMatcher::new(
            Arc::new(chunks),
            audit,
            StageMetrics::default(),
        ))
    }

    #[test]
    fn empty_target_returns_none() {
        let matcher = make_matcher(vec![chunk(0, &["to", "be", "or", "not", "to", "be", "that", "is", "the", "question"])]);
        assert!(matcher.search("").is_none());
    }

    #[test]
    fn strong_match_adjusts_window_and_resets_counters() {
        let matcher = make_matcher(vec![chunk(
            0,
            &["to", "be", "or", "not", "to", "be", "that", "is", "the", "question"],
        )]);

        let pointer = matcher.search("to be or not to be that is the question").unwrap();
        assert_eq!(pointer.chunk_id, 0);
        assert!(pointer.score >= INTERMEDIATE_THRESHOLD_UPPER);
    }

    #[test]
    fn duplicate_input_returns_none() {
        let matcher = make_matcher(vec![chunk(
            0,
            &["to", "be", "or", "not", "to", "be", "that", "is", "the", "question"],
        )]);
        let first = matcher.search("to be or not to be that is the question");
        assert!(first.is_some());
        let second = matcher.search("to be or not to be that is the question");
        assert!(second.is_none());
    }

    #[tokio::test]
    async fn global_search_runs_without_panicking_on_empty_failures() {
        let matcher = make_matcher(vec![chunk(
            0,
            &["to", "be", "or", "not", "to", "be", "that", "is", "the", "question"],
        )]);
        Arc::clone(&matcher).run_global_search(vec![]).await;
    }
}
