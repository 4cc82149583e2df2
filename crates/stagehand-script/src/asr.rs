use async_trait::async_trait;
use stagehand_foundation::ScriptError;

use crate::types::Segment;

/// Capability interface over a speech-to-text engine, the same shape as the
/// rest of the system's `Detector`/`ReIdEncoder` capability interfaces: the
/// pipeline is generic over which concrete model backs it.
#[async_trait]
pub trait AsrEngine: Send + Sync {
    /// Transcribes a snapshot of mono 16-bit PCM at 44.1 kHz into zero or
    /// more segments of recognized text, in chronological order.
    async fn transcribe(&mut self, pcm: &[i16]) -> Result<Vec<Segment>, ScriptError>;
}

/// No-op engine used in tests and wherever no real ASR backend is wired up:
/// always returns zero segments, never errors.
#[derive(Debug, Default)]
pub struct NullAsrEngine;

#[async_trait]
impl AsrEngine for NullAsrEngine {
    async fn transcribe(&mut self, _pcm: &[i16]) -> Result<Vec<Segment>, ScriptError> {
        Ok(Vec::new())
    }
}

/// Fixed-script engine for deterministic tests: returns the same canned
/// segments on every call regardless of input.
pub struct ScriptedAsrEngine {
    lines: Vec<String>,
}

impl ScriptedAsrEngine {
    pub fn new(lines: Vec<String>) -> Self {
        Self { lines }
    }
}

#[async_trait]
impl AsrEngine for ScriptedAsrEngine {
    async fn transcribe(&mut self, _pcm: &[i16]) -> Result<Vec<Segment>, ScriptError> {
        Ok(self
            .lines
            .iter()
            .cloned()
            .map(|text| Segment { text })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn null_engine_returns_no_segments() {
        let mut engine = NullAsrEngine;
        let segments = engine.transcribe(&[0i16; 2048]).await.unwrap();
        assert!(segments.is_empty());
    }

    #[tokio::test]
    async fn scripted_engine_replays_canned_lines() {
        let mut engine = ScriptedAsrEngine::new(vec!["to be or not to be".to_string()]);
        let segments = engine.transcribe(&[]).await.unwrap();
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].text, "to be or not to be");
    }
}
