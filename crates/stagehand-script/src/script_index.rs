use serde::Deserialize;
use stagehand_foundation::ScriptError;
use std::path::Path;

use crate::types::ScriptChunk;

const CHUNK_SIZE: usize = 10;
const CHUNK_OVERLAP: usize = 5;

#[derive(Debug, Deserialize)]
struct ScriptFile {
    pages: Vec<Page>,
}

#[derive(Debug, Deserialize)]
struct Page {
    page_number: u32,
    fragments: Vec<Fragment>,
}

#[derive(Debug, Deserialize)]
struct Fragment {
    text: String,
    bounds: Bounds,
}

#[derive(Debug, Deserialize)]
struct Bounds {
    bottom: f64,
    height: f64,
}

struct Segment {
    page_number: u32,
    y_coordinate: i32,
    words: Vec<String>,
    fragment_id: usize,
}

/// Read-only index of a script's chunks, built once from the script JSON
/// and never mutated afterwards.
pub struct ScriptIndex {
    chunks: Vec<ScriptChunk>,
}

impl ScriptIndex {
    pub fn load(path: &Path) -> Result<Self, ScriptError> {
        let raw = std::fs::read_to_string(path).map_err(|_| ScriptError::NotFound {
            path: path.display().to_string(),
        })?;
        let parsed: ScriptFile =
            serde_json::from_str(&raw).map_err(|e| ScriptError::Malformed(e.to_string()))?;

        let segments = build_segments(&parsed);
        let chunks = build_chunks(&segments);

        if chunks.is_empty() {
            return Err(ScriptError::EmptyScript);
        }

        Ok(Self { chunks })
    }

    pub fn chunks(&self) -> &[ScriptChunk] {
        &self.chunks
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

/// Lower-cases, strips ASCII punctuation, and collapses newlines to spaces.
pub fn normalize_text(text: &str) -> String {
    let lowered = text.to_lowercase();
    let stripped: String = lowered
        .chars()
        .filter(|c| !c.is_ascii_punctuation())
        .collect();
    stripped.replace('\n', " ")
}

fn build_segments(file: &ScriptFile) -> Vec<Segment> {
    let mut segments = Vec::new();
    for page in &file.pages {
        for (idx, fragment) in page.fragments.iter().enumerate() {
            let normalized = normalize_text(&fragment.text);
            let words: Vec<String> = normalized
                .split_whitespace()
                .map(|w| w.to_string())
                .collect();
            if words.is_empty() {
                continue;
            }
            segments.push(Segment {
                page_number: page.page_number,
                y_coordinate: (fragment.bounds.bottom + fragment.bounds.height / 2.0) as i32,
                words,
                fragment_id: idx,
            });
        }
    }
    segments
}

fn build_chunks(segments: &[Segment]) -> Vec<ScriptChunk> {
    let mut words = Vec::new();
    let mut fragment_ids = Vec::new();
    let mut y_coords = Vec::new();
    let mut pages = Vec::new();

    for segment in segments {
        for word in &segment.words {
            words.push(word.clone());
            fragment_ids.push(segment.fragment_id);
            y_coords.push(segment.y_coordinate);
            pages.push(segment.page_number);
        }
    }

    let stride = CHUNK_SIZE - CHUNK_OVERLAP;
    let mut chunks = Vec::new();
    let mut chunk_id = 0u64;
    let mut i = 0;
    while i < words.len() {
        let end = (i + CHUNK_SIZE).min(words.len());
        if end - i < CHUNK_SIZE {
            break;
        }
        chunks.push(ScriptChunk {
            id: chunk_id,
            words: words[i..end].to_vec(),
            first_fragment_id: fragment_ids[i],
            last_fragment_id: fragment_ids[end - 1],
            last_y: y_coords[end - 1],
            last_page: pages[end - 1],
        });
        chunk_id += 1;
        i += stride;
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_script(dir: &tempfile::TempDir, json: &str) -> std::path::PathBuf {
        let path = dir.path().join("script.json");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(json.as_bytes()).unwrap();
        path
    }

    #[test]
    fn normalize_strips_punctuation_and_lowercases() {
        assert_eq!(normalize_text("Hello, World!\n"), "hello world ");
    }

    #[test]
    fn trailing_partial_chunk_is_discarded() {
        let dir = tempfile::tempdir().unwrap();
        let json = r#"{"pages":[{"page_number":1,"fragments":[
            {"text":"one two three four five six seven eight nine ten eleven twelve","bounds":{"bottom":10.0,"height":2.0}}
        ]}]}"#;
        let path = write_script(&dir, json);
        let index = ScriptIndex::load(&path).unwrap();
        // 12 words, chunk_size=10, stride=5: chunk 0 = words[0..10], chunk 1
        // would be words[5..15] but only 7 remain, so it's discarded.
        assert_eq!(index.len(), 1);
        assert_eq!(index.chunks()[0].words.len(), 10);
    }

    #[test]
    fn empty_fragments_are_discarded() {
        let dir = tempfile::tempdir().unwrap();
        let json = r#"{"pages":[{"page_number":1,"fragments":[
            {"text":"   ","bounds":{"bottom":0.0,"height":0.0}},
            {"text":"a b c d e f g h i j","bounds":{"bottom":5.0,"height":1.0}}
        ]}]}"#;
        let path = write_script(&dir, json);
        let index = ScriptIndex::load(&path).unwrap();
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn empty_script_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let json = r#"{"pages":[]}"#;
        let path = write_script(&dir, json);
        assert!(matches!(
            ScriptIndex::load(&path),
            Err(ScriptError::EmptyScript)
        ));
    }
}
