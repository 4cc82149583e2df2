use serde::{Deserialize, Serialize};

/// One fixed-size window of script text, produced once from the script JSON
/// and immutable thereafter. `id` is this chunk's index in the full
/// sequence, used by the matcher to compute window offsets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptChunk {
    pub id: u64,
    pub words: Vec<String>,
    pub first_fragment_id: usize,
    pub last_fragment_id: usize,
    pub last_y: i32,
    pub last_page: u32,
}

impl ScriptChunk {
    pub fn text_joined(&self) -> String {
        self.words.join(" ")
    }
}

/// The most recent script position estimate, published to the bus with
/// `retain = true`. Field names on the wire match the `local_server/tracker/
/// position` topic schema rather than Rust convention.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pointer {
    #[serde(rename = "page_number")]
    pub page: u32,
    #[serde(rename = "y_coordinate")]
    pub y: i32,
    #[serde(rename = "chunk_index")]
    pub chunk_id: u64,
    pub chunk_text: String,
    pub input_line: String,
    #[serde(rename = "similarity_score")]
    pub score: u8,
}

/// One segment of transcribed speech handed back by an [`crate::asr::AsrEngine`].
#[derive(Debug, Clone)]
pub struct Segment {
    pub text: String,
}
