pub mod asr;
pub mod audit;
pub mod fuzzy;
pub mod matcher;
pub mod script_index;
pub mod types;

pub use asr::{AsrEngine, NullAsrEngine, ScriptedAsrEngine};
pub use audit::{AuditLog, AuditRow};
pub use matcher::WindowedMatcher;
pub use script_index::{normalize_text, ScriptIndex};
pub use types::{Pointer, ScriptChunk, Segment};
