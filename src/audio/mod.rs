pub mod backend;
pub mod capture;
pub mod chunk;

pub use backend::{CaptureBackend, CaptureEvent, CpalBackend, InputDevice};
pub use capture::{AudioCaptureController, CaptureOutcome, ChunkCallback};
pub use chunk::{AudioChunk, AudioSpec};
