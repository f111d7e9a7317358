//! UI message stream protocol adapter.
//!
//! Turns an ordered [`crate::event::Event`] stream into `data: <json>\n\n`
//! frames terminated by `data: [DONE]\n\n`, written incrementally to a
//! [`FrameSink`]. Failures mid-stream become one `error` frame; the sentinel
//! is always the last frame.
mod adapter;
mod frame;
mod response;
mod sink;
mod translate;

pub use adapter::{AdapterOutcome, AdapterReport, CompletionCallback, UiStreamAdapter};
pub use frame::{DONE_FRAME, FrameUsage, MessageMetadata, UiFrame};
pub use response::{UI_MESSAGE_STREAM_HEADER, UI_MESSAGE_STREAM_VERSION, ui_stream_headers};
pub use sink::{ChannelSink, FrameSink, SinkClosed};
pub use translate::{FrameTranslator, slug};
