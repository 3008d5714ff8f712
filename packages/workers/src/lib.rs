//! Concrete workers.
//!
//! - `SleepWorker` - counts seconds; the "fake job" used by demos and the CLI
//! - `CallbackWorker` - POSTs a JSON payload to a list of URLs
//! - `ImportWorker` - writes rows into an `ImportSink` chunk by chunk
//! - `RenderWorker` - drives a headless browser and stores the file it prints

mod callback;
mod import;
mod render;
mod sleep;

pub use callback::CallbackWorker;
pub use import::{ImportSink, ImportWorker, MemorySink, Row, RowOutcome};
pub use render::{RenderOptions, RenderWorker};
pub use sleep::SleepWorker;

use jobs_core::Metadata;
use serde_json::Value;

/// Turn a `json!({...})` literal into a metadata document.
pub(crate) fn metadata(value: Value) -> Metadata {
    match value {
        Value::Object(map) => map,
        _ => Metadata::new(),
    }
}
