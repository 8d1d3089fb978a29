pub mod client;
pub mod config;
pub mod engine;
pub mod logging;
pub mod message;
pub mod render;
pub mod session;

// Re-export main types for convenience
pub use client::{AskError, TutorClient, DEFAULT_ENDPOINT};
pub use config::Config;
pub use engine::{EngineState, LazyEngine, MarkdownEngine};
pub use message::{Message, Role};
pub use render::{RenderMode, Rendered};
pub use session::{Effect, SessionEvent, SessionState};
