//! Clients for the hosted models that write scripts, draw slides and speak narration.

pub mod client;
pub mod images;
pub mod narration;
pub mod script;

pub use client::OpenAiClient;
pub use images::NebiusImageGenerator;
pub use narration::{OpenAiNarrator, SilentNarrator};
pub use script::OpenAiScriptGenerator;
