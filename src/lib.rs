pub mod db;
pub mod error;
pub mod utils;
pub mod settings;
pub mod identity;
pub mod classification;
pub mod conversation;
pub mod assembler;
pub mod export;
pub mod import;

pub use assembler::{reconstruct, DropReason, ReconstructionStats, RowOutcome};
pub use conversation::{Conversation, ConversationId, Message, MessageId, MessageKind, Reconstruction};
pub use error::{Error, Result};
pub use export::OrgExporter;
pub use import::{load, summarize, ConversationSummary};
pub use settings::Settings;
