//! Mnemo Core Library
//!
//! Recall and prioritization over a versioned memory store: decay scoring,
//! semantic ranking, context packing, promotion, conflict resolution and
//! decision reinforcement.

pub mod config;
pub mod embedding;
pub mod error;
pub mod generation;
pub mod memory;
pub mod metrics;
pub mod obs;
pub mod pairing;
pub mod telemetry;

pub use config::MnemoConfig;
pub use embedding::{Embedder, OpenAiEmbedder};
pub use error::{MnemoError, ProviderError, Result};
pub use generation::{OllamaGenerator, TextGenerator};

pub use memory::{
    cosine_similarity, decay_score, extract_facts, keystone_score, pack_context, rank_by_decay,
    rank_by_similarity, select_keystones, select_promotion_candidates, ConflictAction,
    ConflictResolution, ContextSource, ContextWindow, DecisionRecorder, DecisionRecorderConfig,
    ImportReport,
    MemoryService, MemoryStats, NewMemory, PackedMemory, PromotionCriteria, PromotionReport,
    RecallOptions, Reflection, ReinforcementReport, ScoredMemory, TokenCounter, UpdateParams,
};

pub use mnemo_state::{
    Category, CommitId, Decision, Memory, MemoryFilter, MemoryLink, MemoryOrder,
    MemoryRepository, MemoryVersion, Status, SurrealHandle,
};

pub use pairing::{PairingAction, PairingListener};

pub use metrics::METRICS;
pub use obs::TaskSpan;
pub use telemetry::init_tracing;

/// Mnemo version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
