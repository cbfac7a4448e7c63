//! Memory engine: scoring, ranking, recall, context packing and maintenance.
//!
//! Pure selection logic (decay, similarity, packing, promotion criteria) lives
//! in free functions. `MemoryService` wires it to an injected repository and
//! an optional embedding provider.

pub mod conflict;
pub mod context;
pub mod decision;
pub mod lifecycle;
pub mod promotion;
pub mod ranking;
pub mod recall;
pub mod reflection;
pub mod scoring;
pub mod service;
pub mod similarity;

pub use conflict::{ConflictAction, ConflictResolution, MERGE_SEPARATOR};
pub use context::{pack_context, ContextSource, ContextWindow, PackedMemory, TokenCounter};
pub use decision::{DecisionRecorder, DecisionRecorderConfig, ReinforcementReport};
pub use lifecycle::{ImportReport, MemoryStats, NewMemory, UpdateParams};
pub use promotion::{select_promotion_candidates, PromotionCriteria, PromotionReport};
pub use ranking::{rank_by_similarity, ScoredMemory};
pub use recall::RecallOptions;
pub use reflection::{extract_facts, parse_facts, Reflection};
pub use scoring::{category_decay, decay_score, keystone_score, rank_by_decay, select_keystones};
pub use service::MemoryService;
pub use similarity::{cosine_similarity, decode_embedding, encode_embedding};
