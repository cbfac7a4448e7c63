//! Resolution of two contradicting memories.

use std::fmt;
use std::str::FromStr;

use mnemo_state::{Memory, ParseEnumError, Status};
use serde::{Deserialize, Serialize};
use tracing::{instrument, warn};

use super::service::MemoryService;
use crate::error::{MnemoError, Result};
use crate::obs;

pub const MERGE_SEPARATOR: &str = " | ";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictAction {
    /// Keep the first memory, deprecate the second
    #[serde(rename = "keep1")]
    KeepFirst,
    /// Keep the second memory, deprecate the first
    #[serde(rename = "keep2")]
    KeepSecond,
    /// Append the second's content to the first, deprecate the second
    Merge,
    Noop,
}

impl ConflictAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictAction::KeepFirst => "keep1",
            ConflictAction::KeepSecond => "keep2",
            ConflictAction::Merge => "merge",
            ConflictAction::Noop => "noop",
        }
    }
}

impl fmt::Display for ConflictAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConflictAction {
    type Err = ParseEnumError;

    /// Accepts the menu numbers `1`-`4` or the action names.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "1" | "keep1" => Ok(ConflictAction::KeepFirst),
            "2" | "keep2" => Ok(ConflictAction::KeepSecond),
            "3" | "merge" => Ok(ConflictAction::Merge),
            "4" | "noop" => Ok(ConflictAction::Noop),
            _ => Err(ParseEnumError {
                kind: "conflict action",
                value: s.to_string(),
                expected: "1, 2, 3, 4, keep1, keep2, merge, noop",
            }),
        }
    }
}

/// What a resolution changed
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConflictResolution {
    pub action: ConflictAction,
    /// Surviving memory, after any merge
    pub kept: Option<Memory>,
    pub deprecated: Option<String>,
}

fn deprecated(memory: &Memory) -> Memory {
    let mut m = memory.clone();
    m.status = Status::Deprecated;
    m
}

impl MemoryService {
    /// Apply `action` to the pair `(first_id, second_id)`.
    ///
    /// When the second write fails the first is restored, so both memories
    /// stay as they were and the error is returned.
    #[instrument(skip(self))]
    pub async fn resolve_conflict(
        &self,
        first_id: &str,
        second_id: &str,
        action: ConflictAction,
    ) -> Result<ConflictResolution> {
        if first_id == second_id {
            return Err(MnemoError::Validation(
                "a memory cannot conflict with itself".to_string(),
            ));
        }
        let first = self.require_memory(first_id).await?;
        let second = self.require_memory(second_id).await?;

        let resolution = match action {
            ConflictAction::Noop => ConflictResolution {
                action,
                kept: None,
                deprecated: None,
            },
            ConflictAction::KeepFirst => {
                self.repo.update_memory(&deprecated(&second)).await?;
                ConflictResolution {
                    action,
                    kept: Some(first),
                    deprecated: Some(second.id),
                }
            }
            ConflictAction::KeepSecond => {
                self.repo.update_memory(&deprecated(&first)).await?;
                ConflictResolution {
                    action,
                    kept: Some(second),
                    deprecated: Some(first.id),
                }
            }
            ConflictAction::Merge => {
                let mut merged = first.clone();
                merged.content = format!("{}{}{}", first.content, MERGE_SEPARATOR, second.content);
                self.repo.update_memory(&merged).await?;

                if let Err(err) = self.repo.update_memory(&deprecated(&second)).await {
                    if let Err(restore_err) = self.repo.update_memory(&first).await {
                        warn!(
                            memory_id = %first.id,
                            error = %restore_err,
                            "failed to restore merged memory"
                        );
                    }
                    return Err(err.into());
                }
                ConflictResolution {
                    action,
                    kept: Some(merged),
                    deprecated: Some(second.id),
                }
            }
        };

        if action != ConflictAction::Noop {
            let kept = resolution.kept.as_ref().map_or("", |m| m.id.as_str());
            obs::emit_conflict_resolved(kept, action.as_str());
            self.commit_best_effort(&format!(
                "Resolve conflict between {} and {} ({})",
                first_id, second_id, action
            ))
            .await;
        }
        Ok(resolution)
    }
}
