use crate::store::Store;
use chrono::{DateTime, Utc};
use poise::serenity_prelude::{GuildId, UserId};
use std::collections::{BTreeSet, HashMap};
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum WarningError {
    #[error("This user has no warnings to clear.")]
    NoWarnings,
    #[error("Please provide valid warning numbers separated by commas (e.g., \"1,3,5\") or \"all\".")]
    InvalidSelection,
    #[error("No warnings were cleared. Please check the warning numbers.")]
    NothingCleared,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Warning {
    pub number: u32,
    pub reason: String,
    pub moderator: UserId,
    pub issued_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedWarning {
    pub warning: Warning,
    pub total: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClearSelection {
    All,
    Numbers(BTreeSet<u32>),
}

impl ClearSelection {
    /// Accepts `all` or a comma separated list such as `1,3,5`. Entries that
    /// are not numbers are skipped; a list with no numbers at all is rejected.
    pub fn parse(input: &str) -> Result<Self, WarningError> {
        let input = input.trim();
        if input.eq_ignore_ascii_case("all") {
            return Ok(Self::All);
        }

        let numbers: BTreeSet<u32> = input
            .split(',')
            .filter_map(|part| part.trim().parse().ok())
            .collect();
        if numbers.is_empty() {
            return Err(WarningError::InvalidSelection);
        }
        Ok(Self::Numbers(numbers))
    }
}

/// One member's warnings. `next_number` only grows while the record exists.
#[derive(Debug, Clone)]
pub struct WarningRecord {
    next_number: u32,
    warnings: Vec<Warning>,
}

impl Default for WarningRecord {
    fn default() -> Self {
        Self {
            next_number: 1,
            warnings: Vec::new(),
        }
    }
}

#[derive(Debug, Default)]
pub struct WarningTable {
    records: HashMap<(GuildId, UserId), WarningRecord>,
}

pub type WarningStore = Store<WarningTable>;

/// Moderator warnings, kept per member of each guild. Nothing is persisted.
#[derive(Debug, Clone, Default)]
pub struct WarningLedger {
    store: WarningStore,
}

impl WarningLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn warn(
        &self,
        guild_id: GuildId,
        user_id: UserId,
        moderator: UserId,
        reason: String,
    ) -> IssuedWarning {
        self.warn_at(guild_id, user_id, moderator, reason, Utc::now())
            .await
    }

    pub async fn warn_at(
        &self,
        guild_id: GuildId,
        user_id: UserId,
        moderator: UserId,
        reason: String,
        now: DateTime<Utc>,
    ) -> IssuedWarning {
        let issued = self
            .store
            .write(|table| {
                let record = table.records.entry((guild_id, user_id)).or_default();
                let warning = Warning {
                    number: record.next_number,
                    reason,
                    moderator,
                    issued_at: now,
                };
                record.next_number += 1;
                record.warnings.push(warning.clone());
                IssuedWarning {
                    warning,
                    total: record.warnings.len(),
                }
            })
            .await;

        info!(
            "Warning #{} issued to {} in guild {} by {}",
            issued.warning.number, user_id, guild_id, moderator
        );
        issued
    }

    pub async fn list(&self, guild_id: GuildId, user_id: UserId) -> Vec<Warning> {
        self.store
            .read(|table| {
                table
                    .records
                    .get(&(guild_id, user_id))
                    .map(|record| record.warnings.clone())
                    .unwrap_or_default()
            })
            .await
    }

    /// Removes the selected warnings and returns how many were dropped.
    pub async fn clear(
        &self,
        guild_id: GuildId,
        user_id: UserId,
        selection: &ClearSelection,
    ) -> Result<usize, WarningError> {
        let cleared = self
            .store
            .write(|table| {
                let key = (guild_id, user_id);
                let warnings = match table.records.get_mut(&key) {
                    Some(record) if !record.warnings.is_empty() => &mut record.warnings,
                    _ => return Err(WarningError::NoWarnings),
                };

                let before = warnings.len();
                match selection {
                    ClearSelection::All => warnings.clear(),
                    ClearSelection::Numbers(numbers) => {
                        warnings.retain(|warning| !numbers.contains(&warning.number))
                    }
                }
                let cleared = before - warnings.len();

                // An emptied record starts numbering from 1 again.
                if warnings.is_empty() {
                    table.records.remove(&key);
                }
                if cleared == 0 {
                    return Err(WarningError::NothingCleared);
                }
                Ok(cleared)
            })
            .await?;

        info!(
            "Cleared {} warning(s) for {} in guild {}",
            cleared, user_id, guild_id
        );
        Ok(cleared)
    }
}
