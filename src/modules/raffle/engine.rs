use super::store::{
    normalize_name, RaffleDuration, RaffleKey, RaffleState, RaffleStatus, RaffleStore,
    RaffleSummary,
};
use crate::platform::{Platform, PlatformError};
use chrono::{DateTime, Utc};
use poise::serenity_prelude::{ChannelId, GuildId, MessageId, UserId};
use rand::seq::SliceRandom;
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

pub const MAX_WINNERS: u32 = 10;

#[derive(Error, Debug)]
pub enum RaffleError {
    #[error("A raffle named \"{0}\" is already running in this server.")]
    DuplicateActiveRaffle(String),
    #[error("This raffle is no longer active.")]
    RaffleNotFound(String),
    #[error("This raffle has expired.")]
    RaffleExpired(String),
    #[error("No valid entries were found for \"{0}\".")]
    NoValidEntries(String),
    #[error("Winners for \"{0}\" are already being drawn.")]
    DrawInProgress(String),
    #[error("Only server admins can pick winners.")]
    NotPermitted,
    #[error("Raffle names cannot be blank.")]
    BlankName,
    #[error("Platform request failed: {0}")]
    Platform(#[from] PlatformError),
}

impl RaffleError {
    /// Text safe to show the member who triggered the error.
    pub fn user_message(&self) -> String {
        match self {
            Self::Platform(_) => "Something went wrong talking to Discord. Please try again."
                .to_string(),
            other => other.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewRaffle {
    pub guild_id: GuildId,
    pub name: String,
    pub prize: String,
    pub winners: u32,
    pub duration: RaffleDuration,
    pub rules: Option<String>,
    pub organizer: UserId,
    pub channel_id: ChannelId,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EntryOutcome {
    Entered(RaffleSummary),
    AlreadyEntered(RaffleSummary),
}

#[derive(Debug, Clone)]
pub struct DrawResult {
    pub raffle: RaffleSummary,
    pub winners: Vec<UserId>,
    pub valid_entries: usize,
    pub total_entries: usize,
}

/// Registry of running raffles keyed by guild and case-folded name.
#[derive(Debug, Clone)]
pub struct RaffleEngine {
    store: RaffleStore,
    platform: Arc<dyn Platform>,
}

impl RaffleEngine {
    pub fn new(platform: Arc<dyn Platform>) -> Self {
        Self {
            store: RaffleStore::default(),
            platform,
        }
    }

    pub async fn start(&self, raffle: NewRaffle) -> Result<RaffleSummary, RaffleError> {
        self.start_at(raffle, Utc::now()).await
    }

    pub async fn start_at(
        &self,
        raffle: NewRaffle,
        now: DateTime<Utc>,
    ) -> Result<RaffleSummary, RaffleError> {
        let key = RaffleKey::new(raffle.guild_id, &raffle.name);
        if key.name.is_empty() {
            return Err(RaffleError::BlankName);
        }
        let state = RaffleState {
            guild_id: raffle.guild_id,
            name: raffle.name.trim().to_string(),
            prize: raffle.prize,
            number_of_winners: raffle.winners.clamp(1, MAX_WINNERS),
            end_time: now + raffle.duration.as_delta(),
            rules: raffle.rules.filter(|rules| !rules.trim().is_empty()),
            entries: HashSet::new(),
            created_by: raffle.organizer,
            created_at: now,
            announcement_channel_id: raffle.channel_id,
            announcement_message_id: None,
            status: RaffleStatus::Open,
        };

        let summary = self
            .store
            .write(move |table| {
                if table.raffles.contains_key(&key) {
                    return Err(RaffleError::DuplicateActiveRaffle(state.name.clone()));
                }
                let summary = state.summary();
                table.raffles.insert(key, state);
                Ok(summary)
            })
            .await?;

        info!(
            "Raffle \"{}\" started in guild {} by {} ({} winner(s), ends {})",
            summary.name,
            summary.guild_id,
            summary.created_by,
            summary.number_of_winners,
            summary.end_time
        );
        Ok(summary)
    }

    /// Remembers which message announces the raffle so it can be refreshed.
    pub async fn attach_announcement(
        &self,
        guild_id: GuildId,
        name: &str,
        message_id: MessageId,
    ) -> bool {
        let key = RaffleKey::new(guild_id, name);
        self.store
            .write(|table| match table.raffles.get_mut(&key) {
                Some(raffle) => {
                    raffle.announcement_message_id = Some(message_id);
                    true
                }
                None => false,
            })
            .await
    }

    pub async fn enter(
        &self,
        guild_id: GuildId,
        name: &str,
        member: UserId,
    ) -> Result<EntryOutcome, RaffleError> {
        self.enter_at(guild_id, name, member, Utc::now()).await
    }

    /// Callers reject service accounts before getting here.
    pub async fn enter_at(
        &self,
        guild_id: GuildId,
        name: &str,
        member: UserId,
        now: DateTime<Utc>,
    ) -> Result<EntryOutcome, RaffleError> {
        let key = RaffleKey::new(guild_id, name);
        let outcome = self
            .store
            .write(|table| {
                let raffle = table
                    .raffles
                    .get_mut(&key)
                    .ok_or_else(|| RaffleError::RaffleNotFound(name.to_string()))?;
                if raffle.status == RaffleStatus::Drawing {
                    return Err(RaffleError::DrawInProgress(raffle.name.clone()));
                }
                if raffle.is_expired(now) {
                    return Err(RaffleError::RaffleExpired(raffle.name.clone()));
                }
                if raffle.entries.insert(member) {
                    Ok(EntryOutcome::Entered(raffle.summary()))
                } else {
                    Ok(EntryOutcome::AlreadyEntered(raffle.summary()))
                }
            })
            .await?;

        if let EntryOutcome::Entered(summary) = &outcome {
            debug!(
                "{} entered raffle \"{}\" in guild {} ({} entries)",
                member, summary.name, guild_id, summary.entry_count
            );
        }
        Ok(outcome)
    }

    /// Draws winners and removes the raffle. On `NoValidEntries` the raffle
    /// stays open.
    pub async fn pick_winners(
        &self,
        guild_id: GuildId,
        name: &str,
        caller: UserId,
    ) -> Result<DrawResult, RaffleError> {
        if !self.platform.has_elevated_role(guild_id, caller).await? {
            return Err(RaffleError::NotPermitted);
        }

        let key = RaffleKey::new(guild_id, name);
        let entrants: Vec<UserId> = self
            .store
            .write(|table| {
                let raffle = table
                    .raffles
                    .get_mut(&key)
                    .ok_or_else(|| RaffleError::RaffleNotFound(name.to_string()))?;
                if raffle.status == RaffleStatus::Drawing {
                    return Err(RaffleError::DrawInProgress(raffle.name.clone()));
                }
                raffle.status = RaffleStatus::Drawing;
                Ok(raffle.entries.iter().copied().collect())
            })
            .await?;

        let total_entries = entrants.len();
        let mut valid = Vec::with_capacity(total_entries);
        for user_id in entrants {
            match self.platform.is_service_account(user_id).await {
                Ok(true) => debug!("Skipping service account {} in draw", user_id),
                Ok(false) => valid.push(user_id),
                Err(e) => {
                    warn!("Could not classify entrant {}, keeping them: {}", user_id, e);
                    valid.push(user_id);
                }
            }
        }

        let result = self
            .store
            .write(|table| {
                if valid.is_empty() {
                    if let Some(raffle) = table.raffles.get_mut(&key) {
                        raffle.status = RaffleStatus::Open;
                    }
                    return Err(RaffleError::NoValidEntries(name.trim().to_string()));
                }

                let raffle = table
                    .raffles
                    .remove(&key)
                    .ok_or_else(|| RaffleError::RaffleNotFound(name.to_string()))?;
                let count = (raffle.number_of_winners as usize).min(valid.len());
                let winners = valid
                    .choose_multiple(&mut rand::thread_rng(), count)
                    .copied()
                    .collect();

                Ok(DrawResult {
                    raffle: raffle.summary(),
                    winners,
                    valid_entries: valid.len(),
                    total_entries,
                })
            })
            .await?;

        info!(
            "Raffle \"{}\" in guild {} resolved by {}: {} winner(s) from {} valid of {} entries",
            result.raffle.name,
            guild_id,
            caller,
            result.winners.len(),
            result.valid_entries,
            result.total_entries
        );
        Ok(result)
    }

    pub async fn cancel(&self, guild_id: GuildId, name: &str) -> Result<RaffleSummary, RaffleError> {
        let key = RaffleKey::new(guild_id, name);
        let summary = self
            .store
            .write(|table| {
                match table.raffles.get(&key) {
                    None => return Err(RaffleError::RaffleNotFound(name.to_string())),
                    Some(raffle) if raffle.status == RaffleStatus::Drawing => {
                        return Err(RaffleError::DrawInProgress(raffle.name.clone()))
                    }
                    Some(_) => {}
                }
                table
                    .raffles
                    .remove(&key)
                    .map(|raffle| raffle.summary())
                    .ok_or_else(|| RaffleError::RaffleNotFound(name.to_string()))
            })
            .await?;

        info!("Raffle \"{}\" cancelled in guild {}", summary.name, guild_id);
        Ok(summary)
    }

    pub async fn get(&self, guild_id: GuildId, name: &str) -> Option<RaffleSummary> {
        let key = RaffleKey::new(guild_id, name);
        self.store
            .read(|table| table.raffles.get(&key).map(RaffleState::summary))
            .await
    }

    pub async fn has_entered(&self, guild_id: GuildId, name: &str, member: UserId) -> bool {
        let key = RaffleKey::new(guild_id, name);
        self.store
            .read(|table| {
                table
                    .raffles
                    .get(&key)
                    .is_some_and(|raffle| raffle.entries.contains(&member))
            })
            .await
    }

    /// Raffles in a guild, oldest first.
    pub async fn active_in(&self, guild_id: GuildId) -> Vec<RaffleSummary> {
        let mut raffles = self
            .store
            .read(|table| {
                table
                    .raffles
                    .values()
                    .filter(|raffle| raffle.guild_id == guild_id)
                    .map(RaffleState::summary)
                    .collect::<Vec<_>>()
            })
            .await;
        raffles.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.name.cmp(&b.name)));
        raffles
    }

    /// Names in a guild that start with `partial`, for autocomplete.
    pub async fn matching_names(&self, guild_id: GuildId, partial: &str) -> Vec<String> {
        let partial = normalize_name(partial);
        self.active_in(guild_id)
            .await
            .into_iter()
            .map(|raffle| raffle.name)
            .filter(|name| name.to_lowercase().starts_with(&partial))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::fake::FakePlatform;
    use chrono::TimeDelta;

    const GUILD: GuildId = GuildId::new(1);
    const OTHER_GUILD: GuildId = GuildId::new(2);
    const CHANNEL: ChannelId = ChannelId::new(50);
    const ADMIN: UserId = UserId::new(900);

    fn setup() -> (Arc<FakePlatform>, RaffleEngine) {
        let platform = Arc::new(FakePlatform::new());
        platform.with(|s| {
            s.admins.insert(ADMIN);
        });
        let engine = RaffleEngine::new(platform.clone());
        (platform, engine)
    }

    fn raffle(name: &str, winners: u32) -> NewRaffle {
        NewRaffle {
            guild_id: GUILD,
            name: name.to_string(),
            prize: "Nitro".to_string(),
            winners,
            duration: RaffleDuration::OneHour,
            rules: None,
            organizer: ADMIN,
            channel_id: CHANNEL,
        }
    }

    fn user(id: u64) -> UserId {
        UserId::new(id)
    }

    #[tokio::test]
    async fn start_sets_end_time_from_duration() {
        let (_platform, engine) = setup();
        let now = Utc::now();
        let mut new = raffle("Giveaway1", 2);
        new.duration = RaffleDuration::SixHours;

        let summary = engine.start_at(new, now).await.unwrap();

        assert_eq!(summary.end_time, now + TimeDelta::hours(6));
        assert_eq!(summary.number_of_winners, 2);
        assert_eq!(summary.entry_count, 0);
        assert_eq!(summary.name, "Giveaway1");
    }

    #[tokio::test]
    async fn duplicate_names_are_rejected_case_insensitively() {
        let (_platform, engine) = setup();
        engine.start(raffle("Giveaway1", 1)).await.unwrap();

        let err = engine.start(raffle("GIVEAWAY1", 1)).await.unwrap_err();
        assert!(matches!(err, RaffleError::DuplicateActiveRaffle(_)));

        let mut elsewhere = raffle("giveaway1", 1);
        elsewhere.guild_id = OTHER_GUILD;
        assert!(engine.start(elsewhere).await.is_ok());
    }

    #[tokio::test]
    async fn blank_names_are_rejected() {
        let (_platform, engine) = setup();

        let err = engine.start(raffle("   ", 1)).await.unwrap_err();
        assert!(matches!(err, RaffleError::BlankName));
        assert!(engine.active_in(GUILD).await.is_empty());
    }

    #[tokio::test]
    async fn winner_count_is_clamped() {
        let (_platform, engine) = setup();
        let low = engine.start(raffle("low", 0)).await.unwrap();
        let high = engine.start(raffle("high", 50)).await.unwrap();
        assert_eq!(low.number_of_winners, 1);
        assert_eq!(high.number_of_winners, MAX_WINNERS);
    }

    #[tokio::test]
    async fn entering_twice_is_idempotent() {
        let (_platform, engine) = setup();
        engine.start(raffle("giveaway1", 1)).await.unwrap();

        let first = engine.enter(GUILD, "Giveaway1", user(1)).await.unwrap();
        let second = engine.enter(GUILD, "giveaway1", user(1)).await.unwrap();

        assert!(matches!(first, EntryOutcome::Entered(ref s) if s.entry_count == 1));
        assert!(matches!(second, EntryOutcome::AlreadyEntered(ref s) if s.entry_count == 1));
        assert!(engine.has_entered(GUILD, "GIVEAWAY1", user(1)).await);
    }

    #[tokio::test]
    async fn entering_unknown_raffle_fails() {
        let (_platform, engine) = setup();
        let err = engine.enter(GUILD, "missing", user(1)).await.unwrap_err();
        assert!(matches!(err, RaffleError::RaffleNotFound(_)));
    }

    #[tokio::test]
    async fn entering_after_end_time_fails() {
        let (_platform, engine) = setup();
        let now = Utc::now();
        engine.start_at(raffle("giveaway1", 1), now).await.unwrap();

        let at_end = now + TimeDelta::hours(1);
        assert!(engine.enter_at(GUILD, "giveaway1", user(1), at_end).await.is_ok());

        let late = at_end + TimeDelta::seconds(1);
        let err = engine
            .enter_at(GUILD, "giveaway1", user(2), late)
            .await
            .unwrap_err();
        assert!(matches!(err, RaffleError::RaffleExpired(_)));
        assert_eq!(engine.get(GUILD, "giveaway1").await.unwrap().entry_count, 1);
    }

    #[tokio::test]
    async fn pick_draws_unique_winners_and_resolves() {
        let (_platform, engine) = setup();
        engine.start(raffle("giveaway1", 2)).await.unwrap();
        for id in 1..=3 {
            engine.enter(GUILD, "giveaway1", user(id)).await.unwrap();
        }

        let result = engine.pick_winners(GUILD, "giveaway1", ADMIN).await.unwrap();

        assert_eq!(result.winners.len(), 2);
        assert_ne!(result.winners[0], result.winners[1]);
        assert!(result.winners.iter().all(|w| (1..=3).contains(&w.get())));
        assert_eq!(result.valid_entries, 3);
        assert_eq!(result.total_entries, 3);
        assert!(engine.get(GUILD, "giveaway1").await.is_none());

        let err = engine.enter(GUILD, "giveaway1", user(4)).await.unwrap_err();
        assert!(matches!(err, RaffleError::RaffleNotFound(_)));
        let err = engine
            .pick_winners(GUILD, "giveaway1", ADMIN)
            .await
            .unwrap_err();
        assert!(matches!(err, RaffleError::RaffleNotFound(_)));
    }

    #[tokio::test]
    async fn fewer_entrants_than_winners_picks_everyone() {
        let (_platform, engine) = setup();
        engine.start(raffle("giveaway1", 5)).await.unwrap();
        engine.enter(GUILD, "giveaway1", user(1)).await.unwrap();
        engine.enter(GUILD, "giveaway1", user(2)).await.unwrap();

        let result = engine.pick_winners(GUILD, "giveaway1", ADMIN).await.unwrap();
        let mut winners = result.winners.clone();
        winners.sort();
        assert_eq!(winners, vec![user(1), user(2)]);
    }

    #[tokio::test]
    async fn service_accounts_are_dropped_at_draw_time() {
        let (platform, engine) = setup();
        platform.with(|s| {
            s.bots.insert(user(2));
            s.unknown_users.insert(user(3));
        });
        engine.start(raffle("giveaway1", 10)).await.unwrap();
        for id in 1..=3 {
            engine.enter(GUILD, "giveaway1", user(id)).await.unwrap();
        }

        let result = engine.pick_winners(GUILD, "giveaway1", ADMIN).await.unwrap();

        let mut winners = result.winners.clone();
        winners.sort();
        assert_eq!(winners, vec![user(1), user(3)]);
        assert_eq!(result.valid_entries, 2);
        assert_eq!(result.total_entries, 3);
    }

    #[tokio::test]
    async fn no_valid_entries_keeps_raffle_open() {
        let (platform, engine) = setup();
        platform.with(|s| {
            s.bots.insert(user(2));
        });
        engine.start(raffle("giveaway1", 1)).await.unwrap();

        let err = engine
            .pick_winners(GUILD, "giveaway1", ADMIN)
            .await
            .unwrap_err();
        assert!(matches!(err, RaffleError::NoValidEntries(_)));

        engine.enter(GUILD, "giveaway1", user(2)).await.unwrap();
        let err = engine
            .pick_winners(GUILD, "giveaway1", ADMIN)
            .await
            .unwrap_err();
        assert!(matches!(err, RaffleError::NoValidEntries(_)));

        engine.enter(GUILD, "giveaway1", user(1)).await.unwrap();
        let result = engine.pick_winners(GUILD, "giveaway1", ADMIN).await.unwrap();
        assert_eq!(result.winners, vec![user(1)]);
    }

    #[tokio::test]
    async fn only_admins_can_pick() {
        let (_platform, engine) = setup();
        engine.start(raffle("giveaway1", 1)).await.unwrap();
        engine.enter(GUILD, "giveaway1", user(1)).await.unwrap();

        let err = engine
            .pick_winners(GUILD, "giveaway1", user(1))
            .await
            .unwrap_err();
        assert!(matches!(err, RaffleError::NotPermitted));
        assert!(engine.get(GUILD, "giveaway1").await.is_some());
    }

    #[tokio::test]
    async fn draw_in_progress_turns_away_entries_and_cancels() {
        let (_platform, engine) = setup();
        engine.start(raffle("giveaway1", 1)).await.unwrap();
        let key = RaffleKey::new(GUILD, "giveaway1");
        engine
            .store
            .write(|table| {
                if let Some(raffle) = table.raffles.get_mut(&key) {
                    raffle.status = RaffleStatus::Drawing;
                }
            })
            .await;

        let err = engine.enter(GUILD, "giveaway1", user(1)).await.unwrap_err();
        assert!(matches!(err, RaffleError::DrawInProgress(_)));
        let err = engine
            .pick_winners(GUILD, "giveaway1", ADMIN)
            .await
            .unwrap_err();
        assert!(matches!(err, RaffleError::DrawInProgress(_)));
        let err = engine.cancel(GUILD, "giveaway1").await.unwrap_err();
        assert!(matches!(err, RaffleError::DrawInProgress(_)));
    }

    #[tokio::test]
    async fn concurrent_picks_resolve_once() {
        let (_platform, engine) = setup();
        engine.start(raffle("giveaway1", 1)).await.unwrap();
        engine.enter(GUILD, "giveaway1", user(1)).await.unwrap();

        let (a, b) = tokio::join!(
            engine.pick_winners(GUILD, "giveaway1", ADMIN),
            engine.pick_winners(GUILD, "giveaway1", ADMIN)
        );

        assert_eq!([&a, &b].iter().filter(|r| r.is_ok()).count(), 1);
    }

    #[tokio::test]
    async fn cancel_removes_raffle() {
        let (_platform, engine) = setup();
        engine.start(raffle("giveaway1", 1)).await.unwrap();

        let summary = engine.cancel(GUILD, "GiveAway1").await.unwrap();
        assert_eq!(summary.name, "giveaway1");
        assert!(engine.get(GUILD, "giveaway1").await.is_none());
        assert!(matches!(
            engine.cancel(GUILD, "giveaway1").await,
            Err(RaffleError::RaffleNotFound(_))
        ));
        assert!(engine.start(raffle("giveaway1", 1)).await.is_ok());
    }

    #[tokio::test]
    async fn active_in_lists_guild_raffles_oldest_first() {
        let (_platform, engine) = setup();
        let now = Utc::now();
        engine
            .start_at(raffle("second", 1), now + TimeDelta::minutes(1))
            .await
            .unwrap();
        engine.start_at(raffle("first", 1), now).await.unwrap();
        let mut elsewhere = raffle("other", 1);
        elsewhere.guild_id = OTHER_GUILD;
        engine.start_at(elsewhere, now).await.unwrap();

        let names: Vec<_> = engine
            .active_in(GUILD)
            .await
            .into_iter()
            .map(|raffle| raffle.name)
            .collect();
        assert_eq!(names, vec!["first", "second"]);
        assert_eq!(engine.matching_names(GUILD, "SEC").await, vec!["second"]);
    }

    #[tokio::test]
    async fn announcement_message_is_recorded() {
        let (_platform, engine) = setup();
        engine.start(raffle("giveaway1", 1)).await.unwrap();

        assert!(
            engine
                .attach_announcement(GUILD, "Giveaway1", MessageId::new(77))
                .await
        );
        assert!(
            !engine
                .attach_announcement(GUILD, "missing", MessageId::new(78))
                .await
        );
        let summary = engine.get(GUILD, "giveaway1").await.unwrap();
        assert_eq!(summary.announcement_message_id, Some(MessageId::new(77)));
    }
}
