use std::sync::Arc;

use anyhow::Result;
use dashmap::DashMap;
use poise::serenity_prelude as serenity;
use serenity::all::{GuildId, UserId};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::db::Db;

pub type Ctx<'a> = poise::Context<'a, std::sync::Arc<AppState>, anyhow::Error>;

/// AppState: holds Db and the in-memory award locks.
/// No SQL here; only quick state helpers.
pub struct AppState {
    pub db: Db,

    /// award_locks[(guild_id, user_id)] serializes XP awards for one member.
    pub award_locks: AwardLocks,
}

impl AppState {
    pub async fn new(db_url: &str) -> Result<Arc<Self>, anyhow::Error> {
        let db = crate::db::Db::connect(db_url).await?;
        Ok(Arc::new(Self {
            db,
            award_locks: AwardLocks::default(),
        }))
    }
}

/// One async mutex per (guild, user), created on demand and dropped from the
/// table once nobody holds or waits on it.
#[derive(Default)]
pub struct AwardLocks {
    inner: DashMap<(GuildId, UserId), Arc<Mutex<()>>>,
}

impl AwardLocks {
    pub async fn lock(&self, guild_id: GuildId, user_id: UserId) -> AwardGuard<'_> {
        let key = (guild_id, user_id);
        let cell = Arc::clone(self.inner.entry(key).or_default().value());
        let guard = cell.lock_owned().await;
        AwardGuard {
            locks: self,
            key,
            guard: Some(guard),
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.inner.len()
    }
}

pub struct AwardGuard<'a> {
    locks: &'a AwardLocks,
    key: (GuildId, UserId),
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for AwardGuard<'_> {
    fn drop(&mut self) {
        // Release first so our own Arc no longer counts.
        self.guard.take();
        self.locks
            .inner
            .remove_if(&self.key, |_, cell| Arc::strong_count(cell) == 1);
    }
}
