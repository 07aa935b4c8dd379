// Mood-driven playlist side effect
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::error::BotError;
use crate::gateway::{with_timeout, ContentGateway};
use crate::models::{ContentItem, Playlist, PriceObservation};
use crate::mood::{self, Mood};
use crate::Result;

pub const DEFAULT_SEARCH_LIMIT: usize = 10;

#[derive(Debug, Clone)]
pub struct PlaylistOutcome {
    pub mood: Mood,
    pub category: String,
    pub playlist: Playlist,
    pub items_added: usize,
}

/// Builds one playlist per call from the mood of a fixed observation set
pub struct PlaylistCurator {
    gateway: Arc<dyn ContentGateway>,
    owner_id: String,
    observations: Vec<PriceObservation>,
    search_limit: usize,
    call_timeout: Duration,
    rng: Mutex<StdRng>,
}

impl PlaylistCurator {
    pub fn new(
        gateway: Arc<dyn ContentGateway>,
        owner_id: impl Into<String>,
        observations: Vec<PriceObservation>,
        call_timeout: Duration,
    ) -> Self {
        Self {
            gateway,
            owner_id: owner_id.into(),
            observations,
            search_limit: DEFAULT_SEARCH_LIMIT,
            call_timeout,
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    pub fn with_search_limit(mut self, search_limit: usize) -> Self {
        self.search_limit = search_limit;
        self
    }

    /// Fix the RNG seed (tests, reproducible dry runs)
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = Mutex::new(StdRng::seed_from_u64(seed));
        self
    }

    /// Resolve the playlist owner, then build a curator for them
    pub async fn connect(
        gateway: Arc<dyn ContentGateway>,
        observations: Vec<PriceObservation>,
        call_timeout: Duration,
    ) -> Result<Self> {
        let owner_id =
            with_timeout(call_timeout, "user lookup", gateway.current_user_id()).await?;
        tracing::info!("✓ Content account resolved: {}", owner_id);
        Ok(Self::new(gateway, owner_id, observations, call_timeout))
    }

    pub async fn curate(&self) -> Result<PlaylistOutcome> {
        let selection = self.select_category()?;
        tracing::info!(
            mood = %selection.mood,
            "Market mood is {} - picking category '{}'",
            selection.mood,
            selection.category
        );

        let items = with_timeout(
            self.call_timeout,
            "content search",
            self.gateway
                .search_by_category(selection.category, self.search_limit),
        )
        .await?;

        if items.is_empty() {
            return Err(BotError::NoResults(selection.category.to_string()));
        }

        if let Some(track) = self.feature(&items) {
            tracing::info!(
                "🎵 Selected track: {} by {} in category {}",
                track.name,
                track.artist.as_deref().unwrap_or("unknown artist"),
                selection.category
            );
        }

        let name = format!("My Playlist based on {}", selection.category);
        let playlist = with_timeout(
            self.call_timeout,
            "playlist creation",
            self.gateway.create_playlist(&self.owner_id, &name),
        )
        .await?;

        let refs: Vec<String> = items.iter().map(|i| i.uri.clone()).collect();
        with_timeout(
            self.call_timeout,
            "playlist update",
            self.gateway.add_items(&playlist.id, &refs),
        )
        .await?;

        tracing::info!(
            "✓ Playlist '{}' created with {} {} tracks based on stock performance",
            playlist.name,
            refs.len(),
            selection.category
        );

        Ok(PlaylistOutcome {
            mood: selection.mood,
            category: selection.category.to_string(),
            playlist,
            items_added: refs.len(),
        })
    }

    fn select_category(&self) -> Result<mood::MoodSelection> {
        let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        mood::select(&self.observations, &mut *rng)
            .ok_or_else(|| BotError::NoResults("<no price observations>".to_string()))
    }

    fn feature<'a>(&self, items: &'a [ContentItem]) -> Option<&'a ContentItem> {
        let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        items.choose(&mut *rng)
    }
}
