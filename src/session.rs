use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::time::Duration;

use lru::LruCache;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::movies::MovieHit;

/// What the bot remembers about one chat between two messages.
#[derive(Clone, Debug, Default)]
pub struct ChatSession {
    /// Link waiting for a tier button.
    pub media_url: Option<String>,
    /// Short id -> page URL of the last movie search.
    pub movies: HashMap<String, String>,
}

struct Entry {
    session: ChatSession,
    last_updated: Instant,
}

/// Per-chat state bounded in size (least recently used chats are evicted)
/// and in lifetime (entries untouched for longer than the TTL are dropped).
pub struct SessionStore {
    entries: Mutex<LruCache<i64, Entry>>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(capacity: NonZeroUsize, ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            ttl,
        }
    }

    /// Current session for `chat_id`, or `None` when absent or expired.
    pub async fn get(&self, chat_id: i64) -> Option<ChatSession> {
        let mut entries = self.entries.lock().await;
        let expired = match entries.get(&chat_id) {
            Some(entry) if entry.last_updated.elapsed() < self.ttl => return Some(entry.session.clone()),
            Some(_) => true,
            None => false,
        };
        if expired {
            log::debug!("Session for chat {} expired", chat_id);
            entries.pop(&chat_id);
        }
        None
    }

    async fn update(&self, chat_id: i64, apply: impl FnOnce(&mut ChatSession)) {
        let mut entries = self.entries.lock().await;
        let mut session = match entries.pop(&chat_id) {
            Some(entry) if entry.last_updated.elapsed() < self.ttl => entry.session,
            _ => ChatSession::default(),
        };
        apply(&mut session);
        if let Some((evicted, _)) = entries.push(
            chat_id,
            Entry {
                session,
                last_updated: Instant::now(),
            },
        ) {
            if evicted != chat_id {
                log::debug!("Session store full, evicted chat {}", evicted);
            }
        }
    }

    pub async fn remember_media_url(&self, chat_id: i64, url: String) {
        self.update(chat_id, |session| session.media_url = Some(url)).await;
    }

    pub async fn media_url(&self, chat_id: i64) -> Option<String> {
        self.get(chat_id).await.and_then(|session| session.media_url)
    }

    /// Replaces the chat's movie results with `hits`.
    pub async fn remember_movies(&self, chat_id: i64, hits: &[MovieHit]) {
        let movies = hits.iter().map(|hit| (hit.id.clone(), hit.url.clone())).collect();
        self.update(chat_id, |session| session.movies = movies).await;
    }

    pub async fn movie_url(&self, chat_id: i64, movie_id: &str) -> Option<String> {
        self.get(chat_id)
            .await
            .and_then(|session| session.movies.get(movie_id).cloned())
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(capacity: usize, ttl_secs: u64) -> SessionStore {
        SessionStore::new(NonZeroUsize::new(capacity).unwrap(), Duration::from_secs(ttl_secs))
    }

    fn hit(id: &str, url: &str) -> MovieHit {
        MovieHit {
            id: id.to_string(),
            title: format!("Title {}", id),
            url: url.to_string(),
        }
    }

    #[tokio::test]
    async fn sessions_are_isolated_per_chat() {
        let sessions = store(10, 60);
        sessions.remember_media_url(1, "https://a.example/v".to_string()).await;
        sessions.remember_media_url(2, "https://b.example/v".to_string()).await;

        assert_eq!(sessions.media_url(1).await.as_deref(), Some("https://a.example/v"));
        assert_eq!(sessions.media_url(2).await.as_deref(), Some("https://b.example/v"));
        assert_eq!(sessions.media_url(3).await, None);
    }

    #[tokio::test]
    async fn movie_results_replace_previous_search_but_keep_link() {
        let sessions = store(10, 60);
        sessions.remember_media_url(7, "https://a.example/v".to_string()).await;
        sessions.remember_movies(7, &[hit("link0", "https://m.example/a")]).await;
        sessions.remember_movies(7, &[hit("link1", "https://m.example/b")]).await;

        assert_eq!(sessions.movie_url(7, "link0").await, None);
        assert_eq!(sessions.movie_url(7, "link1").await.as_deref(), Some("https://m.example/b"));
        assert_eq!(sessions.media_url(7).await.as_deref(), Some("https://a.example/v"));
    }

    #[tokio::test]
    async fn least_recently_used_chat_is_evicted() {
        let sessions = store(2, 60);
        sessions.remember_media_url(1, "one".to_string()).await;
        sessions.remember_media_url(2, "two".to_string()).await;
        // Touch chat 1 so chat 2 becomes the eviction candidate.
        assert!(sessions.media_url(1).await.is_some());
        sessions.remember_media_url(3, "three".to_string()).await;

        assert_eq!(sessions.len().await, 2);
        assert_eq!(sessions.media_url(2).await, None);
        assert!(sessions.media_url(1).await.is_some());
        assert!(sessions.media_url(3).await.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn entries_expire_after_ttl() {
        let sessions = store(10, 60);
        sessions.remember_media_url(1, "https://a.example/v".to_string()).await;

        tokio::time::advance(Duration::from_secs(59)).await;
        assert!(sessions.media_url(1).await.is_some());

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(sessions.media_url(1).await, None);
        assert_eq!(sessions.len().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn writing_to_an_expired_session_starts_fresh() {
        let sessions = store(10, 60);
        sessions.remember_movies(1, &[hit("link0", "https://m.example/a")]).await;

        tokio::time::advance(Duration::from_secs(120)).await;
        sessions.remember_media_url(1, "https://a.example/v".to_string()).await;

        assert_eq!(sessions.movie_url(1, "link0").await, None);
        assert!(sessions.media_url(1).await.is_some());
    }
}
