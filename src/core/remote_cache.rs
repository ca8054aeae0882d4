/*
 * Caches the results of server fetches keyed by logical resource, deduplicates
 * concurrent requests for the same resource, and decides which completed fetch
 * is allowed to commit.
 *
 * Every issued fetch gets a `FetchTicket` carrying a per-cache request id. Only
 * the most recently issued ticket for a key may commit its result; a result that
 * arrives for an older ticket is reported as `Superseded` and discarded. A
 * failed fetch never disturbs the previously cached entry.
 *
 * The cache is owned by the event-loop side of the application and mutated with
 * `&mut self`; the actual network I/O happens elsewhere and reports back through
 * `complete`.
 */
use crate::core::remote_api::FetchError;
use std::collections::HashMap;
use time::OffsetDateTime;

// Logical identity of a remote resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKey {
    Reports,
}

impl ResourceKey {
    // Path of the resource relative to the API base URL.
    pub fn endpoint(&self) -> &'static str {
        match self {
            ResourceKey::Reports => "/api/reports",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ResourceKey::Reports => "reports",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim() {
            "reports" => Some(ResourceKey::Reports),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FetchTicket {
    pub key: ResourceKey,
    pub request_id: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub key: ResourceKey,
    pub payload: serde_json::Value,
    pub fetched_at: OffsetDateTime,
    pub is_stale: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CacheLookup {
    // A fresh entry exists; no fetch is needed.
    Fresh(serde_json::Value),
    // A fetch for this key is already outstanding.
    InFlight(FetchTicket),
    // The caller must perform a fetch for this ticket.
    Fetch(FetchTicket),
}

#[derive(Debug, Clone, PartialEq)]
pub enum FetchCommit {
    Committed(serde_json::Value),
    Superseded,
    Failed(FetchError),
}

pub struct RemoteDataCache {
    stale_after: time::Duration,
    entries: HashMap<ResourceKey, CacheEntry>,
    in_flight: HashMap<ResourceKey, FetchTicket>,
    next_request_id: u64,
}

impl RemoteDataCache {
    pub fn new(stale_after: std::time::Duration) -> Self {
        RemoteDataCache {
            stale_after: time::Duration::try_from(stale_after).unwrap_or(time::Duration::MAX),
            entries: HashMap::new(),
            in_flight: HashMap::new(),
            next_request_id: 1,
        }
    }

    pub fn entry(&self, key: ResourceKey) -> Option<&CacheEntry> {
        self.entries.get(&key)
    }

    pub fn is_fresh(&self, key: ResourceKey, now: OffsetDateTime) -> bool {
        self.entries
            .get(&key)
            .is_some_and(|entry| !entry.is_stale && now - entry.fetched_at < self.stale_after)
    }

    /*
     * Returns the cached payload when it is fresh, joins an outstanding fetch for
     * the same key, or issues a new ticket the caller must fetch for.
     */
    pub fn request(&mut self, key: ResourceKey, now: OffsetDateTime) -> CacheLookup {
        if self.is_fresh(key, now) {
            if let Some(entry) = self.entries.get(&key) {
                log::trace!("RemoteDataCache: '{}' is fresh.", key.name());
                return CacheLookup::Fresh(entry.payload.clone());
            }
        }
        if let Some(ticket) = self.in_flight.get(&key) {
            log::trace!(
                "RemoteDataCache: '{}' already in flight as request {}.",
                key.name(),
                ticket.request_id
            );
            return CacheLookup::InFlight(*ticket);
        }
        CacheLookup::Fetch(self.issue_ticket(key))
    }

    // Issues a new ticket unconditionally; any outstanding ticket for the key is superseded.
    pub fn refetch(&mut self, key: ResourceKey) -> FetchTicket {
        self.issue_ticket(key)
    }

    fn issue_ticket(&mut self, key: ResourceKey) -> FetchTicket {
        let ticket = FetchTicket {
            key,
            request_id: self.next_request_id,
        };
        self.next_request_id += 1;
        if let Some(previous) = self.in_flight.insert(key, ticket) {
            log::debug!(
                "RemoteDataCache: Request {} for '{}' supersedes request {}.",
                ticket.request_id,
                key.name(),
                previous.request_id
            );
        }
        ticket
    }

    /*
     * Records the outcome of the fetch for `ticket`. Results for anything other
     * than the latest ticket of the key are discarded. On failure the prior
     * entry is left untouched.
     */
    pub fn complete(
        &mut self,
        ticket: FetchTicket,
        result: Result<serde_json::Value, FetchError>,
        now: OffsetDateTime,
    ) -> FetchCommit {
        if self.in_flight.get(&ticket.key) != Some(&ticket) {
            log::debug!(
                "RemoteDataCache: Discarding result of superseded request {} for '{}'.",
                ticket.request_id,
                ticket.key.name()
            );
            return FetchCommit::Superseded;
        }
        self.in_flight.remove(&ticket.key);

        match result {
            Ok(payload) => {
                self.entries.insert(
                    ticket.key,
                    CacheEntry {
                        key: ticket.key,
                        payload: payload.clone(),
                        fetched_at: now,
                        is_stale: false,
                    },
                );
                FetchCommit::Committed(payload)
            }
            Err(e) => {
                log::warn!(
                    "RemoteDataCache: Request {} for '{}' failed: {e}",
                    ticket.request_id,
                    ticket.key.name()
                );
                FetchCommit::Failed(e)
            }
        }
    }

    pub fn invalidate(&mut self, key: ResourceKey) {
        if let Some(entry) = self.entries.get_mut(&key) {
            entry.is_stale = true;
        }
    }

    /*
     * Drops every entry and forgets outstanding requests, so results still in
     * flight are discarded when they arrive.
     */
    pub fn clear(&mut self) {
        self.entries.clear();
        self.in_flight.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    fn t0() -> OffsetDateTime {
        OffsetDateTime::UNIX_EPOCH + time::Duration::days(20_000)
    }

    #[test]
    fn test_request_issues_ticket_then_dedupes() {
        let mut cache = RemoteDataCache::new(Duration::from_secs(60));

        let first = cache.request(ResourceKey::Reports, t0());
        let second = cache.request(ResourceKey::Reports, t0());

        let CacheLookup::Fetch(ticket) = first else {
            panic!("Expected a fetch ticket, got {first:?}");
        };
        assert_eq!(second, CacheLookup::InFlight(ticket));
    }

    #[test]
    fn test_committed_entry_is_fresh_until_stale_after() {
        // Arrange
        let mut cache = RemoteDataCache::new(Duration::from_secs(60));
        let CacheLookup::Fetch(ticket) = cache.request(ResourceKey::Reports, t0()) else {
            panic!("Expected a fetch ticket");
        };

        // Act
        let commit = cache.complete(ticket, Ok(json!([{"name": "This Week", "tasks": 5}])), t0());

        // Assert
        assert!(matches!(commit, FetchCommit::Committed(_)));
        assert!(matches!(
            cache.request(ResourceKey::Reports, t0() + time::Duration::seconds(59)),
            CacheLookup::Fresh(_)
        ));
        assert!(matches!(
            cache.request(ResourceKey::Reports, t0() + time::Duration::seconds(61)),
            CacheLookup::Fetch(_)
        ));
        let entry = cache.entry(ResourceKey::Reports).unwrap();
        assert_eq!(entry.fetched_at, t0());
    }

    #[test]
    fn test_late_result_of_superseded_request_is_discarded() {
        // Arrange: fetch A then fetch B for the same key.
        let mut cache = RemoteDataCache::new(Duration::from_secs(60));
        let ticket_a = cache.refetch(ResourceKey::Reports);
        let ticket_b = cache.refetch(ResourceKey::Reports);

        // Act: B resolves first, A arrives late.
        let commit_b = cache.complete(ticket_b, Ok(json!("B")), t0());
        let commit_a = cache.complete(ticket_a, Ok(json!("A")), t0());

        // Assert
        assert_eq!(commit_b, FetchCommit::Committed(json!("B")));
        assert_eq!(commit_a, FetchCommit::Superseded);
        assert_eq!(cache.entry(ResourceKey::Reports).unwrap().payload, json!("B"));
    }

    #[test]
    fn test_failure_keeps_prior_entry() {
        let mut cache = RemoteDataCache::new(Duration::from_secs(60));
        let first = cache.refetch(ResourceKey::Reports);
        cache.complete(first, Ok(json!("old")), t0());

        let second = cache.refetch(ResourceKey::Reports);
        let commit = cache.complete(second, Err(FetchError::Status(500)), t0());

        assert_eq!(commit, FetchCommit::Failed(FetchError::Status(500)));
        assert_eq!(cache.entry(ResourceKey::Reports).unwrap().payload, json!("old"));
        // The failed request no longer counts as in flight.
        assert!(matches!(
            cache.request(ResourceKey::Reports, t0()),
            CacheLookup::Fresh(_)
        ));
    }

    #[test]
    fn test_invalidate_forces_refetch() {
        let mut cache = RemoteDataCache::new(Duration::from_secs(60));
        let ticket = cache.refetch(ResourceKey::Reports);
        cache.complete(ticket, Ok(json!([])), t0());

        cache.invalidate(ResourceKey::Reports);

        assert!(cache.entry(ResourceKey::Reports).unwrap().is_stale);
        assert!(matches!(
            cache.request(ResourceKey::Reports, t0()),
            CacheLookup::Fetch(_)
        ));
    }

    #[test]
    fn test_clear_discards_in_flight_results() {
        let mut cache = RemoteDataCache::new(Duration::from_secs(60));
        let ticket = cache.refetch(ResourceKey::Reports);

        cache.clear();

        assert_eq!(
            cache.complete(ticket, Ok(json!([])), t0()),
            FetchCommit::Superseded
        );
        assert!(cache.entry(ResourceKey::Reports).is_none());
    }

    #[test]
    fn test_resource_key_names() {
        assert_eq!(ResourceKey::from_name("reports"), Some(ResourceKey::Reports));
        assert_eq!(ResourceKey::from_name("tasks"), None);
        assert_eq!(ResourceKey::Reports.endpoint(), "/api/reports");
    }
}
