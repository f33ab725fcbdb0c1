//! # Lyrics Provider Module
//!
//! Client for the LRCLib lyrics catalog, returning both synced (LRC format)
//! and plain text lyrics.
//!
//! ## Endpoints
//!
//! - `GET /get?track_name=&artist_name=&album_name=&duration=` returns one record
//! - `GET /search?q=` or `?track_name=&artist_name=&album_name=` returns a list
//! - `GET /get/{id}` returns one record by catalog id
//!
//! Failures come back as a non-200 status with a `{code, name, message}` body.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use core_metadata::lyrics::{LrcLibClient, LyricsProvider, LyricsQuery};
//!
//! let client = LrcLibClient::new(http_client, "https://lrclib.net/api", "refrain/0.1.0");
//!
//! let query = LyricsQuery::new("Track Title", "Artist Name")
//!     .with_album("Album Name")
//!     .with_duration(180);
//! let record = client.get(&query).await?;
//!
//! if !record.instrumental {
//!     println!("{}", record.synced_lyrics);
//! }
//! ```

use crate::error::{MetadataError, Result};
use async_trait::async_trait;
use bridge_traits::http::{HttpClient, HttpRequest, HttpResponse};
use serde::{Deserialize, Deserializer, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

/// Public LRCLib API root
pub const DEFAULT_BASE_URL: &str = "https://lrclib.net/api";

const TRACK_NAME_PARAM: &str = "track_name";
const ARTIST_NAME_PARAM: &str = "artist_name";
const ALBUM_NAME_PARAM: &str = "album_name";
const DURATION_PARAM: &str = "duration";

// =============================================================================
// Core Types
// =============================================================================

/// Parameters for an exact `/get` lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LyricsQuery {
    /// Track title
    pub track: String,
    /// Artist name
    pub artist: String,
    /// Album name
    pub album: Option<String>,
    /// Track duration in whole seconds, must be positive
    pub duration_secs: i64,
}

impl LyricsQuery {
    /// Create a query with no album and no duration
    pub fn new(track: impl Into<String>, artist: impl Into<String>) -> Self {
        Self {
            track: track.into(),
            artist: artist.into(),
            album: None,
            duration_secs: 0,
        }
    }

    pub fn with_album(mut self, album: impl Into<String>) -> Self {
        self.album = Some(album.into());
        self
    }

    pub fn with_duration(mut self, secs: i64) -> Self {
        self.duration_secs = secs;
        self
    }
}

/// Parameters for a `/search` request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchParams {
    /// Free-text query (`q=`)
    Query(String),
    /// Field search
    Fields {
        track: String,
        artist: String,
        album: Option<String>,
    },
}

impl SearchParams {
    pub fn fields(track: impl Into<String>, artist: impl Into<String>) -> Self {
        SearchParams::Fields {
            track: track.into(),
            artist: artist.into(),
            album: None,
        }
    }
}

/// A lyrics record as returned by the catalog
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LyricsRecord {
    pub id: i64,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub track_name: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub artist_name: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub album_name: String,
    #[serde(default)]
    pub duration: f64,
    #[serde(default)]
    pub instrumental: bool,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub plain_lyrics: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub synced_lyrics: String,
}

impl LyricsRecord {
    /// True when at least one lyric variant is non-empty
    pub fn has_lyrics(&self) -> bool {
        !self.plain_lyrics.is_empty() || !self.synced_lyrics.is_empty()
    }

    /// Pick the most useful record from a search result list
    ///
    /// Prefers a record with synced lyrics, then one with plain lyrics, then the
    /// first record.
    pub fn select_best(records: &[LyricsRecord]) -> Option<&LyricsRecord> {
        records
            .iter()
            .find(|r| !r.synced_lyrics.is_empty())
            .or_else(|| records.iter().find(|r| r.has_lyrics()))
            .or_else(|| records.first())
    }
}

/// Lyrics resolved for a single task execution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LyricsResult {
    pub instrumental: bool,
    pub plain_lyrics: String,
    pub synced_lyrics: String,
    pub source_id: String,
}

impl From<LyricsRecord> for LyricsResult {
    fn from(record: LyricsRecord) -> Self {
        Self {
            instrumental: record.instrumental,
            plain_lyrics: record.plain_lyrics,
            synced_lyrics: record.synced_lyrics,
            source_id: record.id.to_string(),
        }
    }
}

/// Error body returned by the catalog with non-200 statuses
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    #[allow(dead_code)]
    code: i64,
    #[serde(default)]
    name: String,
    #[serde(default)]
    message: String,
}

fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

// =============================================================================
// Provider Trait
// =============================================================================

/// Remote lyrics catalog
///
/// All input validation happens before any network call; invalid input is
/// reported as [`MetadataError::InvalidQuery`] or
/// [`MetadataError::InvalidDuration`].
#[async_trait]
pub trait LyricsProvider: Send + Sync {
    /// Exact lookup by track, artist, album and duration
    async fn get(&self, query: &LyricsQuery) -> Result<LyricsRecord>;

    /// Search by free text or fields
    ///
    /// An empty list is a successful response.
    async fn search(&self, params: &SearchParams) -> Result<Vec<LyricsRecord>>;

    /// Lookup by catalog identifier
    async fn get_by_id(&self, id: &str) -> Result<LyricsRecord>;
}

// =============================================================================
// LRCLib Client
// =============================================================================

/// LRCLib catalog client over the host [`HttpClient`]
pub struct LrcLibClient {
    http_client: Arc<dyn HttpClient>,
    base_url: String,
    user_agent: String,
}

impl LrcLibClient {
    pub fn new(
        http_client: Arc<dyn HttpClient>,
        base_url: impl Into<String>,
        user_agent: impl Into<String>,
    ) -> Self {
        Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            user_agent: user_agent.into(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn craft_url(&self, endpoint: &str, params: &[(&str, &str)]) -> String {
        let mut url = format!("{}{}", self.base_url, endpoint);
        for (i, (key, value)) in params.iter().enumerate() {
            url.push(if i == 0 { '?' } else { '&' });
            url.push_str(key);
            url.push('=');
            url.push_str(&urlencoding::encode(value));
        }
        url
    }

    async fn fetch(&self, url: String) -> Result<HttpResponse> {
        debug!(url = %url, "LRCLib request");

        let request = HttpRequest::get(url)
            .user_agent(self.user_agent.clone())
            .header("Accept", "application/json");
        let response = self.http_client.execute(request).await?;

        if response.status != 200 {
            return Err(Self::api_error(&response));
        }
        Ok(response)
    }

    fn api_error(response: &HttpResponse) -> MetadataError {
        let (name, message) = match serde_json::from_slice::<ApiErrorBody>(&response.body) {
            Ok(body) if !body.message.is_empty() => (body.name, body.message),
            _ => (
                String::new(),
                String::from_utf8_lossy(&response.body).trim().to_string(),
            ),
        };

        if response.status == 404 {
            let message = if message.is_empty() {
                "no matching lyrics".to_string()
            } else {
                message
            };
            return MetadataError::LyricsNotFound(message);
        }

        warn!(status = response.status, name = %name, "LRCLib API error");
        MetadataError::LyricsApi {
            status: response.status,
            name,
            message,
        }
    }

    fn decode<T: serde::de::DeserializeOwned>(response: &HttpResponse) -> Result<T> {
        response.json().map_err(|e| MetadataError::LyricsApi {
            status: response.status,
            name: "InvalidResponse".to_string(),
            message: e.to_string(),
        })
    }
}

#[async_trait]
impl LyricsProvider for LrcLibClient {
    async fn get(&self, query: &LyricsQuery) -> Result<LyricsRecord> {
        if query.track.trim().is_empty() || query.artist.trim().is_empty() {
            return Err(MetadataError::InvalidQuery(
                "track name and artist name are required".to_string(),
            ));
        }
        if query.duration_secs <= 0 {
            return Err(MetadataError::InvalidDuration(query.duration_secs));
        }

        let duration = query.duration_secs.to_string();
        let mut params = vec![
            (TRACK_NAME_PARAM, query.track.as_str()),
            (ARTIST_NAME_PARAM, query.artist.as_str()),
        ];
        if let Some(album) = &query.album {
            params.push((ALBUM_NAME_PARAM, album.as_str()));
        }
        params.push((DURATION_PARAM, duration.as_str()));

        let response = self.fetch(self.craft_url("/get", &params)).await?;
        Self::decode(&response)
    }

    async fn search(&self, params: &SearchParams) -> Result<Vec<LyricsRecord>> {
        let query: Vec<(&str, &str)> = match params {
            SearchParams::Query(q) if !q.trim().is_empty() => vec![("q", q.as_str())],
            SearchParams::Fields {
                track,
                artist,
                album,
            } if !track.trim().is_empty() && !artist.trim().is_empty() => {
                let mut fields = vec![
                    (TRACK_NAME_PARAM, track.as_str()),
                    (ARTIST_NAME_PARAM, artist.as_str()),
                ];
                if let Some(album) = album {
                    fields.push((ALBUM_NAME_PARAM, album.as_str()));
                }
                fields
            }
            _ => {
                return Err(MetadataError::InvalidQuery(
                    "insufficient search parameters provided".to_string(),
                ))
            }
        };

        let response = self.fetch(self.craft_url("/search", &query)).await?;
        Self::decode(&response)
    }

    async fn get_by_id(&self, id: &str) -> Result<LyricsRecord> {
        if id.trim().is_empty() {
            return Err(MetadataError::InvalidQuery("lyrics ID is required".to_string()));
        }

        let endpoint = format!("/get/{}", urlencoding::encode(id));
        let response = self.fetch(self.craft_url(&endpoint, &[])).await?;
        Self::decode(&response)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::error::BridgeError;
    use bytes::Bytes;
    use mockall::mock;
    use std::collections::HashMap;

    mock! {
        pub Http {}

        #[async_trait]
        impl HttpClient for Http {
            async fn execute(&self, request: HttpRequest) -> bridge_traits::error::Result<HttpResponse>;
        }
    }

    fn response(status: u16, body: &str) -> HttpResponse {
        HttpResponse {
            status,
            headers: HashMap::new(),
            body: Bytes::from(body.to_string()),
        }
    }

    fn client(http: MockHttp) -> LrcLibClient {
        LrcLibClient::new(Arc::new(http), "https://lrclib.test/api/", "refrain/test")
    }

    const RECORD: &str = r#"{
        "id": 42,
        "trackName": "X",
        "artistName": "Y",
        "albumName": "Z",
        "duration": 181.0,
        "instrumental": false,
        "plainLyrics": "L1",
        "syncedLyrics": null
    }"#;

    #[tokio::test]
    async fn test_get_builds_encoded_url() {
        let mut http = MockHttp::new();
        http.expect_execute()
            .withf(|req| {
                req.url
                    == "https://lrclib.test/api/get?track_name=Hey%20Jude&artist_name=The%20Beatles&album_name=1%20%26%202&duration=431"
                    && req.headers.get("User-Agent").map(String::as_str) == Some("refrain/test")
            })
            .times(1)
            .returning(|_| Ok(response(200, RECORD)));

        let query = LyricsQuery::new("Hey Jude", "The Beatles")
            .with_album("1 & 2")
            .with_duration(431);
        let record = client(http).get(&query).await.unwrap();

        assert_eq!(record.id, 42);
        assert_eq!(record.plain_lyrics, "L1");
        assert_eq!(record.synced_lyrics, "");
        assert!(!record.instrumental);
    }

    #[tokio::test]
    async fn test_get_validates_before_network() {
        let mut http = MockHttp::new();
        http.expect_execute().never();
        let client = client(http);

        let err = client
            .get(&LyricsQuery::new("", "Y").with_duration(10))
            .await
            .unwrap_err();
        assert!(matches!(err, MetadataError::InvalidQuery(_)));

        let err = client
            .get(&LyricsQuery::new("X", "Y").with_duration(0))
            .await
            .unwrap_err();
        assert!(matches!(err, MetadataError::InvalidDuration(0)));

        let err = client
            .get(&LyricsQuery::new("X", "Y").with_duration(-5))
            .await
            .unwrap_err();
        assert!(err.is_invalid_input());
    }

    #[tokio::test]
    async fn test_search_variants() {
        let mut http = MockHttp::new();
        http.expect_execute()
            .withf(|req| req.url == "https://lrclib.test/api/search?q=hello%20world")
            .times(1)
            .returning(|_| Ok(response(200, "[]")));
        http.expect_execute()
            .withf(|req| req.url == "https://lrclib.test/api/search?track_name=X&artist_name=Y")
            .times(1)
            .returning(|_| Ok(response(200, &format!("[{}]", RECORD))));
        let client = client(http);

        let empty = client
            .search(&SearchParams::Query("hello world".to_string()))
            .await
            .unwrap();
        assert!(empty.is_empty());

        let found = client.search(&SearchParams::fields("X", "Y")).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].album_name, "Z");
    }

    #[tokio::test]
    async fn test_search_rejects_insufficient_params() {
        let mut http = MockHttp::new();
        http.expect_execute().never();
        let client = client(http);

        let err = client
            .search(&SearchParams::Query("  ".to_string()))
            .await
            .unwrap_err();
        assert!(matches!(err, MetadataError::InvalidQuery(_)));

        let err = client
            .search(&SearchParams::fields("X", ""))
            .await
            .unwrap_err();
        assert!(matches!(err, MetadataError::InvalidQuery(_)));
    }

    #[tokio::test]
    async fn test_get_by_id() {
        let mut http = MockHttp::new();
        http.expect_execute()
            .withf(|req| req.url == "https://lrclib.test/api/get/42")
            .times(1)
            .returning(|_| Ok(response(200, RECORD)));
        let client = client(http);

        assert_eq!(client.get_by_id("42").await.unwrap().id, 42);
        assert!(matches!(
            client.get_by_id("").await.unwrap_err(),
            MetadataError::InvalidQuery(_)
        ));
    }

    #[tokio::test]
    async fn test_error_bodies() {
        let mut http = MockHttp::new();
        http.expect_execute()
            .withf(|req| req.url.contains("track_name=Missing"))
            .times(1)
            .returning(|_| {
                Ok(response(
                    404,
                    r#"{"code":404,"name":"TrackNotFound","message":"Failed to find specified track"}"#,
                ))
            });
        http.expect_execute()
            .withf(|req| req.url.contains("track_name=Flaky"))
            .times(1)
            .returning(|_| Ok(response(502, "Bad Gateway")));
        let client = client(http);

        let err = client
            .get(&LyricsQuery::new("Missing", "Y").with_duration(10))
            .await
            .unwrap_err();
        assert!(matches!(&err, MetadataError::LyricsNotFound(m) if m == "Failed to find specified track"));
        assert!(err.is_transient());

        let err = client
            .get(&LyricsQuery::new("Flaky", "Y").with_duration(10))
            .await
            .unwrap_err();
        match err {
            MetadataError::LyricsApi {
                status,
                name,
                message,
            } => {
                assert_eq!(status, 502);
                assert!(name.is_empty());
                assert_eq!(message, "Bad Gateway");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_transport_error_is_bridge_error() {
        let mut http = MockHttp::new();
        http.expect_execute()
            .times(1)
            .returning(|_| Err(BridgeError::Timeout("30s".to_string())));

        let err = client(http)
            .search(&SearchParams::fields("X", "Y"))
            .await
            .unwrap_err();
        assert!(matches!(err, MetadataError::Bridge(BridgeError::Timeout(_))));
        assert!(err.is_transient());
    }

    #[test]
    fn test_select_best_prefers_synced() {
        let plain = LyricsRecord {
            id: 1,
            plain_lyrics: "p".to_string(),
            ..LyricsRecord::default()
        };
        let synced = LyricsRecord {
            id: 2,
            synced_lyrics: "[00:01.00]s".to_string(),
            ..LyricsRecord::default()
        };
        let bare = LyricsRecord {
            id: 3,
            ..LyricsRecord::default()
        };

        let records = vec![bare.clone(), plain.clone(), synced];
        assert_eq!(LyricsRecord::select_best(&records).map(|r| r.id), Some(2));

        let records = vec![bare.clone(), plain];
        assert_eq!(LyricsRecord::select_best(&records).map(|r| r.id), Some(1));

        assert_eq!(LyricsRecord::select_best(&[bare]).map(|r| r.id), Some(3));
        assert!(LyricsRecord::select_best(&[]).is_none());
    }

    #[test]
    fn test_lyrics_result_from_record() {
        let record: LyricsRecord = serde_json::from_str(RECORD).unwrap();
        let result = LyricsResult::from(record);
        assert_eq!(result.source_id, "42");
        assert_eq!(result.plain_lyrics, "L1");
        assert!(result.synced_lyrics.is_empty());
    }
}
