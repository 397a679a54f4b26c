//! CrossRef metadata source.
//!
//! Uses the CrossRef REST API: `/works?query.bibliographic=` for free-text
//! search and `/works/{doi}` for exact lookups.

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

use crate::models::{Author, CandidateRecord};
use crate::sources::{MetadataSource, SourceError};
use crate::utils::{polite_user_agent, HttpClient};

/// Public CrossRef API endpoint
pub const CROSSREF_API_BASE: &str = "https://api.crossref.org";

/// CrossRef metadata source
#[derive(Debug, Clone)]
pub struct CrossRefSource {
    client: Arc<HttpClient>,
    base_url: String,
}

impl CrossRefSource {
    /// Source against the public API with no contact address
    pub fn new() -> Result<Self, SourceError> {
        Self::with_settings(CROSSREF_API_BASE, None, Duration::from_secs(10))
    }

    /// Source with an explicit endpoint, polite-pool contact and timeout
    pub fn with_settings(
        base_url: impl Into<String>,
        mailto: Option<&str>,
        timeout: Duration,
    ) -> Result<Self, SourceError> {
        let user_agent = polite_user_agent(mailto);
        Ok(Self {
            client: Arc::new(HttpClient::with_user_agent(&user_agent, timeout)?),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<Option<T>, SourceError> {
        let response = request.send().await?;
        let status = response.status();

        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = body.chars().take(200).collect::<String>();
            return Err(SourceError::from_status(status, message));
        }

        let body = response.text().await?;
        Ok(Some(serde_json::from_str(&body)?))
    }
}

#[async_trait]
impl MetadataSource for CrossRefSource {
    fn name(&self) -> &str {
        "CrossRef"
    }

    async fn search(&self, text: &str, rows: usize) -> Result<Vec<CandidateRecord>, SourceError> {
        if text.trim().is_empty() {
            return Err(SourceError::InvalidRequest("empty search text".to_string()));
        }

        let url = format!("{}/works", self.base_url);
        let request = self
            .client
            .client()
            .get(&url)
            .query(&[("query.bibliographic", text.to_string()), ("rows", rows.to_string())]);

        tracing::debug!("CrossRef search: {} (rows={})", text, rows);

        // A 404 on the search endpoint is not "no match"; report it
        let data: WorkListResponse = self.get_json(request).await?.ok_or_else(|| SourceError::Api {
            status: 404,
            message: format!("{} not found", url),
        })?;

        Ok(data
            .message
            .items
            .into_iter()
            .filter_map(CrossRefWork::into_record)
            .collect())
    }

    async fn get_by_doi(&self, doi: &str) -> Result<Option<CandidateRecord>, SourceError> {
        let url = format!("{}/works/{}", self.base_url, urlencoding::encode(doi));
        tracing::debug!("CrossRef DOI lookup: {}", doi);

        let data: Option<WorkResponse> = self.get_json(self.client.client().get(&url)).await?;
        Ok(data.and_then(|d| d.message.into_record()))
    }
}

// ===== CrossRef API Types =====

#[derive(Debug, Deserialize)]
struct WorkListResponse {
    message: WorkList,
}

#[derive(Debug, Deserialize)]
struct WorkList {
    #[serde(default)]
    items: Vec<CrossRefWork>,
}

#[derive(Debug, Deserialize)]
struct WorkResponse {
    message: CrossRefWork,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct CrossRefWork {
    #[serde(rename = "DOI")]
    doi: Option<String>,
    #[serde(default)]
    title: Vec<String>,
    #[serde(default)]
    author: Vec<CrossRefAuthor>,
    #[serde(default)]
    container_title: Vec<String>,
    volume: Option<String>,
    issue: Option<String>,
    page: Option<String>,
    published_print: Option<CrossRefDate>,
    published_online: Option<CrossRefDate>,
    issued: Option<CrossRefDate>,
    #[serde(default)]
    score: f64,
}

#[derive(Debug, Deserialize)]
struct CrossRefAuthor {
    given: Option<String>,
    family: Option<String>,
    /// Organisational authors carry a name instead of given/family
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CrossRefDate {
    #[serde(rename = "date-parts", default)]
    date_parts: Vec<Vec<Option<i32>>>,
}

impl CrossRefDate {
    fn year(&self) -> Option<i32> {
        self.date_parts.first()?.first().copied().flatten()
    }
}

impl CrossRefWork {
    /// Normalize into a record; works without a DOI or title are dropped
    fn into_record(self) -> Option<CandidateRecord> {
        let doi = self.doi.map(|d| d.trim().to_lowercase()).filter(|d| !d.is_empty())?;
        let title = self
            .title
            .first()
            .map(|t| collapse_whitespace(t))
            .filter(|t| !t.is_empty())?;

        let year = [&self.published_print, &self.published_online, &self.issued]
            .into_iter()
            .flatten()
            .find_map(CrossRefDate::year);

        let authors = self
            .author
            .into_iter()
            .filter_map(|a| {
                let family = a.family.or(a.name).map(|f| collapse_whitespace(&f))?;
                (!family.is_empty()).then(|| Author::new(a.given.unwrap_or_default().trim(), family))
            })
            .collect();

        Some(CandidateRecord {
            doi,
            title,
            authors,
            year,
            container_title: self
                .container_title
                .first()
                .map(|c| collapse_whitespace(c))
                .filter(|c| !c.is_empty()),
            volume: self.volume,
            issue: self.issue,
            pages: self.page,
            score: self.score,
        })
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};
    use serde_json::json;

    fn bharadwaj_work() -> serde_json::Value {
        json!({
            "DOI": "10.2307/3250983",
            "title": ["A Resource-Based Perspective on Information Technology Capability and Firm Performance: An Empirical Investigation"],
            "author": [{"given": "Anandhi S.", "family": "Bharadwaj", "sequence": "first"}],
            "container-title": ["MIS Quarterly"],
            "volume": "24",
            "issue": "1",
            "page": "169",
            "published-print": {"date-parts": [[2000, 3]]},
            "issued": {"date-parts": [[2000, 3]]},
            "score": 42.5,
            "type": "journal-article"
        })
    }

    fn source(server: &Server) -> CrossRefSource {
        CrossRefSource::with_settings(server.url(), Some("test@example.org"), Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_work_normalization() {
        let work: CrossRefWork = serde_json::from_value(bharadwaj_work()).unwrap();
        let record = work.into_record().unwrap();

        assert_eq!(record.doi, "10.2307/3250983");
        assert_eq!(record.year, Some(2000));
        assert_eq!(record.authors, vec![Author::new("Anandhi S.", "Bharadwaj")]);
        assert_eq!(record.container_title.as_deref(), Some("MIS Quarterly"));
        assert_eq!(record.pages.as_deref(), Some("169"));
        assert_eq!(record.score, 42.5);
    }

    #[test]
    fn test_year_fallback_and_org_authors() {
        let work: CrossRefWork = serde_json::from_value(json!({
            "DOI": "10.1000/ORG",
            "title": ["  Global   report "],
            "author": [{"name": "World Health Organization"}, {"given": "Nobody"}],
            "published-print": {"date-parts": [[null]]},
            "issued": {"date-parts": [[2019, 1, 2]]}
        }))
        .unwrap();
        let record = work.into_record().unwrap();

        assert_eq!(record.doi, "10.1000/org");
        assert_eq!(record.title, "Global report");
        assert_eq!(record.year, Some(2019));
        assert_eq!(record.authors, vec![Author::new("", "World Health Organization")]);
    }

    #[test]
    fn test_incomplete_works_are_dropped() {
        let no_doi: CrossRefWork = serde_json::from_value(json!({"title": ["T"]})).unwrap();
        assert!(no_doi.into_record().is_none());

        let no_title: CrossRefWork = serde_json::from_value(json!({"DOI": "10.1/x", "title": []})).unwrap();
        assert!(no_title.into_record().is_none());
    }

    #[tokio::test]
    async fn test_search_decodes_items() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/works")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("query.bibliographic".to_string(), "Bharadwaj 2000 MIS Quarterly".to_string()),
                Matcher::UrlEncoded("rows".to_string(), "5".to_string()),
            ]))
            .match_header("user-agent", Matcher::Regex(r"mailto:test@example\.org".to_string()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "status": "ok",
                    "message-type": "work-list",
                    "message": {
                        "total-results": 2,
                        "items": [bharadwaj_work(), {"title": ["No DOI here"]}]
                    }
                })
                .to_string(),
            )
            .expect(1)
            .create_async()
            .await;

        let records = source(&server).search("Bharadwaj 2000 MIS Quarterly", 5).await.unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].doi, "10.2307/3250983");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_get_by_doi() {
        let mut server = Server::new_async().await;
        let found = server
            .mock("GET", "/works/10.2307%2F3250983")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(json!({"status": "ok", "message": bharadwaj_work()}).to_string())
            .create_async()
            .await;
        let missing = server
            .mock("GET", "/works/10.9999%2Fmissing")
            .with_status(404)
            .with_body("Resource not found.")
            .create_async()
            .await;

        let source = source(&server);
        let record = source.get_by_doi("10.2307/3250983").await.unwrap().unwrap();
        assert_eq!(record.year, Some(2000));
        assert!(source.get_by_doi("10.9999/missing").await.unwrap().is_none());

        found.assert_async().await;
        missing.assert_async().await;
    }

    #[tokio::test]
    async fn test_status_mapping() {
        let mut server = Server::new_async().await;
        let _unavailable = server
            .mock("GET", "/works/10.1000%2Fdown")
            .with_status(503)
            .with_body("maintenance")
            .create_async()
            .await;
        let _limited = server
            .mock("GET", "/works/10.1000%2Fbusy")
            .with_status(429)
            .create_async()
            .await;
        let _garbage = server
            .mock("GET", "/works/10.1000%2Fbad")
            .with_status(200)
            .with_body("<html>not json</html>")
            .create_async()
            .await;

        let source = source(&server);
        let err = source.get_by_doi("10.1000/down").await.unwrap_err();
        assert!(matches!(err, SourceError::Server { status: 503, .. }));
        assert!(err.is_transient());

        assert_eq!(source.get_by_doi("10.1000/busy").await.unwrap_err(), SourceError::RateLimit);
        assert!(matches!(
            source.get_by_doi("10.1000/bad").await.unwrap_err(),
            SourceError::Parse(_)
        ));
    }

    #[tokio::test]
    async fn test_empty_search_is_rejected() {
        let server = Server::new_async().await;
        let err = source(&server).search("   ", 5).await.unwrap_err();
        assert!(matches!(err, SourceError::InvalidRequest(_)));
    }

    #[test]
    fn test_endpoint_configuration() {
        assert_eq!(CrossRefSource::new().unwrap().base_url(), CROSSREF_API_BASE);

        let custom = CrossRefSource::with_settings("http://localhost:8080/", None, Duration::from_secs(1)).unwrap();
        assert_eq!(custom.base_url(), "http://localhost:8080");
    }
}
