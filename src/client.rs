use crate::constants::constants;
use crate::error::ApiError;
use crate::protocol::{DraftEntry, QuestionRecord, SearchResponse};
use async_trait::async_trait;
use log::debug;
use reqwest::{Client, Response};
use std::time::Duration;
use url::Url;

/// The remote side of the dashboard: the three calls the similarity service exposes
#[async_trait]
pub trait Backend: Send + Sync {
    /// Top-`k` records most similar to `question`, in backend rank order
    async fn search(&self, question: &str, k: usize) -> Result<Vec<QuestionRecord>, ApiError>;

    /// Store a new question/SQL pair
    async fn upload(&self, entry: &DraftEntry) -> Result<(), ApiError>;

    /// Remove the record with the given id
    async fn delete(&self, index_id: &str) -> Result<(), ApiError>;
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: Url,
    pub timeout_secs: u64,
}

/// HTTP client for the similarity service REST API
pub struct ApiClient {
    client: Client,
    base_url: Url,
}

impl ApiClient {
    pub fn new(config: ClientConfig) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url,
        })
    }

    /// Append path segments to the base URL, percent-encoding each one
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        // Only cannot-be-a-base URLs refuse segments, and config rejects those
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }
}

/// Turn a non-2xx response into `ApiError::Backend`, keeping the body for the log
async fn check_status(response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(ApiError::Backend {
        status: status.as_u16(),
        body,
    })
}

#[async_trait]
impl Backend for ApiClient {
    async fn search(&self, question: &str, k: usize) -> Result<Vec<QuestionRecord>, ApiError> {
        let url = self.endpoint(&[constants::SEARCH_PATH]);
        debug!("GET {} question={:?} k={}", url, question, k);

        let k = k.to_string();
        let response = self
            .client
            .get(url)
            .query(&[("question", question), ("k", k.as_str())])
            .send()
            .await?;

        let body: SearchResponse = check_status(response).await?.json().await?;
        debug!("Search returned {} records", body.results.len());
        Ok(body.results)
    }

    async fn upload(&self, entry: &DraftEntry) -> Result<(), ApiError> {
        let url = self.endpoint(&[constants::UPLOAD_PATH]);
        debug!("POST {}", url);

        let response = self.client.post(url).json(entry).send().await?;
        check_status(response).await?;
        Ok(())
    }

    async fn delete(&self, index_id: &str) -> Result<(), ApiError> {
        let url = self.endpoint(&[constants::DELETE_PATH, index_id]);
        debug!("DELETE {}", url);

        let response = self.client.delete(url).send().await?;
        check_status(response).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> ApiClient {
        ApiClient::new(ClientConfig {
            base_url: Url::parse(&server.uri()).unwrap(),
            timeout_secs: 5,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_search_sends_question_and_k() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .and(query_param("question", "total sales"))
            .and(query_param("k", "5"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [
                    {"index_id": "42", "question": "total sales by region",
                     "sql_query": "SELECT ...", "date_added": "2024-01-01"},
                    {"index_id": "7", "question": "total sales last year",
                     "sql_query": "SELECT ...", "date_added": "2024-02-11"}
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let records = client_for(&server).search("total sales", 5).await.unwrap();
        let ids: Vec<_> = records.iter().map(|r| r.index_id.as_str()).collect();
        assert_eq!(ids, vec!["42", "7"]);
    }

    #[tokio::test]
    async fn test_search_non_success_is_backend_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(503).set_body_string("index warming up"))
            .mount(&server)
            .await;

        let err = client_for(&server).search("anything", 5).await.unwrap_err();
        match err {
            ApiError::Backend { status, body } => {
                assert_eq!(status, 503);
                assert_eq!(body, "index warming up");
            }
            other => panic!("expected backend error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_search_malformed_body_is_transport_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let err = client_for(&server).search("anything", 5).await.unwrap_err();
        assert!(matches!(err, ApiError::Transport(_)));
    }

    #[tokio::test]
    async fn test_upload_posts_json_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/upload"))
            .and(body_json(json!({
                "question": "avg price",
                "sql_query": "SELECT AVG(price) FROM t"
            })))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        let entry = DraftEntry::new("avg price", "SELECT AVG(price) FROM t");
        client_for(&server).upload(&entry).await.unwrap();
    }

    #[tokio::test]
    async fn test_delete_uses_index_id_path_segment() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/delete/42"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        client_for(&server).delete("42").await.unwrap();
    }

    #[tokio::test]
    async fn test_delete_failure_reports_status() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = client_for(&server).delete("missing").await.unwrap_err();
        assert!(matches!(err, ApiError::Backend { status: 404, .. }));
    }

    #[tokio::test]
    async fn test_connection_refused_is_transport_error() {
        // Bind then drop to get a port nothing listens on
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = ApiClient::new(ClientConfig {
            base_url: Url::parse(&format!("http://{addr}")).unwrap(),
            timeout_secs: 2,
        })
        .unwrap();
        let err = client.delete("42").await.unwrap_err();
        assert!(matches!(err, ApiError::Transport(_)));
    }

    #[tokio::test]
    async fn test_slow_backend_times_out_as_transport_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"results": []}))
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&server)
            .await;

        let client = ApiClient::new(ClientConfig {
            base_url: Url::parse(&server.uri()).unwrap(),
            timeout_secs: 1,
        })
        .unwrap();
        match client.search("anything", 5).await.unwrap_err() {
            ApiError::Transport(e) => assert!(e.is_timeout()),
            other => panic!("expected transport error, got {other:?}"),
        }
    }

    #[test]
    fn test_endpoint_keeps_base_path_prefix() {
        let client = ApiClient::new(ClientConfig {
            base_url: Url::parse("http://localhost:5000/api").unwrap(),
            timeout_secs: 5,
        })
        .unwrap();
        assert_eq!(
            client.endpoint(&["delete", "a b/c"]).as_str(),
            "http://localhost:5000/api/delete/a%20b%2Fc"
        );

        let client = ApiClient::new(ClientConfig {
            base_url: Url::parse("http://localhost:5000/").unwrap(),
            timeout_secs: 5,
        })
        .unwrap();
        assert_eq!(client.endpoint(&["search"]).as_str(), "http://localhost:5000/search");
    }
}
