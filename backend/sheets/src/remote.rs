use std::{path::PathBuf, time::Duration};

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, Url};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::{AppendResult, Row, RowStore, UpdateResult, error::SheetsError, range::RangeAddress};

pub const DEFAULT_API_URL: &str = "https://sheets.googleapis.com/v4";

const VALUE_INPUT_OPTION: (&str, &str) = ("valueInputOption", "RAW");

/// Google Sheets REST v4 values client.
///
/// The access token is read from `token_path` on every call so the surrounding
/// layer can rotate it without restarting the server.
pub struct SheetsClient {
    client: Client,
    base_url: Url,
    token_path: PathBuf,
}

#[derive(Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Row>,
}

#[derive(Deserialize)]
struct AppendResponse {
    updates: UpdateResponse,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateResponse {
    #[serde(default)]
    updated_range: String,
    #[serde(default)]
    updated_rows: usize,
    #[serde(default)]
    updated_cells: usize,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    error: ApiError,
}

#[derive(Deserialize)]
struct ApiError {
    message: String,
}

impl SheetsClient {
    pub fn new(
        base_url: &str,
        token_path: impl Into<PathBuf>,
        timeout: Duration,
    ) -> Result<Self, SheetsError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| SheetsError::Unavailable(format!("bad API url {base_url}: {e}")))?;

        if base_url.cannot_be_a_base() {
            return Err(SheetsError::Unavailable(format!(
                "bad API url {base_url}: cannot be a base"
            )));
        }

        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url,
            token_path: token_path.into(),
        })
    }

    /// `{base}/spreadsheets/{id}/values/{range}{suffix}`
    pub fn values_url(&self, spreadsheet_id: &str, range: &RangeAddress, suffix: &str) -> Url {
        let mut url = self.base_url.clone();

        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .push("spreadsheets")
                .push(spreadsheet_id)
                .push("values")
                .push(&format!("{range}{suffix}"));
        }

        url
    }

    async fn token(&self) -> Result<String, SheetsError> {
        let token = tokio::fs::read_to_string(&self.token_path)
            .await
            .map_err(|_| SheetsError::CredentialMissing(self.token_path.clone()))?;

        let token = token.trim();
        if token.is_empty() {
            return Err(SheetsError::CredentialMissing(self.token_path.clone()));
        }

        Ok(token.to_string())
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, SheetsError> {
        let response = request.bearer_auth(self.token().await?).send().await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ApiErrorBody>(&body)
            .map(|parsed| parsed.error.message)
            .unwrap_or(body);

        Err(SheetsError::Unavailable(format!("{status}: {message}")))
    }
}

#[async_trait]
impl RowStore for SheetsClient {
    async fn get_range(
        &self,
        spreadsheet_id: &str,
        range: &RangeAddress,
    ) -> Result<Vec<Row>, SheetsError> {
        let url = self.values_url(spreadsheet_id, range, "");
        debug!("GET {url}");

        let body: ValueRange = self.send(self.client.get(url)).await?.json().await?;

        Ok(body.values)
    }

    async fn append_rows(
        &self,
        spreadsheet_id: &str,
        range: &RangeAddress,
        rows: &[Row],
    ) -> Result<AppendResult, SheetsError> {
        let url = self.values_url(spreadsheet_id, range, ":append");
        debug!("POST {url} ({} rows)", rows.len());

        let request = self
            .client
            .post(url)
            .query(&[VALUE_INPUT_OPTION])
            .json(&json!({ "values": rows }));
        let body: AppendResponse = self.send(request).await?.json().await?;

        Ok(AppendResult {
            updated_range: body.updates.updated_range,
            row_count: body.updates.updated_rows,
        })
    }

    async fn update_range(
        &self,
        spreadsheet_id: &str,
        range: &RangeAddress,
        rows: &[Row],
    ) -> Result<UpdateResult, SheetsError> {
        let url = self.values_url(spreadsheet_id, range, "");
        debug!("PUT {url}");

        let request = self
            .client
            .put(url)
            .query(&[VALUE_INPUT_OPTION])
            .json(&json!({ "range": range.to_string(), "values": rows }));
        let body: UpdateResponse = self.send(request).await?.json().await?;

        Ok(UpdateResult {
            updated_range: body.updated_range,
            cell_count: body.updated_cells,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::{
        path::Path,
        sync::{Arc, Mutex},
    };

    use axum::{
        Json, Router,
        extract::{Path as UrlPath, Query, State},
        http::{HeaderMap, StatusCode},
        response::IntoResponse,
        routing::get,
    };
    use serde_json::{Value, json};
    use tokio::net::TcpListener;

    use super::*;

    type Seen = Arc<Mutex<Vec<String>>>;

    fn token_file(name: &str, contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("sheets-{name}-{}", std::process::id()));
        std::fs::write(&path, contents).unwrap();
        path
    }

    async fn values(
        State(seen): State<Seen>,
        UrlPath((id, range)): UrlPath<(String, String)>,
        headers: HeaderMap,
    ) -> impl IntoResponse {
        let auth = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        seen.lock().unwrap().push(format!("GET {id} {range} {auth}"));

        if id == "broken" {
            let body = json!({ "error": { "code": 404, "message": "Requested entity was not found." } });
            return (StatusCode::NOT_FOUND, Json(body));
        }

        (
            StatusCode::OK,
            Json(json!({ "range": range, "values": [["6A", "Física"], ["7B"]] })),
        )
    }

    async fn write(
        State(seen): State<Seen>,
        UrlPath((id, range)): UrlPath<(String, String)>,
        Query(query): Query<Vec<(String, String)>>,
        Json(body): Json<Value>,
    ) -> Json<Value> {
        let rows = body["values"].as_array().map_or(0, Vec::len);
        seen.lock()
            .unwrap()
            .push(format!("WRITE {id} {range} {query:?} {rows}"));

        if range.ends_with(":append") {
            Json(json!({
                "spreadsheetId": id,
                "updates": { "updatedRange": "Datos!A4:B5", "updatedRows": rows, "updatedCells": rows * 2 }
            }))
        } else {
            Json(json!({ "spreadsheetId": id, "updatedRange": range, "updatedRows": 1, "updatedCells": 3 }))
        }
    }

    async fn serve(seen: Seen) -> String {
        let app = Router::new()
            .route(
                "/v4/spreadsheets/{id}/values/{range}",
                get(values).post(write).put(write),
            )
            .with_state(seen);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

        format!("http://{address}/v4")
    }

    #[test]
    fn test_values_url() {
        let client =
            SheetsClient::new(DEFAULT_API_URL, "/nonexistent", Duration::from_secs(1)).unwrap();
        let range = RangeAddress::columns("Plan de aula", 0, 9).row(4);

        let url = client.values_url("abc123", &range, "");
        assert_eq!(
            url.as_str(),
            "https://sheets.googleapis.com/v4/spreadsheets/abc123/values/'Plan%20de%20aula'!A4:J4"
        );

        let url = client.values_url("abc123", &RangeAddress::columns("plan", 0, 9), ":append");
        assert!(url.as_str().ends_with("/values/plan!A:J:append"));
    }

    #[tokio::test]
    async fn test_missing_credential() {
        let client = SheetsClient::new(
            "http://127.0.0.1:9/v4",
            Path::new("/nonexistent/token"),
            Duration::from_secs(1),
        )
        .unwrap();

        let err = client
            .get_range("id", &RangeAddress::columns("plan", 0, 9))
            .await
            .unwrap_err();

        assert!(matches!(err, SheetsError::CredentialMissing(_)));
    }

    #[tokio::test]
    async fn test_get_append_update() {
        let seen = Seen::default();
        let base = serve(seen.clone()).await;
        let token = token_file("ok", "secret-token\n");
        let client = SheetsClient::new(&base, &token, Duration::from_secs(5)).unwrap();

        let range = RangeAddress::columns("Datos", 0, 6);
        let rows = client.get_range("sheet", &range).await.unwrap();
        assert_eq!(rows, vec![vec![json!("6A"), json!("Física")], vec![json!("7B")]]);

        let appended = client
            .append_rows("sheet", &range, &[vec![json!("a")], vec![json!("b")]])
            .await
            .unwrap();
        assert_eq!(appended.updated_range, "Datos!A4:B5");
        assert_eq!(appended.row_count, 2);

        let updated = client
            .update_range("sheet", &range.row(3), &[vec![json!(1), json!(2), json!(3)]])
            .await
            .unwrap();
        assert_eq!(updated.cell_count, 3);

        let seen = seen.lock().unwrap().clone();
        assert_eq!(seen[0], "GET sheet Datos!A:G Bearer secret-token");
        assert!(seen[1].starts_with("WRITE sheet Datos!A:G:append"));
        assert!(seen[1].contains("valueInputOption"));
        assert!(seen[2].starts_with("WRITE sheet Datos!A3:G3"));
    }

    #[tokio::test]
    async fn test_api_error_message() {
        let base = serve(Seen::default()).await;
        let token = token_file("err", "secret-token");
        let client = SheetsClient::new(&base, &token, Duration::from_secs(5)).unwrap();

        let err = client
            .get_range("broken", &RangeAddress::columns("plan", 0, 9))
            .await
            .unwrap_err();

        match err {
            SheetsError::Unavailable(message) => {
                assert!(message.contains("Requested entity was not found."))
            }
            other => panic!("unexpected error {other:?}"),
        }
    }
}
