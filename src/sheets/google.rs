// src/sheets/google.rs
//! Google Sheets REST v4 with a bearer access token.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, Url};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

use super::{header_row, Rows, SheetError, SpreadsheetClient};

const API_BASE: &str = "https://sheets.googleapis.com/v4/spreadsheets";

pub struct GoogleSheets {
    http: Client,
    spreadsheet_id: String,
    token: String,
    base_url: String,
}

impl GoogleSheets {
    pub fn new(spreadsheet_id: impl Into<String>, token: impl Into<String>) -> Result<Self, SheetError> {
        let http = Client::builder()
            .user_agent(concat!("content-relay/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| SheetError::Http(e.to_string()))?;
        Ok(Self {
            http,
            spreadsheet_id: spreadsheet_id.into(),
            token: token.into(),
            base_url: API_BASE.to_string(),
        })
    }

    /// `{base}/{id}/{segments...}`
    fn url(&self, segments: &[&str]) -> Result<Url, SheetError> {
        let mut url = Url::parse(&self.base_url).map_err(|e| SheetError::Decode(e.to_string()))?;
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| SheetError::Decode("base url cannot carry a path".into()))?;
            path.push(&self.spreadsheet_id);
            for s in segments {
                path.push(s);
            }
        }
        Ok(url)
    }

    async fn send(&self, req: reqwest::RequestBuilder, sheet: &str) -> Result<Response, SheetError> {
        let resp = req
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| SheetError::Http(e.to_string()))?;
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let message = resp.text().await.unwrap_or_default();
        if status.as_u16() == 404 || (status.as_u16() == 400 && message.contains("Unable to parse range")) {
            return Err(SheetError::NotFound(sheet.to_string()));
        }
        Err(SheetError::Api {
            status: status.as_u16(),
            message: message.chars().take(300).collect(),
        })
    }

    async fn sheet_titles(&self) -> Result<Vec<String>, SheetError> {
        #[derive(Deserialize)]
        struct Meta {
            #[serde(default)]
            sheets: Vec<SheetMeta>,
        }
        #[derive(Deserialize)]
        struct SheetMeta {
            properties: Props,
        }
        #[derive(Deserialize)]
        struct Props {
            title: String,
        }

        let mut url = self.url(&[])?;
        url.query_pairs_mut().append_pair("fields", "sheets.properties.title");
        let resp = self.send(self.http.get(url), &self.spreadsheet_id).await?;
        let meta: Meta = resp.json().await.map_err(|e| SheetError::Decode(e.to_string()))?;
        Ok(meta.sheets.into_iter().map(|s| s.properties.title).collect())
    }
}

/// A1 range covering the whole sheet: `'Name'` with quotes doubled.
fn a1_sheet(name: &str) -> String {
    format!("'{}'", name.replace('\'', "''"))
}

#[async_trait]
impl SpreadsheetClient for GoogleSheets {
    async fn read_sheet(&self, name: &str) -> Result<Rows, SheetError> {
        #[derive(Deserialize)]
        struct ValueRange {
            #[serde(default)]
            values: Vec<Vec<serde_json::Value>>,
        }

        let mut url = self.url(&["values", &a1_sheet(name)])?;
        url.query_pairs_mut()
            .append_pair("majorDimension", "ROWS")
            .append_pair("valueRenderOption", "FORMATTED_VALUE");
        let resp = self.send(self.http.get(url), name).await?;
        let vr: ValueRange = resp.json().await.map_err(|e| SheetError::Decode(e.to_string()))?;

        let rows: Rows = vr
            .values
            .into_iter()
            .map(|row| {
                row.into_iter()
                    .map(|cell| match cell {
                        serde_json::Value::String(s) => s,
                        serde_json::Value::Null => String::new(),
                        other => other.to_string(),
                    })
                    .collect()
            })
            .collect();
        debug!(target: "sheets", sheet = name, rows = rows.len(), "sheet read");
        Ok(rows)
    }

    async fn append_rows(&self, name: &str, rows: Rows) -> Result<(), SheetError> {
        if rows.is_empty() {
            return Ok(());
        }
        let n = rows.len();
        let mut url = self.url(&["values", &format!("{}:append", a1_sheet(name))])?;
        url.query_pairs_mut()
            .append_pair("valueInputOption", "USER_ENTERED")
            .append_pair("insertDataOption", "INSERT_ROWS");
        self.send(self.http.post(url).json(&json!({ "values": rows })), name)
            .await?;
        debug!(target: "sheets", sheet = name, rows = n, "rows appended");
        Ok(())
    }

    async fn ensure_sheet_exists(&self, name: &str, header: &[&str]) -> Result<bool, SheetError> {
        let titles = self.sheet_titles().await?;
        if !titles.iter().any(|t| t == name) {
            let url = self.url(&[])?;
            let url = Url::parse(&format!("{}:batchUpdate", url.as_str().trim_end_matches('/')))
                .map_err(|e| SheetError::Decode(e.to_string()))?;
            let body = json!({ "requests": [ { "addSheet": { "properties": { "title": name } } } ] });
            self.send(self.http.post(url).json(&body), name).await?;
            info!(target: "sheets", sheet = name, "sheet created");
        } else if !self.read_sheet(name).await?.is_empty() {
            return Ok(false);
        }
        self.append_rows(name, vec![header_row(header)]).await?;
        Ok(true)
    }
}
