use reqwest::blocking::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;
use url::Url;

use super::{auth::TokenProvider, column_letter, trim_trailing_blanks, SheetStore};
use crate::error::StoreError;

pub const DEFAULT_API_URL: &str = "https://sheets.googleapis.com";

#[derive(Debug, Default, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<String>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ValueUpdate<'a> {
    range: &'a str,
    major_dimension: &'static str,
    values: &'a [Vec<String>],
}

#[derive(Debug, Deserialize)]
struct Spreadsheet {
    #[serde(default)]
    sheets: Vec<Sheet>,
}

#[derive(Debug, Deserialize)]
struct Sheet {
    properties: SheetProperties,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SheetProperties {
    sheet_id: i64,
    title: String,
    #[serde(default)]
    grid_properties: GridProperties,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GridProperties {
    #[serde(default)]
    row_count: usize,
}

/// One worksheet of a Google spreadsheet, accessed through the Sheets v4 REST API.
pub struct SheetsClient {
    client: Client,
    base_url: Url,
    spreadsheet_id: String,
    sheet_title: String,
    tokens: Box<dyn TokenProvider>,
}

impl SheetsClient {
    pub fn new(
        client: Client,
        base_url: &str,
        spreadsheet_id: impl Into<String>,
        sheet_title: impl Into<String>,
        tokens: Box<dyn TokenProvider>,
    ) -> Result<Self, StoreError> {
        let base_url =
            Url::parse(base_url).map_err(|e| StoreError::InvalidUrl(format!("{base_url}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(StoreError::InvalidUrl(base_url.to_string()));
        }

        Ok(Self {
            client,
            base_url,
            spreadsheet_id: spreadsheet_id.into(),
            sheet_title: sheet_title.into(),
            tokens,
        })
    }

    pub fn sheet_title(&self) -> &str {
        &self.sheet_title
    }

    fn endpoint(&self, tail: &[&str]) -> Result<Url, StoreError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| StoreError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(["v4", "spreadsheets"])
            .extend(tail);
        Ok(url)
    }

    fn values_url(&self, range: &str) -> Result<Url, StoreError> {
        self.endpoint(&[self.spreadsheet_id.as_str(), "values", range])
    }

    fn authorized(&self, request: RequestBuilder) -> Result<RequestBuilder, StoreError> {
        Ok(request.bearer_auth(self.tokens.access_token()?))
    }

    fn range(&self, cells: &str) -> String {
        format!("{}!{cells}", quote_sheet_title(&self.sheet_title))
    }

    fn read_range(&self, cells: &str, major_dimension: &str) -> Result<ValueRange, StoreError> {
        let range = self.range(cells);
        debug!("reading range {range}");
        let request = self
            .client
            .get(self.values_url(&range)?)
            .query(&[("majorDimension", major_dimension)]);
        let response = check(self.authorized(request)?.send()?)?;
        Ok(response.json()?)
    }

    fn properties(&self) -> Result<SheetProperties, StoreError> {
        let request = self
            .client
            .get(self.endpoint(&[self.spreadsheet_id.as_str()])?)
            .query(&[("fields", "sheets.properties")]);
        let spreadsheet: Spreadsheet = check(self.authorized(request)?.send()?)?.json()?;

        spreadsheet
            .sheets
            .into_iter()
            .map(|sheet| sheet.properties)
            .find(|properties| properties.title == self.sheet_title)
            .ok_or_else(|| StoreError::MissingSheet(self.sheet_title.clone()))
    }
}

impl SheetStore for SheetsClient {
    fn column(&self, index: usize) -> Result<Vec<String>, StoreError> {
        let letter = column_letter(index);
        let range = self.read_range(&format!("{letter}:{letter}"), "COLUMNS")?;
        let values = range.values.into_iter().next().unwrap_or_default();
        Ok(trim_trailing_blanks(values))
    }

    fn row(&self, index: usize) -> Result<Vec<String>, StoreError> {
        let range = self.read_range(&format!("{index}:{index}"), "ROWS")?;
        let values = range.values.into_iter().next().unwrap_or_default();
        Ok(trim_trailing_blanks(values))
    }

    fn write_row(&mut self, index: usize, values: &[String]) -> Result<(), StoreError> {
        self.write_block(index, &[values.to_vec()])
    }

    fn write_block(&mut self, start_row: usize, rows: &[Vec<String>]) -> Result<(), StoreError> {
        let width = rows.iter().map(Vec::len).max().unwrap_or(0);
        if width == 0 {
            return Ok(());
        }

        let end_row = start_row + rows.len() - 1;
        let range = self.range(&format!("A{start_row}:{}{end_row}", column_letter(width)));
        let body = ValueUpdate {
            range: &range,
            major_dimension: "ROWS",
            values: rows,
        };

        let request = self
            .client
            .put(self.values_url(&range)?)
            .query(&[("valueInputOption", "RAW")])
            .json(&body);
        check(self.authorized(request)?.send()?)?;

        debug!("wrote {} rows to {range}", rows.len());
        Ok(())
    }

    fn row_capacity(&self) -> Result<usize, StoreError> {
        Ok(self.properties()?.grid_properties.row_count)
    }

    fn resize_rows(&mut self, rows: usize) -> Result<(), StoreError> {
        let sheet_id = self.properties()?.sheet_id;
        let body = json!({
            "requests": [{
                "updateSheetProperties": {
                    "properties": {
                        "sheetId": sheet_id,
                        "gridProperties": { "rowCount": rows },
                    },
                    "fields": "gridProperties.rowCount",
                }
            }]
        });

        let batch_update = format!("{}:batchUpdate", self.spreadsheet_id);
        let request = self.client.post(self.endpoint(&[batch_update.as_str()])?).json(&body);
        check(self.authorized(request)?.send()?)?;

        debug!("resized worksheet {} to {rows} rows", self.sheet_title);
        Ok(())
    }
}

fn check(response: Response) -> Result<Response, StoreError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    Err(StoreError::Api {
        status: status.as_u16(),
        body: response.text().unwrap_or_default(),
    })
}

/// Sheet titles with anything but letters, digits or underscores need quoting in A1 notation.
fn quote_sheet_title(title: &str) -> String {
    if !title.is_empty() && title.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        title.to_string()
    } else {
        format!("'{}'", title.replace('\'', "''"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::auth::StaticToken;
    use httpmock::{
        Method::{GET, POST, PUT},
        MockServer,
    };

    fn client(server: &MockServer) -> SheetsClient {
        SheetsClient::new(
            Client::new(),
            &server.base_url(),
            "test-sheet",
            "Sheet1",
            Box::new(StaticToken("test-token".to_string())),
        )
        .unwrap()
    }

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_reads_column() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/v4/spreadsheets/test-sheet/values/Sheet1!D:D")
                .query_param("majorDimension", "COLUMNS")
                .header("authorization", "Bearer test-token");
            then.status(200).json_body(json!({
                "range": "Sheet1!D1:D3",
                "majorDimension": "COLUMNS",
                "values": [["Start DateTime", "2024-01-01", ""]]
            }));
        });

        let values = client(&server).column(4).unwrap();

        mock.assert();
        assert_eq!(values, strings(&["Start DateTime", "2024-01-01"]));
    }

    #[test]
    fn test_reads_empty_row() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET)
                .path("/v4/spreadsheets/test-sheet/values/Sheet1!1:1")
                .query_param("majorDimension", "ROWS");
            then.status(200)
                .json_body(json!({ "range": "Sheet1!1:1", "majorDimension": "ROWS" }));
        });

        assert!(client(&server).row(1).unwrap().is_empty());
    }

    #[test]
    fn test_writes_block() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(PUT)
                .path("/v4/spreadsheets/test-sheet/values/Sheet1!A12:B13")
                .query_param("valueInputOption", "RAW")
                .json_body(json!({
                    "range": "Sheet1!A12:B13",
                    "majorDimension": "ROWS",
                    "values": [["a", "b"], ["c", "d"]]
                }));
            then.status(200).json_body(json!({ "updatedRows": 2 }));
        });

        client(&server)
            .write_block(12, &[strings(&["a", "b"]), strings(&["c", "d"])])
            .unwrap();

        mock.assert();
    }

    #[test]
    fn test_api_errors_are_reported() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(PUT);
            then.status(403).body("forbidden");
        });

        let err = client(&server)
            .write_row(1, &strings(&["Type"]))
            .unwrap_err();

        match err {
            StoreError::Api { status, body } => {
                assert_eq!(status, 403);
                assert_eq!(body, "forbidden");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_row_capacity_and_resize() {
        let server = MockServer::start();
        let properties = server.mock(|when, then| {
            when.method(GET)
                .path("/v4/spreadsheets/test-sheet")
                .query_param("fields", "sheets.properties");
            then.status(200).json_body(json!({
                "sheets": [
                    { "properties": { "sheetId": 0, "title": "Other", "gridProperties": { "rowCount": 5 } } },
                    { "properties": { "sheetId": 7, "title": "Sheet1", "gridProperties": { "rowCount": 1000, "columnCount": 34 } } }
                ]
            }));
        });
        let resize = server.mock(|when, then| {
            when.method(POST)
                .path("/v4/spreadsheets/test-sheet:batchUpdate")
                .json_body(json!({
                    "requests": [{
                        "updateSheetProperties": {
                            "properties": { "sheetId": 7, "gridProperties": { "rowCount": 2014 } },
                            "fields": "gridProperties.rowCount"
                        }
                    }]
                }));
            then.status(200).json_body(json!({ "replies": [{}] }));
        });

        let mut sheets = client(&server);
        assert_eq!(sheets.row_capacity().unwrap(), 1000);
        sheets.resize_rows(2014).unwrap();

        properties.assert_hits(2);
        resize.assert();
    }

    #[test]
    fn test_missing_worksheet() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/v4/spreadsheets/test-sheet");
            then.status(200).json_body(json!({ "sheets": [] }));
        });

        let err = client(&server).row_capacity().unwrap_err();
        assert!(matches!(err, StoreError::MissingSheet(title) if title == "Sheet1"));
    }

    #[test]
    fn test_quote_sheet_title() {
        assert_eq!(quote_sheet_title("Sheet1"), "Sheet1");
        assert_eq!(quote_sheet_title("Camera logs"), "'Camera logs'");
        assert_eq!(quote_sheet_title("Bob's"), "'Bob''s'");
    }

    #[test]
    fn test_invalid_base_url() {
        let result = SheetsClient::new(
            Client::new(),
            "not a url",
            "id",
            "Sheet1",
            Box::new(StaticToken(String::new())),
        );
        assert!(matches!(result, Err(StoreError::InvalidUrl(_))));
    }
}
