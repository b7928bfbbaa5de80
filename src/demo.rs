use axum::Json;
use axum::http::header;
use axum::response::IntoResponse;
use serde::Serialize;

use crate::error::ApiError;

#[derive(Debug, Clone, Serialize)]
pub struct CityRow {
    pub city: &'static str,
    pub temperature: i32,
    pub rain: &'static str,
}

pub static ROWS: [CityRow; 3] = [
    CityRow { city: "Cairo", temperature: 32, rain: "No" },
    CityRow { city: "Alexandria", temperature: 28, rain: "Yes" },
    CityRow { city: "Giza", temperature: 30, rain: "No" },
];

#[derive(Debug, Serialize)]
pub struct DemoData {
    pub data: &'static [CityRow],
}

pub fn to_csv(rows: &[CityRow]) -> Result<String, ApiError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for row in rows {
        writer.serialize(row).map_err(|e| ApiError::Internal(format!("csv export failed: {e}")))?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| ApiError::Internal(format!("csv export failed: {e}")))?;
    String::from_utf8(bytes).map_err(|e| ApiError::Internal(format!("csv export failed: {e}")))
}

pub async fn data() -> Json<DemoData> {
    Json(DemoData { data: &ROWS })
}

pub async fn data_csv() -> Result<impl IntoResponse, ApiError> {
    let body = to_csv(&ROWS)?;
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv"),
            (header::CONTENT_DISPOSITION, "attachment; filename=data.csv"),
        ],
        body,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::response::IntoResponse;

    #[test]
    fn csv_has_header_and_three_rows() {
        let csv = to_csv(&ROWS).unwrap();
        let lines: Vec<_> = csv.lines().collect();
        assert_eq!(lines[0], "city,temperature,rain");
        assert_eq!(lines[2], "Alexandria,28,Yes");
        assert_eq!(lines.len(), 4);
    }

    #[tokio::test]
    async fn csv_download_headers() {
        let resp = data_csv().await.unwrap().into_response();
        assert_eq!(resp.headers()[header::CONTENT_TYPE], "text/csv");
        assert_eq!(resp.headers()[header::CONTENT_DISPOSITION], "attachment; filename=data.csv");
    }

    #[tokio::test]
    async fn json_lists_demo_cities() {
        let Json(body) = data().await;
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["data"][0]["city"], "Cairo");
        assert_eq!(value["data"][1]["rain"], "Yes");
    }
}
