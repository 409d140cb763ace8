//! Wire types shared by the Jamf Pro API endpoints

use serde::Deserialize;

/// Body returned with most 4xx/5xx responses
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiErrorResponse {
    #[serde(default)]
    pub http_status: Option<u16>,
    #[serde(default)]
    pub errors: Vec<ApiErrorEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorEntry {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub field: Option<String>,
}

#[derive(Debug, thiserror::Error)]
#[error("API error details: {errors:?}")]
pub struct ApiErrorDetails {
    pub errors: Vec<ApiErrorEntry>,
}

impl ApiErrorDetails {
    /// "field: description" for each entry that has a description
    pub fn summary(&self) -> String {
        self.errors
            .iter()
            .filter_map(|e| {
                let description = e.description.as_deref()?;
                Some(match e.field.as_deref() {
                    Some(field) => format!("{}: {}", field, description),
                    None => description.to_string(),
                })
            })
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Response of POST endpoints that create an object
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct CreateResponse {
    pub id: String,
    #[serde(default)]
    pub href: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_response_summary() {
        let body = r#"{"httpStatus":400,"errors":[{"code":"INVALID_FIELD","field":"name","description":"must not be blank","id":"0"},{"code":"X"}]}"#;
        let parsed: ApiErrorResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.http_status, Some(400));

        let details = ApiErrorDetails {
            errors: parsed.errors,
        };
        assert_eq!(details.summary(), "name: must not be blank");
    }
}
