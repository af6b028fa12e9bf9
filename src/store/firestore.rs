//! Firestore REST backend
//!
//! Documents are addressed as
//! `{endpoint}/projects/{project}/databases/{database}/documents/{collection}/{id}`.
//! Writes use `PATCH` with an update mask so only the named fields change.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde_json::{json, Map, Value};

use super::{Document, DocumentStore, FieldValue, Fields, StoreError};
use crate::settings::StoreSettings;

const DEFAULT_ENDPOINT: &str = "https://firestore.googleapis.com/v1";

/// Field names that can appear in a field path without quoting
static SIMPLE_FIELD_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap());

pub struct FirestoreStore {
    client: Client,
    documents_url: String,
    access_token: Option<String>,
}

impl FirestoreStore {
    #[must_use]
    pub fn new(
        endpoint: &str,
        project_id: &str,
        database: &str,
        access_token: Option<String>,
    ) -> Self {
        Self {
            client: Client::new(),
            documents_url: format!(
                "{}/projects/{project_id}/databases/{database}/documents",
                endpoint.trim_end_matches('/')
            ),
            access_token,
        }
    }

    #[must_use]
    pub fn from_settings(settings: &StoreSettings) -> Self {
        Self::new(
            settings.endpoint.as_deref().unwrap_or(DEFAULT_ENDPOINT),
            &settings.project_id,
            &settings.database,
            settings.access_token.clone(),
        )
    }

    fn document_url(&self, collection: &str, id: &str) -> String {
        format!(
            "{}/{}/{}",
            self.documents_url,
            urlencoding::encode(collection),
            urlencoding::encode(id)
        )
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.access_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn patch(
        &self,
        collection: &str,
        id: &str,
        fields: &Fields,
        mask: bool,
        must_exist: bool,
    ) -> Result<(), StoreError> {
        let mut query: Vec<(&str, String)> = Vec::new();
        if mask {
            query.extend(
                fields
                    .keys()
                    .map(|name| ("updateMask.fieldPaths", field_path(name))),
            );
        }
        if must_exist {
            query.push(("currentDocument.exists", "true".to_string()));
        }

        debug!("PATCH {collection}/{id} ({} fields)", fields.len());
        let response = self
            .authorize(self.client.patch(self.document_url(collection, id)))
            .query(&query)
            .json(&json!({ "fields": encode_fields(fields) }))
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => Ok(()),
            StatusCode::NOT_FOUND if must_exist => Err(StoreError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            }),
            status => Err(backend_error(status, response).await),
        }
    }
}

#[async_trait]
impl DocumentStore for FirestoreStore {
    async fn get_document(
        &self,
        collection: &str,
        id: &str,
    ) -> Result<Option<Document>, StoreError> {
        let response = self
            .authorize(self.client.get(self.document_url(collection, id)))
            .send()
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let body: Value = response.json().await?;
                decode_document(&body, id).map(Some)
            }
            status => Err(backend_error(status, response).await),
        }
    }

    async fn update_document(
        &self,
        collection: &str,
        id: &str,
        fields: Fields,
    ) -> Result<(), StoreError> {
        self.patch(collection, id, &fields, true, true).await
    }

    async fn set_document(
        &self,
        collection: &str,
        id: &str,
        fields: Fields,
        merge: bool,
    ) -> Result<(), StoreError> {
        self.patch(collection, id, &fields, merge, false).await
    }
}

async fn backend_error(status: StatusCode, response: reqwest::Response) -> StoreError {
    let body: Value = response.json().await.unwrap_or(Value::Null);
    let message = body
        .pointer("/error/message")
        .and_then(Value::as_str)
        .map_or_else(|| status.to_string(), str::to_string);
    StoreError::Backend {
        status: status.as_u16(),
        message,
    }
}

/// Quote a top-level field name for use in an update mask
#[must_use]
pub fn field_path(name: &str) -> String {
    if SIMPLE_FIELD_NAME.is_match(name) {
        name.to_string()
    } else {
        format!("`{}`", name.replace('\\', "\\\\").replace('`', "\\`"))
    }
}

#[must_use]
pub fn encode_fields(fields: &Fields) -> Value {
    Value::Object(
        fields
            .iter()
            .map(|(name, value)| (name.clone(), encode_value(value)))
            .collect::<Map<_, _>>(),
    )
}

#[must_use]
pub fn encode_value(value: &FieldValue) -> Value {
    match value {
        FieldValue::Null => json!({ "nullValue": null }),
        FieldValue::Bool(b) => json!({ "booleanValue": b }),
        FieldValue::Integer(i) => json!({ "integerValue": i.to_string() }),
        FieldValue::Double(d) => json!({ "doubleValue": d }),
        FieldValue::String(s) => json!({ "stringValue": s }),
        FieldValue::Timestamp(ts) => {
            json!({ "timestampValue": ts.to_rfc3339_opts(SecondsFormat::Micros, true) })
        }
        FieldValue::Array(values) => {
            json!({ "arrayValue": { "values": values.iter().map(encode_value).collect::<Vec<_>>() } })
        }
        FieldValue::Map(fields) => json!({ "mapValue": { "fields": encode_fields(fields) } }),
    }
}

/// Decode a REST document resource; `fallback_id` is used when `name` is absent
///
/// # Errors
///
/// Returns `Decode` if a field carries an unknown or malformed value
pub fn decode_document(body: &Value, fallback_id: &str) -> Result<Document, StoreError> {
    let id = body
        .get("name")
        .and_then(Value::as_str)
        .and_then(|name| name.rsplit('/').next())
        .unwrap_or(fallback_id)
        .to_string();

    let fields = match body.get("fields") {
        Some(fields) => decode_fields(fields)?,
        None => Fields::new(),
    };
    Ok(Document { id, fields })
}

fn decode_fields(fields: &Value) -> Result<Fields, StoreError> {
    let map = fields
        .as_object()
        .ok_or_else(|| StoreError::Decode("fields is not an object".to_string()))?;
    map.iter()
        .map(|(name, value)| Ok((name.clone(), decode_value(value)?)))
        .collect()
}

/// Decode a single typed REST value
///
/// # Errors
///
/// Returns `Decode` for unsupported value kinds or malformed payloads
pub fn decode_value(value: &Value) -> Result<FieldValue, StoreError> {
    let (kind, inner) = value
        .as_object()
        .and_then(|obj| obj.iter().next())
        .ok_or_else(|| StoreError::Decode(format!("expected a typed value, got {value}")))?;

    let malformed = || StoreError::Decode(format!("malformed {kind}: {inner}"));

    match kind.as_str() {
        "nullValue" => Ok(FieldValue::Null),
        "booleanValue" => inner.as_bool().map(FieldValue::Bool).ok_or_else(malformed),
        "integerValue" => inner
            .as_str()
            .and_then(|s| s.parse().ok())
            .or_else(|| inner.as_i64())
            .map(FieldValue::Integer)
            .ok_or_else(malformed),
        "doubleValue" => inner.as_f64().map(FieldValue::Double).ok_or_else(malformed),
        "stringValue" | "referenceValue" => inner
            .as_str()
            .map(|s| FieldValue::String(s.to_string()))
            .ok_or_else(malformed),
        "timestampValue" => inner
            .as_str()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|ts| FieldValue::Timestamp(ts.with_timezone(&Utc)))
            .ok_or_else(malformed),
        "arrayValue" => match inner.get("values").and_then(Value::as_array) {
            Some(values) => values
                .iter()
                .map(decode_value)
                .collect::<Result<Vec<_>, _>>()
                .map(FieldValue::Array),
            None => Ok(FieldValue::Array(Vec::new())),
        },
        "mapValue" => match inner.get("fields") {
            Some(fields) => decode_fields(fields).map(FieldValue::Map),
            None => Ok(FieldValue::Map(Fields::new())),
        },
        other => Err(StoreError::Decode(format!("unsupported value kind {other}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_document_url_layout() {
        let store = FirestoreStore::new("http://localhost:8081/v1/", "demo", "(default)", None);
        assert_eq!(
            store.document_url("jobs", "job 1"),
            "http://localhost:8081/v1/projects/demo/databases/(default)/documents/jobs/job%201"
        );
    }

    #[test]
    fn test_field_path_quoting() {
        assert_eq!(field_path("featuredUntil"), "featuredUntil");
        assert_eq!(field_path("_private"), "_private");
        assert_eq!(field_path("listing-id"), "`listing-id`");
        assert_eq!(field_path("a`b"), "`a\\`b`");
    }

    #[test]
    fn test_encode_uses_rest_value_kinds() {
        let ts = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let mut fields = Fields::new();
        fields.insert("featured".into(), true.into());
        fields.insert("featuredAt".into(), ts.into());
        fields.insert("views".into(), 12_i64.into());

        assert_eq!(
            encode_fields(&fields),
            json!({
                "featured": { "booleanValue": true },
                "featuredAt": { "timestampValue": "2024-01-01T00:00:00.000000Z" },
                "views": { "integerValue": "12" }
            })
        );
    }

    #[test]
    fn test_decode_rest_document() {
        let body = json!({
            "name": "projects/demo/databases/(default)/documents/payments/pay_1",
            "fields": {
                "status": { "stringValue": "completed" },
                "amount": { "integerValue": "1500" },
                "meta": { "mapValue": { "fields": { "tags": { "arrayValue": {} } } } },
                "paidAt": { "timestampValue": "2024-05-01T10:00:00.123Z" }
            }
        });

        let doc = decode_document(&body, "ignored").unwrap();
        assert_eq!(doc.id, "pay_1");
        assert_eq!(doc.get_str("status"), Some("completed"));
        assert_eq!(doc.get("amount"), Some(&FieldValue::Integer(1500)));
        assert!(matches!(doc.get("meta"), Some(FieldValue::Map(_))));
        assert!(doc.get("paidAt").and_then(FieldValue::as_timestamp).is_some());
    }

    #[test]
    fn test_decode_rejects_unknown_kinds() {
        let err = decode_value(&json!({ "geoPointValue": { "latitude": 1.0 } })).unwrap_err();
        assert!(matches!(err, StoreError::Decode(_)));
        assert!(decode_value(&json!("bare")).is_err());
    }
}
