use std::{
    collections::BTreeMap,
    time::Duration,
};

use async_trait::async_trait;
use reqwest::Client;
use serde::{
    de::DeserializeOwned,
    Deserialize,
    Serialize,
};
use serde_json::Value;

use super::types::{
    CardInfo,
    CreateModelParams,
    NewNote,
    TemplateContent,
};
use crate::core::{
    ClientConfig,
    SyncError,
};

pub const API_VERSION: u32 = 6;

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub result: Option<T>,
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    /// Splits the envelope into the result or a `Remote` error carrying the server message.
    pub fn into_result(self, action: &str) -> Result<Option<T>, SyncError> {
        match self.error {
            Some(message) => Err(SyncError::Remote { action: action.to_string(), message }),
            None => Ok(self.result),
        }
    }
}

/// Builds the `{action, version, params}` envelope. Actions without parameters send `{}`.
pub fn request_body(action: &str, params: Option<Value>) -> Value {
    let mut body = serde_json::Map::new();
    body.insert("action".to_string(), Value::String(action.to_string()));
    body.insert("version".to_string(), Value::Number(API_VERSION.into()));
    body.insert(
        "params".to_string(),
        params.unwrap_or_else(|| Value::Object(serde_json::Map::new())),
    );

    Value::Object(body)
}

/// One request/response exchange with AnkiConnect.
///
/// Implementations perform exactly one round trip per call and never retry.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn invoke(
        &self,
        action: &str,
        params: Option<Value>,
        timeout: Option<Duration>,
    ) -> Result<Value, SyncError>;
}

pub struct AnkiConnect {
    client: Client,
    config: ClientConfig,
}

impl AnkiConnect {
    pub fn new(config: ClientConfig) -> Result<Self, SyncError> {
        let client = Client::builder().build()?;
        Ok(Self { client, config })
    }

    pub fn endpoint(&self) -> &str {
        &self.config.endpoint
    }

    fn transport_error(&self, error: reqwest::Error) -> SyncError {
        if error.is_connect() || error.is_timeout() || error.is_request() {
            SyncError::Connection {
                endpoint: self.config.endpoint.clone(),
                reason: error_chain(&error),
            }
        } else {
            SyncError::from(error)
        }
    }
}

#[async_trait]
impl Transport for AnkiConnect {
    async fn invoke(
        &self,
        action: &str,
        params: Option<Value>,
        timeout: Option<Duration>,
    ) -> Result<Value, SyncError> {
        let body = request_body(action, params);
        let timeout = timeout.unwrap_or_else(|| self.config.request_timeout());

        let response = self
            .client
            .post(&self.config.endpoint)
            .timeout(timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::Remote {
                action: action.to_string(),
                message: format!("HTTP error {} from {}", status, self.config.endpoint),
            });
        }

        let response: ApiResponse<Value> = response.json().await.map_err(|e| {
            if e.is_timeout() {
                self.transport_error(e)
            } else {
                SyncError::from(e)
            }
        })?;

        Ok(response.into_result(action)?.unwrap_or(Value::Null))
    }
}

/// Joins an error with its sources, since reqwest keeps the OS-level cause
/// (e.g. "Connection refused") out of its own message.
pub fn error_chain(error: &dyn std::error::Error) -> String {
    let mut reason = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !reason.contains(&text) {
            reason.push_str(": ");
            reason.push_str(&text);
        }
        source = cause.source();
    }
    reason
}

/// Typed AnkiConnect actions on top of any [`Transport`].
pub struct Anki<T> {
    transport: T,
}

impl<T: Transport> Anki<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    async fn call<R: DeserializeOwned>(
        &self,
        action: &str,
        params: Option<Value>,
        timeout: Option<Duration>,
    ) -> Result<R, SyncError> {
        let value = self.transport.invoke(action, params, timeout).await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn call_unit(
        &self,
        action: &str,
        params: Option<Value>,
        timeout: Option<Duration>,
    ) -> Result<(), SyncError> {
        self.transport.invoke(action, params, timeout).await.map(|_| ())
    }

    pub async fn version(&self) -> Result<u32, SyncError> {
        let version: Option<u32> = self.call("version", None, None).await?;
        Ok(version.unwrap_or_default())
    }

    /// `getMediaFilesNames` treats `pattern` as a glob, so callers wanting an exact
    /// name must check membership themselves.
    pub async fn media_file_names(&self, pattern: &str) -> Result<Vec<String>, SyncError> {
        let params = serde_json::json!({ "pattern": pattern });
        let names: Option<Vec<String>> =
            self.call("getMediaFilesNames", Some(params), None).await?;
        Ok(names.unwrap_or_default())
    }

    pub async fn store_media_file(
        &self,
        filename: &str,
        base64_data: &str,
        timeout: Duration,
    ) -> Result<(), SyncError> {
        let params = serde_json::json!({ "filename": filename, "data": base64_data });
        self.call_unit("storeMediaFile", Some(params), Some(timeout)).await
    }

    pub async fn model_names(&self) -> Result<Vec<String>, SyncError> {
        let names: Option<Vec<String>> = self.call("modelNames", None, None).await?;
        Ok(names.unwrap_or_default())
    }

    pub async fn model_field_names(&self, model_name: &str) -> Result<Vec<String>, SyncError> {
        let params = serde_json::json!({ "modelName": model_name });
        let names: Option<Vec<String>> = self.call("modelFieldNames", Some(params), None).await?;
        Ok(names.unwrap_or_default())
    }

    pub async fn create_model(&self, model: &CreateModelParams) -> Result<(), SyncError> {
        let params = serde_json::to_value(model)?;
        self.call_unit("createModel", Some(params), None).await
    }

    pub async fn update_model_styling(&self, model_name: &str, css: &str) -> Result<(), SyncError> {
        let params = serde_json::json!({ "model": { "name": model_name, "css": css } });
        self.call_unit("updateModelStyling", Some(params), None).await
    }

    pub async fn update_model_templates(
        &self,
        model_name: &str,
        templates: &BTreeMap<String, TemplateContent>,
    ) -> Result<(), SyncError> {
        let params = serde_json::json!({ "model": { "name": model_name, "templates": templates } });
        self.call_unit("updateModelTemplates", Some(params), None).await
    }

    pub async fn deck_names(&self) -> Result<Vec<String>, SyncError> {
        let names: Option<Vec<String>> = self.call("deckNames", None, None).await?;
        Ok(names.unwrap_or_default())
    }

    pub async fn create_deck(&self, deck_name: &str) -> Result<Option<u64>, SyncError> {
        let params = serde_json::json!({ "deck": deck_name });
        self.call("createDeck", Some(params), None).await
    }

    /// Returns `None` when Anki accepted the call but did not create a note.
    pub async fn add_note(&self, note: &NewNote) -> Result<Option<u64>, SyncError> {
        let params = serde_json::json!({ "note": note });
        self.call("addNote", Some(params), None).await
    }

    pub async fn find_cards(&self, query: &str) -> Result<Vec<u64>, SyncError> {
        let params = serde_json::json!({ "query": query });
        let ids: Option<Vec<u64>> = self.call("findCards", Some(params), None).await?;
        Ok(ids.unwrap_or_default())
    }

    pub async fn cards_info(&self, card_ids: &[u64]) -> Result<Vec<CardInfo>, SyncError> {
        let params = serde_json::json!({ "cards": card_ids });
        let cards: Option<Vec<CardInfo>> = self.call("cardsInfo", Some(params), None).await?;
        Ok(cards.unwrap_or_default())
    }
}

/// Search query selecting every note of a note type, quoted when the name needs it.
pub fn note_query(model_name: &str) -> String {
    if model_name.contains(' ') || model_name.contains(':') || model_name.contains('"') {
        format!("note:\"{}\"", model_name.replace('"', "\\\""))
    } else {
        format!("note:{}", model_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_body() {
        let body = request_body("modelNames", None);
        assert_eq!(
            body,
            serde_json::json!({ "action": "modelNames", "version": 6, "params": {} })
        );

        let body = request_body("createDeck", Some(serde_json::json!({ "deck": "Default" })));
        assert_eq!(body["params"]["deck"], "Default");
        assert_eq!(body["version"], 6);
    }

    #[test]
    fn test_into_result() {
        let ok: ApiResponse<u32> = serde_json::from_str(r#"{"result": 6, "error": null}"#).unwrap();
        assert_eq!(ok.into_result("version").unwrap(), Some(6));

        let null: ApiResponse<u64> =
            serde_json::from_str(r#"{"result": null, "error": null}"#).unwrap();
        assert_eq!(null.into_result("addNote").unwrap(), None);

        let err: ApiResponse<u64> = serde_json::from_str(
            r#"{"result": null, "error": "cannot create note because it is a duplicate"}"#,
        )
        .unwrap();
        match err.into_result("addNote") {
            Err(SyncError::Remote { action, message }) => {
                assert_eq!(action, "addNote");
                assert!(message.contains("duplicate"));
            }
            other => panic!("Expected Remote error, got {:?}", other),
        }
    }

    #[derive(Debug, thiserror::Error)]
    #[error("error sending request for url (http://127.0.0.1:8765/)")]
    struct SendError(#[source] std::io::Error);

    #[derive(Debug, thiserror::Error)]
    #[error("tcp connect error: {0}")]
    struct ConnectError(#[source] std::io::Error);

    fn refused() -> std::io::Error {
        std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "Connection refused")
    }

    #[test]
    fn test_error_chain() {
        assert_eq!(
            error_chain(&SendError(refused())),
            "error sending request for url (http://127.0.0.1:8765/): Connection refused"
        );

        // A cause already quoted by its parent is not repeated.
        assert_eq!(error_chain(&ConnectError(refused())), "tcp connect error: Connection refused");
    }

    #[test]
    fn test_note_query_quoting() {
        assert_eq!(note_query("Cloze-Modern"), "note:Cloze-Modern");
        assert_eq!(note_query("Basic (and reversed)"), "note:\"Basic (and reversed)\"");
        assert_eq!(note_query("a\"b"), "note:\"a\\\"b\"");
    }
}
