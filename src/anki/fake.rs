//! In-memory stand-in for AnkiConnect used by the reconciler tests.

use std::{
    collections::{
        BTreeMap,
        HashMap,
    },
    sync::Mutex,
    time::Duration,
};

use async_trait::async_trait;
use serde_json::{
    json,
    Value,
};

use super::{
    api::Transport,
    types::{
        CreateModelParams,
        NewNote,
        TemplateContent,
    },
};
use crate::core::SyncError;

#[derive(Debug, Clone)]
pub struct FakeModel {
    pub fields: Vec<String>,
    pub css: String,
    pub is_cloze: bool,
    pub templates: BTreeMap<String, TemplateContent>,
}

#[derive(Debug, Clone)]
pub struct FakeNote {
    pub id: u64,
    pub deck: String,
    pub model: String,
    pub fields: BTreeMap<String, String>,
    pub tags: Vec<String>,
}

#[derive(Debug, Default)]
pub struct FakeState {
    pub media: BTreeMap<String, String>,
    pub models: BTreeMap<String, FakeModel>,
    pub decks: Vec<String>,
    pub notes: Vec<FakeNote>,
    pub calls: Vec<(String, Value)>,
    pub timeouts: Vec<(String, Option<Duration>)>,
    pub failures: HashMap<String, String>,
    pub offline: bool,
    pub add_note_returns_null: bool,
    next_id: u64,
}

#[derive(Default)]
pub struct FakeAnki {
    state: Mutex<FakeState>,
}

impl FakeAnki {
    pub fn new() -> Self {
        let fake = Self::default();
        fake.with_state(|s| {
            s.decks.push("Default".to_string());
            s.next_id = 1_700_000_000_000;
        });
        fake
    }

    pub fn with_state<R>(&self, f: impl FnOnce(&mut FakeState) -> R) -> R {
        let mut state = self.state.lock().unwrap();
        f(&mut state)
    }

    /// Makes every future call of `action` fail with `message`.
    pub fn fail_action(&self, action: &str, message: &str) {
        self.with_state(|s| s.failures.insert(action.to_string(), message.to_string()));
    }

    pub fn calls_to(&self, action: &str) -> Vec<Value> {
        self.with_state(|s| {
            s.calls.iter().filter(|(a, _)| a == action).map(|(_, p)| p.clone()).collect()
        })
    }

    pub fn clear_calls(&self) {
        self.with_state(|s| {
            s.calls.clear();
            s.timeouts.clear();
        });
    }

    pub fn model(&self, name: &str) -> Option<FakeModel> {
        self.with_state(|s| s.models.get(name).cloned())
    }

    pub fn note_count(&self) -> usize {
        self.with_state(|s| s.notes.len())
    }
}

fn remote(action: &str, message: impl Into<String>) -> SyncError {
    SyncError::Remote { action: action.to_string(), message: message.into() }
}

fn str_param<'a>(params: &'a Value, key: &str) -> &'a str {
    params.get(key).and_then(Value::as_str).unwrap_or_default()
}

impl FakeState {
    fn dispatch(&mut self, action: &str, params: &Value) -> Result<Value, SyncError> {
        match action {
            "version" => Ok(json!(6)),
            "getMediaFilesNames" => {
                // Over-match like a loose glob would, so callers must compare exactly.
                let pattern = str_param(params, "pattern");
                let names: Vec<&String> =
                    self.media.keys().filter(|name| name.contains(pattern)).collect();
                Ok(json!(names))
            }
            "storeMediaFile" => {
                let filename = str_param(params, "filename").to_string();
                let data = str_param(params, "data").to_string();
                self.media.insert(filename.clone(), data);
                Ok(json!(filename))
            }
            "modelNames" => Ok(json!(self.models.keys().collect::<Vec<_>>())),
            "modelFieldNames" => {
                let name = str_param(params, "modelName");
                match self.models.get(name) {
                    Some(model) => Ok(json!(model.fields)),
                    None => Err(remote(action, format!("model was not found: {}", name))),
                }
            }
            "createModel" => {
                let model: CreateModelParams = serde_json::from_value(params.clone())?;
                if self.models.contains_key(&model.model_name) {
                    return Err(remote(action, "Model name already exists"));
                }
                let templates = model
                    .card_templates
                    .into_iter()
                    .map(|t| (t.name, TemplateContent { front: t.front, back: t.back }))
                    .collect();
                self.models.insert(
                    model.model_name,
                    FakeModel {
                        fields: model.in_order_fields,
                        css: model.css,
                        is_cloze: model.is_cloze,
                        templates,
                    },
                );
                Ok(json!({ "id": self.next_id() }))
            }
            "updateModelStyling" => {
                let name = params["model"]["name"].as_str().unwrap_or_default();
                let css = params["model"]["css"].as_str().unwrap_or_default().to_string();
                let model = self
                    .models
                    .get_mut(name)
                    .ok_or_else(|| remote(action, format!("model was not found: {}", name)))?;
                model.css = css;
                Ok(Value::Null)
            }
            "updateModelTemplates" => {
                let name = params["model"]["name"].as_str().unwrap_or_default();
                let templates: BTreeMap<String, TemplateContent> =
                    serde_json::from_value(params["model"]["templates"].clone())?;
                let model = self
                    .models
                    .get_mut(name)
                    .ok_or_else(|| remote(action, format!("model was not found: {}", name)))?;
                for (template_name, content) in templates {
                    model.templates.insert(template_name, content);
                }
                Ok(Value::Null)
            }
            "deckNames" => Ok(json!(self.decks)),
            "createDeck" => {
                let deck = str_param(params, "deck").to_string();
                if !self.decks.contains(&deck) {
                    self.decks.push(deck);
                }
                Ok(json!(self.next_id()))
            }
            "addNote" => {
                let note: NewNote = serde_json::from_value(params["note"].clone())?;
                let Some(model) = self.models.get(&note.model_name) else {
                    return Err(remote(action, format!("model was not found: {}", note.model_name)));
                };
                if !self.decks.contains(&note.deck_name) {
                    return Err(remote(action, format!("deck was not found: {}", note.deck_name)));
                }
                let first_field = model.fields.first().cloned().unwrap_or_default();
                let first_value = note.fields.get(&first_field).cloned().unwrap_or_default();
                let duplicate = self.notes.iter().any(|n| {
                    n.model == note.model_name
                        && n.fields.get(&first_field).cloned().unwrap_or_default() == first_value
                });
                if duplicate && !note.options.allow_duplicate {
                    return Err(remote(action, "cannot create note because it is a duplicate"));
                }
                if self.add_note_returns_null {
                    return Ok(Value::Null);
                }
                let id = self.next_id();
                self.notes.push(FakeNote {
                    id,
                    deck: note.deck_name,
                    model: note.model_name,
                    fields: note.fields,
                    tags: note.tags,
                });
                Ok(json!(id))
            }
            "findCards" => {
                let query = str_param(params, "query");
                let model = query.trim_start_matches("note:").trim_matches('"');
                let ids: Vec<u64> =
                    self.notes.iter().filter(|n| n.model == model).map(|n| n.id + 1).collect();
                Ok(json!(ids))
            }
            "cardsInfo" => {
                let ids: Vec<u64> = serde_json::from_value(params["cards"].clone())?;
                let mut cards = Vec::new();
                for card_id in ids {
                    let Some(note) = self.notes.iter().find(|n| n.id + 1 == card_id) else {
                        continue;
                    };
                    let model = &self.models[&note.model];
                    let template = model.templates.values().next().cloned().unwrap_or(
                        TemplateContent { front: String::new(), back: String::new() },
                    );
                    let mut question = template.front;
                    let mut answer = template.back;
                    for (field, value) in &note.fields {
                        let tags =
                            [format!("{{{{{}}}}}", field), format!("{{{{cloze:{}}}}}", field)];
                        for tag in tags {
                            question = question.replace(&tag, value);
                            answer = answer.replace(&tag, value);
                        }
                    }
                    cards.push(json!({
                        "cardId": card_id,
                        "question": question,
                        "answer": answer,
                        "deckName": note.deck,
                        "modelName": note.model,
                        "note": note.id,
                    }));
                }
                Ok(json!(cards))
            }
            other => Err(remote(other, "unsupported action")),
        }
    }

    fn next_id(&mut self) -> u64 {
        self.next_id += 2;
        self.next_id
    }
}

#[async_trait]
impl Transport for FakeAnki {
    async fn invoke(
        &self,
        action: &str,
        params: Option<Value>,
        timeout: Option<Duration>,
    ) -> Result<Value, SyncError> {
        let params = params.unwrap_or(Value::Null);
        self.with_state(|state| {
            if state.offline {
                return Err(SyncError::Connection {
                    endpoint: "fake://anki".to_string(),
                    reason: "connection refused".to_string(),
                });
            }
            state.calls.push((action.to_string(), params.clone()));
            state.timeouts.push((action.to_string(), timeout));
            if let Some(message) = state.failures.get(action) {
                return Err(remote(action, message.clone()));
            }
            state.dispatch(action, &params)
        })
    }
}
