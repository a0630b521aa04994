use serde::{Deserialize, Serialize};

/// A stored question/SQL pair. `index_id` is assigned by the backend and opaque here.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QuestionRecord {
    pub index_id: String,
    pub question: String,
    pub sql_query: String,
    pub date_added: String,
}

/// Body of `GET /search`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SearchResponse {
    pub results: Vec<QuestionRecord>,
}

/// Body of `POST /upload`, also the create-dialog form while it is open
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DraftEntry {
    pub question: String,
    pub sql_query: String,
}

impl DraftEntry {
    pub fn new(question: impl Into<String>, sql_query: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            sql_query: sql_query.into(),
        }
    }
}
