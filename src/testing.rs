//! Shared fixtures for unit tests.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::adapter::{InMemoryAdapter, Row, TableSchema};
use crate::codec::{Codec, JsonCodec};
use crate::error::ViewError;
use crate::view::{Document, IndexColumns, View};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NotePayload {
    pub body: String,
}

/// A view with one index column, `group_id`.
#[derive(Debug)]
pub struct Note {
    pub document: Document<NotePayload>,
    pub group_id: String,
}

impl Note {
    pub fn with_version(mut self, version: u64) -> Self {
        self.document.set_version(version);
        self
    }

    pub fn body(&mut self) -> String {
        self.document
            .read()
            .unwrap()
            .map(|payload| payload.body.clone())
            .unwrap_or_default()
    }

    pub fn set_body(&mut self, body: &str) {
        self.document.write().unwrap().unwrap().body = body.to_string();
    }
}

impl View for Note {
    type Payload = NotePayload;
    const TABLE: &'static str = "notes";

    fn document(&self) -> &Document<NotePayload> {
        &self.document
    }

    fn document_mut(&mut self) -> &mut Document<NotePayload> {
        &mut self.document
    }

    fn index(&self) -> IndexColumns {
        IndexColumns::new().with("group_id", self.group_id.as_str())
    }

    fn from_row(document: Document<NotePayload>, index: &IndexColumns) -> Result<Self, ViewError> {
        Ok(Note {
            document,
            group_id: index.decode("group_id")?.unwrap_or_default(),
        })
    }
}

pub fn json_codec() -> Arc<dyn Codec<NotePayload>> {
    Arc::new(JsonCodec)
}

/// A fresh, dirty note with a codec attached.
pub fn note(id: &str, group: &str) -> Note {
    let mut document = Document::new(
        id,
        NotePayload {
            body: format!("note {}", id),
        },
    );
    document.attach_codec(json_codec());
    Note {
        document,
        group_id: group.to_string(),
    }
}

pub fn notes_adapter() -> InMemoryAdapter {
    InMemoryAdapter::new(TableSchema::for_view::<Note>().index("group_id"))
}

/// Write a stored row directly, bypassing any session.
pub fn seed(store: &InMemoryAdapter, id: &str, group: &str, version: u64) -> Row {
    use crate::adapter::PersistenceAdapter;

    let row = Row {
        id: id.to_string(),
        version,
        data: Some(
            serde_json::to_vec(&NotePayload {
                body: format!("stored {}", id),
            })
            .unwrap(),
        ),
        index: IndexColumns::new().with("group_id", group),
    };
    store.insert(row.clone()).unwrap();
    row
}

/// Rebuild a clean note from a stored row.
pub fn restore(row: &Row) -> Note {
    let document = Document::stored(row.id.clone(), row.version, row.data.clone(), json_codec());
    Note::from_row(document, &row.index).unwrap()
}
