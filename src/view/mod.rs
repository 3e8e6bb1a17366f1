//! Views - Document records managed by the view cache.
//!
//! A view is any struct that embeds a [`Document`] and exposes its auxiliary
//! index attributes. The session only touches the document part; index
//! attributes are stored as lookup columns next to the serialized payload.
//!
//! ## Example
//!
//! ```ignore
//! use view_cache::{Document, View};
//!
//! #[derive(View)]
//! #[view(table = "order_views")]
//! struct OrderView {
//!     #[view(document)]
//!     document: Document<OrderPayload>,
//!     #[view(index)]
//!     customer_id: String,
//! }
//! ```

mod document;
mod index;
mod view_ref;

pub use document::Document;
pub use index::IndexColumns;
pub use view_ref::ViewRef;

use crate::error::ViewError;

/// A record type the view cache can track.
pub trait View: Sized + 'static {
    /// The payload type wrapped by the embedded document.
    type Payload: 'static;

    /// Table (or collection) name used in errors and logs.
    const TABLE: &'static str;

    fn document(&self) -> &Document<Self::Payload>;

    fn document_mut(&mut self) -> &mut Document<Self::Payload>;

    /// Current values of the auxiliary index attributes.
    fn index(&self) -> IndexColumns {
        IndexColumns::new()
    }

    /// Rebuild a view from a stored document and its index columns.
    fn from_row(document: Document<Self::Payload>, index: &IndexColumns) -> Result<Self, ViewError>;

    /// Build a brand-new view around `document`. Used by `create`.
    fn from_new(document: Document<Self::Payload>) -> Result<Self, ViewError> {
        Self::from_row(document, &IndexColumns::new())
    }

    /// Whether a loaded view must be written back at flush.
    ///
    /// `loaded_index` holds the index attributes captured when the view was
    /// attached to the session.
    fn is_modified(&self, loaded_index: &IndexColumns) -> bool {
        self.document().is_dirty() || self.index() != *loaded_index
    }

    fn id(&self) -> &str {
        self.document().id()
    }

    fn version(&self) -> u64 {
        self.document().version()
    }
}
