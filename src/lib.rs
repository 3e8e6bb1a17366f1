mod adapter;
mod codec;
mod error;
mod manager;
mod session;
mod view;

#[cfg(test)]
mod testing;

pub use adapter::{Criteria, InMemoryAdapter, PersistenceAdapter, Row, TableSchema};
#[cfg(feature = "bitcode")]
pub use codec::BitcodeCodec;
pub use codec::{Codec, CodecError, JsonCodec};
pub use error::{OptimisticConflict, ViewError, ViewResult};
pub use manager::{UnitOfWork, ViewManager};
pub use session::{CommitStats, Lookup, Pending, Session, Status};
pub use view::{Document, IndexColumns, View, ViewRef};

// Derive macro for the View trait
pub use view_cache_macros::View;
