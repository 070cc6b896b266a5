//! Object stores, indexes and record values.

mod generator;
mod index;
mod object_store;
mod values;

pub use index::IndexParameters;
pub use object_store::ObjectStoreParameters;

pub(crate) use index::IndexData;
pub(crate) use object_store::{ObjectStoreData, StoredRecord};
pub(crate) use values::ValueStore;
