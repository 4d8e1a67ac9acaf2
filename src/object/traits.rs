use serde::Deserialize;

use crate::{object::Meta, schema::Schema};

/// A domain type stored in one table of the store.
///
/// The object's `Meta` field is expected to be `#[serde(skip)]`: rows never
/// carry it, and decoding keeps the target's metadata.
pub trait Object: for<'de> Deserialize<'de> + Default + Sized + Send + Sync + 'static {
    /// Table (collection) the object lives in
    const TABLE: &'static str;

    /// Attribute schema used to encode filter literals and decode rows
    fn schema() -> &'static Schema;

    fn meta(&self) -> &Meta;

    fn meta_mut(&mut self) -> &mut Meta;

    /// Empty instance marked as already persisted, ready to be populated
    /// from a stored row.
    fn persisted() -> Self {
        let mut obj = Self::default();
        *obj.meta_mut() = Meta::persisted();
        obj
    }
}

pub trait ObjectMeta {
    fn is_new(&self) -> bool;
}

impl<T> ObjectMeta for T
where
    T: Object,
{
    fn is_new(&self) -> bool {
        self.meta().is_new()
    }
}
