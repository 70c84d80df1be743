pub mod result;
pub mod task;
pub mod user;

pub use result::*;
pub use task::*;
pub use user::*;

use crate::schema::EntityDescriptor;

/// SQLite expression producing the current UTC time as RFC 3339.
pub(crate) const NOW_RFC3339: &str = "strftime('%Y-%m-%dT%H:%M:%SZ', 'now')";

/// A persisted type with a declared table shape.
pub trait Entity {
    const TABLE: &'static str;

    fn descriptor() -> EntityDescriptor;
}

/// Descriptors of every persisted entity, in reconciliation order.
pub fn registered_entities() -> Vec<EntityDescriptor> {
    vec![User::descriptor(), Task::descriptor(), ScanResult::descriptor()]
}
