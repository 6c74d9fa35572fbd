//! Built-in resource templates.

pub mod common;
pub mod container_cluster;
pub mod object_storage;
pub mod relational_database;

use crate::registry::ResourceTemplate;
use std::sync::Arc;

pub use container_cluster::ContainerClusterTemplate;
pub use object_storage::ObjectStorageTemplate;
pub use relational_database::RelationalDatabaseTemplate;

/// All built-in templates.
pub fn builtin() -> Vec<Arc<dyn ResourceTemplate>> {
    vec![
        Arc::new(ObjectStorageTemplate),
        Arc::new(RelationalDatabaseTemplate),
        Arc::new(ContainerClusterTemplate),
    ]
}
