//! storr - An embedded, schema-checked, semi-structured object store
//!
//! Records are ordered maps of typed values, stored one file per record in
//! buckets grouped into repositories. Records can refer to each other by
//! `StoreReference`, and reference types give buckets a checkable schema.
//!
//! ```ignore
//! use storr::{BucketKind, Record, SchemaDefinition, Store};
//!
//! let store = Store::open_at("/var/lib/storr")?;
//! let person = store.register_type(
//!     "person",
//!     &SchemaDefinition::new().field("name", "string").field("age", "int"),
//! )?;
//! let people = store
//!     .make_repository("census")?
//!     .make_bucket("people", BucketKind::DirectoryBacked, Some(person))?;
//!
//! let mut ada = Record::with_type_label(person).with("name", "Ada")?.with("age", 36)?;
//! let id = people.make_persistent(&mut ada)?;
//! assert_eq!(people.get_by_id(id)?, ada);
//! ```

pub mod observability;
pub mod record;
pub mod reference;
pub mod store;
pub mod types;

pub use record::{Record, RecordError, Value};
pub use reference::{ReferenceError, StoreReference};
pub use store::{Bucket, BucketKind, EnforcementMode, Repository, Store, StoreConfig, StoreError};
pub use types::{ReferenceType, SchemaDefinition, TypeError};
