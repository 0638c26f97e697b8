//! Pure building blocks for the CData Arc MCP adapter: OData query
//! construction, entity keys, field-alias tables, typed partial records and
//! text formatting. Nothing here performs I/O.

pub mod cron;
pub mod error;
pub mod fields;
pub mod format;
pub mod odata;
pub mod record;
pub mod resource;

pub use error::{CoreError, UpstreamError};
pub use fields::{Field, FieldKind};
pub use odata::{DateLiteralStyle, FilterBuilder, QueryOptions};
pub use record::{PartialRecord, Record};
pub use resource::{Action, EntityKey, Resource};
