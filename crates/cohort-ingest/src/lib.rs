pub mod error;
pub mod events;
pub mod lists;
pub mod loader;
pub mod source;
pub mod table;
pub mod tables;

pub use error::{FieldError, LoadError, Result};
pub use events::{EVENT_SOURCE_COLUMNS, EventReader, EventRow};
pub use lists::read_id_list;
pub use loader::{TableLoader, load_table_from_path};
pub use source::{is_gzip, open_source, resolve_source};
pub use table::{ColumnSpec, ProjectedRow, Projection, SourceTable};
