//! Bulk readers for externally-sourced personnel files: Excel workbooks and
//! the legacy XML employee feed. Everything decodes into `diwan-core` row
//! types; no caller ever touches calamine or quick-xml directly.

pub mod error;
pub mod feed;
pub mod workbook;

pub use error::{Error, Result};
pub use feed::{read_employee_feed, FeedEmployee, DEFAULT_FEED_ENCODING};
pub use workbook::{SheetOptions, SheetRows, SheetSelector, Workbook};
