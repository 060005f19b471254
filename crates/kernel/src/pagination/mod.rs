//! Pagination: options, page window resolution and paginated result views.
//!
//! Both backends share the same page math; only the way the window is applied
//! to the query differs.

pub mod cursor;
pub mod options;
pub mod paginator;
pub mod resolver;

pub use cursor::{Connection, ConnectionArgs, Edge, PageInfo, decode_cursor, encode_cursor};
pub use options::{GraphQlPaginationOptions, OrderOptions, PaginationOptions};
pub use paginator::{OffsetPaginator, Paginator, PartialOffsetPaginator, PartialPaginator};
pub use resolver::{PageWindow, Pagination, parse_bool_flag};
