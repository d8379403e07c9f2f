//! Shared types and result types for the database layer

pub mod errors;
pub mod page;

pub use errors::DatabaseError;
pub use page::{Page, PageRequest, MAX_PAGE_SIZE};

pub type DatabaseResult<T> = Result<T, DatabaseError>;
