//! Shared HTTP types: errors, the JSON extractor, paging and created responses

pub mod error;
pub mod json;
pub mod page;
pub mod response;

pub use error::{ApiError, ApiErrorResponse, ApiErrorType};
pub use json::Json;
pub use page::{PageInfo, PageQuery, PagedResult};
pub use response::Created;
