pub mod envelope;
pub mod request;
pub mod session;

pub use envelope::{ApiError, Envelope};
pub use request::{HttpMethod, RequestDescriptor, RequestOptions, Route};
pub use session::{RefreshedTokens, SessionTokens};
