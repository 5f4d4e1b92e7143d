//! # fomz-shared
//!
//! Types shared by the local store, the cloud store and the client layer:
//! the form/draft/response data model, id generation, the clock seam and
//! the single error type both storage backends report through.

pub mod clock;
pub mod constants;
pub mod error;
pub mod form;
pub mod response;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{FomzError, Result};
pub use form::*;
pub use response::*;
pub use types::*;
