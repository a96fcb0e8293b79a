mod identity;
mod json;

pub use identity::{Identity, IDENTITY_HEADER};
pub(crate) use identity::valid_username;
pub use json::AppJson;
