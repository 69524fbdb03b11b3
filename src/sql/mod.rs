//! SQL safety checks and query shaping

mod limit;
mod validator;

pub use limit::add_limit_if_needed;
pub use validator::{DEFAULT_ALLOWED_STATEMENTS, MAX_LIMIT, MAX_QUERY_LENGTH, QueryValidator, normalize};
