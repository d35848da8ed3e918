// Match queries - probe images forwarded to the face indexer
mod error;
mod handlers;
mod query;

pub use error::MatchError;
pub use handlers::{MatchResponse, compare_handler};
pub use query::MatchQuery;
