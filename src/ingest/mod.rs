/// Collaborator ingestion.
///
/// - `collaborator`: HTTP client and the live three-endpoint fetch.
/// - `payloads`: wire schemas and validation at the parse boundary.

pub mod collaborator;
pub mod payloads;
