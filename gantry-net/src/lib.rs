// gantry-net/src/lib.rs
pub mod http;
pub mod validation;

pub use http::{build_http_client, download_and_verify, fetch_text};
pub use validation::{compute_checksum, extract_digest, verify_checksum, verify_content_type};
