//! Document transport: base64 transcoding and remote fetch

pub mod resolver;

pub use resolver::{decode_base64, encode_base64, resolve_url, FetchOptions};
