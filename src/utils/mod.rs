pub mod crypto;
pub mod headers;
pub mod paths;
pub mod responses;
