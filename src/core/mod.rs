pub mod casing;
pub mod clock;
pub mod credential_format;
pub mod error;
pub mod presentation_exchange;
pub mod response;
