mod builder;
mod decoder;
mod method;

pub use builder::{Request, RequestBuilder};
pub use decoder::{Discard, Json, ResponseDecoder, Text};
pub use method::Method;
