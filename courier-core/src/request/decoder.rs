use std::marker::PhantomData;

use serde::de::DeserializeOwned;

use crate::codec::codec;
use crate::error::Result;
use crate::transport::RawResponse;

/// Turns a successful raw response into the value handed to the caller.
///
/// Decoders are chosen per request on the builder, see
/// [`crate::RequestBuilder::decode_json`].
pub trait ResponseDecoder: Send + Sync + 'static {
    type Output: Send + 'static;

    fn decode(&self, response: &RawResponse) -> Result<Self::Output>;
}

/// Decode the body as JSON into `T` through the shared codec.
pub struct Json<T>(PhantomData<fn() -> T>);

impl<T> Json<T> {
    pub fn new() -> Self {
        Json(PhantomData)
    }
}

impl<T> Default for Json<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: DeserializeOwned + Send + 'static> ResponseDecoder for Json<T> {
    type Output = T;

    fn decode(&self, response: &RawResponse) -> Result<T> {
        codec().decode_response(response)
    }
}

/// Body as text, using the response charset.
#[derive(Debug, Default, Clone, Copy)]
pub struct Text;

impl ResponseDecoder for Text {
    type Output = String;

    fn decode(&self, response: &RawResponse) -> Result<String> {
        codec().body_text(response)
    }
}

/// Ignore the body; only success or failure matters.
#[derive(Debug, Default, Clone, Copy)]
pub struct Discard;

impl ResponseDecoder for Discard {
    type Output = ();

    fn decode(&self, _response: &RawResponse) -> Result<()> {
        Ok(())
    }
}
