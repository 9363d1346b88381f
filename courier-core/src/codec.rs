//! Process-wide JSON encoder/decoder.
//!
//! The codec is built once on first use and shared by every request. It carries
//! no settings of its own; `serde_json` defaults apply.

use std::sync::OnceLock;

use serde::{de::DeserializeOwned, Serialize};

use crate::error::{Error, Result};
use crate::transport::RawResponse;

static CODEC: OnceLock<JsonCodec> = OnceLock::new();

/// Returns the shared codec, building it on the first call.
pub fn codec() -> &'static JsonCodec {
    CODEC.get_or_init(JsonCodec::new)
}

#[derive(Debug)]
pub struct JsonCodec {
    _private: (),
}

impl JsonCodec {
    fn new() -> Self {
        log::debug!("json codec initialised");
        Self { _private: () }
    }

    pub fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<String> {
        Ok(serde_json::to_string(value)?)
    }

    pub fn decode<T: DeserializeOwned>(&self, json: &str) -> Result<T> {
        Ok(serde_json::from_str(json)?)
    }

    /// Decodes a response body, honouring the charset announced in its
    /// `Content-Type` header.
    pub fn decode_response<T: DeserializeOwned>(&self, response: &RawResponse) -> Result<T> {
        let text = self.body_text(response)?;
        self.decode(&text)
    }

    /// Response body as text. UTF-8, US-ASCII and ISO-8859-1 are understood;
    /// anything else is an [`Error::UnsupportedEncoding`].
    pub fn body_text(&self, response: &RawResponse) -> Result<String> {
        let charset = response.charset();
        match charset.as_str() {
            "utf-8" | "utf8" => String::from_utf8(response.body().to_vec())
                .map_err(|_| Error::UnsupportedEncoding(format!("body is not valid {charset}"))),
            "us-ascii" | "ascii" => {
                if !response.body().is_ascii() {
                    return Err(Error::UnsupportedEncoding(format!(
                        "body is not valid {charset}"
                    )));
                }
                Ok(String::from_utf8_lossy(response.body()).into_owned())
            }
            "iso-8859-1" | "latin1" | "latin-1" => {
                Ok(response.body().iter().map(|&b| b as char).collect())
            }
            _ => Err(Error::UnsupportedEncoding(charset)),
        }
    }
}
