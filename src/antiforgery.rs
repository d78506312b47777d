use http::header::{HeaderMap, HeaderName, HeaderValue, InvalidHeaderName, InvalidHeaderValue};

pub const DEFAULT_HEADER_NAME: &str = "x-csrf";
pub const DEFAULT_HEADER_VALUE: &str = "1";

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error(transparent)]
    InvalidHeaderName(#[from] InvalidHeaderName),

    #[error(transparent)]
    InvalidHeaderValue(#[from] InvalidHeaderValue),
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum ProtectionError {
    #[error("anti-forgery header {0} is missing")]
    MissingHeader(HeaderName),

    #[error("anti-forgery header {name} is present with an unexpected value")]
    UnexpectedValue { name: HeaderName },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AntiForgeryOptions {
    header_name: HeaderName,
    header_value: HeaderValue,
}

impl Default for AntiForgeryOptions {
    fn default() -> Self {
        AntiForgeryOptions {
            header_name: HeaderName::from_static(DEFAULT_HEADER_NAME),
            header_value: HeaderValue::from_static(DEFAULT_HEADER_VALUE),
        }
    }
}

impl AntiForgeryOptions {
    pub fn new<N, V>(name: N, value: V) -> Result<Self, ConfigError>
    where
        N: AsRef<str>,
        V: AsRef<str>,
    {
        Ok(AntiForgeryOptions {
            header_name: HeaderName::from_bytes(name.as_ref().as_bytes())?,
            header_value: HeaderValue::from_str(value.as_ref())?,
        })
    }

    pub fn header_name(&self) -> &HeaderName {
        &self.header_name
    }

    pub fn header_value(&self) -> &HeaderValue {
        &self.header_value
    }

    pub fn check(&self, headers: &HeaderMap) -> Result<(), ProtectionError> {
        // every occurrence has to match, a forged duplicate must not slip through
        let mut values = headers.get_all(&self.header_name).iter().peekable();

        if values.peek().is_none() {
            return Err(ProtectionError::MissingHeader(self.header_name.clone()));
        }

        if values.all(|value| *value == self.header_value) {
            Ok(())
        } else {
            Err(ProtectionError::UnexpectedValue {
                name: self.header_name.clone(),
            })
        }
    }

    pub fn is_satisfied_by(&self, headers: &HeaderMap) -> bool {
        self.check(headers).is_ok()
    }
}
