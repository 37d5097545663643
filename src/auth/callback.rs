//! Parameters the provider appends to the redirect URI

use url::{form_urlencoded, Url};

/// `code`, `state` and `error` as returned by the authorization redirect.
///
/// The provider may deliver them either in the query string or in the URL
/// fragment depending on which redirect URI was registered; both shapes
/// produce the same value.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

impl CallbackParams {
    pub fn from_url(url: &Url) -> Self {
        let from_query = Self::from_pairs(url.query().unwrap_or_default());
        if !from_query.is_empty() {
            return from_query;
        }
        Self::from_pairs(url.fragment().unwrap_or_default())
    }

    /// Parse a raw `a=b&c=d` string, tolerating a leading `?` or `#`.
    pub fn from_pairs(raw: &str) -> Self {
        let raw = raw.trim_start_matches(['?', '#']);
        let mut params = Self::default();
        for (key, value) in form_urlencoded::parse(raw.as_bytes()) {
            let value = Some(value.into_owned()).filter(|v| !v.is_empty());
            match key.as_ref() {
                "code" => params.code = value,
                "state" => params.state = value,
                "error" => params.error = value,
                _ => {}
            }
        }
        params
    }

    fn is_empty(&self) -> bool {
        self.code.is_none() && self.state.is_none() && self.error.is_none()
    }
}
