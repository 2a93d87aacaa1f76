//! Status reference resolution

use super::error::{StatusError, StatusResult};
use super::realm::AuthRealm;
use once_cell::sync::OnceCell;
use crate::transport::sword::xml::attribute;
use quick_xml::events::Event;
use quick_xml::Reader;
use reqwest::blocking::Client;
use secrecy::ExposeSecret;
use tracing::debug;
use url::Url;

/// Category scheme carrying the deposit state in a SWORD statement
pub const STATE_SCHEME: &str = "http://purl.org/net/sword/terms/state";

/// Resolves a deposit's status reference to a remote status URI
pub trait DepositStatusResolver: Send + Sync {
    /// `Ok(None)` when the status document names no state
    fn resolve(&self, status_ref: &str, realm: Option<&AuthRealm>) -> StatusResult<Option<String>>;
}

/// Reads the state from a SWORD v2 Atom statement
#[derive(Default)]
pub struct HttpStatementResolver {
    client: OnceCell<Client>,
}

impl HttpStatementResolver {
    pub fn new() -> Self {
        Self::default()
    }

    fn client(&self, url: &str) -> StatusResult<&Client> {
        self.client
            .get_or_try_init(|| Client::builder().build())
            .map_err(|source| StatusError::Fetch {
                url: url.to_string(),
                source,
            })
    }
}

impl DepositStatusResolver for HttpStatementResolver {
    fn resolve(&self, status_ref: &str, realm: Option<&AuthRealm>) -> StatusResult<Option<String>> {
        let url = Url::parse(status_ref).map_err(|e| StatusError::InvalidReference {
            reference: status_ref.to_string(),
            message: e.to_string(),
        })?;

        let mut request = self.client(status_ref)?.get(url);
        if let Some(realm) = realm {
            debug!("Resolving {} with credentials for realm {}", status_ref, realm.base_url);
            request = request.basic_auth(&realm.username, Some(realm.password.expose_secret()));
        }

        let fetch_error = |source| StatusError::Fetch {
            url: status_ref.to_string(),
            source,
        };
        let response = request.send().map_err(fetch_error)?;
        let status = response.status().as_u16();
        if !(200..300).contains(&status) {
            return Err(StatusError::HttpStatus {
                url: status_ref.to_string(),
                status,
            });
        }
        let body = response.text().map_err(fetch_error)?;

        parse_statement_state(&body).map_err(|message| StatusError::Parse {
            url: status_ref.to_string(),
            message,
        })
    }
}

/// Extract the deposit state URI from an Atom statement
///
/// Accepts `<category scheme=".../terms/state" term="...">` and
/// `<sword:state href="...">`; the first one found wins.
pub fn parse_statement_state(xml: &str) -> Result<Option<String>, String> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                b"category" if attribute(&e, "scheme").as_deref() == Some(STATE_SCHEME) => {
                    if let Some(term) = attribute(&e, "term") {
                        return Ok(Some(term));
                    }
                }
                b"state" => {
                    if let Some(href) = attribute(&e, "href") {
                        return Ok(Some(href));
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => return Ok(None),
            Ok(_) => {}
            Err(e) => {
                return Err(format!(
                    "malformed XML at position {}: {}",
                    reader.error_position(),
                    e
                ))
            }
        }
    }
}
