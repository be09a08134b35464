use std::time::Duration;

use reqwest::blocking::{Client, Response};
use reqwest::StatusCode;
use tracing::debug;

use crate::error::FetchError;

/// Text-over-HTTP seam shared by the recipe site, USDA and Google clients.
pub trait Fetcher {
    fn get(&self, url: &str, query: &[(&str, &str)]) -> Result<String, FetchError>;

    fn post_json(
        &self,
        url: &str,
        query: &[(&str, &str)],
        body: &serde_json::Value,
    ) -> Result<String, FetchError>;
}

impl<F: Fetcher + ?Sized> Fetcher for &F {
    fn get(&self, url: &str, query: &[(&str, &str)]) -> Result<String, FetchError> {
        (**self).get(url, query)
    }

    fn post_json(
        &self,
        url: &str,
        query: &[(&str, &str)],
        body: &serde_json::Value,
    ) -> Result<String, FetchError> {
        (**self).post_json(url, query, body)
    }
}

/// Blocking reqwest client with a browser-like user agent and a hard timeout per call.
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    timeout: Duration,
}

impl HttpClient {
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()?;
        Ok(HttpClient { client, timeout })
    }

    fn finish(&self, url: &str, response: reqwest::Result<Response>) -> Result<String, FetchError> {
        let response = response.map_err(|e| self.transport_error(url, e))?;
        let status = response.status();
        debug!(url, status = status.as_u16(), "response");
        check_status(url, status)?;
        response.text().map_err(|e| self.transport_error(url, e))
    }

    fn transport_error(&self, url: &str, e: reqwest::Error) -> FetchError {
        if e.is_timeout() {
            FetchError::unavailable(url, format!("timed out after {}s", self.timeout.as_secs()))
        } else {
            FetchError::unavailable(url, e.to_string())
        }
    }
}

impl Fetcher for HttpClient {
    fn get(&self, url: &str, query: &[(&str, &str)]) -> Result<String, FetchError> {
        let response = self.client.get(url).query(query).send();
        self.finish(url, response)
    }

    fn post_json(
        &self,
        url: &str,
        query: &[(&str, &str)],
        body: &serde_json::Value,
    ) -> Result<String, FetchError> {
        let response = self.client.post(url).query(query).json(body).send();
        self.finish(url, response)
    }
}

/// 404 is `NotFound`; any other non-2xx is `UpstreamUnavailable`.
pub fn check_status(url: &str, status: StatusCode) -> Result<(), FetchError> {
    if status.is_success() {
        Ok(())
    } else if status == StatusCode::NOT_FOUND {
        Err(FetchError::NotFound {
            url: url.to_string(),
        })
    } else {
        Err(FetchError::unavailable(url, format!("status {}", status.as_u16())))
    }
}

#[cfg(test)]
pub mod testing {
    use std::cell::RefCell;
    use std::collections::HashMap;

    use reqwest::StatusCode;

    use super::{check_status, Fetcher};
    use crate::error::FetchError;

    #[derive(Clone)]
    pub enum Reply {
        Body(String),
        Status(u16),
    }

    /// Offline fetcher. Routes match `url?k=v&...` first, then the bare url.
    #[derive(Default)]
    pub struct StubFetcher {
        routes: HashMap<String, Reply>,
        pub calls: RefCell<Vec<String>>,
    }

    impl StubFetcher {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn route(mut self, key: &str, body: impl Into<String>) -> Self {
            self.routes.insert(key.to_string(), Reply::Body(body.into()));
            self
        }

        pub fn fixture(self, key: &str, name: &str) -> Self {
            let body = std::fs::read_to_string(format!("tests/fixtures/{}", name)).unwrap();
            self.route(key, body)
        }

        pub fn status(mut self, key: &str, code: u16) -> Self {
            self.routes.insert(key.to_string(), Reply::Status(code));
            self
        }

        pub fn call_count(&self) -> usize {
            self.calls.borrow().len()
        }

        fn reply(&self, url: &str, query: &[(&str, &str)]) -> Result<String, FetchError> {
            let full = if query.is_empty() {
                url.to_string()
            } else {
                let qs: Vec<String> = query.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
                format!("{}?{}", url, qs.join("&"))
            };
            self.calls.borrow_mut().push(full.clone());

            match self.routes.get(&full).or_else(|| self.routes.get(url)) {
                Some(Reply::Body(b)) => Ok(b.clone()),
                Some(Reply::Status(code)) => {
                    check_status(url, StatusCode::from_u16(*code).unwrap())?;
                    Ok(String::new())
                }
                None => Err(FetchError::unavailable(url, "connection refused")),
            }
        }
    }

    impl Fetcher for StubFetcher {
        fn get(&self, url: &str, query: &[(&str, &str)]) -> Result<String, FetchError> {
            self.reply(url, query)
        }

        fn post_json(
            &self,
            url: &str,
            query: &[(&str, &str)],
            _body: &serde_json::Value,
        ) -> Result<String, FetchError> {
            self.reply(url, query)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Read;
    use std::net::TcpListener;
    use std::thread;

    use super::*;

    #[test]
    fn silent_server_times_out_as_unavailable() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}/", listener.local_addr().unwrap());
        let server = thread::spawn(move || {
            // read the request, never answer
            let (mut socket, _) = listener.accept().unwrap();
            let mut buf = [0u8; 1024];
            let _ = socket.read(&mut buf);
            thread::sleep(Duration::from_secs(3));
        });

        let client = HttpClient::new("ua", Duration::from_secs(1)).unwrap();
        let err = client.get(&url, &[]).unwrap_err();
        match err {
            FetchError::UpstreamUnavailable { reason, .. } => {
                assert!(reason.contains("timed out"), "{}", reason)
            }
            other => panic!("unexpected {:?}", other),
        }
        server.join().unwrap();
    }

    #[test]
    fn success_passes() {
        assert!(check_status("u", StatusCode::OK).is_ok());
        assert!(check_status("u", StatusCode::NO_CONTENT).is_ok());
    }

    #[test]
    fn not_found_is_distinct() {
        let err = check_status("https://x/y", StatusCode::NOT_FOUND).unwrap_err();
        assert!(matches!(err, FetchError::NotFound { ref url } if url == "https://x/y"));
    }

    #[test]
    fn other_failures_are_unavailable() {
        for code in [400u16, 403, 429, 500, 503] {
            let err = check_status("u", StatusCode::from_u16(code).unwrap()).unwrap_err();
            match err {
                FetchError::UpstreamUnavailable { reason, .. } => {
                    assert_eq!(reason, format!("status {}", code))
                }
                other => panic!("unexpected {:?}", other),
            }
        }
    }
}
