use std::time::Duration;

use serde::Serialize;

use super::ResultSink;
use crate::error::{PlastiscanError, Result};
use crate::pipeline::CycleReport;

/// JSON body posted for every cycle.
#[derive(Debug, Serialize)]
struct Payload<'a> {
    microplastic: &'a str,
    concentration: f64,
}

/// Posts each result to a web server. Requests are bounded by `timeout` so
/// a dead server costs at most that much per cycle.
pub struct HttpSink {
    url: String,
    agent: ureq::Agent,
}

impl HttpSink {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();
        Self {
            url: url.into(),
            agent,
        }
    }

    fn failure(message: String) -> PlastiscanError {
        PlastiscanError::Sink {
            sink: "http",
            message,
        }
    }
}

impl ResultSink for HttpSink {
    fn name(&self) -> &'static str {
        "http"
    }

    fn publish(&mut self, report: &CycleReport) -> Result<()> {
        let payload = Payload {
            microplastic: &report.result.label,
            concentration: report.result.concentration,
        };

        match self.agent.post(&self.url).send_json(&payload) {
            Ok(resp) if resp.status() == 200 => {
                log::debug!("cycle {} posted to {}", report.cycle, self.url);
                Ok(())
            }
            Ok(resp) => Err(Self::failure(format!("server error: {}", resp.status()))),
            Err(ureq::Error::Status(code, _)) => {
                Err(Self::failure(format!("server error: {code}")))
            }
            Err(e) => Err(Self::failure(format!("failed to send data: {e}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::{BufRead, BufReader, Read, Write};
    use std::net::TcpListener;
    use std::thread;

    use super::*;
    use crate::data::model::{ClassificationResult, ConditionedVector, RawSample};

    fn report() -> CycleReport {
        CycleReport {
            cycle: 7,
            raw: RawSample::new([0; 6]),
            conditioned: ConditionedVector::degenerate(),
            result: ClassificationResult {
                label: "Acrylic (PMMA)".into(),
                concentration: 5.33,
                distance: Some(0.01),
            },
        }
    }

    /// Serves one request with `status` and returns the request body.
    fn one_shot_server(status: &'static str) -> (String, thread::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}/update", listener.local_addr().unwrap());
        let handle = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream.try_clone().unwrap());
            let mut content_length = 0;
            loop {
                let mut line = String::new();
                reader.read_line(&mut line).unwrap();
                let line = line.trim_end();
                if line.is_empty() {
                    break;
                }
                if let Some((name, value)) = line.split_once(':') {
                    if name.eq_ignore_ascii_case("content-length") {
                        content_length = value.trim().parse().unwrap();
                    }
                }
            }
            let mut body = vec![0u8; content_length];
            reader.read_exact(&mut body).unwrap();
            let mut stream = stream;
            write!(stream, "HTTP/1.1 {status}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n")
                .unwrap();
            String::from_utf8(body).unwrap()
        });
        (url, handle)
    }

    #[test]
    fn posts_label_and_concentration() {
        let (url, server) = one_shot_server("200 OK");
        let mut sink = HttpSink::new(url, Duration::from_secs(5));
        sink.publish(&report()).unwrap();

        let body: serde_json::Value = serde_json::from_str(&server.join().unwrap()).unwrap();
        assert_eq!(
            body,
            serde_json::json!({ "microplastic": "Acrylic (PMMA)", "concentration": 5.33 })
        );
    }

    #[test]
    fn server_error_is_a_sink_error() {
        let (url, server) = one_shot_server("500 Internal Server Error");
        let mut sink = HttpSink::new(url, Duration::from_secs(5));
        let err = sink.publish(&report()).unwrap_err();
        server.join().unwrap();
        assert!(err.to_string().contains("server error: 500"));
    }

    #[test]
    fn unreachable_server_does_not_panic() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}/update", listener.local_addr().unwrap());
        drop(listener);

        let mut sink = HttpSink::new(url, Duration::from_millis(500));
        assert!(matches!(
            sink.publish(&report()),
            Err(PlastiscanError::Sink { sink: "http", .. })
        ));
    }
}
