//! Line-oriented request loop

use std::io;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, warn};

use super::messages::{Request, Response};
use crate::instance::{
    instance_data_source_schema, instance_schema, requires_replace, InstanceController,
    InstanceState,
};
use crate::multipass::VmControl;

/// Serves protocol requests against an instance controller
pub struct ProtocolServer<C> {
    controller: InstanceController<C>,
}

impl<C: VmControl> ProtocolServer<C> {
    pub fn new(controller: InstanceController<C>) -> Self {
        Self { controller }
    }

    pub fn controller(&self) -> &InstanceController<C> {
        &self.controller
    }

    /// Answer one request
    pub async fn handle(&self, request: Request) -> Response {
        debug!(op = request.op(), "handling request");

        match request {
            Request::Schema => Response::Schema {
                resource: instance_schema(),
                data_source: instance_data_source_schema(),
            },
            Request::Create { spec } => match self.controller.create(&spec).await {
                Ok(record) => Response::Present { record },
                Err(e) => Response::from_error(&e),
            },
            Request::Read { record } => match self.controller.read(&record).await {
                Ok(state) => state.into(),
                Err(e) => Response::from_error(&e),
            },
            Request::Delete { record } => match self.controller.delete(&record).await {
                Ok(state) => state.into(),
                Err(e) => Response::from_error(&e),
            },
            Request::Import { id } => match self.controller.import(&id).await {
                Ok(record) => Response::Present { record },
                Err(e) => Response::from_error(&e),
            },
            Request::Describe { name } => match self.controller.describe(&name).await {
                Ok(info) => Response::Info { info },
                Err(e) => Response::from_error(&e),
            },
            Request::Plan { prior, planned } => match requires_replace(&prior, &planned) {
                Ok(fields) => Response::Plan {
                    requires_replace: fields,
                },
                Err(e) => Response::from_resolve_error(&e),
            },
        }
    }

    /// Parse and answer one request line
    pub async fn handle_line(&self, line: &str) -> Response {
        match serde_json::from_str::<Request>(line) {
            Ok(request) => self.handle(request).await,
            Err(e) => {
                warn!(error = %e, "malformed request");
                Response::error("bad_request", format!("malformed request: {}", e))
            }
        }
    }

    /// Answer requests from `reader` until EOF, one response line each
    ///
    /// A line that is not UTF-8 or not a valid request is answered with a
    /// `bad_request` error and the loop moves on.
    ///
    /// # Returns
    /// Number of requests answered. Blank lines are skipped and not counted.
    pub async fn serve<R, W>(&self, mut reader: R, mut writer: W) -> io::Result<usize>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut buf = Vec::new();
        let mut answered = 0;

        loop {
            buf.clear();
            if reader.read_until(b'\n', &mut buf).await? == 0 {
                break;
            }

            let response = match std::str::from_utf8(&buf) {
                Ok(line) if line.trim().is_empty() => continue,
                Ok(line) => self.handle_line(line.trim()).await,
                Err(e) => {
                    warn!(error = %e, "request line is not UTF-8");
                    Response::error("bad_request", format!("request line is not UTF-8: {}", e))
                }
            };

            let mut out = serde_json::to_vec(&response).map_err(io::Error::from)?;
            out.push(b'\n');
            writer.write_all(&out).await?;
            writer.flush().await?;
            answered += 1;
        }

        debug!(answered, "input closed");
        Ok(answered)
    }
}

impl From<InstanceState> for Response {
    fn from(state: InstanceState) -> Self {
        match state {
            InstanceState::Present(record) => Response::Present { record },
            InstanceState::Absent => Response::Absent,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::multipass::MockControl;

    fn server(mock: MockControl) -> ProtocolServer<MockControl> {
        ProtocolServer::new(InstanceController::new(mock))
    }

    #[tokio::test]
    async fn test_malformed_line_is_bad_request() {
        let response = server(MockControl::new()).handle_line("{not json").await;
        match response {
            Response::Error { kind, .. } => assert_eq!(kind, "bad_request"),
            other => panic!("unexpected response: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_schema_request() {
        let response = server(MockControl::new()).handle(Request::Schema).await;
        let Response::Schema { resource, data_source } = response else {
            panic!("expected schema response");
        };
        assert!(resource.attribute("cloudinit_file").is_some());
        assert!(data_source.attribute("image_hash").is_some());
    }

    #[tokio::test]
    async fn test_serve_answers_each_line() {
        let server = server(MockControl::with_instance("vm", 1, "1.0GiB", "5.0GiB"));
        let input = concat!(
            r#"{"op": "describe", "name": "vm"}"#,
            "\n\n",
            "garbage\n",
            r#"{"op": "read", "record": {"name": "ghost"}}"#,
            "\n",
        );
        let mut output = Vec::new();

        let answered = server.serve(input.as_bytes(), &mut output).await.unwrap();
        assert_eq!(answered, 3);

        let lines: Vec<serde_json::Value> = String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0]["status"], "info");
        assert_eq!(lines[0]["info"]["state"], "Running");
        assert_eq!(lines[1]["kind"], "bad_request");
        assert_eq!(lines[2]["status"], "absent");
    }

    #[tokio::test]
    async fn test_serve_survives_invalid_utf8() {
        let server = server(MockControl::with_instance("vm", 1, "1.0GiB", "5.0GiB"));
        let input: &[u8] = b"\xff\xfe\n{\"op\":\"describe\",\"name\":\"vm\"}\n";
        let mut output = Vec::new();

        let answered = server.serve(input, &mut output).await.unwrap();
        assert_eq!(answered, 2);

        let lines: Vec<serde_json::Value> = String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines[0]["status"], "error");
        assert_eq!(lines[0]["kind"], "bad_request");
        assert_eq!(lines[1]["status"], "info");
        assert_eq!(lines[1]["info"]["name"], "vm");
    }

    #[tokio::test]
    async fn test_plan_invalid_size() {
        let line = r#"{"op": "plan", "prior": {"name": "vm", "memory": "1GiB"},
                       "planned": {"name": "vm", "memory": "2XB"}}"#;
        let response = server(MockControl::new()).handle_line(line).await;
        match response {
            Response::Error { kind, message } => {
                assert_eq!(kind, "invalid_size_format");
                assert!(message.contains("2XB"));
            }
            other => panic!("unexpected response: {:?}", other),
        }
    }
}
