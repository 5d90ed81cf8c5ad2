//! Mock language worker for integration testing
//!
//! Speaks the same Content-Length framed JSON stream as a real worker and
//! answers a small set of messages so scenarios can be exercised without
//! a real language runtime.

use serde_json::{json, Map, Value};
use std::collections::HashSet;
use std::io::{BufRead, BufReader, Read, Write};

fn main() {
    let stdin = std::io::stdin();
    let stdout = std::io::stdout();
    let mut reader = BufReader::new(stdin.lock());
    let mut writer = stdout.lock();

    let mut state = MockState::default();

    loop {
        let mut header_line = String::new();
        if reader.read_line(&mut header_line).unwrap_or(0) == 0 {
            break; // EOF
        }

        if !header_line.starts_with("Content-Length:") {
            continue;
        }

        let content_length: usize = header_line
            .trim_start_matches("Content-Length:")
            .trim()
            .parse()
            .unwrap_or(0);

        let mut empty_line = String::new();
        reader.read_line(&mut empty_line).ok();

        let mut body = vec![0u8; content_length];
        if reader.read_exact(&mut body).is_err() {
            break;
        }

        let message: Value = match serde_json::from_slice(&body) {
            Ok(v) => v,
            Err(_) => continue,
        };

        match state.process_message(&message) {
            Reply::Messages(replies) => {
                for reply in replies {
                    send_message(&mut writer, &reply);
                }
            }
            Reply::Exit => break,
        }
    }
}

fn send_message<W: Write>(writer: &mut W, message: &Value) {
    let Ok(body) = serde_json::to_string(message) else {
        return;
    };
    let header = format!("Content-Length: {}\r\n\r\n", body.len());
    writer.write_all(header.as_bytes()).ok();
    writer.write_all(body.as_bytes()).ok();
    writer.flush().ok();
}

enum Reply {
    Messages(Vec<Value>),
    Exit,
}

#[derive(Default)]
struct MockState {
    initialized: bool,
    functions: HashSet<String>,
}

impl MockState {
    fn process_message(&mut self, message: &Value) -> Reply {
        let Some(fields) = message.as_object() else {
            return Reply::Messages(Vec::new());
        };
        let request_id = fields
            .get("requestId")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let Some((message_type, body)) = fields.iter().find(|(key, _)| *key != "requestId") else {
            // Empty messages are legal and ignored
            return Reply::Messages(Vec::new());
        };

        let replies = match message_type.as_str() {
            "workerInitRequest" => {
                self.initialized = true;
                vec![envelope(
                    &request_id,
                    "workerInitResponse",
                    json!({
                        "workerVersion": "1.0.0",
                        "capabilities": {"RpcHttpBodyOnly": "true", "TypedDataCollection": "true"},
                        "result": {"status": "Success"}
                    }),
                )]
            }
            "functionLoadRequest" => {
                let function_id = str_field(body, "functionId");
                let result = if !self.initialized {
                    failure("worker not initialized")
                } else if function_id.is_empty() {
                    failure("functionId is required")
                } else {
                    self.functions.insert(function_id.clone());
                    json!({"status": "Success"})
                };
                vec![envelope(
                    &request_id,
                    "functionLoadResponse",
                    json!({"functionId": function_id, "result": result}),
                )]
            }
            "invocationRequest" => self.invoke(&request_id, body),
            "workerTerminate" => return Reply::Exit,
            _ => Vec::new(),
        };
        Reply::Messages(replies)
    }

    fn invoke(&self, request_id: &str, body: &Value) -> Vec<Value> {
        let function_id = str_field(body, "functionId");
        let invocation_id = str_field(body, "invocationId");
        let input = body.get("inputData").cloned().unwrap_or(Value::Null);

        let log = envelope(
            "",
            "rpcLog",
            json!({
                "invocationId": invocation_id,
                "level": "Information",
                "message": format!("Executing '{}'", function_id)
            }),
        );

        let (result, return_value) = if !self.functions.contains(&function_id) {
            (failure(&format!("function '{}' is not loaded", function_id)), Value::Null)
        } else if input.get("fail").and_then(Value::as_bool).unwrap_or(false) {
            (failure("invocation failed on request"), Value::Null)
        } else {
            (json!({"status": "Success"}), json!({"echo": input}))
        };

        vec![
            log,
            envelope(
                request_id,
                "invocationResponse",
                json!({
                    "invocationId": invocation_id,
                    "result": result,
                    "returnValue": return_value
                }),
            ),
        ]
    }
}

fn envelope(request_id: &str, message_type: &str, body: Value) -> Value {
    let mut map = Map::new();
    map.insert("requestId".to_string(), json!(request_id));
    map.insert(message_type.to_string(), body);
    Value::Object(map)
}

fn failure(message: &str) -> Value {
    json!({"status": "Failure", "exception": {"message": message}})
}

fn str_field(body: &Value, key: &str) -> String {
    body.get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}
