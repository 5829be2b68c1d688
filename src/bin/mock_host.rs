//! Mock editor host for integration testing
//!
//! Accepts the same `--listen <path>` flag as Neovim and answers the subset
//! of msgpack-RPC calls the harness makes, from a JSON script named by
//! `MOCK_HOST_SCRIPT`. Every request is appended to `MOCK_HOST_LOG` when set.

use rmpv::Value;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::{BufReader, BufWriter, Write};
use std::os::unix::net::UnixListener;
use std::path::PathBuf;

const BUFFER_EXT: i8 = 0;
const WINDOW_EXT: i8 = 1;
/// Window ids are the buffer number they show plus this offset
const WINDOW_BASE: i64 = 1000;

#[derive(Deserialize, Default)]
struct Script {
    /// User commands that `exists(':X')` reports and `nvim_command` accepts
    #[serde(default)]
    commands: Vec<String>,
    #[serde(default)]
    buffers: Vec<ScriptBuffer>,
}

#[derive(Deserialize)]
struct ScriptBuffer {
    number: i64,
    #[serde(default)]
    name: String,
    #[serde(default)]
    lines: Vec<String>,
    /// Values returned by `getbufvar(nr, '&name')`
    #[serde(default)]
    options: HashMap<String, serde_json::Value>,
    /// `nvim_buf_get_name` fails for this buffer
    #[serde(default)]
    name_error: bool,
    /// Hidden until this command runs
    created_by: Option<String>,
    /// Replaces `lines` when keys are fed while the buffer is current
    reload_lines: Option<Vec<String>>,
    /// Changedtick reads that still see the old text after keys are fed
    #[serde(default)]
    reload_after: usize,
}

struct MockBuffer {
    script: ScriptBuffer,
    visible: bool,
    tick: i64,
    /// Tick reads left before a fed reload lands
    pending_reload: Option<usize>,
}

struct MockState {
    commands: Vec<String>,
    buffers: Vec<MockBuffer>,
    current_window: Option<i64>,
    log: Option<std::fs::File>,
    quit: bool,
}

impl MockState {
    fn new(script: Script, log: Option<std::fs::File>) -> Self {
        let buffers = script
            .buffers
            .into_iter()
            .map(|script| MockBuffer {
                visible: script.created_by.is_none(),
                tick: 2,
                pending_reload: None,
                script,
            })
            .collect();
        Self {
            commands: script.commands,
            buffers,
            current_window: None,
            log,
            quit: false,
        }
    }

    fn buffer(&self, number: i64) -> Result<&MockBuffer, String> {
        self.buffers
            .iter()
            .find(|b| b.visible && b.script.number == number)
            .ok_or_else(|| format!("Invalid buffer id: {}", number))
    }

    fn buffer_mut(&mut self, number: i64) -> Result<&mut MockBuffer, String> {
        self.buffers
            .iter_mut()
            .find(|b| b.visible && b.script.number == number)
            .ok_or_else(|| format!("Invalid buffer id: {}", number))
    }

    /// Answer one request with `(error, result)`
    fn process_request(&mut self, method: &str, params: &[Value]) -> Result<Value, String> {
        if let Some(log) = self.log.as_mut() {
            let args: Vec<String> = params.iter().map(|p| p.to_string()).collect();
            writeln!(log, "{} {}", method, args.join(" ")).ok();
        }

        match method {
            "nvim_eval" => self.eval(str_param(params, 0)?),
            "nvim_command" => self.command(str_param(params, 0)?),
            "nvim_call_function" => {
                let name = str_param(params, 0)?;
                let args = params
                    .get(1)
                    .and_then(|a| a.as_array())
                    .map(|a| a.as_slice())
                    .unwrap_or_default();
                self.call_function(name, args)
            }
            "nvim_list_bufs" => Ok(Value::Array(
                self.buffers
                    .iter()
                    .filter(|b| b.visible)
                    .map(|b| handle(BUFFER_EXT, b.script.number))
                    .collect(),
            )),
            "nvim_list_wins" => Ok(Value::Array(
                self.buffers
                    .iter()
                    .filter(|b| b.visible)
                    .map(|b| handle(WINDOW_EXT, WINDOW_BASE + b.script.number))
                    .collect(),
            )),
            "nvim_buf_get_name" => {
                let buffer = self.buffer(handle_param(params, 0)?)?;
                if buffer.script.name_error {
                    return Err(format!("Invalid buffer id: {}", buffer.script.number));
                }
                Ok(Value::from(buffer.script.name.as_str()))
            }
            "nvim_buf_get_number" => {
                let buffer = self.buffer(handle_param(params, 0)?)?;
                Ok(Value::from(buffer.script.number))
            }
            "nvim_buf_line_count" => {
                let buffer = self.buffer(handle_param(params, 0)?)?;
                Ok(Value::from(buffer.script.lines.len() as i64))
            }
            "nvim_buf_get_lines" => {
                let buffer = self.buffer(handle_param(params, 0)?)?;
                let lines = &buffer.script.lines;
                let start = int_param(params, 1)?.clamp(0, lines.len() as i64) as usize;
                let end = match int_param(params, 2)? {
                    end if end < 0 => lines.len(),
                    end => (end as usize).min(lines.len()),
                };
                Ok(Value::Array(
                    lines[start..end.max(start)]
                        .iter()
                        .map(|l| Value::from(l.as_str()))
                        .collect(),
                ))
            }
            "nvim_win_get_buf" => {
                let number = handle_param(params, 0)? - WINDOW_BASE;
                self.buffer(number)?;
                Ok(handle(BUFFER_EXT, number))
            }
            "nvim_set_current_win" => {
                let window = handle_param(params, 0)?;
                self.buffer(window - WINDOW_BASE)?;
                self.current_window = Some(window);
                Ok(Value::Nil)
            }
            "nvim_feedkeys" => {
                if let Some(window) = self.current_window {
                    let buffer = self.buffer_mut(window - WINDOW_BASE)?;
                    if buffer.script.reload_lines.is_some() {
                        buffer.pending_reload = Some(buffer.script.reload_after);
                    }
                }
                Ok(Value::Nil)
            }
            other => Err(format!("Unknown method: {}", other)),
        }
    }

    fn eval(&self, expr: &str) -> Result<Value, String> {
        if expr == "v:vim_did_enter" {
            return Ok(Value::from(1));
        }
        if let Some(name) = expr
            .strip_prefix("exists(':")
            .and_then(|rest| rest.strip_suffix("')"))
        {
            let defined = self.commands.iter().any(|c| c == name);
            return Ok(Value::from(if defined { 2 } else { 0 }));
        }
        Err(format!("Vim:E121: Undefined variable: {}", expr))
    }

    fn command(&mut self, text: &str) -> Result<Value, String> {
        if text == "qall!" {
            self.quit = true;
            return Ok(Value::Nil);
        }
        let name = text.split_whitespace().next().unwrap_or_default();
        if !self.commands.iter().any(|c| c == name) {
            return Err(format!("Vim:E492: Not an editor command: {}", text));
        }
        for buffer in &mut self.buffers {
            if buffer.script.created_by.as_deref() == Some(name) {
                buffer.visible = true;
            }
        }
        Ok(Value::Nil)
    }

    fn call_function(&mut self, name: &str, args: &[Value]) -> Result<Value, String> {
        match name {
            "getbufvar" => {
                let number = args
                    .first()
                    .and_then(|v| v.as_i64())
                    .ok_or("getbufvar: missing buffer number")?;
                let var = args
                    .get(1)
                    .and_then(|v| v.as_str())
                    .ok_or("getbufvar: missing variable name")?;
                let buffer = self.buffer_mut(number)?;
                if var == "changedtick" {
                    buffer.advance_reload();
                    return Ok(Value::from(buffer.tick));
                }
                let option = var.strip_prefix('&').unwrap_or(var);
                Ok(buffer
                    .script
                    .options
                    .get(option)
                    .map(json_to_msgpack)
                    .unwrap_or_else(|| Value::from("")))
            }
            "getchar" => Ok(Value::from(0)),
            other => Err(format!("Vim:E117: Unknown function: {}", other)),
        }
    }
}

impl MockBuffer {
    /// Count one tick read against a pending reload, applying it when due
    fn advance_reload(&mut self) {
        match self.pending_reload {
            Some(0) => {
                if let Some(lines) = self.script.reload_lines.clone() {
                    self.script.lines = lines;
                }
                self.tick += 1;
                self.pending_reload = None;
            }
            Some(left) => self.pending_reload = Some(left - 1),
            None => {}
        }
    }
}

fn handle(ext: i8, id: i64) -> Value {
    let mut data = Vec::new();
    rmpv::encode::write_value(&mut data, &Value::from(id)).ok();
    Value::Ext(ext, data)
}

fn handle_param(params: &[Value], index: usize) -> Result<i64, String> {
    match params.get(index) {
        Some(Value::Ext(_, data)) => rmpv::decode::read_value(&mut data.as_slice())
            .ok()
            .and_then(|v| v.as_i64())
            .ok_or_else(|| "Invalid handle".to_string()),
        Some(other) => other.as_i64().ok_or_else(|| format!("Invalid handle: {}", other)),
        None => Err(format!("Missing argument {}", index)),
    }
}

fn str_param(params: &[Value], index: usize) -> Result<&str, String> {
    params
        .get(index)
        .and_then(|v| v.as_str())
        .ok_or_else(|| format!("Expected string argument {}", index))
}

fn int_param(params: &[Value], index: usize) -> Result<i64, String> {
    params
        .get(index)
        .and_then(|v| v.as_i64())
        .ok_or_else(|| format!("Expected integer argument {}", index))
}

fn json_to_msgpack(value: &serde_json::Value) -> Value {
    match value {
        serde_json::Value::Bool(b) => Value::from(*b),
        serde_json::Value::Number(n) => n.as_i64().map(Value::from).unwrap_or(Value::Nil),
        serde_json::Value::String(s) => Value::from(s.as_str()),
        _ => Value::Nil,
    }
}

fn load_script() -> Script {
    std::env::var_os("MOCK_HOST_SCRIPT")
        .and_then(|path| std::fs::read_to_string(path).ok())
        .and_then(|text| serde_json::from_str(&text).ok())
        .unwrap_or_default()
}

fn main() {
    let mut args = std::env::args().skip(1);
    let mut listen = None;
    while let Some(arg) = args.next() {
        if arg == "--listen" {
            listen = args.next().map(PathBuf::from);
        }
    }
    let Some(listen) = listen else {
        eprintln!("mock-host: --listen <path> is required");
        std::process::exit(2);
    };

    let log = std::env::var_os("MOCK_HOST_LOG")
        .and_then(|path| OpenOptions::new().create(true).append(true).open(path).ok());
    let mut state = MockState::new(load_script(), log);

    let listener = match UnixListener::bind(&listen) {
        Ok(listener) => listener,
        Err(e) => {
            eprintln!("mock-host: cannot listen on {}: {}", listen.display(), e);
            std::process::exit(1);
        }
    };

    if let Ok((stream, _)) = listener.accept() {
        let Ok(read_half) = stream.try_clone() else {
            std::process::exit(1);
        };
        let mut reader = BufReader::new(read_half);
        let mut writer = BufWriter::new(stream);

        while let Ok(message) = rmpv::decode::read_value(&mut reader) {
            let Some(fields) = message.as_array() else {
                continue;
            };
            // Only requests ([0, msgid, method, params]) get a response
            if fields.len() != 4 || fields[0].as_u64() != Some(0) {
                continue;
            }
            let msgid = fields[1].clone();
            let method = fields[2].as_str().unwrap_or_default();
            let params = fields[3].as_array().map(|a| a.as_slice()).unwrap_or_default();

            let (error, result) = match state.process_request(method, params) {
                Ok(result) => (Value::Nil, result),
                Err(message) => (
                    Value::Array(vec![Value::from(0), Value::from(message)]),
                    Value::Nil,
                ),
            };
            send_message(&mut writer, &Value::Array(vec![Value::from(1), msgid, error, result]));

            if state.quit {
                break;
            }
        }
    }

    std::fs::remove_file(&listen).ok();
}

fn send_message<W: Write>(writer: &mut W, message: &Value) {
    rmpv::encode::write_value(writer, message).ok();
    writer.flush().ok();
}
