//! Live views of host-side buffers and windows
//!
//! These are handles, not snapshots: every accessor is a fresh RPC call and
//! fails once the host exits or the buffer is wiped.

use std::fmt;

use nvim_rs::exttypes::{Buffer, Window};
use nvim_rs::Neovim;
use rmpv::Value;
use serde::{Deserialize, Serialize};

use crate::common::{Error, Result};

use super::handler::Writer;

/// A buffer in the host
pub struct BufferView {
    buffer: Buffer<Writer>,
    nvim: Neovim<Writer>,
}

impl BufferView {
    pub(crate) fn new(buffer: Buffer<Writer>, nvim: Neovim<Writer>) -> Self {
        Self { buffer, nvim }
    }

    pub async fn number(&self) -> Result<i64> {
        Ok(self.buffer.get_number().await?)
    }

    pub async fn name(&self) -> Result<String> {
        Ok(self.buffer.get_name().await?)
    }

    pub async fn lines(&self) -> Result<Vec<String>> {
        Ok(self.buffer.get_lines(0, -1, false).await?)
    }

    /// The first `count` lines (fewer if the buffer is shorter)
    pub async fn head(&self, count: usize) -> Result<Vec<String>> {
        Ok(self.buffer.get_lines(0, count as i64, false).await?)
    }

    pub async fn line_count(&self) -> Result<usize> {
        let count = self.buffer.line_count().await?;
        Ok(count.max(0) as usize)
    }

    pub async fn content(&self) -> Result<String> {
        Ok(self.lines().await?.join("\n"))
    }

    /// Counter the host bumps on every change to the buffer text
    pub async fn changedtick(&self) -> Result<i64> {
        let number = self.number().await?;
        let value = self
            .nvim
            .call_function(
                "getbufvar",
                vec![Value::from(number), Value::from("changedtick")],
            )
            .await?;
        value
            .as_i64()
            .ok_or_else(|| Error::Rpc(format!("unexpected changedtick: {}", value)))
    }

    /// Buffer-local value of an option
    pub async fn option(&self, name: &str) -> Result<OptionValue> {
        let number = self.number().await?;
        let value = self
            .nvim
            .call_function(
                "getbufvar",
                vec![Value::from(number), Value::from(format!("&{}", name))],
            )
            .await?;
        OptionValue::from_value(&value)
    }
}

/// A window in the host
pub struct WindowView {
    pub(crate) window: Window<Writer>,
}

impl WindowView {
    /// Number of the buffer the window displays
    pub async fn buffer_number(&self) -> Result<i64> {
        let buffer = self.window.get_buf().await?;
        Ok(buffer.get_number().await?)
    }
}

/// An option value as the host reports it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    Bool(bool),
    Int(i64),
    Str(String),
}

impl OptionValue {
    pub fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Boolean(b) => Ok(Self::Bool(*b)),
            Value::Integer(i) => i
                .as_i64()
                .map(Self::Int)
                .ok_or_else(|| Error::Rpc(format!("option value out of range: {}", value))),
            Value::String(s) => Ok(Self::Str(s.as_str().unwrap_or_default().to_string())),
            other => Err(Error::Rpc(format!("unexpected option value: {}", other))),
        }
    }

    /// Exact equality, except that Vimscript reports boolean options as 0/1
    pub fn matches(&self, observed: &OptionValue) -> bool {
        match (self, observed) {
            (Self::Bool(expected), Self::Int(actual)) => *expected == (*actual != 0),
            (expected, actual) => expected == actual,
        }
    }
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{}", b),
            Self::Int(i) => write!(f, "{}", i),
            Self::Str(s) => write!(f, "{}", s),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_value() {
        assert_eq!(
            OptionValue::from_value(&Value::from("nofile")).unwrap(),
            OptionValue::Str("nofile".into())
        );
        assert_eq!(
            OptionValue::from_value(&Value::from(0)).unwrap(),
            OptionValue::Int(0)
        );
        assert_eq!(
            OptionValue::from_value(&Value::from(true)).unwrap(),
            OptionValue::Bool(true)
        );
        assert!(OptionValue::from_value(&Value::Nil).is_err());
    }

    #[test]
    fn test_boolean_options_accept_vimscript_integers() {
        assert!(OptionValue::Bool(false).matches(&OptionValue::Int(0)));
        assert!(OptionValue::Bool(true).matches(&OptionValue::Int(1)));
        assert!(!OptionValue::Bool(false).matches(&OptionValue::Int(1)));
    }

    #[test]
    fn test_strings_match_exactly() {
        let expected = OptionValue::Str("nofile".into());
        assert!(expected.matches(&OptionValue::Str("nofile".into())));
        assert!(!expected.matches(&OptionValue::Str("NOFILE".into())));
        assert!(!expected.matches(&OptionValue::Str(String::new())));
    }

    #[test]
    fn test_yaml_values_deserialize_by_shape() {
        let values: Vec<OptionValue> = serde_yaml::from_str("[nofile, false, 4]").unwrap();
        assert_eq!(
            values,
            vec![
                OptionValue::Str("nofile".into()),
                OptionValue::Bool(false),
                OptionValue::Int(4)
            ]
        );
    }
}
