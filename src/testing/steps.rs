//! Step execution against a live session

use async_trait::async_trait;
use rmpv::Value;
use std::future::Future;
use tokio::process::Command;

use crate::common::{preview, Result};
use crate::host::{poll_until, PollPolicy};
use crate::rpc::{is_truthy, BufferView, RpcClient};
use crate::session::Session;

use super::case::{fail, pass, TestCase};
use super::checks::{require_fragments, require_option};
use super::config::{NamedStep, OptionExpectation, Scalar, TestStep};

#[async_trait]
impl TestCase<Session> for NamedStep {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, session: &mut Session) -> Result<()> {
        match &self.step {
            TestStep::VcsStatus => vcs_status(session).await,
            TestStep::CommandsExist { commands } => {
                commands_exist(session.rpc()?, commands).await
            }
            TestStep::Command {
                command,
                expect_success,
            } => run_command(session.rpc()?, command, expect_success.unwrap_or(true)).await,
            TestStep::Eval {
                expression,
                equals,
                truthy,
            } => eval(session.rpc()?, expression, equals.as_ref(), *truthy).await,
            TestStep::FindBuffer { marker, trigger } => {
                let buffer = resolve_buffer(session, marker, trigger.as_deref()).await?;
                println!("Buffer has {} lines", buffer.line_count().await?);
                Ok(())
            }
            TestStep::BufferContains {
                marker,
                trigger,
                patterns,
            } => {
                let buffer = resolve_buffer(session, marker, trigger.as_deref()).await?;
                let content = buffer.content().await?;
                println!("Status buffer content:");
                println!("--- START ---");
                println!("{}", content);
                println!("--- END ---");
                require_fragments(&content, patterns)
            }
            TestStep::BufferOptions {
                marker,
                trigger,
                options,
            } => {
                let buffer = resolve_buffer(session, marker, trigger.as_deref()).await?;
                buffer_options(&buffer, options).await
            }
            TestStep::Reload {
                marker,
                keys,
                mode,
                escape,
                header,
                head_lines,
            } => {
                let feed = Feed {
                    keys,
                    mode,
                    escape: *escape,
                };
                reload(session, marker, feed, header, *head_lines).await
            }
        }
    }
}

async fn vcs_status(session: &Session) -> Result<()> {
    let binary = session.vcs_binary();
    let output = match Command::new(binary).arg("status").output().await {
        Ok(output) => output,
        Err(e) => {
            return fail(format!(
                "Could not run {} status: {}",
                binary.display(),
                e
            ))
        }
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return fail(format!(
            "Not in a repository or status failed ({}): {}",
            output.status,
            stderr.trim()
        ));
    }

    pass("In a valid repository");
    let stdout = String::from_utf8_lossy(&output.stdout);
    println!("status: {}", preview(&stdout, 100));
    Ok(())
}

async fn commands_exist(rpc: &RpcClient, commands: &[String]) -> Result<()> {
    for command in commands {
        if rpc.command_exists(command).await? {
            pass(format!("Command :{} is available", command));
        } else {
            return fail(format!("Command :{} is not available", command));
        }
    }
    Ok(())
}

async fn run_command(rpc: &RpcClient, command: &str, expect_success: bool) -> Result<()> {
    match (rpc.command(command).await, expect_success) {
        (Ok(()), true) => {
            pass(format!(":{} succeeded", command));
            Ok(())
        }
        (Ok(()), false) => fail(format!(":{} succeeded but was expected to fail", command)),
        (Err(e), false) => {
            pass(format!(":{} failed as expected: {}", command, e));
            Ok(())
        }
        (Err(e), true) => Err(e),
    }
}

async fn eval(
    rpc: &RpcClient,
    expression: &str,
    equals: Option<&Scalar>,
    truthy: Option<bool>,
) -> Result<()> {
    let value = rpc.eval(expression).await?;
    let text = value_text(&value);

    if let Some(expected) = equals {
        if text != expected.to_string() {
            return fail(format!("{} = {}, expected {}", expression, text, expected));
        }
    }
    if let Some(expected) = truthy {
        if is_truthy(&value) != expected {
            return fail(format!(
                "{} = {} is {}truthy",
                expression,
                text,
                if expected { "not " } else { "" }
            ));
        }
    }

    pass(format!("{} = {}", expression, text));
    Ok(())
}

/// Render an eval result the way `:echo` would show a scalar
fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.as_str().unwrap_or_default().to_string(),
        other => other.to_string(),
    }
}

/// Optionally run `trigger`, then wait for the marker buffer
async fn resolve_buffer(
    session: &Session,
    marker: &str,
    trigger: Option<&str>,
) -> Result<BufferView> {
    let rpc = session.rpc()?;
    if let Some(command) = trigger {
        println!("Executing :{}...", command);
        rpc.command(command).await?;
    }

    if let Some(buffer) = rpc.wait_for_buffer(marker, session.settle()).await? {
        println!("Found {} buffer: {}", marker, buffer.number().await?);
        return Ok(buffer);
    }

    println!("Available buffers:");
    for line in rpc.describe_buffers().await? {
        println!("  {}", line);
    }
    fail(format!("Could not find {} buffer", marker))
}

async fn buffer_options(buffer: &BufferView, expectations: &[OptionExpectation]) -> Result<()> {
    for expectation in expectations {
        let observed = buffer.option(&expectation.name).await?;
        require_option(&expectation.name, &expectation.value, &observed)?;
    }
    Ok(())
}

struct Feed<'a> {
    keys: &'a str,
    mode: &'a str,
    escape: bool,
}

async fn reload(
    session: &Session,
    marker: &str,
    feed: Feed<'_>,
    header: &str,
    head_lines: usize,
) -> Result<()> {
    let rpc = session.rpc()?;
    let Some(buffer) = rpc.find_buffer(marker).await? else {
        return fail("Could not find status buffer");
    };
    println!("Initial buffer has {} lines", buffer.line_count().await?);

    if !rpc.focus_buffer(&buffer).await? {
        return fail(format!(
            "No window displays buffer {}",
            buffer.number().await?
        ));
    }
    let before = buffer.changedtick().await?;
    rpc.feed_keys(feed.keys, feed.mode, feed.escape).await?;

    let policy = session.settle();
    let buffer_ref = &buffer;
    let redrawn = await_redraw(policy, before, move || async move {
        observe(buffer_ref, header, head_lines).await
    })
    .await;

    let Some(seen) = redrawn else {
        let now = buffer.changedtick().await?;
        if now == before {
            return fail(format!(
                "Buffer was not redrawn within {:?} of feeding {:?}",
                policy.ceiling(),
                feed.keys
            ));
        }
        tracing::debug!(before, now, "Buffer changed but never settled");
        return check_rendered(&buffer, header, head_lines).await;
    };
    tracing::debug!(before, after = seen.tick, "Buffer redrawn");
    check_rendered(&buffer, header, head_lines).await
}

/// Final verdict on the buffer after a reload
async fn check_rendered(buffer: &BufferView, header: &str, head_lines: usize) -> Result<()> {
    let lines = buffer.line_count().await?;
    println!("After reload: buffer has {} lines", lines);
    if lines == 0 {
        return fail("Buffer empty after reload");
    }

    let head = buffer.head(head_lines).await?.join("\n");
    if !head.contains(header) {
        println!("Content: {}", head);
        return fail("Buffer content invalid after reload");
    }

    pass("Reload successful, buffer has expected content");
    Ok(())
}

/// One look at the buffer while waiting for a redraw
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Observation {
    tick: i64,
    lines: usize,
    has_header: bool,
}

impl Observation {
    /// The buffer changed since `before` and shows a usable render
    fn redrawn_since(&self, before: i64) -> bool {
        self.tick > before && self.lines > 0 && self.has_header
    }
}

async fn observe(buffer: &BufferView, header: &str, head_lines: usize) -> Result<Observation> {
    let tick = buffer.changedtick().await?;
    let lines = buffer.line_count().await?;
    let has_header = lines > 0 && buffer.head(head_lines).await?.join("\n").contains(header);
    Ok(Observation {
        tick,
        lines,
        has_header,
    })
}

/// Poll until the buffer has changed since `before` and renders again
///
/// A buffer that still shows its old content is not enough; the tick must
/// move. Read errors count as "not yet".
async fn await_redraw<F, Fut>(policy: PollPolicy, before: i64, mut look: F) -> Option<Observation>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Observation>>,
{
    poll_until(policy, || {
        let pending = look();
        async move {
            match pending.await {
                Ok(seen) if seen.redrawn_since(before) => Some(seen),
                Ok(_) => None,
                Err(e) => {
                    tracing::trace!("Buffer not readable yet: {}", e);
                    None
                }
            }
        }
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::Error;
    use std::cell::Cell;
    use std::rc::Rc;
    use std::time::Duration;

    #[test]
    fn test_value_text() {
        assert_eq!(value_text(&Value::from("nofile")), "nofile");
        assert_eq!(value_text(&Value::from(1)), "1");
        assert_eq!(value_text(&Value::Boolean(true)), "true");
    }

    fn seen(tick: i64, lines: usize, has_header: bool) -> Observation {
        Observation {
            tick,
            lines,
            has_header,
        }
    }

    /// Replays `sequence`, repeating the last entry once it runs out
    fn replay(
        sequence: Vec<Observation>,
    ) -> (
        impl FnMut() -> std::future::Ready<Result<Observation>>,
        Rc<Cell<usize>>,
    ) {
        let calls = Rc::new(Cell::new(0));
        let counter = calls.clone();
        let look = move || {
            let n = counter.get();
            counter.set(n + 1);
            let index = n.min(sequence.len() - 1);
            std::future::ready(Ok(sequence[index]))
        };
        (look, calls)
    }

    #[tokio::test(start_paused = true)]
    async fn test_old_render_is_not_a_redraw() {
        // Header already present before the keys took effect
        let (look, calls) = replay(vec![
            seen(7, 12, true),
            seen(7, 12, true),
            seen(8, 0, false),
            seen(9, 14, true),
        ]);
        let result = await_redraw(PollPolicy::new(10, Duration::from_millis(10)), 7, look).await;

        assert_eq!(result, Some(seen(9, 14, true)));
        assert_eq!(calls.get(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unchanged_tick_never_settles() {
        let (look, calls) = replay(vec![seen(7, 12, true)]);
        let result = await_redraw(PollPolicy::new(5, Duration::from_millis(10)), 7, look).await;

        assert!(result.is_none());
        assert_eq!(calls.get(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_errors_keep_polling() {
        let calls = Cell::new(0);
        let look = || {
            let n = calls.get();
            calls.set(n + 1);
            std::future::ready(if n == 0 {
                Err(Error::Rpc("Invalid buffer id".into()))
            } else {
                Ok(seen(3, 1, true))
            })
        };
        let result = await_redraw(PollPolicy::new(5, Duration::from_millis(10)), 2, look).await;

        assert_eq!(result, Some(seen(3, 1, true)));
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn test_redraw_needs_content_and_header() {
        assert!(seen(5, 3, true).redrawn_since(4));
        assert!(!seen(4, 3, true).redrawn_since(4));
        assert!(!seen(5, 0, false).redrawn_since(4));
        assert!(!seen(5, 3, false).redrawn_since(4));
    }
}
