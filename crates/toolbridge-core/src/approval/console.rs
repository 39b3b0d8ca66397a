//! Terminal approval prompt

use std::io::{BufRead, BufReader, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::traits::{ApprovalGate, ApprovalRequest};

struct ConsoleIo {
    reader: Box<dyn BufRead + Send>,
    writer: Box<dyn Write + Send>,
    /// Line read on behalf of a cancelled prompt, owed to the next one
    carried: Option<String>,
}

/// Clears the flag when the awaiting request is dropped
struct Live(Arc<AtomicBool>);

impl Drop for Live {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Asks on a console whether a tool call may run
///
/// Answers are `1` (approve) or `2` (disapprove); anything else prompts
/// again. End of input or a read error disapproves. Reading happens on the
/// blocking pool, and concurrent requests are prompted one at a time.
///
/// A blocking read cannot be interrupted: when a request is cancelled while
/// waiting for input, the next line typed is handed to the following prompt
/// instead of being lost.
#[derive(Clone)]
pub struct ConsoleApprovalGate {
    io: Arc<Mutex<ConsoleIo>>,
}

impl ConsoleApprovalGate {
    /// Prompt on stdout, read answers from stdin
    pub fn stdio() -> Self {
        Self::new(BufReader::new(std::io::stdin()), std::io::stdout())
    }

    pub fn new<R, W>(reader: R, writer: W) -> Self
    where
        R: BufRead + Send + 'static,
        W: Write + Send + 'static,
    {
        Self {
            io: Arc::new(Mutex::new(ConsoleIo {
                reader: Box::new(reader),
                writer: Box::new(writer),
                carried: None,
            })),
        }
    }
}

impl Default for ConsoleApprovalGate {
    fn default() -> Self {
        Self::stdio()
    }
}

#[async_trait]
impl ApprovalGate for ConsoleApprovalGate {
    async fn request(&self, request: ApprovalRequest) -> bool {
        let io = Arc::clone(&self.io);
        let live = Live(Arc::new(AtomicBool::new(true)));
        let flag = Arc::clone(&live.0);
        let answer = tokio::task::spawn_blocking(move || {
            let mut guard = io.lock();
            if !flag.load(Ordering::SeqCst) {
                return Ok(false);
            }
            prompt(&mut guard, &request, &flag)
        })
        .await;
        drop(live);

        matches!(answer, Ok(Ok(true)))
    }
}

fn prompt(io: &mut ConsoleIo, request: &ApprovalRequest, live: &AtomicBool) -> std::io::Result<bool> {
    let ConsoleIo {
        reader,
        writer,
        carried,
    } = io;
    let arguments = serde_json::to_string(&request.arguments).unwrap_or_default();
    writeln!(writer)?;
    writeln!(writer, "Tool approval request")?;
    writeln!(writer, "  Tool:        {}", request.tool_name)?;
    writeln!(writer, "  Description: {}", request.description)?;
    writeln!(writer, "  Source:      {}", request.source)?;
    writeln!(writer, "  Arguments:   {}", arguments)?;
    writeln!(writer)?;
    writeln!(writer, "  1 - Approve")?;
    writeln!(writer, "  2 - Disapprove")?;

    let mut line = String::new();
    loop {
        write!(writer, "Enter your choice (1 or 2): ")?;
        writer.flush()?;

        line.clear();
        match carried.take() {
            Some(previous) => line = previous,
            None => {
                if reader.read_line(&mut line)? == 0 {
                    writeln!(writer)?;
                    writeln!(writer, "No input, tool execution disapproved")?;
                    return Ok(false);
                }
                if !live.load(Ordering::SeqCst) {
                    *carried = Some(std::mem::take(&mut line));
                    return Ok(false);
                }
            }
        }
        match line.trim() {
            "1" => {
                writeln!(writer, "Tool execution approved")?;
                return Ok(true);
            }
            "2" => {
                writeln!(writer, "Tool execution disapproved")?;
                return Ok(false);
            }
            _ => writeln!(writer, "Invalid choice. Please enter 1 (approve) or 2 (disapprove).")?,
        }
    }
}
