use std::io::{self, BufRead, Write};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use crate::timing::CancelToken;

/// How often a pending prompt checks for cancellation.
const POLL: Duration = Duration::from_millis(50);

/// Interactive operator prompts. Answers are optional: an empty answer or
/// closed input means "skip" and never blocks later cycles.
pub trait OperatorInput {
    /// Yes/no question; anything but "yes"/"y" is no.
    fn confirm(&mut self, question: &str) -> bool;

    /// Ask for the true label of the current sample.
    fn ask_label(&mut self) -> Option<String>;
}

/// Prompts on a writer and takes answers line by line from a reader thread.
///
/// A prompt waiting for an answer gives up as soon as the cancel token
/// fires, so shutdown is never held up by an unanswered question.
pub struct ConsoleOperator<W> {
    lines: Receiver<io::Result<String>>,
    output: W,
    cancel: CancelToken,
    closed: bool,
}

impl ConsoleOperator<io::Stdout> {
    pub fn stdio(cancel: CancelToken) -> Self {
        Self::new(io::BufReader::new(io::stdin()), io::stdout(), cancel)
    }
}

impl<W: Write> ConsoleOperator<W> {
    pub fn new<R>(input: R, output: W, cancel: CancelToken) -> Self
    where
        R: BufRead + Send + 'static,
    {
        let (tx, lines) = mpsc::channel();
        let reader = thread::Builder::new()
            .name("operator-input".into())
            .spawn(move || {
                let mut input = input;
                loop {
                    let mut line = String::new();
                    match input.read_line(&mut line) {
                        Ok(0) => break,
                        Ok(_) => {
                            if tx.send(Ok(line)).is_err() {
                                break;
                            }
                        }
                        Err(e) => {
                            let _ = tx.send(Err(e));
                            break;
                        }
                    }
                }
            });
        // Without a reader the sender is gone and every prompt reads as closed.
        if let Err(e) = reader {
            log::warn!("operator input unavailable: {e}");
        }
        Self {
            lines,
            output,
            cancel,
            closed: false,
        }
    }

    pub fn into_output(self) -> W {
        self.output
    }

    fn prompt(&mut self, text: &str) -> Option<String> {
        if self.closed || self.cancel.is_cancelled() {
            return None;
        }
        if let Err(e) = write!(self.output, "{text}").and_then(|_| self.output.flush()) {
            log::warn!("operator prompt failed: {e}");
        }
        loop {
            match self.lines.recv_timeout(POLL) {
                Ok(Ok(line)) => return Some(line.trim().to_string()),
                Ok(Err(e)) => {
                    log::warn!("reading operator input failed: {e}");
                    self.closed = true;
                    return None;
                }
                Err(RecvTimeoutError::Timeout) => {
                    if self.cancel.is_cancelled() {
                        log::debug!("prompt abandoned on shutdown");
                        return None;
                    }
                }
                Err(RecvTimeoutError::Disconnected) => {
                    log::info!("operator input closed; skipping further prompts");
                    self.closed = true;
                    return None;
                }
            }
        }
    }
}

impl<W: Write> OperatorInput for ConsoleOperator<W> {
    fn confirm(&mut self, question: &str) -> bool {
        self.prompt(&format!("{question} (yes/no): "))
            .map(|a| matches!(a.to_ascii_lowercase().as_str(), "yes" | "y"))
            .unwrap_or(false)
    }

    fn ask_label(&mut self) -> Option<String> {
        self.prompt("Enter microplastic type (or press Enter to skip): ")
            .filter(|l| !l.is_empty())
    }
}

impl<T: OperatorInput + ?Sized> OperatorInput for Box<T> {
    fn confirm(&mut self, question: &str) -> bool {
        (**self).confirm(question)
    }

    fn ask_label(&mut self) -> Option<String> {
        (**self).ask_label()
    }
}
