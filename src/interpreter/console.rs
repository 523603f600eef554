use std::collections::VecDeque;

/// The standard streams of a single Bolton execution.
///
/// Nothing is written to the process' own stdout/stderr: everything a program prints ends up
/// in buffers owned by the execution that created the console.
#[derive(Debug, Default)]
pub struct Console {
    stdout: String,
    stderr: String,
    input: VecDeque<String>,
    max_output_bytes: usize,
}

/// What a program wrote while it was running.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapturedOutput {
    pub stdout: String,
    pub stderr: String,
}

#[derive(Debug, thiserror::Error)]
#[error("Output exceeded the limit of {0} bytes")]
pub struct OutputLimitExceeded(usize);

impl Console {
    /// `input` is split into lines, consumed one at a time by `INPUT` and `INPUT_INT`.
    pub fn new(input: &str, max_output_bytes: usize) -> Self {
        Self {
            stdout: String::new(),
            stderr: String::new(),
            input: input.lines().map(str::to_owned).collect(),
            max_output_bytes,
        }
    }

    /// Bytes that can still be written before the output cap is reached.
    pub fn remaining(&self) -> usize {
        self.max_output_bytes
            .saturating_sub(self.stdout.len() + self.stderr.len())
    }

    /// Write a line to the standard output buffer.
    pub fn print(&mut self, text: &str) -> Result<(), OutputLimitExceeded> {
        if text.len() + 1 > self.remaining() {
            return Err(OutputLimitExceeded(self.max_output_bytes));
        }
        self.stdout.push_str(text);
        self.stdout.push('\n');
        Ok(())
    }

    /// Write a line to the standard error buffer.
    pub fn warn(&mut self, text: &str) {
        // Past the cap, warnings are dropped silently.
        if self.stdout.len() + self.stderr.len() + text.len() < self.max_output_bytes {
            self.stderr.push_str(text);
            self.stderr.push('\n');
        }
    }

    pub fn read_line(&mut self) -> Option<String> {
        self.input.pop_front()
    }

    /// Discard what has been printed so far.
    pub fn clear(&mut self) {
        self.stdout.clear();
    }

    pub fn into_output(self) -> CapturedOutput {
        CapturedOutput {
            stdout: self.stdout,
            stderr: self.stderr,
        }
    }
}

/// Run `work` against a fresh console and collect what it printed.
pub fn capture<T>(
    input: &str,
    max_output_bytes: usize,
    work: impl FnOnce(&mut Console) -> T,
) -> (T, CapturedOutput) {
    let mut console = Console::new(input, max_output_bytes);
    let outcome = work(&mut console);
    (outcome, console.into_output())
}
