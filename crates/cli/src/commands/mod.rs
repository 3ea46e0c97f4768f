pub mod entries;
pub mod photos;

use std::io::{BufRead, Write};

use bodylog_client::{AutoConfirm, ConfirmationGate};

/// Asks on stderr and reads a y/N answer from stdin.
#[derive(Debug, Clone, Copy)]
pub struct PromptConfirm;

impl ConfirmationGate for PromptConfirm {
    fn confirm(&self, prompt: &str) -> bool {
        eprint!("{prompt} [y/N] ");
        if std::io::stderr().flush().is_err() {
            return false;
        }
        let mut answer = String::new();
        if std::io::stdin().lock().read_line(&mut answer).is_err() {
            return false;
        }
        is_yes(&answer)
    }
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}

/// The confirmation gate for this invocation.
pub fn confirmation(assume_yes: bool) -> Box<dyn ConfirmationGate> {
    if assume_yes {
        Box::new(AutoConfirm(true))
    } else {
        Box::new(PromptConfirm)
    }
}
