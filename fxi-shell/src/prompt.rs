//! Questions asked by applications, answered by the next input line.

use std::sync::Mutex;

use crossbeam_channel::Sender;
use fxi_kernel::Prompt;

use crate::lock;
use crate::terminal::Output;

/// Routes the next submitted line to whichever thread is blocked in `ask`.
///
/// Only one question can be pending; a second concurrent `ask` gets no
/// answer.
pub struct LinePrompt {
    out: Output,
    pending: Mutex<Option<Sender<String>>>,
}

impl LinePrompt {
    pub fn new(out: Output) -> Self {
        Self {
            out,
            pending: Mutex::new(None),
        }
    }

    pub fn is_pending(&self) -> bool {
        lock(&self.pending).is_some()
    }

    /// Hand `line` to the pending question. Returns false when nothing was
    /// asked, in which case the line is a normal command line.
    pub fn answer(&self, line: &str) -> bool {
        let Some(tx) = lock(&self.pending).take() else {
            return false;
        };
        // The asking thread may have gone away; the line is consumed anyway.
        let _ = tx.send(line.to_string());
        true
    }

    /// Drop the pending question; the asker receives no answer.
    pub fn cancel(&self) {
        if lock(&self.pending).take().is_some() {
            tracing::debug!("pending question cancelled");
        }
    }
}

impl Prompt for LinePrompt {
    fn ask(&self, question: &str, hidden: bool) -> Option<String> {
        let (tx, rx) = crossbeam_channel::bounded(1);
        {
            let mut pending = lock(&self.pending);
            if pending.is_some() {
                tracing::warn!(question, "another question is already pending");
                return None;
            }
            *pending = Some(tx);
        }

        if hidden {
            self.out.line(&format!("? {} (input is not masked)", question));
        } else {
            self.out.line(&format!("? {}", question));
        }
        rx.recv().ok()
    }
}
