//! Pause-for-decision collaborators.
//!
//! A capture session that suspects the end of the feed asks a [`DecisionPrompt`]
//! whether to finish or resume. Each call resolves exactly once.

use crate::types::Decision;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing::{info, warn};

#[async_trait]
pub trait DecisionPrompt: Send + Sync {
    async fn decide(&self, message: &str) -> Decision;
}

/// Asks on the terminal. Blank input or `r` resumes; `f`, `q` or EOF finishes.
///
/// One line reader lives as long as the prompt, so answers typed ahead of a
/// later pause stay buffered for it.
pub struct TerminalPrompt<R = BufReader<Stdin>> {
    lines: tokio::sync::Mutex<Lines<R>>,
}

impl TerminalPrompt {
    pub fn new() -> Self {
        Self::from_reader(BufReader::new(tokio::io::stdin()))
    }
}

impl Default for TerminalPrompt {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: AsyncBufRead + Unpin> TerminalPrompt<R> {
    pub fn from_reader(reader: R) -> Self {
        Self {
            lines: tokio::sync::Mutex::new(reader.lines()),
        }
    }
}

fn parse_answer(line: &str) -> Option<Decision> {
    match line.trim().to_ascii_lowercase().as_str() {
        "" | "r" | "resume" | "c" | "continue" => Some(Decision::Resume),
        "f" | "finish" | "q" | "quit" | "stop" => Some(Decision::Finish),
        _ => None,
    }
}

#[async_trait]
impl<R: AsyncBufRead + Unpin + Send> DecisionPrompt for TerminalPrompt<R> {
    async fn decide(&self, message: &str) -> Decision {
        let mut lines = self.lines.lock().await;
        loop {
            eprintln!("{}", message);
            eprint!("[R]esume / [F]inish > ");
            match lines.next_line().await {
                Ok(Some(line)) => match parse_answer(&line) {
                    Some(d) => return d,
                    None => eprintln!("Unrecognised answer: {:?}", line.trim()),
                },
                Ok(None) => return Decision::Finish,
                Err(e) => {
                    warn!("decision: stdin read failed, finishing: {}", e);
                    return Decision::Finish;
                }
            }
        }
    }
}

/// Answers from a fixed script, then finishes once the script runs out.
///
/// Every message it was shown is kept for inspection.
#[derive(Debug, Default)]
pub struct ScriptedPrompt {
    answers: Mutex<VecDeque<Decision>>,
    seen: Mutex<Vec<String>>,
}

impl ScriptedPrompt {
    pub fn new(answers: impl IntoIterator<Item = Decision>) -> Self {
        Self {
            answers: Mutex::new(answers.into_iter().collect()),
            seen: Mutex::new(Vec::new()),
        }
    }

    /// Resume `n` times, then finish.
    pub fn resume_times(n: u32) -> Self {
        Self::new((0..n).map(|_| Decision::Resume))
    }

    pub fn messages(&self) -> Vec<String> {
        self.seen.lock().map(|m| m.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl DecisionPrompt for ScriptedPrompt {
    async fn decide(&self, message: &str) -> Decision {
        if let Ok(mut seen) = self.seen.lock() {
            seen.push(message.to_string());
        }
        let next = self
            .answers
            .lock()
            .ok()
            .and_then(|mut q| q.pop_front())
            .unwrap_or(Decision::Finish);
        info!("decision: scripted answer {:?}", next);
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_answers() {
        assert_eq!(parse_answer(""), Some(Decision::Resume));
        assert_eq!(parse_answer(" R \n"), Some(Decision::Resume));
        assert_eq!(parse_answer("finish"), Some(Decision::Finish));
        assert_eq!(parse_answer("Q"), Some(Decision::Finish));
        assert_eq!(parse_answer("maybe"), None);
    }

    #[tokio::test]
    async fn answers_typed_ahead_are_kept_for_the_next_pause() {
        let prompt = TerminalPrompt::from_reader(&b"what\nr\nf\n"[..]);
        assert_eq!(prompt.decide("first pause").await, Decision::Resume);
        assert_eq!(prompt.decide("second pause").await, Decision::Finish);
        assert_eq!(prompt.decide("input closed").await, Decision::Finish);
    }

    #[tokio::test]
    async fn scripted_prompt_runs_out_into_finish() {
        let prompt = ScriptedPrompt::resume_times(1);
        assert_eq!(prompt.decide("first").await, Decision::Resume);
        assert_eq!(prompt.decide("second").await, Decision::Finish);
        assert_eq!(prompt.messages(), vec!["first", "second"]);
    }
}
