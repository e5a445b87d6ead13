use std::io::{BufRead, Write};

use crate::error::OnappError;

/// Line-based operator confirmation on stdin/stdout.
///
/// Callers interpret the raw response themselves because the two call sites
/// deliberately differ: the resolver proceeds only on an explicit `y`, while
/// the busy gate aborts only on an explicit `n`. See `affirmed`/`declined`.
pub trait Prompt {
    /// Print `question` (no trailing newline) and read one response line.
    fn ask(&mut self, question: &str) -> Result<String, OnappError>;
}

/// The real thing: blocks indefinitely on operator input.
pub struct StdinPrompt;

impl Prompt for StdinPrompt {
    fn ask(&mut self, question: &str) -> Result<String, OnappError> {
        print!("{question}");
        std::io::stdout().flush().map_err(|e| OnappError::Io {
            context: "flushing prompt".into(),
            source: e,
        })?;
        let mut line = String::new();
        std::io::stdin()
            .lock()
            .read_line(&mut line)
            .map_err(|e| OnappError::Io {
                context: "reading prompt response".into(),
                source: e,
            })?;
        Ok(line)
    }
}

/// True only when the response starts with `y`/`Y`. Anything else, including
/// an empty line, counts as a decline.
pub fn affirmed(response: &str) -> bool {
    response
        .trim_start()
        .chars()
        .next()
        .map(|c| c.eq_ignore_ascii_case(&'y'))
        .unwrap_or(false)
}

/// True only when the response starts with `n`/`N`. Anything else, including
/// an empty line, counts as consent to proceed. The mismatch with `affirmed`
/// mirrors the two historical call sites; flagged for product clarification
/// rather than unified here.
pub fn declined(response: &str) -> bool {
    response
        .trim_start()
        .chars()
        .next()
        .map(|c| c.eq_ignore_ascii_case(&'n'))
        .unwrap_or(false)
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use std::collections::VecDeque;

    /// Scripted prompt for tests: pops pre-baked responses in order and
    /// records every question asked.
    pub struct ScriptedPrompt {
        responses: VecDeque<String>,
        pub questions: Vec<String>,
    }

    impl ScriptedPrompt {
        pub fn new<I, S>(responses: I) -> Self
        where
            I: IntoIterator<Item = S>,
            S: Into<String>,
        {
            Self {
                responses: responses.into_iter().map(Into::into).collect(),
                questions: Vec::new(),
            }
        }

        /// A prompt that panics if anything asks a question.
        pub fn none() -> Self {
            Self::new(Vec::<String>::new())
        }
    }

    impl Prompt for ScriptedPrompt {
        fn ask(&mut self, question: &str) -> Result<String, OnappError> {
            self.questions.push(question.to_string());
            match self.responses.pop_front() {
                Some(r) => Ok(r),
                None => panic!("unexpected prompt: {question}"),
            }
        }
    }

    #[test]
    fn affirmed_requires_leading_y() {
        assert!(affirmed("y\n"));
        assert!(affirmed("Yes\n"));
        assert!(affirmed("  y\n"));
        assert!(!affirmed("n\n"));
        assert!(!affirmed("\n"));
        assert!(!affirmed(""));
        assert!(!affirmed("maybe\n"));
    }

    #[test]
    fn declined_requires_leading_n() {
        assert!(declined("n\n"));
        assert!(declined("No\n"));
        assert!(!declined("y\n"));
        assert!(!declined("\n"));
        assert!(!declined(""));
        // The asymmetry: garbage input declines for `affirmed` but
        // proceeds for `declined`.
        assert!(!declined("maybe\n"));
    }
}
