//! Interactive user prompts

use std::io::{BufRead, Write};

/// Source of answers to interactive questions
pub trait UserPrompt: Send + Sync {
    /// Ask once; `None` when no answer can be read
    fn prompt(&self, message: &str) -> Option<String>;
}

/// Prompts on stderr and reads a line from stdin
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalPrompt;

impl UserPrompt for TerminalPrompt {
    fn prompt(&self, message: &str) -> Option<String> {
        let mut stderr = std::io::stderr();
        write!(stderr, "{}", message).ok()?;
        stderr.flush().ok()?;

        let mut line = String::new();
        let read = std::io::stdin().lock().read_line(&mut line).ok()?;
        if read == 0 {
            return None;
        }
        Some(line.trim_end_matches(['\r', '\n']).to_string())
    }
}

/// For unattended runs: never answers
#[derive(Debug, Clone, Copy, Default)]
pub struct NonInteractive;

impl UserPrompt for NonInteractive {
    fn prompt(&self, _message: &str) -> Option<String> {
        None
    }
}

/// Always gives the same answer
#[derive(Debug, Clone, Default)]
pub struct FixedAnswer(pub Option<String>);

impl UserPrompt for FixedAnswer {
    fn prompt(&self, _message: &str) -> Option<String> {
        self.0.clone()
    }
}

/// Ask up to `repeat` times until a non-empty answer is given
pub fn prompt_until_answered(prompt: &dyn UserPrompt, message: &str, repeat: usize) -> Option<String> {
    for _ in 0..repeat {
        match prompt.prompt(message) {
            Some(answer) if !answer.trim().is_empty() => return Some(answer.trim().to_string()),
            Some(_) => continue,
            None => return None,
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Scripted(Mutex<Vec<&'static str>>);

    impl UserPrompt for Scripted {
        fn prompt(&self, _message: &str) -> Option<String> {
            let mut answers = self.0.lock().unwrap();
            if answers.is_empty() {
                None
            } else {
                Some(answers.remove(0).to_string())
            }
        }
    }

    #[test]
    fn test_blank_answers_are_retried() {
        let prompt = Scripted(Mutex::new(vec!["", "  ", " eric "]));
        assert_eq!(
            prompt_until_answered(&prompt, "login: ", 5),
            Some("eric".to_string())
        );
    }

    #[test]
    fn test_gives_up_after_repeat() {
        let prompt = Scripted(Mutex::new(vec!["", "", "abarth"]));
        assert_eq!(prompt_until_answered(&prompt, "login: ", 2), None);
    }

    #[test]
    fn test_non_interactive_never_answers() {
        assert_eq!(prompt_until_answered(&NonInteractive, "login: ", 5), None);
        assert_eq!(
            prompt_until_answered(&FixedAnswer(Some("mjs".into())), "login: ", 1),
            Some("mjs".to_string())
        );
    }
}
