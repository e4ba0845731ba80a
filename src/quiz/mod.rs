pub mod blocks;
pub mod select;
pub mod session;
pub mod timer;

use std::time::Duration;

/// One multiple-choice question as loaded from a bank file. `options` keeps
/// the bank's order; shuffling happens per presentation.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Question {
    pub prompt: String,
    pub options: Vec<String>,
    pub correct_index: usize,
    #[serde(default)]
    pub explanation: String,
}

impl Question {
    pub fn new(prompt: String, options: Vec<String>, correct_index: usize) -> Self {
        Self {
            prompt,
            options,
            correct_index,
            explanation: String::new(),
        }
    }

    /// Presentation records for one showing of this question. Correctness
    /// travels with the record, so shuffling stays unambiguous even when
    /// two options share the same text.
    pub fn answers(&self) -> Vec<Answer> {
        self.options
            .iter()
            .enumerate()
            .map(|(i, text)| Answer::new(text.clone(), i == self.correct_index))
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Answer {
    pub text: String,
    pub is_correct: bool,
}
impl Answer {
    pub fn new(text: String, is_correct: bool) -> Self {
        Self { text, is_correct }
    }
}

/// Engine constants, consulted by the selector, the timer and menu labels.
#[derive(Debug, Clone)]
pub struct QuizConfig {
    pub question_timeout: Duration,
    pub final_size: usize,
}

impl Default for QuizConfig {
    fn default() -> Self {
        Self {
            question_timeout: Duration::from_secs(60),
            final_size: 20,
        }
    }
}

const LETTERS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// A question can never present more options than there are letter labels.
pub(crate) const MAX_OPTIONS: usize = LETTERS.len();

/// Letter label for an option position (A, B, C...). Only called with
/// indexes of options that were actually presented.
pub fn letter(index: usize) -> char {
    LETTERS[index] as char
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::seq::SliceRandom;
    use rand::thread_rng;

    #[test]
    fn letters_run_from_a() {
        assert_eq!(letter(0), 'A');
        assert_eq!(letter(1), 'B');
        assert_eq!(letter(25), 'Z');
    }

    #[test]
    fn answers_flag_the_original_correct_position() {
        let q = Question::new(
            "Столиця Франції?".into(),
            vec!["Париж".into(), "Лондон".into(), "Берлін".into()],
            0,
        );
        let answers = q.answers();
        assert!(answers[0].is_correct);
        assert!(!answers[1].is_correct);
        assert!(!answers[2].is_correct);
    }

    #[test]
    fn duplicate_option_texts_keep_exactly_one_correct_record() {
        let q = Question::new("dup".into(), vec!["так".into(), "так".into(), "ні".into()], 1);
        let mut answers = q.answers();
        answers.shuffle(&mut thread_rng());
        assert_eq!(answers.iter().filter(|a| a.is_correct).count(), 1);
        let correct = answers.iter().find(|a| a.is_correct).unwrap();
        assert_eq!(correct.text, "так");
    }
}
