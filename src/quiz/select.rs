use rand::seq::SliceRandom;
use rand::thread_rng;

use super::Question;

/// How a session draws from its pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Every question in the pool, in random order.
    Full,
    /// A fixed-size random sample without replacement.
    Final,
}

impl Mode {
    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "full" => Some(Self::Full),
            "final" => Some(Self::Final),
            _ => None,
        }
    }
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum SelectError {
    #[error("no questions in the pool")]
    EmptyPool,
}

/// Draws the question sequence for one session. `Final` takes
/// `min(final_size, pool size)` questions, so a small pool degrades to the
/// whole pool in random order. Answer order is not touched here; it is
/// shuffled per presentation by the session engine.
pub fn select(
    pool: &[Question],
    mode: Mode,
    final_size: usize,
) -> Result<Vec<Question>, SelectError> {
    if pool.is_empty() {
        return Err(SelectError::EmptyPool);
    }
    let mut rng = thread_rng();
    let mut questions: Vec<Question> = match mode {
        Mode::Full => pool.to_vec(),
        Mode::Final => pool
            .choose_multiple(&mut rng, final_size.min(pool.len()))
            .cloned()
            .collect(),
    };
    questions.shuffle(&mut rng);
    Ok(questions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn pool(n: usize) -> Vec<Question> {
        (0..n)
            .map(|i| Question::new(format!("q{i}"), vec!["a".into(), "b".into()], 0))
            .collect()
    }

    fn prompts(questions: &[Question]) -> HashSet<String> {
        questions.iter().map(|q| q.prompt.clone()).collect()
    }

    #[test]
    fn empty_pool_is_refused() {
        assert_eq!(select(&[], Mode::Full, 20), Err(SelectError::EmptyPool));
        assert_eq!(select(&[], Mode::Final, 20), Err(SelectError::EmptyPool));
    }

    #[test]
    fn full_mode_is_a_permutation_of_the_pool() {
        let pool = pool(10);
        let picked = select(&pool, Mode::Full, 20).unwrap();
        assert_eq!(picked.len(), 10);
        assert_eq!(prompts(&picked), prompts(&pool));
    }

    #[test]
    fn final_mode_samples_without_replacement() {
        let pool = pool(25);
        let picked = select(&pool, Mode::Final, 20).unwrap();
        assert_eq!(picked.len(), 20);
        assert_eq!(prompts(&picked).len(), 20);
    }

    #[test]
    fn final_mode_degrades_to_the_whole_pool() {
        let pool = pool(7);
        let picked = select(&pool, Mode::Final, 20).unwrap();
        assert_eq!(picked.len(), 7);
        assert_eq!(prompts(&picked), prompts(&pool));
    }

    #[test]
    fn mode_tokens_parse() {
        assert_eq!(Mode::parse("full"), Some(Mode::Full));
        assert_eq!(Mode::parse("final"), Some(Mode::Final));
        assert_eq!(Mode::parse("bonus"), None);
    }
}
