//! Per-conversation state for interactive front ends.
//!
//! A [`Session`] is owned by whoever drives the conversation (the `civic
//! chat` loop, or an embedding application) and passed by `&mut`. The
//! pipeline itself is stateless between questions.

use uuid::Uuid;

/// One answered question.
#[derive(Debug, Clone, PartialEq)]
pub struct Turn {
    pub question: String,
    pub answer: String,
    pub citations: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct Session {
    id: Uuid,
    history: Vec<Turn>,
    question_count: u64,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            history: Vec::new(),
            question_count: 0,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn history(&self) -> &[Turn] {
        &self.history
    }

    /// Questions asked over the session's lifetime; not reset by [`Session::clear`].
    pub fn question_count(&self) -> u64 {
        self.question_count
    }

    pub fn record(&mut self, turn: Turn) {
        self.question_count += 1;
        self.history.push(turn);
    }

    /// Citations of the most recent answer.
    pub fn last_citations(&self) -> &[String] {
        self.history
            .last()
            .map(|t| t.citations.as_slice())
            .unwrap_or(&[])
    }

    /// Forget the conversation history.
    pub fn clear(&mut self) {
        self.history.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn turn(q: &str) -> Turn {
        Turn {
            question: q.into(),
            answer: format!("answer to {}", q),
            citations: vec![format!("handbook.pdf p.1 — \"{}\"", q)],
        }
    }

    #[test]
    fn records_and_clears() {
        let mut s = Session::new();
        assert!(s.last_citations().is_empty());
        s.record(turn("passport"));
        s.record(turn("licence"));
        assert_eq!(s.history().len(), 2);
        assert_eq!(s.question_count(), 2);
        assert!(s.last_citations()[0].contains("licence"));

        s.clear();
        assert!(s.history().is_empty());
        assert_eq!(s.question_count(), 2);
    }

    #[test]
    fn sessions_have_distinct_ids() {
        assert_ne!(Session::new().id(), Session::new().id());
    }
}
