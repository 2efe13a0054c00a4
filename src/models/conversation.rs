use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Maximum number of turns retained; the oldest turn is evicted first.
pub const MAX_TURNS: usize = 10;

/// One question/answer exchange. Exactly one of `sql` and `answer` is
/// populated: `sql` for data questions, `answer` for free-text chat.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub question: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sql: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl ConversationTurn {
    pub fn sql_turn(question: String, sql: String) -> Self {
        Self {
            question,
            sql: Some(sql),
            answer: None,
            timestamp: Utc::now(),
        }
    }

    pub fn chat_turn(question: String, answer: String) -> Self {
        Self {
            question,
            sql: None,
            answer: Some(answer),
            timestamp: Utc::now(),
        }
    }
}

/// Bounded, insertion-ordered log of past turns, consumed by the
/// translation collaborator as conversational context.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversationLog {
    turns: VecDeque<ConversationTurn>,
}

impl ConversationLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, turn: ConversationTurn) {
        self.turns.push_back(turn);
        while self.turns.len() > MAX_TURNS {
            self.turns.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ConversationTurn> {
        self.turns.iter()
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }

    /// History block for the SQL-generation prompt: only turns that
    /// produced a query.
    pub fn format_for_sql_prompt(&self) -> String {
        self.turns
            .iter()
            .filter_map(|t| {
                t.sql
                    .as_ref()
                    .map(|sql| format!("User: {}\nAI SQL: {}", t.question, sql))
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// History block for the chat prompt: every turn, preferring the
    /// free-text answer when present.
    pub fn format_for_chat_prompt(&self) -> String {
        self.turns
            .iter()
            .map(|t| {
                let reply = t.answer.as_deref().or(t.sql.as_deref()).unwrap_or("");
                format!("User: {}\nAI: {}", t.question, reply)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}
