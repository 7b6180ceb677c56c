use agent_provider::{Role, ToolResult, Turn};

/// Append-only model-facing history for one session.
///
/// The whole sequence is replayed on every model request; turns are never
/// edited or removed once pushed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Conversation {
    turns: Vec<Turn>,
}

impl Conversation {
    /// Starts a conversation seeded with the user's prompt.
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            turns: vec![Turn::user_text(prompt)],
        }
    }

    pub fn push(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    pub fn push_model_text(&mut self, text: impl Into<String>) {
        self.push(Turn::model_text(text));
    }

    /// Appends a single tool turn bundling every result, in request order.
    pub fn push_tool_results(&mut self, results: Vec<ToolResult>) {
        self.push(Turn::tool_results(results));
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    pub fn count_role(&self, role: Role) -> usize {
        self.turns.iter().filter(|turn| turn.role == role).count()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn new_seeds_single_user_turn() {
        let conversation = Conversation::new("fix the bug");
        assert_eq!(conversation.turns(), &[Turn::user_text("fix the bug")]);
        assert_eq!(conversation.count_role(Role::User), 1);
    }

    #[test]
    fn tool_results_share_one_turn() {
        let mut conversation = Conversation::new("prompt");
        conversation.push_tool_results(vec![
            ToolResult::success("get_files_info", json!([])),
            ToolResult::error("write_file", "denied"),
        ]);

        assert_eq!(conversation.len(), 2);
        assert_eq!(conversation.count_role(Role::Tool), 1);
        let last = conversation.last().expect("tool turn");
        assert_eq!(last.tool_results_iter().count(), 2);
    }
}
