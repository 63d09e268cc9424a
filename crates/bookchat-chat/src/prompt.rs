//! Prompt templates sent to the language model.
//!
//! Every template is a plain function of its inputs so the exact text the
//! model receives can be asserted in tests.

use bookchat_core::types::{ConversationTurn, Intent};

/// Render history as one `role: content` line per turn, oldest first.
pub fn transcript(history: &[ConversationTurn]) -> String {
    history
        .iter()
        .map(|turn| format!("{}: {}", turn.role, turn.content))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn classify(question: &str, history: &[ConversationTurn]) -> String {
    format!(
        "Lịch sử trò chuyện:\n{history}\n\n\
         Câu hỏi hiện tại: {question}\n\n\
         Hãy phân loại câu hỏi vào 1 trong 3 loại:\n\
         1. \"{db}\": Hỏi về thông tin sách (giá, tác giả, số lượng, liệt kê).\n\
         2. \"{policy}\": Hỏi chính sách chung (đổi trả, giao hàng).\n\
         3. \"{chat}\": Chào hỏi, cảm ơn, hoặc nói chuyện tiếp nối lịch sử mà không cần tra cứu.\n\n\
         Chỉ trả về đúng 1 từ: {db} hoặc {policy} hoặc {chat}.",
        history = transcript(history),
        question = question,
        db = Intent::Database.label(),
        policy = Intent::Policy.label(),
        chat = Intent::Chitchat.label(),
    )
}

pub fn generate_query(question: &str, history: &[ConversationTurn], schema: &str) -> String {
    format!(
        "Bạn là chuyên gia SQL.\n\
         Lịch sử: {history}\n\
         Câu hỏi: {question}\n\n\
         Schema:\n{schema}\n\n\
         Nhiệm vụ: Viết một câu lệnh SQLite SELECT duy nhất.\n\
         Lưu ý:\n\
         - Nếu câu hỏi nhắc tới \"nó\", \"cuốn đó\" hoặc hỏi \"giá bao nhiêu\" mà không nêu tên, \
         hãy dùng cuốn sách được nhắc đến gần nhất trong lịch sử.\n\
         - Dùng LIKE với ký tự % cho tên sách và tên tác giả (không phân biệt hoa thường).\n\
         - Chỉ trả về SQL, không giải thích.",
        history = transcript(history),
        question = question,
        schema = schema,
    )
}

pub fn phrase_answer(question: &str, rows: &str) -> String {
    format!(
        "Câu hỏi: {question}\n\
         Kết quả DB: {rows}\n\n\
         Hãy trả lời câu hỏi dựa trên kết quả DB. Giọng điệu thân thiện nhân viên bán hàng.",
    )
}

pub fn chitchat(question: &str, history: &[ConversationTurn]) -> String {
    format!(
        "Lịch sử: {history}\n\
         Người dùng: {question}\n\
         Hãy trả lời thân thiện, ngắn gọn.",
        history = transcript(history),
        question = question,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use bookchat_core::types::Role;
    use chrono::Utc;

    fn turn(role: Role, content: &str) -> ConversationTurn {
        ConversationTurn {
            role,
            content: content.to_string(),
            conversation_id: "s1".to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_transcript_format() {
        let history = vec![
            turn(Role::User, "giá Dế Mèn?"),
            turn(Role::Assistant, "45.000đ ạ"),
        ];
        assert_eq!(
            transcript(&history),
            "user: giá Dế Mèn?\nassistant: 45.000đ ạ"
        );
        assert_eq!(transcript(&[]), "");
    }

    #[test]
    fn test_classify_prompt_lists_labels() {
        let prompt = classify("cảm ơn nha", &[turn(Role::User, "xin chào")]);
        assert!(prompt.contains("Câu hỏi hiện tại: cảm ơn nha"));
        assert!(prompt.contains("user: xin chào"));
        assert!(prompt.contains("DATABASE hoặc POLICY hoặc CHITCHAT"));
    }

    #[test]
    fn test_query_prompt_includes_schema_and_history() {
        let schema = "CREATE TABLE books (id INTEGER PRIMARY KEY, title TEXT)";
        let prompt = generate_query("nó giá bao nhiêu", &[turn(Role::User, "Harry Potter")], schema);
        assert!(prompt.contains(schema));
        assert!(prompt.contains("user: Harry Potter"));
        assert!(prompt.contains("LIKE"));
    }

    #[test]
    fn test_answer_and_chitchat_prompts() {
        let answer = phrase_answer("còn hàng không", "[[\"Dune\",3]]");
        assert!(answer.contains("Kết quả DB: [[\"Dune\",3]]"));

        let reply = chitchat("cảm ơn nha", &[]);
        assert!(reply.contains("Người dùng: cảm ơn nha"));
        assert!(reply.contains("ngắn gọn"));
    }
}
