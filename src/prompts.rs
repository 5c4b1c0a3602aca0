use crate::session::SessionConfig;
use crate::transcript::Message;

/// Stored in front of feedback so it reads differently from a question.
pub const FEEDBACK_PREFIX: &str = "Feedback: ";

/// A prompt split into the persona/rules part and the per-call content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub instruction: String,
    pub content: String,
}

pub fn welcome_message(session: &SessionConfig) -> String {
    format!(
        "Hi! I'm your interviewer for this {} {} practice interview. I'll ask you \
         technical questions one at a time, and you can answer by typing or by voice. \
         Let's begin with the first question!",
        session.role, session.level
    )
}

pub fn feedback_message(feedback: &str) -> String {
    format!("{FEEDBACK_PREFIX}{feedback}")
}

pub fn question_prompt(session: &SessionConfig, recent: &[Message], language: &str) -> Prompt {
    let role = session.role;
    let level = session.level;

    let instruction = format!(
        "You are an experienced technical interviewer for a {role} engineer position at \
         {level} level ({experience}).

Your task is to run a mock interview.

Rules:
1. Ask exactly one technical question at a time.
2. Make sure the question suits a {role} engineer at {level} level. Draw on: {focus}.
3. Keep questions practical and relevant to real-world scenarios.
4. Keep the question short and clear.
5. Output only the question, with no extra context or commentary.
6. Write in {language}.

Examples:
- frontend junior: \"How would you center a div horizontally and vertically?\"
- backend mid: \"Explain the difference between SQL and NoSQL databases and when you would use each.\"
- fullstack senior: \"How would you design a scalable system for real-time notifications?\"",
        experience = level.experience(),
        focus = role.focus_areas(),
    );

    let context = if recent.is_empty() {
        "Starting the interview".to_string()
    } else {
        recent
            .iter()
            .map(|m| format!("{}: {}", m.sender().as_str(), m.content()))
            .collect::<Vec<_>>()
            .join("\n")
    };

    Prompt {
        instruction,
        content: format!(
            "Current conversation context:\n{context}\n\nAsk the next suitable technical question:"
        ),
    }
}

pub fn feedback_prompt(
    session: &SessionConfig,
    question: &str,
    answer: &str,
    language: &str,
) -> Prompt {
    let instruction = format!(
        "You are giving feedback on an answer in a technical interview for a {role} {level} position.

Give feedback that:
1. Acknowledges what was answered well (if anything)
2. Points out the areas that need improvement
3. Offers 1-2 specific suggestions
4. Is brief (at most 2-3 sentences)
5. Uses a supportive, professional tone

Focus on technical accuracy, clarity of communication and completeness of the answer. \
Write in {language}.",
        role = session.role,
        level = session.level,
    );

    Prompt {
        instruction,
        content: format!("Question asked: \"{question}\"\nCandidate's answer: \"{answer}\""),
    }
}
