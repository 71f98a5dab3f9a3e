//! Prompt assembly.
//!
//! Turns the system instruction, the knowledge snapshot, a bounded slice of
//! session history and the new question into one [`GenerationRequest`].
//!
//! Two layouts are supported and selected by configuration:
//!
//! - [`PromptMode::SingleBlob`]: everything flattened into a single user turn,
//!   with the history rendered as text.
//! - [`PromptMode::StructuredTurns`]: one turn per history message
//!   (assistant → model), followed by a final user turn holding the
//!   instruction, the knowledge and the question.
//!
//! Assembly is deterministic: identical inputs produce identical requests.

use hrdesk_config::{AppConfig, PromptMode};
use hrdesk_core::knowledge::KnowledgeBase;
use hrdesk_core::message::{Message, Role};
use hrdesk_core::provider::{GenerationRequest, Turn};

/// The sentence the model must answer with when the data has no match.
pub const REFUSAL_SENTENCE: &str = "I could not find this information in the available data.";

/// Built-in HR assistant instruction.
pub const DEFAULT_SYSTEM_INSTRUCTION: &str = "\
Act as the HR information manager of INNO company. You have the skills and knowledge to read, remember, check, and respond to HR-related inquiries. When asked for information, you must only use the provided data to answer the question.

If the information is not available in the provided data, respond with: \"I could not find this information in the available data.\"
Do not make guesses or provide uncertain information.

Your process for handling and responding to inquiries is as follows:

- Receive the question
- Analyze and understand the question and the user's concern in natural language
- (Important) Carefully check the information in the provided documents and extract all relevant and accurate details
- Respond in natural language
- Accept feedback if the response is incorrect.";

const KNOWLEDGE_HEADER: &str = "Dưới đây là dữ liệu nhân sự:";
const QUESTION_HEADER: &str =
    "Hãy trả lời câu hỏi sau dựa vào dữ liệu và ngữ cảnh cuộc trò chuyện trước đó (nếu có):";
const HISTORY_HEADER: &str = "Lịch sử trò chuyện:";

/// Builds generation requests for one deployment.
#[derive(Debug, Clone)]
pub struct PromptAssembler {
    system_instruction: String,
    mode: PromptMode,
    model: String,
    temperature: f32,
    model_history_limit: usize,
}

impl PromptAssembler {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            system_instruction: DEFAULT_SYSTEM_INSTRUCTION.into(),
            mode: PromptMode::default(),
            model: model.into(),
            temperature: 0.7,
            model_history_limit: 6,
        }
    }

    /// Build an assembler from the `[provider]` and `[chat]` sections.
    pub fn from_config(config: &AppConfig) -> Self {
        let chat = &config.chat;
        let mut assembler = Self::new(&config.provider.model)
            .with_mode(chat.prompt_mode)
            .with_temperature(chat.temperature)
            .with_history_limit(chat.model_history_limit);
        if let Some(instruction) = &chat.system_instruction {
            assembler = assembler.with_system_instruction(instruction);
        }
        assembler
    }

    pub fn with_mode(mut self, mode: PromptMode) -> Self {
        self.mode = mode;
        self
    }

    /// Temperatures outside [0, 1] are clamped.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature.clamp(0.0, 1.0);
        self
    }

    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.model_history_limit = limit;
        self
    }

    pub fn with_system_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.system_instruction = instruction.into();
        self
    }

    pub fn mode(&self) -> PromptMode {
        self.mode
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn temperature(&self) -> f32 {
        self.temperature
    }

    /// How many prior messages accompany each question.
    pub fn history_limit(&self) -> usize {
        self.model_history_limit
    }

    pub fn system_instruction(&self) -> &str {
        &self.system_instruction
    }

    /// Assemble a request.
    ///
    /// `history` holds the messages that precede `question`; only its last
    /// `model_history_limit` entries are used.
    pub fn assemble(
        &self,
        knowledge: &KnowledgeBase,
        history: &[Message],
        question: &str,
    ) -> GenerationRequest {
        let start = history.len().saturating_sub(self.model_history_limit);
        let window = &history[start..];

        let turns = match self.mode {
            PromptMode::StructuredTurns => {
                let mut turns: Vec<Turn> = window
                    .iter()
                    .map(|m| match m.role {
                        Role::User => Turn::user(&m.content),
                        Role::Assistant => Turn::model(&m.content),
                    })
                    .collect();
                turns.push(Turn::user(self.final_prompt(knowledge, question)));
                turns
            }
            PromptMode::SingleBlob => vec![Turn::user(self.blob_prompt(knowledge, window, question))],
        };

        GenerationRequest::new(&self.model, turns, self.temperature)
    }

    fn final_prompt(&self, knowledge: &KnowledgeBase, question: &str) -> String {
        format!(
            "{}\n\n{KNOWLEDGE_HEADER}\n\n{}\n\n{QUESTION_HEADER}\n\"{question}\"",
            self.system_instruction,
            knowledge.snapshot(),
        )
    }

    fn blob_prompt(&self, knowledge: &KnowledgeBase, window: &[Message], question: &str) -> String {
        let mut out = format!(
            "{}\n\n{KNOWLEDGE_HEADER}\n\n{}\n\n",
            self.system_instruction,
            knowledge.snapshot(),
        );

        if !window.is_empty() {
            out.push_str(HISTORY_HEADER);
            out.push('\n');
            for message in window {
                let speaker = match message.role {
                    Role::User => "User",
                    Role::Assistant => "Assistant",
                };
                out.push_str(&format!("{speaker}: {}\n", message.content));
            }
            out.push('\n');
        }

        out.push_str(&format!("{QUESTION_HEADER}\n\"{question}\""));
        out
    }
}
