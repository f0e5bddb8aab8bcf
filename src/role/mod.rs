//! Assistant roles and their prompt texts.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssistantRole {
    /// Drafts testable research questions for a topic.
    ResearchQuestions,
    /// Explains statistical software output in plain language.
    InterpretOutput,
}

impl AssistantRole {
    pub fn system_text(self) -> &'static str {
        match self {
            Self::ResearchQuestions => {
                "You are an expert in educational and special needs statistics.\nYou help students of an introductory statistics course.\nAnswer in Markdown."
            }
            Self::InterpretOutput => {
                "You are a patient statistics tutor for students of education.\nExplain results in simple terms and avoid jargon where you can.\nAnswer in Markdown."
            }
        }
    }

    /// Message shown when the user gave nothing to work with.
    pub fn missing_input_hint(self) -> &'static str {
        match self {
            Self::ResearchQuestions => "Please enter a topic.",
            Self::InterpretOutput => "Please paste your R output.",
        }
    }

    pub fn user_prompt(self, input: &str) -> String {
        match self {
            Self::ResearchQuestions => format!(
                "As an expert in educational and special needs statistics, generate 3-5 well-formed, testable research questions based on the following topic: \"{}\". The questions should be suitable for an introductory statistics course. For each question, briefly mention the key variables involved.",
                input.trim()
            ),
            Self::InterpretOutput => format!(
                "I am a student in an introductory statistics course for education. Please explain the following R statistical output in simple terms. Explain what the main values (like p-value, t-statistic, correlation coefficient, means) mean and what the overall conclusion is. Here is the output:\n\n```\n{}\n```",
                input.trim_end()
            ),
        }
    }
}
