use chrono::NaiveDate;
use log::info;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

use crate::models::chat::ChatMode;

#[derive(Debug, Error)]
pub enum PromptError {
    #[error("Prompt template '{0}' is empty")]
    EmptyTemplate(&'static str),
    #[error("Prompt file IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Prompt JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),
}

const GENERAL_PROMPT: &str = "You are LumiChat, an advanced AI assistant with specialized knowledge and helpful capabilities. You are engaging, intelligent, and provide practical solutions.

PERSONALITY: Friendly, knowledgeable, and solution-oriented. You don't just suggest \"search online\" - you provide actual helpful information and creative alternatives.

CAPABILITIES:
- Weather: Instead of saying \"check online\", provide weather-related advice, seasonal tips, outfit suggestions, or ask about their location for context
- Coding: Give specific code examples, debugging steps, and best practices
- Learning: Recommend specific resources, learning paths, and practical exercises
- Creative tasks: Brainstorm ideas, provide frameworks, and suggest approaches
- Problem-solving: Break down complex issues into actionable steps

CURRENT DATE: {current_date}

INSTRUCTIONS:
- Be specific and actionable rather than generic
- If you can't access real-time data, provide relevant knowledge, tips, or alternatives
- Ask follow-up questions to better understand their needs
- Give examples and practical suggestions
- Keep responses conversational but informative (2-4 sentences)
- Show personality and engagement";

const DIARY_PROMPT: &str = "You are Lumi, a warm and supportive companion inside the user's mood diary. Your role is to listen, reflect the user's feelings back with empathy, and gently encourage them to explore what they are experiencing.

CURRENT DATE: {current_date}

INSTRUCTIONS:
- Validate emotions without judging them
- Ask one gentle, open question at a time
- Do not diagnose or give medical advice
- If the user mentions self-harm or being unsafe, encourage them to contact someone they trust or a local crisis line
- Keep responses short and calm (2-3 sentences)";

/// System instructions per chat mode. `{current_date}` is substituted at
/// request time.
#[derive(Deserialize, Debug, Clone)]
pub struct PromptConfig {
    pub general: String,
    pub diary: String,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            general: GENERAL_PROMPT.to_string(),
            diary: DIARY_PROMPT.to_string(),
        }
    }
}

impl PromptConfig {
    fn validate(&self) -> Result<(), PromptError> {
        if self.general.trim().is_empty() {
            return Err(PromptError::EmptyTemplate("general"));
        }
        if self.diary.trim().is_empty() {
            return Err(PromptError::EmptyTemplate("diary"));
        }
        Ok(())
    }

    pub fn system_instruction(&self, mode: ChatMode, today: NaiveDate) -> String {
        let template = match mode {
            ChatMode::General => &self.general,
            ChatMode::Diary => &self.diary,
        };
        template.replace("{current_date}", &today.format("%B %-d, %Y").to_string())
    }
}

pub fn load_prompts<P: AsRef<Path>>(path: P) -> Result<Arc<PromptConfig>, PromptError> {
    let file_content = fs::read_to_string(&path)?;
    let config: PromptConfig = serde_json::from_str(&file_content)?;
    config.validate()?;
    info!("Loaded prompt overrides from {}", path.as_ref().display());
    Ok(Arc::new(config))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitutes_current_date() {
        let prompts = PromptConfig::default();
        let today = NaiveDate::from_ymd_opt(2025, 8, 28).unwrap();
        let text = prompts.system_instruction(ChatMode::General, today);
        assert!(text.contains("CURRENT DATE: August 28, 2025"));
        assert!(!text.contains("{current_date}"));
    }

    #[test]
    fn diary_mode_uses_diary_persona() {
        let prompts = PromptConfig::default();
        let today = NaiveDate::from_ymd_opt(2025, 1, 2).unwrap();
        assert!(prompts.system_instruction(ChatMode::Diary, today).contains("mood diary"));
    }

    #[test]
    fn rejects_empty_override() {
        let dir = std::env::temp_dir().join(format!("lumi-prompts-{}", uuid::Uuid::new_v4()));
        fs::write(&dir, r#"{"general":"  ","diary":"listen"}"#).unwrap();
        let err = load_prompts(&dir).unwrap_err();
        assert!(matches!(err, PromptError::EmptyTemplate("general")));
        let _ = fs::remove_file(&dir);
    }
}
