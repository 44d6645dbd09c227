use super::backend::TranslationContext;

pub const SYSTEM_PROMPT_TEMPLATE: &str = "You are a translator. Translate the following text to {target_language}. \
     Output only the translated text without any explanations or code fences. \
     Preserve the original formatting including blank lines and indentation.";

#[allow(clippy::literal_string_with_formatting_args)]
pub fn build_system_prompt(target_language: &str) -> String {
    // {target_language} is a placeholder for string replacement, not a format argument
    SYSTEM_PROMPT_TEMPLATE.replace("{target_language}", target_language)
}

/// Extra hint sent along with multi-block chunks.
pub fn build_context_note(context: &TranslationContext) -> Option<String> {
    (context.block_count > 1).then(|| {
        format!(
            "The text contains {} separate blocks; keep them separated by blank lines.",
            context.block_count
        )
    })
}
