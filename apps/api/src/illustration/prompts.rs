//! Prompt templates for the illustration model.

use crate::genai_client::prompts::FLAT_ILLUSTRATION_STYLE;

pub const INSTRUCTION_PROMPT_TEMPLATE: &str = "\
Crie uma ilustração médica simples que explique visualmente esta instrução para um paciente: \
\"{instruction}\". {style}";

pub const SYMPTOM_PROMPT_TEMPLATE: &str = "\
Crie uma ilustração didática e clara de um sinal de LIBRAS (Língua Brasileira de Sinais) \
para o sintoma: \"{label}\". O movimento é descrito como: \"{description}\". \
Inclua setas indicando o movimento se necessário. Foco na clareza do gesto. {style}";

/// Prompt for the primary illustration, built from the patient explanation.
pub fn build_instruction_prompt(instruction: &str) -> String {
    INSTRUCTION_PROMPT_TEMPLATE
        .replace("{instruction}", instruction.trim())
        .replace("{style}", FLAT_ILLUSTRATION_STYLE)
}

/// Prompt for a checklist symptom, built from its label and sign description.
pub fn build_symptom_prompt(label: &str, description: &str) -> String {
    SYMPTOM_PROMPT_TEMPLATE
        .replace("{label}", label.trim())
        .replace("{description}", description.trim())
        .replace("{style}", FLAT_ILLUSTRATION_STYLE)
}
