//! Prompt constants for Libras gloss translation.
//!
//! The model answers with `{"gloss": "...", "explanation": "..."}`, enforced by
//! `gloss_response_schema()`.

use serde_json::{json, Value};

use crate::genai_client::prompts::LIBRAS_INTERPRETER_ROLE;

pub const TRANSLATION_PROMPT_TEMPLATE: &str = "\
{role}\n\
Sua tarefa é traduzir a seguinte orientação/prescrição médica para a GLOSSA \
(estrutura gramatical escrita) de Libras.\n\
\n\
Regras:\n\
1. A Glossa deve estar em Caixa Alta.\n\
2. Use estrutura Tópico-Comentário (Sujeito-Objeto-Verbo geralmente).\n\
3. Verbos no infinitivo.\n\
4. Remova artigos e preposições desnecessárias.\n\
5. Adicione expressões faciais ou modificadores entre parênteses se crítico para o \
contexto médico (ex: (expressão de dor), (negativo)).\n\
\n\
Texto Original: \"{text}\"\n\
\n\
Retorne APENAS um JSON com o seguinte formato:\n\
{\"gloss\": \"A glossa traduzida\", \"explanation\": \"Uma breve explicação em português \
claro para o paciente sobre como realizar os sinais principais mencionados.\"}";

pub fn build_translation_prompt(text: &str) -> String {
    TRANSLATION_PROMPT_TEMPLATE
        .replace("{role}", LIBRAS_INTERPRETER_ROLE)
        .replace("{text}", text)
}

/// Response schema passed as `generationConfig.responseSchema`.
pub fn gloss_response_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "gloss": { "type": "STRING" },
            "explanation": { "type": "STRING" }
        },
        "required": ["gloss", "explanation"]
    })
}
