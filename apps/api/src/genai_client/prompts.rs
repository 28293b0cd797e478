// Shared prompt fragments.
// Each service that calls the model defines its own prompts.rs alongside it;
// this file holds the pieces both of them reuse.

/// Role preamble shared by every Libras-related prompt.
pub const LIBRAS_INTERPRETER_ROLE: &str = "\
Você é um intérprete especialista em Libras (Língua Brasileira de Sinais) focado na área médica.";

/// Visual style appended to every illustration prompt.
pub const FLAT_ILLUSTRATION_STYLE: &str = "\
Use um estilo de desenho vetorial plano (flat design), amigável, sobre fundo branco. \
A imagem deve ser clara, educativa e fácil de entender.";
