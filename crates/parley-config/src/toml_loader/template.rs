//! Default TOML config template with inline documentation comments.

/// Generate the default TOML config content with comments.
pub(crate) fn default_config_toml() -> String {
    r####"# Parley Configuration
# Schema version 1
# Only override what you want to change -- missing fields use defaults.

[backend]
# command = "llama-backend"    # speaks JSON lines on stdin/stdout
# args = []
# wrap_prompt = true           # wrap prompts in an instruction template
# prompt_template = "### Instruction:\n\n{instruction}\n\n### Response:\n\n"

[model]
# path = "/path/to/model.bin"  # loaded on startup when set

[inference]
# repeat_last_n = 64
# max_token_count = 0          # 0 or unset = no limit
# batch_size = 8               # >= 1
# top_k = 40                   # >= 1
# top_p = 0.95                 # 0.0-1.0
# repeat_penalty = 1.3         # > 0.0
# temperature = 0.8            # 0.0-2.0

[session]
# intent_capacity = 32         # 1-1024
# event_capacity = 64          # 1-4096

[logging]
# level = "INFO"               # DEBUG, INFO, WARNING, ERROR
"####
    .to_string()
}
