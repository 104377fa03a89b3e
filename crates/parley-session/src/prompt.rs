//! Instruction templates for instruction-tuned models.

/// Placeholder replaced by the user's prompt.
pub const INSTRUCTION_PLACEHOLDER: &str = "{instruction}";

const DEFAULT_TEMPLATE: &str = " Below is the instruction that describes a task. \
Write a response that appropriately completes the request.\n\n\
### Instruction:\n\n{instruction}\n\n### Response:\n\n";

/// Wraps a raw prompt before it is sent to the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    template: String,
}

impl PromptTemplate {
    /// Returns `None` if the template has no `{instruction}` placeholder.
    pub fn new(template: impl Into<String>) -> Option<Self> {
        let template = template.into();
        template
            .contains(INSTRUCTION_PLACEHOLDER)
            .then_some(Self { template })
    }

    pub fn render(&self, instruction: &str) -> String {
        self.template.replace(INSTRUCTION_PLACEHOLDER, instruction)
    }
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self {
            template: DEFAULT_TEMPLATE.to_string(),
        }
    }
}
