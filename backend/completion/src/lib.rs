pub mod deadline;
pub mod prompts;
pub mod providers;
pub mod source;
pub mod template;

pub use deadline::{with_deadline, CompletionOutcome, TimeoutPolicy};
pub use providers::mock::{MockBehavior, MockModel};
pub use providers::openai_compat::OpenAiCompatProvider;
pub use source::CompletionSource;
pub use template::{FilledPrompt, PromptTemplate};
