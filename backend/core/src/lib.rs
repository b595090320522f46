pub mod error;
pub mod model;
pub mod traits;
pub mod types;

pub use error::CompletionError;
pub use model::ModelConfig;
pub use traits::{ChatRequest, CompletionModel, FragmentStream};
pub use types::{
    Fragment, OptimizationType, PromptRequest, BENEFICIAL_EFFECTS_HEADER,
    PROTECTION_POINTS_HEADER,
};
