pub mod deepseek;
pub mod openai;
pub mod traits;
pub mod utils;

pub use deepseek::deepseek::DeepSeekProvider;
pub use openai::openai::OpenAIEmbeddingProvider;
pub use traits::{CompletionProvider, EmbeddingProvider};
