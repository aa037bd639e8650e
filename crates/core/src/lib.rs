pub mod asr;
pub mod config;
pub mod decode;
pub mod emotion;
pub mod face;
pub mod http;
pub mod llm;
pub mod pipeline;
pub mod prompt;
pub mod store;
pub mod tts;
pub mod util;

#[cfg(test)]
mod test_support;
