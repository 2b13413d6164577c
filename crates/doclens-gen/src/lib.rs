//! DocLens Gen - docstring generation for Python definitions.
//!
//! Three stages: prompt construction per definition record, concurrent
//! generation against an OpenAI-compatible Responses endpoint, and a
//! rewrite pass that splices the generated docstrings back into source
//! files with optional `black`/`docconvert` post-processing.

pub mod client;
pub mod error;
pub mod generator;
pub mod rewrite;

pub use client::{OpenAiClient, OpenAiConfig};
pub use error::{GenError, Result, RewriteError};
pub use generator::{build_prompt, Commenter, Generator, NO_CHANGE};
pub use rewrite::Rewriter;
