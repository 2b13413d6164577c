//! Prompt construction and concurrent docstring generation.
//!
//! One prompt per class or function record, all requests in flight at once.
//! Module records never get a prompt; their documentation lives with the
//! file, not a definition.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use doclens_core::{DefKind, DefRecord, DefTree};
use futures::future::join_all;
use tracing::{debug, warn};

use crate::error::Result;

/// Reply token signalling the existing docstring is already correct.
pub const NO_CHANGE: &str = "-1";

/// A docstring generation backend: prompt text in, generated text out.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String>;
}

/// Build the generation prompt for a record, or `None` for module records.
pub fn build_prompt(record: &DefRecord, style: &str) -> Option<String> {
    match record.kind {
        DefKind::Class => Some(class_prompt(record, style)),
        DefKind::Function | DefKind::AsyncFunction => Some(function_prompt(record, style)),
        DefKind::Module => None,
    }
}

fn class_prompt(record: &DefRecord, style: &str) -> String {
    let mut prompt = format!(
        "You are a senior python engineer. Analyze the following class between \
         <code.start> and <code.end>:\n\n<code.start>\n{}\n<code.end>\n\n",
        record.code.as_deref().unwrap_or("")
    );
    push_current_docstring(&mut prompt, record);
    prompt.push_str(&format!(
        "I want you to analyze the purpose of the class, and write a new docstring \
         for {name} (and only for {name}).\nThe docstring must be using {style} style. \
         Since this is a class, only write a description for the purpose of the class, \
         and list the attributes. If the old docstring correctly reflects the purpose \
         of the code segment, return {no_change}, else return only the docstring.",
        name = record.name,
        style = style,
        no_change = NO_CHANGE,
    ));
    prompt
}

fn function_prompt(record: &DefRecord, style: &str) -> String {
    let mut prompt = format!(
        "You are a senior python engineer. Analyze the following code block between \
         <code.start> and <code.end>:\n\n<code.start>\n{}\n<code.end>\n\n",
        record.code.as_deref().unwrap_or("")
    );
    push_current_docstring(&mut prompt, record);
    prompt.push_str(&format!(
        "I want you to analyze the purpose of the code segment, and write a new \
         docstring for {name} (and only for {name}).\nThe docstring must be using \
         {style} style. You must only write a description of the function, list the \
         attributes with a basic description, explain any errors raised. Only \
         explicitly show a return if the function returns something not None. If the \
         old docstring correctly reflects the purpose of the code segment, return \
         {no_change}, else return only the docstring.",
        name = record.name,
        style = style,
        no_change = NO_CHANGE,
    ));
    prompt
}

fn push_current_docstring(prompt: &mut String, record: &DefRecord) {
    if let Some(doc) = &record.docstring {
        prompt.push_str(&format!(
            "This is the current docstring between <doc.start> and <doc.end>:\n\n\
             <doc.start>\n{}\n<doc.end>\n\n",
            doc
        ));
    }
}

/// Issues one generation request per selected record and gathers the
/// replies into a name-keyed map.
pub struct Commenter<'a, G: Generator> {
    generator: &'a G,
    style: String,
}

impl<'a, G: Generator> Commenter<'a, G> {
    pub fn new(generator: &'a G, style: impl Into<String>) -> Self {
        Self {
            generator,
            style: style.into(),
        }
    }

    /// Generate docstrings for the selected records of one file.
    ///
    /// All requests run concurrently; a failed request is logged and
    /// dropped without affecting the others. Replies equal to the
    /// no-change token are removed before the map is returned.
    pub async fn comment_file(
        &self,
        tree: &DefTree,
        indices: &BTreeSet<usize>,
    ) -> BTreeMap<String, String> {
        let mut named: Vec<(&str, String)> = Vec::new();
        for &idx in indices {
            let Some(record) = tree.records.get(idx) else {
                continue;
            };
            if let Some(prompt) = build_prompt(record, &self.style) {
                named.push((record.name.as_str(), prompt));
            }
        }
        debug!(
            "Requesting {} docstrings for {}",
            named.len(),
            tree.file.display()
        );

        let requests = named.iter().map(|(_, prompt)| self.generator.generate(prompt));
        let results = join_all(requests).await;

        let mut docs = BTreeMap::new();
        for ((name, _), result) in named.iter().zip(results) {
            match result {
                Ok(text) if text.trim() == NO_CHANGE => {
                    debug!("{}: existing docstring confirmed", name);
                }
                Ok(text) => {
                    docs.insert((*name).to_string(), text);
                }
                Err(e) => {
                    warn!("Generation failed for {}: {}", name, e);
                }
            }
        }
        docs
    }
}
