//! Per-pass diagnostics sink.
//!
//! User-authored mistakes in style attachments are recorded here and the pass
//! carries on; they never abort collection.

use localstyle_host::ElementId;
use localstyle_schema::FileId;
use serde::Serialize;
use std::fmt;
use std::ops::{Deref, DerefMut};
use thiserror::Error;
use tracing::warn;

pub const EMBED_SOURCE_IS_NOT_CSS_FILE: &str = "embed.source.is.not.css.file";
pub const EMBED_SOURCE_NOT_FOUND: &str = "embed.source.not.found";
pub const CSS_COMPILE_FAILED: &str = "css.compile.failed";

const MESSAGES: &[(&str, &str)] = &[
    (EMBED_SOURCE_IS_NOT_CSS_FILE, "Embedded source is not a CSS file: {0}"),
    (EMBED_SOURCE_NOT_FOUND, "Cannot resolve embedded source: {0}"),
    (CSS_COMPILE_FAILED, "Cannot compile stylesheet {0}: {1}"),
];

/// Render a message template, substituting `{n}` with the n-th argument.
/// Unknown keys render as the key followed by the arguments.
pub fn render_message(key: &str, args: &[String]) -> String {
    let Some((_, template)) = MESSAGES.iter().find(|(k, _)| *k == key) else {
        return if args.is_empty() {
            key.to_owned()
        } else {
            format!("{key}: {}", args.join(", "))
        };
    };
    args.iter()
        .enumerate()
        .fold((*template).to_owned(), |text, (i, arg)| {
            text.replace(&format!("{{{i}}}"), arg)
        })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ElementLocation {
    pub file: FileId,
    pub element: ElementId,
    pub line: Option<u32>,
}

impl fmt::Display for ElementLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(f, "{}:{line}", self.file),
            None => write!(f, "{}", self.file),
        }
    }
}

/// A structurally wrong property on a user-authored element.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{location}: {}", render_message(.key, .args))]
pub struct InvalidProperty {
    pub location: ElementLocation,
    pub key: &'static str,
    pub args: Vec<String>,
}

impl InvalidProperty {
    pub fn new(location: ElementLocation, key: &'static str, args: Vec<String>) -> Self {
        Self {
            location,
            key,
            args,
        }
    }

    pub fn message(&self) -> String {
        render_message(self.key, &self.args)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Problem {
    pub file: FileId,
    pub line: Option<u32>,
    pub message: String,
}

impl fmt::Display for Problem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(f, "{}:{line}: {}", self.file, self.message),
            None => write!(f, "{}: {}", self.file, self.message),
        }
    }
}

#[derive(Debug, Default)]
pub struct ProblemsHolder {
    current_file: Option<FileId>,
    problems: Vec<Problem>,
}

impl ProblemsHolder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_current_file(&mut self, file: Option<FileId>) {
        self.current_file = file;
    }

    pub fn current_file(&self) -> Option<&FileId> {
        self.current_file.as_ref()
    }

    /// Attribute problems to `file` until the returned guard is dropped.
    pub fn enter_file(&mut self, file: FileId) -> CurrentFileGuard<'_> {
        self.set_current_file(Some(file));
        CurrentFileGuard { holder: self }
    }

    pub fn add(&mut self, problem: InvalidProperty) {
        let message = problem.message();
        self.push(problem.location.file, problem.location.line, message);
    }

    /// Record a problem that belongs to a whole file rather than an element.
    pub fn report(&mut self, file: FileId, key: &str, args: &[String]) {
        self.push(file, None, render_message(key, args));
    }

    fn push(&mut self, file: FileId, line: Option<u32>, message: String) {
        let file = self.current_file.clone().unwrap_or(file);
        warn!("{file}: {message}");
        self.problems.push(Problem {
            file,
            line,
            message,
        });
    }

    pub fn problems(&self) -> &[Problem] {
        &self.problems
    }

    pub fn len(&self) -> usize {
        self.problems.len()
    }

    pub fn is_empty(&self) -> bool {
        self.problems.is_empty()
    }

    pub fn into_problems(self) -> Vec<Problem> {
        self.problems
    }
}

/// Clears the current diagnostic file on drop.
pub struct CurrentFileGuard<'a> {
    holder: &'a mut ProblemsHolder,
}

impl Deref for CurrentFileGuard<'_> {
    type Target = ProblemsHolder;
    fn deref(&self) -> &ProblemsHolder {
        self.holder
    }
}

impl DerefMut for CurrentFileGuard<'_> {
    fn deref_mut(&mut self) -> &mut ProblemsHolder {
        self.holder
    }
}

impl Drop for CurrentFileGuard<'_> {
    fn drop(&mut self) {
        self.holder.set_current_file(None);
    }
}
