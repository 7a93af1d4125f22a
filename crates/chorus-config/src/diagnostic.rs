// SPDX-FileCopyrightText: 2026 Chorus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration diagnostics rendered through miette.
//!
//! Figment reports where a bad value came from (a TOML file or a `CHORUS_*`
//! variable); every diagnostic keeps that origin so an operator can tell which
//! layer of the hierarchy to fix. Unknown keys get a Jaro-Winkler suggestion
//! and, for file sources, a labelled span.

#![allow(unused_assignments)] // miette's Diagnostic derive generates code triggering this lint

use figment::error::{Error as FigmentError, Kind};
use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

/// Minimum Jaro-Winkler similarity for a "did you mean" hint.
const SUGGESTION_THRESHOLD: f64 = 0.75;

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("unknown key `{key}` in {location}")]
    #[diagnostic(
        code(chorus::config::unknown_key),
        help("{}", unknown_key_help(suggestion.as_deref(), valid_keys))
    )]
    UnknownKey {
        key: String,
        /// `[section]` or `top level`.
        location: String,
        suggestion: Option<String>,
        valid_keys: String,
        #[label("not a recognized key")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    #[error("`{key}` has the wrong type: found {found}")]
    #[diagnostic(code(chorus::config::invalid_type), help("expected {expected}; set in {origin}"))]
    InvalidType {
        key: String,
        found: String,
        expected: String,
        origin: String,
    },

    #[error("missing required key `{key}`")]
    #[diagnostic(code(chorus::config::missing_key), help("add `{key}` to chorus.toml"))]
    MissingKey { key: String },

    /// A value that parsed but makes no sense.
    #[error("`{key}` {problem}")]
    #[diagnostic(code(chorus::config::validation))]
    Validation { key: &'static str, problem: String },

    #[error("configuration error: {0}")]
    #[diagnostic(code(chorus::config::other))]
    Other(String),
}

impl ConfigError {
    pub(crate) fn invalid(key: &'static str, problem: impl Into<String>) -> Self {
        Self::Validation {
            key,
            problem: problem.into(),
        }
    }
}

fn unknown_key_help(suggestion: Option<&str>, valid_keys: &str) -> String {
    match suggestion {
        Some(s) => format!("did you mean `{s}`? Valid keys: {valid_keys}"),
        None => format!("valid keys: {valid_keys}"),
    }
}

fn dotted(path: &[String]) -> String {
    path.join(".")
}

/// Human description of the layer an error came from.
fn origin(error: &FigmentError) -> String {
    let Some(metadata) = error.metadata.as_ref() else {
        return "an unknown source".to_string();
    };
    match &metadata.source {
        Some(figment::Source::File(path)) => path.display().to_string(),
        _ => match &error.profile {
            Some(profile) => {
                let keys: Vec<&str> = error.path.iter().map(String::as_str).collect();
                metadata.interpolate(profile, &keys)
            }
            None => metadata.name.to_string(),
        },
    }
}

/// Convert a `figment::Error` into one diagnostic per underlying failure.
///
/// `toml_sources` pairs each loaded file path with its content so unknown
/// keys can be pointed at in the source.
pub fn figment_to_config_errors(
    err: FigmentError,
    toml_sources: &[(String, String)],
) -> Vec<ConfigError> {
    err.into_iter()
        .map(|error| match &error.kind {
            Kind::UnknownField(field, expected) => {
                let suggestion = suggest_key(field, expected);
                let (span, src) = locate(&error, field, toml_sources);
                ConfigError::UnknownKey {
                    key: field.clone(),
                    location: if error.path.is_empty() {
                        "top level".to_string()
                    } else {
                        format!("[{}]", dotted(&error.path))
                    },
                    suggestion,
                    valid_keys: expected.join(", "),
                    span,
                    src,
                }
            }
            Kind::MissingField(field) => ConfigError::MissingKey {
                key: if error.path.is_empty() {
                    field.to_string()
                } else {
                    format!("{}.{field}", dotted(&error.path))
                },
            },
            Kind::InvalidType(actual, expected) => ConfigError::InvalidType {
                key: dotted(&error.path),
                found: actual.to_string(),
                expected: expected.clone(),
                origin: origin(&error),
            },
            _ => ConfigError::Other(error.to_string()),
        })
        .collect()
}

/// Span of an unknown key inside the file it was read from, if that file is known.
fn locate(
    error: &FigmentError,
    field: &str,
    toml_sources: &[(String, String)],
) -> (Option<SourceSpan>, Option<NamedSource<String>>) {
    let Some(figment::Source::File(file)) = error.metadata.as_ref().and_then(|m| m.source.as_ref())
    else {
        return (None, None);
    };
    let file = file.display().to_string();
    let located = toml_sources
        .iter()
        .find(|(path, _)| *path == file)
        .and_then(|(path, content)| {
            find_key_offset(content, &error.path, field).map(|offset| (path, content, offset))
        });

    match located {
        Some((path, content, offset)) => (
            Some(SourceSpan::new(offset.into(), field.len())),
            Some(NamedSource::new(path, content.clone())),
        ),
        None => (None, None),
    }
}

/// Byte offset of `key` within the table `section` (empty for the top level).
pub fn find_key_offset(content: &str, section: &[String], key: &str) -> Option<usize> {
    let wanted = dotted(section);
    let mut current = String::new();
    let mut offset = 0;

    for line in content.split_inclusive('\n') {
        let trimmed = line.trim();
        if let Some(header) = trimmed.strip_prefix('[').and_then(|h| h.strip_suffix(']')) {
            current = header.trim().to_string();
        } else if current == wanted {
            let indent = line.len() - line.trim_start().len();
            let is_key = line[indent..]
                .strip_prefix(key)
                .is_some_and(|after| after.trim_start().starts_with('='));
            if is_key {
                return Some(offset + indent);
            }
        }
        offset += line.len();
    }
    None
}

/// The valid key closest to `unknown`, if any is close enough.
pub fn suggest_key(unknown: &str, valid_keys: &[&str]) -> Option<String> {
    valid_keys
        .iter()
        .map(|key| (strsim::jaro_winkler(unknown, key), *key))
        .filter(|(score, _)| *score > SUGGESTION_THRESHOLD)
        .max_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, key)| key.to_string())
}

/// Print each error to stderr with miette's graphical report handler.
pub fn render_errors(errors: &[ConfigError]) {
    let handler = miette::GraphicalReportHandler::new();
    for error in errors {
        let mut rendered = String::new();
        match handler.render_report(&mut rendered, error as &dyn Diagnostic) {
            Ok(()) => eprint!("{rendered}"),
            Err(_) => eprintln!("error: {error}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suggests_close_session_keys() {
        let valid = &["decision_interval_secs", "poll_interval_secs", "buffer_size"];
        assert_eq!(
            suggest_key("bufer_size", valid),
            Some("buffer_size".to_string())
        );
        assert_eq!(
            suggest_key("pol_interval_secs", valid),
            Some("poll_interval_secs".to_string())
        );
    }

    #[test]
    fn no_suggestion_for_distant_typo() {
        let valid = &["max_attempts", "multiplier"];
        assert_eq!(suggest_key("zzzzzz", valid), None);
    }

    #[test]
    fn key_offset_is_scoped_to_its_section() {
        let content = "max_atempts = 1\n[service]\nname = \"a\"\n[retry]\nmax_atempts = 3\n";
        let offset = find_key_offset(content, &["retry".to_string()], "max_atempts").unwrap();
        assert_eq!(offset, content.rfind("max_atempts").unwrap());

        assert_eq!(find_key_offset(content, &[], "max_atempts"), Some(0));
        assert_eq!(find_key_offset(content, &["admin".to_string()], "port"), None);
    }
}
