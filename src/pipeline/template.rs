//! Token-substitution templating over heterogeneous file formats.
//!
//! Two strategies cover the descriptor formats the pipeline filters:
//! structured `${key}` expansion for metadata files (properties, XML,
//! desktop entries, plists, Inno Setup scripts) and ordered line-based
//! find/replace for formats where only specific literals change (packr
//! JSON manifests, Pascal installer scripts).

use crate::pipeline::error::{Error, ErrorExt, Result};
use crate::pipeline::tokens::TokenMap;
use crate::pipeline::utils;
use regex::{Captures, Regex};
use serde::Deserialize;
use std::borrow::Cow;
use std::path::PathBuf;
use std::sync::LazyLock;

static TOKEN_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([A-Za-z0-9_.]+)\}").expect("token placeholder pattern is valid")
});

/// Substitution strategy for a template target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateFormat {
    /// Replace every `${key}` placeholder with its token value.
    ///
    /// An unresolved placeholder is left verbatim. This is intentional, not
    /// a silent bug: some placeholders are resolved by a later external
    /// stage outside this pipeline, so unknown keys must pass through
    /// untouched.
    StructuredExpand,

    /// Apply the target's literal find/replace rules line by line, in the
    /// order declared. All occurrences of a pattern on a line are replaced.
    LineReplace,
}

/// One literal find/replace rule for [`TemplateFormat::LineReplace`].
///
/// The replacement may itself contain `${token}` placeholders; they are
/// expanded against the run's token map before the rule is applied.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LineRule {
    /// Literal text to search for.
    pub pattern: String,
    /// Replacement text (token placeholders allowed).
    pub replacement: String,
}

/// A declared templating unit: one source file filtered into the staging
/// area. Created by configuration, consumed exactly once per run.
#[derive(Debug, Clone)]
pub struct TemplateTarget {
    /// Input file.
    pub source: PathBuf,
    /// Output file in the staging area.
    pub destination: PathBuf,
    /// Substitution strategy.
    pub format: TemplateFormat,
    /// Find/replace rules (line-replace targets only).
    pub rules: Vec<LineRule>,
}

/// Applies a template target, writing the filtered file at its destination.
///
/// Output line endings are normalized to `\n` and the rendered bytes carry
/// no timestamps, so repeated runs with identical inputs produce
/// byte-identical output. The file is published atomically - a failed
/// write leaves no partial output.
///
/// A missing source or an unwritable destination is fatal to the owning
/// task only; sibling platform targets are unaffected.
pub async fn apply(target: &TemplateTarget, tokens: &TokenMap) -> Result<()> {
    let raw = match tokio::fs::read_to_string(&target.source).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(Error::MissingResource {
                path: target.source.clone(),
            });
        }
        Err(e) => return Err(e).fs_context("reading template source", &target.source),
    };

    let normalized = normalize_newlines(&raw);
    let rendered = match target.format {
        TemplateFormat::StructuredExpand => expand_tokens(&normalized, tokens).into_owned(),
        TemplateFormat::LineReplace => apply_line_rules(&normalized, &target.rules, tokens),
    };

    utils::fs::atomic_write(&target.destination, rendered.into_bytes()).await
}

/// Replaces every resolvable `${key}` placeholder with its token value.
///
/// Unknown keys are left verbatim (see [`TemplateFormat::StructuredExpand`]).
pub fn expand_tokens<'a>(input: &'a str, tokens: &TokenMap) -> Cow<'a, str> {
    TOKEN_PATTERN.replace_all(input, |caps: &Captures| match tokens.get(&caps[1]) {
        Some(value) => value.to_string(),
        None => caps[0].to_string(),
    })
}

/// Applies the declared rules to each line, in order, replacing all
/// occurrences per line.
fn apply_line_rules(input: &str, rules: &[LineRule], tokens: &TokenMap) -> String {
    let expanded: Vec<(&str, String)> = rules
        .iter()
        .map(|rule| {
            (
                rule.pattern.as_str(),
                expand_tokens(&rule.replacement, tokens).into_owned(),
            )
        })
        .collect();

    let mut out = String::with_capacity(input.len());
    for line in input.split_inclusive('\n') {
        let mut filtered = Cow::Borrowed(line);
        for (pattern, replacement) in &expanded {
            if filtered.contains(pattern) {
                filtered = Cow::Owned(filtered.replace(pattern, replacement));
            }
        }
        out.push_str(&filtered);
    }
    out
}

/// Normalizes `\r\n` and bare `\r` line endings to `\n`.
fn normalize_newlines(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::env::EnvironmentView;
    use crate::pipeline::name::ProductName;
    use std::collections::BTreeMap;

    fn tokens() -> TokenMap {
        TokenMap::build(
            &ProductName::derive("Foo"),
            &EnvironmentView::new("/home/builder", None),
            &BTreeMap::new(),
        )
    }

    #[test]
    fn expands_known_tokens() {
        let out = expand_tokens("name=${finalName} id=${lowerName}", &tokens());
        assert_eq!(out, "name=Foo id=foo");
    }

    #[test]
    fn unknown_placeholder_is_left_verbatim() {
        // Tolerated on purpose: unknown keys belong to later external stages.
        let out = expand_tokens("later=${unknownKey} now=${finalName}", &tokens());
        assert_eq!(out, "later=${unknownKey} now=Foo");
    }

    #[test]
    fn line_rules_replace_all_occurrences_per_line() {
        let rules = vec![LineRule {
            pattern: "Launcher.jar".to_string(),
            replacement: "${finalName}.jar".to_string(),
        }];
        let out = apply_line_rules("a Launcher.jar b Launcher.jar\n", &rules, &tokens());
        assert_eq!(out, "a Foo.jar b Foo.jar\n");
    }

    #[test]
    fn line_rules_apply_in_declared_order() {
        let rules = vec![
            LineRule {
                pattern: "${project.finalName_upper}".to_string(),
                replacement: "${upperName}".to_string(),
            },
            LineRule {
                pattern: "{project.finalName}".to_string(),
                replacement: "${finalName}".to_string(),
            },
        ];
        let out = apply_line_rules(
            "upper=${project.finalName_upper} name={project.finalName}\n",
            &rules,
            &tokens(),
        );
        assert_eq!(out, "upper=FOO name=Foo\n");
    }

    #[test]
    fn newlines_are_normalized() {
        assert_eq!(normalize_newlines("a\r\nb\rc\n"), "a\nb\nc\n");
    }

    #[tokio::test]
    async fn apply_writes_filtered_copy() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("app.desktop");
        std::fs::write(&source, "Name=${finalName}\r\nExec=${lowerName}\r\n").unwrap();

        let target = TemplateTarget {
            source,
            destination: dir.path().join("out/app.desktop"),
            format: TemplateFormat::StructuredExpand,
            rules: Vec::new(),
        };
        apply(&target, &tokens()).await.unwrap();

        let out = std::fs::read_to_string(&target.destination).unwrap();
        assert_eq!(out, "Name=Foo\nExec=foo\n");
    }

    #[tokio::test]
    async fn missing_source_reports_missing_resource() {
        let dir = tempfile::tempdir().unwrap();
        let target = TemplateTarget {
            source: dir.path().join("absent.iss"),
            destination: dir.path().join("out.iss"),
            format: TemplateFormat::StructuredExpand,
            rules: Vec::new(),
        };

        let err = apply(&target, &tokens()).await.unwrap_err();
        assert!(matches!(err, Error::MissingResource { .. }));
        assert!(!target.destination.exists());
    }

    #[tokio::test]
    async fn repeated_application_is_byte_identical() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("Info.plist");
        std::fs::write(&source, "<string>${finalName}</string>\n").unwrap();

        let target = TemplateTarget {
            source,
            destination: dir.path().join("out/Info.plist"),
            format: TemplateFormat::StructuredExpand,
            rules: Vec::new(),
        };

        apply(&target, &tokens()).await.unwrap();
        let first = std::fs::read(&target.destination).unwrap();
        apply(&target, &tokens()).await.unwrap();
        let second = std::fs::read(&target.destination).unwrap();

        assert_eq!(first, second);
    }
}
