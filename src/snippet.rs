//! Component snippet extraction and validation.
//!
//! Assistant messages embed generated code between `[component]` and
//! `[/component]` markers. This module pulls the code out of a message,
//! parses the bits the UI cares about (name, props, imports), and runs the
//! cheap sanity checks applied before a snippet can be saved.

use std::sync::LazyLock;

use regex::Regex;

static COMPONENT_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\[component\](.*?)\[/component\]").unwrap());
static FUNCTION_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:export\s+default\s+)?function\s+(\w+)").unwrap());
static BINDING_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:const|let|var)\s+(\w+)\s*=").unwrap());
static PROPS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"function\s+\w+\s*\(\s*\{\s*([^}]+)\s*\}").unwrap());
static IMPORTS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"import\s+.*?from\s+['"][^'"]+['"]"#).unwrap());

/// Extract the component code embedded in a message, if any.
#[must_use]
pub fn extract_component(content: &str) -> Option<String> {
    COMPONENT_BLOCK
        .captures(content)
        .map(|caps| caps[1].trim().to_string())
}

/// Structured information parsed out of a component snippet.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ParsedComponent {
    /// Component name, if a definition was found.
    pub name: Option<String>,
    /// Destructured prop names from the component signature.
    pub props: Vec<String>,
    /// Import lines referenced by the snippet.
    pub imports: Vec<String>,
    /// The trimmed code itself.
    pub code: String,
}

/// Parse a component snippet into its interesting parts.
#[must_use]
pub fn parse_component(code: &str) -> ParsedComponent {
    ParsedComponent {
        name: component_name(code),
        props: prop_names(code),
        imports: import_lines(code),
        code: code.trim().to_string(),
    }
}

/// Extract the component name from a snippet.
///
/// Matches `function Name` first, then falls back to a `const`/`let`/`var`
/// binding.
#[must_use]
pub fn component_name(code: &str) -> Option<String> {
    if let Some(caps) = FUNCTION_NAME.captures(code) {
        return Some(caps[1].to_string());
    }
    BINDING_NAME.captures(code).map(|caps| caps[1].to_string())
}

fn prop_names(code: &str) -> Vec<String> {
    let Some(caps) = PROPS.captures(code) else {
        return Vec::new();
    };

    caps[1]
        .split(',')
        .map(|prop| {
            prop.trim()
                .split(['=', ':'])
                .next()
                .unwrap_or_default()
                .trim()
                .to_string()
        })
        .filter(|prop| !prop.is_empty())
        .collect()
}

fn import_lines(code: &str) -> Vec<String> {
    IMPORTS
        .find_iter(code)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Result of validating a component snippet.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Validation {
    /// Whether the snippet passed all checks.
    pub is_valid: bool,
    /// Human-readable reasons for rejection.
    pub errors: Vec<String>,
}

/// Run the sanity checks applied before a snippet can be saved.
#[must_use]
pub fn validate_component(code: &str) -> Validation {
    let mut errors = Vec::new();

    if component_name(code).is_none() {
        errors.push("no component definition found".to_string());
    }

    let open = code.matches('{').count();
    let close = code.matches('}').count();
    if open != close {
        errors.push("unbalanced braces".to_string());
    }

    if !code.contains("return") {
        errors.push("missing return statement".to_string());
    }

    Validation {
        is_valid: errors.is_empty(),
        errors,
    }
}
