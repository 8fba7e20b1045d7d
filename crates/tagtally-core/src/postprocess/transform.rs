//! Display transforms for a single tag.

use crate::config::PostprocessConfig;

/// Apply underscore replacement and bracket escaping.
pub fn transform_name(tag: &str, config: &PostprocessConfig) -> String {
    let mut name = if config.replace_underscore
        && !config.underscore_exceptions.iter().any(|e| e == tag)
    {
        tag.replace('_', " ")
    } else {
        tag.to_string()
    };

    if config.escape_brackets {
        name = escape_brackets(&name);
    }
    name
}

/// Render a tag for output: the transformed name, wrapped as
/// `(name:confidence)` when weight annotation is enabled.
pub fn render(tag: &str, confidence: f32, config: &PostprocessConfig) -> String {
    let name = transform_name(tag, config);
    if config.annotate_weight {
        annotate(&name, confidence)
    } else {
        name
    }
}

/// `(name:weight)` with the weight in its shortest decimal form.
pub fn annotate(name: &str, weight: f32) -> String {
    format!("({name}:{weight})")
}

fn escape_brackets(name: &str) -> String {
    let mut escaped = String::with_capacity(name.len() + 4);
    for c in name.chars() {
        if c == '(' || c == ')' {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
