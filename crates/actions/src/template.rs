//! `{{path}}` placeholders in action configs.
//!
//! String values anywhere in a config may reference event data.  A string that
//! is exactly one placeholder is replaced by the referenced JSON value as-is
//! (so `"{{monto}}"` stays a number); placeholders embedded in longer text are
//! interpolated.  Unresolved placeholders are left verbatim.
//!
//! Script sources and document templates have their own placeholder syntax
//! and are passed through untouched with [`render_except`].

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

fn placeholder() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\{\{\s*([^{}]+?)\s*\}\}").expect("placeholder pattern is valid")
    })
}

/// Resolve `path` in `data`: an exact top-level key wins, otherwise the path is
/// split on `.` and walked through objects (and arrays, by numeric index).
pub fn lookup<'a>(data: &'a Value, path: &str) -> Option<&'a Value> {
    if let Some(value) = data.get(path) {
        return Some(value);
    }
    if !path.contains('.') {
        return None;
    }
    path.split('.').try_fold(data, |current, segment| match current {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

/// Render every string in `config` against `data`.
pub fn render(config: &Value, data: &Value) -> Value {
    match config {
        Value::String(s) => render_str(s, data),
        Value::Array(items) => Value::Array(items.iter().map(|v| render(v, data)).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), render(v, data)))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Like [`render`], but the top-level `verbatim` keys of an object config are
/// copied without substitution.
pub fn render_except(config: &Value, data: &Value, verbatim: &[&str]) -> Value {
    match config {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| {
                    let value = if verbatim.contains(&k.as_str()) {
                        v.clone()
                    } else {
                        render(v, data)
                    };
                    (k.clone(), value)
                })
                .collect(),
        ),
        other => render(other, data),
    }
}

fn render_str(template: &str, data: &Value) -> Value {
    let re = placeholder();

    let Some(caps) = re.captures(template) else {
        return Value::String(template.to_owned());
    };
    let whole = caps
        .get(0)
        .is_some_and(|m| m.start() == 0 && m.end() == template.len());
    if whole {
        return lookup(data, &caps[1])
            .cloned()
            .unwrap_or_else(|| Value::String(template.to_owned()));
    }

    let rendered = re.replace_all(template, |caps: &regex::Captures<'_>| {
        match lookup(data, &caps[1]) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) => String::new(),
            Some(other) => other.to_string(),
            None => caps[0].to_owned(),
        }
    });
    Value::String(rendered.into_owned())
}
