//! Template file loading and `{{ key }}` placeholder rendering
//!
//! Placeholders are double-brace tokens around an alphanumeric key with
//! optional surrounding whitespace: `{{name}}`, `{{ name }}`. A token whose key
//! has no replacement is left exactly as written.

use eyre::{Result, WrapErr};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::collections::HashMap;
use std::path::Path;

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{\{\s*([A-Za-z0-9_]+)\s*\}\}").expect("placeholder pattern is valid")
});

/// Read a UTF-8 template file
pub async fn load_template(path: impl AsRef<Path>) -> Result<String> {
    let path = path.as_ref();
    tokio::fs::read_to_string(path)
        .await
        .wrap_err_with(|| format!("Failed to read template {}", path.display()))
}

/// Replace every `{{ key }}` token whose key is in `replacements`
pub fn render_placeholders(template: &str, replacements: &HashMap<String, String>) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &Captures<'_>| match replacements.get(&caps[1]) {
            Some(value) => value.clone(),
            None => caps[0].to_string(),
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_render_tolerates_whitespace() {
        let rendered = render_placeholders(
            "Hi {{address}}, welcome to {{  companyName }}!",
            &vars(&[("address", "a@x.com"), ("companyName", "Acme")]),
        );
        assert_eq!(rendered, "Hi a@x.com, welcome to Acme!");
    }

    #[test]
    fn test_render_leaves_unknown_tokens() {
        let rendered = render_placeholders("{{ known }} {{ unknown }}", &vars(&[("known", "yes")]));
        assert_eq!(rendered, "yes {{ unknown }}");
    }

    #[test]
    fn test_render_inserts_values_verbatim() {
        let rendered = render_placeholders("{{link}}", &vars(&[("link", "$1 <a href=\"x\">")]));
        assert_eq!(rendered, "$1 <a href=\"x\">");
    }

    #[test]
    fn test_render_replaces_every_occurrence() {
        let rendered = render_placeholders("{{n}}-{{ n }}-{{n }}", &vars(&[("n", "1")]));
        assert_eq!(rendered, "1-1-1");
    }

    #[tokio::test]
    async fn test_load_template_missing_file() {
        let err = load_template("/definitely/not/here.html").await.unwrap_err();
        assert!(err.to_string().contains("here.html"));
    }

    #[tokio::test]
    async fn test_load_template_reads_file() {
        let path = std::env::temp_dir().join(format!("tpl-{}.html", uuid::Uuid::new_v4()));
        tokio::fs::write(&path, "<p>{{ address }}</p>").await.unwrap();

        let contents = load_template(&path).await.unwrap();
        assert_eq!(contents, "<p>{{ address }}</p>");

        tokio::fs::remove_file(&path).await.unwrap();
    }
}
