// Syntax highlighting.
// A rendering depends only on content, language and theme.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use syntect::{
    highlighting::{Color, ThemeSet},
    html::highlighted_html_for_string,
    parsing::{SyntaxReference, SyntaxSet},
};

use crate::error::{GroveError, Result};

/// Theme used when none is configured.
pub const DEFAULT_THEME: &str = "InspiredGitHub";

/// Highlighted HTML plus the theme colors a viewer needs to frame it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rendering {
    pub html: String,
    pub background: Option<String>,
    pub foreground: Option<String>,
}

#[async_trait]
pub trait Highlighter: Send + Sync {
    async fn highlight(&self, content: &str, language: &str, theme: &str) -> Result<Rendering>;
}

/// Highlighter backed by syntect's bundled syntaxes and themes.
#[derive(Clone)]
pub struct SyntectHighlighter {
    syntaxes: Arc<SyntaxSet>,
    themes: Arc<ThemeSet>,
}

impl Default for SyntectHighlighter {
    fn default() -> Self {
        Self::new()
    }
}

impl SyntectHighlighter {
    pub fn new() -> Self {
        Self {
            syntaxes: Arc::new(SyntaxSet::load_defaults_newlines()),
            themes: Arc::new(ThemeSet::load_defaults()),
        }
    }

    fn render(&self, content: &str, language: &str, theme: &str) -> Result<Rendering> {
        let theme = self
            .themes
            .themes
            .get(theme)
            .ok_or_else(|| GroveError::Highlight(format!("unknown theme `{theme}`")))?;
        let syntax = find_syntax(&self.syntaxes, language)
            .unwrap_or_else(|| self.syntaxes.find_syntax_plain_text());

        let html = highlighted_html_for_string(content, &self.syntaxes, syntax, theme)
            .map_err(|err| GroveError::Highlight(err.to_string()))?;

        Ok(Rendering {
            html,
            background: theme.settings.background.map(css_color),
            foreground: theme.settings.foreground.map(css_color),
        })
    }
}

#[async_trait]
impl Highlighter for SyntectHighlighter {
    async fn highlight(&self, content: &str, language: &str, theme: &str) -> Result<Rendering> {
        let this = self.clone();
        let (content, language, theme) =
            (content.to_string(), language.to_string(), theme.to_string());
        tokio::task::spawn_blocking(move || this.render(&content, &language, &theme))
            .await
            .map_err(|err| GroveError::Highlight(err.to_string()))?
    }
}

/// Language token for a file path: its extension, or the file name for
/// extensionless files such as `Makefile`.
pub fn language_for_path(path: &str) -> String {
    let name = path.rsplit('/').next().unwrap_or(path);
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => ext.to_ascii_lowercase(),
        _ => name.to_string(),
    }
}

fn find_syntax<'a>(syntax_set: &'a SyntaxSet, token: &str) -> Option<&'a SyntaxReference> {
    let lowercase = token.to_ascii_lowercase();
    syntax_set
        .find_syntax_by_token(&lowercase)
        .or_else(|| syntax_set.find_syntax_by_name(token))
        .or_else(|| syntax_set.find_syntax_by_extension(token))
}

fn css_color(color: Color) -> String {
    if color.a == 0xff {
        format!("#{:02x}{:02x}{:02x}", color.r, color.g, color.b)
    } else {
        format!("#{:02x}{:02x}{:02x}{:02x}", color.r, color.g, color.b, color.a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_for_path() {
        assert_eq!(language_for_path("src/lib.rs"), "rs");
        assert_eq!(language_for_path("README.MD"), "md");
        assert_eq!(language_for_path("Makefile"), "Makefile");
        assert_eq!(language_for_path(".gitignore"), ".gitignore");
    }

    #[test]
    fn test_css_color() {
        assert_eq!(
            css_color(Color {
                r: 255,
                g: 0,
                b: 16,
                a: 255
            }),
            "#ff0010"
        );
        assert_eq!(
            css_color(Color {
                r: 0,
                g: 0,
                b: 0,
                a: 128
            }),
            "#00000080"
        );
    }

    #[tokio::test]
    async fn test_highlight_rust() {
        let highlighter = SyntectHighlighter::new();
        let rendering = highlighter
            .highlight("fn main() {}\n", "rs", DEFAULT_THEME)
            .await
            .unwrap();
        assert!(rendering.html.starts_with("<pre"));
        assert!(rendering.html.contains("main"));
        assert!(rendering.background.as_deref().is_some_and(|c| c.starts_with('#')));
    }

    #[tokio::test]
    async fn test_unknown_language_falls_back_to_plain_text() {
        let highlighter = SyntectHighlighter::new();
        let rendering = highlighter
            .highlight("just words\n", "no-such-language", DEFAULT_THEME)
            .await
            .unwrap();
        assert!(rendering.html.contains("just words"));
    }

    #[tokio::test]
    async fn test_unknown_theme_is_an_error() {
        let highlighter = SyntectHighlighter::new();
        let result = highlighter.highlight("x", "rs", "no-such-theme").await;
        assert!(matches!(result, Err(GroveError::Highlight(_))));
    }
}
