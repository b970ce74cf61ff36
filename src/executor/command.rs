//! A fully rendered external command

use std::borrow::Cow;
use std::fmt;

/// Ordered argv entries plus extra environment.
///
/// Each token reaches the process as exactly one argument; nothing is
/// interpreted by a shell. Built once and never mutated; owned by the
/// invocation that built it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    tokens: Vec<String>,
    env: Vec<(String, String)>,
    secrets: Vec<usize>,
}

/// Characters that never need quoting inside a word
fn is_plain(c: char) -> bool {
    c.is_ascii_alphanumeric() || "@%+=:,./-_".contains(c)
}

fn quote(token: &str, force: bool) -> Cow<'_, str> {
    if !force && !token.is_empty() && token.chars().all(is_plain) {
        Cow::Borrowed(token)
    } else {
        Cow::Owned(format!("'{}'", token.replace('\'', r"'\''")))
    }
}

/// Single-quote `token` unless it is a plain word, so that `split_words`
/// gives it back as one argument
pub fn quote_word(token: &str) -> String {
    quote(token, false).into_owned()
}

/// Split a subcommand line into arguments.
///
/// Whitespace separates words. Single quotes keep their content verbatim,
/// double quotes honour `\"` and `\\`, and a backslash outside quotes
/// escapes the next character. Nothing is expanded.
pub fn split_words(line: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut chars = line.chars();

    while let Some(c) = chars.next() {
        match c {
            '\'' => {
                in_word = true;
                for q in chars.by_ref() {
                    if q == '\'' {
                        break;
                    }
                    current.push(q);
                }
            }
            '"' => {
                in_word = true;
                while let Some(q) = chars.next() {
                    match q {
                        '"' => break,
                        '\\' => match chars.next() {
                            Some(e @ ('"' | '\\')) => current.push(e),
                            Some(e) => {
                                current.push('\\');
                                current.push(e);
                            }
                            None => current.push('\\'),
                        },
                        other => current.push(other),
                    }
                }
            }
            '\\' => {
                in_word = true;
                if let Some(e) = chars.next() {
                    current.push(e);
                }
            }
            c if c.is_whitespace() => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            other => {
                in_word = true;
                current.push(other);
            }
        }
    }
    if in_word {
        words.push(current);
    }
    words
}

impl Command {
    pub fn new(tokens: Vec<String>) -> Self {
        Self {
            tokens,
            env: Vec::new(),
            secrets: Vec::new(),
        }
    }

    /// Mark token `index` as sensitive so `redacted()` masks it
    pub fn with_secret(mut self, index: usize) -> Self {
        if index < self.tokens.len() {
            self.secrets.push(index);
        }
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Program followed by its arguments
    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    pub fn env(&self) -> &[(String, String)] {
        &self.env
    }

    /// The command line as a shell would need it typed.
    ///
    /// Secrets are always single-quoted.
    pub fn render(&self) -> String {
        self.tokens
            .iter()
            .enumerate()
            .map(|(i, t)| quote(t, self.secrets.contains(&i)))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// The command line with sensitive tokens masked, for logs
    pub fn redacted(&self) -> String {
        self.tokens
            .iter()
            .enumerate()
            .map(|(i, t)| {
                if self.secrets.contains(&i) {
                    Cow::Borrowed("'********'")
                } else {
                    quote(t, false)
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Whether the rendered line ends with `body`
    pub fn ends_with(&self, body: &str) -> bool {
        self.render().ends_with(body)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.redacted())
    }
}
