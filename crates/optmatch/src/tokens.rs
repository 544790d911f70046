//! Raw token stream with lazy short-option cluster expansion.

use std::collections::VecDeque;

/// Marker that ends option matching inside a command.
pub const END_OF_OPTIONS: &str = "--";

/// Whether `token` is shaped like an option (`-x`, `--name`, `-xyz`).
///
/// A bare `-` is an ordinary value (conventionally stdin).
pub fn looks_like_option(token: &str) -> bool {
    token.len() > 1 && token.starts_with('-')
}

/// Whether `token` is a combined short-option cluster such as `-xyz`.
///
/// The characters after the dash must number at least two and contain
/// neither `-` nor `=`.
pub fn is_cluster(token: &str) -> bool {
    let Some(rest) = token.strip_prefix('-') else {
        return false;
    };
    rest.chars().nth(1).is_some() && !rest.contains(|c: char| c == '-' || c == '=')
}

fn split_cluster(token: &str) -> Vec<String> {
    token
        .chars()
        .skip(1)
        .map(|c| format!("-{c}"))
        .collect()
}

/// An option token after `--name=value` splitting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionToken {
    pub name: String,
    pub inline_value: Option<String>,
}

impl OptionToken {
    fn split(token: String) -> Self {
        if token.starts_with("--") {
            if let Some((name, value)) = token.split_once('=') {
                return Self {
                    name: name.to_string(),
                    inline_value: Some(value.to_string()),
                };
            }
        }
        Self {
            name: token,
            inline_value: None,
        }
    }
}

/// FIFO access to the remaining tokens of one parse.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenStream {
    tokens: VecDeque<String>,
}

impl TokenStream {
    pub fn new<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tokens: tokens.into_iter().map(Into::into).collect(),
        }
    }

    pub fn peek(&self) -> Option<&str> {
        self.tokens.front().map(String::as_str)
    }

    pub fn consume(&mut self) -> Option<String> {
        self.tokens.pop_front()
    }

    /// Push a token back so it is the next one consumed.
    pub fn prepend(&mut self, token: impl Into<String>) {
        self.tokens.push_front(token.into());
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Rewrite every short-option cluster in the stream (`-xyz` → `-x -y -z`).
    pub fn expand(&mut self) {
        let mut out = VecDeque::with_capacity(self.tokens.len());
        for token in self.tokens.drain(..) {
            if is_cluster(&token) {
                out.extend(split_cluster(&token));
            } else {
                out.push_back(token);
            }
        }
        self.tokens = out;
    }

    /// Rewrite the head token if it is a cluster. Returns whether it was.
    pub fn expand_front(&mut self) -> bool {
        let Some(head) = self.tokens.front() else {
            return false;
        };
        if !is_cluster(head) {
            return false;
        }
        let parts = split_cluster(head);
        self.tokens.pop_front();
        for part in parts.into_iter().rev() {
            self.tokens.push_front(part);
        }
        true
    }

    /// Consume the head token as an option, detaching any `--name=value` value.
    pub fn consume_option(&mut self) -> Option<OptionToken> {
        self.consume().map(OptionToken::split)
    }

    /// Take every remaining token, verbatim.
    pub fn drain_remaining(&mut self) -> Vec<String> {
        self.tokens.drain(..).collect()
    }
}

impl<S: Into<String>> FromIterator<S> for TokenStream {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self::new(iter)
    }
}
