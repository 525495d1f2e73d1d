// src/cmdline.rs

//! Command-line joining and splitting, compatible with the Windows
//! `CommandLineToArgvW` rules.
//!
//! [`join_command_line`] quotes each token exactly as much as needed so
//! that [`split_command_line`] recovers the original tokens. The tricky
//! cases are all backslash-related: a backslash run immediately before a
//! quote (literal or closing) must be doubled, and the quote it precedes
//! escaped.

/// Join tokens into a single command line.
///
/// Tokens containing whitespace, quotes, or nothing at all are quoted;
/// everything else passes through verbatim.
pub fn join_command_line<I, S>(tokens: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out = String::new();
    for token in tokens {
        if !out.is_empty() {
            out.push(' ');
        }
        append_quoted(&mut out, token.as_ref());
    }
    out
}

fn needs_quoting(token: &str) -> bool {
    token.is_empty() || token.contains([' ', '\t', '"'])
}

fn append_quoted(out: &mut String, token: &str) {
    if !needs_quoting(token) {
        out.push_str(token);
        return;
    }

    out.push('"');
    let mut chars = token.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            if c == '"' {
                out.push('\\');
            }
            out.push(c);
            continue;
        }

        // Count the backslash run; how it is emitted depends on what
        // follows it.
        let mut run = 1;
        while chars.peek() == Some(&'\\') {
            chars.next();
            run += 1;
        }
        match chars.peek() {
            // Run precedes a literal quote: double it and escape the quote.
            Some(&'"') => {
                chars.next();
                for _ in 0..run {
                    out.push_str("\\\\");
                }
                out.push_str("\\\"");
            }
            // Run ends the token: double it so the closing quote survives.
            None => {
                for _ in 0..run {
                    out.push_str("\\\\");
                }
            }
            // Run precedes an ordinary character: emit as-is.
            Some(_) => {
                for _ in 0..run {
                    out.push('\\');
                }
            }
        }
    }
    out.push('"');
}

/// Split a command line back into tokens.
///
/// Implements the `CommandLineToArgvW` backslash/quote state machine:
/// `2n` backslashes before a quote yield `n` backslashes and toggle quote
/// mode; `2n+1` yield `n` backslashes and a literal quote; backslashes not
/// before a quote are literal.
pub fn split_command_line(line: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_token = false;
    let mut in_quotes = false;

    let mut chars = line.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                in_token = true;
                let mut run = 1;
                while chars.peek() == Some(&'\\') {
                    chars.next();
                    run += 1;
                }
                if chars.peek() == Some(&'"') {
                    for _ in 0..run / 2 {
                        current.push('\\');
                    }
                    if run % 2 == 1 {
                        // Odd run escapes the quote.
                        chars.next();
                        current.push('"');
                    }
                    // Even run: the quote is left for the next iteration
                    // to toggle quote mode.
                } else {
                    for _ in 0..run {
                        current.push('\\');
                    }
                }
            }
            '"' => {
                // An empty quoted pair still produces a token.
                in_token = true;
                in_quotes = !in_quotes;
            }
            ' ' | '\t' => {
                if in_quotes {
                    current.push(c);
                } else if in_token {
                    tokens.push(std::mem::take(&mut current));
                    in_token = false;
                }
            }
            other => {
                in_token = true;
                current.push(other);
            }
        }
    }

    if in_token {
        tokens.push(current);
    }
    tokens
}
