//! External tool command construction.
//!
//! Commands are built as structured argument vectors, never as interpolated
//! shell strings; the only place a shell string exists is inside the
//! launcher's tee/sentinel wrapper, which renders the vector with
//! [`CommandLine::shell_string`].

pub mod alphafold;
pub mod proteinmpnn;

/// A program plus its discrete arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandLine {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(&mut self, arg: impl Into<String>) -> &mut Self {
        self.args.push(arg.into());
        self
    }

    /// Render the command with every word individually shell-quoted, for
    /// embedding in the launcher's wrapper.
    pub fn shell_string(&self) -> String {
        std::iter::once(&self.program)
            .chain(self.args.iter())
            .map(|w| sh_quote(w))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Quote one word for POSIX sh. Plain words pass through; anything else is
/// single-quoted with embedded single quotes escaped.
pub fn sh_quote(word: &str) -> String {
    let plain = !word.is_empty()
        && word
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '/' | '=' | ':' | '+' | ',' | '@' | '%'));
    if plain {
        word.to_string()
    } else {
        format!("'{}'", word.replace('\'', r"'\''"))
    }
}
