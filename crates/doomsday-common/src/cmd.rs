// cmd.rs: console command line tokenizing

/// Longest command line accepted by the tokenizer.
pub const MAX_STRING_CHARS: usize = 1024;
/// Arguments beyond this count are dropped.
pub const MAX_STRING_TOKENS: usize = 80;

/// A tokenized command line: argv[0] is the command name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CmdArgs {
    argv: Vec<String>,
}

impl CmdArgs {
    /// Split a single command line into arguments. Quoted strings form one
    /// argument and `//` starts a comment.
    pub fn tokenize(text: &str) -> Self {
        let mut out = CmdArgs::default();
        if text.len() > MAX_STRING_CHARS {
            return out;
        }

        let data = text.as_bytes();
        let mut pos = 0;
        loop {
            // Skip whitespace up to a newline; one line per command.
            while pos < data.len() && data[pos] <= b' ' && data[pos] != b'\n' {
                pos += 1;
            }
            if pos >= data.len() || data[pos] == b'\n' {
                break;
            }
            if data[pos] == b'/' && data.get(pos + 1) == Some(&b'/') {
                break;
            }

            let (token, new_pos) = parse_line_token(data, pos);
            pos = new_pos;
            if out.argv.len() < MAX_STRING_TOKENS {
                out.argv.push(token);
            }
        }
        out
    }

    pub fn argc(&self) -> usize {
        self.argv.len()
    }

    /// Argument `arg`, or "" when out of range.
    pub fn argv(&self, arg: usize) -> &str {
        self.argv.get(arg).map_or("", |s| s.as_str())
    }
}

/// Parse a single token from `data` starting at `pos`, which must point at
/// a non-whitespace byte. Returns (token, new_pos).
fn parse_line_token(data: &[u8], mut pos: usize) -> (String, usize) {
    let mut token = Vec::new();

    if data[pos] == b'"' {
        pos += 1; // skip opening quote
        while pos < data.len() && data[pos] != b'"' && data[pos] != b'\n' {
            token.push(data[pos]);
            pos += 1;
        }
        if pos < data.len() && data[pos] == b'"' {
            pos += 1; // skip closing quote
        }
    } else {
        while pos < data.len() && data[pos] > b' ' {
            token.push(data[pos]);
            pos += 1;
        }
    }

    (String::from_utf8_lossy(&token).into_owned(), pos)
}

/// Split a script buffer into individual command lines on newlines and
/// unquoted semicolons.
pub fn split_commands(text: &str) -> Vec<&str> {
    let mut lines = Vec::new();
    let mut quotes = false;
    let mut start = 0;
    for (i, c) in text.char_indices() {
        match c {
            '"' => quotes = !quotes,
            ';' if !quotes => {
                lines.push(&text[start..i]);
                start = i + 1;
            }
            '\n' => {
                quotes = false;
                lines.push(&text[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    if start < text.len() {
        lines.push(&text[start..]);
    }
    lines.retain(|l| !l.trim().is_empty());
    lines
}
