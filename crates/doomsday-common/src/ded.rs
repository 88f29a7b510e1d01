// ded.rs: bias light definitions (the "BiasLight" blocks of a DED file)

use crate::common::{DISTNAME, DISTVER};
use crate::mathlib::Vec3;
use thiserror::Error;

/// One level light definition.
#[derive(Debug, Clone, PartialEq)]
pub struct DedLight {
    /// Unique identifier of the level the light belongs to, e.g. "doom2-map01".
    pub level: String,
    pub offset: Vec3,
    pub color: Vec3,
    /// Intensity at full strength.
    pub size: f32,
    /// Sector light levels [min, max] driving the intensity; both zero
    /// means the light is not sector driven.
    pub light_levels: [f32; 2],
}

impl Default for DedLight {
    fn default() -> Self {
        Self {
            level: String::new(),
            offset: [0.0; 3],
            color: [1.0; 3],
            size: 200.0,
            light_levels: [0.0; 2],
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum DedError {
    #[error("line {line}: unexpected end of file")]
    UnexpectedEof { line: usize },
    #[error("line {line}: expected \"{expected}\" but found \"{found}\"")]
    Expected {
        line: usize,
        expected: String,
        found: String,
    },
    #[error("line {line}: \"{token}\" is not a number")]
    BadNumber { line: usize, token: String },
    #[error("line {line}: unknown key \"{key}\" in BiasLight")]
    UnknownKey { line: usize, key: String },
}

// ============================================================
// Tokenizer
// ============================================================

/// Splits DED text into tokens. `{`, `}` and `=` are tokens of their own,
/// quoted strings keep their spaces and `#` comments run to end of line.
struct DedReader<'a> {
    data: &'a [u8],
    pos: usize,
    line: usize,
}

impl<'a> DedReader<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            data: text.as_bytes(),
            pos: 0,
            line: 1,
        }
    }

    fn skip_whitespace(&mut self) {
        while self.pos < self.data.len() {
            match self.data[self.pos] {
                b'\n' => {
                    self.line += 1;
                    self.pos += 1;
                }
                b'#' => {
                    while self.pos < self.data.len() && self.data[self.pos] != b'\n' {
                        self.pos += 1;
                    }
                }
                c if c <= b' ' => self.pos += 1,
                _ => break,
            }
        }
    }

    /// Next token, or None at end of input.
    fn next_token(&mut self) -> Option<String> {
        self.skip_whitespace();
        if self.pos >= self.data.len() {
            return None;
        }

        let c = self.data[self.pos];
        if matches!(c, b'{' | b'}' | b'=') {
            self.pos += 1;
            return Some((c as char).to_string());
        }

        let mut token = Vec::new();
        if c == b'"' {
            self.pos += 1;
            while self.pos < self.data.len() && self.data[self.pos] != b'"' {
                if self.data[self.pos] == b'\n' {
                    self.line += 1;
                }
                token.push(self.data[self.pos]);
                self.pos += 1;
            }
            self.pos += 1; // closing quote
        } else {
            while self.pos < self.data.len() {
                let c = self.data[self.pos];
                if c <= b' ' || matches!(c, b'{' | b'}' | b'=' | b'#') {
                    break;
                }
                token.push(c);
                self.pos += 1;
            }
        }
        Some(String::from_utf8_lossy(&token).into_owned())
    }

    fn require_token(&mut self) -> Result<String, DedError> {
        self.next_token()
            .ok_or(DedError::UnexpectedEof { line: self.line })
    }

    fn expect(&mut self, expected: &str) -> Result<(), DedError> {
        let token = self.require_token()?;
        if !token.eq_ignore_ascii_case(expected) {
            return Err(DedError::Expected {
                line: self.line,
                expected: expected.to_string(),
                found: token,
            });
        }
        Ok(())
    }

    fn read_number(&mut self) -> Result<f32, DedError> {
        let token = self.require_token()?;
        token.parse::<f32>().map_err(|_| DedError::BadNumber {
            line: self.line,
            token,
        })
    }

    /// `{ a b ... }` with exactly N numbers.
    fn read_vector<const N: usize>(&mut self) -> Result<[f32; N], DedError> {
        self.expect("{")?;
        let mut out = [0.0; N];
        for v in out.iter_mut() {
            *v = self.read_number()?;
        }
        self.expect("}")?;
        Ok(out)
    }

    /// Skips an optional `=` between a key and its value.
    fn read_value(&mut self) -> Result<String, DedError> {
        let token = self.require_token()?;
        if token == "=" {
            self.require_token()
        } else {
            Ok(token)
        }
    }
}

fn read_bias_light(reader: &mut DedReader) -> Result<DedLight, DedError> {
    let mut light = DedLight::default();
    reader.expect("{")?;
    loop {
        let key = reader.require_token()?;
        match key.to_ascii_lowercase().as_str() {
            "}" => break,
            "map" => light.level = reader.read_value()?,
            "origin" => light.offset = reader.read_vector::<3>()?,
            "color" => light.color = reader.read_vector::<3>()?,
            "intensity" => {
                let line = reader.line;
                let token = reader.read_value()?;
                light.size = token
                    .parse::<f32>()
                    .map_err(|_| DedError::BadNumber { line, token })?;
            }
            "sector" => {
                reader.expect("levels")?;
                light.light_levels = reader.read_vector::<2>()?;
            }
            _ => {
                return Err(DedError::UnknownKey {
                    line: reader.line,
                    key,
                })
            }
        }
    }
    Ok(light)
}

/// Parse every BiasLight block in `text`.
///
/// A `SkipIf Not <mode>` directive makes the rest of the file apply only
/// when `game_mode` matches; otherwise nothing is returned. Top-level blocks
/// and directives other than BiasLight are skipped.
pub fn parse_bias_lights(text: &str, game_mode: &str) -> Result<Vec<DedLight>, DedError> {
    let mut reader = DedReader::new(text);
    let mut lights = Vec::new();

    while let Some(token) = reader.next_token() {
        if token.eq_ignore_ascii_case("skipif") {
            let mut arg = reader.require_token()?;
            let negate = arg.eq_ignore_ascii_case("not");
            if negate {
                arg = reader.require_token()?;
            }
            let matches = arg.eq_ignore_ascii_case(game_mode);
            if matches != negate {
                return Ok(Vec::new());
            }
        } else if token.eq_ignore_ascii_case("biaslight") {
            lights.push(read_bias_light(&mut reader)?);
        } else if token == "{" {
            skip_block(&mut reader)?;
        }
        // Other directives and their arguments are dropped a token at a time.
    }

    Ok(lights)
}

/// Skip the body of a block we do not understand, nested braces included.
/// The opening brace has already been read.
fn skip_block(reader: &mut DedReader) -> Result<(), DedError> {
    let mut depth = 1;
    loop {
        let token = reader.require_token()?;
        match token.as_str() {
            "{" => depth += 1,
            "}" => {
                depth -= 1;
                if depth <= 0 {
                    return Ok(());
                }
            }
            _ => {}
        }
    }
}

// ============================================================
// Writer
// ============================================================

/// Emit `lights` as a DED file owned by `level`, guarded so it is ignored
/// when loaded under any game mode other than `game_mode`.
pub fn write_bias_lights(
    writer: &mut dyn std::io::Write,
    level: &str,
    game_mode: &str,
    lights: &[DedLight],
) -> std::io::Result<()> {
    writeln!(writer, "# {} Bias Lights for {}", lights.len(), level)?;
    writeln!(writer)?;
    writeln!(
        writer,
        "# NOTE: This file is generated by {} {}, any comments will be lost.",
        DISTNAME, DISTVER
    )?;
    writeln!(writer)?;
    writeln!(writer, "SkipIf Not {}", game_mode)?;

    for light in lights {
        writeln!(writer)?;
        writeln!(writer, "BiasLight {{")?;
        writeln!(writer, "  Map = \"{}\"", light.level)?;
        writeln!(
            writer,
            "  Origin {{ {} {} {} }}",
            light.offset[0], light.offset[1], light.offset[2]
        )?;
        writeln!(
            writer,
            "  Color {{ {} {} {} }}",
            light.color[0], light.color[1], light.color[2]
        )?;
        writeln!(writer, "  Intensity = {}", light.size)?;
        writeln!(
            writer,
            "  Sector levels {{ {} {} }}",
            light.light_levels[0], light.light_levels[1]
        )?;
        writeln!(writer, "}}")?;
    }
    Ok(())
}
