//! Line unfolding (RFC 5545 §3.1) ahead of content-line tokenizing, and the matching
//! [`FoldingWriter`] used on the way back out.

use std::fmt::Write;

use crate::LexError;

const MAX_LINE_LENGTH: u32 = 75;
const CONTINUATION: &str = "\r\n ";
const CRLF: &str = "\r\n";

/// Strips a leading UTF-8 BOM, if present, and joins folded continuation lines (any physical
/// line starting with SPACE or HTAB) back onto their logical predecessor, producing one string
/// per logical content line with folding whitespace removed.
pub fn unfold(input: &str) -> Result<Vec<String>, LexError> {
    let input = input.strip_prefix('\u{feff}').unwrap_or(input);

    let mut lines: Vec<String> = Vec::new();
    let mut line_no: u32 = 0;

    for physical in input.split("\r\n").flat_map(|s| s.split('\n')) {
        line_no += 1;

        if physical.is_empty() && line_no == 1 {
            continue;
        }

        let is_continuation = physical.starts_with(' ') || physical.starts_with('\t');

        if is_continuation {
            let Some(last) = lines.last_mut() else {
                return Err(LexError::DanglingContinuation { line: line_no });
            };

            last.push_str(&physical[1..]);
        } else if !physical.is_empty() {
            lines.push(physical.to_string());
        }
    }

    Ok(lines)
}

/// Folds a single logical content line back to RFC 5545 wire format: CRLF-terminated, with any
/// line over 75 octets broken at a UTF-8 codepoint boundary and continued with `CRLF SPACE`.
pub struct FoldingWriter<W: Write> {
    inner: W,
    rem_line_len: u32,
    passed_eol: bool,
}

impl<W: Write> FoldingWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            rem_line_len: MAX_LINE_LENGTH,
            passed_eol: false,
        }
    }

    pub fn eol(mut self) -> std::fmt::Result {
        self.passed_eol = true;
        self.inner.write_str(CRLF)
    }
}

impl<W: Write> Drop for FoldingWriter<W> {
    fn drop(&mut self) {
        if !self.passed_eol && !std::thread::panicking() {
            panic!("FoldingWriter::eol() must be called before dropping the value");
        }
    }
}

impl<W: Write> Write for FoldingWriter<W> {
    fn write_str(&mut self, s: &str) -> std::fmt::Result {
        let mut b = s.as_bytes();

        while b.len() > self.rem_line_len as usize {
            let mut end = self.rem_line_len as usize;

            while b[end] & 0xc0 == 0x80 {
                end -= 1;
            }

            self.inner.write_str(std::str::from_utf8(&b[0..end]).unwrap())?;
            self.inner.write_str(CONTINUATION)?;
            b = &b[end..];

            self.rem_line_len = MAX_LINE_LENGTH - 1;
        }

        self.rem_line_len -= b.len() as u32;
        self.inner.write_str(std::str::from_utf8(b).unwrap())?;

        Ok(())
    }
}

/// Folds and CRLF-terminates a single already-rendered logical content line.
pub fn fold_line(line: &str) -> String {
    let mut buf = String::new();
    let mut writer = FoldingWriter::new(&mut buf);
    write!(writer, "{line}").expect("writing to a String cannot fail");
    writer.eol().expect("writing to a String cannot fail");
    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unfold_joins_continuation_lines() {
        let input = "BEGIN:VEVENT\r\nSUMMARY:Long line that co\r\n ntinues here\r\nEND:VEVENT\r\n";

        assert_eq!(
            unfold(input).unwrap(),
            vec![
                "BEGIN:VEVENT".to_string(),
                "SUMMARY:Long line that continues here".to_string(),
                "END:VEVENT".to_string(),
            ]
        );
    }

    #[test]
    fn unfold_accepts_bare_lf() {
        let input = "BEGIN:VEVENT\nEND:VEVENT\n";

        assert_eq!(unfold(input).unwrap(), vec!["BEGIN:VEVENT".to_string(), "END:VEVENT".to_string()]);
    }

    #[test]
    fn unfold_strips_leading_bom() {
        let input = "\u{feff}BEGIN:VCALENDAR\r\nEND:VCALENDAR\r\n";

        assert_eq!(
            unfold(input).unwrap(),
            vec!["BEGIN:VCALENDAR".to_string(), "END:VCALENDAR".to_string()]
        );
    }

    #[test]
    fn unfold_rejects_dangling_continuation() {
        let input = " stray continuation\r\n";

        assert_eq!(unfold(input), Err(LexError::DanglingContinuation { line: 1 }));
    }

    #[test]
    fn fold_line_wraps_at_75_octets() {
        let long = "SUMMARY:test string exceeding 75 chars, all ASCII, to see that it does get folded";
        let folded = fold_line(long);

        assert!(folded.contains("\r\n "));
        assert!(folded.ends_with("\r\n"));
    }
}
