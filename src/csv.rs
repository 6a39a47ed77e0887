//! Comma-separated input and output for [`Frame`]s.
//!
//! Fields may be double-quoted; a quoted field can hold commas, newlines and
//! `""` escapes. The first non-blank record is the header.

use std::fs;
use std::io::Write;
use std::path::Path;

use tracing::debug;

use crate::error::{Result, SegpermError};
use crate::frame::Frame;

pub fn read_csv(path: &Path) -> Result<Frame> {
    let text = fs::read_to_string(path)?;
    let frame = parse_csv(&text)?;
    debug!(
        path = %path.display(),
        rows = frame.len(),
        columns = frame.headers().len(),
        "loaded csv"
    );
    Ok(frame)
}

/// Splits `text` into records, each tagged with the line it starts on.
fn records(text: &str) -> Result<Vec<(usize, Vec<String>)>> {
    let mut out = Vec::new();
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut was_quoted = false;
    let mut line = 1;
    let mut start_line = 1;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    chars.next();
                    field.push('"');
                }
                '"' => in_quotes = false,
                '\n' => {
                    line += 1;
                    field.push(c);
                }
                _ => field.push(c),
            }
            continue;
        }
        match c {
            '"' if field.is_empty() && !was_quoted => {
                in_quotes = true;
                was_quoted = true;
            }
            '"' => {
                return Err(SegpermError::parse(line, "unexpected quote inside field"));
            }
            ',' => {
                fields.push(std::mem::take(&mut field));
                was_quoted = false;
            }
            '\r' if chars.peek() == Some(&'\n') => {}
            '\n' => {
                fields.push(std::mem::take(&mut field));
                was_quoted = false;
                let record = std::mem::take(&mut fields);
                if !(record.len() == 1 && record[0].is_empty()) {
                    out.push((start_line, record));
                }
                line += 1;
                start_line = line;
            }
            _ => field.push(c),
        }
    }

    if in_quotes {
        return Err(SegpermError::parse(start_line, "unterminated quoted field"));
    }
    if !field.is_empty() || !fields.is_empty() || was_quoted {
        fields.push(field);
        out.push((start_line, fields));
    }
    Ok(out)
}

pub fn parse_csv(text: &str) -> Result<Frame> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let mut records = records(text)?.into_iter();
    let Some((_, headers)) = records.next() else {
        return Ok(Frame::default());
    };
    let headers: Vec<String> = headers.into_iter().map(|h| h.trim().to_string()).collect();

    let mut rows = Vec::new();
    for (line, row) in records {
        if row.len() != headers.len() {
            return Err(SegpermError::parse(
                line,
                format!("expected {} fields, found {}", headers.len(), row.len()),
            ));
        }
        rows.push(row);
    }
    Frame::new(headers, rows)
}

fn escape_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Writes a header line followed by one line per row.
pub fn write_records<W, I>(out: &mut W, headers: &[String], rows: I) -> Result<()>
where
    W: Write,
    I: IntoIterator<Item = Vec<String>>,
{
    let line = |cells: &[String]| {
        cells
            .iter()
            .map(|c| escape_field(c))
            .collect::<Vec<_>>()
            .join(",")
    };
    writeln!(out, "{}", line(headers))?;
    for row in rows {
        writeln!(out, "{}", line(&row))?;
    }
    Ok(())
}

pub fn write_csv<W: Write>(out: &mut W, frame: &Frame) -> Result<()> {
    write_records(out, frame.headers(), frame.rows().iter().cloned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_quotes_and_crlf() {
        let frame = parse_csv("MAFID,ADDR\r\n1,\"12 Main St, Apt \"\"B\"\"\"\r\n\r\n2,plain\r\n").unwrap();
        assert_eq!(frame.headers(), &["MAFID".to_string(), "ADDR".to_string()]);
        assert_eq!(
            frame.column("ADDR").unwrap(),
            vec!["12 Main St, Apt \"B\"", "plain"]
        );
    }

    #[test]
    fn last_line_without_newline_is_kept() {
        let frame = parse_csv("a,b\n1,2").unwrap();
        assert_eq!(frame.len(), 1);
        assert_eq!(frame.column("b").unwrap(), vec!["2"]);
    }

    #[test]
    fn empty_trailing_field_is_kept() {
        let frame = parse_csv("a,b\n1,\n").unwrap();
        assert_eq!(frame.column("b").unwrap(), vec![""]);
    }

    #[test]
    fn quoted_newline_counts_lines() {
        let err = parse_csv("a,b\n\"x\ny\",1\n1,2,3\n").unwrap_err();
        assert!(matches!(err, SegpermError::Parse { line: 4, .. }));
    }

    #[test]
    fn unterminated_quote_is_an_error() {
        assert!(matches!(
            parse_csv("a\n\"open\n"),
            Err(SegpermError::Parse { line: 2, .. })
        ));
    }

    #[test]
    fn byte_order_mark_is_stripped() {
        let frame = parse_csv("\u{feff}MAFID,BLKID,TLID,A\n1,b,t,1\n").unwrap();
        assert_eq!(frame.headers()[0], "MAFID");
        assert_eq!(frame.column("MAFID").unwrap(), vec!["1"]);
    }

    #[test]
    fn carriage_returns_are_quoted() {
        let mut buf = Vec::new();
        let headers = vec!["k".to_string(), "v".to_string()];
        write_records(&mut buf, &headers, vec![vec!["1".to_string(), "a\rb".to_string()]]).unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), "k,v\n1,\"a\rb\"\n");
    }

    #[test]
    fn empty_input_is_an_empty_frame() {
        let frame = parse_csv("").unwrap();
        assert!(frame.is_empty());
        assert!(frame.headers().is_empty());
    }

    #[test]
    fn written_frame_reads_back() {
        let frame = parse_csv("k,v\n1,\"a,b\"\n2,\"say \"\"hi\"\"\"\n").unwrap();
        let mut buf = Vec::new();
        write_csv(&mut buf, &frame).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(text, "k,v\n1,\"a,b\"\n2,\"say \"\"hi\"\"\"\n");
        assert_eq!(parse_csv(&text).unwrap(), frame);
    }
}
