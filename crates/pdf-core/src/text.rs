//! Text and graphics operator generation

use crate::document::Color;
use lopdf::content::Content;
use lopdf::Object;

/// Context for rendering text
pub struct TextRenderContext {
    /// PDF font resource name (e.g., "F1")
    pub font_name: String,
    /// Font size in points
    pub font_size: f32,
    /// Text color (RGB)
    pub color: Color,
}

/// A piece of text shown on a page, as read back from a content stream
#[derive(Debug, Clone, PartialEq)]
pub struct TextRun {
    /// Decoded text
    pub text: String,
    /// Font resource name the run was shown with
    pub font_name: String,
    /// Font size in points
    pub font_size: f64,
    /// X coordinate in points
    pub x: f64,
    /// Y coordinate in points
    pub y: f64,
}

/// Format a coordinate for a content stream
///
/// Values are rounded to two decimals so that repeated renders of the
/// same data produce the same bytes.
pub(crate) fn fmt_num(value: f64) -> String {
    let s = format!("{value:.2}");
    let s = s.trim_end_matches('0').trim_end_matches('.');
    match s {
        "" | "-0" => "0".to_string(),
        _ => s.to_string(),
    }
}

/// Escape bytes for a PDF literal string
fn escape_literal(bytes: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(bytes.len() + 2);
    out.push(b'(');
    for &b in bytes {
        match b {
            b'(' | b')' | b'\\' => {
                out.push(b'\\');
                out.push(b);
            }
            b'\r' => out.extend_from_slice(b"\\r"),
            b'\n' => out.extend_from_slice(b"\\n"),
            _ => out.push(b),
        }
    }
    out.push(b')');
    out
}

/// Generate PDF operators for text insertion
///
/// Creates the PDF text operators (BT, rg, Tf, Td, Tj, ET) to show
/// already-encoded text at a specific position.
///
/// # Arguments
/// * `encoded` - Text bytes in the font's encoding
/// * `x` - X coordinate in points (PDF coordinates, from left)
/// * `y` - Y coordinate in points (PDF coordinates, from bottom)
/// * `ctx` - Text rendering context
pub fn generate_text_operators(encoded: &[u8], x: f64, y: f64, ctx: &TextRenderContext) -> Vec<u8> {
    let mut ops = Vec::new();

    ops.extend_from_slice(b"BT\n");
    ops.extend_from_slice(
        format!(
            "{} {} {} rg\n",
            fmt_num(ctx.color.r as f64),
            fmt_num(ctx.color.g as f64),
            fmt_num(ctx.color.b as f64)
        )
        .as_bytes(),
    );
    ops.extend_from_slice(
        format!("/{} {} Tf\n", ctx.font_name, fmt_num(ctx.font_size as f64)).as_bytes(),
    );
    ops.extend_from_slice(format!("{} {} Td\n", fmt_num(x), fmt_num(y)).as_bytes());
    ops.extend_from_slice(&escape_literal(encoded));
    ops.extend_from_slice(b" Tj\nET\n");

    ops
}

/// Generate PDF operators for a straight stroked line
///
/// Coordinates are PDF coordinates (origin bottom-left).
pub fn generate_line_operators(
    x1: f64,
    y1: f64,
    x2: f64,
    y2: f64,
    line_width: f64,
    color: Color,
) -> Vec<u8> {
    format!(
        "q\n{} {} {} RG\n{} w\n{} {} m\n{} {} l\nS\nQ\n",
        fmt_num(color.r as f64),
        fmt_num(color.g as f64),
        fmt_num(color.b as f64),
        fmt_num(line_width),
        fmt_num(x1),
        fmt_num(y1),
        fmt_num(x2),
        fmt_num(y2)
    )
    .into_bytes()
}

pub(crate) fn operand_f64(obj: &Object) -> Option<f64> {
    match obj {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(r) => Some(*r as f64),
        _ => None,
    }
}

/// Read the text runs shown by a content stream
///
/// Only positioning done with `Td`/`TD`/`Tm` is tracked, which covers
/// everything this crate writes. Strings are decoded as WinAnsi.
pub fn parse_text_runs(content: &[u8]) -> crate::Result<Vec<TextRun>> {
    let content = Content::decode(content)
        .map_err(|e| crate::PdfError::ParseError(format!("Content stream: {e}")))?;

    let mut runs = Vec::new();
    let mut font_name = String::new();
    let mut font_size = 0.0;
    let (mut line_x, mut line_y) = (0.0, 0.0);

    for op in &content.operations {
        let nums: Vec<f64> = op.operands.iter().filter_map(operand_f64).collect();
        match op.operator.as_str() {
            "BT" => {
                line_x = 0.0;
                line_y = 0.0;
            }
            "Tf" => {
                if let Some(Object::Name(name)) = op.operands.first() {
                    font_name = String::from_utf8_lossy(name).into_owned();
                }
                if let Some(size) = op.operands.get(1).and_then(operand_f64) {
                    font_size = size;
                }
            }
            "Td" | "TD" if nums.len() == 2 => {
                line_x += nums[0];
                line_y += nums[1];
            }
            "Tm" if nums.len() == 6 => {
                line_x = nums[4];
                line_y = nums[5];
            }
            "Tj" | "'" | "\"" => {
                if let Some(Object::String(bytes, _)) = op.operands.last() {
                    runs.push(TextRun {
                        text: crate::decode_win_ansi(bytes),
                        font_name: font_name.clone(),
                        font_size,
                        x: line_x,
                        y: line_y,
                    });
                }
            }
            "TJ" => {
                if let Some(Object::Array(parts)) = op.operands.first() {
                    let mut bytes = Vec::new();
                    for part in parts {
                        if let Object::String(s, _) = part {
                            bytes.extend_from_slice(s);
                        }
                    }
                    runs.push(TextRun {
                        text: crate::decode_win_ansi(&bytes),
                        font_name: font_name.clone(),
                        font_size,
                        x: line_x,
                        y: line_y,
                    });
                }
            }
            _ => {}
        }
    }

    Ok(runs)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(font_name: &str, font_size: f32) -> TextRenderContext {
        TextRenderContext {
            font_name: font_name.to_string(),
            font_size,
            color: Color::black(),
        }
    }

    #[test]
    fn test_fmt_num() {
        assert_eq!(fmt_num(150.0), "150");
        assert_eq!(fmt_num(716.89), "716.89");
        assert_eq!(fmt_num(841.89 - 125.0), "716.89");
        assert_eq!(fmt_num(0.5), "0.5");
        assert_eq!(fmt_num(0.0), "0");
        assert_eq!(fmt_num(-0.001), "0");
    }

    #[test]
    fn test_generate_text_operators() {
        let ops = generate_text_operators(b"Hello", 100.0, 700.0, &ctx("F1", 12.0));
        let ops_str = String::from_utf8(ops).unwrap();

        assert!(ops_str.starts_with("BT\n"));
        assert!(ops_str.contains("0 0 0 rg"));
        assert!(ops_str.contains("/F1 12 Tf"));
        assert!(ops_str.contains("100 700 Td"));
        assert!(ops_str.contains("(Hello) Tj"));
        assert!(ops_str.ends_with("ET\n"));
    }

    #[test]
    fn test_generate_text_operators_escapes_delimiters() {
        let ops = generate_text_operators(b"Unit (A) \\ B", 10.0, 20.0, &ctx("F1", 8.0));
        let ops_str = String::from_utf8(ops).unwrap();
        assert!(ops_str.contains(r"(Unit \(A\) \\ B) Tj"));
        assert!(ops_str.contains("/F1 8 Tf"));
    }

    #[test]
    fn test_generate_text_operators_with_color() {
        let ctx = TextRenderContext {
            font_name: "F1".to_string(),
            font_size: 12.0,
            color: Color::rgb(1.0, 0.0, 0.0),
        };
        let ops = generate_text_operators(b"A", 100.0, 700.0, &ctx);
        let ops_str = String::from_utf8(ops).unwrap();
        assert!(ops_str.contains("1 0 0 rg"));
    }

    #[test]
    fn test_generate_line_operators() {
        let ops = generate_line_operators(50.0, 100.0, 300.0, 100.0, 0.5, Color::gray());
        let ops_str = String::from_utf8(ops).unwrap();
        assert!(ops_str.contains("0.5 0.5 0.5 RG"));
        assert!(ops_str.contains("0.5 w"));
        assert!(ops_str.contains("50 100 m"));
        assert!(ops_str.contains("300 100 l"));
        assert!(ops_str.contains("S\nQ\n"));
    }

    #[test]
    fn test_parse_text_runs_reads_generated_operators() {
        let mut content = generate_text_operators(b"Acme Ltd", 150.0, 716.89, &ctx("F1", 10.0));
        content.extend(generate_text_operators(
            b"a@b.com",
            350.0,
            656.89,
            &ctx("F1", 8.0),
        ));

        let runs = parse_text_runs(&content).unwrap();
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].text, "Acme Ltd");
        assert_eq!(runs[0].font_name, "F1");
        assert_eq!(runs[0].font_size, 10.0);
        assert!((runs[0].x - 150.0).abs() < 0.01);
        assert!((runs[0].y - 716.89).abs() < 0.01);
        assert_eq!(runs[1].text, "a@b.com");
        assert_eq!(runs[1].font_size, 8.0);
    }

    #[test]
    fn test_parse_text_runs_unescapes_literals() {
        let content = generate_text_operators(b"Unit (A)", 10.0, 20.0, &ctx("F1", 8.0));
        let runs = parse_text_runs(&content).unwrap();
        assert_eq!(runs[0].text, "Unit (A)");
    }

    #[test]
    fn test_parse_text_runs_handles_tj_arrays_and_tm() {
        let content = b"BT /F2 9 Tf 1 0 0 1 40 500 Tm [(Wid) -20 (get)] TJ ET";
        let runs = parse_text_runs(content).unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].text, "Widget");
        assert_eq!(runs[0].font_name, "F2");
        assert_eq!(runs[0].x, 40.0);
        assert_eq!(runs[0].y, 500.0);
    }
}
