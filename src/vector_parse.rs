//! Parsing of the JSON vector literal grammar: `[1, 2.5, -3]`.
//!
//! This is deliberately not `serde_json`: the grammar tolerates a single
//! trailing comma before `]`, which `serde_json` rejects, and every
//! element needs a type-specific range check and conversion (to `f16`,
//! `bf16`, `u8`, or `i8`) rather than a generic `Value` tree.

use crate::element::ElementType;
use crate::error::{Error, Result};
use crate::half_precision::{f32_to_bf16, f32_to_f16};

/// Parses a JSON vector literal into raw element bytes for `element_type`,
/// validating against `dimension` when it is `Some`.
///
/// # Errors
///
/// Returns [`Error::FormatError`] for any syntactic problem (missing
/// brackets, a non-numeric token, a stray character) and
/// [`Error::InvalidArgument`] when an element is out of range for an
/// integer element type or the element count disagrees with `dimension`.
pub fn parse_json_vector(
    json: &str,
    element_type: ElementType,
    dimension: Option<u32>,
) -> Result<Vec<u8>> {
    let values = parse_number_array(json)?;

    if let Some(dim) = dimension {
        if dim as usize != values.len() {
            return Err(Error::InvalidArgument(format!(
                "invalid JSON vector dimension: expected {dim} but found {}",
                values.len()
            )));
        }
    }

    let mut out = Vec::with_capacity(values.len() * element_type.byte_size());
    for value in values {
        encode_element(value, element_type, &mut out)?;
    }
    Ok(out)
}

fn encode_element(value: f64, element_type: ElementType, out: &mut Vec<u8>) -> Result<()> {
    match element_type {
        ElementType::F32 => out.extend_from_slice(&(value as f32).to_le_bytes()),
        ElementType::F16 => out.extend_from_slice(&f32_to_f16(value as f32).to_le_bytes()),
        ElementType::BF16 => out.extend_from_slice(&f32_to_bf16(value as f32).to_le_bytes()),
        ElementType::U8 => {
            if !(0.0..=255.0).contains(&value) {
                return Err(Error::InvalidArgument(format!(
                    "value {value} out of range for uint8"
                )));
            }
            out.push(value as u8);
        }
        ElementType::I8 => {
            if !(-128.0..=127.0).contains(&value) {
                return Err(Error::InvalidArgument(format!(
                    "value {value} out of range for int8"
                )));
            }
            out.push(value as i8 as u8);
        }
    }
    Ok(())
}

/// Parses the literal's number tokens only, ignoring element type; used
/// for dimension-probing before a column's type is known.
fn parse_number_array(json: &str) -> Result<Vec<f64>> {
    let bytes = json.as_bytes();
    let mut i = skip_ws(bytes, 0);

    if i >= bytes.len() || bytes[i] != b'[' {
        return Err(Error::FormatError(
            "malformed JSON: expected '[' at the beginning of the array".into(),
        ));
    }
    i += 1;

    let mut values = Vec::new();
    loop {
        i = skip_ws(bytes, i);
        if i >= bytes.len() {
            return Err(Error::FormatError(
                "malformed JSON: unterminated array".into(),
            ));
        }
        if bytes[i] == b']' {
            i += 1;
            break;
        }

        let (value, next) = parse_number(json, i)?;
        values.push(value);
        i = skip_ws(bytes, next);

        if i >= bytes.len() {
            return Err(Error::FormatError(
                "malformed JSON: unterminated array".into(),
            ));
        }
        match bytes[i] {
            b',' => {
                i = skip_ws(bytes, i + 1);
                if i < bytes.len() && bytes[i] == b']' {
                    // trailing comma before close
                    i += 1;
                    break;
                }
            }
            b']' => {
                i += 1;
                break;
            }
            other => {
                return Err(Error::FormatError(format!(
                    "malformed JSON: unexpected character '{}' at position {}",
                    other as char,
                    i + 1
                )));
            }
        }
    }

    Ok(values)
}

fn skip_ws(bytes: &[u8], mut i: usize) -> usize {
    while i < bytes.len() && bytes[i].is_ascii_whitespace() {
        i += 1;
    }
    i
}

fn parse_number(s: &str, start: usize) -> Result<(f64, usize)> {
    let bytes = s.as_bytes();
    let mut end = start;
    if end < bytes.len() && (bytes[end] == b'+' || bytes[end] == b'-') {
        end += 1;
    }
    let mut saw_digit = false;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
        saw_digit = true;
    }
    if end < bytes.len() && bytes[end] == b'.' {
        end += 1;
        while end < bytes.len() && bytes[end].is_ascii_digit() {
            end += 1;
            saw_digit = true;
        }
    }
    if saw_digit && end < bytes.len() && (bytes[end] == b'e' || bytes[end] == b'E') {
        let mut exp_end = end + 1;
        if exp_end < bytes.len() && (bytes[exp_end] == b'+' || bytes[exp_end] == b'-') {
            exp_end += 1;
        }
        let exp_start = exp_end;
        while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
            exp_end += 1;
        }
        if exp_end > exp_start {
            end = exp_end;
        }
    }

    if !saw_digit {
        let found = s[start..].chars().next().unwrap_or('?');
        return Err(Error::FormatError(format!(
            "malformed JSON: expected a number at position {} (found '{found}')",
            start + 1
        )));
    }

    let token = &s[start..end];
    let value: f64 = token.parse().map_err(|_| {
        Error::FormatError(format!("malformed JSON: invalid number literal '{token}'"))
    })?;
    Ok((value, end))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_f32_array() {
        let bytes = parse_json_vector("[1, 2.5, -3]", ElementType::F32, None).unwrap();
        let floats: Vec<f32> = bytes
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes(c.try_into().unwrap()))
            .collect();
        assert_eq!(floats, vec![1.0, 2.5, -3.0]);
    }

    #[test]
    fn tolerates_trailing_comma() {
        let bytes = parse_json_vector("[1, 2, 3,]", ElementType::F32, None).unwrap();
        assert_eq!(bytes.len(), 12);
    }

    #[test]
    fn tolerates_whitespace() {
        let bytes = parse_json_vector("  [ 1 , 2 , 3 ] ", ElementType::F32, Some(3)).unwrap();
        assert_eq!(bytes.len(), 12);
    }

    #[test]
    fn rejects_missing_open_bracket() {
        assert!(matches!(
            parse_json_vector("1, 2, 3]", ElementType::F32, None),
            Err(Error::FormatError(_))
        ));
    }

    #[test]
    fn rejects_non_numeric_token() {
        assert!(matches!(
            parse_json_vector("[1, abc, 3]", ElementType::F32, None),
            Err(Error::FormatError(_))
        ));
    }

    #[test]
    fn rejects_dimension_mismatch() {
        assert!(matches!(
            parse_json_vector("[1, 2, 3]", ElementType::F32, Some(4)),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn rejects_out_of_range_u8() {
        assert!(matches!(
            parse_json_vector("[1, 256, 3]", ElementType::U8, None),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn rejects_out_of_range_i8() {
        assert!(matches!(
            parse_json_vector("[1, 200, 3]", ElementType::I8, None),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn negative_i8_values_round_trip() {
        let bytes = parse_json_vector("[-128, 0, 127]", ElementType::I8, None).unwrap();
        let vals: Vec<i8> = bytes.iter().map(|&b| b as i8).collect();
        assert_eq!(vals, vec![-128, 0, 127]);
    }

    #[test]
    fn empty_array_parses_to_zero_elements() {
        let bytes = parse_json_vector("[]", ElementType::F32, Some(0)).unwrap();
        assert!(bytes.is_empty());
    }

    #[test]
    fn scientific_notation_is_accepted() {
        let bytes = parse_json_vector("[1e2, -2.5e-1]", ElementType::F32, None).unwrap();
        let floats: Vec<f32> = bytes
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes(c.try_into().unwrap()))
            .collect();
        assert_eq!(floats, vec![100.0, -0.25]);
    }
}
