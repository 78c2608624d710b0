//! Text codec for the `KIVUPS` wire format.
//!
//! One frame looks like this:
//!
//! ```text
//! KIVUPS02 2024-01-05 13:07:42.000123{alice}{"gameName":"g1","maxPlayers":"2"}\n
//! ^^^^^^ ^^ ^^^^^^^^^^^^^^^^^^^^^^^^^^ ^^^^^  ^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^
//! sig    id timestamp (26)            nick   parameter group
//! ```
//!
//! A parameter value can itself hold a list of parameter groups:
//!
//! ```text
//! "gameList":"[{"gameName":"g1","maxPlayers":"2"};{"gameName":"g2",...}]"
//! ```
//!
//! Quotes are not escaped inside values, so the parameter splitter cannot
//! rely on quote pairing. It tracks bracket depth instead and only splits
//! on a `","` boundary at depth zero (and `};{` inside lists).
//!
//! Framing (finding the `\n`) is done by the transport; [`decode`] takes a
//! single frame with or without its delimiter.

use std::fmt::Write as _;

use crate::error::malformed;
use crate::{
    Message, Param, ProtocolError, COMMAND_ID_WIDTH, HEADER_WIDTH, SIGNATURE,
    TIMESTAMP_WIDTH,
};

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

/// Encodes a message into one newline-terminated frame.
///
/// # Errors
/// - [`ProtocolError::FieldWidth`] if the signature, command id or
///   timestamp does not fill its fixed width exactly.
/// - [`ProtocolError::InvalidField`] if the nickname or a parameter uses
///   characters reserved by the grammar.
pub fn encode(msg: &Message) -> Result<Vec<u8>, ProtocolError> {
    check_width("signature", &msg.signature, SIGNATURE.len())?;
    let id = format!("{:0width$}", msg.command_id, width = COMMAND_ID_WIDTH);
    check_width("command id", &id, COMMAND_ID_WIDTH)?;
    check_width("timestamp", &msg.timestamp, TIMESTAMP_WIDTH)?;

    if msg.nickname.contains(['{', '}', '\n', '\r']) {
        return Err(ProtocolError::InvalidField(format!(
            "nickname {:?}",
            msg.nickname
        )));
    }

    let mut out = String::with_capacity(HEADER_WIDTH + 64);
    out.push_str(&msg.signature);
    out.push_str(&id);
    out.push_str(&msg.timestamp);
    out.push('{');
    out.push_str(&msg.nickname);
    out.push('}');
    out.push_str(&encode_group(&msg.params)?);
    out.push('\n');
    Ok(out.into_bytes())
}

/// Encodes a list of parameter groups as a single parameter value:
/// `[{..};{..}]`.
pub fn encode_list(elements: &[Vec<Param>]) -> Result<String, ProtocolError> {
    let mut out = String::from("[");
    for (i, element) in elements.iter().enumerate() {
        if i > 0 {
            out.push(';');
        }
        out.push_str(&encode_group(element)?);
    }
    out.push(']');
    Ok(out)
}

fn encode_group(params: &[Param]) -> Result<String, ProtocolError> {
    let mut out = String::from("{");
    for (i, p) in params.iter().enumerate() {
        if p.name.is_empty() || p.name.contains(['"', '{', '}', '[', ']', ',', ';', ':']) {
            return Err(ProtocolError::InvalidField(format!(
                "parameter name {:?}",
                p.name
            )));
        }
        check_value(&p.name, &p.value)?;
        if i > 0 {
            out.push(',');
        }
        let _ = write!(out, "\"{}\":\"{}\"", p.name, p.value);
    }
    out.push('}');
    Ok(out)
}

/// Fails if `value` would not decode back to itself once quoted: no line
/// breaks, balanced brackets, and no `","` outside of them.
fn check_value(name: &str, value: &str) -> Result<(), ProtocolError> {
    let invalid = |why: &str| {
        Err(ProtocolError::InvalidField(format!("parameter {name} {why}")))
    };
    if value.contains(['\n', '\r']) {
        return invalid("contains a line break");
    }
    match split_top_level(&format!("\"{value}\""), b',', b'"', b'"') {
        Ok(parts) if parts.len() == 1 => Ok(()),
        Ok(_) => invalid("contains a parameter separator"),
        Err(_) => invalid("has unbalanced brackets"),
    }
}

fn check_width(
    field: &'static str,
    value: &str,
    expected: usize,
) -> Result<(), ProtocolError> {
    if value.len() != expected || !value.is_ascii() {
        return Err(ProtocolError::FieldWidth {
            field,
            expected,
            actual: value.len(),
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// Decodes one frame into a [`Message`].
///
/// A trailing `\n` or `\r\n` is ignored. Parameter names are not checked
/// against the command table here; that is the dispatcher's job.
///
/// # Errors
/// Returns [`ProtocolError::Malformed`] on a truncated header, a
/// non-numeric command id, unmatched braces or brackets, a parameter that
/// is not `"name":"value"`, or a repeated parameter name.
pub fn decode(frame: &[u8]) -> Result<Message, ProtocolError> {
    let text = std::str::from_utf8(frame)
        .map_err(|_| malformed("frame is not valid UTF-8"))?;
    let text = text.strip_suffix('\n').unwrap_or(text);
    let text = text.strip_suffix('\r').unwrap_or(text);

    if text.len() < HEADER_WIDTH || !text.is_char_boundary(HEADER_WIDTH) {
        return Err(malformed("truncated header"));
    }
    let (header, body) = text.split_at(HEADER_WIDTH);
    if !header.is_ascii() {
        return Err(malformed("header is not ASCII"));
    }

    let sig_end = SIGNATURE.len();
    let id_end = sig_end + COMMAND_ID_WIDTH;
    let signature = &header[..sig_end];
    let id_text = &header[sig_end..id_end];
    let timestamp = &header[id_end..];

    if !id_text.bytes().all(|b| b.is_ascii_digit()) {
        return Err(malformed(format!("non-numeric command id {id_text:?}")));
    }
    let command_id: u8 = id_text
        .parse()
        .map_err(|_| malformed(format!("bad command id {id_text:?}")))?;

    let rest = body
        .strip_prefix('{')
        .ok_or_else(|| malformed("missing nickname group"))?;
    let close = rest
        .find('}')
        .ok_or_else(|| malformed("unterminated nickname group"))?;
    let nickname = &rest[..close];
    if nickname.contains('{') {
        return Err(malformed("unmatched brace in nickname"));
    }

    let group = &rest[close + 1..];
    let params = decode_group(group)?;

    Ok(Message {
        signature: signature.to_string(),
        command_id,
        timestamp: timestamp.to_string(),
        nickname: nickname.to_string(),
        params,
    })
}

/// Decodes a list value (`[{..};{..}]`) into its parameter groups.
///
/// `[]` is the empty list.
pub fn decode_list(value: &str) -> Result<Vec<Vec<Param>>, ProtocolError> {
    let inner = value
        .strip_prefix('[')
        .and_then(|v| v.strip_suffix(']'))
        .ok_or_else(|| malformed(format!("list value {value:?} is not bracketed")))?;
    if inner.is_empty() {
        return Ok(Vec::new());
    }
    split_top_level(inner, b';', b'}', b'{')?
        .into_iter()
        .map(decode_group)
        .collect()
}

/// Decodes `{"a":"1","b":"2"}`. `{}` yields no parameters.
fn decode_group(group: &str) -> Result<Vec<Param>, ProtocolError> {
    let inner = group
        .strip_prefix('{')
        .and_then(|g| g.strip_suffix('}'))
        .ok_or_else(|| malformed("parameter group must be wrapped in braces"))?;
    if inner.is_empty() {
        return Ok(Vec::new());
    }

    let mut params: Vec<Param> = Vec::new();
    for item in split_top_level(inner, b',', b'"', b'"')? {
        let param = decode_param(item)?;
        if params.iter().any(|p| p.name == param.name) {
            return Err(malformed(format!("duplicate parameter {:?}", param.name)));
        }
        params.push(param);
    }
    Ok(params)
}

/// Decodes `"name":"value"`. The value may contain quotes and brackets.
fn decode_param(item: &str) -> Result<Param, ProtocolError> {
    let bad = || malformed(format!("parameter {item:?} is not \"name\":\"value\""));

    let body = item.strip_prefix('"').ok_or_else(bad)?;
    let split = body.find("\":\"").ok_or_else(bad)?;
    let name = &body[..split];
    let value = body[split + 3..].strip_suffix('"').ok_or_else(bad)?;
    if name.is_empty() || name.contains('"') {
        return Err(bad());
    }

    Ok(Param::new(name, value))
}

/// Splits `s` on `sep` where the separator sits at bracket depth zero and
/// is directly preceded by `before` and followed by `after`.
///
/// Fails on a closing bracket without a matching opener, a mismatched
/// bracket pair, or brackets left open at the end.
fn split_top_level(
    s: &str,
    sep: u8,
    before: u8,
    after: u8,
) -> Result<Vec<&str>, ProtocolError> {
    let bytes = s.as_bytes();
    let mut stack: Vec<u8> = Vec::new();
    let mut parts = Vec::new();
    let mut start = 0;

    for (i, &b) in bytes.iter().enumerate() {
        match b {
            b'{' | b'[' => stack.push(b),
            b'}' | b']' => {
                let open = if b == b'}' { b'{' } else { b'[' };
                if stack.pop() != Some(open) {
                    return Err(malformed("unmatched bracket"));
                }
            }
            _ if b == sep
                && stack.is_empty()
                && i > 0
                && bytes[i - 1] == before
                && bytes.get(i + 1) == Some(&after) =>
            {
                parts.push(&s[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err(malformed("unmatched bracket"));
    }
    parts.push(&s[start..]);
    Ok(parts)
}
