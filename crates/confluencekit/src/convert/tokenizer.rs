//! Storage-format tokenizer
//!
//! Splits markup into start tags, end tags, text and CDATA. Tag names and
//! attribute names are lowercased; text and attribute values are entity
//! decoded. The only hard failure is a markup construct that is opened but
//! never closed before the end of input.

use crate::error::ConfluenceError;

/// Elements whose content is raw text, skipped up to the matching end tag
const RAW_TEXT_TAGS: &[&str] = &["script", "style"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Token {
    Start {
        name: String,
        attrs: Vec<(String, String)>,
        self_closing: bool,
    },
    End {
        name: String,
    },
    Text(String),
    CData(String),
}

pub(crate) fn tokenize(html: &str) -> Result<Vec<Token>, ConfluenceError> {
    let bytes = html.as_bytes();
    let mut tokens = Vec::new();
    let mut text_start = 0;
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] != b'<' {
            i += 1;
            continue;
        }

        let after = &html[i + 1..];

        if after.starts_with("!--") {
            let end = find_from(html, i + 4, "-->")
                .ok_or_else(|| unterminated("comment", i))?;
            flush_text(html, text_start, i, &mut tokens);
            i = end + 3;
            text_start = i;
            continue;
        }

        if after.starts_with("![CDATA[") {
            let body_start = i + 9;
            let end = find_from(html, body_start, "]]>")
                .ok_or_else(|| unterminated("CDATA section", i))?;
            flush_text(html, text_start, i, &mut tokens);
            tokens.push(Token::CData(html[body_start..end].to_string()));
            i = end + 3;
            text_start = i;
            continue;
        }

        if after.starts_with('!') || after.starts_with('?') {
            // Doctype or processing instruction
            let end = find_from(html, i + 1, ">").ok_or_else(|| unterminated("declaration", i))?;
            flush_text(html, text_start, i, &mut tokens);
            i = end + 1;
            text_start = i;
            continue;
        }

        if !starts_tag(after) {
            // Literal '<' in text
            i += 1;
            continue;
        }

        let end = find_tag_end(bytes, i + 1).ok_or_else(|| unterminated("tag", i))?;
        flush_text(html, text_start, i, &mut tokens);
        let token = parse_tag(&html[i + 1..end]);
        i = end + 1;

        if let Token::Start {
            ref name,
            self_closing: false,
            ..
        } = token
        {
            if RAW_TEXT_TAGS.contains(&name.as_str()) {
                let name = name.clone();
                tokens.push(token);
                i = skip_raw_text(html, i, &name);
                tokens.push(Token::End { name });
                text_start = i;
                continue;
            }
        }

        tokens.push(token);
        text_start = i;
    }

    flush_text(html, text_start, bytes.len(), &mut tokens);
    Ok(tokens)
}

fn unterminated(what: &str, at: usize) -> ConfluenceError {
    ConfluenceError::Conversion(format!("unterminated {} starting at byte {}", what, at))
}

fn find_from(html: &str, from: usize, needle: &str) -> Option<usize> {
    html.get(from..)?.find(needle).map(|pos| from + pos)
}

/// `<` followed by a letter or `/letter` opens a tag
fn starts_tag(after: &str) -> bool {
    let mut chars = after.chars();
    match chars.next() {
        Some('/') => chars.next().is_some_and(|c| c.is_ascii_alphabetic()),
        Some(c) => c.is_ascii_alphabetic(),
        None => false,
    }
}

/// Index of the `>` closing a tag, ignoring `>` inside quoted attribute values
fn find_tag_end(bytes: &[u8], from: usize) -> Option<usize> {
    let mut quote: Option<u8> = None;
    let mut prev_significant = 0u8;

    for (offset, &b) in bytes[from..].iter().enumerate() {
        match quote {
            Some(q) if b == q => quote = None,
            Some(_) => {}
            None => match b {
                b'>' => return Some(from + offset),
                b'"' | b'\'' if prev_significant == b'=' => quote = Some(b),
                _ => {}
            },
        }
        if !b.is_ascii_whitespace() {
            prev_significant = b;
        }
    }
    None
}

/// Skip raw text up to and including `</name ...>`, or to end of input
fn skip_raw_text(html: &str, from: usize, name: &str) -> usize {
    let lower = html[from..].to_ascii_lowercase();
    let closing = format!("</{}", name);
    match lower.find(&closing) {
        Some(pos) => {
            let close_start = from + pos;
            match find_from(html, close_start, ">") {
                Some(end) => end + 1,
                None => html.len(),
            }
        }
        None => html.len(),
    }
}

fn flush_text(html: &str, start: usize, end: usize, tokens: &mut Vec<Token>) {
    if start < end {
        let text = decode_entities(&html[start..end]);
        if !text.is_empty() {
            tokens.push(Token::Text(text));
        }
    }
}

/// Parse the inside of `<...>`
fn parse_tag(raw: &str) -> Token {
    let (closing, body) = match raw.strip_prefix('/') {
        Some(rest) => (true, rest),
        None => (false, raw),
    };

    let body = body.trim_end();
    let self_closing = body.ends_with('/');
    let body = body.trim_end_matches('/');

    let name_end = body
        .find(|c: char| c.is_whitespace() || c == '/')
        .unwrap_or(body.len());
    let name = body[..name_end].to_lowercase();

    if closing {
        return Token::End { name };
    }

    Token::Start {
        name,
        attrs: parse_attributes(&body[name_end..]),
        self_closing,
    }
}

/// Parse `key="value" key='value' key=value key` sequences
fn parse_attributes(input: &str) -> Vec<(String, String)> {
    let mut attrs = Vec::new();
    let mut rest = input;

    loop {
        rest = rest.trim_start_matches(|c: char| c.is_whitespace() || c == '/');
        if rest.is_empty() {
            break;
        }

        let name_end = rest
            .find(|c: char| c.is_whitespace() || c == '=')
            .unwrap_or(rest.len());
        let name = rest[..name_end].to_lowercase();
        rest = rest[name_end..].trim_start();

        let value = if let Some(after_eq) = rest.strip_prefix('=') {
            let after_eq = after_eq.trim_start();
            if let Some(quoted) = after_eq.strip_prefix('"') {
                let end = quoted.find('"').unwrap_or(quoted.len());
                rest = quoted.get(end + 1..).unwrap_or("");
                &quoted[..end]
            } else if let Some(quoted) = after_eq.strip_prefix('\'') {
                let end = quoted.find('\'').unwrap_or(quoted.len());
                rest = quoted.get(end + 1..).unwrap_or("");
                &quoted[..end]
            } else {
                let end = after_eq
                    .find(char::is_whitespace)
                    .unwrap_or(after_eq.len());
                rest = &after_eq[end..];
                &after_eq[..end]
            }
        } else {
            ""
        };

        if !name.is_empty() {
            attrs.push((name, decode_entities(value)));
        }
    }

    attrs
}

/// Decode named and numeric character references
///
/// Unknown or malformed references are kept literally.
pub(crate) fn decode_entities(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut rest = s;

    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let candidate = &rest[amp + 1..];

        let decoded = candidate
            .find(';')
            .filter(|&semi| semi > 0 && semi <= 10)
            .and_then(|semi| decode_entity(&candidate[..semi]).map(|c| (c, semi)));

        match decoded {
            Some((c, semi)) => {
                out.push(c);
                rest = &candidate[semi + 1..];
            }
            None => {
                out.push('&');
                rest = candidate;
            }
        }
    }

    out.push_str(rest);
    out
}

fn decode_entity(entity: &str) -> Option<char> {
    let c = match entity {
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        "apos" | "#39" => '\'',
        "nbsp" => ' ',
        "mdash" => '—',
        "ndash" => '–',
        "hellip" => '…',
        "lsquo" => '‘',
        "rsquo" => '’',
        "ldquo" => '“',
        "rdquo" => '”',
        "bull" => '•',
        "middot" => '·',
        "copy" => '©',
        "reg" => '®',
        "trade" => '™',
        "euro" => '€',
        "times" => '×',
        _ => {
            let num = entity.strip_prefix('#')?;
            let code = match num.strip_prefix('x').or_else(|| num.strip_prefix('X')) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => num.parse::<u32>().ok()?,
            };
            return char::from_u32(code);
        }
    };
    Some(c)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn start(name: &str) -> Token {
        Token::Start {
            name: name.to_string(),
            attrs: Vec::new(),
            self_closing: false,
        }
    }

    fn end(name: &str) -> Token {
        Token::End {
            name: name.to_string(),
        }
    }

    #[test]
    fn test_simple_tags() {
        let tokens = tokenize("<P>Hello</P>").unwrap();
        assert_eq!(
            tokens,
            vec![start("p"), Token::Text("Hello".to_string()), end("p")]
        );
    }

    #[test]
    fn test_attributes() {
        let tokens =
            tokenize(r#"<ac:structured-macro ac:name="code" data-x='1 > 0' flag checked=yes>"#)
                .unwrap();
        assert_eq!(
            tokens,
            vec![Token::Start {
                name: "ac:structured-macro".to_string(),
                attrs: vec![
                    ("ac:name".to_string(), "code".to_string()),
                    ("data-x".to_string(), "1 > 0".to_string()),
                    ("flag".to_string(), String::new()),
                    ("checked".to_string(), "yes".to_string()),
                ],
                self_closing: false,
            }]
        );
    }

    #[test]
    fn test_self_closing() {
        let tokens = tokenize(r#"<ri:page ri:content-title="Home" />"#).unwrap();
        assert_eq!(
            tokens,
            vec![Token::Start {
                name: "ri:page".to_string(),
                attrs: vec![("ri:content-title".to_string(), "Home".to_string())],
                self_closing: true,
            }]
        );
    }

    #[test]
    fn test_cdata_is_verbatim() {
        let tokens = tokenize("<x><![CDATA[if a < b && c > d { }]]></x>").unwrap();
        assert_eq!(
            tokens,
            vec![
                start("x"),
                Token::CData("if a < b && c > d { }".to_string()),
                end("x")
            ]
        );
    }

    #[test]
    fn test_comments_and_doctype_are_dropped() {
        let tokens = tokenize("<!DOCTYPE html><!-- note --><p>x</p>").unwrap();
        assert_eq!(
            tokens,
            vec![start("p"), Token::Text("x".to_string()), end("p")]
        );
    }

    #[test]
    fn test_script_content_is_skipped() {
        let tokens = tokenize("<script>if (a < b) { alert('<p>') }</SCRIPT>after").unwrap();
        assert_eq!(
            tokens,
            vec![
                start("script"),
                end("script"),
                Token::Text("after".to_string())
            ]
        );
    }

    #[test]
    fn test_literal_less_than() {
        let tokens = tokenize("<p>1 < 2</p>").unwrap();
        assert_eq!(
            tokens,
            vec![start("p"), Token::Text("1 < 2".to_string()), end("p")]
        );
    }

    #[test]
    fn test_unterminated_constructs_fail() {
        assert!(matches!(
            tokenize("<p>text</p><div class=\"x\""),
            Err(ConfluenceError::Conversion(_))
        ));
        assert!(matches!(
            tokenize("<p>text<!-- never closed"),
            Err(ConfluenceError::Conversion(_))
        ));
        assert!(matches!(
            tokenize("<![CDATA[ never closed"),
            Err(ConfluenceError::Conversion(_))
        ));
    }

    #[test]
    fn test_decode_entities() {
        assert_eq!(
            decode_entities("Tom &amp; Jerry &lt;3 &#65;&#x42; &nbsp;&mdash;"),
            "Tom & Jerry <3 AB  —"
        );
        assert_eq!(decode_entities("AT&T and &unknown; &"), "AT&T and &unknown; &");
    }
}
