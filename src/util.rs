//! Text decoding, XML name and path helpers shared by the format readers.

use std::borrow::Cow;

use percent_encoding::percent_decode_str;
use quick_xml::events::BytesStart;

/// Decode bytes to a string, handling various encodings.
///
/// This function:
/// 1. Honours a byte order mark (UTF-8 or UTF-16, seen in `container.xml`)
/// 2. Tries UTF-8
/// 3. If malformed, tries the hint encoding (from `<?xml encoding="..."?>`)
/// 4. Falls back to Windows-1252 (common in old ebooks)
///
/// Uses `Cow<str>` to avoid allocation when the input is valid UTF-8.
pub fn decode_text<'a>(bytes: &'a [u8], hint_encoding: Option<&str>) -> Cow<'a, str> {
    if let Some((encoding, bom_len)) = encoding_rs::Encoding::for_bom(bytes) {
        let (result, _) = encoding.decode_without_bom_handling(&bytes[bom_len..]);
        return result;
    }

    let (result, _encoding, malformed) = encoding_rs::UTF_8.decode(bytes);
    if !malformed {
        return result;
    }

    if let Some(name) = hint_encoding
        && let Some(encoding) = encoding_rs::Encoding::for_label(name.as_bytes())
    {
        let (result, _, _) = encoding.decode(bytes);
        return result;
    }

    let (result, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
    result
}

/// Decode an XML entry, using its declaration as encoding hint.
pub fn decode_xml(bytes: &[u8]) -> Cow<'_, str> {
    decode_text(bytes, extract_xml_encoding(bytes))
}

/// Extract the encoding name from an XML declaration, if any.
pub fn extract_xml_encoding(bytes: &[u8]) -> Option<&str> {
    // Only check the first 100 bytes for the XML declaration
    let prefix = &bytes[..bytes.len().min(100)];

    let xml_start = memchr::memmem::find(prefix, b"<?xml")?;
    let after_xml = &prefix[xml_start..];

    let enc_pos = after_xml
        .windows(9)
        .position(|w| w.eq_ignore_ascii_case(b"encoding="))?;
    let after_enc = &after_xml[enc_pos + 9..];

    let quote = *after_enc.first()?;
    if quote != b'"' && quote != b'\'' {
        return None;
    }
    let value_end = after_enc[1..].iter().position(|&b| b == quote)? + 1;

    std::str::from_utf8(&after_enc[1..value_end]).ok()
}

/// Extract local name from namespaced XML name (e.g., "dc:title" -> "title").
pub fn local_name(name: &[u8]) -> &[u8] {
    name.iter()
        .rposition(|&b| b == b':')
        .map(|i| &name[i + 1..])
        .unwrap_or(name)
}

/// Resolve an entity reference name (without `&` and `;`).
///
/// XML built-ins and numeric references first, then the HTML5 named set,
/// which XHTML navigation documents use freely (`&nbsp;`, `&eacute;`).
pub fn resolve_entity(entity: &str) -> Option<String> {
    match entity {
        "apos" => return Some("'".to_string()),
        "quot" => return Some("\"".to_string()),
        "lt" => return Some("<".to_string()),
        "gt" => return Some(">".to_string()),
        "amp" => return Some("&".to_string()),
        _ => {}
    }

    if let Some(hex) = entity
        .strip_prefix("#x")
        .or_else(|| entity.strip_prefix("#X"))
    {
        return u32::from_str_radix(hex, 16)
            .ok()
            .and_then(char::from_u32)
            .map(|c| c.to_string());
    }
    if let Some(dec) = entity.strip_prefix('#') {
        return dec
            .parse::<u32>()
            .ok()
            .and_then(char::from_u32)
            .map(|c| c.to_string());
    }

    let reference = format!("&{entity};");
    let decoded = html_escape::decode_html_entities(&reference);
    (decoded != reference).then(|| decoded.into_owned())
}

/// Unescape entity references in a raw attribute value.
///
/// Unknown references are left as written.
pub fn unescape_xml(raw: &str) -> Cow<'_, str> {
    if !raw.contains('&') {
        return Cow::Borrowed(raw);
    }

    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let after = &rest[amp + 1..];
        match after.find(';') {
            Some(semi) if semi > 0 => match resolve_entity(&after[..semi]) {
                Some(resolved) => {
                    out.push_str(&resolved);
                    rest = &after[semi + 1..];
                }
                None => {
                    out.push('&');
                    rest = after;
                }
            },
            _ => {
                out.push('&');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    Cow::Owned(out)
}

/// Unescaped value of the attribute whose local name is `name`.
pub fn attribute(e: &BytesStart<'_>, name: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|attr| local_name(attr.key.as_ref()) == name)
        .map(|attr| unescape_xml(&String::from_utf8_lossy(&attr.value)).into_owned())
}

/// Percent-decode an href. Invalid UTF-8 sequences are replaced.
pub fn percent_decode(href: &str) -> Cow<'_, str> {
    percent_decode_str(href).decode_utf8_lossy()
}

/// Normalize an archive path: `/` separators, no leading slash, `.` and
/// `..` segments resolved.
pub fn normalize_path(path: &str) -> String {
    let path = path.replace('\\', "/");
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }
    segments.join("/")
}

/// Directory part of an archive path, with a trailing slash ("" at the root).
pub fn parent_dir(path: &str) -> String {
    match path.rfind('/') {
        Some(pos) => path[..=pos].to_string(),
        None => String::new(),
    }
}

/// Resolve an href found in a document located in `base_dir`.
///
/// The href is percent-decoded before joining; absolute hrefs are taken
/// from the archive root.
pub fn resolve_href(base_dir: &str, href: &str) -> String {
    let decoded = percent_decode(href);
    if let Some(absolute) = decoded.strip_prefix('/') {
        normalize_path(absolute)
    } else {
        normalize_path(&format!("{base_dir}{decoded}"))
    }
}

/// Last segment of an archive path.
pub fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Collapse runs of whitespace into single spaces and trim.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
