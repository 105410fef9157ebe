//! String-level SVG start-tag editing.
//!
//! Engine output is well-formed markup we mostly pass through untouched; the handful of
//! presentational attributes we adjust do not justify round-tripping through a mutable XML DOM,
//! so edits are done by scanning and re-emitting start tags in place.

#[derive(Debug, Clone)]
pub(crate) struct Attr {
    pub name: String,
    /// Attribute value exactly as it appeared in the source, quotes stripped, escapes kept.
    pub value: String,
    quote: char,
}

impl Attr {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            quote: '"',
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct StartTag {
    pub name: String,
    pub attrs: Vec<Attr>,
    pub self_closing: bool,
}

impl StartTag {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|attr| attr.name == name)
            .map(|attr| attr.value.as_str())
    }

    /// Adds the attribute if absent, otherwise replaces its value.
    pub fn set_attr(&mut self, name: &str, value: &str) {
        match self.attrs.iter_mut().find(|attr| attr.name == name) {
            Some(attr) => {
                attr.value = value.to_string();
                attr.quote = '"';
            }
            None => self.attrs.push(Attr::new(name, value)),
        }
    }

    pub fn remove_attr(&mut self, name: &str) -> Option<String> {
        let idx = self.attrs.iter().position(|attr| attr.name == name)?;
        Some(self.attrs.remove(idx).value)
    }
}

/// Returns the end index (exclusive) of the tag that starts at `start`, honoring quoted
/// attribute values. `None` when the tag never closes.
fn tag_end(svg: &str, start: usize) -> Option<usize> {
    let bytes = svg.as_bytes();
    let mut quote: Option<u8> = None;
    for (i, &b) in bytes.iter().enumerate().skip(start) {
        match quote {
            Some(q) => {
                if b == q {
                    quote = None;
                }
            }
            None => match b {
                b'"' | b'\'' => quote = Some(b),
                b'>' => return Some(i + 1),
                _ => {}
            },
        }
    }
    None
}

fn is_name_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'-' || b == b'_' || b == b':' || b == b'.'
}

/// Parses `<name attr="value" ...>` / `<name ... />`. Returns `None` for anything that is not a
/// plain start tag (closing tags, comments, processing instructions).
pub(crate) fn parse_start_tag(tag: &str) -> Option<StartTag> {
    let bytes = tag.as_bytes();
    if bytes.first() != Some(&b'<') || bytes.last() != Some(&b'>') {
        return None;
    }
    let mut i = 1;
    if matches!(bytes.get(i), Some(b'/' | b'!' | b'?')) {
        return None;
    }

    let name_start = i;
    while i < bytes.len() && is_name_byte(bytes[i]) {
        i += 1;
    }
    if i == name_start {
        return None;
    }
    let name = tag[name_start..i].to_string();

    let mut attrs = Vec::new();
    let mut self_closing = false;
    loop {
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        match bytes.get(i) {
            None => return None,
            Some(b'>') => break,
            Some(b'/') => {
                self_closing = true;
                i += 1;
            }
            Some(_) => {
                let attr_start = i;
                while i < bytes.len() && is_name_byte(bytes[i]) {
                    i += 1;
                }
                if i == attr_start {
                    return None;
                }
                let attr_name = tag[attr_start..i].to_string();
                while i < bytes.len() && bytes[i].is_ascii_whitespace() {
                    i += 1;
                }
                if bytes.get(i) != Some(&b'=') {
                    // Bare attribute; keep it with an empty value.
                    attrs.push(Attr::new(attr_name, ""));
                    continue;
                }
                i += 1;
                while i < bytes.len() && bytes[i].is_ascii_whitespace() {
                    i += 1;
                }
                match bytes.get(i) {
                    Some(&q @ (b'"' | b'\'')) => {
                        i += 1;
                        let value_start = i;
                        while i < bytes.len() && bytes[i] != q {
                            i += 1;
                        }
                        if i >= bytes.len() {
                            return None;
                        }
                        attrs.push(Attr {
                            name: attr_name,
                            value: tag[value_start..i].to_string(),
                            quote: q as char,
                        });
                        i += 1;
                    }
                    _ => {
                        // Unquoted value; read up to whitespace or tag end.
                        let value_start = i;
                        while i < bytes.len()
                            && !bytes[i].is_ascii_whitespace()
                            && bytes[i] != b'>'
                            && bytes[i] != b'/'
                        {
                            i += 1;
                        }
                        attrs.push(Attr::new(attr_name, &tag[value_start..i]));
                    }
                }
            }
        }
    }

    Some(StartTag {
        name,
        attrs,
        self_closing,
    })
}

pub(crate) fn emit_start_tag(tag: &StartTag) -> String {
    let mut out = String::with_capacity(64);
    out.push('<');
    out.push_str(&tag.name);
    for attr in &tag.attrs {
        out.push(' ');
        out.push_str(&attr.name);
        out.push('=');
        out.push(attr.quote);
        out.push_str(&attr.value);
        out.push(attr.quote);
    }
    if tag.self_closing {
        out.push_str("/>");
    } else {
        out.push('>');
    }
    out
}

/// Positions of the next `<{element}` occurrence that is a real tag boundary.
fn find_element_start(svg: &str, element: &str, from: usize) -> Option<usize> {
    let mut i = from;
    while let Some(rel) = svg[i..].find('<') {
        let start = i + rel;
        let rest = &svg[start + 1..];
        if rest.starts_with(element) {
            let after = rest.as_bytes().get(element.len()).copied();
            if matches!(after, None | Some(b' ' | b'\t' | b'\n' | b'\r' | b'>' | b'/')) {
                return Some(start);
            }
        }
        i = start + 1;
    }
    None
}

/// Rewrites every `<{element} ...>` start tag through `edit`; everything else passes through
/// byte-for-byte.
pub(crate) fn rewrite_start_tags(
    svg: &str,
    element: &str,
    mut edit: impl FnMut(&mut StartTag),
) -> String {
    rewrite_tags_impl(svg, element, false, &mut edit)
}

/// Rewrites only the first matching start tag (the document root, typically).
pub(crate) fn rewrite_first_start_tag(
    svg: &str,
    element: &str,
    mut edit: impl FnMut(&mut StartTag),
) -> String {
    rewrite_tags_impl(svg, element, true, &mut edit)
}

fn rewrite_tags_impl(
    svg: &str,
    element: &str,
    first_only: bool,
    edit: &mut dyn FnMut(&mut StartTag),
) -> String {
    let mut out = String::with_capacity(svg.len() + 64);
    let mut i = 0;
    while let Some(start) = find_element_start(svg, element, i) {
        let Some(end) = tag_end(svg, start) else {
            break;
        };
        match parse_start_tag(&svg[start..end]) {
            Some(mut tag) => {
                out.push_str(&svg[i..start]);
                edit(&mut tag);
                out.push_str(&emit_start_tag(&tag));
            }
            None => out.push_str(&svg[i..end]),
        }
        i = end;
        if first_only {
            break;
        }
    }
    out.push_str(&svg[i..]);
    out
}
