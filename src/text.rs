//! Chapter content cleanup: strip structural wrapper tags, convert paragraph
//! tags to line breaks, normalize blank lines, and apply the paragraph indent.
//!
//! Content arrives from the APIs as HTML-tagged text (`<article>`, `<p idx="3">`,
//! sometimes `<header>`/`<footer>` furniture around the body).

/// Paragraph indent applied to every non-blank line of cleaned content.
pub const DEFAULT_INDENT: &str = "    ";

/// Remove `<name ...>...</name>` spans including their content. Only removes a
/// span when the closing tag is present; an unclosed open tag is left for the
/// generic tag strip.
fn strip_block(s: &str, name: &str) -> String {
    let open = format!("<{}", name);
    let close = format!("</{}>", name);
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    loop {
        match rest.find(open.as_str()) {
            Some(start) => {
                // Require a real tag boundary after the name ('>' or whitespace/attr).
                let after = rest[start + open.len()..].chars().next();
                let is_tag = matches!(after, Some('>') | Some(' ') | Some('\t') | Some('\n'));
                if !is_tag {
                    let cut = start + open.len();
                    out.push_str(&rest[..cut]);
                    rest = &rest[cut..];
                    continue;
                }
                match rest[start..].find(close.as_str()) {
                    Some(rel_end) => {
                        out.push_str(&rest[..start]);
                        rest = &rest[start + rel_end + close.len()..];
                    }
                    None => {
                        out.push_str(rest);
                        return out;
                    }
                }
            }
            None => {
                out.push_str(rest);
                return out;
            }
        }
    }
}

/// Name of the tag starting at `tag` (the text after '<'), lowercased, without
/// a leading '/'.
fn tag_name(tag: &str) -> String {
    tag.trim_start_matches('/')
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_ascii_lowercase()
}

/// Replace `<p ...>` / `</p>` with newlines and drop every other tag.
/// An unterminated '<' is kept as literal text.
fn tags_to_breaks(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(lt) = rest.find('<') {
        out.push_str(&rest[..lt]);
        match rest[lt..].find('>') {
            Some(rel_gt) => {
                let inner = &rest[lt + 1..lt + rel_gt];
                if tag_name(inner) == "p" {
                    out.push('\n');
                }
                rest = &rest[lt + rel_gt + 1..];
            }
            None => {
                out.push_str(&rest[lt..]);
                return out;
            }
        }
    }
    out.push_str(rest);
    out
}

/// Collapse runs of consecutive newlines to a single newline.
fn collapse_newlines(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut last_was_newline = false;
    for c in s.chars() {
        if c == '\n' {
            if !last_was_newline {
                out.push('\n');
            }
            last_was_newline = true;
        } else {
            out.push(c);
            last_was_newline = false;
        }
    }
    out
}

/// Full cleanup pipeline for raw chapter content. Returns an empty string when
/// nothing but markup remains.
pub fn clean_content(raw: &str, indent: &str) -> String {
    let s = strip_block(raw, "header");
    let s = strip_block(&s, "footer");
    let s = tags_to_breaks(&s);
    let s = collapse_newlines(&s);
    let s = s.trim();

    let mut lines = Vec::new();
    for line in s.split('\n') {
        if line.trim().is_empty() {
            lines.push(line.to_string());
        } else {
            lines.push(format!("{}{}", indent, line));
        }
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_header_and_footer_with_content() {
        let raw = "<header>站内公告</header><article><p idx=\"0\">正文第一段</p></article><footer>广告</footer>";
        let out = clean_content(raw, DEFAULT_INDENT);
        assert_eq!(out, "    正文第一段");
    }

    #[test]
    fn paragraph_tags_become_line_breaks() {
        let raw = "<p idx=\"0\">第一段</p><p idx=\"1\">第二段</p>";
        let out = clean_content(raw, DEFAULT_INDENT);
        assert_eq!(out, "    第一段\n    第二段");
    }

    #[test]
    fn article_and_unknown_tags_are_dropped() {
        let raw = "<article><p>一</p><span class=\"x\">二</span><br/></article>";
        let out = clean_content(raw, DEFAULT_INDENT);
        assert_eq!(out, "    一\n    二");
    }

    #[test]
    fn newline_runs_collapse_to_one() {
        let raw = "<p>一</p>\n\n\n<p>二</p>";
        let out = clean_content(raw, DEFAULT_INDENT);
        assert_eq!(out, "    一\n    二");
    }

    #[test]
    fn plain_text_is_indented_as_one_paragraph() {
        assert_eq!(clean_content("没有标签的正文", "  "), "  没有标签的正文");
    }

    #[test]
    fn unterminated_tag_is_kept_as_text() {
        let out = clean_content("abc<unfinished", DEFAULT_INDENT);
        assert_eq!(out, "    abc<unfinished");
    }

    #[test]
    fn header_like_word_is_not_a_block() {
        // "<headerx>" is not a <header> tag; it is stripped as a generic tag.
        let out = clean_content("<headerx>一</headerx>", DEFAULT_INDENT);
        assert_eq!(out, "    一");
    }

    #[test]
    fn unclosed_header_falls_through_to_tag_strip() {
        let out = clean_content("<header>残留文本", DEFAULT_INDENT);
        assert_eq!(out, "    残留文本");
    }

    #[test]
    fn empty_and_markup_only_content_cleans_to_empty() {
        assert_eq!(clean_content("", DEFAULT_INDENT), "");
        assert_eq!(clean_content("<article></article>", DEFAULT_INDENT), "");
    }

    #[test]
    fn custom_indent_is_applied() {
        let out = clean_content("<p>一</p><p>二</p>", "\u{3000}");
        assert_eq!(out, "\u{3000}一\n\u{3000}二");
    }

    #[test]
    fn uppercase_paragraph_tag_also_breaks() {
        let out = clean_content("<P>一</P><P>二</P>", DEFAULT_INDENT);
        assert_eq!(out, "    一\n    二");
    }
}
