/// Plain-text rendition of an HTML body.
///
/// Line breaks are kept for `<br>`, `</p>`, `</div>`, `</li>`, `</tr>` and
/// headings; `<style>` and `<script>` contents are dropped; the common
/// entities are decoded. Template expressions pass through untouched.
pub fn html_to_text(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut rest = html;
    let mut skip_until: Option<&'static str> = None;

    while let Some(start) = rest.find('<') {
        if skip_until.is_none() {
            out.push_str(&rest[..start]);
        }

        let Some(end) = rest[start..].find('>') else {
            // Unterminated tag, keep the remainder as text
            rest = &rest[start..];
            break;
        };

        let tag = rest[start + 1..start + end].trim().to_ascii_lowercase();
        let name = tag
            .trim_start_matches('/')
            .split(|c: char| c.is_whitespace() || c == '/')
            .next()
            .unwrap_or("");
        let closing = tag.starts_with('/');

        match skip_until {
            Some(until) if closing && name == until => skip_until = None,
            Some(_) => {}
            None => match name {
                "style" if !closing => skip_until = Some("style"),
                "script" if !closing => skip_until = Some("script"),
                "br" => out.push('\n'),
                "p" | "div" | "li" | "tr" | "h1" | "h2" | "h3" | "h4" | "h5" | "h6"
                    if closing =>
                {
                    out.push('\n')
                }
                _ => {}
            },
        }

        rest = &rest[start + end + 1..];
    }

    if skip_until.is_none() {
        out.push_str(rest);
    }

    let decoded = decode_entities(&out);

    let mut lines: Vec<&str> = Vec::new();
    for line in decoded.lines().map(str::trim) {
        if line.is_empty() && lines.last().map_or(true, |last| last.is_empty()) {
            continue;
        }
        lines.push(line);
    }
    while lines.last().is_some_and(|last| last.is_empty()) {
        lines.pop();
    }

    lines.join("\n")
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}
