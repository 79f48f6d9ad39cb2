/// Whitespace-only SVG/CSS minification, safe for the on-chain renderer.
pub fn minify_svg(text: &str) -> String {
    // collapse runs first so the later rules only see single spaces
    let mut s = String::with_capacity(text.len());
    let mut in_ws = false;
    for c in text.chars() {
        if c.is_whitespace() {
            if !in_ws {
                s.push(' ');
            }
            in_ws = true;
        } else {
            s.push(c);
            in_ws = false;
        }
    }

    let s = s
        .replace(": ", ":")
        .replace("; ", ";")
        .replace(", ", ",")
        .replace("> <", "><")
        .replace(" />", "/>")
        .replace(" {", "{")
        .replace("{ ", "{")
        .replace(" }", "}")
        .replace("} ", "}");
    s.replace("<style> ", "<style>")
}

pub fn is_svg(path: &std::path::Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("svg"))
}
