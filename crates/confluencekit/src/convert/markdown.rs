//! Markdown rendering of the element tree

use super::tree::{Element, Node};

/// Elements dropped together with their content
const DROPPED_TAGS: &[&str] = &[
    "script",
    "style",
    "head",
    "noscript",
    "template",
    "iframe",
    "svg",
    "ac:parameter",
    "ac:placeholder",
];

/// Elements rendered as a paragraph-like block
const BLOCK_TAGS: &[&str] = &[
    "p",
    "div",
    "section",
    "article",
    "main",
    "header",
    "footer",
    "nav",
    "aside",
    "figure",
    "figcaption",
    "address",
    "details",
    "summary",
    "dl",
    "dt",
    "dd",
    "body",
    "html",
    "ac:layout",
    "ac:layout-section",
    "ac:layout-cell",
    "ac:rich-text-body",
];

#[derive(Debug, Clone, Copy, Default)]
struct Context {
    list_depth: usize,
}

/// Markdown buffer with block and inline spacing rules
#[derive(Default)]
struct Output {
    buf: String,
    /// Rendering an inline fragment: leading whitespace is significant
    inline: bool,
}

impl Output {
    fn for_inline() -> Self {
        Self {
            buf: String::new(),
            inline: true,
        }
    }

    fn at_line_start(&self) -> bool {
        self.buf.ends_with('\n') || (self.buf.is_empty() && !self.inline)
    }

    /// Append text, collapsing whitespace runs
    fn text(&mut self, text: &str) {
        let collapsed = collapse_whitespace(text);
        let text = if self.at_line_start() || self.buf.ends_with(' ') {
            collapsed.trim_start()
        } else {
            collapsed.as_str()
        };
        self.buf.push_str(text);
    }

    /// Append an already rendered inline fragment
    fn fragment(&mut self, fragment: &str) {
        if self.at_line_start() {
            self.buf.push_str(fragment.trim_start());
        } else {
            self.buf.push_str(fragment);
        }
    }

    fn hard_break(&mut self) {
        self.trim_trailing_spaces();
        self.buf.push('\n');
    }

    fn trim_trailing_spaces(&mut self) {
        let len = self.buf.trim_end_matches([' ', '\t']).len();
        self.buf.truncate(len);
    }

    fn line_break(&mut self) {
        self.trim_trailing_spaces();
        if !self.buf.is_empty() && !self.buf.ends_with('\n') {
            self.buf.push('\n');
        }
    }

    fn blank_line(&mut self) {
        self.trim_trailing_spaces();
        if self.buf.is_empty() {
            return;
        }
        while !self.buf.ends_with("\n\n") {
            self.buf.push('\n');
        }
    }

    /// Block separated from its surroundings by blank lines
    fn block(&mut self, content: &str) {
        let content = content.trim();
        if content.is_empty() {
            return;
        }
        self.blank_line();
        self.buf.push_str(content);
        self.blank_line();
    }

    /// Block on its own lines without surrounding blank lines
    fn tight_block(&mut self, content: &str) {
        let content = content.trim_end();
        if content.trim().is_empty() {
            return;
        }
        self.line_break();
        self.buf.push_str(content);
        self.line_break();
    }
}

pub(crate) fn render(nodes: &[Node]) -> String {
    let mut out = Output::default();
    render_nodes(nodes, Context::default(), &mut out);
    normalize(&out.buf)
}

fn render_to_string(nodes: &[Node], ctx: Context) -> String {
    let mut out = Output::default();
    render_nodes(nodes, ctx, &mut out);
    out.buf
}

fn render_inline(nodes: &[Node], ctx: Context) -> String {
    let mut out = Output::for_inline();
    render_nodes(nodes, ctx, &mut out);
    out.buf
}

fn render_nodes(nodes: &[Node], ctx: Context, out: &mut Output) {
    for node in nodes {
        match node {
            Node::Text(text) | Node::CData(text) => out.text(text),
            Node::Element(el) => render_element(el, ctx, out),
        }
    }
}

fn render_element(el: &Element, ctx: Context, out: &mut Output) {
    let name = el.name.as_str();
    if DROPPED_TAGS.contains(&name) {
        return;
    }

    match name {
        "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
            let level = name[1..].parse::<usize>().unwrap_or(1);
            let title = single_line(&render_inline(&el.children, ctx));
            if !title.is_empty() {
                out.block(&format!("{} {}", "#".repeat(level), title));
            }
        }
        "br" => out.hard_break(),
        "hr" => out.block("---"),
        "ul" => render_list(el, false, ctx, out),
        "ol" => render_list(el, true, ctx, out),
        "li" => {
            let body = render_to_string(&el.children, ctx);
            out.block(&format!("- {}", body.trim()));
        }
        "strong" | "b" => wrap(el, "**", ctx, out),
        "em" | "i" | "cite" => wrap(el, "*", ctx, out),
        "s" | "del" | "strike" => wrap(el, "~~", ctx, out),
        "code" | "kbd" | "samp" | "tt" => render_inline_code(el, out),
        "pre" => render_pre(el, out),
        "blockquote" => {
            let body = render_to_string(&el.children, ctx);
            out.block(&quote(body.trim()));
        }
        "a" => render_anchor(el, ctx, out),
        "img" => render_img(el, out),
        "table" => render_table(el, ctx, out),
        "ac:structured-macro" | "ac:macro" => render_macro(el, ctx, out),
        "ac:link" => render_page_link(el, ctx, out),
        "ac:image" => render_attached_image(el, out),
        "ac:task-list" => render_task_list(el, ctx, out),
        "ac:emoticon" => {
            if let Some(fallback) = el.attr("ac:emoji-fallback") {
                out.text(fallback);
            }
        }
        "time" => match el.attr("datetime") {
            Some(datetime) => out.text(datetime),
            None => render_nodes(&el.children, ctx, out),
        },
        _ if BLOCK_TAGS.contains(&name) => out.block(&render_to_string(&el.children, ctx)),
        _ => render_nodes(&el.children, ctx, out),
    }
}

/// Emit a reformatted inline fragment, keeping outer whitespace as one space
fn emit_padded(out: &mut Output, inner: &str, format: impl FnOnce(&str) -> String) {
    if inner.starts_with(char::is_whitespace) {
        out.text(" ");
    }
    let rendered = format(inner.trim());
    if !rendered.is_empty() {
        out.fragment(&rendered);
    }
    if inner.ends_with(char::is_whitespace) {
        out.text(" ");
    }
}

fn wrap(el: &Element, marker: &str, ctx: Context, out: &mut Output) {
    let inner = render_inline(&el.children, ctx);
    emit_padded(out, &inner, |text| {
        if text.is_empty() {
            String::new()
        } else {
            format!("{marker}{text}{marker}")
        }
    });
}

fn render_inline_code(el: &Element, out: &mut Output) {
    let code = single_line(&text_content(&el.children));
    if code.is_empty() {
        return;
    }
    if code.contains('`') {
        out.fragment(&format!("`` {} ``", code));
    } else {
        out.fragment(&format!("`{}`", code));
    }
}

fn render_pre(el: &Element, out: &mut Output) {
    let language = el
        .child("code")
        .and_then(|code| code.attr("class"))
        .and_then(language_from_class);
    let code = text_content(&el.children);
    if code.trim().is_empty() {
        return;
    }
    out.block(&fence(&code, language));
}

fn language_from_class(class: &str) -> Option<&str> {
    class.split_whitespace().find_map(|c| {
        c.strip_prefix("language-")
            .or_else(|| c.strip_prefix("lang-"))
    })
}

fn fence(code: &str, language: Option<&str>) -> String {
    format!(
        "```{}\n{}\n```",
        language.unwrap_or_default(),
        code.trim_matches(['\n', '\r'])
    )
}

fn quote(text: &str) -> String {
    text.lines()
        .map(|line| {
            if line.trim().is_empty() {
                ">".to_string()
            } else {
                format!("> {}", line)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_anchor(el: &Element, ctx: Context, out: &mut Output) {
    let inner = render_inline(&el.children, ctx);
    match el.attr("href").map(str::trim).filter(|href| !href.is_empty()) {
        Some(href) => emit_padded(out, &inner, |label| {
            let label = single_line(label);
            let label = if label.is_empty() { href } else { &label };
            format!("[{}]({})", label, href)
        }),
        None => emit_padded(out, &inner, str::to_string),
    }
}

fn render_img(el: &Element, out: &mut Output) {
    let Some(src) = el.attr("src").map(str::trim).filter(|src| !src.is_empty()) else {
        return;
    };
    let alt = el.attr("alt").map(str::trim).unwrap_or_default();
    out.fragment(&format!("![{}]({})", alt, src));
}

fn render_list(el: &Element, ordered: bool, ctx: Context, out: &mut Output) {
    let inner_ctx = Context {
        list_depth: ctx.list_depth + 1,
    };
    let mut number = el
        .attr("start")
        .and_then(|start| start.trim().parse::<usize>().ok())
        .unwrap_or(1);
    let mut lines: Vec<String> = Vec::new();

    for child in el.child_elements() {
        if child.name == "ul" || child.name == "ol" {
            // Nested list placed directly inside the list
            let mut nested = Output::default();
            render_list(child, child.name == "ol", inner_ctx, &mut nested);
            for line in nested.buf.trim().lines() {
                lines.push(if line.is_empty() {
                    String::new()
                } else {
                    format!("  {}", line)
                });
            }
            continue;
        }

        let body = render_to_string(&child.children, inner_ctx);
        let body = body.trim();
        if body.is_empty() {
            continue;
        }

        let marker = if ordered {
            let marker = format!("{}.", number);
            number += 1;
            marker
        } else {
            "-".to_string()
        };
        push_item(&mut lines, &marker, body);
    }

    if lines.is_empty() {
        return;
    }

    let text = lines.join("\n");
    if ctx.list_depth > 0 {
        out.tight_block(&text);
    } else {
        out.block(&text);
    }
}

/// Push a list item, indenting continuation lines under the marker
fn push_item(lines: &mut Vec<String>, marker: &str, body: &str) {
    let indent = " ".repeat(marker.len() + 1);
    for (i, line) in body.lines().enumerate() {
        if i == 0 {
            lines.push(format!("{} {}", marker, line));
        } else if line.is_empty() {
            lines.push(String::new());
        } else {
            lines.push(format!("{}{}", indent, line));
        }
    }
}

fn render_table(el: &Element, ctx: Context, out: &mut Output) {
    let mut rows = Vec::new();
    collect_rows(el, ctx, &mut rows);

    let columns = rows.iter().map(Vec::len).max().unwrap_or(0);
    if columns == 0 {
        return;
    }

    let mut lines = Vec::with_capacity(rows.len() + 1);
    for (i, mut row) in rows.into_iter().enumerate() {
        row.resize(columns, String::new());
        lines.push(format!("| {} |", row.join(" | ")));
        if i == 0 {
            lines.push(format!("|{}", " --- |".repeat(columns)));
        }
    }
    out.block(&lines.join("\n"));
}

fn collect_rows(el: &Element, ctx: Context, rows: &mut Vec<Vec<String>>) {
    for child in el.child_elements() {
        match child.name.as_str() {
            "tr" => {
                let cells: Vec<String> = child
                    .child_elements()
                    .filter(|cell| cell.name == "td" || cell.name == "th")
                    .map(|cell| {
                        single_line(&render_to_string(&cell.children, ctx)).replace('|', "\\|")
                    })
                    .collect();
                if !cells.is_empty() {
                    rows.push(cells);
                }
            }
            "thead" | "tbody" | "tfoot" => collect_rows(child, ctx, rows),
            _ => {}
        }
    }
}

fn render_macro(el: &Element, ctx: Context, out: &mut Output) {
    let name = el.attr("ac:name").unwrap_or_default().to_ascii_lowercase();

    match name.as_str() {
        "code" | "noformat" => {
            let language = macro_parameter(el, "language");
            let body = el
                .child("ac:plain-text-body")
                .map(|body| text_content(&body.children))
                .unwrap_or_default();
            if !body.trim().is_empty() {
                out.block(&fence(&body, language.as_deref()));
            }
        }
        "info" | "warning" | "note" | "tip" => {
            let label = name.to_ascii_uppercase();
            let mut panel = match macro_parameter(el, "title") {
                Some(title) => format!("**{}: {}**", label, title),
                None => format!("**{}**", label),
            };
            let body = rich_text_body(el, ctx);
            if !body.is_empty() {
                panel.push_str("\n\n");
                panel.push_str(&body);
            }
            out.block(&quote(&panel));
        }
        "toc" => {}
        _ => out.block(&rich_text_body(el, ctx)),
    }
}

fn macro_parameter(el: &Element, name: &str) -> Option<String> {
    el.child_elements()
        .find(|child| child.name == "ac:parameter" && child.attr("ac:name") == Some(name))
        .map(|param| single_line(&text_content(&param.children)))
        .filter(|value| !value.is_empty())
}

fn rich_text_body(el: &Element, ctx: Context) -> String {
    el.child("ac:rich-text-body")
        .map(|body| render_to_string(&body.children, ctx).trim().to_string())
        .unwrap_or_default()
}

fn render_page_link(el: &Element, ctx: Context, out: &mut Output) {
    let (fallback, href) = if let Some(page) = el.child("ri:page") {
        let title = page.attr("ri:content-title").unwrap_or_default().trim();
        (title, (!title.is_empty()).then(|| format!("#{}", title)))
    } else if let Some(url) = el.child("ri:url") {
        let value = url.attr("ri:value").unwrap_or_default().trim();
        (value, (!value.is_empty()).then(|| value.to_string()))
    } else if let Some(attachment) = el.child("ri:attachment") {
        let filename = attachment.attr("ri:filename").unwrap_or_default().trim();
        (filename, (!filename.is_empty()).then(|| filename.to_string()))
    } else {
        ("", None)
    };

    let label = link_label(el, ctx);
    let label = if label.is_empty() { fallback } else { &label };

    match href {
        Some(href) => out.fragment(&format!("[{}]({})", label, href)),
        None => out.text(label),
    }
}

fn link_label(el: &Element, ctx: Context) -> String {
    if let Some(body) = el.child("ac:plain-text-link-body") {
        return single_line(&text_content(&body.children));
    }
    if let Some(body) = el.child("ac:link-body") {
        return single_line(&render_inline(&body.children, ctx));
    }
    String::new()
}

fn render_attached_image(el: &Element, out: &mut Output) {
    let (src, default_alt) = if let Some(attachment) = el.child("ri:attachment") {
        let filename = attachment.attr("ri:filename").unwrap_or_default().trim();
        (filename, filename)
    } else if let Some(url) = el.child("ri:url") {
        (url.attr("ri:value").unwrap_or_default().trim(), "image")
    } else {
        return;
    };

    if src.is_empty() {
        return;
    }

    let alt = el
        .attr("ac:alt")
        .map(str::trim)
        .filter(|alt| !alt.is_empty())
        .unwrap_or(default_alt);
    out.fragment(&format!("![{}]({})", alt, src));
}

fn render_task_list(el: &Element, ctx: Context, out: &mut Output) {
    let lines: Vec<String> = el
        .child_elements()
        .filter(|task| task.name == "ac:task")
        .filter_map(|task| {
            let done = task
                .child("ac:task-status")
                .is_some_and(|status| text_content(&status.children).trim() == "complete");
            let body = task
                .child("ac:task-body")
                .map(|body| single_line(&render_inline(&body.children, ctx)))
                .unwrap_or_default();
            (!body.is_empty()).then(|| format!("- [{}] {}", if done { "x" } else { " " }, body))
        })
        .collect();

    if !lines.is_empty() {
        out.block(&lines.join("\n"));
    }
}

/// Raw text of a subtree, CDATA included and `br` as newline
fn text_content(nodes: &[Node]) -> String {
    let mut text = String::new();
    collect_text(nodes, &mut text);
    text
}

fn collect_text(nodes: &[Node], text: &mut String) {
    for node in nodes {
        match node {
            Node::Text(t) | Node::CData(t) => text.push_str(t),
            Node::Element(el) if el.name == "br" => text.push('\n'),
            Node::Element(el) if !DROPPED_TAGS.contains(&el.name.as_str()) => {
                collect_text(&el.children, text)
            }
            Node::Element(_) => {}
        }
    }
}

fn collapse_whitespace(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut last_was_space = false;

    for c in text.chars() {
        if c.is_whitespace() {
            if !last_was_space {
                result.push(' ');
                last_was_space = true;
            }
        } else {
            result.push(c);
            last_was_space = false;
        }
    }

    result
}

fn single_line(text: &str) -> String {
    collapse_whitespace(text).trim().to_string()
}

/// Strip trailing whitespace per line, keep at most one blank line, trim
///
/// Lines inside fenced code blocks are kept verbatim.
fn normalize(markdown: &str) -> String {
    let mut result = String::with_capacity(markdown.len());
    let mut blank_run = 0;
    let mut in_fence = false;

    for line in markdown.lines() {
        if line.trim_start().starts_with("```") {
            in_fence = !in_fence;
        } else if in_fence {
            result.push_str(line);
            result.push('\n');
            continue;
        }

        let line = line.trim_end();
        if line.is_empty() {
            blank_run += 1;
            if blank_run > 1 {
                continue;
            }
        } else {
            blank_run = 0;
        }
        result.push_str(line);
        result.push('\n');
    }

    result.trim().to_string()
}
