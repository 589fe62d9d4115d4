//! Storage-format to markdown conversion
//!
//! Confluence stores page bodies as XHTML with `ac:`/`ri:` extension
//! elements for macros, links and images. Conversion runs in three passes:
//! tokenize, build a lenient element tree, render markdown.

mod markdown;
mod tokenizer;
mod tree;

use crate::error::ConfluenceError;

/// Convert storage-format XHTML to normalized markdown
///
/// The output is deterministic: the same input always yields the same
/// markdown. Fails with [`ConfluenceError::Conversion`] only when a tag,
/// comment or CDATA section is opened but never closed.
pub fn html_to_markdown(html: &str) -> Result<String, ConfluenceError> {
    let tokens = tokenizer::tokenize(html)?;
    let nodes = tree::build(tokens);
    Ok(markdown::render(&nodes))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn md(html: &str) -> String {
        html_to_markdown(html).unwrap()
    }

    #[test]
    fn test_heading_and_list() {
        assert_eq!(
            md("<h1>Title</h1><ul><li>a</li><li>b</li></ul>"),
            "# Title\n\n- a\n- b"
        );
    }

    #[test]
    fn test_conversion_is_deterministic() {
        let html = r#"<h2>Setup</h2><p>Run <code>make</code> then <strong>check</strong>.</p>
            <ol><li>one</li><li>two<ul><li>nested</li></ul></li></ol>"#;
        assert_eq!(md(html), md(html));
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(md(""), "");
        assert_eq!(md("   \n  "), "");
    }

    #[test]
    fn test_paragraphs_and_emphasis() {
        assert_eq!(
            md("<p>Hello <strong>bold</strong> and <em>italic</em></p><p>Second</p>"),
            "Hello **bold** and *italic*\n\nSecond"
        );
    }

    #[test]
    fn test_whitespace_is_collapsed() {
        assert_eq!(md("<p>  lots\n   of\t space  </p>"), "lots of space");
    }

    #[test]
    fn test_emphasis_keeps_outer_spacing() {
        assert_eq!(md("<p>a<b> bold </b>word</p>"), "a **bold** word");
    }

    #[test]
    fn test_ordered_and_nested_lists() {
        assert_eq!(
            md("<ol><li>one</li><li>two<ul><li>nested</li></ul></li></ol>"),
            "1. one\n2. two\n   - nested"
        );
    }

    #[test]
    fn test_line_break_and_rule() {
        assert_eq!(md("<p>a<br/>b</p><hr/><p>c</p>"), "a\nb\n\n---\n\nc");
    }

    #[test]
    fn test_script_and_style_dropped() {
        assert_eq!(
            md("<p>Keep</p><script>var x = '<p>drop</p>';</script><style>p { color: red }</style>"),
            "Keep"
        );
    }

    #[test]
    fn test_unknown_tags_unwrapped() {
        assert_eq!(
            md("<custom-widget><span>inner text</span></custom-widget>"),
            "inner text"
        );
    }

    #[test]
    fn test_entities_decoded() {
        assert_eq!(md("<p>Fish &amp; Chips &lt;3</p>"), "Fish & Chips <3");
    }

    #[test]
    fn test_literal_less_than() {
        assert_eq!(md("<p>a < b</p>"), "a < b");
    }

    #[test]
    fn test_anchor_and_img() {
        let html =
            r#"<p>See <a href="https://example.com">the docs</a> <img src="a.png" alt="diagram"></p>"#;
        assert_eq!(
            md(html),
            "See [the docs](https://example.com) ![diagram](a.png)"
        );
        assert_eq!(
            md(r#"<a href="https://example.com"></a>"#),
            "[https://example.com](https://example.com)"
        );
    }

    #[test]
    fn test_inline_code_and_pre() {
        assert_eq!(md("<p>Run <code>cargo test</code></p>"), "Run `cargo test`");
        let html = r#"<pre><code class="language-rust">fn main() {
    println!("hi");
}</code></pre>"#;
        assert_eq!(
            md(html),
            "```rust\nfn main() {\n    println!(\"hi\");\n}\n```"
        );
    }

    #[test]
    fn test_blockquote() {
        assert_eq!(
            md("<blockquote><p>quoted</p><p>twice</p></blockquote>"),
            "> quoted\n>\n> twice"
        );
    }

    #[test]
    fn test_table() {
        let html = "<table><tbody><tr><th>Name</th><th>Value</th></tr>\
                    <tr><td>a</td><td>1 | 2</td></tr><tr><td>b</td></tr></tbody></table>";
        assert_eq!(
            md(html),
            "| Name | Value |\n| --- | --- |\n| a | 1 \\| 2 |\n| b |  |"
        );
    }

    #[test]
    fn test_code_macro() {
        let html = r#"<ac:structured-macro ac:name="code"><ac:parameter ac:name="language">python</ac:parameter><ac:plain-text-body><![CDATA[if a < b:
    print("<ok>")]]></ac:plain-text-body></ac:structured-macro>"#;
        assert_eq!(
            md(html),
            "```python\nif a < b:\n    print(\"<ok>\")\n```"
        );
    }

    #[test]
    fn test_code_macro_keeps_blank_lines() {
        let html = r#"<ac:structured-macro ac:name="code"><ac:plain-text-body><![CDATA[def a():
    pass


def b():
    pass]]></ac:plain-text-body></ac:structured-macro><p>after</p>"#;
        assert_eq!(
            md(html),
            "```\ndef a():\n    pass\n\n\ndef b():\n    pass\n```\n\nafter"
        );
    }

    #[test]
    fn test_panel_macros() {
        let html = r#"<ac:structured-macro ac:name="info"><ac:parameter ac:name="title">Heads up</ac:parameter><ac:rich-text-body><p>Read this.</p></ac:rich-text-body></ac:structured-macro>"#;
        assert_eq!(md(html), "> **INFO: Heads up**\n>\n> Read this.");

        let html = r#"<ac:structured-macro ac:name="warning"><ac:rich-text-body><p>Careful</p></ac:rich-text-body></ac:structured-macro>"#;
        assert_eq!(md(html), "> **WARNING**\n>\n> Careful");
    }

    #[test]
    fn test_toc_removed_and_other_macros_unwrapped() {
        let html = r#"<ac:structured-macro ac:name="toc"><ac:parameter ac:name="maxLevel">3</ac:parameter></ac:structured-macro>
            <ac:structured-macro ac:name="expand"><ac:parameter ac:name="title">More</ac:parameter><ac:rich-text-body><p>Hidden body</p></ac:rich-text-body></ac:structured-macro>"#;
        assert_eq!(md(html), "Hidden body");
    }

    #[test]
    fn test_page_and_url_links() {
        let html = r#"<p>See <ac:link><ri:page ri:content-title="Release Notes" /><ac:plain-text-link-body><![CDATA[the notes]]></ac:plain-text-link-body></ac:link> and <ac:link><ri:url ri:value="https://example.com" /></ac:link>.</p>"#;
        assert_eq!(
            md(html),
            "See [the notes](#Release Notes) and [https://example.com](https://example.com)."
        );

        let html = r#"<ac:link><ri:page ri:content-title="Home" /></ac:link>"#;
        assert_eq!(md(html), "[Home](#Home)");
    }

    #[test]
    fn test_confluence_images() {
        let html = r#"<ac:image><ri:attachment ri:filename="diagram.png" /></ac:image>"#;
        assert_eq!(md(html), "![diagram.png](diagram.png)");

        let html = r#"<ac:image ac:alt="Logo"><ri:url ri:value="https://example.com/logo.png" /></ac:image>"#;
        assert_eq!(md(html), "![Logo](https://example.com/logo.png)");
    }

    #[test]
    fn test_task_list() {
        let html = "<ac:task-list><ac:task><ac:task-id>1</ac:task-id><ac:task-status>complete</ac:task-status><ac:task-body>Ship it</ac:task-body></ac:task>\
                    <ac:task><ac:task-id>2</ac:task-id><ac:task-status>incomplete</ac:task-status><ac:task-body>Announce</ac:task-body></ac:task></ac:task-list>";
        assert_eq!(md(html), "- [x] Ship it\n- [ ] Announce");
    }

    #[test]
    fn test_excess_blank_lines_collapsed() {
        assert_eq!(md("<p>a</p><p></p><div></div><p>b</p>"), "a\n\nb");
    }

    #[test]
    fn test_unterminated_markup_is_an_error() {
        let err = html_to_markdown("<p>Hello <strong class=\"x\"").unwrap_err();
        assert!(matches!(err, ConfluenceError::Conversion(_)));
        assert_eq!(err.kind(), "conversion_error");
    }

    #[test]
    fn test_unclosed_elements_are_tolerated() {
        assert_eq!(md("<p>open paragraph<ul><li>item"), "open paragraph\n\n- item");
    }

    #[test]
    fn test_list_item_after_unclosed_paragraph() {
        assert_eq!(md("<ul><li><p>a<li>b</ul>"), "- a\n- b");
    }

    #[test]
    fn test_deep_nesting_on_small_stack() {
        let levels = 10_000;
        let html = format!("{}x{}", "<div>".repeat(levels), "</div>".repeat(levels));
        let result = std::thread::Builder::new()
            .stack_size(2 * 1024 * 1024)
            .spawn(move || html_to_markdown(&html))
            .unwrap()
            .join()
            .unwrap();
        assert_eq!(result.unwrap(), "x");
    }

    #[test]
    fn test_deeply_nested_lists_keep_text() {
        let levels = 5_000;
        let html = format!(
            "{}deep{}",
            "<ul><li>".repeat(levels),
            "</li></ul>".repeat(levels)
        );
        let result = std::thread::Builder::new()
            .stack_size(2 * 1024 * 1024)
            .spawn(move || html_to_markdown(&html))
            .unwrap()
            .join()
            .unwrap();
        assert!(result.unwrap().ends_with("- deep"));
    }

    #[test]
    fn test_large_flat_body() {
        let mut html = String::new();
        let mut count = 0;
        while html.len() < 1024 * 1024 {
            html.push_str(&format!("<p>paragraph {}</p>", count));
            count += 1;
        }

        let markdown = md(&html);
        let paragraphs: Vec<&str> = markdown.split("\n\n").collect();
        assert_eq!(paragraphs.len(), count);
        assert_eq!(paragraphs[0], "paragraph 0");
        assert_eq!(paragraphs[count - 1], format!("paragraph {}", count - 1));
    }
}
