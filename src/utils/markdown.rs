use pulldown_cmark::{html, CowStr, Event, Options, Parser, Tag, TagEnd};
use std::collections::HashSet;

use crate::utils::slugify;

/// 将Markdown渲染为HTML
///
/// 所有标题都会带上 `id`：显式的 `{#id}` 优先，其余由标题文本生成别名，
/// 重复的别名追加 `-1`、`-2` 后缀。
pub fn render(markdown: &str) -> String {
    // 创建Markdown解析选项
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_FOOTNOTES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);
    options.insert(Options::ENABLE_HEADING_ATTRIBUTES);

    let mut events: Vec<Event<'_>> = Parser::new_ext(markdown, options).collect();
    assign_heading_ids(&mut events);

    // 将解析结果渲染为HTML
    let mut html_output = String::with_capacity(markdown.len() * 3 / 2);
    html::push_html(&mut html_output, events.into_iter());
    html_output
}

fn assign_heading_ids(events: &mut [Event<'_>]) {
    let mut used: HashSet<String> = HashSet::new();

    // 先登记显式 id，避免自动生成的别名与之冲突
    for event in events.iter() {
        if let Event::Start(Tag::Heading { id: Some(id), .. }) = event {
            used.insert(id.to_string());
        }
    }

    for index in 0..events.len() {
        let needs_id = matches!(&events[index], Event::Start(Tag::Heading { id: None, .. }));
        if !needs_id {
            continue;
        }

        let text = heading_text(&events[index + 1..]);
        let mut base = slugify(&text);
        if base.is_empty() {
            base = "section".to_string();
        }
        let mut candidate = base.clone();
        let mut suffix = 1;
        while used.contains(&candidate) {
            candidate = format!("{}-{}", base, suffix);
            suffix += 1;
        }
        used.insert(candidate.clone());

        if let Event::Start(Tag::Heading { id, .. }) = &mut events[index] {
            *id = Some(CowStr::from(candidate));
        }
    }
}

/// 收集标题内的纯文本，直到标题结束
fn heading_text(events: &[Event<'_>]) -> String {
    let mut text = String::new();
    for event in events {
        match event {
            Event::End(TagEnd::Heading(_)) => break,
            Event::Text(t) | Event::Code(t) => text.push_str(t),
            _ => {}
        }
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heading_ids_generated() {
        let html = render("# Hello World\n\n## Getting Started\n");
        assert!(html.contains("<h1 id=\"hello-world\">Hello World</h1>"));
        assert!(html.contains("<h2 id=\"getting-started\">Getting Started</h2>"));
    }

    #[test]
    fn test_explicit_and_duplicate_ids() {
        let html = render("# Intro {#custom}\n\n## Setup\n\n## Setup\n\n## custom\n");
        assert!(html.contains("id=\"custom\""));
        assert!(html.contains("id=\"setup\""));
        assert!(html.contains("id=\"setup-1\""));
        assert!(html.contains("id=\"custom-1\""));
    }

    #[test]
    fn test_tables_enabled() {
        let html = render("| a | b |\n|---|---|\n| 1 | 2 |\n");
        assert!(html.contains("<table>"));
    }
}
