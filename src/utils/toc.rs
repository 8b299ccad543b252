use regex::Regex;
use std::sync::OnceLock;

use crate::models::TocItem;

fn heading_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // regex 不支持反向引用，闭合标签的层级在匹配后校验
    RE.get_or_init(|| {
        Regex::new(r"(?is)<h([1-6])\b([^>]*)>(.*?)</h([1-6])\s*>").expect("heading regex is valid")
    })
}

fn id_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?i)(?:^|\s)id\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'>]+))"#).expect("id regex is valid")
    })
}

fn tag_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<[^>]*>").expect("tag regex is valid"))
}

/// 从渲染后的 HTML 中按文档顺序提取带 `id` 的标题
///
/// 只适用于本工具自己生成的 HTML；没有 `id` 属性的标题会被跳过。
pub fn extract_toc(html: &str, min_level: u8, max_level: u8) -> Vec<TocItem> {
    let mut items = Vec::new();

    for caps in heading_regex().captures_iter(html) {
        if caps[1] != caps[4] {
            continue;
        }
        let level: u8 = match caps[1].parse() {
            Ok(level) => level,
            Err(_) => continue,
        };
        if level < min_level || level > max_level {
            continue;
        }

        let id = match id_regex().captures(&caps[2]) {
            Some(id_caps) => id_caps
                .get(1)
                .or_else(|| id_caps.get(2))
                .or_else(|| id_caps.get(3))
                .map(|m| decode_entities(m.as_str()))
                .unwrap_or_default(),
            None => continue,
        };
        if id.is_empty() {
            continue;
        }

        let text = decode_entities(tag_regex().replace_all(&caps[3], "").trim());
        items.push(TocItem { level, id, text });
    }

    items
}

fn decode_entities(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_in_document_order() {
        let toc = extract_toc("<h1 id=\"a\">A</h1><h2 id=\"b\">B</h2>", 1, 6);
        assert_eq!(
            toc,
            vec![
                TocItem { level: 1, id: "a".into(), text: "A".into() },
                TocItem { level: 2, id: "b".into(), text: "B".into() },
            ]
        );
    }

    #[test]
    fn test_strips_markup_and_decodes() {
        let toc = extract_toc(
            "<h2 class=\"x\" id='api'>The <code>run</code> &amp; <em>stop</em> API</h2>",
            1,
            6,
        );
        assert_eq!(toc.len(), 1);
        assert_eq!(toc[0].id, "api");
        assert_eq!(toc[0].text, "The run & stop API");
    }

    #[test]
    fn test_skips_headings_without_id_and_out_of_range() {
        let html = "<h1>No id</h1><h2 id=\"keep\">Keep</h2><h4 id=\"deep\">Deep</h4>";
        let toc = extract_toc(html, 2, 3);
        assert_eq!(toc.len(), 1);
        assert_eq!(toc[0].id, "keep");
    }

    #[test]
    fn test_data_id_attribute_ignored() {
        let toc = extract_toc("<h2 data-id=\"nope\">X</h2>", 1, 6);
        assert!(toc.is_empty());
    }
}
