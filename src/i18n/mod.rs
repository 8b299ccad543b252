//! 多语言支持：翻译标记替换与语言路由展开

mod routes;
mod translator;

pub use routes::{generate_locale_route, LocaleExpander};
pub use translator::Translator;

use crate::models::FrontMatter;

/// 计算页面的有效语言
///
/// 前置元数据中的 `locale` 优先；其次是路由的语言前缀；最后是默认语言。
pub fn effective_locale(frontmatter: &FrontMatter, route: &str, expander: &LocaleExpander) -> String {
    if let Some(locale) = frontmatter.get("locale").and_then(|v| v.as_str()) {
        return locale.to_string();
    }
    match expander.locale_of_route(route) {
        Some(locale) => locale.to_string(),
        None => expander.default_locale().to_string(),
    }
}
