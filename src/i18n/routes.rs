use tracing::debug;

use crate::core::route::first_segment;
use crate::models::config::I18nConfig;
use crate::models::{ContentFile, LocaleRoute};

/// 为路由加上语言前缀，`/` 变为 `/<locale>`
pub fn generate_locale_route(route: &str, locale: &str) -> String {
    let trimmed = route.trim_matches('/');
    if trimmed.is_empty() {
        format!("/{}", locale)
    } else {
        format!("/{}/{}", locale, trimmed)
    }
}

/// 语言路由展开器
#[derive(Debug, Clone)]
pub struct LocaleExpander {
    locales: Vec<String>,
    default_locale: String,
    prefix_default_locale: bool,
}

impl LocaleExpander {
    pub fn new(locales: Vec<String>, default_locale: impl Into<String>, prefix_default_locale: bool) -> Self {
        Self {
            locales,
            default_locale: default_locale.into(),
            prefix_default_locale,
        }
    }

    pub fn from_config(config: &I18nConfig) -> Self {
        Self::new(
            config.locale_codes(),
            config.default_locale.clone(),
            config.prefix_default_locale,
        )
    }

    pub fn default_locale(&self) -> &str {
        &self.default_locale
    }

    /// 路由第一个路径段是否为已知语言
    pub fn locale_of_route<'a>(&self, route: &'a str) -> Option<&'a str> {
        first_segment(route).filter(|seg| self.locales.iter().any(|l| l == seg))
    }

    pub fn is_locale_prefixed(&self, route: &str) -> bool {
        self.locale_of_route(route).is_some()
    }

    /// 计算所有需要额外生成的语言路由
    ///
    /// 已带语言前缀的页面保持不变；每个页面对除自身语言外的每个语言展开一次，
    /// 不为默认语言加前缀时跳过默认语言。
    pub fn expand(&self, files: &[ContentFile]) -> Vec<LocaleRoute> {
        let mut routes = Vec::new();

        for file in files {
            if self.is_locale_prefixed(&file.route) {
                continue;
            }
            let own = file.locale.as_deref().unwrap_or(&self.default_locale);

            for locale in &self.locales {
                if locale == own {
                    continue;
                }
                if locale == &self.default_locale && !self.prefix_default_locale {
                    continue;
                }
                routes.push(LocaleRoute {
                    base_route: file.route.clone(),
                    locale: locale.clone(),
                    expanded_route: generate_locale_route(&file.route, locale),
                });
            }
        }

        debug!("展开了 {} 个语言路由", routes.len());
        routes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn file(route: &str, locale: Option<&str>) -> ContentFile {
        ContentFile {
            source_path: PathBuf::from("x.md"),
            route: route.to_string(),
            raw_body: String::new(),
            frontmatter: Default::default(),
            transformed_body: String::new(),
            rendered_html: String::new(),
            toc_items: Vec::new(),
            locale: locale.map(str::to_string),
            last_modified: None,
        }
    }

    fn expander(prefix_default: bool) -> LocaleExpander {
        LocaleExpander::new(
            vec!["en".to_string(), "fr".to_string(), "es".to_string()],
            "en",
            prefix_default,
        )
    }

    #[test]
    fn test_generate_locale_route() {
        assert_eq!(generate_locale_route("/", "fr"), "/fr");
        assert_eq!(generate_locale_route("/about", "es"), "/es/about");
    }

    #[test]
    fn test_prefixed_routes_are_recognized() {
        let e = expander(false);
        assert!(e.is_locale_prefixed("/fr/contact"));
        assert!(e.is_locale_prefixed("/fr"));
        assert!(!e.is_locale_prefixed("/french/contact"));
        assert!(!e.is_locale_prefixed("/"));
    }

    #[test]
    fn test_expand_skips_default_and_prefixed() {
        let files = vec![file("/", Some("en")), file("/about", Some("en")), file("/fr/contact", Some("fr"))];
        let routes: Vec<String> = expander(false)
            .expand(&files)
            .into_iter()
            .map(|r| r.expanded_route)
            .collect();
        assert_eq!(routes, vec!["/fr", "/es", "/fr/about", "/es/about"]);
    }

    #[test]
    fn test_expand_with_default_prefix() {
        let files = vec![file("/guide", Some("fr"))];
        let routes = expander(true).expand(&files);
        let expanded: Vec<&str> = routes.iter().map(|r| r.expanded_route.as_str()).collect();
        assert_eq!(expanded, vec!["/en/guide", "/es/guide"]);
        assert_eq!(routes[0].base_route, "/guide");
        assert_eq!(routes[0].locale, "en");
    }
}
