//! 单个内容文件的处理流水线

use chrono::{DateTime, Utc};
use gray_matter::engine::YAML;
use gray_matter::{Matter, Pod};
use serde_yaml::{Mapping, Value};
use std::path::Path;
use tracing::debug;

use crate::core::error::EngineError;
use crate::core::route::derive_route;
use crate::i18n::{effective_locale, LocaleExpander};
use crate::models::config::MarkdownConfig;
use crate::models::{ContentFile, FrontMatter, LocaleRoute};
use crate::plugins::{PageContext, PluginManager};
use crate::utils::markdown;
use crate::utils::toc::extract_toc;

/// 内容处理器：读取 -> 拆分前置元数据 -> 插件转换 -> Markdown -> 路由 -> 目录
pub struct ContentProcessor<'a> {
    plugins: &'a PluginManager,
    markdown: &'a MarkdownConfig,
    locales: Option<&'a LocaleExpander>,
}

impl<'a> ContentProcessor<'a> {
    pub fn new(plugins: &'a PluginManager, markdown: &'a MarkdownConfig, locales: Option<&'a LocaleExpander>) -> Self {
        Self {
            plugins,
            markdown,
            locales,
        }
    }

    /// 处理一个源文件
    pub async fn process(&self, file_path: &Path, root_dir: &Path) -> Result<ContentFile, EngineError> {
        self.process_inner(file_path, root_dir, None).await
    }

    /// 以指定语言重新处理源文件，生成展开后的语言页面
    pub async fn process_localized(
        &self,
        file_path: &Path,
        root_dir: &Path,
        target: &LocaleRoute,
    ) -> Result<ContentFile, EngineError> {
        self.process_inner(file_path, root_dir, Some(target)).await
    }

    async fn process_inner(
        &self,
        file_path: &Path,
        root_dir: &Path,
        target: Option<&LocaleRoute>,
    ) -> Result<ContentFile, EngineError> {
        let raw = tokio::fs::read_to_string(file_path)
            .await
            .map_err(|source| EngineError::FileRead {
                path: file_path.to_path_buf(),
                source,
            })?;

        let (frontmatter, body) = split_front_matter(&raw);

        let route = match target {
            Some(t) => t.expanded_route.clone(),
            None => derive_route(file_path, root_dir, &self.markdown.extensions),
        };

        let locale = match (target, self.locales) {
            (Some(t), _) => Some(t.locale.clone()),
            (None, Some(expander)) => Some(effective_locale(&frontmatter, &route, expander)),
            (None, None) => frontmatter.get("locale").and_then(|v| v.as_str()).map(str::to_string),
        };

        let context = PageContext {
            source_path: file_path.to_path_buf(),
            route: route.clone(),
            frontmatter: frontmatter.clone(),
            locale: locale.clone(),
        };
        let transformed_body = self.plugins.execute_transform(body.clone(), &context).await;

        let rendered_html = markdown::render(&transformed_body);
        let toc_items = extract_toc(&rendered_html, self.markdown.toc_min_level, self.markdown.toc_max_level);

        let last_modified = tokio::fs::metadata(file_path)
            .await
            .ok()
            .and_then(|m| m.modified().ok())
            .map(DateTime::<Utc>::from);

        debug!("处理完成: {} -> {}", file_path.display(), route);

        Ok(ContentFile {
            source_path: file_path.to_path_buf(),
            route,
            raw_body: body,
            frontmatter,
            transformed_body,
            rendered_html,
            toc_items,
            locale,
            last_modified,
        })
    }
}

/// 拆分 `---` 包围的 YAML 前置元数据和正文
pub fn split_front_matter(raw: &str) -> (FrontMatter, String) {
    let matter = Matter::<YAML>::new();
    let parsed = matter.parse(raw);

    let mut frontmatter = FrontMatter::new();
    match parsed.data {
        Some(Pod::Hash(map)) => {
            for (key, value) in map {
                frontmatter.insert(key, pod_to_value(value));
            }
        }
        // 不超过分隔符长度的输入会被解析成空正文
        None if !raw.starts_with("---") => return (frontmatter, raw.to_string()),
        _ => {}
    }
    (frontmatter, parsed.content)
}

fn pod_to_value(pod: Pod) -> Value {
    match pod {
        Pod::String(s) => Value::String(s),
        Pod::Integer(i) => Value::Number(serde_yaml::Number::from(i)),
        Pod::Float(f) => Value::Number(serde_yaml::Number::from(f)),
        Pod::Boolean(b) => Value::Bool(b),
        Pod::Array(arr) => Value::Sequence(arr.into_iter().map(pod_to_value).collect()),
        Pod::Hash(map) => {
            let mut mapping = Mapping::new();
            for (k, v) in map {
                mapping.insert(Value::String(k), pod_to_value(v));
            }
            Value::Mapping(mapping)
        }
        Pod::Null => Value::Null,
    }
}
