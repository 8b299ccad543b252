use anyhow::{Context, Result};
use regex::{Captures, Regex};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::OnceLock;
use tracing::{debug, warn};

use crate::models::config::I18nConfig;

fn marker_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // {{t:a.b.c}} 或 {{t:a.b.c|默认文本}}
    RE.get_or_init(|| {
        Regex::new(r"\{\{\s*t:\s*([^{}|]+?)\s*(?:\|([^{}]*))?\}\}").expect("marker regex is valid")
    })
}

/// 翻译表查找器
#[derive(Debug, Clone, Default)]
pub struct Translator {
    /// 语言 -> 嵌套翻译表
    tables: BTreeMap<String, Value>,
    default_locale: String,
    fallback: bool,
}

impl Translator {
    pub fn new(default_locale: impl Into<String>, fallback: bool) -> Self {
        Self {
            tables: BTreeMap::new(),
            default_locale: default_locale.into(),
            fallback,
        }
    }

    /// 按配置加载翻译目录和内联翻译，内联值覆盖文件中的同名键
    pub fn from_config(config: &I18nConfig, base_dir: &Path) -> Result<Self> {
        let mut translator = Self::new(config.default_locale.clone(), config.fallback);

        let dir = base_dir.join(&config.translations_dir);
        if dir.is_dir() {
            let loaded = translator.load_dir(&dir)?;
            debug!("从 {} 加载了 {} 个翻译文件", dir.display(), loaded);
        }
        for (locale, table) in &config.translations {
            translator.insert_table(locale, table.clone());
        }

        for code in config.locale_codes() {
            if !translator.tables.contains_key(&code) {
                warn!("语言 {} 没有任何翻译", code);
            }
        }
        Ok(translator)
    }

    pub fn default_locale(&self) -> &str {
        &self.default_locale
    }

    /// 合并一张翻译表
    pub fn insert_table(&mut self, locale: &str, table: Value) {
        match self.tables.get_mut(locale) {
            Some(existing) => deep_merge(existing, table),
            None => {
                self.tables.insert(locale.to_string(), table);
            }
        }
    }

    /// 加载目录下的 `<locale>.json` / `<locale>.yml` / `<locale>.yaml`
    pub fn load_dir(&mut self, dir: &Path) -> Result<usize> {
        let mut entries: Vec<_> = fs::read_dir(dir)
            .with_context(|| format!("读取翻译目录失败: {}", dir.display()))?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_file())
            .collect();
        entries.sort();

        let mut loaded = 0;
        for path in entries {
            let Some(locale) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let ext = path.extension().and_then(|e| e.to_str()).unwrap_or_default();
            let content = fs::read_to_string(&path)
                .with_context(|| format!("读取翻译文件失败: {}", path.display()))?;
            let table: Value = match ext {
                "json" => serde_json::from_str(&content)
                    .with_context(|| format!("解析翻译文件失败: {}", path.display()))?,
                "yml" | "yaml" => serde_yaml::from_str(&content)
                    .with_context(|| format!("解析翻译文件失败: {}", path.display()))?,
                _ => continue,
            };
            self.insert_table(locale, table);
            loaded += 1;
        }
        Ok(loaded)
    }

    /// 在指定语言中查找点分路径，缺失或非标量时返回 `None`
    pub fn lookup(&self, key: &str, locale: &str) -> Option<String> {
        let mut node = self.tables.get(locale)?;
        for segment in key.split('.') {
            node = match node {
                Value::Object(map) => map.get(segment)?,
                Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        match node {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    /// 解析一个翻译键
    ///
    /// 当前语言缺失时，若开启回退且当前语言不是默认语言，则改查默认语言；
    /// 仍然缺失则返回默认文本，没有默认文本时返回键本身。
    pub fn translate(&self, key: &str, locale: &str, default: Option<&str>) -> String {
        if let Some(value) = self.lookup(key, locale) {
            return value;
        }
        if self.fallback && locale != self.default_locale {
            if let Some(value) = self.lookup(key, &self.default_locale) {
                return value;
            }
        }
        match default {
            Some(text) => text.to_string(),
            None => key.to_string(),
        }
    }

    /// 替换文本中的所有翻译标记
    pub fn resolve_markers(&self, text: &str, locale: &str) -> String {
        marker_regex()
            .replace_all(text, |caps: &Captures<'_>| {
                let key = caps[1].trim();
                let default = caps.get(2).map(|m| m.as_str().trim());
                self.translate(key, locale, default)
            })
            .into_owned()
    }
}

fn deep_merge(target: &mut Value, incoming: Value) {
    match (target, incoming) {
        (Value::Object(target), Value::Object(incoming)) => {
            for (key, value) in incoming {
                match target.get_mut(&key) {
                    Some(existing) => deep_merge(existing, value),
                    None => {
                        target.insert(key, value);
                    }
                }
            }
        }
        (target, incoming) => *target = incoming,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn translator() -> Translator {
        let mut t = Translator::new("en", true);
        t.insert_table("en", json!({"a": {"b": "Hello"}, "nav": {"home": "Home"}, "n": 3}));
        t.insert_table("de", json!({"nav": {"home": "Startseite"}}));
        t
    }

    #[test]
    fn test_translate_direct_hit() {
        assert_eq!(translator().translate("a.b", "en", None), "Hello");
        assert_eq!(translator().translate("nav.home", "de", None), "Startseite");
        assert_eq!(translator().translate("n", "en", None), "3");
    }

    #[test]
    fn test_translate_falls_back_to_default_locale() {
        assert_eq!(translator().translate("a.b", "fr", None), "Hello");
        assert_eq!(translator().translate("a.b", "de", None), "Hello");
    }

    #[test]
    fn test_translate_without_fallback() {
        let mut t = Translator::new("en", false);
        t.insert_table("en", json!({"a": {"b": "Hello"}}));
        assert_eq!(t.translate("a.b", "fr", Some("Salut")), "Salut");
        assert_eq!(t.translate("a.b", "fr", None), "a.b");
    }

    #[test]
    fn test_missing_key_uses_default_or_key() {
        let t = translator();
        assert_eq!(t.translate("missing.key", "en", Some("Fallback")), "Fallback");
        assert_eq!(t.translate("missing.key", "en", None), "missing.key");
        // 非叶子节点视为缺失
        assert_eq!(t.translate("a", "en", None), "a");
    }

    #[test]
    fn test_resolve_markers() {
        let t = translator();
        let out = t.resolve_markers("# {{t:nav.home}}\n{{ t:missing | Default text }} {{t:a.b}}", "de");
        assert_eq!(out, "# Startseite\nDefault text Hello");
    }

    #[test]
    fn test_load_dir_and_merge() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("en.json"), r#"{"site": {"title": "Docs", "tagline": "Fast"}}"#).unwrap();
        fs::write(dir.path().join("fr.yml"), "site:\n  title: Documentation\n").unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let mut t = Translator::new("en", true);
        assert_eq!(t.load_dir(dir.path()).unwrap(), 2);
        t.insert_table("en", json!({"site": {"title": "Guides"}}));

        assert_eq!(t.translate("site.title", "en", None), "Guides");
        assert_eq!(t.translate("site.tagline", "en", None), "Fast");
        assert_eq!(t.translate("site.title", "fr", None), "Documentation");
        assert_eq!(t.translate("site.tagline", "fr", None), "Fast");
    }
}
