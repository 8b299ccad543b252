use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::core::error::EngineError;
use crate::models::types::{NavItem, Options, SidebarConfig};

/// 按顺序查找的配置文件名
pub const CONFIG_FILES: &[&str] = &["bunpress.yml", "bunpress.yaml", "_config.yml", "bunpress.toml"];

/// 哨兵默认主题名
pub const DEFAULT_THEME: &str = "default";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub title: String,
    pub description: Option<String>,
    /// 站点基础 URL，用于 sitemap
    pub url: Option<String>,
    pub lang: String,
    /// 内容根目录
    pub docs_dir: String,
    /// 输出目录
    pub out_dir: String,
    /// 静态资源目录
    pub public_dir: String,
    /// 主题根目录
    pub themes_dir: String,
    pub theme: ThemeConfig,
    pub theme_validation: ThemeValidation,
    pub nav: Vec<NavItem>,
    pub sidebar: SidebarConfig,
    pub markdown: MarkdownConfig,
    pub i18n: Option<I18nConfig>,
    pub build: BuildConfig,
}

/// 主题选择配置，也接受 `theme: name` 的简写
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "ThemeConfigRepr")]
pub struct ThemeConfig {
    pub name: String,
    pub options: Options,
    /// 为 true 时，找不到任何可用主题视为致命错误
    pub strict: bool,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ThemeConfigRepr {
    Name(String),
    Full {
        #[serde(default = "default_theme_name")]
        name: String,
        #[serde(default)]
        options: Options,
        #[serde(default)]
        strict: bool,
    },
}

impl From<ThemeConfigRepr> for ThemeConfig {
    fn from(repr: ThemeConfigRepr) -> Self {
        match repr {
            ThemeConfigRepr::Name(name) => ThemeConfig {
                name,
                ..ThemeConfig::default()
            },
            ThemeConfigRepr::Full { name, options, strict } => ThemeConfig { name, options, strict },
        }
    }
}

impl Default for ThemeConfig {
    fn default() -> Self {
        Self {
            name: default_theme_name(),
            options: Options::new(),
            strict: false,
        }
    }
}

fn default_theme_name() -> String {
    DEFAULT_THEME.to_string()
}

/// 主题校验开关，同一次发现过程中对所有候选主题一致生效
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThemeValidation {
    pub require_layout: bool,
    pub require_style: bool,
    pub require_layouts: bool,
}

impl Default for ThemeValidation {
    fn default() -> Self {
        Self {
            require_layout: true,
            require_style: false,
            require_layouts: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkdownConfig {
    /// 视为 Markdown 的扩展名
    pub extensions: Vec<String>,
    pub toc_min_level: u8,
    pub toc_max_level: u8,
}

impl Default for MarkdownConfig {
    fn default() -> Self {
        Self {
            extensions: vec!["md".to_string(), "markdown".to_string()],
            toc_min_level: 1,
            toc_max_level: 6,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct I18nConfig {
    pub default_locale: String,
    pub locales: Vec<LocaleConfig>,
    /// 缺失翻译时回退到默认语言
    pub fallback: bool,
    /// 默认语言是否也生成带前缀的路由
    pub prefix_default_locale: bool,
    /// 翻译文件目录（相对站点根目录）
    pub translations_dir: String,
    /// 内联翻译表，按语言分组
    pub translations: BTreeMap<String, serde_json::Value>,
}

impl Default for I18nConfig {
    fn default() -> Self {
        Self {
            default_locale: "en".to_string(),
            locales: Vec::new(),
            fallback: true,
            prefix_default_locale: false,
            translations_dir: "locales".to_string(),
            translations: BTreeMap::new(),
        }
    }
}

impl I18nConfig {
    /// 所有语言代码，默认语言总是包含在内
    pub fn locale_codes(&self) -> Vec<String> {
        let mut codes: Vec<String> = self.locales.iter().map(|l| l.code.clone()).collect();
        if !codes.contains(&self.default_locale) {
            codes.insert(0, self.default_locale.clone());
        }
        codes
    }
}

/// 语言配置，也接受 `- fr` 的简写
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "LocaleRepr")]
pub struct LocaleConfig {
    pub code: String,
    pub name: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum LocaleRepr {
    Code(String),
    Full { code: String, name: Option<String> },
}

impl From<LocaleRepr> for LocaleConfig {
    fn from(repr: LocaleRepr) -> Self {
        match repr {
            LocaleRepr::Code(code) => LocaleConfig { code, name: None },
            LocaleRepr::Full { code, name } => LocaleConfig { code, name },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// 并发处理的文件数
    pub concurrency: usize,
    /// 是否生成 sitemap.xml
    pub sitemap: bool,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            concurrency: 8,
            sitemap: true,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            title: "BunPress".to_string(),
            description: None,
            url: None,
            lang: "en".to_string(),
            docs_dir: "docs".to_string(),
            out_dir: "dist".to_string(),
            public_dir: "public".to_string(),
            themes_dir: "themes".to_string(),
            theme: ThemeConfig::default(),
            theme_validation: ThemeValidation::default(),
            nav: Vec::new(),
            sidebar: SidebarConfig::default(),
            markdown: MarkdownConfig::default(),
            i18n: None,
            build: BuildConfig::default(),
        }
    }
}

impl Config {
    /// 在站点根目录中查找并加载配置文件
    pub fn discover(base_dir: &Path) -> Result<(Self, PathBuf), EngineError> {
        for name in CONFIG_FILES {
            let path = base_dir.join(name);
            if path.is_file() {
                info!("加载配置文件: {}", path.display());
                let config = Self::load(&path)?;
                return Ok((config, path));
            }
        }

        Err(EngineError::ConfigNotFound {
            dir: base_dir.to_path_buf(),
            candidates: CONFIG_FILES.join(", "),
        })
    }

    /// 从文件加载配置，按扩展名选择 YAML 或 TOML
    pub fn load(path: &Path) -> Result<Self, EngineError> {
        let content = fs::read_to_string(path).map_err(|source| EngineError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;

        let is_toml = path.extension().map_or(false, |ext| ext == "toml");
        let parsed = if is_toml {
            toml::from_str::<Config>(&content).map_err(|e| e.to_string())
        } else if content.trim().is_empty() {
            Ok(Config::default())
        } else {
            serde_yaml::from_str::<Config>(&content).map_err(|e| e.to_string())
        };

        let config = parsed.map_err(|message| EngineError::ConfigParse {
            path: path.to_path_buf(),
            message,
        })?;
        debug!("配置: 主题 = {}, 内容目录 = {}", config.theme.name, config.docs_dir);
        Ok(config)
    }

    pub fn docs_path(&self, base_dir: &Path) -> PathBuf {
        base_dir.join(&self.docs_dir)
    }

    pub fn out_path(&self, base_dir: &Path) -> PathBuf {
        base_dir.join(&self.out_dir)
    }

    pub fn public_path(&self, base_dir: &Path) -> PathBuf {
        base_dir.join(&self.public_dir)
    }

    pub fn themes_path(&self, base_dir: &Path) -> PathBuf {
        base_dir.join(&self.themes_dir)
    }

    /// 页面 `<html lang>` 的取值
    pub fn lang_for(&self, locale: Option<&str>) -> String {
        locale.map(str::to_string).unwrap_or_else(|| self.lang.clone())
    }
}
