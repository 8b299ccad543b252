use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::{LayoutKind, Theme, ThemeError};
use crate::models::config::{ThemeConfig, ThemeValidation, DEFAULT_THEME};
use crate::models::Options;

/// 布局入口：首选名在前，其余按顺序作为备选
pub const LAYOUT_FILES: &[&str] = &["Layout.tsx", "Layout.jsx", "Layout.ts", "Layout.js", "layout.html", "Layout.html"];

/// 样式文件：首选名在前
pub const STYLE_FILES: &[&str] = &["style.css", "styles.css", "theme.css", "index.css"];

/// `layouts/` 目录中视为布局组件的扩展名
pub const COMPONENT_EXTENSIONS: &[&str] = &["tsx", "jsx", "ts", "js", "mjs", "html"];

pub const MANIFEST_FILE: &str = "theme.yml";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ThemeManifest {
    options: Options,
    variables: BTreeMap<String, String>,
}

/// 主题解析器
#[derive(Debug, Clone, Default)]
pub struct ThemeResolver {
    validation: ThemeValidation,
    themes: BTreeMap<String, Theme>,
}

impl ThemeResolver {
    pub fn new(validation: ThemeValidation) -> Self {
        Self {
            validation,
            themes: BTreeMap::new(),
        }
    }

    /// 扫描主题根目录，返回注册的主题数
    ///
    /// 可重复调用，每次都会重建注册表。
    pub fn discover(&mut self, themes_dir: &Path) -> usize {
        self.themes.clear();

        let entries = match fs::read_dir(themes_dir) {
            Ok(entries) => entries,
            Err(_) => {
                warn!("主题目录不存在: {}，所有页面将使用后备模板", themes_dir.display());
                return 0;
            }
        };

        let mut candidates: Vec<PathBuf> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_dir())
            .collect();
        candidates.sort();

        for dir in candidates {
            let Some(name) = dir.file_name().and_then(|n| n.to_str()).map(str::to_string) else {
                continue;
            };
            match self.validate(&name, &dir) {
                Ok(theme) => {
                    debug!("注册主题: {}", name);
                    self.themes.insert(name, theme);
                }
                Err(e) => warn!("跳过主题 {}: {}", name, e),
            }
        }

        info!("发现 {} 个主题", self.themes.len());
        self.themes.len()
    }

    /// 校验单个候选主题目录
    pub fn validate(&self, name: &str, dir: &Path) -> Result<Theme, ThemeError> {
        let layout = first_existing(dir, LAYOUT_FILES);
        if layout.is_none() && self.validation.require_layout {
            return Err(ThemeError::MissingLayout { theme: name.to_string() });
        }

        let style = first_existing(dir, STYLE_FILES);
        let style_text = match &style {
            Some(path) => fs::read_to_string(path).unwrap_or_else(|e| {
                warn!("读取主题样式失败 {}: {}", path.display(), e);
                String::new()
            }),
            None => String::new(),
        };
        if style.is_none() && self.validation.require_style {
            return Err(ThemeError::MissingStyle { theme: name.to_string() });
        }

        let layouts = keyed_layouts(&dir.join("layouts"));
        if layouts.is_empty() && self.validation.require_layouts {
            return Err(ThemeError::MissingLayouts { theme: name.to_string() });
        }

        // 没有默认入口但有 doc 布局时，用它兜底
        let layout = layout.or_else(|| layouts.get(&LayoutKind::Doc).cloned());
        if layout.is_none() && layouts.is_empty() {
            return Err(ThemeError::MissingLayout { theme: name.to_string() });
        }

        let manifest = read_manifest(dir);

        Ok(Theme {
            name: name.to_string(),
            path: dir.to_path_buf(),
            layout,
            style,
            style_text,
            layouts,
            options: manifest.options,
            variables: manifest.variables,
        })
    }

    pub fn get(&self, name: &str) -> Option<&Theme> {
        self.themes.get(name)
    }

    pub fn themes(&self) -> impl Iterator<Item = &Theme> {
        self.themes.values()
    }

    pub fn names(&self) -> Vec<&str> {
        self.themes.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.themes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.themes.is_empty()
    }

    /// 按名称选择主题，返回合并了选项覆盖值的副本
    ///
    /// 请求的主题不存在时回退到默认主题，默认主题也不存在时返回 `None`。
    pub fn set_theme_from_config(&self, name: &str, overrides: &Options) -> Option<Theme> {
        let theme = match self.themes.get(name) {
            Some(theme) => theme,
            None => {
                let fallback = self.themes.get(DEFAULT_THEME)?;
                warn!("主题 {} 不可用，改用默认主题 {}", name, DEFAULT_THEME);
                fallback
            }
        };
        Some(theme.with_options(overrides))
    }

    /// 按站点配置选择主题，严格模式下找不到主题是错误
    pub fn select(&self, config: &ThemeConfig) -> Result<Option<Theme>, ThemeError> {
        match self.set_theme_from_config(&config.name, &config.options) {
            Some(theme) => {
                info!("使用主题: {}", theme.name);
                Ok(Some(theme))
            }
            None if config.strict => Err(ThemeError::NotFound {
                requested: config.name.clone(),
            }),
            None => {
                warn!("没有可用主题，使用后备模板渲染");
                Ok(None)
            }
        }
    }
}

fn first_existing(dir: &Path, names: &[&str]) -> Option<PathBuf> {
    names.iter().map(|name| dir.join(name)).find(|p| p.is_file())
}

/// 从文件名得到布局类型：`HomeLayout.tsx` -> `home`
pub fn layout_key(path: &Path) -> Option<LayoutKind> {
    let stem = path.file_stem()?.to_str()?;
    let key = stem.strip_suffix("Layout").unwrap_or(stem);
    if key.is_empty() {
        return None;
    }
    Some(LayoutKind::from(key))
}

fn keyed_layouts(dir: &Path) -> BTreeMap<LayoutKind, PathBuf> {
    let mut layouts = BTreeMap::new();
    let Ok(entries) = fs::read_dir(dir) else {
        return layouts;
    };

    let mut files: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file())
        .filter(|p| {
            p.extension()
                .and_then(|e| e.to_str())
                .map(|e| COMPONENT_EXTENSIONS.contains(&e))
                .unwrap_or(false)
        })
        .collect();
    files.sort();

    for file in files {
        if let Some(kind) = layout_key(&file) {
            // 同名不同扩展名时保留排序靠前的
            layouts.entry(kind).or_insert(file);
        }
    }
    layouts
}

fn read_manifest(dir: &Path) -> ThemeManifest {
    let path = dir.join(MANIFEST_FILE);
    let Ok(content) = fs::read_to_string(&path) else {
        return ThemeManifest::default();
    };
    match serde_yaml::from_str::<Option<ThemeManifest>>(&content) {
        Ok(manifest) => manifest.unwrap_or_default(),
        Err(e) => {
            warn!("解析主题清单失败 {}: {}", path.display(), e);
            ThemeManifest::default()
        }
    }
}
