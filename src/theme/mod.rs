//! 主题发现、选择与页面渲染

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::models::Options;

pub mod bundler;
pub mod renderer;
pub mod resolver;

pub use bundler::{Bundler, CopyBundler};
pub use renderer::{RenderContext, Renderer};
pub use resolver::ThemeResolver;

/// 主题错误类型
#[derive(Error, Debug)]
pub enum ThemeError {
    #[error("主题 {theme} 缺少布局入口文件")]
    MissingLayout { theme: String },

    #[error("主题 {theme} 缺少样式文件")]
    MissingStyle { theme: String },

    #[error("主题 {theme} 的 layouts 目录中没有任何布局")]
    MissingLayouts { theme: String },

    #[error("找不到主题 {requested}，默认主题也不可用")]
    NotFound { requested: String },

    #[error("模板错误: {message}")]
    Template { message: String },
}

impl From<tera::Error> for ThemeError {
    fn from(e: tera::Error) -> Self {
        // tera 的错误信息藏在 source 链里
        let mut message = e.to_string();
        let mut source = std::error::Error::source(&e);
        while let Some(inner) = source {
            message.push_str(": ");
            message.push_str(&inner.to_string());
            source = inner.source();
        }
        ThemeError::Template { message }
    }
}

/// 布局类型
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum LayoutKind {
    /// 文档页
    Doc,
    /// 首页
    Home,
    /// 普通页面
    Page,
    Other(String),
}

impl LayoutKind {
    pub fn as_str(&self) -> &str {
        match self {
            LayoutKind::Doc => "doc",
            LayoutKind::Home => "home",
            LayoutKind::Page => "page",
            LayoutKind::Other(name) => name,
        }
    }
}

impl From<&str> for LayoutKind {
    fn from(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "doc" => LayoutKind::Doc,
            "home" => LayoutKind::Home,
            "page" => LayoutKind::Page,
            other => LayoutKind::Other(other.to_string()),
        }
    }
}

impl From<String> for LayoutKind {
    fn from(name: String) -> Self {
        LayoutKind::from(name.as_str())
    }
}

impl From<LayoutKind> for String {
    fn from(kind: LayoutKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for LayoutKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 哨兵默认布局
pub const DEFAULT_LAYOUT: LayoutKind = LayoutKind::Doc;

/// 一个通过校验的主题
#[derive(Debug, Clone, Serialize)]
pub struct Theme {
    pub name: String,
    /// 主题目录
    pub path: PathBuf,
    /// 默认布局入口
    pub layout: Option<PathBuf>,
    /// 样式文件
    pub style: Option<PathBuf>,
    /// 样式文件内容
    #[serde(skip)]
    pub style_text: String,
    /// 布局类型 -> 布局文件
    pub layouts: BTreeMap<LayoutKind, PathBuf>,
    pub options: Options,
    /// 以 CSS 自定义属性输出的变量
    pub variables: BTreeMap<String, String>,
}

impl Theme {
    /// 查找布局组件：存在对应类型时返回它，否则返回默认布局入口
    pub fn component(&self, kind: Option<&LayoutKind>) -> Option<&Path> {
        kind.and_then(|k| self.layouts.get(k))
            .or(self.layout.as_ref())
            .map(PathBuf::as_path)
    }

    /// 主题选项中配置的默认布局
    pub fn default_layout(&self) -> Option<LayoutKind> {
        self.option_str("defaultLayout")
            .or_else(|| self.option_str("default_layout"))
            .map(LayoutKind::from)
    }

    pub fn dark_mode(&self) -> bool {
        ["darkMode", "dark_mode", "dark"]
            .iter()
            .any(|key| self.options.get(*key).and_then(|v| v.as_bool()).unwrap_or(false))
    }

    /// 返回合并了选项覆盖值的副本，原主题保持不变
    pub fn with_options(&self, overrides: &Options) -> Theme {
        let mut theme = self.clone();
        for (key, value) in overrides {
            theme.options.insert(key.clone(), value.clone());
        }
        theme
    }

    fn option_str(&self, key: &str) -> Option<&str> {
        self.options.get(key).and_then(|v| v.as_str())
    }
}
