use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// 前置元数据（按键排序，保证序列化结果稳定）
pub type FrontMatter = BTreeMap<String, serde_yaml::Value>;

/// 主题/插件选项
pub type Options = BTreeMap<String, serde_yaml::Value>;

/// 目录条目
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TocItem {
    /// 标题层级（h1 = 1）
    pub level: u8,
    /// 锚点 id
    pub id: String,
    /// 去除标签后的标题文本
    pub text: String,
}

/// 处理完成的单个内容文件
#[derive(Debug, Clone, Serialize)]
pub struct ContentFile {
    /// 源文件路径
    pub source_path: PathBuf,
    /// 规范路由，以 `/` 开头
    pub route: String,
    /// 原始正文（不含前置元数据）
    pub raw_body: String,
    /// 前置元数据
    pub frontmatter: FrontMatter,
    /// 插件转换链处理后的正文
    pub transformed_body: String,
    /// 渲染后的 HTML
    pub rendered_html: String,
    /// 目录
    pub toc_items: Vec<TocItem>,
    /// 有效语言（未启用 i18n 时为空）
    pub locale: Option<String>,
    /// 源文件修改时间
    pub last_modified: Option<DateTime<Utc>>,
}

impl ContentFile {
    /// 读取字符串类型的前置字段
    pub fn frontmatter_str(&self, key: &str) -> Option<&str> {
        self.frontmatter.get(key).and_then(|v| v.as_str())
    }

    pub fn title(&self) -> Option<&str> {
        self.frontmatter_str("title")
    }

    pub fn description(&self) -> Option<&str> {
        self.frontmatter_str("description")
    }

    /// 前置元数据中声明的布局
    pub fn layout(&self) -> Option<&str> {
        self.frontmatter_str("layout")
    }
}

/// 顶部导航条目
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavItem {
    pub text: String,
    pub link: String,
}

/// 侧边栏条目，可通过 `items` 嵌套
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SidebarItem {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<SidebarItem>,
}

/// 侧边栏配置：单一列表，或按路由前缀分组
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SidebarConfig {
    List(Vec<SidebarItem>),
    Grouped(BTreeMap<String, Vec<SidebarItem>>),
}

impl Default for SidebarConfig {
    fn default() -> Self {
        SidebarConfig::List(Vec::new())
    }
}

impl SidebarConfig {
    /// 获取某个路由对应的侧边栏（分组模式下取最长匹配前缀）
    pub fn items_for(&self, route: &str) -> Vec<SidebarItem> {
        match self {
            SidebarConfig::List(items) => items.clone(),
            SidebarConfig::Grouped(groups) => groups
                .iter()
                .filter(|(prefix, _)| route_has_prefix(route, prefix))
                .max_by_key(|(prefix, _)| prefix.trim_end_matches('/').len())
                .map(|(_, items)| items.clone())
                .unwrap_or_default(),
        }
    }
}

fn route_has_prefix(route: &str, prefix: &str) -> bool {
    let prefix = prefix.trim_end_matches('/');
    if prefix.is_empty() {
        return true;
    }
    match route.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

/// 语言展开后的路由
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct LocaleRoute {
    pub base_route: String,
    pub locale: String,
    pub expanded_route: String,
}

/// 构建过程中记录的问题
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildIssue {
    /// 相关文件（如果有）
    pub path: Option<PathBuf>,
    pub message: String,
}

impl BuildIssue {
    pub fn new(path: Option<PathBuf>, message: impl Into<String>) -> Self {
        Self {
            path,
            message: message.into(),
        }
    }
}

impl fmt::Display for BuildIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.path {
            Some(path) => write!(f, "{}: {}", path.display(), self.message),
            None => f.write_str(&self.message),
        }
    }
}

/// 构建整体状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildStatus {
    /// 全部成功
    Complete,
    /// 部分页面失败，其余已生成
    Partial,
    /// 致命错误
    Failed,
}

/// 一次构建的结果
#[derive(Debug, Clone, Serialize)]
pub struct BuildResult {
    pub success: bool,
    pub output_dir: PathBuf,
    pub files_generated: Vec<PathBuf>,
    pub errors: Vec<BuildIssue>,
}

impl BuildResult {
    pub fn new(output_dir: PathBuf) -> Self {
        Self {
            success: true,
            output_dir,
            files_generated: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// 记录非致命问题
    pub fn record(&mut self, issue: BuildIssue) {
        self.errors.push(issue);
    }

    /// 记录致命问题并标记失败
    pub fn fail(mut self, issue: BuildIssue) -> Self {
        self.success = false;
        self.errors.push(issue);
        self
    }

    pub fn status(&self) -> BuildStatus {
        if !self.success {
            BuildStatus::Failed
        } else if self.errors.is_empty() {
            BuildStatus::Complete
        } else {
            BuildStatus::Partial
        }
    }
}
