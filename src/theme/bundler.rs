use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::Theme;

/// 需要客户端水合的布局扩展名
pub const HYDRATION_EXTENSIONS: &[&str] = &["tsx", "jsx", "ts", "js", "mjs"];

/// 布局是否需要客户端水合
pub fn requires_hydration(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| HYDRATION_EXTENSIONS.contains(&e))
        .unwrap_or(false)
}

/// 布局组件在输出目录中的相对路径
pub fn hydration_asset_path(theme: &str, layout: &Path) -> String {
    let file = layout.file_name().and_then(|n| n.to_str()).unwrap_or_default();
    format!("assets/themes/{}/{}", theme, file)
}

/// 一个待打包的入口
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleEntry {
    pub source: PathBuf,
    /// 相对输出目录的路径
    pub output: String,
}

impl BundleEntry {
    /// 主题中所有需要水合的布局
    pub fn for_theme(theme: &Theme) -> Vec<BundleEntry> {
        let mut sources: Vec<&PathBuf> = theme.layout.iter().chain(theme.layouts.values()).collect();
        sources.sort();
        sources.dedup();

        sources
            .into_iter()
            .filter(|p| requires_hydration(p))
            .map(|p| BundleEntry {
                source: p.clone(),
                output: hydration_asset_path(&theme.name, p),
            })
            .collect()
    }
}

/// 把布局入口打包进输出目录
pub trait Bundler: Send + Sync {
    fn name(&self) -> &str;

    fn bundle(&self, entries: &[BundleEntry], out_dir: &Path) -> Result<Vec<PathBuf>>;
}

/// 不做转换，原样复制入口文件
#[derive(Debug, Clone, Copy, Default)]
pub struct CopyBundler;

impl Bundler for CopyBundler {
    fn name(&self) -> &str {
        "copy"
    }

    fn bundle(&self, entries: &[BundleEntry], out_dir: &Path) -> Result<Vec<PathBuf>> {
        let mut written = Vec::with_capacity(entries.len());
        for entry in entries {
            let target = out_dir.join(&entry.output);
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("创建目录失败: {}", parent.display()))?;
            }
            fs::copy(&entry.source, &target).with_context(|| {
                format!("复制布局失败: {} -> {}", entry.source.display(), target.display())
            })?;
            debug!("打包布局: {}", entry.output);
            written.push(target);
        }
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::theme::LayoutKind;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    #[test]
    fn test_requires_hydration() {
        assert!(requires_hydration(Path::new("Layout.tsx")));
        assert!(requires_hydration(Path::new("a/b/Home.mjs")));
        assert!(!requires_hydration(Path::new("layout.html")));
        assert!(!requires_hydration(Path::new("Layout")));
    }

    #[test]
    fn test_copy_bundler_writes_theme_entries() {
        let dir = TempDir::new().unwrap();
        let theme_dir = dir.path().join("themes/default");
        fs::create_dir_all(theme_dir.join("layouts")).unwrap();
        fs::write(theme_dir.join("Layout.tsx"), "export default 1").unwrap();
        fs::write(theme_dir.join("layouts/HomeLayout.tsx"), "export default 2").unwrap();
        fs::write(theme_dir.join("layouts/page.html"), "<div></div>").unwrap();

        let mut layouts = BTreeMap::new();
        layouts.insert(LayoutKind::Home, theme_dir.join("layouts/HomeLayout.tsx"));
        layouts.insert(LayoutKind::Page, theme_dir.join("layouts/page.html"));
        let theme = Theme {
            name: "default".into(),
            path: theme_dir.clone(),
            layout: Some(theme_dir.join("Layout.tsx")),
            style: None,
            style_text: String::new(),
            layouts,
            options: Default::default(),
            variables: Default::default(),
        };

        let entries = BundleEntry::for_theme(&theme);
        assert_eq!(entries.len(), 2);

        let out = dir.path().join("dist");
        let written = CopyBundler.bundle(&entries, &out).unwrap();
        assert_eq!(written.len(), 2);
        assert_eq!(
            fs::read_to_string(out.join("assets/themes/default/Layout.tsx")).unwrap(),
            "export default 1"
        );
        assert!(out.join("assets/themes/default/HomeLayout.tsx").exists());
    }
}
