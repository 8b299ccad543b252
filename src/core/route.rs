//! 源文件路径到路由的映射

use std::path::{Component, Path, PathBuf};

/// 根据源文件路径计算规范路由
///
/// 去掉内容根目录前缀和 `extensions` 中的扩展名，末尾的 `index` 段折叠到所在目录。
/// 结果总是以 `/` 开头，除根路由 `/` 外不以 `/` 结尾。
pub fn derive_route(file_path: &Path, root_dir: &Path, extensions: &[String]) -> String {
    let relative = file_path.strip_prefix(root_dir).unwrap_or(file_path);

    let mut segments: Vec<String> = Vec::new();
    for component in relative.components() {
        if let Component::Normal(part) = component {
            // 兼容 Windows 风格的分隔符
            for piece in part.to_string_lossy().split('\\') {
                if !piece.is_empty() && piece != "." {
                    segments.push(piece.to_string());
                }
            }
        }
    }

    if let Some(last) = segments.last_mut() {
        *last = strip_markdown_extension(last, extensions).to_string();
    }
    if segments.last().map_or(false, |s| s == "index") {
        segments.pop();
    }

    if segments.is_empty() {
        "/".to_string()
    } else {
        format!("/{}", segments.join("/"))
    }
}

fn strip_markdown_extension<'a>(name: &'a str, extensions: &[String]) -> &'a str {
    match name.rsplit_once('.') {
        Some((stem, ext))
            if !stem.is_empty()
                && extensions.iter().any(|m| m.eq_ignore_ascii_case(ext)) =>
        {
            stem
        }
        _ => name,
    }
}

/// 路由对应的输出文件，`/` 映射为 `<out>/index.html`
pub fn output_path_for_route(out_dir: &Path, route: &str) -> PathBuf {
    let mut path = out_dir.to_path_buf();
    for segment in route.split('/').filter(|s| !s.is_empty()) {
        path.push(segment);
    }
    path.join("index.html")
}

/// 路由的第一个路径段
pub fn first_segment(route: &str) -> Option<&str> {
    route.trim_start_matches('/').split('/').next().filter(|s| !s.is_empty())
}
