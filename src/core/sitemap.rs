//! sitemap.xml 生成
//!
//! ```xml
//! <?xml version="1.0" encoding="UTF-8"?>
//! <urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
//!   <url>
//!     <loc>https://example.com/guide</loc>
//!     <lastmod>2025-01-01</lastmod>
//!   </url>
//! </urlset>
//! ```

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use url::Url;

use crate::models::ContentFile;

const SITEMAP_NS: &str = "http://www.sitemaps.org/schemas/sitemap/0.9";

/// 未配置站点 URL 时使用的基础地址
pub const DEFAULT_BASE_URL: &str = "http://localhost/";

pub const SITEMAP_FILE: &str = "sitemap.xml";

/// 站点地图
#[derive(Debug, Default)]
pub struct Sitemap {
    urls: Vec<UrlEntry>,
}

#[derive(Debug)]
struct UrlEntry {
    loc: String,
    /// YYYY-MM-DD
    lastmod: Option<String>,
}

impl Sitemap {
    /// 按页面顺序生成条目，路由拼接在基础 URL 之后
    pub fn from_pages<'a, I>(base_url: Option<&str>, pages: I) -> Result<Self>
    where
        I: IntoIterator<Item = &'a ContentFile>,
    {
        let base = normalize_base(base_url.unwrap_or(DEFAULT_BASE_URL))?;
        let mut urls = Vec::new();
        for page in pages {
            urls.push(UrlEntry {
                loc: absolute_url(&base, &page.route)?,
                lastmod: page.last_modified.map(format_lastmod),
            });
        }
        Ok(Self { urls })
    }

    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }

    pub fn into_xml(self) -> String {
        let mut xml = String::with_capacity(256 + self.urls.len() * 96);
        xml.push_str(r#"<?xml version="1.0" encoding="UTF-8"?>"#);
        xml.push('\n');
        xml.push_str(&format!(r#"<urlset xmlns="{SITEMAP_NS}">"#));
        xml.push('\n');

        for entry in self.urls {
            xml.push_str("  <url>\n");
            xml.push_str(&format!("    <loc>{}</loc>\n", escape_xml(&entry.loc)));
            if let Some(lastmod) = entry.lastmod {
                xml.push_str(&format!("    <lastmod>{lastmod}</lastmod>\n"));
            }
            xml.push_str("  </url>\n");
        }

        xml.push_str("</urlset>\n");
        xml
    }
}

/// 基础 URL 的路径总是以 `/` 结尾，方便拼接相对路由
fn normalize_base(base: &str) -> Result<Url> {
    let mut url = Url::parse(base).with_context(|| format!("无效的站点 URL: {}", base))?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

/// 路由按路径段追加到基础 URL 之后，段内的 `:`、`#`、`?` 等不会改变 URL 结构
fn absolute_url(base: &Url, route: &str) -> Result<String> {
    let mut url = base.clone();
    let segments: Vec<&str> = route.split('/').filter(|s| !s.is_empty()).collect();
    if !segments.is_empty() {
        url.path_segments_mut()
            .map_err(|_| anyhow::anyhow!("无法拼接路由 {}: {} 不能作为基础 URL", route, base))?
            .pop_if_empty()
            .extend(segments);
    }
    Ok(url.to_string())
}

fn format_lastmod(time: DateTime<Utc>) -> String {
    time.format("%Y-%m-%d").to_string()
}

fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
