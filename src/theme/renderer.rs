use serde::Serialize;
use std::fs;
use std::path::Path;
use tera::{Context as TeraContext, Tera};
use tracing::debug;

use super::bundler::{hydration_asset_path, requires_hydration};
use super::{LayoutKind, Theme, ThemeError, DEFAULT_LAYOUT};
use crate::models::{Config, ContentFile, FrontMatter, NavItem, Options, SidebarItem, TocItem};
use crate::utils::escape_html;

const FALLBACK: &str = "fallback";
const THEMED: &str = "themed";

/// 没有可用主题时的最小页面
const FALLBACK_TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="{{ lang }}">
<head>
  <meta charset="UTF-8">
  <meta name="viewport" content="width=device-width, initial-scale=1.0">
  <title>{{ title }}</title>
  <meta name="description" content="{{ description }}">
  <style>
{{ style }}
  </style>
</head>
<body>
  <main class="content">
{{ body }}
  </main>
</body>
</html>
"#;

const THEMED_TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="{{ lang }}" class="{{ html_class }}">
<head>
  <meta charset="UTF-8">
  <meta name="viewport" content="width=device-width, initial-scale=1.0">
  <title>{{ title }}</title>
  <meta name="description" content="{{ description }}">
  <style>
{{ style }}
  </style>
</head>
<body>
  <div id="bunpress-app" data-bunpress-layout="{{ layout }}" data-bunpress-props='{{ props }}'>
{{ body }}
  </div>
{%- if hydrate_src %}
  <script type="module" src="{{ hydrate_src }}" data-bunpress-hydrate></script>
{%- endif %}
</body>
</html>
"#;

const BASELINE_STYLES: &str = "    body { margin: 0; font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; line-height: 1.6; color: #213547; }
    .content { max-width: 768px; margin: 0 auto; padding: 2rem 1.5rem; }
    pre { overflow-x: auto; padding: 1rem; background: #f6f8fa; border-radius: 6px; }
    code { font-family: ui-monospace, SFMono-Regular, Menlo, monospace; }
    table { border-collapse: collapse; }
    th, td { border: 1px solid #d0d7de; padding: 0.4rem 0.8rem; }
    img { max-width: 100%; }";

/// 渲染单个页面所需的全部输入
#[derive(Debug, Clone)]
pub struct RenderContext<'a> {
    pub content: &'a ContentFile,
    pub active_theme: Option<&'a Theme>,
    pub config: &'a Config,
    pub nav_items: Vec<NavItem>,
    pub sidebar_items: Vec<SidebarItem>,
    /// 布局类型覆盖
    pub layout: Option<LayoutKind>,
}

impl<'a> RenderContext<'a> {
    /// 导航和侧边栏取自站点配置
    pub fn new(content: &'a ContentFile, config: &'a Config, active_theme: Option<&'a Theme>) -> Self {
        Self {
            content,
            active_theme,
            config,
            nav_items: config.nav.clone(),
            sidebar_items: config.sidebar.items_for(&content.route),
            layout: None,
        }
    }

    pub fn with_layout(mut self, layout: LayoutKind) -> Self {
        self.layout = Some(layout);
        self
    }

    fn title(&self) -> &str {
        self.content.title().unwrap_or(&self.config.title)
    }

    fn description(&self) -> &str {
        self.content
            .description()
            .or(self.config.description.as_deref())
            .unwrap_or_default()
    }

    fn lang(&self) -> String {
        self.config.lang_for(self.content.locale.as_deref())
    }
}

/// 传给布局组件的参数
#[derive(Serialize)]
struct LayoutProps<'a> {
    frontmatter: &'a FrontMatter,
    html: &'a str,
    nav: &'a [NavItem],
    sidebar: &'a [SidebarItem],
    toc: &'a [TocItem],
    config: &'a Config,
    theme: ThemeProps<'a>,
    route: &'a str,
    locale: Option<&'a str>,
    layout: &'a LayoutKind,
}

#[derive(Serialize)]
struct ThemeProps<'a> {
    name: &'a str,
    options: &'a Options,
}

/// 页面渲染器
#[derive(Debug, Clone)]
pub struct Renderer {
    tera: Tera,
}

impl Renderer {
    /// 创建渲染器，并预先注册主题中的 `.html` 布局
    pub fn new(theme: Option<&Theme>) -> Result<Self, ThemeError> {
        let mut tera = Tera::default();
        tera.add_raw_templates(vec![(FALLBACK, FALLBACK_TEMPLATE), (THEMED, THEMED_TEMPLATE)])?;

        if let Some(theme) = theme {
            let html_layouts = theme
                .layout
                .iter()
                .chain(theme.layouts.values())
                .filter(|p| is_template_layout(p));
            for path in html_layouts {
                let name = template_name(path);
                if tera.get_template_names().any(|n| n == name) {
                    continue;
                }
                tera.add_template_file(path, Some(&name))?;
                debug!("注册模板布局: {}", name);
            }
        }

        Ok(Self { tera })
    }

    /// 渲染一个页面
    pub fn render(&self, ctx: &RenderContext<'_>) -> Result<String, ThemeError> {
        let Some(theme) = ctx.active_theme else {
            return self.render_fallback(ctx);
        };

        let kind = resolve_layout(ctx, theme);
        let Some(component) = theme.component(Some(&kind)) else {
            debug!("主题 {} 没有 {} 布局，使用后备模板", theme.name, kind);
            return self.render_fallback(ctx);
        };

        let props = LayoutProps {
            frontmatter: &ctx.content.frontmatter,
            html: &ctx.content.rendered_html,
            nav: &ctx.nav_items,
            sidebar: &ctx.sidebar_items,
            toc: &ctx.content.toc_items,
            config: ctx.config,
            theme: ThemeProps {
                name: &theme.name,
                options: &theme.options,
            },
            route: &ctx.content.route,
            locale: ctx.content.locale.as_deref(),
            layout: &kind,
        };
        let payload = serde_json::to_string(&props).map_err(|e| ThemeError::Template {
            message: format!("序列化布局参数失败: {}", e),
        })?;

        let body = if is_template_layout(component) {
            self.render_template_layout(component, &props)?
        } else {
            ctx.content.rendered_html.clone()
        };

        let hydrate_src = if requires_hydration(component) {
            format!("/{}", hydration_asset_path(&theme.name, component))
        } else {
            String::new()
        };

        let mut html_class = format!("bunpress-theme theme-{}", theme.name);
        if theme.dark_mode() {
            html_class.push_str(" dark");
        }

        let mut context = TeraContext::new();
        context.insert("lang", &escape_html(&ctx.lang()));
        context.insert("html_class", &escape_html(&html_class));
        context.insert("title", &escape_html(ctx.title()));
        context.insert("description", &escape_html(ctx.description()));
        context.insert("style", &theme_style(theme));
        context.insert("layout", &escape_html(kind.as_str()));
        context.insert("props", &escape_attribute_payload(&payload));
        context.insert("body", &body);
        context.insert("hydrate_src", &escape_html(&hydrate_src));

        Ok(self.tera.render(THEMED, &context)?)
    }

    /// 与主题无关的最小页面
    pub fn render_fallback(&self, ctx: &RenderContext<'_>) -> Result<String, ThemeError> {
        let mut context = TeraContext::new();
        context.insert("lang", &escape_html(&ctx.lang()));
        context.insert("title", &escape_html(ctx.title()));
        context.insert("description", &escape_html(ctx.description()));
        context.insert("style", BASELINE_STYLES);
        context.insert("body", &ctx.content.rendered_html);

        Ok(self.tera.render(FALLBACK, &context)?)
    }

    fn render_template_layout(&self, path: &Path, props: &LayoutProps<'_>) -> Result<String, ThemeError> {
        let mut context = TeraContext::from_serialize(props)?;
        context.insert("content", props.html);
        context.insert("page", props.frontmatter);
        context.insert("site", props.config);

        let name = template_name(path);
        if self.tera.get_template_names().any(|n| n == name) {
            return Ok(self.tera.render(&name, &context)?);
        }

        // 未预先注册（渲染器为其他主题创建）时直接读取
        let source = fs::read_to_string(path).map_err(|e| ThemeError::Template {
            message: format!("读取布局失败 {}: {}", path.display(), e),
        })?;
        Ok(Tera::one_off(&source, &context, true)?)
    }
}

/// 覆盖值 -> 前置元数据 `layout` -> 主题默认布局 -> `doc`
pub fn resolve_layout(ctx: &RenderContext<'_>, theme: &Theme) -> LayoutKind {
    ctx.layout
        .clone()
        .or_else(|| ctx.content.layout().map(LayoutKind::from))
        .or_else(|| theme.default_layout())
        .unwrap_or(DEFAULT_LAYOUT)
}

/// 转义 JSON 以便放进单引号属性，结果仍是合法 JSON
pub fn escape_attribute_payload(json: &str) -> String {
    let mut escaped = String::with_capacity(json.len());
    for c in json.chars() {
        match c {
            '<' => escaped.push_str("\\u003c"),
            '>' => escaped.push_str("\\u003e"),
            '&' => escaped.push_str("\\u0026"),
            '\'' => escaped.push_str("\\u0027"),
            _ => escaped.push(c),
        }
    }
    escaped
}

fn is_template_layout(path: &Path) -> bool {
    path.extension().map_or(false, |e| e == "html")
}

fn template_name(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

/// 主题变量（CSS 自定义属性）加上样式文件内容
fn theme_style(theme: &Theme) -> String {
    let mut css = String::new();
    if !theme.variables.is_empty() {
        css.push_str(":root {\n");
        for (key, value) in &theme.variables {
            css.push_str(&format!("  --{}: {};\n", key.trim_start_matches("--"), value));
        }
        css.push_str("}\n");
    }
    css.push_str(&theme.style_text);
    css.replace("</style", "<\\/style")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn content(frontmatter: &[(&str, &str)]) -> ContentFile {
        ContentFile {
            source_path: PathBuf::from("docs/guide.md"),
            route: "/guide".to_string(),
            raw_body: String::new(),
            frontmatter: frontmatter
                .iter()
                .map(|(k, v)| (k.to_string(), serde_yaml::Value::String(v.to_string())))
                .collect(),
            transformed_body: String::new(),
            rendered_html: "<h1 id=\"intro\">Intro</h1>".to_string(),
            toc_items: vec![TocItem {
                level: 1,
                id: "intro".into(),
                text: "Intro".into(),
            }],
            locale: None,
            last_modified: None,
        }
    }

    fn theme(layout: &str) -> Theme {
        let mut layouts = BTreeMap::new();
        layouts.insert(LayoutKind::Home, PathBuf::from("/themes/default/layouts/HomeLayout.tsx"));
        Theme {
            name: "default".into(),
            path: PathBuf::from("/themes/default"),
            layout: Some(PathBuf::from(layout)),
            style: None,
            style_text: "body { color: red; }".into(),
            layouts,
            options: Options::new(),
            variables: BTreeMap::new(),
        }
    }

    #[test]
    fn test_fallback_without_theme() {
        let config = Config::default();
        let page = content(&[("title", "T"), ("description", "D")]);
        let html = Renderer::new(None)
            .unwrap()
            .render(&RenderContext::new(&page, &config, None))
            .unwrap();

        assert!(html.contains("<title>T</title>"));
        assert!(html.contains(r#"<meta name="description" content="D">"#));
        assert!(html.contains("<h1 id=\"intro\">Intro</h1>"));
        assert!(!html.contains("bunpress-theme"));
        assert!(!html.contains("bunpress-app"));
        assert!(!html.contains("data-bunpress"));
        assert!(!html.contains("<script"));
    }

    #[test]
    fn test_fallback_uses_site_title_and_escapes() {
        let config = Config {
            title: "Site <Docs>".into(),
            description: Some("About \"us\"".into()),
            ..Config::default()
        };
        let page = content(&[]);
        let html = Renderer::new(None)
            .unwrap()
            .render_fallback(&RenderContext::new(&page, &config, None))
            .unwrap();
        assert!(html.contains("<title>Site &lt;Docs&gt;</title>"));
        assert!(html.contains("content=\"About &quot;us&quot;\""));
    }

    #[test]
    fn test_themed_page_with_hydration() {
        let config = Config::default();
        let mut t = theme("/themes/default/Layout.tsx");
        t.options.insert("darkMode".into(), serde_yaml::Value::Bool(true));
        t.variables.insert("brand".into(), "#3b82f6".into());
        let page = content(&[("title", "It's <b>bold</b>")]);

        let html = Renderer::new(Some(&t))
            .unwrap()
            .render(&RenderContext::new(&page, &config, Some(&t)))
            .unwrap();

        assert!(html.contains(r#"class="bunpress-theme theme-default dark""#));
        assert!(html.contains(":root {\n  --brand: #3b82f6;\n}"));
        assert!(html.contains("body { color: red; }"));
        assert!(html.contains(r#"data-bunpress-layout="doc""#));
        assert!(html.contains(
            r#"<script type="module" src="/assets/themes/default/Layout.tsx" data-bunpress-hydrate></script>"#
        ));

        let start = html.find("data-bunpress-props='").unwrap() + "data-bunpress-props='".len();
        let end = start + html[start..].find('\'').unwrap();
        let payload = &html[start..end];
        assert!(!payload.contains('<'));
        assert!(payload.contains("It\\u0027s \\u003cb\\u003ebold"));

        let props: serde_json::Value = serde_json::from_str(payload).unwrap();
        assert_eq!(props["frontmatter"]["title"], "It's <b>bold</b>");
        assert_eq!(props["toc"][0]["id"], "intro");
        assert_eq!(props["route"], "/guide");
    }

    #[test]
    fn test_layout_resolution_order() {
        let config = Config::default();
        let mut t = theme("/themes/default/Layout.tsx");
        let page = content(&[("layout", "home")]);

        assert_eq!(resolve_layout(&RenderContext::new(&page, &config, Some(&t)), &t), LayoutKind::Home);
        assert_eq!(
            resolve_layout(&RenderContext::new(&page, &config, Some(&t)).with_layout(LayoutKind::Page), &t),
            LayoutKind::Page
        );

        let plain = content(&[]);
        assert_eq!(resolve_layout(&RenderContext::new(&plain, &config, Some(&t)), &t), LayoutKind::Doc);
        t.options.insert("defaultLayout".into(), serde_yaml::Value::String("home".into()));
        assert_eq!(resolve_layout(&RenderContext::new(&plain, &config, Some(&t)), &t), LayoutKind::Home);

        let html = Renderer::new(Some(&t))
            .unwrap()
            .render(&RenderContext::new(&plain, &config, Some(&t)))
            .unwrap();
        assert!(html.contains("/assets/themes/default/HomeLayout.tsx"));
    }

    #[test]
    fn test_unresolvable_component_degrades_to_fallback() {
        let config = Config::default();
        let mut t = theme("/themes/default/Layout.tsx");
        t.layout = None;
        let page = content(&[("title", "T")]);

        let html = Renderer::new(Some(&t))
            .unwrap()
            .render(&RenderContext::new(&page, &config, Some(&t)))
            .unwrap();
        assert!(!html.contains("bunpress-theme"));
        assert!(html.contains("<title>T</title>"));
    }

    #[test]
    fn test_html_layout_renders_in_process() {
        let dir = TempDir::new().unwrap();
        let layout = dir.path().join("layout.html");
        fs::write(
            &layout,
            "<article>{{ page.title }}|{% for item in toc %}{{ item.id }}{% endfor %}|{{ content | safe }}</article>",
        )
        .unwrap();

        let config = Config::default();
        let t = theme(layout.to_str().unwrap());
        let page = content(&[("title", "Guide")]);
        let html = Renderer::new(Some(&t))
            .unwrap()
            .render(&RenderContext::new(&page, &config, Some(&t)))
            .unwrap();

        assert!(html.contains("<article>Guide|intro|<h1 id=\"intro\">Intro</h1></article>"));
        assert!(html.contains("bunpress-theme"));
        assert!(!html.contains("data-bunpress-hydrate"));
    }

    #[test]
    fn test_escape_attribute_payload() {
        assert_eq!(
            escape_attribute_payload(r#"{"a":"<x & 'y'>"}"#),
            r#"{"a":"\u003cx \u0026 \u0027y\u0027\u003e"}"#
        );
    }
}
