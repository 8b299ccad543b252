use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tracing::{debug, error, info, warn};
use walkdir::{DirEntry, WalkDir};

use crate::core::error::EngineError;
use crate::core::processor::ContentProcessor;
use crate::core::route::output_path_for_route;
use crate::core::sitemap::{Sitemap, SITEMAP_FILE};
use crate::i18n::{LocaleExpander, Translator};
use crate::models::{BuildIssue, BuildResult, Config, ContentFile, LocaleRoute};
use crate::plugins::i18n::i18n_plugin;
use crate::plugins::{Plugin, PluginManager};
use crate::theme::bundler::BundleEntry;
use crate::theme::{Bundler, CopyBundler, RenderContext, Renderer, ThemeResolver};
use crate::utils::has_extension;

/// 构建编排器
///
/// 一次 `build` 的顺序：插件排序 -> 主题选择 -> `build_start` -> 处理所有内容文件
/// -> 语言展开 -> 渲染写出 -> 静态资源 -> 主题入口打包 -> sitemap -> `build_end`。
pub struct Engine {
    /// 站点根目录
    pub base_dir: PathBuf,
    /// 站点配置
    pub config: Config,
    /// 用户注册的插件
    plugins: PluginManager,
    /// 主题入口打包器
    bundler: Box<dyn Bundler>,
}

impl Engine {
    /// 在站点根目录中查找配置并创建引擎，找不到配置是致命错误
    pub fn new(base_dir: PathBuf) -> Result<Self, EngineError> {
        info!("初始化 BunPress 引擎...");
        info!("工作目录: {}", base_dir.display());
        let (config, _) = Config::discover(&base_dir)?;
        Ok(Self::with_config(base_dir, config))
    }

    pub fn with_config(base_dir: PathBuf, config: Config) -> Self {
        Self {
            base_dir,
            config,
            plugins: PluginManager::new(),
            bundler: Box::new(CopyBundler),
        }
    }

    pub fn add_plugin(&mut self, plugin: Plugin) {
        self.plugins.add(plugin);
    }

    pub fn remove_plugin(&mut self, name: &str) -> Option<Plugin> {
        self.plugins.remove(name)
    }

    pub fn plugins(&self) -> &PluginManager {
        &self.plugins
    }

    pub fn set_bundler<B: Bundler + 'static>(&mut self, bundler: B) {
        self.bundler = Box::new(bundler);
    }

    /// 扫描站点的主题目录
    pub fn discover_themes(&self) -> ThemeResolver {
        let mut resolver = ThemeResolver::new(self.config.theme_validation);
        resolver.discover(&self.config.themes_path(&self.base_dir));
        resolver
    }

    /// 执行一次完整构建
    pub async fn build(&self) -> BuildResult {
        let mut result = BuildResult::new(self.config.out_path(&self.base_dir));
        info!("开始构建: {}", self.base_dir.display());

        match self.run(&mut result).await {
            Ok(()) => {
                info!(
                    "构建完成: 生成 {} 个文件，{} 个问题",
                    result.files_generated.len(),
                    result.errors.len()
                );
                result
            }
            Err(e) => {
                error!("构建失败: {}", e.describe());
                let issue = BuildIssue::new(e.path().map(Path::to_path_buf), e.describe());
                result.fail(issue)
            }
        }
    }

    async fn run(&self, result: &mut BuildResult) -> Result<(), EngineError> {
        let plugins = self.prepare_plugins()?;
        let expander = self.config.i18n.as_ref().map(LocaleExpander::from_config);

        let resolver = self.discover_themes();
        let theme = resolver.select(&self.config.theme)?;
        let renderer = Renderer::new(theme.as_ref())?;

        if let Err(e) = plugins.execute_build_start().await {
            warn!("{}", e);
            result.record(BuildIssue::new(None, e.to_string()));
        }

        let docs_dir = self.config.docs_path(&self.base_dir);
        let sources = collect_sources(&docs_dir, &self.config.markdown.extensions);
        info!("发现 {} 个内容文件", sources.len());

        let processor = ContentProcessor::new(&plugins, &self.config.markdown, expander.as_ref());
        let concurrency = self.config.build.concurrency.max(1);

        let processed: Vec<(PathBuf, Result<ContentFile, EngineError>)> = stream::iter(sources)
            .map(|path| {
                let processor = &processor;
                let docs_dir = &docs_dir;
                async move {
                    let outcome = processor.process(&path, docs_dir).await;
                    (path, outcome)
                }
            })
            .buffered(concurrency)
            .collect()
            .await;

        let mut pages: Vec<ContentFile> = Vec::new();
        let mut routes: HashSet<String> = HashSet::new();
        for (path, outcome) in processed {
            match outcome {
                Ok(page) => {
                    if !routes.insert(page.route.clone()) {
                        warn!("路由冲突: {} 已存在，跳过 {}", page.route, path.display());
                        result.record(BuildIssue::new(Some(path), format!("路由 {} 重复", page.route)));
                        continue;
                    }
                    pages.push(page);
                }
                Err(e) => {
                    warn!("{}", e.describe());
                    result.record(BuildIssue::new(Some(path), e.describe()));
                }
            }
        }

        if let Some(expander) = &expander {
            let jobs = locale_jobs(expander, &pages, &mut routes);
            info!("生成 {} 个语言页面", jobs.len());

            let localized: Vec<(PathBuf, Result<ContentFile, EngineError>)> = stream::iter(jobs)
                .map(|(path, target)| {
                    let processor = &processor;
                    let docs_dir = &docs_dir;
                    async move {
                        let outcome = processor.process_localized(&path, docs_dir, &target).await;
                        (path, outcome)
                    }
                })
                .buffered(concurrency)
                .collect()
                .await;

            for (path, outcome) in localized {
                match outcome {
                    Ok(page) => pages.push(page),
                    Err(e) => {
                        warn!("{}", e.describe());
                        result.record(BuildIssue::new(Some(path), e.describe()));
                    }
                }
            }
        }

        let out_dir = result.output_dir.clone();
        tokio::fs::create_dir_all(&out_dir)
            .await
            .map_err(|source| EngineError::OutputWrite {
                path: out_dir.clone(),
                source,
            })?;

        let mut rendered: Vec<&ContentFile> = Vec::with_capacity(pages.len());
        for page in &pages {
            let ctx = RenderContext::new(page, &self.config, theme.as_ref());
            let html = match renderer.render(&ctx) {
                Ok(html) => html,
                Err(e) => {
                    let err = EngineError::Render {
                        route: page.route.clone(),
                        message: e.to_string(),
                    };
                    warn!("{}", err);
                    result.record(BuildIssue::new(Some(page.source_path.clone()), err.to_string()));
                    continue;
                }
            };

            let target = output_path_for_route(&out_dir, &page.route);
            write_file(&target, html.as_bytes()).await?;
            debug!("生成页面: {} -> {}", page.route, target.display());
            result.files_generated.push(target);
            rendered.push(page);
        }

        let public_dir = self.config.public_path(&self.base_dir);
        let copied = copy_dir(&public_dir, &out_dir).await?;
        if !copied.is_empty() {
            info!("复制了 {} 个静态资源", copied.len());
        }
        result.files_generated.extend(copied);

        if let Some(theme) = &theme {
            let entries = BundleEntry::for_theme(theme);
            if !entries.is_empty() {
                let bundled = self
                    .bundler
                    .bundle(&entries, &out_dir)
                    .map_err(|e| EngineError::Bundle {
                        bundler: self.bundler.name().to_string(),
                        message: format!("{:#}", e),
                    })?;
                debug!("打包了 {} 个主题入口", bundled.len());
                result.files_generated.extend(bundled);
            }
        }

        if self.config.build.sitemap {
            match Sitemap::from_pages(self.config.url.as_deref(), rendered.iter().copied()) {
                Ok(sitemap) => {
                    let path = out_dir.join(SITEMAP_FILE);
                    write_file(&path, sitemap.into_xml().as_bytes()).await?;
                    result.files_generated.push(path);
                }
                Err(e) => {
                    warn!("跳过 sitemap: {:#}", e);
                    result.record(BuildIssue::new(None, format!("{:#}", e)));
                }
            }
        }

        if let Err(e) = plugins.execute_build_end().await {
            warn!("{}", e);
            result.record(BuildIssue::new(None, e.to_string()));
        }

        Ok(())
    }

    /// 本次构建实际使用的插件列表：内置 i18n 插件排在最前，再按依赖排序
    fn prepare_plugins(&self) -> Result<PluginManager, EngineError> {
        let mut plugins = PluginManager::new();

        if let Some(i18n) = &self.config.i18n {
            let translator = Translator::from_config(i18n, &self.base_dir).map_err(|e| {
                EngineError::ConfigParse {
                    path: self.base_dir.join(&i18n.translations_dir),
                    message: format!("{:#}", e),
                }
            })?;
            plugins.add(i18n_plugin(Arc::new(translator)));
        }
        for plugin in self.plugins.plugins() {
            plugins.add(plugin.clone());
        }

        plugins.order_by_dependencies()?;
        info!("已加载 {} 个插件", plugins.len());
        Ok(plugins)
    }
}

/// 需要生成的语言页面：(源文件, 目标路由)
///
/// 与已有路由冲突的展开结果直接跳过，已有的（通常是手写的翻译页面）优先。
fn locale_jobs(
    expander: &LocaleExpander,
    pages: &[ContentFile],
    routes: &mut HashSet<String>,
) -> Vec<(PathBuf, LocaleRoute)> {
    let sources: HashMap<&str, &Path> = pages
        .iter()
        .map(|p| (p.route.as_str(), p.source_path.as_path()))
        .collect();

    let mut jobs = Vec::new();
    for target in expander.expand(pages) {
        if routes.contains(&target.expanded_route) {
            warn!("路由冲突: {} 已有对应页面，跳过 {} 的语言展开", target.expanded_route, target.base_route);
            continue;
        }
        let Some(source) = sources.get(target.base_route.as_str()) else {
            continue;
        };
        routes.insert(target.expanded_route.clone());
        jobs.push((source.to_path_buf(), target));
    }
    jobs
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry
            .file_name()
            .to_str()
            .map(|s| s.starts_with('.'))
            .unwrap_or(false)
}

/// 按文件名排序收集内容目录下的 Markdown 文件
pub fn collect_sources(docs_dir: &Path, extensions: &[String]) -> Vec<PathBuf> {
    if !docs_dir.is_dir() {
        warn!("内容目录不存在: {}", docs_dir.display());
        return Vec::new();
    }

    WalkDir::new(docs_dir)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_hidden(e))
        .filter_map(|e| match e {
            Ok(entry) => Some(entry),
            Err(err) => {
                warn!("无法访问: {}", err);
                None
            }
        })
        .filter(|e| e.file_type().is_file())
        .map(DirEntry::into_path)
        .filter(|p| has_extension(p, extensions))
        .collect()
}

async fn write_file(path: &Path, contents: &[u8]) -> Result<(), EngineError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|source| EngineError::OutputWrite {
                path: parent.to_path_buf(),
                source,
            })?;
    }
    tokio::fs::write(path, contents)
        .await
        .map_err(|source| EngineError::OutputWrite {
            path: path.to_path_buf(),
            source,
        })
}

/// 递归复制目录，源目录不存在时什么也不做
async fn copy_dir(from: &Path, to: &Path) -> Result<Vec<PathBuf>, EngineError> {
    let mut copied = Vec::new();
    if !from.is_dir() {
        return Ok(copied);
    }

    for entry in WalkDir::new(from).sort_by_file_name() {
        let entry = entry.map_err(|e| EngineError::OutputWrite {
            path: e.path().map(Path::to_path_buf).unwrap_or_else(|| from.to_path_buf()),
            source: e.into(),
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(relative) = entry.path().strip_prefix(from) else {
            continue;
        };
        let target = to.join(relative);
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| EngineError::OutputWrite {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }
        tokio::fs::copy(entry.path(), &target)
            .await
            .map_err(|source| EngineError::OutputWrite {
                path: target.clone(),
                source,
            })?;
        copied.push(target);
    }
    Ok(copied)
}
