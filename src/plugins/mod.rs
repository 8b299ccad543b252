//! 插件系统
//!
//! 插件是一组可选钩子的集合：`transform` 处理单个文件正文，`build_start` /
//! `build_end` 包住整次构建，`configure_server` 留给开发服务器使用。
//! 缺失的钩子等价于空操作。

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};
use tracing::{debug, info, warn};

use crate::models::{FrontMatter, Options};

mod error;
pub mod i18n;

pub use error::*;

/// 异步钩子的返回值
pub type HookFuture<T> = BoxFuture<'static, anyhow::Result<T>>;
/// 内容转换钩子
pub type TransformHook = Arc<dyn Fn(String, PageContext) -> HookFuture<String> + Send + Sync>;
/// 构建生命周期钩子
pub type LifecycleHook = Arc<dyn Fn() -> HookFuture<()> + Send + Sync>;
/// 开发服务器配置钩子
pub type ConfigureServerHook = Arc<dyn Fn(&mut DevServer) -> anyhow::Result<()> + Send + Sync>;

/// 提供给 `transform` 钩子的页面信息
#[derive(Debug, Clone, Default)]
pub struct PageContext {
    /// 源文件路径
    pub source_path: PathBuf,
    /// 页面路由
    pub route: String,
    /// 前置元数据
    pub frontmatter: FrontMatter,
    /// 有效语言
    pub locale: Option<String>,
}

/// 开发服务器的可配置部分，静态构建不会使用
#[derive(Debug, Clone, Default)]
pub struct DevServer {
    pub port: u16,
    pub root: PathBuf,
    /// 附加响应头
    pub headers: BTreeMap<String, String>,
    /// 额外监听的路径
    pub watch_paths: Vec<PathBuf>,
}

/// 一个已注册的插件
#[derive(Clone)]
pub struct Plugin {
    /// 插件名称（唯一）
    pub name: String,
    /// 插件选项
    pub options: Options,
    pub transform: Option<TransformHook>,
    pub build_start: Option<LifecycleHook>,
    pub build_end: Option<LifecycleHook>,
    pub configure_server: Option<ConfigureServerHook>,
}

impl fmt::Debug for Plugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Plugin")
            .field("name", &self.name)
            .field("options", &self.options)
            .field("transform", &self.transform.is_some())
            .field("build_start", &self.build_start.is_some())
            .field("build_end", &self.build_end.is_some())
            .field("configure_server", &self.configure_server.is_some())
            .finish()
    }
}

impl Plugin {
    /// 创建一个没有任何钩子的插件
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            options: Options::new(),
            transform: None,
            build_start: None,
            build_end: None,
            configure_server: None,
        }
    }

    pub fn with_options(mut self, options: Options) -> Self {
        self.options = options;
        self
    }

    /// 声明依赖的插件，写入 `dependencies` 选项
    pub fn with_dependencies<I, S>(mut self, dependencies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let deps = dependencies
            .into_iter()
            .map(|d| serde_yaml::Value::String(d.into()))
            .collect();
        self.options
            .insert("dependencies".to_string(), serde_yaml::Value::Sequence(deps));
        self
    }

    /// 设置异步转换钩子
    pub fn with_transform<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(String, PageContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<String>> + Send + 'static,
    {
        self.transform = Some(Arc::new(move |content, ctx| hook(content, ctx).boxed()));
        self
    }

    /// 设置同步转换钩子
    pub fn with_sync_transform<F>(mut self, hook: F) -> Self
    where
        F: Fn(&str, &PageContext) -> anyhow::Result<String> + Send + Sync + 'static,
    {
        let hook = Arc::new(hook);
        self.transform = Some(Arc::new(move |content: String, ctx: PageContext| {
            let result = hook(&content, &ctx);
            async move { result }.boxed()
        }));
        self
    }

    pub fn on_build_start<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.build_start = Some(Arc::new(move || hook().boxed()));
        self
    }

    pub fn on_build_end<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.build_end = Some(Arc::new(move || hook().boxed()));
        self
    }

    pub fn on_configure_server<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut DevServer) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.configure_server = Some(Arc::new(hook));
        self
    }

    /// 读取 `dependencies` 选项（字符串或字符串列表）
    pub fn dependencies(&self) -> Vec<String> {
        match self.options.get("dependencies") {
            Some(serde_yaml::Value::String(name)) => vec![name.clone()],
            Some(serde_yaml::Value::Sequence(seq)) => seq
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
            _ => Vec::new(),
        }
    }
}

/// 插件管理器，按注册顺序保存插件
#[derive(Debug, Clone, Default)]
pub struct PluginManager {
    plugins: Vec<Plugin>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    Visiting,
    Done,
}

impl PluginManager {
    /// 创建新的插件管理器
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加插件；同名插件会被原位替换
    pub fn add(&mut self, plugin: Plugin) {
        if let Some(existing) = self.plugins.iter_mut().find(|p| p.name == plugin.name) {
            warn!("插件 {} 已注册，使用新的实例替换", plugin.name);
            *existing = plugin;
        } else {
            debug!("注册插件: {}", plugin.name);
            self.plugins.push(plugin);
        }
    }

    /// 按名称移除插件
    pub fn remove(&mut self, name: &str) -> Option<Plugin> {
        let index = self.plugins.iter().position(|p| p.name == name)?;
        Some(self.plugins.remove(index))
    }

    pub fn get(&self, name: &str) -> Option<&Plugin> {
        self.plugins.iter().find(|p| p.name == name)
    }

    pub fn plugins(&self) -> &[Plugin] {
        &self.plugins
    }

    pub fn names(&self) -> Vec<&str> {
        self.plugins.iter().map(|p| p.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    /// 按声明的依赖重新排序：依赖先于依赖者，无关插件保持注册顺序
    pub fn order_by_dependencies(&mut self) -> Result<(), PluginError> {
        let index: HashMap<&str, usize> = self
            .plugins
            .iter()
            .enumerate()
            .map(|(i, p)| (p.name.as_str(), i))
            .collect();

        let mut marks = vec![Mark::Unvisited; self.plugins.len()];
        let mut order = Vec::with_capacity(self.plugins.len());
        let mut stack = Vec::new();

        for i in 0..self.plugins.len() {
            self.visit(i, &index, &mut marks, &mut order, &mut stack)?;
        }

        let mut slots: Vec<Option<Plugin>> = self.plugins.drain(..).map(Some).collect();
        self.plugins = order.into_iter().filter_map(|i| slots[i].take()).collect();
        debug!("插件执行顺序: {:?}", self.names());
        Ok(())
    }

    fn visit(
        &self,
        i: usize,
        index: &HashMap<&str, usize>,
        marks: &mut [Mark],
        order: &mut Vec<usize>,
        stack: &mut Vec<String>,
    ) -> Result<(), PluginError> {
        match marks[i] {
            Mark::Done => return Ok(()),
            Mark::Visiting => {
                stack.push(self.plugins[i].name.clone());
                return Err(PluginError::DependencyError {
                    message: format!("插件之间存在循环依赖: {}", stack.join(" -> ")),
                });
            }
            Mark::Unvisited => {}
        }

        marks[i] = Mark::Visiting;
        stack.push(self.plugins[i].name.clone());

        for dep in self.plugins[i].dependencies() {
            let Some(&j) = index.get(dep.as_str()) else {
                return Err(PluginError::DependencyError {
                    message: format!("插件 {} 依赖的 {} 未注册", self.plugins[i].name, dep),
                });
            };
            self.visit(j, index, marks, order, stack)?;
        }

        stack.pop();
        marks[i] = Mark::Done;
        order.push(i);
        Ok(())
    }

    /// 依次执行所有插件的 `transform`，前一个的输出是后一个的输入
    ///
    /// 某个插件失败（返回错误或 panic）时记录警告，并以失败前的内容继续。
    pub async fn execute_transform(&self, content: String, context: &PageContext) -> String {
        let mut current = content;

        for plugin in &self.plugins {
            let Some(hook) = &plugin.transform else {
                continue;
            };

            // 钩子本身的调用也放进 async 块，同步 panic 同样会被捕获
            let call = async { hook(current.clone(), context.clone()).await };
            let outcome = AssertUnwindSafe(call).catch_unwind().await;
            match outcome {
                Ok(Ok(next)) => current = next,
                Ok(Err(e)) => {
                    let err = PluginError::ContentProcessingError {
                        plugin_name: plugin.name.clone(),
                        message: format!("{:#}", e),
                    };
                    warn!("{} ({})", err, context.source_path.display());
                }
                Err(_) => {
                    warn!(
                        "插件 {} 处理 {} 时发生 panic，保留之前的内容",
                        plugin.name,
                        context.source_path.display()
                    );
                }
            }
        }

        current
    }

    /// 执行所有插件的 `build_start`
    pub async fn execute_build_start(&self) -> Result<(), PluginError> {
        self.execute_lifecycle(PluginHook::BuildStart).await
    }

    /// 执行所有插件的 `build_end`
    pub async fn execute_build_end(&self) -> Result<(), PluginError> {
        self.execute_lifecycle(PluginHook::BuildEnd).await
    }

    async fn execute_lifecycle(&self, hook: PluginHook) -> Result<(), PluginError> {
        let mut errors = Vec::new();

        for plugin in &self.plugins {
            let callback = match hook {
                PluginHook::BuildStart => plugin.build_start.as_ref(),
                PluginHook::BuildEnd => plugin.build_end.as_ref(),
                _ => None,
            };
            let Some(callback) = callback else {
                continue;
            };

            debug!("插件 {} 执行 {}", plugin.name, hook.as_str());
            if let Err(e) = callback().await {
                errors.push((plugin.name.clone(), format!("{:#}", e)));
            }
        }

        match errors.len() {
            0 => Ok(()),
            1 => {
                let (plugin_name, message) = errors.remove(0);
                Err(PluginError::HookError {
                    plugin_name,
                    hook_name: hook.as_str().to_string(),
                    message,
                })
            }
            _ => Err(PluginError::HookError {
                plugin_name: "multiple".to_string(),
                hook_name: hook.as_str().to_string(),
                message: errors
                    .iter()
                    .map(|(name, message)| format!("{}: {}", name, message))
                    .collect::<Vec<_>>()
                    .join("; "),
            }),
        }
    }

    /// 交给开发服务器使用，静态构建不会调用
    pub fn execute_configure_server(&self, server: &mut DevServer) -> Result<(), PluginError> {
        for plugin in &self.plugins {
            if let Some(hook) = &plugin.configure_server {
                hook(server).map_err(|e| PluginError::HookError {
                    plugin_name: plugin.name.clone(),
                    hook_name: PluginHook::ConfigureServer.as_str().to_string(),
                    message: format!("{:#}", e),
                })?;
            }
        }
        info!("开发服务器配置完成");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    fn marker(name: &str) -> Plugin {
        let tag = format!("[{}]", name);
        Plugin::new(name).with_sync_transform(move |content, _| Ok(format!("{}{}", content, tag)))
    }

    #[tokio::test]
    async fn test_transform_runs_in_registration_order() {
        let mut manager = PluginManager::new();
        manager.add(marker("p1"));
        manager.add(marker("p2"));
        manager.add(marker("p3"));

        let out = manager.execute_transform("x".to_string(), &PageContext::default()).await;
        assert_eq!(out, "x[p1][p2][p3]");
    }

    #[tokio::test]
    async fn test_async_transform_is_awaited_before_next() {
        let mut manager = PluginManager::new();
        manager.add(Plugin::new("slow").with_transform(|content, _| async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            Ok::<_, anyhow::Error>(format!("{}[slow]", content))
        }));
        manager.add(marker("fast"));

        let out = manager.execute_transform("x".to_string(), &PageContext::default()).await;
        assert_eq!(out, "x[slow][fast]");
    }

    #[tokio::test]
    async fn test_failing_transform_keeps_previous_content() {
        let mut manager = PluginManager::new();
        manager.add(marker("p1"));
        manager.add(Plugin::new("broken").with_sync_transform(|_, _| anyhow::bail!("boom")));
        manager.add(Plugin::new("panics").with_sync_transform(|_, _| panic!("kaboom")));
        manager.add(marker("p3"));

        let out = manager.execute_transform("x".to_string(), &PageContext::default()).await;
        assert_eq!(out, "x[p1][p3]");
    }

    #[tokio::test]
    async fn test_missing_hooks_are_noops() {
        let mut manager = PluginManager::new();
        manager.add(Plugin::new("empty"));

        let out = manager.execute_transform("x".to_string(), &PageContext::default()).await;
        assert_eq!(out, "x");
        assert!(manager.execute_build_start().await.is_ok());
        assert!(manager.execute_build_end().await.is_ok());
        assert!(manager.execute_configure_server(&mut DevServer::default()).is_ok());
    }

    #[tokio::test]
    async fn test_lifecycle_hooks_run_in_order_and_report_errors() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut manager = PluginManager::new();
        for name in ["a", "b"] {
            let log = Arc::clone(&log);
            manager.add(Plugin::new(name).on_build_start(move || {
                let log = Arc::clone(&log);
                async move {
                    log.lock().unwrap().push(name);
                    Ok::<(), anyhow::Error>(())
                }
            }));
        }
        manager.add(Plugin::new("bad").on_build_end(|| async { Err::<(), _>(anyhow::anyhow!("nope")) }));

        manager.execute_build_start().await.unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["a", "b"]);

        let err = manager.execute_build_end().await.unwrap_err();
        match err {
            PluginError::HookError { plugin_name, hook_name, message } => {
                assert_eq!(plugin_name, "bad");
                assert_eq!(hook_name, "buildEnd");
                assert_eq!(message, "nope");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_several_failing_hooks_are_reported_together() {
        let mut manager = PluginManager::new();
        for name in ["x", "y"] {
            manager.add(Plugin::new(name).on_build_start(move || async move {
                Err::<(), _>(anyhow::anyhow!("{} failed", name))
            }));
        }

        let err = manager.execute_build_start().await.unwrap_err();
        match err {
            PluginError::HookError { plugin_name, message, .. } => {
                assert_eq!(plugin_name, "multiple");
                assert_eq!(message, "x: x failed; y: y failed");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_add_remove_get() {
        let mut manager = PluginManager::new();
        manager.add(marker("a"));
        manager.add(marker("b"));
        manager.add(Plugin::new("a"));
        assert_eq!(manager.names(), vec!["a", "b"]);
        assert!(manager.get("a").unwrap().transform.is_none());

        assert!(manager.remove("a").is_some());
        assert!(manager.remove("missing").is_none());
        assert_eq!(manager.names(), vec!["b"]);
    }

    #[test]
    fn test_dependency_order() {
        let mut manager = PluginManager::new();
        manager.add(Plugin::new("images").with_dependencies(["i18n"]));
        manager.add(Plugin::new("search"));
        manager.add(Plugin::new("i18n"));

        manager.order_by_dependencies().unwrap();
        assert_eq!(manager.names(), vec!["i18n", "images", "search"]);
    }

    #[test]
    fn test_dependency_cycle_and_unknown() {
        let mut manager = PluginManager::new();
        manager.add(Plugin::new("a").with_dependencies(["b"]));
        manager.add(Plugin::new("b").with_dependencies(["a"]));
        let err = manager.order_by_dependencies().unwrap_err();
        assert!(err.to_string().contains("a -> b -> a"));

        let mut manager = PluginManager::new();
        manager.add(Plugin::new("a").with_dependencies(["ghost"]));
        assert!(matches!(
            manager.order_by_dependencies(),
            Err(PluginError::DependencyError { .. })
        ));
    }

    #[test]
    fn test_configure_server() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let mut manager = PluginManager::new();
        manager.add(Plugin::new("headers").on_configure_server(move |server| {
            counter.fetch_add(1, Ordering::SeqCst);
            server.headers.insert("X-Powered-By".into(), "bunpress".into());
            Ok(())
        }));

        let mut server = DevServer::default();
        manager.execute_configure_server(&mut server).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(server.headers.get("X-Powered-By").map(String::as_str), Some("bunpress"));
    }
}
