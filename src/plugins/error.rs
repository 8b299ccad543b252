use thiserror::Error;

/// 插件错误类型
#[derive(Error, Debug)]
pub enum PluginError {
    #[error("执行钩子失败: 插件 {plugin_name} 在执行 {hook_name} 时出错: {message}")]
    HookError {
        plugin_name: String,
        hook_name: String,
        message: String,
    },

    #[error("依赖错误: {message}")]
    DependencyError {
        message: String,
    },

    #[error("配置错误: {plugin_name} - {message}")]
    ConfigError {
        plugin_name: String,
        message: String,
    },

    #[error("内容处理错误: {plugin_name} - {message}")]
    ContentProcessingError {
        plugin_name: String,
        message: String,
    },
}

/// 插件钩子类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PluginHook {
    /// 内容转换
    Transform,
    /// 构建开始
    BuildStart,
    /// 构建结束
    BuildEnd,
    /// 开发服务器配置
    ConfigureServer,
}

impl PluginHook {
    pub fn as_str(&self) -> &'static str {
        match self {
            PluginHook::Transform => "transform",
            PluginHook::BuildStart => "buildStart",
            PluginHook::BuildEnd => "buildEnd",
            PluginHook::ConfigureServer => "configureServer",
        }
    }
}
