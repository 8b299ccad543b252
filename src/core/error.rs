use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::plugins::PluginError;
use crate::theme::ThemeError;

/// 构建引擎错误类型
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("找不到站点配置文件: {dir} (支持 {candidates})")]
    ConfigNotFound {
        dir: PathBuf,
        candidates: String,
    },

    #[error("解析配置文件失败: {path} - {message}")]
    ConfigParse {
        path: PathBuf,
        message: String,
    },

    #[error("读取文件失败: {path}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("写入输出失败: {path}")]
    OutputWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("渲染失败: {route} - {message}")]
    Render {
        route: String,
        message: String,
    },

    #[error("打包主题资源失败 ({bundler}): {message}")]
    Bundle {
        bundler: String,
        message: String,
    },

    #[error(transparent)]
    Plugin(#[from] PluginError),

    #[error(transparent)]
    Theme(#[from] ThemeError),
}

impl EngineError {
    /// 与错误相关的文件
    pub fn path(&self) -> Option<&Path> {
        match self {
            EngineError::ConfigNotFound { dir, .. } => Some(dir.as_path()),
            EngineError::ConfigParse { path, .. }
            | EngineError::FileRead { path, .. }
            | EngineError::OutputWrite { path, .. } => Some(path.as_path()),
            _ => None,
        }
    }

    /// 连同底层原因一起输出的错误描述
    pub fn describe(&self) -> String {
        let mut message = self.to_string();
        let mut source = std::error::Error::source(self);
        while let Some(inner) = source {
            message.push_str(": ");
            message.push_str(&inner.to_string());
            source = inner.source();
        }
        message
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_describe_includes_source() {
        let err = EngineError::FileRead {
            path: PathBuf::from("docs/a.md"),
            source: io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        };
        assert_eq!(err.path(), Some(Path::new("docs/a.md")));
        assert_eq!(err.describe(), "读取文件失败: docs/a.md: denied");
    }
}
