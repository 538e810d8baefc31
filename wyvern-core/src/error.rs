//! 容器统一错误类型
//!
//! 使用 thiserror 定义容器各阶段可能出现的错误，
//! 未归类的错误通过 `Other` 变体携带 anyhow::Error

use thiserror::Error;

/// 容器错误
#[derive(Debug, Error)]
pub enum ContainerError {
    /// 请求的 Bean 不存在
    #[error("bean '{0}' not found")]
    BeanNotFound(String),

    /// 重复注册同名 Bean
    #[error("bean '{0}' already exists")]
    BeanAlreadyExists(String),

    /// Bean 创建失败（工厂或 init 回调报错）
    #[error("bean creation failed: {0}")]
    BeanCreationFailed(String),

    /// 检测到循环依赖
    #[error("circular dependency detected: {0}")]
    CircularDependency(String),

    /// 依赖图校验失败（缺失依赖等）
    #[error("dependency validation failed: {0}")]
    DependencyValidationFailed(String),

    /// Bean 类型与请求类型不匹配
    #[error("type mismatch: expected '{expected}', found '{found}'")]
    TypeMismatch { expected: String, found: String },

    /// 配置已冻结，不允许再修改 Bean 定义
    #[error("configuration is frozen, cannot modify definition '{0}'")]
    ConfigurationFrozen(String),

    /// 日志系统初始化失败
    #[error("logging initialization failed: {0}")]
    LoggingInitFailed(String),

    /// 其他错误
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// 容器统一 Result 类型
pub type ContainerResult<T> = std::result::Result<T, ContainerError>;

// 兼容 anyhow 风格的使用方式
pub use anyhow::Result;
