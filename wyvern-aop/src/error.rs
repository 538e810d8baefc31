//! AOP 子系统错误类型
//!
//! 基础设施错误（目标源获取失败、通知形态无法识别、事务失败等）
//! 与目标方法抛出的应用异常分属不同的变体，调用方与日志可以区分

use thiserror::Error;
use wyvern_core::{ContainerError, InvokeError, ThrownException};

/// AOP 错误
#[derive(Debug, Error)]
pub enum AopError {
    /// TargetSource 无法提供目标对象（池耗尽、工厂失败等）
    #[error("failed to obtain target from '{source_name}': {reason}")]
    TargetUnavailable { source_name: String, reason: String },

    /// 归还的对象与借出的实例不匹配（get/release 配对被破坏）
    #[error("object released to '{0}' does not match any instance it handed out")]
    ReleaseMismatch(String),

    /// 提供给代理工厂的对象无法归一化为任何已知的通知形态
    #[error("supplied object cannot be adapted into an advisor: {0}")]
    UnknownAdviceShape(String),

    /// 代理装配失败（缺少目标源等配置错误）
    #[error("proxy assembly failed: {0}")]
    ProxyAssembly(String),

    /// 事务基础设施失败（获取/提交/回滚）
    #[error("transaction failure: {0}")]
    Transaction(String),

    /// 方法调用失败（找不到方法 / 目标抛出应用异常）
    #[error(transparent)]
    Invoke(#[from] InvokeError),

    /// 容器错误
    #[error(transparent)]
    Container(#[from] ContainerError),

    /// 其他错误
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl AopError {
    /// 包装目标方法抛出的应用异常
    pub fn thrown<E: std::error::Error + Send + Sync + 'static>(error: E) -> Self {
        AopError::Invoke(InvokeError::Thrown(ThrownException::new(error)))
    }

    /// 若本错误是目标方法抛出的应用异常，返回异常信息
    pub fn thrown_exception(&self) -> Option<&ThrownException> {
        match self {
            AopError::Invoke(InvokeError::Thrown(thrown)) => Some(thrown),
            _ => None,
        }
    }

    /// 是否为基础设施错误（非应用异常）
    pub fn is_infrastructure(&self) -> bool {
        self.thrown_exception().is_none()
    }
}

/// AOP 统一 Result 类型
pub type AopResult<T> = std::result::Result<T, AopError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, thiserror::Error)]
    #[error("payment declined")]
    struct PaymentDeclined;

    #[test]
    fn test_thrown_exception_accessor() {
        let err = AopError::thrown(PaymentDeclined);
        let thrown = err.thrown_exception().expect("application exception");
        assert!(thrown.type_name().ends_with("PaymentDeclined"));
        assert!(!err.is_infrastructure());
    }

    #[test]
    fn test_infrastructure_errors_are_distinct() {
        let err = AopError::TargetUnavailable {
            source_name: "pool".to_string(),
            reason: "exhausted".to_string(),
        };
        assert!(err.thrown_exception().is_none());
        assert!(err.is_infrastructure());
    }
}
