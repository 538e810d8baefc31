//! TargetSource：代理背后真实对象的获取策略
//!
//! 代理每次调用通过 `get_target` / `release_target` 成对地
//! 借出与归还目标对象，池化/线程本地等策略由此接入。
//! `is_static()` 为 true 表示每次返回同一个实例，
//! 代理层可以一次性确定接口集合并省去逐调用的借还记账

use std::sync::Arc;

use wyvern_core::{ClassDescriptor, Invocable};

use crate::advisor::Advisor;
use crate::error::{AopError, AopResult};

/// 目标对象供应函数：为原型/池化/线程本地策略创建新实例
pub type TargetSupplier = Arc<dyn Fn() -> AopResult<Arc<dyn Invocable>> + Send + Sync>;

/// TargetSource trait
pub trait TargetSource: Send + Sync {
    /// 目标类描述符
    fn target_class(&self) -> Arc<ClassDescriptor>;

    /// 每次调用是否返回同一个实例
    fn is_static(&self) -> bool;

    /// 借出目标对象
    ///
    /// 失败（池耗尽、工厂报错）以 [`AopError::TargetUnavailable`]
    /// 呈现，与目标方法抛出的应用异常明确区分
    fn get_target(&self) -> AopResult<Arc<dyn Invocable>>;

    /// 归还目标对象
    ///
    /// 对每次成功的 `get_target` 必须以同一个实例调用恰好一次；
    /// 跟踪资源的策略会对不匹配的归还报 [`AopError::ReleaseMismatch`]
    fn release_target(&self, target: Arc<dyn Invocable>) -> AopResult<()>;

    /// 策略名称（日志与错误信息）
    fn name(&self) -> &str {
        "TargetSource"
    }

    /// 本策略要求代理额外装配的引入 Advisor（如池统计 mixin）
    fn introduction_advisors(&self) -> Vec<Advisor> {
        Vec::new()
    }

    /// 容器关闭时的清理，尽力而为且可重复调用
    fn dispose(&self) {}
}

/// 单例 TargetSource：始终返回同一个包装实例
pub struct SingletonTargetSource {
    target: Arc<dyn Invocable>,
    class: Arc<ClassDescriptor>,
}

impl SingletonTargetSource {
    pub fn new(target: Arc<dyn Invocable>) -> Self {
        let class = target.class();
        Self { target, class }
    }
}

impl TargetSource for SingletonTargetSource {
    fn target_class(&self) -> Arc<ClassDescriptor> {
        Arc::clone(&self.class)
    }

    fn is_static(&self) -> bool {
        true
    }

    fn get_target(&self) -> AopResult<Arc<dyn Invocable>> {
        Ok(Arc::clone(&self.target))
    }

    fn release_target(&self, _target: Arc<dyn Invocable>) -> AopResult<()> {
        // 共享实例无需归还
        Ok(())
    }

    fn name(&self) -> &str {
        "SingletonTargetSource"
    }
}

/// 原型 TargetSource：每次 `get_target` 都创建新实例
///
/// 归还即丢弃（非池化作用域的处置语义）
pub struct PrototypeTargetSource {
    class: Arc<ClassDescriptor>,
    supplier: TargetSupplier,
}

impl PrototypeTargetSource {
    pub fn new(class: Arc<ClassDescriptor>, supplier: TargetSupplier) -> Self {
        Self { class, supplier }
    }
}

impl TargetSource for PrototypeTargetSource {
    fn target_class(&self) -> Arc<ClassDescriptor> {
        Arc::clone(&self.class)
    }

    fn is_static(&self) -> bool {
        false
    }

    fn get_target(&self) -> AopResult<Arc<dyn Invocable>> {
        (self.supplier)().map_err(|e| AopError::TargetUnavailable {
            source_name: self.name().to_string(),
            reason: e.to_string(),
        })
    }

    fn release_target(&self, target: Arc<dyn Invocable>) -> AopResult<()> {
        tracing::trace!(
            "Dropping prototype instance of '{}' on release",
            self.class.name()
        );
        drop(target);
        Ok(())
    }

    fn name(&self) -> &str {
        "PrototypeTargetSource"
    }
}
