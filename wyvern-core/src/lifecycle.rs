//! BeanPostProcessor - Bean 工厂扩展机制
//!
//! 提供在 Bean 实例化前与初始化前后进行自定义处理的钩子。
//! AOP 自动代理就是通过这组钩子把符合条件的 Bean 替换为代理的

use std::any::Any;
use std::sync::Arc;

use crate::bean::BeanDefinition;
use crate::error::ContainerResult;

/// BeanPostProcessor trait
///
/// 在 Bean 生命周期的三个阶段提供钩子：
///
/// 1. `post_process_before_instantiation` - 实例化之前。返回 `Some(bean)`
///    会短路常规创建流程，容器直接采用返回的实例（仍会执行
///    after_initialization 阶段）。自定义 TargetSource 的代理走这条路
/// 2. `post_process_before_initialization` - 实例化之后、init 回调之前
/// 3. `post_process_after_initialization` - init 回调之后。
///    包装/替换 Bean（如创建 AOP 代理）的标准位置
pub trait BeanPostProcessor: Send + Sync {
    /// 在 Bean 实例化之前调用
    ///
    /// 返回 `Some` 时短路默认实例化流程
    fn post_process_before_instantiation(
        &self,
        _definition: &BeanDefinition,
        _bean_name: &str,
    ) -> ContainerResult<Option<Arc<dyn Any + Send + Sync>>> {
        Ok(None)
    }

    /// 在 Bean 初始化回调（init）之前调用
    ///
    /// 返回处理后的 Bean 实例（可以是原始 Bean，也可以是包装后的 Bean）
    fn post_process_before_initialization(
        &self,
        bean: Arc<dyn Any + Send + Sync>,
        _bean_name: &str,
    ) -> ContainerResult<Arc<dyn Any + Send + Sync>> {
        Ok(bean)
    }

    /// 在 Bean 初始化回调（init）之后调用
    ///
    /// 返回处理后的 Bean 实例（可以是原始 Bean，也可以是包装后的 Bean）
    fn post_process_after_initialization(
        &self,
        bean: Arc<dyn Any + Send + Sync>,
        _bean_name: &str,
    ) -> ContainerResult<Arc<dyn Any + Send + Sync>> {
        Ok(bean)
    }

    /// 获取处理器的名称（用于日志和调试）
    fn name(&self) -> &str {
        "BeanPostProcessor"
    }

    /// 获取处理器的优先级（数字越小优先级越高）
    fn order(&self) -> i32 {
        1000
    }
}
