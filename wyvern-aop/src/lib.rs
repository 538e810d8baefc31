//! Wyvern AOP - 面向切面编程支持
//!
//! 提供动态代理与方法拦截核心：
//! - 切点原语与组合（类过滤器 / 方法匹配器，静态与运行时两类）
//! - Advisor 模型（环绕拦截与接口引入）
//! - 目标源策略（单例 / 原型 / 池化 / 线程本地）
//! - 代理构建与拦截器链分发（含代理暴露上下文）
//! - 容器集成的自动代理创建
//! - 事务拦截器与回滚规则

pub mod advice;
pub mod advisor;
pub mod auto_proxy;
pub mod composition;
pub mod error;
pub mod invocation;
pub mod plugin;
pub mod pointcut;
pub mod pooling;
pub mod proxy;
pub mod registry;
pub mod target_source;
pub mod thread_local;
pub mod transaction;
pub mod transaction_interceptor;

// 重新导出核心类型
pub use advice::{
    AdviceAdapter, AdviceAdapterRegistry, AfterReturningAdvice, AfterReturningAdviceInterceptor,
    BeforeAdvice, BeforeAdviceInterceptor, IntroductionInterceptor, MethodInterceptor,
    ThrowsAdvice, ThrowsAdviceInterceptor,
};
pub use advisor::{can_apply, can_apply_pointcut, Advisor};
pub use auto_proxy::{
    advisor_discovery_in_progress, AdviceResolutionStrategy, AdvisorResolutionStrategy,
    AdvisorSorter, AutoProxyCreator, BeanNameResolutionStrategy, ProxyDecision,
    QuickTargetSourceCreator, TargetSourceCreator,
};
pub use composition::{ClassFilters, ComposablePointcut, MethodMatchers};
pub use error::{AopError, AopResult};
pub use invocation::{AopContext, MethodInvocation};
pub use plugin::AopPlugin;
pub use pointcut::{
    true_class_filter, true_method_matcher, wildcard_match, ClassFilter, FnArgsMethodMatcher,
    FnClassFilter, FnMethodMatcher, MethodMatcher, NamePatternClassFilter,
    NamePatternMethodMatcher, Pointcut, Pointcuts, TrueClassFilter, TrueMethodMatcher,
};
pub use pooling::{pool_stats_interface, PoolConfig, PoolingTargetSource};
pub use proxy::{AopProxy, ProxyConfig, ProxyFactory};
pub use registry::{
    global_advisor_registry, AdvisorRegistration, AdvisorRegistry, AdvisorSource,
};
pub use target_source::{
    PrototypeTargetSource, SingletonTargetSource, TargetSource, TargetSupplier,
};
pub use thread_local::{thread_local_stats_interface, ThreadLocalTargetSource};
pub use transaction::{
    current_transaction_status, Isolation, MethodMapTransactionAttributeSource,
    PlatformTransactionManager, Propagation, TransactionAttribute, TransactionAttributeSource,
    TransactionStatus,
};
pub use transaction_interceptor::{
    transaction_advisor, transaction_pointcut, TransactionInterceptor,
};

// 导出 inventory，供 Advisor 编译期注册使用
pub use inventory;

/// 预导入模块
pub mod prelude {
    pub use crate::advice::{
        AdviceAdapterRegistry, AfterReturningAdvice, BeforeAdvice, IntroductionInterceptor,
        MethodInterceptor, ThrowsAdvice,
    };
    pub use crate::advisor::{can_apply, Advisor};
    pub use crate::auto_proxy::{
        AdviceResolutionStrategy, AdvisorResolutionStrategy, AutoProxyCreator,
        BeanNameResolutionStrategy, ProxyDecision, QuickTargetSourceCreator, TargetSourceCreator,
    };
    pub use crate::composition::{ClassFilters, ComposablePointcut, MethodMatchers};
    pub use crate::error::{AopError, AopResult};
    pub use crate::invocation::{AopContext, MethodInvocation};
    pub use crate::plugin::AopPlugin;
    pub use crate::pointcut::{
        ClassFilter, MethodMatcher, NamePatternClassFilter, NamePatternMethodMatcher, Pointcut,
        Pointcuts,
    };
    pub use crate::pooling::{PoolConfig, PoolingTargetSource};
    pub use crate::proxy::{AopProxy, ProxyConfig, ProxyFactory};
    pub use crate::registry::{global_advisor_registry, AdvisorRegistry, AdvisorSource};
    pub use crate::target_source::{
        PrototypeTargetSource, SingletonTargetSource, TargetSource, TargetSupplier,
    };
    pub use crate::thread_local::ThreadLocalTargetSource;
    pub use crate::transaction::{
        current_transaction_status, Isolation, MethodMapTransactionAttributeSource,
        PlatformTransactionManager, Propagation, TransactionAttribute, TransactionAttributeSource,
        TransactionStatus,
    };
    pub use crate::transaction_interceptor::{
        transaction_advisor, transaction_pointcut, TransactionInterceptor,
    };
}
