//! 自动代理创建
//!
//! [`AutoProxyCreator`] 以 BeanPostProcessor 的身份挂进容器，
//! 对每个实例化的 Bean 决定是否替换为代理：
//!
//! - 实例化前钩子：非单例作用域且有 TargetSourceCreator 命中时，
//!   用自定义目标源（池化/线程本地/原型）短路创建并直接给出代理；
//!   每个 Bean 名称只装配一次，此后复用同一个代理（长寿命委托）
//! - 初始化后钩子：普通通知路径，基础设施 Bean 不代理、
//!   发现期跳过、按策略解析每 Bean 的 Advisor，命中才包装
//!
//! 循环引用防护用显式的线程本地再入标记，而非调用栈检查

use std::any::Any;
use std::cell::Cell;
use std::collections::HashMap;
use std::sync::{Arc, Weak};

use parking_lot::RwLock;

use wyvern_core::{
    as_invocable, into_bean, BeanDefinition, BeanFactory, BeanPostProcessor, ClassDescriptor,
    ContainerError, ContainerResult, DefaultListableBeanFactory, Invocable, Scope,
};

use crate::advice::{
    AdviceAdapterRegistry, AfterReturningAdvice, BeforeAdvice, IntroductionInterceptor,
    MethodInterceptor, ThrowsAdvice,
};
use crate::advisor::{can_apply, Advisor};
use crate::error::{AopError, AopResult};
use crate::pointcut::wildcard_match;
use crate::pooling::{PoolConfig, PoolingTargetSource};
use crate::proxy::{AopProxy, ProxyConfig, ProxyFactory};
use crate::registry::AdvisorSource;
use crate::target_source::{PrototypeTargetSource, TargetSource, TargetSupplier};
use crate::thread_local::ThreadLocalTargetSource;

/// 每 Bean 的通知解析结果
///
/// "不代理"与"代理但没有额外拦截器"是两种不同的结论：
/// 后者仍然会创建代理（只带公共拦截器，或因自定义目标源而必须代理）
#[derive(Clone)]
pub enum ProxyDecision {
    /// 原样返回 Bean
    DoNotProxy,

    /// 创建代理，但本 Bean 没有专属 Advisor
    ProxyWithoutExtraAdvice,

    /// 创建代理并附加这些专属 Advisor（保持顺序）
    Proxy(Vec<Advisor>),
}

/// 每 Bean 通知解析策略
pub trait AdviceResolutionStrategy: Send + Sync {
    /// 解析该 Bean 的专属 Advisor
    fn resolve(&self, class: &Arc<ClassDescriptor>, bean_name: &str) -> ProxyDecision;

    /// 额外的跳过判定（如：正处于候选 Advisor 发现路径上）
    fn should_skip(&self, _class: &Arc<ClassDescriptor>, _bean_name: &str) -> bool {
        false
    }
}

thread_local! {
    /// 候选 Advisor 发现的再入标记（当前线程）
    static DISCOVERING_ADVISORS: Cell<bool> = const { Cell::new(false) };

    /// 自定义目标源正在物化目标实例的再入标记（当前线程）
    static RESOLVING_TARGET: Cell<bool> = const { Cell::new(false) };
}

/// 当前线程是否正处于候选 Advisor 发现路径上
pub fn advisor_discovery_in_progress() -> bool {
    DISCOVERING_ADVISORS.with(|flag| flag.get())
}

struct DiscoveryGuard {
    previous: bool,
}

impl DiscoveryGuard {
    fn enter() -> Self {
        let previous = DISCOVERING_ADVISORS.with(|flag| flag.replace(true));
        Self { previous }
    }
}

impl Drop for DiscoveryGuard {
    fn drop(&mut self) {
        let previous = self.previous;
        DISCOVERING_ADVISORS.with(|flag| flag.set(previous));
    }
}

struct TargetResolutionGuard {
    previous: bool,
}

impl TargetResolutionGuard {
    fn enter() -> Self {
        let previous = RESOLVING_TARGET.with(|flag| flag.replace(true));
        Self { previous }
    }
}

impl Drop for TargetResolutionGuard {
    fn drop(&mut self) {
        let previous = self.previous;
        RESOLVING_TARGET.with(|flag| flag.set(previous));
    }
}

fn resolving_target() -> bool {
    RESOLVING_TARGET.with(|flag| flag.get())
}

/// Advisor 排序钩子类型
pub type AdvisorSorter = Arc<dyn Fn(Vec<Advisor>) -> Vec<Advisor> + Send + Sync>;

/// 基于 Advisor 来源的解析策略
///
/// 候选 Advisor 经静态适用性检查（[`can_apply`]）过滤；
/// 默认保持发现顺序，可通过 sorter 钩子指定确定性的排序规则
pub struct AdvisorResolutionStrategy {
    source: Arc<dyn AdvisorSource>,
    sorter: Option<AdvisorSorter>,
}

impl AdvisorResolutionStrategy {
    pub fn new(source: Arc<dyn AdvisorSource>) -> Self {
        Self {
            source,
            sorter: None,
        }
    }

    /// 指定 Advisor 排序钩子
    pub fn with_sorter(mut self, sorter: AdvisorSorter) -> Self {
        self.sorter = Some(sorter);
        self
    }
}

impl AdviceResolutionStrategy for AdvisorResolutionStrategy {
    fn resolve(&self, class: &Arc<ClassDescriptor>, bean_name: &str) -> ProxyDecision {
        // 发现期间实例化的 Bean 由 should_skip 放行，避免循环膨胀
        let candidates = {
            let _guard = DiscoveryGuard::enter();
            self.source.find_candidate_advisors()
        };
        let applicable: Vec<Advisor> = candidates
            .into_iter()
            .filter(|advisor| can_apply(advisor, class, None))
            .collect();
        if applicable.is_empty() {
            tracing::trace!("No advisor applies to bean '{}'", bean_name);
            return ProxyDecision::DoNotProxy;
        }
        let ordered = match &self.sorter {
            Some(sorter) => sorter(applicable),
            None => applicable,
        };
        tracing::debug!(
            "Resolved {} advisor(s) for bean '{}'",
            ordered.len(),
            bean_name
        );
        ProxyDecision::Proxy(ordered)
    }

    fn should_skip(&self, _class: &Arc<ClassDescriptor>, bean_name: &str) -> bool {
        if advisor_discovery_in_progress() {
            tracing::trace!(
                "Skipping proxying of bean '{}': advisor discovery in progress on this thread",
                bean_name
            );
            return true;
        }
        false
    }
}

/// 基于 Bean 名称通配符的解析策略
pub struct BeanNameResolutionStrategy {
    patterns: Vec<String>,
    advisors: Vec<Advisor>,
}

impl BeanNameResolutionStrategy {
    pub fn new(patterns: Vec<String>) -> Self {
        Self {
            patterns,
            advisors: Vec::new(),
        }
    }

    /// 名称命中时附加的 Advisor
    pub fn with_advisors(mut self, advisors: Vec<Advisor>) -> Self {
        self.advisors = advisors;
        self
    }
}

impl AdviceResolutionStrategy for BeanNameResolutionStrategy {
    fn resolve(&self, _class: &Arc<ClassDescriptor>, bean_name: &str) -> ProxyDecision {
        let hit = self
            .patterns
            .iter()
            .any(|pattern| wildcard_match(pattern, bean_name));
        if !hit {
            return ProxyDecision::DoNotProxy;
        }
        if self.advisors.is_empty() {
            ProxyDecision::ProxyWithoutExtraAdvice
        } else {
            ProxyDecision::Proxy(self.advisors.clone())
        }
    }
}

/// 自定义 TargetSource 创建策略
///
/// 按注册顺序尝试，第一个非 None 结果胜出
pub trait TargetSourceCreator: Send + Sync {
    fn create_target_source(
        &self,
        class: &Arc<ClassDescriptor>,
        bean_name: &str,
        supplier: TargetSupplier,
    ) -> Option<Arc<dyn TargetSource>>;
}

/// 按 Bean 名称通配符快速映射目标源策略
///
/// 依次尝试：池化 → 线程本地 → 原型
pub struct QuickTargetSourceCreator {
    pooling_patterns: Vec<String>,
    pool_config: PoolConfig,
    thread_local_patterns: Vec<String>,
    prototype_patterns: Vec<String>,
}

impl QuickTargetSourceCreator {
    pub fn new() -> Self {
        Self {
            pooling_patterns: Vec::new(),
            pool_config: PoolConfig::default(),
            thread_local_patterns: Vec::new(),
            prototype_patterns: Vec::new(),
        }
    }

    pub fn pool(mut self, pattern: impl Into<String>) -> Self {
        self.pooling_patterns.push(pattern.into());
        self
    }

    pub fn pool_config(mut self, config: PoolConfig) -> Self {
        self.pool_config = config;
        self
    }

    pub fn thread_local(mut self, pattern: impl Into<String>) -> Self {
        self.thread_local_patterns.push(pattern.into());
        self
    }

    pub fn prototype(mut self, pattern: impl Into<String>) -> Self {
        self.prototype_patterns.push(pattern.into());
        self
    }
}

impl Default for QuickTargetSourceCreator {
    fn default() -> Self {
        Self::new()
    }
}

impl TargetSourceCreator for QuickTargetSourceCreator {
    fn create_target_source(
        &self,
        class: &Arc<ClassDescriptor>,
        bean_name: &str,
        supplier: TargetSupplier,
    ) -> Option<Arc<dyn TargetSource>> {
        if self
            .pooling_patterns
            .iter()
            .any(|p| wildcard_match(p, bean_name))
        {
            match PoolingTargetSource::new(
                Arc::clone(class),
                supplier,
                self.pool_config.clone(),
            ) {
                Ok(source) => return Some(Arc::new(source)),
                Err(e) => {
                    tracing::error!("Failed to create pool for bean '{}': {}", bean_name, e);
                    return None;
                }
            }
        }
        if self
            .thread_local_patterns
            .iter()
            .any(|p| wildcard_match(p, bean_name))
        {
            return Some(Arc::new(ThreadLocalTargetSource::new(
                Arc::clone(class),
                supplier,
            )));
        }
        if self
            .prototype_patterns
            .iter()
            .any(|p| wildcard_match(p, bean_name))
        {
            return Some(Arc::new(PrototypeTargetSource::new(
                Arc::clone(class),
                supplier,
            )));
        }
        None
    }
}

/// 已装配的自定义目标源代理（按 Bean 名称缓存，长寿命委托）
struct TargetSourcedProxy {
    proxy: Arc<AopProxy>,
    target_source: Arc<dyn TargetSource>,
}

/// 自动代理创建器
pub struct AutoProxyCreator {
    config: ProxyConfig,
    strategy: Arc<dyn AdviceResolutionStrategy>,
    common_advisors: RwLock<Vec<Advisor>>,
    apply_common_first: RwLock<bool>,
    target_source_creators: RwLock<Vec<Arc<dyn TargetSourceCreator>>>,
    bean_factory: RwLock<Option<Weak<DefaultListableBeanFactory>>>,
    target_sourced: RwLock<HashMap<String, TargetSourcedProxy>>,
    adapter_registry: AdviceAdapterRegistry,
}

impl AutoProxyCreator {
    pub fn new(strategy: Arc<dyn AdviceResolutionStrategy>) -> Self {
        Self {
            config: ProxyConfig::default(),
            strategy,
            common_advisors: RwLock::new(Vec::new()),
            apply_common_first: RwLock::new(true),
            target_source_creators: RwLock::new(Vec::new()),
            bean_factory: RwLock::new(None),
            target_sourced: RwLock::new(HashMap::new()),
            adapter_registry: AdviceAdapterRegistry::standard(),
        }
    }

    /// 指定代理配置（值复制到每个装配出的代理）
    pub fn with_config(mut self, config: ProxyConfig) -> Self {
        self.config = config;
        self
    }

    /// 公共拦截器在 Bean 专属拦截器之前还是之后
    pub fn set_apply_common_first(&self, first: bool) {
        *self.apply_common_first.write() = first;
    }

    /// 追加一个公共拦截器（所有被代理 Bean 共享，保持顺序）
    pub fn add_common_interceptor(&self, interceptor: Arc<dyn MethodInterceptor>) {
        self.common_advisors.write().push(Advisor::on_all(interceptor));
    }

    /// 追加任意形态的公共通知对象，装配期归一化失败立即报错
    pub fn add_common_advice_bean(&self, advice: Arc<dyn Any + Send + Sync>) -> AopResult<()> {
        let advisor = self.adapter_registry.wrap(advice)?;
        self.common_advisors.write().push(advisor);
        Ok(())
    }

    /// 注册一个 TargetSourceCreator（按顺序尝试）
    pub fn add_target_source_creator(&self, creator: Arc<dyn TargetSourceCreator>) {
        self.target_source_creators.write().push(creator);
    }

    /// 关联 Bean 工厂（弱引用，供目标供应函数回取实例）
    pub fn set_bean_factory(&self, factory: &Arc<DefaultListableBeanFactory>) {
        *self.bean_factory.write() = Some(Arc::downgrade(factory));
    }

    /// 关闭清理：释放所有自定义目标源（幂等，尽力而为）
    pub fn dispose_target_sources(&self) {
        let entries = self.target_sourced.read();
        for (name, entry) in entries.iter() {
            tracing::debug!("Disposing target source for bean '{}'", name);
            entry.target_source.dispose();
        }
    }

    /// 目标供应函数：经容器取一个新的目标实例
    ///
    /// 供应期间设置再入标记，容器里的本创建器对这次创建放行
    fn bean_supplier(&self, bean_name: &str) -> AopResult<TargetSupplier> {
        let weak = self
            .bean_factory
            .read()
            .clone()
            .ok_or_else(|| AopError::Other(anyhow::anyhow!("no bean factory associated")))?;
        let name = bean_name.to_string();
        Ok(Arc::new(move || {
            let factory = weak
                .upgrade()
                .ok_or_else(|| AopError::Other(anyhow::anyhow!("bean factory has been dropped")))?;
            let _guard = TargetResolutionGuard::enter();
            let bean = factory.get_bean(&name)?;
            as_invocable(&bean)
                .ok_or_else(|| AopError::Other(anyhow::anyhow!("bean '{name}' is not invocable")))
        }))
    }

    /// 基础设施 Bean 判定：通知机制自身的组成部分绝不被代理
    fn is_infrastructure_bean(bean: &Arc<dyn Any + Send + Sync>) -> bool {
        bean.downcast_ref::<Advisor>().is_some()
            || bean.downcast_ref::<Arc<dyn MethodInterceptor>>().is_some()
            || bean.downcast_ref::<Arc<dyn IntroductionInterceptor>>().is_some()
            || bean.downcast_ref::<Arc<dyn BeforeAdvice>>().is_some()
            || bean.downcast_ref::<Arc<dyn AfterReturningAdvice>>().is_some()
            || bean.downcast_ref::<Arc<dyn ThrowsAdvice>>().is_some()
            || bean.downcast_ref::<Arc<AutoProxyCreator>>().is_some()
    }

    /// 公共 + 专属 Advisor 按配置顺序合并后装配代理
    fn build_proxy(
        &self,
        target_source: Arc<dyn TargetSource>,
        extra_advisors: Vec<Advisor>,
    ) -> AopResult<Arc<AopProxy>> {
        let mut factory = ProxyFactory::new();
        factory.copy_config_from(&self.config);
        factory.set_target_source(target_source);

        let common = self.common_advisors.read().clone();
        let (first, second) = if *self.apply_common_first.read() {
            (common, extra_advisors)
        } else {
            (extra_advisors, common)
        };
        for advisor in first.into_iter().chain(second) {
            factory.add_advisor(advisor);
        }
        factory.build()
    }

    fn to_container_error(error: AopError) -> ContainerError {
        match error {
            AopError::Container(inner) => inner,
            other => ContainerError::Other(anyhow::Error::new(other)),
        }
    }
}

impl BeanPostProcessor for AutoProxyCreator {
    /// 自定义目标源路径（非单例作用域 + 携带类描述符的定义）
    fn post_process_before_instantiation(
        &self,
        definition: &BeanDefinition,
        bean_name: &str,
    ) -> ContainerResult<Option<Arc<dyn Any + Send + Sync>>> {
        // 目标供应路径上的再入：放行，走常规创建
        if resolving_target() {
            return Ok(None);
        }

        // 已装配过的 Bean 复用同一个代理（长寿命委托）
        if let Some(entry) = self.target_sourced.read().get(bean_name) {
            let proxy: Arc<dyn Invocable> = Arc::clone(&entry.proxy) as Arc<dyn Invocable>;
            return Ok(Some(into_bean(proxy)));
        }

        // 自定义目标源只对非单例作用域有意义
        if definition.scope == Scope::Singleton {
            return Ok(None);
        }
        let Some(class) = definition.class_descriptor.clone() else {
            return Ok(None);
        };
        let creators = self.target_source_creators.read().clone();
        if creators.is_empty() {
            return Ok(None);
        }

        let supplier = self
            .bean_supplier(bean_name)
            .map_err(Self::to_container_error)?;

        for creator in creators {
            let Some(target_source) =
                creator.create_target_source(&class, bean_name, Arc::clone(&supplier))
            else {
                continue;
            };
            tracing::info!(
                "Bean '{}' gets custom target source '{}'",
                bean_name,
                target_source.name()
            );

            // 即使没有任何通知命中，自定义目标源也要求代理
            let extra = match self.strategy.resolve(&class, bean_name) {
                ProxyDecision::Proxy(advisors) => advisors,
                ProxyDecision::DoNotProxy | ProxyDecision::ProxyWithoutExtraAdvice => Vec::new(),
            };
            let proxy = self
                .build_proxy(Arc::clone(&target_source), extra)
                .map_err(Self::to_container_error)?;

            self.target_sourced.write().insert(
                bean_name.to_string(),
                TargetSourcedProxy {
                    proxy: Arc::clone(&proxy),
                    target_source,
                },
            );
            let proxy: Arc<dyn Invocable> = proxy as Arc<dyn Invocable>;
            return Ok(Some(into_bean(proxy)));
        }
        Ok(None)
    }

    /// 普通通知路径
    fn post_process_after_initialization(
        &self,
        bean: Arc<dyn Any + Send + Sync>,
        bean_name: &str,
    ) -> ContainerResult<Arc<dyn Any + Send + Sync>> {
        // 基础设施防护：通知机制不代理自己（无条件，最先判定）
        if Self::is_infrastructure_bean(&bean) {
            tracing::trace!("Bean '{}' is AOP infrastructure, never proxied", bean_name);
            return Ok(bean);
        }
        // 目标供应路径上的实例原样进池/线程本地，不再包装
        if resolving_target() {
            return Ok(bean);
        }
        // 自定义目标源路径已经给出代理
        if self.target_sourced.read().contains_key(bean_name) {
            return Ok(bean);
        }
        // 只有参与动态分发的 Bean 才可能被代理
        let Some(invocable) = as_invocable(&bean) else {
            return Ok(bean);
        };
        let class = invocable.class();
        if self.strategy.should_skip(&class, bean_name) {
            return Ok(bean);
        }

        let extra = match self.strategy.resolve(&class, bean_name) {
            ProxyDecision::DoNotProxy => return Ok(bean),
            ProxyDecision::ProxyWithoutExtraAdvice => Vec::new(),
            ProxyDecision::Proxy(advisors) => advisors,
        };

        tracing::info!("Wrapping bean '{}' with AOP proxy", bean_name);
        let target_source = Arc::new(crate::target_source::SingletonTargetSource::new(invocable));
        let proxy = self
            .build_proxy(target_source, extra)
            .map_err(Self::to_container_error)?;
        let proxy: Arc<dyn Invocable> = proxy as Arc<dyn Invocable>;
        Ok(into_bean(proxy))
    }

    fn name(&self) -> &str {
        "AutoProxyCreator"
    }

    /// 在其他处理器之后执行，确保 Bean 已完全初始化
    fn order(&self) -> i32 {
        2000
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invocation::MethodInvocation;
    use crate::pointcut::{NamePatternClassFilter, NamePatternMethodMatcher, Pointcut};
    use crate::registry::AdvisorRegistry;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use wyvern_core::{
        ArgValue, ConfigurableBeanFactory, InterfaceDescriptor, InvokeError, InvokeResult,
        ReturnValue,
    };

    fn worker_interface() -> Arc<InterfaceDescriptor> {
        Arc::new(InterfaceDescriptor::new("Worker").with_method("work"))
    }

    fn worker_class() -> Arc<ClassDescriptor> {
        Arc::new(ClassDescriptor::new("WorkerService").with_interface(worker_interface()))
    }

    struct WorkerService;
    impl Invocable for WorkerService {
        fn class(&self) -> Arc<ClassDescriptor> {
            worker_class()
        }
        fn invoke(&self, method: &str, _args: &[ArgValue]) -> InvokeResult {
            match method {
                "work" => Ok(Arc::new(String::from("done"))),
                other => Err(InvokeError::no_such_method(&self.class(), other)),
            }
        }
    }

    struct CountingInterceptor(AtomicUsize);
    impl CountingInterceptor {
        fn new() -> Self {
            Self(AtomicUsize::new(0))
        }
        fn count(&self) -> usize {
            self.0.load(Ordering::SeqCst)
        }
    }
    impl MethodInterceptor for CountingInterceptor {
        fn invoke(&self, invocation: &mut MethodInvocation) -> AopResult<ReturnValue> {
            self.0.fetch_add(1, Ordering::SeqCst);
            invocation.proceed()
        }
        fn name(&self) -> &str {
            "CountingInterceptor"
        }
    }

    fn work_advisor(interceptor: Arc<dyn MethodInterceptor>) -> Advisor {
        Advisor::interception(
            Pointcut::new(
                Arc::new(NamePatternClassFilter::new("*Service")),
                Arc::new(NamePatternMethodMatcher::new("work")),
            ),
            interceptor,
        )
    }

    fn creator_with_registry(registry: Arc<AdvisorRegistry>) -> Arc<AutoProxyCreator> {
        Arc::new(AutoProxyCreator::new(Arc::new(
            AdvisorResolutionStrategy::new(registry),
        )))
    }

    fn register_worker(factory: &Arc<DefaultListableBeanFactory>, name: &str, scope: Scope) {
        factory
            .register_bean_definition(
                BeanDefinition::invocable(name, worker_class(), || {
                    Ok(Arc::new(WorkerService) as Arc<dyn Invocable>)
                })
                .with_scope(scope),
            )
            .unwrap();
    }

    #[test]
    fn test_matching_bean_is_wrapped() {
        let registry = Arc::new(AdvisorRegistry::new());
        let counting = Arc::new(CountingInterceptor::new());
        registry.register("work", work_advisor(counting.clone()));

        let factory = Arc::new(DefaultListableBeanFactory::new());
        let creator = creator_with_registry(registry);
        creator.set_bean_factory(&factory);
        factory.add_bean_post_processor(creator);

        register_worker(&factory, "workerService", Scope::Singleton);

        let bean = factory.get_bean("workerService").unwrap();
        let proxy = as_invocable(&bean).expect("proxied bean stays invocable");
        let result = proxy.invoke("work", &[]).unwrap();
        assert_eq!(result.downcast_ref::<String>().unwrap(), "done");
        assert_eq!(counting.count(), 1);
    }

    #[test]
    fn test_unmatched_bean_is_returned_unchanged() {
        let registry = Arc::new(AdvisorRegistry::new());
        let counting = Arc::new(CountingInterceptor::new());
        // 只匹配 Repository 类，Service 不命中
        registry.register(
            "repo-only",
            Advisor::interception(
                Pointcut::for_class_filter(Arc::new(NamePatternClassFilter::new("*Repository"))),
                counting.clone(),
            ),
        );

        let factory = Arc::new(DefaultListableBeanFactory::new());
        let creator = creator_with_registry(registry);
        creator.set_bean_factory(&factory);
        factory.add_bean_post_processor(creator);

        register_worker(&factory, "workerService", Scope::Singleton);

        let bean = factory.get_bean("workerService").unwrap();
        let invocable = as_invocable(&bean).unwrap();
        invocable.invoke("work", &[]).unwrap();
        assert_eq!(counting.count(), 0);
    }

    #[test]
    fn test_interceptor_bean_is_never_proxied() {
        let registry = Arc::new(AdvisorRegistry::new());
        // 通配一切的 Advisor，原则上对任何类都适用
        let counting = Arc::new(CountingInterceptor::new());
        registry.register("all", Advisor::on_all(counting));

        let factory = Arc::new(DefaultListableBeanFactory::new());
        let creator = creator_with_registry(registry);
        creator.set_bean_factory(&factory);
        factory.add_bean_post_processor(creator);

        // 注册一个本身就是 MethodInterceptor 的 Bean
        factory
            .register_bean_definition(BeanDefinition::new("auditInterceptor", {
                wyvern_core::FunctionFactory::new(|| {
                    Ok(Arc::new(CountingInterceptor::new()) as Arc<dyn MethodInterceptor>)
                })
            }))
            .unwrap();

        let bean = factory.get_bean("auditInterceptor").unwrap();
        // 原样返回：载荷仍是拦截器本身，不是代理
        assert!(bean.downcast_ref::<Arc<dyn MethodInterceptor>>().is_some());
    }

    #[test]
    fn test_discovery_reentrancy_flag_is_scoped() {
        struct ProbingSource {
            observed: Arc<AtomicBool>,
        }
        impl AdvisorSource for ProbingSource {
            fn find_candidate_advisors(&self) -> Vec<Advisor> {
                // 发现路径内：标记必须竖起
                self.observed
                    .store(advisor_discovery_in_progress(), Ordering::SeqCst);
                Vec::new()
            }
        }

        let observed = Arc::new(AtomicBool::new(false));
        let strategy = AdvisorResolutionStrategy::new(Arc::new(ProbingSource {
            observed: Arc::clone(&observed),
        }));

        assert!(!advisor_discovery_in_progress());
        strategy.resolve(&worker_class(), "anyBean");
        assert!(observed.load(Ordering::SeqCst));
        // 发现结束后标记复原
        assert!(!advisor_discovery_in_progress());
    }

    #[test]
    fn test_bean_name_strategy_decisions() {
        let strategy = BeanNameResolutionStrategy::new(vec!["*Service".to_string()]);
        assert!(matches!(
            strategy.resolve(&worker_class(), "workerService"),
            ProxyDecision::ProxyWithoutExtraAdvice
        ));
        assert!(matches!(
            strategy.resolve(&worker_class(), "workerRepository"),
            ProxyDecision::DoNotProxy
        ));
    }

    #[test]
    fn test_pooled_bean_gets_custom_target_source() {
        let registry = Arc::new(AdvisorRegistry::new());
        let factory = Arc::new(DefaultListableBeanFactory::new());
        let creator = creator_with_registry(registry);
        creator.set_bean_factory(&factory);
        creator.add_target_source_creator(Arc::new(
            QuickTargetSourceCreator::new().pool("pooled*"),
        ));
        factory.add_bean_post_processor(creator);

        register_worker(&factory, "pooledWorker", Scope::Prototype);

        let bean = factory.get_bean("pooledWorker").unwrap();
        let proxy = as_invocable(&bean).unwrap();

        let result = proxy.invoke("work", &[]).unwrap();
        assert_eq!(result.downcast_ref::<String>().unwrap(), "done");

        // 池统计 mixin 可以直接对代理调用
        let active = proxy.invoke("pool_active_count", &[]).unwrap();
        assert_eq!(active.downcast_ref::<usize>(), Some(&0));
        let max = proxy.invoke("pool_max_size", &[]).unwrap();
        assert_eq!(max.downcast_ref::<usize>(), Some(&PoolConfig::default().max_size));
    }

    #[test]
    fn test_target_sourced_proxy_is_reused() {
        let registry = Arc::new(AdvisorRegistry::new());
        let factory = Arc::new(DefaultListableBeanFactory::new());
        let creator = creator_with_registry(registry);
        creator.set_bean_factory(&factory);
        creator.add_target_source_creator(Arc::new(
            QuickTargetSourceCreator::new().thread_local("session*"),
        ));
        factory.add_bean_post_processor(creator);

        register_worker(&factory, "sessionWorker", Scope::Prototype);

        let first = factory.get_bean("sessionWorker").unwrap();
        let second = factory.get_bean("sessionWorker").unwrap();
        let first = as_invocable(&first).unwrap();
        let second = as_invocable(&second).unwrap();
        // 原型作用域的 Bean 背后是同一个长寿命代理
        assert!(Arc::ptr_eq(&first, &second));

        first.invoke("work", &[]).unwrap();
        let hits = first.invoke("thread_local_miss_count", &[]).unwrap();
        assert_eq!(hits.downcast_ref::<usize>(), Some(&1));
    }

    #[test]
    fn test_common_interceptors_combine_with_specific_ones() {
        struct Recording {
            tag: &'static str,
            log: Arc<parking_lot::Mutex<Vec<&'static str>>>,
        }
        impl MethodInterceptor for Recording {
            fn invoke(&self, invocation: &mut MethodInvocation) -> AopResult<ReturnValue> {
                self.log.lock().push(self.tag);
                invocation.proceed()
            }
        }

        let log = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let registry = Arc::new(AdvisorRegistry::new());
        registry.register(
            "specific",
            Advisor::on_all(Arc::new(Recording {
                tag: "specific",
                log: Arc::clone(&log),
            })),
        );

        let factory = Arc::new(DefaultListableBeanFactory::new());
        let creator = creator_with_registry(registry);
        creator.set_bean_factory(&factory);
        creator.add_common_interceptor(Arc::new(Recording {
            tag: "common",
            log: Arc::clone(&log),
        }));
        factory.add_bean_post_processor(creator);

        register_worker(&factory, "workerService", Scope::Singleton);

        let bean = factory.get_bean("workerService").unwrap();
        as_invocable(&bean).unwrap().invoke("work", &[]).unwrap();
        // 默认公共拦截器在前
        assert_eq!(*log.lock(), vec!["common", "specific"]);
    }
}
