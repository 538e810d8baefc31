//! 代理构建与调用入口
//!
//! [`ProxyFactory`] 把配置标志、有序的 Advisor 列表和一个
//! TargetSource 装配成 [`AopProxy`]。代理本身实现 `Invocable`，
//! 可在任何期望 `Arc<dyn Invocable>` 的位置替换原始对象。
//!
//! 接口型代理实现目标类及其全部父类实现接口的去重并集
//! （外加引入接口）；`proxy_target_class` 打开时构建类型代理，
//! 目标类的全部方法都可经代理调用

use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, Weak};

use parking_lot::RwLock;

use wyvern_core::{
    ArgValue, ClassDescriptor, InterfaceDescriptor, Invocable, InvokeError, InvokeResult,
    MethodDescriptor, ReturnValue,
};

use crate::advice::{
    AdviceAdapterRegistry, AfterReturningAdvice, AfterReturningAdviceInterceptor, BeforeAdvice,
    BeforeAdviceInterceptor, MethodInterceptor, ThrowsAdvice, ThrowsAdviceInterceptor,
};
use crate::advisor::Advisor;
use crate::error::{AopError, AopResult};
use crate::invocation::{ChainEntry, ExposedProxyGuard, MethodInvocation};
use crate::pointcut::Pointcut;
use crate::target_source::{SingletonTargetSource, TargetSource};

/// 代理配置标志
///
/// 纯值语义：`copy_from` 只复制标志位，之后对来源的修改
/// 不会影响已经按副本构建的代理
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProxyConfig {
    /// 构建类型代理（按目标类分发），而非接口型代理
    pub proxy_target_class: bool,

    /// 静态目标源时在构建期缓存目标实例，省去逐调用借还
    pub optimize: bool,

    /// 调用期间把代理暴露到线程上下文（AopContext）
    pub expose_proxy: bool,
}

impl ProxyConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// 从另一份配置复制标志值
    pub fn copy_from(&mut self, other: &ProxyConfig) {
        *self = *other;
    }

    pub fn proxy_target_class(mut self, value: bool) -> Self {
        self.proxy_target_class = value;
        self
    }

    pub fn optimize(mut self, value: bool) -> Self {
        self.optimize = value;
        self
    }

    pub fn expose_proxy(mut self, value: bool) -> Self {
        self.expose_proxy = value;
        self
    }
}

/// 代理工厂
pub struct ProxyFactory {
    config: ProxyConfig,
    advisors: Vec<Advisor>,
    explicit_interfaces: Option<Vec<Arc<InterfaceDescriptor>>>,
    target_source: Option<Arc<dyn TargetSource>>,
    adapter_registry: AdviceAdapterRegistry,
}

impl ProxyFactory {
    pub fn new() -> Self {
        Self {
            config: ProxyConfig::default(),
            advisors: Vec::new(),
            explicit_interfaces: None,
            target_source: None,
            adapter_registry: AdviceAdapterRegistry::standard(),
        }
    }

    /// 直接给定目标对象（包装成单例目标源）
    pub fn for_target(target: Arc<dyn Invocable>) -> Self {
        let mut factory = Self::new();
        factory.target_source = Some(Arc::new(SingletonTargetSource::new(target)));
        factory
    }

    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: ProxyConfig) -> &mut Self {
        self.config = config;
        self
    }

    /// 从另一份配置复制标志值（值语义）
    pub fn copy_config_from(&mut self, other: &ProxyConfig) -> &mut Self {
        self.config.copy_from(other);
        self
    }

    pub fn set_target(&mut self, target: Arc<dyn Invocable>) -> &mut Self {
        self.target_source = Some(Arc::new(SingletonTargetSource::new(target)));
        self
    }

    pub fn set_target_source(&mut self, target_source: Arc<dyn TargetSource>) -> &mut Self {
        self.target_source = Some(target_source);
        self
    }

    /// 显式指定代理接口列表（替代从目标类推导的并集）
    pub fn set_interfaces(&mut self, interfaces: Vec<Arc<InterfaceDescriptor>>) -> &mut Self {
        self.explicit_interfaces = Some(interfaces);
        self
    }

    /// 追加一个 Advisor
    pub fn add_advisor(&mut self, advisor: Advisor) -> &mut Self {
        self.advisors.push(advisor);
        self
    }

    /// 追加一个无条件生效的环绕拦截器
    pub fn add_interceptor(&mut self, interceptor: Arc<dyn MethodInterceptor>) -> &mut Self {
        self.advisors.push(Advisor::on_all(interceptor));
        self
    }

    /// 追加一个带切点的环绕拦截器
    pub fn add_interceptor_with_pointcut(
        &mut self,
        pointcut: Pointcut,
        interceptor: Arc<dyn MethodInterceptor>,
    ) -> &mut Self {
        self.advisors.push(Advisor::interception(pointcut, interceptor));
        self
    }

    /// 追加前置通知（适配为环绕拦截器）
    pub fn add_before_advice(&mut self, advice: Arc<dyn BeforeAdvice>) -> &mut Self {
        self.add_interceptor(Arc::new(BeforeAdviceInterceptor::new(advice)))
    }

    /// 追加返回后通知
    pub fn add_after_returning_advice(&mut self, advice: Arc<dyn AfterReturningAdvice>) -> &mut Self {
        self.add_interceptor(Arc::new(AfterReturningAdviceInterceptor::new(advice)))
    }

    /// 追加异常通知
    pub fn add_throws_advice(&mut self, advice: Arc<dyn ThrowsAdvice>) -> &mut Self {
        self.add_interceptor(Arc::new(ThrowsAdviceInterceptor::new(advice)))
    }

    /// 追加任意形态的通知对象
    ///
    /// 经适配器注册表归一化；无法识别的形态在这里（装配期）
    /// 立即失败，而不是拖到首次调用
    pub fn add_advice_bean(&mut self, advice: Arc<dyn Any + Send + Sync>) -> AopResult<&mut Self> {
        let advisor = self.adapter_registry.wrap(advice)?;
        self.advisors.push(advisor);
        Ok(self)
    }

    /// 装配代理
    pub fn build(self) -> AopResult<Arc<AopProxy>> {
        let target_source = self.target_source.ok_or_else(|| {
            AopError::ProxyAssembly("no target or target source configured".to_string())
        })?;
        let target_class = target_source.target_class();

        // 目标源要求的引入（统计 mixin 等）排在用户 Advisor 之前
        let mut advisors = target_source.introduction_advisors();
        advisors.extend(self.advisors);

        // 引入接口：对引入方法的调用永不触达目标对象
        let mut introduced: Vec<Arc<InterfaceDescriptor>> = Vec::new();
        for advisor in &advisors {
            for interface in advisor.introduced_interfaces() {
                if !introduced.iter().any(|i| i.name() == interface.name()) {
                    introduced.push(interface);
                }
            }
        }

        // 接口型代理：显式列表或目标类（含父类）实现接口的去重并集
        let proxied_interfaces = if self.config.proxy_target_class {
            None
        } else {
            Some(match self.explicit_interfaces {
                Some(explicit) => explicit,
                None => target_class.implemented_interfaces(),
            })
        };

        // optimize + 静态目标源：构建期取一次目标，调用期不再借还
        let cached_target = if self.config.optimize && target_source.is_static() {
            Some(target_source.get_target()?)
        } else {
            None
        };

        tracing::debug!(
            "Built proxy for '{}' with {} advisor(s), {} introduced interface(s)",
            target_class.name(),
            advisors.len(),
            introduced.len()
        );

        Ok(Arc::new_cyclic(|weak_self| AopProxy {
            config: self.config,
            advisors,
            proxied_interfaces,
            introduced_interfaces: introduced,
            target_class,
            target_source,
            cached_target,
            chain_cache: RwLock::new(HashMap::new()),
            weak_self: weak_self.clone(),
        }))
    }
}

impl Default for ProxyFactory {
    fn default() -> Self {
        Self::new()
    }
}

/// 归还目标对象的 RAII 守卫
///
/// 无论调用成功、报错还是 panic，都以借出的同一个实例归还；
/// 归还失败只能大声记录（调用结果此时更重要）
struct ReleaseGuard {
    target_source: Arc<dyn TargetSource>,
    target: Arc<dyn Invocable>,
}

impl Drop for ReleaseGuard {
    fn drop(&mut self) {
        if let Err(e) = self.target_source.release_target(Arc::clone(&self.target)) {
            tracing::error!(
                "Failed to release target to '{}': {}",
                self.target_source.name(),
                e
            );
        }
    }
}

/// AOP 代理
///
/// 每次调用：解析方法 → 取适用拦截器链（按方法缓存）→
/// 借出目标 → （可选）暴露代理 → 推进链 → 归还目标。
/// 应用异常原样传播；找不到方法、目标源失败等基础设施错误
/// 以独立的错误形态呈现
pub struct AopProxy {
    config: ProxyConfig,
    advisors: Vec<Advisor>,
    /// None 表示类型代理
    proxied_interfaces: Option<Vec<Arc<InterfaceDescriptor>>>,
    introduced_interfaces: Vec<Arc<InterfaceDescriptor>>,
    target_class: Arc<ClassDescriptor>,
    target_source: Arc<dyn TargetSource>,
    cached_target: Option<Arc<dyn Invocable>>,
    chain_cache: RwLock<HashMap<String, Arc<Vec<ChainEntry>>>>,
    weak_self: Weak<AopProxy>,
}

impl AopProxy {
    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    pub fn target_source(&self) -> &Arc<dyn TargetSource> {
        &self.target_source
    }

    /// 代理实现的接口（接口型代理的并集；类型代理为空）
    pub fn proxied_interfaces(&self) -> &[Arc<InterfaceDescriptor>] {
        self.proxied_interfaces.as_deref().unwrap_or(&[])
    }

    /// 引入贡献的接口
    pub fn introduced_interfaces(&self) -> &[Arc<InterfaceDescriptor>] {
        &self.introduced_interfaces
    }

    /// instanceof 等价判定：代理是否实现指定名称的接口
    pub fn implements_interface(&self, interface_name: &str) -> bool {
        self.proxied_interfaces()
            .iter()
            .chain(self.introduced_interfaces.iter())
            .any(|i| i.name() == interface_name)
    }

    /// 调用代理方法
    pub fn call(&self, method_name: &str, args: Vec<ArgValue>) -> AopResult<ReturnValue> {
        let method = self.resolve_method(method_name)?;
        let chain = self.chain_for(&method);

        let (target, needs_release) = match &self.cached_target {
            Some(cached) => (Arc::clone(cached), false),
            None => (self.target_source.get_target()?, true),
        };

        let _release_guard = needs_release.then(|| ReleaseGuard {
            target_source: Arc::clone(&self.target_source),
            target: Arc::clone(&target),
        });

        let _expose_guard = if self.config.expose_proxy {
            self.weak_self
                .upgrade()
                .map(|proxy| ExposedProxyGuard::expose(proxy as Arc<dyn Invocable>))
        } else {
            None
        };

        let mut invocation = MethodInvocation::new(
            method,
            args,
            target,
            Arc::clone(&self.target_class),
            chain,
        );
        invocation.proceed()
    }

    /// 方法解析
    ///
    /// 引入接口优先（引入方法可能根本不在目标类上）；
    /// 接口型代理只接受并集内声明的方法，类型代理接受
    /// 目标类的全部可达方法
    fn resolve_method(&self, method_name: &str) -> AopResult<MethodDescriptor> {
        for interface in &self.introduced_interfaces {
            if let Some(method) = interface.find_method(method_name) {
                return Ok(method.clone());
            }
        }
        let resolved = match &self.proxied_interfaces {
            Some(interfaces) => interfaces
                .iter()
                .find_map(|i| i.find_method(method_name))
                .cloned(),
            None => self.target_class.find_method(method_name).cloned(),
        };
        resolved.ok_or_else(|| {
            AopError::Invoke(InvokeError::no_such_method(&self.target_class, method_name))
        })
    }

    /// 取该方法的拦截器链（按方法名缓存）
    ///
    /// Advisor 列表在构建期固定，静态匹配结果可以安全缓存；
    /// 运行时匹配器以 Dynamic 条目进链，实参判定留在调用时
    fn chain_for(&self, method: &MethodDescriptor) -> Arc<Vec<ChainEntry>> {
        {
            let cache = self.chain_cache.read();
            if let Some(chain) = cache.get(method.name()) {
                return Arc::clone(chain);
            }
        }

        let chain = Arc::new(self.build_chain(method));
        self.chain_cache
            .write()
            .insert(method.name().to_string(), Arc::clone(&chain));
        chain
    }

    /// 按切点匹配规则装配链：不命中的 Advisor 整体跳过
    fn build_chain(&self, method: &MethodDescriptor) -> Vec<ChainEntry> {
        let mut chain = Vec::new();
        for advisor in &self.advisors {
            match advisor {
                Advisor::Interception {
                    pointcut,
                    interceptor,
                } => {
                    if pointcut.is_universal() {
                        chain.push(ChainEntry::Static(Arc::clone(interceptor)));
                        continue;
                    }
                    if !pointcut.class_filter().matches(&self.target_class) {
                        continue;
                    }
                    let matcher = pointcut.method_matcher();
                    if !matcher.matches(method, &self.target_class) {
                        continue;
                    }
                    if matcher.is_runtime() {
                        chain.push(ChainEntry::Dynamic {
                            interceptor: Arc::clone(interceptor),
                            matcher: Arc::clone(matcher),
                        });
                    } else {
                        chain.push(ChainEntry::Static(Arc::clone(interceptor)));
                    }
                }
                Advisor::Introduction {
                    class_filter,
                    interceptor,
                } => {
                    if class_filter.matches(&self.target_class) {
                        chain.push(ChainEntry::Static(
                            Arc::clone(interceptor) as Arc<dyn MethodInterceptor>
                        ));
                    }
                }
            }
        }
        chain
    }
}

impl Invocable for AopProxy {
    fn class(&self) -> Arc<ClassDescriptor> {
        Arc::clone(&self.target_class)
    }

    fn invoke(&self, method: &str, args: &[ArgValue]) -> InvokeResult {
        match self.call(method, args.to_vec()) {
            Ok(value) => Ok(value),
            Err(AopError::Invoke(invoke_error)) => Err(invoke_error),
            Err(infrastructure) => Err(InvokeError::Infrastructure {
                method: method.to_string(),
                message: infrastructure.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invocation::AopContext;
    use crate::pointcut::{NamePatternMethodMatcher, Pointcut};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use wyvern_core::ThrownException;

    #[derive(Debug, thiserror::Error)]
    #[error("storage offline")]
    struct StorageOffline;

    fn persistable() -> Arc<InterfaceDescriptor> {
        Arc::new(
            InterfaceDescriptor::new("Persistable")
                .with_method("save")
                .with_method("fail"),
        )
    }

    fn auditable() -> Arc<InterfaceDescriptor> {
        Arc::new(InterfaceDescriptor::new("Auditable").with_method("audit"))
    }

    fn order_base_class() -> Arc<ClassDescriptor> {
        Arc::new(ClassDescriptor::new("BaseEntity").with_interface(auditable()))
    }

    fn order_class() -> Arc<ClassDescriptor> {
        Arc::new(
            ClassDescriptor::new("OrderService")
                .with_interface(persistable())
                .with_method("internal_only")
                .with_superclass(order_base_class()),
        )
    }

    struct OrderService {
        thrown: ThrownException,
    }

    impl OrderService {
        fn new() -> Self {
            Self {
                thrown: ThrownException::new(StorageOffline),
            }
        }
    }

    impl Invocable for OrderService {
        fn class(&self) -> Arc<ClassDescriptor> {
            order_class()
        }
        fn invoke(&self, method: &str, _args: &[ArgValue]) -> InvokeResult {
            match method {
                "save" => Ok(Arc::new(String::from("saved"))),
                "audit" => Ok(Arc::new(String::from("audited"))),
                "internal_only" => Ok(Arc::new(String::from("internal"))),
                "fail" => Err(InvokeError::Thrown(self.thrown.clone())),
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

    #[test]
    fn test_interface_proxy_implements_interface_union() {
        // Persistable 来自本类，Auditable 来自父类，去重并集
        let proxy = ProxyFactory::for_target(Arc::new(OrderService::new()))
            .build()
            .unwrap();

        assert!(proxy.implements_interface("Persistable"));
        assert!(proxy.implements_interface("Auditable"));
        assert_eq!(proxy.proxied_interfaces().len(), 2);

        let saved = proxy.call("save", vec![]).unwrap();
        assert_eq!(saved.downcast_ref::<String>().unwrap(), "saved");
        let audited = proxy.call("audit", vec![]).unwrap();
        assert_eq!(audited.downcast_ref::<String>().unwrap(), "audited");
    }

    #[test]
    fn test_interface_proxy_rejects_concrete_only_methods() {
        let proxy = ProxyFactory::for_target(Arc::new(OrderService::new()))
            .build()
            .unwrap();
        // internal_only 只在具体类上，接口型代理不放行
        assert!(matches!(
            proxy.call("internal_only", vec![]),
            Err(AopError::Invoke(InvokeError::NoSuchMethod { .. }))
        ));
    }

    #[test]
    fn test_class_proxy_accepts_all_class_methods() {
        let mut factory = ProxyFactory::for_target(Arc::new(OrderService::new()));
        factory.set_config(ProxyConfig::new().proxy_target_class(true));
        let proxy = factory.build().unwrap();

        let result = proxy.call("internal_only", vec![]).unwrap();
        assert_eq!(result.downcast_ref::<String>().unwrap(), "internal");
    }

    #[test]
    fn test_application_exception_propagates_with_identity() {
        let service = Arc::new(OrderService::new());
        let original = Arc::clone(service.thrown.error());
        let counting = Arc::new(CountingInterceptor::new());

        let mut factory = ProxyFactory::for_target(service);
        factory.add_interceptor(counting.clone());
        let proxy = factory.build().unwrap();

        let error = proxy.call("fail", vec![]).unwrap_err();
        let thrown = error.thrown_exception().expect("application exception");
        // 同一个错误实例，未被包装或改写
        assert!(Arc::ptr_eq(thrown.error(), &original));
        assert_eq!(counting.count(), 1);
    }

    #[test]
    fn test_non_matching_advisor_is_skipped_entirely() {
        let counting = Arc::new(CountingInterceptor::new());
        let save_only = Pointcut::for_method_matcher(Arc::new(NamePatternMethodMatcher::new(
            "save",
        )));

        let mut factory = ProxyFactory::for_target(Arc::new(OrderService::new()));
        factory.add_interceptor_with_pointcut(save_only, counting.clone());
        let proxy = factory.build().unwrap();

        proxy.call("audit", vec![]).unwrap();
        assert_eq!(counting.count(), 0);
        proxy.call("save", vec![]).unwrap();
        assert_eq!(counting.count(), 1);
    }

    #[test]
    fn test_dynamic_matcher_skips_entry_per_call() {
        use crate::pointcut::FnArgsMethodMatcher;

        // 静态部分恒命中，参数判定只放行金额大于 10 的调用
        let counting = Arc::new(CountingInterceptor::new());
        let amount_gate = Pointcut::for_method_matcher(Arc::new(FnArgsMethodMatcher::new(
            |_, _| true,
            |_, _, args| {
                args.first()
                    .and_then(|a| a.downcast_ref::<u32>())
                    .is_some_and(|amount| *amount > 10)
            },
        )));

        let mut factory = ProxyFactory::for_target(Arc::new(OrderService::new()));
        factory.add_interceptor_with_pointcut(amount_gate, counting.clone());
        let proxy = factory.build().unwrap();

        proxy.call("save", vec![Arc::new(5_u32) as ArgValue]).unwrap();
        assert_eq!(counting.count(), 0);
        proxy.call("save", vec![Arc::new(50_u32) as ArgValue]).unwrap();
        assert_eq!(counting.count(), 1);
    }

    #[test]
    fn test_copy_from_has_value_semantics() {
        let mut source = ProxyConfig::new().expose_proxy(true).optimize(true);
        let mut copy = ProxyConfig::new();
        copy.copy_from(&source);

        // 之后修改来源不影响副本
        source.expose_proxy = false;
        source.proxy_target_class = true;
        assert!(copy.expose_proxy);
        assert!(copy.optimize);
        assert!(!copy.proxy_target_class);
    }

    #[test]
    fn test_optimize_caches_static_target() {
        struct CountingSource {
            inner: SingletonTargetSource,
            gets: AtomicUsize,
        }
        impl TargetSource for CountingSource {
            fn target_class(&self) -> Arc<ClassDescriptor> {
                self.inner.target_class()
            }
            fn is_static(&self) -> bool {
                true
            }
            fn get_target(&self) -> AopResult<Arc<dyn Invocable>> {
                self.gets.fetch_add(1, Ordering::SeqCst);
                self.inner.get_target()
            }
            fn release_target(&self, target: Arc<dyn Invocable>) -> AopResult<()> {
                self.inner.release_target(target)
            }
        }

        let source = Arc::new(CountingSource {
            inner: SingletonTargetSource::new(Arc::new(OrderService::new())),
            gets: AtomicUsize::new(0),
        });

        let mut factory = ProxyFactory::new();
        factory
            .set_config(ProxyConfig::new().optimize(true))
            .set_target_source(source.clone());
        let proxy = factory.build().unwrap();

        proxy.call("save", vec![]).unwrap();
        proxy.call("save", vec![]).unwrap();
        // 构建期取一次，此后不再逐调用借出
        assert_eq!(source.gets.load(Ordering::SeqCst), 1);
    }

    /// 自调用目标：outer 经由暴露的代理调用 inner / explode
    struct SelfCalling;

    fn self_calling_class() -> Arc<ClassDescriptor> {
        Arc::new(
            ClassDescriptor::new("SelfCalling")
                .with_interface(Arc::new(
                    InterfaceDescriptor::new("Nested")
                        .with_method("outer")
                        .with_method("inner")
                        .with_method("outer_surviving_failure")
                        .with_method("explode"),
                )),
        )
    }

    impl Invocable for SelfCalling {
        fn class(&self) -> Arc<ClassDescriptor> {
            self_calling_class()
        }
        fn invoke(&self, method: &str, args: &[ArgValue]) -> InvokeResult {
            match method {
                "outer" => {
                    let proxy = AopContext::current_proxy()
                        .expect("proxy must be exposed inside an advised call");
                    let nested = proxy.invoke("inner", &[])?;
                    // 嵌套调用返回后，外层上下文必须完好
                    let still_exposed = AopContext::current_proxy()
                        .is_some_and(|current| Arc::ptr_eq(&current, &proxy));
                    assert!(still_exposed, "outer context corrupted by nested call");
                    Ok(nested)
                }
                "inner" => {
                    assert!(AopContext::current_proxy().is_some());
                    Ok(Arc::new(String::from("nested-result")))
                }
                "outer_surviving_failure" => {
                    let proxy = AopContext::current_proxy().expect("proxy must be exposed");
                    let failure = proxy.invoke("explode", args);
                    assert!(failure.is_err());
                    // 嵌套调用抛出异常后，外层上下文同样要完好
                    let still_exposed = AopContext::current_proxy()
                        .is_some_and(|current| Arc::ptr_eq(&current, &proxy));
                    assert!(still_exposed, "outer context corrupted by nested failure");
                    Ok(Arc::new(String::from("survived")))
                }
                "explode" => Err(InvokeError::thrown(StorageOffline)),
                other => Err(InvokeError::no_such_method(&self.class(), other)),
            }
        }
    }

    #[test]
    fn test_expose_proxy_nested_invocation_round_trips() {
        let counting = Arc::new(CountingInterceptor::new());
        let mut factory = ProxyFactory::for_target(Arc::new(SelfCalling));
        factory.set_config(ProxyConfig::new().expose_proxy(true));
        factory.add_interceptor(counting.clone());
        let proxy = factory.build().unwrap();

        let result = proxy.call("outer", vec![]).unwrap();
        assert_eq!(result.downcast_ref::<String>().unwrap(), "nested-result");
        // 外层 + 嵌套各经过一次通知
        assert_eq!(counting.count(), 2);
        // 调用结束后上下文清空
        assert!(AopContext::current_proxy().is_none());
    }

    #[test]
    fn test_expose_proxy_restores_across_nested_exception() {
        let mut factory = ProxyFactory::for_target(Arc::new(SelfCalling));
        factory.set_config(ProxyConfig::new().expose_proxy(true));
        let proxy = factory.build().unwrap();

        let result = proxy.call("outer_surviving_failure", vec![]).unwrap();
        assert_eq!(result.downcast_ref::<String>().unwrap(), "survived");
        assert!(AopContext::current_proxy().is_none());
    }

    #[test]
    fn test_missing_target_source_fails_assembly() {
        let factory = ProxyFactory::new();
        assert!(matches!(
            factory.build(),
            Err(AopError::ProxyAssembly(_))
        ));
    }
}
