//! 应用上下文
//!
//! ApplicationContext 是容器的门面，持有 BeanFactory 与 Environment，
//! 并负责关闭流程（shutdown hooks + 单例销毁）

use std::any::Any;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::bean::{BeanDefinition, FunctionFactory, Scope};
use crate::bean_factory::{
    BeanFactory, BeanFactoryExt, ConfigurableBeanFactory, ConfigurableListableBeanFactory,
    DefaultListableBeanFactory, ListableBeanFactory,
};
use crate::config::{Environment, PropertySource};
use crate::constants;
use crate::error::{ContainerError, ContainerResult};
use crate::lifecycle::BeanPostProcessor;

/// Shutdown hook 类型
pub type ShutdownHook = Box<dyn Fn() -> ContainerResult<()> + Send + Sync>;

/// 容器 trait - 定义依赖注入容器的核心接口
pub trait Container: Send + Sync {
    /// 注册 Bean 定义
    fn register(&self, definition: BeanDefinition) -> ContainerResult<()>;

    /// 通过名称获取 Bean
    fn get_bean(&self, name: &str) -> ContainerResult<Arc<dyn Any + Send + Sync>>;

    /// 检查是否包含指定名称的 Bean
    fn contains_bean(&self, name: &str) -> bool;

    /// 获取所有 Bean 的名称
    fn get_bean_names(&self) -> Vec<String>;
}

/// 应用上下文 - Container 的默认实现
pub struct ApplicationContext {
    /// Bean 工厂 - 负责 Bean 的创建和管理
    bean_factory: Arc<DefaultListableBeanFactory>,

    /// 配置环境
    environment: Arc<Environment>,

    /// Shutdown hooks
    shutdown_hooks: RwLock<Vec<ShutdownHook>>,
}

impl ApplicationContext {
    pub fn new() -> Self {
        Self {
            bean_factory: Arc::new(DefaultListableBeanFactory::new()),
            environment: Arc::new(Environment::new()),
            shutdown_hooks: RwLock::new(Vec::new()),
        }
    }

    /// 构建器模式创建上下文
    pub fn builder() -> ApplicationContextBuilder {
        ApplicationContextBuilder::new()
    }

    /// 获取底层 BeanFactory
    pub fn bean_factory(&self) -> &Arc<DefaultListableBeanFactory> {
        &self.bean_factory
    }

    /// 获取 Environment
    pub fn environment(&self) -> &Arc<Environment> {
        &self.environment
    }

    /// 添加 BeanPostProcessor
    pub fn add_bean_post_processor(&self, processor: Arc<dyn BeanPostProcessor>) {
        self.bean_factory.add_bean_post_processor(processor);
    }

    /// 通过类型获取 Bean
    pub fn get_bean_by_type<T: Any + Send + Sync>(&self) -> ContainerResult<Arc<T>> {
        self.bean_factory.get_bean_by_type::<T>()
    }

    /// 注册 shutdown hook（关闭时按注册顺序执行）
    pub fn register_shutdown_hook<F>(&self, hook: F)
    where
        F: Fn() -> ContainerResult<()> + Send + Sync + 'static,
    {
        let mut hooks = self.shutdown_hooks.write();
        hooks.push(Box::new(hook));
        tracing::debug!("Registered shutdown hook, total: {}", hooks.len());
    }

    /// 校验所有 Bean 的依赖关系（缺失依赖 + 循环依赖）
    pub fn validate_dependencies(&self) -> ContainerResult<()> {
        use crate::utils::dependency::validate_dependency_graph;

        let graph = self.bean_factory.get_dependency_graph();
        validate_dependency_graph(&graph)
            .map_err(|e| ContainerError::DependencyValidationFailed(e.to_string()))?;
        tracing::info!("Dependency validation passed for {} bean(s)", graph.len());
        Ok(())
    }

    /// 初始化所有非延迟加载的单例 Bean
    pub fn initialize(&self) -> ContainerResult<()> {
        self.bean_factory.preinstantiate_singletons()
    }

    /// 关闭应用：执行 shutdown hooks，随后销毁所有单例
    pub fn shutdown(&self) {
        tracing::info!("Starting application shutdown");

        let hooks = self.shutdown_hooks.read();
        tracing::info!("Executing {} shutdown hook(s)", hooks.len());
        for (idx, hook) in hooks.iter().enumerate() {
            if let Err(e) = hook() {
                tracing::warn!("Shutdown hook {} failed: {}", idx + 1, e);
            }
        }
        drop(hooks);

        self.bean_factory.destroy_singletons();
        tracing::info!("Application shutdown complete");
    }
}

impl Default for ApplicationContext {
    fn default() -> Self {
        Self::new()
    }
}

impl Container for ApplicationContext {
    fn register(&self, definition: BeanDefinition) -> ContainerResult<()> {
        self.bean_factory.register_bean_definition(definition)
    }

    fn get_bean(&self, name: &str) -> ContainerResult<Arc<dyn Any + Send + Sync>> {
        self.bean_factory.get_bean(name)
    }

    fn contains_bean(&self, name: &str) -> bool {
        self.bean_factory.contains_bean(name)
    }

    fn get_bean_names(&self) -> Vec<String> {
        self.bean_factory.get_bean_names()
    }
}

/// 应用上下文构建器
pub struct ApplicationContextBuilder {
    context: ApplicationContext,
}

impl ApplicationContextBuilder {
    pub fn new() -> Self {
        Self {
            context: ApplicationContext::new(),
        }
    }

    /// 注册 Bean 定义
    pub fn register(self, definition: BeanDefinition) -> ContainerResult<Self> {
        self.context.register(definition)?;
        Ok(self)
    }

    /// 添加配置源
    pub fn add_property_source(self, source: Box<dyn PropertySource>) -> Self {
        self.context.environment.add_property_source(source);
        self
    }

    /// 添加 BeanPostProcessor
    pub fn add_bean_post_processor(self, processor: Arc<dyn BeanPostProcessor>) -> Self {
        self.context.add_bean_post_processor(processor);
        self
    }

    /// 构建上下文并注册框架核心 Bean
    pub fn build(self) -> ContainerResult<Arc<ApplicationContext>> {
        let context = Arc::new(self.context);

        // 注册 Environment 为 Bean
        let env = Arc::clone(context.environment());
        context.register(
            BeanDefinition::new(
                constants::ENVIRONMENT_BEAN_NAME,
                FunctionFactory::new(move || Ok(Arc::clone(&env))),
            )
            .with_scope(Scope::Singleton),
        )?;

        // 注册 ApplicationContext 自身为 Bean
        let context_clone = Arc::clone(&context);
        context.register(
            BeanDefinition::new(
                constants::APPLICATION_CONTEXT_BEAN_NAME,
                FunctionFactory::new(move || Ok(Arc::clone(&context_clone))),
            )
            .with_scope(Scope::Singleton),
        )?;

        tracing::debug!("Framework core beans registered");
        Ok(context)
    }
}

impl Default for ApplicationContextBuilder {
    fn default() -> Self {
        Self::new()
    }
}
