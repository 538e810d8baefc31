//! Bean Factory - 核心容器接口
//!
//! 分层的容器接口设计：基础访问、类型化访问、列举、配置，
//! `DefaultListableBeanFactory` 是默认实现

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::bean::{BeanDefinition, Scope};
use crate::error::{ContainerError, ContainerResult};
use crate::lifecycle::BeanPostProcessor;
use crate::utils::dependency::{topological_sort, CreationTracker};

/// BeanFactory - 最基础的容器接口
///
/// 注意：此 trait 不包含泛型方法，因此可以作为 trait object 使用
pub trait BeanFactory: Send + Sync {
    /// 通过名称获取 Bean
    fn get_bean(&self, name: &str) -> ContainerResult<Arc<dyn Any + Send + Sync>>;

    /// 检查是否包含指定名称的 Bean
    fn contains_bean(&self, name: &str) -> bool;
}

/// BeanFactoryExt - BeanFactory 的泛型扩展
pub trait BeanFactoryExt: BeanFactory {
    /// 通过类型获取 Bean
    fn get_bean_by_type<T: Any + Send + Sync>(&self) -> ContainerResult<Arc<T>>;

    /// 检查是否包含指定类型的 Bean
    fn contains_bean_by_type<T: Any + Send + Sync>(&self) -> bool;
}

/// ListableBeanFactory - 可列举的 Bean 工厂
pub trait ListableBeanFactory: BeanFactory {
    /// 获取所有 Bean 的名称
    fn get_bean_names(&self) -> Vec<String>;

    /// 获取指定类型的所有 Bean 名称
    fn get_bean_names_for_type(&self, type_id: TypeId) -> Vec<String>;

    /// 获取 Bean 定义的数量
    fn get_bean_definition_count(&self) -> usize;
}

/// ConfigurableBeanFactory - 可配置的 Bean 工厂
pub trait ConfigurableBeanFactory: BeanFactory {
    /// 注册 Bean 定义
    fn register_bean_definition(&self, definition: BeanDefinition) -> ContainerResult<()>;

    /// 检查是否包含指定的 Bean 定义
    fn contains_bean_definition(&self, name: &str) -> bool;

    /// 移除 Bean 定义
    fn remove_bean_definition(&self, name: &str) -> ContainerResult<()>;

    /// 查询 Bean 的作用域
    fn bean_scope(&self, name: &str) -> Option<Scope>;

    /// 添加 BeanPostProcessor（按 order 排序后生效）
    fn add_bean_post_processor(&self, processor: Arc<dyn BeanPostProcessor>);

    /// 获取所有 BeanPostProcessor
    fn get_bean_post_processors(&self) -> Vec<Arc<dyn BeanPostProcessor>>;
}

/// ConfigurableListableBeanFactory - 完整的容器 SPI
pub trait ConfigurableListableBeanFactory: ListableBeanFactory + ConfigurableBeanFactory {
    /// 预实例化所有非延迟单例 Bean
    fn preinstantiate_singletons(&self) -> ContainerResult<()>;

    /// 冻结配置（不再允许修改 Bean 定义）
    fn freeze_configuration(&self);

    /// 检查配置是否已冻结
    fn is_configuration_frozen(&self) -> bool;

    /// 销毁所有单例 Bean（调用 destroy 回调），可重复调用
    fn destroy_singletons(&self);

    /// 获取所有 Bean 的依赖声明（用于依赖校验）
    fn get_dependency_graph(&self) -> HashMap<String, Vec<String>>;
}

/// DefaultListableBeanFactory - 默认容器实现
pub struct DefaultListableBeanFactory {
    /// Bean 定义存储
    definitions: RwLock<HashMap<String, BeanDefinition>>,

    /// 单例 Bean 缓存
    singletons: RwLock<HashMap<String, Arc<dyn Any + Send + Sync>>>,

    /// 类型到名称的映射
    type_to_name: RwLock<HashMap<TypeId, String>>,

    /// 循环依赖检测
    creation_tracker: CreationTracker,

    /// Bean 后置处理器列表（按 order 排序）
    bean_post_processors: RwLock<Vec<Arc<dyn BeanPostProcessor>>>,

    /// 配置是否已冻结
    configuration_frozen: RwLock<bool>,
}

/// RAII 守卫：无论创建成功与否都清理创建标记
struct CreationGuard<'a> {
    tracker: &'a CreationTracker,
    name: String,
}

impl Drop for CreationGuard<'_> {
    fn drop(&mut self) {
        self.tracker.finish_creating(&self.name);
    }
}

impl DefaultListableBeanFactory {
    pub fn new() -> Self {
        Self {
            definitions: RwLock::new(HashMap::new()),
            singletons: RwLock::new(HashMap::new()),
            type_to_name: RwLock::new(HashMap::new()),
            creation_tracker: CreationTracker::new(),
            bean_post_processors: RwLock::new(Vec::new()),
            configuration_frozen: RwLock::new(false),
        }
    }

    /// 创建 Bean 实例并走完生命周期
    ///
    /// 顺序：
    /// 1. BeanPostProcessor.post_process_before_instantiation（可短路）
    /// 2. 工厂实例化
    /// 3. BeanPostProcessor.post_process_before_initialization
    /// 4. init 回调
    /// 5. BeanPostProcessor.post_process_after_initialization
    fn create_bean_internal(&self, name: &str) -> ContainerResult<Arc<dyn Any + Send + Sync>> {
        if self.creation_tracker.is_creating(name) {
            let chain = self.creation_tracker.current_chain();
            tracing::error!(
                "Circular dependency detected while creating '{}'. Creation chain: {:?}",
                name,
                chain
            );
            return Err(ContainerError::CircularDependency(format!(
                "{} -> {}",
                chain.join(" -> "),
                name
            )));
        }

        if !self.creation_tracker.start_creating(name) {
            return Err(ContainerError::CircularDependency(format!(
                "detected circular dependency on '{name}'"
            )));
        }
        let _guard = CreationGuard {
            tracker: &self.creation_tracker,
            name: name.to_string(),
        };

        // 1. 实例化前钩子，返回 Some 则短路默认创建
        if let Some(short_circuited) = self.apply_before_instantiation(name)? {
            tracing::debug!("Bean '{}' instantiation short-circuited by a post-processor", name);
            return self.apply_after_initialization(short_circuited, name);
        }

        // 提取创建所需的句柄后立刻释放定义锁，
        // 工厂内部可能递归请求依赖 Bean
        let (factory, init_callback) = {
            let definitions = self.definitions.read();
            let definition = definitions
                .get(name)
                .ok_or_else(|| ContainerError::BeanNotFound(name.to_string()))?;
            (Arc::clone(&definition.factory), definition.init_callback.clone())
        };

        // 2. 实例化
        let instance = factory.create().map_err(|e| match e {
            ContainerError::CircularDependency(_) => e,
            _ => ContainerError::BeanCreationFailed(format!("{name}: {e}")),
        })?;
        let mut bean: Arc<dyn Any + Send + Sync> = Arc::from(instance);

        // 3. 初始化前钩子
        bean = self.apply_before_initialization(bean, name)?;

        // 4. init 回调
        if let Some(init_fn) = init_callback {
            if let Some(bean_mut) = Arc::get_mut(&mut bean) {
                init_fn(bean_mut).map_err(|e| {
                    ContainerError::BeanCreationFailed(format!("{name} init failed: {e}"))
                })?;
            } else {
                tracing::warn!("Cannot call init on bean '{}': multiple references exist", name);
            }
        }

        // 5. 初始化后钩子（AOP 代理在这里替换 Bean）
        self.apply_after_initialization(bean, name)
    }

    fn apply_before_instantiation(
        &self,
        name: &str,
    ) -> ContainerResult<Option<Arc<dyn Any + Send + Sync>>> {
        let processors = self.get_bean_post_processors();
        if processors.is_empty() {
            return Ok(None);
        }
        let definitions = self.definitions.read();
        let definition = definitions
            .get(name)
            .ok_or_else(|| ContainerError::BeanNotFound(name.to_string()))?;
        for processor in &processors {
            if let Some(bean) = processor.post_process_before_instantiation(definition, name)? {
                tracing::trace!(
                    "Post-processor '{}' produced bean '{}' before instantiation",
                    processor.name(),
                    name
                );
                return Ok(Some(bean));
            }
        }
        Ok(None)
    }

    fn apply_before_initialization(
        &self,
        bean: Arc<dyn Any + Send + Sync>,
        bean_name: &str,
    ) -> ContainerResult<Arc<dyn Any + Send + Sync>> {
        let mut current = bean;
        for processor in self.get_bean_post_processors() {
            current = processor.post_process_before_initialization(current, bean_name)?;
        }
        Ok(current)
    }

    fn apply_after_initialization(
        &self,
        bean: Arc<dyn Any + Send + Sync>,
        bean_name: &str,
    ) -> ContainerResult<Arc<dyn Any + Send + Sync>> {
        let mut current = bean;
        for processor in self.get_bean_post_processors() {
            current = processor.post_process_after_initialization(current, bean_name)?;
        }
        Ok(current)
    }
}

impl Default for DefaultListableBeanFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl BeanFactory for DefaultListableBeanFactory {
    fn get_bean(&self, name: &str) -> ContainerResult<Arc<dyn Any + Send + Sync>> {
        tracing::trace!("Requesting bean: '{}'", name);

        let scope = self.bean_scope(name).ok_or_else(|| {
            tracing::debug!("Bean '{}' not found in container", name);
            ContainerError::BeanNotFound(name.to_string())
        })?;

        match scope {
            Scope::Singleton => {
                {
                    let singletons = self.singletons.read();
                    if let Some(bean) = singletons.get(name) {
                        tracing::trace!("Returning cached instance of singleton bean '{}'", name);
                        return Ok(Arc::clone(bean));
                    }
                }

                tracing::info!("Creating shared instance of singleton bean '{}'", name);
                let bean = self.create_bean_internal(name)?;

                let mut singletons = self.singletons.write();
                let cached = singletons
                    .entry(name.to_string())
                    .or_insert_with(|| Arc::clone(&bean));
                Ok(Arc::clone(cached))
            }
            Scope::Prototype => {
                tracing::debug!("Creating new instance of prototype bean '{}'", name);
                self.create_bean_internal(name)
            }
        }
    }

    fn contains_bean(&self, name: &str) -> bool {
        self.definitions.read().contains_key(name)
    }
}

impl BeanFactoryExt for DefaultListableBeanFactory {
    fn get_bean_by_type<T: Any + Send + Sync>(&self) -> ContainerResult<Arc<T>> {
        let type_id = TypeId::of::<T>();
        let type_name = std::any::type_name::<T>();

        // 先按 TypeId 查找，失败时退回按类型名称扫描
        let name = {
            let type_to_name = self.type_to_name.read();
            type_to_name.get(&type_id).cloned()
        }
        .or_else(|| {
            let definitions = self.definitions.read();
            definitions
                .iter()
                .find(|(_, definition)| definition.factory.type_name() == type_name)
                .map(|(name, _)| name.clone())
        })
        .ok_or_else(|| ContainerError::BeanNotFound(format!("no bean for type '{type_name}'")))?;

        let bean = self.get_bean(&name)?;
        bean.downcast::<T>()
            .map_err(|_| ContainerError::TypeMismatch {
                expected: type_name.to_string(),
                found: "unknown".to_string(),
            })
    }

    fn contains_bean_by_type<T: Any + Send + Sync>(&self) -> bool {
        let type_id = TypeId::of::<T>();
        if self.type_to_name.read().contains_key(&type_id) {
            return true;
        }
        let type_name = std::any::type_name::<T>();
        self.definitions
            .read()
            .values()
            .any(|definition| definition.factory.type_name() == type_name)
    }
}

impl ListableBeanFactory for DefaultListableBeanFactory {
    fn get_bean_names(&self) -> Vec<String> {
        self.definitions.read().keys().cloned().collect()
    }

    fn get_bean_names_for_type(&self, type_id: TypeId) -> Vec<String> {
        self.definitions
            .read()
            .iter()
            .filter(|(_, definition)| definition.factory.type_id() == type_id)
            .map(|(name, _)| name.clone())
            .collect()
    }

    fn get_bean_definition_count(&self) -> usize {
        self.definitions.read().len()
    }
}

impl ConfigurableBeanFactory for DefaultListableBeanFactory {
    fn register_bean_definition(&self, definition: BeanDefinition) -> ContainerResult<()> {
        let name = definition.name.clone();
        if *self.configuration_frozen.read() {
            return Err(ContainerError::ConfigurationFrozen(name));
        }

        tracing::trace!(
            "Registering bean definition: name='{}', type='{}', scope={:?}",
            name,
            definition.factory.type_name(),
            definition.scope
        );

        {
            let mut definitions = self.definitions.write();
            if definitions.contains_key(&name) {
                tracing::warn!("Bean '{}' already exists, registration failed", name);
                return Err(ContainerError::BeanAlreadyExists(name));
            }
            let type_id = definition.factory.type_id();
            definitions.insert(name.clone(), definition);
            self.type_to_name.write().insert(type_id, name.clone());
        }

        tracing::debug!("Bean definition registered successfully: '{}'", name);
        Ok(())
    }

    fn contains_bean_definition(&self, name: &str) -> bool {
        self.definitions.read().contains_key(name)
    }

    fn remove_bean_definition(&self, name: &str) -> ContainerResult<()> {
        if *self.configuration_frozen.read() {
            return Err(ContainerError::ConfigurationFrozen(name.to_string()));
        }
        let mut definitions = self.definitions.write();
        definitions
            .remove(name)
            .ok_or_else(|| ContainerError::BeanNotFound(name.to_string()))?;
        self.singletons.write().remove(name);
        Ok(())
    }

    fn bean_scope(&self, name: &str) -> Option<Scope> {
        self.definitions.read().get(name).map(|d| d.scope)
    }

    fn add_bean_post_processor(&self, processor: Arc<dyn BeanPostProcessor>) {
        tracing::debug!("Adding bean post-processor '{}'", processor.name());
        let mut processors = self.bean_post_processors.write();
        processors.push(processor);
        processors.sort_by_key(|p| p.order());
    }

    fn get_bean_post_processors(&self) -> Vec<Arc<dyn BeanPostProcessor>> {
        self.bean_post_processors.read().clone()
    }
}

impl ConfigurableListableBeanFactory for DefaultListableBeanFactory {
    fn preinstantiate_singletons(&self) -> ContainerResult<()> {
        let (eager, graph) = {
            let definitions = self.definitions.read();
            let eager: Vec<String> = definitions
                .values()
                .filter(|d| d.scope == Scope::Singleton && !d.lazy)
                .map(|d| d.name.clone())
                .collect();
            let graph: HashMap<String, Vec<String>> = definitions
                .iter()
                .map(|(name, d)| (name.clone(), d.dependencies.clone()))
                .collect();
            (eager, graph)
        };

        if eager.is_empty() {
            return Ok(());
        }

        let ordered = topological_sort(&graph).map_err(ContainerError::CircularDependency)?;
        for name in ordered {
            if eager.contains(&name) {
                self.get_bean(&name)?;
            }
        }
        tracing::info!("Pre-instantiated {} eager singleton(s)", eager.len());
        Ok(())
    }

    fn freeze_configuration(&self) {
        *self.configuration_frozen.write() = true;
        tracing::debug!("Bean definition configuration frozen");
    }

    fn is_configuration_frozen(&self) -> bool {
        *self.configuration_frozen.read()
    }

    fn destroy_singletons(&self) {
        let beans: Vec<(String, Arc<dyn Any + Send + Sync>)> =
            self.singletons.write().drain().collect();
        if beans.is_empty() {
            return;
        }
        tracing::info!("Destroying {} singleton bean(s)", beans.len());

        for (name, mut bean) in beans {
            let destroy_callback = {
                let definitions = self.definitions.read();
                definitions.get(&name).and_then(|d| d.destroy_callback.clone())
            };
            if let Some(destroy_fn) = destroy_callback {
                if let Some(bean_mut) = Arc::get_mut(&mut bean) {
                    if let Err(e) = destroy_fn(bean_mut) {
                        tracing::warn!("Failed to destroy bean '{}': {}", name, e);
                    }
                } else {
                    tracing::warn!(
                        "Cannot destroy bean '{}': still has active references",
                        name
                    );
                }
            }
        }
    }

    fn get_dependency_graph(&self) -> HashMap<String, Vec<String>> {
        self.definitions
            .read()
            .iter()
            .map(|(name, d)| (name.clone(), d.dependencies.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bean::FunctionFactory;

    fn definition_of(name: &str, value: &'static str) -> BeanDefinition {
        BeanDefinition::new(name, FunctionFactory::new(move || Ok(value.to_string())))
    }

    #[test]
    fn test_singleton_is_cached() {
        let factory = DefaultListableBeanFactory::new();
        factory.register_bean_definition(definition_of("greeting", "hi")).unwrap();

        let a = factory.get_bean("greeting").unwrap();
        let b = factory.get_bean("greeting").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_prototype_creates_fresh_instances() {
        let factory = DefaultListableBeanFactory::new();
        factory
            .register_bean_definition(definition_of("proto", "x").with_scope(Scope::Prototype))
            .unwrap();

        let a = factory.get_bean("proto").unwrap();
        let b = factory.get_bean("proto").unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_missing_bean_reports_not_found() {
        let factory = DefaultListableBeanFactory::new();
        match factory.get_bean("nope") {
            Err(ContainerError::BeanNotFound(name)) => assert_eq!(name, "nope"),
            other => panic!("expected BeanNotFound, got {other:?}"),
        }
    }

    #[test]
    fn test_frozen_configuration_rejects_registration() {
        let factory = DefaultListableBeanFactory::new();
        factory.freeze_configuration();
        let result = factory.register_bean_definition(definition_of("late", "v"));
        assert!(matches!(result, Err(ContainerError::ConfigurationFrozen(_))));
    }

    #[test]
    fn test_post_processor_can_replace_bean() {
        struct Upgrading;
        impl BeanPostProcessor for Upgrading {
            fn post_process_after_initialization(
                &self,
                bean: Arc<dyn Any + Send + Sync>,
                _bean_name: &str,
            ) -> ContainerResult<Arc<dyn Any + Send + Sync>> {
                let original = bean.downcast_ref::<String>().cloned().unwrap_or_default();
                Ok(Arc::new(format!("{original}!")))
            }
        }

        let factory = DefaultListableBeanFactory::new();
        factory.add_bean_post_processor(Arc::new(Upgrading));
        factory.register_bean_definition(definition_of("greeting", "hi")).unwrap();

        let bean = factory.get_bean("greeting").unwrap();
        assert_eq!(bean.downcast_ref::<String>().unwrap(), "hi!");
    }

    #[test]
    fn test_before_instantiation_short_circuits() {
        struct ShortCircuit;
        impl BeanPostProcessor for ShortCircuit {
            fn post_process_before_instantiation(
                &self,
                _definition: &BeanDefinition,
                bean_name: &str,
            ) -> ContainerResult<Option<Arc<dyn Any + Send + Sync>>> {
                if bean_name == "special" {
                    Ok(Some(Arc::new(String::from("replaced"))))
                } else {
                    Ok(None)
                }
            }
        }

        let factory = DefaultListableBeanFactory::new();
        factory.add_bean_post_processor(Arc::new(ShortCircuit));
        factory.register_bean_definition(definition_of("special", "original")).unwrap();

        let bean = factory.get_bean("special").unwrap();
        assert_eq!(bean.downcast_ref::<String>().unwrap(), "replaced");
    }

    #[test]
    fn test_processor_ordering() {
        struct Tagging(&'static str, i32);
        impl BeanPostProcessor for Tagging {
            fn post_process_after_initialization(
                &self,
                bean: Arc<dyn Any + Send + Sync>,
                _bean_name: &str,
            ) -> ContainerResult<Arc<dyn Any + Send + Sync>> {
                let original = bean.downcast_ref::<String>().cloned().unwrap_or_default();
                Ok(Arc::new(format!("{original}{}", self.0)))
            }
            fn order(&self) -> i32 {
                self.1
            }
        }

        let factory = DefaultListableBeanFactory::new();
        factory.add_bean_post_processor(Arc::new(Tagging("b", 200)));
        factory.add_bean_post_processor(Arc::new(Tagging("a", 100)));
        factory.register_bean_definition(definition_of("tagged", "x")).unwrap();

        let bean = factory.get_bean("tagged").unwrap();
        // order 小的先执行
        assert_eq!(bean.downcast_ref::<String>().unwrap(), "xab");
    }
}
