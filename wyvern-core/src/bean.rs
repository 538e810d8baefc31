//! Bean 模型：作用域、定义与实例工厂

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

use crate::error::ContainerResult;
use crate::invocable::{ClassDescriptor, Invocable};

/// Bean 的作用域
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Scope {
    /// 单例模式 - 容器中只有一个实例
    #[default]
    Singleton,

    /// 原型模式 - 每次请求都创建新实例
    Prototype,
}

/// Bean trait - 所有可以被容器管理的类型都需要实现此 trait
pub trait Bean: Any + Send + Sync {
    /// 获取 Bean 的名称
    fn bean_name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// 为所有满足条件的类型自动实现 Bean trait
impl<T: Any + Send + Sync> Bean for T {}

/// 实例工厂 trait - 描述如何创建一个 Bean 实例
pub trait InstanceFactory: Send + Sync {
    /// 创建 Bean 实例
    fn create(&self) -> ContainerResult<Box<dyn Any + Send + Sync>>;

    /// 获取 Bean 的类型 ID
    fn type_id(&self) -> TypeId;

    /// 获取 Bean 的类型名称
    fn type_name(&self) -> &str;
}

/// 生命周期回调类型
pub type InitCallback = Arc<dyn Fn(&mut dyn Any) -> ContainerResult<()> + Send + Sync>;
pub type DestroyCallback = Arc<dyn Fn(&mut dyn Any) -> ContainerResult<()> + Send + Sync>;

/// Bean 定义 - 描述如何创建和管理 Bean
///
/// 工厂与回调以 Arc 持有，容器可以在不持锁的情况下执行它们
pub struct BeanDefinition {
    /// Bean 的名称
    pub name: String,

    /// Bean 的作用域
    pub scope: Scope,

    /// 实例工厂
    pub factory: Arc<dyn InstanceFactory>,

    /// 是否延迟初始化（仅对单例有效）
    pub lazy: bool,

    /// Bean 的依赖列表（用于静态依赖分析）
    pub dependencies: Vec<String>,

    /// 类描述符（参与动态分发/代理的 Bean 携带）
    pub class_descriptor: Option<Arc<ClassDescriptor>>,

    /// 初始化回调
    pub init_callback: Option<InitCallback>,

    /// 销毁回调
    pub destroy_callback: Option<DestroyCallback>,
}

impl BeanDefinition {
    /// 创建新的 Bean 定义
    pub fn new<F>(name: impl Into<String>, factory: F) -> Self
    where
        F: InstanceFactory + 'static,
    {
        Self {
            name: name.into(),
            scope: Scope::default(),
            factory: Arc::new(factory),
            lazy: false,
            dependencies: Vec::new(),
            class_descriptor: None,
            init_callback: None,
            destroy_callback: None,
        }
    }

    /// 创建一个可动态调用的 Bean 定义
    ///
    /// 实例以 `Arc<dyn Invocable>` 形式存入容器，类描述符随定义登记，
    /// 这是参与 AOP 代理的 Bean 的标准注册方式
    pub fn invocable<F>(
        name: impl Into<String>,
        class_descriptor: Arc<ClassDescriptor>,
        factory: F,
    ) -> Self
    where
        F: Fn() -> ContainerResult<Arc<dyn Invocable>> + Send + Sync + 'static,
    {
        let definition = Self::new(name, FunctionFactory::new(factory));
        definition.with_class_descriptor(class_descriptor)
    }

    /// 设置作用域
    pub fn with_scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    /// 设置延迟初始化
    pub fn with_lazy(mut self, lazy: bool) -> Self {
        self.lazy = lazy;
        self
    }

    /// 设置依赖列表
    pub fn with_dependencies(mut self, dependencies: Vec<String>) -> Self {
        self.dependencies = dependencies;
        self
    }

    /// 设置类描述符
    pub fn with_class_descriptor(mut self, class_descriptor: Arc<ClassDescriptor>) -> Self {
        self.class_descriptor = Some(class_descriptor);
        self
    }

    /// 设置初始化回调
    pub fn with_init<F>(mut self, init_fn: F) -> Self
    where
        F: Fn(&mut dyn Any) -> ContainerResult<()> + Send + Sync + 'static,
    {
        self.init_callback = Some(Arc::new(init_fn));
        self
    }

    /// 设置销毁回调
    pub fn with_destroy<F>(mut self, destroy_fn: F) -> Self
    where
        F: Fn(&mut dyn Any) -> ContainerResult<()> + Send + Sync + 'static,
    {
        self.destroy_callback = Some(Arc::new(destroy_fn));
        self
    }
}

impl fmt::Debug for BeanDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BeanDefinition")
            .field("name", &self.name)
            .field("scope", &self.scope)
            .field("lazy", &self.lazy)
            .field("dependencies", &self.dependencies)
            .field("type_name", &self.factory.type_name())
            .finish()
    }
}

/// 简单的函数工厂实现
pub struct FunctionFactory<T, F>
where
    T: Any + Send + Sync,
    F: Fn() -> ContainerResult<T> + Send + Sync,
{
    factory_fn: F,
    _phantom: std::marker::PhantomData<fn() -> T>,
}

impl<T, F> FunctionFactory<T, F>
where
    T: Any + Send + Sync,
    F: Fn() -> ContainerResult<T> + Send + Sync,
{
    pub fn new(factory_fn: F) -> Self {
        Self {
            factory_fn,
            _phantom: std::marker::PhantomData,
        }
    }
}

impl<T, F> InstanceFactory for FunctionFactory<T, F>
where
    T: Any + Send + Sync,
    F: Fn() -> ContainerResult<T> + Send + Sync,
{
    fn create(&self) -> ContainerResult<Box<dyn Any + Send + Sync>> {
        let instance = (self.factory_fn)()?;
        Ok(Box::new(instance))
    }

    fn type_id(&self) -> TypeId {
        TypeId::of::<T>()
    }

    fn type_name(&self) -> &str {
        std::any::type_name::<T>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_definition_builder() {
        let definition = BeanDefinition::new(
            "userService",
            FunctionFactory::new(|| Ok(String::from("service"))),
        )
        .with_scope(Scope::Prototype)
        .with_lazy(true)
        .with_dependencies(vec!["database".to_string()]);

        assert_eq!(definition.name, "userService");
        assert_eq!(definition.scope, Scope::Prototype);
        assert!(definition.lazy);
        assert_eq!(definition.dependencies, vec!["database".to_string()]);
        assert!(definition.class_descriptor.is_none());
    }

    #[test]
    fn test_function_factory_creates_instances() {
        let factory = FunctionFactory::new(|| Ok(42_u32));
        let instance = factory.create().unwrap();
        assert_eq!(instance.downcast_ref::<u32>(), Some(&42));
        assert_eq!(InstanceFactory::type_id(&factory), TypeId::of::<u32>());
    }
}
