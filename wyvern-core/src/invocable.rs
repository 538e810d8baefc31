//! 动态分发元数据（类/接口/方法描述符）与 Invocable trait
//!
//! Rust 没有运行时反射，容器用显式的描述符来刻画一个 Bean 的
//! "类型结构"：类名、声明的方法、实现的接口、父类链。
//! 实现 [`Invocable`] 的 Bean 以方法名 + 参数数组的形式接受调用，
//! AOP 代理同样实现 [`Invocable`]，因此可以在任何期望
//! `Arc<dyn Invocable>` 的位置透明替换原始 Bean。

use std::any::Any;
use std::error::Error;
use std::fmt;
use std::sync::Arc;

use thiserror::Error as ThisError;

/// 方法参数值
pub type ArgValue = Arc<dyn Any + Send + Sync>;

/// 方法返回值
pub type ReturnValue = Arc<dyn Any + Send + Sync>;

/// 方法描述符
///
/// 只刻画方法身份（名称），匹配与分发都以名称为键
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDescriptor {
    name: String,
}

impl MethodDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for MethodDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}()", self.name)
    }
}

/// 接口描述符
///
/// 一组方法签名的命名集合，代理按接口集合决定哪些方法可以被调用
#[derive(Debug, Clone)]
pub struct InterfaceDescriptor {
    name: String,
    methods: Vec<MethodDescriptor>,
}

impl InterfaceDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            methods: Vec::new(),
        }
    }

    /// 添加一个方法声明
    pub fn with_method(mut self, name: impl Into<String>) -> Self {
        self.methods.push(MethodDescriptor::new(name));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn methods(&self) -> &[MethodDescriptor] {
        &self.methods
    }

    /// 该接口是否声明了指定名称的方法
    pub fn declares(&self, method_name: &str) -> bool {
        self.methods.iter().any(|m| m.name() == method_name)
    }

    /// 查找方法声明
    pub fn find_method(&self, method_name: &str) -> Option<&MethodDescriptor> {
        self.methods.iter().find(|m| m.name() == method_name)
    }
}

/// 类描述符
///
/// 刻画一个目标类型：自身声明的公开方法、直接实现的接口、可选的父类。
/// 通过 [`ClassDescriptor::reachable_methods`] 与
/// [`ClassDescriptor::implemented_interfaces`] 可以得到沿父类链
/// 聚合后的完整视图
#[derive(Debug, Clone)]
pub struct ClassDescriptor {
    name: String,
    methods: Vec<MethodDescriptor>,
    interfaces: Vec<Arc<InterfaceDescriptor>>,
    superclass: Option<Arc<ClassDescriptor>>,
}

impl ClassDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            methods: Vec::new(),
            interfaces: Vec::new(),
            superclass: None,
        }
    }

    /// 添加一个本类声明的公开方法
    pub fn with_method(mut self, name: impl Into<String>) -> Self {
        self.methods.push(MethodDescriptor::new(name));
        self
    }

    /// 添加一个直接实现的接口，并自动纳入接口声明的方法
    pub fn with_interface(mut self, interface: Arc<InterfaceDescriptor>) -> Self {
        for m in interface.methods() {
            if !self.methods.iter().any(|own| own.name() == m.name()) {
                self.methods.push(m.clone());
            }
        }
        self.interfaces.push(interface);
        self
    }

    /// 设置父类
    pub fn with_superclass(mut self, superclass: Arc<ClassDescriptor>) -> Self {
        self.superclass = Some(superclass);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn superclass(&self) -> Option<&Arc<ClassDescriptor>> {
        self.superclass.as_ref()
    }

    /// 本类直接声明的方法
    pub fn declared_methods(&self) -> &[MethodDescriptor] {
        &self.methods
    }

    /// 本类直接实现的接口
    pub fn declared_interfaces(&self) -> &[Arc<InterfaceDescriptor>] {
        &self.interfaces
    }

    /// 沿父类链可达的所有公开方法（子类覆盖父类同名方法）
    pub fn reachable_methods(&self) -> Vec<&MethodDescriptor> {
        let mut seen: Vec<&str> = Vec::new();
        let mut result = Vec::new();
        let mut current = Some(self);
        while let Some(class) = current {
            for m in &class.methods {
                if !seen.contains(&m.name()) {
                    seen.push(m.name());
                    result.push(m);
                }
            }
            current = class.superclass.as_deref();
        }
        result
    }

    /// 沿父类链查找方法
    pub fn find_method(&self, method_name: &str) -> Option<&MethodDescriptor> {
        let mut current = Some(self);
        while let Some(class) = current {
            if let Some(m) = class.methods.iter().find(|m| m.name() == method_name) {
                return Some(m);
            }
            current = class.superclass.as_deref();
        }
        None
    }

    pub fn has_method(&self, method_name: &str) -> bool {
        self.find_method(method_name).is_some()
    }

    /// 本类及所有父类实现的接口并集（按接口名去重）
    ///
    /// 迭代地沿父类链收集，同名接口只出现一次
    pub fn implemented_interfaces(&self) -> Vec<Arc<InterfaceDescriptor>> {
        let mut seen: Vec<String> = Vec::new();
        let mut result = Vec::new();
        let mut current = Some(self);
        while let Some(class) = current {
            for interface in &class.interfaces {
                if !seen.contains(&interface.name().to_string()) {
                    seen.push(interface.name().to_string());
                    result.push(Arc::clone(interface));
                }
            }
            current = class.superclass.as_deref();
        }
        result
    }
}

impl fmt::Display for ClassDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// 目标方法抛出的应用异常
///
/// 持有原始错误的共享引用与构造时捕获的类型名称，
/// 分发层必须原样透传内部的 Arc，保证调用方拿到同一个错误实例
#[derive(Clone)]
pub struct ThrownException {
    error: Arc<dyn Error + Send + Sync>,
    type_name: String,
}

impl ThrownException {
    /// 从具体错误创建，同时捕获其类型名称
    pub fn new<E: Error + Send + Sync + 'static>(error: E) -> Self {
        Self {
            error: Arc::new(error),
            type_name: std::any::type_name::<E>().to_string(),
        }
    }

    /// 从已共享的错误创建，类型名称由调用方提供
    pub fn from_arc(error: Arc<dyn Error + Send + Sync>, type_name: impl Into<String>) -> Self {
        Self {
            error,
            type_name: type_name.into(),
        }
    }

    pub fn message(&self) -> String {
        self.error.to_string()
    }

    /// 抛出错误的类型名称（`std::any::type_name` 形式）
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// 原始错误实例
    pub fn error(&self) -> &Arc<dyn Error + Send + Sync> {
        &self.error
    }

    pub fn into_error(self) -> Arc<dyn Error + Send + Sync> {
        self.error
    }

    /// 尝试按具体类型访问原始错误
    pub fn downcast_ref<E: Error + 'static>(&self) -> Option<&E> {
        self.error.downcast_ref::<E>()
    }

    /// 错误源链（cause chain）的文本形式
    pub fn source_chain(&self) -> Vec<String> {
        let mut chain = Vec::new();
        let mut current = self.error.source();
        while let Some(source) = current {
            chain.push(source.to_string());
            current = source.source();
        }
        chain
    }
}

impl fmt::Debug for ThrownException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThrownException")
            .field("type_name", &self.type_name)
            .field("message", &self.message())
            .finish()
    }
}

impl fmt::Display for ThrownException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)
    }
}

/// 方法调用失败
#[derive(Debug, Clone, ThisError)]
pub enum InvokeError {
    /// 目标类型上没有这个方法
    #[error("no method '{method}' on class '{class}'")]
    NoSuchMethod { class: String, method: String },

    /// 目标方法抛出了应用异常
    #[error("{0}")]
    Thrown(ThrownException),

    /// 基础设施失败（区别于应用异常，便于日志与诊断）
    #[error("infrastructure failure invoking '{method}': {message}")]
    Infrastructure { method: String, message: String },
}

impl InvokeError {
    /// 便捷构造：包装一个应用错误
    pub fn thrown<E: Error + Send + Sync + 'static>(error: E) -> Self {
        InvokeError::Thrown(ThrownException::new(error))
    }

    pub fn no_such_method(class: &ClassDescriptor, method: &str) -> Self {
        InvokeError::NoSuchMethod {
            class: class.name().to_string(),
            method: method.to_string(),
        }
    }
}

/// 方法调用结果
pub type InvokeResult = std::result::Result<ReturnValue, InvokeError>;

/// 可按名称动态调用的对象
///
/// 这是反射式方法分发在 Rust 中的对应物：实现方在 `invoke` 中
/// 按方法名分派到自己的具体方法，参数与返回值统一为
/// `Arc<dyn Any + Send + Sync>`
pub trait Invocable: Send + Sync {
    /// 对象的类描述符
    fn class(&self) -> Arc<ClassDescriptor>;

    /// 按名称调用方法
    fn invoke(&self, method: &str, args: &[ArgValue]) -> InvokeResult;
}

/// 将 Invocable 对象打包为容器 Bean 载荷
pub fn into_bean(invocable: Arc<dyn Invocable>) -> Arc<dyn Any + Send + Sync> {
    Arc::new(invocable)
}

/// 从容器 Bean 载荷中取回 Invocable 对象（若是）
pub fn as_invocable(bean: &Arc<dyn Any + Send + Sync>) -> Option<Arc<dyn Invocable>> {
    bean.downcast_ref::<Arc<dyn Invocable>>().map(Arc::clone)
}
