// wyvern-core: 依赖注入容器核心
//
// 提供类型安全的依赖注入功能，支持：
// - 单例和原型作用域
// - 生命周期管理（init/destroy 回调、BeanPostProcessor 三阶段钩子）
// - 动态分发元数据（ClassDescriptor / Invocable），供 AOP 代理使用
// - 配置环境、日志引导与插件机制

pub mod bean;
pub mod bean_factory;
pub mod config;
pub mod constants;
pub mod context;
pub mod error;
pub mod invocable;
pub mod lifecycle;
pub mod logging;
pub mod plugin;
pub mod utils;

// 重新导出常用类型
pub use bean::{
    Bean, BeanDefinition, DestroyCallback, FunctionFactory, InitCallback, InstanceFactory, Scope,
};
pub use bean_factory::{
    BeanFactory, BeanFactoryExt, ConfigurableBeanFactory, ConfigurableListableBeanFactory,
    DefaultListableBeanFactory, ListableBeanFactory,
};
pub use config::{
    ConfigValue, Environment, EnvironmentPropertySource, MapPropertySource, PropertySource,
    TomlPropertySource,
};
pub use constants::*;
pub use context::{ApplicationContext, ApplicationContextBuilder, Container, ShutdownHook};
pub use error::{ContainerError, ContainerResult};
pub use invocable::{
    as_invocable, into_bean, ArgValue, ClassDescriptor, InterfaceDescriptor, Invocable,
    InvokeError, InvokeResult, MethodDescriptor, ReturnValue, ThrownException,
};
pub use lifecycle::BeanPostProcessor;
pub use logging::{LogFormat, LogLevel, LoggingConfig};
pub use plugin::{load_plugins, ApplicationPlugin, PluginRegistry, PluginSubmission};

// 导出 inventory，供宏使用
pub use inventory;

/// Prelude 模块，包含常用的 traits 和类型
pub mod prelude {
    pub use crate::bean::{Bean, BeanDefinition, FunctionFactory, InstanceFactory, Scope};
    pub use crate::bean_factory::{
        BeanFactory, BeanFactoryExt, ConfigurableBeanFactory, ConfigurableListableBeanFactory,
        DefaultListableBeanFactory, ListableBeanFactory,
    };
    pub use crate::config::{ConfigValue, Environment, MapPropertySource, PropertySource};
    pub use crate::context::{ApplicationContext, Container};
    pub use crate::error::{ContainerError, ContainerResult};
    pub use crate::invocable::{
        as_invocable, into_bean, ArgValue, ClassDescriptor, InterfaceDescriptor, Invocable,
        InvokeError, InvokeResult, MethodDescriptor, ReturnValue, ThrownException,
    };
    pub use crate::lifecycle::BeanPostProcessor;
    pub use crate::logging::{LogFormat, LogLevel, LoggingConfig};
    pub use crate::plugin::{ApplicationPlugin, PluginRegistry};
    pub use crate::utils;
    // Re-export anyhow for convenience
    pub use anyhow::{anyhow, Context};
}
