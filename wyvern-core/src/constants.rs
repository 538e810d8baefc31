//! 框架核心组件的 Bean 名称常量
//!
//! 容器与扩展模块使用同一份标识符，避免硬编码不一致

/// ApplicationContext 在容器中的 Bean 名称
pub const APPLICATION_CONTEXT_BEAN_NAME: &str = "applicationContext";

/// Environment 在容器中的 Bean 名称
pub const ENVIRONMENT_BEAN_NAME: &str = "environment";

/// 自动代理创建器的 Bean 名称
pub const AUTO_PROXY_CREATOR_BEAN_NAME: &str = "autoProxyCreator";

/// 事务管理器的 Bean 名称
pub const TRANSACTION_MANAGER_BEAN_NAME: &str = "transactionManager";

/// 事务拦截器的 Bean 名称
pub const TRANSACTION_INTERCEPTOR_BEAN_NAME: &str = "transactionInterceptor";
