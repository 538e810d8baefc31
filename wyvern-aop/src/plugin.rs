//! AOP 插件 - 通过插件机制把自动代理接入应用上下文
//!
//! 配置阶段注册 AutoProxyCreator（挂到 Bean 工厂的后置处理器链），
//! 并登记关闭钩子释放自定义目标源

use std::sync::Arc;

use wyvern_core::prelude::*;
use wyvern_core::PluginSubmission;

use crate::auto_proxy::{AdvisorResolutionStrategy, AutoProxyCreator, TargetSourceCreator};
use crate::proxy::ProxyConfig;
use crate::registry::global_advisor_registry;

/// AOP 应用插件
///
/// 默认从全局 Advisor 注册表解析候选 Advisor；
/// 需要池化/线程本地目标源时通过 builder 追加 TargetSourceCreator
pub struct AopPlugin {
    name: String,
    enabled: bool,
    proxy_config: ProxyConfig,
    target_source_creators: Vec<Arc<dyn TargetSourceCreator>>,
}

impl AopPlugin {
    pub fn new() -> Self {
        Self {
            name: "AopPlugin".to_string(),
            enabled: true,
            proxy_config: ProxyConfig::default(),
            target_source_creators: Vec::new(),
        }
    }

    /// 创建禁用的 AOP 插件
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::new()
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// 指定装配代理时使用的配置标志
    pub fn with_proxy_config(mut self, config: ProxyConfig) -> Self {
        self.proxy_config = config;
        self
    }

    /// 追加一个 TargetSourceCreator
    pub fn with_target_source_creator(mut self, creator: Arc<dyn TargetSourceCreator>) -> Self {
        self.target_source_creators.push(creator);
        self
    }
}

impl Default for AopPlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl ApplicationPlugin for AopPlugin {
    fn name(&self) -> &str {
        &self.name
    }

    fn configure(&self, context: &Arc<ApplicationContext>) -> ContainerResult<()> {
        if !self.enabled {
            tracing::info!("AOP plugin is disabled, skipping initialization");
            return Ok(());
        }

        let registry = global_advisor_registry();
        tracing::info!(
            "Initializing AOP support with {} advisor(s) from the global registry",
            registry.len()
        );

        let creator = AutoProxyCreator::new(Arc::new(AdvisorResolutionStrategy::new(registry)))
            .with_config(self.proxy_config);
        creator.set_bean_factory(context.bean_factory());
        for target_source_creator in &self.target_source_creators {
            creator.add_target_source_creator(Arc::clone(target_source_creator));
        }
        let creator = Arc::new(creator);

        context.add_bean_post_processor(Arc::clone(&creator) as Arc<dyn BeanPostProcessor>);

        // 关闭时释放池/线程本地等自定义目标源
        let disposer = Arc::clone(&creator);
        context.register_shutdown_hook(move || {
            disposer.dispose_target_sources();
            Ok(())
        });

        tracing::info!("AOP auto-proxy creator registered");
        Ok(())
    }
}

// 自动注册 AOP 插件到 inventory
wyvern_core::inventory::submit! {
    PluginSubmission {
        create: || Box::new(AopPlugin::new()) as Box<dyn ApplicationPlugin>,
    }
}
