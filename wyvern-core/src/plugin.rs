//! 插件机制
//!
//! 扩展模块（如 AOP）通过插件向上下文注册自己的基础设施

use std::sync::Arc;

use crate::context::ApplicationContext;
use crate::error::ContainerResult;

/// 应用插件 trait
pub trait ApplicationPlugin: Send + Sync {
    /// 插件名称
    fn name(&self) -> &str;

    /// 插件优先级（数字越小优先级越高）
    fn priority(&self) -> i32 {
        100
    }

    /// 配置阶段 - 在单例预实例化之前执行
    ///
    /// 用于注册额外的 Bean、BeanPostProcessor、配置源等
    fn configure(&self, _context: &Arc<ApplicationContext>) -> ContainerResult<()> {
        Ok(())
    }

    /// 关闭阶段 - 在应用关闭时执行
    fn on_shutdown(&self, _context: &Arc<ApplicationContext>) -> ContainerResult<()> {
        Ok(())
    }
}

/// 插件注册表
pub struct PluginRegistry {
    plugins: Vec<Box<dyn ApplicationPlugin>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self {
            plugins: Vec::new(),
        }
    }

    /// 注册插件
    pub fn register(&mut self, plugin: Box<dyn ApplicationPlugin>) {
        tracing::debug!("Registering plugin: {}", plugin.name());
        self.plugins.push(plugin);
    }

    /// 按优先级排序插件
    pub fn sort_by_priority(&mut self) {
        self.plugins.sort_by_key(|p| p.priority());
    }

    pub fn plugins(&self) -> &[Box<dyn ApplicationPlugin>] {
        &self.plugins
    }

    /// 执行所有插件的配置阶段
    pub fn configure_all(&self, context: &Arc<ApplicationContext>) -> ContainerResult<()> {
        for plugin in &self.plugins {
            tracing::info!("Configuring plugin: {}", plugin.name());
            plugin.configure(context)?;
        }
        Ok(())
    }

    /// 逆序执行所有插件的关闭阶段
    pub fn shutdown_all(&self, context: &Arc<ApplicationContext>) {
        for plugin in self.plugins.iter().rev() {
            tracing::info!("Shutting down plugin: {}", plugin.name());
            if let Err(e) = plugin.on_shutdown(context) {
                tracing::error!("Failed to shutdown plugin {}: {}", plugin.name(), e);
            }
        }
    }
}

impl Default for PluginRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// 插件提交结构（供 inventory 编译期收集）
pub struct PluginSubmission {
    pub create: fn() -> Box<dyn ApplicationPlugin>,
}

inventory::collect!(PluginSubmission);

/// 用于全局收集插件的宏
#[macro_export]
macro_rules! submit_plugin {
    ($plugin_type:ty) => {
        $crate::inventory::submit! {
            $crate::PluginSubmission {
                create: || Box::new(<$plugin_type>::default())
            }
        }
    };
}

/// 从全局注册表加载所有插件
pub fn load_plugins() -> PluginRegistry {
    let mut registry = PluginRegistry::new();
    for submission in inventory::iter::<PluginSubmission> {
        registry.register((submission.create)());
    }
    registry.sort_by_priority();
    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    struct OrderedPlugin(&'static str, i32);

    impl ApplicationPlugin for OrderedPlugin {
        fn name(&self) -> &str {
            self.0
        }
        fn priority(&self) -> i32 {
            self.1
        }
    }

    #[test]
    fn test_plugins_sorted_by_priority() {
        let mut registry = PluginRegistry::new();
        registry.register(Box::new(OrderedPlugin("late", 200)));
        registry.register(Box::new(OrderedPlugin("early", 10)));
        registry.sort_by_priority();

        let names: Vec<&str> = registry.plugins().iter().map(|p| p.name()).collect();
        assert_eq!(names, vec!["early", "late"]);
    }
}
