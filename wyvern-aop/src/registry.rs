//! Advisor 注册表
//!
//! 自动代理创建器通过 [`AdvisorSource`] 拿到候选 Advisor 快照，
//! 不关心列表如何产生。默认实现 [`AdvisorRegistry`] 支持
//! 编程式注册与 inventory 编译期提交（全局注册表在首次访问时
//! 自动加载所有提交项）

use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::RwLock;

use crate::advisor::Advisor;

/// 候选 Advisor 来源
pub trait AdvisorSource: Send + Sync {
    /// 当前候选 Advisor 快照（保持登记顺序）
    fn find_candidate_advisors(&self) -> Vec<Advisor>;
}

/// Advisor 编译期注册项
pub struct AdvisorRegistration {
    /// Advisor 名称
    pub name: &'static str,

    /// 创建 Advisor 的函数
    pub creator: fn() -> Advisor,
}

impl AdvisorRegistration {
    pub const fn new(name: &'static str, creator: fn() -> Advisor) -> Self {
        Self { name, creator }
    }
}

inventory::collect!(AdvisorRegistration);

/// 全局 Advisor 注册表
///
/// 首次访问时加载所有通过 inventory 提交的注册项
static GLOBAL_ADVISOR_REGISTRY: Lazy<Arc<AdvisorRegistry>> = Lazy::new(|| {
    let registry = AdvisorRegistry::new();
    registry.load_submitted();
    Arc::new(registry)
});

/// 获取全局 Advisor 注册表
pub fn global_advisor_registry() -> Arc<AdvisorRegistry> {
    Arc::clone(&GLOBAL_ADVISOR_REGISTRY)
}

/// Advisor 注册表
///
/// 保持登记顺序，自动代理创建器默认按此顺序装配拦截器链
pub struct AdvisorRegistry {
    advisors: RwLock<Vec<(String, Advisor)>>,
}

impl AdvisorRegistry {
    pub fn new() -> Self {
        Self {
            advisors: RwLock::new(Vec::new()),
        }
    }

    /// 登记一个 Advisor
    pub fn register(&self, name: impl Into<String>, advisor: Advisor) {
        let name = name.into();
        tracing::debug!("Registering advisor '{}'", name);
        self.advisors.write().push((name, advisor));
    }

    /// 批量登记
    pub fn register_all(&self, advisors: impl IntoIterator<Item = (String, Advisor)>) {
        for (name, advisor) in advisors {
            self.register(name, advisor);
        }
    }

    /// 从 inventory 加载所有编译期提交的注册项
    pub fn load_submitted(&self) {
        let mut count = 0;
        for registration in inventory::iter::<AdvisorRegistration> {
            self.register(registration.name, (registration.creator)());
            count += 1;
        }
        tracing::info!("Loaded {} advisor registration(s) from inventory", count);
    }

    pub fn len(&self) -> usize {
        self.advisors.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.advisors.read().is_empty()
    }

    pub fn clear(&self) {
        self.advisors.write().clear();
    }

    /// 已登记的名称（保持顺序）
    pub fn names(&self) -> Vec<String> {
        self.advisors.read().iter().map(|(n, _)| n.clone()).collect()
    }
}

impl AdvisorSource for AdvisorRegistry {
    fn find_candidate_advisors(&self) -> Vec<Advisor> {
        self.advisors
            .read()
            .iter()
            .map(|(_, advisor)| advisor.clone())
            .collect()
    }
}

impl Default for AdvisorRegistry {
    fn default() -> Self {
        Self::new()
    }
}
